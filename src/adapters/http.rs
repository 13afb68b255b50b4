use crate::ports::{BackendError, NotificationBackend};
use crate::types::{Credential, NotificationId, NotificationRecord};

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use tracing::debug;
use url::Url;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const ERROR_BODY_LIMIT: usize = 512;

/// REST client for the storefront's notification endpoints.
#[derive(Debug, Clone)]
pub struct HttpNotificationBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpNotificationBackend {
    pub fn new(base: Url) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base
            .join(path)
            .map_err(|err| BackendError::Transport(format!("invalid endpoint '{path}': {err}")))
    }

    async fn get_unread(
        &self,
        credential: &Credential,
    ) -> Result<Vec<NotificationRecord>, BackendError> {
        let url = self.endpoint("api/notifications/unread")?;
        debug!(%url, "fetching unread notifications");
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, credential.bearer())
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;
        let body = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|err| BackendError::Decode(err.to_string()))
    }

    async fn post(&self, credential: &Credential, path: &str) -> Result<(), BackendError> {
        let url = self.endpoint(path)?;
        debug!(%url, "posting read acknowledgement");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, credential.bearer())
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;
        Ok(())
    }
}

impl NotificationBackend for HttpNotificationBackend {
    type Unread<'a>
        = Pin<Box<dyn Future<Output = Result<Vec<NotificationRecord>, BackendError>> + Send + 'a>>
    where
        Self: 'a;
    type Ack<'a>
        = Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + 'a>>
    where
        Self: 'a;

    fn fetch_unread<'a>(&'a self, credential: &'a Credential) -> Self::Unread<'a> {
        Box::pin(self.get_unread(credential))
    }

    fn mark_read<'a>(&'a self, credential: &'a Credential, id: NotificationId) -> Self::Ack<'a> {
        Box::pin(async move {
            self.post(credential, &format!("api/notifications/{id}/read"))
                .await
        })
    }

    fn mark_all_read<'a>(&'a self, credential: &'a Credential) -> Self::Ack<'a> {
        Box::pin(self.post(credential, "api/notifications/read-all"))
    }
}

fn transport(err: reqwest::Error) -> BackendError {
    BackendError::Transport(err.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(BackendError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    })
}
