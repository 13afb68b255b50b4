use crate::ports::{PushChannel, TimeProvider};
use crate::types::{ChannelEvent, Credential, NotificationRecord};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use std::time::Duration;

const EVENT_BUFFER: usize = 64;

/// Delays before each consecutive reconnect attempt. The schedule restarts
/// once a connection delivers a ping or a notification; running off its end
/// gives up.
pub const RECONNECT_DELAYS: [Duration; 4] = [
    Duration::from_secs(0),
    Duration::from_secs(2),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("invalid push request: {0}")]
    Request(String),
    #[error("push handshake failed: {0}")]
    Handshake(String),
    #[error("push connection lost: {0}")]
    Connection(String),
    #[error("push server error: {0}")]
    Server(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame {
    Notification { notification: NotificationRecord },
    Ping,
    Error { message: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Pong,
}

enum SessionEnd {
    Cancelled,
    SubscriberGone,
}

#[derive(Debug, Clone)]
pub struct WebSocketPushChannel<T> {
    url: Url,
    time: T,
}

impl<T: TimeProvider> WebSocketPushChannel<T> {
    pub fn new(url: Url, time: T) -> Self {
        Self { url, time }
    }

    async fn run(
        self,
        credential: Credential,
        cancel: CancellationToken,
        events: mpsc::Sender<ChannelEvent>,
    ) {
        let mut failures = 0usize;
        loop {
            let reason = match self
                .connect_once(&credential, &cancel, &events, &mut failures)
                .await
            {
                Ok(SessionEnd::Cancelled) => {
                    debug!("push channel cancelled");
                    return;
                }
                Ok(SessionEnd::SubscriberGone) => {
                    debug!("push channel subscriber dropped");
                    return;
                }
                Err(err) => err.to_string(),
            };

            let Some(delay) = reconnect_delay(failures) else {
                warn!(%reason, attempts = failures + 1, "push channel giving up");
                let _ = events.send(ChannelEvent::Failed { reason }).await;
                return;
            };
            failures += 1;
            warn!(%reason, retry_in = ?delay, "push channel disconnected");
            if events
                .send(ChannelEvent::Reconnecting { reason })
                .await
                .is_err()
            {
                return;
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = self.time.sleep(delay) => {}
            }
        }
    }

    async fn connect_once(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
        events: &mpsc::Sender<ChannelEvent>,
        failures: &mut usize,
    ) -> Result<SessionEnd, ChannelError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|err| ChannelError::Request(err.to_string()))?;
        let bearer = HeaderValue::from_str(&credential.bearer())
            .map_err(|err| ChannelError::Request(err.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        debug!(url = %self.url, "opening push channel");
        let (stream, _) = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            connected = tokio_tungstenite::connect_async(request) => {
                connected.map_err(|err| ChannelError::Handshake(err.to_string()))?
            }
        };
        info!(url = %self.url, "push channel open");
        if events.send(ChannelEvent::Connected).await.is_err() {
            return Ok(SessionEnd::SubscriberGone);
        }

        let (mut sink, mut stream) = stream.split();
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(err) = sink.close().await {
                        debug!(error = %err, "push channel close handshake failed");
                    }
                    return Ok(SessionEnd::Cancelled);
                }
                message = stream.next() => message,
            };
            let message = match message {
                Some(Ok(message)) => message,
                Some(Err(err)) => return Err(ChannelError::Connection(err.to_string())),
                None => return Err(ChannelError::Connection("stream ended".to_string())),
            };

            match message {
                Message::Text(text) => match serde_json::from_str::<ServerFrame>(text.as_str()) {
                    Ok(ServerFrame::Notification { notification }) => {
                        *failures = 0;
                        debug!(id = %notification.id, "push notification received");
                        if events
                            .send(ChannelEvent::Notification(notification))
                            .await
                            .is_err()
                        {
                            let _ = sink.close().await;
                            return Ok(SessionEnd::SubscriberGone);
                        }
                    }
                    Ok(ServerFrame::Ping) => {
                        *failures = 0;
                        let pong = serde_json::to_string(&ClientFrame::Pong)
                            .map_err(|err| ChannelError::Connection(err.to_string()))?;
                        sink.send(Message::text(pong))
                            .await
                            .map_err(|err| ChannelError::Connection(err.to_string()))?;
                    }
                    Ok(ServerFrame::Error { message }) => {
                        return Err(ChannelError::Server(message));
                    }
                    Err(err) => {
                        warn!(error = %err, "ignoring unreadable push frame");
                    }
                },
                Message::Close(frame) => {
                    let reason = frame
                        .map(|frame| frame.reason.as_str().to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return Err(ChannelError::Connection(reason));
                }
                _ => {}
            }
        }
    }
}

impl<T: TimeProvider> PushChannel for WebSocketPushChannel<T> {
    fn open(
        &self,
        credential: Credential,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ChannelEvent> {
        let (events, receiver) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(self.clone().run(credential, cancel, events));
        receiver
    }
}

fn reconnect_delay(failures: usize) -> Option<Duration> {
    RECONNECT_DELAYS.get(failures).copied()
}
