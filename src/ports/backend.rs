use crate::types::{Credential, NotificationId, NotificationRecord};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend rejected the credential")]
    Unauthorized,
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected backend payload: {0}")]
    Decode(String),
}

pub trait NotificationBackend: Clone + Send + Sync + 'static {
    type Unread<'a>: Future<Output = Result<Vec<NotificationRecord>, BackendError>> + Send + 'a
    where
        Self: 'a;
    type Ack<'a>: Future<Output = Result<(), BackendError>> + Send + 'a
    where
        Self: 'a;

    fn fetch_unread<'a>(&'a self, credential: &'a Credential) -> Self::Unread<'a>;
    fn mark_read<'a>(&'a self, credential: &'a Credential, id: NotificationId) -> Self::Ack<'a>;
    fn mark_all_read<'a>(&'a self, credential: &'a Credential) -> Self::Ack<'a>;
}
