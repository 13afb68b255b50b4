use std::time::Duration;

use time::OffsetDateTime;

use crate::ports;

mod http;
mod storage;
mod websocket;

pub use http::HttpNotificationBackend;
pub use storage::{FileCredentialStorage, MemoryCredentialStorage};
pub use websocket::{ChannelError, RECONNECT_DELAYS, WebSocketPushChannel};

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimeProvider;

impl ports::TimeProvider for TokioTimeProvider {
    type Sleep<'a>
        = tokio::time::Sleep
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        tokio::time::sleep(duration)
    }
}
