use crate::adapters::{
    FileCredentialStorage, HttpNotificationBackend, TokioTimeProvider, WebSocketPushChannel,
};
use crate::config::AppConfig;
use crate::ports::{BackendError, CredentialStorage, NotificationBackend, PushChannel, TimeProvider};
use crate::session::{CredentialDecoder, DecodeError, SessionProvider};
use crate::store::NotificationStore;
use crate::surface::{Bounds, NotificationSurface};

use std::sync::Arc;
use time::UtcOffset;
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid credential settings: {0}")]
    Decoder(#[from] DecodeError),
    #[error("failed to build backend client: {0}")]
    Backend(#[from] BackendError),
}

/// Application root: builds each unit once and hands out references.
pub struct App<S, B, C, T> {
    sessions: SessionProvider<S, T>,
    store: Arc<NotificationStore<B, C>>,
    time: T,
    offset: UtcOffset,
}

pub type LiveApp = App<
    FileCredentialStorage,
    HttpNotificationBackend,
    WebSocketPushChannel<TokioTimeProvider>,
    TokioTimeProvider,
>;

impl LiveApp {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let time = TokioTimeProvider;
        let decoder = CredentialDecoder::new(config.decoder_options())?;
        let backend = HttpNotificationBackend::new(config.api_url.clone())?;
        let channel = WebSocketPushChannel::new(config.push_url.clone(), time);
        Ok(App::new(
            FileCredentialStorage::new(&config.credential_file),
            decoder,
            backend,
            channel,
            time,
            config.utc_offset,
        ))
    }
}

impl<S, B, C, T> App<S, B, C, T>
where
    S: CredentialStorage,
    B: NotificationBackend,
    C: PushChannel,
    T: TimeProvider,
{
    pub fn new(
        storage: S,
        decoder: CredentialDecoder,
        backend: B,
        channel: C,
        time: T,
        offset: UtcOffset,
    ) -> Self {
        Self {
            sessions: SessionProvider::new(storage, decoder, time.clone()),
            store: Arc::new(NotificationStore::new(backend, channel)),
            time,
            offset,
        }
    }

    pub fn sessions(&self) -> &SessionProvider<S, T> {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<NotificationStore<B, C>> {
        &self.store
    }

    pub fn surface(&self, bounds: Bounds) -> NotificationSurface<B, C, T> {
        NotificationSurface::new(Arc::clone(&self.store), self.time.clone(), self.offset, bounds)
    }

    /// Keeps the store in step with login and logout until the provider
    /// is dropped.
    pub fn spawn_session_follower(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let sessions = self.sessions.subscribe();
        tokio::spawn(async move { store.follow(sessions).await })
    }
}
