use crate::ports::{BackendError, NotificationBackend, PushChannel};
use crate::types::{ChannelStatus, Credential, NotificationId, NotificationRecord, Session};

mod worker;

use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use worker::{SessionWorker, apply_backlog};

/// Everything the surface is allowed to see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    pub records: Vec<NotificationRecord>,
    pub display_open: bool,
    pub status: ChannelStatus,
    /// True until the session's backlog fetch has resolved.
    pub loading: bool,
    pub last_error: Option<String>,
    epoch: u64,
}

impl StoreState {
    pub fn unread_count(&self) -> usize {
        self.records.iter().filter(|record| !record.is_read).count()
    }

    pub fn record(&self, id: NotificationId) -> Option<&NotificationRecord> {
        self.records.iter().find(|record| record.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not signed in")]
    SignedOut,
    #[error("notification {0} is not in the list")]
    UnknownNotification(NotificationId),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

struct ActiveSession {
    epoch: u64,
    credential: Credential,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Single owner of the notification list and the live channel.
///
/// State is published through a watch channel; every asynchronous completion
/// carries the epoch of the session that issued it and is dropped once that
/// session has ended.
pub struct NotificationStore<B, C> {
    backend: B,
    channel: C,
    state: Arc<watch::Sender<StoreState>>,
    active: Mutex<Option<ActiveSession>>,
}

impl<B, C> NotificationStore<B, C>
where
    B: NotificationBackend,
    C: PushChannel,
{
    pub fn new(backend: B, channel: C) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            backend,
            channel,
            state: Arc::new(state),
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count()
    }

    pub fn status(&self) -> ChannelStatus {
        self.state.borrow().status
    }

    /// Tracks the provider's session feed until it closes.
    pub async fn follow(&self, mut sessions: watch::Receiver<Option<Session>>) {
        loop {
            let session = sessions.borrow_and_update().clone();
            match session {
                Some(session) if self.active_credential().as_ref() != Some(&session.credential) => {
                    self.start(&session).await;
                }
                Some(_) => {}
                None => self.stop().await,
            }
            if sessions.changed().await.is_err() {
                break;
            }
        }
        self.stop().await;
    }

    /// Closed → Connecting: fetch the backlog, then open the channel.
    pub async fn start(&self, session: &Session) {
        self.stop().await;

        let mut epoch = 0;
        self.state.send_modify(|state| {
            state.epoch += 1;
            state.records.clear();
            state.status = ChannelStatus::Connecting;
            state.loading = true;
            state.last_error = None;
            epoch = state.epoch;
        });

        let cancel = CancellationToken::new();
        let worker = SessionWorker {
            epoch,
            credential: session.credential.clone(),
            backend: self.backend.clone(),
            channel: self.channel.clone(),
            state: Arc::clone(&self.state),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());
        info!(email = %session.identity.email, epoch, "notification session started");

        let mut active = self.active.lock().expect("active session lock");
        *active = Some(ActiveSession {
            epoch,
            credential: session.credential.clone(),
            cancel,
            task,
        });
    }

    /// Replaces the records with `session`'s backlog without opening the
    /// live channel.
    pub async fn load_backlog(&self, session: &Session) -> Result<usize, StoreError> {
        self.stop().await;

        let mut epoch = 0;
        self.state.send_modify(|state| {
            state.epoch += 1;
            state.records.clear();
            state.loading = true;
            state.last_error = None;
            epoch = state.epoch;
        });

        let backlog = self.backend.fetch_unread(&session.credential).await;
        let outcome = match &backlog {
            Ok(records) => Ok(records.len()),
            Err(err) => Err(StoreError::Backend(err.clone())),
        };
        apply_backlog(&self.state, epoch, backlog);
        outcome
    }

    /// any → Closed: release the channel and forget the session's records.
    pub async fn stop(&self) {
        let active = self.active.lock().expect("active session lock").take();
        let Some(active) = active else {
            return;
        };

        active.cancel.cancel();
        if let Err(err) = active.task.await
            && err.is_panic()
        {
            warn!(error = %err, "notification session task panicked");
        }

        self.state.send_modify(|state| {
            state.epoch += 1;
            state.records.clear();
            state.display_open = false;
            state.status = ChannelStatus::Closed;
            state.loading = false;
            state.last_error = None;
        });
        info!(epoch = active.epoch, "notification session closed");
    }

    pub async fn mark_as_read(&self, id: NotificationId) -> Result<(), StoreError> {
        let (epoch, credential) = self.current()?;
        let already_read = self.state.borrow().record(id).map(|record| record.is_read);
        match already_read {
            None => return Err(StoreError::UnknownNotification(id)),
            Some(true) => return Ok(()),
            Some(false) => {}
        }

        if let Err(err) = self.backend.mark_read(&credential, id).await {
            warn!(error = %err, %id, "failed to mark notification read");
            return Err(err.into());
        }

        let applied = apply(&self.state, epoch, |state| {
            match state.records.iter_mut().find(|record| record.id == id) {
                Some(record) if !record.is_read => {
                    record.is_read = true;
                    true
                }
                _ => false,
            }
        });
        if !applied {
            debug!(%id, "read acknowledgement arrived after state moved on");
        }
        Ok(())
    }

    pub async fn mark_all_as_read(&self) -> Result<(), StoreError> {
        let (epoch, credential) = self.current()?;

        if let Err(err) = self.backend.mark_all_read(&credential).await {
            warn!(error = %err, "failed to mark all notifications read");
            return Err(err.into());
        }

        apply(&self.state, epoch, |state| {
            let mut changed = false;
            for record in state.records.iter_mut().filter(|record| !record.is_read) {
                record.is_read = true;
                changed = true;
            }
            changed
        });
        Ok(())
    }

    pub fn toggle_display(&self) {
        self.state.send_modify(|state| state.display_open = !state.display_open);
    }

    pub fn close_display(&self) {
        self.state.send_if_modified(|state| {
            let was_open = state.display_open;
            state.display_open = false;
            was_open
        });
    }

    pub fn clear_error(&self) {
        self.state
            .send_if_modified(|state| state.last_error.take().is_some());
    }

    fn current(&self) -> Result<(u64, Credential), StoreError> {
        let active = self.active.lock().expect("active session lock");
        active
            .as_ref()
            .map(|active| (active.epoch, active.credential.clone()))
            .ok_or(StoreError::SignedOut)
    }

    fn active_credential(&self) -> Option<Credential> {
        self.active
            .lock()
            .expect("active session lock")
            .as_ref()
            .map(|active| active.credential.clone())
    }
}

/// Applies `update` only while `epoch` is still the current session.
fn apply(
    state: &watch::Sender<StoreState>,
    epoch: u64,
    update: impl FnOnce(&mut StoreState) -> bool,
) -> bool {
    state.send_if_modified(|state| state.epoch == epoch && update(state))
}
