use super::{StoreState, apply};
use crate::ports::{BackendError, NotificationBackend, PushChannel};
use crate::types::{ChannelEvent, ChannelStatus, Credential, NotificationRecord};

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives one identity session: backlog first, then the live channel.
pub(super) struct SessionWorker<B, C> {
    pub(super) epoch: u64,
    pub(super) credential: Credential,
    pub(super) backend: B,
    pub(super) channel: C,
    pub(super) state: Arc<watch::Sender<StoreState>>,
    pub(super) cancel: CancellationToken,
}

impl<B, C> SessionWorker<B, C>
where
    B: NotificationBackend,
    C: PushChannel,
{
    pub(super) async fn run(self) {
        let backlog = tokio::select! {
            _ = self.cancel.cancelled() => return,
            backlog = self.backend.fetch_unread(&self.credential) => backlog,
        };
        apply_backlog(&self.state, self.epoch, backlog);

        if self.cancel.is_cancelled() {
            return;
        }

        let mut events = self
            .channel
            .open(self.credential.clone(), self.cancel.clone());
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                debug!("push channel ended");
                apply(&self.state, self.epoch, |state| {
                    set_status(state, ChannelStatus::ClosedOnError)
                });
                return;
            };
            if !self.handle(event) {
                return;
            }
        }
    }

    fn handle(&self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Connected => {
                apply(&self.state, self.epoch, |state| {
                    set_status(state, ChannelStatus::Open)
                });
                true
            }
            ChannelEvent::Notification(record) => {
                apply(&self.state, self.epoch, |state| {
                    append_pushed(state, record)
                });
                true
            }
            ChannelEvent::Reconnecting { reason } => {
                debug!(%reason, "push channel reconnecting");
                apply(&self.state, self.epoch, |state| {
                    set_status(state, ChannelStatus::Connecting)
                });
                true
            }
            ChannelEvent::Failed { reason } => {
                apply(&self.state, self.epoch, |state| {
                    state.status = ChannelStatus::ClosedOnError;
                    state.last_error = Some(format!("Live updates unavailable: {reason}"));
                    true
                });
                false
            }
        }
    }
}

/// Merges a backlog result into the session's state and ends loading.
pub(super) fn apply_backlog(
    state: &watch::Sender<StoreState>,
    epoch: u64,
    backlog: Result<Vec<NotificationRecord>, BackendError>,
) {
    match backlog {
        Ok(records) => {
            info!(count = records.len(), "notification backlog loaded");
            apply(state, epoch, |state| {
                merge_backlog(&mut state.records, records);
                state.loading = false;
                true
            });
        }
        Err(err) => {
            warn!(error = %err, "failed to fetch notification backlog");
            apply(state, epoch, |state| {
                state.last_error = Some(format!("Could not load notifications: {err}"));
                state.loading = false;
                true
            });
        }
    }
}

fn set_status(state: &mut StoreState, status: ChannelStatus) -> bool {
    if state.status == status {
        return false;
    }
    state.status = status;
    true
}

fn merge_backlog(records: &mut Vec<NotificationRecord>, backlog: Vec<NotificationRecord>) {
    for record in backlog {
        if !records.iter().any(|existing| existing.id == record.id) {
            records.push(record);
        }
    }
}

/// New arrivals reveal the display; a repeated id changes nothing.
fn append_pushed(state: &mut StoreState, record: NotificationRecord) -> bool {
    if state.records.iter().any(|existing| existing.id == record.id) {
        debug!(id = %record.id, "dropping duplicate push notification");
        return false;
    }
    state.records.push(record);
    state.display_open = true;
    true
}
