use crate::ports::{BackendError, NotificationBackend, PushChannel, TimeProvider};
use crate::types::{
    ChannelEvent, Credential, Identity, NotificationId, NotificationRecord, Session,
};

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

pub(crate) fn record(id: i64, message: &str, is_read: bool) -> NotificationRecord {
    NotificationRecord {
        id: NotificationId(id),
        message: message.to_string(),
        timestamp: datetime!(2025-06-01 09:00 UTC),
        is_read,
    }
}

pub(crate) fn session(email: &str, token: &str) -> Session {
    Session {
        identity: Identity {
            email: email.to_string(),
            roles: ["Customer".to_string()].into_iter().collect(),
        },
        credential: Credential::new(token),
    }
}

pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

#[derive(Clone)]
pub(crate) struct FixedTime {
    now: Arc<Mutex<OffsetDateTime>>,
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl FixedTime {
    pub(crate) fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            slept: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn slept(&self) -> Vec<Duration> {
        self.slept.lock().expect("slept lock").clone()
    }
}

impl TimeProvider for FixedTime {
    type Sleep<'a>
        = std::future::Ready<()>
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("now lock")
    }

    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a> {
        self.slept.lock().expect("slept lock").push(duration);
        std::future::ready(())
    }
}

#[derive(Clone)]
pub(crate) struct FakeBackend {
    unread: Arc<Mutex<Result<Vec<NotificationRecord>, BackendError>>>,
    ack_error: Arc<Mutex<Option<BackendError>>>,
    backlog_gate: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
    ack_gate: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::with_unread(Vec::new())
    }
}

impl FakeBackend {
    pub(crate) fn with_unread(records: Vec<NotificationRecord>) -> Self {
        Self {
            unread: Arc::new(Mutex::new(Ok(records))),
            ack_error: Arc::new(Mutex::new(None)),
            backlog_gate: Arc::new(Mutex::new(None)),
            ack_gate: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn failing_unread(error: BackendError) -> Self {
        let backend = Self::default();
        *backend.unread.lock().expect("unread lock") = Err(error);
        backend
    }

    pub(crate) fn fail_acknowledgements(&self, error: BackendError) {
        *self.ack_error.lock().expect("ack error lock") = Some(error);
    }

    /// The next backlog fetch waits until the returned sender fires.
    pub(crate) fn hold_backlog(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.backlog_gate.lock().expect("gate lock") = Some(gate);
        release
    }

    /// The next read acknowledgement waits until the returned sender fires.
    pub(crate) fn hold_acknowledgement(&self) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        *self.ack_gate.lock().expect("gate lock") = Some(gate);
        release
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn ack(&self) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let gate = self.ack_gate.lock().expect("gate lock").take();
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            match self.ack_error.lock().expect("ack error lock").clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }
}

impl NotificationBackend for FakeBackend {
    type Unread<'a>
        = Pin<Box<dyn Future<Output = Result<Vec<NotificationRecord>, BackendError>> + Send + 'a>>
    where
        Self: 'a;
    type Ack<'a>
        = Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + 'a>>
    where
        Self: 'a;

    fn fetch_unread<'a>(&'a self, credential: &'a Credential) -> Self::Unread<'a> {
        self.log(format!("unread {}", credential.as_str()));
        let gate = self.backlog_gate.lock().expect("gate lock").take();
        Box::pin(async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.unread.lock().expect("unread lock").clone()
        })
    }

    fn mark_read<'a>(&'a self, credential: &'a Credential, id: NotificationId) -> Self::Ack<'a> {
        self.log(format!("read {id} {}", credential.as_str()));
        self.ack()
    }

    fn mark_all_read<'a>(&'a self, credential: &'a Credential) -> Self::Ack<'a> {
        self.log(format!("read-all {}", credential.as_str()));
        self.ack()
    }
}

pub(crate) struct OpenedChannel {
    credential: Credential,
    events: mpsc::Sender<ChannelEvent>,
    cancel: CancellationToken,
}

/// Push channel whose events are injected by the test.
#[derive(Clone, Default)]
pub(crate) struct FakeChannel {
    opened: Arc<Mutex<Vec<OpenedChannel>>>,
}

impl FakeChannel {
    pub(crate) fn open_count(&self) -> usize {
        self.opened.lock().expect("opened lock").len()
    }

    pub(crate) fn credentials(&self) -> Vec<String> {
        self.opened
            .lock()
            .expect("opened lock")
            .iter()
            .map(|opened| opened.credential.as_str().to_string())
            .collect()
    }

    pub(crate) fn cancelled(&self, index: usize) -> bool {
        self.opened
            .lock()
            .expect("opened lock")
            .get(index)
            .is_some_and(|opened| opened.cancel.is_cancelled())
    }

    pub(crate) async fn emit(&self, event: ChannelEvent) {
        self.emit_raw(event).await.expect("channel subscriber alive");
    }

    pub(crate) async fn emit_raw(
        &self,
        event: ChannelEvent,
    ) -> Result<(), mpsc::error::SendError<ChannelEvent>> {
        let events = self
            .opened
            .lock()
            .expect("opened lock")
            .last()
            .map(|opened| opened.events.clone())
            .expect("channel opened");
        events.send(event).await
    }
}

impl PushChannel for FakeChannel {
    fn open(
        &self,
        credential: Credential,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<ChannelEvent> {
        let (events, receiver) = mpsc::channel(16);
        self.opened.lock().expect("opened lock").push(OpenedChannel {
            credential,
            events,
            cancel,
        });
        receiver
    }
}
