use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::{ChannelEvent, Credential};

/// Live subscription delivering newly created notifications.
///
/// Implementations own their reconnect policy. Once `cancel` fires the
/// connection must be released and the returned receiver closed.
pub trait PushChannel: Clone + Send + Sync + 'static {
    fn open(&self, credential: Credential, cancel: CancellationToken)
    -> mpsc::Receiver<ChannelEvent>;
}
