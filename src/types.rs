pub mod notification;
pub mod session;

pub use notification::{ChannelEvent, ChannelStatus, NotificationId, NotificationRecord};
pub use session::{Credential, Identity, Session};
