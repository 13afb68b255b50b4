pub mod backend;
pub mod channel;
pub mod storage;
pub mod time;

pub use backend::{BackendError, NotificationBackend};
pub use channel::PushChannel;
pub use storage::{CredentialStorage, StorageError};
pub use self::time::TimeProvider;
