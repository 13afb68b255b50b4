use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};

/// Clock and timer seam; credential expiry, date grouping and reconnect
/// back-off all read time through it.
pub trait TimeProvider: Clone + Send + Sync + 'static {
    type Sleep<'a>: Future<Output = ()> + Send + 'a
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime;
    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a>;

    /// Current instant as seen on the reader's wall clock.
    fn now_at(&self, offset: UtcOffset) -> OffsetDateTime {
        self.now().to_offset(offset)
    }
}
