use crate::ports::{NotificationBackend, PushChannel, TimeProvider};
use crate::store::{NotificationStore, StoreState};
use crate::types::NotificationId;

mod grouping;

pub use grouping::{DateGroup, NotificationGroup, group_for, group_records};

use askama::Template;
use std::sync::Arc;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::debug;

const CLOCK: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");
const DATE_AND_CLOCK: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("failed to render notifications: {0}")]
    Render(#[from] askama::Error),
    #[error("failed to format timestamp: {0}")]
    Format(#[from] time::error::Format),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Screen rectangle the panel occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn contains(&self, point: Point) -> bool {
        let (x, y) = (i64::from(point.x), i64::from(point.y));
        let (left, top) = (i64::from(self.x), i64::from(self.y));
        x >= left
            && y >= top
            && x < left + i64::from(self.width)
            && y < top + i64::from(self.height)
    }
}

#[derive(Template)]
#[template(path = "panel.txt", escape = "none")]
struct PanelTemplate<'a> {
    unread: usize,
    status: String,
    banner: &'a str,
    open: bool,
    loading: bool,
    groups: Vec<GroupView>,
}

struct GroupView {
    label: &'static str,
    items: Vec<ItemView>,
}

struct ItemView {
    id: NotificationId,
    unread: bool,
    time: String,
    message: String,
}

/// Read-only view over the store plus the user intents it forwards.
pub struct NotificationSurface<B, C, T> {
    store: Arc<NotificationStore<B, C>>,
    time: T,
    offset: UtcOffset,
    bounds: Bounds,
    banner: Option<String>,
}

impl<B, C, T> NotificationSurface<B, C, T>
where
    B: NotificationBackend,
    C: PushChannel,
    T: TimeProvider,
{
    pub fn new(store: Arc<NotificationStore<B, C>>, time: T, offset: UtcOffset, bounds: Bounds) -> Self {
        Self {
            store,
            time,
            offset,
            bounds,
            banner: None,
        }
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.banner = None;
        self.store.clear_error();
    }

    pub async fn mark_read(&mut self, id: NotificationId) {
        match self.store.mark_as_read(id).await {
            Ok(()) => self.banner = None,
            Err(err) => self.banner = Some(format!("Could not mark #{id} as read: {err}")),
        }
    }

    pub async fn mark_all_read(&mut self) {
        match self.store.mark_all_as_read().await {
            Ok(()) => self.banner = None,
            Err(err) => self.banner = Some(format!("Could not mark notifications as read: {err}")),
        }
    }

    pub fn toggle(&self) {
        self.store.toggle_display();
    }

    /// Closes the open panel when the pointer lands outside it.
    pub fn pointer_down(&self, point: Point) -> bool {
        if !self.store.snapshot().display_open || self.bounds.contains(point) {
            return false;
        }
        debug!(x = point.x, y = point.y, "pointer outside notification panel");
        self.store.close_display();
        true
    }

    pub fn render(&self) -> Result<String, SurfaceError> {
        let state = self.store.snapshot();
        self.render_state(&state, self.time.now_at(self.offset))
    }

    fn render_state(&self, state: &StoreState, now: OffsetDateTime) -> Result<String, SurfaceError> {
        let banner = self
            .banner
            .as_deref()
            .or(state.last_error.as_deref())
            .unwrap_or_default();

        let mut groups = Vec::new();
        for group in group_records(&state.records, now, self.offset) {
            let format = match group.group {
                DateGroup::Today | DateGroup::Yesterday => CLOCK,
                DateGroup::Older => DATE_AND_CLOCK,
            };
            let mut items = Vec::with_capacity(group.records.len());
            for record in group.records {
                items.push(ItemView {
                    id: record.id,
                    unread: !record.is_read,
                    time: record.timestamp.to_offset(self.offset).format(format)?,
                    message: record.message.clone(),
                });
            }
            groups.push(GroupView {
                label: group.group.label(),
                items,
            });
        }

        let template = PanelTemplate {
            unread: state.unread_count(),
            status: state.status.to_string(),
            banner,
            open: state.display_open,
            loading: state.loading,
            groups,
        };
        Ok(template.render()?)
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use crate::ports::BackendError;
    use crate::test_support::{FakeBackend, FakeChannel, FixedTime, eventually, session};
    use crate::types::{ChannelEvent, NotificationRecord};
    use time::macros::datetime;

    const PANEL: Bounds = Bounds {
        x: 600,
        y: 40,
        width: 320,
        height: 480,
    };

    fn at(id: i64, message: &str, timestamp: OffsetDateTime, is_read: bool) -> NotificationRecord {
        NotificationRecord {
            id: NotificationId(id),
            message: message.to_string(),
            timestamp,
            is_read,
        }
    }

    async fn surface_with(
        backend: FakeBackend,
    ) -> (
        NotificationSurface<FakeBackend, FakeChannel, FixedTime>,
        Arc<NotificationStore<FakeBackend, FakeChannel>>,
        FakeChannel,
    ) {
        let channel = FakeChannel::default();
        let store = Arc::new(NotificationStore::new(backend, channel.clone()));
        store.start(&session("reader@bookhaven.test", "token-a")).await;
        eventually(|| channel.open_count() == 1).await;
        let surface = NotificationSurface::new(
            Arc::clone(&store),
            FixedTime::new(datetime!(2025-06-01 12:00 UTC)),
            UtcOffset::UTC,
            PANEL,
        );
        (surface, store, channel)
    }

    #[test]
    fn bounds__should_contain_only_inner_points() {
        assert!(PANEL.contains(Point { x: 600, y: 40 }));
        assert!(PANEL.contains(Point { x: 919, y: 519 }));
        assert!(!PANEL.contains(Point { x: 920, y: 100 }));
        assert!(!PANEL.contains(Point { x: 10, y: 10 }));
    }

    #[tokio::test]
    async fn render__should_group_and_mark_unread_records() {
        // Given
        let backend = FakeBackend::with_unread(vec![
            at(1, "Order #17 shipped", datetime!(2025-06-01 09:30 UTC), false),
            at(2, "Wishlist item back in stock", datetime!(2025-05-31 18:05 UTC), true),
            at(3, "Welcome to BookHaven", datetime!(2025-05-02 08:00 UTC), false),
        ]);
        let (surface, store, _channel) = surface_with(backend).await;
        store.toggle_display();

        // When
        let rendered = surface.render().expect("render");

        // Then
        assert!(rendered.starts_with("BookHaven notifications [2 unread] (connecting)"));
        assert!(rendered.contains("Today\n  * #1 09:30  Order #17 shipped"));
        assert!(rendered.contains("Yesterday\n    #2 18:05  Wishlist item back in stock"));
        assert!(rendered.contains("Older\n  * #3 2025-05-02 08:00  Welcome to BookHaven"));
        let today = rendered.find("Today").expect("today");
        let older = rendered.find("Older").expect("older");
        assert!(today < older);
    }

    #[tokio::test]
    async fn render__should_hide_records_when_display_closed() {
        let backend = FakeBackend::with_unread(vec![at(1, "Hello", datetime!(2025-06-01 09:30 UTC), false)]);
        let (surface, _store, _channel) = surface_with(backend).await;

        let rendered = surface.render().expect("render");

        assert!(rendered.contains("[1 unread]"));
        assert!(rendered.contains("(hidden)"));
        assert!(!rendered.contains("Hello"));
    }

    #[tokio::test]
    async fn pointer_down__should_close_only_when_outside_open_panel() {
        // Given
        let (surface, store, channel) = surface_with(FakeBackend::default()).await;
        channel
            .emit(ChannelEvent::Notification(at(
                3,
                "order shipped",
                datetime!(2025-06-01 11:00 UTC),
                false,
            )))
            .await;
        eventually(|| store.snapshot().display_open).await;

        // When
        let inside = surface.pointer_down(Point { x: 700, y: 100 });
        let outside = surface.pointer_down(Point { x: 5, y: 5 });
        let again = surface.pointer_down(Point { x: 5, y: 5 });

        // Then
        assert!(!inside);
        assert!(outside);
        assert!(!again);
        assert!(!store.snapshot().display_open);
    }

    #[tokio::test]
    async fn mark_read__should_show_banner_on_failure() {
        // Given
        let backend = FakeBackend::with_unread(vec![at(1, "Hello", datetime!(2025-06-01 09:30 UTC), false)]);
        backend.fail_acknowledgements(BackendError::Transport("timed out".to_string()));
        let (mut surface, store, _channel) = surface_with(backend).await;

        // When
        surface.mark_read(NotificationId(1)).await;

        // Then
        let banner = surface.banner().expect("banner");
        assert!(banner.contains("#1"));
        assert!(banner.contains("timed out"));
        assert_eq!(store.unread_count(), 1);
        assert!(surface.render().expect("render").contains("! Could not mark #1"));

        surface.dismiss_banner();
        assert!(surface.banner().is_none());
    }

    #[tokio::test]
    async fn mark_all_read__should_forward_to_store() {
        let backend = FakeBackend::with_unread(vec![
            at(1, "Hello", datetime!(2025-06-01 09:30 UTC), false),
            at(2, "Again", datetime!(2025-06-01 10:30 UTC), false),
        ]);
        let (mut surface, store, _channel) = surface_with(backend.clone()).await;

        surface.mark_all_read().await;

        assert_eq!(store.unread_count(), 0);
        assert!(surface.banner().is_none());
        assert!(backend.calls().contains(&"read-all token-a".to_string()));
    }

    #[tokio::test]
    async fn render__should_show_loading_until_backlog_arrives() {
        // Given
        let backend = FakeBackend::default();
        let release = backend.hold_backlog();
        let channel = FakeChannel::default();
        let store = Arc::new(NotificationStore::new(backend, channel.clone()));
        store.start(&session("reader@bookhaven.test", "token-a")).await;
        store.toggle_display();
        let surface = NotificationSurface::new(
            Arc::clone(&store),
            FixedTime::new(datetime!(2025-06-01 12:00 UTC)),
            UtcOffset::UTC,
            PANEL,
        );

        // When
        let while_loading = surface.render().expect("render");
        release.send(()).expect("release backlog");
        eventually(|| channel.open_count() == 1).await;
        let loaded = surface.render().expect("render");

        // Then
        assert!(while_loading.contains("Loading notifications..."));
        assert!(loaded.contains("No notifications yet."));
    }

    #[tokio::test]
    async fn toggle__should_flip_display() {
        let (surface, store, _channel) = surface_with(FakeBackend::default()).await;

        surface.toggle();

        assert!(store.snapshot().display_open);
    }
}
