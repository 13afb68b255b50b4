pub mod adapters;
pub mod app;
pub mod config;
pub mod console;
pub mod ports;
pub mod session;
pub mod store;
pub mod surface;
pub mod types;

#[cfg(test)]
mod test_support;

pub use app::{App, AppError, LiveApp};
pub use store::{NotificationStore, StoreError, StoreState};
pub use surface::NotificationSurface;
