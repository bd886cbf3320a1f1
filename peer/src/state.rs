//! Shared application state.

use std::sync::{Arc, Mutex};

use crate::manager::ChainManager;
use crate::metrics::MetricsRegistry;

/// State shared between request handlers and background tasks.
///
/// The manager sits behind a `std::sync::Mutex` rather than an async one:
/// it is only ever locked on blocking worker threads (the endpoint routes
/// all go through one helper for this), never across an await point, and
/// its embedded HTTP client is blocking anyway.
pub struct AppState {
    /// This replica's chain and peer set.
    pub manager: Mutex<ChainManager>,
    /// Metrics registry shared with the exposition route.
    pub metrics: Arc<MetricsRegistry>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
