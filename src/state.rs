//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::db::PgStore;
use crate::report::ChangeReporter;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState<S = PgStore> {
    /// Change reporter over the backing store
    pub reporter: ChangeReporter<S>,

    /// Lookback used when a request has no usable `daysBack`
    pub default_days_back: f64,
}

impl<S> AppState<S> {
    pub fn new(reporter: ChangeReporter<S>, default_days_back: f64) -> Self {
        Self {
            reporter,
            default_days_back,
        }
    }
}

/// Type alias for shared state
pub type SharedState<S = PgStore> = Arc<AppState<S>>;
