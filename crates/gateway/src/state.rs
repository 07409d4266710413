use std::sync::Arc;

use am_domain::config::Config;
use am_scheduler::ScheduleManager;
use am_store::{CatalogStore, ResultStore};

/// Shared application state passed to every API handler.
///
/// Grouped by concern the way the teacher's `AppState` is: core config,
/// then the durable stores, then the scheduling core's own handle. There is
/// no caching layer here — the catalog is small and queried rarely enough
/// that a cache would just be another thing that can go stale.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<dyn CatalogStore>,
    pub results: Arc<dyn ResultStore>,
    pub manager: Arc<ScheduleManager>,
}
