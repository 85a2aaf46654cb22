use docfollow_engine::{FollowupEngine, ReminderScheduler};
use docfollow_persist::PersistenceClient;
use std::sync::Arc;

use crate::config::Config;

/// Shared application state passed to all handlers
///
/// Built once at startup. The engine owns the gateway, extractor, agent and
/// booker; the store and scheduler are exposed directly for reads and health.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub persist: Arc<dyn PersistenceClient>,
    pub scheduler: Arc<ReminderScheduler>,
    pub engine: FollowupEngine,
}

impl AppState {
    pub fn new(config: Config, engine: FollowupEngine) -> Self {
        Self {
            config: Arc::new(config),
            persist: engine.store().clone(),
            scheduler: engine.scheduler().clone(),
            engine,
        }
    }
}
