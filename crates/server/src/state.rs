use std::sync::Arc;

use airloop_core::{Config, SanitizedConfig, SchedulerStatus, SessionScheduler};
use chrono::{DateTime, Utc};

/// Shared application state
pub struct AppState {
    config: Config,
    scheduler: Option<Arc<SessionScheduler>>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, scheduler: Option<Arc<SessionScheduler>>) -> Self {
        Self {
            config,
            scheduler,
            started_at: Utc::now(),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn scheduler(&self) -> Option<&Arc<SessionScheduler>> {
        self.scheduler.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Scheduler status, or an idle default when no scheduler is wired.
    pub async fn scheduler_status(&self) -> SchedulerStatus {
        match &self.scheduler {
            Some(scheduler) => scheduler.status().await,
            None => SchedulerStatus::default(),
        }
    }
}
