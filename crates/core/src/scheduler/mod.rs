//! Session scheduler: the top-level cycle controller.
//!
//! Each cycle picks assets, runs one session (broadcast and encoder
//! together) as an independent task, then cools down before the next cycle.
//! Failures anywhere in a cycle are caught here and turn into a flat backoff;
//! the loop itself only ends on shutdown.

mod config;
mod planner;
mod runner;
mod session;
mod types;

pub use config::SchedulerConfig;
pub use planner::{build_audio_queue, categorize, generate_title, Category, SessionPlanner};
pub use runner::SessionScheduler;
pub use session::{run_session, SessionContext};
pub use types::{
    CycleState, SchedulerStatus, SessionError, SessionOutcome, SessionReport, SessionSummary,
};
