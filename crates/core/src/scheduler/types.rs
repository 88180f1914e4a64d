//! Types for the session scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::encoder::EncoderError;
use crate::lifecycle::{BroadcastState, LifecycleError};
use crate::media::FetchError;

/// Errors that end a cycle or a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No usable visual or audio asset.
    #[error("asset pool is empty")]
    EmptyPool,

    /// Asset source error.
    #[error("asset source error: {0}")]
    Assets(#[from] FetchError),

    /// Broadcast lifecycle error.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Encoder error.
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// The session task panicked.
    #[error("session panicked: {0}")]
    Panicked(String),
}

/// Phase of the scheduler's cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    #[default]
    Idle,
    Preparing,
    Running,
    Cooldown,
}

impl CycleState {
    /// Value exported on the cycle-state gauge.
    pub fn metric_code(&self) -> i64 {
        match self {
            CycleState::Idle => 0,
            CycleState::Preparing => 1,
            CycleState::Running => 2,
            CycleState::Cooldown => 3,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum SessionOutcome {
    Completed,
    Failed(String),
    /// Interrupted by shutdown.
    Cancelled,
}

impl SessionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::Failed(_) => "failed",
            SessionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Live view of the running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub title: String,
    pub planned_start: DateTime<Utc>,
    pub broadcast_id: Option<String>,
    pub broadcast_state: Option<BroadcastState>,
    pub encoder_pid: Option<u32>,
    pub restart_count: u32,
}

/// Result of one finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub outcome: SessionOutcome,
    pub broadcast_state: Option<BroadcastState>,
    pub restart_count: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Current status of the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Whether the scheduler loop is running.
    pub running: bool,
    pub cycle_state: CycleState,
    /// Cycles entered since start.
    pub cycles: u64,
    pub sessions_completed: u64,
    pub sessions_failed: u64,
    pub current_session: Option<SessionSummary>,
    pub last_report: Option<SessionReport>,
    pub last_error: Option<String>,
    /// When the next cycle starts, while cooling down.
    pub next_cycle_at: Option<DateTime<Utc>>,
}
