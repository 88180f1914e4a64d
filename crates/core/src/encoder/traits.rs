//! Trait definitions for the encoder module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::EncoderError;
use crate::plan::SessionPlan;

/// Snapshot of the currently supervised encoder process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderProcess {
    /// OS pid, absent once the process is gone.
    pub pid: Option<u32>,
    /// Full argument vector, program first.
    pub argv: Vec<String>,
    pub ingest_url: String,
    /// When the current process was spawned.
    pub started_at: DateTime<Utc>,
    /// Restarts performed in this session.
    pub restart_count: u32,
}

/// Starts encoder units for sessions.
#[async_trait]
pub trait EncoderSupervisor: Send + Sync {
    /// Returns the name of this supervisor implementation.
    fn name(&self) -> &str;

    /// Spawns the encoder for `plan`, publishing to `ingest_url`.
    ///
    /// Fails before spawning when the plan has no audio or the ingest URL is
    /// not a usable target.
    async fn start(
        &self,
        plan: &SessionPlan,
        ingest_url: &str,
    ) -> Result<Box<dyn SupervisedEncoder>, EncoderError>;

    /// Validates that the supervisor is properly configured and ready.
    async fn validate(&self) -> Result<(), EncoderError> {
        Ok(())
    }
}

/// One running encoder unit: the process and its companion tasks.
///
/// After `stop` returns, no process or task belonging to the unit remains.
#[async_trait]
pub trait SupervisedEncoder: Send {
    fn process(&self) -> EncoderProcess;

    /// Non-blocking liveness probe.
    async fn is_alive(&mut self) -> bool;

    /// Tears the current process down and spawns a fresh one with the same
    /// arguments.
    async fn restart(&mut self) -> Result<(), EncoderError>;

    /// Stops the unit. Calling it again is a no-op.
    async fn stop(&mut self) -> Result<(), EncoderError>;
}
