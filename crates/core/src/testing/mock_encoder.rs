//! Mock encoder supervisor for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::encoder::{
    build_args, validate_ingest_url, AudioInput, EncoderConfig, EncoderError, EncoderInputs,
    EncoderProcess, EncoderSupervisor, SupervisedEncoder,
};
use crate::plan::SessionPlan;

/// Shared state between the supervisor and the units it hands out.
#[derive(Debug, Default)]
struct MockEncoderState {
    /// Argument vectors of every spawn, restarts included.
    spawned_argvs: Vec<Vec<String>>,
    /// Liveness probes seen across all units.
    probes: u32,
    /// 1-based probe numbers at which the current process dies.
    crash_on: HashSet<u32>,
    /// Every probe reports a dead process.
    always_dead: bool,
    /// If set, the next start fails with this error.
    next_error: Option<EncoderError>,
    /// The next start panics.
    panic_on_start: bool,
    /// Units started and not yet stopped.
    active_units: u32,
    stops: u32,
    next_pid: u32,
}

impl MockEncoderState {
    fn spawn(&mut self, argv: &[String]) -> u32 {
        self.spawned_argvs.push(argv.to_vec());
        self.next_pid += 1;
        10_000 + self.next_pid
    }
}

/// Mock implementation of the EncoderSupervisor trait.
///
/// No process is spawned. Units are alive until a scripted crash, and every
/// spawn records the argument vector a real encoder would have received.
///
/// # Example
///
/// ```rust,ignore
/// use airloop_core::testing::{fixtures, MockEncoderSupervisor};
///
/// let supervisor = MockEncoderSupervisor::new();
/// supervisor.crash_on_probes(&[3]).await;
///
/// let mut encoder = supervisor.start(&plan, fixtures::INGEST_URL).await?;
/// // ... run keep-alive ...
/// assert_eq!(supervisor.spawn_count().await, 2);
/// ```
#[derive(Debug)]
pub struct MockEncoderSupervisor {
    config: EncoderConfig,
    state: Arc<RwLock<MockEncoderState>>,
}

impl Default for MockEncoderSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoderSupervisor {
    /// Create a new mock supervisor with the default encoder settings.
    pub fn new() -> Self {
        Self::with_config(EncoderConfig::default())
    }

    /// Create a mock supervisor rendering arguments from `config`.
    pub fn with_config(config: EncoderConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(MockEncoderState::default())),
        }
    }

    /// Make the current process die at the given (1-based) probe numbers,
    /// counted across all units.
    pub async fn crash_on_probes(&self, probes: &[u32]) {
        self.state.write().await.crash_on = probes.iter().copied().collect();
    }

    /// Make every probe report a dead process.
    pub async fn set_always_dead(&self, dead: bool) {
        self.state.write().await.always_dead = dead;
    }

    /// Make the next start fail.
    pub async fn set_next_error(&self, error: EncoderError) {
        self.state.write().await.next_error = Some(error);
    }

    /// Make the next start panic.
    pub async fn set_panic_on_start(&self, panic: bool) {
        self.state.write().await.panic_on_start = panic;
    }

    /// Total spawns, restarts included.
    pub async fn spawn_count(&self) -> usize {
        self.state.read().await.spawned_argvs.len()
    }

    /// Argument vectors of every spawn.
    pub async fn spawned_argvs(&self) -> Vec<Vec<String>> {
        self.state.read().await.spawned_argvs.clone()
    }

    /// Liveness probes seen so far.
    pub async fn probe_count(&self) -> u32 {
        self.state.read().await.probes
    }

    /// Units started and not yet stopped.
    pub async fn active_units(&self) -> u32 {
        self.state.read().await.active_units
    }

    /// Number of units stopped.
    pub async fn stop_count(&self) -> u32 {
        self.state.read().await.stops
    }
}

#[async_trait]
impl EncoderSupervisor for MockEncoderSupervisor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(
        &self,
        plan: &SessionPlan,
        ingest_url: &str,
    ) -> Result<Box<dyn SupervisedEncoder>, EncoderError> {
        let mut state = self.state.write().await;

        if state.panic_on_start {
            state.panic_on_start = false;
            drop(state);
            panic!("mock encoder panicked on start");
        }
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }
        if plan.audio_queue.is_empty() {
            return Err(EncoderError::EmptyAudioQueue);
        }
        validate_ingest_url(ingest_url)?;

        let inputs = EncoderInputs {
            visual: plan.visual.local_path.clone(),
            visual_kind: plan.visual.kind,
            audio: AudioInput::Playlist(mock_playlist_path(&self.config, plan)),
        };
        let mut argv = vec![self.config.ffmpeg_path.display().to_string()];
        argv.extend(build_args(&self.config, &inputs, ingest_url));

        let pid = state.spawn(&argv);
        state.active_units += 1;

        Ok(Box::new(MockEncoder {
            state: self.state.clone(),
            process: EncoderProcess {
                pid: Some(pid),
                argv,
                ingest_url: ingest_url.to_string(),
                started_at: Utc::now(),
                restart_count: 0,
            },
            alive: true,
            stopped: false,
        }))
    }
}

/// A unit handed out by [`MockEncoderSupervisor`].
#[derive(Debug)]
pub struct MockEncoder {
    state: Arc<RwLock<MockEncoderState>>,
    process: EncoderProcess,
    alive: bool,
    stopped: bool,
}

#[async_trait]
impl SupervisedEncoder for MockEncoder {
    fn process(&self) -> EncoderProcess {
        self.process.clone()
    }

    async fn is_alive(&mut self) -> bool {
        if self.stopped {
            return false;
        }

        let mut state = self.state.write().await;
        state.probes += 1;
        if state.always_dead || state.crash_on.contains(&state.probes) {
            self.alive = false;
        }
        self.alive
    }

    async fn restart(&mut self) -> Result<(), EncoderError> {
        if self.stopped {
            return Err(EncoderError::Stopped);
        }

        let pid = self.state.write().await.spawn(&self.process.argv);
        self.process.pid = Some(pid);
        self.process.started_at = Utc::now();
        self.process.restart_count += 1;
        self.alive = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EncoderError> {
        if self.stopped {
            return Ok(());
        }

        self.stopped = true;
        self.alive = false;
        self.process.pid = None;

        let mut state = self.state.write().await;
        state.active_units = state.active_units.saturating_sub(1);
        state.stops += 1;
        Ok(())
    }
}

/// Path the mock supervisor renders for a session's playlist.
pub fn mock_playlist_path(config: &EncoderConfig, plan: &SessionPlan) -> PathBuf {
    config
        .work_dir
        .join(plan.id.simple().to_string())
        .join("playlist.txt")
}
