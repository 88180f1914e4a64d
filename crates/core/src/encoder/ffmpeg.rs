//! FFmpeg-based encoder supervisor.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use regex_lite::Regex;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::args::{build_args, redact_ingest_url, render_playlist, validate_ingest_url};
use super::args::{AudioInput, EncoderInputs};
use super::config::{AudioFeed, EncoderConfig};
use super::error::EncoderError;
use super::feeder::{create_fifo, feed_fifo, unblock_fifo};
use super::traits::{EncoderProcess, EncoderSupervisor, SupervisedEncoder};
use crate::metrics;
use crate::plan::SessionPlan;

/// How long companion tasks get to finish after the process is gone.
const TASK_GRACE: Duration = Duration::from_secs(2);

/// Supervisor spawning one ffmpeg process per session.
pub struct FfmpegSupervisor {
    config: EncoderConfig,
}

impl FfmpegSupervisor {
    /// Creates a new supervisor with the given configuration.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Writes the per-session audio input and returns how ffmpeg should read it.
    async fn prepare_audio(
        &self,
        session_dir: &std::path::Path,
        tracks: &[PathBuf],
    ) -> Result<AudioInput, EncoderError> {
        match self.config.audio_feed {
            AudioFeed::Playlist => {
                let path = session_dir.join("playlist.txt");
                tokio::fs::write(&path, render_playlist(tracks))
                    .await
                    .map_err(|e| EncoderError::session_file(&path, e))?;
                Ok(AudioInput::Playlist(path))
            }
            AudioFeed::Pipe => {
                let path = session_dir.join("audio.fifo");
                create_fifo(&path).map_err(|e| EncoderError::session_file(&path, e))?;
                Ok(AudioInput::Pipe(path))
            }
        }
    }
}

#[async_trait]
impl EncoderSupervisor for FfmpegSupervisor {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn start(
        &self,
        plan: &SessionPlan,
        ingest_url: &str,
    ) -> Result<Box<dyn SupervisedEncoder>, EncoderError> {
        if plan.audio_queue.is_empty() {
            return Err(EncoderError::EmptyAudioQueue);
        }
        validate_ingest_url(ingest_url)?;

        let session_dir = self.config.work_dir.join(plan.id.simple().to_string());
        tokio::fs::create_dir_all(&session_dir)
            .await
            .map_err(|e| EncoderError::session_file(&session_dir, e))?;

        let tracks: Vec<PathBuf> = plan
            .audio_queue
            .iter()
            .map(|a| a.local_path.clone())
            .collect();

        let audio = match self.prepare_audio(&session_dir, &tracks).await {
            Ok(audio) => audio,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&session_dir).await;
                return Err(e);
            }
        };
        let fifo = match &audio {
            AudioInput::Pipe(path) => Some(path.clone()),
            AudioInput::Playlist(_) => None,
        };

        let inputs = EncoderInputs {
            visual: plan.visual.local_path.clone(),
            visual_kind: plan.visual.kind,
            audio,
        };
        let args = build_args(&self.config, &inputs, ingest_url);

        let mut encoder = FfmpegEncoder {
            config: self.config.clone(),
            session: plan.short_id(),
            session_dir,
            args,
            ingest_url: ingest_url.to_string(),
            fifo,
            queue: tracks,
            cursor: Arc::new(AtomicUsize::new(0)),
            child: None,
            feeder: None,
            drain: None,
            started_at: Utc::now(),
            restart_count: 0,
            state: UnitState::Idle,
        };

        if let Err(e) = encoder.spawn() {
            let _ = encoder.stop().await;
            return Err(e);
        }

        Ok(Box::new(encoder))
    }

    async fn validate(&self) -> Result<(), EncoderError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => Ok(()),
            _ => Err(EncoderError::BinaryNotFound {
                path: self.config.ffmpeg_path.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitState {
    Idle,
    Running,
    Stopped,
}

/// A running ffmpeg process together with its stderr drain and, in pipe
/// mode, its audio feeder.
pub struct FfmpegEncoder {
    config: EncoderConfig,
    session: String,
    session_dir: PathBuf,
    args: Vec<String>,
    ingest_url: String,
    fifo: Option<PathBuf>,
    queue: Vec<PathBuf>,
    /// Shared with every feeder of this unit.
    cursor: Arc<AtomicUsize>,
    child: Option<Child>,
    feeder: Option<JoinHandle<io::Result<()>>>,
    drain: Option<JoinHandle<()>>,
    started_at: DateTime<Utc>,
    restart_count: u32,
    state: UnitState,
}

impl FfmpegEncoder {
    fn spawn(&mut self) -> Result<(), EncoderError> {
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    EncoderError::BinaryNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EncoderError::SpawnFailed(e.to_string())
                }
            })?;

        if let Some(stderr) = child.stderr.take() {
            self.drain = Some(tokio::spawn(drain_stderr(stderr, self.session.clone())));
        }

        if let Some(fifo) = &self.fifo {
            self.feeder = Some(tokio::spawn(feed_fifo(
                fifo.clone(),
                self.queue.clone(),
                self.cursor.clone(),
            )));
        }

        info!(
            session = %self.session,
            pid = ?child.id(),
            ingest = %redact_ingest_url(&self.ingest_url),
            restart_count = self.restart_count,
            "Encoder spawned"
        );

        self.child = Some(child);
        self.started_at = Utc::now();
        self.state = UnitState::Running;
        metrics::ENCODER_SPAWNS.inc();
        Ok(())
    }

    /// Stops the process and its companion tasks, leaving files in place.
    async fn teardown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if terminate(&mut child, self.config.stop_timeout()).await {
                warn!(session = %self.session, "Encoder ignored SIGTERM, killed");
            }
        }

        if let Some(mut feeder) = self.feeder.take() {
            feeder.abort();
            if let Some(fifo) = &self.fifo {
                unblock_fifo(fifo);
            }
            if let Ok(Ok(Err(e))) = timeout(TASK_GRACE, &mut feeder).await {
                debug!(session = %self.session, error = %e, "Audio feeder ended with error");
            }
        }

        if let Some(mut drain) = self.drain.take() {
            if timeout(TASK_GRACE, &mut drain).await.is_err() {
                drain.abort();
            }
        }
    }
}

#[async_trait]
impl SupervisedEncoder for FfmpegEncoder {
    fn process(&self) -> EncoderProcess {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.config.ffmpeg_path.to_string_lossy().to_string());
        argv.extend(self.args.iter().cloned());

        EncoderProcess {
            pid: self.child.as_ref().and_then(|c| c.id()),
            argv,
            ingest_url: self.ingest_url.clone(),
            started_at: self.started_at,
            restart_count: self.restart_count,
        }
    }

    async fn is_alive(&mut self) -> bool {
        if self.state != UnitState::Running {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!(session = %self.session, %status, "Encoder exited");
                false
            }
            Err(e) => {
                warn!(session = %self.session, error = %e, "Encoder liveness probe failed");
                false
            }
        }
    }

    async fn restart(&mut self) -> Result<(), EncoderError> {
        if self.state == UnitState::Stopped {
            return Err(EncoderError::Stopped);
        }

        self.teardown().await;

        if let Some(fifo) = &self.fifo {
            create_fifo(fifo).map_err(|e| EncoderError::session_file(fifo, e))?;
        }

        self.restart_count += 1;
        metrics::ENCODER_RESTARTS.inc();
        self.spawn()
    }

    async fn stop(&mut self) -> Result<(), EncoderError> {
        if self.state == UnitState::Stopped {
            return Ok(());
        }

        self.teardown().await;
        self.state = UnitState::Stopped;

        match tokio::fs::remove_dir_all(&self.session_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    session = %self.session,
                    dir = %self.session_dir.display(),
                    error = %e,
                    "Failed to remove session directory"
                );
            }
        }

        info!(
            session = %self.session,
            restarts = self.restart_count,
            "Encoder stopped"
        );
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if self.state == UnitState::Stopped {
            return;
        }
        // The child itself is killed on drop.
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
            if let Some(fifo) = &self.fifo {
                unblock_fifo(fifo);
            }
        }
        if let Some(drain) = self.drain.take() {
            drain.abort();
        }
        let _ = std::fs::remove_dir_all(&self.session_dir);
    }
}

/// SIGTERM, then wait up to `grace`, then SIGKILL. Returns true when the
/// process had to be killed.
async fn terminate(child: &mut Child, grace: Duration) -> bool {
    if let Ok(Some(_)) = child.try_wait() {
        return false;
    }

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            debug!(pid, error = %e, "SIGTERM failed");
        }
    }

    match timeout(grace, child.wait()).await {
        Ok(_) => false,
        Err(_) => {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill encoder");
            }
            metrics::ENCODER_FORCE_KILLS.inc();
            true
        }
    }
}

/// Forwards ffmpeg's stderr into the log until the pipe closes.
async fn drain_stderr(stderr: ChildStderr, session: String) {
    let problem = Regex::new(
        r"(?i)(error|failed|invalid|refused|broken pipe|timed out|connection reset|i/o error)",
    )
    .ok();
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if problem.as_ref().is_some_and(|re| re.is_match(line)) {
            warn!(target: "airloop::ffmpeg", session = %session, "{}", line);
        } else {
            debug!(target: "airloop::ffmpeg", session = %session, "{}", line);
        }
    }
}
