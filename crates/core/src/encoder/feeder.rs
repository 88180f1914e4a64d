//! Companion task feeding audio tracks into the encoder's named pipe.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use tokio::fs::{File, OpenOptions};
use tracing::{debug, warn};

/// Creates the named pipe, replacing a stale one left by a previous run.
pub fn create_fifo(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    nix::unistd::mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(io::Error::from)
}

/// Streams tracks from `queue` into `fifo`, starting at `cursor`.
///
/// The queue is looped. `cursor` only advances after a track was written
/// completely, so a new feeder sharing it resumes at the interrupted track.
/// Returns `Ok` once the reading side goes away.
pub async fn feed_fifo(
    fifo: PathBuf,
    queue: Vec<PathBuf>,
    cursor: Arc<AtomicUsize>,
) -> io::Result<()> {
    if queue.is_empty() {
        return Ok(());
    }

    // Blocks until the encoder opens its end.
    let mut sink = OpenOptions::new().write(true).open(&fifo).await?;
    let mut failed_in_a_row = 0usize;

    loop {
        let index = cursor.load(Ordering::SeqCst) % queue.len();
        let track = &queue[index];

        match File::open(track).await {
            Ok(mut source) => {
                failed_in_a_row = 0;
                match tokio::io::copy(&mut source, &mut sink).await {
                    Ok(bytes) => {
                        debug!(track = %track.display(), bytes, "Track fed to encoder");
                    }
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!(track = %track.display(), "Encoder closed audio pipe");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => {
                warn!(track = %track.display(), error = %e, "Skipping unreadable track");
                failed_in_a_row += 1;
                if failed_in_a_row >= queue.len() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        "no readable track in audio queue",
                    ));
                }
            }
        }

        cursor.store(index + 1, Ordering::SeqCst);
    }
}

/// Lets a writer stuck in `open` on `fifo` proceed, then hangs up on it.
///
/// The writer's next write fails with a broken pipe and the blocking thread
/// behind it is released.
pub fn unblock_fifo(fifo: &Path) {
    match open(fifo, OFlag::O_RDONLY | OFlag::O_NONBLOCK, Mode::empty()) {
        Ok(fd) => {
            let _ = nix::unistd::close(fd);
        }
        Err(e) => {
            debug!(fifo = %fifo.display(), error = %e, "FIFO already gone");
        }
    }
}
