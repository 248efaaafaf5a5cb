use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use std::io::{BufRead, BufReader, ErrorKind};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to open pty: {0}")]
    Pty(String),
    #[error("failed to spawn command: {0}")]
    Spawn(String),
}

/// A command running under a pseudo-terminal, with its combined output
/// exposed as a line channel. The pty keeps interactive programs
/// line-buffered, so output is observed incrementally instead of only at
/// exit.
pub struct ShellChild {
    /// Combined stdout/stderr lines in production order. `Err` entries are
    /// read faults other than the normal master-side EIO at child exit.
    pub lines: mpsc::Receiver<std::io::Result<String>>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    pid: Option<u32>,
    _reader: JoinHandle<()>,
    _waiter: JoinHandle<()>,
}

impl ShellChild {
    /// Interrupts the whole process group, not just the immediate child, so
    /// pipelines and grandchildren do not linger. Falls back to a plain
    /// kill where group signalling is unavailable.
    pub fn interrupt(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            // The pty child is its session leader, so pgid == pid.
            let rc = unsafe { libc::killpg(pid as i32, libc::SIGINT) };
            if rc == 0 {
                return;
            }
        }
        let _ = self.killer.kill();
    }

    pub fn kill(&mut self) {
        let _ = self.killer.kill();
    }
}

/// Spawns `bash -c <command>` on a fresh pty. The command string is passed
/// as a single argv element, so the spawn layer cannot split it into
/// additional shell statements.
pub fn spawn_shell(command: &str) -> Result<ShellChild, SpawnError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        })
        .map_err(|e| SpawnError::Pty(e.to_string()))?;

    let mut builder = CommandBuilder::new("bash");
    builder.arg("-c");
    builder.arg(command);

    let mut child = pair
        .slave
        .spawn_command(builder)
        .map_err(|e| SpawnError::Spawn(e.to_string()))?;
    let killer = child.clone_killer();
    let pid = child.process_id();

    let reader = pair
        .master
        .try_clone_reader()
        .map_err(|e| SpawnError::Pty(e.to_string()))?;

    let (tx, rx) = mpsc::channel::<std::io::Result<String>>(256);
    let reader_handle: JoinHandle<()> = tokio::task::spawn_blocking(move || {
        let mut buf = BufReader::new(reader);
        loop {
            let mut bytes = Vec::new();
            match buf.read_until(b'\n', &mut bytes) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&bytes).into_owned();
                    if tx.blocking_send(Ok(line)).is_err() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                // The master side reports EIO once the child closes the
                // slave; that is the normal end of stream on Linux.
                Err(ref e) if e.raw_os_error() == Some(libc::EIO) => break,
                Err(e) => {
                    let _ = tx.blocking_send(Err(e));
                    break;
                }
            }
        }
    });

    // Reap the child so it never lingers as a zombie.
    let waiter_handle: JoinHandle<()> = tokio::task::spawn_blocking(move || {
        match child.wait() {
            Ok(status) => tracing::debug!(code = status.exit_code(), "observed command exited"),
            Err(e) => tracing::warn!(error = %e, "failed to wait for observed command"),
        }
    });

    Ok(ShellChild {
        lines: rx,
        killer,
        pid,
        _reader: reader_handle,
        _waiter: waiter_handle,
    })
}
