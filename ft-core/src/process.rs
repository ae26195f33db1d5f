//! Child process helpers
//!
//! Every external tool (adb, lsusb) goes through here so that waits have a
//! deadline. Output pipes are drained on helper threads; the calling thread
//! only polls the child and waits on the drains up to the same deadline,
//! since a grandchild can hold a pipe open after the child exits.

use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use ft_error::{FwtapError, Result};
use tracing::{debug, trace, warn};

use crate::cancel::CancelToken;
use crate::constants::defaults;

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Result of streaming a process's stdout into a writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub success: bool,
    pub bytes: u64,
    pub stderr: String,
}

/// Human-readable command line for logs and errors
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

fn spawn(cmd: &mut Command) -> Result<Child> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd.spawn().map_err(|e| {
        let program = cmd.get_program().to_string_lossy().into_owned();
        if e.kind() == io::ErrorKind::NotFound {
            FwtapError::BridgeUnavailable(format!("{} not found", program))
        } else {
            FwtapError::command(describe(cmd), e.to_string())
        }
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a drain thread's buffer until `deadline`
fn collect(drained: &Receiver<Vec<u8>>, deadline: Instant, what: &str) -> Result<Vec<u8>> {
    match drained.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Ok(buf),
        Err(RecvTimeoutError::Timeout) => {
            warn!(command = what, "Output pipe still open at the deadline");
            Err(FwtapError::Timeout(what.to_string()))
        }
        Err(RecvTimeoutError::Disconnected) => Ok(Vec::new()),
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_until(child: &mut Child, deadline: Instant, what: &str) -> Result<ExitStatus> {
    let poll = Duration::from_millis(defaults::PROCESS_POLL_MS);
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            warn!(command = what, "Process exceeded its deadline, killing");
            kill(child);
            return Err(FwtapError::Timeout(what.to_string()));
        }
        thread::sleep(poll);
    }
}

/// Run a command to completion, capturing stdout and stderr
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<ProcessOutput> {
    let what = describe(&cmd);
    trace!(command = %what, "Spawning");
    let mut child = spawn(&mut cmd)?;

    let deadline = Instant::now() + timeout;
    let out = drain(child.stdout.take());
    let err = drain(child.stderr.take());
    let status = wait_until(&mut child, deadline, &what)?;

    let stdout = collect(&out, deadline, &what)?;
    let stderr = String::from_utf8_lossy(&collect(&err, deadline, &what)?).into_owned();
    debug!(command = %what, code = ?status.code(), bytes = stdout.len(), "Process finished");

    Ok(ProcessOutput {
        success: status.success(),
        code: status.code(),
        stdout,
        stderr,
    })
}

/// Stream a command's stdout into `sink` byte for byte.
///
/// `progress` receives the running total after every chunk. Cancellation and
/// the optional deadline are checked while waiting for each chunk.
pub fn stream_to_writer(
    mut cmd: Command,
    sink: &mut dyn Write,
    timeout: Option<Duration>,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(u64),
) -> Result<StreamOutcome> {
    let what = describe(&cmd);
    debug!(command = %what, "Starting stream");
    let mut child = spawn(&mut cmd)?;
    let err = drain(child.stderr.take());

    let (tx, rx) = mpsc::channel::<io::Result<Vec<u8>>>();
    let reader = child.stdout.take().map(|mut stdout| {
        thread::spawn(move || {
            let mut buf = vec![0u8; defaults::COPY_CHUNK_SIZE];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Ok(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        })
    });

    let deadline = timeout.map(|t| Instant::now() + t);
    let poll = Duration::from_millis(defaults::PROCESS_POLL_MS * 5);
    let mut bytes: u64 = 0;

    loop {
        if cancel.is_cancelled() {
            kill(&mut child);
            return Err(FwtapError::Cancelled);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            kill(&mut child);
            return Err(FwtapError::Timeout(what));
        }
        match rx.recv_timeout(poll) {
            Ok(Ok(chunk)) => {
                if let Err(e) = sink.write_all(&chunk) {
                    kill(&mut child);
                    return Err(e.into());
                }
                bytes += chunk.len() as u64;
                progress(bytes);
            }
            Ok(Err(e)) => {
                kill(&mut child);
                return Err(FwtapError::command(what, e.to_string()));
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(reader) = reader {
        let _ = reader.join();
    }
    sink.flush()?;

    let status = match deadline {
        Some(d) => wait_until(&mut child, d, &what)?,
        None => child.wait()?,
    };
    // stderr only feeds diagnostics; a pipe held past the deadline loses it
    let stderr_deadline =
        deadline.unwrap_or_else(|| Instant::now() + Duration::from_millis(defaults::STDERR_GRACE_MS));
    let stderr = match collect(&err, stderr_deadline, &what) {
        Ok(buf) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => String::new(),
    };
    debug!(command = %what, bytes, code = ?status.code(), "Stream finished");

    Ok(StreamOutcome {
        success: status.success(),
        bytes,
        stderr,
    })
}
