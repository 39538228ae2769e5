//! External process execution
//!
//! Blocking runs capture both streams to completion. Streamed runs
//! relay output line-by-line from background threads so the calling
//! thread is free for the lifetime of a backup. Argv tokens are passed
//! to the OS verbatim; no shell is involved at any point.

use std::io::{self, BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captured output of a completed process.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Which stream a relayed line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Per-line callback for streamed runs. Invoked from the reader threads,
/// once per complete line (and once for a trailing partial line at EOF).
pub type LineSink = Arc<dyn Fn(StreamSource, &str) + Send + Sync>;

/// Options for streamed runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    /// Kill the child if it runs longer than this.
    pub timeout: Option<Duration>,
}

/// Run a command to completion, capturing stdout and stderr.
///
/// A non-zero exit is not an error at this layer; classification of
/// failure output happens above.
///
/// # Errors
/// Returns an error if the command is empty or the process cannot be
/// spawned.
pub fn run_blocking(argv: &[String]) -> io::Result<CommandOutput> {
    let (program, args) = split_argv(argv)?;
    tracing::debug!(command = %argv.join(" "), "running");

    let output = Command::new(program).args(args).output()?;
    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status,
    })
}

/// Spawn a command and relay its output line-by-line to `sink`.
///
/// Returns as soon as the child is spawned; reading and waiting happen
/// on background threads. The returned handle supports cancellation,
/// and `options.timeout` arms a watchdog that kills the child.
///
/// # Errors
/// Returns an error if the command is empty or the process cannot be
/// spawned.
pub fn run_streamed(
    argv: &[String],
    sink: LineSink,
    options: StreamOptions,
) -> io::Result<StreamedRun> {
    let (program, args) = split_argv(argv)?;
    tracing::debug!(command = %argv.join(" "), "spawning");

    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let child = Arc::new(Mutex::new(child));
    let cancelled = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    if let Some(stream) = stdout {
        readers.push(spawn_reader(stream, StreamSource::Stdout, Arc::clone(&sink)));
    }
    if let Some(stream) = stderr {
        readers.push(spawn_reader(stream, StreamSource::Stderr, Arc::clone(&sink)));
    }

    let waiter = spawn_waiter(
        Arc::clone(&child),
        Arc::clone(&cancelled),
        readers,
        options.timeout,
    );

    Ok(StreamedRun {
        child,
        cancelled,
        waiter,
    })
}

/// Handle to a process started with [`run_streamed`].
pub struct StreamedRun {
    child: Arc<Mutex<Child>>,
    cancelled: Arc<AtomicBool>,
    waiter: JoinHandle<io::Result<ExitStatus>>,
}

impl StreamedRun {
    /// Request termination of the child process.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let mut child = lock_child(&self.child);
        let _ = child.kill();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Block until the process exits and all output has been relayed.
    ///
    /// # Errors
    /// Returns an error if the process could not be waited on, or if the
    /// watchdog timeout fired.
    pub fn wait(self) -> io::Result<ExitStatus> {
        self.waiter
            .join()
            .map_err(|_| io::Error::other("streamed run waiter thread panicked"))?
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: R,
    source: StreamSource,
    sink: LineSink,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                // read_line also yields a trailing line with no newline
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
                    sink(source, trimmed);
                }
            }
        }
    })
}

fn spawn_waiter(
    child: Arc<Mutex<Child>>,
    cancelled: Arc<AtomicBool>,
    readers: Vec<JoinHandle<()>>,
    timeout: Option<Duration>,
) -> JoinHandle<io::Result<ExitStatus>> {
    thread::spawn(move || {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            if let Some(status) = lock_child(&child).try_wait()? {
                join_readers(readers);
                return Ok(status);
            }

            if cancelled.load(Ordering::SeqCst) {
                let status = kill_and_wait(&child)?;
                join_readers(readers);
                return Ok(status);
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    cancelled.store(true, Ordering::SeqCst);
                    let _ = kill_and_wait(&child);
                    join_readers(readers);
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "streamed command exceeded its timeout",
                    ));
                }
            }

            thread::sleep(POLL_INTERVAL);
        }
    })
}

fn kill_and_wait(child: &Mutex<Child>) -> io::Result<ExitStatus> {
    let mut guard = lock_child(child);
    let _ = guard.kill();
    guard.wait()
}

fn join_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let _ = reader.join();
    }
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    match child.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn split_argv(argv: &[String]) -> io::Result<(&String, &[String])> {
    argv.split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn blocking_captures_stdout() {
        let out = run_blocking(&argv(&["echo", "hello"])).unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn blocking_reports_nonzero_exit_without_output() {
        let out = run_blocking(&argv(&["false"])).unwrap();
        assert!(!out.success());
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(run_blocking(&[]).is_err());
    }

    #[test]
    fn streamed_returns_before_child_exits() {
        let sink: LineSink = Arc::new(|_, _| {});
        let started = Instant::now();
        let run = run_streamed(&argv(&["sleep", "2"]), sink, StreamOptions::default()).unwrap();
        // spawn must not block for the child's runtime
        assert!(started.elapsed() < Duration::from_secs(1));
        run.cancel();
        let _ = run.wait();
    }

    #[test]
    fn streamed_relays_lines_in_order() {
        let lines = Arc::new(StdMutex::new(Vec::new()));
        let collected = Arc::clone(&lines);
        let sink: LineSink = Arc::new(move |source, line| {
            if source == StreamSource::Stdout {
                collected.lock().unwrap().push(line.to_string());
            }
        });

        let run = run_streamed(
            &argv(&["sh", "-c", "echo one; echo two"]),
            sink,
            StreamOptions::default(),
        )
        .unwrap();
        let status = run.wait().unwrap();

        assert!(status.success());
        assert_eq!(*lines.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn streamed_captures_partial_trailing_line() {
        let lines = Arc::new(StdMutex::new(Vec::new()));
        let collected = Arc::clone(&lines);
        let sink: LineSink = Arc::new(move |_, line| {
            collected.lock().unwrap().push(line.to_string());
        });

        // printf without trailing newline
        let run = run_streamed(
            &argv(&["sh", "-c", "printf partial"]),
            sink,
            StreamOptions::default(),
        )
        .unwrap();
        run.wait().unwrap();

        assert_eq!(*lines.lock().unwrap(), vec!["partial"]);
    }

    #[test]
    fn cancel_kills_long_running_child() {
        let sink: LineSink = Arc::new(|_, _| {});
        let run = run_streamed(&argv(&["sleep", "30"]), sink, StreamOptions::default()).unwrap();
        assert!(!run.is_cancelled());
        run.cancel();
        assert!(run.is_cancelled());
        let status = run.wait().unwrap();
        assert!(!status.success());
    }

    #[test]
    fn watchdog_timeout_kills_child() {
        let sink: LineSink = Arc::new(|_, _| {});
        let run = run_streamed(
            &argv(&["sleep", "30"]),
            sink,
            StreamOptions {
                timeout: Some(Duration::from_millis(200)),
            },
        )
        .unwrap();
        let err = run.wait().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
