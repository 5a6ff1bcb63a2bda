use anyhow::{Context, Result, anyhow};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of one bounded engine invocation.
///
/// A deadline overrun is an expected, recoverable result for OCR work, so it
/// is a variant rather than an error: callers decide per page whether to
/// fall back, and sibling invocations are never affected.
#[derive(Debug)]
pub enum InvocationOutcome {
    Completed {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    TimedOut {
        elapsed: Duration,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    Failed {
        exit_code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
}

impl InvocationOutcome {
    pub fn stderr_lossy(&self) -> String {
        let bytes = match self {
            Self::Completed { stderr, .. }
            | Self::TimedOut { stderr, .. }
            | Self::Failed { stderr, .. } => stderr,
        };
        String::from_utf8_lossy(bytes).trim().to_string()
    }
}

/// `engine.timeout_seconds` semantics: 0 disables the deadline.
pub fn deadline_from_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Run an external command to completion or deadline.
///
/// On overrun the child is killed and reaped, and whatever output it managed
/// to produce rides along in `TimedOut`. The kill reaches only this one
/// child; nothing here can cancel a sibling page.
pub fn run_bounded(cmd: &mut Command, timeout: Option<Duration>) -> Result<InvocationOutcome> {
    let program = cmd.get_program().to_string_lossy().to_string();
    debug!("spawn {program} timeout={timeout:?}");

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning {program}"))?;

    // Drain pipes on their own threads so a chatty engine can't deadlock
    // against a full pipe buffer while we poll for exit.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(if status.success() {
                InvocationOutcome::Completed { stdout, stderr }
            } else {
                InvocationOutcome::Failed {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                }
            });
        }

        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                warn!("{program} exceeded {limit:?}; killing");
                let _ = child.kill();
                child.wait().with_context(|| "wait after kill")?;
                let stdout = stdout_thread
                    .join()
                    .map_err(|_| anyhow!("stdout reader thread panicked"))??;
                let stderr = stderr_thread
                    .join()
                    .map_err(|_| anyhow!("stderr reader thread panicked"))??;
                return Ok(InvocationOutcome::TimedOut {
                    elapsed: start.elapsed(),
                    stdout,
                    stderr,
                });
            }
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}
