//! External process runner
//!
//! The session only sees the [`ProcessRunner`] trait; [`SubprocessRunner`] is
//! the real implementation and tests swap in scripted runners.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::command::CommandLine;

/// Exit status and captured output of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    /// Process exit code; `-1` when the process died from a signal.
    pub exit_code: i32,
    /// Captured stdout followed by captured stderr.
    pub combined_output: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Why a run produced no exit status.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("'{program}' was not found")]
    MissingTool { program: String },

    /// The child was killed at the deadline; `output` is what it printed before that.
    #[error("timed out after {after:?}")]
    Timeout { after: Duration, output: String },

    #[error("interrupted")]
    Interrupted,

    #[error("empty command")]
    EmptyCommand,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Runs one command to completion.
pub trait ProcessRunner {
    fn run(&mut self, command: &CommandLine) -> Result<RunOutput, RunError>;
}

/// Spawns real child processes in the project root.
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl SubprocessRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run_async(&self, command: &CommandLine) -> Result<RunOutput, RunError> {
        let program = command.program().ok_or(RunError::EmptyCommand)?;

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(command.args())
            .current_dir(&self.working_dir)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        interrupt::default_in_child(&mut cmd);

        let mut child = cmd.spawn().map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => RunError::MissingTool {
                program: program.to_string(),
            },
            _ => RunError::Io(err),
        })?;
        tracing::debug!(pid = child.id(), command = %command, "spawned runner");

        #[cfg(unix)]
        let _interrupt = interrupt::IgnoreInterrupt::install();

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        let finished = {
            let completion = async {
                let (out, err) = tokio::join!(drain(stdout_pipe, &mut stdout), drain(stderr_pipe, &mut stderr));
                out?;
                err?;
                Ok::<_, io::Error>(child.wait().await?)
            };
            let deadline = async {
                match self.timeout {
                    Some(after) => tokio::time::sleep(after).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                status = completion => Some(status?),
                _ = deadline => None,
            }
        };

        let combined_output = combine(&stdout, &stderr);
        let Some(status) = finished else {
            let after = self.timeout.unwrap_or_default();
            tracing::warn!(command = %command, "runner timed out after {after:?}");
            if let Err(err) = child.kill().await {
                tracing::debug!("could not kill timed out runner: {err}");
            }
            return Err(RunError::Timeout {
                after,
                output: combined_output,
            });
        };

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if status.signal() == Some(libc::SIGINT) {
                tracing::info!(command = %command, "runner interrupted");
                return Err(RunError::Interrupted);
            }
        }

        Ok(RunOutput {
            exit_code: status.code().unwrap_or(-1),
            combined_output,
        })
    }
}

impl ProcessRunner for SubprocessRunner {
    fn run(&mut self, command: &CommandLine) -> Result<RunOutput, RunError> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        runtime.block_on(self.run_async(command))
    }
}

/// Copy a pipe into `buf` chunk by chunk, so a cancelled read keeps what arrived.
async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, buf: &mut Vec<u8>) -> io::Result<()> {
    let Some(mut pipe) = pipe else {
        return Ok(());
    };
    let mut chunk = [0u8; 4096];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn combine(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    let stderr = String::from_utf8_lossy(stderr);
    if !stderr.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }
    combined
}

/// Ctrl-C reaches the whole foreground process group. While a child runs the
/// navigator ignores it and lets the child die; the previous disposition comes
/// back on drop, so prompts stay interruptible.
#[cfg(unix)]
#[allow(unsafe_code)]
mod interrupt {
    pub(super) struct IgnoreInterrupt {
        previous: libc::sighandler_t,
    }

    impl IgnoreInterrupt {
        pub(super) fn install() -> Self {
            // SAFETY: SIG_IGN installs no Rust code as a handler.
            let previous = unsafe { libc::signal(libc::SIGINT, libc::SIG_IGN) };
            Self { previous }
        }
    }

    /// Children start with the default disposition even while another run holds an
    /// [`IgnoreInterrupt`], since an ignored signal survives `exec`.
    pub(super) fn default_in_child(cmd: &mut tokio::process::Command) {
        // SAFETY: `signal` is async-signal-safe and the closure allocates nothing.
        unsafe {
            cmd.pre_exec(|| {
                libc::signal(libc::SIGINT, libc::SIG_DFL);
                Ok(())
            });
        }
    }

    impl Drop for IgnoreInterrupt {
        fn drop(&mut self) {
            if self.previous != libc::SIG_ERR {
                // SAFETY: restores the disposition `signal` returned in `install`.
                unsafe {
                    libc::signal(libc::SIGINT, self.previous);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandLine {
        CommandLine::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
    }

    #[test]
    fn test_empty_command() {
        let mut runner = SubprocessRunner::new(".");
        let err = runner.run(&CommandLine::new(Vec::new())).unwrap_err();
        assert!(matches!(err, RunError::EmptyCommand));
    }

    #[test]
    fn test_missing_tool() {
        let mut runner = SubprocessRunner::new(".");
        let cmd = CommandLine::new(vec!["testnav-no-such-runner-xyz".to_string()]);
        match runner.run(&cmd).unwrap_err() {
            RunError::MissingTool { program } => assert_eq!(program, "testnav-no-such-runner-xyz"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_combines_stdout_then_stderr() {
        let mut runner = SubprocessRunner::new(".");
        let out = runner.run(&sh("echo out; echo err 1>&2; exit 3")).unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
        assert_eq!(out.combined_output, "out\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_sets_unbuffered_env() {
        let mut runner = SubprocessRunner::new(".");
        let out = runner.run(&sh("printf %s \"$PYTHONUNBUFFERED\"")).unwrap();
        assert!(out.success());
        assert_eq!(out.combined_output, "1");
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_in_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let mut runner = SubprocessRunner::new(dir.path());
        let out = runner.run(&sh("cat marker.txt")).unwrap();
        assert_eq!(out.combined_output, "here");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let mut runner = SubprocessRunner::new(".").with_timeout(Some(Duration::from_millis(200)));
        let started = std::time::Instant::now();
        let err = runner.run(&sh("sleep 5")).unwrap_err();
        assert!(matches!(err, RunError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_keeps_partial_output() {
        let mut runner = SubprocessRunner::new(".").with_timeout(Some(Duration::from_millis(200)));
        match runner.run(&sh("echo partial; sleep 5")).unwrap_err() {
            RunError::Timeout { after, output } => {
                assert_eq!(after, Duration::from_millis(200));
                assert!(output.contains("partial"), "output was {output:?}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_child_killed_by_sigint_is_interrupt() {
        let mut runner = SubprocessRunner::new(".");
        let err = runner.run(&sh("echo started; kill -INT $$; sleep 5")).unwrap_err();
        assert!(matches!(err, RunError::Interrupted));
    }
}
