//! External command execution.
//!
//! Commands run with stdout and stderr piped into a single line stream. The
//! relative order of lines from the two pipes is whatever the scheduler
//! observes; lines from one pipe keep their order. An optional timeout is
//! enforced by killing the child (and, on unix, its whole process group)
//! before the timeout is reported. The group is also killed when the run
//! ends or its future is dropped, so no descendant outlives the call.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::errors::RunError;

/// A program invocation. Built with the `arg`/`current_dir`/`timeout`
/// builders and executed with [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program and arguments as they are handed to the OS. On Windows the
    /// `npx`/`node` shims are batch files, so the command goes through
    /// `cmd.exe /c`.
    pub fn argv(&self) -> (String, Vec<String>) {
        if cfg!(windows) {
            let mut args = vec!["/c".to_string(), self.program.clone()];
            args.extend(self.args.iter().cloned());
            ("cmd.exe".to_string(), args)
        } else {
            (self.program.clone(), self.args.clone())
        }
    }

    pub fn display(&self) -> String {
        let (program, args) = self.argv();
        std::iter::once(program)
            .chain(args)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// stdout and stderr lines joined with `\n`.
    pub combined_output: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Spawns `spec`, waits for it to exit and returns its merged output.
///
/// Dropping the returned future kills the child and its process group.
pub async fn run(spec: &CommandSpec) -> Result<ProcessOutput, RunError> {
    let (program, args) = spec.argv();
    let mut cmd = Command::new(&program);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    tracing::info!(command = %spec.display(), cwd = ?spec.cwd, "executing command");
    let mut child = cmd
        .spawn()
        .map_err(|e| RunError::process_failure(&spec.program, e))?;
    let mut group = ProcessGroup::of(&child);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let readers = [
        child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, tx.clone()))),
        child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, tx.clone()))),
    ];
    drop(tx);

    let mut lines = Vec::new();
    let waited = match spec.timeout {
        Some(limit) => tokio::time::timeout(limit, collect(&mut child, &mut rx, &mut lines))
            .await
            .ok(),
        None => Some(collect(&mut child, &mut rx, &mut lines).await),
    };

    let Some(waited) = waited else {
        group.kill();
        if let Err(e) = child.kill().await {
            tracing::debug!(error = %e, "kill after timeout failed");
        }
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        for reader in readers.into_iter().flatten() {
            reader.abort();
        }
        let limit = spec.timeout.unwrap_or_default();
        tracing::warn!(
            command = %spec.display(),
            timeout_secs = limit.as_secs_f64(),
            lines_captured = lines.len(),
            "command timed out, process killed"
        );
        return Err(RunError::ProcessTimeout {
            program: spec.program.clone(),
            timeout: limit,
            output: lines.join("\n"),
        });
    };

    let status = waited.map_err(|e| RunError::process_failure(&spec.program, e))?;
    tracing::info!(command = %spec.display(), exit_code = ?status.code(), "process exited");

    Ok(ProcessOutput {
        combined_output: lines.join("\n"),
        exit_code: status.code(),
    })
}

async fn collect(
    child: &mut Child,
    rx: &mut UnboundedReceiver<String>,
    lines: &mut Vec<String>,
) -> std::io::Result<ExitStatus> {
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    child.wait().await
}

async fn forward_lines<R>(reader: R, tx: UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    loop {
        match segments.next_segment().await {
            Ok(Some(bytes)) => {
                let mut line = String::from_utf8_lossy(&bytes).into_owned();
                if line.ends_with('\r') {
                    line.pop();
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "output stream closed with error");
                break;
            }
        }
    }
}

/// The child's process group. The child is spawned as the group leader, so
/// killing the group reaches every descendant that has not detached itself.
/// Killed at most once: on timeout, or on drop.
struct ProcessGroup {
    pid: Option<u32>,
}

impl ProcessGroup {
    fn of(child: &Child) -> Self {
        Self { pid: child.id() }
    }

    fn kill(&mut self) {
        let Some(pid) = self.pid.take() else {
            return;
        };
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{killpg, Signal};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => tracing::debug!(pid, error = %e, "SIGKILL to process group failed"),
            }
        }
        #[cfg(not(unix))]
        let _ = pid;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
