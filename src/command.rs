use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::HandlerError;
use crate::macros::{MacroContext, MacroOptions};
use crate::models::Subject;

pub const MAX_OUTPUT_SIZE: usize = 8 * 1024;
pub const MAX_COMMAND_ARGUMENTS: usize = 32;

/// Exit status reported for a command killed on timeout.
pub const TIMEOUT_EXIT_STATUS: i32 = 2;
/// Exit status reported when the shell could not be started.
pub const SPAWN_FAILURE_EXIT_STATUS: i32 = 127;
/// Time between SIGTERM and SIGKILL for a timed-out command.
pub const KILL_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Named command-line templates referenced by `name!arg1!arg2`.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    templates: HashMap<String, String>,
}

impl CommandTable {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn define(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    /// Resolves a command reference into its raw command line with `$ARGn$` substituted.
    pub fn raw_command_line(&self, reference: &str) -> Result<String, HandlerError> {
        let mut parts = reference.split('!');
        let name = parts.next().unwrap_or_default().trim();
        let args: Vec<&str> = parts.collect();

        let template = self
            .templates
            .get(name)
            .ok_or_else(|| HandlerError::UndefinedCommand {
                name: name.to_string(),
            })?;

        let mut line = template.clone();
        for n in 1..=MAX_COMMAND_ARGUMENTS {
            let token = format!("$ARG{}$", n);
            if line.contains(&token) {
                line = line.replace(&token, args.get(n - 1).copied().unwrap_or_default());
            }
        }
        Ok(line)
    }
}

/// Resolves a command reference and expands its macros for `subject`.
pub fn prepare_command_line(
    commands: &CommandTable,
    macros: &dyn MacroContext,
    reference: &str,
    subject: &Subject<'_>,
    options: MacroOptions,
) -> Result<String, HandlerError> {
    subject.owning_host()?;

    let raw = commands.raw_command_line(reference)?;
    debug!(command = %reference, raw = %raw, "Raw command line");

    let processed = macros.expand(&raw, subject, options);
    if processed.trim().is_empty() {
        return Err(HandlerError::EmptyCommandLine);
    }
    debug!(command = %reference, processed = %processed, "Processed command line");
    Ok(processed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub exit_status: i32,
    pub output: String,
    pub elapsed: Duration,
    pub timed_out: bool,
}

/// Executes a fully resolved command line under a wall-clock limit.
///
/// Implementations must always return and must terminate the process on timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command_line: &str, limit: Duration) -> CommandOutcome;
}

/// Runs command lines through `/bin/sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command_line: &str, limit: Duration) -> CommandOutcome {
        let start = Instant::now();

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Own process group, so a timeout reaches everything the shell started.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutcome {
                    exit_status: SPAWN_FAILURE_EXIT_STATUS,
                    output: format!("(failed to start command: {})", e),
                    elapsed: start.elapsed(),
                    timed_out: false,
                }
            }
        };
        let pid = child.id();
        let stdout = child.stdout.take();

        let finished = timeout(limit, async {
            tokio::join!(child.wait(), read_capped(stdout))
        })
        .await;

        match finished {
            Ok((Ok(status), output)) => CommandOutcome {
                exit_status: status.code().unwrap_or(-1),
                output: truncate_output(String::from_utf8_lossy(&output).into_owned()),
                elapsed: start.elapsed(),
                timed_out: false,
            },
            Ok((Err(e), _)) => CommandOutcome {
                exit_status: -1,
                output: format!("(failed to wait for command: {})", e),
                elapsed: start.elapsed(),
                timed_out: false,
            },
            Err(_) => {
                warn!(command = %command_line, pid, "Command timed out, terminating process group");
                terminate(&mut child, pid).await;
                CommandOutcome {
                    exit_status: TIMEOUT_EXIT_STATUS,
                    output: String::new(),
                    elapsed: start.elapsed(),
                    timed_out: true,
                }
            }
        }
    }
}

/// Reads the whole pipe so the writer never blocks, keeping at most `MAX_OUTPUT_SIZE` bytes.
async fn read_capped(pipe: Option<ChildStdout>) -> Vec<u8> {
    let mut kept = Vec::new();
    let Some(mut pipe) = pipe else {
        return kept;
    };

    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = MAX_OUTPUT_SIZE.saturating_sub(kept.len());
                kept.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
    kept
}

/// SIGTERM to the whole group, SIGKILL after the grace period.
#[cfg(unix)]
async fn terminate(child: &mut Child, pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        let _ = child.kill().await;
        return;
    };
    let group = Pid::from_raw(pid as i32);

    let _ = killpg(group, Signal::SIGTERM);
    if timeout(KILL_GRACE_PERIOD, child.wait()).await.is_err() {
        debug!(pid, "Grace period expired, sending SIGKILL");
    }
    // The shell may be gone while its children ignored SIGTERM.
    let _ = killpg(group, Signal::SIGKILL);
    let _ = child.kill().await;
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _pid: Option<u32>) {
    let _ = child.kill().await;
}

fn truncate_output(mut output: String) -> String {
    if output.len() > MAX_OUTPUT_SIZE {
        let mut end = MAX_OUTPUT_SIZE;
        while !output.is_char_boundary(end) {
            end -= 1;
        }
        output.truncate(end);
    }
    output
}
