use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as TokioCommand};
use tokio::time::{timeout_at, Instant};

use crate::error::ConvertError;

/// Captured result of a finished external process.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Runs `command` to completion within `timeout`.
///
/// The deadline covers both the process and the draining of its output. On
/// unix the child leads its own process group, and the whole group is killed
/// when the deadline passes, so helpers it started cannot keep a job waiting.
///
/// Blocking: call from a plain thread or from `spawn_blocking`, never from
/// inside an async task. The current runtime is reused when there is one.
pub fn run_with_timeout(command: Command, timeout: Duration) -> Result<CommandOutput, ConvertError> {
    let program = command.get_program().to_string_lossy().into_owned();

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle.block_on(run(command, program, timeout)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| ConvertError::Launch {
                    program: program.clone(),
                    source: e,
                })?;
            runtime.block_on(run(command, program, timeout))
        }
    }
}

async fn run(
    command: Command,
    program: String,
    timeout: Duration,
) -> Result<CommandOutput, ConvertError> {
    let mut command = TokioCommand::from(command);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|e| ConvertError::Launch {
        program: program.clone(),
        source: e,
    })?;
    let group = child.id();

    let stdout = tokio::spawn(read_all(child.stdout.take()));
    let stderr = tokio::spawn(read_all(child.stderr.take()));
    let deadline = Instant::now() + timeout;

    let status = match timeout_at(deadline, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            kill_tree(&mut child, group).await;
            return Err(ConvertError::Launch { program, source: e });
        }
        Err(_) => {
            kill_tree(&mut child, group).await;
            return Err(ConvertError::Timeout {
                program,
                secs: timeout.as_secs(),
            });
        }
    };

    // A descendant that inherited the pipes keeps them open after the child
    // itself has exited.
    match timeout_at(deadline, async { (stdout.await, stderr.await) }).await {
        Ok((stdout, stderr)) => Ok(CommandOutput {
            status,
            stdout: stdout.unwrap_or_default(),
            stderr: stderr.unwrap_or_default(),
        }),
        Err(_) => {
            log::warn!(
                "'{}' exited but left processes holding its output; killing them",
                program
            );
            kill_group(group).await;
            Ok(CommandOutput {
                status,
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn kill_tree(child: &mut Child, group: Option<u32>) {
    kill_group(group).await;
    // also reaps the direct child
    let _ = child.kill().await;
}

#[cfg(unix)]
async fn kill_group(group: Option<u32>) {
    let Some(pgid) = group else { return };
    let result = TokioCommand::new("kill")
        .args(["-KILL", "--", &format!("-{}", pgid)])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        log::debug!("Could not signal process group {}: {}", pgid, e);
    }
}

#[cfg(not(unix))]
async fn kill_group(_group: Option<u32>) {}

/// Turns a non-zero exit into [`ConvertError::ToolFailed`].
pub fn require_success(program: &str, output: CommandOutput) -> Result<CommandOutput, ConvertError> {
    if output.success() {
        Ok(output)
    } else {
        Err(ConvertError::ToolFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: output.stderr.trim().to_string(),
        })
    }
}
