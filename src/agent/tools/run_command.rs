//! run_command tool - Execute a validated shell command in the working directory

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::ToolError;
use crate::agent::protocol::ToolResult;
use crate::agent::safety::{SafetyConfig, SafetyValidator, truncate_output};

const READ_CHUNK_BYTES: usize = 4096;

/// Validate and run `cmd` through the platform shell.
///
/// Validation failures never reach the OS. Output from stdout and stderr is
/// collected into one buffer in arrival order; the interleaving between the
/// two streams is unspecified.
pub async fn run_command(
    cmd: &str,
    config: &SafetyConfig,
    validator: &SafetyValidator,
    working_dir: &Path,
) -> ToolResult {
    if let Err(e) = validator.validate_command(cmd, config, working_dir) {
        warn!("Blocked command '{}': {}", cmd, e);
        return ToolResult::failure(e.to_string());
    }

    match execute(cmd, config, working_dir).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Command '{}' failed to run: {}", cmd, e);
            ToolResult::failure(e.to_string())
        }
    }
}

fn shell_command(cmd: &str) -> Command {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("powershell.exe");
        c.arg("-Command");
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c");
        c
    };
    command.arg(cmd);
    command
}

async fn execute(cmd: &str, config: &SafetyConfig, working_dir: &Path) -> Result<ToolResult, ToolError> {
    debug!("Spawning shell in {}: {}", working_dir.display(), cmd);

    let mut child = shell_command(cmd)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(ToolError::Spawn)?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut output = Vec::new();

    let timeout = Duration::from_secs(config.timeout_seconds);
    let finished = tokio::time::timeout(timeout, async {
        read_interleaved(&mut stdout, &mut stderr, &mut output).await?;
        child.wait().await
    })
    .await;

    let status = match finished {
        Ok(status) => status.map_err(|source| ToolError::IoError {
            operation: "wait for command".to_string(),
            source,
        })?,
        Err(_) => {
            let _ = child.kill().await;
            warn!("Command timed out after {}s: {}", config.timeout_seconds, cmd);
            let partial = String::from_utf8_lossy(&output);
            return Ok(ToolResult::failure(
                ToolError::CommandTimeout {
                    seconds: config.timeout_seconds,
                }
                .to_string(),
            )
            .with_output(truncate_output(&partial, config.max_output_bytes)));
        }
    };

    let text = String::from_utf8_lossy(&output);
    let output = truncate_output(&text, config.max_output_bytes);
    let code = status.code();
    info!("Command '{}' exited with {:?}", cmd, code);

    let result = match code {
        Some(0) => ToolResult::success(output).with_exit_code(0),
        Some(n) => ToolResult::failure(format!("Command exited with code {}", n))
            .with_output(output)
            .with_exit_code(n),
        None => ToolResult::failure("Command terminated by signal")
            .with_output(output)
            .with_exit_code(0),
    };
    Ok(result)
}

async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut Option<R>, buf: &mut [u8]) -> std::io::Result<usize> {
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Drain both pipes until EOF, appending chunks as they arrive
async fn read_interleaved<O, E>(stdout: &mut Option<O>, stderr: &mut Option<E>, output: &mut Vec<u8>) -> std::io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = [0u8; READ_CHUNK_BYTES];
    let mut err_buf = [0u8; READ_CHUNK_BYTES];

    while stdout.is_some() || stderr.is_some() {
        tokio::select! {
            n = read_chunk(stdout, &mut out_buf) => {
                let n = n?;
                if n == 0 {
                    *stdout = None;
                } else {
                    output.extend_from_slice(&out_buf[..n]);
                }
            }
            n = read_chunk(stderr, &mut err_buf) => {
                let n = n?;
                if n == 0 {
                    *stderr = None;
                } else {
                    output.extend_from_slice(&err_buf[..n]);
                }
            }
        }
    }
    Ok(())
}
