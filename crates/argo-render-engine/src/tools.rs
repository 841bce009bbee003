//! External binary invocation

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{EngineError, Result};

/// Find `tool` on PATH
pub fn locate(tool: &'static str) -> Result<PathBuf> {
    let path = which::which(tool).map_err(|e| EngineError::ToolNotFound {
        tool,
        message: e.to_string(),
    })?;
    debug!(tool, path = %path.display(), "Located binary");
    Ok(path)
}

/// Run a prepared command to completion, feeding `stdin` when given
pub fn run(tool: &'static str, mut cmd: Command, stdin: Option<&[u8]>) -> Result<Output> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "Running");

    let mut child = cmd.spawn().map_err(|e| EngineError::ToolNotFound {
        tool,
        message: format!("failed to spawn: {}", e),
    })?;

    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(data)
            .map_err(|e| EngineError::Process {
                tool,
                message: format!("failed to write to stdin: {}", e),
            })?;
    }

    child.wait_with_output().map_err(|e| EngineError::Process {
        tool,
        message: format!("failed to wait for process: {}", e),
    })
}

/// Stdout followed by stderr, the way a terminal would show them
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text.trim().to_string()
}
