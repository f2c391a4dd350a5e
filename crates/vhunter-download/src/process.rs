//! Shared helpers for invoking external tools.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use vhunter_core::VideoError;

/// Captured result of a finished process.
#[derive(Debug)]
pub(crate) struct CapturedOutput {
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// Convert a failed run into [`VideoError::ProcessFailed`].
    pub fn into_failure(self, command: String) -> VideoError {
        VideoError::ProcessFailed {
            command,
            status: self.code,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

/// Locate a tool: explicit paths must exist, bare names go through `PATH`.
pub(crate) fn resolve_tool(program: &str) -> Result<PathBuf, VideoError> {
    let trimmed = program.trim();
    if trimmed.is_empty() {
        return Err(VideoError::tool_unavailable(program, "no path configured"));
    }
    let candidate = Path::new(trimmed);
    if candidate.components().count() > 1 {
        return if candidate.exists() {
            Ok(candidate.to_path_buf())
        } else {
            Err(VideoError::tool_unavailable(trimmed, "path does not exist"))
        };
    }
    which::which(trimmed).map_err(|e| VideoError::tool_unavailable(trimmed, e.to_string()))
}

/// Render a command line for logs and error messages.
pub(crate) fn command_line(program: &Path, args: &[String]) -> String {
    let mut out = program.display().to_string();
    for arg in args {
        out.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            out.push('"');
            out.push_str(&arg.replace('"', "\\\""));
            out.push('"');
        } else {
            out.push_str(arg);
        }
    }
    out
}

/// Run `program` to completion, capturing both streams.
///
/// Cancellation drops the child, which kills it.
pub(crate) async fn run_captured(
    program: &Path,
    args: &[String],
    cancel: &CancellationToken,
) -> Result<CapturedOutput, VideoError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::select! {
        biased;

        () = cancel.cancelled() => return Err(VideoError::Cancelled),

        result = cmd.output() => result.map_err(|e| {
            VideoError::tool_unavailable(program.display().to_string(), e.to_string())
        })?,
    };

    Ok(CapturedOutput {
        code: output.status.code(),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_quotes_spaces() {
        let line = command_line(
            Path::new("yt-dlp"),
            &["--add-header".to_string(), "DNT: 1".to_string(), "-v".to_string()],
        );
        assert_eq!(line, "yt-dlp --add-header \"DNT: 1\" -v");
    }

    #[test]
    fn test_resolve_tool_rejects_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-tool");
        let err = resolve_tool(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, VideoError::ToolUnavailable { .. }));
        assert!(resolve_tool("   ").is_err());
    }

    #[test]
    fn test_resolve_tool_accepts_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tool");
        std::fs::write(&tool, b"").unwrap();
        assert_eq!(resolve_tool(tool.to_str().unwrap()).unwrap(), tool);
    }
}
