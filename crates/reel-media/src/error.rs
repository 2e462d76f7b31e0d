//! Error types for media operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// External binary a media operation shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Ffprobe,
}

impl Tool {
    pub fn binary(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Ffprobe => "ffprobe",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    ToolNotFound(Tool),

    #[error(
        "{tool} failed{}: {message}",
        .exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default()
    )]
    ToolFailed {
        tool: Tool,
        message: String,
        /// Last stderr lines, progress output excluded
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("ffmpeg killed after {0}s")]
    Timeout(u64),

    #[error("Missing media file: {0}")]
    FileNotFound(PathBuf),

    #[error("ffmpeg wrote nothing to {0}")]
    EmptyOutput(PathBuf),

    #[error("No video stream in probed file")]
    NoVideoStream,

    #[error("Unreadable ffprobe output: {0}")]
    ProbeOutput(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn failed(
        tool: Tool,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::ToolFailed {
            tool,
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Captured stderr of a failed tool run, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ToolFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_display() {
        let err = MediaError::failed(
            Tool::Ffmpeg,
            "non-zero status",
            Some("Invalid data found".into()),
            Some(1),
        );
        assert_eq!(err.to_string(), "ffmpeg failed with exit code 1: non-zero status");
        assert_eq!(err.stderr(), Some("Invalid data found"));

        let err = MediaError::failed(Tool::Ffprobe, "killed", None, None);
        assert_eq!(err.to_string(), "ffprobe failed: killed");
        assert!(err.stderr().is_none());
    }
}
