
use std::ffi::OsStr;

use crate::{
    error_code::ErrorCode,
    process::{ProcessError, ToolRunner},
    stage::StagedFile,
    tmp_file::TmpFile,
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum RemuxError {
    #[error("Error in ffmpeg process")]
    Process(#[source] ProcessError),

    #[error("ffmpeg exited with {}: {stderr}", crate::process::exit_status(*code))]
    Status { code: Option<i32>, stderr: String },

    #[error("Error reading remuxed file")]
    Metadata(#[source] std::io::Error),
}

impl RemuxError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Status { .. } => ErrorCode::REMUX_FAILED,
            Self::Metadata(_) => ErrorCode::FILE_IO_ERROR,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        // ffmpeg bailing probably means bad input
        matches!(self, Self::Status { .. })
    }
}

/// Rewrite the container so its index sits at the front of the file, copying every stream
/// untouched. The result is written next to the input as `<input>.processed`.
///
/// The input is left alone; removing it stays with the caller.
#[tracing::instrument(skip(tools, input), fields(input = %input.path().display()))]
pub(crate) async fn remux_fast_start(
    tools: &dyn ToolRunner,
    input: &StagedFile,
) -> Result<StagedFile, RemuxError> {
    let output = input.tmp_file().sibling(".processed");

    let res = tools
        .run(
            "ffmpeg",
            &[
                OsStr::new("-v"),
                OsStr::new("error"),
                OsStr::new("-hide_banner"),
                OsStr::new("-y"),
                OsStr::new("-i"),
                input.path().as_os_str(),
                OsStr::new("-map"),
                OsStr::new("0"),
                OsStr::new("-codec"),
                OsStr::new("copy"),
                OsStr::new("-map_metadata"),
                OsStr::new("0"),
                OsStr::new("-movflags"),
                OsStr::new("+faststart"),
                OsStr::new("-f"),
                OsStr::new("mp4"),
                output.as_os_str(),
            ],
        )
        .await;

    let tool_output = match res {
        Ok(tool_output) if tool_output.success() => tool_output,
        Ok(tool_output) => {
            discard(output).await;

            return Err(RemuxError::Status {
                code: tool_output.code,
                stderr: tool_output.stderr_lossy(),
            });
        }
        Err(e) => {
            discard(output).await;

            return Err(RemuxError::Process(e));
        }
    };

    if !tool_output.stderr.is_empty() {
        tracing::debug!("ffmpeg stderr: {}", tool_output.stderr_lossy());
    }

    let size = match tokio::fs::metadata(&output).await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            discard(output).await;
            return Err(RemuxError::Metadata(e));
        }
    };

    Ok(StagedFile::new(output, size, input.format()))
}

async fn discard(output: TmpFile) {
    if let Err(e) = output.cleanup().await {
        tracing::warn!("Failed to remove partial ffmpeg output: {e}");
    }
}
