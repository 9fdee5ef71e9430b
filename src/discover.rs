mod ffmpeg;

use std::path::Path;

use crate::{error_code::ErrorCode, process::ToolRunner};

/// Aspect-ratio class of a video, used as the first segment of its storage key
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Orientation {
    Landscape,
    Portrait,
    Other,
}

impl Orientation {
    /// Classify by width/height. The 16:9 and 9:16 bands are open, so ratios landing exactly on
    /// a bound fall through to `Other`.
    pub(crate) fn from_dimensions(width: u32, height: u32) -> Self {
        let ratio = f64::from(width) / f64::from(height);

        if ratio > 1.76 && ratio < 1.78 {
            Self::Landscape
        } else if ratio > 0.55 && ratio < 0.57 {
            Self::Portrait
        } else {
            Self::Other
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.as_str().fmt(f)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Discovery {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) orientation: Orientation,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ProbeError {
    #[error("Error running ffprobe")]
    Process(#[source] crate::process::ProcessError),

    #[error("ffprobe exited with {}: {stderr}", crate::process::exit_status(*code))]
    Status { code: Option<i32>, stderr: String },

    #[error("Error parsing ffprobe output")]
    Json(#[source] serde_json::Error),

    #[error("No video stream in uploaded media")]
    NoStreams,

    #[error("Invalid video dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
}

impl ProbeError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Process(e) => e.error_code(),
            Self::Status { .. }
            | Self::Json(_)
            | Self::NoStreams
            | Self::Dimensions { .. } => ErrorCode::PROBE_FAILED,
        }
    }

    /// Whether the tool ran and rejected the file, rather than failing to run at all
    pub(crate) const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Process(_))
    }
}

#[tracing::instrument(level = "debug", skip(tools))]
pub(crate) async fn probe(tools: &dyn ToolRunner, path: &Path) -> Result<Discovery, ProbeError> {
    let discovery = ffmpeg::discover_file(tools, path).await?;

    tracing::debug!(
        width = discovery.width,
        height = discovery.height,
        orientation = %discovery.orientation,
        "Probed video"
    );

    Ok(discovery)
}
