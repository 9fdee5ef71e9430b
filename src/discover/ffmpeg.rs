
use std::{ffi::OsStr, path::Path};

use crate::process::ToolRunner;

use super::{Discovery, Orientation, ProbeError};

#[derive(Debug, serde::Deserialize)]
struct FfMpegDiscovery {
    #[serde(default)]
    streams: Vec<FfMpegStream>,
}

#[derive(Debug, serde::Deserialize)]
struct FfMpegStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[tracing::instrument(level = "debug", skip(tools))]
pub(super) async fn discover_file(
    tools: &dyn ToolRunner,
    path: &Path,
) -> Result<Discovery, ProbeError> {
    let output = tools
        .run(
            "ffprobe",
            &[
                OsStr::new("-v"),
                OsStr::new("error"),
                OsStr::new("-select_streams"),
                OsStr::new("v:0"),
                OsStr::new("-show_entries"),
                OsStr::new("stream=width,height"),
                OsStr::new("-of"),
                OsStr::new("json"),
                path.as_os_str(),
            ],
        )
        .await
        .map_err(ProbeError::Process)?;

    if !output.success() {
        return Err(ProbeError::Status {
            code: output.code,
            stderr: output.stderr_lossy(),
        });
    }

    let output: FfMpegDiscovery =
        serde_json::from_slice(&output.stdout).map_err(ProbeError::Json)?;

    parse_discovery(output)
}

fn parse_discovery(discovery: FfMpegDiscovery) -> Result<Discovery, ProbeError> {
    let FfMpegStream { width, height } = discovery
        .streams
        .into_iter()
        .next()
        .ok_or(ProbeError::NoStreams)?;

    let (width, height) = match (width, height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => (width, height),
        (width, height) => {
            return Err(ProbeError::Dimensions {
                width: width.unwrap_or(0),
                height: height.unwrap_or(0),
            })
        }
    };

    Ok(Discovery {
        width,
        height,
        orientation: Orientation::from_dimensions(width, height),
    })
}
