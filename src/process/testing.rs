use std::{
    ffi::{OsStr, OsString},
    sync::Mutex,
};

use super::{ProcessError, ToolOutput, ToolRunner};

/// Canned ffprobe and ffmpeg results
///
/// Like the real ffmpeg, the fake writes its output file before reporting the exit status, so a
/// failing remux still leaves a partial artifact for the caller to deal with.
#[derive(Debug)]
pub(crate) struct FakeTools {
    ffprobe: ToolOutput,
    ffmpeg: ToolOutput,
    hang_ffmpeg: bool,
    calls: Mutex<Vec<(String, Vec<OsString>)>>,
}

pub(crate) fn exited(code: i32, stdout: &str, stderr: &str) -> ToolOutput {
    ToolOutput {
        code: Some(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

pub(crate) fn probe_json(width: u32, height: u32) -> String {
    serde_json::json!({
        "programs": [],
        "streams": [{ "width": width, "height": height }]
    })
    .to_string()
}

impl FakeTools {
    pub(crate) fn video(width: u32, height: u32) -> Self {
        FakeTools {
            ffprobe: exited(0, &probe_json(width, height), ""),
            ffmpeg: exited(0, "", ""),
            hang_ffmpeg: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_ffprobe(mut self, output: ToolOutput) -> Self {
        self.ffprobe = output;
        self
    }

    pub(crate) fn with_ffmpeg(mut self, output: ToolOutput) -> Self {
        self.ffmpeg = output;
        self
    }

    /// ffmpeg writes its output and then never exits
    pub(crate) fn with_hanging_ffmpeg(mut self) -> Self {
        self.hang_ffmpeg = true;
        self
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    pub(crate) fn args(&self, command: &str) -> Option<Vec<OsString>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == command)
            .map(|(_, args)| args.clone())
    }
}

#[async_trait::async_trait(?Send)]
impl ToolRunner for FakeTools {
    async fn run(&self, command: &str, args: &[&OsStr]) -> Result<ToolOutput, ProcessError> {
        self.calls.lock().unwrap().push((
            command.to_string(),
            args.iter().map(|arg| arg.to_os_string()).collect(),
        ));

        match command {
            "ffprobe" => Ok(self.ffprobe.clone()),
            "ffmpeg" => {
                let output_path = args.last().expect("ffmpeg called without output");
                tokio::fs::write(output_path, b"remuxed")
                    .await
                    .map_err(ProcessError::Other)?;

                if self.hang_ffmpeg {
                    std::future::pending::<()>().await;
                }

                Ok(self.ffmpeg.clone())
            }
            other => Err(ProcessError::NotFound(other.to_string())),
        }
    }
}
