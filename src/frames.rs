use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::Context;
use async_trait::async_trait;

/// Zero-padded so that filename order equals temporal order.
pub const FRAME_PATTERN: &str = "image-%03d.jpeg";

/// What the decoder left behind: its exit status and captured diagnostics.
#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ExtractReport {
    fn from_status(status: ExitStatus, stderr: &[u8]) -> Self {
        Self {
            success: status.success(),
            exit_code: status.code(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

/// Decodes a video file into still frames written to `out_dir`.
///
/// Errors mean the decoder could not be run at all. A decoder that ran and
/// failed is reported through [`ExtractReport`] so the caller decides policy.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn extract(&self, video: &Path, out_dir: &Path) -> anyhow::Result<ExtractReport>;
}

#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    binary: String,
    frame_rate: u32,
}

impl FfmpegExtractor {
    pub fn new(binary: impl Into<String>, frame_rate: u32) -> Self {
        Self {
            binary: binary.into(),
            frame_rate,
        }
    }

    fn command(&self, video: &Path, out_dir: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.binary);
        // global options must come before the input/output options
        cmd.args(["-v", "error", "-hide_banner", "-nostats", "-nostdin", "-y"]);
        cmd.arg("-i")
            .arg(video)
            .arg("-r")
            .arg(self.frame_rate.to_string())
            .arg(out_dir.join(FRAME_PATTERN));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl FrameExtractor for FfmpegExtractor {
    #[tracing::instrument(skip(self))]
    async fn extract(&self, video: &Path, out_dir: &Path) -> anyhow::Result<ExtractReport> {
        let output = self
            .command(video, out_dir)
            .output()
            .await
            .context(format!("failed to spawn {}", self.binary))?;
        let report = ExtractReport::from_status(output.status, &output.stderr);
        if !report.success {
            tracing::warn!(exit_code = ?report.exit_code, stderr = %report.stderr, "decoder exited with failure");
        }
        Ok(report)
    }
}

/// Extracted frames in temporal order.
///
/// `%03d` is only a minimum width, so `image-1000.jpeg` follows
/// `image-999.jpeg`; frames are ordered by their numeric index, with the
/// filename breaking ties and ordering anything without an index.
pub fn list_frames(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir).context(format!("could not read {}", dir.display()))? {
        let path = entry.context("could not read frame entry")?.path();
        let is_jpeg = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jpeg") || e.eq_ignore_ascii_case("jpg"))
            .unwrap_or(false);
        if is_jpeg && path.is_file() {
            frames.push(path);
        }
    }
    frames.sort_by(|a, b| {
        frame_index(a)
            .cmp(&frame_index(b))
            .then_with(|| a.cmp(b))
    });
    Ok(frames)
}

// `image-0042.jpeg` -> Some(42); None sorts before every indexed frame
fn frame_index(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.rsplit_once('-').map_or(stem, |(_, idx)| idx);
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_frames_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["image-010.jpeg", "image-002.jpeg", "image-001.jpeg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.jpeg")).unwrap();

        let names: Vec<String> = list_frames(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, ["image-001.jpeg", "image-002.jpeg", "image-010.jpeg"]);
    }

    #[test]
    fn test_list_frames_past_three_digits() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["image-1000.jpeg", "image-101.jpeg", "image-999.jpeg", "image-100.jpeg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let names: Vec<String> = list_frames(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            names,
            ["image-100.jpeg", "image-101.jpeg", "image-999.jpeg", "image-1000.jpeg"]
        );
    }

    #[test]
    fn test_list_frames_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_frames(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_command_line() {
        let extractor = FfmpegExtractor::new("ffmpeg", 1);
        let cmd = extractor.command(Path::new("/tmp/Test_0.mp4"), Path::new("/tmp/frames"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "-v",
                "error",
                "-hide_banner",
                "-nostats",
                "-nostdin",
                "-y",
                "-i",
                "/tmp/Test_0.mp4",
                "-r",
                "1",
                "/tmp/frames/image-%03d.jpeg",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FfmpegExtractor::new("definitely-not-a-decoder-binary", 1);
        let result = extractor
            .extract(&dir.path().join("Test_0.mp4"), dir.path())
            .await;
        assert!(result.is_err());
    }
}
