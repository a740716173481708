use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::naming;

/// Invocation-local files, removed when the value is dropped.
///
/// Lambda may reuse an execution environment, so `/tmp` is not guaranteed to
/// be fresh. Every path is existence-checked on cleanup; a run that failed
/// before creating some of them does not raise a second error.
#[derive(Debug)]
pub struct ScratchSpace {
    video: PathBuf,
    frames: PathBuf,
    result: PathBuf,
}

impl ScratchSpace {
    /// Lays out scratch paths for `video_key` under `root` and creates a
    /// fresh frame directory, discarding one left behind by an earlier run.
    #[tracing::instrument]
    pub fn prepare(root: &Path, video_key: &str, result_key: &str) -> anyhow::Result<Self> {
        let scratch = ScratchSpace {
            video: root.join(format!("video-{}", naming::scratch_file_name(video_key))),
            frames: root.join("frames"),
            result: root.join(format!("{}.result", naming::scratch_file_name(result_key))),
        };

        if scratch.frames.exists() {
            tracing::warn!(dir = %scratch.frames.display(), "removing stale frame directory");
            std::fs::remove_dir_all(&scratch.frames).context("could not remove stale frames")?;
        }
        std::fs::create_dir_all(&scratch.frames).context("could not create frame directory")?;

        Ok(scratch)
    }

    pub fn video_path(&self) -> &Path {
        &self.video
    }

    pub fn frame_dir(&self) -> &Path {
        &self.frames
    }

    pub fn result_path(&self) -> &Path {
        &self.result
    }

    fn cleanup(&self) {
        tracing::debug!("cleaning up scratch files");
        for file in [&self.video, &self.result] {
            if file.exists() {
                if let Err(e) = std::fs::remove_file(file) {
                    tracing::warn!(error = ?e, path = %file.display(), "could not remove scratch file");
                }
            }
        }
        if self.frames.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.frames) {
                tracing::warn!(error = ?e, dir = %self.frames.display(), "could not remove frame directory");
            }
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_lays_out_paths() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::prepare(root.path(), "class/Test_0.mp4", "class/Test_0").unwrap();
        assert_eq!(scratch.video_path(), root.path().join("video-class_Test_0.mp4"));
        assert_eq!(scratch.result_path(), root.path().join("class_Test_0.result"));
        assert!(scratch.frame_dir().is_dir());
    }

    #[test]
    fn test_key_named_like_frame_dir() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::prepare(root.path(), "frames", "frames").unwrap();
        std::fs::write(scratch.video_path(), b"video").unwrap();
        std::fs::write(scratch.result_path(), b"Alice,CS,2025,").unwrap();

        assert!(scratch.frame_dir().is_dir());
        assert_ne!(scratch.video_path(), scratch.frame_dir());
        assert_ne!(scratch.result_path(), scratch.frame_dir());
    }

    #[test]
    fn test_prepare_discards_stale_frames() {
        let root = tempfile::tempdir().unwrap();
        let stale = root.path().join("frames");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("image-001.jpeg"), b"old").unwrap();

        let scratch = ScratchSpace::prepare(root.path(), "Test_0.mp4", "Test_0").unwrap();
        assert_eq!(std::fs::read_dir(scratch.frame_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        {
            let scratch = ScratchSpace::prepare(root.path(), "Test_0.mp4", "Test_0").unwrap();
            std::fs::write(scratch.video_path(), b"video").unwrap();
            std::fs::write(scratch.frame_dir().join("image-001.jpeg"), b"frame").unwrap();
            std::fs::write(scratch.result_path(), b"Alice,CS,2025,").unwrap();
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_drop_tolerates_missing_files() {
        let root = tempfile::tempdir().unwrap();
        {
            let scratch = ScratchSpace::prepare(root.path(), "Test_0.mp4", "Test_0").unwrap();
            std::fs::remove_dir(scratch.frame_dir()).unwrap();
        }
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
