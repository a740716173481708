use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::PipelineError;
use crate::face::{self, Embedding, FaceEngine, Frame};
use crate::gallery::Gallery;

/// The first known face found in the video.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub name: String,
    pub gallery_index: usize,
    pub frame: PathBuf,
    pub distance: f32,
}

/// Scans `frames` in order and returns the first known face.
///
/// Only the first face of each frame is embedded. Within a frame the lowest
/// gallery index within `tolerance` wins, not the closest one. The scan stops
/// at the first frame that yields a match; frames after it are never opened.
#[tracing::instrument(skip_all, fields(frames = frames.len(), known = gallery.len()))]
pub fn scan(
    frames: &[PathBuf],
    engine: &dyn FaceEngine,
    gallery: &Gallery,
    tolerance: f32,
) -> Result<Option<Match>, PipelineError> {
    let first_faces = frames
        .iter()
        .filter_map(|path| first_face_embedding(engine, path).transpose());

    for candidate in first_faces {
        let (path, embedding) = candidate?;
        if let Some(dim) = gallery.encodings().first().map(Vec::len) {
            if embedding.len() != dim {
                return Err(PipelineError::FaceEngine(anyhow::anyhow!(
                    "embedding has dimension {}, gallery expects {dim}",
                    embedding.len()
                )));
            }
        }

        if let Some((gallery_index, distance)) = first_within(gallery, &embedding, tolerance) {
            let name = gallery
                .name(gallery_index)
                .unwrap_or_default()
                .to_string();
            tracing::info!(frame = %path.display(), name = %name, distance, "known face matched");
            return Ok(Some(Match {
                name,
                gallery_index,
                frame: path.to_path_buf(),
                distance,
            }));
        }
        tracing::debug!(frame = %path.display(), "face did not match any known face");
    }

    Ok(None)
}

// None when the frame holds no face
fn first_face_embedding<'a>(
    engine: &dyn FaceEngine,
    path: &'a Path,
) -> Result<Option<(&'a Path, Embedding)>, PipelineError> {
    let frame = Frame::open(path).map_err(PipelineError::FaceEngine)?;
    let faces = engine.detect(&frame).map_err(PipelineError::FaceEngine)?;
    let Some(first) = faces.first() else {
        tracing::trace!(frame = %path.display(), "no face in frame");
        return Ok(None);
    };
    let embedding = engine.embed(&frame, first).map_err(PipelineError::FaceEngine)?;
    Ok(Some((path, embedding)))
}

/// Lowest gallery index whose distance to `embedding` is within `tolerance`.
pub fn first_within(gallery: &Gallery, embedding: &[f32], tolerance: f32) -> Option<(usize, f32)> {
    let idx = gallery
        .encodings()
        .par_iter()
        .map(|known| face::distance(known, embedding))
        .position_first(|d| d <= tolerance)?;
    Some((idx, face::distance(&gallery.encodings()[idx], embedding)))
}
