use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use image::imageops::FilterType;
use image::DynamicImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

const DETECTOR_WIDTH: u32 = 320;
const DETECTOR_HEIGHT: u32 = 240;
const EMBEDDER_SIZE: u32 = 112;
const NMS_IOU_THRESHOLD: f32 = 0.3;

/// Face embedding, L2-normalised.
pub type Embedding = Vec<f32>;

/// One decoded frame and where it came from.
pub struct Frame {
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl Frame {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let image = image::open(path).context(format!("could not decode frame {}", path.display()))?;
        Ok(Frame {
            path: path.to_path_buf(),
            image,
        })
    }
}

/// Pixel-space face region.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
}

impl FaceBox {
    fn iou(&self, other: &FaceBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }
        let intersection = ((x2 - x1) * (y2 - y1)) as f32;
        let union = (self.width * self.height + other.width * other.height) as f32 - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// Face detection and embedding, the two primitives the matcher needs.
pub trait FaceEngine: Send + Sync {
    /// Faces found in `frame`, first face first.
    fn detect(&self, frame: &Frame) -> anyhow::Result<Vec<FaceBox>>;

    /// Embedding of one detected face.
    fn embed(&self, frame: &Frame, face: &FaceBox) -> anyhow::Result<Embedding>;
}

/// Euclidean distance between two embeddings.
pub fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Two-stage ONNX face engine: an UltraFace-style detector followed by an
/// ArcFace-style embedder. Sessions are built once per container.
pub struct OnnxFaceEngine {
    detector: Mutex<Session>,
    embedder: Mutex<Session>,
    confidence_threshold: f32,
}

impl OnnxFaceEngine {
    pub fn new(
        detector_path: &Path,
        embedder_path: &Path,
        confidence_threshold: f32,
        threads: usize,
    ) -> anyhow::Result<Self> {
        let detector = session(detector_path, threads).context("failed to create detector session")?;
        let embedder = session(embedder_path, threads).context("failed to create embedder session")?;
        tracing::info!(
            detector = %detector_path.display(),
            embedder = %embedder_path.display(),
            "face models loaded"
        );
        Ok(Self {
            detector: Mutex::new(detector),
            embedder: Mutex::new(embedder),
            confidence_threshold,
        })
    }
}

fn session(path: &Path, threads: usize) -> anyhow::Result<Session> {
    if !path.exists() {
        anyhow::bail!("model missing at {}", path.display());
    }
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(threads)?
        .commit_from_file(path)?;
    Ok(session)
}

// NCHW float tensor data, RGB order
fn to_chw(image: &DynamicImage, width: u32, height: u32, mean: f32, scale: f32) -> Vec<f32> {
    let rgb = image.resize_exact(width, height, FilterType::Triangle).to_rgb8();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = (pixel[c] as f32 - mean) / scale;
        }
    }
    data
}

fn non_max_suppression(mut boxes: Vec<FaceBox>) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<FaceBox> = Vec::new();
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) <= NMS_IOU_THRESHOLD) {
            kept.push(candidate);
        }
    }
    kept
}

// UltraFace emits [1, N, 2] class scores and [1, N, 4] normalised corners
fn decode_detections(
    scores: &[f32],
    corners: &[f32],
    image_width: u32,
    image_height: u32,
    threshold: f32,
) -> Vec<FaceBox> {
    let count = (scores.len() / 2).min(corners.len() / 4);
    let (w, h) = (image_width as f32, image_height as f32);
    let mut boxes = Vec::new();
    for i in 0..count {
        let confidence = scores[i * 2 + 1];
        if confidence < threshold {
            continue;
        }
        let c = &corners[i * 4..i * 4 + 4];
        let x1 = (c[0] * w).clamp(0.0, w);
        let y1 = (c[1] * h).clamp(0.0, h);
        let x2 = (c[2] * w).clamp(0.0, w);
        let y2 = (c[3] * h).clamp(0.0, h);
        if x2 - x1 < 1.0 || y2 - y1 < 1.0 {
            continue;
        }
        boxes.push(FaceBox {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
            confidence,
        });
    }
    non_max_suppression(boxes)
}

fn normalize(mut embedding: Embedding) -> anyhow::Result<Embedding> {
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 || !norm.is_finite() {
        anyhow::bail!("embedder produced a degenerate vector");
    }
    embedding.iter_mut().for_each(|x| *x /= norm);
    Ok(embedding)
}

impl FaceEngine for OnnxFaceEngine {
    fn detect(&self, frame: &Frame) -> anyhow::Result<Vec<FaceBox>> {
        let data = to_chw(&frame.image, DETECTOR_WIDTH, DETECTOR_HEIGHT, 127.0, 128.0);
        let input = Tensor::from_array((vec![1i64, 3, DETECTOR_HEIGHT as i64, DETECTOR_WIDTH as i64], data))
            .context("failed to create detector input tensor")?;

        let mut session = self
            .detector
            .lock()
            .map_err(|_| anyhow::anyhow!("detector session lock poisoned"))?;
        let input_name = session.inputs[0].name.clone();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let (scores_name, boxes_name) = match output_names.as_slice() {
            [scores, boxes, ..] => (scores.clone(), boxes.clone()),
            _ => anyhow::bail!("detector must have score and box outputs"),
        };

        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("detector inference failed")?;
        let (_, scores) = outputs
            .get(&scores_name)
            .context("detector produced no scores")?
            .try_extract_tensor::<f32>()?;
        let (_, corners) = outputs
            .get(&boxes_name)
            .context("detector produced no boxes")?
            .try_extract_tensor::<f32>()?;

        let faces = decode_detections(
            scores,
            corners,
            frame.image.width(),
            frame.image.height(),
            self.confidence_threshold,
        );
        tracing::trace!(frame = %frame.path.display(), faces = faces.len(), "detection done");
        Ok(faces)
    }

    fn embed(&self, frame: &Frame, face: &FaceBox) -> anyhow::Result<Embedding> {
        let crop = frame.image.crop_imm(face.x, face.y, face.width.max(1), face.height.max(1));
        let data = to_chw(&crop, EMBEDDER_SIZE, EMBEDDER_SIZE, 127.5, 128.0);
        let input = Tensor::from_array((vec![1i64, 3, EMBEDDER_SIZE as i64, EMBEDDER_SIZE as i64], data))
            .context("failed to create embedder input tensor")?;

        let mut session = self
            .embedder
            .lock()
            .map_err(|_| anyhow::anyhow!("embedder session lock poisoned"))?;
        let input_name = session.inputs[0].name.clone();
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .context("embedder has no outputs")?;

        let outputs = session
            .run(ort::inputs![input_name => input])
            .context("embedder inference failed")?;
        let (_, raw) = outputs
            .get(&output_name)
            .context("embedder produced no output")?
            .try_extract_tensor::<f32>()?;

        normalize(raw.to_vec())
    }
}
