use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Once;

use anyhow::Context;

static INIT: Once = Once::new();

/// The configuration parameters for the function.
///
/// Everything is pulled from environment variables set on the Lambda; every
/// value has a default matching the standard deployment layout.
#[derive(Debug, Clone)]
pub struct Config {
    /// DynamoDB table holding one record per student, keyed by `name`.
    pub student_table: String,

    /// Bundled known-faces gallery, relative to the task root.
    pub gallery_path: PathBuf,

    /// Root of invocation-local scratch space.
    pub scratch_dir: PathBuf,

    /// Decoder binary used for frame extraction.
    pub ffmpeg_path: String,

    /// Frames sampled per second of video.
    pub frame_rate: u32,

    /// Fail the run when the decoder exits non-zero instead of falling
    /// through to the frame count.
    pub strict_decoder: bool,

    /// Maximum embedding distance considered the same person.
    pub match_tolerance: f32,

    pub detector_model_path: PathBuf,
    pub embedder_model_path: PathBuf,

    /// Minimum detector confidence for a face box.
    pub detection_threshold: f32,

    /// Threads for the rayon pool and ONNX intra-op parallelism.
    pub workers: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let string = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let config = Config {
            student_table: string("STUDENT_TABLE", "student_data"),
            gallery_path: string("GALLERY_PATH", "encoding").into(),
            scratch_dir: string("SCRATCH_DIR", "/tmp").into(),
            ffmpeg_path: string("FFMPEG_PATH", "ffmpeg"),
            frame_rate: parse(&lookup, "FRAME_RATE", 1)?,
            strict_decoder: parse(&lookup, "STRICT_DECODER", false)?,
            match_tolerance: parse(&lookup, "MATCH_TOLERANCE", 0.55)?,
            detector_model_path: string("DETECTOR_MODEL_PATH", "models/face_detector.onnx").into(),
            embedder_model_path: string("EMBEDDER_MODEL_PATH", "models/face_embedder.onnx").into(),
            detection_threshold: parse(&lookup, "DETECTION_THRESHOLD", 0.7)?,
            workers: worker_count(lookup("WORKER_COUNT")),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.frame_rate == 0 {
            anyhow::bail!("FRAME_RATE must be at least 1");
        }
        if !self.match_tolerance.is_finite() || self.match_tolerance < 0.0 {
            anyhow::bail!(
                "MATCH_TOLERANCE must be a non-negative number, got {}",
                self.match_tolerance
            );
        }
        if !(0.0..=1.0).contains(&self.detection_threshold) {
            anyhow::bail!(
                "DETECTION_THRESHOLD must be between 0 and 1, got {}",
                self.detection_threshold
            );
        }
        Ok(())
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{name} must be a valid value, got {raw:?}")),
        None => Ok(default),
    }
}

// Worker count from env var or detected CPUs, clamped to 1-6
fn worker_count(raw: Option<String>) -> usize {
    if let Some(count) = raw.and_then(|s| s.parse::<usize>().ok()) {
        return count.clamp(1, 6);
    }
    num_cpus::get().clamp(1, 6)
}

// Initialize Rayon global thread pool (only once per Lambda container)
pub fn init_thread_pool(workers: usize) {
    INIT.call_once(|| {
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build_global();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.student_table, "student_data");
        assert_eq!(config.gallery_path, PathBuf::from("encoding"));
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp"));
        assert_eq!(config.frame_rate, 1);
        assert!(!config.strict_decoder);
        assert!((config.match_tolerance - 0.55).abs() < f32::EPSILON);
        assert!((1..=6).contains(&config.workers));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("STUDENT_TABLE", "people"),
            ("STRICT_DECODER", "true"),
            ("MATCH_TOLERANCE", "0.4"),
            ("WORKER_COUNT", "64"),
        ]))
        .unwrap();
        assert_eq!(config.student_table, "people");
        assert!(config.strict_decoder);
        assert!((config.match_tolerance - 0.4).abs() < f32::EPSILON);
        assert_eq!(config.workers, 6);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[("FRAME_RATE", "fast")])).unwrap_err();
        assert!(err.to_string().contains("FRAME_RATE"));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        for (name, value) in [
            ("FRAME_RATE", "0"),
            ("MATCH_TOLERANCE", "NaN"),
            ("MATCH_TOLERANCE", "-0.1"),
            ("MATCH_TOLERANCE", "inf"),
            ("DETECTION_THRESHOLD", "1.5"),
            ("DETECTION_THRESHOLD", "NaN"),
        ] {
            let err = Config::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(err.to_string().contains(name), "{name}={value}: {err}");
        }
    }

    #[test]
    fn test_zero_tolerance_is_allowed() {
        let config = Config::from_lookup(lookup(&[("MATCH_TOLERANCE", "0")])).unwrap();
        assert_eq!(config.match_tolerance, 0.0);
    }

    #[test]
    fn test_worker_count_falls_back_on_garbage() {
        assert_eq!(worker_count(Some("0".into())), 1);
        assert!((1..=6).contains(&worker_count(Some("lots".into()))));
    }
}
