use thiserror::Error;

/// Terminal failures of one identification run.
///
/// Every variant maps to exactly one response status; nothing is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed trigger event: {0}")]
    MalformedEvent(String),

    #[error("no frames were extracted from {video}")]
    NoFramesExtracted { video: String },

    #[error("no known face matched in {frames} frames")]
    NoMatch { frames: usize },

    #[error("no record found for student {name}")]
    RecordNotFound { name: String },

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("decoder error: {0:#}")]
    Decode(anyhow::Error),

    #[error("gallery load error: {0:#}")]
    GalleryLoad(anyhow::Error),

    #[error("face engine error: {0:#}")]
    FaceEngine(anyhow::Error),

    #[error("directory error: {0:#}")]
    Directory(anyhow::Error),

    #[error("scratch storage error: {0:#}")]
    Scratch(anyhow::Error),
}

impl PipelineError {
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::MalformedEvent(_) | PipelineError::NoFramesExtracted { .. } => 400,
            PipelineError::NoMatch { .. } | PipelineError::RecordNotFound { .. } => 404,
            PipelineError::Storage(_)
            | PipelineError::Decode(_)
            | PipelineError::GalleryLoad(_)
            | PipelineError::FaceEngine(_)
            | PipelineError::Directory(_)
            | PipelineError::Scratch(_) => 500,
        }
    }

    /// Client-facing errors carry a short plain message; server errors are
    /// reported with their full chain.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
