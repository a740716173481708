use std::sync::Arc;

use crate::config::Config;
use crate::directory::StudentDirectory;
use crate::face::FaceEngine;
use crate::frames::FrameExtractor;
use crate::storage::ObjectStore;

/// Service handles built once at cold start and shared by every invocation.
#[derive(Clone)]
pub struct Context {
    pub objects: Arc<dyn ObjectStore>,
    pub directory: Arc<dyn StudentDirectory>,
    pub extractor: Arc<dyn FrameExtractor>,
    pub faces: Arc<dyn FaceEngine>,
    pub config: Config,
}
