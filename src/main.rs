use std::sync::Arc;

use aws_config::BehaviorVersion;
use lambda_runtime::{run, service_fn, tracing, Error, LambdaEvent};

mod config;
mod context;
mod directory;
mod error;
mod event;
mod face;
mod frames;
mod gallery;
mod handler;
mod matcher;
mod naming;
mod pipeline;
mod scratch;
mod storage;

use config::{init_thread_pool, Config};
use context::Context;
use directory::DynamoStudentDirectory;
use face::OnnxFaceEngine;
use frames::FfmpegExtractor;
use handler::function_handler;
use storage::S3ObjectStore;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env()?;
    tracing::debug!(?config, "initialized config");

    // Initialize Rayon thread pool at cold start (once per container lifecycle)
    init_thread_pool(config.workers);

    let shared_config = aws_config::load_defaults(BehaviorVersion::v2025_01_17()).await;
    let faces = OnnxFaceEngine::new(
        &config.detector_model_path,
        &config.embedder_model_path,
        config.detection_threshold,
        config.workers,
    )?;

    let ctx = Context {
        objects: Arc::new(S3ObjectStore::new(aws_sdk_s3::Client::new(&shared_config))),
        directory: Arc::new(DynamoStudentDirectory::new(
            aws_sdk_dynamodb::Client::new(&shared_config),
            config.student_table.clone(),
        )),
        extractor: Arc::new(FfmpegExtractor::new(config.ffmpeg_path.clone(), config.frame_rate)),
        faces: Arc::new(faces),
        config,
    };

    run(service_fn(move |event: LambdaEvent<serde_json::Value>| {
        let ctx = ctx.clone();
        async move { function_handler(ctx, event).await }
    }))
    .await
}
