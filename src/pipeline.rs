use anyhow::Context as _;

use crate::context::Context;
use crate::directory::StudentRecord;
use crate::error::PipelineError;
use crate::event::TriggerObject;
use crate::frames;
use crate::gallery::Gallery;
use crate::matcher;
use crate::naming;
use crate::scratch::ScratchSpace;

/// A completed identification: what was written and where.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub output_bucket: String,
    pub result_key: String,
    pub record: StudentRecord,
}

/// Runs one video through download, frame extraction, matching, lookup and
/// upload. Scratch files are removed on every exit path when `scratch` drops.
#[tracing::instrument(skip(ctx), fields(bucket = %trigger.bucket, key = %trigger.key))]
pub async fn identify(ctx: &Context, trigger: &TriggerObject) -> Result<Outcome, PipelineError> {
    let output_bucket = naming::derive_output_bucket(&trigger.bucket);
    let result_key = naming::derive_result_key(&trigger.key);
    tracing::info!(output_bucket = %output_bucket, result_key = %result_key, "processing video");

    let scratch = ScratchSpace::prepare(&ctx.config.scratch_dir, &trigger.key, &result_key)
        .map_err(PipelineError::Scratch)?;

    tracing::trace!("downloading video");
    ctx.objects
        .download(&trigger.bucket, &trigger.key, scratch.video_path())
        .await
        .map_err(PipelineError::Storage)?;

    tracing::trace!("extracting frames");
    let report = ctx
        .extractor
        .extract(scratch.video_path(), scratch.frame_dir())
        .await
        .map_err(PipelineError::Decode)?;
    if !report.success && ctx.config.strict_decoder {
        return Err(PipelineError::Decode(anyhow::anyhow!(
            "decoder exited with code {:?}: {}",
            report.exit_code,
            report.stderr
        )));
    }

    let gallery = Gallery::load(&ctx.config.gallery_path).map_err(PipelineError::GalleryLoad)?;

    let frames = frames::list_frames(scratch.frame_dir()).map_err(PipelineError::Scratch)?;
    if frames.is_empty() {
        tracing::warn!("decoder produced no frames");
        return Err(PipelineError::NoFramesExtracted {
            video: trigger.key.clone(),
        });
    }
    tracing::info!(frames = frames.len(), "frames extracted");

    let frame_count = frames.len();
    let faces = ctx.faces.clone();
    let tolerance = ctx.config.match_tolerance;
    let span = tracing::Span::current();
    let scanned = tokio::task::spawn_blocking(move || {
        let _entered = span.enter();
        matcher::scan(&frames, faces.as_ref(), &gallery, tolerance)
    })
    .await;
    let found = match scanned {
        Ok(result) => result?,
        // surfaces at the invocation boundary like any other panic
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => return Err(PipelineError::FaceEngine(anyhow::anyhow!("frame scan cancelled: {err}"))),
    }
    .ok_or(PipelineError::NoMatch {
        frames: frame_count,
    })?;

    tracing::debug!(
        name = %found.name,
        gallery_index = found.gallery_index,
        distance = found.distance,
        frame = %found.frame.display(),
        "looking up student"
    );

    let record = ctx
        .directory
        .get(&found.name)
        .await
        .map_err(PipelineError::Directory)?
        .ok_or_else(|| PipelineError::RecordNotFound {
            name: found.name.clone(),
        })?;

    let line = record.result_line();
    tracing::info!(result = %line, "student record found");
    tokio::fs::write(scratch.result_path(), &line)
        .await
        .context("could not write result file")
        .map_err(PipelineError::Scratch)?;

    ctx.objects
        .upload(scratch.result_path(), &output_bucket, &result_key)
        .await
        .map_err(PipelineError::Storage)?;
    tracing::info!("result uploaded");

    Ok(Outcome {
        output_bucket,
        result_key,
        record,
    })
}
