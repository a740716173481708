use lambda_runtime::{Error, LambdaEvent};
use serde::Serialize;

use crate::context::Context;
use crate::error::PipelineError;
use crate::event;
use crate::pipeline;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl Response {
    fn ok(message: String) -> Self {
        Response {
            status_code: 200,
            body: serde_json::Value::String(message).to_string(),
        }
    }

    fn from_error(err: &PipelineError) -> Self {
        let body = if err.is_client_error() {
            err.to_string()
        } else {
            serde_json::Value::String(format!("internal server error: {err}")).to_string()
        };
        Response {
            status_code: err.status_code(),
            body,
        }
    }
}

/// Main Lambda handler - identifies the student in one uploaded video.
///
/// Every pipeline outcome, including a panic inside the run, becomes a
/// response; only the runtime itself can make this return `Err`.
#[tracing::instrument(skip(ctx, event), fields(request_id = %event.context.request_id))]
pub async fn function_handler(
    ctx: Context,
    event: LambdaEvent<serde_json::Value>,
) -> Result<Response, Error> {
    let trigger = match event::parse_trigger(event.payload) {
        Ok(trigger) => trigger,
        Err(err) => {
            tracing::error!(error = ?err, "could not parse trigger event");
            return Ok(Response::from_error(&err));
        }
    };

    let run_trigger = trigger.clone();
    let run = tokio::spawn(async move { pipeline::identify(&ctx, &run_trigger).await });

    let response = match run.await {
        Ok(Ok(outcome)) => {
            tracing::info!(student = %outcome.record.name, "identification complete");
            Response::ok(format!(
                "processed {}, result saved to {}/{}",
                trigger.key, outcome.output_bucket, outcome.result_key
            ))
        }
        Ok(Err(err)) => {
            if err.is_client_error() {
                tracing::warn!(error = %err, status = err.status_code(), "identification ended without a result");
            } else {
                tracing::error!(error = ?err, status = err.status_code(), "identification failed");
            }
            Response::from_error(&err)
        }
        Err(join_err) => {
            tracing::error!(error = ?join_err, "identification task aborted");
            Response {
                status_code: 500,
                body: serde_json::Value::String(format!("internal server error: {join_err}"))
                    .to_string(),
            }
        }
    };

    Ok(response)
}
