use aws_lambda_events::event::s3::S3Event;

use crate::error::PipelineError;

/// The object whose creation triggered this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerObject {
    pub bucket: String,
    pub key: String,
}

/// Pulls the bucket and key of the first record out of a raw S3 notification.
#[tracing::instrument(skip(payload))]
pub fn parse_trigger(payload: serde_json::Value) -> Result<TriggerObject, PipelineError> {
    let event: S3Event = serde_json::from_value(payload)
        .map_err(|e| PipelineError::MalformedEvent(format!("not an S3 event: {e}")))?;

    if event.records.len() > 1 {
        tracing::warn!(
            record_count = event.records.len(),
            "only the first record of the event is processed"
        );
    }

    let record = event
        .records
        .first()
        .ok_or_else(|| PipelineError::MalformedEvent("event has no records".to_string()))?;

    let bucket = non_empty(record.s3.bucket.name.as_deref())
        .ok_or_else(|| PipelineError::MalformedEvent("missing bucket name".to_string()))?;
    let raw_key = non_empty(record.s3.object.key.as_deref())
        .ok_or_else(|| PipelineError::MalformedEvent("missing object key".to_string()))?;

    Ok(TriggerObject {
        bucket: bucket.to_string(),
        key: decode_key(raw_key)?,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// S3 form-encodes keys in notifications, spaces arrive as '+'
fn decode_key(raw: &str) -> Result<String, PipelineError> {
    let plus_decoded = raw.replace('+', " ");
    let key = urlencoding::decode(&plus_decoded)
        .map_err(|e| PipelineError::MalformedEvent(format!("object key is not UTF-8: {e}")))?;
    if key.trim().is_empty() {
        return Err(PipelineError::MalformedEvent("missing object key".to_string()));
    }
    Ok(key.into_owned())
}
