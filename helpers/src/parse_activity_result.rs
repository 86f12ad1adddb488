use anyhow::anyhow;
use temporal_sdk_core_protos::coresdk::activity_result::{activity_resolution, ActivityResolution};
use temporal_sdk_core_protos::coresdk::FromJsonPayloadExt;

/// Decode an [`ActivityResolution`] into the activity's typed return value.
///
/// A failed, cancelled or backed-off resolution becomes an `Err` carrying the
/// server-reported failure message, so workflows can log or classify it
/// without digging through the proto themselves.
pub fn parse_activity_result<T: FromJsonPayloadExt>(
    resolution: &ActivityResolution,
) -> Result<T, anyhow::Error> {
    match resolution.status.as_ref() {
        Some(activity_resolution::Status::Completed(success)) => {
            let payload = success
                .result
                .as_ref()
                .ok_or_else(|| anyhow!("activity completed without a result payload"))?;
            Ok(T::from_json_payload(payload)?)
        }
        Some(activity_resolution::Status::Failed(failed)) => {
            let message = failed
                .failure
                .as_ref()
                .map(|f| f.message.clone())
                .unwrap_or_else(|| "activity failed".to_string());
            Err(anyhow!(message))
        }
        Some(activity_resolution::Status::Cancelled(_)) => Err(anyhow!("activity was cancelled")),
        Some(activity_resolution::Status::Backoff(_)) => {
            Err(anyhow!("activity is backing off for retry"))
        }
        None => Err(anyhow!("activity resolution carried no status")),
    }
}
