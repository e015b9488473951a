//! One wide summary event per pipeline run.

use serde_json::{json, Value};

use crate::pipeline::PipelineRunResult;

/// Event type of the run summary.
pub const RUN_SUMMARY_EVENT: &str = "pipeline.run";

/// Builds the summary payload for a finished run.
#[must_use]
pub fn run_summary(result: &PipelineRunResult, stages: &[String]) -> Value {
    let mut payload = json!({
        "type": RUN_SUMMARY_EVENT,
        "run_id": result.run_id.to_string(),
        "status": if result.success { "succeeded" } else { "failed" },
        "duration_ms": result.duration_ms,
        "stages": stages,
        "finished_at": chrono::Utc::now().to_rfc3339(),
    });

    if let Some(error) = &result.error {
        payload["error"] = json!(error);
    }
    if let Some(cause) = &result.cause {
        payload["cause"] = json!(cause);
    }
    if let Some(Value::Object(output)) = &result.output {
        let mut keys: Vec<&String> = output.keys().collect();
        keys.sort();
        payload["output_keys"] = json!(keys);
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_failed_run_summary() {
        let result = PipelineRunResult {
            run_id: Uuid::nil(),
            success: false,
            output: None,
            error: Some("Failure".to_string()),
            cause: Some("Dataset reached status CREATE FAILED".to_string()),
            duration_ms: 12,
        };

        let payload = run_summary(&result, &["DatasetGroupTask".to_string()]);

        assert_eq!(payload["status"], "failed");
        assert_eq!(payload["error"], "Failure");
        assert_eq!(payload["stages"], json!(["DatasetGroupTask"]));
        assert!(payload.get("output_keys").is_none());
    }

    #[test]
    fn test_output_keys_are_sorted() {
        let result = PipelineRunResult {
            run_id: Uuid::nil(),
            success: true,
            output: Some(json!({"Region": "us-east-1", "AccountID": "1"})),
            error: None,
            cause: None,
            duration_ms: 1,
        };

        let payload = run_summary(&result, &[]);

        assert_eq!(payload["output_keys"], json!(["AccountID", "Region"]));
        assert!(payload.get("error").is_none());
    }
}
