//! Retry classification and backoff for caption requests.

use std::time::Duration;

use crate::error::PipelineError;

/// Whether a failed caption request is worth retrying.
///
/// Timeouts, rate limits (429), server errors (5xx) and connection failures
/// are transient. Everything else (unknown model, bad request) is not.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } => true,
        PipelineError::Caption {
            status_code: Some(code),
            ..
        } => *code == 429 || (500..=599).contains(code),
        PipelineError::Caption {
            status_code: None,
            message,
        } => message.contains("timed out") || message.contains("connect"),
        _ => false,
    }
}

/// `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn caption_error(status_code: Option<u16>, message: &str) -> PipelineError {
        PipelineError::Caption {
            message: message.to_string(),
            status_code,
        }
    }

    #[test]
    fn test_transient_http_errors_are_retryable() {
        assert!(is_retryable(&caption_error(Some(429), "slow down")));
        assert!(is_retryable(&caption_error(Some(503), "loading model")));
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!is_retryable(&caption_error(Some(404), "model 'llava' not found")));
        assert!(!is_retryable(&caption_error(Some(400), "bad request")));
    }

    #[test]
    fn test_status_less_errors_use_message() {
        assert!(is_retryable(&caption_error(None, "error trying to connect")));
        assert!(!is_retryable(&caption_error(None, "generated 500 tokens")));
    }

    #[test]
    fn test_timeout_is_retryable() {
        let err = PipelineError::Timeout {
            path: PathBuf::from("cat.jpg"),
            stage: "caption".to_string(),
            timeout_ms: 1000,
        };
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_other_stages_not_retryable() {
        let err = PipelineError::Decode {
            path: PathBuf::from("cat.jpg"),
            message: "invalid header".to_string(),
        };
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_backoff() {
        assert_eq!(backoff_duration(0, 500), Duration::from_millis(500));
        assert_eq!(backoff_duration(2, 500), Duration::from_millis(2000));
        assert_eq!(backoff_duration(20, 500), Duration::from_millis(30_000));
    }
}
