use thiserror::Error;

use super::provider::ProviderKind;

#[derive(Error, Debug)]
pub enum SnapError {
    #[error("The {0} provider requires an API key")]
    MissingApiKey(ProviderKind),

    #[error("Invalid snapper configuration: {0}")]
    InvalidConfig(String),

    #[error("Underlying request failed: {0}")]
    Request(#[from] reqwest::Error),

    // Non-success HTTP status, body kept for the log line
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse provider response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider found no match: {0}")]
    NoMatch(String),

    #[error("Match confidence {confidence:.3} is below {threshold}")]
    LowConfidence { confidence: f64, threshold: f64 },
}

impl SnapError {
    /// Failures worth another attempt: timeouts, refused connections, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            SnapError::Request(e) => e.is_timeout() || e.is_connect(),
            SnapError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let status = |status| SnapError::Status {
            status,
            body: String::new(),
        };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!SnapError::NoMatch("nothing".into()).is_transient());
        assert!(!SnapError::LowConfidence {
            confidence: 0.5,
            threshold: 0.75
        }
        .is_transient());
    }
}
