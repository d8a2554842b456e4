use thiserror::Error;

/// Uniform error shape for helpdesk and provider client operations: a
/// machine-readable code, a human message, whether the caller should
/// retry, and an optional backoff hint in milliseconds.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct BridgeError {
    code: String,
    message: String,
    retryable: bool,
    backoff_ms: Option<u64>,
    #[source]
    source: Option<anyhow::Error>,
}

impl BridgeError {
    pub fn permanent(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: false,
            backoff_ms: None,
            source: None,
        }
    }

    pub fn retryable(code: impl Into<String>, message: impl Into<String>, backoff_ms: u64) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            retryable: true,
            backoff_ms: Some(backoff_ms),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn backoff_ms(&self) -> Option<u64> {
        self.backoff_ms
    }
}

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        Self::permanent("E_INTERNAL", err.to_string()).with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_is_not_retryable() {
        let err = BridgeError::permanent("E_BAD_REQUEST", "missing field");
        assert!(!err.is_retryable());
        assert_eq!(err.backoff_ms(), None);
        assert_eq!(err.code(), "E_BAD_REQUEST");
    }

    #[test]
    fn retryable_carries_backoff() {
        let err = BridgeError::retryable("E_THROTTLED", "429", 2000);
        assert!(err.is_retryable());
        assert_eq!(err.backoff_ms(), Some(2000));
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = BridgeError::permanent("E_X", "boom");
        assert_eq!(err.to_string(), "E_X: boom");
    }
}
