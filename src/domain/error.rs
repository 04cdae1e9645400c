use thiserror::Error;

/// Core domain errors
///
/// Propagation policy: `Cache` failures are absorbed inside the layer and
/// degrade reads to the slow path (they are logged, never surfaced to
/// callers); `Backend` failures always propagate since the layer cannot
/// fabricate a correct answer; `NotFound` is the caller-visible absence
/// signal.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true for conditions the cache layer absorbs rather than
    /// propagates (see the type-level policy note).
    pub fn is_cache(&self) -> bool {
        matches!(self, Self::Cache { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("entity 'question:7' not found");
        assert_eq!(
            error.to_string(),
            "Not found: entity 'question:7' not found"
        );
        assert!(error.is_not_found());
    }

    #[test]
    fn test_cache_error_is_absorbable() {
        let error = DomainError::cache("connection refused");
        assert!(error.is_cache());
        assert!(!error.is_not_found());
    }

    #[test]
    fn test_backend_error() {
        let error = DomainError::backend("query failed");
        assert_eq!(error.to_string(), "Backend error: query failed");
        assert!(!error.is_cache());
    }
}
