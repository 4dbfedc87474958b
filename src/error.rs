//! Error types for depot operations.
//!
//! Every core operation returns [`Result`]. The variants mirror the
//! conditions surfaced to the dispatch layer: not found, forbidden, bad
//! request, method not allowed. Quota rejection keeps its own variant for
//! logging but maps to the same status as an authorization failure.

/// Result type for depot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Depot errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No directory, artifact, pseudo-directory, share or token at this path.
    #[error("not found: {0}")]
    NotFound(String),

    /// Visibility or writability check denied the request.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Upload would push the directory over its quota.
    #[error("quota exceeded: {size} + {incoming} bytes > {quota} bytes")]
    QuotaExceeded { size: u64, incoming: u64, quota: u64 },

    /// Malformed request (missing field, unsupported format, directory delete).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The operation does not support this method.
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// A record failed validation (ownership exclusivity, path shape, quota).
    #[error("validation error: {0}")]
    Validation(String),

    /// Persistent store or blob store failure.
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// Create a bad request error.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// True for every error the caller should see as "forbidden".
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_) | Self::QuotaExceeded { .. })
    }
}

/// Convert depot error to HTTP status code.
impl Error {
    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden(_) | Self::QuotaExceeded { .. } => 403,
            Self::BadRequest(_) => 400,
            Self::MethodNotAllowed(_) => 405,
            Self::Validation(_) => 422,
            Self::Storage(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_is_forbidden() {
        let err = Error::QuotaExceeded {
            size: 14,
            incoming: 14,
            quota: 27,
        };
        assert!(err.is_forbidden());
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.to_string(), "quota exceeded: 14 + 14 bytes > 27 bytes");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::not_found("x").status_code(), 404);
        assert_eq!(Error::bad_request("x").status_code(), 400);
        assert_eq!(Error::MethodNotAllowed("PUT".into()).status_code(), 405);
        assert_eq!(Error::validation("x").status_code(), 422);
        assert_eq!(Error::Storage(anyhow::anyhow!("disk")).status_code(), 500);
    }
}
