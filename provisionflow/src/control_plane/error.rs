//! Control-plane error classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a control-plane error, derived from its error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiErrorKind {
    /// The resource already exists.
    ResourceAlreadyExists,
    /// An account or service limit was hit.
    LimitExceeded,
    /// Another operation holds the resource.
    ResourceInUse,
    /// Request rate throttled.
    Throttling,
    /// The service failed internally.
    InternalService,
    /// The service timed out.
    OperationTimeout,
    /// The request was malformed.
    InvalidInput,
    /// Any other code.
    Other,
}

impl ApiErrorKind {
    /// Classifies an error code such as `LimitExceededException` or
    /// `Personalize.Client.exceptions.LimitExceededException`.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        let short = code.rsplit(|c: char| c == '.' || c == '#').next().unwrap_or(code);
        match short {
            "ResourceAlreadyExistsException" => Self::ResourceAlreadyExists,
            "LimitExceededException"
            | "ResourceNumberLimitExceededException"
            | "ConcurrentRunsExceededException" => Self::LimitExceeded,
            "ResourceInUseException" => Self::ResourceInUse,
            "ThrottlingException" | "TooManyRequestsException" => Self::Throttling,
            "InternalServiceException" | "InternalServerException" | "ServiceException" => {
                Self::InternalService
            }
            "OperationTimeoutException" => Self::OperationTimeout,
            "InvalidInputException" | "ValidationException" => Self::InvalidInput,
            _ => Self::Other,
        }
    }

    /// Canonical error code for the kind.
    #[must_use]
    pub const fn default_code(self) -> &'static str {
        match self {
            Self::ResourceAlreadyExists => "ResourceAlreadyExistsException",
            Self::LimitExceeded => "LimitExceededException",
            Self::ResourceInUse => "ResourceInUseException",
            Self::Throttling => "ThrottlingException",
            Self::InternalService => "InternalServiceException",
            Self::OperationTimeout => "OperationTimeoutException",
            Self::InvalidInput => "InvalidInputException",
            Self::Other => "UnknownError",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_code())
    }
}

/// An error returned by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Classification.
    pub kind: ApiErrorKind,
    /// Raw error code as reported.
    pub code: String,
    /// Error message.
    pub message: String,
}

impl ApiError {
    /// Creates an error with the kind's canonical code.
    #[must_use]
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: kind.default_code().to_string(),
            message: message.into(),
        }
    }

    /// Creates an error from a raw code, classifying it.
    #[must_use]
    pub fn from_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            kind: ApiErrorKind::from_code(&code),
            code,
            message: message.into(),
        }
    }

    /// Returns the raw error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_qualified_code() {
        assert_eq!(
            ApiErrorKind::from_code("Personalize.Client.exceptions.LimitExceededException"),
            ApiErrorKind::LimitExceeded
        );
        assert_eq!(
            ApiErrorKind::from_code("Glue.Client.exceptions.ConcurrentRunsExceededException"),
            ApiErrorKind::LimitExceeded
        );
    }

    #[test]
    fn test_classify_by_code_not_message() {
        let err = ApiError::from_code("AccessDeniedException", "ResourceInUseException in message");
        assert_eq!(err.kind, ApiErrorKind::Other);
    }

    #[test]
    fn test_display() {
        let err = ApiError::new(ApiErrorKind::ResourceInUse, "dataset group busy");
        assert_eq!(err.to_string(), "ResourceInUseException: dataset group busy");
    }
}
