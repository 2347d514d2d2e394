use std::fmt::{Display, Formatter};

use serde_json::Value as JsonValue;

use crate::functions::serializer::decode;

/// Canonical error codes surfaced by callable functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionsErrorCode {
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl FunctionsErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionsErrorCode::Cancelled => "functions/cancelled",
            FunctionsErrorCode::Unknown => "functions/unknown",
            FunctionsErrorCode::InvalidArgument => "functions/invalid-argument",
            FunctionsErrorCode::DeadlineExceeded => "functions/deadline-exceeded",
            FunctionsErrorCode::NotFound => "functions/not-found",
            FunctionsErrorCode::AlreadyExists => "functions/already-exists",
            FunctionsErrorCode::PermissionDenied => "functions/permission-denied",
            FunctionsErrorCode::ResourceExhausted => "functions/resource-exhausted",
            FunctionsErrorCode::FailedPrecondition => "functions/failed-precondition",
            FunctionsErrorCode::Aborted => "functions/aborted",
            FunctionsErrorCode::OutOfRange => "functions/out-of-range",
            FunctionsErrorCode::Unimplemented => "functions/unimplemented",
            FunctionsErrorCode::Internal => "functions/internal",
            FunctionsErrorCode::Unavailable => "functions/unavailable",
            FunctionsErrorCode::DataLoss => "functions/data-loss",
            FunctionsErrorCode::Unauthenticated => "functions/unauthenticated",
        }
    }

    /// Parses a canonical status such as `"NOT_FOUND"`. `"OK"` is not an error
    /// and yields `Ok(None)`; unknown strings yield `Err(())`.
    fn from_status(status: &str) -> Result<Option<Self>, ()> {
        let code = match status {
            "OK" => return Ok(None),
            "CANCELLED" => FunctionsErrorCode::Cancelled,
            "UNKNOWN" => FunctionsErrorCode::Unknown,
            "INVALID_ARGUMENT" => FunctionsErrorCode::InvalidArgument,
            "DEADLINE_EXCEEDED" => FunctionsErrorCode::DeadlineExceeded,
            "NOT_FOUND" => FunctionsErrorCode::NotFound,
            "ALREADY_EXISTS" => FunctionsErrorCode::AlreadyExists,
            "PERMISSION_DENIED" => FunctionsErrorCode::PermissionDenied,
            "RESOURCE_EXHAUSTED" => FunctionsErrorCode::ResourceExhausted,
            "FAILED_PRECONDITION" => FunctionsErrorCode::FailedPrecondition,
            "ABORTED" => FunctionsErrorCode::Aborted,
            "OUT_OF_RANGE" => FunctionsErrorCode::OutOfRange,
            "UNIMPLEMENTED" => FunctionsErrorCode::Unimplemented,
            "INTERNAL" => FunctionsErrorCode::Internal,
            "UNAVAILABLE" => FunctionsErrorCode::Unavailable,
            "DATA_LOSS" => FunctionsErrorCode::DataLoss,
            "UNAUTHENTICATED" => FunctionsErrorCode::Unauthenticated,
            _ => return Err(()),
        };
        Ok(Some(code))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionsError {
    pub code: FunctionsErrorCode,
    message: String,
    details: Option<JsonValue>,
}

impl FunctionsError {
    pub fn new(code: FunctionsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Extra information supplied by the function, already decoded.
    pub fn details(&self) -> Option<&JsonValue> {
        self.details.as_ref()
    }
}

impl Display for FunctionsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for FunctionsError {}

pub type FunctionsResult<T> = Result<T, FunctionsError>;

pub fn invalid_argument(message: impl Into<String>) -> FunctionsError {
    FunctionsError::new(FunctionsErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> FunctionsError {
    FunctionsError::new(FunctionsErrorCode::Internal, message)
}

/// Raised for every call made through, or still running on, a deleted client.
pub(crate) fn deleted_error() -> FunctionsError {
    FunctionsError::new(
        FunctionsErrorCode::Cancelled,
        "Firebase Functions instance was deleted.",
    )
}

pub(crate) fn deadline_exceeded() -> FunctionsError {
    FunctionsError::new(FunctionsErrorCode::DeadlineExceeded, "deadline-exceeded")
}

/// Maps an HTTP status onto an error code. `None` means success.
///
/// Status `0` is the synthetic status of a request that never reached the server.
pub fn code_for_http_status(status: u16) -> Option<FunctionsErrorCode> {
    if (200..300).contains(&status) {
        return None;
    }
    let code = match status {
        0 => FunctionsErrorCode::Internal,
        400 => FunctionsErrorCode::InvalidArgument,
        401 => FunctionsErrorCode::Unauthenticated,
        403 => FunctionsErrorCode::PermissionDenied,
        404 => FunctionsErrorCode::NotFound,
        409 => FunctionsErrorCode::Aborted,
        429 => FunctionsErrorCode::ResourceExhausted,
        499 => FunctionsErrorCode::Cancelled,
        500 => FunctionsErrorCode::Internal,
        501 => FunctionsErrorCode::Unimplemented,
        503 => FunctionsErrorCode::Unavailable,
        504 => FunctionsErrorCode::DeadlineExceeded,
        _ => FunctionsErrorCode::Unknown,
    };
    Some(code)
}

/// Builds the error described by a callable response, if any.
///
/// A structured `error` object in the body takes precedence over the HTTP
/// status when its `status` is a known canonical code. An unknown status string
/// becomes `Internal`.
pub fn error_for_response(status: u16, body: Option<&JsonValue>) -> Option<FunctionsError> {
    let mut code = code_for_http_status(status);
    let mut description = code.map(|code| code.as_str().trim_start_matches("functions/").to_string());
    let mut details = None;

    if let Some(error) = body.and_then(|body| body.get("error")) {
        if let Some(status) = error.get("status").and_then(JsonValue::as_str) {
            match FunctionsErrorCode::from_status(status) {
                Ok(parsed) => {
                    code = parsed;
                    description = Some(status.to_string());
                }
                Err(()) => return Some(internal_error("internal")),
            }
        }
        if let Some(message) = error.get("message").and_then(JsonValue::as_str) {
            description = Some(message.to_string());
        }
        if let Some(raw) = error.get("details") {
            // Details that fail to decode are dropped.
            details = decode(raw).ok();
        }
    }

    let code = code?;
    let message = description.unwrap_or_else(|| code.as_str().to_string());
    let error = FunctionsError::new(code, message);
    Some(match details {
        Some(details) => error.with_details(details),
        None => error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_statuses_are_not_errors() {
        assert!(code_for_http_status(200).is_none());
        assert!(code_for_http_status(204).is_none());
        assert!(error_for_response(200, Some(&json!({ "data": 1 }))).is_none());
    }

    #[test]
    fn maps_http_statuses() {
        let table = [
            (0, FunctionsErrorCode::Internal),
            (400, FunctionsErrorCode::InvalidArgument),
            (401, FunctionsErrorCode::Unauthenticated),
            (403, FunctionsErrorCode::PermissionDenied),
            (404, FunctionsErrorCode::NotFound),
            (409, FunctionsErrorCode::Aborted),
            (429, FunctionsErrorCode::ResourceExhausted),
            (499, FunctionsErrorCode::Cancelled),
            (500, FunctionsErrorCode::Internal),
            (501, FunctionsErrorCode::Unimplemented),
            (503, FunctionsErrorCode::Unavailable),
            (504, FunctionsErrorCode::DeadlineExceeded),
            (418, FunctionsErrorCode::Unknown),
        ];
        for (status, code) in table {
            assert_eq!(code_for_http_status(status), Some(code), "{status}");
        }
        let err = error_for_response(0, None).unwrap();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
        assert_eq!(err.message(), "internal");
    }

    #[test]
    fn structured_body_overrides_status() {
        let body = json!({
            "error": {
                "status": "PERMISSION_DENIED",
                "message": "not allowed",
                "details": { "limit": { "@type": "type.googleapis.com/google.protobuf.Int64Value", "value": "5" } }
            }
        });
        let err = error_for_response(500, Some(&body)).unwrap();
        assert_eq!(err.code, FunctionsErrorCode::PermissionDenied);
        assert_eq!(err.message(), "not allowed");
        assert_eq!(err.details(), Some(&json!({ "limit": 5 })));
        assert_eq!(err.to_string(), "not allowed (functions/permission-denied)");
    }

    #[test]
    fn unknown_structured_status_is_internal() {
        let body = json!({ "error": { "status": "TEAPOT", "message": "short and stout" } });
        let err = error_for_response(400, Some(&body)).unwrap();
        assert_eq!(err.code, FunctionsErrorCode::Internal);
        assert_eq!(err.message(), "internal");
    }

    #[test]
    fn ok_structured_status_suppresses_error() {
        let body = json!({ "error": { "status": "OK" } });
        assert!(error_for_response(500, Some(&body)).is_none());
    }
}
