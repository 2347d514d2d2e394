use reqwest::StatusCode;
use serde::Deserialize;

use crate::firestore::error::{FirestoreError, FirestoreErrorCode};

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: Option<GoogleError>,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Maps a failed REST response onto a [`FirestoreError`].
///
/// A recognised `error.status` in the body wins over the HTTP status. An
/// unrecognised one is reported as `Internal`.
pub fn map_http_error(status: StatusCode, body: &str) -> FirestoreError {
    let payload = extract_error_payload(body);
    let message = payload
        .as_ref()
        .and_then(|payload| payload.message.clone())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("HTTP error").to_string());

    if let Some(status_string) = payload.as_ref().and_then(|payload| payload.status.as_deref()) {
        return match code_for_status_string(status_string) {
            Some(code) => FirestoreError::new(code, message),
            None => FirestoreError::new(
                FirestoreErrorCode::Internal,
                format!("Unhandled Firestore error status: {status_string}"),
            ),
        };
    }

    FirestoreError::new(code_for_http_status(status), message)
}

fn code_for_http_status(status: StatusCode) -> FirestoreErrorCode {
    match status.as_u16() {
        400 => FirestoreErrorCode::InvalidArgument,
        401 => FirestoreErrorCode::Unauthenticated,
        403 => FirestoreErrorCode::PermissionDenied,
        404 => FirestoreErrorCode::NotFound,
        409 => FirestoreErrorCode::Aborted,
        416 => FirestoreErrorCode::OutOfRange,
        429 => FirestoreErrorCode::ResourceExhausted,
        499 => FirestoreErrorCode::Cancelled,
        500 => FirestoreErrorCode::Internal,
        501 => FirestoreErrorCode::Unimplemented,
        503 => FirestoreErrorCode::Unavailable,
        504 => FirestoreErrorCode::DeadlineExceeded,
        _ => FirestoreErrorCode::Unknown,
    }
}

fn code_for_status_string(status: &str) -> Option<FirestoreErrorCode> {
    let code = match status {
        "CANCELLED" => FirestoreErrorCode::Cancelled,
        "UNKNOWN" => FirestoreErrorCode::Unknown,
        "INVALID_ARGUMENT" => FirestoreErrorCode::InvalidArgument,
        "DEADLINE_EXCEEDED" => FirestoreErrorCode::DeadlineExceeded,
        "NOT_FOUND" => FirestoreErrorCode::NotFound,
        "ALREADY_EXISTS" => FirestoreErrorCode::AlreadyExists,
        "PERMISSION_DENIED" => FirestoreErrorCode::PermissionDenied,
        "RESOURCE_EXHAUSTED" => FirestoreErrorCode::ResourceExhausted,
        "FAILED_PRECONDITION" => FirestoreErrorCode::FailedPrecondition,
        "ABORTED" => FirestoreErrorCode::Aborted,
        "OUT_OF_RANGE" => FirestoreErrorCode::OutOfRange,
        "UNIMPLEMENTED" => FirestoreErrorCode::Unimplemented,
        "INTERNAL" => FirestoreErrorCode::Internal,
        "UNAVAILABLE" => FirestoreErrorCode::Unavailable,
        "DATA_LOSS" => FirestoreErrorCode::DataLoss,
        "UNAUTHENTICATED" => FirestoreErrorCode::Unauthenticated,
        _ => return None,
    };
    Some(code)
}

fn extract_error_payload(body: &str) -> Option<GoogleError> {
    serde_json::from_str::<GoogleErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
}
