//! HTTP response building helpers
//!
//! Every handler builds its response through these so that error bodies share
//! one shape: `{"error": message, "code": CODE}`.

use bytes::Bytes;
use hyper::header::{HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use tracing::error;

use crate::error::LedgerError;

/// Result type alias for handlers
pub type HandlerResult = Result<Response<Full<Bytes>>, LedgerError>;

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    with_body(status, "application/json", Bytes::from(json))
}

/// Build a JSON response with 200 OK status
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// Build a JSON response with 201 Created status
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

/// Build an empty response with 204 No Content status
pub fn no_content() -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = StatusCode::NO_CONTENT;
    resp
}

fn error_body(status: StatusCode, code: &str, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &serde_json::json!({ "error": message, "code": code }))
}

/// Build a 404 Not Found response with message
pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    error_body(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

/// Build a 405 Method Not Allowed response
pub fn method_not_allowed() -> Response<Full<Bytes>> {
    error_body(StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", "Method not allowed")
}

/// Map an error onto its HTTP status
pub fn status_for(error: &LedgerError) -> StatusCode {
    match error {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InvalidInput(_) | LedgerError::Json(_) | LedgerError::Csv(_) => {
            StatusCode::BAD_REQUEST
        }
        LedgerError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
        e if e.is_state_conflict() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a LedgerError to an appropriate HTTP response
pub fn error_response(error: LedgerError) -> Response<Full<Bytes>> {
    let status = status_for(&error);

    // Storage failures are logged here and reported without internals
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %error, "Request failed");
        "Internal server error".to_string()
    } else {
        error.to_string()
    };

    error_body(status, error.code(), &message)
}

/// Build a downloadable binary response
pub fn attachment_response(
    content_type: &'static str,
    file_name: &str,
    body: Vec<u8>,
) -> Response<Full<Bytes>> {
    let mut resp = with_body(StatusCode::OK, content_type, Bytes::from(body));
    let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        resp.headers_mut().insert(CONTENT_DISPOSITION, value);
    }
    resp
}
