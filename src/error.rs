//! Crate-wide error type and the HTTP error mapper.
//!
//! One `thiserror` enum per concern, converging via `#[from]`, inverted
//! from a typical client decode layer: instead of decoding a cloud error
//! response, this builds one.

use serde::{Deserialize, Serialize};

use crate::{catalog, translate, udf, value};

/// Every failure mode the core can produce, independent of HTTP framing.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("request validation failed: {0}")]
    InvalidRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not implemented: {0}")]
    NotImplemented(String),
    #[error(transparent)]
    Catalog(#[from] catalog::Error),
    #[error(transparent)]
    Translate(#[from] translate::Error),
    #[error(transparent)]
    Value(#[from] value::Error),
    #[error(transparent)]
    Udf(#[from] udf::Error),
}

/// One `{domain, reason, message}` entry of the wire error envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    pub domain: String,
    pub reason: String,
    pub message: String,
}

/// `{code, message, errors}`, the body of a failed wire response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: u16,
    pub message: String,
    pub errors: Vec<ErrorProto>,
}

/// `{"error": ...}`, the full wire error response body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorEnvelope,
}

/// Reason tag used in the wire error envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reason {
    Invalid,
    NotFound,
    Duplicate,
    InvalidQuery,
    NotImplemented,
    DontRetry,
}

impl Reason {
    fn as_str(self) -> &'static str {
        match self {
            Reason::Invalid => "invalid",
            Reason::NotFound => "notFound",
            Reason::Duplicate => "duplicate",
            Reason::InvalidQuery => "invalidQuery",
            Reason::NotImplemented => "notImplemented",
            Reason::DontRetry => "dontRetry",
        }
    }
}

/// Maps any [`Error`] (or a raw engine message) to an HTTP status code and a
/// wire [`ErrorResponse`].
///
/// Engine failure messages are reclassified by substring before falling back
/// to the generic bucket: `"does not exist"` / `"not found"` become
/// `NotFound`, `"already exists"` becomes `AlreadyExists`.
pub fn map_error(err: &Error) -> (u16, ErrorResponse) {
    let (status, reason, message) = match err {
        Error::InvalidRequest(msg) => (422, Reason::Invalid, msg.clone()),
        Error::NotFound(msg) => (404, Reason::NotFound, msg.clone()),
        Error::AlreadyExists(msg) => (409, Reason::Duplicate, msg.clone()),
        Error::NotImplemented(msg) => (
            501,
            Reason::NotImplemented,
            format!("{msg} is not implemented yet, please file an issue"),
        ),
        Error::Translate(translate::Error::Parse(msg)) => (400, Reason::InvalidQuery, msg.clone()),
        Error::Translate(other) => (400, Reason::InvalidQuery, other.to_string()),
        Error::Catalog(catalog::Error::Engine(msg)) => reclassify_engine_message(msg),
        Error::Catalog(other) => reclassify_engine_message(&other.to_string()),
        Error::Value(other) => (400, Reason::InvalidQuery, other.to_string()),
        Error::Udf(other) => (400, Reason::InvalidQuery, other.to_string()),
    };
    let response = ErrorResponse {
        error: ErrorEnvelope {
            code: status,
            message: message.clone(),
            errors: vec![ErrorProto {
                domain: "global".to_string(),
                reason: reason.as_str().to_string(),
                message,
            }],
        },
    };
    (status, response)
}

fn reclassify_engine_message(message: &str) -> (u16, Reason, String) {
    if message.contains("does not exist") || message.contains("not found") {
        (404, Reason::NotFound, message.to_string())
    } else if message.contains("already exists") {
        (409, Reason::Duplicate, message.to_string())
    } else {
        // Deliberately 4xx, not 5xx: cloud client libraries retry 5xx
        // aggressively, so unexpected engine failures are flattened to a
        // non-retried bucket.
        (400, Reason::InvalidQuery, message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let (status, body) = map_error(&Error::NotFound("dataset d".into()));
        assert_eq!(status, 404);
        assert_eq!(body.error.errors[0].reason, "notFound");
    }

    #[test]
    fn engine_message_reclassifies_to_not_found() {
        let err = Error::Catalog(catalog::Error::Engine("Table t does not exist".into()));
        let (status, body) = map_error(&err);
        assert_eq!(status, 404);
        assert_eq!(body.error.errors[0].reason, "notFound");
    }

    #[test]
    fn engine_message_reclassifies_to_duplicate() {
        let err = Error::Catalog(catalog::Error::Engine("Schema d already exists".into()));
        let (status, _) = map_error(&err);
        assert_eq!(status, 409);
    }

    #[test]
    fn generic_engine_failure_is_400_not_500() {
        let err = Error::Catalog(catalog::Error::Engine("syntax error near FROM".into()));
        let (status, body) = map_error(&err);
        assert_eq!(status, 400);
        assert_eq!(body.error.errors[0].reason, "invalidQuery");
    }
}
