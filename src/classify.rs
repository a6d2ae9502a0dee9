//! Response classification.
//!
//! Decides whether a response is a success, an invalidated-token failure that
//! warrants one re-authentication, or a terminal API error.

use crate::response::{ErrorResponse, PERMISSION_DENIED};
use http::StatusCode;

/// Statuses the API uses to report errors. Everything else is a success as
/// far as the session is concerned.
pub const ERROR_STATUSES: [u16; 4] = [400, 401, 422, 500];

/// The outcome of classifying one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The body belongs to the caller.
    Success,
    /// The session token was invalidated; log in again and retry once.
    RetryAuth,
    /// A terminal error status.
    Fatal {
        /// The HTTP status code
        status: StatusCode,
        /// Status line, or why the error body was rejected
        message: String,
    },
}

impl Classification {
    /// Returns `true` for [`Classification::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success)
    }
}

/// Classifies a response by status and body.
///
/// A 401 is only retryable when its body decodes as an API error named
/// `PermissionDeniedError`. A 401 with an undecodable body is fatal.
///
/// # Examples
///
/// ```
/// use dsdk::classify::{classify, Classification};
/// use http::StatusCode;
///
/// let body = br#"{"name":"PermissionDeniedError","message":"token expired"}"#;
/// assert_eq!(classify(StatusCode::UNAUTHORIZED, body), Classification::RetryAuth);
/// assert_eq!(classify(StatusCode::OK, b"not json"), Classification::Success);
/// ```
pub fn classify(status: StatusCode, body: &[u8]) -> Classification {
    if !ERROR_STATUSES.contains(&status.as_u16()) {
        return Classification::Success;
    }

    if status == StatusCode::UNAUTHORIZED {
        match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(err) if err.name == PERMISSION_DENIED => return Classification::RetryAuth,
            Ok(_) => {}
            Err(e) => {
                tracing::error!(
                    status = status.as_u16(),
                    error = %e,
                    response = %String::from_utf8_lossy(body),
                    "Couldn't understand 401 response body"
                );
                return Classification::Fatal {
                    status,
                    message: format!("{}: malformed error response: {}", status_line(status), e),
                };
            }
        }
    }

    Classification::Fatal {
        status,
        message: status_line(status),
    }
}

pub(crate) fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_401_is_retryable() {
        let body = br#"{"name":"PermissionDeniedError","code":1,"http":401,"message":"expired"}"#;
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, body),
            Classification::RetryAuth
        );
    }

    #[test]
    fn other_401_is_fatal() {
        let body = br#"{"name":"AuthFailedError","message":"bad password"}"#;
        assert_eq!(
            classify(StatusCode::UNAUTHORIZED, body),
            Classification::Fatal {
                status: StatusCode::UNAUTHORIZED,
                message: "401 Unauthorized".to_string(),
            }
        );
    }

    #[test]
    fn malformed_401_is_fatal() {
        match classify(StatusCode::UNAUTHORIZED, b"<html>nope</html>") {
            Classification::Fatal { status, message } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert!(message.contains("malformed"));
            }
            other => panic!("Expected Fatal, got {:?}", other),
        }
    }

    #[test]
    fn success_statuses_ignore_body() {
        for status in [200, 201, 204, 404, 503] {
            let status = StatusCode::from_u16(status).unwrap();
            assert!(classify(status, b"anything at all").is_success());
        }
    }

    #[test]
    fn error_statuses_are_fatal() {
        for code in [400, 422, 500] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(matches!(
                classify(status, br#"{"name":"PermissionDeniedError"}"#),
                Classification::Fatal { status: s, .. } if s == status
            ));
        }
    }
}
