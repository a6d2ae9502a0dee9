//! Error types for session calls.
//!
//! Every error that originates from an HTTP response keeps the raw response
//! body, so callers can attempt their own decoding when the server answers
//! with a shape the session did not expect.

use crate::response::ErrorResponse;
use bytes::Bytes;
use http::StatusCode;

/// The main error type for session calls.
///
/// # Examples
///
/// ```no_run
/// use dsdk::{Error, Session};
///
/// # async fn example(session: Session) -> Result<(), Error> {
/// match session.get("app_instances", &[]).await {
///     Ok(response) => println!("{}", response.text()),
///     Err(Error::Api { status, message, .. }) => {
///         eprintln!("API error {}: {}", status, message);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection refused, DNS lookup failed, etc.).
    ///
    /// Transport failures are fatal for the call and never retried.
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// The exchange did not complete within the session timeout.
    #[error("Request timed out")]
    Timeout,

    /// Invalid configuration was provided.
    ///
    /// Covers unparseable timeout strings, invalid header names or values,
    /// and failures to build the underlying HTTP client.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A URL template could not be parsed or rendered.
    #[error("Template error: {0}")]
    Template(String),

    /// The rendered URL is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request parameters were not in a supported shape.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A verb outside GET, PUT, POST and DELETE was requested.
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Failed to serialize the request body.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(String),

    /// The server answered with one of the API error statuses.
    ///
    /// # Fields
    ///
    /// * `status` - The HTTP status code
    /// * `message` - The status line, or a description of why the body was rejected
    /// * `raw_response` - The raw response body
    /// * `detail` - The decoded error body, when it had the API error shape
    #[error("API error {status}: {message}")]
    Api {
        /// The HTTP status code
        status: StatusCode,
        /// Human readable summary
        message: String,
        /// The raw response body
        raw_response: Bytes,
        /// The decoded API error body, if any
        detail: Option<Box<ErrorResponse>>,
    },

    /// A response body could not be decoded into the expected schema.
    #[error("Malformed response (status {status}): {serde_error}")]
    MalformedResponse {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: Bytes,
        /// The serde error message
        serde_error: String,
    },

    /// Logging in failed.
    #[error("Authentication failed: {message}")]
    Auth {
        /// The message reported by the server, or a description of the problem
        message: String,
        /// The raw login response body
        raw_response: Bytes,
    },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err)
        }
    }
}

impl Error {
    /// Returns the HTTP status code if this error came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    ///
    /// Transport, configuration and encoding errors carry no body.
    pub fn raw_response(&self) -> Option<&[u8]> {
        match self {
            Error::Api { raw_response, .. } => Some(raw_response),
            Error::MalformedResponse { raw_response, .. } => Some(raw_response),
            Error::Auth { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the decoded API error body, if the server sent one.
    pub fn error_response(&self) -> Option<&ErrorResponse> {
        match self {
            Error::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if the server reported an invalidated session token.
    ///
    /// A call only surfaces this after its single re-authentication attempt
    /// has already been spent.
    pub fn is_permission_denied(&self) -> bool {
        self.error_response()
            .is_some_and(ErrorResponse::is_permission_denied)
    }
}

/// A specialized `Result` type for session calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_exposes_status_and_body() {
        let err = Error::Api {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "422 Unprocessable Entity".to_string(),
            raw_response: Bytes::from_static(b"{\"name\":\"ValidationError\"}"),
            detail: None,
        };

        assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
        assert_eq!(
            err.raw_response(),
            Some(&b"{\"name\":\"ValidationError\"}"[..])
        );
        assert!(!err.is_permission_denied());
    }

    #[test]
    fn permission_denied_detected_from_detail() {
        let detail = ErrorResponse {
            name: "PermissionDeniedError".to_string(),
            ..Default::default()
        };
        let err = Error::Api {
            status: StatusCode::UNAUTHORIZED,
            message: "401 Unauthorized".to_string(),
            raw_response: Bytes::new(),
            detail: Some(Box::new(detail)),
        };

        assert!(err.is_permission_denied());
    }

    #[test]
    fn transport_errors_have_no_body() {
        assert!(Error::Timeout.raw_response().is_none());
        assert!(Error::Timeout.status().is_none());
        assert!(Error::Encoding("bad".into()).raw_response().is_none());
    }
}
