//! Request/response logging.
//!
//! Every exchange a [`Session`](crate::Session) makes is reported to a
//! [`RequestLogger`] handed to the session at construction. The default,
//! [`TracingLogger`], emits `tracing` events. Records carry the raw body and
//! headers; [`RequestRecord::payload`], [`RequestRecord::redacted_headers`] and
//! [`ResponseRecord::payload`] give the forms that are safe to log. The body of
//! a response to a sensitive request (e.g. the login token) is never logged.

use crate::metadata::Verb;
use http::{HeaderMap, StatusCode};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Placeholder logged instead of sensitive payloads.
pub const REDACTED: &str = "************";

/// Header carrying the session token.
pub const AUTH_TOKEN_HEADER: &str = "Auth-Token";

/// An outgoing request, as seen by a logger.
#[derive(Debug, Clone, Copy)]
pub struct RequestRecord<'a> {
    /// Id shared with the matching [`ResponseRecord`].
    pub request_id: Uuid,
    pub verb: Verb,
    pub url: &'a Url,
    pub headers: &'a HeaderMap,
    pub body: Option<&'a [u8]>,
    pub sensitive: bool,
    /// 1 for the first exchange of a call, 2 for the exchange after re-authentication.
    pub attempt: usize,
}

impl RequestRecord<'_> {
    /// The body as it may be logged.
    pub fn payload(&self) -> Cow<'_, str> {
        match self.body {
            _ if self.sensitive => Cow::Borrowed(REDACTED),
            Some(body) => String::from_utf8_lossy(body),
            None => Cow::Borrowed(""),
        }
    }

    /// The headers as they may be logged.
    pub fn redacted_headers(&self) -> RedactedHeaders<'_> {
        RedactedHeaders(self.headers)
    }
}

/// A received response, as seen by a logger.
#[derive(Debug, Clone, Copy)]
pub struct ResponseRecord<'a> {
    pub request_id: Uuid,
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
    /// Set when the request was sensitive; the response may carry credentials.
    pub sensitive: bool,
    /// Time until the response head arrived.
    pub response_time: Duration,
    /// Time spent reading the body.
    pub read_time: Duration,
}

impl ResponseRecord<'_> {
    /// The body as it may be logged.
    pub fn payload(&self) -> Cow<'_, str> {
        if self.sensitive {
            return Cow::Borrowed(REDACTED);
        }
        String::from_utf8_lossy(self.body)
    }

    /// The headers as they may be logged.
    pub fn redacted_headers(&self) -> RedactedHeaders<'_> {
        RedactedHeaders(self.headers)
    }
}

/// Displays a header map with the `Auth-Token` value hidden.
pub struct RedactedHeaders<'a>(&'a HeaderMap);

impl fmt::Display for RedactedHeaders<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.0 {
            if name.as_str().eq_ignore_ascii_case(AUTH_TOKEN_HEADER) {
                map.entry(&name.as_str(), &REDACTED);
            } else {
                map.entry(&name.as_str(), &value.to_str().unwrap_or("<binary>"));
            }
        }
        map.finish()
    }
}

/// Receives one record before and one after every exchange.
///
/// Both calls happen while the session lock is held, so records from one
/// session never interleave.
///
/// # Examples
///
/// ```
/// use dsdk::logging::{RequestLogger, RequestRecord, ResponseRecord};
///
/// struct Stdout;
///
/// impl RequestLogger for Stdout {
///     fn log_request(&self, record: &RequestRecord<'_>) {
///         println!("{} {} {}", record.request_id, record.verb, record.url);
///     }
///
///     fn log_response(&self, record: &ResponseRecord<'_>) {
///         println!("{} -> {}", record.request_id, record.status);
///     }
/// }
/// ```
pub trait RequestLogger: Send + Sync {
    fn log_request(&self, record: &RequestRecord<'_>);

    fn log_response(&self, record: &ResponseRecord<'_>);
}

/// Logs exchanges as `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RequestLogger for TracingLogger {
    fn log_request(&self, record: &RequestRecord<'_>) {
        tracing::debug!(
            request_id = %record.request_id,
            method = %record.verb,
            url = %record.url,
            attempt = record.attempt,
            payload = %record.payload(),
            headers = %record.redacted_headers(),
            "Sending request"
        );
    }

    fn log_response(&self, record: &ResponseRecord<'_>) {
        tracing::debug!(
            request_id = %record.request_id,
            status = record.status.as_u16(),
            payload = %record.payload(),
            headers = %record.redacted_headers(),
            response_ms = record.response_time.as_millis(),
            read_ms = record.read_time.as_millis(),
            "Received response"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn url() -> Url {
        Url::parse("https://h:7717/v2.2/login").unwrap()
    }

    #[test]
    fn sensitive_payload_is_redacted() {
        let url = url();
        let headers = HeaderMap::new();
        let record = RequestRecord {
            request_id: Uuid::nil(),
            verb: Verb::Put,
            url: &url,
            headers: &headers,
            body: Some(&br#"{"name":"admin","password":"hunter2"}"#[..]),
            sensitive: true,
            attempt: 1,
        };
        assert_eq!(record.payload(), REDACTED);
    }

    #[test]
    fn plain_payload_is_logged() {
        let url = url();
        let headers = HeaderMap::new();
        let record = RequestRecord {
            request_id: Uuid::nil(),
            verb: Verb::Post,
            url: &url,
            headers: &headers,
            body: Some(&br#"{"name":"vol"}"#[..]),
            sensitive: false,
            attempt: 1,
        };
        assert_eq!(record.payload(), r#"{"name":"vol"}"#);
    }

    #[test]
    fn response_to_sensitive_request_is_redacted() {
        let headers = HeaderMap::new();
        let mut record = ResponseRecord {
            request_id: Uuid::nil(),
            status: StatusCode::OK,
            headers: &headers,
            body: br#"{"key":"tok-secret","version":"2.2"}"#,
            sensitive: true,
            response_time: Duration::ZERO,
            read_time: Duration::ZERO,
        };
        assert_eq!(record.payload(), REDACTED);

        record.sensitive = false;
        assert!(record.payload().contains("tok-secret"));
    }

    #[test]
    fn auth_token_header_is_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert("auth-token", HeaderValue::from_static("secret-token"));
        headers.insert("tenant", HeaderValue::from_static("/root"));

        let rendered = RedactedHeaders(&headers).to_string();
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains(REDACTED));
        assert!(rendered.contains("/root"));
    }
}
