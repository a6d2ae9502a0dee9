//! Response wrapper and the API's response schemas.
//!
//! [`Response`] keeps the raw body bytes alongside metadata about the
//! exchange. Decoding into the API envelope or a domain type is left to the
//! caller, through [`Response::envelope`], [`Response::data`] and
//! [`Response::json`].

use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::time::Duration;

/// Error name the API uses for an invalidated session token.
pub const PERMISSION_DENIED: &str = "PermissionDeniedError";

/// A successful response from the API.
///
/// "Successful" means the status was not one of the API error statuses; the
/// body may still have an unexpected shape, which is why it is kept raw.
///
/// # Examples
///
/// ```no_run
/// use dsdk::Session;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct System {
///     name: String,
/// }
///
/// # async fn example(session: Session) -> Result<(), dsdk::Error> {
/// let response = session.get("system", &[]).await?;
///
/// let system: System = response.data()?;
/// println!("System: {}", system.name);
/// println!("Request took {:?}", response.latency);
/// println!("Re-authenticated: {}", response.was_retried());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The raw response body.
    pub body: Bytes,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from sending the first attempt until this response was read,
    /// including any re-authentication.
    pub latency: Duration,

    /// Number of exchanges made for this call: `1`, or `2` after a
    /// re-authentication.
    pub attempts: usize,
}

impl Response {
    /// Creates a new `Response`.
    pub fn new(
        body: Bytes,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Returns `true` if the call had to log in again before succeeding.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the whole body as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the body does not decode.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        decode(self.status, &self.body)
    }

    /// Decodes the generic response envelope.
    pub fn envelope(&self) -> Result<Envelope> {
        self.json()
    }

    /// Decodes the envelope's `data` payload as `T`.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T> {
        let envelope = self.envelope()?;
        decode(self.status, envelope.data.get().as_bytes())
    }
}

impl AsRef<[u8]> for Response {
    fn as_ref(&self) -> &[u8] {
        &self.body
    }
}

pub(crate) fn decode<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::error!(
            error = %e,
            raw_response = %String::from_utf8_lossy(body),
            "Failed to decode response"
        );
        Error::MalformedResponse {
            status,
            raw_response: Bytes::copy_from_slice(body),
            serde_error: e.to_string(),
        }
    })
}

/// The generic envelope wrapping successful responses.
///
/// `data` is left as raw JSON for the domain layer to decode.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Envelope {
    /// Tenant the request was served for.
    #[serde(default)]
    pub tenant: String,
    /// Resource path the data came from.
    #[serde(default)]
    pub path: String,
    /// API version that served the request.
    #[serde(default)]
    pub version: String,
    /// The caller-specific payload.
    pub data: Box<RawValue>,
}

/// The error body the API sends with error statuses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorResponse {
    pub name: String,
    pub code: i64,
    pub http: u16,
    pub message: String,
    pub debug: String,
    pub ts: String,
    pub api_req_id: i64,
    pub storage_node_uuid: String,
    pub storage_node_hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<serde_json::Value>>,
}

impl ErrorResponse {
    /// Returns `true` if this error reports an invalidated session token.
    pub fn is_permission_denied(&self) -> bool {
        self.name == PERMISSION_DENIED
    }
}

/// Body of a successful login.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginResult {
    /// The session token.
    pub key: String,
    /// API version reported by the server.
    pub version: String,
}
