//! Authenticated API session.
//!
//! The [`Session`] type is the main entry point. It owns the credentials,
//! the cached session token and the default headers for one host, and runs
//! every call through the request pipeline: build the URL and headers, make
//! one exchange, classify the response, and log in again at most once when
//! the server reports that the token was invalidated.

use crate::{
    classify::{classify, status_line, Classification},
    config::SessionConfig,
    logging::{RequestLogger, RequestRecord, ResponseRecord, TracingLogger},
    metadata::{RequestMetadata, Verb},
    params::Params,
    response::{decode, ErrorResponse, LoginResult},
    template::Template,
    Error, Response, Result,
};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

/// Endpoint that exchanges credentials for a session token.
pub const LOGIN_ENDPOINT: &str = "login";

/// A call makes its first exchange plus at most one after logging in again.
const MAX_ATTEMPTS: usize = 2;

/// The operations endpoint wrappers are written against.
///
/// [`Session`] is the production implementation; tests of higher layers can
/// substitute their own.
#[async_trait]
pub trait ApiConnection: Send + Sync {
    /// GET `endpoint` with `"key=value"` query parameters.
    async fn get(&self, endpoint: &str, query_params: &[&str]) -> Result<Response>;

    /// PUT `params` to `endpoint`. A sensitive body is never logged.
    async fn put(&self, endpoint: &str, sensitive: bool, params: Params) -> Result<Response>;

    /// POST `params` to `endpoint`.
    async fn post(&self, endpoint: &str, params: Params) -> Result<Response>;

    /// DELETE `endpoint` with `params` as the body.
    async fn delete(&self, endpoint: &str, params: Params) -> Result<Response>;

    /// Logs in unless a token is already cached.
    async fn login(&self) -> Result<()>;

    /// Adds or overwrites default headers given as `"Name=value"`.
    async fn update_headers(&self, headers: &[&str]) -> Result<()>;
}

/// An authenticated session against one API host.
///
/// Clones share the same token, headers and lock. Calls on one session are
/// serialized: the lock is held for the whole logical call, including a
/// re-authentication and its retried exchange, so exchanges never overlap.
///
/// # Examples
///
/// ```no_run
/// use dsdk::{Params, Session};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), dsdk::Error> {
/// let session = Session::builder()
///     .host("10.0.0.5")
///     .credentials("admin", "password")
///     .timeout("30s")
///     .build()?;
///
/// session.login().await?;
///
/// let instances = session.get("app_instances", &["limit=10"]).await?;
/// println!("{}", instances.text());
///
/// session.post("app_instances", ["name=my-app", "create_mode=normal"]).await?;
/// session
///     .put("app_instances/my-app", false, json!({"descr": "nested", "tags": ["a", "b"]}))
///     .await?;
/// session.delete("app_instances/my-app", Params::empty()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    http_client: reqwest::Client,
    template: Template,
    host: String,
    port: String,
    api_version: String,
    tenant: String,
    username: String,
    password: SecretString,
    timeout: Duration,
    logger: Arc<dyn RequestLogger>,
    state: Mutex<SessionState>,
}

/// Mutable session state, only touched under the lock.
struct SessionState {
    token: Option<String>,
    headers: HeaderMap,
}

/// One completed HTTP exchange.
struct Exchange {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Session {
    /// Creates a new `SessionBuilder`.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Opens a session from a config, logging through `tracing`.
    ///
    /// No request is made; the first call or [`Session::login`] logs in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] for an invalid timeout string,
    /// host, port or header.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_logger(config, Arc::new(TracingLogger))
    }

    /// Opens a session that reports its exchanges to `logger`.
    pub fn with_logger(config: SessionConfig, logger: Arc<dyn RequestLogger>) -> Result<Self> {
        config.validate()?;
        let timeout = config.timeout()?;
        let template = Template::for_scheme(config.secure)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &config.headers {
            let (name, value) = header_pair(name, value)?;
            headers.insert(name, value);
        }
        let (name, value) = header_pair("tenant", &config.tenant)?;
        headers.insert(name, value);

        let http_client = reqwest::Client::builder().build().map_err(|e| {
            Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
        })?;

        tracing::debug!(
            host = %config.host,
            port = %config.port,
            api_version = %config.api_version,
            tenant = %config.tenant,
            secure = config.secure,
            timeout_ms = timeout.as_millis(),
            "Created API session"
        );

        Ok(Session {
            inner: Arc::new(SessionInner {
                http_client,
                template,
                host: config.host,
                port: config.port,
                api_version: config.api_version,
                tenant: config.tenant,
                username: config.username,
                password: config.password,
                timeout,
                logger,
                state: Mutex::new(SessionState {
                    token: None,
                    headers,
                }),
            }),
        })
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn tenant(&self) -> &str {
        &self.inner.tenant
    }

    pub fn api_version(&self) -> &str {
        &self.inner.api_version
    }

    /// Returns `true` if a session token is cached.
    pub async fn is_logged_in(&self) -> bool {
        self.inner.state.lock().await.token.is_some()
    }

    /// A snapshot of the default headers.
    pub async fn headers(&self) -> HeaderMap {
        self.inner.state.lock().await.headers.clone()
    }

    /// Makes a GET request.
    ///
    /// Query parameters are `"key=value"` strings; keys and values are
    /// URL-escaped. A parameter without `=` is sent as a bare key.
    pub async fn get(&self, endpoint: &str, query_params: &[&str]) -> Result<Response> {
        let metadata = RequestMetadata::new(Verb::Get, endpoint)
            .with_query_params(query_params.iter().copied());
        self.call(metadata).await
    }

    /// Makes a PUT request with `params` as the JSON body.
    ///
    /// Set `sensitive` to keep the body out of the logs, e.g. for credentials.
    pub async fn put(
        &self,
        endpoint: &str,
        sensitive: bool,
        params: impl Into<Params>,
    ) -> Result<Response> {
        let body = params.into().to_body()?;
        let metadata = RequestMetadata::new(Verb::Put, endpoint)
            .with_body(body)
            .sensitive(sensitive);
        self.call(metadata).await
    }

    /// Makes a POST request with `params` as the JSON body.
    pub async fn post(&self, endpoint: &str, params: impl Into<Params>) -> Result<Response> {
        let body = params.into().to_body()?;
        let metadata = RequestMetadata::new(Verb::Post, endpoint).with_body(body);
        self.call(metadata).await
    }

    /// Makes a DELETE request with `params` as the JSON body.
    ///
    /// Empty params still send `{}`.
    pub async fn delete(&self, endpoint: &str, params: impl Into<Params>) -> Result<Response> {
        let body = params.into().to_body()?;
        let metadata = RequestMetadata::new(Verb::Delete, endpoint).with_body(body);
        self.call(metadata).await
    }

    /// Runs one logical call.
    ///
    /// Returns the response for any status outside the API error set. On
    /// `401 PermissionDeniedError` the cached token is dropped, the session
    /// logs in again and the request is replayed once; a second rejection is
    /// returned as [`Error::Api`].
    pub async fn call(&self, metadata: RequestMetadata) -> Result<Response> {
        let mut state = self.inner.state.lock().await;
        self.call_locked(&mut state, &metadata).await
    }

    /// Logs in, caching the session token.
    ///
    /// Does nothing if a token is already cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] with the server's message if the login is
    /// refused, or if the server accepts it without returning a token.
    pub async fn login(&self) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        self.login_locked(&mut state).await
    }

    /// Adds or overwrites default headers given as `"Name=value"`.
    ///
    /// Either all headers are applied or, on error, none are.
    pub async fn update_headers(&self, headers: &[&str]) -> Result<()> {
        let parsed = headers
            .iter()
            .map(|header| {
                let (name, value) = header.split_once('=').ok_or_else(|| {
                    Error::ConfigurationError(format!(
                        "Invalid header '{}': expected Name=value",
                        header
                    ))
                })?;
                header_pair(name, value)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut state = self.inner.state.lock().await;
        for (name, value) in parsed {
            state.headers.insert(name, value);
        }
        Ok(())
    }

    async fn call_locked(
        &self,
        state: &mut SessionState,
        metadata: &RequestMetadata,
    ) -> Result<Response> {
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let exchange = self.exchange(state, metadata, attempt).await?;

            match classify(exchange.status, &exchange.body) {
                Classification::Success => {
                    return Ok(Response::new(
                        exchange.body,
                        exchange.status,
                        exchange.headers,
                        start_time.elapsed(),
                        attempt,
                    ));
                }
                Classification::RetryAuth if attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        method = %metadata.verb,
                        endpoint = %metadata.endpoint,
                        "Session token rejected, logging in again"
                    );
                    state.token = None;
                    self.login_locked(state).await?;
                }
                Classification::RetryAuth => {
                    tracing::error!(
                        method = %metadata.verb,
                        endpoint = %metadata.endpoint,
                        attempts = attempt,
                        "Permission denied after logging in again"
                    );
                    return Err(api_error(
                        exchange.status,
                        status_line(exchange.status),
                        exchange.body,
                    ));
                }
                Classification::Fatal { status, message } => {
                    tracing::warn!(
                        status = status.as_u16(),
                        method = %metadata.verb,
                        endpoint = %metadata.endpoint,
                        response = %String::from_utf8_lossy(&exchange.body),
                        "API error"
                    );
                    return Err(api_error(status, message, exchange.body));
                }
            }
        }
    }

    async fn login_locked(&self, state: &mut SessionState) -> Result<()> {
        if state.token.is_some() {
            return Ok(());
        }

        let credentials = serde_json::json!({
            "name": self.inner.username,
            "password": self.inner.password.expose_secret(),
        });
        let body = Params::from(credentials).to_body()?;
        let metadata = RequestMetadata::new(Verb::Put, LOGIN_ENDPOINT)
            .with_body(body)
            .sensitive(true);

        // The login exchange never re-authenticates itself.
        let exchange = self.exchange(state, &metadata, 1).await?;

        match classify(exchange.status, &exchange.body) {
            Classification::Success => {
                let login: LoginResult = decode(exchange.status, &exchange.body)?;
                if login.key.is_empty() {
                    return Err(Error::Auth {
                        message: format!(
                            "No API token in response: {}",
                            String::from_utf8_lossy(&exchange.body)
                        ),
                        raw_response: exchange.body,
                    });
                }
                tracing::debug!(
                    host = %self.inner.host,
                    username = %self.inner.username,
                    version = %login.version,
                    "Logged in"
                );
                state.token = Some(login.key);
                Ok(())
            }
            Classification::RetryAuth => Err(login_error(
                exchange.status,
                status_line(exchange.status),
                exchange.body,
            )),
            Classification::Fatal { status, message } => {
                Err(login_error(status, message, exchange.body))
            }
        }
    }

    /// Builds, sends and reads one request. Transport failures are returned
    /// as is; statuses are left to the caller.
    async fn exchange(
        &self,
        state: &SessionState,
        metadata: &RequestMetadata,
        attempt: usize,
    ) -> Result<Exchange> {
        let url = self.build_url(metadata)?;

        let mut headers = state.headers.clone();
        if let Some(token) = &state.token {
            let value = HeaderValue::from_str(token).map_err(|e| Error::Auth {
                message: format!("Session token is not a valid header value: {}", e),
                raw_response: Bytes::new(),
            })?;
            headers.insert(HeaderName::from_static("auth-token"), value);
        }

        let request_id = Uuid::new_v4();
        self.inner.logger.log_request(&RequestRecord {
            request_id,
            verb: metadata.verb,
            url: &url,
            headers: &headers,
            body: metadata.body.as_deref(),
            sensitive: metadata.sensitive,
            attempt,
        });

        let mut request = self
            .inner
            .http_client
            .request(metadata.verb.method(), url)
            .headers(headers);

        // A zero timeout means none.
        if !self.inner.timeout.is_zero() {
            request = request.timeout(self.inner.timeout);
        }

        if let Some(body) = &metadata.body {
            request = request.body(body.clone());
        }

        let sent_at = Instant::now();
        let response = request.send().await.map_err(|e| {
            tracing::warn!(
                error = %e,
                request_id = %request_id,
                method = %metadata.verb,
                endpoint = %metadata.endpoint,
                "Request failed"
            );
            Error::from(e)
        })?;
        let response_time = sent_at.elapsed();

        let status = response.status();
        let response_headers = response.headers().clone();

        let read_at = Instant::now();
        let body = response.bytes().await?;
        let read_time = read_at.elapsed();

        self.inner.logger.log_response(&ResponseRecord {
            request_id,
            status,
            headers: &response_headers,
            body: &body,
            sensitive: metadata.sensitive,
            response_time,
            read_time,
        });

        Ok(Exchange {
            status,
            headers: response_headers,
            body,
        })
    }

    fn build_url(&self, metadata: &RequestMetadata) -> Result<Url> {
        let rendered = self.inner.template.render(&[
            ("host", self.inner.host.as_str()),
            ("port", self.inner.port.as_str()),
            ("version", self.inner.api_version.as_str()),
            ("endpoint", metadata.endpoint.trim_matches('/')),
        ])?;
        let mut url = Url::parse(&rendered)?;

        if !metadata.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for param in &metadata.query_params {
                match param.split_once('=') {
                    Some((key, value)) => pairs.append_pair(key, value),
                    None => pairs.append_key_only(param),
                };
            }
        }

        Ok(url)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("api_version", &self.inner.api_version)
            .field("tenant", &self.inner.tenant)
            .field("username", &self.inner.username)
            .field("template", &self.inner.template.source())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ApiConnection for Session {
    async fn get(&self, endpoint: &str, query_params: &[&str]) -> Result<Response> {
        Session::get(self, endpoint, query_params).await
    }

    async fn put(&self, endpoint: &str, sensitive: bool, params: Params) -> Result<Response> {
        Session::put(self, endpoint, sensitive, params).await
    }

    async fn post(&self, endpoint: &str, params: Params) -> Result<Response> {
        Session::post(self, endpoint, params).await
    }

    async fn delete(&self, endpoint: &str, params: Params) -> Result<Response> {
        Session::delete(self, endpoint, params).await
    }

    async fn login(&self) -> Result<()> {
        Session::login(self).await
    }

    async fn update_headers(&self, headers: &[&str]) -> Result<()> {
        Session::update_headers(self, headers).await
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::try_from(name)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
    let value = HeaderValue::try_from(value)
        .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
    Ok((name, value))
}

fn api_error(status: StatusCode, message: String, body: Bytes) -> Error {
    let detail = serde_json::from_slice::<ErrorResponse>(&body)
        .ok()
        .map(Box::new);
    Error::Api {
        status,
        message,
        raw_response: body,
        detail,
    }
}

/// Prefers the server's own message; falls back to the status error when the
/// body is not an API error.
fn login_error(status: StatusCode, message: String, body: Bytes) -> Error {
    match serde_json::from_slice::<ErrorResponse>(&body) {
        Ok(err) if !err.message.is_empty() => {
            tracing::error!(
                status = status.as_u16(),
                name = %err.name,
                message = %err.message,
                "Login refused"
            );
            Error::Auth {
                message: err.message,
                raw_response: body,
            }
        }
        _ => api_error(status, message, body),
    }
}

/// Builder for configuring and creating a [`Session`].
///
/// # Examples
///
/// ```no_run
/// use dsdk::Session;
///
/// # fn example() -> Result<(), dsdk::Error> {
/// let session = Session::builder()
///     .host("storage.example.com")
///     .port("7718")
///     .credentials("admin", "password")
///     .api_version("2.2")
///     .tenant("/root/dev")
///     .timeout("1m")
///     .header("X-Client", "inventory")
///     .secure(true)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    config: SessionConfig,
    logger: Option<Arc<dyn RequestLogger>>,
}

impl SessionBuilder {
    /// Creates a new `SessionBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::new("", "", ""),
            logger: None,
        }
    }

    /// Starts from an existing config.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.config.port = port.into();
        self
    }

    /// Sets the username and password used to log in.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = SecretString::from(password.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.config.tenant = tenant.into();
        self
    }

    /// Sets the per-exchange timeout as a duration string such as `"30s"`.
    ///
    /// The string is validated by [`SessionBuilder::build`].
    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.config.timeout = timeout.into();
        self
    }

    /// Adds a default header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Chooses HTTPS (`true`, the default) or HTTP.
    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    /// Reports exchanges to `logger` instead of `tracing`.
    pub fn logger(mut self, logger: Arc<dyn RequestLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Builds the configured `Session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is missing, or the port, timeout or a
    /// header is invalid.
    pub fn build(self) -> Result<Session> {
        let logger = self.logger.unwrap_or_else(|| Arc::new(TracingLogger));
        Session::with_logger(self.config, logger)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
