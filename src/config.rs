//! Session configuration.
//!
//! [`SessionConfig`] holds everything needed to open a session and can be
//! deserialized from whatever configuration source the application uses.
//! Discovering that source is the application's job.

use crate::{Error, Result};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_PORT: &str = "7717";
pub const DEFAULT_API_VERSION: &str = "2.2";
pub const DEFAULT_TENANT: &str = "/root";
pub const DEFAULT_TIMEOUT: &str = "300s";

/// Connection settings for one session against one host.
///
/// # Examples
///
/// ```
/// use dsdk::SessionConfig;
///
/// let config: SessionConfig = serde_json::from_str(r#"{
///     "host": "10.0.0.5",
///     "username": "admin",
///     "password": "secret",
///     "timeout": "1m30s"
/// }"#).unwrap();
///
/// assert_eq!(config.port, "7717");
/// assert_eq!(config.tenant, "/root");
/// assert_eq!(config.timeout().unwrap().as_secs(), 90);
/// ```
#[derive(Clone, Deserialize)]
pub struct SessionConfig {
    /// Hostname or IP address of the management endpoint.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: String,

    pub username: String,

    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,

    /// API version without the leading `v`, e.g. `2.2`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Tenant sent with every request in the `tenant` header.
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// Per-exchange timeout as a Go-style duration string (`"300s"`, `"1m30s"`).
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Extra default headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Use HTTPS instead of HTTP.
    #[serde(default = "default_secure")]
    pub secure: bool,
}

impl SessionConfig {
    /// Creates a config with default port, version, tenant, timeout and HTTPS.
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: SecretString::from(password.into()),
            api_version: default_api_version(),
            tenant: default_tenant(),
            timeout: default_timeout(),
            headers: BTreeMap::new(),
            secure: default_secure(),
        }
    }

    /// Parses the timeout string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] if the string is not a valid duration.
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }

    /// Checks the settings that can be checked without contacting the host.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::ConfigurationError("host is required".to_string()));
        }
        let digits = !self.port.is_empty() && self.port.chars().all(|c| c.is_ascii_digit());
        if !digits || self.port.parse::<u16>().is_err() {
            return Err(Error::ConfigurationError(format!(
                "invalid port '{}'",
                self.port
            )));
        }
        self.timeout()?;
        Ok(())
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("tenant", &self.tenant)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("secure", &self.secure)
            .finish()
    }
}

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

fn default_secure() -> bool {
    true
}

fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

/// Parses a Go-style duration string.
///
/// A duration is a sequence of decimal numbers, each with an optional
/// fraction and a unit suffix, such as `"300ms"`, `"1.5h"` or `"2h45m"`.
/// Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. The bare
/// string `"0"` is zero. Negative durations are rejected.
///
/// # Examples
///
/// ```
/// use dsdk::config::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
/// assert!(parse_duration("30").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || Error::ConfigurationError(format!("invalid duration '{input}'"));

    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest.starts_with('-') {
        if rest[1..].chars().all(|c| c == '0') && rest.len() > 1 {
            return Ok(Duration::ZERO);
        }
        return Err(Error::ConfigurationError(format!(
            "negative duration '{input}'"
        )));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, after_int) = rest.split_at(int_len);

        let (frac_part, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = after_number
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after_number.len());
        let (unit, remaining) = after_number.split_at(unit_len);
        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => {
                return Err(Error::ConfigurationError(format!(
                    "missing unit in duration '{input}'"
                )))
            }
            other => {
                return Err(Error::ConfigurationError(format!(
                    "unknown unit '{other}' in duration '{input}'"
                )))
            }
        };

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(invalid)?;

        let mut frac_scale = scale;
        for digit in frac_part.chars() {
            frac_scale /= 10;
            if frac_scale == 0 {
                break;
            }
            nanos += u128::from(digit.to_digit(10).unwrap_or(0)) * frac_scale;
        }

        total_nanos = total_nanos.checked_add(nanos).ok_or_else(invalid)?;
        rest = remaining;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| invalid())?;
    let subsec = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, subsec))
}
