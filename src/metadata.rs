//! Per-call request metadata.

use crate::{Error, Result};
use http::Method;
use std::fmt;
use std::str::FromStr;

/// The HTTP verbs the API supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Put,
    Post,
    Delete,
}

impl Verb {
    /// The matching [`http::Method`].
    pub fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Put => Method::PUT,
            Verb::Post => Method::POST,
            Verb::Delete => Method::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Put => "PUT",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = Error;

    /// Parses a verb case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] for anything but GET, PUT, POST
    /// and DELETE.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Verb::Get),
            "put" => Ok(Verb::Put),
            "post" => Ok(Verb::Post),
            "delete" => Ok(Verb::Delete),
            _ => Err(Error::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<&Method> for Verb {
    type Error = Error;

    fn try_from(method: &Method) -> Result<Self> {
        method.as_str().parse()
    }
}

/// Everything needed to issue one logical call.
///
/// Built fresh for every call and replayed unchanged if the call has to be
/// retried after logging in again.
#[derive(Debug, Clone)]
pub struct RequestMetadata {
    /// The HTTP verb.
    pub verb: Verb,

    /// Endpoint relative to the versioned API root, without surrounding slashes.
    pub endpoint: String,

    /// `"key=value"` query parameters, in order.
    pub query_params: Vec<String>,

    /// JSON request body.
    pub body: Option<Vec<u8>>,

    /// Keeps the body out of the logs.
    pub sensitive: bool,
}

impl RequestMetadata {
    /// Creates metadata for `verb` against `endpoint`.
    ///
    /// Leading and trailing slashes are trimmed from the endpoint.
    pub fn new(verb: Verb, endpoint: impl AsRef<str>) -> Self {
        Self {
            verb,
            endpoint: endpoint.as_ref().trim_matches('/').to_string(),
            query_params: Vec::new(),
            body: None,
            sensitive: false,
        }
    }

    /// Adds `"key=value"` query parameters.
    pub fn with_query_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_params.extend(params.into_iter().map(Into::into));
        self
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Marks the body as sensitive.
    pub fn sensitive(mut self, sensitive: bool) -> Self {
        self.sensitive = sensitive;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_case_insensitively() {
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::Get);
        assert_eq!("PUT".parse::<Verb>().unwrap(), Verb::Put);
        assert_eq!("Post".parse::<Verb>().unwrap(), Verb::Post);
        assert_eq!("delete".parse::<Verb>().unwrap(), Verb::Delete);
    }

    #[test]
    fn unknown_verbs_are_rejected() {
        let err = "PATCH".parse::<Verb>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(m) if m == "PATCH"));
        assert!(Verb::try_from(&Method::HEAD).is_err());
    }

    #[test]
    fn verb_maps_to_method() {
        assert_eq!(Verb::Delete.method(), Method::DELETE);
        assert_eq!(Verb::try_from(&Method::POST).unwrap(), Verb::Post);
    }

    #[test]
    fn endpoint_slashes_are_trimmed() {
        let metadata = RequestMetadata::new(Verb::Get, "/app_instances/abc/");
        assert_eq!(metadata.endpoint, "app_instances/abc");

        let metadata = RequestMetadata::new(Verb::Get, "//system");
        assert_eq!(metadata.endpoint, "system");
    }

    #[test]
    fn builder_methods_accumulate() {
        let metadata = RequestMetadata::new(Verb::Put, "login")
            .with_query_params(["a=1"])
            .with_query_params(vec!["b=2".to_string()])
            .with_body(b"{}".to_vec())
            .sensitive(true);
        assert_eq!(metadata.query_params, ["a=1", "b=2"]);
        assert_eq!(metadata.body.as_deref(), Some(&b"{}"[..]));
        assert!(metadata.sensitive);
    }
}
