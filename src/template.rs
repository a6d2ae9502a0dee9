//! URL templates with named placeholders.
//!
//! A template is plain text with `{name}` placeholders. Rendering is strict:
//! every value handed to [`Template::render`] must be referenced by the
//! template, and every placeholder must receive a value.

use crate::{Error, Result};

/// Template used for sessions talking plain HTTP.
pub const INSECURE_TEMPLATE: &str = "http://{host}:{port}/v{version}/{endpoint}";

/// Template used for sessions talking HTTPS.
pub const SECURE_TEMPLATE: &str = "https://{host}:{port}/v{version}/{endpoint}";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed URL template.
///
/// # Examples
///
/// ```
/// use dsdk::template::Template;
///
/// let template = Template::for_scheme(true).unwrap();
/// let url = template
///     .render(&[
///         ("host", "10.0.0.5"),
///         ("port", "7717"),
///         ("version", "2.2"),
///         ("endpoint", "app_instances"),
///     ])
///     .unwrap();
/// assert_eq!(url, "https://10.0.0.5:7717/v2.2/app_instances");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] for an unclosed or nested `{`, a stray `}`,
    /// or a placeholder name that is empty or not made of ASCII alphanumerics
    /// and underscores.
    pub fn parse(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => {
                                return Err(Error::Template(format!(
                                    "nested '{{' in placeholder at offset {pos} of '{source}'"
                                )))
                            }
                            _ => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(Error::Template(format!(
                            "unclosed placeholder at offset {pos} of '{source}'"
                        )));
                    }
                    if name.is_empty()
                        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    {
                        return Err(Error::Template(format!(
                            "invalid placeholder name '{name}' in '{source}'"
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    return Err(Error::Template(format!(
                        "unmatched '}}' at offset {pos} of '{source}'"
                    )))
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// Returns the connection template for the given transport security.
    pub fn for_scheme(secure: bool) -> Result<Self> {
        if secure {
            Self::parse(SECURE_TEMPLATE)
        } else {
            Self::parse(INSECURE_TEMPLATE)
        }
    }

    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the template references `name`.
    pub fn references(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Iterates over the placeholder names in template order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Renders the template with the given values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`] if a supplied key is not referenced by the
    /// template, or if a placeholder has no value.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        for (key, _) in values {
            if !self.references(key) {
                return Err(Error::Template(format!(
                    "could not find arg '{key}' in template '{}'",
                    self.source
                )));
            }
        }

        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    // last value wins when a key is supplied twice
                    let value = values
                        .iter()
                        .rev()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            Error::Template(format!(
                                "no value for '{name}' in template '{}'",
                                self.source
                            ))
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}
