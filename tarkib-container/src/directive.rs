//! Binding directives.
//!
//! A bound field carries one directive string:
//! - `value:${server.port}` reads the property `server.port`
//! - `autowire:dataSource` injects the bean named `dataSource`
//!
//! Directives are parsed when a definition is built, never during
//! resolution.

use std::fmt;

use crate::error::{Result, TarkibError};

const VALUE_PREFIX: &str = "value:";
const AUTOWIRE_PREFIX: &str = "autowire:";

/// Where a field's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Read a configuration key from the property store.
    Property(String),
    /// Inject another bean by name (or alias).
    Bean(String),
}

impl Binding {
    /// Parses a directive string.
    ///
    /// Several directives may be joined with `;`, but a field must end up
    /// with exactly one binding.
    ///
    /// # Examples
    /// ```
    /// use tarkib_container::directive::Binding;
    ///
    /// assert_eq!(
    ///     Binding::parse("value:${server.port}").unwrap(),
    ///     Binding::Property("server.port".into())
    /// );
    /// assert_eq!(
    ///     Binding::parse("autowire:dataSource").unwrap(),
    ///     Binding::Bean("dataSource".into())
    /// );
    /// assert!(Binding::parse("value:server.port").is_err());
    /// ```
    ///
    /// # Errors
    /// [`TarkibError::Malformed`] for an unknown prefix, missing `${...}`,
    /// an empty key or name, or more than one binding.
    pub fn parse(directive: &str) -> Result<Self> {
        parse_directive(directive).map_err(|reason| TarkibError::malformed(directive, reason))
    }

    /// The property key or bean name this binding refers to.
    pub fn target(&self) -> &str {
        match self {
            Binding::Property(key) => key,
            Binding::Bean(name) => name,
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Binding::Property(_))
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Property(key) => write!(f, "{VALUE_PREFIX}${{{key}}}"),
            Binding::Bean(name) => write!(f, "{AUTOWIRE_PREFIX}{name}"),
        }
    }
}

/// Parses a directive, returning the reason on failure.
pub(crate) fn parse_directive(directive: &str) -> std::result::Result<Binding, String> {
    let mut property = None;
    let mut bean = None;

    for part in directive.split(';').map(str::trim) {
        if let Some(rest) = part.strip_prefix(VALUE_PREFIX) {
            let key = rest
                .strip_prefix("${")
                .and_then(|inner| inner.strip_suffix('}'))
                .ok_or_else(|| format!("'{part}' must be formatted as 'value:${{key}}'"))?;
            if key.is_empty() {
                return Err(format!("'{part}' has an empty property key"));
            }
            if property.replace(key).is_some() {
                return Err("more than one 'value:' binding".to_string());
            }
        } else if let Some(name) = part.strip_prefix(AUTOWIRE_PREFIX) {
            if name.is_empty() {
                return Err(format!("'{part}' has an empty bean name"));
            }
            if bean.replace(name).is_some() {
                return Err("more than one 'autowire:' binding".to_string());
            }
        } else {
            return Err(format!("'{part}' must start with 'value:' or 'autowire:'"));
        }
    }

    match (property, bean) {
        (Some(key), None) => Ok(Binding::Property(key.to_string())),
        (None, Some(name)) => Ok(Binding::Bean(name.to_string())),
        (Some(_), Some(_)) => Err("a field cannot be bound to both a value and a bean".to_string()),
        (None, None) => Err("no binding given".to_string()),
    }
}
