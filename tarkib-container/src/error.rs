//! Error types for Tarkib operations.
//!
//! Every public operation returns [`TarkibError`]. Variants that name
//! something the caller registered carry a payload struct whose
//! `Display` adds hints and "did you mean" suggestions.

use std::fmt;

use tarkib_support::rendering::render_chain;

/// Boxed error returned by user hooks (init methods, post-processors).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all Tarkib operations.
#[derive(Debug, thiserror::Error)]
pub enum TarkibError {
    /// A property, alias or bean definition does not exist.
    #[error("{}", .0)]
    NotFound(NotFoundError),

    /// A registration collides with an existing one.
    #[error("{}", .0)]
    Conflict(ConflictError),

    /// A binding directive or attribute could not be parsed.
    #[error("Malformed directive '{input}': {reason}")]
    Malformed { input: String, reason: String },

    /// A value could not be converted, including numeric overflow.
    #[error("{}", .0)]
    Conversion(ConversionError),

    /// The target of a write cannot be written.
    #[error("Cannot write {target}: {reason}")]
    NotSettable { target: String, reason: String },

    /// The target type is not one the operation knows how to fill.
    #[error(
        "Unsupported target type '{target}' for {binding}\n  Hint: property bindings accept integers, floats, bool, String and Option of those; bean bindings accept Arc<T>"
    )]
    UnsupportedType { target: String, binding: String },

    /// Following an alias chain came back to an alias already visited.
    #[error("Cyclic alias detected:\n  {}", .0)]
    CyclicAlias(CycleError),

    /// A bean was requested again while it was still being constructed.
    #[error(
        "Cyclic bean dependency detected:\n  {}\n  Hint: break the cycle by removing one of the autowired references",
        .0
    )]
    CyclicDependency(CycleError),

    /// A bean was accessed as a type it is not.
    #[error("Bean '{name}' is a {found}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// An init method or post-processor failed.
    #[error("Bean '{name}' failed during {phase}: {source}")]
    LifecycleFailed {
        name: String,
        phase: &'static str,
        #[source]
        source: BoxError,
    },
}

/// What kind of entry a lookup or registration was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Property,
    Alias,
    BeanDefinition,
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Property => f.write_str("Property"),
            Subject::Alias => f.write_str("Alias"),
            Subject::BeanDefinition => f.write_str("Bean definition"),
        }
    }
}

/// Error when a name is not registered.
#[derive(Debug)]
pub struct NotFoundError {
    pub subject: Subject,
    /// The name (or key) that was requested
    pub name: String,
    /// The bean whose wiring asked for it, if any
    pub required_by: Option<String>,
    /// Registered names close to the requested one
    pub suggestions: Vec<String>,
}

impl NotFoundError {
    pub fn new(subject: Subject, name: impl Into<String>) -> Self {
        Self {
            subject,
            name: name.into(),
            required_by: None,
            suggestions: Vec::new(),
        }
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' not found", self.subject, self.name)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// Error when a registration collides with an existing entry.
#[derive(Debug)]
pub struct ConflictError {
    pub subject: Subject,
    pub name: String,
    /// For aliases: the name the alias already points to
    pub registered_for: Option<String>,
    /// For aliases: the name the caller tried to point it to
    pub requested_for: Option<String>,
}

impl fmt::Display for ConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.registered_for, &self.requested_for) {
            (Some(existing), Some(requested)) => write!(
                f,
                "Cannot define {} '{}' for name '{}': it is already registered for name '{}'",
                self.subject.to_string().to_lowercase(),
                self.name,
                requested,
                existing,
            )?,
            _ => write!(f, "{} '{}' is already registered", self.subject, self.name)?,
        }
        write!(f, "\n  Hint: remove the existing entry first")
    }
}

/// Error when a value cannot be converted to or from its string form.
#[derive(Debug)]
pub struct ConversionError {
    /// The (flattened) property key involved
    pub key: String,
    /// The raw value, or a description of it
    pub value: String,
    /// What the value was being converted to
    pub target: String,
    pub reason: String,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot convert value '{}' to {} for key '{}': {}",
            self.value, self.target, self.key, self.reason
        )
    }
}

/// A chain of names that loops back on itself.
///
/// Example: `["a", "b", "a"]`
#[derive(Debug, Clone)]
pub struct CycleError {
    pub chain: Vec<String>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_chain(&self.chain))
    }
}

impl TarkibError {
    pub(crate) fn not_found(subject: Subject, name: impl Into<String>) -> Self {
        TarkibError::NotFound(NotFoundError::new(subject, name))
    }

    pub(crate) fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        TarkibError::Malformed {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn conversion(
        key: impl Into<String>,
        value: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        TarkibError::Conversion(ConversionError {
            key: key.into(),
            value: value.into(),
            target: target.into(),
            reason: reason.into(),
        })
    }
}

/// Convenient Result type for Tarkib operations.
pub type Result<T> = std::result::Result<T, TarkibError>;
