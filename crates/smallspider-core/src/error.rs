//! Core error types for SmallSpider.
//!
//! [`SpiderError`] is the single error enum used across the workspace. Each
//! variant maps to an HTTP status code through [`SpiderError::status_code`],
//! so the admin layer can turn any failure into a response without a second
//! error hierarchy.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// A validation failure, either for the whole object or per field.
///
/// # Examples
///
/// ```
/// use smallspider_core::error::ValidationError;
///
/// let mut err = ValidationError::default();
/// err.add("title", "This field is required.");
/// assert!(err.has_errors());
/// assert_eq!(err.field_errors["title"], vec!["This field is required."]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// Errors not tied to a single field.
    pub non_field_errors: Vec<String>,
    /// Error messages keyed by field name.
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    /// Creates an error with a single non-field message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            non_field_errors: vec![message.into()],
            field_errors: BTreeMap::new(),
        }
    }

    /// Creates an error with a single message for `field`.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::default();
        err.add(field, message);
        err
    }

    /// Records a message against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Returns `true` if any message has been recorded.
    pub fn has_errors(&self) -> bool {
        !self.non_field_errors.is_empty() || !self.field_errors.is_empty()
    }

    /// Converts into `Err` when messages were recorded, `Ok(())` otherwise.
    pub fn into_result(self) -> SpiderResult<()> {
        if self.has_errors() {
            Err(SpiderError::Validation(self))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for message in &self.non_field_errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{message}")?;
            first = false;
        }
        for (field, messages) in &self.field_errors {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The primary error type for SmallSpider.
#[derive(Error, Debug)]
pub enum SpiderError {
    /// HTTP 400 Bad Request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP 401, no or unknown credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 403, authenticated but not allowed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// HTTP 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Submitted data failed validation.
    #[error("Validation error: {0}")]
    Validation(ValidationError),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Anything else that went wrong on our side.
    #[error("Internal error: {0}")]
    Internal(String),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpiderError {
    /// Returns the HTTP status code associated with this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::PermissionDenied(_) => 403,
            Self::NotFound(_) => 404,
            Self::Configuration(_) | Self::Serialization(_) | Self::Internal(_) | Self::Io(_) => {
                500
            }
        }
    }
}

impl From<ValidationError> for SpiderError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<serde_json::Error> for SpiderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A convenience type alias for `Result<T, SpiderError>`.
pub type SpiderResult<T> = Result<T, SpiderError>;
