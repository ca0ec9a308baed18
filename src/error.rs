use thiserror::Error;

#[derive(Error, Debug)]
pub enum FhirDefaultsError {
    /// The schema and the traversal disagree: frame stack underflow, slicing
    /// over a non-sequence, a path that is not beneath its parent path.
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// A pattern could not be merged into the existing value shape.
    #[error("Pattern conflict: {message}")]
    PatternConflict { message: String },

    #[error("Discriminator path resolved to nothing: {path}")]
    UnresolvedDiscriminatorPath { path: String },

    #[error("Schema not found: {url}")]
    SchemaNotFound { url: String },

    #[error("Invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, FhirDefaultsError>;

impl FhirDefaultsError {
    pub fn invariant_violation<S: Into<String>>(message: S) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    pub fn pattern_conflict<S: Into<String>>(message: S) -> Self {
        Self::PatternConflict {
            message: message.into(),
        }
    }

    pub fn unresolved_discriminator_path<S: Into<String>>(path: S) -> Self {
        Self::UnresolvedDiscriminatorPath { path: path.into() }
    }

    pub fn schema_not_found<S: Into<String>>(url: S) -> Self {
        Self::SchemaNotFound { url: url.into() }
    }

    pub fn invalid_schema<S: Into<String>>(message: S) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Fatal errors abort a traversal; everything else is handled locally or
    /// belongs to the provider layer.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}
