use thiserror::Error;

/// Reasons a write is refused before anything is persisted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing identifier")]
    MissingIdentifier,

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("document identifier {found:?} does not match {expected:?}")]
    IdentifierMismatch { expected: String, found: String },

    #[error("no file uploaded")]
    EmptyUpload,

    #[error("all photo slots of {0} are taken")]
    SlotsExhausted(String),

    #[error("no identifiers left for day {0}")]
    SequenceExhausted(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid entry name: {0:?}")]
    InvalidName(String),
}

impl ValidationError {
    /// Stable reason code handed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingIdentifier => "missing-id",
            ValidationError::InvalidIdentifier(_) => "invalid-id",
            ValidationError::IdentifierMismatch { .. } => "id-mismatch",
            ValidationError::EmptyUpload => "no-file",
            ValidationError::SlotsExhausted(_) => "slots-exhausted",
            ValidationError::SequenceExhausted(_) => "sequence-exhausted",
            ValidationError::MissingField(_) => "missing-field",
            ValidationError::InvalidName(_) => "invalid-name",
        }
    }
}

#[derive(Error, Debug)]
pub enum RapportError {
    #[error("Storage not configured: {0}")]
    NotConfigured(String),

    #[error("Namespace unavailable: {0}")]
    NamespaceUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote store answered {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl RapportError {
    /// The validation reason code, if this is a validation failure.
    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            RapportError::Validation(v) => Some(v.code()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RapportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_carry_reason_codes() {
        let err: RapportError = ValidationError::SlotsExhausted("250101-000".into()).into();
        assert_eq!(err.reason_code(), Some("slots-exhausted"));
        assert_eq!(
            RapportError::from(ValidationError::EmptyUpload).reason_code(),
            Some("no-file")
        );
        assert_eq!(RapportError::NotFound("x".into()).reason_code(), None);
    }
}
