/// Errors raised at the boundaries of the audit: loading the reference table and parsing input.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid monetary amount: {0:?}")]
    InvalidAmount(String),
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("failed to read reference table: {0}")]
    ReferenceTableRead(std::io::Error),
    #[error("failed to parse reference table: {0}")]
    ReferenceTableParse(serde_json::Error),
    #[error("duplicate procedure code in reference table: {0}")]
    DuplicateReferenceCode(String),
    #[error("invalid text: {0}")]
    Text(#[from] medcheck_types::TextError),
}

/// Result alias for fallible core operations.
pub type AuditResult<T> = std::result::Result<T, AuditError>;
