use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("document builder: {0}")]
    Build(String),

    #[error("group aggregator: {0}")]
    Group(String),
}

/// Why a single field fell back to its empty value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("column {0} missing")]
    Missing(usize),

    #[error("'{value}' is not a number")]
    NotNumeric { value: String },

    #[error("{0} overflows after scaling")]
    Overflow(String),
}
