use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Unit {unit} referenced by {referenced_by} cannot be resolved")]
    Unresolved { unit: String, referenced_by: String },

    #[error("Unit {unit} is corrupt: {reason}")]
    Corrupt { unit: String, reason: String },

    #[error("Unit {unit} holds a {found} image where a {expected} was expected")]
    UnexpectedImage {
        unit: String,
        found: &'static str,
        expected: &'static str,
    },

    #[error("Unit {0} is registered twice")]
    DuplicateUnit(String),
}
