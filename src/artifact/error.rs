use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    #[error("Duplicate bundle: {0}")]
    DuplicateBundle(String),

    #[error("Duplicate unit name: {0}")]
    DuplicateUnit(String),

    #[error("Unknown bundle: {0}")]
    UnknownBundle(String),

    #[error("Unit id {0} is out of range")]
    UnknownUnit(u32),

    #[error("Unit {0} is claimed by more than one bundle")]
    SharedUnit(String),

    #[error("Unit {0} does not belong to any bundle")]
    OrphanUnit(String),

    #[error("Unit {unit} is misclassified: {reason}")]
    Misclassified { unit: String, reason: String },
}
