use crate::artifact::BundleError;
use crate::security::EntryNameError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("Refusing to overwrite existing bundle: {0}")]
    AlreadyExists(PathBuf),

    #[error("Failed to encode manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error while storing bundle: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DeserializationError {
    #[error("Bundle format version {found} is not supported (expected {expected})")]
    IncompatibleVersion { found: u32, expected: u32 },

    #[error("Bundle has no format version")]
    MissingVersion,

    #[error("Entry {0} not found in bundle")]
    MissingEntry(String),

    #[error("Invalid entry name {entry}: {source}")]
    InvalidEntry {
        entry: String,
        #[source]
        source: EntryNameError,
    },

    #[error("Checksum mismatch for unit {unit}")]
    ChecksumMismatch { unit: String },

    #[error("Manifest is inconsistent: {0}")]
    InvalidManifest(String),

    #[error("Bundle contents are inconsistent: {0}")]
    Inconsistent(#[from] BundleError),

    #[error("Failed to decode manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Failed to read archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error while restoring bundle: {0}")]
    Io(#[from] std::io::Error),
}
