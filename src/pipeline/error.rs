use super::Lifecycle;
use crate::compiler::CompilationError;
use crate::loader::LoadError;
use crate::persist::{DeserializationError, SerializationError};
use crate::runtime::ParsingError;
use crate::tool::{GenerationError, SourceError};
use std::path::PathBuf;
use thiserror::Error;

/// An operation was called out of order
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot {operation} while {state}: {requirement}")]
pub struct IllegalWorkflowError {
    pub operation: &'static str,
    pub state: Lifecycle,
    pub requirement: &'static str,
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot derive a unit name from {0}")]
    UnnamedUtility(PathBuf),
}

/// Any failure surfaced by the pipeline, one variant per family
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Workflow(#[from] IllegalWorkflowError),

    #[error(transparent)]
    Parsing(#[from] ParsingError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Deserialization(#[from] DeserializationError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
