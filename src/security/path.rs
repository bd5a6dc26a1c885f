use std::path::{Component, Path};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryNameError {
    #[error("Empty entry name")]
    Empty,

    #[error("Absolute entry name not allowed: {0}")]
    Absolute(String),

    #[error("Parent directory traversal not allowed: {0}")]
    ParentTraversal(String),

    #[error("Backslash separators not allowed: {0}")]
    Backslash(String),

    #[error("Hidden entries not allowed: {0}")]
    Hidden(String),

    #[error("No valid components: {0}")]
    NoComponents(String),
}

/// Normalizes archive entry names so they can never escape the archive root
pub struct EntrySanitizer;

impl EntrySanitizer {
    /// Sanitize an entry name, rejecting hidden entries
    pub fn sanitize(raw: &str) -> Result<String, EntryNameError> {
        Self::sanitize_with_options(raw, false)
    }

    pub fn sanitize_with_options(raw: &str, allow_hidden: bool) -> Result<String, EntryNameError> {
        if raw.is_empty() {
            return Err(EntryNameError::Empty);
        }
        // `\` separates components on Windows
        if raw.contains('\\') {
            return Err(EntryNameError::Backslash(raw.to_string()));
        }

        let mut components = Vec::new();
        for component in Path::new(raw).components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(EntryNameError::Absolute(raw.to_string()))
                }
                Component::ParentDir => return Err(EntryNameError::ParentTraversal(raw.to_string())),
                Component::CurDir => continue,
                Component::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| EntryNameError::NoComponents(raw.to_string()))?;
                    if !allow_hidden && part.starts_with('.') {
                        return Err(EntryNameError::Hidden(raw.to_string()));
                    }
                    components.push(part);
                }
            }
        }

        if components.is_empty() {
            return Err(EntryNameError::NoComponents(raw.to_string()));
        }
        Ok(components.join("/"))
    }

    /// Sanitize and require the name to live directly under `dir`
    pub fn sanitize_in(raw: &str, dir: &str) -> Result<String, EntryNameError> {
        let name = Self::sanitize(raw)?;
        match name.strip_prefix(dir).and_then(|rest| rest.strip_prefix('/')) {
            Some(file) if !file.is_empty() && !file.contains('/') => Ok(name),
            _ => Err(EntryNameError::NoComponents(raw.to_string())),
        }
    }
}
