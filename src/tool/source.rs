use super::SourceError;
use std::path::Path;
use walkdir::WalkDir;

/// File extension of grammar files picked up from directories
pub const GRAMMAR_EXTENSION: &str = "g4";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarFile {
    /// File name used in diagnostics
    pub name: String,
    pub text: String,
}

/// The grammar files handed to the tool as one set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarSource {
    files: Vec<GrammarFile>,
}

impl GrammarSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single in-memory grammar
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new().with_file(name, text)
    }

    pub fn with_file(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.add(GrammarFile {
            name: name.into(),
            text: text.into(),
        });
        self
    }

    pub fn add(&mut self, file: GrammarFile) {
        self.files.push(file);
    }

    /// Read grammar files from disk, in the given order
    pub fn from_files<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
    ) -> Result<Self, SourceError> {
        let mut source = Self::new();
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            source.add(GrammarFile { name, text });
        }
        Ok(source)
    }

    /// Read every `.g4` file below `dir`, sorted by path
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self, SourceError> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| SourceError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            let is_grammar = entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some(GRAMMAR_EXTENSION);
            if is_grammar {
                paths.push(entry.into_path());
            }
        }
        if paths.is_empty() {
            return Err(SourceError::Empty(dir.to_path_buf()));
        }
        Self::from_files(paths)
    }

    pub fn files(&self) -> &[GrammarFile] {
        &self.files
    }

    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
