use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("No grammar files supplied")]
    NoGrammar,

    #[error("{file}:{line}:{column}: syntax error: {message}")]
    Syntax {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{file}:{line}:{column}: {message}")]
    Rule {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Grammar {grammar}: {message}")]
    Grammar { grammar: String, message: String },

    #[error("Grammar {0} is declared more than once")]
    DuplicateGrammar(String),

    #[error("Cannot find grammar {name} imported by {importer}")]
    MissingImport { name: String, importer: String },

    #[error("{} warning(s) treated as errors: {}", .0.len(), .0.join("; "))]
    WarningsAsErrors(Vec<String>),
}

impl GenerationError {
    pub(crate) fn grammar(grammar: &str, message: impl Into<String>) -> Self {
        GenerationError::Grammar {
            grammar: grammar.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read grammar file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No grammar files found under {0}")]
    Empty(std::path::PathBuf),
}
