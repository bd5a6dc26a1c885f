use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParsingError {
    #[error("No {kind} unit named {name} is loaded")]
    UnitNotFound { kind: &'static str, name: String },

    #[error("No {kind} unit is loaded")]
    NoUnit { kind: &'static str },

    #[error("Cannot choose a {kind} unit among: {}", .candidates.join(", "))]
    AmbiguousUnit {
        kind: &'static str,
        candidates: Vec<String>,
    },

    #[error("Parser {parser} has no rule named {rule}")]
    UnknownEntryRule { parser: String, rule: String },

    #[error("Rule nesting deeper than {limit} while parsing {rule}")]
    RecursionLimit { rule: String, limit: usize },

    #[error("Failed to start the parse thread: {0}")]
    ParseThread(#[source] std::io::Error),

    #[error("Failed to read input {source_name}: {source}")]
    Input {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
}
