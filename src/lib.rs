// Public API exports
pub mod artifact;
pub mod compiler;
pub mod loader;
pub mod persist;
pub mod pipeline;
pub mod runtime;
pub mod security;
pub mod tool;
pub mod tree;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use pipeline::{
    GenericParser, IllegalWorkflowError, Lifecycle, ParseOptions, ParserConfig, ParserSettings,
    PipelineError, SettingsError,
};

pub use tool::{GenerationError, GenerationOptions, GrammarSource, GrammarTool};

pub use artifact::{CompiledBundleSet, GeneratedUnit, InnerUnitClassifier, PrefixClassifier};
pub use compiler::{CompilationError, InMemoryCompiler};
pub use loader::{LoadError, LoadedRecognizer};

pub use runtime::{CaseFolding, CharStream, NativeParseResult, ParsingError, SyntaxDiagnostic};
pub use tree::{DefaultTreeListener, GenericTreeNode, NodeKind, ParseTree, ParseTreeListener};

pub use persist::{BundleMetadata, DeserializationError, PersistedBundle, SerializationError};
