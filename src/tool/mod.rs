//! Grammar tool: turns grammar files into generated unit sources.

pub mod analysis;
mod emit;
mod error;
pub mod grammar;
mod reader;
mod source;
mod token;

#[cfg(test)]
mod tests;

pub use error::{GenerationError, SourceError};
pub use reader::{read_grammar, DEFAULT_MODE, MAX_BLOCK_DEPTH};
pub use source::{GrammarFile, GrammarSource, GRAMMAR_EXTENSION};

use crate::artifact::GeneratedUnit;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File extension used when generated units are written to disk
pub const UNIT_EXTENSION: &str = "unit";

/// Settings that influence code generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Package prefix for generated unit names
    pub package: Option<String>,
    /// Fail generation when any warning is reported
    pub warnings_as_errors: bool,
}

/// Caller hook applied to the generation options before each run
pub type ToolCustomizer = Arc<dyn Fn(&mut GenerationOptions) + Send + Sync>;

/// Output of a generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedRecognizer {
    /// Name identifying the grammar set
    pub grammar_name: String,
    pub units: Vec<GeneratedUnit>,
    /// Lexer unit used by the default parser
    pub lexer: Option<String>,
    /// Default parser unit
    pub parser: Option<String>,
    pub warnings: Vec<String>,
}

impl GeneratedRecognizer {
    pub fn unit(&self, name: &str) -> Option<&GeneratedUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Write each unit to `dir/<name>.unit`, creating the directory if needed
    pub fn write_sources(&self, dir: impl AsRef<Path>) -> std::io::Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let path = dir.join(format!("{}.{}", unit.name, UNIT_EXTENSION));
            std::fs::write(&path, &unit.source)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Produces unit sources from a grammar set
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        source: &GrammarSource,
        options: &GenerationOptions,
    ) -> Result<GeneratedRecognizer, GenerationError>;
}

/// Default generator for the grammar notation
#[derive(Debug, Clone, Copy, Default)]
pub struct GrammarTool;

impl GrammarTool {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for GrammarTool {
    fn generate(
        &self,
        source: &GrammarSource,
        options: &GenerationOptions,
    ) -> Result<GeneratedRecognizer, GenerationError> {
        if source.is_empty() {
            return Err(GenerationError::NoGrammar);
        }

        let mut warnings = Vec::new();
        let mut grammars = Vec::with_capacity(source.len());
        let mut files = HashMap::new();
        for file in source.files() {
            let (grammar, file_warnings) = read_grammar(&file.name, &file.text)?;
            debug!(
                "read {} grammar {} from {} ({} rules)",
                grammar.kind.as_str(),
                grammar.name,
                file.name,
                grammar.rules.len()
            );
            warnings.extend(file_warnings);
            files.insert(grammar.name.clone(), file.name.clone());
            grammars.push(grammar);
        }

        let analysis = analysis::analyze(grammars, options.package.as_deref())?;
        warnings.extend(analysis.warnings);

        for warning in &warnings {
            warn!("{}", warning);
        }
        if options.warnings_as_errors && !warnings.is_empty() {
            return Err(GenerationError::WarningsAsErrors(warnings));
        }

        let mut units = Vec::new();
        for lexer in &analysis.lexers {
            let text = emit::emit_lexer(lexer, file_for(&files, &lexer.grammar));
            units.push(GeneratedUnit::generated(lexer.unit.clone(), text));
        }
        for parser in &analysis.parsers {
            let text = emit::emit_parser(parser, file_for(&files, &parser.grammar));
            units.push(GeneratedUnit::generated(parser.unit.clone(), text));
        }

        let parser = analysis.parsers.first();
        let lexer = parser
            .map(|p| p.vocabulary_unit.clone())
            .or_else(|| analysis.lexers.first().map(|l| l.unit.clone()));

        debug!(
            "generated {} unit(s) for grammar {}",
            units.len(),
            analysis.grammar_name
        );

        Ok(GeneratedRecognizer {
            grammar_name: analysis.grammar_name,
            units,
            lexer,
            parser: parser.map(|p| p.unit.clone()),
            warnings,
        })
    }
}

fn file_for<'a>(files: &'a HashMap<String, String>, grammar: &'a str) -> &'a str {
    files.get(grammar).map(String::as_str).unwrap_or(grammar)
}
