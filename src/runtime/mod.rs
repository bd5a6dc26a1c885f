//! Generic invocation of loaded recognizers.
//!
//! Lexers and parsers are reached only through the [`TokenSource`] and
//! [`RuleInvoker`] capabilities registered by the loader, so callers never
//! need the concrete recognizer types.

mod diagnostics;
mod error;
mod input;
mod lexer;
mod native;
mod parser;
mod token;

#[cfg(test)]
mod tests;

pub use diagnostics::{DiagnosticKind, SyntaxDiagnostic};
pub use error::ParsingError;
pub use input::{CaseFolding, CharStream};
pub use lexer::LexerProgram;
pub use native::{NativeChild, NativeParseResult, RecognizerNames, RuleContext};
pub use parser::{ParserProgram, DEFAULT_MAX_RULE_DEPTH};
pub use token::{Token, TokenStream, Vocabulary, DEFAULT_CHANNEL, EOF, HIDDEN_CHANNEL};

use crate::loader::LoadedRecognizer;
use tracing::debug;

/// Suffix marking a lexer unit by convention
pub const LEXER_MARKER: &str = "Lexer";
/// Suffix marking a parser unit by convention
pub const PARSER_MARKER: &str = "Parser";

/// Turns characters into tokens
pub trait TokenSource: Send + Sync {
    fn name(&self) -> &str;
    fn vocabulary(&self) -> &Vocabulary;
    fn tokenize(&self, input: &CharStream) -> TokenStream;
}

/// Runs a named rule over a token stream
pub trait RuleInvoker: Send + Sync {
    fn name(&self) -> &str;
    /// Lexer unit whose vocabulary the parser was compiled against
    fn vocabulary_unit(&self) -> &str;
    fn rule_names(&self) -> &[String];
    fn default_rule(&self) -> &str;
    /// Run `rule`; nesting rules deeper than `max_depth` is an error
    fn parse_rule(&self, rule: &str, tokens: TokenStream, max_depth: usize) -> Result<NativeParseResult, ParsingError>;
}

/// Which units and rule to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationRequest {
    pub lexer: Option<String>,
    pub parser: Option<String>,
    pub entry_rule: Option<String>,
    pub case_folding: CaseFolding,
    /// Rule nesting limit, [`DEFAULT_MAX_RULE_DEPTH`] when unset
    pub max_rule_depth: Option<usize>,
}

impl InvocationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lexer(mut self, name: impl Into<String>) -> Self {
        self.lexer = Some(name.into());
        self
    }

    pub fn parser(mut self, name: impl Into<String>) -> Self {
        self.parser = Some(name.into());
        self
    }

    pub fn entry_rule(mut self, rule: impl Into<String>) -> Self {
        self.entry_rule = Some(rule.into());
        self
    }

    pub fn case_folding(mut self, folding: CaseFolding) -> Self {
        self.case_folding = folding;
        self
    }

    pub fn max_rule_depth(mut self, depth: usize) -> Self {
        self.max_rule_depth = Some(depth);
        self
    }
}

/// Pick the parser unit a request refers to
pub fn select_parser<'a>(
    recognizer: &'a LoadedRecognizer,
    name: Option<&str>,
) -> Result<&'a dyn RuleInvoker, ParsingError> {
    let registry = recognizer.registry();
    if let Some(name) = name {
        return registry.parser(name).ok_or_else(|| ParsingError::UnitNotFound {
            kind: "parser",
            name: name.to_string(),
        });
    }
    let name = choose("parser", PARSER_MARKER, registry.parser_names())?;
    registry.parser(&name).ok_or(ParsingError::NoUnit { kind: "parser" })
}

/// Pick the lexer unit feeding `parser`
pub fn select_lexer<'a>(
    recognizer: &'a LoadedRecognizer,
    name: Option<&str>,
    parser: &dyn RuleInvoker,
) -> Result<&'a dyn TokenSource, ParsingError> {
    let name = name.unwrap_or_else(|| parser.vocabulary_unit());
    recognizer
        .registry()
        .lexer(name)
        .ok_or_else(|| ParsingError::UnitNotFound {
            kind: "lexer",
            name: name.to_string(),
        })
}

/// Prefer the single unit ending in `marker`, else the single unit
fn choose(kind: &'static str, marker: &str, mut names: Vec<String>) -> Result<String, ParsingError> {
    names.sort();
    let marked: Vec<&String> = names.iter().filter(|n| n.ends_with(marker)).collect();
    match (marked.as_slice(), names.as_slice()) {
        ([single], _) => Ok((*single).clone()),
        ([], []) => Err(ParsingError::NoUnit { kind }),
        ([], [single]) => Ok(single.clone()),
        _ => Err(ParsingError::AmbiguousUnit {
            kind,
            candidates: names.clone(),
        }),
    }
}

/// Tokenize `input` and run the requested rule
pub fn run(
    recognizer: &LoadedRecognizer,
    input: CharStream,
    request: &InvocationRequest,
) -> Result<NativeParseResult, ParsingError> {
    let parser = select_parser(recognizer, request.parser.as_deref())?;
    let lexer = select_lexer(recognizer, request.lexer.as_deref(), parser)?;

    let rule = request
        .entry_rule
        .as_deref()
        .unwrap_or_else(|| parser.default_rule());
    if !parser.rule_names().iter().any(|name| name == rule) {
        return Err(ParsingError::UnknownEntryRule {
            parser: parser.name().to_string(),
            rule: rule.to_string(),
        });
    }

    // A stream that already folds keeps its mode unless the request names one
    let input = match request.case_folding {
        CaseFolding::None => input,
        folding => input.with_case_folding(folding),
    };
    let tokens = lexer.tokenize(&input);
    debug!(
        "{} produced {} token(s) from {}",
        lexer.name(),
        tokens.tokens.len(),
        input.source_name()
    );
    let max_depth = request.max_rule_depth.unwrap_or(DEFAULT_MAX_RULE_DEPTH);
    parser.parse_rule(rule, tokens, max_depth)
}
