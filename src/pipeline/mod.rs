//! The orchestrator: grammar in, generic parse trees out.
//!
//! ```text
//! Uncompiled --compile/load--> Compiled --parse--> Ready
//!                                  ^                 |
//!                                  +--compile/load---+
//! ```

mod config;
mod error;
mod state;


pub use config::{ParseOptions, ParserConfig, ParserSettings};
pub use error::{IllegalWorkflowError, PipelineError, SettingsError};
pub use state::Lifecycle;

use crate::artifact::{CompiledBundleSet, GeneratedUnit};
use crate::compiler::{HostCompiler, InMemoryCompiler};
use crate::loader::LoadedRecognizer;
use crate::persist::{self, BundleMetadata, PersistedBundle};
use crate::runtime::{
    self, CaseFolding, CharStream, InvocationRequest, NativeParseResult, ParsingError, RuleInvoker,
    TokenSource,
};
use crate::tool::{GeneratedRecognizer, Generator, GrammarSource, GrammarTool};
use crate::tree::{DefaultTreeListener, ParseTree, ParseTreeListener, ParseTreeWalker};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Compiles a grammar in memory and parses input with it
pub struct GenericParser {
    grammar: Option<GrammarSource>,
    config: ParserConfig,
    tool: Box<dyn Generator>,
    compiler: InMemoryCompiler,
    state: Lifecycle,
    generated: Option<GeneratedRecognizer>,
    artifacts: Option<CompiledBundleSet>,
    recognizer: Option<LoadedRecognizer>,
    metadata: Option<BundleMetadata>,
    listener: Option<DefaultTreeListener>,
}

impl GenericParser {
    /// Parser without a grammar; it can only be loaded from a persisted bundle
    pub fn new() -> Self {
        Self::with_config(ParserConfig::default())
    }

    pub fn with_config(config: ParserConfig) -> Self {
        let mut compiler = InMemoryCompiler::new();
        if let Some(classifier) = config.inner_classifier() {
            compiler.set_classifier(classifier.clone());
        }
        Self {
            grammar: None,
            config,
            tool: Box::new(GrammarTool::new()),
            compiler,
            state: Lifecycle::Uncompiled,
            generated: None,
            artifacts: None,
            recognizer: None,
            metadata: None,
            listener: Some(DefaultTreeListener::new()),
        }
    }

    pub fn from_source(grammar: GrammarSource, config: ParserConfig) -> Self {
        let mut parser = Self::with_config(config);
        parser.grammar = Some(grammar);
        parser
    }

    pub fn from_files<P: AsRef<Path>>(paths: &[P], config: ParserConfig) -> Result<Self, PipelineError> {
        Ok(Self::from_source(GrammarSource::from_files(paths)?, config))
    }

    pub fn from_directory(dir: impl AsRef<Path>, config: ParserConfig) -> Result<Self, PipelineError> {
        Ok(Self::from_source(GrammarSource::from_directory(dir)?, config))
    }

    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_source(GrammarSource::from_text(name, text), ParserConfig::default())
    }

    /// Restore a parser from a persisted bundle without recompiling
    pub fn from_persisted(bundle: &PersistedBundle, config: ParserConfig) -> Result<Self, PipelineError> {
        let mut parser = Self::with_config(config);
        parser.load_bundle(bundle)?;
        Ok(parser)
    }

    /// Replace the grammar tool
    pub fn with_tool(mut self, tool: Box<dyn Generator>) -> Self {
        self.tool = tool;
        self
    }

    /// Replace the host compiler, keeping the configured classifier
    pub fn with_host_compiler(mut self, host: Box<dyn HostCompiler>) -> Self {
        let mut compiler = InMemoryCompiler::with_host(host);
        if let Some(classifier) = self.config.inner_classifier() {
            compiler.set_classifier(classifier.clone());
        }
        self.compiler = compiler;
        self
    }

    /// Add a utility source compiled with the next `compile`
    pub fn add_utility_source(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.config.push_utility(GeneratedUnit::utility(name, source));
    }

    pub fn add_utility_file(&mut self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        self.config = self.config.clone().utility_file(path)?;
        Ok(())
    }

    fn require_loaded(&self, operation: &'static str) -> Result<&LoadedRecognizer, IllegalWorkflowError> {
        match &self.recognizer {
            Some(recognizer) if self.state.is_loaded() => Ok(recognizer),
            _ => Err(IllegalWorkflowError {
                operation,
                state: self.state,
                requirement: "compile or load a recognizer first",
            }),
        }
    }

    /// Generate, compile and load the grammar; on failure nothing changes
    pub fn compile(&mut self) -> Result<(), PipelineError> {
        let grammar = self.grammar.as_ref().ok_or(IllegalWorkflowError {
            operation: "compile",
            state: self.state,
            requirement: "no grammar source was supplied",
        })?;

        let options = self.config.generation_options();
        let generated = self.tool.generate(grammar, &options)?;
        let mut units = generated.units.clone();
        units.extend(self.config.utility_sources().iter().cloned());
        debug!(
            "compiling {} generated and {} utility unit(s)",
            generated.units.len(),
            self.config.utility_sources().len()
        );

        let artifacts = self.compiler.compile(units)?;
        let recognizer = LoadedRecognizer::load(&artifacts)?;

        let parser = self
            .config
            .configured_parser()
            .map(str::to_string)
            .or_else(|| generated.parser.clone());
        let lexer = match self.config.configured_lexer() {
            Some(lexer) => Some(lexer.to_string()),
            None if self.config.configured_parser().is_none() => generated.lexer.clone(),
            None => None,
        };
        let metadata = BundleMetadata {
            grammar_name: generated.grammar_name.clone(),
            grammar_files: grammar.file_names(),
            lexer,
            parser,
            entry_rule: self.config.configured_entry_rule().map(str::to_string),
            case_folding: self.config.folding(),
        };

        info!(
            "compiled grammar {} into {} unit(s), context {}",
            metadata.grammar_name,
            artifacts.unit_count(),
            recognizer.context_id()
        );
        self.generated = Some(generated);
        self.install(artifacts, recognizer, metadata);
        Ok(())
    }

    fn install(&mut self, artifacts: CompiledBundleSet, recognizer: LoadedRecognizer, metadata: BundleMetadata) {
        self.artifacts = Some(artifacts);
        self.recognizer = Some(recognizer);
        self.metadata = Some(metadata);
        self.state = Lifecycle::Compiled;
        if let Some(listener) = self.listener.as_mut() {
            listener.reset();
        }
    }

    fn request(&self, options: &ParseOptions) -> InvocationRequest {
        let metadata = self.metadata.clone().unwrap_or_default();
        InvocationRequest {
            lexer: self.config.configured_lexer().map(str::to_string).or(metadata.lexer),
            parser: self.config.configured_parser().map(str::to_string).or(metadata.parser),
            entry_rule: options
                .entry_rule
                .clone()
                .or_else(|| self.config.configured_entry_rule().map(str::to_string))
                .or(metadata.entry_rule),
            case_folding: options.case_folding.unwrap_or(metadata.case_folding),
            max_rule_depth: self.config.configured_max_rule_depth(),
        }
    }

    /// Parse a character stream; syntax errors come back as diagnostics
    pub fn parse_stream(&mut self, input: CharStream, options: &ParseOptions) -> Result<NativeParseResult, PipelineError> {
        let recognizer = self.require_loaded("parse")?;
        let request = self.request(options);
        let result = runtime::run(recognizer, input, &request)?;
        debug!(
            "parsed with rule {}: {} token(s), {} diagnostic(s)",
            result.entry_rule,
            result.tokens.len(),
            result.diagnostics.len()
        );

        if let Some(listener) = self.listener.as_mut() {
            ParseTreeWalker::walk(listener, &result);
        }
        if result.root.is_some() {
            self.state = Lifecycle::Ready;
        }
        Ok(result)
    }

    pub fn parse(&mut self, text: &str) -> Result<NativeParseResult, PipelineError> {
        self.parse_stream(CharStream::from_text(text), &ParseOptions::default())
    }

    pub fn parse_rule(&mut self, text: &str, rule: &str) -> Result<NativeParseResult, PipelineError> {
        self.parse_stream(CharStream::from_text(text), &ParseOptions::new().entry_rule(rule))
    }

    pub fn parse_with_folding(&mut self, text: &str, folding: CaseFolding) -> Result<NativeParseResult, PipelineError> {
        self.parse_stream(CharStream::from_text(text), &ParseOptions::new().case_folding(folding))
    }

    pub fn parse_file(&mut self, path: impl AsRef<Path>, options: &ParseOptions) -> Result<NativeParseResult, PipelineError> {
        let path = path.as_ref();
        let input = CharStream::from_file(path).map_err(|source| ParsingError::Input {
            source_name: path.display().to_string(),
            source,
        })?;
        self.parse_stream(input, options)
    }

    pub fn parse_reader(
        &mut self,
        source_name: &str,
        reader: impl Read,
        options: &ParseOptions,
    ) -> Result<NativeParseResult, PipelineError> {
        let input = CharStream::from_reader(source_name, reader).map_err(|source| ParsingError::Input {
            source_name: source_name.to_string(),
            source,
        })?;
        self.parse_stream(input, options)
    }

    /// Parse and drive a caller-supplied listener instead of the attached one
    pub fn parse_with_listener(
        &mut self,
        text: &str,
        options: &ParseOptions,
        listener: &mut dyn ParseTreeListener,
    ) -> Result<NativeParseResult, PipelineError> {
        let recognizer = self.require_loaded("parse")?;
        let result = runtime::run(recognizer, CharStream::from_text(text), &self.request(options))?;
        if ParseTreeWalker::walk(listener, &result) {
            self.state = Lifecycle::Ready;
        }
        Ok(result)
    }

    pub fn set_listener(&mut self, listener: DefaultTreeListener) {
        self.listener = Some(listener);
    }

    pub fn listener(&self) -> Option<&DefaultTreeListener> {
        self.listener.as_ref()
    }

    pub fn take_listener(&mut self) -> Option<DefaultTreeListener> {
        self.listener.take()
    }

    /// Tree built by the attached listener during the last parse
    pub fn parse_tree(&self) -> Option<&ParseTree> {
        self.listener.as_ref().and_then(DefaultTreeListener::tree)
    }

    /// Serialize the loaded bundle set and its metadata
    pub fn to_persisted(&self) -> Result<PersistedBundle, PipelineError> {
        self.require_loaded("store")?;
        let (Some(artifacts), Some(metadata)) = (&self.artifacts, &self.metadata) else {
            return Err(IllegalWorkflowError {
                operation: "store",
                state: self.state,
                requirement: "compile or load a recognizer first",
            }
            .into());
        };
        Ok(persist::store(artifacts, metadata)?)
    }

    pub fn store(&self, path: impl AsRef<Path>, overwrite: bool) -> Result<(), PipelineError> {
        self.to_persisted()?.write_to(path, overwrite)?;
        Ok(())
    }

    /// Load a persisted bundle from disk, replacing any loaded recognizer
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), PipelineError> {
        let bundle = PersistedBundle::read_from(path)?;
        self.load_bundle(&bundle)
    }

    pub fn load_bundle(&mut self, bundle: &PersistedBundle) -> Result<(), PipelineError> {
        let (artifacts, metadata) = match self.config.inner_classifier() {
            Some(classifier) => persist::restore_with(bundle, classifier.as_ref())?,
            None => persist::restore(bundle)?,
        };
        let recognizer = LoadedRecognizer::load(&artifacts)?;
        info!(
            "loaded grammar {} from bundle, context {}",
            metadata.grammar_name,
            recognizer.context_id()
        );
        self.generated = None;
        self.install(artifacts, recognizer, metadata);
        Ok(())
    }

    /// Export the generated unit sources, for inspection only
    pub fn write_generated_sources(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, PipelineError> {
        let generated = self.generated.as_ref().ok_or(IllegalWorkflowError {
            operation: "write generated sources",
            state: self.state,
            requirement: "compile from a grammar first",
        })?;
        let dir = dir.as_ref();
        generated.write_sources(dir).map_err(|source| PipelineError::Io {
            path: dir.to_path_buf(),
            source,
        })
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn grammar(&self) -> Option<&GrammarSource> {
        self.grammar.as_ref()
    }

    pub fn compiled_units(&self) -> Option<&CompiledBundleSet> {
        self.artifacts.as_ref()
    }

    pub fn recognizer(&self) -> Option<&LoadedRecognizer> {
        self.recognizer.as_ref()
    }

    pub fn metadata(&self) -> Option<&BundleMetadata> {
        self.metadata.as_ref()
    }

    /// Parser unit used by default
    pub fn parser_name(&self) -> Option<String> {
        let recognizer = self.recognizer.as_ref()?;
        let request = self.request(&ParseOptions::default());
        runtime::select_parser(recognizer, request.parser.as_deref())
            .ok()
            .map(|parser| parser.name().to_string())
    }

    /// Lexer unit feeding the default parser
    pub fn lexer_name(&self) -> Option<String> {
        let recognizer = self.recognizer.as_ref()?;
        let request = self.request(&ParseOptions::default());
        let parser = runtime::select_parser(recognizer, request.parser.as_deref()).ok()?;
        runtime::select_lexer(recognizer, request.lexer.as_deref(), parser)
            .ok()
            .map(|lexer| lexer.name().to_string())
    }

    /// Rules of the default parser
    pub fn rule_names(&self) -> Vec<String> {
        let Some(recognizer) = self.recognizer.as_ref() else {
            return Vec::new();
        };
        let request = self.request(&ParseOptions::default());
        runtime::select_parser(recognizer, request.parser.as_deref())
            .map(|parser| parser.rule_names().to_vec())
            .unwrap_or_default()
    }

    /// Warnings reported by the grammar tool during the last compile
    pub fn warnings(&self) -> &[String] {
        self.generated
            .as_ref()
            .map(|g| g.warnings.as_slice())
            .unwrap_or_default()
    }
}

impl Default for GenericParser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GenericParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericParser")
            .field("state", &self.state)
            .field("grammar", &self.grammar.as_ref().map(GrammarSource::file_names))
            .field("config", &self.config)
            .field("recognizer", &self.recognizer)
            .finish_non_exhaustive()
    }
}
