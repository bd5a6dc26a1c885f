use super::SettingsError;
use crate::artifact::{GeneratedUnit, InnerUnitClassifier};
use crate::runtime::CaseFolding;
use crate::tool::{GenerationOptions, ToolCustomizer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration of a [`GenericParser`](super::GenericParser)
#[derive(Clone, Default)]
pub struct ParserConfig {
    customizer: Option<ToolCustomizer>,
    lexer_name: Option<String>,
    parser_name: Option<String>,
    entry_rule: Option<String>,
    case_folding: CaseFolding,
    utility_sources: Vec<GeneratedUnit>,
    classifier: Option<Arc<dyn InnerUnitClassifier>>,
    warnings_as_errors: bool,
    max_rule_depth: Option<usize>,
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook that rewrites generation options before each compile
    pub fn customizer(mut self, customizer: impl Fn(&mut GenerationOptions) + Send + Sync + 'static) -> Self {
        self.customizer = Some(Arc::new(customizer));
        self
    }

    /// Shorthand for a customizer setting the generated package
    pub fn package(self, package: impl Into<String>) -> Self {
        let package = package.into();
        self.customizer(move |options| options.package = Some(package.clone()))
    }

    pub fn lexer_name(mut self, name: impl Into<String>) -> Self {
        self.lexer_name = Some(name.into());
        self
    }

    pub fn parser_name(mut self, name: impl Into<String>) -> Self {
        self.parser_name = Some(name.into());
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

    /// Compile an extra source alongside the generated units
    pub fn utility_source(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.utility_sources.push(GeneratedUnit::utility(name, source));
        self
    }

    /// Read a utility source from disk; the unit is named after the file stem
    pub fn utility_file(self, path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SettingsError::UnnamedUtility(path.to_path_buf()))?
            .to_string();
        let source = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.utility_source(name, source))
    }

    pub fn classifier(mut self, classifier: Arc<dyn InnerUnitClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn warnings_as_errors(mut self, enabled: bool) -> Self {
        self.warnings_as_errors = enabled;
        self
    }

    /// Deepest rule nesting a parse may reach before it fails
    pub fn max_rule_depth(mut self, depth: usize) -> Self {
        self.max_rule_depth = Some(depth);
        self
    }

    /// Options for the next generation run, customizer applied
    pub fn generation_options(&self) -> GenerationOptions {
        let mut options = GenerationOptions {
            package: None,
            warnings_as_errors: self.warnings_as_errors,
        };
        if let Some(customizer) = &self.customizer {
            customizer(&mut options);
        }
        options
    }

    pub fn configured_lexer(&self) -> Option<&str> {
        self.lexer_name.as_deref()
    }

    pub fn configured_parser(&self) -> Option<&str> {
        self.parser_name.as_deref()
    }

    pub fn configured_entry_rule(&self) -> Option<&str> {
        self.entry_rule.as_deref()
    }

    pub fn folding(&self) -> CaseFolding {
        self.case_folding
    }

    pub fn utility_sources(&self) -> &[GeneratedUnit] {
        &self.utility_sources
    }

    pub(crate) fn push_utility(&mut self, unit: GeneratedUnit) {
        self.utility_sources.push(unit);
    }

    pub fn inner_classifier(&self) -> Option<&Arc<dyn InnerUnitClassifier>> {
        self.classifier.as_ref()
    }

    pub fn configured_max_rule_depth(&self) -> Option<usize> {
        self.max_rule_depth
    }
}

impl std::fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserConfig")
            .field("customized", &self.customizer.is_some())
            .field("lexer_name", &self.lexer_name)
            .field("parser_name", &self.parser_name)
            .field("entry_rule", &self.entry_rule)
            .field("case_folding", &self.case_folding)
            .field("utility_sources", &self.utility_sources.len())
            .field("classifier", &self.classifier)
            .field("warnings_as_errors", &self.warnings_as_errors)
            .field("max_rule_depth", &self.max_rule_depth)
            .finish()
    }
}

/// On-disk form of [`ParserConfig`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserSettings {
    pub package: Option<String>,
    pub lexer: Option<String>,
    pub parser: Option<String>,
    pub entry_rule: Option<String>,
    pub case_folding: CaseFolding,
    pub utility_files: Vec<PathBuf>,
    pub warnings_as_errors: bool,
    pub max_rule_depth: Option<usize>,
}

impl ParserSettings {
    /// Load a JSON settings file; relative utility paths resolve against its directory
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            for file in &mut settings.utility_files {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_config(self) -> Result<ParserConfig, SettingsError> {
        let mut config = ParserConfig::new()
            .case_folding(self.case_folding)
            .warnings_as_errors(self.warnings_as_errors);
        if let Some(package) = self.package {
            config = config.package(package);
        }
        if let Some(lexer) = self.lexer {
            config = config.lexer_name(lexer);
        }
        if let Some(parser) = self.parser {
            config = config.parser_name(parser);
        }
        if let Some(rule) = self.entry_rule {
            config = config.entry_rule(rule);
        }
        if let Some(depth) = self.max_rule_depth {
            config = config.max_rule_depth(depth);
        }
        for file in &self.utility_files {
            config = config.utility_file(file)?;
        }
        Ok(config)
    }
}

/// Per-call overrides for a parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub entry_rule: Option<String>,
    pub case_folding: Option<CaseFolding>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_rule(mut self, rule: impl Into<String>) -> Self {
        self.entry_rule = Some(rule.into());
        self
    }

    pub fn case_folding(mut self, folding: CaseFolding) -> Self {
        self.case_folding = Some(folding);
        self
    }
}
