//! Isolated loading of compiled bundles.
//!
//! Every [`LoadedRecognizer`] owns a private arena holding a copy of each unit
//! payload plus its own registry of lexers and parsers, so two contexts built
//! from bundles with identical unit names never observe each other.

mod entry;
mod error;
mod registry;

#[cfg(test)]
mod tests;

pub use entry::UnitEntry;
pub use error::LoadError;
pub use registry::RecognizerRegistry;

use crate::artifact::{CompiledBundle, CompiledBundleSet};
use crate::compiler::image::{self, UnitImage};
use crate::runtime::{LexerProgram, ParserProgram, TokenSource};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// A bundle set materialized into callable recognizers
pub struct LoadedRecognizer {
    /// Identity of this execution context
    context: Uuid,
    /// Single contiguous blob containing every unit payload
    arena: Vec<u8>,
    /// Unit name -> arena slice
    index: HashMap<String, UnitEntry>,
    registry: RecognizerRegistry,
}

impl LoadedRecognizer {
    /// Create a fresh context and register every unit of `set` in it
    pub fn load(set: &CompiledBundleSet) -> Result<Self, LoadError> {
        let mut arena = Vec::with_capacity(set.total_size());
        let mut index = HashMap::new();
        for bundle in set.bundles() {
            for id in bundle.unit_ids() {
                let unit = set.unit(id).ok_or_else(|| LoadError::Unresolved {
                    unit: format!("#{}", id.index()),
                    referenced_by: bundle.name().to_string(),
                })?;
                let offset = arena.len();
                arena.extend_from_slice(&unit.payload);
                let entry = UnitEntry {
                    offset,
                    length: unit.payload.len(),
                    bundle: bundle.name().to_string(),
                    inner: unit.is_inner(),
                };
                if index.insert(unit.name.clone(), entry).is_some() {
                    return Err(LoadError::DuplicateUnit(unit.name.clone()));
                }
            }
        }

        let mut loaded = Self {
            context: Uuid::new_v4(),
            arena,
            index,
            registry: RecognizerRegistry::new(),
        };

        let mut primaries = Vec::new();
        for bundle in set.bundles() {
            primaries.push((bundle, loaded.decode(bundle.name())?));
        }

        // Parsers need their vocabulary lexer registered first
        let mut parsers = Vec::new();
        for (bundle, image) in primaries {
            match image {
                UnitImage::LexerHeader(header) => {
                    let lexer = loaded.link_lexer(bundle, header)?;
                    loaded.registry.register_lexer(lexer)?;
                }
                UnitImage::ParserHeader(header) => parsers.push((bundle, header)),
                UnitImage::Library(header) => {
                    debug!("library {} is linked statically, nothing to register", header.name)
                }
                other => {
                    return Err(LoadError::UnexpectedImage {
                        unit: bundle.name().to_string(),
                        found: other.kind(),
                        expected: "lexer, parser or library",
                    })
                }
            }
        }
        for (bundle, header) in parsers {
            let parser = loaded.link_parser(bundle, header)?;
            loaded.registry.register_parser(parser)?;
        }

        info!(
            "loaded {} unit(s) into context {} ({} bytes)",
            loaded.index.len(),
            loaded.context,
            loaded.arena.len()
        );
        Ok(loaded)
    }

    fn link_lexer(&self, bundle: &CompiledBundle, header: image::LexerHeader) -> Result<LexerProgram, LoadError> {
        let mut rules = Vec::with_capacity(header.rule_units.len());
        for unit in &header.rule_units {
            match self.resolve(unit, bundle.name())? {
                UnitImage::LexerRule(rule) => rules.push(rule),
                other => return Err(unexpected(unit, &other, "lexer rule")),
            }
        }
        LexerProgram::from_images(header, rules)
    }

    fn link_parser(&self, bundle: &CompiledBundle, header: image::ParserHeader) -> Result<ParserProgram, LoadError> {
        let vocabulary = self
            .registry
            .lexer(&header.vocabulary_unit)
            .map(|lexer| lexer.vocabulary().clone())
            .ok_or_else(|| LoadError::Unresolved {
                unit: header.vocabulary_unit.clone(),
                referenced_by: bundle.name().to_string(),
            })?;

        let mut rules = Vec::with_capacity(header.rule_units.len());
        for unit in &header.rule_units {
            match self.resolve(unit, bundle.name())? {
                UnitImage::ParserRule(rule) => rules.push(rule),
                other => return Err(unexpected(unit, &other, "parser rule")),
            }
        }
        ParserProgram::from_images(header, vocabulary, rules)
    }

    fn resolve(&self, unit: &str, referenced_by: &str) -> Result<UnitImage, LoadError> {
        if !self.index.contains_key(unit) {
            return Err(LoadError::Unresolved {
                unit: unit.to_string(),
                referenced_by: referenced_by.to_string(),
            });
        }
        self.decode(unit)
    }

    fn decode(&self, unit: &str) -> Result<UnitImage, LoadError> {
        let payload = self.unit(unit).ok_or_else(|| LoadError::Unresolved {
            unit: unit.to_string(),
            referenced_by: self.context.to_string(),
        })?;
        image::decode(payload).map_err(|e| LoadError::Corrupt {
            unit: unit.to_string(),
            reason: e.to_string(),
        })
    }

    /// Get a unit's payload as a byte slice (zero-copy)
    pub fn unit(&self, name: &str) -> Option<&[u8]> {
        self.index.get(name).map(|entry| &self.arena[entry.range()])
    }

    pub fn entry(&self, name: &str) -> Option<&UnitEntry> {
        self.index.get(name)
    }

    pub fn context_id(&self) -> Uuid {
        self.context
    }

    pub fn registry(&self) -> &RecognizerRegistry {
        &self.registry
    }

    pub fn lexer_names(&self) -> Vec<String> {
        self.registry.lexer_names()
    }

    pub fn parser_names(&self) -> Vec<String> {
        self.registry.parser_names()
    }

    pub fn unit_count(&self) -> usize {
        self.index.len()
    }

    /// Total arena size in bytes
    pub fn total_size(&self) -> usize {
        self.arena.len()
    }
}

impl std::fmt::Debug for LoadedRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedRecognizer")
            .field("context", &self.context)
            .field("units", &self.index.len())
            .field("lexers", &self.registry.lexer_names())
            .field("parsers", &self.registry.parser_names())
            .finish()
    }
}

fn unexpected(unit: &str, found: &UnitImage, expected: &'static str) -> LoadError {
    LoadError::UnexpectedImage {
        unit: unit.to_string(),
        found: found.kind(),
        expected,
    }
}
