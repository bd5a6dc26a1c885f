//! In-memory compilation of unit sources into a [`CompiledBundleSet`].

mod error;
pub mod image;
mod lower;
mod nfa;
pub mod sexpr;
mod source;

#[cfg(test)]
mod tests;

pub use error::{CompilationError, CompilerDiagnostic, Severity};
pub use lower::UnitCompiler;

use crate::artifact::{CompiledBundleSet, GeneratedUnit, InnerUnitClassifier, PrefixClassifier};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Raw result of a host compiler run
#[derive(Debug, Clone, Default)]
pub struct CompilerOutput {
    /// Named payloads in emission order
    pub artifacts: Vec<(String, Vec<u8>)>,
    pub diagnostics: Vec<CompilerDiagnostic>,
}

impl CompilerOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(CompilerDiagnostic::is_error)
    }
}

/// Compiles a set of sources together, producing named artifacts
pub trait HostCompiler: Send + Sync {
    fn compile(&self, sources: &[GeneratedUnit]) -> CompilerOutput;
}

/// Runs a host compiler and groups its output into bundles
pub struct InMemoryCompiler {
    host: Box<dyn HostCompiler>,
    classifier: Arc<dyn InnerUnitClassifier>,
}

impl InMemoryCompiler {
    /// Compiler using [`UnitCompiler`] and `$`-separated inner unit names
    pub fn new() -> Self {
        Self {
            host: Box::new(UnitCompiler::new()),
            classifier: Arc::new(PrefixClassifier::new()),
        }
    }

    pub fn with_host(host: Box<dyn HostCompiler>) -> Self {
        Self {
            host,
            classifier: Arc::new(PrefixClassifier::new()),
        }
    }

    /// Set the classifier deciding which bundle an artifact belongs to
    pub fn classifier(mut self, classifier: Arc<dyn InnerUnitClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn set_classifier(&mut self, classifier: Arc<dyn InnerUnitClassifier>) {
        self.classifier = classifier;
    }

    /// Compile all units; either every unit compiles or nothing is returned
    pub fn compile(&self, units: Vec<GeneratedUnit>) -> Result<CompiledBundleSet, CompilationError> {
        if units.is_empty() {
            return Err(CompilationError::NoUnits);
        }
        let mut seen = HashSet::new();
        for unit in &units {
            if !seen.insert(unit.name.as_str()) {
                return Err(CompilationError::DuplicateUnit(unit.name.clone()));
            }
        }

        let output = self.host.compile(&units);
        for diagnostic in output.diagnostics.iter().filter(|d| !d.is_error()) {
            warn!("{}", diagnostic);
        }
        if output.has_errors() {
            let diagnostics: Vec<CompilerDiagnostic> = output
                .diagnostics
                .into_iter()
                .filter(CompilerDiagnostic::is_error)
                .collect();
            debug!("compilation failed with {} error(s)", diagnostics.len());
            return Err(CompilationError::Failed { diagnostics });
        }

        let mut set = CompiledBundleSet::new();
        let mut artifacts: Vec<Option<(String, Vec<u8>)>> = output.artifacts.into_iter().map(Some).collect();

        // Primary artifacts carry the unit's own name
        for unit in &units {
            let slot = artifacts
                .iter_mut()
                .find(|slot| matches!(slot, Some((name, _)) if *name == unit.name))
                .and_then(Option::take);
            let (_, payload) = slot.ok_or_else(|| CompilationError::MissingPrimary(unit.name.clone()))?;
            set.insert_bundle(unit.clone(), payload)?;
        }

        // Inner artifacts go to the longest unit name classifying them
        for (name, payload) in artifacts.into_iter().flatten() {
            let owner = units
                .iter()
                .filter(|unit| self.classifier.is_inner(&unit.name, &name))
                .max_by_key(|unit| unit.name.len())
                .ok_or_else(|| CompilationError::OrphanArtifact(name.clone()))?;
            set.add_inner(&owner.name, name, payload)?;
        }

        debug!(
            "compiled {} unit(s) into {} artifact(s), {} bytes",
            set.len(),
            set.unit_count(),
            set.total_size()
        );
        Ok(set)
    }
}

impl Default for InMemoryCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCompiler")
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}
