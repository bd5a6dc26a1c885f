use crate::artifact::BundleError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

/// One message reported by a host compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerDiagnostic {
    pub unit: String,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub message: String,
}

impl CompilerDiagnostic {
    pub fn error(unit: impl Into<String>, line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            line,
            column,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for CompilerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {}",
            self.unit, self.line, self.column, self.severity, self.message
        )
    }
}

#[derive(Error, Debug)]
pub enum CompilationError {
    #[error("No source units to compile")]
    NoUnits,

    #[error("Source unit {0} submitted more than once")]
    DuplicateUnit(String),

    #[error("Compilation failed:\n{}", render(.diagnostics))]
    Failed { diagnostics: Vec<CompilerDiagnostic> },

    #[error("Compiler produced no artifact for unit {0}")]
    MissingPrimary(String),

    #[error("Compiler produced artifact {0} that belongs to no submitted unit")]
    OrphanArtifact(String),

    #[error("Invalid compiler output: {0}")]
    Bundle(#[from] BundleError),
}

impl CompilationError {
    /// Diagnostics behind a failed compilation, empty for structural failures
    pub fn diagnostics(&self) -> &[CompilerDiagnostic] {
        match self {
            CompilationError::Failed { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

fn render(diagnostics: &[CompilerDiagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
