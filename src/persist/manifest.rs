use crate::artifact::UnitOrigin;
use crate::runtime::CaseFolding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recognizer identity stored next to the compiled units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub grammar_name: String,
    pub grammar_files: Vec<String>,
    pub lexer: Option<String>,
    pub parser: Option<String>,
    pub entry_rule: Option<String>,
    #[serde(default)]
    pub case_folding: CaseFolding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub generator: String,
    pub metadata: BundleMetadata,
    pub bundles: Vec<BundleRecord>,
    pub units: Vec<UnitRecord>,
}

impl Manifest {
    pub fn total_size(&self) -> usize {
        self.units.iter().map(|u| u.size).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRecord {
    /// Name of the primary source unit
    pub primary: String,
    pub origin: UnitOrigin,
    /// Archive entry holding the source text
    pub source_entry: String,
    pub primary_unit: u32,
    pub inner_units: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: u32,
    pub name: String,
    pub inner: bool,
    pub size: usize,
    /// Hex-encoded SHA-256 of the payload
    pub sha256: String,
    /// Archive entry holding the payload
    pub entry: String,
}
