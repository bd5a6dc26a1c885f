use serde::{Deserialize, Serialize};

/// Where a source unit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOrigin {
    /// Emitted by the grammar tool
    Generated,
    /// Supplied by the caller and compiled alongside the generated units
    Utility,
}

/// A named source text submitted to the compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedUnit {
    /// Fully qualified unit name (e.g., "org.example.HelloParser")
    pub name: String,
    /// Unit source text
    pub source: String,
    /// Producer of this unit
    pub origin: UnitOrigin,
}

impl GeneratedUnit {
    /// Create a unit produced by the grammar tool
    pub fn generated(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            origin: UnitOrigin::Generated,
        }
    }

    /// Create a caller-supplied utility unit
    pub fn utility(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            origin: UnitOrigin::Utility,
        }
    }

    /// Name without its package prefix
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Binary artifact produced by compiling a [`GeneratedUnit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Artifact name; equals the source name for a primary unit
    pub name: String,
    /// Encoded unit image
    pub payload: Vec<u8>,
    /// True for auxiliary units produced as a side effect of the primary one
    pub inner: bool,
}

impl CompiledUnit {
    pub fn new(name: impl Into<String>, payload: Vec<u8>, inner: bool) -> Self {
        Self {
            name: name.into(),
            payload,
            inner,
        }
    }

    pub fn is_inner(&self) -> bool {
        self.inner
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}
