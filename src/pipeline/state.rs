use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a [`GenericParser`](super::GenericParser)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// No recognizer loaded yet
    Uncompiled,
    /// A recognizer is loaded and can parse
    Compiled,
    /// At least one parse produced a tree
    Ready,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Uncompiled => "uncompiled",
            Lifecycle::Compiled => "compiled",
            Lifecycle::Ready => "ready",
        }
    }

    /// A recognizer is available
    pub fn is_loaded(&self) -> bool {
        *self >= Lifecycle::Compiled
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
