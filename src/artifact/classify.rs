use std::fmt::Debug;

/// Decides whether an artifact name denotes an inner unit of a primary unit.
///
/// The compiler uses the classifier to attach every artifact to the bundle it
/// came from, so a custom classifier has to agree with the naming scheme of
/// the host compiler in use.
pub trait InnerUnitClassifier: Debug + Send + Sync {
    fn is_inner(&self, primary: &str, candidate: &str) -> bool;
}

/// Name-prefix classification, optionally requiring a separator right after
/// the primary name (`HelloParser$expr`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixClassifier {
    separator: Option<char>,
}

impl PrefixClassifier {
    /// Classifier matching `Primary$...`
    pub fn new() -> Self {
        Self {
            separator: Some('$'),
        }
    }

    /// Pure prefix match: any longer name starting with the primary name is inner
    pub fn bare() -> Self {
        Self { separator: None }
    }

    pub fn with_separator(separator: char) -> Self {
        Self {
            separator: Some(separator),
        }
    }

    pub fn separator(&self) -> Option<char> {
        self.separator
    }
}

impl Default for PrefixClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl InnerUnitClassifier for PrefixClassifier {
    fn is_inner(&self, primary: &str, candidate: &str) -> bool {
        let Some(rest) = candidate.strip_prefix(primary) else {
            return false;
        };
        if rest.is_empty() {
            return false;
        }
        match self.separator {
            Some(separator) => rest.starts_with(separator) && rest.len() > separator.len_utf8(),
            None => true,
        }
    }
}
