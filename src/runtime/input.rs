use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Case view presented to the lexer; token text keeps the original characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseFolding {
    #[default]
    None,
    Upper,
    Lower,
}

impl CaseFolding {
    pub fn fold(self, c: char) -> char {
        let mut folded = match self {
            CaseFolding::None => return c,
            CaseFolding::Upper => Folded::Upper(c.to_uppercase()),
            CaseFolding::Lower => Folded::Lower(c.to_lowercase()),
        };
        // Multi-character foldings keep the original character
        match (folded.next(), folded.next()) {
            (Some(single), None) => single,
            _ => c,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseFolding::None => "none",
            CaseFolding::Upper => "upper",
            CaseFolding::Lower => "lower",
        }
    }
}

enum Folded {
    Upper(std::char::ToUppercase),
    Lower(std::char::ToLowercase),
}

impl Iterator for Folded {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        match self {
            Folded::Upper(chars) => chars.next(),
            Folded::Lower(chars) => chars.next(),
        }
    }
}

impl fmt::Display for CaseFolding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseFolding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CaseFolding::None),
            "upper" => Ok(CaseFolding::Upper),
            "lower" => Ok(CaseFolding::Lower),
            other => Err(format!("unknown case folding '{}' (expected none, upper or lower)", other)),
        }
    }
}

/// Character input for a lexer run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharStream {
    source_name: String,
    text: Vec<char>,
    folding: CaseFolding,
}

impl CharStream {
    pub const UNKNOWN_SOURCE: &'static str = "<unknown>";

    pub fn new(source_name: impl Into<String>, text: &str) -> Self {
        Self {
            source_name: source_name.into(),
            text: text.chars().collect(),
            folding: CaseFolding::None,
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self::new(Self::UNKNOWN_SOURCE, text)
    }

    pub fn from_reader(source_name: impl Into<String>, mut reader: impl Read) -> std::io::Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self::new(source_name, &text))
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), &text))
    }

    pub fn with_case_folding(mut self, folding: CaseFolding) -> Self {
        self.folding = folding;
        self
    }

    pub fn case_folding(&self) -> CaseFolding {
        self.folding
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Original character at `index`
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.text.get(index).copied()
    }

    /// Character at `index` as seen by the lexer
    pub fn lookahead(&self, index: usize) -> Option<char> {
        self.char_at(index).map(|c| self.folding.fold(c))
    }

    /// Original text between two character offsets
    pub fn slice(&self, start: usize, end: usize) -> String {
        let end = end.min(self.text.len());
        let start = start.min(end);
        self.text[start..end].iter().collect()
    }
}
