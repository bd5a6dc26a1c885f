use crate::compiler::image::TokenEntry;
use serde::{Deserialize, Serialize};

/// Token type of the end-of-input token
pub const EOF: i32 = -1;
pub const DEFAULT_CHANNEL: u32 = 0;
pub const HIDDEN_CHANNEL: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub token_type: i32,
    pub channel: u32,
    pub text: String,
    /// Character offset of the first character
    pub start: usize,
    /// Character offset one past the last character
    pub end: usize,
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub column: u32,
    /// Position in the token stream
    pub index: usize,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.token_type == EOF
    }
}

/// Symbolic and literal names of a lexer's token types
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    entries: Vec<TokenEntry>,
}

impl Vocabulary {
    pub fn new(entries: Vec<TokenEntry>) -> Self {
        Self { entries }
    }

    fn entry(&self, token_type: i32) -> Option<&TokenEntry> {
        self.entries.iter().find(|e| e.token_type == token_type)
    }

    pub fn symbolic_name(&self, token_type: i32) -> Option<&str> {
        if token_type == EOF {
            return Some("EOF");
        }
        self.entry(token_type).map(|e| e.symbolic.as_str())
    }

    /// Quoted literal, e.g. `'hello'`
    pub fn literal_name(&self, token_type: i32) -> Option<String> {
        self.entry(token_type)
            .and_then(|e| e.literal.as_ref())
            .map(|literal| format!("'{}'", literal.escape_default()))
    }

    /// Literal name if the token has one, else its symbolic name, else the number
    pub fn display_name(&self, token_type: i32) -> String {
        self.literal_name(token_type)
            .or_else(|| self.symbolic_name(token_type).map(str::to_string))
            .unwrap_or_else(|| token_type.to_string())
    }

    pub fn token_type(&self, symbolic: &str) -> Option<i32> {
        if symbolic == "EOF" {
            return Some(EOF);
        }
        self.entries
            .iter()
            .find(|e| e.symbolic == symbolic)
            .map(|e| e.token_type)
    }

    pub fn max_token_type(&self) -> i32 {
        self.entries.iter().map(|e| e.token_type).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lexer output: every token including hidden-channel ones and the final EOF
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<super::SyntaxDiagnostic>,
}

impl TokenStream {
    /// Indices of default-channel tokens, EOF included
    pub fn visible(&self) -> Vec<usize> {
        Self::visible_indices(&self.tokens)
    }

    pub(crate) fn visible_indices(tokens: &[Token]) -> Vec<usize> {
        tokens
            .iter()
            .filter(|t| t.channel == DEFAULT_CHANNEL)
            .map(|t| t.index)
            .collect()
    }
}
