//! Binary unit images.
//!
//! Every payload starts with a 4-byte magic followed by a postcard encoded
//! [`UnitImage`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `IGU` + image format version
pub const IMAGE_MAGIC: [u8; 4] = *b"IGU\x01";

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Payload does not start with a unit image header")]
    BadMagic,

    #[error("Unit image is not readable: {0}")]
    Decode(#[from] postcard::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnitImage {
    LexerHeader(LexerHeader),
    LexerRule(LexerRuleImage),
    ParserHeader(ParserHeader),
    ParserRule(ParserRuleImage),
    Library(LibraryHeader),
}

impl UnitImage {
    pub fn kind(&self) -> &'static str {
        match self {
            UnitImage::LexerHeader(_) => "lexer",
            UnitImage::LexerRule(_) => "lexer rule",
            UnitImage::ParserHeader(_) => "parser",
            UnitImage::ParserRule(_) => "parser rule",
            UnitImage::Library(_) => "library",
        }
    }
}

pub fn encode(image: &UnitImage) -> Result<Vec<u8>, postcard::Error> {
    let body = postcard::to_stdvec(image)?;
    let mut payload = Vec::with_capacity(IMAGE_MAGIC.len() + body.len());
    payload.extend_from_slice(&IMAGE_MAGIC);
    payload.extend_from_slice(&body);
    Ok(payload)
}

pub fn decode(payload: &[u8]) -> Result<UnitImage, ImageError> {
    let body = payload
        .strip_prefix(&IMAGE_MAGIC[..])
        .ok_or(ImageError::BadMagic)?;
    Ok(postcard::from_bytes(body)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token_type: i32,
    pub symbolic: String,
    pub literal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexerHeader {
    pub name: String,
    pub grammar: String,
    pub modes: Vec<String>,
    /// Channel names indexed by channel number
    pub channels: Vec<String>,
    pub vocabulary: Vec<TokenEntry>,
    /// Inner rule units in match priority order
    pub rule_units: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexerRuleImage {
    pub name: String,
    pub token_type: i32,
    pub mode: u32,
    /// Accept the shortest match instead of the longest
    pub shortest: bool,
    pub program: Vec<LexInst>,
    /// Actions per top-level alternative, indexed by the `Match` operand
    pub actions: Vec<Vec<LexerAction>>,
}

/// Thompson NFA instruction over code points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexInst {
    Char(u32),
    Class { ranges: Vec<(u32, u32)>, negated: bool },
    Any,
    Split(u32, u32),
    Jump(u32),
    Match(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexerAction {
    Skip,
    More,
    Channel(u32),
    Type(i32),
    Mode(u32),
    PushMode(u32),
    PopMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserHeader {
    pub name: String,
    pub grammar: String,
    /// Lexer unit providing the token vocabulary
    pub vocabulary_unit: String,
    pub rule_names: Vec<String>,
    /// Inner rule units, same order as `rule_names`
    pub rule_units: Vec<String>,
    pub start_rule: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserRuleImage {
    pub name: String,
    pub index: u32,
    pub body: RuleBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleBody {
    Plain(ParseExpr),
    LeftRecursive {
        primary: ParseExpr,
        suffixes: Vec<Suffix>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suffix {
    pub precedence: u32,
    pub body: ParseExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseExpr {
    Empty,
    Token(i32),
    NotTokens(Vec<i32>),
    AnyToken,
    Rule { index: u32, precedence: u32 },
    Seq(Vec<ParseExpr>),
    Choice(Vec<ParseExpr>),
    Optional { body: Box<ParseExpr>, greedy: bool },
    Star { body: Box<ParseExpr>, greedy: bool },
    Plus { body: Box<ParseExpr>, greedy: bool },
}

impl ParseExpr {
    /// Visit every rule reference
    pub fn rule_refs(&self, out: &mut Vec<u32>) {
        match self {
            ParseExpr::Rule { index, .. } => out.push(*index),
            ParseExpr::Seq(items) | ParseExpr::Choice(items) => {
                items.iter().for_each(|item| item.rule_refs(out))
            }
            ParseExpr::Optional { body, .. }
            | ParseExpr::Star { body, .. }
            | ParseExpr::Plus { body, .. } => body.rule_refs(out),
            ParseExpr::Empty | ParseExpr::Token(_) | ParseExpr::NotTokens(_) | ParseExpr::AnyToken => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryHeader {
    pub name: String,
    pub fragments: Vec<String>,
    pub rules: Vec<String>,
}
