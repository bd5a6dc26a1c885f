//! Syntax tree of a grammar file.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarKind {
    /// Lexer and parser rules in one file
    Combined,
    Lexer,
    Parser,
}

impl GrammarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrammarKind::Combined => "combined",
            GrammarKind::Lexer => "lexer",
            GrammarKind::Parser => "parser",
        }
    }
}

/// One grammar declaration as read from a file
#[derive(Debug, Clone)]
pub struct Grammar {
    pub name: String,
    pub kind: GrammarKind,
    /// File the grammar was read from
    pub file: String,
    pub options: BTreeMap<String, String>,
    pub imports: Vec<String>,
    /// Names declared in `tokens { ... }`
    pub tokens: Vec<String>,
    /// Names declared in `channels { ... }`
    pub channels: Vec<String>,
    /// Modes in declaration order, without `DEFAULT_MODE`
    pub modes: Vec<String>,
    pub rules: Vec<Rule>,
}

impl Grammar {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub fragment: bool,
    /// Lexer mode the rule belongs to
    pub mode: String,
    pub alternatives: Vec<Alternative>,
    pub line: usize,
    pub column: usize,
}

impl Rule {
    /// Lexer rules start with an uppercase letter
    pub fn is_lexer_rule(&self) -> bool {
        is_token_name(&self.name)
    }

    /// Literal text when the rule is exactly one string literal and nothing else
    pub fn single_literal(&self) -> Option<&str> {
        match self.alternatives.as_slice() {
            [alt] if alt.commands.is_empty() => match alt.elements.as_slice() {
                [Element::Literal(text)] => Some(text),
                _ => None,
            },
            _ => None,
        }
    }
}

pub fn is_token_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alternative {
    pub elements: Vec<Element>,
    /// `# label` on the alternative
    pub label: Option<String>,
    /// `<assoc=right>` on the alternative
    pub right_assoc: bool,
    pub commands: Vec<LexerCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatKind {
    Optional,
    ZeroOrMore,
    OneOrMore,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Unescaped string literal
    Literal(String),
    TokenRef(String),
    RuleRef(String),
    /// Rule reference with an explicit precedence, produced by the left-recursion rewrite
    PrecRef(String, u32),
    CharSet {
        ranges: Vec<(char, char)>,
        negated: bool,
    },
    Wildcard,
    /// `~x` or `~(x | y)`; members are resolved per rule kind
    Not(Vec<Element>),
    /// Token types excluded by a parser-side `~`
    NotTokens(Vec<String>),
    Block(Vec<Alternative>),
    Repeat {
        element: Box<Element>,
        kind: RepeatKind,
        greedy: bool,
    },
    Eof,
}

impl Element {
    pub fn rule_ref(&self) -> Option<&str> {
        match self {
            Element::RuleRef(name) | Element::PrecRef(name, _) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexerCommand {
    Skip,
    More,
    PopMode,
    Channel(String),
    Type(String),
    Mode(String),
    PushMode(String),
}
