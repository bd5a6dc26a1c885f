//! Tokens of the grammar notation.
//!
//! Embedded blocks (`{...}`) are consumed whole by a callback so that option,
//! token and channel bodies can be parsed from their text later.

use logos::{Lexer, Logos};

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum GrammarToken {
    #[token("/*", block_comment)]
    BlockComment,

    // Keywords
    #[token("grammar")]
    Grammar,
    #[token("lexer")]
    Lexer,
    #[token("parser")]
    Parser,
    #[token("fragment")]
    Fragment,
    #[token("import")]
    Import,
    #[token("options")]
    Options,
    #[token("tokens")]
    Tokens,
    #[token("channels")]
    Channels,
    #[token("mode")]
    Mode,
    #[token("returns")]
    Returns,
    #[token("locals")]
    Locals,

    #[regex(r"[A-Z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    TokenRef(String),

    #[regex(r"[a-z][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    RuleRef(String),

    /// Quoted literal, quotes included
    #[regex(r"'([^'\\\r\n]|\\.)*'", |lex| lex.slice().to_string())]
    StringLiteral(String),

    /// Bracketed character set or argument list, brackets included
    #[regex(r"\[([^\]\\]|\\.)*\]", |lex| lex.slice().to_string())]
    CharSet(String),

    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Int(String),

    /// Body of a `{...}` block without the outer braces
    #[token("{", action_block)]
    Action(String),

    // Punctuation
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token("|")]
    Or,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("?")]
    Question,
    #[token("~")]
    Tilde,
    #[token(".")]
    Dot,
    #[token("..")]
    Range,
    #[token("->")]
    Arrow,
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token(",")]
    Comma,
    #[token("#")]
    Pound,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("@")]
    At,
}

impl GrammarToken {
    /// Identifier text for both token and rule references
    pub fn identifier(&self) -> Option<&str> {
        match self {
            GrammarToken::TokenRef(name) | GrammarToken::RuleRef(name) => Some(name),
            _ => None,
        }
    }

    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            GrammarToken::TokenRef(name) | GrammarToken::RuleRef(name) => format!("'{}'", name),
            GrammarToken::StringLiteral(text)
            | GrammarToken::CharSet(text)
            | GrammarToken::Int(text) => text.clone(),
            GrammarToken::Action(_) => "action block".to_string(),
            other => format!("{:?}", other).to_lowercase(),
        }
    }
}

fn block_comment(lex: &mut Lexer<GrammarToken>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => false,
    }
}

fn action_block(lex: &mut Lexer<GrammarToken>) -> Option<String> {
    let rest = lex.remainder();
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut chars = rest.char_indices();

    while let Some((offset, c)) = chars.next() {
        if let Some(open) = quote {
            if c == '\\' {
                chars.next();
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let body = rest[..offset].to_string();
                    lex.bump(offset + 1);
                    return Some(body);
                }
            }
            _ => {}
        }
    }
    None
}
