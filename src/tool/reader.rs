//! Recursive-descent reader turning grammar text into a [`Grammar`].

use super::grammar::{
    is_token_name, Alternative, Element, Grammar, GrammarKind, LexerCommand, RepeatKind, Rule,
};
use super::token::GrammarToken;
use super::GenerationError;
use logos::Logos;
use std::collections::BTreeMap;
use std::ops::Range;

pub const DEFAULT_MODE: &str = "DEFAULT_MODE";

/// Deepest nesting of parenthesized blocks in a rule
pub const MAX_BLOCK_DEPTH: usize = 64;

/// Read one grammar file, returning the grammar and any warnings
pub fn read_grammar(file: &str, text: &str) -> Result<(Grammar, Vec<String>), GenerationError> {
    let mut reader = GrammarReader::new(file, text)?;
    let grammar = reader.grammar()?;
    Ok((grammar, reader.warnings))
}

/// 1-based line and 0-based column of a byte offset
pub fn location(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset.min(text.len())];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map(|newline| before[newline + 1..].chars().count())
        .unwrap_or_else(|| before.chars().count());
    (line, column)
}

struct GrammarReader<'a> {
    file: &'a str,
    text: &'a str,
    tokens: Vec<(GrammarToken, Range<usize>)>,
    pos: usize,
    mode: String,
    warnings: Vec<String>,
    /// Open parenthesized blocks
    depth: usize,
}

impl<'a> GrammarReader<'a> {
    fn new(file: &'a str, text: &'a str) -> Result<Self, GenerationError> {
        let mut tokens = Vec::new();
        let mut lexer = GrammarToken::lexer(text);
        while let Some(result) = lexer.next() {
            let span = lexer.span();
            match result {
                Ok(GrammarToken::BlockComment) => {}
                Ok(token) => tokens.push((token, span)),
                Err(_) => {
                    let (line, column) = location(text, span.start);
                    return Err(GenerationError::Syntax {
                        file: file.to_string(),
                        line,
                        column,
                        message: format!("token recognition error at: '{}'", &text[span]),
                    });
                }
            }
        }

        Ok(Self {
            file,
            text,
            tokens,
            pos: 0,
            mode: DEFAULT_MODE.to_string(),
            warnings: Vec::new(),
            depth: 0,
        })
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    fn peek(&self) -> Option<&GrammarToken> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&GrammarToken> {
        self.tokens.get(self.pos + offset).map(|(token, _)| token)
    }

    fn at(&self, token: &GrammarToken) -> bool {
        self.peek() == Some(token)
    }

    fn advance(&mut self) -> Result<GrammarToken, GenerationError> {
        match self.tokens.get(self.pos) {
            Some((token, _)) => {
                self.pos += 1;
                Ok(token.clone())
            }
            None => Err(self.error("unexpected end of file")),
        }
    }

    fn eat(&mut self, token: &GrammarToken) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: GrammarToken) -> Result<(), GenerationError> {
        if self.eat(&token) {
            return Ok(());
        }
        let found = self
            .peek()
            .map(GrammarToken::describe)
            .unwrap_or_else(|| "<EOF>".to_string());
        Err(self.error(format!(
            "mismatched input {} expecting {}",
            found,
            token.describe()
        )))
    }

    fn identifier(&mut self, what: &str) -> Result<String, GenerationError> {
        match self.peek().and_then(GrammarToken::identifier) {
            Some(name) => {
                let name = name.to_string();
                self.pos += 1;
                Ok(name)
            }
            None => Err(self.error(format!("expected {}", what))),
        }
    }

    fn action(&mut self, what: &str) -> Result<String, GenerationError> {
        match self.advance()? {
            GrammarToken::Action(body) => Ok(body),
            _ => Err(self.error(format!("expected {{...}} after {}", what))),
        }
    }

    fn here(&self) -> (usize, usize) {
        let offset = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, span)| span.start)
            .unwrap_or(0);
        location(self.text, offset)
    }

    fn error(&self, message: impl Into<String>) -> GenerationError {
        let (line, column) = self.here();
        GenerationError::Syntax {
            file: self.file.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    fn warn(&mut self, message: impl AsRef<str>) {
        let (line, column) = self.here();
        self.warnings.push(format!(
            "{}:{}:{}: {}",
            self.file,
            line,
            column,
            message.as_ref()
        ));
    }

    // ------------------------------------------------------------------
    // Grammar structure
    // ------------------------------------------------------------------

    fn grammar(&mut self) -> Result<Grammar, GenerationError> {
        let kind = if self.eat(&GrammarToken::Lexer) {
            GrammarKind::Lexer
        } else if self.eat(&GrammarToken::Parser) {
            GrammarKind::Parser
        } else {
            GrammarKind::Combined
        };
        self.expect(GrammarToken::Grammar)?;
        let name = self.identifier("grammar name")?;
        self.expect(GrammarToken::Semi)?;

        let mut grammar = Grammar {
            name,
            kind,
            file: self.file.to_string(),
            options: BTreeMap::new(),
            imports: Vec::new(),
            tokens: Vec::new(),
            channels: Vec::new(),
            modes: Vec::new(),
            rules: Vec::new(),
        };

        // Prequel: options, imports, token and channel declarations, named actions
        loop {
            match self.peek() {
                Some(GrammarToken::Options) => {
                    self.pos += 1;
                    let body = self.action("options")?;
                    parse_options(&body, &mut grammar.options);
                }
                Some(GrammarToken::Import) => {
                    self.pos += 1;
                    loop {
                        let mut imported = self.identifier("imported grammar name")?;
                        if self.eat(&GrammarToken::Assign) {
                            imported = self.identifier("imported grammar name")?;
                        }
                        grammar.imports.push(imported);
                        if !self.eat(&GrammarToken::Comma) {
                            break;
                        }
                    }
                    self.expect(GrammarToken::Semi)?;
                }
                Some(GrammarToken::Tokens) => {
                    self.pos += 1;
                    let body = self.action("tokens")?;
                    grammar.tokens.extend(split_names(&body));
                }
                Some(GrammarToken::Channels) => {
                    self.pos += 1;
                    let body = self.action("channels")?;
                    grammar.channels.extend(split_names(&body));
                }
                Some(GrammarToken::At) => self.named_action()?,
                _ => break,
            }
        }

        while self.peek().is_some() {
            if self.eat(&GrammarToken::Mode) {
                let mode = self.identifier("mode name")?;
                self.expect(GrammarToken::Semi)?;
                if kind != GrammarKind::Lexer {
                    return Err(self.error("lexical modes are only allowed in lexer grammars"));
                }
                if !grammar.modes.contains(&mode) {
                    grammar.modes.push(mode.clone());
                }
                self.mode = mode;
                continue;
            }
            let rule = self.rule()?;
            grammar.rules.push(rule);
        }

        Ok(grammar)
    }

    /// `@name {...}` or `@lexer::name {...}`; target code is dropped
    fn named_action(&mut self) -> Result<(), GenerationError> {
        self.expect(GrammarToken::At)?;
        loop {
            if let GrammarToken::Action(_) = self.advance()? {
                self.warn("named action ignored");
                return Ok(());
            }
        }
    }

    fn rule(&mut self) -> Result<Rule, GenerationError> {
        let (line, column) = self.here();
        let fragment = self.eat(&GrammarToken::Fragment);
        let name = self.identifier("rule name")?;

        // Arguments, return values, locals, options and rule actions
        loop {
            match self.peek() {
                Some(GrammarToken::CharSet(_)) => self.pos += 1,
                Some(GrammarToken::Returns) | Some(GrammarToken::Locals) => {
                    self.pos += 1;
                    match self.advance()? {
                        GrammarToken::CharSet(_) => {}
                        _ => return Err(self.error("expected [...] declaration")),
                    }
                }
                Some(GrammarToken::Options) => {
                    self.pos += 1;
                    self.action("options")?;
                }
                Some(GrammarToken::At) => self.named_action()?,
                _ => break,
            }
        }

        self.expect(GrammarToken::Colon)?;
        let alternatives = self.alternatives()?;
        self.expect(GrammarToken::Semi)?;

        // Exception handlers belong to target code
        while let Some(GrammarToken::RuleRef(keyword)) = self.peek() {
            if keyword != "catch" && keyword != "finally" {
                break;
            }
            let is_catch = keyword == "catch";
            self.pos += 1;
            if is_catch {
                self.advance()?;
            }
            self.action("exception handler")?;
            self.warn(format!("exception handler on rule {} ignored", name));
        }

        let mode = if is_token_name(&name) {
            self.mode.clone()
        } else {
            DEFAULT_MODE.to_string()
        };

        Ok(Rule {
            name,
            fragment,
            mode,
            alternatives,
            line,
            column,
        })
    }

    fn alternatives(&mut self) -> Result<Vec<Alternative>, GenerationError> {
        let mut alternatives = vec![self.alternative()?];
        while self.eat(&GrammarToken::Or) {
            alternatives.push(self.alternative()?);
        }
        Ok(alternatives)
    }

    fn alternative(&mut self) -> Result<Alternative, GenerationError> {
        let mut alternative = Alternative::default();

        // Element options, e.g. <assoc=right>
        if self.eat(&GrammarToken::Lt) {
            loop {
                let key = self.identifier("option name")?;
                let mut value = String::new();
                if self.eat(&GrammarToken::Assign) {
                    value = match self.advance()? {
                        GrammarToken::TokenRef(v) | GrammarToken::RuleRef(v) | GrammarToken::Int(v) => v,
                        _ => return Err(self.error("expected option value")),
                    };
                }
                if key == "assoc" && value == "right" {
                    alternative.right_assoc = true;
                }
                if !self.eat(&GrammarToken::Comma) {
                    break;
                }
            }
            self.expect(GrammarToken::Gt)?;
        }

        while !matches!(
            self.peek(),
            None | Some(GrammarToken::Or)
                | Some(GrammarToken::Semi)
                | Some(GrammarToken::RParen)
                | Some(GrammarToken::Arrow)
                | Some(GrammarToken::Pound)
        ) {
            if let Some(element) = self.element()? {
                alternative.elements.push(element);
            }
        }

        if self.eat(&GrammarToken::Arrow) {
            alternative.commands = self.commands()?;
        }
        if self.eat(&GrammarToken::Pound) {
            alternative.label = Some(self.identifier("alternative label")?);
        }

        Ok(alternative)
    }

    fn element(&mut self) -> Result<Option<Element>, GenerationError> {
        // Element labels (x=ID, xs+=expr) carry no meaning for a generic tree
        if self.peek().and_then(GrammarToken::identifier).is_some()
            && matches!(
                self.peek_at(1),
                Some(GrammarToken::Assign) | Some(GrammarToken::PlusAssign)
            )
        {
            self.pos += 2;
        }

        let atom = match self.advance()? {
            GrammarToken::Action(_) => {
                if self.eat(&GrammarToken::Question) {
                    self.warn("semantic predicate ignored");
                } else {
                    self.warn("embedded action ignored");
                }
                return Ok(None);
            }
            GrammarToken::StringLiteral(raw) => self.literal_or_range(&raw)?,
            GrammarToken::TokenRef(name) if name == "EOF" => Element::Eof,
            GrammarToken::TokenRef(name) => Element::TokenRef(name),
            GrammarToken::RuleRef(name) => {
                // Rule arguments
                if let Some(GrammarToken::CharSet(_)) = self.peek() {
                    self.pos += 1;
                }
                Element::RuleRef(name)
            }
            GrammarToken::CharSet(raw) => Element::CharSet {
                ranges: self.char_set(&raw)?,
                negated: false,
            },
            GrammarToken::Dot => Element::Wildcard,
            GrammarToken::LParen => {
                if self.depth >= MAX_BLOCK_DEPTH {
                    self.pos -= 1;
                    return Err(self.error(format!("blocks nested too deep, limit is {}", MAX_BLOCK_DEPTH)));
                }
                self.depth += 1;
                let alternatives = self.alternatives()?;
                self.depth -= 1;
                self.expect(GrammarToken::RParen)?;
                Element::Block(alternatives)
            }
            GrammarToken::Tilde => {
                let mut members = Vec::new();
                if self.eat(&GrammarToken::LParen) {
                    loop {
                        members.push(self.set_member()?);
                        if !self.eat(&GrammarToken::Or) {
                            break;
                        }
                    }
                    self.expect(GrammarToken::RParen)?;
                } else {
                    members.push(self.set_member()?);
                }
                Element::Not(members)
            }
            other => {
                self.pos -= 1;
                return Err(self.error(format!("unexpected {}", other.describe())));
            }
        };

        let kind = match self.peek() {
            Some(GrammarToken::Question) => RepeatKind::Optional,
            Some(GrammarToken::Star) => RepeatKind::ZeroOrMore,
            Some(GrammarToken::Plus) => RepeatKind::OneOrMore,
            _ => return Ok(Some(atom)),
        };
        self.pos += 1;
        let greedy = !self.eat(&GrammarToken::Question);

        Ok(Some(Element::Repeat {
            element: Box::new(atom),
            kind,
            greedy,
        }))
    }

    fn set_member(&mut self) -> Result<Element, GenerationError> {
        match self.advance()? {
            GrammarToken::StringLiteral(raw) => self.literal_or_range(&raw),
            GrammarToken::CharSet(raw) => Ok(Element::CharSet {
                ranges: self.char_set(&raw)?,
                negated: false,
            }),
            GrammarToken::TokenRef(name) => Ok(Element::TokenRef(name)),
            other => Err(self.error(format!("unexpected {} in set", other.describe()))),
        }
    }

    fn literal_or_range(&mut self, raw: &str) -> Result<Element, GenerationError> {
        let text = self.literal(raw)?;
        if !self.eat(&GrammarToken::Range) {
            return Ok(Element::Literal(text));
        }
        let upper = match self.advance()? {
            GrammarToken::StringLiteral(raw) => self.literal(&raw)?,
            _ => return Err(self.error("expected literal after '..'")),
        };
        match (single_char(&text), single_char(&upper)) {
            (Some(lo), Some(hi)) if lo <= hi => Ok(Element::CharSet {
                ranges: vec![(lo, hi)],
                negated: false,
            }),
            _ => Err(self.error(format!(
                "invalid range '{}'..'{}'",
                text.escape_default(),
                upper.escape_default()
            ))),
        }
    }

    fn literal(&self, raw: &str) -> Result<String, GenerationError> {
        let inner = raw
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap_or(raw);
        let text = unescape(inner).map_err(|message| self.error(message))?;
        if text.is_empty() {
            return Err(self.error("string literals cannot be empty"));
        }
        Ok(text)
    }

    fn char_set(&self, raw: &str) -> Result<Vec<(char, char)>, GenerationError> {
        let inner = raw
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(raw);
        parse_char_set(inner).map_err(|message| self.error(message))
    }

    fn commands(&mut self) -> Result<Vec<LexerCommand>, GenerationError> {
        let mut commands = Vec::new();
        loop {
            let name = match self.advance()? {
                GrammarToken::RuleRef(name) => name,
                GrammarToken::Mode => "mode".to_string(),
                other => {
                    return Err(self.error(format!("unexpected {} in lexer command", other.describe())))
                }
            };
            let argument = if self.eat(&GrammarToken::LParen) {
                let value = match self.advance()? {
                    GrammarToken::TokenRef(v) | GrammarToken::RuleRef(v) | GrammarToken::Int(v) => v,
                    _ => return Err(self.error("expected lexer command argument")),
                };
                self.expect(GrammarToken::RParen)?;
                Some(value)
            } else {
                None
            };

            let command = match (name.as_str(), argument) {
                ("skip", None) => LexerCommand::Skip,
                ("more", None) => LexerCommand::More,
                ("popMode", None) => LexerCommand::PopMode,
                ("channel", Some(arg)) => LexerCommand::Channel(arg),
                ("type", Some(arg)) => LexerCommand::Type(arg),
                ("mode", Some(arg)) => LexerCommand::Mode(arg),
                ("pushMode", Some(arg)) => LexerCommand::PushMode(arg),
                (other, _) => return Err(self.error(format!("unknown lexer command {}", other))),
            };
            commands.push(command);

            if !self.eat(&GrammarToken::Comma) {
                return Ok(commands);
            }
        }
    }
}

fn parse_options(body: &str, options: &mut BTreeMap<String, String>) {
    for entry in body.split(';') {
        if let Some((key, value)) = entry.split_once('=') {
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
            options.insert(key.trim().to_string(), value.to_string());
        }
    }
}

fn split_names(body: &str) -> Vec<String> {
    body.split(',')
        .map(|name| name.trim().trim_end_matches(';').trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Resolve escape sequences inside a literal
pub fn unescape(text: &str) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        out.push(escape(&mut chars)?);
    }
    Ok(out)
}

fn escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Result<char, String> {
    match chars.next() {
        Some('n') => Ok('\n'),
        Some('r') => Ok('\r'),
        Some('t') => Ok('\t'),
        Some('b') => Ok('\u{8}'),
        Some('f') => Ok('\u{c}'),
        Some('u') => {
            let digits: String = if chars.peek() == Some(&'{') {
                chars.next();
                chars.by_ref().take_while(|c| *c != '}').collect()
            } else {
                chars.by_ref().take(4).collect()
            };
            u32::from_str_radix(&digits, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| format!("invalid unicode escape \\u{}", digits))
        }
        Some('p') | Some('P') => Err("unicode property escapes are not supported".to_string()),
        Some(other) => Ok(other),
        None => Err("dangling escape at end of literal".to_string()),
    }
}

/// Parse the body of `[...]` into inclusive ranges
pub fn parse_char_set(body: &str) -> Result<Vec<(char, char)>, String> {
    let mut ranges = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        let lo = if c == '\\' { escape(&mut chars)? } else { c };
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('-') && lookahead.peek().is_some() {
            chars.next();
            let hi = match chars.next() {
                Some('\\') => escape(&mut chars)?,
                Some(hi) => hi,
                None => lo,
            };
            if hi < lo {
                return Err(format!(
                    "invalid character range {}-{}",
                    lo.escape_default(),
                    hi.escape_default()
                ));
            }
            ranges.push((lo, hi));
        } else {
            ranges.push((lo, lo));
        }
    }
    if ranges.is_empty() {
        return Err("empty character set".to_string());
    }
    Ok(ranges)
}
