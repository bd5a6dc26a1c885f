//! Renders analyzed grammars as unit source text.
//!
//! Units are S-expressions: a `lexer` or `parser` form holding header
//! clauses followed by one form per rule.

use super::analysis::{LexerSpec, ParserRuleSpec, ParserSpec};
use super::grammar::{Alternative, Element, LexerCommand, RepeatKind};

struct SourceWriter {
    out: String,
}

impl SourceWriter {
    fn new(header: &str) -> Self {
        Self {
            out: format!(";; {}\n", header),
        }
    }

    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Close the outermost form on the last written line
    fn finish(mut self) -> String {
        if self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out.push_str(")\n");
        self.out
    }
}

fn header(file: &str) -> String {
    format!(
        "Generated by {} {} from {}. Do not edit.",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        file
    )
}

/// Quote a string for unit source
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn emit_lexer(spec: &LexerSpec, file: &str) -> String {
    let mut w = SourceWriter::new(&header(file));
    w.line(0, &format!("(lexer {}", quote(&spec.unit)));
    w.line(1, &format!("(grammar {})", quote(&spec.grammar)));
    if spec.case_insensitive {
        w.line(1, "(case-insensitive)");
    }
    if let Some(base) = &spec.extends {
        w.line(1, &format!("(extends {})", quote(base)));
    }
    if !spec.channels.is_empty() {
        w.line(1, &format!("(channels {})", quote_all(&spec.channels)));
    }
    w.line(1, &format!("(modes {})", quote_all(&spec.modes)));

    for token in &spec.vocabulary {
        let literal = token
            .literal
            .as_ref()
            .map(|l| format!(" {}", quote(l)))
            .unwrap_or_default();
        w.line(
            1,
            &format!("(token {} {}{})", token.token_type, quote(&token.name), literal),
        );
    }

    for rule in &spec.rules {
        match rule.token_type {
            Some(token_type) => w.line(
                1,
                &format!(
                    "(rule {} {} {}",
                    quote(&rule.name),
                    token_type,
                    quote(&rule.mode)
                ),
            ),
            None => w.line(1, &format!("(fragment {}", quote(&rule.name))),
        }
        emit_alternatives(&mut w, 2, &rule.alternatives, true);
    }

    w.finish()
}

pub fn emit_parser(spec: &ParserSpec, file: &str) -> String {
    let mut w = SourceWriter::new(&header(file));
    w.line(0, &format!("(parser {}", quote(&spec.unit)));
    w.line(1, &format!("(grammar {})", quote(&spec.grammar)));
    w.line(1, &format!("(vocab {})", quote(&spec.vocabulary_unit)));
    if let Some(base) = &spec.extends {
        w.line(1, &format!("(extends {})", quote(base)));
    }
    w.line(1, &format!("(start {})", quote(&spec.start_rule)));

    for rule in &spec.rules {
        match rule {
            ParserRuleSpec::Plain { name, alternatives } => {
                w.line(1, &format!("(rule {}", quote(name)));
                emit_alternatives(&mut w, 2, alternatives, false);
            }
            ParserRuleSpec::LeftRecursive {
                name,
                primaries,
                suffixes,
            } => {
                w.line(1, &format!("(lrule {}", quote(name)));
                for primary in primaries {
                    w.line(2, &format!("(primary {})", alternative(primary, false)));
                }
                let last = suffixes.len();
                for (index, suffix) in suffixes.iter().enumerate() {
                    let body = alternative(
                        &Alternative {
                            elements: suffix.elements.clone(),
                            ..Alternative::default()
                        },
                        false,
                    );
                    let close = if index + 1 == last { "))" } else { ")" };
                    w.line(2, &format!("(suffix {} {}{}", suffix.precedence, body, close));
                }
                if suffixes.is_empty() {
                    close_last(&mut w);
                }
            }
        }
    }

    w.finish()
}

fn emit_alternatives(w: &mut SourceWriter, depth: usize, alternatives: &[Alternative], lexer: bool) {
    let last = alternatives.len();
    for (index, alt) in alternatives.iter().enumerate() {
        let close = if index + 1 == last { ")" } else { "" };
        w.line(depth, &format!("{}{}", alternative(alt, lexer), close));
    }
    if alternatives.is_empty() {
        close_last(w);
    }
}

fn close_last(w: &mut SourceWriter) {
    if w.out.ends_with('\n') {
        w.out.pop();
    }
    w.out.push_str(")\n");
}

fn alternative(alt: &Alternative, lexer: bool) -> String {
    let mut parts = vec!["alt".to_string()];
    parts.extend(alt.elements.iter().map(|e| expr(e, lexer)));
    parts.extend(alt.commands.iter().map(command));
    format!("({})", parts.join(" "))
}

fn command(command: &LexerCommand) -> String {
    match command {
        LexerCommand::Skip => "(skip)".to_string(),
        LexerCommand::More => "(more)".to_string(),
        LexerCommand::PopMode => "(pop-mode)".to_string(),
        LexerCommand::Channel(name) => format!("(channel {})", quote(name)),
        LexerCommand::Type(name) => format!("(type {})", quote(name)),
        LexerCommand::Mode(name) => format!("(mode {})", quote(name)),
        LexerCommand::PushMode(name) => format!("(push-mode {})", quote(name)),
    }
}

fn sequence(elements: &[Element], lexer: bool) -> String {
    match elements {
        [] => "(empty)".to_string(),
        [single] => expr(single, lexer),
        many => format!(
            "(seq {})",
            many.iter().map(|e| expr(e, lexer)).collect::<Vec<_>>().join(" ")
        ),
    }
}

fn expr(element: &Element, lexer: bool) -> String {
    match element {
        Element::Literal(text) => format!("(lit {})", quote(text)),
        Element::TokenRef(name) if lexer => format!("(ref {})", quote(name)),
        Element::TokenRef(name) => format!("(tok {})", quote(name)),
        Element::RuleRef(name) => format!("(invoke {})", quote(name)),
        Element::PrecRef(name, precedence) => format!("(invoke {} {})", quote(name), precedence),
        Element::CharSet { ranges, negated } => char_set(ranges, *negated),
        Element::Wildcard => "(any)".to_string(),
        Element::Eof => "(eof)".to_string(),
        Element::NotTokens(names) => format!("(ntok {})", quote_all(names)),
        Element::Not(members) if lexer => {
            let ranges: Vec<(char, char)> = members
                .iter()
                .flat_map(|member| match member {
                    Element::CharSet { ranges, .. } => ranges.clone(),
                    Element::Literal(text) => text.chars().map(|c| (c, c)).collect(),
                    _ => Vec::new(),
                })
                .collect();
            char_set(&ranges, true)
        }
        Element::Not(members) => {
            let names: Vec<String> = members
                .iter()
                .filter_map(|member| match member {
                    Element::TokenRef(name) => Some(name.clone()),
                    _ => None,
                })
                .collect();
            format!("(ntok {})", quote_all(&names))
        }
        Element::Block(alternatives) => match alternatives.as_slice() {
            [single] => sequence(&single.elements, lexer),
            many => format!(
                "(choice {})",
                many.iter()
                    .map(|alt| sequence(&alt.elements, lexer))
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
        },
        Element::Repeat {
            element,
            kind,
            greedy,
        } => {
            let head = match kind {
                RepeatKind::Optional => "opt",
                RepeatKind::ZeroOrMore => "star",
                RepeatKind::OneOrMore => "plus",
            };
            let lazy = if *greedy { "" } else { "-lazy" };
            format!("({}{} {})", head, lazy, expr(element, lexer))
        }
    }
}

fn char_set(ranges: &[(char, char)], negated: bool) -> String {
    let head = if negated { "nset" } else { "set" };
    let body: Vec<String> = ranges
        .iter()
        .map(|(lo, hi)| format!("(range {} {})", *lo as u32, *hi as u32))
        .collect();
    format!("({} {})", head, body.join(" "))
}

fn quote_all(items: &[String]) -> String {
    items.iter().map(|item| quote(item)).collect::<Vec<_>>().join(" ")
}
