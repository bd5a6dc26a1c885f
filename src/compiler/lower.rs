//! Default host compiler for unit sources.

use super::image::{
    self, LexerAction, LexerHeader, LexerRuleImage, LibraryHeader, ParseExpr, ParserHeader,
    ParserRuleImage, RuleBody, Suffix, TokenEntry, UnitImage,
};
use super::nfa::{FragmentLookup, NfaBuilder};
use super::sexpr;
use super::source::{
    self, CommandDecl, Expr, LexerDecl, LibraryDecl, Located, ParseRuleBody, ParseRuleDecl,
    ParserDecl, Pos, Repeat, UnitDecl,
};
use super::{CompilerDiagnostic, CompilerOutput, HostCompiler};
use crate::artifact::GeneratedUnit;
use crate::runtime::EOF;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Channels numbered before any declared by a lexer
const BUILTIN_CHANNELS: [&str; 2] = ["DEFAULT_TOKEN_CHANNEL", "HIDDEN"];

/// Compiles lexer, parser and library unit sources into unit images.
///
/// Each unit yields its header under the unit name plus one inner artifact
/// per rule named `Unit$rule`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitCompiler;

impl UnitCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl HostCompiler for UnitCompiler {
    fn compile(&self, sources: &[GeneratedUnit]) -> CompilerOutput {
        let mut output = CompilerOutput::default();

        // Read every unit first so cross-unit references can be resolved
        let mut decls: Vec<UnitDecl> = Vec::with_capacity(sources.len());
        for source in sources {
            let decl = sexpr::read_all(&source.source)
                .map_err(|e| Located::new(Pos { line: e.line, column: e.column }, e.message))
                .and_then(|forms| source::parse_unit(&forms));
            match decl {
                Ok(decl) if decl.name() != source.name => {
                    let pos = decl.pos();
                    output.diagnostics.push(CompilerDiagnostic::error(
                        &source.name,
                        pos.line,
                        pos.column,
                        format!("unit {} is declared in source {}", decl.name(), source.name),
                    ));
                }
                Ok(decl) => decls.push(decl),
                Err(located) => output.diagnostics.push(diagnostic(&source.name, located)),
            }
        }

        let index: HashMap<&str, &UnitDecl> = decls.iter().map(|d| (d.name(), d)).collect();
        for decl in &decls {
            let result = match decl {
                UnitDecl::Lexer(lexer) => compile_lexer(lexer, &index),
                UnitDecl::Parser(parser) => compile_parser(parser, &index),
                UnitDecl::Library(library) => compile_library(library),
            };
            match result {
                Ok(images) => {
                    for (name, image) in images {
                        match image::encode(&image) {
                            Ok(payload) => output.artifacts.push((name, payload)),
                            Err(e) => output.diagnostics.push(CompilerDiagnostic::error(
                                decl.name(),
                                0,
                                0,
                                format!("cannot encode {}: {}", name, e),
                            )),
                        }
                    }
                }
                Err(errors) => {
                    for located in errors {
                        output.diagnostics.push(diagnostic(decl.name(), located));
                    }
                }
            }
        }

        debug!(
            "unit compiler: {} source(s), {} artifact(s), {} diagnostic(s)",
            sources.len(),
            output.artifacts.len(),
            output.diagnostics.len()
        );
        output
    }
}

fn diagnostic(unit: &str, located: Located) -> CompilerDiagnostic {
    CompilerDiagnostic::error(unit, located.pos.line, located.pos.column, located.message)
}

fn inner_name(unit: &str, rule: &str) -> String {
    format!("{}${}", unit, rule)
}

type Images = Vec<(String, UnitImage)>;

fn library<'a>(
    extends: &Option<(String, Pos)>,
    index: &HashMap<&str, &'a UnitDecl>,
) -> Result<Option<&'a LibraryDecl>, Located> {
    match extends {
        None => Ok(None),
        Some((name, pos)) => match index.get(name.as_str()).copied() {
            Some(UnitDecl::Library(library)) => Ok(Some(library)),
            Some(_) => Err(Located::new(*pos, format!("{} is not a library unit", name))),
            None => Err(Located::new(*pos, format!("cannot find symbol: library {}", name))),
        },
    }
}

fn check_unique<'a>(names: impl Iterator<Item = (&'a str, Pos)>, what: &str) -> Vec<Located> {
    let mut seen = HashSet::new();
    names
        .filter(|(name, _)| !seen.insert(*name))
        .map(|(name, pos)| Located::new(pos, format!("duplicate {} {}", what, name)))
        .collect()
}

// ----------------------------------------------------------------------
// Lexers
// ----------------------------------------------------------------------

/// Rule and fragment bodies visible to `(ref ...)`
struct LexerEnv {
    table: HashMap<String, Vec<Vec<Expr>>>,
}

impl FragmentLookup for LexerEnv {
    fn alternatives(&self, name: &str) -> Option<&[Vec<Expr>]> {
        self.table.get(name).map(Vec::as_slice)
    }
}

fn compile_lexer(decl: &LexerDecl, index: &HashMap<&str, &UnitDecl>) -> Result<Images, Vec<Located>> {
    let mut errors = check_unique(
        decl.rules
            .iter()
            .map(|r| (r.name.as_str(), r.pos))
            .chain(decl.fragments.iter().map(|f| (f.name.as_str(), f.pos))),
        "lexer rule",
    );
    let library = library(&decl.extends, index).map_err(|e| vec![e])?;

    let mut env = LexerEnv {
        table: HashMap::new(),
    };
    for rule in &decl.rules {
        let alts = rule.alts.iter().map(|alt| alt.exprs.clone()).collect();
        env.table.insert(rule.name.clone(), alts);
    }
    for fragment in &decl.fragments {
        env.table.insert(fragment.name.clone(), fragment.alts.clone());
    }
    if let Some(library) = library {
        for fragment in &library.fragments {
            env.table
                .entry(fragment.name.clone())
                .or_insert_with(|| fragment.alts.clone());
        }
    }

    let mut channels: Vec<String> = BUILTIN_CHANNELS.iter().map(|c| c.to_string()).collect();
    channels.extend(decl.channels.iter().cloned());

    let mut images = Vec::with_capacity(decl.rules.len() + 1);
    let mut rule_units = Vec::with_capacity(decl.rules.len());
    for rule in &decl.rules {
        match compile_lexer_rule(decl, rule, &env, &channels) {
            Ok(image) => {
                let unit = inner_name(&decl.name, &rule.name);
                rule_units.push(unit.clone());
                images.push((unit, UnitImage::LexerRule(image)));
            }
            Err(mut rule_errors) => errors.append(&mut rule_errors),
        }
    }

    if decl.rules.is_empty() {
        errors.push(Located::new(decl.pos, "lexer defines no token rules"));
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let header = LexerHeader {
        name: decl.name.clone(),
        grammar: decl.grammar.clone(),
        modes: decl.modes.clone(),
        channels,
        vocabulary: decl
            .tokens
            .iter()
            .map(|t| TokenEntry {
                token_type: t.token_type,
                symbolic: t.name.clone(),
                literal: t.literal.clone(),
            })
            .collect(),
        rule_units,
    };
    images.insert(0, (decl.name.clone(), UnitImage::LexerHeader(header)));
    Ok(images)
}

fn compile_lexer_rule(
    decl: &LexerDecl,
    rule: &source::LexRuleDecl,
    env: &LexerEnv,
    channels: &[String],
) -> Result<LexerRuleImage, Vec<Located>> {
    let mut errors = Vec::new();

    let mode = match decl.modes.iter().position(|m| *m == rule.mode) {
        Some(mode) => mode as u32,
        None => {
            errors.push(Located::new(rule.pos, format!("cannot find symbol: mode {}", rule.mode)));
            0
        }
    };
    if !decl.tokens.iter().any(|t| t.name == rule.name && t.token_type == rule.token_type) {
        errors.push(Located::new(
            rule.pos,
            format!("rule {} has no matching token declaration", rule.name),
        ));
    }

    let mut actions = Vec::with_capacity(rule.alts.len());
    for alt in &rule.alts {
        let mut resolved = Vec::with_capacity(alt.commands.len());
        for (command, pos) in &alt.commands {
            match lexer_action(decl, command, channels) {
                Ok(action) => resolved.push(action),
                Err(message) => errors.push(Located::new(*pos, message)),
            }
        }
        actions.push(resolved);
    }

    let alts: Vec<&[Expr]> = rule.alts.iter().map(|alt| alt.exprs.as_slice()).collect();
    let program = match NfaBuilder::new(env, decl.case_insensitive).compile_rule(&rule.name, &alts) {
        Ok(program) => Some(program),
        Err(located) => {
            errors.push(located);
            None
        }
    };

    match program {
        Some(program) if errors.is_empty() => Ok(LexerRuleImage {
            name: rule.name.clone(),
            token_type: rule.token_type,
            mode,
            shortest: program.shortest,
            program: program.insts,
            actions,
        }),
        _ => Err(errors),
    }
}

fn lexer_action(decl: &LexerDecl, command: &CommandDecl, channels: &[String]) -> Result<LexerAction, String> {
    let mode = |name: &str| {
        decl.modes
            .iter()
            .position(|m| m == name)
            .map(|m| m as u32)
            .ok_or_else(|| format!("cannot find symbol: mode {}", name))
    };
    Ok(match command {
        CommandDecl::Skip => LexerAction::Skip,
        CommandDecl::More => LexerAction::More,
        CommandDecl::PopMode => LexerAction::PopMode,
        CommandDecl::Channel(name) => match name.parse::<u32>() {
            Ok(number) => LexerAction::Channel(number),
            Err(_) => channels
                .iter()
                .position(|c| c == name)
                .map(|c| LexerAction::Channel(c as u32))
                .ok_or_else(|| format!("cannot find symbol: channel {}", name))?,
        },
        CommandDecl::Type(name) => decl
            .tokens
            .iter()
            .find(|t| &t.name == name)
            .map(|t| LexerAction::Type(t.token_type))
            .ok_or_else(|| format!("cannot find symbol: token {}", name))?,
        CommandDecl::Mode(name) => LexerAction::Mode(mode(name)?),
        CommandDecl::PushMode(name) => LexerAction::PushMode(mode(name)?),
    })
}

// ----------------------------------------------------------------------
// Parsers
// ----------------------------------------------------------------------

struct ParserLinker<'a> {
    tokens: HashMap<&'a str, i32>,
    literals: HashMap<&'a str, i32>,
    library: Option<&'a LibraryDecl>,
    /// Rules in index order, own rules first then linked library rules
    rules: Vec<&'a ParseRuleDecl>,
    positions: HashMap<&'a str, u32>,
}

impl<'a> ParserLinker<'a> {
    fn rule_index(&mut self, name: &str, pos: Pos) -> Result<u32, Located> {
        if let Some(index) = self.positions.get(name) {
            return Ok(*index);
        }
        let linked = self
            .library
            .and_then(|library| library.rules.iter().find(|r| r.name == name))
            .ok_or_else(|| Located::new(pos, format!("cannot find symbol: rule {}", name)))?;
        let index = self.rules.len() as u32;
        self.rules.push(linked);
        self.positions.insert(linked.name.as_str(), index);
        Ok(index)
    }

    fn token(&self, name: &str, pos: Pos) -> Result<i32, Located> {
        if name == "EOF" {
            return Ok(EOF);
        }
        self.tokens
            .get(name)
            .copied()
            .ok_or_else(|| Located::new(pos, format!("cannot find symbol: token {}", name)))
    }

    fn sequence(&mut self, exprs: &[Expr]) -> Result<ParseExpr, Located> {
        let mut items = exprs
            .iter()
            .map(|e| self.expr(e))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match items.len() {
            0 => ParseExpr::Empty,
            1 => items.remove(0),
            _ => ParseExpr::Seq(items),
        })
    }

    fn alternatives(&mut self, alts: &[Vec<Expr>]) -> Result<ParseExpr, Located> {
        let mut choices = alts
            .iter()
            .map(|alt| self.sequence(alt))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match choices.len() {
            1 => choices.remove(0),
            _ => ParseExpr::Choice(choices),
        })
    }

    fn expr(&mut self, expr: &Expr) -> Result<ParseExpr, Located> {
        Ok(match expr {
            Expr::Empty => ParseExpr::Empty,
            Expr::Seq(items) => self.sequence(items)?,
            Expr::Choice(items) => ParseExpr::Choice(
                items
                    .iter()
                    .map(|e| self.expr(e))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Expr::Repeat { kind, lazy, body } => {
                let body = Box::new(self.expr(body)?);
                let greedy = !lazy;
                match kind {
                    Repeat::Optional => ParseExpr::Optional { body, greedy },
                    Repeat::Star => ParseExpr::Star { body, greedy },
                    Repeat::Plus => ParseExpr::Plus { body, greedy },
                }
            }
            Expr::Lit(text, pos) => ParseExpr::Token(
                self.literals
                    .get(text.as_str())
                    .copied()
                    .ok_or_else(|| {
                        Located::new(*pos, format!("cannot find symbol: token for '{}'", text.escape_default()))
                    })?,
            ),
            Expr::Tok(name, pos) => ParseExpr::Token(self.token(name, *pos)?),
            Expr::NotTok(names, pos) => {
                let mut types = names
                    .iter()
                    .map(|name| self.token(name, *pos))
                    .collect::<Result<Vec<_>, _>>()?;
                types.sort_unstable();
                types.dedup();
                ParseExpr::NotTokens(types)
            }
            Expr::Any => ParseExpr::AnyToken,
            Expr::Eof => ParseExpr::Token(EOF),
            Expr::Invoke(name, precedence, pos) => ParseExpr::Rule {
                index: self.rule_index(name, *pos)?,
                precedence: *precedence,
            },
            Expr::Ref(_, pos) => return Err(Located::new(*pos, "lexer rule reference in parser rule")),
            Expr::Set { .. } => {
                return Err(Located::new(Pos::default(), "character set in parser rule"))
            }
        })
    }

    fn body(&mut self, rule: &ParseRuleDecl) -> Result<RuleBody, Located> {
        Ok(match &rule.body {
            ParseRuleBody::Plain(alts) => RuleBody::Plain(self.alternatives(alts)?),
            ParseRuleBody::LeftRecursive {
                primaries,
                suffixes,
            } => RuleBody::LeftRecursive {
                primary: self.alternatives(primaries)?,
                suffixes: suffixes
                    .iter()
                    .map(|(precedence, alt)| {
                        Ok(Suffix {
                            precedence: *precedence,
                            body: self.sequence(alt)?,
                        })
                    })
                    .collect::<Result<Vec<_>, Located>>()?,
            },
        })
    }
}

fn compile_parser(decl: &ParserDecl, index: &HashMap<&str, &UnitDecl>) -> Result<Images, Vec<Located>> {
    let mut errors = check_unique(decl.rules.iter().map(|r| (r.name.as_str(), r.pos)), "rule");

    let (vocab_name, vocab_pos) = &decl.vocab;
    let lexer = match index.get(vocab_name.as_str()) {
        Some(UnitDecl::Lexer(lexer)) => lexer,
        Some(_) => return Err(vec![Located::new(*vocab_pos, format!("{} is not a lexer unit", vocab_name))]),
        None => {
            return Err(vec![Located::new(
                *vocab_pos,
                format!("cannot find symbol: lexer {}", vocab_name),
            )])
        }
    };
    let library = library(&decl.extends, index).map_err(|e| vec![e])?;

    if decl.rules.is_empty() {
        return Err(vec![Located::new(decl.pos, "parser defines no rules")]);
    }

    let mut linker = ParserLinker {
        tokens: lexer.tokens.iter().map(|t| (t.name.as_str(), t.token_type)).collect(),
        literals: lexer
            .tokens
            .iter()
            .filter_map(|t| t.literal.as_deref().map(|l| (l, t.token_type)))
            .collect(),
        library,
        rules: decl.rules.iter().collect(),
        positions: decl
            .rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.as_str(), i as u32))
            .collect(),
    };

    // Linking may append library rules while lowering
    let mut bodies = Vec::new();
    let mut position = 0;
    while position < linker.rules.len() {
        let rule = linker.rules[position];
        match linker.body(rule) {
            Ok(body) => bodies.push(body),
            Err(located) => errors.push(located),
        }
        position += 1;
    }

    let start_rule = match &decl.start {
        Some((name, pos)) => match linker.positions.get(name.as_str()) {
            Some(index) => *index,
            None => {
                errors.push(Located::new(*pos, format!("cannot find symbol: rule {}", name)));
                0
            }
        },
        None => 0,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    let rule_names: Vec<String> = linker.rules.iter().map(|r| r.name.clone()).collect();
    let rule_units: Vec<String> = rule_names.iter().map(|r| inner_name(&decl.name, r)).collect();

    let mut images = Vec::with_capacity(rule_names.len() + 1);
    images.push((
        decl.name.clone(),
        UnitImage::ParserHeader(ParserHeader {
            name: decl.name.clone(),
            grammar: decl.grammar.clone(),
            vocabulary_unit: vocab_name.clone(),
            rule_names: rule_names.clone(),
            rule_units: rule_units.clone(),
            start_rule,
        }),
    ));
    for (index, ((name, unit), body)) in rule_names.into_iter().zip(rule_units).zip(bodies).enumerate() {
        images.push((
            unit,
            UnitImage::ParserRule(ParserRuleImage {
                name,
                index: index as u32,
                body,
            }),
        ));
    }
    Ok(images)
}

fn compile_library(decl: &LibraryDecl) -> Result<Images, Vec<Located>> {
    let errors = check_unique(
        decl.fragments
            .iter()
            .map(|f| (f.name.as_str(), f.pos))
            .chain(decl.rules.iter().map(|r| (r.name.as_str(), r.pos))),
        "library member",
    );
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(vec![(
        decl.name.clone(),
        UnitImage::Library(LibraryHeader {
            name: decl.name.clone(),
            fragments: decl.fragments.iter().map(|f| f.name.clone()).collect(),
            rules: decl.rules.iter().map(|r| r.name.clone()).collect(),
        }),
    )])
}
