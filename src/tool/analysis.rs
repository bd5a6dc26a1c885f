//! Semantic analysis of parsed grammars.
//!
//! Merges imports, splits combined grammars, assigns token types, checks
//! references and rewrites directly left-recursive parser rules into a
//! primary/suffix form driven by precedence.

use super::grammar::{
    is_token_name, Alternative, Element, Grammar, GrammarKind, LexerCommand, RepeatKind, Rule,
};
use super::reader::DEFAULT_MODE;
use super::GenerationError;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Channels every lexer knows about
pub const BUILTIN_CHANNELS: [&str; 2] = ["DEFAULT_TOKEN_CHANNEL", "HIDDEN"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDef {
    pub token_type: i32,
    pub name: String,
    pub literal: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LexerSpec {
    pub unit: String,
    pub grammar: String,
    pub extends: Option<String>,
    pub case_insensitive: bool,
    /// User-declared channels; numbering starts after the builtin ones
    pub channels: Vec<String>,
    /// Modes with `DEFAULT_MODE` first
    pub modes: Vec<String>,
    pub vocabulary: Vec<TokenDef>,
    pub rules: Vec<LexerRuleSpec>,
}

#[derive(Debug, Clone)]
pub struct LexerRuleSpec {
    pub name: String,
    /// `None` for fragments
    pub token_type: Option<i32>,
    pub mode: String,
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone)]
pub struct ParserSpec {
    pub unit: String,
    pub grammar: String,
    pub extends: Option<String>,
    pub vocabulary_unit: String,
    pub start_rule: String,
    pub rules: Vec<ParserRuleSpec>,
}

#[derive(Debug, Clone)]
pub enum ParserRuleSpec {
    Plain {
        name: String,
        alternatives: Vec<Alternative>,
    },
    LeftRecursive {
        name: String,
        primaries: Vec<Alternative>,
        suffixes: Vec<SuffixSpec>,
    },
}

impl ParserRuleSpec {
    pub fn name(&self) -> &str {
        match self {
            ParserRuleSpec::Plain { name, .. } | ParserRuleSpec::LeftRecursive { name, .. } => name,
        }
    }

    /// Alternatives that can start the rule
    fn leading_alternatives(&self) -> &[Alternative] {
        match self {
            ParserRuleSpec::Plain { alternatives, .. } => alternatives,
            ParserRuleSpec::LeftRecursive { primaries, .. } => primaries,
        }
    }
}

/// A left-recursive alternative with the leading self reference removed
#[derive(Debug, Clone)]
pub struct SuffixSpec {
    pub precedence: u32,
    pub right_assoc: bool,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    /// Name identifying the grammar set (first parser-capable root grammar)
    pub grammar_name: String,
    pub lexers: Vec<LexerSpec>,
    pub parsers: Vec<ParserSpec>,
    pub warnings: Vec<String>,
}

/// Analyze a set of grammars, qualifying unit names with `package`
pub fn analyze(grammars: Vec<Grammar>, package: Option<&str>) -> Result<Analysis, GenerationError> {
    let mut analyzer = Analyzer {
        package: package.filter(|p| !p.is_empty()).map(str::to_string),
        warnings: Vec::new(),
    };
    analyzer.run(grammars)
}

struct Analyzer {
    package: Option<String>,
    warnings: Vec<String>,
}

impl Analyzer {
    fn run(&mut self, grammars: Vec<Grammar>) -> Result<Analysis, GenerationError> {
        if grammars.is_empty() {
            return Err(GenerationError::NoGrammar);
        }

        let mut by_name: HashMap<&str, &Grammar> = HashMap::new();
        for grammar in &grammars {
            if by_name.insert(grammar.name.as_str(), grammar).is_some() {
                return Err(GenerationError::DuplicateGrammar(grammar.name.clone()));
            }
        }

        let mut imported = HashSet::new();
        for grammar in &grammars {
            for name in &grammar.imports {
                if !by_name.contains_key(name.as_str()) {
                    return Err(GenerationError::MissingImport {
                        name: name.clone(),
                        importer: grammar.name.clone(),
                    });
                }
                imported.insert(name.as_str());
            }
        }

        let mut roots = Vec::new();
        for grammar in grammars.iter().filter(|g| !imported.contains(g.name.as_str())) {
            let mut visiting = Vec::new();
            roots.push(merge_imports(grammar, &by_name, &mut visiting)?);
        }

        let grammar_name = roots
            .iter()
            .find(|g| g.kind != GrammarKind::Lexer)
            .or_else(|| roots.first())
            .map(|g| g.name.clone())
            .ok_or(GenerationError::NoGrammar)?;

        let mut lexers = Vec::new();
        let mut parsers = Vec::new();

        // Lexer grammars first so parser grammars can find their vocabulary
        for grammar in roots.iter().filter(|g| g.kind == GrammarKind::Lexer) {
            if let Some(rule) = grammar.rules.iter().find(|r| !r.is_lexer_rule()) {
                return Err(rule_error(grammar, rule, "parser rule not allowed in lexer grammar"));
            }
            let unit = self.qualify(&grammar.name);
            lexers.push(self.build_lexer(grammar, unit, grammar.rules.clone(), &[])?);
        }

        for grammar in roots.iter().filter(|g| g.kind != GrammarKind::Lexer) {
            let (lexer_rules, parser_rules): (Vec<Rule>, Vec<Rule>) =
                grammar.rules.iter().cloned().partition(Rule::is_lexer_rule);

            match grammar.kind {
                GrammarKind::Combined => {
                    if grammar.rules.is_empty() {
                        return Err(GenerationError::grammar(&grammar.name, "grammar has no rules"));
                    }
                    let literals = collect_literals(&parser_rules);
                    let lexer_unit = self.qualify(&format!("{}Lexer", grammar.name));
                    let mut lexer = self.build_lexer(grammar, lexer_unit, lexer_rules, &literals)?;
                    if parser_rules.is_empty() {
                        self.warnings.push(format!(
                            "grammar {} has no parser rules; no parser generated",
                            grammar.name
                        ));
                    } else {
                        let unit = self.qualify(&format!("{}Parser", grammar.name));
                        let parser = self.build_parser(grammar, unit, parser_rules, &mut lexer, true)?;
                        parsers.push(parser);
                    }
                    lexers.push(lexer);
                }
                GrammarKind::Parser => {
                    if let Some(rule) = lexer_rules.first() {
                        return Err(rule_error(grammar, rule, "lexer rule not allowed in parser grammar"));
                    }
                    let vocab = grammar.option("tokenVocab").ok_or_else(|| {
                        GenerationError::grammar(&grammar.name, "parser grammar requires a tokenVocab option")
                    })?;
                    let mut lexer = lexers
                        .iter()
                        .find(|l| l.grammar == vocab)
                        .cloned()
                        .ok_or_else(|| {
                            GenerationError::grammar(
                                &grammar.name,
                                format!("cannot find tokens file for tokenVocab {}", vocab),
                            )
                        })?;
                    let unit = self.qualify(&grammar.name);
                    parsers.push(self.build_parser(grammar, unit, parser_rules, &mut lexer, false)?);
                }
                GrammarKind::Lexer => {}
            }
        }

        Ok(Analysis {
            grammar_name,
            lexers,
            parsers,
            warnings: std::mem::take(&mut self.warnings),
        })
    }

    fn qualify(&self, name: &str) -> String {
        match &self.package {
            Some(package) => format!("{}.{}", package, name),
            None => name.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Lexer side
    // ------------------------------------------------------------------

    fn build_lexer(
        &mut self,
        grammar: &Grammar,
        unit: String,
        rules: Vec<Rule>,
        parser_literals: &[String],
    ) -> Result<LexerSpec, GenerationError> {
        if rules.iter().all(|r| r.fragment) && parser_literals.is_empty() {
            return Err(GenerationError::grammar(&grammar.name, "lexer has no token rules"));
        }
        check_duplicates(grammar, &rules)?;
        if let Some(name) = grammar.tokens.iter().find(|n| !is_valid_token_name(n)) {
            return Err(GenerationError::grammar(
                &grammar.name,
                format!("invalid token name {} in tokens block", name),
            ));
        }

        let mut vocabulary: Vec<TokenDef> = Vec::new();
        let mut specs = Vec::new();
        let mut next_type = 1;

        // Implicit tokens for literals the lexer does not already define
        for literal in parser_literals {
            let defined = rules
                .iter()
                .any(|r| !r.fragment && r.single_literal() == Some(literal.as_str()));
            if defined || vocabulary.iter().any(|t| t.literal.as_deref() == Some(literal)) {
                continue;
            }
            let name = format!("T__{}", vocabulary.len());
            vocabulary.push(TokenDef {
                token_type: next_type,
                name: name.clone(),
                literal: Some(literal.clone()),
            });
            specs.push(LexerRuleSpec {
                name,
                token_type: Some(next_type),
                mode: DEFAULT_MODE.to_string(),
                alternatives: vec![Alternative {
                    elements: vec![Element::Literal(literal.clone())],
                    ..Alternative::default()
                }],
            });
            next_type += 1;
        }

        for name in &grammar.tokens {
            if !vocabulary.iter().any(|t| &t.name == name) {
                vocabulary.push(TokenDef {
                    token_type: next_type,
                    name: name.clone(),
                    literal: None,
                });
                next_type += 1;
            }
        }

        for rule in rules.iter().filter(|r| !r.fragment) {
            let literal = rule.single_literal().map(str::to_string);
            match vocabulary.iter_mut().find(|t| t.name == rule.name) {
                Some(existing) => existing.literal = existing.literal.take().or(literal),
                None => {
                    vocabulary.push(TokenDef {
                        token_type: next_type,
                        name: rule.name.clone(),
                        literal,
                    });
                    next_type += 1;
                }
            }
        }

        let mut modes = vec![DEFAULT_MODE.to_string()];
        modes.extend(grammar.modes.iter().cloned());
        let extends = grammar.option("superClass").map(str::to_string);
        let rule_names: HashSet<&str> = rules.iter().map(|r| r.name.as_str()).collect();

        for rule in &rules {
            let mut alternatives = Vec::with_capacity(rule.alternatives.len());
            for alt in &rule.alternatives {
                let mut elements = Vec::with_capacity(alt.elements.len());
                for element in &alt.elements {
                    elements.push(lexer_element(grammar, rule, element, &rule_names, extends.is_some())?);
                }
                for command in &alt.commands {
                    check_command(grammar, rule, command, &vocabulary, &modes)?;
                }
                alternatives.push(Alternative {
                    elements,
                    ..alt.clone()
                });
            }
            let token_type = if rule.fragment {
                None
            } else {
                vocabulary.iter().find(|t| t.name == rule.name).map(|t| t.token_type)
            };
            specs.push(LexerRuleSpec {
                name: rule.name.clone(),
                token_type,
                mode: rule.mode.clone(),
                alternatives,
            });
        }

        Ok(LexerSpec {
            unit,
            grammar: grammar.name.clone(),
            extends,
            case_insensitive: grammar.option("caseInsensitive") == Some("true"),
            channels: grammar.channels.clone(),
            modes,
            vocabulary,
            rules: specs,
        })
    }

    // ------------------------------------------------------------------
    // Parser side
    // ------------------------------------------------------------------

    fn build_parser(
        &mut self,
        grammar: &Grammar,
        unit: String,
        rules: Vec<Rule>,
        lexer: &mut LexerSpec,
        allow_implicit: bool,
    ) -> Result<ParserSpec, GenerationError> {
        check_duplicates(grammar, &rules)?;
        let extends = grammar.option("superClass").map(str::to_string);
        let rule_names: HashSet<String> = rules.iter().map(|r| r.name.clone()).collect();

        let mut specs = Vec::with_capacity(rules.len());
        for rule in &rules {
            let mut scope = ParserScope {
                grammar,
                rule,
                vocabulary: &mut lexer.vocabulary,
                rule_names: &rule_names,
                lenient: extends.is_some(),
                allow_implicit,
                warnings: &mut self.warnings,
            };
            let mut alternatives = Vec::with_capacity(rule.alternatives.len());
            for alt in &rule.alternatives {
                let mut elements = Vec::with_capacity(alt.elements.len());
                for element in &alt.elements {
                    elements.push(scope.resolve(element)?);
                }
                alternatives.push(Alternative {
                    elements,
                    commands: Vec::new(),
                    ..alt.clone()
                });
            }
            specs.push(rewrite_left_recursion(grammar, rule, alternatives)?);
        }

        check_mutual_left_recursion(grammar, &specs)?;

        let start_rule = specs
            .first()
            .map(|r| r.name().to_string())
            .ok_or_else(|| GenerationError::grammar(&grammar.name, "parser has no rules"))?;

        Ok(ParserSpec {
            unit,
            grammar: grammar.name.clone(),
            extends,
            vocabulary_unit: lexer.unit.clone(),
            start_rule,
            rules: specs,
        })
    }
}

struct ParserScope<'a> {
    grammar: &'a Grammar,
    rule: &'a Rule,
    vocabulary: &'a mut Vec<TokenDef>,
    rule_names: &'a HashSet<String>,
    /// Undefined rule references are resolved against the extended unit
    lenient: bool,
    allow_implicit: bool,
    warnings: &'a mut Vec<String>,
}

impl ParserScope<'_> {
    fn resolve(&mut self, element: &Element) -> Result<Element, GenerationError> {
        Ok(match element {
            Element::Literal(text) => Element::TokenRef(self.literal_token(text)?),
            Element::TokenRef(name) => Element::TokenRef(self.token(name)?),
            Element::RuleRef(name) => {
                if !self.rule_names.contains(name) && !self.lenient {
                    return Err(self.error(format!("reference to undefined rule: {}", name)));
                }
                element.clone()
            }
            Element::CharSet { .. } => {
                return Err(self.error("character sets are only allowed in lexer rules"))
            }
            Element::Not(members) => {
                let mut names = Vec::with_capacity(members.len());
                for member in members {
                    match member {
                        Element::Literal(text) => names.push(self.literal_token(text)?),
                        Element::TokenRef(name) => names.push(self.token(name)?),
                        _ => return Err(self.error("only tokens may appear in a parser set")),
                    }
                }
                Element::NotTokens(names)
            }
            Element::Block(alternatives) => {
                let mut resolved = Vec::with_capacity(alternatives.len());
                for alt in alternatives {
                    let mut elements = Vec::with_capacity(alt.elements.len());
                    for element in &alt.elements {
                        elements.push(self.resolve(element)?);
                    }
                    resolved.push(Alternative {
                        elements,
                        ..alt.clone()
                    });
                }
                Element::Block(resolved)
            }
            Element::Repeat {
                element,
                kind,
                greedy,
            } => Element::Repeat {
                element: Box::new(self.resolve(element)?),
                kind: *kind,
                greedy: *greedy,
            },
            Element::Wildcard | Element::Eof | Element::NotTokens(_) | Element::PrecRef(..) => {
                element.clone()
            }
        })
    }

    fn literal_token(&self, text: &str) -> Result<String, GenerationError> {
        self.vocabulary
            .iter()
            .find(|t| t.literal.as_deref() == Some(text))
            .map(|t| t.name.clone())
            .ok_or_else(|| {
                self.error(format!(
                    "cannot create implicit token for string literal '{}' in non-combined grammar",
                    text.escape_default()
                ))
            })
    }

    fn token(&mut self, name: &str) -> Result<String, GenerationError> {
        if self.vocabulary.iter().any(|t| t.name == name) {
            return Ok(name.to_string());
        }
        if !self.allow_implicit {
            return Err(self.error(format!("token {} is not defined in the vocabulary", name)));
        }
        let token_type = self.vocabulary.iter().map(|t| t.token_type).max().unwrap_or(0) + 1;
        self.vocabulary.push(TokenDef {
            token_type,
            name: name.to_string(),
            literal: None,
        });
        self.warnings.push(format!(
            "{}:{}:{}: implicit definition of token {} in parser",
            self.grammar.file, self.rule.line, self.rule.column, name
        ));
        Ok(name.to_string())
    }

    fn error(&self, message: impl Into<String>) -> GenerationError {
        rule_error(self.grammar, self.rule, message)
    }
}

fn rule_error(grammar: &Grammar, rule: &Rule, message: impl Into<String>) -> GenerationError {
    GenerationError::Rule {
        file: grammar.file.clone(),
        line: rule.line,
        column: rule.column,
        message: format!("rule {}: {}", rule.name, message.into()),
    }
}

fn check_duplicates(grammar: &Grammar, rules: &[Rule]) -> Result<(), GenerationError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.name.as_str()) {
            return Err(rule_error(grammar, rule, "rule redefinition"));
        }
    }
    Ok(())
}

fn merge_imports<'g>(
    grammar: &'g Grammar,
    by_name: &HashMap<&str, &'g Grammar>,
    visiting: &mut Vec<String>,
) -> Result<Grammar, GenerationError> {
    if visiting.contains(&grammar.name) {
        return Err(GenerationError::grammar(&grammar.name, "circular grammar import"));
    }
    visiting.push(grammar.name.clone());

    let mut merged = grammar.clone();
    for name in &grammar.imports {
        let Some(imported) = by_name.get(name.as_str()) else {
            return Err(GenerationError::MissingImport {
                name: name.clone(),
                importer: grammar.name.clone(),
            });
        };
        let imported = merge_imports(imported, by_name, visiting)?;
        for rule in imported.rules {
            if merged.rule(&rule.name).is_none() {
                merged.rules.push(rule);
            }
        }
        for token in imported.tokens {
            if !merged.tokens.contains(&token) {
                merged.tokens.push(token);
            }
        }
        for channel in imported.channels {
            if !merged.channels.contains(&channel) {
                merged.channels.push(channel);
            }
        }
        for mode in imported.modes {
            if !merged.modes.contains(&mode) {
                merged.modes.push(mode);
            }
        }
    }

    visiting.pop();
    Ok(merged)
}

/// String literals used by parser rules, in order of first appearance
fn collect_literals(rules: &[Rule]) -> Vec<String> {
    fn walk(element: &Element, out: &mut Vec<String>) {
        match element {
            Element::Literal(text) => {
                if !out.contains(text) {
                    out.push(text.clone());
                }
            }
            Element::Not(members) => members.iter().for_each(|m| walk(m, out)),
            Element::Block(alternatives) => alternatives
                .iter()
                .flat_map(|alt| &alt.elements)
                .for_each(|e| walk(e, out)),
            Element::Repeat { element, .. } => walk(element, out),
            _ => {}
        }
    }

    let mut out = Vec::new();
    for rule in rules {
        for element in rule.alternatives.iter().flat_map(|alt| &alt.elements) {
            walk(element, &mut out);
        }
    }
    out
}

fn lexer_element(
    grammar: &Grammar,
    rule: &Rule,
    element: &Element,
    rule_names: &HashSet<&str>,
    lenient: bool,
) -> Result<Element, GenerationError> {
    let recurse = |e: &Element| lexer_element(grammar, rule, e, rule_names, lenient);
    Ok(match element {
        Element::TokenRef(name) => {
            if !rule_names.contains(name.as_str()) && !lenient {
                return Err(rule_error(grammar, rule, format!("reference to undefined rule: {}", name)));
            }
            element.clone()
        }
        Element::RuleRef(name) => {
            return Err(rule_error(
                grammar,
                rule,
                format!("parser rule {} not allowed in lexer", name),
            ))
        }
        Element::Eof => return Err(rule_error(grammar, rule, "EOF is not allowed in lexer rules")),
        Element::Not(members) => {
            let mut ranges = Vec::new();
            for member in members {
                match member {
                    Element::Literal(text) if text.chars().count() == 1 => {
                        let c = text.chars().next().unwrap_or_default();
                        ranges.push((c, c));
                    }
                    Element::CharSet {
                        ranges: set,
                        negated: false,
                    } => ranges.extend(set.iter().copied()),
                    _ => {
                        return Err(rule_error(
                            grammar,
                            rule,
                            "only single characters and character sets may be negated",
                        ))
                    }
                }
            }
            Element::CharSet {
                ranges,
                negated: true,
            }
        }
        Element::Block(alternatives) => {
            let mut resolved = Vec::with_capacity(alternatives.len());
            for alt in alternatives {
                let elements = alt.elements.iter().map(recurse).collect::<Result<Vec<_>, _>>()?;
                resolved.push(Alternative {
                    elements,
                    ..alt.clone()
                });
            }
            Element::Block(resolved)
        }
        Element::Repeat {
            element,
            kind,
            greedy,
        } => Element::Repeat {
            element: Box::new(recurse(element)?),
            kind: *kind,
            greedy: *greedy,
        },
        _ => element.clone(),
    })
}

fn check_command(
    grammar: &Grammar,
    rule: &Rule,
    command: &LexerCommand,
    vocabulary: &[TokenDef],
    modes: &[String],
) -> Result<(), GenerationError> {
    let problem = match command {
        LexerCommand::Type(name) if !vocabulary.iter().any(|t| &t.name == name) => {
            Some(format!("type({}) refers to an undefined token", name))
        }
        LexerCommand::Channel(name)
            if name.parse::<u32>().is_err()
                && !BUILTIN_CHANNELS.contains(&name.as_str())
                && !grammar.channels.contains(name) =>
        {
            Some(format!("channel({}) refers to an undefined channel", name))
        }
        LexerCommand::Mode(name) | LexerCommand::PushMode(name) if !modes.contains(name) => {
            Some(format!("lexer mode {} is not defined", name))
        }
        _ => None,
    };
    match problem {
        Some(message) => Err(rule_error(grammar, rule, message)),
        None => Ok(()),
    }
}

/// Rewrite direct left recursion: alternative `i` of `n` gets precedence `n - i`
fn rewrite_left_recursion(
    grammar: &Grammar,
    rule: &Rule,
    alternatives: Vec<Alternative>,
) -> Result<ParserRuleSpec, GenerationError> {
    let name = rule.name.as_str();
    let is_self = |e: &Element| matches!(e, Element::RuleRef(n) if n == name);

    if !alternatives.iter().any(|alt| alt.elements.first().is_some_and(is_self)) {
        return Ok(ParserRuleSpec::Plain {
            name: name.to_string(),
            alternatives,
        });
    }

    let count = alternatives.len();
    let mut primaries = Vec::new();
    let mut suffixes = Vec::new();

    for (index, mut alt) in alternatives.into_iter().enumerate() {
        let precedence = (count - index) as u32;
        let starts = alt.elements.first().is_some_and(is_self);
        let ends = alt.elements.len() >= 2 && alt.elements.last().is_some_and(is_self);

        if starts && alt.elements.len() == 1 {
            return Err(rule_error(
                grammar,
                rule,
                "alternative consisting solely of a self reference",
            ));
        }

        if ends {
            let operand = if starts && !alt.right_assoc {
                precedence + 1
            } else {
                precedence
            };
            if let Some(last) = alt.elements.last_mut() {
                *last = Element::PrecRef(name.to_string(), operand);
            }
        }

        if starts {
            suffixes.push(SuffixSpec {
                precedence,
                right_assoc: alt.right_assoc,
                elements: alt.elements.split_off(1),
            });
        } else {
            primaries.push(alt);
        }
    }

    if primaries.is_empty() {
        return Err(rule_error(
            grammar,
            rule,
            "left-recursive rule needs at least one non-left-recursive alternative",
        ));
    }

    Ok(ParserRuleSpec::LeftRecursive {
        name: name.to_string(),
        primaries,
        suffixes,
    })
}

fn check_mutual_left_recursion(
    grammar: &Grammar,
    rules: &[ParserRuleSpec],
) -> Result<(), GenerationError> {
    let nullable = nullable_rules(rules);
    let edges: HashMap<&str, BTreeSet<&str>> = rules
        .iter()
        .map(|rule| {
            let mut refs = BTreeSet::new();
            for alt in rule.leading_alternatives() {
                left_edge(&alt.elements, &nullable, &mut refs);
            }
            (rule.name(), refs)
        })
        .collect();

    for rule in rules {
        let mut path = vec![rule.name()];
        if let Some(cycle) = find_cycle(rule.name(), &edges, &mut path, &mut HashSet::new()) {
            return Err(GenerationError::grammar(
                &grammar.name,
                format!(
                    "The following sets of rules are mutually left-recursive [{}]",
                    cycle.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn find_cycle<'a>(
    target: &'a str,
    edges: &HashMap<&'a str, BTreeSet<&'a str>>,
    path: &mut Vec<&'a str>,
    seen: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    let current = *path.last()?;
    for next in edges.get(current).into_iter().flatten() {
        if *next == target {
            return Some(path.iter().map(|s| s.to_string()).collect());
        }
        if seen.insert(*next) {
            path.push(*next);
            if let Some(cycle) = find_cycle(target, edges, path, seen) {
                return Some(cycle);
            }
            path.pop();
        }
    }
    None
}

fn nullable_rules(rules: &[ParserRuleSpec]) -> HashSet<String> {
    let mut nullable = HashSet::new();
    loop {
        let before = nullable.len();
        for rule in rules {
            if rule
                .leading_alternatives()
                .iter()
                .any(|alt| alt.elements.iter().all(|e| element_nullable(e, &nullable)))
            {
                nullable.insert(rule.name().to_string());
            }
        }
        if nullable.len() == before {
            return nullable;
        }
    }
}

fn element_nullable(element: &Element, nullable: &HashSet<String>) -> bool {
    match element {
        Element::RuleRef(name) | Element::PrecRef(name, _) => nullable.contains(name),
        Element::Block(alternatives) => alternatives
            .iter()
            .any(|alt| alt.elements.iter().all(|e| element_nullable(e, nullable))),
        Element::Repeat { element, kind, .. } => {
            *kind != RepeatKind::OneOrMore || element_nullable(element, nullable)
        }
        _ => false,
    }
}

fn left_edge<'a>(elements: &'a [Element], nullable: &HashSet<String>, out: &mut BTreeSet<&'a str>) {
    for element in elements {
        match element {
            Element::RuleRef(name) | Element::PrecRef(name, _) => {
                out.insert(name.as_str());
            }
            Element::Block(alternatives) => {
                for alt in alternatives {
                    left_edge(&alt.elements, nullable, out);
                }
            }
            Element::Repeat { element, .. } => left_edge(std::slice::from_ref(element.as_ref()), nullable, out),
            _ => {}
        }
        if !element_nullable(element, nullable) {
            break;
        }
    }
}

fn is_valid_token_name(name: &str) -> bool {
    is_token_name(name) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
