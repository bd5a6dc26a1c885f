//! Parser runtime: a memoizing interpreter over rule images.
//!
//! Every expression yields each position it can end at, most preferred
//! first: earlier alternatives, more iterations of a greedy loop and fewer
//! of a non-greedy one. A sequence tries all of them against the items that
//! follow, so an earlier decision is revisited when the rest of the rule
//! fails. Rules rewritten for left recursion grow their result by looping
//! over suffix alternatives whose precedence is at least the precedence the
//! rule was invoked with.

use super::diagnostics::escape_text;
use super::{
    DiagnosticKind, NativeChild, NativeParseResult, ParsingError, RecognizerNames, RuleContext,
    RuleInvoker, SyntaxDiagnostic, Token, TokenStream, Vocabulary, EOF,
};
use crate::compiler::image::{ParseExpr, ParserHeader, ParserRuleImage, RuleBody, Suffix};
use crate::loader::LoadError;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use tracing::trace;

/// Rule nesting allowed in a single run unless the request says otherwise
pub const DEFAULT_MAX_RULE_DEPTH: usize = 8_192;

/// Stack reserved on the parse thread per level of rule nesting
const STACK_PER_RULE: usize = 16 * 1024;
const MIN_PARSE_STACK: usize = 8 * 1024 * 1024;
const MAX_PARSE_STACK: usize = 1024 * 1024 * 1024;

/// A loaded parser unit
pub struct ParserProgram {
    name: String,
    grammar: String,
    vocabulary_unit: String,
    rules: Vec<RuleBody>,
    start_rule: usize,
    names: Arc<RecognizerNames>,
}

impl ParserProgram {
    /// Assemble a parser from its header, its lexer's vocabulary and its rule images
    pub fn from_images(
        header: ParserHeader,
        vocabulary: Vocabulary,
        images: Vec<ParserRuleImage>,
    ) -> Result<Self, LoadError> {
        let corrupt = |reason: String| LoadError::Corrupt {
            unit: header.name.clone(),
            reason,
        };
        let count = header.rule_names.len();
        if header.start_rule as usize >= count {
            return Err(corrupt(format!("start rule {} out of range", header.start_rule)));
        }

        let mut slots: Vec<Option<RuleBody>> = vec![None; count];
        for image in images {
            let index = image.index as usize;
            if header.rule_names.get(index) != Some(&image.name) {
                return Err(corrupt(format!("rule {} does not match index {}", image.name, index)));
            }
            let mut refs = Vec::new();
            match &image.body {
                RuleBody::Plain(body) => body.rule_refs(&mut refs),
                RuleBody::LeftRecursive { primary, suffixes } => {
                    primary.rule_refs(&mut refs);
                    suffixes.iter().for_each(|s| s.body.rule_refs(&mut refs));
                }
            }
            if let Some(bad) = refs.iter().find(|r| **r as usize >= count) {
                return Err(corrupt(format!("rule {} references unknown rule {}", image.name, bad)));
            }
            slots[index] = Some(image.body);
        }
        let rules = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or_else(|| corrupt(format!("rule {} is missing", header.rule_names[i]))))
            .collect::<Result<Vec<_>, _>>()?;

        let names = Arc::new(RecognizerNames {
            parser: header.name.clone(),
            lexer: header.vocabulary_unit.clone(),
            rule_names: header.rule_names,
            vocabulary,
        });
        Ok(Self {
            name: header.name,
            grammar: header.grammar,
            vocabulary_unit: header.vocabulary_unit,
            rules,
            start_rule: header.start_rule as usize,
            names,
        })
    }

    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    pub fn rule_index(&self, rule: &str) -> Option<usize> {
        self.names.rule_names.iter().position(|name| name == rule)
    }
}

impl RuleInvoker for ParserProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn vocabulary_unit(&self) -> &str {
        &self.vocabulary_unit
    }

    fn rule_names(&self) -> &[String] {
        &self.names.rule_names
    }

    fn default_rule(&self) -> &str {
        &self.names.rule_names[self.start_rule]
    }

    fn parse_rule(
        &self,
        rule: &str,
        stream: TokenStream,
        max_depth: usize,
    ) -> Result<NativeParseResult, ParsingError> {
        let index = self.rule_index(rule).ok_or_else(|| ParsingError::UnknownEntryRule {
            parser: self.name.clone(),
            rule: rule.to_string(),
        })?;

        // The interpreter recurses once per rule level, so the thread gets a
        // stack sized for the depth it is allowed to reach
        let max_depth = max_depth.clamp(1, MAX_PARSE_STACK / STACK_PER_RULE);
        let stack = (max_depth * STACK_PER_RULE).max(MIN_PARSE_STACK);

        let TokenStream { tokens, mut diagnostics } = stream;
        let outcome = thread::scope(|scope| {
            thread::Builder::new()
                .name(format!("parse-{}", self.name))
                .stack_size(stack)
                .spawn_scoped(scope, || self.run(index, &tokens, max_depth))
                .map(|handle| handle.join())
        });
        let (root, failure) = match outcome {
            Ok(Ok(result)) => result?,
            Ok(Err(panic)) => std::panic::resume_unwind(panic),
            Err(source) => return Err(ParsingError::ParseThread(source)),
        };
        diagnostics.extend(failure);

        Ok(NativeParseResult {
            root,
            tokens,
            diagnostics,
            names: Arc::clone(&self.names),
            entry_rule: rule.to_string(),
        })
    }
}

impl ParserProgram {
    /// Parse from the first token; the failure is reported when no root matched
    fn run(
        &self,
        rule: usize,
        tokens: &[Token],
        max_depth: usize,
    ) -> Result<(Option<RuleContext>, Option<SyntaxDiagnostic>), ParsingError> {
        let mut state = ParseState {
            program: self,
            tokens,
            visible: TokenStream::visible_indices(tokens),
            memo: HashMap::new(),
            nodes: Vec::new(),
            depth: 0,
            max_depth,
            furthest: 0,
            expected: BTreeSet::new(),
        };

        let results = state.invoke(rule as u32, 0, 0)?;
        let root = results.first().and_then(|&(_, node)| state.build(node));
        trace!(
            "parsed {} with {}: {} token(s), {} memo entries, {} node(s)",
            self.names.rule_names[rule],
            self.name,
            tokens.len(),
            state.memo.len(),
            state.nodes.len()
        );
        let failure = root.is_none().then(|| state.failure());
        Ok((root, failure))
    }
}

type NodeId = usize;

#[derive(Debug, Clone, Copy)]
enum Child {
    Rule(NodeId),
    Terminal(usize),
}

/// Children collected so far; branches that diverge later share their prefix
#[derive(Default, Clone)]
struct Chain(Option<Rc<Link>>);

struct Link {
    child: Child,
    prev: Chain,
}

impl Chain {
    fn push(&self, child: Child) -> Chain {
        Chain(Some(Rc::new(Link {
            child,
            prev: self.clone(),
        })))
    }

    fn to_vec(&self) -> Vec<Child> {
        let mut children = Vec::new();
        let mut cursor = &self.0;
        while let Some(link) = cursor {
            children.push(link.child);
            cursor = &link.prev.0;
        }
        children.reverse();
        children
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        let mut next = self.0.take();
        while let Some(link) = next {
            next = match Rc::try_unwrap(link) {
                Ok(mut link) => link.prev.0.take(),
                Err(_) => None,
            };
        }
    }
}

/// One way an expression can match: where it ends and what it matched
#[derive(Clone)]
struct Branch {
    end: usize,
    children: Chain,
}

/// Branches in preference order, at most one per end position
#[derive(Default)]
struct Branches {
    items: Vec<Branch>,
    ends: HashSet<usize>,
}

impl Branches {
    fn add(&mut self, branch: Branch) {
        if self.ends.insert(branch.end) {
            self.items.push(branch);
        }
    }
}

/// A matched rule, kept by id until the winning tree is built
struct Node {
    rule: u32,
    start: usize,
    end: usize,
    children: Vec<Child>,
}

/// Loop state while following one chain of iterations depth-first
struct Step<T> {
    at: T,
    next: std::vec::IntoIter<T>,
}

struct Frame {
    node: NodeId,
    next: usize,
    children: Vec<NativeChild>,
}

type Memo = HashMap<(u32, u32, usize), Rc<[(usize, NodeId)]>>;

struct ParseState<'a> {
    program: &'a ParserProgram,
    tokens: &'a [Token],
    /// Stream indices of default-channel tokens; the last one is EOF
    visible: Vec<usize>,
    memo: Memo,
    nodes: Vec<Node>,
    depth: usize,
    max_depth: usize,
    furthest: usize,
    expected: BTreeSet<i32>,
}

impl<'a> ParseState<'a> {
    fn token_at(&self, pos: usize) -> Option<&'a Token> {
        let tokens = self.tokens;
        self.visible.get(pos).map(|&i| &tokens[i])
    }

    fn context(&self, rule: u32, start: usize, end: usize, children: Vec<NativeChild>) -> RuleContext {
        let last = self.visible.len().saturating_sub(1);
        let start_index = self.visible.get(start.min(last)).copied().unwrap_or(0);
        let stop = (end > start).then(|| self.visible[end - 1]);
        RuleContext {
            rule_index: rule as usize,
            start: start_index,
            stop,
            children,
        }
    }

    fn node(&mut self, rule: u32, start: usize, branch: &Branch) -> NodeId {
        self.nodes.push(Node {
            rule,
            start,
            end: branch.end,
            children: branch.children.to_vec(),
        });
        self.nodes.len() - 1
    }

    /// Every way `rule` matches at `pos`, most preferred first
    fn invoke(&mut self, rule: u32, precedence: u32, pos: usize) -> Result<Rc<[(usize, NodeId)]>, ParsingError> {
        let key = (rule, precedence, pos);
        if let Some(hit) = self.memo.get(&key) {
            return Ok(Rc::clone(hit));
        }
        // Seeding with a failure stops unguarded left recursion
        self.memo.insert(key, Rc::from(Vec::new()));

        if self.depth >= self.max_depth {
            return Err(ParsingError::RecursionLimit {
                rule: self.program.names.rule_names[rule as usize].clone(),
                limit: self.max_depth,
            });
        }
        self.depth += 1;

        let program = self.program;
        let results: Vec<(usize, NodeId)> = match &program.rules[rule as usize] {
            RuleBody::Plain(body) => {
                let branches = self.eval(body, pos, Chain::default())?;
                branches
                    .iter()
                    .map(|branch| (branch.end, self.node(rule, pos, branch)))
                    .collect()
            }
            RuleBody::LeftRecursive { primary, suffixes } => {
                self.grow(rule, precedence, primary, suffixes, pos)?
            }
        };

        self.depth -= 1;
        let results: Rc<[(usize, NodeId)]> = Rc::from(results);
        self.memo.insert(key, Rc::clone(&results));
        Ok(results)
    }

    /// Extend each primary match with suffixes, longest growth first
    fn grow(
        &mut self,
        rule: u32,
        precedence: u32,
        primary: &ParseExpr,
        suffixes: &[Suffix],
        pos: usize,
    ) -> Result<Vec<(usize, NodeId)>, ParsingError> {
        let branches = self.eval(primary, pos, Chain::default())?;
        let seeds: Vec<(usize, NodeId)> = branches
            .iter()
            .map(|branch| (branch.end, self.node(rule, pos, branch)))
            .collect();

        let mut results = Vec::new();
        // A second visit to an end can only reach ends already produced
        let mut expanded = HashSet::new();
        for seed in seeds {
            if !expanded.insert(seed.0) {
                continue;
            }
            let next = self.extensions(rule, precedence, suffixes, pos, seed)?;
            let mut stack = vec![Step { at: seed, next: next.into_iter() }];
            while let Some(top) = stack.last_mut() {
                match top.next.next() {
                    Some(step) => {
                        if expanded.insert(step.0) {
                            let next = self.extensions(rule, precedence, suffixes, pos, step)?;
                            stack.push(Step { at: step, next: next.into_iter() });
                        }
                    }
                    None => {
                        if let Some(done) = stack.pop() {
                            results.push(done.at);
                        }
                    }
                }
            }
        }
        Ok(results)
    }

    /// Matches one suffix longer than `(end, node)`
    fn extensions(
        &mut self,
        rule: u32,
        precedence: u32,
        suffixes: &[Suffix],
        start: usize,
        (end, node): (usize, NodeId),
    ) -> Result<Vec<(usize, NodeId)>, ParsingError> {
        let base = Chain::default().push(Child::Rule(node));
        let mut grown = Vec::new();
        for suffix in suffixes.iter().filter(|s| s.precedence >= precedence) {
            for branch in self.eval(&suffix.body, end, base.clone())? {
                if branch.end > end {
                    grown.push((branch.end, self.node(rule, start, &branch)));
                }
            }
        }
        Ok(grown)
    }

    /// Match `expr` at `pos`, appending to `base`
    fn eval(&mut self, expr: &ParseExpr, pos: usize, base: Chain) -> Result<Vec<Branch>, ParsingError> {
        Ok(match expr {
            ParseExpr::Empty => vec![Branch { end: pos, children: base }],
            ParseExpr::Token(expected) => self.match_token(pos, base, Some(*expected), |t| t == *expected),
            ParseExpr::NotTokens(excluded) => {
                self.match_token(pos, base, None, |t| t != EOF && !excluded.contains(&t))
            }
            ParseExpr::AnyToken => self.match_token(pos, base, None, |t| t != EOF),
            ParseExpr::Rule { index, precedence } => self
                .invoke(*index, *precedence, pos)?
                .iter()
                .map(|&(end, node)| Branch {
                    end,
                    children: base.push(Child::Rule(node)),
                })
                .collect(),
            ParseExpr::Seq(items) => self.eval_seq(items, pos, base)?,
            ParseExpr::Choice(alternatives) => {
                let mut out = Branches::default();
                for alternative in alternatives {
                    for branch in self.eval(alternative, pos, base.clone())? {
                        out.add(branch);
                    }
                }
                out.items
            }
            ParseExpr::Optional { body, greedy } => {
                let mut out = Branches::default();
                if !*greedy {
                    out.add(Branch { end: pos, children: base.clone() });
                }
                for branch in self.eval(body, pos, base.clone())? {
                    out.add(branch);
                }
                out.add(Branch { end: pos, children: base });
                out.items
            }
            ParseExpr::Star { body, greedy } => {
                self.repeat(body, vec![Branch { end: pos, children: base }], *greedy)?
            }
            ParseExpr::Plus { body, greedy } => {
                let first = self.eval(body, pos, base)?;
                self.repeat(body, first, *greedy)?
            }
        })
    }

    fn eval_seq(&mut self, items: &[ParseExpr], pos: usize, base: Chain) -> Result<Vec<Branch>, ParsingError> {
        let mut states = vec![Branch { end: pos, children: base }];
        for item in items {
            let mut next = Branches::default();
            for state in states {
                for branch in self.eval(item, state.end, state.children.clone())? {
                    next.add(branch);
                }
            }
            if next.items.is_empty() {
                return Ok(Vec::new());
            }
            states = next.items;
        }
        Ok(states)
    }

    /// Further iterations of `body` after each seed; greedy loops prefer more
    fn repeat(&mut self, body: &ParseExpr, seeds: Vec<Branch>, greedy: bool) -> Result<Vec<Branch>, ParsingError> {
        let mut out = Branches::default();
        let mut expanded = HashSet::new();
        for seed in seeds {
            if !expanded.insert(seed.end) {
                continue;
            }
            let next = self.iterate(body, &seed)?;
            if !greedy {
                out.add(seed.clone());
            }
            let mut stack = vec![Step { at: seed, next: next.into_iter() }];
            while let Some(top) = stack.last_mut() {
                match top.next.next() {
                    Some(step) => {
                        if expanded.insert(step.end) {
                            let next = self.iterate(body, &step)?;
                            if !greedy {
                                out.add(step.clone());
                            }
                            stack.push(Step { at: step, next: next.into_iter() });
                        }
                    }
                    None => {
                        if let Some(done) = stack.pop() {
                            if greedy {
                                out.add(done.at);
                            }
                        }
                    }
                }
            }
        }
        Ok(out.items)
    }

    /// One more iteration of `body`; iterations that consume nothing end the loop
    fn iterate(&mut self, body: &ParseExpr, from: &Branch) -> Result<Vec<Branch>, ParsingError> {
        let branches = self.eval(body, from.end, from.children.clone())?;
        Ok(branches.into_iter().filter(|branch| branch.end > from.end).collect())
    }

    fn match_token(
        &mut self,
        pos: usize,
        base: Chain,
        expected: Option<i32>,
        accept: impl Fn(i32) -> bool,
    ) -> Vec<Branch> {
        let Some(token) = self.token_at(pos) else {
            return Vec::new();
        };
        if accept(token.token_type) {
            return vec![Branch {
                end: pos + 1,
                children: base.push(Child::Terminal(token.index)),
            }];
        }
        if pos > self.furthest {
            self.furthest = pos;
            self.expected.clear();
        }
        if pos == self.furthest {
            self.expected.extend(expected);
        }
        Vec::new()
    }

    /// Turn a node and everything below it into a native context
    fn build(&self, root: NodeId) -> Option<RuleContext> {
        let mut stack = vec![Frame {
            node: root,
            next: 0,
            children: Vec::new(),
        }];
        while let Some(mut frame) = stack.pop() {
            let node = &self.nodes[frame.node];
            if let Some(child) = node.children.get(frame.next).copied() {
                frame.next += 1;
                match child {
                    Child::Terminal(index) => {
                        frame.children.push(NativeChild::Terminal(index));
                        stack.push(frame);
                    }
                    Child::Rule(id) => {
                        stack.push(frame);
                        stack.push(Frame {
                            node: id,
                            next: 0,
                            children: Vec::new(),
                        });
                    }
                }
                continue;
            }
            let ctx = self.context(node.rule, node.start, node.end, frame.children);
            match stack.last_mut() {
                Some(parent) => parent.children.push(NativeChild::Rule(ctx)),
                None => return Some(ctx),
            }
        }
        None
    }

    /// Diagnostic for the furthest point the parse could not get past
    fn failure(&self) -> SyntaxDiagnostic {
        let last = self.visible.len().saturating_sub(1);
        let offending = self.token_at(self.furthest.min(last));
        let (line, column, text) = offending
            .map(|t| (t.line, t.column, escape_text(&t.text)))
            .unwrap_or((1, 0, "<EOF>".to_string()));

        let vocabulary = &self.program.names.vocabulary;
        let names: Vec<String> = self.expected.iter().map(|t| vocabulary.display_name(*t)).collect();
        let (kind, message) = match names.as_slice() {
            [] => (
                DiagnosticKind::NoViableAlternative,
                format!("no viable alternative at input '{}'", text),
            ),
            [single] => (
                DiagnosticKind::MismatchedInput,
                format!("mismatched input '{}' expecting {}", text, single),
            ),
            many => (
                DiagnosticKind::MismatchedInput,
                format!("mismatched input '{}' expecting {{{}}}", text, many.join(", ")),
            ),
        };
        SyntaxDiagnostic {
            kind,
            line,
            column,
            message,
        }
    }
}
