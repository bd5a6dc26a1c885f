//! Lexer runtime: simulates rule NFAs over a character stream.

use super::diagnostics::escape_text;
use super::{
    CharStream, DiagnosticKind, SyntaxDiagnostic, Token, TokenSource, TokenStream, Vocabulary,
    DEFAULT_CHANNEL, EOF,
};
use crate::compiler::image::{LexInst, LexerAction, LexerHeader, LexerRuleImage};
use crate::loader::LoadError;

struct LexRule {
    name: String,
    token_type: i32,
    mode: u32,
    shortest: bool,
    program: Vec<LexInst>,
    actions: Vec<Vec<LexerAction>>,
}

/// A loaded lexer unit
pub struct LexerProgram {
    name: String,
    grammar: String,
    modes: Vec<String>,
    channels: Vec<String>,
    vocabulary: Vocabulary,
    rules: Vec<LexRule>,
}

impl LexerProgram {
    /// Assemble a lexer from its header and rule images, in priority order
    pub fn from_images(header: LexerHeader, rules: Vec<LexerRuleImage>) -> Result<Self, LoadError> {
        let mode_count = header.modes.len() as u32;
        let mut loaded = Vec::with_capacity(rules.len());
        for rule in rules {
            let corrupt = |reason: String| LoadError::Corrupt {
                unit: format!("{}${}", header.name, rule.name),
                reason,
            };
            if rule.mode >= mode_count {
                return Err(corrupt(format!("mode {} out of range", rule.mode)));
            }
            let len = rule.program.len() as u32;
            for inst in &rule.program {
                let in_range = match inst {
                    LexInst::Split(a, b) => *a < len && *b < len,
                    LexInst::Jump(a) => *a < len,
                    LexInst::Match(alt) => (*alt as usize) < rule.actions.len(),
                    _ => true,
                };
                if !in_range {
                    return Err(corrupt(format!("instruction {:?} out of range", inst)));
                }
            }
            for action in rule.actions.iter().flatten() {
                if let LexerAction::Mode(m) | LexerAction::PushMode(m) = action {
                    if *m >= mode_count {
                        return Err(corrupt(format!("mode {} out of range", m)));
                    }
                }
            }
            loaded.push(LexRule {
                name: rule.name,
                token_type: rule.token_type,
                mode: rule.mode,
                shortest: rule.shortest,
                program: rule.program,
                actions: rule.actions,
            });
        }

        Ok(Self {
            name: header.name,
            grammar: header.grammar,
            modes: header.modes,
            channels: header.channels,
            vocabulary: Vocabulary::new(header.vocabulary),
            rules: loaded,
        })
    }

    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    pub fn modes(&self) -> &[String] {
        &self.modes
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    /// Run one rule at `start`; returns the end offset and matching alternative
    fn run(&self, rule: &LexRule, input: &CharStream, start: usize) -> Option<(usize, u32)> {
        let program = &rule.program;
        let mut current = PcSet::new(program.len());
        let mut next = PcSet::new(program.len());
        let mut best = None;

        let mut matched = None;
        closure(program, 0, &mut current, &mut matched);
        if let Some(alt) = matched {
            best = Some((start, alt));
        }

        let mut pos = start;
        while !current.is_empty() {
            let Some(c) = input.lookahead(pos) else {
                break;
            };
            let code = c as u32;
            next.clear();
            let mut matched = None;
            for &pc in current.iter() {
                let accepts = match &program[pc] {
                    LexInst::Char(expected) => *expected == code,
                    LexInst::Class { ranges, negated } => {
                        ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&code)) != *negated
                    }
                    LexInst::Any => true,
                    _ => false,
                };
                if accepts {
                    closure(program, pc + 1, &mut next, &mut matched);
                }
            }
            pos += 1;
            if let Some(alt) = matched {
                best = Some((pos, alt));
                if rule.shortest {
                    return best;
                }
            }
            std::mem::swap(&mut current, &mut next);
        }
        best
    }
}

/// Follow epsilon edges from `pc`, recording the best (lowest) matching alternative
fn closure(program: &[LexInst], pc: usize, set: &mut PcSet, matched: &mut Option<u32>) {
    let mut stack = vec![pc];
    while let Some(pc) = stack.pop() {
        if pc >= program.len() || !set.insert(pc) {
            continue;
        }
        match &program[pc] {
            LexInst::Split(a, b) => {
                stack.push(*b as usize);
                stack.push(*a as usize);
            }
            LexInst::Jump(target) => stack.push(*target as usize),
            LexInst::Match(alt) => {
                *matched = Some(matched.map_or(*alt, |m| m.min(*alt)));
            }
            _ => {}
        }
    }
}

/// Sparse set of program counters with insertion order
struct PcSet {
    dense: Vec<usize>,
    member: Vec<bool>,
}

impl PcSet {
    fn new(capacity: usize) -> Self {
        Self {
            dense: Vec::with_capacity(capacity),
            member: vec![false; capacity],
        }
    }

    fn insert(&mut self, pc: usize) -> bool {
        if self.member[pc] {
            return false;
        }
        self.member[pc] = true;
        self.dense.push(pc);
        true
    }

    fn clear(&mut self) {
        for pc in self.dense.drain(..) {
            self.member[pc] = false;
        }
    }

    fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.dense.iter()
    }
}

/// Tracks line and column while advancing through the input
#[derive(Clone, Copy)]
struct Position {
    offset: usize,
    line: u32,
    column: u32,
}

impl Position {
    fn advance_to(&mut self, input: &CharStream, end: usize) {
        while self.offset < end {
            if input.char_at(self.offset) == Some('\n') {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
            self.offset += 1;
        }
    }
}

impl TokenSource for LexerProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn tokenize(&self, input: &CharStream) -> TokenStream {
        let mut stream = TokenStream::default();
        let mut here = Position {
            offset: 0,
            line: 1,
            column: 0,
        };
        let mut mode = 0u32;
        let mut mode_stack = Vec::new();
        // Start of a token extended by `more`
        let mut pending: Option<Position> = None;

        while here.offset < input.len() {
            let mut best: Option<(usize, usize, u32)> = None;
            for (index, rule) in self.rules.iter().enumerate().filter(|(_, r)| r.mode == mode) {
                if let Some((end, alt)) = self.run(rule, input, here.offset) {
                    let longer = best.map_or(true, |(best_end, _, _)| end > best_end);
                    if end > here.offset && longer {
                        best = Some((end, index, alt));
                    }
                }
            }

            let Some((end, index, alt)) = best else {
                let start = pending.take().unwrap_or(here);
                let text = input.slice(start.offset, here.offset + 1);
                stream.diagnostics.push(SyntaxDiagnostic {
                    kind: DiagnosticKind::TokenRecognition,
                    line: start.line,
                    column: start.column,
                    message: format!("token recognition error at: '{}'", escape_text(&text)),
                });
                here.advance_to(input, here.offset + 1);
                continue;
            };

            let rule = &self.rules[index];
            let start = pending.take().unwrap_or(here);
            here.advance_to(input, end);

            let mut token_type = rule.token_type;
            let mut channel = DEFAULT_CHANNEL;
            let mut emit = true;
            let mut more = false;
            for action in &rule.actions[alt as usize] {
                match action {
                    LexerAction::Skip => emit = false,
                    LexerAction::More => more = true,
                    LexerAction::Channel(c) => channel = *c,
                    LexerAction::Type(t) => token_type = *t,
                    LexerAction::Mode(m) => mode = *m,
                    LexerAction::PushMode(m) => {
                        mode_stack.push(mode);
                        mode = *m;
                    }
                    LexerAction::PopMode => mode = mode_stack.pop().unwrap_or(mode),
                }
            }

            if more {
                pending = Some(start);
            } else if emit {
                let index = stream.tokens.len();
                stream.tokens.push(Token {
                    token_type,
                    channel,
                    text: input.slice(start.offset, end),
                    start: start.offset,
                    end,
                    line: start.line,
                    column: start.column,
                    index,
                });
            }
        }

        let index = stream.tokens.len();
        stream.tokens.push(Token {
            token_type: EOF,
            channel: DEFAULT_CHANNEL,
            text: "<EOF>".to_string(),
            start: input.len(),
            end: input.len(),
            line: here.line,
            column: here.column,
            index,
        });
        stream
    }
}
