//! Thompson construction of lexer rule programs.

use super::image::LexInst;
use super::source::{Expr, Located, Pos, Repeat};

/// Resolves `(ref "X")` to the alternatives of a lexer rule or fragment
pub trait FragmentLookup {
    fn alternatives(&self, name: &str) -> Option<&[Vec<Expr>]>;
}

pub struct NfaBuilder<'a> {
    insts: Vec<LexInst>,
    case_insensitive: bool,
    lookup: &'a dyn FragmentLookup,
    /// References currently being inlined
    stack: Vec<String>,
    shortest: bool,
}

/// A compiled rule program
pub struct Program {
    pub insts: Vec<LexInst>,
    pub shortest: bool,
}

impl<'a> NfaBuilder<'a> {
    pub fn new(lookup: &'a dyn FragmentLookup, case_insensitive: bool) -> Self {
        Self {
            insts: Vec::new(),
            case_insensitive,
            lookup,
            stack: Vec::new(),
            shortest: false,
        }
    }

    /// Compile a rule; alternative `i` ends in `Match(i)`
    pub fn compile_rule(mut self, name: &str, alts: &[&[Expr]]) -> Result<Program, Located> {
        self.stack.push(name.to_string());
        let last = alts.len().saturating_sub(1);
        for (index, alt) in alts.iter().enumerate() {
            if index < last {
                let split = self.push(LexInst::Split(0, 0));
                let start = self.pc();
                self.seq(alt)?;
                self.push(LexInst::Match(index as u32));
                let next = self.pc();
                self.insts[split] = LexInst::Split(start, next);
            } else {
                self.seq(alt)?;
                self.push(LexInst::Match(index as u32));
            }
        }
        Ok(Program {
            insts: self.insts,
            shortest: self.shortest,
        })
    }

    fn pc(&self) -> u32 {
        self.insts.len() as u32
    }

    fn push(&mut self, inst: LexInst) -> usize {
        self.insts.push(inst);
        self.insts.len() - 1
    }

    fn seq(&mut self, exprs: &[Expr]) -> Result<(), Located> {
        for expr in exprs {
            self.expr(expr)?;
        }
        Ok(())
    }

    fn choice(&mut self, alts: &[&[Expr]]) -> Result<(), Located> {
        let mut exits = Vec::new();
        let last = alts.len().saturating_sub(1);
        for (index, alt) in alts.iter().enumerate() {
            if index < last {
                let split = self.push(LexInst::Split(0, 0));
                let start = self.pc();
                self.seq(alt)?;
                exits.push(self.push(LexInst::Jump(0)));
                let next = self.pc();
                self.insts[split] = LexInst::Split(start, next);
            } else {
                self.seq(alt)?;
            }
        }
        let end = self.pc();
        for exit in exits {
            self.insts[exit] = LexInst::Jump(end);
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), Located> {
        match expr {
            Expr::Empty => {}
            Expr::Seq(items) => self.seq(items)?,
            Expr::Choice(items) => {
                let alts: Vec<&[Expr]> = items.iter().map(std::slice::from_ref).collect();
                self.choice(&alts)?;
            }
            Expr::Repeat { kind, lazy, body } => {
                if *lazy {
                    self.shortest = true;
                }
                match kind {
                    Repeat::Optional => {
                        let split = self.push(LexInst::Split(0, 0));
                        let start = self.pc();
                        self.expr(body)?;
                        let next = self.pc();
                        self.insts[split] = LexInst::Split(start, next);
                    }
                    Repeat::Star => {
                        let top = self.pc();
                        let split = self.push(LexInst::Split(0, 0));
                        let start = self.pc();
                        self.expr(body)?;
                        self.push(LexInst::Jump(top));
                        let next = self.pc();
                        self.insts[split] = LexInst::Split(start, next);
                    }
                    Repeat::Plus => {
                        let start = self.pc();
                        self.expr(body)?;
                        let next = self.pc() + 1;
                        self.push(LexInst::Split(start, next));
                    }
                }
            }
            Expr::Lit(text, _) => {
                for c in text.chars() {
                    self.push(self.char_inst(c));
                }
            }
            Expr::Set { ranges, negated } => {
                let ranges = if self.case_insensitive {
                    fold_ranges(ranges)
                } else {
                    normalize(ranges.clone())
                };
                self.push(LexInst::Class {
                    ranges,
                    negated: *negated,
                });
            }
            Expr::Any => {
                self.push(LexInst::Any);
            }
            Expr::Ref(name, pos) => self.inline(name, *pos)?,
            Expr::Tok(_, pos) | Expr::NotTok(_, pos) | Expr::Invoke(_, _, pos) => {
                return Err(Located::new(*pos, "parser construct in lexer rule"));
            }
            Expr::Eof => return Err(Located::new(Pos::default(), "EOF in lexer rule")),
        }
        Ok(())
    }

    fn inline(&mut self, name: &str, pos: Pos) -> Result<(), Located> {
        if self.stack.iter().any(|active| active == name) {
            return Err(Located::new(
                pos,
                format!("recursive reference to lexer rule {} is not supported", name),
            ));
        }
        let lookup = self.lookup;
        let alts = lookup
            .alternatives(name)
            .ok_or_else(|| Located::new(pos, format!("cannot find symbol: lexer rule {}", name)))?;
        self.stack.push(name.to_string());
        let alts: Vec<&[Expr]> = alts.iter().map(Vec::as_slice).collect();
        self.choice(&alts)?;
        self.stack.pop();
        Ok(())
    }

    fn char_inst(&self, c: char) -> LexInst {
        if self.case_insensitive {
            let lower = c.to_lowercase().next().unwrap_or(c);
            let upper = c.to_uppercase().next().unwrap_or(c);
            if lower != upper {
                return LexInst::Class {
                    ranges: normalize(vec![(lower as u32, lower as u32), (upper as u32, upper as u32)]),
                    negated: false,
                };
            }
        }
        LexInst::Char(c as u32)
    }
}

/// Sort and merge overlapping or adjacent ranges
pub fn normalize(mut ranges: Vec<(u32, u32)>) -> Vec<(u32, u32)> {
    ranges.sort_unstable();
    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match merged.last_mut() {
            Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Add the other-case variants of every letter in small ranges
fn fold_ranges(ranges: &[(u32, u32)]) -> Vec<(u32, u32)> {
    const FOLD_LIMIT: u32 = 0x400;
    let mut out = ranges.to_vec();
    for &(lo, hi) in ranges {
        if hi - lo > FOLD_LIMIT {
            continue;
        }
        for c in (lo..=hi).filter_map(char::from_u32) {
            for variant in c.to_lowercase().chain(c.to_uppercase()) {
                if variant != c {
                    out.push((variant as u32, variant as u32));
                }
            }
        }
    }
    normalize(out)
}
