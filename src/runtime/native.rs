use super::{SyntaxDiagnostic, Token, Vocabulary};
use std::sync::Arc;

/// Child of a rule context: a nested rule or a token by stream index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeChild {
    Rule(RuleContext),
    Terminal(usize),
}

/// Recognizer-specific tree node produced by the parser runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleContext {
    pub rule_index: usize,
    /// Stream index of the first token
    pub start: usize,
    /// Stream index of the last token, `None` when nothing was consumed
    pub stop: Option<usize>,
    pub children: Vec<NativeChild>,
}

impl RuleContext {
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn rule_children(&self) -> impl Iterator<Item = &RuleContext> {
        self.children.iter().filter_map(|child| match child {
            NativeChild::Rule(ctx) => Some(ctx),
            NativeChild::Terminal(_) => None,
        })
    }
}

// Deep trees would otherwise recurse once per level on drop
impl Drop for RuleContext {
    fn drop(&mut self) {
        let mut pending = nested_rules(&mut self.children);
        while let Some(mut ctx) = pending.pop() {
            pending.extend(nested_rules(&mut ctx.children));
        }
    }
}

fn nested_rules(children: &mut Vec<NativeChild>) -> Vec<RuleContext> {
    children
        .drain(..)
        .filter_map(|child| match child {
            NativeChild::Rule(ctx) => Some(ctx),
            NativeChild::Terminal(_) => None,
        })
        .collect()
}

/// Names needed to interpret a native tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognizerNames {
    pub parser: String,
    pub lexer: String,
    pub rule_names: Vec<String>,
    pub vocabulary: Vocabulary,
}

/// Outcome of one invocation
#[derive(Debug, Clone)]
pub struct NativeParseResult {
    /// Root context, absent when the entry rule failed to match
    pub root: Option<RuleContext>,
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<SyntaxDiagnostic>,
    pub names: Arc<RecognizerNames>,
    pub entry_rule: String,
}

impl NativeParseResult {
    /// A root exists and no diagnostics were reported
    pub fn is_success(&self) -> bool {
        self.root.is_some() && self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn rule_name(&self, index: usize) -> Option<&str> {
        self.names.rule_names.get(index).map(String::as_str)
    }

    pub fn token(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Display name of a token's type
    pub fn symbol(&self, token: &Token) -> String {
        self.names.vocabulary.display_name(token.token_type)
    }

    /// LISP-style rendering: `(rule child ...)` with token text for leaves
    pub fn to_string_tree(&self) -> Option<String> {
        self.root.as_ref().map(|root| {
            let mut out = String::new();
            self.render(root, &mut out);
            out
        })
    }

    fn render(&self, ctx: &RuleContext, out: &mut String) {
        let name = self.rule_name(ctx.rule_index).unwrap_or("?");
        if ctx.children.is_empty() {
            out.push_str(name);
            return;
        }
        out.push('(');
        out.push_str(name);
        for child in &ctx.children {
            out.push(' ');
            match child {
                NativeChild::Rule(nested) => self.render(nested, out),
                NativeChild::Terminal(index) => {
                    out.push_str(self.token(*index).map(|t| t.text.as_str()).unwrap_or("?"))
                }
            }
        }
        out.push(')');
    }
}
