use super::{GenericTreeNode, NodeId, NodeKind, ParseTree};
use crate::runtime::{RuleContext, Token};
use std::sync::Arc;

/// Rule-level event delivered to a [`ParseTreeListener`]
#[derive(Debug, Clone, Copy)]
pub struct RuleEvent<'a> {
    pub name: &'a str,
    pub context: &'a RuleContext,
    /// Character span covered by the rule
    pub start: usize,
    pub end: usize,
}

/// Receives strictly nested enter/exit/terminal events during a walk
pub trait ParseTreeListener {
    /// Called once before a walk starts
    fn reset(&mut self) {}
    fn enter_rule(&mut self, event: &RuleEvent<'_>);
    fn exit_rule(&mut self, event: &RuleEvent<'_>);
    fn visit_terminal(&mut self, token: &Token, symbol: &str);
}

/// Decides whether a rule gets its own node
pub type RuleFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Listener that builds a [`ParseTree`] with a push-down stack
#[derive(Clone, Default)]
pub struct DefaultTreeListener {
    filter: Option<RuleFilter>,
    tree: Option<ParseTree>,
    /// One entry per open rule; `None` for rules dropped by the filter
    stack: Vec<Option<NodeId>>,
}

impl DefaultTreeListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only rule nodes accepted by `filter`; the root is always kept
    pub fn with_filter(filter: RuleFilter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    pub fn tree(&self) -> Option<&ParseTree> {
        self.tree.as_ref()
    }

    pub fn take_tree(&mut self) -> Option<ParseTree> {
        self.tree.take()
    }

    fn current(&self) -> Option<NodeId> {
        self.stack.iter().rev().find_map(|entry| *entry)
    }

    fn push_node(&mut self, kind: NodeKind, start: usize, end: usize) -> Option<NodeId> {
        let parent = self.current();
        let tree = self.tree.as_mut()?;
        let id = NodeId(tree.nodes.len());
        tree.nodes.push(GenericTreeNode {
            id,
            parent,
            children: Vec::new(),
            kind,
            start,
            end,
        });
        if let Some(parent) = parent {
            tree.nodes[parent.index()].children.push(id);
        }
        Some(id)
    }
}

impl ParseTreeListener for DefaultTreeListener {
    fn reset(&mut self) {
        self.tree = None;
        self.stack.clear();
    }

    fn enter_rule(&mut self, event: &RuleEvent<'_>) {
        if self.stack.is_empty() {
            self.tree = Some(ParseTree::default());
        }
        let keep = self.stack.is_empty() || self.filter.as_ref().map_or(true, |f| f(event.name));
        let id = if keep {
            let kind = NodeKind::Rule {
                name: event.name.to_string(),
            };
            self.push_node(kind, event.start, event.end)
        } else {
            None
        };
        self.stack.push(id);
    }

    fn exit_rule(&mut self, _event: &RuleEvent<'_>) {
        self.stack.pop();
    }

    fn visit_terminal(&mut self, token: &Token, symbol: &str) {
        let kind = NodeKind::Terminal {
            token_type: token.token_type,
            symbol: symbol.to_string(),
            text: token.text.clone(),
            line: token.line,
            column: token.column,
        };
        self.push_node(kind, token.start, token.end);
    }
}

impl std::fmt::Debug for DefaultTreeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultTreeListener")
            .field("filtered", &self.filter.is_some())
            .field("nodes", &self.tree.as_ref().map(ParseTree::node_count))
            .finish()
    }
}
