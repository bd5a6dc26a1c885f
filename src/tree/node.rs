use serde::{Deserialize, Serialize};

/// Index of a node inside its [`ParseTree`](super::ParseTree)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Rule {
        name: String,
    },
    Terminal {
        token_type: i32,
        /// Display name of the token type, e.g. `NAME` or `'hello'`
        symbol: String,
        text: String,
        line: u32,
        column: u32,
    },
}

/// Grammar-agnostic parse tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericTreeNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
    /// Character offset where the node's text starts
    pub start: usize,
    /// Character offset one past the node's text
    pub end: usize,
}

impl GenericTreeNode {
    pub fn is_rule(&self) -> bool {
        matches!(self.kind, NodeKind::Rule { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal { .. })
    }

    pub fn rule_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Rule { name } => Some(name),
            NodeKind::Terminal { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Terminal { text, .. } => Some(text),
            NodeKind::Rule { .. } => None,
        }
    }

    /// Rule name for rule nodes, token symbol for terminals
    pub fn label(&self) -> &str {
        match &self.kind {
            NodeKind::Rule { name } => name,
            NodeKind::Terminal { symbol, .. } => symbol,
        }
    }
}
