use super::{DefaultTreeListener, GenericTreeNode, NodeId, NodeKind, ParseTreeWalker};
use crate::runtime::NativeParseResult;
use serde_json::{json, Value};
use std::fmt::Write;

/// Arena of generic nodes; node 0 is the root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseTree {
    pub(super) nodes: Vec<GenericTreeNode>,
}

impl ParseTree {
    /// Build the full tree for a native result
    pub fn from_result(result: &NativeParseResult) -> Option<Self> {
        let mut listener = DefaultTreeListener::new();
        ParseTreeWalker::walk(&mut listener, result);
        listener.take_tree()
    }

    pub fn root(&self) -> Option<&GenericTreeNode> {
        self.nodes.first()
    }

    pub fn node(&self, id: NodeId) -> Option<&GenericTreeNode> {
        self.nodes.get(id.index())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Root without children: the entry rule matched nothing
    pub fn is_degenerate(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Depth-first, pre-order
    pub fn nodes(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: self.root().map(|root| vec![root.id]).unwrap_or_default(),
        }
    }

    /// All rule nodes named `rule`, in tree order
    pub fn find_by_rule(&self, rule: &str) -> Vec<&GenericTreeNode> {
        self.nodes().filter(|node| node.rule_name() == Some(rule)).collect()
    }

    /// Terminal nodes in input order
    pub fn terminals(&self) -> Vec<&GenericTreeNode> {
        self.nodes().filter(|node| node.is_terminal()).collect()
    }

    pub fn children(&self, id: NodeId) -> Vec<&GenericTreeNode> {
        self.node(id)
            .map(|node| node.children.iter().filter_map(|c| self.node(*c)).collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<&GenericTreeNode> {
        self.node(id)?.parent.and_then(|p| self.node(p))
    }

    /// Copy of the tree rooted at `id`, renumbered from 0
    pub fn subtree(&self, id: NodeId) -> Option<ParseTree> {
        let start = self.node(id)?;
        let mut nodes: Vec<GenericTreeNode> = Vec::new();
        let mut mapping = std::collections::HashMap::new();
        let walk = Preorder {
            tree: self,
            stack: vec![start.id],
        };
        for node in walk {
            let new_id = NodeId(nodes.len());
            mapping.insert(node.id, new_id);
            let parent = if node.id == id {
                None
            } else {
                node.parent.and_then(|p| mapping.get(&p).copied())
            };
            if let Some(parent) = parent {
                nodes[parent.index()].children.push(new_id);
            }
            nodes.push(GenericTreeNode {
                id: new_id,
                parent,
                children: Vec::new(),
                kind: node.kind.clone(),
                start: node.start,
                end: node.end,
            });
        }
        Some(ParseTree { nodes })
    }

    /// Graphviz rendering; edges go parent to child
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph parsetree {\n");
        out.push_str("  node [fontname=\"monospace\"];\n");
        for node in self.nodes() {
            let (label, shape) = match &node.kind {
                NodeKind::Rule { name } => (name.clone(), "ellipse"),
                NodeKind::Terminal { symbol, text, .. } => (format!("{}\n{}", symbol, text), "box"),
            };
            let _ = writeln!(
                out,
                "  n{} [label=\"{}\", shape={}];",
                node.id.index(),
                escape_dot(&label),
                shape
            );
        }
        for node in self.nodes() {
            for child in &node.children {
                let _ = writeln!(out, "  n{} -> n{};", node.id.index(), child.index());
            }
        }
        out.push_str("}\n");
        out
    }

    /// Nested JSON rendering
    pub fn to_json(&self) -> Value {
        self.root().map_or(Value::Null, |root| self.json_of(root))
    }

    fn json_of(&self, node: &GenericTreeNode) -> Value {
        match &node.kind {
            NodeKind::Rule { name } => json!({
                "rule": name,
                "start": node.start,
                "end": node.end,
                "children": node
                    .children
                    .iter()
                    .filter_map(|c| self.node(*c))
                    .map(|child| self.json_of(child))
                    .collect::<Vec<_>>(),
            }),
            NodeKind::Terminal {
                token_type,
                symbol,
                text,
                line,
                column,
            } => json!({
                "token": symbol,
                "type": token_type,
                "text": text,
                "line": line,
                "column": column,
                "start": node.start,
                "end": node.end,
            }),
        }
    }

    /// LISP-style rendering: `(rule child ...)` with token text for leaves
    pub fn to_string_tree(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root() {
            self.render(root, &mut out);
        }
        out
    }

    fn render(&self, node: &GenericTreeNode, out: &mut String) {
        match &node.kind {
            NodeKind::Terminal { text, .. } => out.push_str(text),
            NodeKind::Rule { name } if node.children.is_empty() => out.push_str(name),
            NodeKind::Rule { name } => {
                out.push('(');
                out.push_str(name);
                for child in node.children.iter().filter_map(|c| self.node(*c)) {
                    out.push(' ');
                    self.render(child, out);
                }
                out.push(')');
            }
        }
    }
}

fn escape_dot(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Pre-order iterator over a [`ParseTree`]
pub struct Preorder<'a> {
    tree: &'a ParseTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a GenericTreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id)?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
