//! Grammar-agnostic parse trees built from native recognizer results.

mod listener;
mod node;
mod parse_tree;
mod walker;

#[cfg(test)]
mod tests;

pub use listener::{DefaultTreeListener, ParseTreeListener, RuleEvent, RuleFilter};
pub use node::{GenericTreeNode, NodeId, NodeKind};
pub use parse_tree::{ParseTree, Preorder};
pub use walker::ParseTreeWalker;
