//! Reduction of the raw parse tree into a compact typed tree.
//!
//! The grammar's anonymous literal, sequence and repetition nodes carry no
//! meaning once parsing succeeded, and neither do the `exp` wrappers and the
//! separating spaces. Reduction removes the empty ones and splices the children
//! of the rest into their parent, so that a list node ends up with exactly one
//! child per element.

use crate::grammar::{ParseNode, Rule};

/// The kind of a [`TreeNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    SExp,
    Vector,
    Number,
    Symbol,
    String,
    /// The `exp` wrapper; only survives as the root
    Exp,
    Space,
    /// Any anonymous grammar node (brackets, sequences, repetitions)
    Structural,
}

impl NodeKind {
    /// Transparent nodes dissolve into their parent during reduction.
    pub fn is_transparent(self) -> bool {
        matches!(self, NodeKind::Exp | NodeKind::Space | NodeKind::Structural)
    }
}

impl From<Rule> for NodeKind {
    fn from(rule: Rule) -> Self {
        match rule {
            Rule::Exp => NodeKind::Exp,
            Rule::Number => NodeKind::Number,
            Rule::Symbol => NodeKind::Symbol,
            Rule::SExp => NodeKind::SExp,
            Rule::Vector => NodeKind::Vector,
            Rule::String => NodeKind::String,
            Rule::Space => NodeKind::Space,
            Rule::Literal | Rule::Sequence | Rule::Repetition => NodeKind::Structural,
        }
    }
}

/// A node of the reduced tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub text: String,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(kind: NodeKind, text: impl Into<String>, children: Vec<TreeNode>) -> Self {
        TreeNode {
            kind,
            text: text.into(),
            children,
        }
    }

    pub fn leaf(kind: NodeKind, text: impl Into<String>) -> Self {
        Self::new(kind, text, Vec::new())
    }
}

/// Reduce a raw parse tree.
///
/// Returns `None` when the node itself is an empty anonymous node. The root of a
/// successful parse is an `exp` node and is kept, so callers can tell a whole
/// program apart from a bare list.
pub fn reduce_tree(node: &ParseNode) -> Option<TreeNode> {
    let kind = NodeKind::from(node.rule);
    if kind == NodeKind::Structural && node.children.is_empty() {
        return None;
    }

    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        let Some(reduced) = reduce_tree(child) else {
            continue;
        };
        if reduced.kind.is_transparent() {
            children.extend(reduced.children);
        } else {
            children.push(reduced);
        }
    }

    Some(TreeNode::new(kind, node.text.clone(), children))
}
