//! Conversion of the reduced tree into program values.

use crate::ast::{List, NumberType, Seq, Symbol, Value, Vector};
use crate::reduce::{NodeKind, TreeNode};
use crate::{Error, ParseError, ParseErrorKind};

/// Build a List from the children of `node`, preserving source order.
///
/// When `node` is the `exp` root of a whole parse, the single element is returned
/// on its own, so `42` converts to a number rather than a one-element list.
pub fn tree_to_list(node: &TreeNode) -> Result<Value, Error> {
    // cons prepends, so walk backwards
    let mut list = List::new();
    for child in node.children.iter().rev() {
        list = list.cons(node_to_value(child)?);
    }

    if node.kind == NodeKind::Exp {
        return list.first().cloned().ok_or_else(|| {
            ParseError::from_message(ParseErrorKind::Incomplete, "Empty expression").into()
        });
    }
    Ok(Value::List(list))
}

/// Build a Vector from the children of `node`, preserving source order.
pub fn tree_to_vector(node: &TreeNode) -> Result<Value, Error> {
    node.children
        .iter()
        .map(node_to_value)
        .collect::<Result<Vector, _>>()
        .map(Value::Vector)
}

fn node_to_value(node: &TreeNode) -> Result<Value, Error> {
    match node.kind {
        NodeKind::SExp => tree_to_list(node),
        NodeKind::Vector => tree_to_vector(node),
        NodeKind::Number => parse_number(&node.text),
        NodeKind::Symbol => Ok(Value::Symbol(Symbol::new(&node.text))),
        NodeKind::String => unescape_string(&node.text).map(Value::String),
        NodeKind::Exp | NodeKind::Space | NodeKind::Structural => {
            Err(ParseError::from_message(
                ParseErrorKind::InvalidSyntax,
                format!("Unexpected {:?} node '{}' in reduced tree", node.kind, node.text),
            )
            .into())
        }
    }
}

fn parse_number(text: &str) -> Result<Value, Error> {
    text.parse::<NumberType>().map(Value::Number).map_err(|_| {
        ParseError::from_message(
            ParseErrorKind::ImplementationLimit,
            format!("Integer literal '{text}' does not fit in a 64-bit integer"),
        )
        .into()
    })
}

/// Strip the surrounding quotes and resolve escape sequences. A backslash
/// before any other character is kept as written.
fn unescape_string(text: &str) -> Result<String, Error> {
    let invalid = |message: String| -> Error {
        ParseError::from_message(ParseErrorKind::InvalidSyntax, message).into()
    };

    let body = text
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| invalid(format!("Malformed string literal {text}")))?;

    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => return Err(invalid("Unterminated escape sequence".to_owned())),
        }
    }
    Ok(result)
}
