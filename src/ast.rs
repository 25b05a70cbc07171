//! This module defines the value model shared by the parser output and the evaluator.
//! The main enum, [`Value`], covers integers, strings, booleans, symbols, the two
//! collection types ([`List`] and [`Vector`]), builtin operations and closures.
//!
//! [`List`] is an immutable singly-linked cons chain with structural sharing: `cons`
//! allocates a new node in front of the existing chain and never touches it. The
//! empty list is the chain terminator, not a node. [`Vector`] is an ordered sequence
//! whose `cons` appends, also returning a new value. Both implement [`Seq`].
//!
//! Helper functions such as [`val`], [`sym`], [`list`] and [`vector`] are provided for
//! convenient construction in code and tests.

use std::fmt;
use std::iter::FusedIterator;
use std::rc::Rc;

use crate::builtinops::{BuiltinOp, OpKind};
use crate::evaluator::Environment;
use crate::stack::ensure_sufficient_stack;

/// Type alias for number values in interpreter
pub type NumberType = i64;

/// An identifier. Two symbols are equal iff their names are equal; ordering is
/// lexicographic by name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(name: impl AsRef<str>) -> Self {
        Symbol(Rc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

/// The shared minimal interface of the two collection types.
pub trait Seq: Sized {
    /// The first element, or `None` when empty
    fn first(&self) -> Option<&Value>;
    /// Everything after the first element, or `None` when empty
    fn rest(&self) -> Option<Self>;
    /// A new collection with `value` added; `self` is left untouched
    fn cons(&self, value: Value) -> Self;
}

struct Cons {
    head: Value,
    tail: List,
}

/// Immutable singly-linked list.
#[derive(Clone, Default)]
pub struct List {
    node: Option<Rc<Cons>>,
}

impl List {
    /// The empty list
    pub fn new() -> Self {
        List { node: None }
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Traverse the chain front to back. Each call starts again from the head.
    pub fn iter(&self) -> ListIter<'_> {
        ListIter {
            next: self.node.as_deref(),
        }
    }
}

impl Seq for List {
    fn first(&self) -> Option<&Value> {
        self.node.as_ref().map(|cons| &cons.head)
    }

    fn rest(&self) -> Option<Self> {
        self.node.as_ref().map(|cons| cons.tail.clone())
    }

    fn cons(&self, value: Value) -> Self {
        List {
            node: Some(Rc::new(Cons {
                head: value,
                tail: self.clone(),
            })),
        }
    }
}

impl Drop for List {
    fn drop(&mut self) {
        if self.node.is_some() {
            let list = List {
                node: self.node.take(),
            };
            dismantle(vec![Value::List(list)]);
        }
    }
}

/// Release nested collections from an explicit worklist, so neither long chains
/// nor deeply nested heads recurse once per node. Shared nodes are left alone.
fn dismantle(mut pending: Vec<Value>) {
    while let Some(value) = pending.pop() {
        match value {
            Value::List(mut list) => {
                let mut next = list.node.take();
                while let Some(node) = next {
                    match Rc::try_unwrap(node) {
                        Ok(Cons { head, mut tail }) => {
                            if head.is_collection() {
                                pending.push(head);
                            }
                            next = tail.node.take();
                        }
                        Err(_) => break,
                    }
                }
            }
            Value::Vector(mut vector) => {
                if let Some(items) = Rc::get_mut(&mut vector.0) {
                    pending.append(items);
                }
            }
            _ => {}
        }
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let items: Vec<Value> = iter.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(List::new(), |tail, head| tail.cons(head))
    }
}

impl<'a> IntoIterator for &'a List {
    type Item = &'a Value;
    type IntoIter = ListIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over the elements of a [`List`].
pub struct ListIter<'a> {
    next: Option<&'a Cons>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        let cons = self.next?;
        self.next = cons.tail.node.as_deref();
        Some(&cons.head)
    }
}

impl FusedIterator for ListIter<'_> {}

/// Ordered sequence of values. `cons` appends at the end. Clones share the
/// element buffer.
#[derive(Clone, Default, PartialEq)]
pub struct Vector(Rc<Vec<Value>>);

impl Vector {
    pub fn new() -> Self {
        Vector::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }
}

impl Seq for Vector {
    fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    fn rest(&self) -> Option<Self> {
        self.0
            .split_first()
            .map(|(_, rest)| Vector(Rc::new(rest.to_vec())))
    }

    fn cons(&self, value: Value) -> Self {
        let mut items = Vec::with_capacity(self.0.len() + 1);
        items.extend_from_slice(&self.0);
        items.push(value);
        Vector(Rc::new(items))
    }
}

impl Drop for Vector {
    fn drop(&mut self) {
        let nested =
            Rc::get_mut(&mut self.0).filter(|items| items.iter().any(Value::is_collection));
        if let Some(items) = nested {
            dismantle(std::mem::take(items));
        }
    }
}

impl From<Vec<Value>> for Vector {
    fn from(items: Vec<Value>) -> Self {
        Vector(Rc::new(items))
    }
}

impl FromIterator<Value> for Vector {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Vector(Rc::new(iter.into_iter().collect()))
    }
}

impl<'a> IntoIterator for &'a Vector {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// A procedure value: parameters, an unevaluated body and the defining scope.
pub struct Closure {
    pub(crate) params: Vec<Symbol>,
    pub(crate) body: Value,
    pub(crate) env: Environment,
}

/// Core value type in interpreter
///
/// To build values, use the helper functions:
/// - `val(42)` for literals, `sym("name")` for symbols
/// - `list([1, 2, 3])` / `vector([1, 2, 3])` for homogeneous collections
/// - `list(vec![sym("op"), val(42)])` for mixed collections
#[derive(Clone)]
pub enum Value {
    /// Numbers (integers only)
    Number(NumberType),
    /// String literals
    String(String),
    /// Boolean values, produced by comparisons
    Bool(bool),
    /// Symbols (identifiers)
    Symbol(Symbol),
    /// Lists; the empty list doubles as `nil`
    List(List),
    /// Vectors (data literals, never evaluated)
    Vector(Vector),
    /// Builtin procedures and special forms, bound by name in the base environment
    Builtin(&'static BuiltinOp),
    /// User-defined procedures created by `fn`
    Closure(Rc<Closure>),
}

impl Value {
    /// The empty list, bound as `nil` in the base environment
    pub fn nil() -> Self {
        Value::List(List::new())
    }

    /// `false`, `0`, the empty string and the empty list are falsy; everything else is truthy
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::List(list) => !list.is_empty(),
            Value::Symbol(_) | Value::Vector(_) | Value::Builtin(_) | Value::Closure(_) => true,
        }
    }

    /// Short name of the value's type, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Vector(_) => "vector",
            Value::Builtin(op) => match op.op_kind {
                OpKind::Function(_) => "builtin",
                OpKind::SpecialForm(_) => "special form",
            },
            Value::Closure(_) => "function",
        }
    }

    fn is_collection(&self) -> bool {
        matches!(self, Value::List(_) | Value::Vector(_))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Symbol(s) => write!(f, "{s:?}"),
            Value::List(list) => write!(f, "List({list:?})"),
            Value::Vector(vector) => write!(f, "Vector({vector:?})"),
            Value::Builtin(op) => write!(f, "Builtin({})", op.id),
            Value::Closure(closure) => {
                write!(
                    f,
                    "Closure(params={:?}, body={:?})",
                    closure.params, closure.body
                )
            }
        })
    }
}

/// Write `items` separated by single spaces
fn write_spaced<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// Rendering and comparison recurse once per nesting level, and values can nest
// far deeper than evaluation does.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ensure_sufficient_stack(|| match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::List(list) => {
                write!(f, "(")?;
                write_spaced(f, list.iter())?;
                write!(f, ")")
            }
            Value::Vector(vector) => {
                write!(f, "[")?;
                write_spaced(f, vector.iter())?;
                write!(f, "]")
            }
            Value::Builtin(op) => match op.op_kind {
                OpKind::Function(_) => write!(f, "#<builtin:{}>", op.id),
                OpKind::SpecialForm(_) => write!(f, "#<special-form:{}>", op.id),
            },
            Value::Closure(closure) => {
                write!(f, "#<fn [")?;
                for (i, param) in closure.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, "]>")
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        ensure_sufficient_stack(|| match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            // Builtins compare by name, closures by identity
            (Value::Builtin(a), Value::Builtin(b)) => a.id == b.id,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        })
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Symbol> for Value {
    fn from(s: Symbol) -> Self {
        Value::Symbol(s)
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

impl From<Vector> for Value {
    fn from(vector: Vector) -> Self {
        Value::Vector(vector)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

/// Helper function for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(Symbol::new(name))
}

/// Helper function for creating Values from anything convertible
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating a List from any collection of convertible items
pub fn list<T: Into<Value>, I: IntoIterator<Item = T>>(items: I) -> Value {
    Value::List(items.into_iter().map(Into::into).collect())
}

/// Helper function for creating a Vector from any collection of convertible items
pub fn vector<T: Into<Value>, I: IntoIterator<Item = T>>(items: I) -> Value {
    Value::Vector(items.into_iter().map(Into::into).collect())
}
