//! posixlisp - a minimal Lisp interpreter
//!
//! This crate parses parenthesized textual expressions into an in-memory tree and
//! evaluates that tree against a chain of lexical scopes. The pipeline is:
//!
//! ```text
//! text -> grammar (raw parse tree) -> reduce (typed tree) -> convert (Value) -> eval
//! ```
//!
//! ## Language
//!
//! ```clojure
//! 42                          ; integers evaluate to themselves
//! "text"                      ; so do strings
//! [1 2 x]                     ; vectors are data literals, never evaluated
//! (+ 1 2 3)                   ; procedure call
//! (if (= x 1) a b)            ; special forms receive unevaluated operands
//! (def inc (fn [n] (+ n 1)))  ; closures capture their defining scope
//! (quote (a b c))             ; data, returned as-is
//! ```
//!
//! The grammar is deliberately strict: list and vector elements are separated by
//! exactly one space, and every expression is a single top-level form.
//!
//! ## Entry point
//!
//! ```
//! use posixlisp::{create_base_env, parse_eval};
//!
//! let env = create_base_env();
//! parse_eval("(def add (fn [x y] (+ x y)))", &env).unwrap();
//! let result = parse_eval("(add 2 3)", &env).unwrap();
//! assert_eq!(result.to_string(), "5");
//! ```
//!
//! ## Modules
//!
//! - `ast`: the value model shared by the parser output and the evaluator
//! - `grammar`: PEG grammar producing a raw parse tree
//! - `reduce`: strips grammar noise into a compact typed tree
//! - `convert`: turns the typed tree into List/Vector/Symbol/literal values
//! - `evaluator`: special-form dispatch, closures and environment lookup
//! - `builtinops`: registry of builtin procedures and special forms

use std::fmt;

/// Maximum nesting depth accepted by the grammar.
/// Keeps the recursive-descent parser, reducer and converter off the native stack limit.
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum evaluation depth before a computation fails with [`Error::StackExhausted`].
/// Each nested evaluation (operator, argument, closure body, special-form operand)
/// counts as one level.
pub const MAX_EVAL_DEPTH: usize = 1024;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Input does not match the grammar
    InvalidSyntax,
    /// Input ended before the expression was complete (empty input, unclosed brackets)
    Incomplete,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra input found after a complete expression
    TrailingContent,
    /// Implementation-imposed limit exceeded (integer literal overflow)
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from `input` around `error_offset`.
    /// The offending character at that offset, if any, becomes `found`.
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let context_start = error_offset.saturating_sub(20);
        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let found = input.chars().nth(error_offset).map(String::from);
        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Input does not match the grammar in full
    #[error("ParseError: {0}")]
    ParseError(#[from] ParseError),
    /// A symbol resolved in no enclosing scope
    #[error("Unbound symbol: {0}")]
    UnboundSymbol(String),
    /// A procedure or special form received the wrong number of operands
    #[error("{}", arity_message(.expected, .got, .expression))]
    ArityMismatch {
        expected: usize,
        got: usize,
        expression: Option<String>,
    },
    /// An operand had the wrong type, or a collection was empty
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// Evaluation nested deeper than [`MAX_EVAL_DEPTH`]
    #[error("Stack exhausted: evaluation depth limit exceeded (max: {limit})")]
    StackExhausted { limit: usize },
    /// Any other runtime failure (overflow, malformed binding forms)
    #[error("EvaluationError: {0}")]
    EvalError(String),
}

fn arity_message(expected: &usize, got: &usize, expression: &Option<String>) -> String {
    match expression {
        Some(expr) => {
            format!("ArityMismatch: {expr}: expected {expected} arguments, got {got}")
        }
        None => format!("ArityMismatch: expected {expected} arguments but got {got}"),
    }
}

impl Error {
    /// Create an ArityMismatch without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityMismatch {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityMismatch naming the procedure or form that was called
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityMismatch {
            expected,
            got,
            expression: Some(expression),
        }
    }
}

pub mod ast;
pub mod builtinops;
pub mod convert;
pub mod evaluator;
pub mod grammar;
pub mod reduce;
mod stack;

pub use ast::Value;
pub use evaluator::{Environment, create_base_env, eval};

/// Parse one expression into its program value.
///
/// Runs the grammar, the tree reducer and the converter. A lone number, symbol or
/// string comes back bare; a parenthesized form comes back as a List.
pub fn parse(input: &str) -> Result<Value, Error> {
    let raw = grammar::parse_grammar(input)?;
    let tree = reduce::reduce_tree(&raw).ok_or_else(|| {
        ParseError::from_message(ParseErrorKind::Incomplete, "Expression reduced to nothing")
    })?;
    convert::tree_to_list(&tree)
}

/// Parse `input` and evaluate it in `env`.
///
/// This is the single entry point used by a read loop. Definitions made with
/// `def` persist in `env` across calls.
#[tracing::instrument(level = "debug", skip(env), err)]
pub fn parse_eval(input: &str, env: &Environment) -> Result<Value, Error> {
    let program = parse(input)?;
    eval(&program, env)
}
