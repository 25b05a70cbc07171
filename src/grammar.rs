//! The PEG grammar, producing a raw parse tree.
//!
//! ```text
//! exp     = number / symbol / s_exp / vector / string
//! number  = [0-9]+
//! symbol  = [a-zA-Z+=*<>-] [a-zA-Z0-9+=*<>-]*
//! s_exp   = "(" exp (space exp)* ")"
//! vector  = "[" exp (space exp)* "]"
//! string  = '"' ( '\' . / [^"\\] )* '"'
//! space   = " "
//! ```
//!
//! Alternatives are ordered, and the whole input must be consumed by one `exp`.
//! `exp (space exp)*` accepts the same language as `(exp space)* exp` without
//! re-parsing the last element of every bracketed form.
//!
//! Every rule produces a [`ParseNode`], including the anonymous literal, sequence
//! and repetition nodes that only exist to glue the grammar together. Stripping
//! those is the job of [`crate::reduce`].

use std::fmt;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while,
    character::complete::{anychar, char, digit1, none_of, satisfy},
    combinator::recognize,
    error::{ErrorKind, ParseError as _},
    multi::many0_count,
    sequence::{delimited, pair, preceded},
};

use crate::{MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Allowed non-alphanumeric characters in symbol names
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+=-*<>";

/// The grammar rule that produced a [`ParseNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Exp,
    Number,
    Symbol,
    SExp,
    Vector,
    String,
    Space,
    /// A bracket or other literal token
    Literal,
    /// One `space exp` step of a bracketed form
    Sequence,
    /// Zero or more `space exp` steps
    Repetition,
}

impl Rule {
    /// The rule's name in the grammar; anonymous rules have an empty name
    pub fn name(self) -> &'static str {
        match self {
            Rule::Exp => "exp",
            Rule::Number => "number",
            Rule::Symbol => "symbol",
            Rule::SExp => "s_exp",
            Rule::Vector => "vector",
            Rule::String => "string",
            Rule::Space => "space",
            Rule::Literal | Rule::Sequence | Rule::Repetition => "",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "" => write!(f, "<anonymous>"),
            name => write!(f, "{name}"),
        }
    }
}

/// A node of the raw parse tree: the rule that matched, the exact text it
/// matched and the nodes of its sub-rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode {
    pub rule: Rule,
    pub text: String,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    fn leaf(rule: Rule, text: &str) -> Self {
        Self::branch(rule, text, Vec::new())
    }

    fn branch(rule: Rule, text: &str, children: Vec<ParseNode>) -> Self {
        ParseNode {
            rule,
            text: text.to_owned(),
            children,
        }
    }
}

/// Error type threaded through the combinators. When alternatives all fail,
/// the one that got furthest into the input is kept.
#[derive(Debug, Clone, PartialEq)]
struct GrammarError<'a> {
    input: &'a str,
    kind: ErrorKind,
}

impl<'a> nom::error::ParseError<&'a str> for GrammarError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        GrammarError { input, kind }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    fn or(self, other: Self) -> Self {
        if other.input.len() < self.input.len() {
            other
        } else {
            self
        }
    }
}

type GrammarResult<'a> = IResult<&'a str, ParseNode, GrammarError<'a>>;

/// The prefix of `before` that a parser consumed to leave `after`
fn consumed<'a>(before: &'a str, after: &str) -> &'a str {
    &before[..before.len() - after.len()]
}

/// Character position of `rest` within `input`
fn char_offset(input: &str, rest: &str) -> usize {
    consumed(input, rest).chars().count()
}

fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

fn exp(input: &str, depth: usize) -> GrammarResult<'_> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(GrammarError {
            input,
            kind: ErrorKind::TooLarge,
        }));
    }
    let (rest, child) = alt((
        number,
        symbol,
        |input| s_exp(input, depth),
        |input| vector(input, depth),
        string,
    ))
    .parse(input)?;
    Ok((
        rest,
        ParseNode::branch(Rule::Exp, consumed(input, rest), vec![child]),
    ))
}

fn number(input: &str) -> GrammarResult<'_> {
    let (rest, digits) = digit1.parse(input)?;
    Ok((rest, ParseNode::leaf(Rule::Number, digits)))
}

fn symbol(input: &str) -> GrammarResult<'_> {
    let (rest, name) =
        recognize(pair(satisfy(is_symbol_start), take_while(is_symbol_char))).parse(input)?;
    Ok((rest, ParseNode::leaf(Rule::Symbol, name)))
}

fn s_exp(input: &str, depth: usize) -> GrammarResult<'_> {
    bracketed(input, Rule::SExp, '(', ')', depth)
}

fn vector(input: &str, depth: usize) -> GrammarResult<'_> {
    bracketed(input, Rule::Vector, '[', ']', depth)
}

/// `open exp (space exp)* close`
fn bracketed(input: &str, rule: Rule, open: char, close: char, depth: usize) -> GrammarResult<'_> {
    let (rest, open_node) = literal(input, open)?;
    let (rest, first) = exp(rest, depth + 1)?;
    let (rest, more, stop) = repetition(rest, depth)?;
    let (rest, close_node) = literal(rest, close).map_err(|err| err.map(|e| stop.or(e)))?;
    Ok((
        rest,
        ParseNode::branch(
            rule,
            consumed(input, rest),
            vec![open_node, first, more, close_node],
        ),
    ))
}

/// Zero or more `space exp` steps. The failure that ended the repetition is
/// handed back so a missing close bracket can report the deeper error.
fn repetition(
    input: &str,
    depth: usize,
) -> Result<(&str, ParseNode, GrammarError<'_>), nom::Err<GrammarError<'_>>> {
    let mut rest = input;
    let mut steps = Vec::new();
    loop {
        match spaced_exp(rest, depth) {
            Ok((next, step)) => {
                rest = next;
                steps.push(step);
            }
            Err(nom::Err::Error(stop)) => {
                let node = ParseNode::branch(Rule::Repetition, consumed(input, rest), steps);
                return Ok((rest, node, stop));
            }
            Err(err) => return Err(err),
        }
    }
}

fn spaced_exp(input: &str, depth: usize) -> GrammarResult<'_> {
    let (rest, space_node) = space(input)?;
    let (rest, item) = exp(rest, depth + 1)?;
    Ok((
        rest,
        ParseNode::branch(Rule::Sequence, consumed(input, rest), vec![space_node, item]),
    ))
}

fn space(input: &str) -> GrammarResult<'_> {
    let (rest, _) = char(' ').parse(input)?;
    Ok((rest, ParseNode::leaf(Rule::Space, consumed(input, rest))))
}

fn literal(input: &str, token: char) -> GrammarResult<'_> {
    let (rest, _) = char(token).parse(input)?;
    Ok((rest, ParseNode::leaf(Rule::Literal, consumed(input, rest))))
}

fn string(input: &str) -> GrammarResult<'_> {
    let (rest, _) = delimited(
        char('"'),
        many0_count(alt((
            preceded(char('\\'), anychar),
            none_of("\"\\"),
        ))),
        char('"'),
    )
    .parse(input)?;
    Ok((rest, ParseNode::leaf(Rule::String, consumed(input, rest))))
}

/// Convert the furthest grammar failure into a user-facing error
fn describe_failure(input: &str, error: &GrammarError<'_>) -> ParseError {
    let offset = char_offset(input, error.input);
    tracing::trace!(offset, kind = ?error.kind, "grammar failure");

    if error.kind == ErrorKind::TooLarge {
        return ParseError::with_context(
            ParseErrorKind::TooDeeplyNested,
            format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
            input,
            offset,
        );
    }
    if error.input.is_empty() {
        return ParseError::with_context(
            ParseErrorKind::Incomplete,
            "Unexpected end of input",
            input,
            offset,
        );
    }
    let near: String = error.input.chars().take(10).collect();
    ParseError::with_context(
        ParseErrorKind::InvalidSyntax,
        format!("Invalid syntax near '{near}' at position {offset}"),
        input,
        offset,
    )
}

/// Match `input` against `exp`, requiring the whole input to be consumed.
pub fn parse_grammar(input: &str) -> Result<ParseNode, ParseError> {
    match exp(input, 0) {
        Ok(("", node)) => Ok(node),
        Ok((remaining, _)) => Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input: '{remaining}'"),
            input,
            char_offset(input, remaining),
        )),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(describe_failure(input, &e)),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::from_message(
            ParseErrorKind::Incomplete,
            "Incomplete input",
        )),
    }
}
