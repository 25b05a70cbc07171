//! Built-in operations registry.
//!
//! Every builtin, procedure or special form, is described once by a [`BuiltinOp`]
//! entry: its identifier, its implementation and its [`Arity`]. The base
//! environment binds each entry under its identifier, so builtins are ordinary
//! first-class values that can be passed around and rebound.
//!
//! ## Functions vs Special Forms
//!
//! - **Functions**: receive their arguments already evaluated (`+`, `cons`, `first`)
//! - **Special Forms**: receive their operands unevaluated together with the calling
//!   environment, and decide what to evaluate (`if`, `quote`, `def`, `fn`)
//!
//! The evaluator validates arity before calling either kind, so implementations can
//! rely on the argument count matching the declared [`Arity`].
//!
//! ## Error Handling
//!
//! - **Type Safety**: arithmetic and comparisons reject non-numbers with `TypeMismatch`
//! - **Overflow Detection**: integer overflow is an `EvalError`, never a wrapped result
//! - **Empty Collections**: `first` and `rest` of an empty list or vector are `TypeMismatch`
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the signature `fn(&[Value]) -> Result<Value, Error>`,
//!    or the special-form signature if operands must stay unevaluated
//! 2. **Add to BUILTIN_OPS** with its identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::Error;
use crate::ast::{List, NumberType, Seq, Value};
use crate::evaluator::{
    Environment, eval_comment, eval_def, eval_do, eval_fn, eval_if, eval_let, eval_quote,
};

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl Arity {
    /// Check `got` against this arity, producing an `ArityMismatch` naming the
    /// nearest acceptable count.
    pub fn validate(self, got: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(expected) if got != expected => Err(Error::arity_error(expected, got)),
            Arity::AtLeast(min) if got < min => Err(Error::arity_error(min, got)),
            _ => Ok(()),
        }
    }
}

/// Signature of a builtin procedure: evaluated arguments in, value out
pub type FunctionFn = fn(&[Value]) -> Result<Value, Error>;

/// Signature of a special form: unevaluated operands, calling environment and
/// current evaluation depth
pub type SpecialFormFn = fn(&[Value], &Environment, usize) -> Result<Value, Error>;

/// Represents the implementation of a built-in operation
#[derive(Clone, Copy)]
pub enum OpKind {
    Function(FunctionFn),
    SpecialForm(SpecialFormFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name the operation is bound to in the base environment
    pub id: &'static str,
    pub op_kind: OpKind,
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check the argument count, naming this operation in the error
    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(arg_count).map_err(|err| match err {
            Error::ArityMismatch {
                expected,
                got,
                expression: None,
            } => Error::arity_error_with_expr(expected, got, self.id.to_owned()),
            other => other,
        })
    }
}

//
// Builtin Function Implementations
//

fn number_arg(op: &str, value: &Value) -> Result<NumberType, Error> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(Error::TypeMismatch(format!(
            "'{op}' requires numbers, got {} {other}",
            other.type_name()
        ))),
    }
}

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    let mut sum: NumberType = 0;
    for arg in args {
        sum = sum
            .checked_add(number_arg("+", arg)?)
            .ok_or_else(|| Error::EvalError("Integer overflow in addition".into()))?;
    }
    Ok(Value::Number(sum))
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    let [first, rest @ ..] = args else {
        return Err(Error::arity_error_with_expr(1, 0, "-".into()));
    };
    let first = number_arg("-", first)?;

    if rest.is_empty() {
        return first
            .checked_neg()
            .map(Value::Number)
            .ok_or_else(|| Error::EvalError("Integer overflow in negation".into()));
    }

    let mut result = first;
    for arg in rest {
        result = result
            .checked_sub(number_arg("-", arg)?)
            .ok_or_else(|| Error::EvalError("Integer overflow in subtraction".into()))?;
    }
    Ok(Value::Number(result))
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    let mut product: NumberType = 1;
    for arg in args {
        product = product
            .checked_mul(number_arg("*", arg)?)
            .ok_or_else(|| Error::EvalError("Integer overflow in multiplication".into()))?;
    }
    Ok(Value::Number(product))
}

// Chained comparison: every adjacent pair must satisfy the operator
macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            let numbers = args
                .iter()
                .map(|arg| number_arg($op_str, arg))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Bool(numbers.windows(2).all(|pair| pair[0] $op pair[1])))
        }
    };
}

numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");

/// Structural equality across all value types
fn builtin_equal(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(args.windows(2).all(|pair| pair[0] == pair[1])))
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match args {
        [item, Value::List(list)] => Ok(Value::List(list.cons(item.clone()))),
        [item, Value::Vector(vector)] => Ok(Value::Vector(vector.cons(item.clone()))),
        [_, other] => Err(Error::TypeMismatch(format!(
            "'cons' requires a list or vector as second argument, got {} {other}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error_with_expr(2, args.len(), "cons".into())),
    }
}

fn builtin_first(args: &[Value]) -> Result<Value, Error> {
    let first = match args {
        [Value::List(list)] => list.first(),
        [Value::Vector(vector)] => vector.first(),
        [other] => return Err(not_a_collection("first", other)),
        _ => return Err(Error::arity_error_with_expr(1, args.len(), "first".into())),
    };
    first
        .cloned()
        .ok_or_else(|| Error::TypeMismatch("'first' of an empty collection".into()))
}

fn builtin_rest(args: &[Value]) -> Result<Value, Error> {
    let rest = match args {
        [Value::List(list)] => list.rest().map(Value::List),
        [Value::Vector(vector)] => vector.rest().map(Value::Vector),
        [other] => return Err(not_a_collection("rest", other)),
        _ => return Err(Error::arity_error_with_expr(1, args.len(), "rest".into())),
    };
    rest.ok_or_else(|| Error::TypeMismatch("'rest' of an empty collection".into()))
}

fn not_a_collection(op: &str, value: &Value) -> Error {
    Error::TypeMismatch(format!(
        "'{op}' requires a list or vector, got {} {value}",
        value.type_name()
    ))
}

fn builtin_list(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::List(args.iter().cloned().collect::<List>()))
}

/// Global registry of all built-in operations
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    vec![
        // Special forms
        BuiltinOp {
            id: "if",
            op_kind: OpKind::SpecialForm(eval_if),
            // No (if cond then) short form
            arity: Arity::Exact(3),
        },
        BuiltinOp {
            id: "quote",
            op_kind: OpKind::SpecialForm(eval_quote),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "def",
            op_kind: OpKind::SpecialForm(eval_def),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "fn",
            op_kind: OpKind::SpecialForm(eval_fn),
            // Fixed-arity closures only: (fn [a b] body)
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "fn*",
            op_kind: OpKind::SpecialForm(eval_fn),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "do",
            op_kind: OpKind::SpecialForm(eval_do),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "let",
            op_kind: OpKind::SpecialForm(eval_let),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "let*",
            op_kind: OpKind::SpecialForm(eval_let),
            arity: Arity::Exact(2),
        },
        // No recur, so a loop runs its body once
        BuiltinOp {
            id: "loop",
            op_kind: OpKind::SpecialForm(eval_let),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "loop*",
            op_kind: OpKind::SpecialForm(eval_let),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "comment",
            op_kind: OpKind::SpecialForm(eval_comment),
            arity: Arity::Any,
        },
        // Arithmetic
        BuiltinOp {
            id: "+",
            op_kind: OpKind::Function(builtin_add),
            arity: Arity::Any,
        },
        BuiltinOp {
            id: "-",
            op_kind: OpKind::Function(builtin_sub),
            arity: Arity::AtLeast(1),
        },
        BuiltinOp {
            id: "*",
            op_kind: OpKind::Function(builtin_mul),
            arity: Arity::AtLeast(1),
        },
        // Comparison
        BuiltinOp {
            id: "<",
            op_kind: OpKind::Function(builtin_lt),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            id: ">",
            op_kind: OpKind::Function(builtin_gt),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            id: "=",
            op_kind: OpKind::Function(builtin_equal),
            arity: Arity::AtLeast(1),
        },
        // Collections
        BuiltinOp {
            id: "cons",
            op_kind: OpKind::Function(builtin_cons),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            id: "first",
            op_kind: OpKind::Function(builtin_first),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "rest",
            op_kind: OpKind::Function(builtin_rest),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            id: "list",
            op_kind: OpKind::Function(builtin_list),
            arity: Arity::Any,
        },
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.id, op)).collect()
    });

/// All builtin operations, in registry order
pub fn builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by the name it is bound to
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(id).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{list, sym, val, vector};

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> Option<Value> {
        Some(val(value))
    }

    /// Invoke a builtin procedure through the registry, validating arity the way
    /// the evaluator does.
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_builtin_op(name).unwrap();
        op.validate_arity(args.len())?;
        match op.op_kind {
            OpKind::Function(func) => func(args),
            OpKind::SpecialForm(_) => {
                panic!("expected function builtin in tests, got special form: {name}")
            }
        }
    }

    #[test]
    fn test_builtin_ops_registry() {
        let add_op = find_builtin_op("+").unwrap();
        assert_eq!(add_op.arity, Arity::Any);
        assert!(!add_op.is_special_form());

        let if_op = find_builtin_op("if").unwrap();
        assert!(if_op.is_special_form());
        assert_eq!(if_op.arity, Arity::Exact(3));

        for id in [
            "if", "quote", "def", "fn", "fn*", "do", "let", "let*", "loop", "loop*", "comment",
        ] {
            assert!(find_builtin_op(id).unwrap().is_special_form(), "{id}");
        }
        for id in ["+", "-", "*", "<", ">", "=", "cons", "first", "rest", "list"] {
            assert!(!find_builtin_op(id).unwrap().is_special_form(), "{id}");
        }

        // Index and registry agree
        assert_eq!(builtin_ops().len(), 21);
        for op in builtin_ops() {
            assert!(std::ptr::eq(find_builtin_op(op.id).unwrap(), op));
        }

        assert!(find_builtin_op("unknown").is_none());
        assert!(find_builtin_op("lambda").is_none());
    }

    /// Macro to create test cases, invoking builtins via the registry.
    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Option<Value>);

        let many_ones: Vec<Value> = (0..100).map(|_| val(1)).collect();
        let all_fives: Vec<Value> = (0..10).map(|_| val(5)).collect();
        let mut mostly_fives = all_fives.clone();
        mostly_fives.push(val(6));

        let int_list = list([1, 2, 3]);
        let int_vector = vector([1, 2, 3]);
        let nested = list([list([list([1])])]);
        let mixed = list(vec![val(1), val("hello"), val(true), Value::nil()]);

        let test_cases: Vec<TestCase> = vec![
            // =================================================================
            // ARITHMETIC
            // =================================================================
            test!("+", &[], success(0)),
            test!("+", &[val(42)], success(42)),
            test!("+", &[val(1), val(2), val(3)], success(6)),
            test!("+", &many_ones, success(100)),
            test!("+", &[val(1), val("a")], None),
            test!("+", &[val(true)], None),
            test!("+", &[val(NumberType::MAX), val(1)], None),
            test!("-", &[val(10), val(3), val(2)], success(5)),
            test!("-", &[val(10)], success(-10)),
            test!("-", &[val(0)], success(0)),
            test!("-", &[], None),
            test!("-", &[val(NumberType::MIN)], None),
            test!("-", &[val(NumberType::MIN), val(1)], None),
            test!("*", &[val(2), val(3), val(4)], success(24)),
            test!("*", &[val(7)], success(7)),
            test!("*", &[val(0), val(100)], success(0)),
            test!("*", &many_ones, success(1)),
            test!("*", &[], None),
            test!("*", &[val(4611686018427387904_i64), val(2)], None),
            test!("*", &[val(2), sym("x")], None),
            // =================================================================
            // COMPARISON AND EQUALITY
            // =================================================================
            test!("<", &[val(1), val(2)], success(true)),
            test!("<", &[val(2), val(1)], success(false)),
            test!("<", &[val(1), val(1)], success(false)),
            test!("<", &[val(-5), val(-2), val(0), val(3)], success(true)),
            test!("<", &[val(1), val(2), val(1)], success(false)),
            test!(">", &[val(10), val(5), val(0)], success(true)),
            test!(
                ">",
                &[val(NumberType::MAX), val(NumberType::MIN)],
                success(true)
            ),
            test!(">", &[val(1)], None),
            test!(">", &[val(1), val("2")], None),
            test!("=", &[val(1), val(1)], success(true)),
            test!("=", &[val(1), val(2)], success(false)),
            test!("=", &[val(7)], success(true)),
            test!("=", &all_fives, success(true)),
            test!("=", &mostly_fives, success(false)),
            test!("=", &[val("a"), val("a")], success(true)),
            test!("=", &[val("a"), sym("a")], success(false)),
            test!("=", &[val(1), val("1")], success(false)),
            test!("=", &[int_list.clone(), list([1, 2, 3])], success(true)),
            test!("=", &[int_list.clone(), int_vector.clone()], success(false)),
            test!("=", &[Value::nil(), list(Vec::<Value>::new())], success(true)),
            test!("=", &[], None),
            // =================================================================
            // COLLECTIONS
            // =================================================================
            test!("cons", &[val(1), list([2, 3])], Some(int_list.clone())),
            test!("cons", &[val(1), Value::nil()], success([1])),
            test!("cons", &[val(4), int_vector.clone()], Some(vector([1, 2, 3, 4]))),
            test!("cons", &[val(1), val(2)], None),
            test!("cons", &[val(1)], None),
            test!("first", std::slice::from_ref(&int_list), success(1)),
            test!("first", std::slice::from_ref(&int_vector), success(1)),
            test!("first", std::slice::from_ref(&nested), Some(list([list([1])]))),
            test!("first", std::slice::from_ref(&mixed), success(1)),
            test!("first", &[Value::nil()], None),
            test!("first", &[val(42)], None),
            test!("rest", std::slice::from_ref(&int_list), Some(list([2, 3]))),
            test!("rest", std::slice::from_ref(&int_vector), Some(vector([2, 3]))),
            test!("rest", &[list([1])], Some(Value::nil())),
            test!(
                "rest",
                std::slice::from_ref(&mixed),
                Some(list(vec![val("hello"), val(true), Value::nil()]))
            ),
            test!("rest", &[Value::nil()], None),
            test!("rest", &[val("abc")], None),
            test!("list", &[], Some(Value::nil())),
            test!("list", &[val(1), val("two")], Some(list(vec![val(1), val("two")]))),
        ];

        for (test_expr, result, expected) in test_cases {
            match (result, expected) {
                (Ok(actual), Some(expected_val)) => {
                    assert_eq!(actual, expected_val, "Failed for test case: {test_expr}");
                }
                (Err(_), None) => {} // Expected error
                (actual, expected) => panic!(
                    "Unexpected result for test case: {test_expr}\nGot: {actual:?}, Expected: {expected:?}"
                ),
            }
        }
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            call_builtin("+", &[val(1), val("a")]),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            call_builtin("first", &[Value::nil()]),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            call_builtin("rest", &[vector(Vec::<Value>::new())]),
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            call_builtin("+", &[val(NumberType::MAX), val(1)]),
            Err(Error::EvalError(_))
        ));
        assert_eq!(
            call_builtin("cons", &[val(1)]).unwrap_err(),
            Error::arity_error_with_expr(2, 1, "cons".into())
        );
    }

    #[test]
    fn test_arity_validation() {
        use Arity::*;

        Exact(2).validate(2).unwrap();
        Exact(2).validate(1).unwrap_err();
        Exact(2).validate(3).unwrap_err();

        AtLeast(1).validate(1).unwrap();
        AtLeast(1).validate(2).unwrap();
        AtLeast(1).validate(0).unwrap_err();

        Any.validate(0).unwrap();
        Any.validate(100).unwrap();

        match Exact(2).validate(1).unwrap_err() {
            Error::ArityMismatch {
                expected,
                got,
                expression,
            } => {
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
                assert_eq!(expression, None);
            }
            other => panic!("Expected ArityMismatch, got {other:?}"),
        }

        let quote = find_builtin_op("quote").unwrap();
        assert_eq!(
            quote.validate_arity(3).unwrap_err().to_string(),
            "ArityMismatch: quote: expected 1 arguments, got 3"
        );
    }
}
