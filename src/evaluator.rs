//! The recursive evaluator.
//!
//! Atoms other than symbols evaluate to themselves, symbols are looked up in the
//! environment chain, and a list is a call form: its head is evaluated to an
//! operator, then either handed the unevaluated operands (special forms) or applied
//! to the evaluated operands (builtin procedures and closures).

mod environment;

pub use environment::Environment;

use std::rc::Rc;

use crate::ast::{Closure, List, Symbol, Value};
use crate::builtinops::{OpKind, builtin_ops};
use crate::stack::ensure_sufficient_stack;
use crate::{Error, MAX_EVAL_DEPTH};

/// Evaluate an expression (public API)
pub fn eval(expr: &Value, env: &Environment) -> Result<Value, Error> {
    eval_with_depth_tracking(expr, env, 0)
}

/// Evaluate an expression with depth tracking to turn runaway recursion into an error
fn eval_with_depth_tracking(expr: &Value, env: &Environment, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::StackExhausted {
            limit: MAX_EVAL_DEPTH,
        });
    }
    ensure_sufficient_stack(|| match expr {
        // Self-evaluating forms; vectors are data literals
        Value::Number(_)
        | Value::String(_)
        | Value::Bool(_)
        | Value::Vector(_)
        | Value::Builtin(_)
        | Value::Closure(_) => Ok(expr.clone()),

        Value::Symbol(name) => env
            .get(name)
            .ok_or_else(|| Error::UnboundSymbol(name.name().to_owned())),

        Value::List(list) => eval_list(list, env, depth).map_err(|err| add_context(err, expr)),
    })
}

const CONTEXT_MARKER: &str = "\n  Context: while evaluating: ";

/// Attach the innermost failing form to type and evaluation errors
fn add_context(error: Error, expr: &Value) -> Error {
    match error {
        Error::EvalError(msg) if !msg.contains(CONTEXT_MARKER) => {
            Error::EvalError(format!("{msg}{CONTEXT_MARKER}{expr}"))
        }
        Error::TypeMismatch(msg) if !msg.contains(CONTEXT_MARKER) => {
            Error::TypeMismatch(format!("{msg}{CONTEXT_MARKER}{expr}"))
        }
        // Parse errors, unbound symbols, arity and stack errors carry their own context
        other => other,
    }
}

/// Evaluate argument expressions left to right
fn eval_args(args: &[Value], env: &Environment, depth: usize) -> Result<Vec<Value>, Error> {
    args.iter()
        .map(|arg| eval_with_depth_tracking(arg, env, depth + 1))
        .collect()
}

/// Evaluate a call form
fn eval_list(list: &List, env: &Environment, depth: usize) -> Result<Value, Error> {
    let mut elements = list.iter();
    let Some(operator_expr) = elements.next() else {
        return Err(Error::EvalError("Cannot evaluate empty list".to_owned()));
    };
    let operand_exprs: Vec<Value> = elements.cloned().collect();

    let operator = eval_with_depth_tracking(operator_expr, env, depth + 1)?;
    match &operator {
        Value::Builtin(op) => match op.op_kind {
            OpKind::SpecialForm(special_form) => {
                op.validate_arity(operand_exprs.len())?;
                special_form(&operand_exprs, env, depth)
            }
            OpKind::Function(func) => {
                let args = eval_args(&operand_exprs, env, depth)?;
                op.validate_arity(args.len())?;
                func(&args)
            }
        },
        Value::Closure(closure) => {
            let args = eval_args(&operand_exprs, env, depth)?;
            apply_closure(closure, &args, depth)
        }
        other => Err(Error::TypeMismatch(format!(
            "Cannot apply non-procedure {} {other}",
            other.type_name()
        ))),
    }
}

/// Bind parameters positionally in a fresh frame under the closure's defining
/// environment, then evaluate the body there.
fn apply_closure(closure: &Rc<Closure>, args: &[Value], depth: usize) -> Result<Value, Error> {
    if closure.params.len() != args.len() {
        return Err(Error::arity_error_with_expr(
            closure.params.len(),
            args.len(),
            Value::Closure(Rc::clone(closure)).to_string(),
        ));
    }

    let frame = Environment::with_parent(&closure.env);
    for (param, arg) in closure.params.iter().zip(args) {
        frame.define(param.clone(), arg.clone());
    }
    tracing::trace!(arity = args.len(), depth, "applying closure");

    eval_with_depth_tracking(&closure.body, &frame, depth + 1)
}

/// `(if cond then else)`: only the selected branch is evaluated
pub(crate) fn eval_if(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [condition_expr, then_expr, else_expr] => {
            let condition = eval_with_depth_tracking(condition_expr, env, depth + 1)?;
            let branch = if condition.is_truthy() {
                then_expr
            } else {
                else_expr
            };
            eval_with_depth_tracking(branch, env, depth + 1)
        }
        _ => Err(Error::arity_error_with_expr(3, args.len(), "if".into())),
    }
}

/// `(quote x)`
pub(crate) fn eval_quote(args: &[Value], _env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity_error_with_expr(1, args.len(), "quote".into())),
    }
}

/// `(def name expr)`: binds in the local frame and returns the name
pub(crate) fn eval_def(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Symbol(name), expr] => {
            let value = eval_with_depth_tracking(expr, env, depth + 1)?;
            tracing::debug!(%name, value = %value, "def");
            env.define(name.clone(), value);
            Ok(Value::Symbol(name.clone()))
        }
        [other, _] => Err(Error::TypeMismatch(format!(
            "'def' requires a symbol name, got {} {other}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error_with_expr(2, args.len(), "def".into())),
    }
}

/// `(fn [params] body)`
pub(crate) fn eval_fn(args: &[Value], env: &Environment, _depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Vector(param_list), body] => {
            let mut params: Vec<Symbol> = Vec::with_capacity(param_list.len());
            for param in param_list {
                match param {
                    Value::Symbol(name) => {
                        if params.contains(name) {
                            return Err(Error::EvalError(format!(
                                "Duplicate parameter name: {name}"
                            )));
                        }
                        params.push(name.clone());
                    }
                    other => {
                        return Err(Error::TypeMismatch(format!(
                            "'fn' parameters must be symbols, got {} {other}",
                            other.type_name()
                        )));
                    }
                }
            }

            Ok(Value::Closure(Rc::new(Closure {
                params,
                body: body.clone(),
                env: env.clone(),
            })))
        }
        [other, _] => Err(Error::TypeMismatch(format!(
            "'fn' requires a vector of parameters, got {} {other}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error_with_expr(2, args.len(), "fn".into())),
    }
}

/// `(do e1 ... en)`: evaluates in order, returns the last value
pub(crate) fn eval_do(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    let [leading @ .., last] = args else {
        return Err(Error::arity_error_with_expr(1, 0, "do".into()));
    };
    for expr in leading {
        eval_with_depth_tracking(expr, env, depth + 1)?;
    }
    eval_with_depth_tracking(last, env, depth + 1)
}

/// `(let [n1 e1 n2 e2 ...] body)`: sequential bindings in a child frame
pub(crate) fn eval_let(args: &[Value], env: &Environment, depth: usize) -> Result<Value, Error> {
    match args {
        [Value::Vector(bindings), body] => {
            if bindings.len() % 2 != 0 {
                return Err(Error::EvalError(format!(
                    "'let' requires an even number of binding forms, got {}",
                    bindings.len()
                )));
            }

            let frame = Environment::with_parent(env);
            let mut remaining = bindings.as_slice();
            while let [name_expr, value_expr, tail @ ..] = remaining {
                let Value::Symbol(name) = name_expr else {
                    return Err(Error::TypeMismatch(format!(
                        "'let' binding names must be symbols, got {} {name_expr}",
                        name_expr.type_name()
                    )));
                };
                let value = eval_with_depth_tracking(value_expr, &frame, depth + 1)?;
                frame.define(name.clone(), value);
                remaining = tail;
            }

            eval_with_depth_tracking(body, &frame, depth + 1)
        }
        [other, _] => Err(Error::TypeMismatch(format!(
            "'let' requires a vector of bindings, got {} {other}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error_with_expr(2, args.len(), "let".into())),
    }
}

/// `(comment ...)`: ignores its operands
pub(crate) fn eval_comment(
    _args: &[Value],
    _env: &Environment,
    _depth: usize,
) -> Result<Value, Error> {
    Ok(Value::nil())
}

/// Create a base environment with every builtin bound by name, plus `true`,
/// `false` and `nil`.
pub fn create_base_env() -> Environment {
    let env = Environment::new();

    for builtin_op in builtin_ops() {
        env.define(Symbol::new(builtin_op.id), Value::Builtin(builtin_op));
    }
    env.define(Symbol::new("true"), Value::Bool(true));
    env.define(Symbol::new("false"), Value::Bool(false));
    env.define(Symbol::new("nil"), Value::nil());

    env
}
