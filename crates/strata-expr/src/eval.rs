//! Tree-walking evaluation.
//!
//! Evaluation never fails. Division and remainder by zero yield 0, integer overflow
//! wraps, and unknown variables read as null.

use crate::parser::{BinaryOp, Node, UnaryOp};
use crate::value::Value;
use crate::Variables;

pub(crate) fn eval(node: &Node, vars: &mut dyn Variables) -> Value {
    match node {
        Node::Literal(v) => v.clone(),
        Node::Variable(name) => vars.get(name).unwrap_or_else(|| {
            tracing::trace!(name = %name, "unknown variable");
            Value::Null
        }),
        Node::Assign(name, value) => {
            let value = eval(value, vars);
            if !vars.set(name, value.clone()) {
                tracing::warn!(name = %name, "variable is read-only");
            }
            value
        }
        Node::Unary(UnaryOp::Neg, inner) => match eval(inner, vars) {
            v if v.is_float() => Value::Float(-v.to_float()),
            v => Value::Int(v.to_int().wrapping_neg()),
        },
        Node::Unary(UnaryOp::Not, inner) => Value::Bool(!eval(inner, vars).to_bool()),
        Node::Binary(BinaryOp::And, left, right) => {
            Value::Bool(eval(left, vars).to_bool() && eval(right, vars).to_bool())
        }
        Node::Binary(BinaryOp::Or, left, right) => {
            Value::Bool(eval(left, vars).to_bool() || eval(right, vars).to_bool())
        }
        Node::Binary(op, left, right) => {
            let left = eval(left, vars);
            let right = eval(right, vars);
            binary(*op, &left, &right)
        }
        Node::Conditional(cond, then, otherwise) => {
            if eval(cond, vars).to_bool() {
                eval(then, vars)
            } else {
                eval(otherwise, vars)
            }
        }
        Node::Call(builtin, args) => {
            let args: Vec<Value> = args.iter().map(|a| eval(a, vars)).collect();
            builtin.call(&args)
        }
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add if is_text(left) || is_text(right) => Value::Str(format!("{left}{right}")),
        BinaryOp::Add => arithmetic(left, right, i64::wrapping_add, |a, b| a + b),
        BinaryOp::Sub => arithmetic(left, right, i64::wrapping_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(left, right, i64::wrapping_mul, |a, b| a * b),
        BinaryOp::Div => {
            if right.to_float() == 0.0 {
                return Value::Int(0);
            }
            arithmetic(left, right, i64::wrapping_div, |a, b| a / b)
        }
        BinaryOp::Rem => {
            if right.to_float() == 0.0 {
                return Value::Int(0);
            }
            arithmetic(left, right, i64::wrapping_rem, |a, b| a % b)
        }
        BinaryOp::Eq => Value::Bool(equals(left, right)),
        BinaryOp::Ne => Value::Bool(!equals(left, right)),
        BinaryOp::Lt => Value::Bool(compare(left, right).is_lt()),
        BinaryOp::Le => Value::Bool(compare(left, right).is_le()),
        BinaryOp::Gt => Value::Bool(compare(left, right).is_gt()),
        BinaryOp::Ge => Value::Bool(compare(left, right).is_ge()),
        BinaryOp::And => Value::Bool(left.to_bool() && right.to_bool()),
        BinaryOp::Or => Value::Bool(left.to_bool() || right.to_bool()),
    }
}

fn arithmetic(left: &Value, right: &Value, int: fn(i64, i64) -> i64, float: fn(f64, f64) -> f64) -> Value {
    if left.is_float() || right.is_float() {
        Value::Float(float(left.to_float(), right.to_float()))
    } else {
        Value::Int(int(left.to_int(), right.to_int()))
    }
}

/// A string that does not read as a number.
fn is_text(v: &Value) -> bool {
    match v {
        Value::Str(s) => s.trim().parse::<f64>().is_err(),
        _ => false,
    }
}

/// Strings compare case-insensitively as text unless both sides are numeric.
fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, other) | (other, Value::Null) => !other.to_bool() && other.to_string().is_empty(),
        _ if is_text(left) || is_text(right) => {
            left.to_string().eq_ignore_ascii_case(&right.to_string())
        }
        _ => left.to_float() == right.to_float(),
    }
}

fn compare(left: &Value, right: &Value) -> std::cmp::Ordering {
    if is_text(left) || is_text(right) {
        return left
            .to_string()
            .to_ascii_lowercase()
            .cmp(&right.to_string().to_ascii_lowercase());
    }
    left.to_float()
        .partial_cmp(&right.to_float())
        .unwrap_or(std::cmp::Ordering::Equal)
}
