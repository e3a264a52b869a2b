//! Functions callable from expressions.

use crate::error::{Error, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Min,
    Max,
    Int,
    Float,
    Round,
    Clamp,
    Len,
}

impl Builtin {
    /// Case-insensitive lookup by name.
    pub fn lookup(name: &str) -> Option<Builtin> {
        let builtin = match name.to_ascii_lowercase().as_str() {
            "abs" => Builtin::Abs,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "round" => Builtin::Round,
            "clamp" => Builtin::Clamp,
            "len" | "strlen" => Builtin::Len,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Round => "round",
            Builtin::Clamp => "clamp",
            Builtin::Len => "len",
        }
    }

    pub(crate) fn check_arity(self, found: usize) -> Result<()> {
        let (ok, expected) = match self {
            Builtin::Min | Builtin::Max => (found >= 2, "at least 2"),
            Builtin::Clamp => (found == 3, "3"),
            _ => (found == 1, "1"),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::Arity {
                name: self.name().to_string(),
                expected,
                found,
            })
        }
    }

    pub(crate) fn call(self, args: &[Value]) -> Value {
        let Some(first) = args.first() else {
            return Value::Null;
        };
        match self {
            Builtin::Abs => match first {
                v if v.is_float() => Value::Float(v.to_float().abs()),
                v => Value::Int(v.to_int().wrapping_abs()),
            },
            Builtin::Min => extreme(args, |a, b| a < b),
            Builtin::Max => extreme(args, |a, b| a > b),
            Builtin::Int => Value::Int(first.to_int()),
            Builtin::Float => Value::Float(first.to_float()),
            Builtin::Round => Value::Int(first.to_float().round() as i64),
            Builtin::Clamp => {
                let (lo, hi) = (&args[1], &args[2]);
                if args.iter().any(Value::is_float) {
                    let v = first.to_float();
                    Value::Float(v.max(lo.to_float()).min(hi.to_float()))
                } else {
                    Value::Int(first.to_int().max(lo.to_int()).min(hi.to_int()))
                }
            }
            Builtin::Len => Value::Int(first.to_string().chars().count() as i64),
        }
    }
}

/// The argument that wins `better` against all others, compared numerically.
fn extreme(args: &[Value], better: fn(f64, f64) -> bool) -> Value {
    let mut best = &args[0];
    for arg in &args[1..] {
        if better(arg.to_float(), best.to_float()) {
            best = arg;
        }
    }
    if best.is_float() {
        Value::Float(best.to_float())
    } else {
        Value::Int(best.to_int())
    }
}
