//! Value semantics for template expressions.
//!
//! Template data is plain [`serde_json::Value`]. These helpers define how
//! values behave in conditions, comparisons, arithmetic and output, following
//! loosely-typed scripting conventions: `"0"` is falsy, numeric strings take
//! part in arithmetic, and `null` prints as nothing.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Returns `true` if the value counts as true in a condition.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text produced when a value is echoed, before escaping.
pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "1".to_owned(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// HTML-escape text for output, quotes included.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Numeric view of a value used by arithmetic and comparisons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    pub(crate) fn into_value(self) -> Value {
        match self {
            Self::Int(i) => Value::from(i),
            Self::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        }
    }
}

/// Interpret a value as a number. `null` and booleans coerce; strings must be
/// numeric.
pub(crate) fn to_num(value: &Value) -> Option<Num> {
    match value {
        Value::Null => Some(Num::Int(0)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(Num::Int)
            .or_else(|| n.as_f64().map(Num::Float)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Num::Int)
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(Num::Float))
        }
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Apply an arithmetic operator, returning an error message on bad operands.
pub(crate) fn arith(op: ArithOp, left: &Value, right: &Value) -> Result<Value, String> {
    let (Some(a), Some(b)) = (to_num(left), to_num(right)) else {
        return Err(format!(
            "unsupported operand types for arithmetic: {} and {}",
            type_name(left),
            type_name(right)
        ));
    };

    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            ArithOp::Add => x.checked_add(y),
            ArithOp::Sub => x.checked_sub(y),
            ArithOp::Mul => x.checked_mul(y),
            ArithOp::Div if y == 0 => return Err("division by zero".to_owned()),
            ArithOp::Div => x
                .checked_rem(y)
                .filter(|r| *r == 0)
                .and_then(|_| x.checked_div(y)),
            ArithOp::Rem if y == 0 => return Err("modulo by zero".to_owned()),
            ArithOp::Rem => x.checked_rem(y),
        };
        if let Some(n) = exact {
            return Ok(Value::from(n));
        }
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let result = match op {
        ArithOp::Add => x + y,
        ArithOp::Sub => x - y,
        ArithOp::Mul => x * y,
        ArithOp::Div if y == 0.0 => return Err("division by zero".to_owned()),
        ArithOp::Div => x / y,
        ArithOp::Rem => return Err("modulo requires integer operands".to_owned()),
    };
    Ok(Num::Float(result).into_value())
}

/// Loose equality (`==`).
///
/// Numbers and numeric strings compare by value, booleans and `null` compare
/// by truthiness, everything else structurally.
#[allow(clippy::float_cmp)]
pub(crate) fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bool(_), _) | (_, Value::Bool(_)) => is_truthy(left) == is_truthy(right),
        (Value::Null, Value::Null) => true,
        (Value::Null, other) | (other, Value::Null) => !is_truthy(other),
        (Value::String(a), Value::String(b)) => match (to_num(left), to_num(right)) {
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        },
        (Value::Number(_), Value::String(_) | Value::Number(_))
        | (Value::String(_), Value::Number(_)) => match (to_num(left), to_num(right)) {
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => to_text(left) == to_text(right),
        },
        _ => left == right,
    }
}

/// Strict equality (`===`): same type and same value.
#[allow(clippy::float_cmp)]
pub(crate) fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => {
            to_num(left).map(Num::as_f64) == to_num(right).map(Num::as_f64)
        }
        _ => left == right,
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`.
pub(crate) fn compare(left: &Value, right: &Value) -> Result<Ordering, String> {
    if let (Value::String(a), Value::String(b)) = (left, right)
        && (to_num(left).is_none() || to_num(right).is_none())
    {
        return Ok(a.cmp(b));
    }
    match (to_num(left), to_num(right)) {
        (Some(a), Some(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .ok_or_else(|| "cannot compare NaN".to_owned()),
        _ => Err(format!(
            "cannot compare {} with {}",
            type_name(left),
            type_name(right)
        )),
    }
}

/// Element count used by `count()`.
pub(crate) fn count(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 1,
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
