use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::script::ast::FunctionDef;
use crate::script::interpreter::Scope;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Native {
    Eval,
    SetTimeout,
    ParseInt,
    ParseFloat,
    IsNaN,
    Escape,
    Unescape,
    FromCharCode,
    MathFloor,
    MathCeil,
    MathRound,
    MathAbs,
    MathMax,
    MathMin,
    MathPow,
}

// Array stringification stops growing past this; the interpreter rejects anything past its own, smaller limit.
const MAX_JOINED_LEN: usize = 1 << 24;
const MAX_JOIN_NESTING: usize = 1024;

pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub scope: Scope,
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "function {}", self.def.name.as_deref().unwrap_or("<anonymous>"))
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<HashMap<String, Value>>>),
    Function(Rc<Closure>),
    Native(Native),
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(properties: HashMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(properties)))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_js_string()),
            _ => f64::NAN,
        }
    }

    pub fn to_int32(&self) -> i32 {
        to_uint32(self.to_number()) as i32
    }

    pub fn to_uint32(&self) -> u32 {
        to_uint32(self.to_number())
    }

    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(items) => join_array(items, ",", MAX_JOINED_LEN),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(closure) => format!("{:?}", closure),
            Value::Native(native) => format!("function {:?}() {{ [native code] }}", native),
        }
    }

    fn is_primitive(&self) -> bool {
        !matches!(self, Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Native(_))
    }

    /// Converts objects to their string form, leaving primitives alone.
    pub fn to_primitive(&self) -> Value {
        if self.is_primitive() {
            self.clone()
        } else {
            Value::string(self.to_js_string())
        }
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (a, b) if a.is_primitive() && b.is_primitive() => match (a, b) {
                (Value::Str(a), Value::Str(b)) => a == b,
                _ => a.to_number() == b.to_number(),
            },
            (a, b) if a.is_primitive() || b.is_primitive() => a.to_primitive().loose_equals(&b.to_primitive()),
            (a, b) => a.strict_equals(b),
        }
    }
}

/// Joins array items like `Array.prototype.join`. An array that is already being joined further up (a cycle), or
/// one nested past a fixed depth, contributes nothing. Output stops growing once it is longer than `limit`, so
/// callers spot an oversized result by its length.
pub fn join_array(items: &Rc<RefCell<Vec<Value>>>, separator: &str, limit: usize) -> String {
    let mut out = String::new();
    write_joined(items, separator, limit, &mut out, &mut Vec::new());
    out
}

fn write_joined(
    items: &Rc<RefCell<Vec<Value>>>,
    separator: &str,
    limit: usize,
    out: &mut String,
    open: &mut Vec<*const RefCell<Vec<Value>>>,
) {
    let id = Rc::as_ptr(items);
    if open.len() >= MAX_JOIN_NESTING || open.contains(&id) {
        return;
    }
    open.push(id);
    for (index, item) in items.borrow().iter().enumerate() {
        if out.len() > limit {
            break;
        }
        if index > 0 {
            out.push_str(separator);
        }
        match item {
            Value::Undefined | Value::Null => {}
            Value::Array(inner) => write_joined(inner, ",", limit, out, open),
            other => out.push_str(&other.to_js_string()),
        }
    }
    open.pop();
}

pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

pub fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.chars().all(|c| c.is_ascii_digit() || "+-.eE".contains(c)) => s.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

pub fn number_to_radix_string(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 {
        return number_to_string(n);
    }
    let mut magnitude = n.abs() as u64;
    if magnitude == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        let digit = (magnitude % u64::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        magnitude /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_array_joins_without_recursing() {
        let items = Rc::new(RefCell::new(vec![Value::Number(1.0)]));
        items.borrow_mut().push(Value::Array(items.clone()));
        items.borrow_mut().push(Value::string("x"));
        assert_eq!(Value::Array(items.clone()).to_js_string(), "1,,x");
        items.borrow_mut().clear();
    }

    #[test]
    fn test_join_stops_past_limit() {
        let items = Rc::new(RefCell::new(vec![Value::string("abcd"); 1000]));
        let joined = join_array(&items, "-", 10);
        assert!(joined.len() > 10 && joined.len() < 20, "{}", joined);
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_radix_string(255.0, 16), "ff");
        assert_eq!(number_to_radix_string(35.0, 36), "z");
    }

    #[test]
    fn test_uint32_wraps_like_js() {
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(Value::Number(-2.0).to_int32(), -2);
        assert_eq!(Value::Number(4_294_967_297.0).to_int32(), 1);
        assert_eq!(Value::Number(f64::NAN).to_int32(), 0);
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Number(1.0).loose_equals(&Value::string("1")));
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
        assert!(!Value::Number(1.0).strict_equals(&Value::string("1")));
    }
}
