//! Evaluator for parsed guard expressions.

use std::borrow::Cow;
use std::cmp::Ordering;

use serde_json::Value;

use stepflow_core::types::StateMap;

use super::parser::{ArithOp, CompareOp, Expr};
use super::GuardError;

/// Evaluates expressions against a borrowed `state` scope.
///
/// Lookups on `state` read straight from the map; the scope is only copied
/// when an expression uses `state` as a whole value.
pub struct Evaluator<'a> {
    scope: &'a StateMap,
}

impl<'a> Evaluator<'a> {
    /// `scope` is the map bound to `state`.
    pub fn new(scope: &'a StateMap) -> Self {
        Self { scope }
    }

    pub fn eval(&self, expr: &'a Expr) -> Result<Cow<'a, Value>, GuardError> {
        match expr {
            Expr::Literal(v) => Ok(Cow::Borrowed(v)),
            Expr::State => Ok(Cow::Owned(Value::Object(self.scope.clone()))),
            Expr::List(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval(item).map(Cow::into_owned))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Cow::Owned(Value::Array(values)))
            }
            Expr::Field(target, name) if matches!(**target, Expr::State) => {
                self.lookup(name).map(Cow::Borrowed)
            }
            Expr::Field(target, name) => match self.eval(target)? {
                Cow::Borrowed(v) => Ok(Cow::Borrowed(field(v, name)?)),
                Cow::Owned(v) => Ok(Cow::Owned(field(&v, name)?.clone())),
            },
            Expr::Index(target, index) if matches!(**target, Expr::State) => {
                match self.eval(index)?.as_ref() {
                    Value::String(key) => self.lookup(key).map(Cow::Borrowed),
                    other => Err(GuardError::Type(format!(
                        "cannot index object with {}",
                        type_name(other)
                    ))),
                }
            }
            Expr::Index(target, index) => {
                let index = self.eval(index)?;
                match self.eval(target)? {
                    Cow::Borrowed(v) => subscript(v, &index),
                    Cow::Owned(v) => subscript(&v, &index).map(|c| Cow::Owned(c.into_owned())),
                }
            }
            Expr::Get {
                target,
                key,
                default,
            } => {
                let evaluated;
                let map = if matches!(**target, Expr::State) {
                    self.scope
                } else {
                    evaluated = self.eval(target)?;
                    match evaluated.as_ref() {
                        Value::Object(map) => map,
                        other => {
                            return Err(GuardError::Type(format!(
                                "'.get' needs an object, found {}",
                                type_name(other)
                            )))
                        }
                    }
                };
                let key = self.eval(key)?;
                let Value::String(key) = key.as_ref() else {
                    return Err(GuardError::Type(format!(
                        "object keys are strings, found {}",
                        type_name(&key)
                    )));
                };
                match (map.get(key), default) {
                    (Some(found), _) => Ok(Cow::Owned(found.clone())),
                    (None, Some(default)) => self.eval(default),
                    (None, None) => Ok(Cow::Owned(Value::Null)),
                }
            }
            Expr::Neg(operand) => {
                let value = self.eval(operand)?;
                match number(&value) {
                    Some(Num::Int(i)) => Ok(Cow::Owned(match i.checked_neg() {
                        Some(n) => Value::from(n),
                        None => float_value(-(i as f64))?,
                    })),
                    Some(Num::Float(f)) => Ok(Cow::Owned(float_value(-f)?)),
                    None => Err(GuardError::Type(format!(
                        "cannot negate {}",
                        type_name(&value)
                    ))),
                }
            }
            Expr::Not(operand) => {
                let value = self.eval(operand)?;
                Ok(Cow::Owned(Value::Bool(!truthy(&value))))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if truthy(&left) {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if truthy(&left) {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Arith(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                arith(*op, &left, &right).map(Cow::Owned)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                for (op, right) in rest {
                    let right = self.eval(right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Cow::Owned(Value::Bool(false)));
                    }
                    left = right;
                }
                Ok(Cow::Owned(Value::Bool(true)))
            }
        }
    }

    fn lookup(&self, key: &str) -> Result<&'a Value, GuardError> {
        self.scope
            .get(key)
            .ok_or_else(|| GuardError::MissingKey(key.to_string()))
    }
}

/// Truthiness: null, false, zero and empty strings or collections are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn field<'v>(value: &'v Value, name: &str) -> Result<&'v Value, GuardError> {
    match value {
        Value::Object(map) => map
            .get(name)
            .ok_or_else(|| GuardError::MissingKey(name.to_string())),
        other => Err(GuardError::Type(format!(
            "cannot read field '{}' of {}",
            name,
            type_name(other)
        ))),
    }
}

fn subscript<'v>(value: &'v Value, index: &Value) -> Result<Cow<'v, Value>, GuardError> {
    match (value, index) {
        (Value::Object(_), Value::String(key)) => field(value, key).map(Cow::Borrowed),
        (Value::Array(items), _) => {
            let pos = resolve_index(index, items.len())?;
            Ok(Cow::Borrowed(&items[pos]))
        }
        (Value::String(s), _) => {
            let len = s.chars().count();
            let pos = resolve_index(index, len)?;
            let ch = s.chars().nth(pos).map(String::from).unwrap_or_default();
            Ok(Cow::Owned(Value::String(ch)))
        }
        (container, index) => Err(GuardError::Type(format!(
            "cannot index {} with {}",
            type_name(container),
            type_name(index)
        ))),
    }
}

/// Turn a possibly negative index into a position within `len`.
fn resolve_index(index: &Value, len: usize) -> Result<usize, GuardError> {
    let Some(i) = index.as_i64() else {
        return Err(GuardError::Type(format!(
            "indices must be integers, found {}",
            type_name(index)
        )));
    };
    let pos = if i < 0 { i + len as i64 } else { i };
    if pos < 0 || pos >= len as i64 {
        return Err(GuardError::IndexOutOfRange { index: i, len });
    }
    Ok(pos as usize)
}

#[derive(Clone, Copy, Debug)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn number(value: &Value) -> Option<Num> {
    let Value::Number(n) = value else {
        return None;
    };
    match n.as_i64() {
        Some(i) => Some(Num::Int(i)),
        None => n.as_f64().map(Num::Float),
    }
}

fn float_value(f: f64) -> Result<Value, GuardError> {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| GuardError::Type(format!("result {} is not a finite number", f)))
}

fn arith(op: ArithOp, left: &Value, right: &Value) -> Result<Value, GuardError> {
    match (op, left, right) {
        (ArithOp::Add, Value::String(a), Value::String(b)) => {
            return Ok(Value::String(format!("{}{}", a, b)));
        }
        (ArithOp::Add, Value::Array(a), Value::Array(b)) => {
            return Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (number(left), number(right)) else {
        return Err(GuardError::Type(format!(
            "unsupported operand types for {:?}: {} and {}",
            op,
            type_name(left),
            type_name(right)
        )));
    };

    if matches!(op, ArithOp::Div | ArithOp::Rem) && b.as_f64() == 0.0 {
        return Err(GuardError::DivisionByZero);
    }

    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let exact = match op {
            ArithOp::Add => x.checked_add(y),
            ArithOp::Sub => x.checked_sub(y),
            ArithOp::Mul => x.checked_mul(y),
            ArithOp::Rem => x.checked_rem_euclid(y).map(|r| {
                // Result takes the sign of the divisor
                if r != 0 && y < 0 {
                    r + y
                } else {
                    r
                }
            }),
            ArithOp::Div => None,
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
        ArithOp::Div => x / y,
        ArithOp::Rem => x - y * (x / y).floor(),
    };
    float_value(result)
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => match (number(left), number(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
            (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
            _ => false,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => left == right,
    }
}

fn ordering(left: &Value, right: &Value) -> Result<Ordering, GuardError> {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => match (number(left), number(right)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
            (Some(a), Some(b)) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .ok_or_else(|| GuardError::Type("numbers are not comparable".into())),
            _ => Err(GuardError::Type("numbers are not comparable".into())),
        },
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match ordering(x, y)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(GuardError::Type(format!(
            "cannot order {} and {}",
            type_name(left),
            type_name(right)
        ))),
    }
}

fn contains(needle: &Value, haystack: &Value) -> Result<bool, GuardError> {
    match (needle, haystack) {
        (Value::String(n), Value::String(h)) => Ok(h.contains(n.as_str())),
        (_, Value::Array(items)) => Ok(items.iter().any(|item| values_equal(needle, item))),
        (Value::String(key), Value::Object(map)) => Ok(map.contains_key(key)),
        _ => Err(GuardError::Type(format!(
            "'in' is not supported between {} and {}",
            type_name(needle),
            type_name(haystack)
        ))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, GuardError> {
    Ok(match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::NotEq => !values_equal(left, right),
        CompareOp::Lt => ordering(left, right)? == Ordering::Less,
        CompareOp::LtEq => ordering(left, right)? != Ordering::Greater,
        CompareOp::Gt => ordering(left, right)? == Ordering::Greater,
        CompareOp::GtEq => ordering(left, right)? != Ordering::Less,
        CompareOp::In => contains(left, right)?,
        CompareOp::NotIn => !contains(left, right)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::parser::Parser;
    use super::*;
    use serde_json::json;

    fn eval(src: &str, scope: Value) -> Result<Value, GuardError> {
        let expr = Parser::parse(src).unwrap();
        let scope = scope.as_object().cloned().unwrap_or_default();
        let evaluator = Evaluator::new(&scope);
        evaluator.eval(&expr).map(Cow::into_owned)
    }

    #[test]
    fn test_field_and_subscript_access() {
        let scope = json!({"x": 3, "issues": ["a", "b"], "meta": {"name": "f"}});
        assert_eq!(eval("state.x", scope.clone()).unwrap(), json!(3));
        assert_eq!(eval("state['issues'][1]", scope.clone()).unwrap(), json!("b"));
        assert_eq!(eval("state.issues[-1]", scope.clone()).unwrap(), json!("b"));
        assert_eq!(eval("state.meta.name[0]", scope).unwrap(), json!("f"));
    }

    #[test]
    fn test_state_as_whole_value() {
        let scope = json!({"a": 1});
        assert_eq!(eval("state", scope.clone()).unwrap(), json!({"a": 1}));
        assert_eq!(eval("'a' in state", scope.clone()).unwrap(), json!(true));
        assert!(matches!(eval("state[0]", scope), Err(GuardError::Type(_))));
    }

    #[test]
    fn test_missing_key_is_error() {
        let err = eval("state.missing > 1", json!({})).unwrap_err();
        assert_eq!(err, GuardError::MissingKey("missing".into()));
    }

    #[test]
    fn test_get_with_default() {
        let scope = json!({"count": 2});
        assert_eq!(eval("state.get('count', 0)", scope.clone()).unwrap(), json!(2));
        assert_eq!(eval("state.get('other', 7)", scope.clone()).unwrap(), json!(7));
        assert_eq!(eval("state.get('other')", scope).unwrap(), Value::Null);
    }

    #[test]
    fn test_comparisons_and_chaining() {
        let scope = json!({"n": 5, "score": 7.5});
        assert_eq!(eval("state.n > 4", scope.clone()).unwrap(), json!(true));
        assert_eq!(eval("state.n == 5.0", scope.clone()).unwrap(), json!(true));
        assert_eq!(eval("0 < state.n <= 5", scope.clone()).unwrap(), json!(true));
        assert_eq!(eval("0 < state.n < 5", scope.clone()).unwrap(), json!(false));
        assert_eq!(eval("state.score >= 7", scope).unwrap(), json!(true));
    }

    #[test]
    fn test_mixed_type_ordering_is_error() {
        let err = eval("state.name > 1", json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, GuardError::Type(_)));
        // equality across types is simply false
        assert_eq!(eval("state.name == 1", json!({"name": "x"})).unwrap(), json!(false));
    }

    #[test]
    fn test_membership() {
        let scope = json!({"tags": ["a", "b"], "code": "print(x)", "m": {"k": 1}});
        assert_eq!(eval("'a' in state.tags", scope.clone()).unwrap(), json!(true));
        assert_eq!(eval("'z' not in state.tags", scope.clone()).unwrap(), json!(true));
        assert_eq!(eval("'print(' in state.code", scope.clone()).unwrap(), json!(true));
        assert_eq!(eval("'k' in state.m", scope.clone()).unwrap(), json!(true));
        assert!(eval("1 in state.code", scope).is_err());
    }

    #[test]
    fn test_boolean_operators_short_circuit() {
        // right side would fail on a missing key, but is never evaluated
        assert_eq!(eval("false and state.nope", json!({})).unwrap(), json!(false));
        assert_eq!(eval("true or state.nope", json!({})).unwrap(), json!(true));
        assert_eq!(eval("state.a or 'fallback'", json!({"a": ""})).unwrap(), json!("fallback"));
        assert_eq!(eval("not state.items", json!({"items": []})).unwrap(), json!(true));
    }

    #[test]
    fn test_arithmetic() {
        let scope = json!({"a": 7, "b": 2, "f": 1.5});
        assert_eq!(eval("state.a + state.b", scope.clone()).unwrap(), json!(9));
        assert_eq!(eval("state.a / state.b", scope.clone()).unwrap(), json!(3.5));
        assert_eq!(eval("state.a % state.b", scope.clone()).unwrap(), json!(1));
        assert_eq!(eval("-7 % 3", scope.clone()).unwrap(), json!(2));
        assert_eq!(eval("state.f * 2", scope.clone()).unwrap(), json!(3.0));
        assert_eq!(eval("-state.a", scope.clone()).unwrap(), json!(-7));
        assert_eq!(eval("'ab' + 'c'", scope.clone()).unwrap(), json!("abc"));
        assert_eq!(eval("[1] + [2]", scope.clone()).unwrap(), json!([1, 2]));
        assert_eq!(eval("state.a / 0", scope).unwrap_err(), GuardError::DivisionByZero);
    }

    #[test]
    fn test_index_out_of_range() {
        let err = eval("state.items[3]", json!({"items": [1]})).unwrap_err();
        assert_eq!(err, GuardError::IndexOutOfRange { index: 3, len: 1 });
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&json!(null)));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!(0.0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!({})));
        assert!(truthy(&json!([0])));
        assert!(truthy(&json!(-1)));
    }
}
