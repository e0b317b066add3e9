// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tree-walking interpreter for parsed scripts.

use crate::error::ScriptError;
use crate::script::parser::{BinOp, Expr, Program, Stmt, UnaryOp};
use crate::value::{DictKey, Value};
use indexmap::IndexMap;
use std::cmp::Ordering;

type EvalResult<T> = Result<T, ScriptError>;

/// Longest string or list a repetition may produce
const MAX_SEQUENCE_LEN: usize = 1 << 24;

fn fail<T>(message: impl Into<String>) -> EvalResult<T> {
    Err(ScriptError::Eval(message.into()))
}

/// Evaluates expressions with `{reference}` values supplied by a resolver
pub struct Interpreter<'a> {
    resolve: &'a dyn Fn(&str) -> EvalResult<Value>,
    locals: IndexMap<String, Value>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter with a reference resolver
    pub fn new(resolve: &'a dyn Fn(&str) -> EvalResult<Value>) -> Self {
        Self { resolve, locals: IndexMap::new() }
    }

    /// Seed a local variable
    pub fn with_local(mut self, name: impl Into<String>, value: Value) -> Self {
        self.locals.insert(name.into(), value);
        self
    }

    /// Local variables after running a body
    pub fn into_locals(self) -> IndexMap<String, Value> {
        self.locals
    }

    /// Run a program and return its value (`None` for a body without `return`)
    pub fn run(&mut self, program: &Program) -> EvalResult<Value> {
        match program {
            Program::Expr(expr) => self.eval(expr),
            Program::Body(body) => Ok(self.exec_block(body)?.unwrap_or(Value::None)),
        }
    }

    fn exec_block(&mut self, block: &[Stmt]) -> EvalResult<Option<Value>> {
        for stmt in block {
            match stmt {
                Stmt::Assign(name, expr) => {
                    let value = self.eval(expr)?;
                    self.locals.insert(name.clone(), value);
                }
                Stmt::Return(expr) => return self.eval(expr).map(Some),
                Stmt::If { branches, otherwise } => {
                    let mut taken = None;
                    for (cond, body) in branches {
                        if self.eval(cond)?.truthy() {
                            taken = Some(body);
                            break;
                        }
                    }
                    let body = taken.unwrap_or(otherwise);
                    if let Some(value) = self.exec_block(body)? {
                        return Ok(Some(value));
                    }
                }
                Stmt::Pass => {}
            }
        }
        Ok(None)
    }

    /// Evaluate one expression
    pub fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ref(token) => (self.resolve)(token),
            Expr::Name(name) => match self.locals.get(name) {
                Some(v) => Ok(v.clone()),
                None => fail(format!("name '{name}' is not defined")),
            },
            Expr::List(items) => items.iter().map(|e| self.eval(e)).collect::<EvalResult<Vec<_>>>().map(Value::List),
            Expr::Dict(entries) => {
                let mut map = IndexMap::new();
                for (k, v) in entries {
                    let key = to_key(&self.eval(k)?)?;
                    let value = self.eval(v)?;
                    map.insert(key, value);
                }
                Ok(Value::Dict(map))
            }
            Expr::Unary(op, operand) => {
                let v = self.eval(operand)?;
                match (op, v) {
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.truthy())),
                    (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).map_or_else(|| fail("integer overflow"), Ok),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (UnaryOp::Neg, Value::Bool(b)) => Ok(Value::Int(-i64::from(b))),
                    (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
                    (UnaryOp::Pos, Value::Bool(b)) => Ok(Value::Int(i64::from(b))),
                    (_, v) => fail(format!("bad operand type for unary operator: {}", v.type_name())),
                }
            }
            Expr::And(lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy() {
                    self.eval(rhs)
                } else {
                    Ok(l)
                }
            }
            Expr::Or(lhs, rhs) => {
                let l = self.eval(lhs)?;
                if l.truthy() {
                    Ok(l)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Cond { then, cond, otherwise } => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs)?;
                let r = self.eval(rhs)?;
                binary(*op, l, r)
            }
            Expr::Index(target, index) => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                index_value(&target, &index)
            }
            Expr::Call(name, args) => {
                let args = args.iter().map(|a| self.eval(a)).collect::<EvalResult<Vec<_>>>()?;
                call_builtin(name, args)
            }
        }
    }
}

fn to_key(v: &Value) -> EvalResult<DictKey> {
    match v {
        Value::Str(s) => Ok(DictKey::Str(s.clone())),
        Value::Int(i) => Ok(DictKey::Int(*i)),
        Value::Bool(b) => Ok(DictKey::Int(i64::from(*b))),
        other => fail(format!("unhashable dict key type: {}", other.type_name())),
    }
}

fn is_number(v: &Value) -> bool {
    matches!(v, Value::Bool(_) | Value::Int(_) | Value::Float(_))
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y)),
        _ if is_number(l) && is_number(r) => match (l.as_i64(), r.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => l.as_f64() == r.as_f64(),
        },
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value) -> EvalResult<Ordering> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ord = compare(x, y)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ if is_number(l) && is_number(r) => match (l.as_i64(), r.as_i64()) {
            (Some(a), Some(b)) => Ok(a.cmp(&b)),
            _ => {
                let (a, b) = (l.as_f64().unwrap_or(f64::NAN), r.as_f64().unwrap_or(f64::NAN));
                a.partial_cmp(&b).map_or_else(|| fail("cannot compare NaN"), Ok)
            }
        },
        _ => fail(format!("cannot compare {} and {}", l.type_name(), r.type_name())),
    }
}

fn contains(container: &Value, item: &Value) -> EvalResult<bool> {
    match container {
        Value::Str(s) => match item {
            Value::Str(sub) => Ok(s.contains(sub.as_str())),
            other => fail(format!("'in <string>' requires string as left operand, not {}", other.type_name())),
        },
        Value::List(items) => Ok(items.iter().any(|v| values_equal(v, item))),
        Value::Dict(map) => Ok(map.contains_key(&to_key(item)?)),
        other => fail(format!("argument of type {} is not iterable", other.type_name())),
    }
}

fn arithmetic(op: BinOp, l: &Value, r: &Value) -> EvalResult<Value> {
    if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
        let overflow = || ScriptError::Eval("integer overflow".to_string());
        return match op {
            BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Div if b == 0 => fail("division by zero"),
            BinOp::Div => Ok(Value::Float(a as f64 / b as f64)),
            BinOp::FloorDiv | BinOp::Mod if b == 0 => fail("integer division or modulo by zero"),
            BinOp::FloorDiv => {
                let q = a.checked_div_euclid(b).ok_or_else(overflow)?;
                Ok(Value::Int(q - i64::from(b < 0 && a.rem_euclid(b) != 0)))
            }
            BinOp::Mod => {
                // Only `i64::MIN % -1` overflows, and its remainder is 0.
                let m = a.checked_rem_euclid(b).unwrap_or(0);
                Ok(Value::Int(if b < 0 && m != 0 { m + b } else { m }))
            }
            BinOp::Pow if b >= 0 => u32::try_from(b)
                .ok()
                .and_then(|e| a.checked_pow(e))
                .map(Value::Int)
                .ok_or_else(overflow),
            BinOp::Pow => Ok(Value::Float((a as f64).powf(b as f64))),
            _ => fail("unsupported operator"),
        };
    }

    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return fail(format!(
            "unsupported operand types for {op:?}: {} and {}",
            l.type_name(),
            r.type_name()
        ));
    };
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div | BinOp::FloorDiv | BinOp::Mod if b == 0.0 => fail("float division by zero"),
        BinOp::Div => Ok(Value::Float(a / b)),
        BinOp::FloorDiv => Ok(Value::Float((a / b).floor())),
        BinOp::Mod => Ok(Value::Float(a - b * (a / b).floor())),
        BinOp::Pow => Ok(Value::Float(a.powf(b))),
        _ => fail("unsupported operator"),
    }
}

fn repeat<T: Clone>(items: &[T], times: i64) -> EvalResult<Vec<T>> {
    let times = usize::try_from(times).unwrap_or(0);
    match items.len().checked_mul(times) {
        Some(len) if len <= MAX_SEQUENCE_LEN => Ok(items.iter().cloned().cycle().take(len).collect()),
        _ => fail("repeated sequence is too long"),
    }
}

fn binary(op: BinOp, l: Value, r: Value) -> EvalResult<Value> {
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinOp::Lt => Ok(Value::Bool(compare(&l, &r)? == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(compare(&l, &r)? != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(compare(&l, &r)? == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(compare(&l, &r)? != Ordering::Less)),
        BinOp::In => contains(&r, &l).map(Value::Bool),
        BinOp::NotIn => contains(&r, &l).map(|b| Value::Bool(!b)),
        BinOp::Add => match (l, r) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (l, r) => arithmetic(op, &l, &r),
        },
        BinOp::Mul => match (l, r) {
            (Value::Str(s), n) | (n, Value::Str(s)) if n.as_i64().is_some() => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Value::Str(repeat(&chars, n.as_i64().unwrap_or(0))?.into_iter().collect()))
            }
            (Value::List(items), n) | (n, Value::List(items)) if n.as_i64().is_some() => {
                Ok(Value::List(repeat(&items, n.as_i64().unwrap_or(0))?))
            }
            (l, r) => arithmetic(op, &l, &r),
        },
        BinOp::Mod if matches!(l, Value::Str(_)) => fail("string formatting is not supported"),
        _ => arithmetic(op, &l, &r),
    }
}

fn normalize_index(index: &Value, len: usize) -> EvalResult<usize> {
    let Some(i) = index.as_i64() else {
        return fail(format!("indices must be integers, not {}", index.type_name()));
    };
    let len = len as i64;
    let i = if i < 0 { i + len } else { i };
    if i < 0 || i >= len {
        return fail("index out of range");
    }
    Ok(i as usize)
}

fn index_value(target: &Value, index: &Value) -> EvalResult<Value> {
    match target {
        Value::List(items) => Ok(items[normalize_index(index, items.len())?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[normalize_index(index, chars.len())?].to_string()))
        }
        Value::Dict(map) => {
            let key = to_key(index)?;
            map.get(&key)
                .or_else(|| match &key {
                    DictKey::Int(i) => map.get(&DictKey::Str(i.to_string())),
                    DictKey::Str(_) => None,
                })
                .cloned()
                .map_or_else(|| fail(format!("key not found: {key}")), Ok)
        }
        other => fail(format!("{} is not subscriptable", other.type_name())),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> EvalResult<()> {
    if args.len() < min || args.len() > max {
        return fail(format!("{name}() takes {min}..{max} arguments, {} given", args.len()));
    }
    Ok(())
}

fn call_builtin(name: &str, args: Vec<Value>) -> EvalResult<Value> {
    match name {
        "str" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Str(args.first().map(ToString::to_string).unwrap_or_default()))
        }
        "int" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Int(0)),
                Some(Value::Str(s)) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_or_else(|_| fail(format!("invalid literal for int(): {s:?}")), Ok),
                Some(Value::Float(f)) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
                Some(v) => v.as_i64().map(Value::Int).map_or_else(|| fail(format!("int() argument must be a number, not {}", v.type_name())), Ok),
            }
        }
        "float" => {
            arity(name, &args, 0, 1)?;
            match args.first() {
                None => Ok(Value::Float(0.0)),
                Some(Value::Str(s)) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_or_else(|_| fail(format!("could not convert string to float: {s:?}")), Ok),
                Some(v) => v.as_f64().map(Value::Float).map_or_else(|| fail(format!("float() argument must be a number, not {}", v.type_name())), Ok),
            }
        }
        "bool" => {
            arity(name, &args, 0, 1)?;
            Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
        }
        "len" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(l) => Ok(Value::Int(l.len() as i64)),
                Value::Dict(d) => Ok(Value::Int(d.len() as i64)),
                other => fail(format!("object of type {} has no len()", other.type_name())),
            }
        }
        "abs" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Int(i) => i.checked_abs().map(Value::Int).map_or_else(|| fail("integer overflow"), Ok),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                other => fail(format!("bad operand type for abs(): {}", other.type_name())),
            }
        }
        "min" | "max" => {
            let items = match args.as_slice() {
                [Value::List(items)] => items.clone(),
                [] => return fail(format!("{name}() expected at least 1 argument")),
                _ => args,
            };
            let mut best: Option<Value> = None;
            for item in items {
                best = match best {
                    None => Some(item),
                    Some(current) => {
                        let ord = compare(&item, &current)?;
                        let better = if name == "min" { ord == Ordering::Less } else { ord == Ordering::Greater };
                        Some(if better { item } else { current })
                    }
                };
            }
            best.map_or_else(|| fail(format!("{name}() arg is an empty sequence")), Ok)
        }
        "round" => {
            arity(name, &args, 1, 2)?;
            let Some(x) = args[0].as_f64() else {
                return fail(format!("round() argument must be a number, not {}", args[0].type_name()));
            };
            match args.get(1) {
                None => Ok(Value::Int(round_half_even(x) as i64)),
                Some(digits) => {
                    let digits = digits.as_i64().unwrap_or(0);
                    let factor = 10f64.powi(i32::try_from(digits).unwrap_or(0));
                    Ok(Value::Float(round_half_even(x * factor) / factor))
                }
            }
        }
        "upper" | "lower" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Str(s) if name == "upper" => Ok(Value::Str(s.to_uppercase())),
                Value::Str(s) => Ok(Value::Str(s.to_lowercase())),
                other => fail(format!("{name}() argument must be a string, not {}", other.type_name())),
            }
        }
        other => fail(format!("unknown function '{other}'")),
    }
}

fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse_program;

    fn eval_with(code: &str, resolve: &dyn Fn(&str) -> EvalResult<Value>) -> EvalResult<Value> {
        let program = parse_program(code)?;
        Interpreter::new(resolve).run(&program)
    }

    fn eval(code: &str) -> EvalResult<Value> {
        eval_with(code, &|token| fail(format!("no reference {token}")))
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Int(7));
        assert_eq!(eval("7 / 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("-7 // 2").unwrap(), Value::Int(-4));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Int(2));
        assert_eq!(eval("2 ** 10").unwrap(), Value::Int(1024));
        assert_eq!(eval("1.5 + 1").unwrap(), Value::Float(2.5));
        assert!(eval("1 / 0").is_err());
    }

    #[test]
    fn test_integer_edge_cases() {
        assert_eq!(eval("7 // -2").unwrap(), Value::Int(-4));
        assert_eq!(eval("-7 // -2").unwrap(), Value::Int(3));
        assert_eq!(eval("-7 % 2").unwrap(), Value::Int(1));
        assert_eq!(eval("7 % -2").unwrap(), Value::Int(-1));
        assert_eq!(eval("-7.0 % 2").unwrap(), Value::Float(1.0));
        assert!(eval("1 // 0").is_err());
        assert!(eval("1 % 0").is_err());
        assert!(eval("1.0 // 0").is_err());

        assert!(matches!(eval("9223372036854775807 + 1"), Err(ScriptError::Eval(_))));
        assert!(matches!(eval("(-9223372036854775807 - 1) // -1"), Err(ScriptError::Eval(_))));
        assert_eq!(eval("(-9223372036854775807 - 1) % -1").unwrap(), Value::Int(0));
        assert!(matches!(eval("abs(-9223372036854775807 - 1)"), Err(ScriptError::Eval(_))));
        assert!(matches!(eval("-(-9223372036854775807 - 1)"), Err(ScriptError::Eval(_))));
        assert!(eval("2 ** 64").is_err());
    }

    #[test]
    fn test_sequence_repeat_limits() {
        assert_eq!(eval("'ab' * -1").unwrap(), Value::from(""));
        assert_eq!(eval("3 * [0]").unwrap(), Value::from(vec![0, 0, 0]));
        assert!(matches!(eval("'abc' * 9223372036854775807"), Err(ScriptError::Eval(_))));
        assert!(matches!(eval("[1] * 100000000"), Err(ScriptError::Eval(_))));
    }

    #[test]
    fn test_strings_and_lists() {
        assert_eq!(eval("'a' + 'b' * 2").unwrap(), Value::from("abb"));
        assert_eq!(eval("[1, 2] + [3]").unwrap(), Value::from(vec![1, 2, 3]));
        assert_eq!(eval("[1, 2, 3][-1]").unwrap(), Value::Int(3));
        assert_eq!(eval("{'a': 1}['a']").unwrap(), Value::Int(1));
        assert!(eval("'a' + 1").is_err());
        assert_eq!(eval("'x' + str(1)").unwrap(), Value::from("x1"));
    }

    #[test]
    fn test_logic_and_comparison() {
        assert_eq!(eval("1 < 2 and 'b' >= 'a'").unwrap(), Value::Bool(true));
        assert_eq!(eval("0 or 'fallback'").unwrap(), Value::from("fallback"));
        assert_eq!(eval("not []").unwrap(), Value::Bool(true));
        assert_eq!(eval("1 == 1.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("2 in [1, 2]").unwrap(), Value::Bool(true));
        assert_eq!(eval("'z' not in 'abc'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'yes' if 3 > 2 else 'no'").unwrap(), Value::from("yes"));
    }

    #[test]
    fn test_builtins() {
        assert_eq!(eval("len('abc') + len([1])").unwrap(), Value::Int(4));
        assert_eq!(eval("int('42') + int(2.9)").unwrap(), Value::Int(44));
        assert_eq!(eval("max(1, 5, 3)").unwrap(), Value::Int(5));
        assert_eq!(eval("min([4, 2])").unwrap(), Value::Int(2));
        assert_eq!(eval("round(2.5)").unwrap(), Value::Int(2));
        assert_eq!(eval("upper('ab')").unwrap(), Value::from("AB"));
        assert!(eval("open('x')").is_err());
    }

    #[test]
    fn test_references() {
        let resolve = |token: &str| match token {
            "a.x" => Ok(Value::Int(4)),
            "$HOME" => Ok(Value::from("/home")),
            other => fail(format!("unknown {other}")),
        };
        assert_eq!(eval_with("{a.x} * 2", &resolve).unwrap(), Value::Int(8));
        assert_eq!(eval_with("{$HOME} + '/x'", &resolve).unwrap(), Value::from("/home/x"));
        assert!(eval_with("{b.y}", &resolve).is_err());
    }

    #[test]
    fn test_function_body() {
        let resolve = |_: &str| Ok(Value::Int(5));
        let code = "v = {a.x} * 2\nif v > 100:\n    return 'big'\nelif v > 5:\n    return 'medium'\nreturn 'small'";
        assert_eq!(eval_with(code, &resolve).unwrap(), Value::from("medium"));
    }
}
