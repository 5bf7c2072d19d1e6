use super::ast::{BinaryOp, Expr, ExprKind, UnaryOp, Value, ValueType};
use super::env::Env;
use crate::error::Error;

pub fn evaluate(expr: &Expr, env: &mut Env) -> Result<Value, Error> {
    match &expr.kind {
        ExprKind::Literal(value) => Ok(value.clone()),
        ExprKind::Variable(name) => env.get(name).cloned(),
        ExprKind::Unary(op, operand) => {
            let value = evaluate(operand, env)?;
            unary(*op, value)
        }
        ExprKind::Binary(BinaryOp::LogAnd, lhs, rhs) => {
            if expect_bool(evaluate(lhs, env)?)? {
                Ok(Value::Bool(expect_bool(evaluate(rhs, env)?)?))
            } else {
                Ok(Value::Bool(false))
            }
        }
        ExprKind::Binary(BinaryOp::LogOr, lhs, rhs) => {
            if expect_bool(evaluate(lhs, env)?)? {
                Ok(Value::Bool(true))
            } else {
                Ok(Value::Bool(expect_bool(evaluate(rhs, env)?)?))
            }
        }
        ExprKind::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, env)?;
            let rhs = evaluate(rhs, env)?;
            binary(*op, lhs, rhs)
        }
        ExprKind::Assign(target, value) => match &target.kind {
            ExprKind::Variable(name) => {
                let value = evaluate(value, env)?;
                env.set(name, value)
            }
            _ => Err(Error::InvalidAssignmentTarget),
        },
        ExprKind::Cond(cond, then, other) => {
            if expect_bool(evaluate(cond, env)?)? {
                evaluate(then, env)
            } else {
                evaluate(other, env)
            }
        }
        ExprKind::Call(name, args) => call(name, args, env),
    }
}

fn expect_bool(value: Value) -> Result<bool, Error> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(Error::mismatch(ValueType::Bool, other.ty())),
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, Error> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOp::Neg, Value::Real(r)) => Ok(Value::Real(-r)),
        (UnaryOp::Neg, v) => Err(Error::mismatch("int or real", v.ty())),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Not, v) => Err(Error::mismatch(ValueType::Bool, v.ty())),
    }
}

fn as_real(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Real(r) => Some(*r),
        _ => None,
    }
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, Error> {
    use BinaryOp::*;

    if op == Add && (lhs.ty() == ValueType::Str || rhs.ty() == ValueType::Str) {
        return Ok(Value::Str(format!("{lhs}{rhs}")));
    }

    match op {
        Add | Sub | Mul | Div | Rem => arithmetic(op, lhs, rhs),
        And | Or | Xor | Shl | Shr => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
                And => a & b,
                Or => a | b,
                Xor => a ^ b,
                Shl => a.wrapping_shl(b as u32),
                _ => a.wrapping_shr(b as u32),
            })),
            (Value::Int(_), v) | (v, _) => Err(Error::mismatch(ValueType::Int, v.ty())),
        },
        Eq | Ne => {
            let equal = match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::Bool(a), Value::Bool(b)) => a == b,
                (Value::Int(a), Value::Int(b)) => a == b,
                (a, b) => match (as_real(a), as_real(b)) {
                    (Some(a), Some(b)) => a == b,
                    _ => return Err(Error::mismatch(lhs.ty(), rhs.ty())),
                },
            };
            Ok(Value::Bool(if op == Eq { equal } else { !equal }))
        }
        Lt | Le | Gt | Ge => {
            let ord = match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                (a, b) => match (as_real(a), as_real(b)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => return Err(Error::mismatch(lhs.ty(), rhs.ty())),
                },
            };
            // NaN compares false with everything
            let Some(ord) = ord else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                Lt => ord.is_lt(),
                Le => ord.is_le(),
                Gt => ord.is_gt(),
                _ => ord.is_ge(),
            }))
        }
        Concat => Ok(Value::Str(format!("{lhs}{rhs}"))),
        LogAnd => Ok(Value::Bool(expect_bool(lhs)? && expect_bool(rhs)?)),
        LogOr => Ok(Value::Bool(expect_bool(lhs)? || expect_bool(rhs)?)),
    }
}

fn arithmetic(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, Error> {
    use BinaryOp::*;
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            if matches!(op, Div | Rem) && b == 0 {
                return Err(Error::ArithmeticError(format!("{a} {} 0", symbol(op))));
            }
            Ok(Value::Int(match op {
                Add => a.wrapping_add(b),
                Sub => a.wrapping_sub(b),
                Mul => a.wrapping_mul(b),
                Div => a.wrapping_div(b),
                _ => a.wrapping_rem(b),
            }))
        }
        (a, b) => {
            let (Some(a), Some(b)) = (as_real(a), as_real(b)) else {
                let bad = if as_real(a).is_none() { a } else { b };
                return Err(Error::mismatch("int or real", bad.ty()));
            };
            if matches!(op, Div | Rem) && b == 0.0 {
                return Err(Error::ArithmeticError(format!("{a} {} 0", symbol(op))));
            }
            Ok(Value::Real(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            }))
        }
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Div => "/",
        _ => "%",
    }
}

// ----------------------------------------------------------------------------
// Built-in functions
// ----------------------------------------------------------------------------

fn call(name: &str, args: &[Expr], env: &mut Env) -> Result<Value, Error> {
    let arity = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(Error::ArgumentCountMismatch(
                name.to_string(),
                format!("expected {n}, found {}", args.len()),
            ))
        }
    };
    match name {
        "uniqueG" => {
            arity(0)?;
            Ok(Value::Int(env.unique_global()))
        }
        "uniqueL" => {
            arity(0)?;
            Ok(Value::Int(env.unique_local()))
        }
        "exists" => {
            arity(1)?;
            // a bare name is tested, not evaluated
            match &args[0].kind {
                ExprKind::Variable(var) => Ok(Value::Bool(env.exists(var))),
                _ => match evaluate(&args[0], env)? {
                    Value::Str(var) => Ok(Value::Bool(env.exists(&var))),
                    v => Err(Error::mismatch(ValueType::Str, v.ty())),
                },
            }
        }
        "int" => {
            arity(1)?;
            match evaluate(&args[0], env)? {
                Value::Int(n) => Ok(Value::Int(n)),
                Value::Real(r) => Ok(Value::Int(r as i64)),
                Value::Bool(b) => Ok(Value::Int(b as i64)),
                Value::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| Error::ArithmeticError(format!("cannot convert \"{s}\" to int"))),
            }
        }
        "real" => {
            arity(1)?;
            match evaluate(&args[0], env)? {
                Value::Int(n) => Ok(Value::Real(n as f64)),
                Value::Real(r) => Ok(Value::Real(r)),
                Value::Bool(b) => Ok(Value::Real(if b { 1.0 } else { 0.0 })),
                Value::Str(s) => s.trim().parse::<f64>().map(Value::Real).map_err(|_| {
                    Error::ArithmeticError(format!("cannot convert \"{s}\" to real"))
                }),
            }
        }
        "str" => {
            arity(1)?;
            Ok(Value::Str(evaluate(&args[0], env)?.to_string()))
        }
        "bool" => {
            arity(1)?;
            match evaluate(&args[0], env)? {
                Value::Int(n) => Ok(Value::Bool(n != 0)),
                Value::Real(r) => Ok(Value::Bool(r != 0.0)),
                Value::Bool(b) => Ok(Value::Bool(b)),
                Value::Str(s) => match s.trim() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(Error::mismatch(ValueType::Bool, format!("\"{s}\""))),
                },
            }
        }
        "len" => {
            arity(1)?;
            match evaluate(&args[0], env)? {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                v => Err(Error::mismatch(ValueType::Str, v.ty())),
            }
        }
        _ => Err(Error::UnknownFunction(name.to_string())),
    }
}

/// Result type of a built-in function, if `name` is one.
pub fn builtin_type(name: &str) -> Option<(usize, ValueType)> {
    Some(match name {
        "uniqueG" | "uniqueL" => (0, ValueType::Int),
        "exists" => (1, ValueType::Bool),
        "int" | "len" => (1, ValueType::Int),
        "real" => (1, ValueType::Real),
        "str" => (1, ValueType::Str),
        "bool" => (1, ValueType::Bool),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use crate::expr::token::Pos;

    fn eval(text: &str) -> Result<Value, Error> {
        let mut env = Env::new();
        env.declare("i", Value::Int(3));
        env.declare("s", Value::Str("abc".into()));
        evaluate(&parse(text, Pos::new(1, 1)).unwrap(), &mut env)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("(2+1)*4-2").unwrap(), Value::Int(10));
        assert_eq!(eval("7 / 2").unwrap(), Value::Int(3));
        assert_eq!(eval("-7 % 3").unwrap(), Value::Int(-1));
        assert_eq!(eval("1 + 0.5").unwrap(), Value::Real(1.5));
        assert_eq!(eval("9223372036854775807 + 1").unwrap(), Value::Int(i64::MIN));
        assert_eq!(eval("0x10 | 0b1 | 010").unwrap(), Value::Int(25));
        assert_eq!(eval("1 << 4 >> 2").unwrap(), Value::Int(4));
    }

    #[test]
    fn division_by_zero() {
        assert!(matches!(eval("10 / 0"), Err(Error::ArithmeticError(_))));
        assert!(matches!(eval("10 % 0"), Err(Error::ArithmeticError(_))));
        assert!(matches!(eval("1.0 / 0"), Err(Error::ArithmeticError(_))));
    }

    #[test]
    fn strings() {
        assert_eq!(eval("s + 1").unwrap(), Value::Str("abc1".into()));
        assert_eq!(eval("1 # 2").unwrap(), Value::Str("12".into()));
        assert_eq!(eval("\"a\" < \"b\"").unwrap(), Value::Bool(true));
        assert_eq!(eval("len(s)").unwrap(), Value::Int(3));
        assert_eq!(eval("str(2.0)").unwrap(), Value::Str("2.0".into()));
    }

    #[test]
    fn logic() {
        assert_eq!(eval("i > 2 && i < 4").unwrap(), Value::Bool(true));
        // short circuit skips the failing division
        assert_eq!(eval("false && 1 / 0 == 0").unwrap(), Value::Bool(false));
        assert_eq!(eval("i == 3 ? \"y\" : \"n\"").unwrap(), Value::Str("y".into()));
        assert!(matches!(eval("!1"), Err(Error::TypeMismatch { .. })));
        assert!(matches!(eval("true < false"), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn assignment() {
        assert_eq!(eval("i = i + 1").unwrap(), Value::Int(4));
        assert!(matches!(eval("1 = 2"), Err(Error::InvalidAssignmentTarget)));
        assert!(matches!(eval("i = \"x\""), Err(Error::TypeMismatch { .. })));
        assert!(matches!(eval("j"), Err(Error::UnboundSymbol(_))));
    }

    #[test]
    fn builtins() {
        assert_eq!(eval("exists(i)").unwrap(), Value::Bool(true));
        assert_eq!(eval("exists(k)").unwrap(), Value::Bool(false));
        assert_eq!(eval("int(\"42\") + int(2.9)").unwrap(), Value::Int(44));
        assert_eq!(eval("bool(0)").unwrap(), Value::Bool(false));
        assert_eq!(eval("real(1)").unwrap(), Value::Real(1.0));
        assert!(matches!(eval("nope()"), Err(Error::UnknownFunction(_))));
        assert!(matches!(
            eval("len()"),
            Err(Error::ArgumentCountMismatch(_, _))
        ));
    }
}
