//! Operator semantics over runtime values.
//!
//! Numbers are promoted to their common kind before any arithmetic or
//! comparison: `float` wins over `int`, `int` over `uint` and `uint`
//! over `bool`. Every other kind only combines with itself.

use std::cmp::Ordering;

use tern_syntax::ast::{BinOp, UnaryOp, UpdateOp};

use crate::{
    error::{make, Error, ErrorKind},
    types::{Type, Value},
};

/// Two numeric operands after promotion to their common kind.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Pair {
    Bool(bool, bool),
    Uint(u64, u64),
    // Wide enough to hold every `int` and every `uint` exactly
    Int(i128, i128),
    Float(f64, f64),
}

fn rank(value: &Value) -> Option<u8> {
    match value {
        Value::Boolean(_) => Some(0),
        Value::Uint(_) => Some(1),
        Value::Int(_) => Some(2),
        Value::Float(_) => Some(3),
        _ => None,
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Boolean(b) => *b as u8 as f64,
        Value::Uint(n) => *n as f64,
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => unreachable!("only numbers are promoted"),
    }
}

fn as_i128(value: &Value) -> i128 {
    match value {
        Value::Boolean(b) => *b as i128,
        Value::Uint(n) => *n as i128,
        Value::Int(n) => *n as i128,
        _ => unreachable!("floats are never narrowed by promotion"),
    }
}

fn as_u64(value: &Value) -> u64 {
    match value {
        Value::Boolean(b) => *b as u64,
        Value::Uint(n) => *n,
        _ => unreachable!("only bools are promoted to uint"),
    }
}

fn promote(lhs: &Value, rhs: &Value) -> Option<Pair> {
    let pair = match rank(lhs)?.max(rank(rhs)?) {
        0 => match (lhs, rhs) {
            (Value::Boolean(a), Value::Boolean(b)) => Pair::Bool(*a, *b),
            _ => unreachable!("rank 0 is only held by bools"),
        },
        1 => Pair::Uint(as_u64(lhs), as_u64(rhs)),
        2 => Pair::Int(as_i128(lhs), as_i128(rhs)),
        _ => Pair::Float(as_f64(lhs), as_f64(rhs)),
    };
    Some(pair)
}

fn unsupported(lhs: &Value, op: BinOp, rhs: &Value) -> Error {
    make(
        ErrorKind::TypeError,
        format!(
            "unsupported operand types for `{op}`: `{}` and `{}`",
            lhs.type_of(),
            rhs.type_of()
        ),
    )
}

fn zero_division() -> Error {
    make(ErrorKind::ZeroDivisionError, "division by zero")
}

pub fn binary(lhs: &Value, op: BinOp, rhs: &Value) -> Result<Value, Error> {
    match op {
        BinOp::Plus | BinOp::Minus | BinOp::Star => arithmetic(lhs, op, rhs),
        BinOp::Slash => {
            let (Some(_), Some(_)) = (rank(lhs), rank(rhs)) else {
                return Err(unsupported(lhs, op, rhs));
            };
            let divisor = as_f64(rhs);
            if divisor == 0.0 {
                return Err(zero_division());
            }
            Ok(Value::Float(as_f64(lhs) / divisor))
        }
        BinOp::SlashSlash | BinOp::Modulo => integral_division(lhs, op, rhs),
        BinOp::StarStar => power(lhs, rhs),
        BinOp::And => Ok(if lhs.is_truthy() { rhs } else { lhs }.clone()),
        BinOp::Or => Ok(if lhs.is_truthy() { lhs } else { rhs }.clone()),
        BinOp::Xor => Ok(Value::Boolean(lhs.is_truthy() != rhs.is_truthy())),
        BinOp::EqualEqual => Ok(Value::Boolean(equals(lhs, rhs))),
        BinOp::BangEqual => Ok(Value::Boolean(!equals(lhs, rhs))),
        BinOp::Less | BinOp::LessEqual | BinOp::Greater | BinOp::GreaterEqual => {
            compare(op, lhs, rhs).map(Value::Boolean)
        }
    }
}

fn arithmetic(lhs: &Value, op: BinOp, rhs: &Value) -> Result<Value, Error> {
    if let Some(pair) = promote(lhs, rhs) {
        let value = match (op, pair) {
            (BinOp::Plus, Pair::Bool(a, b)) => Value::Uint(a as u64 + b as u64),
            (BinOp::Minus, Pair::Bool(a, b)) => Value::Boolean(a ^ b),
            (BinOp::Star, Pair::Bool(a, b)) => Value::Boolean(a & b),
            (BinOp::Plus, Pair::Uint(a, b)) => Value::Uint(a.wrapping_add(b)),
            (BinOp::Minus, Pair::Uint(a, b)) => Value::Uint(a.wrapping_sub(b)),
            (BinOp::Star, Pair::Uint(a, b)) => Value::Uint(a.wrapping_mul(b)),
            (_, Pair::Int(..)) => {
                // A `uint` beyond `int` range has no common kind with an `int`
                let (a, b) = (lhs.to_int()?, rhs.to_int()?);
                match op {
                    BinOp::Plus => Value::Int(a.wrapping_add(b)),
                    BinOp::Minus => Value::Int(a.wrapping_sub(b)),
                    _ => Value::Int(a.wrapping_mul(b)),
                }
            }
            (BinOp::Plus, Pair::Float(a, b)) => Value::Float(a + b),
            (BinOp::Minus, Pair::Float(a, b)) => Value::Float(a - b),
            (BinOp::Star, Pair::Float(a, b)) => Value::Float(a * b),
            _ => unreachable!("not an arithmetic operator: {op}"),
        };
        return Ok(value);
    }
    match (lhs, op, rhs) {
        (Value::Str(a), BinOp::Plus, Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (Value::Bytes(a), BinOp::Plus, Value::Bytes(b)) => Ok(Value::Bytes([&a[..], b].concat())),
        (Value::List(a), BinOp::Plus, Value::List(b)) => {
            let items = a.borrow().iter().chain(b.borrow().iter()).cloned().collect();
            Ok(Value::new_list(items))
        }
        _ => Err(unsupported(lhs, op, rhs)),
    }
}

/// Operand of `//` and `%`: integers, or floats without a fraction.
#[derive(Copy, Clone)]
enum Integral {
    Int,
    Uint(u64),
}

fn integral(value: &Value) -> Option<Integral> {
    match value {
        Value::Int(_) => Some(Integral::Int),
        Value::Uint(n) => Some(Integral::Uint(*n)),
        Value::Float(n) if n.fract() == 0.0 && value.to_int().is_ok() => Some(Integral::Int),
        _ => None,
    }
}

fn integral_division(lhs: &Value, op: BinOp, rhs: &Value) -> Result<Value, Error> {
    let (Some(a), Some(b)) = (integral(lhs), integral(rhs)) else {
        return Err(unsupported(lhs, op, rhs));
    };
    if let (Integral::Uint(a), Integral::Uint(b)) = (a, b) {
        if b == 0 {
            return Err(zero_division());
        }
        return Ok(Value::Uint(if op == BinOp::Modulo { a % b } else { a / b }));
    }
    let (a, b) = (lhs.to_int()?, rhs.to_int()?);
    if b == 0 {
        return Err(zero_division());
    }
    let rem = a.wrapping_rem(b);
    // Floor towards negative infinity, so the remainder takes the sign
    // of the divisor
    let adjust = rem != 0 && (rem < 0) != (b < 0);
    let value = if op == BinOp::Modulo {
        if adjust {
            rem + b
        } else {
            rem
        }
    } else {
        let quot = a.wrapping_div(b);
        if adjust {
            quot - 1
        } else {
            quot
        }
    };
    Ok(Value::Int(value))
}

fn power(lhs: &Value, rhs: &Value) -> Result<Value, Error> {
    let Some(pair) = promote(lhs, rhs) else {
        return Err(unsupported(lhs, BinOp::StarStar, rhs));
    };
    if let Pair::Int(..) = pair {
        lhs.to_int()?;
        rhs.to_int()?;
    }
    let result = as_f64(lhs).powf(as_f64(rhs));
    Ok(match pair {
        Pair::Bool(..) => Value::Boolean(result != 0.0),
        Pair::Uint(..) => Value::Uint(result as u64),
        Pair::Int(..) => Value::Int(result as i64),
        Pair::Float(..) => Value::Float(result),
    })
}

/// Guest `==`. Numbers compare after promotion, reference kinds by
/// identity and any other mismatch is simply unequal.
pub fn equals(lhs: &Value, rhs: &Value) -> bool {
    match promote(lhs, rhs) {
        Some(Pair::Bool(a, b)) => a == b,
        Some(Pair::Uint(a, b)) => a == b,
        Some(Pair::Int(a, b)) => a == b,
        Some(Pair::Float(a, b)) => a == b,
        None => lhs == rhs,
    }
}

/// Evaluate one of the ordering operators.
pub fn compare(op: BinOp, lhs: &Value, rhs: &Value) -> Result<bool, Error> {
    let ordering = match (promote(lhs, rhs), lhs, rhs) {
        (Some(Pair::Bool(a, b)), ..) => a.partial_cmp(&b),
        (Some(Pair::Uint(a, b)), ..) => a.partial_cmp(&b),
        (Some(Pair::Int(a, b)), ..) => a.partial_cmp(&b),
        (Some(Pair::Float(a, b)), ..) => a.partial_cmp(&b),
        (None, Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (None, Value::Bytes(a), Value::Bytes(b)) => a.partial_cmp(b),
        _ => return Err(unsupported(lhs, op, rhs)),
    };
    // NaN is unordered and every comparison with it is false
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        BinOp::Less => ordering == Ordering::Less,
        BinOp::LessEqual => ordering != Ordering::Greater,
        BinOp::Greater => ordering == Ordering::Greater,
        BinOp::GreaterEqual => ordering != Ordering::Less,
        _ => unreachable!("not an ordering operator: {op}"),
    })
}

pub fn unary(op: UnaryOp, value: &Value) -> Result<Value, Error> {
    match (op, value) {
        (UnaryOp::Bang, _) => Ok(Value::Boolean(!value.is_truthy())),
        (UnaryOp::Minus, Value::Boolean(b)) => Ok(Value::Int(-(*b as i64))),
        (UnaryOp::Minus, Value::Uint(n)) => Ok(Value::Int((*n as i64).wrapping_neg())),
        (UnaryOp::Minus, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOp::Minus, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Plus, _) if value.type_of().is_numeric() => Ok(value.clone()),
        _ => Err(make(
            ErrorKind::TypeError,
            format!("bad operand type for unary `{op}`: `{}`", value.type_of()),
        )),
    }
}

/// The value after `++` or `--`, stepping by one of the operand's kind.
pub fn update(op: UpdateOp, value: &Value) -> Result<Value, Error> {
    let one = match value.type_of() {
        Type::Uint => Value::Uint(1),
        Type::Float => Value::Float(1.0),
        _ => Value::Int(1),
    };
    let op = match op {
        UpdateOp::Increment => BinOp::Plus,
        UpdateOp::Decrement => BinOp::Minus,
    };
    binary(value, op, &one)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(lhs: Value, op: BinOp, rhs: Value) -> Result<Value, Error> {
        binary(&lhs, op, &rhs)
    }

    #[test]
    fn arithmetic_keeps_same_kind() {
        assert_eq!(eval(Value::Int(3), BinOp::Plus, Value::Int(2)), Ok(Value::Int(5)));
        assert_eq!(eval(Value::Uint(3), BinOp::Minus, Value::Uint(2)), Ok(Value::Uint(1)));
        assert_eq!(
            eval(Value::Float(1.5), BinOp::Star, Value::Float(2.0)),
            Ok(Value::Float(3.0))
        );
        assert_eq!(
            eval(Value::Int(i64::MAX), BinOp::Plus, Value::Int(1)),
            Ok(Value::Int(i64::MIN))
        );
    }

    #[test]
    fn promotion() {
        assert_eq!(eval(Value::Int(1), BinOp::Plus, Value::Uint(2)), Ok(Value::Int(3)));
        assert_eq!(eval(Value::Boolean(true), BinOp::Plus, Value::Int(2)), Ok(Value::Int(3)));
        assert_eq!(eval(Value::Uint(1), BinOp::Plus, Value::Float(0.5)), Ok(Value::Float(1.5)));
        assert_eq!(
            eval(Value::Boolean(true), BinOp::Plus, Value::Boolean(true)),
            Ok(Value::Uint(2))
        );
        assert_eq!(
            eval(Value::Boolean(true), BinOp::Minus, Value::Boolean(true)),
            Ok(Value::Boolean(false))
        );
        assert_eq!(
            eval(Value::Boolean(true), BinOp::Star, Value::Boolean(false)),
            Ok(Value::Boolean(false))
        );
    }

    #[test]
    fn division() {
        assert_eq!(eval(Value::Int(10), BinOp::Slash, Value::Int(2)), Ok(Value::Float(5.0)));
        assert_eq!(eval(Value::Int(-7), BinOp::SlashSlash, Value::Int(2)), Ok(Value::Int(-4)));
        assert_eq!(eval(Value::Int(-7), BinOp::Modulo, Value::Int(3)), Ok(Value::Int(2)));
        assert_eq!(eval(Value::Int(7), BinOp::Modulo, Value::Int(-3)), Ok(Value::Int(-2)));
        assert_eq!(eval(Value::Uint(7), BinOp::Modulo, Value::Uint(3)), Ok(Value::Uint(1)));
        assert_eq!(eval(Value::Float(7.0), BinOp::SlashSlash, Value::Int(2)), Ok(Value::Int(3)));

        let err = eval(Value::Float(7.5), BinOp::Modulo, Value::Int(2)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        let err = eval(Value::Boolean(true), BinOp::Modulo, Value::Int(2)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn zero_division() {
        for (lhs, op) in [
            (Value::Int(20), BinOp::Slash),
            (Value::Int(20), BinOp::Modulo),
            (Value::Int(20), BinOp::SlashSlash),
            (Value::Float(20.0), BinOp::Modulo),
            (Value::Uint(20), BinOp::SlashSlash),
        ] {
            let err = binary(&lhs, op, &Value::Int(0)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::ZeroDivisionError, "{lhs} {op} 0");
        }
    }

    #[test]
    fn large_uints_stay_exact_against_ints() {
        let big = Value::Uint(10_000_000_000_000_000_000);
        assert_eq!(compare(BinOp::Greater, &big, &Value::Int(1)), Ok(true));
        assert_eq!(compare(BinOp::Less, &Value::Int(-1), &Value::Uint(u64::MAX)), Ok(true));
        assert!(!equals(&Value::Int(-1), &Value::Uint(u64::MAX)));
        assert!(equals(&Value::Int(7), &Value::Uint(7)));

        for op in [BinOp::Plus, BinOp::SlashSlash, BinOp::StarStar] {
            let err = eval(big.clone(), op, Value::Int(3)).unwrap_err();
            assert_eq!(err.kind, ErrorKind::ValueError, "{op}");
        }
        assert_eq!(
            eval(big.clone(), BinOp::SlashSlash, Value::Uint(3)),
            Ok(Value::Uint(3_333_333_333_333_333_333))
        );
    }

    #[test]
    fn power_casts_back() {
        assert_eq!(eval(Value::Int(2), BinOp::StarStar, Value::Int(10)), Ok(Value::Int(1024)));
        assert_eq!(
            eval(Value::Float(4.0), BinOp::StarStar, Value::Float(0.5)),
            Ok(Value::Float(2.0))
        );
    }

    #[test]
    fn concatenation() {
        assert_eq!(
            eval(Value::Str("ab".into()), BinOp::Plus, Value::Str("c".into())),
            Ok(Value::Str("abc".into()))
        );
        assert_eq!(
            eval(Value::Bytes(vec![1]), BinOp::Plus, Value::Bytes(vec![2])),
            Ok(Value::Bytes(vec![1, 2]))
        );
        let a = Value::new_list(vec![Value::Int(1)]);
        let joined = eval(a.clone(), BinOp::Plus, a.clone()).unwrap();
        assert_eq!(joined.len(), Ok(2));
        assert_ne!(joined, a);

        let err = eval(Value::Str("a".into()), BinOp::Plus, Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        let err = eval(Value::Str("a".into()), BinOp::Minus, Value::Str("a".into())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn logical_operators_select_operands() {
        assert_eq!(eval(Value::Int(0), BinOp::And, Value::Int(2)), Ok(Value::Int(0)));
        assert_eq!(eval(Value::Int(1), BinOp::And, Value::Int(2)), Ok(Value::Int(2)));
        assert_eq!(eval(Value::Null, BinOp::Or, Value::Int(2)), Ok(Value::Int(2)));
        assert_eq!(eval(Value::Int(1), BinOp::Or, Value::Int(2)), Ok(Value::Int(1)));
        assert_eq!(eval(Value::Int(1), BinOp::Xor, Value::Null), Ok(Value::Boolean(true)));
    }

    #[test]
    fn equality() {
        assert!(equals(&Value::Null, &Value::Null));
        assert!(equals(&Value::Int(1), &Value::Float(1.0)));
        assert!(equals(&Value::Boolean(true), &Value::Uint(1)));
        assert!(!equals(&Value::Int(1), &Value::Str("1".into())));
        assert!(!equals(&Value::Null, &Value::Int(0)));
        assert!(equals(&Value::Type(Type::Int), &Value::Type(Type::Int)));

        let (a, b) = (Value::new_list(vec![]), Value::new_list(vec![]));
        assert!(equals(&a, &a));
        assert!(!equals(&a, &b));
    }

    #[test]
    fn ordering() {
        assert_eq!(compare(BinOp::Less, &Value::Int(1), &Value::Float(1.5)), Ok(true));
        assert_eq!(compare(BinOp::GreaterEqual, &Value::Uint(2), &Value::Int(2)), Ok(true));
        assert_eq!(
            compare(BinOp::Less, &Value::Str("abc".into()), &Value::Str("abd".into())),
            Ok(true)
        );
        assert_eq!(compare(BinOp::Less, &Value::Float(f64::NAN), &Value::Int(1)), Ok(false));

        let list = Value::new_list(vec![]);
        let err = compare(BinOp::Less, &list, &list).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        let err = compare(BinOp::Less, &Value::Str("a".into()), &Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(unary(UnaryOp::Minus, &Value::Uint(3)), Ok(Value::Int(-3)));
        assert_eq!(unary(UnaryOp::Minus, &Value::Boolean(true)), Ok(Value::Int(-1)));
        assert_eq!(unary(UnaryOp::Plus, &Value::Float(2.5)), Ok(Value::Float(2.5)));
        assert_eq!(unary(UnaryOp::Bang, &Value::Str(String::new())), Ok(Value::Boolean(true)));
        let err = unary(UnaryOp::Minus, &Value::Str("a".into())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        let err = unary(UnaryOp::Plus, &Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn update_steps_by_one() {
        assert_eq!(update(UpdateOp::Increment, &Value::Uint(1)), Ok(Value::Uint(2)));
        assert_eq!(update(UpdateOp::Decrement, &Value::Float(1.5)), Ok(Value::Float(0.5)));
        assert_eq!(update(UpdateOp::Increment, &Value::Int(-1)), Ok(Value::Int(0)));
        let err = update(UpdateOp::Increment, &Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }
}
