//! Tree-walking interpreter for parsed formulas.
//!
//! The interpreter reads nothing but the `Inputs` it is given. There is no
//! global scope, no clock and no way to write state.

use super::ast::{BinaryOp, Expr, Function, InputRef, Operand, UnaryOp};
use super::error::EvalError;
use super::Inputs;
use crate::store::{format_number, Value};
use chrono::{DateTime, Datelike, Duration, NaiveDate};
use std::cmp::Ordering;

impl Operand {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None => Operand::Null,
            Some(Value::Text(s)) => Operand::Text(s.clone()),
            Some(Value::Number(n)) => Operand::Number(*n),
            Some(Value::Bool(b)) => Operand::Bool(*b),
        }
    }

    /// Converts a result back to a field value. Dates become ISO `YYYY-MM-DD` text.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Operand::Null => None,
            Operand::Bool(b) => Some(Value::Bool(b)),
            Operand::Number(n) => Some(Value::Number(n)),
            Operand::Text(s) => Some(Value::Text(s)),
            Operand::Date(d) => Some(Value::Text(d.format("%Y-%m-%d").to_string())),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Operand::Null => "null",
            Operand::Bool(_) => "boolean",
            Operand::Number(_) => "number",
            Operand::Text(_) => "text",
            Operand::Date(_) => "date",
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Operand::Null => false,
            Operand::Bool(b) => *b,
            Operand::Number(n) => *n != 0.0 && !n.is_nan(),
            Operand::Text(s) => !s.is_empty(),
            Operand::Date(_) => true,
        }
    }

    /// Numbers, and text that parses as a number.
    fn as_number(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            Operand::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Operand::Date(d) => Some(*d),
            Operand::Text(s) => parse_date(s),
            _ => None,
        }
    }

    fn display(&self) -> String {
        match self {
            Operand::Null => String::new(),
            Operand::Bool(b) => b.to_string(),
            Operand::Number(n) => format_number(*n),
            Operand::Text(s) => s.clone(),
            Operand::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Accepts `YYYY-MM-DD` (what a date input produces) or a full RFC 3339 timestamp.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn mismatch(op: &'static str, operands: &[&Operand]) -> EvalError {
    let names: Vec<&str> = operands.iter().map(|o| o.type_name()).collect();
    EvalError::TypeMismatch { op, detail: names.join(" and ") }
}

fn finite(n: f64) -> Result<Operand, EvalError> {
    if n.is_finite() {
        Ok(Operand::Number(n))
    } else {
        Err(EvalError::NonFinite)
    }
}

fn shift_date(date: NaiveDate, days: f64, op: &'static str) -> Result<Operand, EvalError> {
    if days.fract() != 0.0 || !days.is_finite() {
        return Err(EvalError::TypeMismatch { op, detail: format!("date and fractional days {}", days) });
    }
    Duration::try_days(days as i64)
        .and_then(|delta| date.checked_add_signed(delta))
        .map(Operand::Date)
        .ok_or_else(|| EvalError::InvalidDate(format!("{} {} {} days", date, op, days)))
}

pub(crate) struct Interpreter<'a> {
    inputs: &'a Inputs,
    max_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(inputs: &'a Inputs, max_depth: usize) -> Self {
        Self { inputs, max_depth }
    }

    pub(crate) fn eval(&self, expr: &Expr, depth: usize) -> Result<Operand, EvalError> {
        if depth > self.max_depth {
            return Err(EvalError::TooDeep { max: self.max_depth });
        }
        let next = depth + 1;

        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Input(r) => self.input(r),
            Expr::Unary(op, x) => {
                let v = self.eval(x, next)?;
                match op {
                    UnaryOp::Not => Ok(Operand::Bool(!v.truthy())),
                    UnaryOp::Neg => v.as_number().ok_or_else(|| mismatch("-", &[&v])).and_then(|n| finite(-n)),
                    UnaryOp::Plus => v.as_number().ok_or_else(|| mismatch("+", &[&v])).and_then(finite),
                }
            }
            Expr::Binary(op, l, r) => self.fold_chain(*op, l, r, next),
            Expr::Call(Function::If, args) => {
                let [cond, then, otherwise] = args.as_slice() else {
                    return Err(EvalError::Arity { name: "if", expected: "3", actual: args.len() });
                };
                if self.eval(cond, next)?.truthy() {
                    self.eval(then, next)
                } else {
                    self.eval(otherwise, next)
                }
            }
            Expr::Call(func, args) => {
                let values = args
                    .iter()
                    .map(|a| self.eval(a, next))
                    .collect::<Result<Vec<_>, _>>()?;
                call(*func, &values)
            }
        }
    }

    /// Evaluates a left-leaning operator chain (`a + b + c ...`) in a loop.
    ///
    /// The whole chain counts as one level of nesting, so a long sum over many
    /// inputs is bounded by the formula length, not by the depth limit.
    fn fold_chain(&self, op: BinaryOp, l: &Expr, r: &Expr, depth: usize) -> Result<Operand, EvalError> {
        let mut steps = vec![(op, r)];
        let mut leftmost = l;
        while let Expr::Binary(inner, lhs, rhs) = leftmost {
            steps.push((*inner, rhs.as_ref()));
            leftmost = lhs.as_ref();
        }

        let mut acc = self.eval(leftmost, depth)?;
        for (op, rhs) in steps.into_iter().rev() {
            acc = match op {
                // Short-circuit: the right operand is only evaluated when needed.
                BinaryOp::And => Operand::Bool(acc.truthy() && self.eval(rhs, depth)?.truthy()),
                BinaryOp::Or => Operand::Bool(acc.truthy() || self.eval(rhs, depth)?.truthy()),
                _ => {
                    let rhs = self.eval(rhs, depth)?;
                    binary(op, &acc, &rhs)?
                }
            };
        }
        Ok(acc)
    }

    fn input(&self, r: &InputRef) -> Result<Operand, EvalError> {
        let slot = match r {
            InputRef::Named(name) => self.inputs.get(name),
            InputRef::Positional(n) => self.inputs.nth(*n - 1),
        };
        match slot {
            Some(value) => Ok(Operand::from_value(value)),
            None => Err(EvalError::UnknownInput(match r {
                InputRef::Named(name) => name.clone(),
                InputRef::Positional(n) => format!("${}", n),
            })),
        }
    }
}

fn binary(op: BinaryOp, lhs: &Operand, rhs: &Operand) -> Result<Operand, EvalError> {
    let sym = op.symbol();
    match op {
        BinaryOp::Eq => Ok(Operand::Bool(loose_eq(lhs, rhs))),
        BinaryOp::NotEq => Ok(Operand::Bool(!loose_eq(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ord = compare(lhs, rhs).ok_or_else(|| mismatch(sym, &[lhs, rhs]))?;
            Ok(Operand::Bool(match op {
                BinaryOp::Lt => ord == Ordering::Less,
                BinaryOp::LtEq => ord != Ordering::Greater,
                BinaryOp::Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (lhs, rhs) {
            (Operand::Number(a), Operand::Number(b)) => finite(a + b),
            (Operand::Date(d), Operand::Number(n)) | (Operand::Number(n), Operand::Date(d)) => shift_date(*d, *n, sym),
            (Operand::Text(_), Operand::Null) | (Operand::Null, Operand::Text(_)) => Err(mismatch(sym, &[lhs, rhs])),
            (Operand::Text(_), _) | (_, Operand::Text(_)) => Ok(Operand::Text(lhs.display() + &rhs.display())),
            _ => Err(mismatch(sym, &[lhs, rhs])),
        },
        BinaryOp::Sub => match (lhs, rhs) {
            (Operand::Date(a), Operand::Date(b)) => Ok(Operand::Number(a.signed_duration_since(*b).num_days() as f64)),
            (Operand::Date(d), other) => {
                let n = other.as_number().ok_or_else(|| mismatch(sym, &[lhs, rhs]))?;
                shift_date(*d, -n, sym)
            }
            _ => arithmetic(op, lhs, rhs),
        },
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => arithmetic(op, lhs, rhs),
        BinaryOp::And | BinaryOp::Or => Ok(Operand::Bool(match op {
            BinaryOp::And => lhs.truthy() && rhs.truthy(),
            _ => lhs.truthy() || rhs.truthy(),
        })),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Operand, rhs: &Operand) -> Result<Operand, EvalError> {
    let sym = op.symbol();
    let (a, b) = match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(mismatch(sym, &[lhs, rhs])),
    };
    match op {
        BinaryOp::Sub => finite(a - b),
        BinaryOp::Mul => finite(a * b),
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => Err(EvalError::DivisionByZero),
        BinaryOp::Div => finite(a / b),
        BinaryOp::Rem => finite(a % b),
        _ => Err(mismatch(sym, &[lhs, rhs])),
    }
}

fn loose_eq(lhs: &Operand, rhs: &Operand) -> bool {
    match (lhs, rhs) {
        (Operand::Null, Operand::Null) => true,
        (Operand::Number(a), Operand::Number(b)) => a == b,
        (Operand::Number(n), Operand::Text(_)) | (Operand::Text(_), Operand::Number(n)) => {
            let other = if matches!(lhs, Operand::Text(_)) { lhs } else { rhs };
            other.as_number() == Some(*n)
        }
        (Operand::Date(_), _) | (_, Operand::Date(_)) => match (lhs.as_date(), rhs.as_date()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => lhs == rhs,
    }
}

fn compare(lhs: &Operand, rhs: &Operand) -> Option<Ordering> {
    match (lhs, rhs) {
        (Operand::Text(a), Operand::Text(b)) => Some(a.cmp(b)),
        (Operand::Date(_), _) | (_, Operand::Date(_)) => Some(lhs.as_date()?.cmp(&rhs.as_date()?)),
        (Operand::Number(_) | Operand::Text(_), Operand::Number(_) | Operand::Text(_)) => {
            lhs.as_number()?.partial_cmp(&rhs.as_number()?)
        }
        _ => None,
    }
}

fn call(func: Function, args: &[Operand]) -> Result<Operand, EvalError> {
    let name = func.name();
    let number = |v: &Operand| v.as_number().ok_or_else(|| mismatch(name, &[v]));
    let date = |v: &Operand| match v {
        Operand::Text(s) => parse_date(s).ok_or_else(|| EvalError::InvalidDate(s.clone())),
        other => other.as_date().ok_or_else(|| mismatch(name, &[other])),
    };
    let first = args.first().unwrap_or(&Operand::Null);

    match func {
        Function::Abs => finite(number(first)?.abs()),
        Function::Floor => finite(number(first)?.floor()),
        Function::Ceil => finite(number(first)?.ceil()),
        Function::Round => {
            let x = number(first)?;
            let digits = match args.get(1) {
                Some(d) => number(d)?,
                None => 0.0,
            };
            if digits.fract() != 0.0 || !(0.0..=10.0).contains(&digits) {
                return Err(EvalError::TypeMismatch { op: "round", detail: format!("{} decimal places", digits) });
            }
            let scale = 10f64.powi(digits as i32);
            finite((x * scale).round() / scale)
        }
        Function::Min | Function::Max => {
            let mut acc: Option<f64> = None;
            for v in args {
                let n = number(v)?;
                acc = Some(match (acc, func) {
                    (None, _) => n,
                    (Some(a), Function::Min) => a.min(n),
                    (Some(a), _) => a.max(n),
                });
            }
            acc.map(Operand::Number).ok_or(EvalError::Arity { name, expected: "at least 1", actual: 0 })
        }
        Function::Len => Ok(Operand::Number(first.display().chars().count() as f64)),
        Function::Lower | Function::Upper | Function::Trim => match first {
            Operand::Null => Ok(Operand::Null),
            v => {
                let s = v.display();
                Ok(Operand::Text(match func {
                    Function::Lower => s.to_lowercase(),
                    Function::Upper => s.to_uppercase(),
                    _ => s.trim().to_string(),
                }))
            }
        },
        Function::Number => match first {
            Operand::Null => Ok(Operand::Null),
            Operand::Bool(b) => Ok(Operand::Number(if *b { 1.0 } else { 0.0 })),
            v => number(v).and_then(finite),
        },
        Function::Text => Ok(Operand::Text(first.display())),
        Function::Date => match first {
            Operand::Null => Ok(Operand::Null),
            v => date(v).map(Operand::Date),
        },
        Function::Year => Ok(Operand::Number(date(first)?.year() as f64)),
        Function::Month => Ok(Operand::Number(date(first)?.month() as f64)),
        Function::Day => Ok(Operand::Number(date(first)?.day() as f64)),
        Function::DaysBetween => {
            let from = date(first)?;
            let to = date(args.get(1).unwrap_or(&Operand::Null))?;
            Ok(Operand::Number(to.signed_duration_since(from).num_days() as f64))
        }
        // Handled lazily by the interpreter.
        Function::If => Err(EvalError::Arity { name, expected: "3", actual: args.len() }),
    }
}
