//! The formula language used by derived fields.
//!
//! Formulas are untrusted, user-authored text. They are parsed into a small
//! syntax tree and interpreted against an explicit set of named inputs; nothing
//! else is reachable from inside a formula.
//!
//! The derivation engine only depends on the [`FormulaEvaluator`] trait, so a
//! host can substitute another evaluator as long as it keeps the same contract.

pub mod ast;
mod error;
mod eval;
mod lexer;
mod parser;

pub use self::ast::{Expr, Operand};
pub use self::error::EvalError;
pub use self::parser::parse;

use self::eval::Interpreter;
use crate::config::EngineConfig;
use crate::store::{FieldId, Value};

/// The current values of a derived field's parents, in `parentFields` order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs {
    entries: Vec<(FieldId, Option<Value>)>,
}

impl Inputs {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, id: FieldId, value: Option<Value>) {
        self.entries.push((id, value));
    }

    pub fn with(mut self, id: impl Into<FieldId>, value: Option<Value>) -> Self {
        self.push(id.into(), value);
        self
    }

    /// `None` if `name` is not an input; `Some(None)` if it is an input without a value.
    pub fn get(&self, name: &str) -> Option<Option<&Value>> {
        self.entries
            .iter()
            .find(|(id, _)| id.as_str() == name)
            .map(|(_, v)| v.as_ref())
    }

    /// Zero-based positional access.
    pub fn nth(&self, index: usize) -> Option<Option<&Value>> {
        self.entries.get(index).map(|(_, v)| v.as_ref())
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// The capability a derivation needs: turn a formula and its inputs into a value.
///
/// Implementations must be pure with respect to their arguments: the same
/// formula and inputs always give the same result, and no state outside the
/// inputs may be read or written.
pub trait FormulaEvaluator {
    fn evaluate(&self, formula: &str, inputs: &Inputs) -> Result<Value, EvalError>;
}

/// A parsed formula that can be evaluated many times.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    pub fn parse(src: &str, max_len: usize) -> Result<Self, EvalError> {
        let len = src.chars().count();
        if len > max_len {
            return Err(EvalError::TooLong { len, max: max_len });
        }
        Ok(Self { expr: parse(src)? })
    }

    /// Evaluates to an operand, which may be `null` or a date.
    pub fn evaluate_operand(&self, inputs: &Inputs, max_depth: usize) -> Result<Operand, EvalError> {
        Interpreter::new(inputs, max_depth).eval(&self.expr, 0)
    }

    /// Evaluates to a field value. A `null` result is an error.
    pub fn evaluate(&self, inputs: &Inputs, max_depth: usize) -> Result<Value, EvalError> {
        self.evaluate_operand(inputs, max_depth)?
            .into_value()
            .ok_or(EvalError::EmptyResult)
    }
}

/// The built-in evaluator: parse, then interpret within configured limits.
#[derive(Debug, Clone)]
pub struct SandboxEvaluator {
    max_formula_len: usize,
    max_depth: usize,
}

impl SandboxEvaluator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_formula_len: config.max_formula_len,
            max_depth: config.max_expr_depth,
        }
    }
}

impl Default for SandboxEvaluator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl FormulaEvaluator for SandboxEvaluator {
    fn evaluate(&self, formula: &str, inputs: &Inputs) -> Result<Value, EvalError> {
        Formula::parse(formula, self.max_formula_len)?.evaluate(inputs, self.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn eval(formula: &str, inputs: &Inputs) -> Result<Value, EvalError> {
        SandboxEvaluator::default().evaluate(formula, inputs)
    }

    fn no_inputs() -> Inputs {
        Inputs::new()
    }

    #[rstest]
    #[case("1 + 2 * 3", Value::Number(7.0))]
    #[case("(1 + 2) * 3", Value::Number(9.0))]
    #[case("7 % 4", Value::Number(3.0))]
    #[case("-(2 - 5)", Value::Number(3.0))]
    #[case("'a' + 1", Value::from("a1"))]
    #[case("'10' * 2", Value::Number(20.0))]
    #[case("'10' > 9", Value::Bool(true))]
    #[case("'b' > 'a'", Value::Bool(true))]
    #[case("1 == '1'", Value::Bool(true))]
    #[case("!0", Value::Bool(true))]
    #[case("round(2.346, 2)", Value::Number(2.35))]
    #[case("max(3, 9, 4) - min(3, 9, 4)", Value::Number(6.0))]
    #[case("upper(trim('  hi '))", Value::from("HI"))]
    #[case("len('héllo')", Value::Number(5.0))]
    #[case("if(1 > 2, 'yes', 'no')", Value::from("no"))]
    #[case("text(4) + text(true)", Value::from("4true"))]
    #[case("number('  12.5 ')", Value::Number(12.5))]
    fn test_expressions(#[case] formula: &str, #[case] expected: Value) {
        assert_eq!(eval(formula, &no_inputs()), Ok(expected));
    }

    #[rstest]
    #[case("year('1990-06-15')", Value::Number(1990.0))]
    #[case("month('1990-06-15')", Value::Number(6.0))]
    #[case("day('2024-02-29T10:00:00Z')", Value::Number(29.0))]
    #[case("days_between('2024-01-01', '2024-03-01')", Value::Number(60.0))]
    #[case("date('2024-01-31') + 1", Value::from("2024-02-01"))]
    #[case("date('2024-03-01') - date('2024-02-01')", Value::Number(29.0))]
    #[case("date('2024-01-02') > '2024-01-01'", Value::Bool(true))]
    #[case("2025 - year('2000-01-01')", Value::Number(25.0))]
    fn test_date_helpers(#[case] formula: &str, #[case] expected: Value) {
        assert_eq!(eval(formula, &no_inputs()), Ok(expected));
    }

    #[test]
    fn test_named_braced_and_positional_inputs() {
        let inputs = Inputs::new()
            .with("age", Some(Value::Number(21.0)))
            .with("1f3c-aa", Some(Value::Number(2.0)));
        assert_eq!(eval("age >= 18", &inputs), Ok(Value::Bool(true)));
        assert_eq!(eval("age * {1f3c-aa}", &inputs), Ok(Value::Number(42.0)));
        assert_eq!(eval("$1 + $2", &inputs), Ok(Value::Number(23.0)));
    }

    #[test]
    fn test_only_declared_inputs_are_visible() {
        let inputs = Inputs::new().with("a", Some(Value::Number(1.0)));
        assert_eq!(eval("a + b", &inputs), Err(EvalError::UnknownInput("b".into())));
        assert_eq!(eval("$2", &inputs), Err(EvalError::UnknownInput("$2".into())));
        assert_eq!(eval("process('rm')", &inputs), Err(EvalError::UnknownFunction("process".into())));
    }

    #[test]
    fn test_missing_input_value_is_null() {
        let inputs = Inputs::new().with("a", None);
        assert_eq!(eval("a == null", &inputs), Ok(Value::Bool(true)));
        assert!(matches!(eval("a + 1", &inputs), Err(EvalError::TypeMismatch { op: "+", .. })));
        assert_eq!(eval("a", &inputs), Err(EvalError::EmptyResult));
    }

    #[test]
    fn test_short_circuit_skips_failing_branch() {
        assert_eq!(eval("false && (1 / 0 > 1)", &no_inputs()), Ok(Value::Bool(false)));
        assert_eq!(eval("true || missing", &no_inputs()), Ok(Value::Bool(true)));
        assert_eq!(eval("if(true, 1, 1 / 0)", &no_inputs()), Ok(Value::Number(1.0)));
    }

    #[rstest]
    #[case("1 / 0", EvalError::DivisionByZero)]
    #[case("5 % 0", EvalError::DivisionByZero)]
    #[case("year('soon')", EvalError::InvalidDate("soon".into()))]
    fn test_runtime_errors(#[case] formula: &str, #[case] expected: EvalError) {
        assert_eq!(eval(formula, &no_inputs()), Err(expected));
    }

    #[test]
    fn test_type_mismatch() {
        assert!(matches!(eval("true * 2", &no_inputs()), Err(EvalError::TypeMismatch { op: "*", .. })));
        assert!(matches!(eval("null < 1", &no_inputs()), Err(EvalError::TypeMismatch { op: "<", .. })));
    }

    #[test]
    fn test_limits() {
        let config = EngineConfig { max_formula_len: 10, max_expr_depth: 3, ..EngineConfig::default() };
        let evaluator = SandboxEvaluator::new(&config);

        assert_eq!(
            evaluator.evaluate("1 + 2 + 3 + 4", &no_inputs()),
            Err(EvalError::TooLong { len: 13, max: 10 })
        );
        assert_eq!(evaluator.evaluate("-(-(-(-1)))", &no_inputs()), Err(EvalError::TooLong { len: 11, max: 10 }));
        assert_eq!(evaluator.evaluate("----1", &no_inputs()), Err(EvalError::TooDeep { max: 3 }));
        assert_eq!(evaluator.evaluate("--1", &no_inputs()), Ok(Value::Number(1.0)));
    }

    #[test]
    fn test_operator_chains_count_as_one_level() {
        let config = EngineConfig { max_expr_depth: 3, ..EngineConfig::default() };
        let evaluator = SandboxEvaluator::new(&config);

        assert_eq!(evaluator.evaluate("1 + 2 * 3 - 4 + 5 - 6 + 7", &no_inputs()), Ok(Value::Number(9.0)));
        assert_eq!(evaluator.evaluate("1 < 2 == true && 0 || false", &no_inputs()), Ok(Value::Bool(false)));
        assert_eq!(evaluator.evaluate("1 + (1 + (1 + (1 + 1)))", &no_inputs()), Err(EvalError::TooDeep { max: 3 }));
    }

    #[test]
    fn test_sum_over_many_inputs_fits_default_limits() {
        let mut inputs = Inputs::new();
        for i in 1..=200 {
            inputs.push(FieldId::from(format!("f{}", i)), Some(Value::Number(1.0)));
        }
        let formula: Vec<String> = (1..=200).map(|i| format!("${}", i)).collect();
        let formula = formula.join(" + ");

        assert!(formula.len() < EngineConfig::default().max_formula_len);
        assert_eq!(eval(&formula, &inputs), Ok(Value::Number(200.0)));
    }

    #[test]
    fn test_parsed_formula_is_reusable() {
        let formula = Formula::parse("$1 * 2", 100).unwrap();
        let a = formula.evaluate(&Inputs::new().with("x", Some(Value::Number(2.0))), 16);
        let b = formula.evaluate(&Inputs::new().with("y", Some(Value::Number(5.0))), 16);
        assert_eq!((a, b), (Ok(Value::Number(4.0)), Ok(Value::Number(10.0))));
    }
}
