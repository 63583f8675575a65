//! The formula syntax tree and the closed function table.
use super::error::EvalError;
use chrono::NaiveDate;
use smallvec::SmallVec;

/// A value inside a running formula. Wider than a field value: formulas can
/// produce dates and `null` as intermediate results.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

/// How a formula names one of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRef {
    /// `age` or `{3f0c-...}`
    Named(String),
    /// `$1`, 1-based
    Positional(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter. All binary operators are left-associative.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq => 3,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

/// Built-in functions. Formulas cannot define or look up anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Round,
    Floor,
    Ceil,
    Min,
    Max,
    Len,
    Lower,
    Upper,
    Trim,
    If,
    Number,
    Text,
    Date,
    Year,
    Month,
    Day,
    DaysBetween,
}

impl Function {
    pub fn lookup(name: &str) -> Result<Self, EvalError> {
        Ok(match name {
            "abs" => Function::Abs,
            "round" => Function::Round,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "min" => Function::Min,
            "max" => Function::Max,
            "len" => Function::Len,
            "lower" => Function::Lower,
            "upper" => Function::Upper,
            "trim" => Function::Trim,
            "if" => Function::If,
            "number" => Function::Number,
            "text" => Function::Text,
            "date" => Function::Date,
            "year" => Function::Year,
            "month" => Function::Month,
            "day" => Function::Day,
            "days_between" => Function::DaysBetween,
            other => return Err(EvalError::UnknownFunction(other.to_string())),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Round => "round",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Min => "min",
            Function::Max => "max",
            Function::Len => "len",
            Function::Lower => "lower",
            Function::Upper => "upper",
            Function::Trim => "trim",
            Function::If => "if",
            Function::Number => "number",
            Function::Text => "text",
            Function::Date => "date",
            Function::Year => "year",
            Function::Month => "month",
            Function::Day => "day",
            Function::DaysBetween => "days_between",
        }
    }

    /// Checks the argument count at parse time.
    pub fn check_arity(self, actual: usize) -> Result<(), EvalError> {
        let (ok, expected) = match self {
            Function::Min | Function::Max => (actual >= 1, "at least 1"),
            Function::Round => (actual == 1 || actual == 2, "1 or 2"),
            Function::If => (actual == 3, "3"),
            Function::DaysBetween => (actual == 2, "2"),
            _ => (actual == 1, "1"),
        };
        if ok {
            Ok(())
        } else {
            Err(EvalError::Arity { name: self.name(), expected, actual })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Operand),
    Input(InputRef),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Arguments are boxed so the inline buffer does not make `Expr` recursive by value.
    Call(Function, SmallVec<[Box<Expr>; 3]>),
}
