//! Shunting-yard parser from tokens to an `Expr` tree.
//!
//! The parser is iterative: operator and call markers live on an explicit stack,
//! so hostile input cannot exhaust the native stack while parsing.

use super::ast::{BinaryOp, Expr, Function, InputRef, Operand, UnaryOp};
use super::error::EvalError;
use super::lexer::{tokenize, Spanned, Symbol, Token};
use smallvec::SmallVec;

enum StackItem {
    Unary(UnaryOp, usize),
    Binary(BinaryOp, usize),
    /// An open parenthesis used for grouping.
    Group(usize),
    /// An open call; arguments are the outputs pushed after `base`.
    Call { func: Function, base: usize, pos: usize },
}

pub fn parse(src: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(src)?;
    let mut output: Vec<Expr> = Vec::new();
    let mut ops: Vec<StackItem> = Vec::new();
    let mut expect_operand = true;
    let mut iter = tokens.into_iter().peekable();

    while let Some(Spanned { token, pos }) = iter.next() {
        let operand = match token {
            Token::Number(n) => Some(Expr::Literal(Operand::Number(n))),
            Token::Str(s) => Some(Expr::Literal(Operand::Text(s))),
            Token::True => Some(Expr::Literal(Operand::Bool(true))),
            Token::False => Some(Expr::Literal(Operand::Bool(false))),
            Token::Null => Some(Expr::Literal(Operand::Null)),
            Token::Braced(id) => Some(Expr::Input(InputRef::Named(id))),
            Token::Positional(n) => Some(Expr::Input(InputRef::Positional(n))),
            Token::Ident(name) => {
                if matches!(iter.peek(), Some(Spanned { token: Token::LParen, .. })) {
                    if !expect_operand {
                        return Err(EvalError::syntax(pos, "expected an operator"));
                    }
                    iter.next();
                    let func = Function::lookup(&name)?;
                    ops.push(StackItem::Call { func, base: output.len(), pos });
                    expect_operand = true;
                    None
                } else {
                    Some(Expr::Input(InputRef::Named(name)))
                }
            }
            Token::LParen => {
                if !expect_operand {
                    return Err(EvalError::syntax(pos, "expected an operator before '('"));
                }
                ops.push(StackItem::Group(pos));
                None
            }
            Token::Comma => {
                if expect_operand {
                    return Err(EvalError::syntax(pos, "expected a value before ','"));
                }
                reduce_to_open(&mut ops, &mut output)?;
                if !matches!(ops.last(), Some(StackItem::Call { .. })) {
                    return Err(EvalError::syntax(pos, "',' outside of a function call"));
                }
                expect_operand = true;
                None
            }
            Token::RParen => {
                let empty_call = matches!(
                    ops.last(),
                    Some(StackItem::Call { base, .. }) if *base == output.len()
                );
                if expect_operand && !empty_call {
                    return Err(EvalError::syntax(pos, "expected a value before ')'"));
                }
                reduce_to_open(&mut ops, &mut output)?;
                match ops.pop() {
                    Some(StackItem::Group(_)) => {}
                    Some(StackItem::Call { func, base, .. }) => {
                        let args: SmallVec<[Box<Expr>; 3]> = output.drain(base..).map(Box::new).collect();
                        func.check_arity(args.len())?;
                        output.push(Expr::Call(func, args));
                    }
                    _ => return Err(EvalError::syntax(pos, "unmatched ')'")),
                }
                expect_operand = false;
                None
            }
            Token::Op(sym) if expect_operand => {
                let op = match sym {
                    Symbol::Minus => UnaryOp::Neg,
                    Symbol::Plus => UnaryOp::Plus,
                    Symbol::Bang => UnaryOp::Not,
                    _ => return Err(EvalError::syntax(pos, "expected a value")),
                };
                ops.push(StackItem::Unary(op, pos));
                None
            }
            Token::Op(sym) => {
                let op = binary_op(sym).ok_or_else(|| EvalError::syntax(pos, "expected an operator"))?;
                while let Some(top) = ops.last() {
                    let binds_tighter = match top {
                        StackItem::Unary(..) => true,
                        StackItem::Binary(prev, _) => prev.precedence() >= op.precedence(),
                        _ => false,
                    };
                    if !binds_tighter {
                        break;
                    }
                    if let Some(item) = ops.pop() {
                        apply(item, &mut output)?;
                    }
                }
                ops.push(StackItem::Binary(op, pos));
                expect_operand = true;
                None
            }
        };

        if let Some(expr) = operand {
            if !expect_operand {
                return Err(EvalError::syntax(pos, "expected an operator"));
            }
            output.push(expr);
            expect_operand = false;
        }
    }

    if expect_operand {
        return Err(EvalError::syntax(src.len(), "unexpected end of formula"));
    }

    while let Some(item) = ops.pop() {
        match item {
            StackItem::Group(pos) | StackItem::Call { pos, .. } => {
                return Err(EvalError::syntax(pos, "unclosed '('"));
            }
            other => apply(other, &mut output)?,
        }
    }

    match (output.pop(), output.is_empty()) {
        (Some(expr), true) => Ok(expr),
        _ => Err(EvalError::syntax(0, "malformed formula")),
    }
}

fn binary_op(sym: Symbol) -> Option<BinaryOp> {
    Some(match sym {
        Symbol::Or => BinaryOp::Or,
        Symbol::And => BinaryOp::And,
        Symbol::Eq => BinaryOp::Eq,
        Symbol::NotEq => BinaryOp::NotEq,
        Symbol::Lt => BinaryOp::Lt,
        Symbol::LtEq => BinaryOp::LtEq,
        Symbol::Gt => BinaryOp::Gt,
        Symbol::GtEq => BinaryOp::GtEq,
        Symbol::Plus => BinaryOp::Add,
        Symbol::Minus => BinaryOp::Sub,
        Symbol::Star => BinaryOp::Mul,
        Symbol::Slash => BinaryOp::Div,
        Symbol::Percent => BinaryOp::Rem,
        Symbol::Bang => return None,
    })
}

/// Applies pending operators until an open parenthesis or call is on top.
fn reduce_to_open(ops: &mut Vec<StackItem>, output: &mut Vec<Expr>) -> Result<(), EvalError> {
    while matches!(ops.last(), Some(StackItem::Unary(..) | StackItem::Binary(..))) {
        if let Some(item) = ops.pop() {
            apply(item, output)?;
        }
    }
    Ok(())
}

fn apply(item: StackItem, output: &mut Vec<Expr>) -> Result<(), EvalError> {
    match item {
        StackItem::Unary(op, pos) => {
            let operand = output.pop().ok_or_else(|| EvalError::syntax(pos, "missing operand"))?;
            output.push(Expr::Unary(op, Box::new(operand)));
        }
        StackItem::Binary(op, pos) => {
            let rhs = output.pop().ok_or_else(|| EvalError::syntax(pos, "missing right operand"))?;
            let lhs = output.pop().ok_or_else(|| EvalError::syntax(pos, "missing left operand"))?;
            output.push(Expr::Binary(op, Box::new(lhs), Box::new(rhs)));
        }
        StackItem::Group(pos) | StackItem::Call { pos, .. } => {
            return Err(EvalError::syntax(pos, "unclosed '('"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Renders a tree in fully parenthesised prefix form for compact assertions.
    fn show(e: &Expr) -> String {
        match e {
            Expr::Literal(Operand::Number(n)) => format!("{}", n),
            Expr::Literal(Operand::Text(s)) => format!("'{}'", s),
            Expr::Literal(other) => format!("{:?}", other),
            Expr::Input(InputRef::Named(n)) => n.clone(),
            Expr::Input(InputRef::Positional(n)) => format!("${}", n),
            Expr::Unary(op, x) => format!("({:?} {})", op, show(x)),
            Expr::Binary(op, l, r) => format!("({} {} {})", op.symbol(), show(l), show(r)),
            Expr::Call(f, args) => {
                let args: Vec<String> = args.iter().map(|a| show(a)).collect();
                format!("{}[{}]", f.name(), args.join(", "))
            }
        }
    }

    #[rstest]
    #[case("1 + 2 * 3", "(+ 1 (* 2 3))")]
    #[case("(1 + 2) * 3", "(* (+ 1 2) 3)")]
    #[case("10 - 4 - 3", "(- (- 10 4) 3)")]
    #[case("-a * b", "(* (Neg a) b)")]
    #[case("2 * -3", "(* 2 (Neg 3))")]
    #[case("!a || b && c", "(|| (Not a) (&& b c))")]
    #[case("age >= 18", "(>= age 18)")]
    #[case("a == b != c", "(!= (== a b) c)")]
    #[case("max(1, $2 + 1, abs(-3))", "max[1, (+ $2 1), abs[(Neg 3)]]")]
    #[case("if(a > 1, 'big', 'small')", "if[(> a 1), 'big', 'small']")]
    #[case("year({dob-1})", "year[dob-1]")]
    fn test_precedence_and_shape(#[case] src: &str, #[case] expected: &str) {
        assert_eq!(show(&parse(src).unwrap()), expected);
    }

    #[rstest]
    #[case("", 0)]
    #[case("1 +", 3)]
    #[case("(1 + 2", 0)]
    #[case("1 + 2)", 5)]
    #[case("1 2", 2)]
    #[case("max(1,)", 6)]
    #[case("max(,1)", 4)]
    #[case("a * / b", 4)]
    fn test_syntax_error_positions(#[case] src: &str, #[case] position: usize) {
        match parse(src) {
            Err(EvalError::Syntax { position: p, .. }) => assert_eq!(p, position, "{}", src),
            other => panic!("expected a syntax error for {:?}, got {:?}", src, other),
        }
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert_eq!(parse("eval('x')"), Err(EvalError::UnknownFunction("eval".into())));
        assert!(matches!(parse("abs(1, 2)"), Err(EvalError::Arity { name: "abs", actual: 2, .. })));
        assert!(matches!(parse("min()"), Err(EvalError::Arity { name: "min", actual: 0, .. })));
    }
}
