//! Turns formula text into a flat token stream.
use super::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// `{some-id}`: a reference to an input whose id is not a plain identifier.
    Braced(String),
    /// `$n`: the n-th input, 1-based.
    Positional(usize),
    True,
    False,
    Null,
    Op(Symbol),
    LParen,
    RParen,
    Comma,
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, EvalError> {
    Lexer { chars: src.char_indices().collect(), idx: 0, end: src.len() }.run()
}

struct Lexer {
    chars: Vec<(usize, char)>,
    idx: usize,
    end: usize,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).map(|&(_, c)| c)
    }

    fn pos(&self) -> usize {
        self.chars.get(self.idx).map_or(self.end, |&(p, _)| p)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        Some(c)
    }

    fn run(mut self) -> Result<Vec<Spanned>, EvalError> {
        let mut out = Vec::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.idx += 1;
                continue;
            }

            let pos = self.pos();
            let token = match c {
                '0'..='9' | '.' => self.number()?,
                '"' | '\'' => self.string()?,
                '{' => self.braced()?,
                '$' => self.positional()?,
                c if c.is_alphabetic() || c == '_' => self.word(),
                '(' => { self.idx += 1; Token::LParen }
                ')' => { self.idx += 1; Token::RParen }
                ',' => { self.idx += 1; Token::Comma }
                _ => Token::Op(self.symbol()?),
            };
            out.push(Spanned { token, pos });
        }
        Ok(out)
    }

    fn number(&mut self) -> Result<Token, EvalError> {
        let start = self.pos();
        let mut text = String::new();
        let mut seen_dot = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => text.push(c),
                '.' if !seen_dot => {
                    seen_dot = true;
                    text.push(c);
                }
                _ => break,
            }
            self.idx += 1;
        }
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| EvalError::syntax(start, format!("invalid number '{}'", text)))
    }

    fn string(&mut self) -> Result<Token, EvalError> {
        let start = self.pos();
        let quote = self.bump().unwrap_or('"');
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(EvalError::syntax(start, "unterminated string")),
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => text.push(c),
                    Some(other) => {
                        return Err(EvalError::syntax(self.pos(), format!("unknown escape '\\{}'", other)))
                    }
                    None => return Err(EvalError::syntax(start, "unterminated string")),
                },
                Some(c) => text.push(c),
            }
        }
        Ok(Token::Str(text))
    }

    fn braced(&mut self) -> Result<Token, EvalError> {
        let start = self.pos();
        self.idx += 1;
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(EvalError::syntax(start, "unterminated '{'")),
                Some('}') => break,
                Some(c) => text.push(c),
            }
        }
        let id = text.trim();
        if id.is_empty() {
            return Err(EvalError::syntax(start, "empty reference '{}'"));
        }
        Ok(Token::Braced(id.to_string()))
    }

    fn positional(&mut self) -> Result<Token, EvalError> {
        let start = self.pos();
        self.idx += 1;
        let mut digits = String::new();
        while let Some(c @ '0'..='9') = self.peek() {
            digits.push(c);
            self.idx += 1;
        }
        match digits.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(Token::Positional(n)),
            _ => Err(EvalError::syntax(start, "expected an input number after '$', starting at 1")),
        }
    }

    fn word(&mut self) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                text.push(c);
                self.idx += 1;
            } else {
                break;
            }
        }
        match text.as_str() {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            _ => Token::Ident(text),
        }
    }

    fn symbol(&mut self) -> Result<Symbol, EvalError> {
        let pos = self.pos();
        let c = self.bump().unwrap_or('\0');
        let next = self.peek_next_is(c);
        let sym = match (c, next) {
            ('=', Some('=')) => Symbol::Eq,
            ('!', Some('=')) => Symbol::NotEq,
            ('<', Some('=')) => Symbol::LtEq,
            ('>', Some('=')) => Symbol::GtEq,
            ('&', Some('&')) => Symbol::And,
            ('|', Some('|')) => Symbol::Or,
            ('+', _) => return Ok(Symbol::Plus),
            ('-', _) => return Ok(Symbol::Minus),
            ('*', _) => return Ok(Symbol::Star),
            ('/', _) => return Ok(Symbol::Slash),
            ('%', _) => return Ok(Symbol::Percent),
            ('!', _) => return Ok(Symbol::Bang),
            ('<', _) => return Ok(Symbol::Lt),
            ('>', _) => return Ok(Symbol::Gt),
            ('=', _) => return Err(EvalError::syntax(pos, "use '==' to compare")),
            _ => return Err(EvalError::syntax(pos, format!("unexpected character '{}'", c))),
        };
        self.idx += 1;
        Ok(sym)
    }

    /// The character after `first`, if `first` can start a two-character operator.
    fn peek_next_is(&self, first: char) -> Option<char> {
        match first {
            '=' | '!' | '<' | '>' | '&' | '|' => self.peek(),
            _ => None,
        }
    }
}
