//! A small expression evaluator over the agent's value model.
//!
//! `Debugger.evaluateOnCallFrame` runs client expressions against a paused
//! frame. The supported grammar is the documented subset: literals, names
//! (locals first, then module globals), attribute access, indexing, unary
//! minus and the four arithmetic operators. Failures are ordinary
//! [`EvalError`] values; nothing here panics on malformed input.

use thiserror::Error;

use super::value::Value;
use crate::tracing::frame::TraceFrame;

/// Failure while evaluating a client expression.
#[derive(Debug, Error)]
pub enum EvalError {
    /// A character outside the grammar.
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    /// The expression ended mid-production.
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    /// A token in the wrong position.
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    /// An unterminated string literal.
    #[error("unterminated string literal")]
    UnterminatedString,
    /// A name resolving through neither locals nor globals.
    #[error("name {0:?} is not defined")]
    UndefinedName(String),
    /// Attribute lookup failed.
    #[error("no attribute {0:?}")]
    NoAttribute(String),
    /// Index lookup failed.
    #[error("index {0} out of range")]
    IndexOutOfRange(i64),
    /// Indexing a value that is not a collection, or with the wrong key.
    #[error("value is not subscriptable")]
    NotSubscriptable,
    /// The operands do not support the operator.
    #[error("unsupported operand types for {0}")]
    UnsupportedOperands(char),
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer arithmetic out of range.
    #[error("integer overflow")]
    Overflow,
    /// The call frame id did not match any live frame.
    #[error("unknown call frame")]
    UnknownFrame,
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => text.push(ch),
                        None => return Err(EvalError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '0'..='9' => {
                let mut number = String::new();
                let mut is_float = false;
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        number.push(d);
                        chars.next();
                    } else if d == '.' && !is_float {
                        // Lookahead: `1.x` is an attribute access on an int,
                        // which the grammar rejects later; `1.5` is a float.
                        let mut ahead = chars.clone();
                        ahead.next();
                        if ahead.peek().is_some_and(char::is_ascii_digit) {
                            is_float = true;
                            number.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                if is_float {
                    let parsed = number
                        .parse()
                        .map_err(|_| EvalError::UnexpectedToken(number.clone()))?;
                    tokens.push(Token::Float(parsed));
                } else {
                    let parsed = number
                        .parse()
                        .map_err(|_| EvalError::UnexpectedToken(number.clone()))?;
                    tokens.push(Token::Int(parsed));
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(EvalError::UnexpectedChar(other)),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    frame: &'a TraceFrame,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token) -> Result<(), EvalError> {
        match self.next() {
            Some(ref t) if t == token => Ok(()),
            Some(t) => Err(EvalError::UnexpectedToken(format!("{t:?}"))),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    fn expression(&mut self) -> Result<Value, EvalError> {
        let mut left = self.term()?;
        while let Some(op) = self.peek() {
            let op = match op {
                Token::Plus => '+',
                Token::Minus => '-',
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = binary(op, left, right)?;
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Value, EvalError> {
        let mut left = self.unary()?;
        while let Some(op) = self.peek() {
            let op = match op {
                Token::Star => '*',
                Token::Slash => '/',
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = binary(op, left, right)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Value, EvalError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            return match self.unary()? {
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Float(f) => Ok(Value::Float(-f)),
                _ => Err(EvalError::UnsupportedOperands('-')),
            };
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Value, EvalError> {
        let mut value = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let name = match self.next() {
                        Some(Token::Ident(name)) => name,
                        Some(t) => return Err(EvalError::UnexpectedToken(format!("{t:?}"))),
                        None => return Err(EvalError::UnexpectedEnd),
                    };
                    value = attribute(&value, &name)?;
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let key = self.expression()?;
                    self.expect(&Token::RBracket)?;
                    value = index(&value, &key)?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn primary(&mut self) -> Result<Value, EvalError> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Value::Int(n)),
            Some(Token::Float(f)) => Ok(Value::Float(f)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Ident(name)) => match name.as_str() {
                "True" => Ok(Value::Bool(true)),
                "False" => Ok(Value::Bool(false)),
                "None" => Ok(Value::Undefined),
                _ => self.resolve(&name),
            },
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(value)
            }
            Some(t) => Err(EvalError::UnexpectedToken(format!("{t:?}"))),
            None => Err(EvalError::UnexpectedEnd),
        }
    }

    /// Name resolution: locals first, then the frame's module globals.
    fn resolve(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.frame.local(name) {
            return Ok(value);
        }
        if let Some(globals) = self.frame.globals() {
            if let Some(value) = globals.attr(name) {
                return Ok(value);
            }
        }
        Err(EvalError::UndefinedName(name.to_string()))
    }
}

fn attribute(value: &Value, name: &str) -> Result<Value, EvalError> {
    match value {
        Value::Object(o) => {
            o.attr(name).ok_or_else(|| EvalError::NoAttribute(name.to_string()))
        }
        _ => Err(EvalError::NoAttribute(name.to_string())),
    }
}

fn index(value: &Value, key: &Value) -> Result<Value, EvalError> {
    match (value, key) {
        (Value::Array(a), Value::Int(i)) => {
            let len = a.len() as i64;
            let idx = if *i < 0 { len + *i } else { *i };
            if idx < 0 || idx >= len {
                return Err(EvalError::IndexOutOfRange(*i));
            }
            a.get(idx as usize).ok_or(EvalError::IndexOutOfRange(*i))
        }
        (Value::Object(o), Value::Str(k)) => {
            o.attr(k).ok_or_else(|| EvalError::NoAttribute(k.clone()))
        }
        _ => Err(EvalError::NotSubscriptable),
    }
}

fn binary(op: char, left: Value, right: Value) -> Result<Value, EvalError> {
    match (op, &left, &right) {
        ('+', Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        ('/', _, _) => {
            let (a, b) = both_numeric(op, &left, &right)?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Float(a / b))
        }
        (_, Value::Int(a), Value::Int(b)) => {
            let result = match op {
                '+' => a.checked_add(*b),
                '-' => a.checked_sub(*b),
                '*' => a.checked_mul(*b),
                _ => return Err(EvalError::UnsupportedOperands(op)),
            };
            result.map(Value::Int).ok_or(EvalError::Overflow)
        }
        _ => {
            let (a, b) = both_numeric(op, &left, &right)?;
            Ok(Value::Float(match op {
                '+' => a + b,
                '-' => a - b,
                '*' => a * b,
                _ => return Err(EvalError::UnsupportedOperands(op)),
            }))
        }
    }
}

fn both_numeric(op: char, left: &Value, right: &Value) -> Result<(f64, f64), EvalError> {
    let as_f64 = |v: &Value| match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    };
    match (as_f64(left), as_f64(right)) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::UnsupportedOperands(op)),
    }
}

/// Evaluates `expr` in `frame`'s local and global environment.
pub fn evaluate(frame: &TraceFrame, expr: &str) -> Result<Value, EvalError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser { tokens, pos: 0, frame };
    let value = parser.expression()?;
    match parser.peek() {
        None => Ok(value),
        Some(t) => Err(EvalError::UnexpectedToken(format!("{t:?}"))),
    }
}
