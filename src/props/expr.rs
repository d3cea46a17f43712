//! Arithmetic expressions used by numeric property kinds.
//!
//! Property values such as `chn=%d` or `frameRate=1000/%d` are assembled from
//! template output and may contain simple arithmetic. The extractor only
//! depends on [`ExpressionEvaluator`]; [`InfixEvaluator`] is the default.

use thiserror::Error;

/// Error raised by an expression evaluator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character '{found}' at position {position}")]
    UnexpectedChar { found: char, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,
}

/// Evaluates infix arithmetic to a number.
pub trait ExpressionEvaluator {
    fn evaluate_int(&self, expression: &str) -> Result<i64, ExprError>;

    fn evaluate_float(&self, expression: &str) -> Result<f64, ExprError>;
}

/// Recursive-descent evaluator for `+ - * / %`, unary sign and parentheses.
///
/// Integer evaluation truncates division toward zero and fails on overflow.
/// Float evaluation accepts decimal literals such as `29.97`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfixEvaluator;

impl ExpressionEvaluator for InfixEvaluator {
    fn evaluate_int(&self, expression: &str) -> Result<i64, ExprError> {
        Parser::new(expression).run::<IntMath>()
    }

    fn evaluate_float(&self, expression: &str) -> Result<f64, ExprError> {
        Parser::new(expression).run::<FloatMath>()
    }
}

/// Number domain the parser evaluates in.
trait Arithmetic {
    type Num: Copy;

    fn literal(text: &str) -> Result<Self::Num, ExprError>;
    fn accepts_fraction() -> bool;
    fn neg(a: Self::Num) -> Result<Self::Num, ExprError>;
    fn add(a: Self::Num, b: Self::Num) -> Result<Self::Num, ExprError>;
    fn sub(a: Self::Num, b: Self::Num) -> Result<Self::Num, ExprError>;
    fn mul(a: Self::Num, b: Self::Num) -> Result<Self::Num, ExprError>;
    fn div(a: Self::Num, b: Self::Num) -> Result<Self::Num, ExprError>;
    fn rem(a: Self::Num, b: Self::Num) -> Result<Self::Num, ExprError>;
}

struct IntMath;

impl Arithmetic for IntMath {
    type Num = i64;

    fn literal(text: &str) -> Result<i64, ExprError> {
        text.parse()
            .map_err(|_| ExprError::InvalidNumber(text.to_string()))
    }

    fn accepts_fraction() -> bool {
        false
    }

    fn neg(a: i64) -> Result<i64, ExprError> {
        a.checked_neg().ok_or(ExprError::Overflow)
    }

    fn add(a: i64, b: i64) -> Result<i64, ExprError> {
        a.checked_add(b).ok_or(ExprError::Overflow)
    }

    fn sub(a: i64, b: i64) -> Result<i64, ExprError> {
        a.checked_sub(b).ok_or(ExprError::Overflow)
    }

    fn mul(a: i64, b: i64) -> Result<i64, ExprError> {
        a.checked_mul(b).ok_or(ExprError::Overflow)
    }

    fn div(a: i64, b: i64) -> Result<i64, ExprError> {
        if b == 0 {
            return Err(ExprError::DivisionByZero);
        }
        a.checked_div(b).ok_or(ExprError::Overflow)
    }

    fn rem(a: i64, b: i64) -> Result<i64, ExprError> {
        if b == 0 {
            return Err(ExprError::DivisionByZero);
        }
        a.checked_rem(b).ok_or(ExprError::Overflow)
    }
}

struct FloatMath;

impl Arithmetic for FloatMath {
    type Num = f64;

    fn literal(text: &str) -> Result<f64, ExprError> {
        text.parse()
            .map_err(|_| ExprError::InvalidNumber(text.to_string()))
    }

    fn accepts_fraction() -> bool {
        true
    }

    fn neg(a: f64) -> Result<f64, ExprError> {
        Ok(-a)
    }

    fn add(a: f64, b: f64) -> Result<f64, ExprError> {
        Ok(a + b)
    }

    fn sub(a: f64, b: f64) -> Result<f64, ExprError> {
        Ok(a - b)
    }

    fn mul(a: f64, b: f64) -> Result<f64, ExprError> {
        Ok(a * b)
    }

    fn div(a: f64, b: f64) -> Result<f64, ExprError> {
        if b == 0.0 {
            return Err(ExprError::DivisionByZero);
        }
        Ok(a / b)
    }

    fn rem(a: f64, b: f64) -> Result<f64, ExprError> {
        if b == 0.0 {
            return Err(ExprError::DivisionByZero);
        }
        Ok(a % b)
    }
}

/// Grammar:
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := unary (('*' | '/' | '%') unary)*
/// unary  := ('+' | '-') unary | atom
/// atom   := number | '(' expr ')'
/// ```
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn run<A: Arithmetic>(mut self) -> Result<A::Num, ExprError> {
        if self.input.trim().is_empty() {
            return Err(ExprError::Empty);
        }
        let value = self.expr::<A>()?;
        match self.peek() {
            None => Ok(value),
            Some(c) => Err(self.unexpected(c)),
        }
    }

    fn expr<A: Arithmetic>(&mut self) -> Result<A::Num, ExprError> {
        let mut acc = self.term::<A>()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.bump();
            let rhs = self.term::<A>()?;
            acc = if op == '+' { A::add(acc, rhs)? } else { A::sub(acc, rhs)? };
        }
        Ok(acc)
    }

    fn term<A: Arithmetic>(&mut self) -> Result<A::Num, ExprError> {
        let mut acc = self.unary::<A>()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.bump();
            let rhs = self.unary::<A>()?;
            acc = match op {
                '*' => A::mul(acc, rhs)?,
                '/' => A::div(acc, rhs)?,
                _ => A::rem(acc, rhs)?,
            };
        }
        Ok(acc)
    }

    fn unary<A: Arithmetic>(&mut self) -> Result<A::Num, ExprError> {
        match self.peek() {
            Some('-') => {
                self.bump();
                A::neg(self.unary::<A>()?)
            }
            Some('+') => {
                self.bump();
                self.unary::<A>()
            }
            _ => self.atom::<A>(),
        }
    }

    fn atom<A: Arithmetic>(&mut self) -> Result<A::Num, ExprError> {
        match self.peek() {
            Some('(') => {
                self.bump();
                let inner = self.expr::<A>()?;
                match self.peek() {
                    Some(')') => {
                        self.bump();
                        Ok(inner)
                    }
                    Some(c) => Err(self.unexpected(c)),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() || (c == '.' && A::accepts_fraction()) => {
                let start = self.pos;
                let rest = &self.input[start..];
                let len = rest
                    .find(|ch: char| !(ch.is_ascii_digit() || (ch == '.' && A::accepts_fraction())))
                    .unwrap_or(rest.len());
                self.pos += len;
                A::literal(&rest[..len])
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    /// Next non-whitespace character, without consuming it.
    fn peek(&mut self) -> Option<char> {
        let rest = &self.input[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        trimmed.chars().next()
    }

    fn bump(&mut self) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    fn unexpected(&self, found: char) -> ExprError {
        ExprError::UnexpectedChar {
            found,
            position: self.pos,
        }
    }
}
