//! Complex-valued algebraic expressions: parsing and compilation.
//!
//! The coefficient formulas of the operator are kept as plain text in the
//! notation of a computer-algebra system:
//!
//! ```text
//! -1/4*((pi + I*pr)*(kyi*Rx + I*(-(kyr*Rx) + kx*Ry)))/(kyi - I*kyr + r)
//! ```
//!
//! [`parse`] turns such a string into an [`Expr`] tree and
//! [`Expr::compile`] binds its free symbols to argument slots, producing a
//! [`CompiledExpr`] that can be called with a slice of [`Complex64`] values.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := atom (('^' | '**') unary)?      right-associative
//! atom    := number | identifier | '(' sum ')'
//! ```
//!
//! The identifier `I` is the imaginary unit.

use std::collections::BTreeSet;
use std::fmt;

use num_complex::Complex64;
use thiserror::Error;

/// Errors from parsing or compiling an expression.
#[derive(Debug, Error, PartialEq)]
pub enum ExprError {
    #[error("Unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { pos: usize, ch: char },

    #[error("Unexpected token '{found}' at offset {pos}")]
    UnexpectedToken { pos: usize, found: String },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("Unbound symbol '{0}'")]
    UnboundSymbol(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(v) => write!(f, "{}", v),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

/// Split the input into (offset, token) pairs. `**` is folded into `^`.
fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        match ch {
            c if c.is_whitespace() => {
                i += 1;
            }
            '+' => {
                tokens.push((pos, Token::Plus));
                i += 1;
            }
            '-' => {
                tokens.push((pos, Token::Minus));
                i += 1;
            }
            '*' => {
                if i + 1 < chars.len() && chars[i + 1].1 == '*' {
                    tokens.push((pos, Token::Caret));
                    i += 2;
                } else {
                    tokens.push((pos, Token::Star));
                    i += 1;
                }
            }
            '/' => {
                tokens.push((pos, Token::Slash));
                i += 1;
            }
            '^' => {
                tokens.push((pos, Token::Caret));
                i += 1;
            }
            '(' => {
                tokens.push((pos, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((pos, Token::RParen));
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                // Optional exponent: 1e-3, 2.5E+4
                if i < chars.len() && (chars[i].1 == 'e' || chars[i].1 == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j].1 == '+' || chars[j].1 == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].1.is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].1.is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let literal: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                let value: f64 = literal
                    .parse()
                    .map_err(|_| ExprError::InvalidNumber(literal.clone()))?;
                tokens.push((pos, Token::Num(value)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                tokens.push((pos, Token::Ident(name)));
            }
            other => return Err(ExprError::UnexpectedChar { pos, ch: other }),
        }
    }

    Ok(tokens)
}

/// An expression tree over complex numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    /// The imaginary unit.
    Imag,
    Sym(String),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Pow(Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let item = self.tokens.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn sum(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.product()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.cursor += 1;
                    lhs = Expr::Add(Box::new(lhs), Box::new(self.product()?));
                }
                Some(Token::Minus) => {
                    self.cursor += 1;
                    lhs = Expr::Sub(Box::new(lhs), Box::new(self.product()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn product(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.cursor += 1;
                    lhs = Expr::Mul(Box::new(lhs), Box::new(self.unary()?));
                }
                Some(Token::Slash) => {
                    self.cursor += 1;
                    lhs = Expr::Div(Box::new(lhs), Box::new(self.unary()?));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.cursor += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.cursor += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.atom()?;
        if let Some(Token::Caret) = self.peek() {
            self.cursor += 1;
            let exponent = self.unary()?;
            return Ok(Expr::Pow(Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some((_, Token::Num(v))) => Ok(Expr::Num(v)),
            Some((_, Token::Ident(name))) if name == "I" => Ok(Expr::Imag),
            Some((_, Token::Ident(name))) => Ok(Expr::Sym(name)),
            Some((_, Token::LParen)) => {
                let inner = self.sum()?;
                match self.next() {
                    Some((_, Token::RParen)) => Ok(inner),
                    Some((pos, tok)) => Err(ExprError::UnexpectedToken {
                        pos,
                        found: tok.to_string(),
                    }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some((pos, tok)) => Err(ExprError::UnexpectedToken {
                pos,
                found: tok.to_string(),
            }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

/// Parse an expression string.
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        cursor: 0,
    };
    let expr = parser.sum()?;
    match parser.next() {
        None => Ok(expr),
        Some((pos, tok)) => Err(ExprError::UnexpectedToken {
            pos,
            found: tok.to_string(),
        }),
    }
}

impl Expr {
    /// Free symbols, sorted and deduplicated.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Num(_) | Expr::Imag => {}
            Expr::Sym(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(a) => a.collect_symbols(out),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Pow(a, b) => {
                a.collect_symbols(out);
                b.collect_symbols(out);
            }
        }
    }

    /// Resolve symbols to positions in `slots`.
    ///
    /// The returned [`CompiledExpr`] takes its arguments in the order of
    /// `slots`. Any symbol not listed yields [`ExprError::UnboundSymbol`].
    pub fn compile(&self, slots: &[&str]) -> Result<CompiledExpr, ExprError> {
        Ok(CompiledExpr {
            root: self.lower(slots)?,
            arity: slots.len(),
        })
    }

    fn lower(&self, slots: &[&str]) -> Result<Node, ExprError> {
        let bin = |a: &Expr, b: &Expr| -> Result<(Box<Node>, Box<Node>), ExprError> {
            Ok((Box::new(a.lower(slots)?), Box::new(b.lower(slots)?)))
        };
        Ok(match self {
            Expr::Num(v) => Node::Const(Complex64::from(*v)),
            Expr::Imag => Node::Const(Complex64::i()),
            Expr::Sym(name) => {
                let idx = slots
                    .iter()
                    .position(|s| s == name)
                    .ok_or_else(|| ExprError::UnboundSymbol(name.clone()))?;
                Node::Slot(idx)
            }
            Expr::Neg(a) => Node::Neg(Box::new(a.lower(slots)?)),
            Expr::Add(a, b) => {
                let (a, b) = bin(a, b)?;
                Node::Add(a, b)
            }
            Expr::Sub(a, b) => {
                let (a, b) = bin(a, b)?;
                Node::Sub(a, b)
            }
            Expr::Mul(a, b) => {
                let (a, b) = bin(a, b)?;
                Node::Mul(a, b)
            }
            Expr::Div(a, b) => {
                let (a, b) = bin(a, b)?;
                Node::Div(a, b)
            }
            Expr::Pow(a, b) => match b.as_ref() {
                Expr::Num(n) if is_small_integer(*n) => {
                    Node::PowI(Box::new(a.lower(slots)?), *n as i32)
                }
                Expr::Neg(inner) => match inner.as_ref() {
                    Expr::Num(n) if is_small_integer(*n) => {
                        Node::PowI(Box::new(a.lower(slots)?), -(*n as i32))
                    }
                    _ => {
                        let (a, b) = bin(a, b)?;
                        Node::Pow(a, b)
                    }
                },
                _ => {
                    let (a, b) = bin(a, b)?;
                    Node::Pow(a, b)
                }
            },
        })
    }
}

fn is_small_integer(v: f64) -> bool {
    v.fract() == 0.0 && v.abs() <= i32::MAX as f64
}

#[derive(Debug, Clone)]
enum Node {
    Const(Complex64),
    Slot(usize),
    Neg(Box<Node>),
    Add(Box<Node>, Box<Node>),
    Sub(Box<Node>, Box<Node>),
    Mul(Box<Node>, Box<Node>),
    Div(Box<Node>, Box<Node>),
    PowI(Box<Node>, i32),
    Pow(Box<Node>, Box<Node>),
}

impl Node {
    fn eval(&self, args: &[Complex64]) -> Complex64 {
        match self {
            Node::Const(c) => *c,
            Node::Slot(i) => args[*i],
            Node::Neg(a) => -a.eval(args),
            Node::Add(a, b) => a.eval(args) + b.eval(args),
            Node::Sub(a, b) => a.eval(args) - b.eval(args),
            Node::Mul(a, b) => a.eval(args) * b.eval(args),
            Node::Div(a, b) => a.eval(args) / b.eval(args),
            Node::PowI(a, n) => a.eval(args).powi(*n),
            Node::Pow(a, b) => a.eval(args).powc(b.eval(args)),
        }
    }
}

/// An expression with symbols bound to argument slots.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    root: Node,
    arity: usize,
}

impl CompiledExpr {
    /// Number of arguments [`Self::call`] expects.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Evaluate with `args` in slot order.
    ///
    /// # Panics
    /// Panics if `args.len()` differs from [`Self::arity`].
    pub fn call(&self, args: &[Complex64]) -> Complex64 {
        assert_eq!(
            args.len(),
            self.arity,
            "Expected {} arguments, got {}",
            self.arity,
            args.len()
        );
        self.root.eval(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn eval_real(src: &str, slots: &[&str], args: &[f64]) -> Complex64 {
        let args: Vec<Complex64> = args.iter().map(|&a| Complex64::from(a)).collect();
        parse(src).unwrap().compile(slots).unwrap().call(&args)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval_real("1 + 2*3", &[], &[]).re, 7.0);
        assert_eq!(eval_real("(1 + 2)*3", &[], &[]).re, 9.0);
        assert_eq!(eval_real("8/4/2", &[], &[]).re, 1.0);
        assert_eq!(eval_real("10 - 4 - 3", &[], &[]).re, 3.0);
    }

    #[test]
    fn test_power_is_right_associative_and_binds_tighter_than_minus() {
        assert_eq!(eval_real("2^3^2", &[], &[]).re, 512.0);
        assert_eq!(eval_real("2**3**2", &[], &[]).re, 512.0);
        assert_eq!(eval_real("-x^2", &["x"], &[3.0]).re, -9.0);
        assert_abs_diff_eq!(eval_real("x^-1", &["x"], &[4.0]).re, 0.25, epsilon = 1e-15);
    }

    #[test]
    fn test_leading_negative_fraction() {
        // Parsed as ((-1)/4)*x
        assert_abs_diff_eq!(eval_real("-1/4*x", &["x"], &[2.0]).re, -0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_imaginary_unit() {
        let v = eval_real("(-I)*a + I^2", &["a"], &[2.0]);
        assert_abs_diff_eq!(v.re, -1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(v.im, -2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_non_integer_power_uses_complex_branch() {
        let v = eval_real("x^0.5", &["x"], &[-4.0]);
        assert_abs_diff_eq!(v.re, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.im, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scientific_literals() {
        assert_abs_diff_eq!(eval_real("1.5e-3*2E+2", &[], &[]).re, 0.3, epsilon = 1e-15);
    }

    #[test]
    fn test_symbols_are_collected_once() {
        let expr = parse("kx*Ry + kx^2 - I*r").unwrap();
        let syms: Vec<String> = expr.symbols().into_iter().collect();
        assert_eq!(syms, vec!["Ry", "kx", "r"]);
    }

    #[test]
    fn test_unbound_symbol() {
        let expr = parse("a + b").unwrap();
        assert_eq!(
            expr.compile(&["a"]).unwrap_err(),
            ExprError::UnboundSymbol("b".into())
        );
    }

    #[test]
    fn test_error_positions() {
        assert_eq!(
            parse("1 + $").unwrap_err(),
            ExprError::UnexpectedChar { pos: 4, ch: '$' }
        );
        assert_eq!(
            parse("(1 + 2").unwrap_err(),
            ExprError::UnexpectedEnd
        );
        assert_eq!(
            parse("1 + 2)").unwrap_err(),
            ExprError::UnexpectedToken { pos: 5, found: ")".into() }
        );
        assert_eq!(parse("2 *").unwrap_err(), ExprError::UnexpectedEnd);
    }

    #[test]
    #[should_panic(expected = "Expected 2 arguments")]
    fn test_call_checks_arity() {
        let f = parse("a*b").unwrap().compile(&["a", "b"]).unwrap();
        f.call(&[Complex64::from(1.0)]);
    }
}
