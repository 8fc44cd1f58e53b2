//! A small expression language for `{{…}}` emissions, `{%…%}`
//! assignments, `{$…}` compile-time substitutions and form group
//! conditions. Only lookups, literals and operators; nothing is ever
//! handed to a host-language evaluator.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Value),
    /// `$a.b.c`
    Var(Vec<String>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Concat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.position)
    }
}

impl std::error::Error for ParseError {}

/// Variable resolution for evaluation. `path` is never empty.
pub trait Scope {
    fn lookup(&self, path: &[String]) -> Option<Value>;
}

/// Descend into nested objects (and arrays, by index) of `value`.
pub fn lookup_path(value: &Value, path: &[String]) -> Option<Value> {
    let mut current = value;
    for key in path {
        current = match current {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}


// ------------------------------------------------------------------
// Tokenizer

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Var(Vec<String>),
    Str(String),
    Int(i64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "~", "=",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(s: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let err = |position: usize, message: &str| ParseError {
        position, message: message.into()
    };
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut i = 0;
    while i < chars.len() {
        let (pos, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '$' {
            i += 1;
            let mut path = Vec::new();
            loop {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i].1) {
                    i += 1;
                }
                if start == i {
                    return Err(err(pos, "expecting a name after '$' or '.'"));
                }
                path.push(chars[start..i].iter().map(|(_, c)| *c).collect());
                if i < chars.len() && chars[i].1 == '.' {
                    i += 1;
                } else {
                    break;
                }
            }
            tokens.push((pos, Token::Var(path)));
        } else if c == '\'' || c == '"' {
            let quote = c;
            i += 1;
            let mut value = String::new();
            loop {
                match chars.get(i) {
                    None => return Err(err(pos, "unterminated string literal")),
                    Some((_, '\\')) => {
                        match chars.get(i + 1) {
                            Some((_, c)) => value.push(*c),
                            None => return Err(err(pos, "unterminated string literal")),
                        }
                        i += 2;
                    }
                    Some((_, c)) if *c == quote => {
                        i += 1;
                        break;
                    }
                    Some((_, c)) => {
                        value.push(*c);
                        i += 1;
                    }
                }
            }
            tokens.push((pos, Token::Str(value)));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].1.is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().map(|(_, c)| *c).collect();
            let n = digits.parse().map_err(|_| err(pos, "integer literal out of range"))?;
            tokens.push((pos, Token::Int(n)));
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i].1) {
                i += 1;
            }
            tokens.push((pos, Token::Ident(
                chars[start..i].iter().map(|(_, c)| *c).collect())));
        } else if c == '(' {
            tokens.push((pos, Token::LParen));
            i += 1;
        } else if c == ')' {
            tokens.push((pos, Token::RParen));
            i += 1;
        } else {
            let rest = &s[pos..];
            let op = OPERATORS.iter().find(|op| rest.starts_with(*op))
                .ok_or_else(|| err(pos, "unexpected character"))?;
            tokens.push((pos, Token::Op(*op)));
            i += op.chars().count();
        }
    }
    Ok(tokens)
}


// ------------------------------------------------------------------
// Parser

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(p, _)| *p)
    }

    fn error<T>(&self, message: &str) -> Result<T, ParseError> {
        Err(ParseError { position: self.offset(), message: message.into() })
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
        repeat: bool,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        'outer: loop {
            for (s, op) in ops {
                if self.eat_op(s) {
                    let right = next(self)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    if repeat {
                        continue 'outer;
                    }
                    break 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[("||", BinOp::Or)], Self::and, true)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[("&&", BinOp::And)], Self::comparison, true)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[("==", BinOp::Eq), ("!=", BinOp::Ne),
                            ("<=", BinOp::Le), (">=", BinOp::Ge),
                            ("<", BinOp::Lt), (">", BinOp::Gt)],
                          Self::additive, false)
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[("+", BinOp::Add), ("-", BinOp::Sub), ("~", BinOp::Concat)],
                          Self::unary, true)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat_op("!") {
            Ok(Expr::Not(Box::new(self.unary()?)))
        } else if self.eat_op("-") {
            Ok(Expr::Neg(Box::new(self.unary()?)))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = match self.peek() {
            Some(t) => t.clone(),
            None => return self.error("unexpected end of expression"),
        };
        let expr = match token {
            Token::Var(path) => Expr::Var(path),
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::Int(n) => Expr::Literal(Value::from(n)),
            Token::Ident(id) => match id.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => return self.error("bare names are not allowed, use $name"),
            },
            Token::LParen => {
                self.pos += 1;
                let inner = self.or()?;
                if self.peek() != Some(&Token::RParen) {
                    return self.error("expecting ')'");
                }
                inner
            }
            Token::RParen | Token::Op(_) => return self.error("expecting a value"),
        };
        self.pos += 1;
        Ok(expr)
    }
}

/// Parse a complete expression.
pub fn parse(s: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser { tokens: tokenize(s)?, pos: 0, end: s.len() };
    let expr = parser.or()?;
    if parser.pos < parser.tokens.len() {
        return parser.error("unexpected trailing input");
    }
    Ok(expr)
}

/// Parse `$name = expr`, the only statement form.
pub fn parse_assignment(s: &str) -> Result<(String, Expr), ParseError> {
    let tokens = tokenize(s)?;
    let name = match tokens.as_slice() {
        [(_, Token::Var(path)), (_, Token::Op("=")), ..] if path.len() == 1 =>
            path[0].clone(),
        _ => return Err(ParseError {
            position: 0,
            message: "expecting an assignment of the form `$name = expression`".into()
        })
    };
    let mut parser = Parser { tokens, pos: 2, end: s.len() };
    let expr = parser.or()?;
    if parser.pos < parser.tokens.len() {
        return parser.error("unexpected trailing input");
    }
    Ok((name, expr))
}


// ------------------------------------------------------------------
// Evaluation

/// Loose truthiness: null, false, 0, "", "0" and empty collections
/// are false.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// The text a value prints as. Collections print as JSON.
pub fn to_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(true) => "1".into(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => v.to_string(),
    }
}

fn to_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Value::from(f)
    }
}

/// Compare numerically when both sides are numeric, as text otherwise.
pub fn loose_cmp(a: &Value, b: &Value) -> std::cmp::Ordering {
    let numeric = |v: &Value| match v {
        Value::String(s) if s.trim().is_empty() => None,
        _ => to_number(v),
    };
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => to_text(a).cmp(&to_text(b)),
    }
}

pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) =>
            a == b,
        _ => loose_cmp(a, b) == std::cmp::Ordering::Equal,
    }
}

impl Expr {
    /// Unknown variables evaluate to null.
    pub fn eval(&self, scope: &dyn Scope) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Var(path) => scope.lookup(path).unwrap_or(Value::Null),
            Expr::Not(e) => Value::Bool(!truthy(&e.eval(scope))),
            Expr::Neg(e) => number_value(-to_number(&e.eval(scope)).unwrap_or(0.0)),
            Expr::Binary(op, a, b) => {
                match op {
                    BinOp::Or => {
                        return Value::Bool(truthy(&a.eval(scope)) || truthy(&b.eval(scope)))
                    }
                    BinOp::And => {
                        return Value::Bool(truthy(&a.eval(scope)) && truthy(&b.eval(scope)))
                    }
                    _ => ()
                }
                let (x, y) = (a.eval(scope), b.eval(scope));
                use std::cmp::Ordering::*;
                match op {
                    BinOp::Eq => Value::Bool(loose_eq(&x, &y)),
                    BinOp::Ne => Value::Bool(!loose_eq(&x, &y)),
                    BinOp::Lt => Value::Bool(loose_cmp(&x, &y) == Less),
                    BinOp::Le => Value::Bool(loose_cmp(&x, &y) != Greater),
                    BinOp::Gt => Value::Bool(loose_cmp(&x, &y) == Greater),
                    BinOp::Ge => Value::Bool(loose_cmp(&x, &y) != Less),
                    BinOp::Add => number_value(
                        to_number(&x).unwrap_or(0.0) + to_number(&y).unwrap_or(0.0)),
                    BinOp::Sub => number_value(
                        to_number(&x).unwrap_or(0.0) - to_number(&y).unwrap_or(0.0)),
                    BinOp::Concat => Value::String(to_text(&x) + &to_text(&y)),
                    BinOp::Or | BinOp::And => unreachable!("handled above"),
                }
            }
        }
    }

    /// Every variable path the expression reads.
    pub fn variables(&self) -> Vec<&[String]> {
        let mut out = Vec::new();
        fn walk<'e>(e: &'e Expr, out: &mut Vec<&'e [String]>) {
            match e {
                Expr::Literal(_) => (),
                Expr::Var(p) => out.push(p),
                Expr::Not(e) | Expr::Neg(e) => walk(e, out),
                Expr::Binary(_, a, b) => {
                    walk(a, out);
                    walk(b, out);
                }
            }
        }
        walk(self, &mut out);
        out
    }
}

/// A scope over a single JSON object, e.g. configured variables.
pub struct ObjectScope<'t>(pub &'t serde_json::Map<String, Value>);

impl<'t> Scope for ObjectScope<'t> {
    fn lookup(&self, path: &[String]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        lookup_path(self.0.get(first)?, rest)
    }
}
