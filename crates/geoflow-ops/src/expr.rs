//! Boolean expression language for the `filter` operation
//!
//! Expressions are written in a JavaScript-like syntax against a feature's
//! properties, e.g. `population > 1000 && properties.kind == "city"`.
//! Evaluation follows JavaScript's truthiness and loose-equality rules so
//! that expressions copied from web tooling behave the same way here.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! or         := and ( "||" and )*
//! and        := equality ( "&&" equality )*
//! equality   := relational ( ( "==" | "!=" | "===" | "!==" ) relational )*
//! relational := additive ( ( "<" | "<=" | ">" | ">=" ) additive )*
//! additive   := term ( ( "+" | "-" ) term )*
//! term       := unary ( ( "*" | "/" | "%" ) unary )*
//! unary      := ( "!" | "-" | "+" ) unary | primary
//! primary    := number | string | "true" | "false" | "null" | "undefined"
//!             | identifier ( "." identifier )* | "(" or ")"
//! ```

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::model::Properties;

/// Errors from parsing or evaluating an expression
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Evaluation error: {0}")]
    Eval(String),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    LooseEqual,
    LooseNotEqual,
    StrictEqual,
    StrictNotEqual,
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(ExprValue),
    /// Property lookup by path; `a.b` reads `b` inside property `a`
    Property(Vec<String>),
    Not(Box<Expression>),
    Negate(Box<Expression>),
    Plus(Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

/// Runtime value during evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Arrays and objects
    Composite(Value),
}

impl From<&Value> for ExprValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s.clone()),
            other => Self::Composite(other.clone()),
        }
    }
}

impl ExprValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Composite(_) => true,
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Composite(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Composite(a), Self::Composite(b)) => a == b,
            _ => false,
        }
    }

    fn loose_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Self::Composite(_), _) | (_, Self::Composite(_)) => self.strict_eq(other),
            (Self::String(a), Self::String(b)) => a == b,
            _ => self.to_number() == other.to_number(),
        }
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) if n.is_nan() => f.write_str("NaN"),
            Self::Number(n) if *n == 0.0 => f.write_str("0"),
            Self::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e21 => write!(f, "{n:.0}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
            Self::Composite(Value::Array(items)) => {
                let parts: Vec<String> =
                    items.iter().map(|v| ExprValue::from(v).to_string()).collect();
                f.write_str(&parts.join(","))
            }
            Self::Composite(_) => f.write_str("[object Object]"),
        }
    }
}

impl Expression {
    /// Parse an expression string
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(ExprError::Syntax {
                offset: token.offset,
                message: format!("unexpected {}", token.kind),
            }),
        }
    }

    /// Evaluate against a feature's properties
    pub fn evaluate(&self, properties: &Properties) -> Result<ExprValue, ExprError> {
        match self {
            Self::Literal(v) => Ok(v.clone()),
            Self::Property(path) => lookup(properties, path),
            Self::Not(inner) => Ok(ExprValue::Bool(!inner.evaluate(properties)?.is_truthy())),
            Self::Negate(inner) => Ok(ExprValue::Number(-inner.evaluate(properties)?.to_number())),
            Self::Plus(inner) => Ok(ExprValue::Number(inner.evaluate(properties)?.to_number())),
            Self::And(l, r) => {
                let left = l.evaluate(properties)?;
                if left.is_truthy() {
                    r.evaluate(properties)
                } else {
                    Ok(left)
                }
            }
            Self::Or(l, r) => {
                let left = l.evaluate(properties)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    r.evaluate(properties)
                }
            }
            Self::Binary(op, l, r) => {
                let left = l.evaluate(properties)?;
                let right = r.evaluate(properties)?;
                Ok(apply_binary(*op, &left, &right))
            }
        }
    }

    /// Evaluate and coerce the result to a boolean
    pub fn matches(&self, properties: &Properties) -> Result<bool, ExprError> {
        self.evaluate(properties).map(|v| v.is_truthy())
    }
}

fn lookup(properties: &Properties, path: &[String]) -> Result<ExprValue, ExprError> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(ExprValue::Undefined);
    };
    let mut current = match properties.get(first) {
        Some(v) => v,
        None if rest.is_empty() => return Ok(ExprValue::Undefined),
        None => {
            return Err(ExprError::Eval(format!(
                "cannot read '{}' of undefined",
                rest[0]
            )))
        }
    };
    for (i, key) in rest.iter().enumerate() {
        let next = match current {
            Value::Null => {
                return Err(ExprError::Eval(format!("cannot read '{key}' of null")));
            }
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None if i + 1 == rest.len() => return Ok(ExprValue::Undefined),
            None => {
                return Err(ExprError::Eval(format!(
                    "cannot read '{}' of undefined",
                    rest[i + 1]
                )))
            }
        }
    }
    Ok(ExprValue::from(current))
}

fn apply_binary(op: BinaryOp, left: &ExprValue, right: &ExprValue) -> ExprValue {
    use BinaryOp::*;
    match op {
        Add => match (left, right) {
            (ExprValue::String(_), _)
            | (_, ExprValue::String(_))
            | (ExprValue::Composite(_), _)
            | (_, ExprValue::Composite(_)) => ExprValue::String(format!("{left}{right}")),
            _ => ExprValue::Number(left.to_number() + right.to_number()),
        },
        Subtract => ExprValue::Number(left.to_number() - right.to_number()),
        Multiply => ExprValue::Number(left.to_number() * right.to_number()),
        Divide => ExprValue::Number(left.to_number() / right.to_number()),
        Remainder => ExprValue::Number(left.to_number() % right.to_number()),
        Less | LessOrEqual | Greater | GreaterOrEqual => {
            let ordering = match (left, right) {
                (ExprValue::String(a), ExprValue::String(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            let result = ordering.is_some_and(|ord| match op {
                Less => ord.is_lt(),
                LessOrEqual => ord.is_le(),
                Greater => ord.is_gt(),
                _ => ord.is_ge(),
            });
            ExprValue::Bool(result)
        }
        LooseEqual => ExprValue::Bool(left.loose_eq(right)),
        LooseNotEqual => ExprValue::Bool(!left.loose_eq(right)),
        StrictEqual => ExprValue::Bool(left.strict_eq(right)),
        StrictNotEqual => ExprValue::Bool(!left.strict_eq(right)),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Dot,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::Str(s) => write!(f, "string \"{s}\""),
            Self::Ident(s) => write!(f, "identifier '{s}'"),
            Self::Op(op) => write!(f, "'{op}'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Dot => f.write_str("'.'"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

// Longest operators first so "===" wins over "==".
const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "*", "/", "%",
];

fn tokenize(source: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let kind = match c {
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b'.' if !bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                i += 1;
                TokenKind::Dot
            }
            b'0'..=b'9' | b'.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    i += 1;
                    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                        i += 1;
                    }
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &source[start..i];
                let value = text.parse().map_err(|_| ExprError::Syntax {
                    offset: start,
                    message: format!("invalid number '{text}'"),
                })?;
                TokenKind::Number(value)
            }
            b'"' | b'\'' => {
                let (value, end) = read_string(source, start)?;
                i = end;
                TokenKind::Str(value)
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c == b'$' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
                {
                    i += 1;
                }
                TokenKind::Ident(source[start..i].to_string())
            }
            _ => {
                let rest = &source[i..];
                let op = OPERATORS
                    .iter()
                    .find(|op| rest.starts_with(**op))
                    .ok_or_else(|| ExprError::Syntax {
                        offset: start,
                        message: format!(
                            "unexpected character '{}'",
                            rest.chars().next().unwrap_or('?')
                        ),
                    })?;
                i += op.len();
                TokenKind::Op(*op)
            }
        };
        tokens.push(Token {
            kind,
            offset: start,
        });
    }
    Ok(tokens)
}

fn read_string(source: &str, start: usize) -> Result<(String, usize), ExprError> {
    let mut chars = source[start..].char_indices();
    let quote = chars.next().map(|(_, c)| c).unwrap_or('"');
    let mut value = String::new();
    while let Some((offset, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((value, start + offset + c.len_utf8())),
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            c => value.push(c),
        }
    }
    Err(ExprError::Syntax {
        offset: start,
        message: "unterminated string".to_string(),
    })
}

/// Deepest expression tree the parser will build
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Current tree depth, bounded by `MAX_DEPTH`
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat_op(&mut self, candidates: &[&'static str]) -> Option<&'static str> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Op(op)) if candidates.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn end_offset(&self) -> usize {
        self.tokens.last().map(|t| t.offset + 1).unwrap_or(0)
    }

    /// Go one level deeper; fails past `MAX_DEPTH`
    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let offset = self
                .tokens
                .get(self.pos.saturating_sub(1))
                .map(|t| t.offset)
                .unwrap_or(0);
            return Err(ExprError::Syntax {
                offset,
                message: format!("expression nested deeper than {MAX_DEPTH} levels"),
            });
        }
        Ok(())
    }

    fn or(&mut self) -> Result<Expression, ExprError> {
        let base = self.depth;
        let mut left = self.and()?;
        while self.eat_op(&["||"]).is_some() {
            self.enter()?;
            let right = self.and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn and(&mut self) -> Result<Expression, ExprError> {
        let base = self.depth;
        let mut left = self.equality()?;
        while self.eat_op(&["&&"]).is_some() {
            self.enter()?;
            let right = self.equality()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Self) -> Result<Expression, ExprError>,
    ) -> Result<Expression, ExprError> {
        let base = self.depth;
        let mut left = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            self.enter()?;
            let right = next(self)?;
            let op = match op {
                "==" => BinaryOp::LooseEqual,
                "!=" => BinaryOp::LooseNotEqual,
                "===" => BinaryOp::StrictEqual,
                "!==" => BinaryOp::StrictNotEqual,
                "<" => BinaryOp::Less,
                "<=" => BinaryOp::LessOrEqual,
                ">" => BinaryOp::Greater,
                ">=" => BinaryOp::GreaterOrEqual,
                "+" => BinaryOp::Add,
                "-" => BinaryOp::Subtract,
                "*" => BinaryOp::Multiply,
                "/" => BinaryOp::Divide,
                _ => BinaryOp::Remainder,
            };
            left = Expression::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = base;
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expression, ExprError> {
        self.binary_level(&["===", "!==", "==", "!="], Self::relational)
    }

    fn relational(&mut self) -> Result<Expression, ExprError> {
        self.binary_level(&["<=", ">=", "<", ">"], Self::additive)
    }

    fn additive(&mut self) -> Result<Expression, ExprError> {
        self.binary_level(&["+", "-"], Self::term)
    }

    fn term(&mut self) -> Result<Expression, ExprError> {
        self.binary_level(&["*", "/", "%"], Self::unary)
    }

    fn unary(&mut self) -> Result<Expression, ExprError> {
        let Some(op) = self.eat_op(&["!", "-", "+"]) else {
            return self.primary();
        };
        self.enter()?;
        let inner = Box::new(self.unary()?);
        self.depth -= 1;
        Ok(match op {
            "!" => Expression::Not(inner),
            "-" => Expression::Negate(inner),
            _ => Expression::Plus(inner),
        })
    }

    fn primary(&mut self) -> Result<Expression, ExprError> {
        let Some(token) = self.tokens.get(self.pos).cloned() else {
            return Err(ExprError::Syntax {
                offset: self.end_offset(),
                message: "unexpected end of expression".to_string(),
            });
        };
        self.pos += 1;
        match token.kind {
            TokenKind::Number(n) => Ok(Expression::Literal(ExprValue::Number(n))),
            TokenKind::Str(s) => Ok(Expression::Literal(ExprValue::String(s))),
            TokenKind::LParen => {
                self.enter()?;
                let inner = self.or()?;
                self.depth -= 1;
                match self.peek() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    Some(t) => Err(ExprError::Syntax {
                        offset: t.offset,
                        message: format!("expected ')', found {}", t.kind),
                    }),
                    None => Err(ExprError::Syntax {
                        offset: self.end_offset(),
                        message: "expected ')'".to_string(),
                    }),
                }
            }
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Expression::Literal(ExprValue::Bool(true))),
                "false" => Ok(Expression::Literal(ExprValue::Bool(false))),
                "null" => Ok(Expression::Literal(ExprValue::Null)),
                "undefined" => Ok(Expression::Literal(ExprValue::Undefined)),
                _ => self.property_path(name),
            },
            other => Err(ExprError::Syntax {
                offset: token.offset,
                message: format!("unexpected {other}"),
            }),
        }
    }

    fn property_path(&mut self, first: String) -> Result<Expression, ExprError> {
        let mut path = vec![first];
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Dot)) {
            self.pos += 1;
            match self.tokens.get(self.pos).cloned() {
                Some(Token {
                    kind: TokenKind::Ident(name),
                    ..
                }) => {
                    self.pos += 1;
                    path.push(name);
                }
                Some(t) => {
                    return Err(ExprError::Syntax {
                        offset: t.offset,
                        message: format!("expected a property name, found {}", t.kind),
                    })
                }
                None => {
                    return Err(ExprError::Syntax {
                        offset: self.end_offset(),
                        message: "expected a property name".to_string(),
                    })
                }
            }
        }
        // `feature.properties.x` and `properties.x` both address property `x`
        if path.len() > 2 && path[0] == "feature" && path[1] == "properties" {
            path.drain(..2);
        } else if path.len() > 1 && path[0] == "properties" {
            path.remove(0);
        }
        Ok(Expression::Property(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    fn eval(source: &str, properties: &Properties) -> bool {
        Expression::parse(source).unwrap().matches(properties).unwrap()
    }

    #[test]
    fn test_comparison_and_logic() {
        let p = props(json!({"population": 5000, "kind": "city"}));
        assert!(eval("population > 1000 && kind == 'city'", &p));
        assert!(!eval("population > 1000 && kind == \"town\"", &p));
        assert!(eval("population < 10 || kind != 'town'", &p));
        assert!(eval("!(population <= 1000)", &p));
    }

    #[test]
    fn test_property_prefixes() {
        let p = props(json!({"a": 2}));
        assert!(eval("properties.a === 2", &p));
        assert!(eval("feature.properties.a * 3 == 6", &p));
    }

    #[test]
    fn test_loose_equality_follows_javascript() {
        let p = props(json!({"code": "42", "empty": null}));
        assert!(eval("code == 42", &p));
        assert!(!eval("code === 42", &p));
        assert!(eval("empty == undefined", &p));
        assert!(eval("missing == null", &p));
        assert!(!eval("missing === null", &p));
    }

    #[test]
    fn test_arithmetic_precedence() {
        let p = Properties::new();
        assert!(eval("1 + 2 * 3 == 7", &p));
        assert!(eval("(1 + 2) * 3 == 9", &p));
        assert!(eval("7 % 4 == 3", &p));
        assert!(eval("-2 < 0", &p));
        assert!(eval("'a' + 1 === 'a1'", &p));
    }

    #[test]
    fn test_truthiness_of_bare_values() {
        let p = props(json!({"name": "", "count": 0, "tags": []}));
        assert!(!eval("name", &p));
        assert!(!eval("count", &p));
        assert!(eval("tags", &p));
        assert!(!eval("missing", &p));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            Expression::parse("a >"),
            Err(ExprError::Syntax { .. })
        ));
        assert!(matches!(
            Expression::parse("(a"),
            Err(ExprError::Syntax { .. })
        ));
        assert!(matches!(
            Expression::parse("a # b"),
            Err(ExprError::Syntax { .. })
        ));
        assert!(matches!(
            Expression::parse("'open"),
            Err(ExprError::Syntax { .. })
        ));
    }

    #[test]
    fn test_nesting_depth_is_bounded() {
        let p = props(json!({"a": 1}));
        let shallow = format!("{}a{}", "(".repeat(200), ")".repeat(200));
        assert!(eval(&shallow, &p));

        let deep = format!("{}a{}", "(".repeat(2000), ")".repeat(2000));
        assert!(matches!(
            Expression::parse(&deep),
            Err(ExprError::Syntax { .. })
        ));
        assert!(Expression::parse(&"!".repeat(5000)).is_err());
        let chain = vec!["a"; 5000].join(" + ");
        assert!(Expression::parse(&chain).is_err());
    }

    #[test]
    fn test_large_integers_stringify_exactly() {
        let p = props(json!({"big": 1e20, "zero": -0.0}));
        assert!(eval("'' + big === '100000000000000000000'", &p));
        assert!(eval("'' + zero === '0'", &p));
    }

    #[test]
    fn test_nested_lookup_through_undefined_is_an_error() {
        let expr = Expression::parse("missing.inner == 1").unwrap();
        assert!(matches!(
            expr.evaluate(&Properties::new()),
            Err(ExprError::Eval(_))
        ));

        let p = props(json!({"meta": {"level": 3}}));
        assert!(eval("meta.level >= 3", &p));
    }
}
