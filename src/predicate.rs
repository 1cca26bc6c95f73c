//! Predicate language
//!
//! Predicates are attribute/comparator/value triples combined with `NOT`,
//! `AND` and `OR`. They are built as values, so untrusted strings never travel
//! through query text. The textual form (`Display` / `FromStr`) renders string
//! values as escaped, double-quoted literals and integers bare:
//!
//! ```text
//! id < 3 AND title CONTAINS[c] "art"
//! id IN {1, 2}
//! NOT (author == "O\"Brien")
//! ```

use crate::entity::{AttrValue, ObjectId, Record};
use crate::error::StoreError;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparator {
    fn symbol(self) -> &'static str {
        match self {
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparator::Eq => ordering == Ordering::Equal,
            Comparator::Ne => ordering != Ordering::Equal,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Le => ordering != Ordering::Greater,
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Ge => ordering != Ordering::Less,
        }
    }
}

/// Query predicate over records
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        attribute: String,
        op: Comparator,
        value: AttrValue,
    },
    In {
        attribute: String,
        values: Vec<AttrValue>,
    },
    /// Case-insensitive substring match
    ContainsCi {
        attribute: String,
        needle: String,
    },
    /// Object-id membership (`SELF IN {...}`)
    SelfIn(Vec<ObjectId>),
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    fn compare(attribute: impl Into<String>, op: Comparator, value: impl Into<AttrValue>) -> Self {
        Predicate::Compare {
            attribute: attribute.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::compare(attribute, Comparator::Eq, value)
    }

    pub fn ne(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::compare(attribute, Comparator::Ne, value)
    }

    pub fn lt(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::compare(attribute, Comparator::Lt, value)
    }

    pub fn le(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::compare(attribute, Comparator::Le, value)
    }

    pub fn gt(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::compare(attribute, Comparator::Gt, value)
    }

    pub fn ge(attribute: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::compare(attribute, Comparator::Ge, value)
    }

    pub fn is_in<V: Into<AttrValue>>(
        attribute: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Predicate::In {
            attribute: attribute.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains_ci(attribute: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::ContainsCi {
            attribute: attribute.into(),
            needle: needle.into(),
        }
    }

    pub fn self_in(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Predicate::SelfIn(ids.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Self {
        Predicate::Not(Box::new(predicate))
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    /// Evaluate against a record. Missing attributes only satisfy `!=`.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Compare {
                attribute,
                op,
                value,
            } => match record.get(attribute) {
                Some(actual) => match compare_values(actual, value) {
                    Some(ordering) => op.accepts(ordering),
                    None => *op == Comparator::Ne,
                },
                None => *op == Comparator::Ne,
            },
            Predicate::In { attribute, values } => match record.get(attribute) {
                Some(actual) => values
                    .iter()
                    .any(|candidate| compare_values(actual, candidate) == Some(Ordering::Equal)),
                None => false,
            },
            Predicate::ContainsCi { attribute, needle } => record
                .get_str(attribute)
                .map(|haystack| haystack.to_lowercase().contains(&needle.to_lowercase()))
                .unwrap_or(false),
            Predicate::SelfIn(ids) => ids.contains(&record.id()),
            Predicate::Not(inner) => !inner.matches(record),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(record)),
        }
    }
}

/// Ordering between two attribute values; `None` when the types are not comparable
pub fn compare_values(a: &AttrValue, b: &AttrValue) -> Option<Ordering> {
    match (a, b) {
        (AttrValue::Int(x), AttrValue::Int(y)) => Some(x.cmp(y)),
        (AttrValue::Float(x), AttrValue::Float(y)) => x.partial_cmp(y),
        (AttrValue::Int(x), AttrValue::Float(y)) => (*x as f64).partial_cmp(y),
        (AttrValue::Float(x), AttrValue::Int(y)) => x.partial_cmp(&(*y as f64)),
        (AttrValue::Str(x), AttrValue::Str(y)) => Some(x.cmp(y)),
        (AttrValue::Bool(x), AttrValue::Bool(y)) => Some(x.cmp(y)),
        (AttrValue::Refs(x), AttrValue::Refs(y)) => {
            if x == y {
                Some(Ordering::Equal)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Escape a string literal for the textual predicate form
pub fn escape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

struct Literal<'a>(&'a AttrValue);

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(x) => write!(f, "{:?}", x),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Str(s) => f.write_str(&escape_literal(s)),
            AttrValue::Refs(ids) => {
                let parts: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare {
                attribute,
                op,
                value,
            } => write!(f, "{} {} {}", attribute, op.symbol(), Literal(value)),
            Predicate::In { attribute, values } => {
                let parts: Vec<String> = values.iter().map(|v| Literal(v).to_string()).collect();
                write!(f, "{} IN {{{}}}", attribute, parts.join(", "))
            }
            Predicate::ContainsCi { attribute, needle } => {
                write!(f, "{} CONTAINS[c] {}", attribute, escape_literal(needle))
            }
            Predicate::SelfIn(ids) => {
                let parts: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, "SELF IN {{{}}}", parts.join(", "))
            }
            Predicate::Not(inner) => write!(f, "NOT ({})", inner),
            Predicate::And(parts) => write_joined(f, parts, "AND"),
            Predicate::Or(parts) => write_joined(f, parts, "OR"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Predicate], keyword: &str) -> fmt::Result {
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            write!(f, " {} ", keyword)?;
        }
        write!(f, "({})", part)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Op(Comparator),
    In,
    ContainsCi,
    And,
    Or,
    Not,
    Value(AttrValue),
    Object(ObjectId),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, StoreError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (ch, next) {
                    ('=', Some('=')) => (Comparator::Eq, 2),
                    ('!', Some('=')) => (Comparator::Ne, 2),
                    ('<', Some('=')) => (Comparator::Le, 2),
                    ('>', Some('=')) => (Comparator::Ge, 2),
                    ('<', _) => (Comparator::Lt, 1),
                    ('>', _) => (Comparator::Gt, 1),
                    _ => {
                        return Err(StoreError::InvalidPredicate(format!(
                            "unexpected '{}' at offset {}",
                            ch, i
                        )))
                    }
                };
                tokens.push(Token::Op(op));
                i += width;
            }
            '"' => {
                let mut literal = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(StoreError::InvalidPredicate(
                                "unterminated string literal".to_string(),
                            ))
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = match chars.get(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('r') => '\r',
                                Some(c @ ('"' | '\\')) => *c,
                                other => {
                                    return Err(StoreError::InvalidPredicate(format!(
                                        "invalid escape sequence '\\{}'",
                                        other.map(|c| c.to_string()).unwrap_or_default()
                                    )))
                                }
                            };
                            literal.push(escaped);
                            i += 2;
                        }
                        Some(c) => {
                            literal.push(*c);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Value(AttrValue::Str(literal)));
            }
            '#' => {
                let start = i + 1;
                i = start;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let digits: String = chars[start..i].iter().collect();
                let raw = digits.parse::<u64>().map_err(|_| {
                    StoreError::InvalidPredicate(format!("invalid object id '#{}'", digits))
                })?;
                tokens.push(Token::Object(ObjectId::new(raw)));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent, as written by `{:?}` for large and small floats
                if matches!(chars.get(i), Some('e' | 'E')) {
                    i += 1;
                    if matches!(chars.get(i), Some('+' | '-')) {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = if text.contains(['.', 'e', 'E']) {
                    text.parse::<f64>().map(AttrValue::Float).ok()
                } else {
                    text.parse::<i64>().map(AttrValue::Int).ok()
                };
                let value = value.ok_or_else(|| {
                    StoreError::InvalidPredicate(format!("invalid number '{}'", text))
                })?;
                tokens.push(Token::Value(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let token = match word.as_str() {
                    "AND" | "and" => Token::And,
                    "OR" | "or" => Token::Or,
                    "NOT" | "not" => Token::Not,
                    "IN" | "in" => Token::In,
                    "true" => Token::Value(AttrValue::Bool(true)),
                    "false" => Token::Value(AttrValue::Bool(false)),
                    "CONTAINS" | "contains" => {
                        let suffix: String = chars[i..].iter().take(3).collect();
                        if suffix.eq_ignore_ascii_case("[c]") {
                            i += 3;
                            Token::ContainsCi
                        } else {
                            return Err(StoreError::InvalidPredicate(
                                "only case-insensitive CONTAINS[c] is supported".to_string(),
                            ));
                        }
                    }
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            other => {
                return Err(StoreError::InvalidPredicate(format!(
                    "unexpected character '{}' at offset {}",
                    other, i
                )))
            }
        }
    }
    Ok(tokens)
}

/// Deepest nesting of `NOT` and parentheses a parsed predicate may have
const MAX_NESTING: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), StoreError> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(StoreError::InvalidPredicate(format!(
                "expected {:?}, found {:?}",
                expected, other
            ))),
        }
    }

    // or_expr := and_expr (OR and_expr)*
    fn or_expr(&mut self) -> Result<Predicate, StoreError> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and_expr()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Predicate, StoreError> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Predicate, StoreError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.unary()?;
                self.depth -= 1;
                Ok(Predicate::not(inner))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                self.descend()?;
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                self.depth -= 1;
                Ok(inner)
            }
            _ => self.triple(),
        }
    }

    fn descend(&mut self) -> Result<(), StoreError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(StoreError::InvalidPredicate(format!(
                "predicate nests deeper than {} levels",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    fn triple(&mut self) -> Result<Predicate, StoreError> {
        let attribute = match self.next() {
            Some(Token::Ident(name)) => name,
            other => {
                return Err(StoreError::InvalidPredicate(format!(
                    "expected attribute name, found {:?}",
                    other
                )))
            }
        };
        match self.next() {
            Some(Token::Op(op)) => match self.next() {
                Some(Token::Value(value)) => Ok(Predicate::Compare {
                    attribute,
                    op,
                    value,
                }),
                other => Err(StoreError::InvalidPredicate(format!(
                    "expected value after '{}', found {:?}",
                    op.symbol(),
                    other
                ))),
            },
            Some(Token::In) => self.set(attribute),
            Some(Token::ContainsCi) => match self.next() {
                Some(Token::Value(AttrValue::Str(needle))) => {
                    Ok(Predicate::ContainsCi { attribute, needle })
                }
                other => Err(StoreError::InvalidPredicate(format!(
                    "CONTAINS[c] needs a string literal, found {:?}",
                    other
                ))),
            },
            other => Err(StoreError::InvalidPredicate(format!(
                "expected comparator after '{}', found {:?}",
                attribute, other
            ))),
        }
    }

    fn set(&mut self, attribute: String) -> Result<Predicate, StoreError> {
        self.expect(Token::LBrace)?;
        let mut values = Vec::new();
        let mut ids = Vec::new();
        loop {
            match self.next() {
                Some(Token::RBrace) => break,
                Some(Token::Value(value)) => values.push(value),
                Some(Token::Object(id)) => ids.push(id),
                other => {
                    return Err(StoreError::InvalidPredicate(format!(
                        "unexpected {:?} in IN set",
                        other
                    )))
                }
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBrace) => break,
                other => {
                    return Err(StoreError::InvalidPredicate(format!(
                        "expected ',' or '}}' in IN set, found {:?}",
                        other
                    )))
                }
            }
        }
        if attribute == "SELF" {
            if !values.is_empty() {
                return Err(StoreError::InvalidPredicate(
                    "SELF IN accepts only object ids".to_string(),
                ));
            }
            return Ok(Predicate::SelfIn(ids));
        }
        if !ids.is_empty() {
            return Err(StoreError::InvalidPredicate(format!(
                "object ids are only valid in SELF IN, not in '{}'",
                attribute
            )));
        }
        Ok(Predicate::In { attribute, values })
    }
}

impl FromStr for Predicate {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        if tokens.is_empty() {
            return Err(StoreError::InvalidPredicate("empty predicate".to_string()));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let predicate = parser.or_expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(StoreError::InvalidPredicate(format!(
                "trailing input starting at {:?}",
                parser.peek()
            )));
        }
        Ok(predicate)
    }
}
