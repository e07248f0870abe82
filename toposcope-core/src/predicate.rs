//! Package predicates for `where` filtering.
//!
//! A predicate is either a typed closure supplied by the caller or an
//! expression over a fixed set of package attributes:
//!
//! ```text
//! private == false && "react" in dependencies
//! name =~ "^@acme/" || version >= "2.0.0"
//! !(name == "docs")
//! ```
//!
//! Attributes are `name` and `version` (strings), `private` (boolean) and
//! `dependencies` (list of dependency names). Operators are `==`, `!=`,
//! `=~` (regex match), `<`, `<=`, `>`, `>=` (semver comparison), `in`
//! (dependency membership), `!`, `&&` and `||`.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use semver::Version;

use crate::error::{Error, Result};
use crate::package::Package;

type PackageFn = Arc<dyn Fn(&Package) -> bool + Send + Sync>;

/// A boolean condition evaluated against each package.
#[derive(Clone)]
pub enum Predicate {
    Expression(Expression),
    Function(PackageFn),
}

impl Predicate {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns `Error::PredicateEvaluation` for syntax errors, unknown
    /// attributes, mistyped comparisons and invalid regex or version literals.
    pub fn parse(source: &str) -> Result<Self> {
        Expression::parse(source).map(Predicate::Expression)
    }

    /// Wraps a caller-supplied predicate function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Package) -> bool + Send + Sync + 'static,
    {
        Predicate::Function(Arc::new(f))
    }

    /// Evaluates the predicate against a package without modifying it.
    pub fn evaluate(&self, package: &Package) -> Result<bool> {
        match self {
            Predicate::Expression(expression) => expression.evaluate(package),
            Predicate::Function(f) => Ok(f(package)),
        }
    }

    /// The expression text, if this predicate was parsed from one.
    pub fn source(&self) -> Option<&str> {
        match self {
            Predicate::Expression(expression) => Some(&expression.source),
            Predicate::Function(_) => None,
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Expression(expression) => {
                f.debug_tuple("Expression").field(&expression.source).finish()
            }
            Predicate::Function(_) => f.write_str("Function(..)"),
        }
    }
}

impl FromStr for Predicate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A parsed, type-checked predicate expression.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attribute {
    Name,
    Version,
    Private,
    Dependencies,
}

impl Attribute {
    const ALL: [(&'static str, Attribute); 4] = [
        ("name", Attribute::Name),
        ("version", Attribute::Version),
        ("private", Attribute::Private),
        ("dependencies", Attribute::Dependencies),
    ];

    fn lookup(ident: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|(name, _)| *name == ident)
            .map(|(_, attribute)| *attribute)
    }

    fn ty(&self) -> Type {
        match self {
            Attribute::Name | Attribute::Version => Type::Str,
            Attribute::Private => Type::Bool,
            Attribute::Dependencies => Type::List,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Type {
    Str,
    Bool,
    List,
}

impl Type {
    fn as_str(&self) -> &'static str {
        match self {
            Type::Str => "string",
            Type::Bool => "boolean",
            Type::List => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Attribute(Attribute),
    Str(String),
    Bool(bool),
}

impl Operand {
    fn ty(&self) -> Type {
        match self {
            Operand::Attribute(attribute) => attribute.ty(),
            Operand::Str(_) => Type::Str,
            Operand::Bool(_) => Type::Bool,
        }
    }

    fn value<'a>(&'a self, package: &'a Package) -> Value<'a> {
        match self {
            Operand::Attribute(Attribute::Name) => Value::Str(&package.name),
            Operand::Attribute(Attribute::Version) => Value::Str(&package.version),
            Operand::Attribute(Attribute::Private) => Value::Bool(package.private),
            Operand::Attribute(Attribute::Dependencies) => {
                Value::List(package.dependencies.keys().map(String::as_str).collect())
            }
            Operand::Str(s) => Value::Str(s),
            Operand::Bool(b) => Value::Bool(*b),
        }
    }
}

enum Value<'a> {
    Str(&'a str),
    Bool(bool),
    List(Vec<&'a str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
}

#[derive(Debug, Clone)]
enum Node {
    Or(Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Operand(Operand),
    Compare(Operand, CompareOp, Operand),
    Match(Operand, Regex),
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(parser.error(format!("unexpected {} after expression", token)));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, package: &Package) -> Result<bool> {
        self.eval_node(&self.root, package)
    }

    fn eval_node(&self, node: &Node, package: &Package) -> Result<bool> {
        match node {
            Node::Or(lhs, rhs) => {
                Ok(self.eval_node(lhs, package)? || self.eval_node(rhs, package)?)
            }
            Node::And(lhs, rhs) => {
                Ok(self.eval_node(lhs, package)? && self.eval_node(rhs, package)?)
            }
            Node::Not(inner) => Ok(!self.eval_node(inner, package)?),
            Node::Operand(operand) => match operand.value(package) {
                Value::Bool(b) => Ok(b),
                _ => Err(self.error(format!(
                    "expected a boolean, found {}",
                    operand.ty().as_str()
                ))),
            },
            Node::Match(operand, regex) => match operand.value(package) {
                Value::Str(s) => Ok(regex.is_match(s)),
                _ => Err(self.error("`=~` requires a string on the left".to_string())),
            },
            Node::Compare(lhs, op, rhs) => {
                self.compare(lhs.value(package), *op, rhs.value(package), package)
            }
        }
    }

    fn compare(
        &self,
        lhs: Value<'_>,
        op: CompareOp,
        rhs: Value<'_>,
        package: &Package,
    ) -> Result<bool> {
        match (op, lhs, rhs) {
            (CompareOp::Eq, Value::Str(a), Value::Str(b)) => Ok(a == b),
            (CompareOp::Ne, Value::Str(a), Value::Str(b)) => Ok(a != b),
            (CompareOp::Eq, Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (CompareOp::Ne, Value::Bool(a), Value::Bool(b)) => Ok(a != b),
            (CompareOp::In, Value::Str(needle), Value::List(names)) => Ok(names.contains(&needle)),
            (
                CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge,
                Value::Str(a),
                Value::Str(b),
            ) => {
                let a = self.version(a, package)?;
                let b = self.version(b, package)?;
                Ok(match op {
                    CompareOp::Lt => a < b,
                    CompareOp::Le => a <= b,
                    CompareOp::Gt => a > b,
                    _ => a >= b,
                })
            }
            _ => Err(self.error(format!("unsupported comparison for package '{}'", package.name))),
        }
    }

    fn version(&self, raw: &str, package: &Package) -> Result<Version> {
        Version::parse(raw).map_err(|e| {
            self.error(format!(
                "'{}' is not a valid version (package '{}'): {}",
                raw, package.name, e
            ))
        })
    }

    fn error(&self, message: String) -> Error {
        Error::PredicateEvaluation {
            expression: self.source.clone(),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Not,
    And,
    Or,
    Match,
    Op(CompareOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(ident) => write!(f, "`{}`", ident),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::LParen => f.write_str("`(`"),
            Token::RParen => f.write_str("`)`"),
            Token::Not => f.write_str("`!`"),
            Token::And => f.write_str("`&&`"),
            Token::Or => f.write_str("`||`"),
            Token::Match => f.write_str("`=~`"),
            Token::Op(op) => write!(f, "`{}`", op.symbol()),
        }
    }
}

impl CompareOp {
    fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::In => "in",
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let error = |message: String| Error::PredicateEvaluation {
        expression: source.to_string(),
        message,
    };

    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '!' if eat_char(&mut chars, '=') => Token::Op(CompareOp::Ne),
            '!' => Token::Not,
            '=' if eat_char(&mut chars, '=') => Token::Op(CompareOp::Eq),
            '=' if eat_char(&mut chars, '~') => Token::Match,
            '<' if eat_char(&mut chars, '=') => Token::Op(CompareOp::Le),
            '<' => Token::Op(CompareOp::Lt),
            '>' if eat_char(&mut chars, '=') => Token::Op(CompareOp::Ge),
            '>' => Token::Op(CompareOp::Gt),
            '&' if eat_char(&mut chars, '&') => Token::And,
            '|' if eat_char(&mut chars, '|') => Token::Or,
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.peek().map(|&(_, n)| n) {
                            // Only the quote and the backslash itself are
                            // escapes, so regex classes like `\d` survive.
                            Some(n) if n == quote || n == '\\' => {
                                value.push(n);
                                chars.next();
                            }
                            _ => value.push('\\'),
                        },
                        ch if ch == quote => {
                            closed = true;
                            break;
                        }
                        ch => value.push(ch),
                    }
                }
                if !closed {
                    return Err(error(format!("unterminated string starting at offset {}", offset)));
                }
                Token::Str(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&(_, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        ident.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if ident == "in" {
                    Token::Op(CompareOp::In)
                } else {
                    Token::Ident(ident)
                }
            }
            other => {
                return Err(error(format!("unexpected character '{}' at offset {}", other, offset)))
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

fn eat_char(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    if chars.peek().map(|&(_, n)| n) == Some(expected) {
        chars.next();
        true
    } else {
        false
    }
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: String) -> Error {
        Error::PredicateEvaluation {
            expression: self.source.to_string(),
            message,
        }
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut node = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            node = Node::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut node = self.parse_unary()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_unary()?;
            node = Node::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if self.eat(&Token::Not) {
            let inner = self.parse_unary()?;
            return Ok(Node::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node> {
        if self.eat(&Token::LParen) {
            let node = self.parse_or()?;
            if !self.eat(&Token::RParen) {
                return Err(self.error("expected `)`".to_string()));
            }
            return Ok(node);
        }

        let lhs = self.parse_operand()?;
        match self.peek() {
            Some(Token::Match) => {
                self.pos += 1;
                self.parse_match(lhs)
            }
            Some(Token::Op(op)) => {
                let op = *op;
                self.pos += 1;
                let rhs = self.parse_operand()?;
                self.check_compare(&lhs, op, &rhs)?;
                Ok(Node::Compare(lhs, op, rhs))
            }
            _ => {
                if lhs.ty() != Type::Bool {
                    return Err(self.error(format!(
                        "expected a boolean condition, found {}",
                        lhs.ty().as_str()
                    )));
                }
                Ok(Node::Operand(lhs))
            }
        }
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Operand::Str(s)),
            Some(Token::Ident(ident)) => match ident.as_str() {
                "true" => Ok(Operand::Bool(true)),
                "false" => Ok(Operand::Bool(false)),
                _ => Attribute::lookup(&ident)
                    .map(Operand::Attribute)
                    .ok_or_else(|| {
                        let known: Vec<&str> = Attribute::ALL.iter().map(|(n, _)| *n).collect();
                        self.error(format!(
                            "unknown attribute `{}`; expected one of {}",
                            ident,
                            known.join(", ")
                        ))
                    }),
            },
            Some(token) => Err(self.error(format!(
                "expected an attribute or literal, found {}",
                token
            ))),
            None => Err(self.error("unexpected end of expression".to_string())),
        }
    }

    fn parse_match(&mut self, lhs: Operand) -> Result<Node> {
        if lhs.ty() != Type::Str {
            return Err(self.error(format!(
                "`=~` requires a string on the left, found {}",
                lhs.ty().as_str()
            )));
        }
        match self.advance() {
            Some(Token::Str(pattern)) => {
                let regex = Regex::new(&pattern)
                    .map_err(|e| self.error(format!("invalid regex '{}': {}", pattern, e)))?;
                Ok(Node::Match(lhs, regex))
            }
            _ => Err(self.error("`=~` requires a string literal pattern".to_string())),
        }
    }

    fn check_compare(&self, lhs: &Operand, op: CompareOp, rhs: &Operand) -> Result<()> {
        let (lt, rt) = (lhs.ty(), rhs.ty());
        let ok = match op {
            CompareOp::Eq | CompareOp::Ne => lt == rt && lt != Type::List,
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
                lt == Type::Str && rt == Type::Str
            }
            CompareOp::In => lt == Type::Str && rt == Type::List,
        };
        if !ok {
            return Err(self.error(format!(
                "cannot apply `{}` to {} and {}",
                op.symbol(),
                lt.as_str(),
                rt.as_str()
            )));
        }

        if matches!(op, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge) {
            for operand in [lhs, rhs] {
                if let Operand::Str(literal) = operand {
                    Version::parse(literal).map_err(|e| {
                        self.error(format!("'{}' is not a valid version: {}", literal, e))
                    })?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> Package {
        Package::new("@acme/web", "1.4.0", "/repo/packages/web")
            .with_dependency("react", "^18.0.0")
            .with_private(true)
    }

    #[test]
    fn tokenizes_operators() {
        let tokens = tokenize("!a != b == c =~ d <= e >= f < g > h && i || j in").unwrap();
        assert!(tokens.contains(&Token::Op(CompareOp::Ne)));
        assert!(tokens.contains(&Token::Match));
        assert!(tokens.contains(&Token::Op(CompareOp::In)));
        assert_eq!(tokens[0], Token::Not);
    }

    #[test]
    fn keeps_regex_backslashes() {
        let tokens = tokenize(r#""\d+\"""#).unwrap();
        assert_eq!(tokens, vec![Token::Str(r#"\d+""#.to_string())]);
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let predicate = Predicate::parse("private == false && name == \"x\" || private").unwrap();
        assert!(predicate.evaluate(&package()).unwrap());
    }

    #[test]
    fn debug_shows_source() {
        let predicate = Predicate::parse("private").unwrap();
        assert_eq!(format!("{:?}", predicate), "Expression(\"private\")");
        assert_eq!(format!("{:?}", Predicate::from_fn(|_| true)), "Function(..)");
    }
}
