//! Restricted watch-expression evaluator
//!
//! Watch and breakpoint-condition text is parsed into the interpreter's own
//! [`Expr`] tree and evaluated with [`retro_script::eval::evaluate`] against a
//! read-only variable snapshot. The grammar has literals, names, arithmetic,
//! comparison, logic, array literals, member access and subscripts. Calls are
//! rejected when parsing, and the snapshot environment refuses them as well,
//! so a watch can never reach a builtin or the host.

use crate::error::WatchError;
use retro_core::{Value, ValueMap};
use retro_script::eval::{self, Environment};
use retro_script::{BinaryOp, Expr, FaultKind, ScriptError, ScriptResult, UnaryOp};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Value),
    Str(String),
    Ident(String),
    Symbol(&'static str),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(v) => format!("number {}", v),
            Token::Str(s) => format!("string {:?}", s),
            Token::Ident(name) => format!("'{}'", name),
            Token::Symbol(sym) => format!("'{}'", sym),
        }
    }
}

const SYMBOLS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "!", "(", ")", "[", "]",
    ".", ",",
];

fn tokenize(source: &str) -> Result<Vec<Token>, WatchError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = if is_float {
                text.parse::<f64>().map(Value::Float).ok()
            } else {
                text.parse::<i64>().map(Value::Int).ok()
            };
            tokens.push(Token::Number(value.ok_or(WatchError::InvalidNumber(text))?));
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if c == '"' || c == '\'' {
            let mut text = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(WatchError::UnterminatedString),
                    Some(&q) if q == c => break,
                    Some('\\') => {
                        let escaped = chars.get(i + 1).ok_or(WatchError::UnterminatedString)?;
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => *other,
                        });
                        i += 2;
                    }
                    Some(&ch) => {
                        text.push(ch);
                        i += 1;
                    }
                }
            }
            i += 1;
            tokens.push(Token::Str(text));
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let symbol = SYMBOLS
                .iter()
                .find(|sym| rest.starts_with(**sym))
                .ok_or(WatchError::UnexpectedChar { ch: c, position: i })?;
            i += symbol.chars().count();
            tokens.push(Token::Symbol(symbol));
        }
    }
    Ok(tokens)
}

fn infix(token: &Token) -> Option<(BinaryOp, u8)> {
    let op = match token {
        Token::Ident(word) if word == "or" => BinaryOp::Or,
        Token::Ident(word) if word == "and" => BinaryOp::And,
        Token::Symbol(sym) => match *sym {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            _ => return None,
        },
        _ => return None,
    };
    let power = match op {
        BinaryOp::Or => 1,
        BinaryOp::And => 2,
        BinaryOp::Add | BinaryOp::Sub => 5,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
        _ => 4,
    };
    Some((op, power))
}

/// Deepest bracket or operator nesting a watch expression may use
pub const MAX_WATCH_DEPTH: usize = 64;

/// Longest watch expression, in tokens
pub const MAX_WATCH_TOKENS: usize = 1024;

const NOT_POWER: u8 = 3;
const PREFIX_POWER: u8 = 7;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, WatchError> {
        let token = self.tokens.get(self.pos).cloned().ok_or(WatchError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, symbol: &str) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(s)) if *s == symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, symbol: &str) -> Result<(), WatchError> {
        match self.next()? {
            Token::Symbol(s) if s == symbol => Ok(()),
            other => Err(WatchError::UnexpectedToken(other.describe())),
        }
    }

    fn expression(&mut self, min_power: u8) -> Result<Expr, WatchError> {
        if self.depth >= MAX_WATCH_DEPTH {
            return Err(WatchError::TooDeep(MAX_WATCH_DEPTH));
        }
        self.depth += 1;
        let result = self.operand_chain(min_power);
        self.depth -= 1;
        result
    }

    fn operand_chain(&mut self, min_power: u8) -> Result<Expr, WatchError> {
        let mut lhs = self.prefix()?;
        loop {
            if self.eat(".") {
                match self.next()? {
                    Token::Ident(property) => {
                        lhs = Expr::Member {
                            object: Box::new(lhs),
                            property,
                        }
                    }
                    other => return Err(WatchError::UnexpectedToken(other.describe())),
                }
                continue;
            }
            if self.eat("[") {
                let index = self.expression(0)?;
                self.expect("]")?;
                lhs = Expr::Index {
                    object: Box::new(lhs),
                    index: Box::new(index),
                };
                continue;
            }
            if matches!(self.peek(), Some(Token::Symbol("("))) {
                let name = match &lhs {
                    Expr::Identifier { name } => name.clone(),
                    other => other.kind().to_string(),
                };
                return Err(WatchError::CallNotAllowed(name));
            }

            let Some((op, power)) = self.peek().and_then(infix) else {
                break;
            };
            if power < min_power {
                break;
            }
            self.pos += 1;
            let rhs = self.expression(power + 1)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, WatchError> {
        match self.next()? {
            Token::Number(value) => Ok(Expr::Literal { value }),
            Token::Str(text) => Ok(Expr::literal(text)),
            Token::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::literal(true)),
                "false" => Ok(Expr::literal(false)),
                "null" => Ok(Expr::null()),
                "not" => Ok(Expr::unary(UnaryOp::Not, self.expression(NOT_POWER)?)),
                "and" | "or" => Err(WatchError::UnexpectedToken(format!("'{}'", word))),
                _ => Ok(Expr::Identifier { name: word }),
            },
            Token::Symbol("-") => Ok(Expr::unary(UnaryOp::Neg, self.expression(PREFIX_POWER)?)),
            Token::Symbol("!") => Ok(Expr::unary(UnaryOp::Not, self.expression(PREFIX_POWER)?)),
            Token::Symbol("(") => {
                let inner = self.expression(0)?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Symbol("[") => {
                let mut elements = Vec::new();
                if !self.eat("]") {
                    loop {
                        elements.push(self.expression(0)?);
                        if self.eat("]") {
                            break;
                        }
                        self.expect(",")?;
                    }
                }
                Ok(Expr::array(elements))
            }
            other => Err(WatchError::UnexpectedToken(other.describe())),
        }
    }
}

/// Parse watch text into an expression tree
pub fn parse_watch(source: &str) -> Result<Expr, WatchError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(WatchError::Empty);
    }
    if tokens.len() > MAX_WATCH_TOKENS {
        return Err(WatchError::TooLong(MAX_WATCH_TOKENS));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expression(0)?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(WatchError::UnexpectedToken(token.describe())),
    }
}

/// Read-only view of a variable snapshot
struct SnapshotEnv<'a> {
    variables: &'a HashMap<String, Value>,
}

impl Environment for SnapshotEnv<'_> {
    fn lookup(&self, name: &str) -> ScriptResult<Value> {
        self.variables.get(name).cloned().ok_or_else(|| {
            ScriptError::fault(FaultKind::UndefinedVariable, format!("Undefined variable: {}", name))
        })
    }

    fn call(&mut self, callee: &str, _args: Vec<Value>, _kwargs: ValueMap) -> ScriptResult<Value> {
        Err(ScriptError::fault(
            FaultKind::UnknownFunction,
            format!("Function calls are not allowed in watch expressions: {}", callee),
        ))
    }
}

/// Evaluate watch text against `variables`, returning the value or the
/// error message
pub fn evaluate_watch(source: &str, variables: &HashMap<String, Value>) -> Result<Value, String> {
    let expr = parse_watch(source).map_err(|e| e.to_string())?;
    eval::evaluate(&expr, &mut SnapshotEnv { variables }).map_err(|e| e.to_string())
}
