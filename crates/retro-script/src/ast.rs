//! Program AST
//!
//! The interpreter does not parse source text. Programs arrive already
//! parsed, typically deserialized from JSON or YAML:
//!
//! ```json
//! {
//!   "file": "farm.ra",
//!   "constants": [{"name": "x", "value": {"type": "literal", "value": 10}}],
//!   "flows": [{
//!     "name": "main",
//!     "body": [
//!       {"type": "let", "name": "y", "span": {"line": 3},
//!        "value": {"type": "binary", "op": "+",
//!                  "left": {"type": "identifier", "name": "x"},
//!                  "right": {"type": "literal", "value": 5}}},
//!       {"type": "return", "span": {"line": 4},
//!        "value": {"type": "identifier", "name": "y"}}
//!     ]
//!   }]
//! }
//! ```

use indexmap::IndexMap;
use retro_core::Value;
use serde::{Deserialize, Serialize};

fn default_file() -> String {
    "<script>".to_string()
}

/// Source position of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}

impl Span {
    pub fn line(line: u32) -> Self {
        Self {
            line,
            ..Self::default()
        }
    }
}

/// A parsed script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// File name used for breakpoint locations
    #[serde(default = "default_file")]
    pub file: String,

    #[serde(default)]
    pub constants: Vec<ConstDecl>,

    #[serde(default)]
    pub flows: Vec<FlowDecl>,

    /// Flow to run; defaults to `main`, then to the first flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_flow: Option<String>,
}

impl Program {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            constants: Vec::new(),
            flows: Vec::new(),
            main_flow: None,
        }
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: Expr) -> Self {
        self.constants.push(ConstDecl {
            name: name.into(),
            value,
            span: None,
        });
        self
    }

    pub fn with_flow(mut self, flow: FlowDecl) -> Self {
        self.flows.push(flow);
        self
    }

    pub fn flow(&self, name: &str) -> Option<&FlowDecl> {
        self.flows.iter().find(|f| f.name == name)
    }

    /// The flow `execute` runs: explicit `main_flow`, else `main`, else the
    /// first declared flow
    pub fn main(&self) -> Option<&FlowDecl> {
        match &self.main_flow {
            Some(name) => self.flow(name),
            None => self.flow("main").or_else(|| self.flows.first()),
        }
    }
}

/// Top-level constant, bound into the global scope before any flow runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDecl {
    pub name: String,
    pub value: Expr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// A named, callable sequence of statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDecl {
    pub name: String,

    /// Positional parameters bound as locals of the flow frame
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,

    #[serde(default)]
    pub body: Vec<Stmt>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl FlowDecl {
    pub fn new(name: impl Into<String>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            body,
            span: None,
        }
    }

    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// A statement with its optional source position
///
/// Only statements with a span are reported to the step hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(flatten)]
    pub kind: StmtKind,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self { span: None, kind }
    }

    /// Attach a source line
    pub fn at(mut self, line: u32) -> Self {
        self.span = Some(Span::line(line));
        self
    }

    pub fn let_(name: &str, value: Expr) -> Self {
        Self::new(StmtKind::Let {
            name: name.to_string(),
            value: Some(value),
        })
    }

    pub fn assign(name: &str, value: Expr) -> Self {
        Self::new(StmtKind::Assign {
            target: Expr::ident(name),
            value,
        })
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr { expr })
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Self::new(StmtKind::Return { value })
    }
}

/// One `elif` arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElifBranch {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StmtKind {
    /// Declare in the current scope; a missing initializer binds null
    Let {
        name: String,
        #[serde(default)]
        value: Option<Expr>,
    },
    /// Update the nearest existing binding, or define in the current scope
    Assign { target: Expr, value: Expr },
    If {
        condition: Expr,
        then: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        elif: Vec<ElifBranch>,
        #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
        otherwise: Option<Vec<Stmt>>,
    },
    While { condition: Expr, body: Vec<Stmt> },
    For {
        variable: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catch_var: Option<String>,
        #[serde(default)]
        catch: Vec<Stmt>,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
    },
    Break,
    Continue,
    Block { body: Vec<Stmt> },
    Expr { expr: Expr },
}

impl StmtKind {
    /// Action label passed to the step hook
    pub fn name(&self) -> &'static str {
        match self {
            StmtKind::Let { .. } => "let",
            StmtKind::Assign { .. } => "assign",
            StmtKind::If { .. } => "if",
            StmtKind::While { .. } => "while",
            StmtKind::For { .. } => "for",
            StmtKind::Try { .. } => "try",
            StmtKind::Return { .. } => "return",
            StmtKind::Break => "break",
            StmtKind::Continue => "continue",
            StmtKind::Block { .. } => "block",
            StmtKind::Expr { expr } => match expr {
                Expr::Call { .. } => "call",
                _ => "expr",
            },
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "and", alias = "&&")]
    And,
    #[serde(rename = "or", alias = "||")]
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "-")]
    Neg,
    #[serde(rename = "not", alias = "!")]
    Not,
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expr {
    /// Null, boolean, number or string constant
    Literal { value: Value },
    /// Duration text converted to milliseconds when evaluated (`"1.5s"`)
    Duration { value: String },
    Identifier { name: String },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Call {
        callee: String,
        #[serde(default)]
        args: Vec<Expr>,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        kwargs: IndexMap<String, Expr>,
    },
    Array {
        #[serde(default)]
        elements: Vec<Expr>,
    },
    /// Map field access (`m.x`)
    Member { object: Box<Expr>, property: String },
    /// List, string or map subscript (`xs[0]`)
    Index { object: Box<Expr>, index: Box<Expr> },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    pub fn null() -> Self {
        Expr::Literal { value: Value::Null }
    }

    pub fn int(value: i64) -> Self {
        Expr::literal(value)
    }

    pub fn string(value: &str) -> Self {
        Expr::literal(value)
    }

    pub fn duration(text: &str) -> Self {
        Expr::Duration {
            value: text.to_string(),
        }
    }

    pub fn ident(name: &str) -> Self {
        Expr::Identifier {
            name: name.to_string(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(callee: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: callee.to_string(),
            args,
            kwargs: IndexMap::new(),
        }
    }

    pub fn array(elements: Vec<Expr>) -> Self {
        Expr::Array { elements }
    }

    /// Node label used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Literal { .. } => "literal",
            Expr::Duration { .. } => "duration",
            Expr::Identifier { .. } => "identifier",
            Expr::Binary { .. } => "binary",
            Expr::Unary { .. } => "unary",
            Expr::Call { .. } => "call",
            Expr::Array { .. } => "array",
            Expr::Member { .. } => "member",
            Expr::Index { .. } => "index",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_statement_with_span() {
        let stmt: Stmt = serde_json::from_value(json!({
            "type": "let",
            "name": "y",
            "span": {"line": 3, "column": 5},
            "value": {"type": "binary", "op": "+",
                      "left": {"type": "identifier", "name": "x"},
                      "right": {"type": "literal", "value": 5}}
        }))
        .unwrap();

        assert_eq!(stmt.span, Some(Span { line: 3, column: 5, end_line: None, end_column: None }));
        assert_eq!(
            stmt.kind,
            StmtKind::Let {
                name: "y".into(),
                value: Some(Expr::binary(BinaryOp::Add, Expr::ident("x"), Expr::int(5))),
            }
        );
    }

    #[test]
    fn test_deserialize_unit_statements() {
        let stmts: Vec<Stmt> =
            serde_json::from_value(json!([{"type": "break"}, {"type": "continue", "span": {"line": 9}}]))
                .unwrap();
        assert_eq!(stmts[0].kind, StmtKind::Break);
        assert_eq!(stmts[1].span.map(|s| s.line), Some(9));
    }

    #[test]
    fn test_operator_aliases() {
        let op: BinaryOp = serde_json::from_value(json!("&&")).unwrap();
        assert_eq!(op, BinaryOp::And);
        let op: UnaryOp = serde_json::from_value(json!("!")).unwrap();
        assert_eq!(op, UnaryOp::Not);
    }

    #[test]
    fn test_main_flow_resolution() {
        let program = Program::new("t")
            .with_flow(FlowDecl::new("setup", vec![]))
            .with_flow(FlowDecl::new("main", vec![]));
        assert_eq!(program.main().map(|f| f.name.as_str()), Some("main"));

        let program = Program::new("t").with_flow(FlowDecl::new("only", vec![]));
        assert_eq!(program.main().map(|f| f.name.as_str()), Some("only"));

        let mut program = Program::new("t").with_flow(FlowDecl::new("main", vec![]));
        program.main_flow = Some("missing".into());
        assert!(program.main().is_none());
        assert!(Program::new("t").main().is_none());
    }

    #[test]
    fn test_if_with_elif_and_else() {
        let stmt: Stmt = serde_json::from_value(json!({
            "type": "if",
            "condition": {"type": "literal", "value": false},
            "then": [],
            "elif": [{"condition": {"type": "literal", "value": true}, "body": []}],
            "else": [{"type": "break"}]
        }))
        .unwrap();
        match stmt.kind {
            StmtKind::If { elif, otherwise, .. } => {
                assert_eq!(elif.len(), 1);
                assert_eq!(otherwise.map(|b| b.len()), Some(1));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }
}
