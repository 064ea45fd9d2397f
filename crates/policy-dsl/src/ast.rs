//! Abstract syntax tree produced by the parser.

use serde_json::Value;

/// Comparison operators in `when` expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOpAst {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `in (…)`
    In,
    /// `contains`
    Contains,
    /// `matches`
    Matches,
}

/// A `when` expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Dotted-path context reference, e.g. `actor.kind`.
    Ident(String),
    /// String literal.
    Str(String),
    /// Numeric literal.
    Num(f64),
    /// Boolean literal.
    Bool(bool),
    /// Parenthesised list, only valid on the right of `in`.
    List(Vec<Expr>),
    /// Comparison.
    Compare {
        /// Operator.
        op: CmpOpAst,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Logical conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
}

/// One `then`-block action invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionDecl {
    /// Action name, e.g. `require_approval`.
    pub name: String,
    /// Named arguments in declaration order.
    pub args: Vec<(String, Value)>,
    /// Source line of the invocation.
    pub line: usize,
}

/// A parsed `rule` block.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleDecl {
    /// Quoted rule name.
    pub name: String,
    /// `priority = N`; defaults to 0.
    pub priority: i64,
    /// `description = "…"`; defaults to empty.
    pub description: String,
    /// `enabled = BOOL`; defaults to true.
    pub enabled: bool,
    /// The `when` expression.
    pub when: Expr,
    /// The `then` actions in declaration order.
    pub actions: Vec<ActionDecl>,
    /// Source line of the `rule` keyword.
    pub line: usize,
}

/// A parsed `defaults` block.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DefaultsDecl {
    /// `decision = "…"`.
    pub decision: Option<String>,
    /// `required_approvers = N`.
    pub required_approvers: Option<u32>,
}

/// A whole parsed policy file.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PolicyFileAst {
    /// Rules in declaration order.
    pub rules: Vec<RuleDecl>,
    /// File-level defaults, when declared.
    pub defaults: Option<DefaultsDecl>,
}
