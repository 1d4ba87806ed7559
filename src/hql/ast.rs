//! Syntax tree for object queries.
//!
//! The tree is purely syntactic: the parser has no notion of entity names,
//! so a dotted path is just a list of segments until the binder resolves it
//! against the metamodel.

use super::span::Spanned;

/// Boxed spanned expression, the child type of every compound expression.
pub type ExprNode = Box<Spanned<Expr>>;

// ============================================================================
// Statement
// ============================================================================

/// A complete `select` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    /// The select clause; absent means "select every from root".
    pub select: Option<Spanned<SelectClause>>,
    pub from: Spanned<FromClause>,
    pub where_clause: Option<Spanned<Expr>>,
    pub group_by: Vec<Spanned<Expr>>,
    pub having: Option<Spanned<Expr>>,
    pub order_by: Vec<Spanned<SortSpec>>,
    pub limit: Option<Spanned<Expr>>,
    pub offset: Option<Spanned<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectClause {
    pub distinct: bool,
    pub items: Vec<Spanned<SelectItem>>,
}

/// One select item with its optional result variable.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Spanned<Expr>,
    pub alias: Option<Spanned<String>>,
}

// ============================================================================
// From Clause
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub roots: Vec<Spanned<FromRoot>>,
}

/// `EntityName [as] alias {join}`
#[derive(Debug, Clone, PartialEq)]
pub struct FromRoot {
    /// Entity name as written (may be dotted).
    pub entity: Spanned<String>,
    pub alias: Option<Spanned<String>>,
    pub joins: Vec<Spanned<JoinDecl>>,
}

/// An explicit join declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinDecl {
    pub kind: JoinKind,
    pub fetch: bool,
    /// Join path; `elements(p)` and `indices(p)` are normalized to
    /// `p.elements` and `p.indices`.
    pub target: Spanned<Expr>,
    pub alias: Option<Spanned<String>>,
    /// `with`/`on` condition.
    pub condition: Option<Spanned<Expr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

// ============================================================================
// Order By
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub expr: Spanned<Expr>,
    pub direction: Option<SortDirection>,
    pub nulls: Option<NullPrecedence>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPrecedence {
    First,
    Last,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Dotted navigation, or a bare identifier when it has one segment.
    Path(Vec<Spanned<String>>),
    Literal(Literal),
    /// `:name`
    NamedParameter(String),
    /// `?1`; `None` for a bare legacy `?`.
    PositionalParameter(Option<String>),
    Binary {
        left: ExprNode,
        op: BinaryOp,
        right: ExprNode,
    },
    Unary {
        op: UnaryOp,
        expr: ExprNode,
    },
    /// Function call; names keep the case they were written in.
    Function {
        name: Spanned<String>,
        args: Vec<Spanned<Expr>>,
        distinct: bool,
    },
    /// `*` inside `count(*)`.
    Star,
    Case {
        operand: Option<ExprNode>,
        whens: Vec<(Spanned<Expr>, Spanned<Expr>)>,
        else_result: Option<ExprNode>,
    },
    IsNull {
        expr: ExprNode,
        negated: bool,
    },
    IsEmpty {
        expr: ExprNode,
        negated: bool,
    },
    Between {
        expr: ExprNode,
        low: ExprNode,
        high: ExprNode,
        negated: bool,
    },
    /// `x in (a, b)`; `x in :list` has a single parameter element.
    InList {
        expr: ExprNode,
        list: Vec<Spanned<Expr>>,
        negated: bool,
    },
    Like {
        expr: ExprNode,
        pattern: ExprNode,
        escape: Option<ExprNode>,
        negated: bool,
    },
    MemberOf {
        element: ExprNode,
        collection: ExprNode,
        negated: bool,
    },
    Paren(ExprNode),
    /// Placeholder produced by syntax error recovery.
    Error,
}

impl Expr {
    /// Path segments, if this is a path expression.
    pub fn as_path(&self) -> Option<&[Spanned<String>]> {
        match self {
            Expr::Path(segments) => Some(segments),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Decimal(f64),
    /// Unescaped string contents.
    String(String),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}
