//! Expression AST

use super::Spanned;
use serde::{Deserialize, Serialize};

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    // Literals
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Double-quoted string with embedded variables
    Interpolated(Vec<StrPart>),
    /// `[1, 'k' => 2]` or `array(...)`
    Array(Vec<ArrayItem>),

    /// `$name`, `$$name`, `${expr}`
    Variable(VarName),
    /// `$base[index]`; `index` is `None` for the append form `$base[]`
    Subscript {
        base: Box<Spanned<Expr>>,
        index: Option<Box<Spanned<Expr>>>,
    },
    /// Named constant access (`PHP_EOL`, `true`, user constants)
    Const(String),
    Magic(MagicConst),

    Call {
        callee: Callee,
        args: Vec<Spanned<Expr>>,
    },

    /// `$target = value`
    Assign {
        target: Box<Spanned<Expr>>,
        value: Box<Spanned<Expr>>,
    },
    /// `$target op= value`
    CompoundAssign {
        op: BinOp,
        target: Box<Spanned<Expr>>,
        value: Box<Spanned<Expr>>,
    },
    /// `$target ??= value`
    CoalesceAssign {
        target: Box<Spanned<Expr>>,
        value: Box<Spanned<Expr>>,
    },

    /// `cond ? then : else`; `then` is `None` for `cond ?: else`
    Ternary {
        cond: Box<Spanned<Expr>>,
        then_branch: Option<Box<Spanned<Expr>>>,
        else_branch: Box<Spanned<Expr>>,
    },
    Coalesce {
        left: Box<Spanned<Expr>>,
        right: Box<Spanned<Expr>>,
    },
    Binary {
        left: Box<Spanned<Expr>>,
        op: BinOp,
        right: Box<Spanned<Expr>>,
    },
    Unary {
        op: UnOp,
        expr: Box<Spanned<Expr>>,
    },
    Cast {
        ty: CastType,
        expr: Box<Spanned<Expr>>,
    },
    IncDec {
        op: IncDecOp,
        prefix: bool,
        target: Box<Spanned<Expr>>,
    },
    /// `@expr`
    Silence(Box<Spanned<Expr>>),
    Print(Box<Spanned<Expr>>),

    // Intrinsics
    Isset(Vec<Spanned<Expr>>),
    Empty(Box<Spanned<Expr>>),
    Exit(Option<Box<Spanned<Expr>>>),
    /// `eval(code)`
    Eval(Box<Spanned<Expr>>),
    /// `include`, `require` and their `_once` forms
    Include {
        kind: IncludeKind,
        path: Box<Spanned<Expr>>,
    },
}

impl Expr {
    /// Whether this expression designates storage that can be assigned to
    pub fn is_variable(&self) -> bool {
        matches!(self, Expr::Variable(_) | Expr::Subscript { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncludeKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
}

impl IncludeKind {
    /// A missing file is fatal rather than a warning
    pub fn is_require(self) -> bool {
        matches!(self, IncludeKind::Require | IncludeKind::RequireOnce)
    }

    pub fn is_once(self) -> bool {
        matches!(self, IncludeKind::IncludeOnce | IncludeKind::RequireOnce)
    }
}

impl std::fmt::Display for IncludeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IncludeKind::Include => "include",
            IncludeKind::IncludeOnce => "include_once",
            IncludeKind::Require => "require",
            IncludeKind::RequireOnce => "require_once",
        };
        write!(f, "{s}")
    }
}

/// Name part of a variable expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VarName {
    /// `$name` (stored without the sigil)
    Simple(String),
    /// `$$inner` or `${expr}`: the inner expression evaluates to the name
    Dynamic(Box<Spanned<Expr>>),
}

/// Segment of an interpolated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StrPart {
    Lit(String),
    Expr(Spanned<Expr>),
}

/// Array literal element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayItem {
    pub key: Option<Spanned<Expr>>,
    pub value: Spanned<Expr>,
}

/// Function designator of a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Name(String),
    /// `$fn(...)`: the expression evaluates to the function name
    Dynamic(Box<Spanned<Expr>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MagicConst {
    Line,
    File,
    Dir,
    Function,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,

    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,

    // Logical (short-circuit)
    And,
    Or,
    Xor,

    // Comparison
    Eq,
    Ne,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    Spaceship,
}

impl BinOp {
    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or | BinOp::Xor)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq
                | BinOp::Ne
                | BinOp::Identical
                | BinOp::NotIdentical
                | BinOp::Lt
                | BinOp::Le
                | BinOp::Gt
                | BinOp::Ge
                | BinOp::Spaceship
        )
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Concat => ".",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Xor => "xor",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Identical => "===",
            BinOp::NotIdentical => "!==",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Spaceship => "<=>",
        };
        write!(f, "{s}")
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Plus,
    Neg,
    BitNot,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    Inc,
    Dec,
}

/// Target type of a `(type)` cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastType {
    Int,
    Float,
    String,
    Bool,
    Array,
}
