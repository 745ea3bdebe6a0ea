//! Abstract Syntax Tree definitions

mod expr;
mod span;

pub use expr::*;
pub use span::*;

use serde::{Deserialize, Serialize};

/// A parsed script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub filename: String,
    pub statements: Vec<Spanned<Stmt>>,
    #[serde(skip)]
    pub lines: LineIndex,
}

/// Identity of a node that the interpreter caches by (function definitions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Hands out node ids; one generator is shared by every parse of an interpreter
#[derive(Debug, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Text outside of `<?php ... ?>`
    InlineHtml(String),
    Echo(Vec<Spanned<Expr>>),
    Expr(Spanned<Expr>),
    Block(Vec<Spanned<Stmt>>),
    /// `if` followed by any `elseif` branches, tried in order
    If {
        branches: Vec<CondBlock>,
        else_branch: Option<Box<Spanned<Stmt>>>,
    },
    While(CondBlock),
    DoWhile(CondBlock),
    For {
        init: Vec<Spanned<Expr>>,
        /// Every expression is evaluated; the last one decides
        cond: Vec<Spanned<Expr>>,
        step: Vec<Spanned<Expr>>,
        body: Box<Spanned<Stmt>>,
    },
    Foreach(ForeachLoop),
    Break(u32),
    Continue(u32),
    Return(Option<Spanned<Expr>>),
    FunctionDef(FunctionDef),
    Const(Vec<ConstItem>),
    Global(Vec<Spanned<String>>),
    Unset(Vec<Spanned<Expr>>),
    Empty,
}

/// Condition plus body, shared by `if`/`elseif`, `while` and `do`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CondBlock {
    pub cond: Spanned<Expr>,
    pub body: Box<Spanned<Stmt>>,
}

/// `foreach (subject as key => value) body`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeachLoop {
    pub subject: Spanned<Expr>,
    pub key: Option<Spanned<Expr>>,
    pub value: Spanned<Expr>,
    pub body: Box<Spanned<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstItem {
    pub name: Spanned<String>,
    pub value: Spanned<Expr>,
}

/// Function definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub id: NodeId,
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub ret_ty: Option<TypeHint>,
    pub body: Vec<Spanned<Stmt>>,
    pub span: Span,
}

impl FunctionDef {
    /// Number of leading parameters without a default value
    pub fn required_params(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| p.default.is_none() && !p.variadic)
            .count()
    }

    pub fn is_variadic(&self) -> bool {
        self.params.last().is_some_and(|p| p.variadic)
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Name including the `$` sigil
    pub name: Spanned<String>,
    pub ty: Option<TypeHint>,
    pub default: Option<Spanned<Expr>>,
    /// `...$rest`: collects the remaining arguments into an array
    pub variadic: bool,
}

/// Declared parameter/return type: lower-cased alternatives (`?int` is `int|null`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHint {
    pub types: Vec<String>,
}

impl TypeHint {
    pub fn new(types: Vec<String>) -> Self {
        TypeHint { types }
    }
}

impl std::fmt::Display for TypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let [single, null] = self.types.as_slice() {
            if null == "null" && single != "mixed" {
                return write!(f, "?{single}");
            }
        }
        write!(f, "{}", self.types.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_gen_is_monotonic() {
        let mut ids = NodeIdGen::new();
        assert_eq!(ids.fresh(), NodeId(0));
        assert_eq!(ids.fresh(), NodeId(1));
    }

    #[test]
    fn test_type_hint_display() {
        assert_eq!(TypeHint::new(vec!["int".into()]).to_string(), "int");
        assert_eq!(TypeHint::new(vec!["int".into(), "null".into()]).to_string(), "?int");
        assert_eq!(
            TypeHint::new(vec!["int".into(), "string".into(), "null".into()]).to_string(),
            "int|string|null"
        );
    }
}
