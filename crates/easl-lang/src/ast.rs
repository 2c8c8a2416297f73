//! EASL Abstract Syntax Tree (AST).
//!
//! Every node carries the span it was parsed from. Nodes are owned by the
//! `Module` that produced them and never shared between modules.

use crate::lexer::{NumberLiteral, Span};

/// Top-level AST node: one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub items: Vec<Item>,
    pub span: Span,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Const(ConstDef),
    Function(FunctionDef),
    Struct(StructDef),
}

impl Item {
    pub fn span(&self) -> Span {
        match self {
            Item::Const(c) => c.span,
            Item::Function(f) => f.span,
            Item::Struct(s) => s.span,
        }
    }

    pub fn name(&self) -> &Ident {
        match self {
            Item::Const(c) => &c.name,
            Item::Function(f) => &f.name,
            Item::Struct(s) => &s.name,
        }
    }
}

/// A name together with where it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// A type as written in source (`f32`, `vec4f`, `Varyings`). Resolved by the checker.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub name: String,
    pub span: Span,
}

/// `(def name: type value)`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDef {
    pub name: Ident,
    pub ty: TypeAnnotation,
    pub value: Expr,
    pub span: Span,
}

/// Pipeline stage attribute of an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Vertex => write!(f, "vertex"),
            Stage::Fragment => write!(f, "fragment"),
        }
    }
}

/// `(defn [stage] name [p: T ...] ret body)`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub stage: Option<Stage>,
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: TypeAnnotation,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeAnnotation,
    pub span: Span,
}

/// `(struct Name field: T ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: Ident,
    pub fields: Vec<Field>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Ident,
    pub ty: TypeAnnotation,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(NumberLiteral),
    Bool(bool),
    Str(String),
    Ident(String),
    /// `(if cond then else)`
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `(let [name value ...] body)`, bindings are sequential.
    Let {
        bindings: Vec<LetBinding>,
        body: Box<Expr>,
    },
    /// `(.field target)`, struct field or vector swizzle.
    Access {
        field: Ident,
        target: Box<Expr>,
    },
    /// `(head args...)`: operator, builtin, constructor or user function.
    Call {
        head: Ident,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetBinding {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}
