//! Typed AST produced by the checker and consumed by code generation.
//!
//! Every expression carries its resolved type. A node typed `Type::Error`
//! only exists when a diagnostic has been reported for it or one of its
//! children.

use crate::ast::Stage;
use crate::lexer::Span;
use crate::program::{ProgramInfo, SelectedEntries};
use crate::scope::SymbolKind;
use crate::types::{StructType, Type};

#[derive(Debug, Clone, PartialEq)]
pub struct TypedModule {
    pub structs: Vec<TypedStruct>,
    pub constants: Vec<TypedConst>,
    pub functions: Vec<TypedFunction>,
    pub info: ProgramInfo,
    /// Present when the checker was asked to resolve an entry point pair.
    pub entry_points: Option<SelectedEntries>,
}

impl TypedModule {
    /// True if any node anywhere in the module failed to type.
    pub fn has_error_sentinel(&self) -> bool {
        self.structs
            .iter()
            .any(|s| s.ty.fields.iter().any(|(_, t)| t.is_error()))
            || self
                .constants
                .iter()
                .any(|c| c.ty.is_error() || c.value.contains_error())
            || self.functions.iter().any(|f| {
                f.ret.is_error()
                    || f.params.iter().any(|(_, t)| t.is_error())
                    || f.body.contains_error()
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedStruct {
    pub ty: StructType,
    /// Used as a vertex output or fragment input, fields get IO attributes.
    pub io: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedConst {
    pub name: String,
    pub ty: Type,
    pub value: TypedExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedFunction {
    pub name: String,
    pub stage: Option<Stage>,
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    pub body: TypedExpr,
    /// Stage interface, resolved for well-formed entry points only.
    pub interface: Option<EntryInterface>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryInput {
    None,
    VertexIndex,
    Position,
    Varyings(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutput {
    /// Vertex stage clip-space position.
    Position,
    Varyings(String),
    /// Fragment stage color target 0.
    Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryInterface {
    pub input: EntryInput,
    pub output: EntryOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// WGSL name of a built-in function.
    Builtin(&'static str),
    /// Built-in type constructor or conversion.
    Construct(Type),
    Struct(String),
    Function(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedExprKind {
    /// Integer literal; emitted as the scalar kind of `ty`.
    Int(i64),
    /// Float literal text without suffix.
    Float(String),
    Bool(bool),
    Var {
        name: String,
        kind: SymbolKind,
    },
    If {
        cond: Box<TypedExpr>,
        then_branch: Box<TypedExpr>,
        else_branch: Box<TypedExpr>,
    },
    Let {
        bindings: Vec<(String, TypedExpr)>,
        body: Box<TypedExpr>,
    },
    Field {
        target: Box<TypedExpr>,
        field: String,
    },
    Swizzle {
        target: Box<TypedExpr>,
        components: String,
    },
    Call {
        callee: Callee,
        args: Vec<TypedExpr>,
    },
    Error,
}

impl TypedExpr {
    pub fn new(kind: TypedExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn error(span: Span) -> Self {
        Self::new(TypedExprKind::Error, Type::Error, span)
    }

    pub fn contains_error(&self) -> bool {
        if self.ty.is_error() {
            return true;
        }
        match &self.kind {
            TypedExprKind::Error => true,
            TypedExprKind::Int(_)
            | TypedExprKind::Float(_)
            | TypedExprKind::Bool(_)
            | TypedExprKind::Var { .. } => false,
            TypedExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => cond.contains_error() || then_branch.contains_error() || else_branch.contains_error(),
            TypedExprKind::Let { bindings, body } => {
                bindings.iter().any(|(_, v)| v.contains_error()) || body.contains_error()
            }
            TypedExprKind::Field { target, .. } | TypedExprKind::Swizzle { target, .. } => {
                target.contains_error()
            }
            TypedExprKind::Call { args, .. } => args.iter().any(TypedExpr::contains_error),
        }
    }
}
