//! # easl-lang
//!
//! The EASL shading language front end and WGSL back end.
//! Source text is lexed, parsed into an AST, statically type checked and
//! lowered to WGSL. The formatter works on the same parsed structure.

pub mod ast;
pub mod builtins;
pub mod checker;
pub mod codegen;
pub mod compiler;
pub mod diagnostic;
pub mod formatter;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod scope;
pub mod typed;
pub mod types;

pub use checker::{check_module, TypeChecker};
pub use codegen::{sanitize_identifier, CodeGenError, Codegen};
pub use compiler::{compile, CompilationUnit, CompileResult, CompileStage, CompiledShader, Compiler};
pub use diagnostic::{Diagnostic, DiagnosticSeverity};
pub use formatter::{format_source, Formatter};
pub use lexer::{Lexer, Span, Token, TokenKind};
pub use parser::Parser;
pub use program::{ConstValue, ConstantInfo, EntryPoint, EntrySelection, ProgramInfo, SelectedEntries};
pub use types::{ScalarKind, Type};
