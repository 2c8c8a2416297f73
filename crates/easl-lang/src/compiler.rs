//! Compiler facade: source text → WGSL, or the full set of diagnostics.

use std::collections::BTreeMap;
use std::time::Instant;

use easl_core::{ContentHash, EaslError};

use crate::ast::Module;
use crate::checker::TypeChecker;
use crate::codegen;
use crate::diagnostic::{has_errors, sort_diagnostics, Diagnostic};
use crate::lexer::{Comment, Lexer, Token};
use crate::parser::Parser;
use crate::program::{EntrySelection, ProgramInfo, SelectedEntries};
use crate::typed::TypedModule;

/// Pipeline stage that reported the first error of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStage {
    Lex,
    Parse,
    Check,
    CodeGen,
}

/// Every stage's state for one compile of one source text.
///
/// A unit is built fresh per compile and never updated afterwards; a reload
/// replaces the whole unit.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub source: String,
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
    pub module: Option<Module>,
    pub typed: Option<TypedModule>,
    pub output: Option<String>,
    /// EASL entry point name → WGSL function name.
    pub entry_names: BTreeMap<String, String>,
    pub diagnostics: Vec<Diagnostic>,
    pub failed_stage: Option<CompileStage>,
}

impl CompilationUnit {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            tokens: Vec::new(),
            comments: Vec::new(),
            module: None,
            typed: None,
            output: None,
            entry_names: BTreeMap::new(),
            diagnostics: Vec::new(),
            failed_stage: None,
        }
    }

    fn record(&mut self, stage: CompileStage, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
        if self.failed_stage.is_none() && self.has_errors() {
            self.failed_stage = Some(stage);
        }
    }

    /// The first error as an `EaslError`, tagged with the failing stage.
    pub fn error(&self) -> Option<EaslError> {
        let stage = self.failed_stage?;
        let first = self.diagnostics.iter().find(|d| d.is_error())?;
        let (message, line, column) = (first.message.clone(), first.span.line, first.span.column);
        Some(match stage {
            CompileStage::Lex => EaslError::lex(message, line, column),
            CompileStage::Parse => EaslError::parse(message, line, column),
            CompileStage::Check => EaslError::type_error(message, line, column),
            CompileStage::CodeGen => EaslError::CodeGen(message),
        })
    }

    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }

    /// Output is only present for a unit without error diagnostics.
    pub fn is_compiled(&self) -> bool {
        self.output.is_some() && !self.has_errors()
    }
}

/// A successfully compiled shader.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledShader {
    pub wgsl: String,
    pub info: ProgramInfo,
    /// Resolved entry pair, when the compiler was given an entry selection.
    pub entries: Option<SelectedEntries>,
    pub entry_names: BTreeMap<String, String>,
    /// Non-fatal diagnostics (warnings) produced along the way.
    pub warnings: Vec<Diagnostic>,
    pub source_hash: ContentHash,
}

impl CompiledShader {
    /// WGSL function name of an entry point declared as `name`.
    pub fn wgsl_entry<'a>(&'a self, name: &'a str) -> &'a str {
        self.entry_names.get(name).map(String::as_str).unwrap_or(name)
    }
}

pub type CompileResult = Result<CompiledShader, Vec<Diagnostic>>;

/// Runs lexer, parser, checker and code generator in order.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    selection: Option<EntrySelection>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one vertex/fragment pair as part of checking.
    pub fn with_entry_selection(mut self, selection: EntrySelection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Run every stage and keep all intermediate state.
    ///
    /// Stops early only on a lex failure or unbalanced delimiters. Otherwise
    /// every stage runs so that all diagnostics are collected; code is
    /// generated only when no stage reported an error.
    pub fn compile_unit(&self, source: &str) -> CompilationUnit {
        let mut unit = CompilationUnit::new(source);

        let started = Instant::now();
        let mut lexer = Lexer::new(source);
        match lexer.tokenize() {
            Ok(tokens) => unit.tokens = tokens,
            Err(err) => {
                unit.record(CompileStage::Lex, [Diagnostic::from(err)]);
                return unit;
            }
        }
        unit.comments = lexer.into_comments();
        tracing::debug!("lexed {} tokens in {:?}", unit.tokens.len(), started.elapsed());

        let started = Instant::now();
        let module = match Parser::new(unit.tokens.clone()).parse() {
            Ok((module, diagnostics)) => {
                unit.record(CompileStage::Parse, diagnostics);
                module
            }
            Err(diagnostics) => {
                unit.record(CompileStage::Parse, diagnostics);
                sort_diagnostics(&mut unit.diagnostics);
                return unit;
            }
        };
        tracing::debug!("parsed {} items in {:?}", module.items.len(), started.elapsed());

        let started = Instant::now();
        let mut checker = TypeChecker::new();
        if let Some(selection) = &self.selection {
            checker = checker.with_entry_selection(selection.clone());
        }
        let (typed, diagnostics) = checker.check(&module);
        unit.record(CompileStage::Check, diagnostics);
        tracing::debug!("checked in {:?}", started.elapsed());

        if !unit.has_errors() {
            let started = Instant::now();
            match codegen::generate_with_entry_names(&typed) {
                Ok((wgsl, entry_names)) => {
                    tracing::debug!("generated {} bytes of WGSL in {:?}", wgsl.len(), started.elapsed());
                    unit.output = Some(wgsl);
                    unit.entry_names = entry_names;
                }
                Err(err) => unit.record(CompileStage::CodeGen, [Diagnostic::from(err)]),
            }
        }

        sort_diagnostics(&mut unit.diagnostics);
        unit.module = Some(module);
        unit.typed = Some(typed);
        unit
    }

    /// Compile to WGSL, or return every diagnostic when any is an error.
    pub fn compile(&self, source: &str) -> CompileResult {
        let unit = self.compile_unit(source);
        let source_hash = ContentHash::of_text(&unit.source);
        match (unit.output, unit.typed) {
            (Some(wgsl), Some(typed)) if !has_errors(&unit.diagnostics) => Ok(CompiledShader {
                wgsl,
                info: typed.info,
                entries: typed.entry_points,
                entry_names: unit.entry_names,
                warnings: unit.diagnostics,
                source_hash,
            }),
            _ => Err(unit.diagnostics),
        }
    }

    /// All diagnostics for `source`, without keeping any output.
    pub fn check(&self, source: &str) -> Vec<Diagnostic> {
        self.compile_unit(source).diagnostics
    }
}

/// Compile with no entry selection.
pub fn compile(source: &str) -> CompileResult {
    Compiler::new().compile(source)
}
