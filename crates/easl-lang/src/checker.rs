//! Type checker: `Module` → `TypedModule` plus diagnostics.
//!
//! Runs in two passes. The first registers every struct, constant and
//! function signature so bodies may refer to functions declared later. The
//! second checks each initializer and body against its declared type.
//! Ill-typed nodes get `Type::Error` and never produce a second diagnostic
//! further up the tree.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::ast::*;
use crate::builtins;
use crate::diagnostic::{Diagnostic, DiagnosticSeverity};
use crate::lexer::{NumberLiteral, NumberSuffix, Span};
use crate::program::{ConstValue, ConstantInfo, EntryPoint, EntrySelection, ProgramInfo};
use crate::scope::{Scope, Symbol, SymbolKind};
use crate::typed::*;
use crate::types::{FunctionType, ScalarKind, StructType, Type};

/// Uniforms the runtime binds for every program, in binding order.
pub const UNIFORMS: &[(&str, Type)] = &[
    ("resolution", Type::Vector(ScalarKind::F32, 2)),
    ("time", Type::F32),
];

#[derive(Debug, Clone, Copy)]
enum Operator {
    Arith(BinaryOp),
    Compare(BinaryOp),
    Logic(BinaryOp),
    Not,
}

fn operator(name: &str) -> Option<Operator> {
    let op = match name {
        "+" => Operator::Arith(BinaryOp::Add),
        "-" => Operator::Arith(BinaryOp::Sub),
        "*" => Operator::Arith(BinaryOp::Mul),
        "/" => Operator::Arith(BinaryOp::Div),
        "%" => Operator::Arith(BinaryOp::Rem),
        "==" => Operator::Compare(BinaryOp::Eq),
        "!=" => Operator::Compare(BinaryOp::Ne),
        "<" => Operator::Compare(BinaryOp::Lt),
        ">" => Operator::Compare(BinaryOp::Gt),
        "<=" => Operator::Compare(BinaryOp::Le),
        ">=" => Operator::Compare(BinaryOp::Ge),
        "and" => Operator::Logic(BinaryOp::And),
        "or" => Operator::Logic(BinaryOp::Or),
        "not" => Operator::Not,
        _ => return None,
    };
    Some(op)
}

/// An unsuffixed integer literal takes its type from context.
fn is_flexible(expr: &Expr) -> bool {
    matches!(&expr.kind, ExprKind::Number(n) if n.suffix.is_none() && !n.is_float)
}

fn swizzle_indices(components: &str) -> Option<Vec<u8>> {
    if components.is_empty() || components.len() > 4 {
        return None;
    }
    let position = |set: &str| -> Option<Vec<u8>> {
        components
            .chars()
            .map(|c| set.find(c).map(|i| i as u8))
            .collect()
    };
    position("xyzw").or_else(|| position("rgba"))
}

/// Static type checker for one module.
pub struct TypeChecker {
    diagnostics: Vec<Diagnostic>,
    structs: HashMap<String, StructType>,
    selection: Option<EntrySelection>,
    entry_names: HashSet<String>,
    /// Caller → callees with the call-site span, for recursion detection.
    calls: BTreeMap<String, Vec<(String, Span)>>,
    current_function: Option<String>,
    /// Index of the constant whose initializer is being checked.
    current_const: Option<usize>,
    const_order: HashMap<String, usize>,
    io_structs: BTreeSet<String>,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            structs: HashMap::new(),
            selection: None,
            entry_names: HashSet::new(),
            calls: BTreeMap::new(),
            current_function: None,
            current_const: None,
            const_order: HashMap::new(),
            io_structs: BTreeSet::new(),
        }
    }

    /// Also resolve a single vertex/fragment pair, as the runner needs.
    pub fn with_entry_selection(mut self, selection: EntrySelection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Check a module. The typed module is always returned; it is only fit
    /// for code generation when no error diagnostic was produced.
    pub fn check(mut self, module: &Module) -> (TypedModule, Vec<Diagnostic>) {
        let struct_defs: Vec<&StructDef> = module
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Struct(s) => Some(s),
                _ => None,
            })
            .collect();
        self.collect_structs(&struct_defs);

        let mut globals = Scope::new();
        for (name, ty) in UNIFORMS {
            globals.insert(
                *name,
                Symbol {
                    kind: SymbolKind::Uniform,
                    ty: ty.clone(),
                    span: Span::default(),
                },
            );
        }

        // Pass 1: signatures.
        let mut const_types = Vec::new();
        let mut function_sigs = Vec::new();
        for item in &module.items {
            match item {
                Item::Struct(_) => {}
                Item::Const(c) => {
                    let ty = self.resolve_type(&c.ty);
                    let fresh = self.declare_global(&mut globals, &c.name, SymbolKind::Constant, ty.clone());
                    if fresh {
                        let index = self.const_order.len();
                        self.const_order.insert(c.name.name.clone(), index);
                    }
                    const_types.push((c, ty, fresh));
                }
                Item::Function(f) => {
                    let params: Vec<Type> = f.params.iter().map(|p| self.resolve_type(&p.ty)).collect();
                    let ret = self.resolve_type(&f.return_type);
                    let fn_ty = Type::Function(FunctionType {
                        params: params.clone(),
                        ret: Box::new(ret.clone()),
                    });
                    let fresh = self.declare_global(&mut globals, &f.name, SymbolKind::Function, fn_ty);
                    if fresh && f.stage.is_some() {
                        self.entry_names.insert(f.name.name.clone());
                    }
                    function_sigs.push((f, params, ret, fresh));
                }
            }
        }

        // Pass 2: initializers and bodies.
        let mut constants = Vec::new();
        for (c, ty, fresh) in const_types {
            if !fresh {
                continue;
            }
            self.current_const = self.const_order.get(&c.name.name).copied();
            let value = self.check_expr(&c.value, &globals, Some(&ty));
            self.current_const = None;
            self.expect_type(&value, &ty, &format!("constant '{}'", c.name.name));
            constants.push(TypedConst {
                name: c.name.name.clone(),
                ty,
                value,
                span: c.span,
            });
        }

        let mut functions = Vec::new();
        for (f, params, ret, fresh) in function_sigs {
            if !fresh {
                continue;
            }
            functions.push(self.check_function(f, params, ret, &globals));
        }

        self.check_recursion();
        self.warn_unused(&functions);

        let info = self.program_info(&constants, &functions);
        let entry_points = match self.selection.take() {
            Some(selection) => match info.select_entries(&selection) {
                Ok(selected) => Some(selected),
                Err(diags) => {
                    self.diagnostics.extend(diags);
                    None
                }
            },
            None => None,
        };

        let structs = struct_defs
            .iter()
            .filter_map(|def| {
                let ty = self.structs.get(&def.name.name)?.clone();
                Some(TypedStruct {
                    io: self.io_structs.contains(&ty.name),
                    ty,
                    span: def.span,
                })
            })
            .collect::<Vec<_>>();
        // Duplicate struct definitions resolve to one entry.
        let mut seen = HashSet::new();
        let structs = structs.into_iter().filter(|s| seen.insert(s.ty.name.clone())).collect();

        let typed = TypedModule {
            structs,
            constants,
            functions,
            info,
            entry_points,
        };
        (typed, self.diagnostics)
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic::error(message, span));
    }

    fn error_expr(&mut self, message: impl Into<String>, span: Span) -> TypedExpr {
        self.error(message, span);
        TypedExpr::error(span)
    }

    /// Report a mismatch unless either side is already an error.
    fn expect_type(&mut self, expr: &TypedExpr, expected: &Type, context: &str) -> bool {
        if expr.ty.is_error() || expected.is_error() || expr.ty == *expected {
            return true;
        }
        self.error(
            format!("{}: expected {}, found {}", context, expected, expr.ty),
            expr.span,
        );
        false
    }

    // ── Declarations ────────────────────────────────────────────────

    fn collect_structs(&mut self, defs: &[&StructDef]) {
        let mut by_name: HashMap<&str, &StructDef> = HashMap::new();
        for def in defs {
            let name = def.name.name.as_str();
            if Type::builtin(name).is_some() {
                self.error(format!("cannot redefine built-in type '{}'", name), def.name.span);
                continue;
            }
            if by_name.contains_key(name) {
                self.error(format!("duplicate struct definition '{}'", name), def.name.span);
                continue;
            }
            by_name.insert(name, def);
        }
        for def in defs {
            if by_name.get(def.name.name.as_str()).is_some_and(|d| std::ptr::eq(*d, *def)) {
                let mut visiting = Vec::new();
                self.resolve_struct(def, &by_name, &mut visiting);
            }
        }
    }

    fn resolve_struct(
        &mut self,
        def: &StructDef,
        by_name: &HashMap<&str, &StructDef>,
        visiting: &mut Vec<String>,
    ) -> Type {
        if let Some(existing) = self.structs.get(&def.name.name) {
            return Type::Struct(existing.clone());
        }
        if visiting.contains(&def.name.name) {
            self.error(
                format!("struct '{}' contains itself", def.name.name),
                def.name.span,
            );
            return Type::Error;
        }
        visiting.push(def.name.name.clone());

        let mut fields: Vec<(String, Type)> = Vec::new();
        for field in &def.fields {
            if fields.iter().any(|(n, _)| *n == field.name.name) {
                self.error(
                    format!("duplicate field '{}' in struct '{}'", field.name.name, def.name.name),
                    field.name.span,
                );
                continue;
            }
            let ty = match Type::builtin(&field.ty.name) {
                Some(ty) => ty,
                None => match by_name.get(field.ty.name.as_str()) {
                    Some(inner) => self.resolve_struct(inner, by_name, visiting),
                    None => {
                        self.error(format!("unknown type '{}'", field.ty.name), field.ty.span);
                        Type::Error
                    }
                },
            };
            fields.push((field.name.name.clone(), ty));
        }

        visiting.pop();
        let ty = StructType {
            name: def.name.name.clone(),
            fields,
        };
        self.structs.insert(ty.name.clone(), ty.clone());
        Type::Struct(ty)
    }

    fn resolve_type(&mut self, annotation: &TypeAnnotation) -> Type {
        if let Some(ty) = Type::builtin(&annotation.name) {
            return ty;
        }
        if let Some(s) = self.structs.get(&annotation.name) {
            return Type::Struct(s.clone());
        }
        self.error(format!("unknown type '{}'", annotation.name), annotation.span);
        Type::Error
    }

    /// Returns false when the name was already taken.
    fn declare_global(&mut self, globals: &mut Scope, name: &Ident, kind: SymbolKind, ty: Type) -> bool {
        if let Some(existing) = globals.lookup_local(&name.name) {
            let message = if existing.kind == SymbolKind::Uniform {
                format!("'{}' is a built-in uniform and cannot be redefined", name.name)
            } else {
                format!("duplicate definition of '{}'", name.name)
            };
            self.error(message, name.span);
            return false;
        }
        if self.structs.contains_key(&name.name) {
            self.error(
                format!("'{}' is already defined as a struct", name.name),
                name.span,
            );
            return false;
        }
        globals.insert(
            name.name.clone(),
            Symbol {
                kind,
                ty,
                span: name.span,
            },
        );
        true
    }

    fn check_function(&mut self, f: &FunctionDef, params: Vec<Type>, ret: Type, globals: &Scope) -> TypedFunction {
        let mut scope = globals.child();
        let mut typed_params = Vec::new();
        for (param, ty) in f.params.iter().zip(params) {
            if scope.lookup_local(&param.name.name).is_some() {
                self.error(format!("duplicate parameter '{}'", param.name.name), param.name.span);
            }
            scope.insert(
                param.name.name.clone(),
                Symbol {
                    kind: SymbolKind::Param,
                    ty: ty.clone(),
                    span: param.name.span,
                },
            );
            typed_params.push((param.name.name.clone(), ty));
        }

        self.current_function = Some(f.name.name.clone());
        self.calls.entry(f.name.name.clone()).or_default();
        let body = self.check_expr(&f.body, &scope, Some(&ret));
        self.current_function = None;
        self.expect_type(&body, &ret, &format!("body of '{}'", f.name.name));

        let param_types: Vec<Type> = typed_params.iter().map(|(_, t)| t.clone()).collect();
        let interface = f
            .stage
            .and_then(|stage| self.check_entry(stage, f, &param_types, &ret));

        TypedFunction {
            name: f.name.name.clone(),
            stage: f.stage,
            params: typed_params,
            ret,
            body,
            interface,
            span: f.span,
        }
    }

    // ── Entry points ────────────────────────────────────────────────

    fn check_entry(&mut self, stage: Stage, f: &FunctionDef, params: &[Type], ret: &Type) -> Option<EntryInterface> {
        let name = &f.name.name;
        let span = f.name.span;
        if params.iter().any(Type::is_error) || ret.is_error() {
            return None;
        }

        let input = match (stage, params) {
            (_, []) => Some(EntryInput::None),
            (Stage::Vertex, [Type::Scalar(ScalarKind::U32)]) => Some(EntryInput::VertexIndex),
            (Stage::Fragment, [Type::Vector(ScalarKind::F32, 4)]) => Some(EntryInput::Position),
            (Stage::Fragment, [Type::Struct(s)]) => {
                self.check_varyings(s, span).then(|| EntryInput::Varyings(s.name.clone()))
            }
            (Stage::Vertex, _) => {
                self.error(
                    format!("vertex entry '{}' takes no parameters or a single u32 vertex index", name),
                    span,
                );
                None
            }
            (Stage::Fragment, _) => {
                self.error(
                    format!(
                        "fragment entry '{}' takes no parameters, a vec4f position, or a varyings struct",
                        name
                    ),
                    span,
                );
                None
            }
        };

        let output = match (stage, ret) {
            (Stage::Vertex, Type::Vector(ScalarKind::F32, 4)) => Some(EntryOutput::Position),
            (Stage::Vertex, Type::Struct(s)) => {
                self.check_varyings(s, span).then(|| EntryOutput::Varyings(s.name.clone()))
            }
            (Stage::Fragment, Type::Vector(ScalarKind::F32, 4)) => Some(EntryOutput::Color),
            (Stage::Vertex, other) => {
                self.error(
                    format!(
                        "vertex entry '{}' must return vec4f or a struct with a 'position: vec4f' field, found {}",
                        name, other
                    ),
                    f.return_type.span,
                );
                None
            }
            (Stage::Fragment, other) => {
                self.error(
                    format!("fragment entry '{}' must return vec4f, found {}", name, other),
                    f.return_type.span,
                );
                None
            }
        };

        Some(EntryInterface {
            input: input?,
            output: output?,
        })
    }

    /// A struct crossing the vertex/fragment boundary.
    fn check_varyings(&mut self, s: &StructType, span: Span) -> bool {
        let mut ok = true;
        if s.field("position") != Some(&Type::Vector(ScalarKind::F32, 4)) {
            self.error(
                format!("stage interface struct '{}' needs a 'position: vec4f' field", s.name),
                span,
            );
            ok = false;
        }
        for (field, ty) in &s.fields {
            if field == "position" {
                continue;
            }
            let interpolatable = matches!(ty, Type::Scalar(_) | Type::Vector(_, _)) && ty.is_numeric();
            if !interpolatable && !ty.is_error() {
                self.error(
                    format!(
                        "field '{}' of stage interface struct '{}' has type {}; only numeric scalars and vectors can cross stages",
                        field, s.name, ty
                    ),
                    span,
                );
                ok = false;
            }
        }
        if ok {
            self.io_structs.insert(s.name.clone());
        }
        ok
    }

    // ── Expressions ─────────────────────────────────────────────────

    fn check_expr(&mut self, expr: &Expr, scope: &Scope, expected: Option<&Type>) -> TypedExpr {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Number(n) => self.check_number(n, span, expected),
            ExprKind::Bool(b) => TypedExpr::new(TypedExprKind::Bool(*b), Type::BOOL, span),
            ExprKind::Str(_) => self.error_expr("string literals are not supported in shader code", span),
            ExprKind::Ident(name) => self.check_ident(name, span, scope),
            ExprKind::If { .. } | ExprKind::Let { .. } if self.current_const.is_some() => {
                let form = if matches!(expr.kind, ExprKind::If { .. }) { "if" } else { "let" };
                self.error_expr(format!("'{}' is not allowed in a constant initializer", form), span)
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.check_if(cond, then_branch, else_branch, span, scope, expected),
            ExprKind::Let { bindings, body } => {
                let mut inner = scope.child();
                let mut typed_bindings = Vec::new();
                for binding in bindings {
                    let value = self.check_expr(&binding.value, &inner, None);
                    inner.insert(
                        binding.name.name.clone(),
                        Symbol {
                            kind: SymbolKind::Local,
                            ty: value.ty.clone(),
                            span: binding.name.span,
                        },
                    );
                    typed_bindings.push((binding.name.name.clone(), value));
                }
                let body = self.check_expr(body, &inner, expected);
                let ty = body.ty.clone();
                TypedExpr::new(
                    TypedExprKind::Let {
                        bindings: typed_bindings,
                        body: Box::new(body),
                    },
                    ty,
                    span,
                )
            }
            ExprKind::Access { field, target } => self.check_access(field, target, span, scope),
            ExprKind::Call { head, args } => self.check_call(head, args, span, scope, expected),
        }
    }

    fn check_number(&mut self, n: &NumberLiteral, span: Span, expected: Option<&Type>) -> TypedExpr {
        let kind = match (n.suffix, n.is_float) {
            (Some(NumberSuffix::F32), _) | (None, true) => ScalarKind::F32,
            (Some(NumberSuffix::I32 | NumberSuffix::U32), true) => {
                return self.error_expr(format!("float literal '{}' cannot have an integer suffix", n), span);
            }
            (Some(NumberSuffix::I32), false) => ScalarKind::I32,
            (Some(NumberSuffix::U32), false) => ScalarKind::U32,
            (None, false) => expected
                .and_then(Type::scalar_kind)
                .filter(|k| k.is_numeric())
                .unwrap_or(ScalarKind::I32),
        };

        if n.is_float {
            return match n.text.parse::<f64>() {
                Ok(v) if v.is_finite() && v.abs() <= f32::MAX as f64 => {
                    TypedExpr::new(TypedExprKind::Float(n.text.clone()), Type::F32, span)
                }
                _ => self.error_expr(format!("float literal '{}' is out of range for f32", n), span),
            };
        }

        let Ok(value) = n.text.parse::<i64>() else {
            return self.error_expr(format!("integer literal '{}' is out of range", n), span);
        };
        let in_range = match kind {
            ScalarKind::I32 => i32::try_from(value).is_ok(),
            ScalarKind::U32 => u32::try_from(value).is_ok(),
            _ => true,
        };
        if !in_range {
            return self.error_expr(format!("literal {} does not fit in {}", n, kind), span);
        }
        TypedExpr::new(TypedExprKind::Int(value), Type::Scalar(kind), span)
    }

    fn check_ident(&mut self, name: &str, span: Span, scope: &Scope) -> TypedExpr {
        let Some(symbol) = scope.lookup(name) else {
            return self.error_expr(format!("unknown identifier '{}'", name), span);
        };
        let (kind, ty) = (symbol.kind, symbol.ty.clone());
        match kind {
            SymbolKind::Function => {
                return self.error_expr(format!("function '{}' cannot be used as a value", name), span);
            }
            SymbolKind::Uniform if self.current_const.is_some() => {
                return self.error_expr(
                    format!("runtime uniform '{}' cannot be used in a constant", name),
                    span,
                );
            }
            SymbolKind::Constant => {
                if let (Some(current), Some(&index)) = (self.current_const, self.const_order.get(name)) {
                    if index >= current {
                        return self.error_expr(
                            format!("constant '{}' is used before its definition", name),
                            span,
                        );
                    }
                }
            }
            _ => {}
        }
        TypedExpr::new(
            TypedExprKind::Var {
                name: name.to_string(),
                kind,
            },
            ty,
            span,
        )
    }

    fn check_if(
        &mut self,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: &Expr,
        span: Span,
        scope: &Scope,
        expected: Option<&Type>,
    ) -> TypedExpr {
        let cond = self.check_expr(cond, scope, Some(&Type::BOOL));
        if !cond.ty.is_error() && cond.ty != Type::BOOL {
            self.error(format!("'if' condition must be bool, found {}", cond.ty), cond.span);
        }

        let hint_from = |e: &TypedExpr| (!e.ty.is_error()).then(|| e.ty.clone());
        let (then_typed, else_typed) =
            if expected.is_none() && is_flexible(then_branch) && !is_flexible(else_branch) {
                let else_typed = self.check_expr(else_branch, scope, None);
                let hint = hint_from(&else_typed);
                (self.check_expr(then_branch, scope, hint.as_ref()), else_typed)
            } else {
                let then_typed = self.check_expr(then_branch, scope, expected);
                let hint = expected.cloned().or_else(|| hint_from(&then_typed));
                (then_typed, self.check_expr(else_branch, scope, hint.as_ref()))
            };

        let ty = if then_typed.ty.is_error() || else_typed.ty.is_error() {
            Type::Error
        } else if then_typed.ty != else_typed.ty {
            self.error(
                format!(
                    "'if' branches have different types: {} and {}",
                    then_typed.ty, else_typed.ty
                ),
                span,
            );
            Type::Error
        } else {
            then_typed.ty.clone()
        };

        TypedExpr::new(
            TypedExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_typed),
                else_branch: Box::new(else_typed),
            },
            ty,
            span,
        )
    }

    fn check_access(&mut self, field: &Ident, target: &Expr, span: Span, scope: &Scope) -> TypedExpr {
        let target = self.check_expr(target, scope, None);
        let name = &field.name;

        if let Type::Vector(kind, width) = target.ty {
            let ty = match swizzle_indices(name) {
                Some(indices) if indices.iter().all(|&i| i < width) => {
                    if indices.len() == 1 {
                        Type::Scalar(kind)
                    } else {
                        Type::Vector(kind, indices.len() as u8)
                    }
                }
                Some(_) => {
                    self.error(format!("swizzle '.{}' is out of range for {}", name, target.ty), field.span);
                    Type::Error
                }
                None => {
                    self.error(format!("invalid swizzle '.{}'", name), field.span);
                    Type::Error
                }
            };
            return TypedExpr::new(
                TypedExprKind::Swizzle {
                    target: Box::new(target),
                    components: name.clone(),
                },
                ty,
                span,
            );
        }

        let ty = match &target.ty {
            Type::Error => Type::Error,
            Type::Struct(s) => match s.field(name) {
                Some(ty) => ty.clone(),
                None => {
                    self.error(format!("struct '{}' has no field '{}'", s.name, name), field.span);
                    Type::Error
                }
            },
            other => {
                self.error(format!("cannot access '.{}' on a value of type {}", name, other), field.span);
                Type::Error
            }
        };
        TypedExpr::new(
            TypedExprKind::Field {
                target: Box::new(target),
                field: name.clone(),
            },
            ty,
            span,
        )
    }

    /// Check operands that must agree on a numeric kind. Unsuffixed integer
    /// literals are typed last, taking the kind of the other operands, then
    /// of the expected type, defaulting to i32.
    fn check_operands(&mut self, args: &[Expr], scope: &Scope, expected: Option<&Type>) -> Vec<TypedExpr> {
        let hint = expected
            .and_then(Type::scalar_kind)
            .filter(|k| k.is_numeric())
            .map(Type::Scalar);
        let mut typed: Vec<Option<TypedExpr>> = args.iter().map(|_| None).collect();
        for (slot, arg) in typed.iter_mut().zip(args) {
            if !is_flexible(arg) {
                *slot = Some(self.check_expr(arg, scope, hint.as_ref()));
            }
        }
        let anchor = typed
            .iter()
            .flatten()
            .find_map(|t| t.ty.scalar_kind().filter(|k| k.is_numeric()))
            .map(Type::Scalar)
            .or(hint);
        for (slot, arg) in typed.iter_mut().zip(args) {
            if slot.is_none() {
                *slot = Some(self.check_expr(arg, scope, anchor.as_ref()));
            }
        }
        typed.into_iter().flatten().collect()
    }

    fn check_call(
        &mut self,
        head: &Ident,
        args: &[Expr],
        span: Span,
        scope: &Scope,
        expected: Option<&Type>,
    ) -> TypedExpr {
        let name = head.name.as_str();

        if let Some(symbol) = scope.lookup(name) {
            let (kind, ty) = (symbol.kind, symbol.ty.clone());
            return match (kind, ty) {
                (SymbolKind::Function, Type::Function(fn_ty)) => self.check_user_call(head, fn_ty, args, span, scope),
                _ => {
                    for arg in args {
                        self.check_expr(arg, scope, None);
                    }
                    self.error_expr(format!("'{}' is not a function", name), head.span)
                }
            };
        }

        if let Some(s) = self.structs.get(name).cloned() {
            return self.check_struct_ctor(s, args, span, scope);
        }
        if let Some(ty) = Type::builtin(name) {
            return self.check_constructor(ty, args, span, scope);
        }
        if let Some(op) = operator(name) {
            return self.check_operator(op, head, args, span, scope, expected);
        }
        if let Some(builtin) = builtins::lookup(name) {
            let typed = self.check_operands(args, scope, expected);
            let arg_types: Vec<Type> = typed.iter().map(|t| t.ty.clone()).collect();
            let ty = if arg_types.iter().any(Type::is_error) {
                Type::Error
            } else {
                match builtin.result_type(&arg_types) {
                    Ok(ty) => ty,
                    Err(message) => {
                        self.error(message, head.span);
                        Type::Error
                    }
                }
            };
            return TypedExpr::new(
                TypedExprKind::Call {
                    callee: Callee::Builtin(builtin.wgsl),
                    args: typed,
                },
                ty,
                span,
            );
        }

        for arg in args {
            self.check_expr(arg, scope, None);
        }
        self.error_expr(format!("unknown function '{}'", name), head.span)
    }

    fn check_user_call(
        &mut self,
        head: &Ident,
        fn_ty: FunctionType,
        args: &[Expr],
        span: Span,
        scope: &Scope,
    ) -> TypedExpr {
        let name = &head.name;
        if self.current_const.is_some() {
            return self.error_expr(format!("constant initializers cannot call function '{}'", name), head.span);
        }
        if self.entry_names.contains(name) {
            return self.error_expr(format!("entry point '{}' cannot be called", name), head.span);
        }
        if let Some(caller) = &self.current_function {
            self.calls
                .entry(caller.clone())
                .or_default()
                .push((name.clone(), head.span));
        }
        if args.len() != fn_ty.params.len() {
            for arg in args {
                self.check_expr(arg, scope, None);
            }
            return self.error_expr(
                format!(
                    "function '{}' expects {} argument(s), got {}",
                    name,
                    fn_ty.params.len(),
                    args.len()
                ),
                span,
            );
        }

        let mut typed = Vec::new();
        for (index, (arg, param)) in args.iter().zip(&fn_ty.params).enumerate() {
            let value = self.check_expr(arg, scope, Some(param));
            self.expect_type(&value, param, &format!("argument {} of '{}'", index + 1, name));
            typed.push(value);
        }
        TypedExpr::new(
            TypedExprKind::Call {
                callee: Callee::Function(name.clone()),
                args: typed,
            },
            *fn_ty.ret,
            span,
        )
    }

    fn check_struct_ctor(&mut self, s: StructType, args: &[Expr], span: Span, scope: &Scope) -> TypedExpr {
        if !args.is_empty() && args.len() != s.fields.len() {
            for arg in args {
                self.check_expr(arg, scope, None);
            }
            return self.error_expr(
                format!(
                    "struct '{}' has {} field(s), got {} value(s)",
                    s.name,
                    s.fields.len(),
                    args.len()
                ),
                span,
            );
        }
        let mut typed = Vec::new();
        for (arg, (field, ty)) in args.iter().zip(&s.fields) {
            let value = self.check_expr(arg, scope, Some(ty));
            self.expect_type(&value, ty, &format!("field '{}' of '{}'", field, s.name));
            typed.push(value);
        }
        TypedExpr::new(
            TypedExprKind::Call {
                callee: Callee::Struct(s.name.clone()),
                args: typed,
            },
            Type::Struct(s),
            span,
        )
    }

    fn check_constructor(&mut self, target: Type, args: &[Expr], span: Span, scope: &Scope) -> TypedExpr {
        let element = target.scalar_kind().map(Type::Scalar);
        let typed = self.check_operands(args, scope, element.as_ref());
        let types: Vec<&Type> = typed.iter().map(|t| &t.ty).collect();

        let problem = if types.iter().any(|t| t.is_error()) || types.is_empty() {
            None
        } else {
            match &target {
                Type::Scalar(_) => match types.as_slice() {
                    [Type::Scalar(_)] => None,
                    [other] => Some(format!("cannot convert {} to {}", other, target)),
                    _ => Some(format!("{} conversion takes a single value", target)),
                },
                Type::Vector(kind, width) => match types.as_slice() {
                    [Type::Scalar(k)] if k == kind => None,
                    [Type::Vector(_, n)] if n == width => None,
                    _ => {
                        let mut count = 0u8;
                        let mut bad = None;
                        for ty in &types {
                            match ty {
                                Type::Scalar(k) | Type::Vector(k, _) if k == kind => {
                                    count += ty.component_count().unwrap_or(0);
                                }
                                other => {
                                    bad.get_or_insert_with(|| {
                                        format!("{} constructor components must be {}, found {}", target, kind, other)
                                    });
                                }
                            }
                        }
                        bad.or_else(|| {
                            (count != *width).then(|| {
                                format!("{} constructor needs {} components, got {}", target, width, count)
                            })
                        })
                    }
                },
                Type::Matrix { cols, rows } => {
                    let columns = types.len() == *cols as usize
                        && types.iter().all(|t| **t == Type::Vector(ScalarKind::F32, *rows));
                    let scalars = types.len() == (*cols as usize) * (*rows as usize)
                        && types.iter().all(|t| **t == Type::F32);
                    let same = types.len() == 1 && *types[0] == target;
                    (!(columns || scalars || same)).then(|| {
                        format!(
                            "{} constructor expects {} vec{}f columns or {} f32 values",
                            target,
                            cols,
                            rows,
                            cols * rows
                        )
                    })
                }
                _ => Some(format!("cannot construct {}", target)),
            }
        };

        let ty = match problem {
            Some(message) => {
                self.error(message, span);
                Type::Error
            }
            None => target.clone(),
        };
        TypedExpr::new(
            TypedExprKind::Call {
                callee: Callee::Construct(target),
                args: typed,
            },
            ty,
            span,
        )
    }

    fn check_operator(
        &mut self,
        op: Operator,
        head: &Ident,
        args: &[Expr],
        span: Span,
        scope: &Scope,
        expected: Option<&Type>,
    ) -> TypedExpr {
        let symbol = head.name.as_str();
        match op {
            Operator::Arith(op) => {
                if args.is_empty() || (args.len() == 1 && op != BinaryOp::Sub) {
                    for arg in args {
                        self.check_expr(arg, scope, None);
                    }
                    return self.error_expr(format!("'{}' expects at least 2 operands", symbol), head.span);
                }
                let typed = self.check_operands(args, scope, expected);
                if typed.len() == 1 {
                    return self.check_negate(typed, span);
                }
                self.fold_binary(op, typed, span, |checker, op, a, b| checker.arith_type(op, a, b, span))
            }
            Operator::Compare(op) => {
                if args.len() != 2 {
                    for arg in args {
                        self.check_expr(arg, scope, None);
                    }
                    return self.error_expr(format!("'{}' expects exactly 2 operands", symbol), head.span);
                }
                let typed = self.check_operands(args, scope, None);
                self.fold_binary(op, typed, span, |checker, op, a, b| checker.compare_type(op, a, b, span))
            }
            Operator::Logic(op) => {
                if args.len() < 2 {
                    for arg in args {
                        self.check_expr(arg, scope, None);
                    }
                    return self.error_expr(format!("'{}' expects at least 2 operands", symbol), head.span);
                }
                let typed: Vec<TypedExpr> = args
                    .iter()
                    .map(|arg| self.check_expr(arg, scope, Some(&Type::BOOL)))
                    .collect();
                self.fold_binary(op, typed, span, |checker, op, a, b| {
                    if a.is_error() || b.is_error() {
                        return Type::Error;
                    }
                    if *a == Type::BOOL && *b == Type::BOOL {
                        Type::BOOL
                    } else {
                        checker.error(
                            format!("'{}' expects bool operands, found {} and {}", op.symbol(), a, b),
                            span,
                        );
                        Type::Error
                    }
                })
            }
            Operator::Not => {
                if args.len() != 1 {
                    for arg in args {
                        self.check_expr(arg, scope, None);
                    }
                    return self.error_expr("'not' expects exactly 1 operand", head.span);
                }
                let operand = self.check_expr(&args[0], scope, Some(&Type::BOOL));
                let ty = match &operand.ty {
                    Type::Error => Type::Error,
                    t @ (Type::Scalar(ScalarKind::Bool) | Type::Vector(ScalarKind::Bool, _)) => t.clone(),
                    other => {
                        self.error(format!("'not' expects a bool, found {}", other), operand.span);
                        Type::Error
                    }
                };
                TypedExpr::new(
                    TypedExprKind::Call {
                        callee: Callee::Unary(UnaryOp::Not),
                        args: vec![operand],
                    },
                    ty,
                    span,
                )
            }
        }
    }

    fn check_negate(&mut self, mut typed: Vec<TypedExpr>, span: Span) -> TypedExpr {
        let operand = typed.remove(0);
        let ty = match &operand.ty {
            Type::Error => Type::Error,
            t if t.is_numeric() && t.scalar_kind() != Some(ScalarKind::U32) => t.clone(),
            other => {
                self.error(format!("cannot negate a value of type {}", other), operand.span);
                Type::Error
            }
        };
        TypedExpr::new(
            TypedExprKind::Call {
                callee: Callee::Unary(UnaryOp::Neg),
                args: vec![operand],
            },
            ty,
            span,
        )
    }

    /// Left-fold operands into nested binary calls.
    fn fold_binary(
        &mut self,
        op: BinaryOp,
        typed: Vec<TypedExpr>,
        span: Span,
        result: impl Fn(&mut Self, BinaryOp, &Type, &Type) -> Type,
    ) -> TypedExpr {
        let mut operands = typed.into_iter();
        let Some(mut acc) = operands.next() else {
            return TypedExpr::error(span);
        };
        for rhs in operands {
            let ty = result(self, op, &acc.ty, &rhs.ty);
            acc = TypedExpr::new(
                TypedExprKind::Call {
                    callee: Callee::Binary(op),
                    args: vec![acc, rhs],
                },
                ty,
                span,
            );
        }
        acc
    }

    fn arith_type(&mut self, op: BinaryOp, a: &Type, b: &Type, span: Span) -> Type {
        if a.is_error() || b.is_error() {
            return Type::Error;
        }
        let symbol = op.symbol();
        let result = match (a, b) {
            (Type::Scalar(x), Type::Scalar(y)) if x == y && x.is_numeric() => Some(a.clone()),
            (Type::Vector(x, n), Type::Vector(y, m)) if x == y && x.is_numeric() => {
                if n != m {
                    self.error(
                        format!("'{}' operands have mismatched vector widths: {} and {}", symbol, a, b),
                        span,
                    );
                    return Type::Error;
                }
                Some(a.clone())
            }
            (Type::Vector(x, n), Type::Scalar(y)) | (Type::Scalar(y), Type::Vector(x, n))
                if x == y && x.is_numeric() =>
            {
                Some(Type::Vector(*x, *n))
            }
            (Type::Matrix { cols: c1, rows: r1 }, Type::Matrix { cols: c2, rows: r2 }) => match op {
                BinaryOp::Add | BinaryOp::Sub if c1 == c2 && r1 == r2 => Some(a.clone()),
                BinaryOp::Mul if c1 == r2 => Some(Type::Matrix { cols: *c2, rows: *r1 }),
                _ => None,
            },
            (Type::Matrix { cols, rows }, Type::Vector(ScalarKind::F32, n)) if op == BinaryOp::Mul && n == cols => {
                Some(Type::Vector(ScalarKind::F32, *rows))
            }
            (Type::Vector(ScalarKind::F32, n), Type::Matrix { cols, rows }) if op == BinaryOp::Mul && n == rows => {
                Some(Type::Vector(ScalarKind::F32, *cols))
            }
            (Type::Matrix { .. }, Type::Scalar(ScalarKind::F32)) if op == BinaryOp::Mul => Some(a.clone()),
            (Type::Scalar(ScalarKind::F32), Type::Matrix { .. }) if op == BinaryOp::Mul => Some(b.clone()),
            _ => None,
        };
        if let Some(ty) = result {
            return ty;
        }

        let message = match (a.scalar_kind(), b.scalar_kind()) {
            (Some(ScalarKind::Bool), _) | (_, Some(ScalarKind::Bool)) => {
                format!("'{}' is not defined for bool operands", symbol)
            }
            (Some(x), Some(y)) if x != y => format!(
                "cannot apply '{}' to {} and {}: numeric types are never converted implicitly, use an explicit conversion like ({} x)",
                symbol, a, b, x
            ),
            _ => format!("'{}' is not defined for {} and {}", symbol, a, b),
        };
        self.error(message, span);
        Type::Error
    }

    fn compare_type(&mut self, op: BinaryOp, a: &Type, b: &Type, span: Span) -> Type {
        if a.is_error() || b.is_error() {
            return Type::Error;
        }
        let ordered = !matches!(op, BinaryOp::Eq | BinaryOp::Ne);
        let result = match (a, b) {
            _ if a != b => None,
            (Type::Scalar(k), _) if !(ordered && *k == ScalarKind::Bool) => Some(Type::BOOL),
            (Type::Vector(k, n), _) if !(ordered && *k == ScalarKind::Bool) => {
                Some(Type::Vector(ScalarKind::Bool, *n))
            }
            _ => None,
        };
        match result {
            Some(ty) => ty,
            None => {
                self.error(
                    format!("cannot compare {} and {} with '{}'", a, b, op.symbol()),
                    span,
                );
                Type::Error
            }
        }
    }

    // ── Whole-program checks ────────────────────────────────────────

    fn check_recursion(&mut self) {
        let mut state: HashMap<&str, bool> = HashMap::new();
        let mut cycles = Vec::new();
        for name in self.calls.keys() {
            let mut stack = Vec::new();
            visit(name, &self.calls, &mut state, &mut stack, &mut cycles);
        }
        for (cycle, span) in cycles {
            let message = if cycle.len() == 2 {
                format!("function '{}' calls itself; recursion is not supported", cycle[0])
            } else {
                format!("recursive call cycle {} is not supported", cycle.join(" -> "))
            };
            self.error(message, span);
        }

        /// Depth-first walk; `state` is false while a node is on the stack.
        fn visit<'a>(
            name: &'a str,
            calls: &'a BTreeMap<String, Vec<(String, Span)>>,
            state: &mut HashMap<&'a str, bool>,
            stack: &mut Vec<&'a str>,
            cycles: &mut Vec<(Vec<String>, Span)>,
        ) {
            if state.contains_key(name) {
                return;
            }
            state.insert(name, false);
            stack.push(name);
            for (callee, span) in calls.get(name).into_iter().flatten() {
                match state.get(callee.as_str()) {
                    Some(false) => {
                        let start = stack.iter().position(|n| *n == callee.as_str()).unwrap_or(0);
                        let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                        cycle.push(callee.clone());
                        cycles.push((cycle, *span));
                    }
                    Some(true) => {}
                    None => visit(callee, calls, state, stack, cycles),
                }
            }
            stack.pop();
            state.insert(name, true);
        }
    }

    fn warn_unused(&mut self, functions: &[TypedFunction]) {
        let called: HashSet<&str> = self
            .calls
            .values()
            .flatten()
            .map(|(callee, _)| callee.as_str())
            .collect();
        let unused: Vec<(String, Span)> = functions
            .iter()
            .filter(|f| f.stage.is_none() && !called.contains(f.name.as_str()))
            .map(|f| (f.name.clone(), f.span))
            .collect();
        for (name, span) in unused {
            self.diagnostics.push(Diagnostic {
                severity: DiagnosticSeverity::Warning,
                message: format!("function '{}' is never used", name),
                span,
            });
        }
    }

    fn program_info(&self, constants: &[TypedConst], functions: &[TypedFunction]) -> ProgramInfo {
        let entries = functions
            .iter()
            .filter_map(|f| {
                f.stage.map(|stage| EntryPoint {
                    name: f.name.clone(),
                    stage,
                    span: f.span,
                })
            })
            .collect();
        let constants = constants
            .iter()
            .map(|c| ConstantInfo {
                name: c.name.clone(),
                ty: c.ty.clone(),
                value: match &c.value.kind {
                    TypedExprKind::Int(v) => Some(ConstValue::Int(*v)),
                    TypedExprKind::Float(text) => text.parse().ok().map(ConstValue::Float),
                    TypedExprKind::Bool(b) => Some(ConstValue::Bool(*b)),
                    _ => None,
                },
            })
            .collect();
        ProgramInfo { entries, constants }
    }
}

/// Type check a module with default settings.
pub fn check_module(module: &Module) -> (TypedModule, Vec<Diagnostic>) {
    TypeChecker::new().check(module)
}
