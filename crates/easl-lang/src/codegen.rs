//! WGSL code generation from the typed AST.
//!
//! Output order is fixed: uniforms, structs, constants, then functions, each
//! in declaration order, so the same module always yields the same text.
//! Names are sanitized for WGSL and made unique; `let` bindings become
//! uniquely named `let` statements and `if` expressions become a `var`
//! assigned in both branches.

use std::collections::{BTreeMap, HashMap, HashSet};

use easl_core::EaslError;

use crate::ast::Stage;
use crate::builtins;
use crate::checker::UNIFORMS;
use crate::diagnostic::Diagnostic;
use crate::lexer::Span;
use crate::scope::SymbolKind;
use crate::typed::*;
use crate::types::{ScalarKind, Type};

/// Code generation failed on a module that should not have reached it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct CodeGenError {
    pub message: String,
    pub span: Span,
}

impl CodeGenError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl From<CodeGenError> for EaslError {
    fn from(err: CodeGenError) -> Self {
        EaslError::CodeGen(err.message)
    }
}

impl From<CodeGenError> for Diagnostic {
    fn from(err: CodeGenError) -> Self {
        Diagnostic::error(err.message, err.span)
    }
}

const WGSL_RESERVED: &[&str] = &[
    "alias", "array", "atomic", "bitcast", "bool", "break", "case", "const", "const_assert", "continue",
    "continuing", "default", "diagnostic", "discard", "else", "enable", "f16", "f32", "false", "fn", "for",
    "i32", "if", "let", "loop", "mat2x2", "mat2x3", "mat2x4", "mat3x2", "mat3x3", "mat3x4", "mat4x2",
    "mat4x3", "mat4x4", "override", "ptr", "requires", "return", "sampler", "sampler_comparison", "struct",
    "switch", "texture_1d", "texture_2d", "texture_2d_array", "texture_3d", "texture_cube", "true", "u32",
    "var", "vec2", "vec3", "vec4", "while", "asm", "do", "enum", "goto", "impl", "in", "mut", "self",
    "static", "super", "this", "type", "typedef", "unsafe", "use", "where", "yield",
];

/// Map an EASL identifier onto a valid WGSL identifier.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            '-' => out.push('_'),
            '?' => out.push_str("_p"),
            '!' => out.push_str("_x"),
            '+' => out.push_str("_plus"),
            '*' => out.push_str("_star"),
            '/' => out.push_str("_slash"),
            '%' => out.push_str("_pct"),
            '=' => out.push_str("_eq"),
            '<' => out.push_str("_lt"),
            '>' => out.push_str("_gt"),
            '&' => out.push_str("_and"),
            '|' => out.push_str("_or"),
            other => out.push_str(&format!("_u{:x}", other as u32)),
        }
    }
    while out.starts_with("__") {
        out.remove(0);
    }
    if out.is_empty() || out == "_" || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'v');
    }
    if WGSL_RESERVED.contains(&out.as_str()) || Type::builtin(&out).is_some() {
        out.push('_');
    }
    out
}

/// Hands out unique WGSL names.
#[derive(Debug, Clone, Default)]
struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    fn fresh(&mut self, name: &str) -> String {
        let base = sanitize_identifier(name);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

pub struct Codegen<'m> {
    module: &'m TypedModule,
    wgsl: String,
    indent: usize,
    globals: NameAllocator,
    global_names: HashMap<String, String>,
    struct_names: HashMap<String, String>,
    field_names: HashMap<(String, String), String>,
    /// Per-function name allocator, seeded with every global name.
    locals: NameAllocator,
    scopes: Vec<HashMap<String, String>>,
}

impl<'m> Codegen<'m> {
    pub fn new(module: &'m TypedModule) -> Self {
        Self {
            module,
            wgsl: String::new(),
            indent: 0,
            globals: NameAllocator::default(),
            global_names: HashMap::new(),
            struct_names: HashMap::new(),
            field_names: HashMap::new(),
            locals: NameAllocator::default(),
            scopes: Vec::new(),
        }
    }

    pub fn generate(self) -> Result<String, CodeGenError> {
        self.generate_with_entry_names().map(|(wgsl, _)| wgsl)
    }

    /// Generate WGSL and report the WGSL name of every entry point.
    pub fn generate_with_entry_names(mut self) -> Result<(String, BTreeMap<String, String>), CodeGenError> {
        self.assign_global_names();

        self.line("// Generated by easl. Do not edit.");
        self.blank();
        for (binding, (name, ty)) in UNIFORMS.iter().enumerate() {
            self.line(&format!(
                "@group(0) @binding({}) var<uniform> {}: {};",
                binding,
                name,
                ty.wgsl()
            ));
        }

        let module = self.module;
        for s in &module.structs {
            self.blank();
            self.gen_struct(s)?;
        }

        if !module.constants.is_empty() {
            self.blank();
        }
        for c in &module.constants {
            self.gen_const(c)?;
        }

        for f in &module.functions {
            self.blank();
            self.gen_function(f)?;
        }

        let entry_names = module
            .functions
            .iter()
            .filter(|f| f.stage.is_some())
            .filter_map(|f| Some((f.name.clone(), self.global_names.get(&f.name)?.clone())))
            .collect();
        Ok((self.wgsl, entry_names))
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.wgsl.push_str("    ");
        }
        self.wgsl.push_str(text);
        self.wgsl.push('\n');
    }

    fn blank(&mut self) {
        self.wgsl.push('\n');
    }

    fn assign_global_names(&mut self) {
        for (name, _) in UNIFORMS {
            self.globals.reserve(name);
        }
        // A local named after a builtin would hide it for the rest of the block.
        for builtin in builtins::BUILTINS {
            self.globals.reserve(builtin.wgsl);
        }
        for s in &self.module.structs {
            let wgsl = self.globals.fresh(&s.ty.name);
            self.struct_names.insert(s.ty.name.clone(), wgsl);

            let mut fields = NameAllocator::default();
            for (field, _) in &s.ty.fields {
                let wgsl = fields.fresh(field);
                self.field_names.insert((s.ty.name.clone(), field.clone()), wgsl);
            }
        }
        for c in &self.module.constants {
            let wgsl = self.globals.fresh(&c.name);
            self.global_names.insert(c.name.clone(), wgsl);
        }
        for f in &self.module.functions {
            let wgsl = self.globals.fresh(&f.name);
            self.global_names.insert(f.name.clone(), wgsl);
        }
    }

    fn wgsl_type(&self, ty: &Type, span: Span) -> Result<String, CodeGenError> {
        match ty {
            Type::Struct(s) => self
                .struct_names
                .get(&s.name)
                .cloned()
                .ok_or_else(|| CodeGenError::new(format!("unknown struct '{}'", s.name), span)),
            Type::Error | Type::Function(_) => Err(CodeGenError::new(
                format!("cannot generate code for type {}", ty),
                span,
            )),
            other => Ok(other.wgsl()),
        }
    }

    fn global_name(&self, name: &str, span: Span) -> Result<String, CodeGenError> {
        self.global_names
            .get(name)
            .cloned()
            .ok_or_else(|| CodeGenError::new(format!("unknown global '{}'", name), span))
    }

    fn gen_struct(&mut self, s: &TypedStruct) -> Result<(), CodeGenError> {
        let name = self.wgsl_type(&Type::Struct(s.ty.clone()), s.span)?;
        self.line(&format!("struct {} {{", name));
        self.indent += 1;
        let mut location = 0;
        for (field, ty) in &s.ty.fields {
            let wgsl_ty = self.wgsl_type(ty, s.span)?;
            let field_name = self.field_names[&(s.ty.name.clone(), field.clone())].clone();
            let attrs = if !s.io {
                String::new()
            } else if field == "position" {
                "@builtin(position) ".to_string()
            } else {
                let flat = if ty.scalar_kind().is_some_and(ScalarKind::is_integer) {
                    " @interpolate(flat)"
                } else {
                    ""
                };
                let attrs = format!("@location({}){} ", location, flat);
                location += 1;
                attrs
            };
            self.line(&format!("{}{}: {},", attrs, field_name, wgsl_ty));
        }
        self.indent -= 1;
        self.line("}");
        Ok(())
    }

    fn gen_const(&mut self, c: &TypedConst) -> Result<(), CodeGenError> {
        self.locals = self.globals.clone();
        self.scopes.clear();
        let ty = self.wgsl_type(&c.ty, c.span)?;
        let mark = self.wgsl.len();
        let value = self.gen_expr(&c.value)?;
        if self.wgsl.len() != mark {
            return Err(CodeGenError::new(
                format!("constant '{}' does not reduce to a single expression", c.name),
                c.span,
            ));
        }
        let name = self.global_name(&c.name, c.span)?;
        self.line(&format!("const {}: {} = {};", name, ty, value));
        Ok(())
    }

    fn gen_function(&mut self, f: &TypedFunction) -> Result<(), CodeGenError> {
        self.locals = self.globals.clone();
        self.scopes = vec![HashMap::new()];

        let name = self.global_name(&f.name, f.span)?;
        let mut params = Vec::new();
        for (param, ty) in &f.params {
            let local = self.locals.fresh(param);
            self.bind(param, local.clone());
            params.push((local, ty));
        }

        let (header, ret) = match (f.stage, &f.interface) {
            (None, _) => {
                let params = params
                    .iter()
                    .map(|(n, ty)| Ok(format!("{}: {}", n, self.wgsl_type(ty, f.span)?)))
                    .collect::<Result<Vec<_>, CodeGenError>>()?;
                let ret = self.wgsl_type(&f.ret, f.span)?;
                (format!("fn {}({})", name, params.join(", ")), ret)
            }
            (Some(stage), Some(interface)) => {
                let input = match (&interface.input, params.first()) {
                    (EntryInput::None, _) => String::new(),
                    (EntryInput::VertexIndex, Some((n, _))) => format!("@builtin(vertex_index) {}: u32", n),
                    (EntryInput::Position, Some((n, _))) => format!("@builtin(position) {}: vec4f", n),
                    (EntryInput::Varyings(s), Some((n, _))) => {
                        format!("{}: {}", n, self.wgsl_type(&self.struct_type(s, f.span)?, f.span)?)
                    }
                    _ => return Err(CodeGenError::new("entry point parameter mismatch", f.span)),
                };
                let ret = match &interface.output {
                    EntryOutput::Position => "@builtin(position) vec4f".to_string(),
                    EntryOutput::Color => "@location(0) vec4f".to_string(),
                    EntryOutput::Varyings(s) => self.wgsl_type(&self.struct_type(s, f.span)?, f.span)?,
                };
                let attr = match stage {
                    Stage::Vertex => "@vertex",
                    Stage::Fragment => "@fragment",
                };
                self.line(attr);
                (format!("fn {}({})", name, input), ret)
            }
            (Some(_), None) => {
                return Err(CodeGenError::new(
                    format!("entry point '{}' has an invalid interface", f.name),
                    f.span,
                ));
            }
        };

        self.line(&format!("{} -> {} {{", header, ret));
        self.indent += 1;
        let body = self.gen_expr(&f.body)?;
        self.line(&format!("return {};", body));
        self.indent -= 1;
        self.line("}");
        Ok(())
    }

    fn struct_type(&self, name: &str, span: Span) -> Result<Type, CodeGenError> {
        self.module
            .structs
            .iter()
            .find(|s| s.ty.name == name)
            .map(|s| Type::Struct(s.ty.clone()))
            .ok_or_else(|| CodeGenError::new(format!("unknown struct '{}'", name), span))
    }

    fn bind(&mut self, name: &str, wgsl: String) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), wgsl);
        }
    }

    fn lookup_local(&self, name: &str) -> Option<&String> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Emit any statements the expression needs and return its WGSL text.
    fn gen_expr(&mut self, expr: &TypedExpr) -> Result<String, CodeGenError> {
        if expr.ty.is_error() {
            return Err(CodeGenError::new("cannot generate code for an ill-typed expression", expr.span));
        }
        match &expr.kind {
            TypedExprKind::Int(value) => Ok(match expr.ty.scalar_kind() {
                Some(ScalarKind::U32) => format!("{}u", value),
                Some(ScalarKind::F32) => format!("{}.0f", value),
                _ if *value == i32::MIN as i64 => "i32(-2147483648)".to_string(),
                _ => format!("{}i", value),
            }),
            TypedExprKind::Float(text) => Ok(format!("{}f", text)),
            TypedExprKind::Bool(b) => Ok(b.to_string()),
            TypedExprKind::Var { name, kind } => match kind {
                SymbolKind::Uniform => Ok(name.clone()),
                SymbolKind::Constant | SymbolKind::Function => self.global_name(name, expr.span),
                SymbolKind::Param | SymbolKind::Local => self
                    .lookup_local(name)
                    .cloned()
                    .ok_or_else(|| CodeGenError::new(format!("unbound local '{}'", name), expr.span)),
            },
            TypedExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.gen_expr(cond)?;
                let ty = self.wgsl_type(&expr.ty, expr.span)?;
                let result = self.locals.fresh("if_value");
                self.line(&format!("var {}: {};", result, ty));
                self.line(&format!("if ({}) {{", cond));
                self.indent += 1;
                let value = self.gen_expr(then_branch)?;
                self.line(&format!("{} = {};", result, value));
                self.indent -= 1;
                self.line("} else {");
                self.indent += 1;
                let value = self.gen_expr(else_branch)?;
                self.line(&format!("{} = {};", result, value));
                self.indent -= 1;
                self.line("}");
                Ok(result)
            }
            TypedExprKind::Let { bindings, body } => {
                self.scopes.push(HashMap::new());
                for (name, value) in bindings {
                    let value = self.gen_expr(value)?;
                    let local = self.locals.fresh(name);
                    self.line(&format!("let {} = {};", local, value));
                    self.bind(name, local);
                }
                let body = self.gen_expr(body);
                self.scopes.pop();
                body
            }
            TypedExprKind::Field { target, field } => {
                let Type::Struct(s) = &target.ty else {
                    return Err(CodeGenError::new("field access on a non-struct value", expr.span));
                };
                let field = self
                    .field_names
                    .get(&(s.name.clone(), field.clone()))
                    .cloned()
                    .ok_or_else(|| CodeGenError::new(format!("unknown field '{}'", field), expr.span))?;
                Ok(format!("{}.{}", self.gen_expr(target)?, field))
            }
            TypedExprKind::Swizzle { target, components } => {
                Ok(format!("{}.{}", self.gen_expr(target)?, components))
            }
            TypedExprKind::Call { callee, args } => self.gen_call(callee, args, expr.span),
            TypedExprKind::Error => Err(CodeGenError::new(
                "cannot generate code for an ill-typed expression",
                expr.span,
            )),
        }
    }

    fn gen_call(&mut self, callee: &Callee, args: &[TypedExpr], span: Span) -> Result<String, CodeGenError> {
        let mut arg_strs = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let text = self.gen_expr(arg)?;
            // A later operand emits statements ahead of this call; bind this
            // one first so operands still evaluate left to right.
            if !is_atom(&text) && args[i + 1..].iter().any(emits_statements) {
                let operand = self.locals.fresh("operand");
                self.line(&format!("let {} = {};", operand, text));
                arg_strs.push(operand);
            } else {
                arg_strs.push(text);
            }
        }

        match (callee, arg_strs.as_slice()) {
            (Callee::Unary(UnaryOp::Neg), [a]) if a.starts_with('-') => Ok(format!("(- {})", a)),
            (Callee::Unary(UnaryOp::Neg), [a]) => Ok(format!("(-{})", a)),
            (Callee::Unary(UnaryOp::Not), [a]) => Ok(format!("(!{})", a)),
            (Callee::Binary(op), [a, b]) => Ok(format!("({} {} {})", a, op.symbol(), b)),
            (Callee::Unary(_) | Callee::Binary(_), _) => {
                Err(CodeGenError::new("operator applied to the wrong number of operands", span))
            }
            (Callee::Builtin(name), _) => Ok(format!("{}({})", name, arg_strs.join(", "))),
            (Callee::Construct(ty), _) => Ok(format!("{}({})", self.wgsl_type(ty, span)?, arg_strs.join(", "))),
            (Callee::Struct(name), _) => {
                let name = self.wgsl_type(&self.struct_type(name, span)?, span)?;
                Ok(format!("{}({})", name, arg_strs.join(", ")))
            }
            (Callee::Function(name), _) => {
                let name = self.global_name(name, span)?;
                Ok(format!("{}({})", name, arg_strs.join(", ")))
            }
        }
    }
}

/// Whether lowering `expr` emits statements before its value.
fn emits_statements(expr: &TypedExpr) -> bool {
    match &expr.kind {
        TypedExprKind::If { .. } | TypedExprKind::Let { .. } => true,
        TypedExprKind::Field { target, .. } | TypedExprKind::Swizzle { target, .. } => emits_statements(target),
        TypedExprKind::Call { args, .. } => args.iter().any(emits_statements),
        _ => false,
    }
}

/// Names, literals and member reads need no temporary.
fn is_atom(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Generate WGSL for a module that checked without errors.
pub fn generate(module: &TypedModule) -> Result<String, CodeGenError> {
    Codegen::new(module).generate()
}

/// Like `generate`, also returning entry point names as they appear in WGSL.
pub fn generate_with_entry_names(module: &TypedModule) -> Result<(String, BTreeMap<String, String>), CodeGenError> {
    Codegen::new(module).generate_with_entry_names()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::check_module;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn wgsl(src: &str) -> String {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let (module, diags) = Parser::new(tokens).parse().unwrap();
        assert!(diags.is_empty());
        let (typed, diags) = check_module(&module);
        assert!(diags.iter().all(|d| !d.is_error()), "{:?}", diags);
        generate(&typed).unwrap()
    }

    #[test]
    fn test_uniforms_always_emitted() {
        let out = wgsl("(def scale: f32 2)");
        assert!(out.contains("@group(0) @binding(0) var<uniform> resolution: vec2f;"));
        assert!(out.contains("@group(0) @binding(1) var<uniform> time: f32;"));
        assert!(out.contains("const scale: f32 = 2.0f;"));
    }

    #[test]
    fn test_literal_suffixes() {
        let out = wgsl("(def a: u32 5) (def b: i32 -3) (def c: f32 1.5) (def d: f32 2e3)");
        assert!(out.contains("const a: u32 = 5u;"));
        assert!(out.contains("const b: i32 = -3i;"));
        assert!(out.contains("const c: f32 = 1.5f;"));
        assert!(out.contains("const d: f32 = 2e3f;"));
    }

    #[test]
    fn test_entry_points() {
        let out = wgsl(
            "(defn vertex vert [i: u32] vec4f (vec4f (f32 i) 0.0 0.0 1.0))
             (defn fragment frag [] vec4f (vec4f 1.0 0.0 0.0 1.0))",
        );
        assert!(out.contains("@vertex\nfn vert(@builtin(vertex_index) i: u32) -> @builtin(position) vec4f {"));
        assert!(out.contains("return vec4f(f32(i), 0.0f, 0.0f, 1.0f);"));
        assert!(out.contains("@fragment\nfn frag() -> @location(0) vec4f {"));
    }

    #[test]
    fn test_varyings_struct_attributes() {
        let out = wgsl(
            "(struct Varyings position: vec4f uv: vec2f id: u32)
             (defn vertex vert [] Varyings (Varyings (vec4f 0.0) (vec2f 0.0) 1u))
             (defn fragment frag [v: Varyings] vec4f (vec4f (.uv v) 0.0 1.0))",
        );
        assert!(out.contains("    @builtin(position) position: vec4f,\n"));
        assert!(out.contains("    @location(0) uv: vec2f,\n"));
        assert!(out.contains("    @location(1) @interpolate(flat) id: u32,\n"));
        assert!(out.contains("fn frag(v: Varyings) -> @location(0) vec4f {"));
    }

    #[test]
    fn test_let_shadowing_renamed() {
        let out = wgsl("(defn f [x: f32] f32 (let [x (* x 2.0) x (+ x 1.0)] x)) (defn fragment m [] vec4f (vec4f (f 1.0)))");
        assert!(out.contains("let x_1 = (x * 2.0f);"));
        assert!(out.contains("let x_2 = (x_1 + 1.0f);"));
        assert!(out.contains("return x_2;"));
    }

    #[test]
    fn test_if_lowered_to_var() {
        let out = wgsl("(defn f [c: bool] f32 (if c 1.0 2.0)) (defn fragment m [] vec4f (vec4f (f true)))");
        assert!(out.contains("var if_value: f32;\n    if (c) {\n        if_value = 1.0f;\n    } else {\n        if_value = 2.0f;\n    }\n    return if_value;"));
    }

    #[test]
    fn test_operands_evaluate_left_to_right() {
        let out = wgsl(
            "(defn f [x: f32 c: bool] f32 (+ (* x 2.0) (if c 1.0 2.0)))
             (defn fragment m [] vec4f (vec4f (f 1.0 true)))",
        );
        let operand = out.find("let operand = (x * 2.0f);").unwrap();
        let branch = out.find("var if_value: f32;").unwrap();
        assert!(operand < branch);
        assert!(out.contains("return (operand + if_value);"));

        // Plain names need no temporary.
        let out = wgsl(
            "(defn f [x: f32 c: bool] f32 (+ x (if c 1.0 2.0)))
             (defn fragment m [] vec4f (vec4f (f 1.0 true)))",
        );
        assert!(!out.contains("let operand"));
        assert!(out.contains("return (x + if_value);"));
    }

    #[test]
    fn test_names_sanitized() {
        let out = wgsl("(def my-scale: f32 1.0) (def loop: f32 my-scale)");
        assert!(out.contains("const my_scale: f32 = 1.0f;"));
        assert!(out.contains("const loop_: f32 = my_scale;"));
    }

    #[test]
    fn test_entry_names_reported() {
        let tokens = Lexer::new("(defn vertex main-vert [] vec4f (vec4f 0.0 0.0 0.0 1.0)) (defn helper [] f32 1.0)")
            .tokenize()
            .unwrap();
        let (module, _) = Parser::new(tokens).parse().unwrap();
        let (typed, _) = check_module(&module);
        let (out, names) = generate_with_entry_names(&typed).unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names["main-vert"], "main_vert");
        assert!(out.contains("fn main_vert("));
    }

    #[test]
    fn test_builtin_and_operators() {
        let out = wgsl("(defn f [v: vec3f] f32 (- (inverse-sqrt (dot v v)) (- 1.0))) (defn fragment m [] vec4f (vec4f (f (vec3f 1.0))))");
        assert!(out.contains("return (inverseSqrt(dot(v, v)) - (-1.0f));"));
    }

    #[test]
    fn test_ill_typed_module_rejected() {
        let tokens = Lexer::new("(def a: f32 nope)").tokenize().unwrap();
        let (module, _) = Parser::new(tokens).parse().unwrap();
        let (typed, _) = check_module(&module);
        assert!(generate(&typed).is_err());
    }

    #[test]
    fn test_deterministic() {
        let src = "(struct S position: vec4f) (def k: f32 1.0) (defn vertex v [] S (S (vec4f k)))";
        assert_eq!(wgsl(src), wgsl(src));
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("a-b"), "a_b");
        assert_eq!(sanitize_identifier("zero?"), "zero_p");
        assert_eq!(sanitize_identifier("fn"), "fn_");
        assert_eq!(sanitize_identifier("__x"), "_x");
        assert_eq!(sanitize_identifier("vec3f"), "vec3f_");
    }

    #[test]
    fn test_locals_never_hide_builtins() {
        let out = wgsl("(defn f [v: vec2f] f32 (+ (let [dot 1.0] dot) (dot v v))) (defn fragment m [] vec4f (vec4f (f (vec2f 1.0))))");
        assert!(out.contains("let dot_1 = 1.0f;"));
        assert!(out.contains("return (dot_1 + dot(v, v));"));
    }
}
