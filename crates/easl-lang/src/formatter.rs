//! Canonical source formatter.
//!
//! Produces a fixed layout from the AST: one blank line between top-level
//! forms, bodies indented by two spaces, and expressions kept on one line
//! when they fit within `MAX_WIDTH` columns. Comments are re-emitted on their
//! own lines above the top-level form they appear in (or precede).

use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexer::{Comment, Lexer};
use crate::parser::Parser;

pub const MAX_WIDTH: usize = 80;

pub struct Formatter<'c> {
    output: String,
    comments: &'c [Comment],
    next_comment: usize,
}

impl<'c> Formatter<'c> {
    pub fn format(module: &Module, comments: &'c [Comment]) -> String {
        let mut formatter = Formatter {
            output: String::new(),
            comments,
            next_comment: 0,
        };
        formatter.format_module(module);
        formatter.output
    }

    fn push_line(&mut self, text: &str) {
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn format_module(&mut self, module: &Module) {
        let mut first = true;
        for item in &module.items {
            if !first {
                self.output.push('\n');
            }
            first = false;
            // Comments before the form or anywhere inside it go above it.
            self.flush_comments(item.span().end);
            let text = match item {
                Item::Const(c) => format_const(c),
                Item::Function(f) => format_function(f),
                Item::Struct(s) => format_struct(s),
            };
            self.push_line(&text);
        }

        if self.next_comment < self.comments.len() {
            if !first {
                self.output.push('\n');
            }
            self.flush_comments(usize::MAX);
        }
    }

    fn flush_comments(&mut self, before: usize) {
        while let Some(comment) = self.comments.get(self.next_comment) {
            if comment.span.start >= before {
                break;
            }
            let text = comment.text.clone();
            self.push_line(&text);
            self.next_comment += 1;
        }
    }
}

fn pad(column: usize) -> String {
    " ".repeat(column)
}

fn format_const(c: &ConstDef) -> String {
    let prefix = format!("(def {}: {} ", c.name.name, c.ty.name);
    let value = render(&c.value, prefix.len());
    format!("{}{})", prefix, value)
}

fn format_function(f: &FunctionDef) -> String {
    let mut header = String::from("(defn ");
    if let Some(stage) = f.stage {
        header.push_str(&format!("{} ", stage));
    }
    let params = f
        .params
        .iter()
        .map(|p| format!("{}: {}", p.name.name, p.ty.name))
        .collect::<Vec<_>>()
        .join(" ");
    header.push_str(&format!("{} [{}] {}", f.name.name, params, f.return_type.name));
    format!("{}\n  {})", header, render(&f.body, 2))
}

fn format_struct(s: &StructDef) -> String {
    let mut out = format!("(struct {}", s.name.name);
    for field in &s.fields {
        out.push_str(&format!("\n  {}: {}", field.name.name, field.ty.name));
    }
    out.push(')');
    out
}

fn quote(s: &str) -> String {
    let mut out = String::from("\"");
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Single-line rendering.
fn flat(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Number(n) => n.to_string(),
        ExprKind::Bool(b) => b.to_string(),
        ExprKind::Str(s) => quote(s),
        ExprKind::Ident(name) => name.clone(),
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => format!("(if {} {} {})", flat(cond), flat(then_branch), flat(else_branch)),
        ExprKind::Let { bindings, body } => {
            let bindings = bindings
                .iter()
                .map(|b| format!("{} {}", b.name.name, flat(&b.value)))
                .collect::<Vec<_>>()
                .join(" ");
            format!("(let [{}] {})", bindings, flat(body))
        }
        ExprKind::Access { field, target } => format!("(.{} {})", field.name, flat(target)),
        ExprKind::Call { head, args } => {
            let mut out = format!("({}", head.name);
            for arg in args {
                out.push(' ');
                out.push_str(&flat(arg));
            }
            out.push(')');
            out
        }
    }
}

/// Render `expr` starting at `column`, breaking it over several lines when
/// the single-line form would run past `MAX_WIDTH`.
fn render(expr: &Expr, column: usize) -> String {
    let single = flat(expr);
    if column + single.len() <= MAX_WIDTH {
        return single;
    }
    match &expr.kind {
        ExprKind::Call { head, args } if !args.is_empty() => {
            let mut out = format!("({}", head.name);
            for arg in args {
                out.push('\n');
                out.push_str(&pad(column + 2));
                out.push_str(&render(arg, column + 2));
            }
            out.push(')');
            out
        }
        ExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => format!(
            "(if {}\n{}{}\n{}{})",
            render(cond, column + 4),
            pad(column + 2),
            render(then_branch, column + 2),
            pad(column + 2),
            render(else_branch, column + 2)
        ),
        ExprKind::Let { bindings, body } => {
            let binding_column = column + "(let [".len();
            let mut out = String::from("(let [");
            for (i, binding) in bindings.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                    out.push_str(&pad(binding_column));
                }
                let value_column = binding_column + binding.name.name.len() + 1;
                out.push_str(&format!("{} {}", binding.name.name, render(&binding.value, value_column)));
            }
            out.push_str(&format!("]\n{}{})", pad(column + 2), render(body, column + 2)));
            out
        }
        ExprKind::Access { field, target } => {
            let target_column = column + field.name.len() + 3;
            format!("(.{} {})", field.name, render(target, target_column))
        }
        _ => single,
    }
}

/// Format EASL source text. Refuses sources that fail to lex or parse.
pub fn format_source(source: &str) -> Result<String, Vec<Diagnostic>> {
    let mut lexer = Lexer::new(source);
    let tokens = lexer.tokenize().map_err(|e| vec![Diagnostic::from(e)])?;
    let comments = lexer.into_comments();
    let (module, diagnostics) = Parser::new(tokens).parse()?;
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }
    Ok(Formatter::format(&module, &comments))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_basic() {
        let src = "(def   triangles :u32 5)(defn fragment frag [] vec4f (vec4f 1.0 0.5 0.0 1.0))";
        let out = format_source(src).unwrap();
        assert_eq!(
            out,
            "(def triangles: u32 5)\n\n(defn fragment frag [] vec4f\n  (vec4f 1.0 0.5 0.0 1.0))\n"
        );
    }

    #[test]
    fn test_format_idempotent() {
        let src = "; shader\n(struct Varyings position: vec4f uv: vec2f)\n\
                   (defn vertex vert [i: u32] Varyings (let [x (- (* (f32 (% i 2u)) 2.0) 1.0) y (- (* (f32 (/ i 2u)) 2.0) 1.0)] (Varyings (vec4f x y 0.0 1.0) (vec2f (* 0.5 (+ x 1.0)) (* 0.5 (+ y 1.0))))))\n\
                   #| trailing |#";
        let once = format_source(src).unwrap();
        let twice = format_source(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_long_expression_breaks() {
        let src = "(defn f [a: f32 b: f32] f32 (+ (* a a a a a a a a a a) (* b b b b b b b b b b) (* a b a b a b a b a b a b a b)))";
        let out = format_source(src).unwrap();
        assert!(out.contains("\n  (+\n    (* a a a a a a a a a a)\n    (* b b b b b b b b b b)\n"));
        assert!(out.lines().all(|l| l.len() <= MAX_WIDTH));
    }

    #[test]
    fn test_comments_preserved() {
        let src = "; leading\n(def a: f32 1.0) ; after a\n(defn f [] f32\n  ; inside\n  a)\n; end";
        let out = format_source(src).unwrap();
        assert_eq!(
            out,
            "; leading\n(def a: f32 1.0)\n\n; after a\n; inside\n(defn f [] f32\n  a)\n\n; end\n"
        );
    }

    #[test]
    fn test_literal_spelling_kept() {
        let out = format_source("(def a: u32 5u32) (def b: f32 2e3)").unwrap();
        assert!(out.contains("5u32"));
        assert!(out.contains("2e3"));
    }

    #[test]
    fn test_refuses_parse_errors() {
        assert!(format_source("(def a: f32 1.0").is_err());
        assert!(format_source("(def a f32 1.0)").is_err());
        assert!(format_source("(def a: f32 §)").is_err());
    }

    #[test]
    fn test_struct_layout() {
        let out = format_source("(struct Light dir: vec3f power: f32)").unwrap();
        assert_eq!(out, "(struct Light\n  dir: vec3f\n  power: f32)\n");
    }
}
