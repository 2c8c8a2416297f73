//! EASL parser: tokens → AST.
//!
//! Delimiter balance is checked up front and an imbalance is fatal. Any other
//! malformed top-level form produces one diagnostic, after which the parser
//! resumes at the next top-level form.

use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexer::{Span, Token, TokenKind};

type ParseResult<T> = Result<T, Diagnostic>;

/// Deepest expression nesting accepted. Later stages recurse over the tree,
/// so anything deeper is rejected here with a diagnostic.
pub const MAX_NESTING: usize = 64;

/// The EASL parser.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// For each opening delimiter, the index of its closing partner.
    matching: Vec<Option<usize>>,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let matching = vec![None; tokens.len()];
        Self {
            tokens,
            pos: 0,
            matching,
            depth: 0,
        }
    }

    /// Parse the token stream into a `Module`.
    ///
    /// `Err` carries the fatal diagnostic for unbalanced delimiters. `Ok`
    /// carries the module built from every well-formed top-level form plus one
    /// diagnostic per malformed form.
    pub fn parse(&mut self) -> Result<(Module, Vec<Diagnostic>), Vec<Diagnostic>> {
        self.check_balance().map_err(|d| vec![d])?;

        let start = self.current_span();
        let mut items = Vec::new();
        let mut diagnostics = Vec::new();

        while !self.at_eof() {
            let form_start = self.pos;
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(diag) => {
                    diagnostics.push(diag);
                    self.resync(form_start);
                }
            }
        }

        let end = self.current_span();
        let module = Module {
            items,
            span: Span::new(start.start, end.end, start.line, start.column),
        };
        Ok((module, diagnostics))
    }

    fn check_balance(&mut self) -> ParseResult<()> {
        let mut stack: Vec<usize> = Vec::new();
        for (index, token) in self.tokens.iter().enumerate() {
            if token.kind.is_open() {
                stack.push(index);
            } else if token.kind.is_close() {
                let Some(open) = stack.pop() else {
                    return Err(Diagnostic::error(
                        format!("unmatched '{}'", token.kind),
                        token.span,
                    ));
                };
                let open_token = &self.tokens[open];
                let pairs = matches!(
                    (&open_token.kind, &token.kind),
                    (TokenKind::LeftParen, TokenKind::RightParen)
                        | (TokenKind::LeftBracket, TokenKind::RightBracket)
                );
                if !pairs {
                    return Err(Diagnostic::error(
                        format!(
                            "mismatched '{}': '{}' opened at {} is not closed",
                            token.kind, open_token.kind, open_token.span
                        ),
                        token.span,
                    ));
                }
                self.matching[open] = Some(index);
            }
        }
        if let Some(open) = stack.pop() {
            let token = &self.tokens[open];
            return Err(Diagnostic::error(
                format!("unclosed '{}' opened at {}", token.kind, token.span),
                token.span,
            ));
        }
        Ok(())
    }

    /// Skip to just past the top-level form that started at `form_start`.
    fn resync(&mut self, form_start: usize) {
        self.pos = match self.matching.get(form_start).copied().flatten() {
            Some(close) => close + 1,
            None => (form_start + 1).max(self.pos),
        };
    }

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &TokenKind) -> ParseResult<Span> {
        if std::mem::discriminant(self.peek()) == std::mem::discriminant(expected) {
            Ok(self.advance().map(|t| t.span).unwrap_or_default())
        } else {
            Err(Diagnostic::error(
                format!("expected '{}', found '{}'", expected, self.peek()),
                self.current_span(),
            ))
        }
    }

    fn expect_close(&mut self, form: &str) -> ParseResult<Span> {
        if matches!(self.peek(), TokenKind::RightParen) {
            return self.expect(&TokenKind::RightParen);
        }
        Err(Diagnostic::error(
            format!("unexpected '{}' in {} form", self.peek(), form),
            self.current_span(),
        ))
    }

    fn parse_ident(&mut self, what: &str) -> ParseResult<Ident> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                let span = self.current_span();
                self.advance();
                Ok(Ident { name, span })
            }
            other => Err(Diagnostic::error(
                format!("expected {}, found '{}'", what, other),
                self.current_span(),
            )),
        }
    }

    fn parse_type(&mut self) -> ParseResult<TypeAnnotation> {
        let ident = self.parse_ident("a type name")?;
        Ok(TypeAnnotation {
            name: ident.name,
            span: ident.span,
        })
    }

    /// `name: type`, used by parameters and struct fields.
    fn parse_typed_name(&mut self) -> ParseResult<(Ident, TypeAnnotation, Span)> {
        let name = self.parse_ident("a name")?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let span = name.span.to(ty.span);
        Ok((name, ty, span))
    }

    fn parse_item(&mut self) -> ParseResult<Item> {
        let open = self.current_span();
        if !matches!(self.peek(), TokenKind::LeftParen) {
            return Err(Diagnostic::error(
                format!("expected a top-level form, found '{}'", self.peek()),
                open,
            ));
        }
        self.advance();

        match self.peek() {
            TokenKind::Def => {
                self.advance();
                self.parse_const(open).map(Item::Const)
            }
            TokenKind::Defn => {
                self.advance();
                self.parse_function(open).map(Item::Function)
            }
            TokenKind::Struct => {
                self.advance();
                self.parse_struct(open).map(Item::Struct)
            }
            other => Err(Diagnostic::error(
                format!("expected 'def', 'defn' or 'struct', found '{}'", other),
                self.current_span(),
            )),
        }
    }

    /// Parse: `(def name: type value)`
    fn parse_const(&mut self, open: Span) -> ParseResult<ConstDef> {
        let name = self.parse_ident("a constant name")?;
        self.expect(&TokenKind::Colon)?;
        let ty = self.parse_type()?;
        let value = self.parse_expr()?;
        let close = self.expect_close("def")?;
        Ok(ConstDef {
            name,
            ty,
            value,
            span: open.to(close),
        })
    }

    /// Parse: `(defn [vertex|fragment] name [p: T ...] ret body)`
    fn parse_function(&mut self, open: Span) -> ParseResult<FunctionDef> {
        let stage = match self.peek() {
            TokenKind::Vertex => {
                self.advance();
                Some(Stage::Vertex)
            }
            TokenKind::Fragment => {
                self.advance();
                Some(Stage::Fragment)
            }
            _ => None,
        };
        let name = self.parse_ident("a function name")?;

        self.expect(&TokenKind::LeftBracket)?;
        let mut params = Vec::new();
        while !matches!(self.peek(), TokenKind::RightBracket) {
            let (name, ty, span) = self.parse_typed_name()?;
            params.push(Param { name, ty, span });
        }
        self.expect(&TokenKind::RightBracket)?;

        let return_type = self.parse_type()?;
        if matches!(self.peek(), TokenKind::RightParen) {
            return Err(Diagnostic::error(
                format!("function '{}' has no body", name.name),
                self.current_span(),
            ));
        }
        let body = self.parse_expr()?;
        let close = self.expect_close("defn")?;

        Ok(FunctionDef {
            stage,
            name,
            params,
            return_type,
            body,
            span: open.to(close),
        })
    }

    /// Parse: `(struct Name field: T ...)`
    fn parse_struct(&mut self, open: Span) -> ParseResult<StructDef> {
        let name = self.parse_ident("a struct name")?;
        let mut fields = Vec::new();
        while !matches!(self.peek(), TokenKind::RightParen) {
            let (name, ty, span) = self.parse_typed_name()?;
            fields.push(Field { name, ty, span });
        }
        let close = self.expect(&TokenKind::RightParen)?;
        if fields.is_empty() {
            return Err(Diagnostic::error(
                format!("struct '{}' must declare at least one field", name.name),
                name.span,
            ));
        }
        Ok(StructDef {
            name,
            fields,
            span: open.to(close),
        })
    }

    pub(crate) fn parse_expr(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::new(ExprKind::Number(n), span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(true), span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(false), span))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(s), span))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::new(ExprKind::Ident(name), span))
            }
            TokenKind::LeftParen => {
                if self.depth >= MAX_NESTING {
                    return Err(Diagnostic::error(
                        format!("expression nested deeper than {} levels", MAX_NESTING),
                        span,
                    ));
                }
                self.advance();
                self.depth += 1;
                let form = self.parse_form(span);
                self.depth -= 1;
                form
            }
            other => Err(Diagnostic::error(
                format!("expected an expression, found '{}'", other),
                span,
            )),
        }
    }

    /// Parse the rest of a parenthesized expression after its `(`.
    fn parse_form(&mut self, open: Span) -> ParseResult<Expr> {
        match self.peek().clone() {
            TokenKind::If => {
                self.advance();
                let cond = self.parse_expr()?;
                let then_branch = self.parse_expr()?;
                if matches!(self.peek(), TokenKind::RightParen) {
                    return Err(Diagnostic::error(
                        "'if' requires both a then and an else branch",
                        self.current_span(),
                    ));
                }
                let else_branch = self.parse_expr()?;
                let close = self.expect_close("if")?;
                Ok(Expr::new(
                    ExprKind::If {
                        cond: Box::new(cond),
                        then_branch: Box::new(then_branch),
                        else_branch: Box::new(else_branch),
                    },
                    open.to(close),
                ))
            }
            TokenKind::Let => {
                self.advance();
                self.expect(&TokenKind::LeftBracket)?;
                let mut bindings = Vec::new();
                while !matches!(self.peek(), TokenKind::RightBracket) {
                    let name = self.parse_ident("a binding name")?;
                    if matches!(self.peek(), TokenKind::RightBracket) {
                        return Err(Diagnostic::error(
                            format!("binding '{}' has no value", name.name),
                            name.span,
                        ));
                    }
                    let value = self.parse_expr()?;
                    let span = name.span.to(value.span);
                    bindings.push(LetBinding { name, value, span });
                }
                self.expect(&TokenKind::RightBracket)?;
                let body = self.parse_expr()?;
                let close = self.expect_close("let")?;
                Ok(Expr::new(
                    ExprKind::Let {
                        bindings,
                        body: Box::new(body),
                    },
                    open.to(close),
                ))
            }
            TokenKind::Accessor(field) => {
                let field = Ident {
                    name: field,
                    span: self.current_span(),
                };
                self.advance();
                let target = self.parse_expr()?;
                let close = self.expect_close("accessor")?;
                Ok(Expr::new(
                    ExprKind::Access {
                        field,
                        target: Box::new(target),
                    },
                    open.to(close),
                ))
            }
            TokenKind::Identifier(_) => {
                let head = self.parse_ident("a function name")?;
                let mut args = Vec::new();
                while !matches!(self.peek(), TokenKind::RightParen | TokenKind::Eof) {
                    args.push(self.parse_expr()?);
                }
                let close = self.expect(&TokenKind::RightParen)?;
                Ok(Expr::new(ExprKind::Call { head, args }, open.to(close)))
            }
            TokenKind::RightParen => Err(Diagnostic::error("empty application '()'", open.to(self.current_span()))),
            other => Err(Diagnostic::error(
                format!("expected a function name, found '{}'", other),
                self.current_span(),
            )),
        }
    }
}

/// Parse an already tokenized source.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<(Module, Vec<Diagnostic>), Vec<Diagnostic>> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (Module, Vec<Diagnostic>) {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    fn parse_fatal(src: &str) -> Vec<Diagnostic> {
        let tokens = Lexer::new(src).tokenize().unwrap();
        Parser::new(tokens).parse().unwrap_err()
    }

    #[test]
    fn test_parse_constant() {
        let (module, diags) = parse("(def triangles: u32 5)");
        assert!(diags.is_empty());
        assert_eq!(module.items.len(), 1);
        match &module.items[0] {
            Item::Const(c) => {
                assert_eq!(c.name.name, "triangles");
                assert_eq!(c.ty.name, "u32");
                assert!(matches!(&c.value.kind, ExprKind::Number(n) if n.text == "5"));
            }
            other => panic!("expected const, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_entry_function() {
        let (module, diags) = parse(
            "(defn fragment frag [pos: vec4f] vec4f\n  (vec4f (.xy pos) 0.0 1.0))",
        );
        assert!(diags.is_empty());
        let Item::Function(f) = &module.items[0] else {
            panic!("expected function");
        };
        assert_eq!(f.stage, Some(Stage::Fragment));
        assert_eq!(f.name.name, "frag");
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.params[0].ty.name, "vec4f");
        assert_eq!(f.return_type.name, "vec4f");
        let ExprKind::Call { head, args } = &f.body.kind else {
            panic!("expected call body");
        };
        assert_eq!(head.name, "vec4f");
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0].kind, ExprKind::Access { field, .. } if field.name == "xy"));
    }

    #[test]
    fn test_parse_struct() {
        let (module, diags) = parse("(struct Varyings position: vec4f uv: vec2f)");
        assert!(diags.is_empty());
        let Item::Struct(s) = &module.items[0] else {
            panic!("expected struct");
        };
        assert_eq!(s.fields.len(), 2);
        assert_eq!(s.fields[1].name.name, "uv");
    }

    #[test]
    fn test_parse_let_and_if() {
        let (module, diags) = parse("(defn f [x: f32] f32 (let [y (* x 2.0) z y] (if (> z 1.0) z y)))");
        assert!(diags.is_empty());
        let Item::Function(f) = &module.items[0] else {
            panic!("expected function");
        };
        let ExprKind::Let { bindings, body } = &f.body.kind else {
            panic!("expected let");
        };
        assert_eq!(bindings.len(), 2);
        assert!(matches!(body.kind, ExprKind::If { .. }));
    }

    #[test]
    fn test_unbalanced_is_fatal() {
        let diags = parse_fatal("(def x: f32 (+ 1.0 2.0)");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unclosed"));

        let diags = parse_fatal("(def x: f32 1.0))");
        assert!(diags[0].message.contains("unmatched"));

        let diags = parse_fatal("(defn f [x: f32) f32 x)");
        assert!(diags[0].message.contains("mismatched"));
    }

    #[test]
    fn test_recovers_per_top_level_form() {
        let src = "(def a: f32 1.0)\n(def b f32 2.0)\n(defn g [] f32 a)\n(bogus 1)\n(def c: f32 3.0)";
        let (module, diags) = parse(src);
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].span.line, 2);
        assert_eq!(diags[1].span.line, 4);
        assert_eq!(module.items.len(), 3);
        assert_eq!(module.items[2].name().name, "c");
    }

    #[test]
    fn test_if_needs_else() {
        let (_, diags) = parse("(defn f [] f32 (if true 1.0))");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("else"));
    }

    #[test]
    fn test_extra_operand_in_def() {
        let (module, diags) = parse("(def x: f32 1.0 2.0)");
        assert!(module.items.is_empty());
        assert_eq!(diags.len(), 1);
    }

    fn nested_sum(depth: usize) -> String {
        format!("{}1.0{}", "(+ 1.0 ".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let (module, diags) = parse(&format!("(def a: f32 {})", nested_sum(MAX_NESTING)));
        assert!(diags.is_empty());
        assert_eq!(module.items.len(), 1);
    }

    #[test]
    fn test_excessive_nesting_is_a_diagnostic() {
        let src = format!(
            "(def a: f32 {})\n(def b: f32 2.0)",
            nested_sum(MAX_NESTING + 1)
        );
        let (module, diags) = parse(&src);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("nested deeper"));
        assert_eq!(module.items.len(), 1);
        assert_eq!(module.items[0].name().name, "b");
    }

    #[test]
    fn test_empty_struct_rejected() {
        let (_, diags) = parse("(struct Empty)");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("at least one field"));
    }
}
