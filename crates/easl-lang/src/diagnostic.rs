use crate::lexer::{LexError, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }

    /// Render with the offending source line and a caret marker underneath.
    pub fn render(&self, file: &str, source: &str) -> String {
        // Program-level diagnostics carry no position.
        if self.span.line == 0 {
            return format!("{}\n  --> {}\n", self.headline(), file);
        }
        let mut out = format!("{}\n  --> {}:{}:{}\n", self.headline(), file, self.span.line, self.span.column);
        if let Some(line_text) = source.lines().nth(self.span.line.saturating_sub(1)) {
            let gutter = self.span.line.to_string();
            let pad = " ".repeat(gutter.len());
            let width = (self.span.end.saturating_sub(self.span.start)).max(1);
            let available = line_text.chars().count().saturating_sub(self.span.column.saturating_sub(1));
            let carets = "^".repeat(width.min(available.max(1)));
            out.push_str(&format!("{pad} |\n{gutter} | {line_text}\n{pad} | "));
            out.push_str(&" ".repeat(self.span.column.saturating_sub(1)));
            out.push_str(&carets);
            out.push('\n');
        }
        out
    }

    fn headline(&self) -> String {
        let prefix = match self.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Info => "info",
        };
        format!("{prefix}: {}", self.message)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}:{}", self.headline(), self.span.line, self.span.column)
    }
}

impl From<LexError> for Diagnostic {
    fn from(err: LexError) -> Self {
        Diagnostic::error(err.message, err.span)
    }
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Stable sort into source order, errors before warnings on the same spot.
pub fn sort_diagnostics(diagnostics: &mut [Diagnostic]) {
    diagnostics.sort_by(|a, b| {
        (a.span.start, a.severity).cmp(&(b.span.start, b.severity))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let d = Diagnostic::error("unknown identifier 'foo'", Span::new(10, 13, 2, 4));
        assert_eq!(d.to_string(), "error: unknown identifier 'foo' at 2:4");
    }

    #[test]
    fn test_render_points_at_span() {
        let source = "(defn f [] f32\n  (+ foo 1.0))";
        let d = Diagnostic::error("unknown identifier 'foo'", Span::new(20, 23, 2, 6));
        let rendered = d.render("shader.easl", source);
        assert!(rendered.contains("--> shader.easl:2:6"));
        assert!(rendered.contains("2 |   (+ foo 1.0))"));
        assert!(rendered.ends_with("     ^^^\n"));
    }

    #[test]
    fn test_render_without_position() {
        let d = Diagnostic::error("no vertex entry point found", Span::default());
        assert_eq!(d.render("a.easl", "(def x: f32 1.0)"), "error: no vertex entry point found\n  --> a.easl\n");
    }

    #[test]
    fn test_sort_is_source_order() {
        let mut diags = vec![
            Diagnostic::warning("b", Span::new(30, 31, 3, 1)),
            Diagnostic::error("a", Span::new(5, 6, 1, 6)),
        ];
        sort_diagnostics(&mut diags);
        assert_eq!(diags[0].message, "a");
        assert!(has_errors(&diags));
    }
}
