//! Program-level facts the runner needs: entry points and constants.

use crate::ast::Stage;
use crate::diagnostic::Diagnostic;
use crate::lexer::Span;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub name: String,
    pub stage: Stage,
    pub span: Span,
}

/// Literal value of a top-level constant, when its initializer is a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantInfo {
    pub name: String,
    pub ty: Type,
    pub value: Option<ConstValue>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgramInfo {
    pub entries: Vec<EntryPoint>,
    pub constants: Vec<ConstantInfo>,
}

/// Which entry points to use when a program declares several.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySelection {
    pub vertex: Option<String>,
    pub fragment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedEntries {
    pub vertex: String,
    pub fragment: String,
}

impl ProgramInfo {
    pub fn entries_for(&self, stage: Stage) -> impl Iterator<Item = &EntryPoint> {
        self.entries.iter().filter(move |e| e.stage == stage)
    }

    pub fn vertex_entries(&self) -> Vec<&str> {
        self.entries_for(Stage::Vertex).map(|e| e.name.as_str()).collect()
    }

    pub fn fragment_entries(&self) -> Vec<&str> {
        self.entries_for(Stage::Fragment).map(|e| e.name.as_str()).collect()
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantInfo> {
        self.constants.iter().find(|c| c.name == name)
    }

    /// Resolve exactly one vertex and one fragment entry point.
    ///
    /// An explicit name must match a declared entry of that stage. Without
    /// one the stage must have exactly one candidate; ambiguity is reported
    /// with every candidate named.
    pub fn select_entries(&self, selection: &EntrySelection) -> Result<SelectedEntries, Vec<Diagnostic>> {
        let vertex = self.select_stage(Stage::Vertex, selection.vertex.as_deref());
        let fragment = self.select_stage(Stage::Fragment, selection.fragment.as_deref());
        match (vertex, fragment) {
            (Ok(vertex), Ok(fragment)) => Ok(SelectedEntries { vertex, fragment }),
            (vertex, fragment) => Err(vertex.err().into_iter().chain(fragment.err()).collect()),
        }
    }

    fn select_stage(&self, stage: Stage, requested: Option<&str>) -> Result<String, Diagnostic> {
        let candidates: Vec<&EntryPoint> = self.entries_for(stage).collect();
        let listed = candidates
            .iter()
            .map(|e| format!("'{}'", e.name))
            .collect::<Vec<_>>()
            .join(", ");

        if let Some(name) = requested {
            return match candidates.iter().find(|e| e.name == name) {
                Some(entry) => Ok(entry.name.clone()),
                None if candidates.is_empty() => Err(Diagnostic::error(
                    format!("no {} entry point named '{}'; the program declares none", stage, name),
                    Span::default(),
                )),
                None => Err(Diagnostic::error(
                    format!("no {} entry point named '{}' (available: {})", stage, name, listed),
                    Span::default(),
                )),
            };
        }

        match candidates.as_slice() {
            [] => Err(Diagnostic::error(
                format!("no {} entry point found; declare one with (defn {} ...)", stage, stage),
                Span::default(),
            )),
            [only] => Ok(only.name.clone()),
            [_, second, ..] => Err(Diagnostic::error(
                format!(
                    "multiple {} entry points found: {}; use '--{}' to specify one",
                    stage, listed, stage
                ),
                second.span,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(entries: &[(&str, Stage)]) -> ProgramInfo {
        ProgramInfo {
            entries: entries
                .iter()
                .map(|(name, stage)| EntryPoint {
                    name: name.to_string(),
                    stage: *stage,
                    span: Span::default(),
                })
                .collect(),
            constants: Vec::new(),
        }
    }

    #[test]
    fn test_single_candidates_selected() {
        let info = info(&[("vert", Stage::Vertex), ("frag", Stage::Fragment)]);
        let selected = info.select_entries(&EntrySelection::default()).unwrap();
        assert_eq!(selected.vertex, "vert");
        assert_eq!(selected.fragment, "frag");
    }

    #[test]
    fn test_ambiguous_fragment_names_all_candidates() {
        let info = info(&[("vert", Stage::Vertex), ("a", Stage::Fragment), ("b", Stage::Fragment)]);
        let diags = info.select_entries(&EntrySelection::default()).unwrap_err();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("multiple fragment entry points"));
        assert!(diags[0].message.contains("'a'"));
        assert!(diags[0].message.contains("'b'"));
        assert!(diags[0].message.contains("--fragment"));
    }

    #[test]
    fn test_explicit_selection_resolves_ambiguity() {
        let info = info(&[("vert", Stage::Vertex), ("a", Stage::Fragment), ("b", Stage::Fragment)]);
        let selection = EntrySelection {
            vertex: None,
            fragment: Some("b".into()),
        };
        assert_eq!(info.select_entries(&selection).unwrap().fragment, "b");
    }

    #[test]
    fn test_unknown_explicit_name() {
        let info = info(&[("vert", Stage::Vertex), ("frag", Stage::Fragment)]);
        let selection = EntrySelection {
            vertex: Some("nope".into()),
            fragment: None,
        };
        let diags = info.select_entries(&selection).unwrap_err();
        assert!(diags[0].message.contains("'nope'"));
        assert!(diags[0].message.contains("'vert'"));
    }

    #[test]
    fn test_missing_both_stages() {
        let diags = info(&[]).select_entries(&EntrySelection::default()).unwrap_err();
        assert_eq!(diags.len(), 2);
    }
}
