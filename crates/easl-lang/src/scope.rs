//! Lexically nested symbol tables.
//!
//! Each frame borrows its parent, so a child scope lives exactly as long as
//! the expression that introduced it.

use std::collections::HashMap;

use crate::lexer::Span;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Runtime-provided uniform (`resolution`, `time`).
    Uniform,
    Constant,
    Function,
    Param,
    Local,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Default)]
pub struct Scope<'p> {
    bindings: HashMap<String, Symbol>,
    parent: Option<&'p Scope<'p>>,
}

impl<'p> Scope<'p> {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
            parent: None,
        }
    }

    /// A new empty frame whose lookups fall back to `self`.
    pub fn child(&self) -> Scope<'_> {
        Scope {
            bindings: HashMap::new(),
            parent: Some(self),
        }
    }

    /// Bind `name` in this frame, shadowing any outer binding. Returns the
    /// symbol previously bound in this same frame, if any.
    pub fn insert(&mut self, name: impl Into<String>, symbol: Symbol) -> Option<Symbol> {
        self.bindings.insert(name.into(), symbol)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        match self.bindings.get(name) {
            Some(symbol) => Some(symbol),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<&Symbol> {
        self.bindings.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(ty: Type) -> Symbol {
        Symbol {
            kind: SymbolKind::Local,
            ty,
            span: Span::default(),
        }
    }

    #[test]
    fn test_child_shadows_parent() {
        let mut root = Scope::new();
        root.insert("x", local(Type::F32));
        {
            let mut inner = root.child();
            assert_eq!(inner.lookup("x").map(|s| s.ty.clone()), Some(Type::F32));
            inner.insert("x", local(Type::I32));
            assert_eq!(inner.lookup("x").map(|s| s.ty.clone()), Some(Type::I32));
            assert!(inner.lookup_local("x").is_some());
        }
        assert_eq!(root.lookup("x").map(|s| s.ty.clone()), Some(Type::F32));
    }

    #[test]
    fn test_missing_name() {
        let root = Scope::new();
        let inner = root.child();
        assert!(inner.lookup("nope").is_none());
    }
}
