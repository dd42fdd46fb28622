// Lexical scope tree for the analyzer. Scopes live in an arena and refer
// to each other by index, which keeps the tree free of ownership cycles
// and makes positional lookup a sorted-children binary search.

use std::collections::HashMap;

use serde::Serialize;

use crate::ast::Loc;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeContext {
    Module,
    Server,
    Browser,
    Shared,
    Function,
    Block,
    Form,
}

impl ScopeContext {
    /// The canonical context tags that `context_of` resolves to.
    fn is_canonical(&self) -> bool {
        matches!(self, ScopeContext::Server | ScopeContext::Browser | ScopeContext::Shared)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Type,
    State,
    Computed,
    Component,
    Store,
    Builtin,
    Form,
    FormField,
    FormGroup,
    FormArray,
    ServerName,
}

#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
    pub mutable: bool,
    pub loc: Option<Loc>,
    pub used: bool,
    pub declared_type: Option<Type>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, ty: Type) -> Self {
        Symbol {
            name: name.into(),
            kind,
            ty,
            mutable: false,
            loc: None,
            used: false,
            declared_type: None,
        }
    }

    pub fn mutable(mut self) -> Self {
        self.mutable = true;
        self
    }

    pub fn at(mut self, loc: Loc) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn with_declared_type(mut self, ty: Type) -> Self {
        self.declared_type = Some(ty);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub context: ScopeContext,
    pub symbols: HashMap<String, Symbol>,
    pub children: Vec<ScopeId>,
    pub start: Option<Loc>,
    pub end: Option<Loc>,
}

#[derive(Debug, Default, Serialize)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>, context: ScopeContext) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent,
            context,
            symbols: HashMap::new(),
            children: Vec::new(),
            start: None,
            end: None,
        });
        if let Some(parent) = parent {
            self.scopes[parent.0].children.push(id);
        }
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0]
    }

    pub fn set_span(&mut self, id: ScopeId, start: Loc, end: Option<Loc>) {
        let scope = self.get_mut(id);
        scope.start = Some(start);
        scope.end = end;
    }

    /// Define a symbol in `scope`. A user binding may shadow a builtin of
    /// the same name; any other redefinition is rejected.
    pub fn define(&mut self, scope: ScopeId, symbol: Symbol) -> Result<(), Symbol> {
        let table = &mut self.get_mut(scope).symbols;
        if let Some(existing) = table.get(&symbol.name) {
            if existing.kind != SymbolKind::Builtin {
                return Err(existing.clone());
            }
        }
        table.insert(symbol.name.clone(), symbol);
        Ok(())
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        self.get(scope).symbols.get(name)
    }

    /// Walk the parent chain for `name`, returning the defining scope.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Symbol)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(symbol) = self.get(id).symbols.get(name) {
                return Some((id, symbol));
            }
            current = self.get(id).parent;
        }
        None
    }

    pub fn mark_used(&mut self, scope: ScopeId, name: &str) {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(symbol) = self.get_mut(id).symbols.get_mut(name) {
                symbol.used = true;
                return;
            }
            current = self.get(id).parent;
        }
    }

    /// Innermost canonical context (`server`/`browser`/`shared`), else module.
    pub fn context_of(&self, scope: ScopeId) -> ScopeContext {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if s.context.is_canonical() {
                return s.context;
            }
            current = s.parent;
        }
        ScopeContext::Module
    }

    /// Sort every scope's children by start location so positional lookup
    /// can binary-search. Called once at the end of analysis.
    pub fn sort_children(&mut self) {
        let starts: Vec<Option<(usize, usize)>> = self
            .scopes
            .iter()
            .map(|s| s.start.as_ref().map(|loc| (loc.line, loc.column)))
            .collect();
        for scope in &mut self.scopes {
            scope
                .children
                .sort_by_key(|id| starts[id.0].unwrap_or((usize::MAX, usize::MAX)));
        }
    }

    /// Find the innermost scope whose span contains `line:column`.
    /// Children are assumed sorted (see `sort_children`).
    pub fn find_scope_at_position(&self, root: ScopeId, line: usize, column: usize) -> ScopeId {
        let mut current = root;
        loop {
            let scope = self.get(current);
            let children = &scope.children;
            // Binary search for the last child starting at or before the
            // target position, then descend if its span contains it.
            let mut lo = 0usize;
            let mut hi = children.len();
            while lo < hi {
                let mid = (lo + hi) / 2;
                if self.starts_before_or_at(children[mid], line, column) {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            let mut descended = false;
            if lo > 0 {
                let candidate = children[lo - 1];
                if self.span_contains(candidate, line, column) {
                    current = candidate;
                    descended = true;
                }
            }
            if !descended {
                return current;
            }
        }
    }

    fn starts_before_or_at(&self, id: ScopeId, line: usize, column: usize) -> bool {
        match &self.get(id).start {
            Some(start) => (start.line, start.column) <= (line, column),
            None => false,
        }
    }

    fn span_contains(&self, id: ScopeId, line: usize, column: usize) -> bool {
        let scope = self.get(id);
        let after_start = match &scope.start {
            Some(start) => (start.line, start.column) <= (line, column),
            None => false,
        };
        let before_end = match &scope.end {
            Some(end) => (line, column) <= (end.line, end.column),
            None => true,
        };
        after_start && before_end
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn loc(line: usize, column: usize) -> Loc {
        Loc::new(Arc::from("test.tova"), line, column)
    }

    #[test]
    fn lookup_walks_parents_lookup_local_does_not() {
        let mut arena = ScopeArena::new();
        let root = arena.new_scope(None, ScopeContext::Module);
        let child = arena.new_scope(Some(root), ScopeContext::Block);
        arena.define(root, Symbol::new("x", SymbolKind::Variable, Type::Int)).unwrap();

        assert!(arena.lookup(child, "x").is_some());
        assert!(arena.lookup_local(child, "x").is_none());
        assert!(arena.lookup_local(root, "x").is_some());
    }

    #[test]
    fn user_binding_shadows_builtin_only() {
        let mut arena = ScopeArena::new();
        let root = arena.new_scope(None, ScopeContext::Module);
        arena.define(root, Symbol::new("len", SymbolKind::Builtin, Type::Any)).unwrap();
        assert!(arena.define(root, Symbol::new("len", SymbolKind::Variable, Type::Int)).is_ok());
        assert!(arena.define(root, Symbol::new("len", SymbolKind::Variable, Type::Int)).is_err());
    }

    #[test]
    fn context_walks_to_innermost_canonical() {
        let mut arena = ScopeArena::new();
        let root = arena.new_scope(None, ScopeContext::Module);
        let browser = arena.new_scope(Some(root), ScopeContext::Browser);
        let func = arena.new_scope(Some(browser), ScopeContext::Function);
        let block = arena.new_scope(Some(func), ScopeContext::Block);

        assert_eq!(arena.context_of(block), ScopeContext::Browser);
        assert_eq!(arena.context_of(root), ScopeContext::Module);
    }

    #[test]
    fn positional_lookup_descends_sorted_children() {
        let mut arena = ScopeArena::new();
        let root = arena.new_scope(None, ScopeContext::Module);
        let first = arena.new_scope(Some(root), ScopeContext::Block);
        let second = arena.new_scope(Some(root), ScopeContext::Block);
        arena.set_span(root, loc(1, 1), Some(loc(20, 1)));
        arena.set_span(first, loc(2, 1), Some(loc(5, 1)));
        arena.set_span(second, loc(7, 1), Some(loc(12, 1)));
        arena.sort_children();

        assert_eq!(arena.find_scope_at_position(root, 3, 4), first);
        assert_eq!(arena.find_scope_at_position(root, 8, 1), second);
        assert_eq!(arena.find_scope_at_position(root, 6, 1), root);
    }
}
