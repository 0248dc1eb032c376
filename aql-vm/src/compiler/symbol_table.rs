//! Lexical scope tracking and free-variable capture.
//!
//! One table per function body; the root table holds globals. Resolution
//! walks outward, and an outward hit on a local marks it captured and
//! installs a forwarding `Free` entry in every intervening table, so that
//! the innermost table's ordered free list is exactly the capture set of
//! the function being compiled.

use hashbrown::HashMap;

/// Scope kind of a resolved symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolScope {
    /// Top-level binding, addressed through the global table.
    Global,
    /// Function-local binding, pinned to its register index.
    Local,
    /// Variable resolved in an enclosing function, addressed through the
    /// closure's up-value list.
    Free,
    /// Embedder-registered name occupying a reserved global slot.
    Builtin,
}

/// A resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Source spelling.
    pub name: String,
    /// Scope kind.
    pub scope: SymbolScope,
    /// Index within the scope: register for locals, global slot for
    /// globals and builtins, up-value position for free symbols.
    pub index: usize,
    /// Defined with `const`; assignment is rejected.
    pub is_const: bool,
    /// A local that some inner function captured.
    pub captured: bool,
}

/// One lexical scope level.
#[derive(Debug, Default)]
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    free: Vec<Symbol>,
    outer: Option<Box<SymbolTable>>,
    num_definitions: usize,
}

impl SymbolTable {
    /// A fresh scope enclosed by `outer`.
    pub fn enclosed(outer: SymbolTable) -> Self {
        Self {
            outer: Some(Box::new(outer)),
            ..Self::default()
        }
    }

    /// Whether this is the root (global) table.
    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    /// Number of definitions made directly in this scope.
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    /// Ordered free symbols accumulated by resolution, as they appear in
    /// the enclosing scope.
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free
    }

    /// Dissolve the table into its enclosing table and free list.
    pub fn pop(self) -> (Option<SymbolTable>, Vec<Symbol>) {
        (self.outer.map(|outer| *outer), self.free)
    }

    /// Define `name` in this scope, reusing the index of an existing
    /// definition of the same name.
    pub fn define(&mut self, name: &str, is_const: bool) -> Symbol {
        let scope = if self.is_global() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };

        if let Some(existing) = self.store.get_mut(name) {
            if existing.scope == scope {
                existing.is_const = is_const;
                return existing.clone();
            }
        }

        let symbol = Symbol {
            name: name.into(),
            scope,
            index: self.num_definitions,
            is_const,
            captured: false,
        };

        self.num_definitions += 1;
        self.store.insert(name.into(), symbol.clone());

        symbol
    }

    /// Reserve a builtin slot in the root table. Builtins share the global
    /// index space and are never assignable.
    pub fn define_builtin(&mut self, name: &str) -> Symbol {
        debug_assert!(self.is_global(), "builtins live in the root table");

        let symbol = Symbol {
            name: name.into(),
            scope: SymbolScope::Builtin,
            index: self.num_definitions,
            is_const: true,
            captured: false,
        };

        self.num_definitions += 1;
        self.store.insert(name.into(), symbol.clone());

        symbol
    }

    /// Resolve `name`, walking outward.
    ///
    /// Crossing a function boundary onto a local marks that local captured
    /// and installs a forwarding `Free` entry here; the returned symbol is
    /// always addressable from this scope.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let outer = self.outer.as_mut()?;
        let symbol = outer.resolve(name)?;

        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            SymbolScope::Local | SymbolScope::Free => {
                if symbol.scope == SymbolScope::Local {
                    outer.mark_captured(name);
                }

                Some(self.define_free(symbol))
            }
        }
    }

    fn mark_captured(&mut self, name: &str) {
        if let Some(symbol) = self.store.get_mut(name) {
            symbol.captured = true;
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free.len(),
            is_const: original.is_const,
            captured: false,
        };

        self.free.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());

        symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_globals_at_the_root_and_locals_inside() {
        let mut root = SymbolTable::default();
        let g = root.define("g", false);
        assert_eq!((g.scope, g.index), (SymbolScope::Global, 0));

        let mut inner = SymbolTable::enclosed(root);
        let l = inner.define("l", false);
        assert_eq!((l.scope, l.index), (SymbolScope::Local, 0));
    }

    #[test]
    fn redefinition_reuses_the_index() {
        let mut root = SymbolTable::default();
        let first = root.define("x", false);
        let second = root.define("x", true);

        assert_eq!(first.index, second.index);
        assert!(second.is_const);
        assert_eq!(root.num_definitions(), 1);
    }

    #[test]
    fn globals_resolve_without_capturing() {
        let mut root = SymbolTable::default();
        root.define("g", false);

        let mut inner = SymbolTable::enclosed(root);
        let g = inner.resolve("g").unwrap();

        assert_eq!(g.scope, SymbolScope::Global);
        assert!(inner.free_symbols().is_empty());
    }

    #[test]
    fn capturing_a_local_marks_it_and_records_a_free_symbol() {
        let mut outer = SymbolTable::enclosed(SymbolTable::default());
        outer.define("x", false);

        let mut inner = SymbolTable::enclosed(outer);
        let x = inner.resolve("x").unwrap();

        assert_eq!((x.scope, x.index), (SymbolScope::Free, 0));
        assert_eq!(inner.free_symbols().len(), 1);
        assert_eq!(inner.free_symbols()[0].scope, SymbolScope::Local);

        let (outer, _) = inner.pop();
        let x = outer.unwrap().resolve("x").unwrap();
        assert!(x.captured);
    }

    #[test]
    fn deep_capture_forwards_through_every_intervening_table() {
        let mut level1 = SymbolTable::enclosed(SymbolTable::default());
        level1.define("x", false);

        let level2 = SymbolTable::enclosed(level1);
        let mut level3 = SymbolTable::enclosed(level2);

        let x = level3.resolve("x").unwrap();
        assert_eq!((x.scope, x.index), (SymbolScope::Free, 0));

        // The innermost free list points at level2's forwarding entry, and
        // level2's own free list points at the defining local.
        assert_eq!(level3.free_symbols()[0].scope, SymbolScope::Free);

        let (level2, _) = level3.pop();
        let level2 = level2.unwrap();
        assert_eq!(level2.free_symbols().len(), 1);
        assert_eq!(level2.free_symbols()[0].scope, SymbolScope::Local);
    }

    #[test]
    fn builtins_share_the_global_index_space() {
        let mut root = SymbolTable::default();
        let builtin = root.define_builtin("clock");
        let global = root.define("g", false);

        assert_eq!(builtin.scope, SymbolScope::Builtin);
        assert!(builtin.is_const);
        assert_eq!(builtin.index, 0);
        assert_eq!(global.index, 1);

        let mut inner = SymbolTable::enclosed(root);
        let resolved = inner.resolve("clock").unwrap();
        assert_eq!(resolved.scope, SymbolScope::Builtin);
        assert!(inner.free_symbols().is_empty());
    }

    #[test]
    fn unresolved_names_stay_unresolved() {
        let mut root = SymbolTable::default();
        assert!(root.resolve("missing").is_none());
    }
}
