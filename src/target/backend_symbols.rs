//! Backend symbol table (spec.md §3 "Backend symbol table").
//!
//! A secondary map, derived once from the main [`crate::symbol_table::SymbolTable`]
//! at the start of target generation, that the backend passes need but the
//! front end has no business knowing about (stack frame sizes, whether a
//! pseudo names a statically-allocated object).

use crate::symbol_table::{Attribute, SymbolTable};
use crate::types::Type;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendEntry {
    Object { type_width: usize, is_static: bool },
    Function { stack_frame_size: i64, defined: bool },
}

#[derive(Debug, Clone, Default)]
pub struct BackendSymbolTable {
    entries: HashMap<String, BackendEntry>,
}

impl BackendSymbolTable {
    pub fn new() -> Self {
        BackendSymbolTable::default()
    }

    /// Build the backend table from the front-end symbol table: every
    /// `Function` entry becomes a `Function { stack_frame_size: 0, .. }`
    /// (filled in later by pseudo-register assignment); every `Static`/
    /// `Local` entry becomes an `Object`.
    pub fn from_symbol_table(symbols: &SymbolTable) -> Self {
        let mut table = BackendSymbolTable::new();
        for (name, entry) in symbols.iter() {
            let backend = match &entry.attribute {
                Attribute::Function { defined, .. } => BackendEntry::Function {
                    stack_frame_size: 0,
                    defined: *defined,
                },
                Attribute::Static { .. } => BackendEntry::Object {
                    type_width: entry.ty.size(),
                    is_static: true,
                },
                Attribute::Local => BackendEntry::Object {
                    type_width: entry.ty.size(),
                    is_static: false,
                },
            };
            table.entries.insert(name.clone(), backend);
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&BackendEntry> {
        self.entries.get(name)
    }

    pub fn insert_object(&mut self, name: impl Into<String>, ty: &Type, is_static: bool) {
        self.entries.insert(
            name.into(),
            BackendEntry::Object {
                type_width: ty.size(),
                is_static,
            },
        );
    }

    pub fn is_static_object(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(BackendEntry::Object { is_static: true, .. }))
    }

    pub fn set_stack_frame_size(&mut self, function_name: &str, size: i64) {
        if let Some(BackendEntry::Function { stack_frame_size, .. }) = self.entries.get_mut(function_name) {
            *stack_frame_size = size;
        }
    }

    pub fn stack_frame_size(&self, function_name: &str) -> i64 {
        match self.entries.get(function_name) {
            Some(BackendEntry::Function { stack_frame_size, .. }) => *stack_frame_size,
            _ => 0,
        }
    }

    pub fn is_defined_function(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(BackendEntry::Function { defined: true, .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_table::{SymbolEntry, StaticInit};

    #[test]
    fn classifies_functions_and_objects() {
        let mut symbols = SymbolTable::new();
        symbols.insert(
            "main",
            SymbolEntry {
                ty: Type::function(Type::Int32, vec![]),
                attribute: Attribute::Function {
                    defined: true,
                    global: true,
                },
            },
        );
        symbols.insert(
            "counter",
            SymbolEntry {
                ty: Type::Int32,
                attribute: Attribute::Static {
                    initializer: StaticInit::Tentative,
                    global: true,
                },
            },
        );
        let backend = BackendSymbolTable::from_symbol_table(&symbols);
        assert!(backend.is_defined_function("main"));
        assert!(backend.is_static_object("counter"));
    }

    #[test]
    fn stack_frame_size_round_trips() {
        let mut backend = BackendSymbolTable::new();
        backend.entries.insert(
            "f".into(),
            BackendEntry::Function {
                stack_frame_size: 0,
                defined: true,
            },
        );
        backend.set_stack_frame_size("f", 32);
        assert_eq!(backend.stack_frame_size("f"), 32);
    }
}
