//! The symbol table (spec.md §3 "Symbol table", C2).
//!
//! An owned map, not a singleton — each compilation constructs its own
//! table and threads it through the passes that need it, so tests can seed
//! contents directly and concurrent compilations never share state (§5).

use crate::types::Type;
use std::collections::HashMap;

/// What a file-scope static's initializer looks like once the initializer
/// expression has been constant-folded to the declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticInit {
    /// No initializer was seen yet; becomes zero at the end of translation
    /// unless some other declaration of the same name wins.
    Tentative,
    /// A constant initializer, already converted to the declared type.
    Initial(InitialValue),
    /// `extern` declaration with no initializer: storage lives elsewhere.
    NoInit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialValue {
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Double(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Function { defined: bool, global: bool },
    Static { initializer: StaticInit, global: bool },
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    pub ty: Type,
    pub attribute: Attribute,
}

/// Errors a caller can hit mutating the table outside what the semantic
/// passes already guard against (e.g. unit tests poking at it directly).
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTableError(pub String);

impl std::fmt::Display for SymbolTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SymbolTableError {}

#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    entries: HashMap<String, SymbolEntry>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Insert a brand-new entry. Once inserted an entry may be refined
    /// (e.g. `Function { defined: false, .. }` -> `defined: true`) via
    /// [`SymbolTable::refine`], but its `ty` never changes through this path.
    pub fn insert(&mut self, name: impl Into<String>, entry: SymbolEntry) {
        self.entries.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Replace an existing entry's attribute in place, keeping its type.
    /// Returns an error if the type would change (violates the "never
    /// type-changed" invariant from spec.md §3) or the name is unknown.
    pub fn refine(&mut self, name: &str, ty: &Type, attribute: Attribute) -> Result<(), SymbolTableError> {
        match self.entries.get_mut(name) {
            Some(entry) => {
                if entry.ty != *ty {
                    return Err(SymbolTableError(format!(
                        "cannot change the type of '{name}' across declarations"
                    )));
                }
                entry.attribute = attribute;
                Ok(())
            }
            None => Err(SymbolTableError(format!("unknown symbol '{name}'"))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SymbolEntry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_refine_preserves_type() {
        let mut table = SymbolTable::new();
        table.insert(
            "f",
            SymbolEntry {
                ty: Type::function(Type::Int32, vec![]),
                attribute: Attribute::Function {
                    defined: false,
                    global: true,
                },
            },
        );
        table
            .refine(
                "f",
                &Type::function(Type::Int32, vec![]),
                Attribute::Function {
                    defined: true,
                    global: true,
                },
            )
            .unwrap();
        assert_eq!(
            table.get("f").unwrap().attribute,
            Attribute::Function {
                defined: true,
                global: true
            }
        );
    }

    #[test]
    fn refine_rejects_type_change() {
        let mut table = SymbolTable::new();
        table.insert(
            "x",
            SymbolEntry {
                ty: Type::Int32,
                attribute: Attribute::Local,
            },
        );
        let result = table.refine("x", &Type::Int64, Attribute::Local);
        assert!(result.is_err());
    }
}
