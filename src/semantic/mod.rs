//! Semantic analysis (spec.md §4, C5): identifier resolution, type
//! checking, and loop labeling, run in that order over the parsed tree.

pub mod error;
pub mod loop_label;
pub mod resolver;
pub mod typecheck;

use crate::ast::Program;
use crate::diagnostics::WarningManager;
use crate::name_gen::NameGenerator;
use crate::symbol_table::SymbolTable;
use error::AnalysisError;
use loop_label::LoopLabeler;
use resolver::Resolver;
use typecheck::TypeChecker;

/// Run the full C5 pipeline over `program` in place, returning the
/// populated symbol table on success.
#[tracing::instrument(skip(program, name_gen, warnings))]
pub fn analyze(
    program: &mut Program,
    name_gen: &NameGenerator,
    warnings: &WarningManager,
) -> Result<SymbolTable, AnalysisError> {
    Resolver::new(name_gen).resolve_program(program)?;
    LoopLabeler::new(name_gen).label_program(program)?;
    let mut symbols = SymbolTable::new();
    TypeChecker::new(&mut symbols, warnings).check_program(program)?;
    Ok(symbols)
}
