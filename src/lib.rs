//! ccx64 — a compiler for a subset of C, targeting x86-64 System V assembly.
//!
//! The pipeline (spec.md §2): source tokens → syntax tree → semantically
//! analyzed syntax tree → three-address IR → target-level assembly IR →
//! textual assembly. [`compile_source`] runs every in-process stage and
//! returns the emitted assembly text; [`compile_file`] additionally shells
//! out to the system preprocessor and assembler/linker (spec.md §6) to
//! produce a native executable.

pub mod ast;
pub mod config;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod name_gen;
pub mod parser;
pub mod semantic;
pub mod symbol_table;
pub mod target;
pub mod token;
pub mod types;

pub use config::{CompilationPaths, CompilerConfig, StopStage};
pub use error::CompileError;

use diagnostics::WarningManager;
use ir::generator::IrGenerator;
use lexer::Lexer;
use name_gen::NameGenerator;
use parser::Parser;
use std::path::{Path, PathBuf};
use target::backend_symbols::BackendSymbolTable;
use target::emitter::AssemblyEmitter;
use target::generator::TargetGenerator;
use target::legalize::Legalizer;
use target::pseudo_regs::PseudoRegisterAssigner;

/// Run the pipeline over already-preprocessed source text, stopping at
/// `config.stop_stage`. Returns the emitted assembly text for
/// `StopStage::Assembly` and `StopStage::Full`; earlier stop stages return
/// an empty string on success (the caller only cares whether the stage
/// raised an error, per spec.md §6's `--lex`/`--parse`/... contract).
#[tracing::instrument(skip(source, file, config))]
pub fn compile_source(
    source: &str,
    file: PathBuf,
    config: &CompilerConfig,
) -> Result<String, CompileError> {
    let tokens = Lexer::new(source, file).tokenize()?;
    if config.stop_stage == StopStage::Lex {
        return Ok(String::new());
    }

    let mut program = Parser::new(tokens).parse_program()?;
    if config.stop_stage == StopStage::Parse {
        return Ok(String::new());
    }

    let name_gen = NameGenerator::new();
    let warnings = WarningManager::new();
    let mut symbols = semantic::analyze(&mut program, &name_gen, &warnings)?;
    if config.stop_stage == StopStage::Validate {
        return Ok(String::new());
    }

    let ir_program = IrGenerator::new(&mut symbols, &name_gen).generate_program(&program);
    if config.stop_stage == StopStage::Tacky {
        return Ok(String::new());
    }

    let mut backend = BackendSymbolTable::from_symbol_table(&symbols);
    let mut target_program = TargetGenerator::new(&symbols, &mut backend).generate_program(&ir_program);
    PseudoRegisterAssigner::new(&mut backend).assign_program(&mut target_program);
    Legalizer::new(&backend).legalize_program(&mut target_program);
    if config.stop_stage == StopStage::Codegen {
        return Ok(String::new());
    }

    Ok(AssemblyEmitter::new().emit_program(&target_program))
}

/// Compile a `.c` source file per spec.md §6: preprocess, run the pipeline,
/// and (for `StopStage::Full`) assemble and link to a native executable
/// alongside `source_path`.
#[tracing::instrument(skip(config))]
pub fn compile_file(source_path: &Path, config: &CompilerConfig) -> Result<(), CompileError> {
    let paths = CompilationPaths::from_source(source_path);
    let preprocessed = driver::preprocess(source_path, &paths.preprocessed)?;

    let assembly = compile_source(&preprocessed, source_path.to_path_buf(), config)?;
    if !matches!(config.stop_stage, StopStage::Assembly | StopStage::Full) {
        return Ok(());
    }

    std::fs::write(&paths.assembly, &assembly)
        .map_err(|e| CompileError::Driver(format!("failed to write {}: {e}", paths.assembly.display())))?;

    if config.stop_stage == StopStage::Assembly {
        return Ok(());
    }

    driver::assemble_and_link(&paths.assembly, &paths.executable, config)?;
    if !config.keep_assembly {
        std::fs::remove_file(&paths.assembly).ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_minimal_program_to_assembly() {
        let config = CompilerConfig::new().with_stop_stage(StopStage::Assembly);
        let asm = compile_source(
            "int main(void) { return 2; }",
            PathBuf::from("t.c"),
            &config,
        )
        .unwrap();
        assert!(asm.contains(".globl main"));
        assert!(asm.contains("movl\t$2, %eax"));
    }

    #[test]
    fn stop_stage_parse_returns_before_codegen() {
        let config = CompilerConfig::new().with_stop_stage(StopStage::Parse);
        let asm = compile_source("int main(void) { return 0; }", PathBuf::from("t.c"), &config).unwrap();
        assert!(asm.is_empty());
    }

    #[test]
    fn undeclared_identifier_surfaces_as_compile_error() {
        let config = CompilerConfig::new();
        let result = compile_source("int main(void) { return y; }", PathBuf::from("t.c"), &config);
        assert!(matches!(result, Err(CompileError::Analysis(_))));
    }

    #[test]
    fn lex_error_on_unknown_character_surfaces_as_compile_error() {
        let config = CompilerConfig::new();
        let result = compile_source("int main(void) { return `; }", PathBuf::from("t.c"), &config);
        assert!(matches!(result, Err(CompileError::Lex(_))));
    }
}
