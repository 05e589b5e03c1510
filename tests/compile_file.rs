//! Full pipeline through the system preprocessor and assembler/linker.
//! Requires a working `cc` on PATH, so these are `#[ignore]`d by default;
//! run with `cargo test -- --ignored` on a machine with a C toolchain.

use ccx64::{CompilerConfig, StopStage};
use std::process::Command;

#[test]
#[ignore = "requires system cc toolchain"]
fn compiles_and_runs_a_constant_return() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("ret2.c");
    std::fs::write(&source, "int main(void) { return 2; }\n").unwrap();

    let config = CompilerConfig::new();
    ccx64::compile_file(&source, &config).expect("full compilation should succeed");

    let executable = source.with_extension("");
    let status = Command::new(&executable).status().expect("built binary should run");
    assert_eq!(status.code(), Some(2));
}

#[test]
#[ignore = "requires system cc toolchain"]
fn stop_stage_assembly_leaves_an_s_file_without_linking() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("noop.c");
    std::fs::write(&source, "int main(void) { return 0; }\n").unwrap();

    let config = CompilerConfig::new().with_stop_stage(StopStage::Assembly);
    ccx64::compile_file(&source, &config).expect("assembly-only compilation should succeed");

    assert!(source.with_extension("s").exists());
    assert!(!source.with_extension("").exists());
}
