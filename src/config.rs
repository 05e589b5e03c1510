//! Compiler configuration (SPEC_FULL.md §2.3).
//!
//! Mirrors the teacher's `CompilerConfig`: a builder-style struct with a
//! `Default` impl, rather than a pile of function parameters threaded
//! through every driver call.

use serde::Deserialize;
use std::path::PathBuf;

/// Where to stop the pipeline, matching `--lex`/`--parse`/`--validate`/
/// `--tacky`/`--codegen`/`-S`/no-flag from spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopStage {
    /// `--lex`: tokenize only.
    Lex,
    /// `--parse`: tokenize and parse.
    Parse,
    /// `--validate`: run semantic analysis (C5.a–c), discard the result.
    Validate,
    /// `--tacky`: lower to three-address IR (C7).
    Tacky,
    /// `--codegen`: lower to target IR, through legalization (C9–C11).
    Codegen,
    /// `-S`: emit assembly text but do not assemble or link.
    Assembly,
    /// No flag: assemble and link to a native executable.
    #[default]
    Full,
}

/// Builder-style configuration for one compilation, matching the shape of
/// the teacher's `CompilerConfig`.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub stop_stage: StopStage,
    /// Keep the generated `.s` file around after assembling it into a
    /// binary (it is always written when `stop_stage` is `Assembly` or
    /// earlier; this only matters for `Full`).
    pub keep_assembly: bool,
    /// Name of the assembler/linker front end to invoke. Defaults to `cc`,
    /// matching spec.md §6's "system assembler/linker".
    pub assembler_linker: String,
    /// Extra arguments forwarded verbatim to the assembler/linker
    /// invocation, e.g. `-lm` to link the math library.
    pub extra_linker_args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            stop_stage: StopStage::default(),
            keep_assembly: false,
            assembler_linker: "cc".to_string(),
            extra_linker_args: Vec::new(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn with_stop_stage(mut self, stage: StopStage) -> Self {
        self.stop_stage = stage;
        self
    }

    pub fn with_keep_assembly(mut self, keep: bool) -> Self {
        self.keep_assembly = keep;
        self
    }

    pub fn with_assembler_linker(mut self, binary: impl Into<String>) -> Self {
        self.assembler_linker = binary.into();
        self
    }

    pub fn with_linker_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_linker_args.push(arg.into());
        self
    }

    pub fn with_linker_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_linker_args.extend(args);
        self
    }

    /// Overlay settings from a `ccx64.toml` file onto this config. Only
    /// fields present in the file are changed, the way a project-level
    /// override is expected to layer on top of CLI-derived defaults.
    pub fn merge_toml(mut self, toml_str: &str) -> Result<Self, String> {
        let file: FileConfig =
            toml::from_str(toml_str).map_err(|e| format!("failed to parse ccx64.toml: {e}"))?;
        if let Some(binary) = file.assembler_linker {
            self.assembler_linker = binary;
        }
        if let Some(keep) = file.keep_assembly {
            self.keep_assembly = keep;
        }
        if let Some(args) = file.extra_linker_args {
            self.extra_linker_args.extend(args);
        }
        Ok(self)
    }
}

/// The subset of [`CompilerConfig`] that can come from a `ccx64.toml` file.
/// `stop_stage` is deliberately excluded: it is always a CLI-session
/// decision (spec.md §6's `--lex`/`--parse`/...), never a project default.
#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    assembler_linker: Option<String>,
    keep_assembly: Option<bool>,
    extra_linker_args: Option<Vec<String>>,
}

/// Paths the driver writes or reads for one compilation, derived from the
/// input `.c` path unless overridden.
#[derive(Debug, Clone)]
pub struct CompilationPaths {
    pub source: PathBuf,
    pub preprocessed: PathBuf,
    pub assembly: PathBuf,
    pub executable: PathBuf,
}

impl CompilationPaths {
    pub fn from_source(source: &std::path::Path) -> Self {
        CompilationPaths {
            source: source.to_path_buf(),
            preprocessed: source.with_extension("i"),
            assembly: source.with_extension("s"),
            executable: source.with_extension(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_runs_to_full_compilation() {
        let config = CompilerConfig::default();
        assert_eq!(config.stop_stage, StopStage::Full);
        assert_eq!(config.assembler_linker, "cc");
        assert!(config.extra_linker_args.is_empty());
    }

    #[test]
    fn builder_chain_overrides_defaults() {
        let config = CompilerConfig::new()
            .with_stop_stage(StopStage::Assembly)
            .with_assembler_linker("gcc")
            .with_linker_arg("-lm");
        assert_eq!(config.stop_stage, StopStage::Assembly);
        assert_eq!(config.assembler_linker, "gcc");
        assert_eq!(config.extra_linker_args, vec!["-lm"]);
    }

    #[test]
    fn toml_overlay_only_changes_present_fields() {
        let config = CompilerConfig::new()
            .with_assembler_linker("cc")
            .merge_toml("assembler_linker = \"gcc\"\nextra_linker_args = [\"-lm\"]\n")
            .unwrap();
        assert_eq!(config.assembler_linker, "gcc");
        assert_eq!(config.extra_linker_args, vec!["-lm"]);
        assert_eq!(config.stop_stage, StopStage::Full);
    }

    #[test]
    fn derives_sibling_paths_from_source() {
        let paths = CompilationPaths::from_source(std::path::Path::new("/tmp/prog.c"));
        assert_eq!(paths.preprocessed, std::path::PathBuf::from("/tmp/prog.i"));
        assert_eq!(paths.assembly, std::path::PathBuf::from("/tmp/prog.s"));
        assert_eq!(paths.executable, std::path::PathBuf::from("/tmp/prog"));
    }
}
