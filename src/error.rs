//! Top-level error umbrella (spec.md §7).
//!
//! Each pass raises its own small error type — [`crate::lexer::LexError`],
//! [`crate::parser::ParseError`], [`crate::semantic::error::AnalysisError`] —
//! so the pass that detects a problem can say precisely what went wrong.
//! This is where they converge: [`crate::compile_file`] returns one
//! `Result<_, CompileError>` so `?` can thread through the whole pipeline
//! without every stage having to know about every other stage's error type.

use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::semantic::error::AnalysisError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Analysis(AnalysisError),
    /// A failure shelling out to the preprocessor, assembler, or linker —
    /// these live outside the pipeline proper (spec.md §6) so they carry
    /// only a message, not a source location.
    Driver(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "{e}"),
            CompileError::Parse(e) => write!(f, "{e}"),
            CompileError::Analysis(e) => write!(f, "{e}"),
            CompileError::Driver(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError::Lex(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<AnalysisError> for CompileError {
    fn from(e: AnalysisError) -> Self {
        CompileError::Analysis(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::fake_path;
    use crate::diagnostics::SourceLocation;

    #[test]
    fn lex_error_converts_and_displays_location() {
        let loc = SourceLocation::new(fake_path("t.c"), 2, 5);
        let err: CompileError = LexError {
            location: loc,
            message: "no matching token for '`'".into(),
        }
        .into();
        let rendered = err.to_string();
        assert!(rendered.contains("t.c:2:5"));
        assert!(rendered.contains("no matching token"));
    }

    #[test]
    fn driver_error_is_message_only() {
        let err = CompileError::Driver("cc exited with status 1".into());
        assert_eq!(err.to_string(), "cc exited with status 1");
    }
}
