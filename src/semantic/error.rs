//! Semantic error kinds (spec.md §7).

use crate::diagnostics::SourceLocation;

#[derive(Debug, Clone, PartialEq)]
pub enum SemanticErrorKind {
    DuplicateDeclaration,
    UndeclaredIdentifier,
    InvalidLValue,
    IncompatibleRedeclaration,
    DefineAtLocalScope,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ArgumentCountMismatch,
    UseVariableAsFunction,
    UseFunctionAsVariable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub location: SourceLocation,
    pub message: String,
    pub context: String,
}

impl std::fmt::Display for SemanticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}: {:?}: {}", self.location, self.kind, self.message)
        } else {
            write!(
                f,
                "{}: {:?}: {} ({})",
                self.location, self.kind, self.message, self.context
            )
        }
    }
}

impl std::error::Error for SemanticError {}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub location: SourceLocation,
    pub message: String,
    pub context: String,
}

impl std::fmt::Display for TypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}: {}", self.location, self.message)
        } else {
            write!(f, "{}: {} ({})", self.location, self.message, self.context)
        }
    }
}

impl std::error::Error for TypeError {}

/// Raised when a pass reaches a branch spec.md declares unreachable (e.g.
/// an unknown IR variant surfacing in the target generator). Must never be
/// triggered by user input — if it fires, it is a bug in this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalCompilerError(pub String);

impl std::fmt::Display for InternalCompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "internal compiler error: {}", self.0)
    }
}

impl std::error::Error for InternalCompilerError {}

/// Umbrella over the two error shapes the semantic passes raise, so a
/// single `?` can flow through `TypeChecker` methods that mix scoping
/// mistakes (duplicate/undeclared/arity) with genuine type errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    Semantic(SemanticError),
    Type(TypeError),
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::Semantic(e) => write!(f, "{e}"),
            AnalysisError::Type(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<SemanticError> for AnalysisError {
    fn from(e: SemanticError) -> Self {
        AnalysisError::Semantic(e)
    }
}

impl From<TypeError> for AnalysisError {
    fn from(e: TypeError) -> Self {
        AnalysisError::Type(e)
    }
}
