//! Source locations and diagnostic formatting.
//!
//! Every token and AST node carries a [`SourceLocation`] so errors can point
//! at a precise file/line/col instead of just "somewhere in function foo".
//! [`ContextStack`] accumulates a trail of frame descriptions as passes
//! descend into expressions/statements/functions, so a raised error can be
//! augmented with "in expression … in statement … in function foo" the way
//! the original parse/semantic layers do.

use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A single point (or short span) in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: Rc<PathBuf>,
    pub line: usize,
    pub col: usize,
}

impl SourceLocation {
    pub fn new(file: Rc<PathBuf>, line: usize, col: usize) -> Self {
        SourceLocation { file, line, col }
    }

    /// A placeholder location for compiler-synthesized nodes that have no
    /// direct source text (e.g. an implicit trailing `return 0;`).
    pub fn synthetic() -> Self {
        SourceLocation {
            file: Rc::new(PathBuf::from("<synthetic>")),
            line: 0,
            col: 0,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.col)
    }
}

/// A stack of human-readable frame descriptions, pushed as a pass descends
/// into nested syntax ("in function foo", "in statement ...", "in expression
/// ...") and popped on the way back out. Mirrors `context_stack_provider.h`
/// from the original compiler: a scoped guard, not manual push/pop pairs.
#[derive(Debug, Default, Clone)]
pub struct ContextStack {
    frames: Rc<RefCell<Vec<String>>>,
}

impl ContextStack {
    pub fn new() -> Self {
        ContextStack::default()
    }

    /// Push a frame and return a guard that pops it on drop. Using the
    /// guard from a `let _guard = ...;` binding gives strictly nested
    /// acquire/release discipline even across early returns via `?`.
    #[must_use]
    pub fn push(&self, description: impl Into<String>) -> ContextGuard {
        self.frames.borrow_mut().push(description.into());
        ContextGuard {
            frames: Rc::clone(&self.frames),
        }
    }

    /// Render the current stack as "in X in Y in Z", innermost first.
    pub fn render(&self) -> String {
        self.frames
            .borrow()
            .iter()
            .rev()
            .map(|f| format!("in {f}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Pops its frame when dropped; never pop manually.
pub struct ContextGuard {
    frames: Rc<RefCell<Vec<String>>>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.frames.borrow_mut().pop();
    }
}

/// Format a diagnostic message combining a location, a message, and whatever
/// context frames are still on the stack at the point of the error.
pub fn format_diagnostic(loc: &SourceLocation, message: &str, ctx: &ContextStack) -> String {
    let context = ctx.render();
    if context.is_empty() {
        format!("{loc}: {message}")
    } else {
        format!("{loc}: {message} ({context})")
    }
}

/// Non-fatal diagnostics (numeric-conversion warnings, per spec.md §7).
/// Warnings never change program semantics; they are collected through this
/// sink so callers (tests, the CLI, `--deny-warnings` policies) can inspect
/// or silence them independent of the pass that raised them.
#[derive(Debug, Default, Clone)]
pub struct WarningManager {
    warnings: Rc<RefCell<Vec<Warning>>>,
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub location: SourceLocation,
    pub message: String,
}

impl WarningManager {
    pub fn new() -> Self {
        WarningManager::default()
    }

    pub fn warn(&self, location: SourceLocation, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%location, "{message}");
        self.warnings.borrow_mut().push(Warning { location, message });
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.borrow().is_empty()
    }
}

/// Helper for tests and small binaries that need a location without a real
/// file on disk.
pub fn fake_path(name: &str) -> Rc<PathBuf> {
    Rc::new(PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_stack_nests_and_unwinds() {
        let stack = ContextStack::new();
        assert_eq!(stack.render(), "");
        let _outer = stack.push("function foo");
        {
            let _inner = stack.push("statement return");
            assert_eq!(stack.render(), "in statement return in function foo");
        }
        assert_eq!(stack.render(), "in function foo");
    }

    #[test]
    fn warning_manager_collects() {
        let wm = WarningManager::new();
        let loc = SourceLocation::new(fake_path("t.c"), 3, 1);
        wm.warn(loc.clone(), "implicit conversion loses precision");
        assert_eq!(wm.warnings().len(), 1);
        assert!(!wm.is_empty());
    }
}
