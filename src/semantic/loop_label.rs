//! Loop labeling (spec.md §4.3, C5.c).
//!
//! Runs after identifier resolution, before type checking. Walks the tree
//! carrying the label of the innermost enclosing loop; every `While`,
//! `DoWhile`, and `For` mints its own unique label and stamps it into its
//! `label` field, and every `Break`/`Continue` is stamped with whatever
//! label is currently in scope, or rejected if there is none.

use crate::ast::*;
use crate::diagnostics::ContextStack;
use crate::name_gen::NameGenerator;
use crate::semantic::error::{SemanticError, SemanticErrorKind};

type LResult<T> = Result<T, SemanticError>;

pub struct LoopLabeler<'a> {
    name_gen: &'a NameGenerator,
    current: Option<String>,
    ctx: ContextStack,
}

impl<'a> LoopLabeler<'a> {
    pub fn new(name_gen: &'a NameGenerator) -> Self {
        LoopLabeler {
            name_gen,
            current: None,
            ctx: ContextStack::new(),
        }
    }

    fn err(&self, kind: SemanticErrorKind, loc: &crate::diagnostics::SourceLocation, message: impl Into<String>) -> SemanticError {
        SemanticError {
            kind,
            location: loc.clone(),
            message: message.into(),
            context: self.ctx.render(),
        }
    }

    #[tracing::instrument(skip(self, program))]
    pub fn label_program(&mut self, program: &mut Program) -> LResult<()> {
        let _g = self.ctx.push("program");
        for decl in &mut program.declarations {
            if let Declaration::Function(f) = decl {
                if let Some(body) = &mut f.body {
                    self.label_block(body)?;
                }
            }
        }
        Ok(())
    }

    fn label_block(&mut self, block: &mut Block) -> LResult<()> {
        for item in &mut block.items {
            if let BlockItem::Statement(stmt) = item {
                self.label_statement(stmt)?;
            }
        }
        Ok(())
    }

    /// Enter a freshly labeled loop body: swap in the new label, run `f`,
    /// then restore whatever label was active before, regardless of how
    /// `f` returns.
    fn with_loop_label<T>(&mut self, hint: &str, f: impl FnOnce(&mut Self, &str) -> LResult<T>) -> LResult<(T, String)> {
        let label = self.name_gen.make_label(hint);
        let previous = std::mem::replace(&mut self.current, Some(label.clone()));
        let result = f(self, &label);
        self.current = previous;
        result.map(|t| (t, label))
    }

    fn label_statement(&mut self, stmt: &mut Statement) -> LResult<()> {
        match stmt {
            Statement::Break(label) => {
                *label = Some(self.current.clone().ok_or_else(|| {
                    self.err(
                        SemanticErrorKind::BreakOutsideLoop,
                        &crate::diagnostics::SourceLocation::synthetic(),
                        "'break' statement not in a loop",
                    )
                })?);
                Ok(())
            }
            Statement::Continue(label) => {
                *label = Some(self.current.clone().ok_or_else(|| {
                    self.err(
                        SemanticErrorKind::ContinueOutsideLoop,
                        &crate::diagnostics::SourceLocation::synthetic(),
                        "'continue' statement not in a loop",
                    )
                })?);
                Ok(())
            }
            Statement::While { body, label, .. } => {
                let (_, own_label) = self.with_loop_label("while", |this, _| this.label_statement(body))?;
                *label = Some(own_label);
                Ok(())
            }
            Statement::DoWhile { body, label, .. } => {
                let (_, own_label) = self.with_loop_label("do_while", |this, _| this.label_statement(body))?;
                *label = Some(own_label);
                Ok(())
            }
            Statement::For { body, label, .. } => {
                let (_, own_label) = self.with_loop_label("for", |this, _| this.label_statement(body))?;
                *label = Some(own_label);
                Ok(())
            }
            Statement::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.label_statement(then_branch)?;
                if let Some(e) = else_branch {
                    self.label_statement(e)?;
                }
                Ok(())
            }
            Statement::Compound(block) => self.label_block(block),
            Statement::Return(_) | Statement::Expression(_) | Statement::Null => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic::resolver::Resolver;

    fn label(src: &str) -> Result<Program, SemanticError> {
        let tokens = Lexer::new(src, std::path::PathBuf::from("t.c")).tokenize().unwrap();
        let mut program = Parser::new(tokens).parse_program().unwrap();
        let gen = NameGenerator::new();
        Resolver::new(&gen).resolve_program(&mut program).unwrap();
        LoopLabeler::new(&gen).label_program(&mut program)?;
        Ok(program)
    }

    #[test]
    fn nested_loops_get_distinct_labels() {
        let program = label(
            "int main(void) { while (1) { while (1) { break; } break; } return 0; }",
        )
        .unwrap();
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let BlockItem::Statement(Statement::While { label: outer, body, .. }) =
            &f.body.as_ref().unwrap().items[0]
        else {
            panic!()
        };
        let Statement::Compound(inner_block) = body.as_ref() else {
            panic!()
        };
        let BlockItem::Statement(Statement::While { label: inner, .. }) = &inner_block.items[0] else {
            panic!()
        };
        assert_ne!(outer, inner);
    }

    #[test]
    fn rejects_break_outside_loop() {
        let err = label("int main(void) { break; return 0; }").unwrap_err();
        assert_eq!(err.kind, SemanticErrorKind::BreakOutsideLoop);
    }

    #[test]
    fn continue_inherits_innermost_label() {
        let program = label("int main(void) { for (;;) { continue; } return 0; }").unwrap();
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let BlockItem::Statement(Statement::For { label, body, .. }) = &f.body.as_ref().unwrap().items[0] else {
            panic!()
        };
        let Statement::Compound(inner) = body.as_ref() else {
            panic!()
        };
        let BlockItem::Statement(Statement::Continue(c_label)) = &inner.items[0] else {
            panic!()
        };
        assert_eq!(label, c_label);
    }
}
