//! Identifier resolution (spec.md §4.1, C5.a).
//!
//! Walks the tree with a scope map from source name to
//! `{renamed_name, from_current_scope, has_linkage}`. Declarations mint a
//! unique renamed identifier via the name generator; uses of a name look it
//! up and overwrite the identifier in place with its renamed form.
//! Entering a block/function body/`for` header pushes a scope frame that
//! is restored on exit through a strictly-nested RAII guard — no path out
//! of a scope (including an early `?` return) can skip the restore.

use crate::ast::*;
use crate::diagnostics::ContextStack;
use crate::name_gen::NameGenerator;
use crate::semantic::error::{SemanticError, SemanticErrorKind};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct MapEntry {
    renamed_name: String,
    from_current_scope: bool,
    has_linkage: bool,
}

pub struct Resolver<'a> {
    name_gen: &'a NameGenerator,
    map: HashMap<String, MapEntry>,
    saved: Vec<HashMap<String, MapEntry>>,
    ctx: ContextStack,
}

type RResult<T> = Result<T, SemanticError>;

impl<'a> Resolver<'a> {
    pub fn new(name_gen: &'a NameGenerator) -> Self {
        Resolver {
            name_gen,
            map: HashMap::new(),
            saved: Vec::new(),
            ctx: ContextStack::new(),
        }
    }

    #[tracing::instrument(skip(self, program))]
    pub fn resolve_program(&mut self, program: &mut Program) -> RResult<()> {
        let _g = self.ctx.push("program");
        for decl in &mut program.declarations {
            self.resolve_file_scope_declaration(decl)?;
        }
        Ok(())
    }

    fn err(&self, kind: SemanticErrorKind, loc: &crate::diagnostics::SourceLocation, message: impl Into<String>) -> SemanticError {
        SemanticError {
            kind,
            location: loc.clone(),
            message: message.into(),
            context: self.ctx.render(),
        }
    }

    fn enter_scope(&mut self) {
        let mut new_map = self.map.clone();
        for entry in new_map.values_mut() {
            entry.from_current_scope = false;
        }
        self.saved.push(std::mem::replace(&mut self.map, new_map));
    }

    fn exit_scope(&mut self) {
        self.map = self
            .saved
            .pop()
            .expect("InternalCompilerError: scope stack underflow");
    }

    fn resolve_file_scope_declaration(&mut self, decl: &mut Declaration) -> RResult<()> {
        match decl {
            Declaration::Variable(v) => {
                // File-scope variables have linkage and are not renamed.
                self.map.insert(
                    v.name.clone(),
                    MapEntry {
                        renamed_name: v.name.clone(),
                        from_current_scope: true,
                        has_linkage: true,
                    },
                );
                if let Some(init) = &mut v.initializer {
                    self.resolve_expression(init)?;
                }
                Ok(())
            }
            Declaration::Function(f) => self.resolve_function(f),
        }
    }

    fn resolve_function(&mut self, f: &mut FunctionDeclaration) -> RResult<()> {
        let _g = self.ctx.push(format!("function {}", f.name));
        if f.scope == Scope::Block && f.body.is_some() {
            return Err(self.err(
                SemanticErrorKind::DefineAtLocalScope,
                &f.location,
                format!("function '{}' cannot be defined at block scope", f.name),
            ));
        }

        if let Some(existing) = self.map.get(&f.name) {
            if existing.from_current_scope && !existing.has_linkage {
                return Err(self.err(
                    SemanticErrorKind::DuplicateDeclaration,
                    &f.location,
                    format!("redeclaration of '{}'", f.name),
                ));
            }
        }
        self.map.insert(
            f.name.clone(),
            MapEntry {
                renamed_name: f.name.clone(),
                from_current_scope: true,
                has_linkage: true,
            },
        );

        if let Some(body) = &mut f.body {
            self.enter_scope();
            for param in &mut f.params {
                let unique = self.name_gen.make_temporary(param);
                self.map.insert(
                    param.clone(),
                    MapEntry {
                        renamed_name: unique.clone(),
                        from_current_scope: true,
                        has_linkage: false,
                    },
                );
                *param = unique;
            }
            let result = self.resolve_block(body);
            self.exit_scope();
            result?;
        }
        Ok(())
    }

    fn resolve_block(&mut self, block: &mut Block) -> RResult<()> {
        for item in &mut block.items {
            match item {
                BlockItem::Declaration(decl) => self.resolve_block_scope_declaration(decl)?,
                BlockItem::Statement(stmt) => self.resolve_statement(stmt)?,
            }
        }
        Ok(())
    }

    fn resolve_block_scope_declaration(&mut self, decl: &mut Declaration) -> RResult<()> {
        match decl {
            Declaration::Function(f) => self.resolve_function(f),
            Declaration::Variable(v) => {
                let has_linkage = v.storage_class == StorageClass::Extern;
                if let Some(existing) = self.map.get(&v.name) {
                    if existing.from_current_scope && !(has_linkage && existing.has_linkage) {
                        return Err(self.err(
                            SemanticErrorKind::DuplicateDeclaration,
                            &v.location,
                            format!("duplicate variable declaration: {}", v.name),
                        ));
                    }
                }
                let renamed = if has_linkage {
                    v.name.clone()
                } else {
                    self.name_gen.make_temporary(&v.name)
                };
                self.map.insert(
                    v.name.clone(),
                    MapEntry {
                        renamed_name: renamed.clone(),
                        from_current_scope: true,
                        has_linkage,
                    },
                );
                v.name = renamed;
                if let Some(init) = &mut v.initializer {
                    self.resolve_expression(init)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_statement(&mut self, stmt: &mut Statement) -> RResult<()> {
        match stmt {
            Statement::Return(e) => self.resolve_expression(e),
            Statement::Expression(e) => self.resolve_expression(e),
            Statement::Null => Ok(()),
            Statement::Break(_) | Statement::Continue(_) => Ok(()),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expression(condition)?;
                self.resolve_statement(then_branch)?;
                if let Some(e) = else_branch {
                    self.resolve_statement(e)?;
                }
                Ok(())
            }
            Statement::While {
                condition, body, ..
            } => {
                self.resolve_expression(condition)?;
                self.resolve_statement(body)
            }
            Statement::DoWhile {
                body, condition, ..
            } => {
                self.resolve_statement(body)?;
                self.resolve_expression(condition)
            }
            Statement::For {
                init,
                condition,
                post,
                body,
                ..
            } => {
                self.enter_scope();
                let result = (|| {
                    match init {
                        ForInit::Declaration(d) => self.resolve_block_scope_declaration(d)?,
                        ForInit::Expression(Some(e)) => self.resolve_expression(e)?,
                        ForInit::Expression(None) => {}
                    }
                    if let Some(c) = condition {
                        self.resolve_expression(c)?;
                    }
                    if let Some(p) = post {
                        self.resolve_expression(p)?;
                    }
                    self.resolve_statement(body)
                })();
                self.exit_scope();
                result
            }
            Statement::Compound(block) => {
                self.enter_scope();
                let result = self.resolve_block(block);
                self.exit_scope();
                result
            }
        }
    }

    fn resolve_expression(&mut self, expr: &mut Expression) -> RResult<()> {
        match &mut expr.kind {
            ExpressionKind::Constant(_) => Ok(()),
            ExpressionKind::Variable(name) => {
                match self.map.get(name) {
                    Some(entry) => {
                        *name = entry.renamed_name.clone();
                        Ok(())
                    }
                    None => Err(self.err(
                        SemanticErrorKind::UndeclaredIdentifier,
                        &expr.location,
                        format!("use of undeclared identifier '{name}'"),
                    )),
                }
            }
            ExpressionKind::Unary(_, inner) => self.resolve_expression(inner),
            ExpressionKind::Binary(_, left, right) => {
                self.resolve_expression(left)?;
                self.resolve_expression(right)
            }
            ExpressionKind::Assignment(left, right) => {
                if !matches!(left.kind, ExpressionKind::Variable(_)) {
                    return Err(self.err(
                        SemanticErrorKind::InvalidLValue,
                        &left.location,
                        "left-hand side of assignment is not an lvalue",
                    ));
                }
                self.resolve_expression(left)?;
                self.resolve_expression(right)
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                self.resolve_expression(condition)?;
                self.resolve_expression(then_expr)?;
                self.resolve_expression(else_expr)
            }
            ExpressionKind::FunctionCall { name, args } => {
                match self.map.get(name) {
                    Some(entry) => *name = entry.renamed_name.clone(),
                    None => {
                        return Err(self.err(
                            SemanticErrorKind::UndeclaredIdentifier,
                            &expr.location,
                            format!("call to undeclared function '{name}'"),
                        ));
                    }
                }
                for arg in args {
                    self.resolve_expression(arg)?;
                }
                Ok(())
            }
            ExpressionKind::Cast { expr: inner, .. } => self.resolve_expression(inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use std::path::PathBuf;

    fn resolve(src: &str) -> Result<Program, SemanticError> {
        let tokens = Lexer::new(src, PathBuf::from("t.c")).tokenize().unwrap();
        let mut program = Parser::new(tokens).parse_program().unwrap();
        let gen = NameGenerator::new();
        Resolver::new(&gen).resolve_program(&mut program)?;
        Ok(program)
    }

    #[test]
    fn renames_shadowed_block_variable() {
        let program = resolve("int main(void) { int x = 1; { int x = 2; return x; } return x; }").unwrap();
        // Both declarations of `x` must get distinct renamed names.
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        let body = f.body.as_ref().unwrap();
        let BlockItem::Declaration(Declaration::Variable(outer)) = &body.items[0] else {
            panic!()
        };
        let BlockItem::Statement(Statement::Compound(inner_block)) = &body.items[1] else {
            panic!()
        };
        let BlockItem::Declaration(Declaration::Variable(inner)) = &inner_block.items[0] else {
            panic!()
        };
        assert_ne!(outer.name, inner.name);
    }

    #[test]
    fn rejects_duplicate_in_same_scope() {
        let err = resolve("int main(void) { int x = 1; int x = 2; return x; }").unwrap_err();
        assert_eq!(err.kind, SemanticErrorKind::DuplicateDeclaration);
    }

    #[test]
    fn rejects_undeclared_use() {
        let err = resolve("int main(void) { return y; }").unwrap_err();
        assert_eq!(err.kind, SemanticErrorKind::UndeclaredIdentifier);
    }

    #[test]
    fn rejects_assignment_to_non_lvalue() {
        let err = resolve("int main(void) { 1 = 2; return 0; }").unwrap_err();
        assert_eq!(err.kind, SemanticErrorKind::InvalidLValue);
    }
}
