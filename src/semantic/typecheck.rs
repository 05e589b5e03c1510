//! Type checking (spec.md §4.2, C5.b).
//!
//! Populates the symbol table and annotates each expression with its type.
//! Runs after identifier resolution, so every name in scope is already
//! unique; this pass only worries about types, linkage, and arity.

use crate::ast::*;
use crate::diagnostics::{ContextStack, WarningManager};
use crate::semantic::error::{AnalysisError, SemanticError, SemanticErrorKind, TypeError};
use crate::symbol_table::{Attribute, InitialValue, StaticInit, SymbolEntry, SymbolTable};
use crate::types::Type;

type CResult<T> = Result<T, AnalysisError>;

pub struct TypeChecker<'a> {
    symbols: &'a mut SymbolTable,
    warnings: &'a WarningManager,
    ctx: ContextStack,
}

impl<'a> TypeChecker<'a> {
    pub fn new(symbols: &'a mut SymbolTable, warnings: &'a WarningManager) -> Self {
        TypeChecker {
            symbols,
            warnings,
            ctx: ContextStack::new(),
        }
    }

    fn semantic_err(&self, kind: SemanticErrorKind, loc: &crate::diagnostics::SourceLocation, msg: impl Into<String>) -> AnalysisError {
        SemanticError {
            kind,
            location: loc.clone(),
            message: msg.into(),
            context: self.ctx.render(),
        }
        .into()
    }

    fn type_err(&self, loc: &crate::diagnostics::SourceLocation, msg: impl Into<String>) -> AnalysisError {
        TypeError {
            location: loc.clone(),
            message: msg.into(),
            context: self.ctx.render(),
        }
        .into()
    }

    #[tracing::instrument(skip(self, program))]
    pub fn check_program(&mut self, program: &mut Program) -> CResult<()> {
        let _g = self.ctx.push("program");
        for decl in &mut program.declarations {
            self.check_file_scope_declaration(decl)?;
        }
        Ok(())
    }

    fn param_types(ty: &Type) -> &[Type] {
        match ty {
            Type::Function(_, params) => params,
            _ => &[],
        }
    }

    fn return_type(ty: &Type) -> Type {
        match ty {
            Type::Function(ret, _) => (**ret).clone(),
            other => other.clone(),
        }
    }

    fn check_file_scope_declaration(&mut self, decl: &mut Declaration) -> CResult<()> {
        match decl {
            Declaration::Function(f) => self.check_function(f),
            Declaration::Variable(v) => self.check_file_scope_variable(v),
        }
    }

    fn check_function(&mut self, f: &mut FunctionDeclaration) -> CResult<()> {
        let _g = self.ctx.push(format!("function {}", f.name));
        let global = f.storage_class != StorageClass::Static;

        let already_defined = if let Some(existing) = self.symbols.get(&f.name) {
            if existing.ty != f.ty {
                return Err(self.semantic_err(
                    SemanticErrorKind::IncompatibleRedeclaration,
                    &f.location,
                    format!("conflicting types for '{}'", f.name),
                ));
            }
            matches!(existing.attribute, Attribute::Function { defined: true, .. })
        } else {
            false
        };

        if already_defined && f.body.is_some() {
            return Err(self.semantic_err(
                SemanticErrorKind::DuplicateDeclaration,
                &f.location,
                format!("redefinition of '{}'", f.name),
            ));
        }

        let defined = already_defined || f.body.is_some();
        self.symbols.insert(
            f.name.clone(),
            SymbolEntry {
                ty: f.ty.clone(),
                attribute: Attribute::Function { defined, global },
            },
        );

        if let Some(body) = &mut f.body {
            let param_types = Self::param_types(&f.ty).to_vec();
            if param_types.len() != f.params.len() {
                return Err(self.semantic_err(
                    SemanticErrorKind::ArgumentCountMismatch,
                    &f.location,
                    "parameter list length does not match function type",
                ));
            }
            for (name, ty) in f.params.iter().zip(param_types.iter()) {
                self.symbols.insert(
                    name.clone(),
                    SymbolEntry {
                        ty: ty.clone(),
                        attribute: Attribute::Local,
                    },
                );
            }
            let return_ty = Self::return_type(&f.ty);
            self.check_block(body, &return_ty)?;
        }
        Ok(())
    }

    fn check_block(&mut self, block: &mut Block, return_ty: &Type) -> CResult<()> {
        for item in &mut block.items {
            match item {
                BlockItem::Declaration(decl) => self.check_block_scope_declaration(decl)?,
                BlockItem::Statement(stmt) => self.check_statement(stmt, return_ty)?,
            }
        }
        Ok(())
    }

    fn check_block_scope_declaration(&mut self, decl: &mut Declaration) -> CResult<()> {
        match decl {
            Declaration::Function(f) => {
                if f.body.is_some() {
                    return Err(self.semantic_err(
                        SemanticErrorKind::DefineAtLocalScope,
                        &f.location,
                        format!("function '{}' cannot be defined at block scope", f.name),
                    ));
                }
                self.check_function(f)
            }
            Declaration::Variable(v) => self.check_block_scope_variable(v),
        }
    }

    fn check_file_scope_variable(&mut self, v: &mut VariableDeclaration) -> CResult<()> {
        let global = v.storage_class != StorageClass::Static;
        let initializer = match &mut v.initializer {
            Some(expr) => {
                self.check_expression(expr)?;
                let constant = Self::require_constant(expr, &self.ctx)?;
                StaticInit::Initial(self.convert_constant(&constant, &v.ty, &v.location))
            }
            None if v.storage_class == StorageClass::Extern => StaticInit::NoInit,
            None => StaticInit::Tentative,
        };

        if let Some(existing) = self.symbols.get(&v.name) {
            if existing.ty != v.ty {
                return Err(self.semantic_err(
                    SemanticErrorKind::IncompatibleRedeclaration,
                    &v.location,
                    format!("conflicting types for '{}'", v.name),
                ));
            }
        }
        self.symbols.insert(
            v.name.clone(),
            SymbolEntry {
                ty: v.ty.clone(),
                attribute: Attribute::Static { initializer, global },
            },
        );
        Ok(())
    }

    fn check_block_scope_variable(&mut self, v: &mut VariableDeclaration) -> CResult<()> {
        match v.storage_class {
            StorageClass::Extern => {
                if v.initializer.is_some() {
                    return Err(self.semantic_err(
                        SemanticErrorKind::IncompatibleRedeclaration,
                        &v.location,
                        "'extern' variable at block scope cannot have an initializer",
                    ));
                }
                self.symbols.insert(
                    v.name.clone(),
                    SymbolEntry {
                        ty: v.ty.clone(),
                        attribute: Attribute::Static {
                            initializer: StaticInit::NoInit,
                            global: true,
                        },
                    },
                );
                Ok(())
            }
            StorageClass::Static => {
                let initializer = match &mut v.initializer {
                    Some(expr) => {
                        self.check_expression(expr)?;
                        let constant = Self::require_constant(expr, &self.ctx)?;
                        StaticInit::Initial(self.convert_constant(&constant, &v.ty, &v.location))
                    }
                    None => StaticInit::Tentative,
                };
                self.symbols.insert(
                    v.name.clone(),
                    SymbolEntry {
                        ty: v.ty.clone(),
                        attribute: Attribute::Static {
                            initializer,
                            global: false,
                        },
                    },
                );
                Ok(())
            }
            StorageClass::None => {
                self.symbols.insert(
                    v.name.clone(),
                    SymbolEntry {
                        ty: v.ty.clone(),
                        attribute: Attribute::Local,
                    },
                );
                if let Some(init) = &mut v.initializer {
                    self.check_expression(init)?;
                    let converted = self.convert_to(std::mem::replace(init, placeholder()), &v.ty);
                    *init = converted;
                }
                Ok(())
            }
        }
    }

    fn check_statement(&mut self, stmt: &mut Statement, return_ty: &Type) -> CResult<()> {
        match stmt {
            Statement::Return(expr) => {
                self.check_expression(expr)?;
                let converted = self.convert_to(std::mem::replace(expr, placeholder()), return_ty);
                *expr = converted;
                Ok(())
            }
            Statement::Expression(e) => self.check_expression(e),
            Statement::Null => Ok(()),
            Statement::Break(label) => {
                if label.is_none() {
                    return Err(self.semantic_err(
                        SemanticErrorKind::BreakOutsideLoop,
                        &crate::diagnostics::SourceLocation::synthetic(),
                        "'break' outside of a loop",
                    ));
                }
                Ok(())
            }
            Statement::Continue(label) => {
                if label.is_none() {
                    return Err(self.semantic_err(
                        SemanticErrorKind::ContinueOutsideLoop,
                        &crate::diagnostics::SourceLocation::synthetic(),
                        "'continue' outside of a loop",
                    ));
                }
                Ok(())
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_expression(condition)?;
                self.check_statement(then_branch, return_ty)?;
                if let Some(e) = else_branch {
                    self.check_statement(e, return_ty)?;
                }
                Ok(())
            }
            Statement::While {
                condition, body, ..
            } => {
                self.check_expression(condition)?;
                self.check_statement(body, return_ty)
            }
            Statement::DoWhile {
                body, condition, ..
            } => {
                self.check_statement(body, return_ty)?;
                self.check_expression(condition)
            }
            Statement::For {
                init,
                condition,
                post,
                body,
                ..
            } => {
                match init {
                    ForInit::Declaration(d) => self.check_block_scope_declaration(d)?,
                    ForInit::Expression(Some(e)) => self.check_expression(e)?,
                    ForInit::Expression(None) => {}
                }
                if let Some(c) = condition {
                    self.check_expression(c)?;
                }
                if let Some(p) = post {
                    self.check_expression(p)?;
                }
                self.check_statement(body, return_ty)
            }
            Statement::Compound(block) => self.check_block(block, return_ty),
        }
    }

    fn check_expression(&mut self, expr: &mut Expression) -> CResult<()> {
        let _g = self.ctx.push("expression");
        match &mut expr.kind {
            ExpressionKind::Constant(c) => {
                expr.ty = Some(c.ty());
                Ok(())
            }
            ExpressionKind::Variable(name) => {
                let entry = self.symbols.get(name).ok_or_else(|| {
                    self.semantic_err(
                        SemanticErrorKind::UndeclaredIdentifier,
                        &expr.location,
                        format!("use of undeclared identifier '{name}'"),
                    )
                })?;
                if matches!(entry.ty, Type::Function(..)) {
                    return Err(self.semantic_err(
                        SemanticErrorKind::UseFunctionAsVariable,
                        &expr.location,
                        format!("'{name}' is a function, not a variable"),
                    ));
                }
                expr.ty = Some(entry.ty.clone());
                Ok(())
            }
            ExpressionKind::Unary(op, inner) => {
                self.check_expression(inner)?;
                let inner_ty = inner.ty.clone().expect("InternalCompilerError: untyped operand");
                if matches!(op, UnaryOperator::Complement) && inner_ty == Type::Double {
                    return Err(self.type_err(&expr.location, "cannot take the bitwise complement of a double"));
                }
                expr.ty = Some(match op {
                    UnaryOperator::Not => Type::Int32,
                    _ => inner_ty,
                });
                Ok(())
            }
            ExpressionKind::Binary(op, left, right) => {
                self.check_expression(left)?;
                self.check_expression(right)?;
                let lt = left.ty.clone().unwrap();
                let rt = right.ty.clone().unwrap();
                if matches!(op, BinaryOperator::And | BinaryOperator::Or) {
                    expr.ty = Some(Type::Int32);
                    return Ok(());
                }
                let common = Type::common_type(&lt, &rt);
                *left.as_mut() = self.convert_to(std::mem::replace(left.as_mut(), placeholder()), &common);
                *right.as_mut() = self.convert_to(std::mem::replace(right.as_mut(), placeholder()), &common);
                expr.ty = Some(if op.is_relational() { Type::Int32 } else { common });
                Ok(())
            }
            ExpressionKind::Assignment(left, right) => {
                self.check_expression(left)?;
                self.check_expression(right)?;
                let lt = left.ty.clone().unwrap();
                *right.as_mut() = self.convert_to(std::mem::replace(right.as_mut(), placeholder()), &lt);
                expr.ty = Some(lt);
                Ok(())
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                self.check_expression(condition)?;
                self.check_expression(then_expr)?;
                self.check_expression(else_expr)?;
                let common = Type::common_type(
                    then_expr.ty.as_ref().unwrap(),
                    else_expr.ty.as_ref().unwrap(),
                );
                expr.ty = Some(common);
                Ok(())
            }
            ExpressionKind::FunctionCall { name, args } => {
                let entry = self.symbols.get(name).cloned().ok_or_else(|| {
                    self.semantic_err(
                        SemanticErrorKind::UndeclaredIdentifier,
                        &expr.location,
                        format!("call to undeclared function '{name}'"),
                    )
                })?;
                let Type::Function(ret, params) = entry.ty.clone() else {
                    return Err(self.semantic_err(
                        SemanticErrorKind::UseVariableAsFunction,
                        &expr.location,
                        format!("'{name}' is not a function"),
                    ));
                };
                if params.len() != args.len() {
                    return Err(self.semantic_err(
                        SemanticErrorKind::ArgumentCountMismatch,
                        &expr.location,
                        format!(
                            "'{name}' expects {} argument(s), found {}",
                            params.len(),
                            args.len()
                        ),
                    ));
                }
                for (arg, param_ty) in args.iter_mut().zip(params.iter()) {
                    self.check_expression(arg)?;
                    *arg = self.convert_to(std::mem::replace(arg, placeholder()), param_ty);
                }
                expr.ty = Some((*ret).clone());
                Ok(())
            }
            ExpressionKind::Cast { target, expr: inner } => {
                self.check_expression(inner)?;
                expr.ty = Some(target.clone());
                Ok(())
            }
        }
    }

    /// Wrap `expr` in a `Cast` if its type differs from `target`; this is
    /// how implicit conversions (assignment, arithmetic promotion, return,
    /// argument passing) become explicit nodes the IR generator can lower
    /// uniformly via `SignExtend`/`Truncate`.
    fn convert_to(&self, expr: Expression, target: &Type) -> Expression {
        let current = expr.ty.clone().expect("InternalCompilerError: untyped expression");
        if &current == target {
            return expr;
        }
        let loc = expr.location.clone();
        Expression {
            kind: ExpressionKind::Cast {
                target: target.clone(),
                expr: Box::new(expr),
            },
            ty: Some(target.clone()),
            location: loc,
        }
    }

    fn require_constant(expr: &Expression, ctx: &ContextStack) -> CResult<ConstantValue> {
        match &expr.kind {
            ExpressionKind::Constant(c) => Ok(*c),
            _ => Err(TypeError {
                location: expr.location.clone(),
                message: "file-scope/static initializer must be a compile-time constant".into(),
                context: ctx.render(),
            }
            .into()),
        }
    }

    /// Converts a constant to the declared type, emitting a warning
    /// through [`WarningManager`] if the conversion truncates or changes
    /// sign (spec.md §7 "numeric-conversion warnings").
    fn convert_constant(
        &self,
        value: &ConstantValue,
        target: &Type,
        loc: &crate::diagnostics::SourceLocation,
    ) -> InitialValue {
        let as_i64 = |c: &ConstantValue| -> i64 {
            match c {
                ConstantValue::Int32(v) => *v as i64,
                ConstantValue::Int64(v) => *v,
                ConstantValue::UInt32(v) => *v as i64,
                ConstantValue::UInt64(v) => *v as i64,
                ConstantValue::Double(v) => *v as i64,
            }
        };
        let as_f64 = |c: &ConstantValue| -> f64 {
            match c {
                ConstantValue::Int32(v) => *v as f64,
                ConstantValue::Int64(v) => *v as f64,
                ConstantValue::UInt32(v) => *v as f64,
                ConstantValue::UInt64(v) => *v as f64,
                ConstantValue::Double(v) => *v,
            }
        };

        match target {
            Type::Double => InitialValue::Double(as_f64(value)),
            Type::Int32 => {
                let wide = as_i64(value);
                let narrowed = wide as i32;
                if narrowed as i64 != wide {
                    self.warnings.warn(
                        loc.clone(),
                        format!("implicit conversion from '{wide}' to int32 changes value"),
                    );
                }
                InitialValue::Int32(narrowed)
            }
            Type::Int64 => InitialValue::Int64(as_i64(value)),
            Type::UInt32 => {
                let wide = as_i64(value);
                InitialValue::UInt32(wide as u32)
            }
            Type::UInt64 => InitialValue::UInt64(as_i64(value) as u64),
            Type::Pointer(_) | Type::Array(..) | Type::Function(..) => {
                InitialValue::Int64(as_i64(value))
            }
        }
    }
}

/// A throwaway expression used only as a `mem::replace` source when
/// temporarily taking ownership of a field through a `&mut` reference.
fn placeholder() -> Expression {
    Expression::new(
        ExpressionKind::Constant(ConstantValue::Int32(0)),
        crate::diagnostics::SourceLocation::synthetic(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semantic::loop_label::LoopLabeler;
    use crate::semantic::resolver::Resolver;
    use crate::name_gen::NameGenerator;

    fn check(src: &str) -> Result<(Program, SymbolTable), AnalysisError> {
        let tokens = Lexer::new(src, std::path::PathBuf::from("t.c")).tokenize().unwrap();
        let mut program = Parser::new(tokens).parse_program().unwrap();
        let gen = NameGenerator::new();
        Resolver::new(&gen).resolve_program(&mut program).unwrap();
        LoopLabeler::new(&gen).label_program(&mut program).unwrap();
        let mut symbols = SymbolTable::new();
        let warnings = WarningManager::new();
        TypeChecker::new(&mut symbols, &warnings).check_program(&mut program)?;
        Ok((program, symbols))
    }

    #[test]
    fn every_expression_gets_a_type() {
        let (program, _) = check("int main(void) { int x = 1; return x + 2; }").unwrap();
        let Declaration::Function(f) = &program.declarations[0] else {
            panic!()
        };
        for item in &f.body.as_ref().unwrap().items {
            if let BlockItem::Statement(Statement::Return(e)) = item {
                assert!(e.ty.is_some());
            }
        }
    }

    #[test]
    fn rejects_argument_count_mismatch() {
        let err = check("int f(int a){ return a; } int main(void){ return f(1,2); }").unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Semantic(SemanticError {
                kind: SemanticErrorKind::ArgumentCountMismatch,
                ..
            })
        ));
    }

    #[test]
    fn rejects_conflicting_redeclaration() {
        let err = check("int f(int a); long f(int a) { return a; }").unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Semantic(SemanticError {
                kind: SemanticErrorKind::IncompatibleRedeclaration,
                ..
            })
        ));
    }

    #[test]
    fn tentative_definition_upgrades_later() {
        let (_, symbols) = check("int c; int main(void) { return c; }").unwrap();
        let entry = symbols.get("c").unwrap();
        assert!(matches!(
            entry.attribute,
            Attribute::Static {
                initializer: StaticInit::Tentative,
                global: true
            }
        ));
    }
}
