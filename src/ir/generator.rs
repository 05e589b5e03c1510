//! Three-address IR generator (spec.md §4.4, C7).
//!
//! Lowers the semantically-analyzed syntax tree into the linear form from
//! [`crate::ir`]. Structured control flow becomes labels and conditional
//! jumps; `&&`/`||` get their short-circuit skeletons; every fresh
//! temporary gets a symbol-table entry recording its inferred type so
//! later passes can recover it without re-walking the tree.

use crate::ast::*;
use crate::ir::{FunctionDefinition, Instruction, Program as IrProgram, StaticVariable, TopLevel, Value};
use crate::name_gen::NameGenerator;
use crate::symbol_table::{Attribute, StaticInit, SymbolEntry, SymbolTable};
use crate::types::Type;

pub struct IrGenerator<'a> {
    symbols: &'a mut SymbolTable,
    name_gen: &'a NameGenerator,
    body: Vec<Instruction>,
}

fn continue_label(base: &str) -> String {
    format!("{base}.continue")
}

fn break_label(base: &str) -> String {
    format!("{base}.break")
}

fn start_label(base: &str) -> String {
    format!("{base}.start")
}

impl<'a> IrGenerator<'a> {
    pub fn new(symbols: &'a mut SymbolTable, name_gen: &'a NameGenerator) -> Self {
        IrGenerator {
            symbols,
            name_gen,
            body: Vec::new(),
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.body.push(instruction);
    }

    fn fresh_temp(&mut self, ty: Type) -> Value {
        let name = self.name_gen.make_unnamed_temporary();
        self.symbols.insert(
            name.clone(),
            SymbolEntry {
                ty,
                attribute: Attribute::Local,
            },
        );
        Value::TemporaryVariable(name)
    }

    #[tracing::instrument(skip(self, program))]
    pub fn generate_program(&mut self, program: &Program) -> IrProgram {
        let mut top_level = Vec::new();
        for decl in &program.declarations {
            if let Declaration::Function(f) = decl {
                if f.body.is_some() {
                    top_level.push(TopLevel::Function(self.generate_function(f)));
                }
            }
        }

        let mut statics: Vec<(String, Type, StaticInit, bool)> = self
            .symbols
            .iter()
            .filter_map(|(name, entry)| match &entry.attribute {
                Attribute::Static { initializer, global } => {
                    Some((name.clone(), entry.ty.clone(), initializer.clone(), *global))
                }
                _ => None,
            })
            .collect();
        // HashMap iteration order is unspecified; sort for a deterministic
        // top-level ordering across runs.
        statics.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, ty, initializer, global) in statics {
            if matches!(initializer, StaticInit::NoInit) {
                continue;
            }
            top_level.push(TopLevel::StaticVariable(StaticVariable {
                name,
                global,
                ty,
                initial: initializer,
            }));
        }

        IrProgram { top_level }
    }

    fn generate_function(&mut self, f: &FunctionDeclaration) -> FunctionDefinition {
        self.body = Vec::new();
        let global = f.storage_class != StorageClass::Static;
        if let Some(block) = &f.body {
            self.lower_block(block);
        }
        if !matches!(self.body.last(), Some(Instruction::Return(_))) {
            self.emit(Instruction::Return(Value::Constant(ConstantValue::Int32(0))));
        }
        FunctionDefinition {
            name: f.name.clone(),
            global,
            parameters: f.params.clone(),
            body: std::mem::take(&mut self.body),
        }
    }

    fn lower_block(&mut self, block: &Block) {
        for item in &block.items {
            match item {
                BlockItem::Declaration(d) => self.lower_local_declaration(d),
                BlockItem::Statement(s) => self.lower_statement(s),
            }
        }
    }

    fn lower_local_declaration(&mut self, decl: &Declaration) {
        // Function prototypes and static/extern locals contribute no
        // instructions here: statics are emitted once, globally, from the
        // symbol table in `generate_program`.
        if let Declaration::Variable(v) = decl {
            if v.storage_class == StorageClass::None {
                if let Some(init) = &v.initializer {
                    let value = self.lower_expression(init);
                    self.emit(Instruction::Copy(value, Value::TemporaryVariable(v.name.clone())));
                }
            }
        }
    }

    fn lower_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Return(e) => {
                let v = self.lower_expression(e);
                self.emit(Instruction::Return(v));
            }
            Statement::Expression(e) => {
                self.lower_expression(e);
            }
            Statement::Null => {}
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let end = self.name_gen.make_label("if_end");
                if let Some(else_branch) = else_branch {
                    let else_label = self.name_gen.make_label("if_else");
                    let c = self.lower_expression(condition);
                    self.emit(Instruction::JumpIfZero(c, else_label.clone()));
                    self.lower_statement(then_branch);
                    self.emit(Instruction::Jump(end.clone()));
                    self.emit(Instruction::Label(else_label));
                    self.lower_statement(else_branch);
                    self.emit(Instruction::Label(end));
                } else {
                    let c = self.lower_expression(condition);
                    self.emit(Instruction::JumpIfZero(c, end.clone()));
                    self.lower_statement(then_branch);
                    self.emit(Instruction::Label(end));
                }
            }
            Statement::While {
                condition,
                body,
                label,
            } => {
                let label = label.as_ref().expect("InternalCompilerError: unlabeled while");
                let continue_l = continue_label(label);
                let break_l = break_label(label);
                self.emit(Instruction::Label(continue_l.clone()));
                let c = self.lower_expression(condition);
                self.emit(Instruction::JumpIfZero(c, break_l.clone()));
                self.lower_statement(body);
                self.emit(Instruction::Jump(continue_l));
                self.emit(Instruction::Label(break_l));
            }
            Statement::DoWhile {
                body,
                condition,
                label,
            } => {
                let label = label.as_ref().expect("InternalCompilerError: unlabeled do-while");
                let start = start_label(label);
                let continue_l = continue_label(label);
                let break_l = break_label(label);
                self.emit(Instruction::Label(start.clone()));
                self.lower_statement(body);
                self.emit(Instruction::Label(continue_l));
                let c = self.lower_expression(condition);
                self.emit(Instruction::JumpIfNotZero(c, start));
                self.emit(Instruction::Label(break_l));
            }
            Statement::For {
                init,
                condition,
                post,
                body,
                label,
            } => {
                let label = label.as_ref().expect("InternalCompilerError: unlabeled for");
                let start = start_label(label);
                let continue_l = continue_label(label);
                let break_l = break_label(label);
                match init {
                    ForInit::Declaration(d) => self.lower_local_declaration(d),
                    ForInit::Expression(Some(e)) => {
                        self.lower_expression(e);
                    }
                    ForInit::Expression(None) => {}
                }
                self.emit(Instruction::Label(start.clone()));
                if let Some(cond) = condition {
                    let c = self.lower_expression(cond);
                    self.emit(Instruction::JumpIfZero(c, break_l.clone()));
                }
                self.lower_statement(body);
                self.emit(Instruction::Label(continue_l));
                if let Some(post) = post {
                    self.lower_expression(post);
                }
                self.emit(Instruction::Jump(start));
                self.emit(Instruction::Label(break_l));
            }
            Statement::Break(label) => {
                let label = label.as_ref().expect("InternalCompilerError: unlabeled break");
                self.emit(Instruction::Jump(break_label(label)));
            }
            Statement::Continue(label) => {
                let label = label.as_ref().expect("InternalCompilerError: unlabeled continue");
                self.emit(Instruction::Jump(continue_label(label)));
            }
            Statement::Compound(block) => self.lower_block(block),
        }
    }

    fn lower_expression(&mut self, expr: &Expression) -> Value {
        match &expr.kind {
            ExpressionKind::Constant(c) => Value::Constant(*c),
            ExpressionKind::Variable(name) => Value::TemporaryVariable(name.clone()),
            ExpressionKind::Unary(op, inner) => {
                let v = self.lower_expression(inner);
                let t = self.fresh_temp(expr.ty.clone().expect("InternalCompilerError: untyped unary"));
                self.emit(Instruction::Unary(*op, v, t.clone()));
                t
            }
            ExpressionKind::Binary(BinaryOperator::And, left, right) => {
                let l_false = self.name_gen.make_label("and_false");
                let end = self.name_gen.make_label("and_end");
                let va = self.lower_expression(left);
                self.emit(Instruction::JumpIfZero(va, l_false.clone()));
                let vb = self.lower_expression(right);
                self.emit(Instruction::JumpIfZero(vb, l_false.clone()));
                let t = self.fresh_temp(Type::Int32);
                self.emit(Instruction::Copy(Value::Constant(ConstantValue::Int32(1)), t.clone()));
                self.emit(Instruction::Jump(end.clone()));
                self.emit(Instruction::Label(l_false));
                self.emit(Instruction::Copy(Value::Constant(ConstantValue::Int32(0)), t.clone()));
                self.emit(Instruction::Label(end));
                t
            }
            ExpressionKind::Binary(BinaryOperator::Or, left, right) => {
                let l_true = self.name_gen.make_label("or_true");
                let end = self.name_gen.make_label("or_end");
                let va = self.lower_expression(left);
                self.emit(Instruction::JumpIfNotZero(va, l_true.clone()));
                let vb = self.lower_expression(right);
                self.emit(Instruction::JumpIfNotZero(vb, l_true.clone()));
                let t = self.fresh_temp(Type::Int32);
                self.emit(Instruction::Copy(Value::Constant(ConstantValue::Int32(0)), t.clone()));
                self.emit(Instruction::Jump(end.clone()));
                self.emit(Instruction::Label(l_true));
                self.emit(Instruction::Copy(Value::Constant(ConstantValue::Int32(1)), t.clone()));
                self.emit(Instruction::Label(end));
                t
            }
            ExpressionKind::Binary(op, left, right) => {
                let v1 = self.lower_expression(left);
                let v2 = self.lower_expression(right);
                let t = self.fresh_temp(expr.ty.clone().expect("InternalCompilerError: untyped binary"));
                self.emit(Instruction::Binary(*op, v1, v2, t.clone()));
                t
            }
            ExpressionKind::Assignment(lhs, rhs) => {
                let v = self.lower_expression(rhs);
                let ExpressionKind::Variable(name) = &lhs.kind else {
                    unreachable!("InternalCompilerError: assignment target must be a resolved variable")
                };
                let t = Value::TemporaryVariable(name.clone());
                self.emit(Instruction::Copy(v, t.clone()));
                t
            }
            ExpressionKind::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                let else_label = self.name_gen.make_label("cond_else");
                let end = self.name_gen.make_label("cond_end");
                let t = self.fresh_temp(expr.ty.clone().expect("InternalCompilerError: untyped conditional"));
                let c = self.lower_expression(condition);
                self.emit(Instruction::JumpIfZero(c, else_label.clone()));
                let v1 = self.lower_expression(then_expr);
                self.emit(Instruction::Copy(v1, t.clone()));
                self.emit(Instruction::Jump(end.clone()));
                self.emit(Instruction::Label(else_label));
                let v2 = self.lower_expression(else_expr);
                self.emit(Instruction::Copy(v2, t.clone()));
                self.emit(Instruction::Label(end));
                t
            }
            ExpressionKind::FunctionCall { name, args } => {
                let values: Vec<Value> = args.iter().map(|a| self.lower_expression(a)).collect();
                let t = self.fresh_temp(expr.ty.clone().expect("InternalCompilerError: untyped call"));
                self.emit(Instruction::FunctionCall {
                    name: name.clone(),
                    args: values,
                    dst: t.clone(),
                });
                t
            }
            ExpressionKind::Cast { target, expr: inner } => {
                let v = self.lower_expression(inner);
                let inner_ty = inner.ty.clone().expect("InternalCompilerError: untyped cast operand");
                if &inner_ty == target {
                    return v;
                }
                let t = self.fresh_temp(target.clone());
                if *target == Type::Double {
                    self.emit(Instruction::IntToDouble(v, t.clone()));
                } else if inner_ty == Type::Double {
                    self.emit(Instruction::DoubleToInt(v, t.clone()));
                } else if target.size() > inner_ty.size() {
                    self.emit(Instruction::SignExtend(v, t.clone()));
                } else if target.size() < inner_ty.size() {
                    self.emit(Instruction::Truncate(v, t.clone()));
                } else {
                    // Same width, different signedness: reinterpret the
                    // bits with a plain copy.
                    self.emit(Instruction::Copy(v, t.clone()));
                }
                t
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::name_gen::NameGenerator;
    use crate::parser::Parser;
    use crate::semantic::loop_label::LoopLabeler;
    use crate::semantic::resolver::Resolver;
    use crate::semantic::typecheck::TypeChecker;
    use crate::diagnostics::WarningManager;

    fn lower(src: &str) -> (IrProgram, SymbolTable) {
        let tokens = Lexer::new(src, std::path::PathBuf::from("t.c")).tokenize().unwrap();
        let mut program = Parser::new(tokens).parse_program().unwrap();
        let gen = NameGenerator::new();
        Resolver::new(&gen).resolve_program(&mut program).unwrap();
        LoopLabeler::new(&gen).label_program(&mut program).unwrap();
        let mut symbols = SymbolTable::new();
        let warnings = WarningManager::new();
        TypeChecker::new(&mut symbols, &warnings)
            .check_program(&mut program)
            .unwrap();
        let ir = IrGenerator::new(&mut symbols, &gen).generate_program(&program);
        (ir, symbols)
    }

    fn all_labels(instrs: &[Instruction]) -> Vec<&str> {
        instrs
            .iter()
            .filter_map(|i| match i {
                Instruction::Label(l) => Some(l.as_str()),
                _ => None,
            })
            .collect()
    }

    fn jump_targets(instrs: &[Instruction]) -> Vec<&str> {
        instrs
            .iter()
            .filter_map(|i| match i {
                Instruction::Jump(l) | Instruction::JumpIfZero(_, l) | Instruction::JumpIfNotZero(_, l) => {
                    Some(l.as_str())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn every_jump_target_has_a_matching_label() {
        let (ir, _) = lower(
            "int main(void) { int x = 0; while (x < 3) { x = x + 1; } return x; }",
        );
        let TopLevel::Function(f) = &ir.top_level[0] else {
            panic!()
        };
        let labels = all_labels(&f.body);
        for target in jump_targets(&f.body) {
            assert!(labels.contains(&target), "missing label for jump target {target}");
        }
    }

    #[test]
    fn implicit_trailing_return_is_appended() {
        let (ir, _) = lower("int main(void) { int x = 1; }");
        let TopLevel::Function(f) = &ir.top_level[0] else {
            panic!()
        };
        assert!(matches!(f.body.last(), Some(Instruction::Return(_))));
    }

    #[test]
    fn short_circuit_and_produces_two_branches() {
        let (ir, _) = lower("int main(void) { return 1 && 0; }");
        let TopLevel::Function(f) = &ir.top_level[0] else {
            panic!()
        };
        let zero_jumps = f
            .body
            .iter()
            .filter(|i| matches!(i, Instruction::JumpIfZero(..)))
            .count();
        assert_eq!(zero_jumps, 2);
    }

    #[test]
    fn tentative_static_lowers_to_zero_initializer() {
        let (ir, _) = lower("int c; int main(void) { return c; }");
        let has_static = ir.top_level.iter().any(|t| matches!(t, TopLevel::StaticVariable(s) if s.name == "c"));
        assert!(has_static);
    }

    #[test]
    fn function_call_lowers_arguments_in_order() {
        let (ir, _) = lower("int add(int a, int b) { return a + b; } int main(void) { return add(3, 4); }");
        let TopLevel::Function(main_fn) = ir
            .top_level
            .iter()
            .find(|t| matches!(t, TopLevel::Function(f) if f.name == "main"))
            .unwrap()
        else {
            panic!()
        };
        assert!(main_fn.body.iter().any(|i| matches!(i, Instruction::FunctionCall { args, .. } if args.len() == 2)));
    }
}
