//! Target IR generator (spec.md §4.5, C9).
//!
//! Lowers each three-address IR instruction to a sequence of target
//! instructions, following the System V x86-64 calling convention. Every
//! `TemporaryVariable` becomes a `PseudoRegister`; resolving those to a
//! stack slot or a data symbol is [`crate::target::pseudo_regs`]'s job, not
//! this one's.
//!
//! `Double` values never sit in a `PseudoRegister` the way an int does and
//! get computed on directly: SSE arithmetic instructions require a register
//! destination, so every `double` operation routes through the fixed
//! `XMM_SCRATCH`/`XMM_SCRATCH2` pair (the float analogue of the integer
//! path's implicit `AX`/`DX` usage for division) and stores the result back
//! to the destination pseudo's eventual stack slot with `movsd`. Float
//! literals can't be SSE immediates, so each one that's actually used in an
//! arithmetic or comparison position is hoisted to an anonymous read-only
//! data symbol the first time it's seen (see `double_operand`).

use crate::ast::BinaryOperator;
use crate::ir;
use crate::symbol_table::SymbolTable;
use crate::target::backend_symbols::BackendSymbolTable;
use crate::target::{self, ARG_REGISTERS, ARG_REGISTERS_SSE, Cc, Operand, Register, Width, XMM_SCRATCH, XMM_SCRATCH2};
use crate::types::Type;
use std::collections::HashMap;

pub struct TargetGenerator<'a> {
    symbols: &'a SymbolTable,
    backend: &'a mut BackendSymbolTable,
    instructions: Vec<target::Instruction>,
    float_literals: Vec<(String, u64)>,
    float_literal_labels: HashMap<u64, String>,
    next_float_literal: usize,
}

impl<'a> TargetGenerator<'a> {
    pub fn new(symbols: &'a SymbolTable, backend: &'a mut BackendSymbolTable) -> Self {
        TargetGenerator {
            symbols,
            backend,
            instructions: Vec::new(),
            float_literals: Vec::new(),
            float_literal_labels: HashMap::new(),
            next_float_literal: 0,
        }
    }

    fn emit(&mut self, instr: target::Instruction) {
        self.instructions.push(instr);
    }

    fn value_type(&self, v: &ir::Value) -> Type {
        match v {
            ir::Value::Constant(c) => c.ty(),
            ir::Value::TemporaryVariable(name) => self
                .symbols
                .get(name)
                .map(|e| e.ty.clone())
                .unwrap_or(Type::Int32),
        }
    }

    fn is_double(&self, v: &ir::Value) -> bool {
        self.value_type(v) == Type::Double
    }

    fn width_of(&self, v: &ir::Value) -> Width {
        Width::of_size(self.value_type(v).size())
    }

    fn operand(&self, v: &ir::Value) -> Operand {
        match v {
            ir::Value::Constant(c) => Operand::Immediate(constant_bits(c)),
            ir::Value::TemporaryVariable(name) => Operand::PseudoRegister(name.clone()),
        }
    }

    /// Like [`Self::operand`], but for a value known to be `double`: a
    /// constant becomes a reference to a hoisted read-only data symbol
    /// instead of a raw bit-pattern immediate, since no SSE instruction can
    /// take one directly.
    fn double_operand(&mut self, v: &ir::Value) -> Operand {
        match v {
            ir::Value::Constant(crate::ast::ConstantValue::Double(d)) => {
                let bits = d.to_bits();
                let label = match self.float_literal_labels.get(&bits) {
                    Some(label) => label.clone(),
                    None => {
                        let label = format!(".LC{}", self.next_float_literal);
                        self.next_float_literal += 1;
                        self.float_literal_labels.insert(bits, label.clone());
                        self.float_literals.push((label.clone(), bits));
                        label
                    }
                };
                Operand::DataOperand(label)
            }
            ir::Value::Constant(c) => Operand::Immediate(constant_bits(c)),
            ir::Value::TemporaryVariable(name) => Operand::PseudoRegister(name.clone()),
        }
    }

    #[tracing::instrument(skip(self, program))]
    pub fn generate_program(&mut self, program: &ir::Program) -> target::Program {
        let mut top_level = Vec::new();
        for item in &program.top_level {
            match item {
                ir::TopLevel::Function(f) => {
                    top_level.push(target::TopLevel::Function(self.generate_function(f)));
                }
                ir::TopLevel::StaticVariable(s) => {
                    top_level.push(target::TopLevel::StaticVariable(lower_static(s)));
                }
            }
        }
        for (label, bits) in &self.float_literals {
            top_level.push(target::TopLevel::StaticVariable(float_literal_static(label, *bits)));
        }
        target::Program { top_level }
    }

    fn generate_function(&mut self, f: &ir::FunctionDefinition) -> target::FunctionDefinition {
        self.instructions = Vec::new();
        self.emit(target::Instruction::Push(Operand::Register(Register::BP)));
        self.emit(target::Instruction::Mov(
            Width::Quad,
            Operand::Register(Register::SP),
            Operand::Register(Register::BP),
        ));

        // Integer and float parameters are classified, and their registers
        // consumed, independently (System V §3.2.3): a `double` sixth
        // parameter still takes an xmm register even once the six integer
        // registers are exhausted, and vice versa. Only a parameter whose
        // own class is exhausted spills to the stack, in original
        // declaration order among just the spilled ones.
        let mut int_used = 0;
        let mut sse_used = 0;
        let mut stack_index: i64 = 0;
        for param in &f.parameters {
            let ty = self.symbols.get(param).map(|e| e.ty.clone()).unwrap_or(Type::Int32);
            let dst = Operand::PseudoRegister(param.clone());
            if ty == Type::Double {
                if sse_used < ARG_REGISTERS_SSE.len() {
                    self.emit(target::Instruction::MovSd(Operand::Register(ARG_REGISTERS_SSE[sse_used]), dst));
                    sse_used += 1;
                } else {
                    let offset = 16 + 8 * stack_index;
                    self.emit(target::Instruction::MovSd(Operand::StackAddress(offset), dst));
                    stack_index += 1;
                }
            } else {
                let width = Width::of_size(ty.size());
                if int_used < ARG_REGISTERS.len() {
                    self.emit(target::Instruction::Mov(width, Operand::Register(ARG_REGISTERS[int_used]), dst));
                    int_used += 1;
                } else {
                    let offset = 16 + 8 * stack_index;
                    self.emit(target::Instruction::Mov(width, Operand::StackAddress(offset), dst));
                    stack_index += 1;
                }
            }
        }

        for instr in &f.body {
            self.lower_instruction(instr);
        }

        target::FunctionDefinition {
            name: f.name.clone(),
            global: f.global,
            instructions: std::mem::take(&mut self.instructions),
        }
    }

    fn lower_instruction(&mut self, instr: &ir::Instruction) {
        use target::Instruction as T;
        match instr {
            ir::Instruction::Return(v) if self.is_double(v) => {
                let op = self.double_operand(v);
                self.emit(T::MovSd(op, Operand::Register(Register::Xmm(0))));
                self.emit(T::Ret);
            }
            ir::Instruction::Return(v) => {
                let w = self.width_of(v);
                let op = self.operand(v);
                self.emit(T::Mov(w, op, Operand::Register(Register::AX)));
                self.emit(T::Ret);
            }
            ir::Instruction::Unary(crate::ast::UnaryOperator::Not, v, t) if self.is_double(v) => {
                let src = self.double_operand(v);
                let dst = self.operand(t);
                self.emit(T::MovSd(src, Operand::Register(XMM_SCRATCH)));
                self.emit(T::PxorZero(Operand::Register(XMM_SCRATCH2)));
                self.emit(T::UComiSd(Operand::Register(XMM_SCRATCH2), Operand::Register(XMM_SCRATCH)));
                self.emit(T::Mov(Width::Long, Operand::Immediate(0), dst.clone()));
                self.emit(T::SetCC(Cc::E, dst));
            }
            ir::Instruction::Unary(crate::ast::UnaryOperator::Not, v, t) => {
                let w = self.width_of(v);
                let src = self.operand(v);
                let dst = self.operand(t);
                self.emit(T::Cmp(w, Operand::Immediate(0), src));
                self.emit(T::Mov(Width::Long, Operand::Immediate(0), dst.clone()));
                self.emit(T::SetCC(Cc::E, dst));
            }
            ir::Instruction::Unary(crate::ast::UnaryOperator::Negate, v, t) if self.is_double(v) => {
                let src = self.double_operand(v);
                let dst = self.operand(t);
                self.emit(T::MovSd(src, Operand::Register(XMM_SCRATCH)));
                self.emit(T::PxorZero(Operand::Register(XMM_SCRATCH2)));
                self.emit(T::BinarySd(target::BinaryOp::Sub, Operand::Register(XMM_SCRATCH), Operand::Register(XMM_SCRATCH2)));
                self.emit(T::MovSd(Operand::Register(XMM_SCRATCH2), dst));
            }
            ir::Instruction::Unary(op, v, t) => {
                let w = self.width_of(t);
                let src = self.operand(v);
                let dst = self.operand(t);
                self.emit(T::Mov(w, src, dst.clone()));
                let target_op = match op {
                    crate::ast::UnaryOperator::Negate => target::UnaryOp::Neg,
                    crate::ast::UnaryOperator::Complement => target::UnaryOp::Not,
                    crate::ast::UnaryOperator::Not => unreachable!(),
                };
                self.emit(T::Unary(target_op, w, dst));
            }
            ir::Instruction::Binary(BinaryOperator::Divide, s1, s2, t) if self.is_double(s1) => {
                let a = self.double_operand(s1);
                let b = self.double_operand(s2);
                let dst = self.operand(t);
                self.emit(T::MovSd(a, Operand::Register(XMM_SCRATCH)));
                self.emit(T::BinarySd(target::BinaryOp::Div, b, Operand::Register(XMM_SCRATCH)));
                self.emit(T::MovSd(Operand::Register(XMM_SCRATCH), dst));
            }
            ir::Instruction::Binary(BinaryOperator::Divide, s1, s2, t) => {
                let w = self.width_of(s1);
                let a = self.operand(s1);
                let b = self.operand(s2);
                let dst = self.operand(t);
                self.emit(T::Mov(w, a, Operand::Register(Register::AX)));
                self.emit(T::Cdq);
                self.emit(T::Idiv(w, b));
                self.emit(T::Mov(w, Operand::Register(Register::AX), dst));
            }
            ir::Instruction::Binary(BinaryOperator::Remainder, s1, s2, t) => {
                let w = self.width_of(s1);
                let a = self.operand(s1);
                let b = self.operand(s2);
                let dst = self.operand(t);
                self.emit(T::Mov(w, a, Operand::Register(Register::AX)));
                self.emit(T::Cdq);
                self.emit(T::Idiv(w, b));
                self.emit(T::Mov(w, Operand::Register(Register::DX), dst));
            }
            ir::Instruction::Binary(op, s1, s2, t) if op.is_relational() && self.is_double(s1) => {
                let a = self.double_operand(s1);
                let b = self.double_operand(s2);
                let dst = self.operand(t);
                self.emit(T::MovSd(a, Operand::Register(XMM_SCRATCH)));
                self.emit(T::UComiSd(b, Operand::Register(XMM_SCRATCH)));
                self.emit(T::Mov(Width::Long, Operand::Immediate(0), dst.clone()));
                self.emit(T::SetCC(Cc::from_relational_double(*op), dst));
            }
            ir::Instruction::Binary(op, s1, s2, t) if op.is_relational() => {
                let w = self.width_of(s1);
                let a = self.operand(s1);
                let b = self.operand(s2);
                let dst = self.operand(t);
                self.emit(T::Cmp(w, b, a));
                self.emit(T::Mov(Width::Long, Operand::Immediate(0), dst.clone()));
                self.emit(T::SetCC(Cc::from_relational(*op), dst));
            }
            ir::Instruction::Binary(op, s1, s2, t) if self.is_double(s1) => {
                let a = self.double_operand(s1);
                let b = self.double_operand(s2);
                let dst = self.operand(t);
                let target_op = target::BinaryOp::from_ast(*op)
                    .expect("InternalCompilerError: non-arithmetic binary reached target generator");
                self.emit(T::MovSd(a, Operand::Register(XMM_SCRATCH)));
                self.emit(T::BinarySd(target_op, b, Operand::Register(XMM_SCRATCH)));
                self.emit(T::MovSd(Operand::Register(XMM_SCRATCH), dst));
            }
            ir::Instruction::Binary(op, s1, s2, t) => {
                let w = self.width_of(t);
                let a = self.operand(s1);
                let b = self.operand(s2);
                let dst = self.operand(t);
                self.emit(T::Mov(w, a, dst.clone()));
                let target_op = target::BinaryOp::from_ast(*op)
                    .expect("InternalCompilerError: non-arithmetic binary reached target generator");
                self.emit(T::Binary(target_op, w, b, dst));
            }
            ir::Instruction::Copy(v, t) => {
                let w = self.width_of(t);
                let src = self.operand(v);
                let dst = self.operand(t);
                self.emit(T::Mov(w, src, dst));
            }
            ir::Instruction::Jump(label) => self.emit(T::Jmp(label.clone())),
            ir::Instruction::JumpIfZero(v, label) if self.is_double(v) => {
                let op = self.double_operand(v);
                self.emit(T::MovSd(op, Operand::Register(XMM_SCRATCH)));
                self.emit(T::PxorZero(Operand::Register(XMM_SCRATCH2)));
                self.emit(T::UComiSd(Operand::Register(XMM_SCRATCH2), Operand::Register(XMM_SCRATCH)));
                self.emit(T::JmpCC(Cc::E, label.clone()));
            }
            ir::Instruction::JumpIfZero(v, label) => {
                let w = self.width_of(v);
                let op = self.operand(v);
                self.emit(T::Cmp(w, Operand::Immediate(0), op));
                self.emit(T::JmpCC(Cc::E, label.clone()));
            }
            ir::Instruction::JumpIfNotZero(v, label) if self.is_double(v) => {
                let op = self.double_operand(v);
                self.emit(T::MovSd(op, Operand::Register(XMM_SCRATCH)));
                self.emit(T::PxorZero(Operand::Register(XMM_SCRATCH2)));
                self.emit(T::UComiSd(Operand::Register(XMM_SCRATCH2), Operand::Register(XMM_SCRATCH)));
                self.emit(T::JmpCC(Cc::NE, label.clone()));
            }
            ir::Instruction::JumpIfNotZero(v, label) => {
                let w = self.width_of(v);
                let op = self.operand(v);
                self.emit(T::Cmp(w, Operand::Immediate(0), op));
                self.emit(T::JmpCC(Cc::NE, label.clone()));
            }
            ir::Instruction::Label(name) => self.emit(T::Label(name.clone())),
            ir::Instruction::FunctionCall { name, args, dst } => self.lower_call(name, args, dst),
            ir::Instruction::IntToDouble(v, t) => {
                let src_width = self.width_of(v);
                let src = self.operand(v);
                let dst = self.operand(t);
                self.emit(T::Cvtsi2sd(src_width, src, Operand::Register(XMM_SCRATCH)));
                self.emit(T::MovSd(Operand::Register(XMM_SCRATCH), dst));
            }
            ir::Instruction::DoubleToInt(v, t) => {
                let dst_width = self.width_of(t);
                let src = self.double_operand(v);
                let dst = self.operand(t);
                self.emit(T::MovSd(src, Operand::Register(XMM_SCRATCH)));
                self.emit(T::Cvttsd2si(dst_width, Operand::Register(XMM_SCRATCH), dst));
            }
            ir::Instruction::SignExtend(v, t) => {
                let src = self.operand(v);
                let dst = self.operand(t);
                self.emit(T::Movsx(src, dst));
            }
            ir::Instruction::Truncate(v, t) => {
                let src = self.operand(v);
                let dst = self.operand(t);
                self.emit(T::Mov(Width::Long, src, dst));
            }
        }
    }

    fn lower_call(&mut self, name: &str, args: &[ir::Value], dst: &ir::Value) {
        use target::Instruction as T;

        // Classified the same way the prologue classifies parameters:
        // int and float arguments draw from separate register files, and
        // only an argument whose own class is exhausted spills to the
        // stack, in original left-to-right order among the spilled ones.
        let mut int_args: Vec<&ir::Value> = Vec::new();
        let mut sse_args: Vec<&ir::Value> = Vec::new();
        let mut stack_args: Vec<&ir::Value> = Vec::new();
        for arg in args {
            if self.is_double(arg) {
                if sse_args.len() < ARG_REGISTERS_SSE.len() {
                    sse_args.push(arg);
                } else {
                    stack_args.push(arg);
                }
            } else if int_args.len() < ARG_REGISTERS.len() {
                int_args.push(arg);
            } else {
                stack_args.push(arg);
            }
        }

        let padding = if stack_args.len() % 2 == 1 { 8 } else { 0 };
        if padding > 0 {
            self.emit(T::Binary(
                target::BinaryOp::Sub,
                Width::Quad,
                Operand::Immediate(8),
                Operand::Register(Register::SP),
            ));
        }

        for arg in stack_args.iter().rev() {
            if self.is_double(arg) {
                let op = self.double_operand(arg);
                self.emit(T::Push(op));
                continue;
            }
            let w = self.width_of(arg);
            let op = self.operand(arg);
            if w == Width::Quad || op.is_immediate() {
                self.emit(T::Push(op));
            } else {
                // A 4-byte memory operand pushed directly would push 8
                // bytes; funnel it through AX first.
                self.emit(T::Mov(Width::Long, op, Operand::Register(Register::AX)));
                self.emit(T::Push(Operand::Register(Register::AX)));
            }
        }

        for (i, arg) in int_args.iter().enumerate() {
            let w = self.width_of(arg);
            let op = self.operand(arg);
            self.emit(T::Mov(w, op, Operand::Register(ARG_REGISTERS[i])));
        }
        for (i, arg) in sse_args.iter().enumerate() {
            let op = self.double_operand(arg);
            self.emit(T::MovSd(op, Operand::Register(ARG_REGISTERS_SSE[i])));
        }

        let via_plt = !self.backend.is_defined_function(name);
        self.emit(T::Call {
            name: name.to_string(),
            via_plt,
        });

        let cleanup = 8 * stack_args.len() as i64 + padding;
        if cleanup > 0 {
            self.emit(T::Binary(
                target::BinaryOp::Add,
                Width::Quad,
                Operand::Immediate(cleanup),
                Operand::Register(Register::SP),
            ));
        }

        if self.is_double(dst) {
            let dst_op = self.operand(dst);
            self.emit(T::MovSd(Operand::Register(Register::Xmm(0)), dst_op));
        } else {
            let dst_width = self.width_of(dst);
            let dst_op = self.operand(dst);
            self.emit(T::Mov(dst_width, Operand::Register(Register::AX), dst_op));
        }
    }
}

fn constant_bits(c: &crate::ast::ConstantValue) -> i128 {
    match c {
        crate::ast::ConstantValue::Int32(v) => *v as i128,
        crate::ast::ConstantValue::Int64(v) => *v as i128,
        crate::ast::ConstantValue::UInt32(v) => *v as i128,
        crate::ast::ConstantValue::UInt64(v) => *v as i128,
        crate::ast::ConstantValue::Double(v) => v.to_bits() as i128,
    }
}

fn lower_static(s: &ir::StaticVariable) -> target::StaticVariable {
    use crate::symbol_table::{InitialValue, StaticInit};
    let alignment = s.ty.alignment();
    match &s.initial {
        StaticInit::Tentative => target::StaticVariable {
            name: s.name.clone(),
            global: s.global,
            alignment,
            zero: true,
            bytes: vec![0; s.ty.size()],
            read_only: false,
        },
        StaticInit::NoInit => target::StaticVariable {
            name: s.name.clone(),
            global: s.global,
            alignment,
            zero: true,
            bytes: Vec::new(),
            read_only: false,
        },
        StaticInit::Initial(v) => {
            let (bytes, zero) = match v {
                InitialValue::Int32(n) => (n.to_le_bytes().to_vec(), *n == 0),
                InitialValue::Int64(n) => (n.to_le_bytes().to_vec(), *n == 0),
                InitialValue::UInt32(n) => (n.to_le_bytes().to_vec(), *n == 0),
                InitialValue::UInt64(n) => (n.to_le_bytes().to_vec(), *n == 0),
                InitialValue::Double(n) => (n.to_bits().to_le_bytes().to_vec(), *n == 0.0),
            };
            target::StaticVariable {
                name: s.name.clone(),
                global: s.global,
                alignment,
                zero,
                bytes,
                read_only: false,
            }
        }
    }
}

fn float_literal_static(label: &str, bits: u64) -> target::StaticVariable {
    target::StaticVariable {
        name: label.to_string(),
        global: false,
        alignment: 8,
        zero: false,
        bytes: bits.to_le_bytes().to_vec(),
        read_only: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WarningManager;
    use crate::lexer::Lexer;
    use crate::name_gen::NameGenerator;
    use crate::parser::Parser;
    use crate::semantic::loop_label::LoopLabeler;
    use crate::semantic::resolver::Resolver;
    use crate::semantic::typecheck::TypeChecker;

    fn lower_to_target(src: &str) -> target::Program {
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
        let ir_program = ir::generator::IrGenerator::new(&mut symbols, &gen).generate_program(&program);
        let mut backend = BackendSymbolTable::from_symbol_table(&symbols);
        TargetGenerator::new(&symbols, &mut backend).generate_program(&ir_program)
    }

    #[test]
    fn return_constant_moves_into_ax() {
        let program = lower_to_target("int main(void) { return 2; }");
        let target::TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert!(f.instructions.iter().any(|i| matches!(
            i,
            target::Instruction::Mov(Width::Long, Operand::Immediate(2), Operand::Register(Register::AX))
        )));
    }

    #[test]
    fn six_plus_args_spill_to_stack() {
        let program = lower_to_target(
            "int f(int a,int b,int c,int d,int e,int g,int h){ return h; } int main(void){ return f(1,2,3,4,5,6,7); }",
        );
        let target::TopLevel::Function(main_fn) = program
            .top_level
            .iter()
            .find(|t| matches!(t, target::TopLevel::Function(f) if f.name == "main"))
            .unwrap()
        else {
            panic!()
        };
        assert!(main_fn.instructions.iter().any(|i| matches!(i, target::Instruction::Push(_))));
    }

    #[test]
    fn division_uses_cdq_and_idiv() {
        let program = lower_to_target("int main(void) { return 10 / 3; }");
        let target::TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert!(f.instructions.iter().any(|i| matches!(i, target::Instruction::Cdq)));
        assert!(f.instructions.iter().any(|i| matches!(i, target::Instruction::Idiv(..))));
    }

    #[test]
    fn double_addition_lowers_to_addsd_via_scratch() {
        let program = lower_to_target("int main(void) { double x = 1.0 + 2.0; return 0; }");
        let target::TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert!(f.instructions.iter().any(|i| matches!(
            i,
            target::Instruction::BinarySd(target::BinaryOp::Add, _, Operand::Register(Register::Xmm(8)))
        )));
        // both literals get hoisted to distinct deduplicated .rodata labels
        let labels: std::collections::HashSet<_> = program
            .top_level
            .iter()
            .filter_map(|t| match t {
                target::TopLevel::StaticVariable(s) if s.read_only => Some(s.name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn repeated_double_literal_is_not_hoisted_twice() {
        let program = lower_to_target("double f(double a) { return a + 1.5 + 1.5; }");
        let literals = program
            .top_level
            .iter()
            .filter(|t| matches!(t, target::TopLevel::StaticVariable(s) if s.read_only))
            .count();
        assert_eq!(literals, 1);
    }

    #[test]
    fn double_relational_uses_ucomisd_and_unsigned_setcc() {
        let program = lower_to_target("int main(void) { return 1.0 < 2.0; }");
        let target::TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert!(f.instructions.iter().any(|i| matches!(i, target::Instruction::UComiSd(..))));
        assert!(f
            .instructions
            .iter()
            .any(|i| matches!(i, target::Instruction::SetCC(Cc::B, _))));
    }

    #[test]
    fn double_argument_and_return_use_xmm_registers() {
        let program = lower_to_target("double f(double a) { return a; } int main(void) { f(1.0); return 0; }");
        let target::TopLevel::Function(f) = program
            .top_level
            .iter()
            .find_map(|t| match t {
                target::TopLevel::Function(f) if f.name == "f" => Some(f),
                _ => None,
            })
            .unwrap();
        assert!(f
            .instructions
            .iter()
            .any(|i| matches!(i, target::Instruction::MovSd(Operand::Register(Register::Xmm(0)), _))));

        let target::TopLevel::Function(main_fn) = program
            .top_level
            .iter()
            .find_map(|t| match t {
                target::TopLevel::Function(f) if f.name == "main" => Some(f),
                _ => None,
            })
            .unwrap();
        assert!(main_fn
            .instructions
            .iter()
            .any(|i| matches!(i, target::Instruction::MovSd(_, Operand::Register(Register::Xmm(0))))));
    }

    #[test]
    fn int_to_double_cast_uses_cvtsi2sd() {
        let program = lower_to_target("double f(int a) { return (double)a; }");
        let target::TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert!(f.instructions.iter().any(|i| matches!(i, target::Instruction::Cvtsi2sd(..))));
    }

    #[test]
    fn double_to_int_cast_uses_cvttsd2si() {
        let program = lower_to_target("int f(double a) { return (int)a; }");
        let target::TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert!(f.instructions.iter().any(|i| matches!(i, target::Instruction::Cvttsd2si(..))));
    }
}
