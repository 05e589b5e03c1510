//! Pseudo-register assignment (spec.md §4.6, C10).
//!
//! Walks every instruction of every function, replacing each
//! `PseudoRegister(name)` operand in place: a name backed by a static
//! object becomes a `DataOperand`; everything else gets a naturally
//! aligned stack slot, assigned once per function and reused on every
//! later appearance of the same name.

use crate::target::backend_symbols::BackendSymbolTable;
use crate::target::{FunctionDefinition, Instruction, Operand, Program};
use std::collections::HashMap;

pub struct PseudoRegisterAssigner<'a> {
    backend: &'a mut BackendSymbolTable,
}

impl<'a> PseudoRegisterAssigner<'a> {
    pub fn new(backend: &'a mut BackendSymbolTable) -> Self {
        PseudoRegisterAssigner { backend }
    }

    #[tracing::instrument(skip(self, program))]
    pub fn assign_program(&mut self, program: &mut Program) {
        for item in &mut program.top_level {
            if let crate::target::TopLevel::Function(f) = item {
                self.assign_function(f);
            }
        }
    }

    fn assign_function(&mut self, f: &mut FunctionDefinition) {
        let mut offsets: HashMap<String, i64> = HashMap::new();
        let mut current_offset: i64 = 0;

        for instr in &mut f.instructions {
            for operand in operands_mut(instr) {
                self.resolve(operand, &mut offsets, &mut current_offset);
            }
        }

        let frame_size = round_up(current_offset, 16);
        self.backend.set_stack_frame_size(&f.name, frame_size);
    }

    fn resolve(&self, operand: &mut Operand, offsets: &mut HashMap<String, i64>, current_offset: &mut i64) {
        let name = match operand {
            Operand::PseudoRegister(name) => name.clone(),
            _ => return,
        };

        if self.backend.is_static_object(&name) {
            *operand = Operand::DataOperand(name);
            return;
        }

        let offset = *offsets.entry(name.clone()).or_insert_with(|| {
            let width = self
                .backend
                .get(&name)
                .map(|entry| match entry {
                    crate::target::backend_symbols::BackendEntry::Object { type_width, .. } => *type_width,
                    _ => 8,
                })
                .unwrap_or(8) as i64;
            let align = width.max(1);
            let aligned = round_up(*current_offset + width, align);
            *current_offset = aligned;
            aligned
        });
        *operand = Operand::StackAddress(-offset);
    }
}

fn round_up(value: i64, multiple: i64) -> i64 {
    if multiple <= 0 {
        return value;
    }
    ((value + multiple - 1) / multiple) * multiple
}

/// Every operand slot an instruction can carry, borrowed mutably so the
/// assigner (and later the legalizer) can rewrite operands without a
/// per-variant match at every call site.
fn operands_mut(instr: &mut Instruction) -> Vec<&mut Operand> {
    match instr {
        Instruction::Mov(_, a, b) => vec![a, b],
        Instruction::Movsx(a, b) => vec![a, b],
        Instruction::Unary(_, _, a) => vec![a],
        Instruction::Binary(_, _, a, b) => vec![a, b],
        Instruction::Cmp(_, a, b) => vec![a, b],
        Instruction::Idiv(_, a) => vec![a],
        Instruction::SetCC(_, a) => vec![a],
        Instruction::Push(a) => vec![a],
        Instruction::MovSd(a, b) => vec![a, b],
        Instruction::BinarySd(_, a, b) => vec![a, b],
        Instruction::UComiSd(a, b) => vec![a, b],
        Instruction::PxorZero(a) => vec![a],
        Instruction::Cvttsd2si(_, a, b) => vec![a, b],
        Instruction::Cvtsi2sd(_, a, b) => vec![a, b],
        Instruction::Cdq
        | Instruction::Jmp(_)
        | Instruction::JmpCC(..)
        | Instruction::Call { .. }
        | Instruction::Ret
        | Instruction::Label(_) => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{BinaryOp, Width};

    #[test]
    fn same_name_resolves_to_same_offset() {
        let mut backend = BackendSymbolTable::new();
        let ty = crate::types::Type::Int32;
        backend.insert_object("x", &ty, false);
        let f = FunctionDefinition {
            name: "f".into(),
            global: true,
            instructions: vec![
                Instruction::Mov(Width::Long, Operand::Immediate(1), Operand::PseudoRegister("x".into())),
                Instruction::Binary(
                    BinaryOp::Add,
                    Width::Long,
                    Operand::Immediate(1),
                    Operand::PseudoRegister("x".into()),
                ),
            ],
        };
        let mut program = Program {
            top_level: vec![crate::target::TopLevel::Function(f)],
        };
        PseudoRegisterAssigner::new(&mut backend).assign_program(&mut program);
        let crate::target::TopLevel::Function(lowered) = &program.top_level[0] else {
            panic!()
        };
        let Instruction::Mov(_, _, Operand::StackAddress(a)) = &lowered.instructions[0] else {
            panic!()
        };
        let Instruction::Binary(_, _, _, Operand::StackAddress(b)) = &lowered.instructions[1] else {
            panic!()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn stack_frame_size_is_multiple_of_sixteen() {
        let mut backend = BackendSymbolTable::new();
        let ty = crate::types::Type::Int32;
        backend.insert_object("x", &ty, false);
        let mut program = Program {
            top_level: vec![crate::target::TopLevel::Function(FunctionDefinition {
                name: "f".into(),
                global: true,
                instructions: vec![Instruction::Mov(
                    Width::Long,
                    Operand::Immediate(1),
                    Operand::PseudoRegister("x".into()),
                )],
            })],
        };
        PseudoRegisterAssigner::new(&mut backend).assign_program(&mut program);
        assert_eq!(backend.stack_frame_size("f") % 16, 0);
    }

    #[test]
    fn static_pseudo_becomes_data_operand() {
        let mut backend = BackendSymbolTable::new();
        let ty = crate::types::Type::Int32;
        backend.insert_object("g", &ty, true);
        let mut program = Program {
            top_level: vec![crate::target::TopLevel::Function(FunctionDefinition {
                name: "f".into(),
                global: true,
                instructions: vec![Instruction::Mov(
                    Width::Long,
                    Operand::Immediate(1),
                    Operand::PseudoRegister("g".into()),
                )],
            })],
        };
        PseudoRegisterAssigner::new(&mut backend).assign_program(&mut program);
        let crate::target::TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        assert!(matches!(f.instructions[0], Instruction::Mov(_, _, Operand::DataOperand(_))));
    }
}
