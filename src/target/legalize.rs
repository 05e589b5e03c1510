//! Instruction legalization (spec.md §4.7, C11).
//!
//! Runs after pseudo-register assignment, when every operand is a real
//! register, a stack slot, or a data symbol. Rewrites instructions that
//! violate x86-64 operand-class rules (two memory operands, an immediate
//! where the encoding forbids one, a 64-bit immediate that doesn't fit in
//! 32 bits) into an equivalent sequence using `R10`/`R11` as scratch. The
//! rewrites must preserve every instruction's observable effect; nothing
//! here is reordered across the instructions it replaces.

use crate::target::{BinaryOp, FunctionDefinition, Instruction, Operand, Program, Register, Width};
use crate::target::backend_symbols::BackendSymbolTable;

pub struct Legalizer<'a> {
    backend: &'a BackendSymbolTable,
}

const SRC_SCRATCH: Register = Register::R10;
const DST_SCRATCH: Register = Register::R11;

impl<'a> Legalizer<'a> {
    pub fn new(backend: &'a BackendSymbolTable) -> Self {
        Legalizer { backend }
    }

    #[tracing::instrument(skip(self, program))]
    pub fn legalize_program(&mut self, program: &mut Program) {
        for item in &mut program.top_level {
            if let crate::target::TopLevel::Function(f) = item {
                self.legalize_function(f);
            }
        }
    }

    fn legalize_function(&mut self, f: &mut FunctionDefinition) {
        let frame_size = self.backend.stack_frame_size(&f.name);
        let mut original = std::mem::take(&mut f.instructions).into_iter();
        let mut out = Vec::new();

        // The first two instructions are always the C9-emitted prologue
        // (`Push BP`, `Mov SP, BP`); the stack allocation is inserted right
        // after, once the real frame size is known.
        if let Some(push_bp) = original.next() {
            out.push(push_bp);
        }
        if let Some(mov_bp) = original.next() {
            out.push(mov_bp);
        }
        if frame_size > 0 {
            out.push(Instruction::Binary(
                BinaryOp::Sub,
                Width::Quad,
                Operand::Immediate(frame_size as i128),
                Operand::Register(Register::SP),
            ));
        }

        for instr in original {
            self.legalize_instruction(instr, &mut out);
        }

        f.instructions = out;
    }

    fn fits_i32(v: i128) -> bool {
        v >= i32::MIN as i128 && v <= i32::MAX as i128
    }

    /// Rule: a 64-bit immediate outside the `int32` range must be loaded
    /// into a scratch register before use as an `AddQ`/`SubQ`/`IMulQ`/`Cmp`
    /// source or a `Push` operand.
    fn fix_oversized_imm(w: Width, op: Operand, out: &mut Vec<Instruction>) -> Operand {
        if w == Width::Quad {
            if let Operand::Immediate(v) = op {
                if !Self::fits_i32(v) {
                    out.push(Instruction::Mov(Width::Quad, Operand::Immediate(v), Operand::Register(SRC_SCRATCH)));
                    return Operand::Register(SRC_SCRATCH);
                }
            }
        }
        op
    }

    fn legalize_instruction(&mut self, instr: Instruction, out: &mut Vec<Instruction>) {
        match instr {
            Instruction::Mov(w, src, dst) => {
                if src.is_memory() && dst.is_memory() {
                    out.push(Instruction::Mov(w, src, Operand::Register(SRC_SCRATCH)));
                    out.push(Instruction::Mov(w, Operand::Register(SRC_SCRATCH), dst));
                } else {
                    out.push(Instruction::Mov(w, src, dst));
                }
            }
            Instruction::Movsx(src, dst) => {
                let src = if src.is_immediate() {
                    out.push(Instruction::Mov(Width::Long, src, Operand::Register(SRC_SCRATCH)));
                    Operand::Register(SRC_SCRATCH)
                } else {
                    src
                };
                if dst.is_memory() {
                    out.push(Instruction::Movsx(src, Operand::Register(DST_SCRATCH)));
                    out.push(Instruction::Mov(Width::Quad, Operand::Register(DST_SCRATCH), dst));
                } else {
                    out.push(Instruction::Movsx(src, dst));
                }
            }
            Instruction::Binary(BinaryOp::Mult, w, src, dst) => {
                let src = Self::fix_oversized_imm(w, src, out);
                if dst.is_memory() {
                    out.push(Instruction::Mov(w, dst.clone(), Operand::Register(DST_SCRATCH)));
                    out.push(Instruction::Binary(BinaryOp::Mult, w, src, Operand::Register(DST_SCRATCH)));
                    out.push(Instruction::Mov(w, Operand::Register(DST_SCRATCH), dst));
                } else {
                    out.push(Instruction::Binary(BinaryOp::Mult, w, src, dst));
                }
            }
            Instruction::Binary(op, w, src, dst) => {
                let src = Self::fix_oversized_imm(w, src, out);
                if src.is_memory() && dst.is_memory() {
                    out.push(Instruction::Mov(w, src, Operand::Register(SRC_SCRATCH)));
                    out.push(Instruction::Binary(op, w, Operand::Register(SRC_SCRATCH), dst));
                } else {
                    out.push(Instruction::Binary(op, w, src, dst));
                }
            }
            Instruction::Cmp(w, src, dst) => {
                let src = Self::fix_oversized_imm(w, src, out);
                let dst = if dst.is_immediate() {
                    out.push(Instruction::Mov(w, dst, Operand::Register(DST_SCRATCH)));
                    Operand::Register(DST_SCRATCH)
                } else {
                    dst
                };
                if src.is_memory() && dst.is_memory() {
                    out.push(Instruction::Mov(w, src, Operand::Register(SRC_SCRATCH)));
                    out.push(Instruction::Cmp(w, Operand::Register(SRC_SCRATCH), dst));
                } else {
                    out.push(Instruction::Cmp(w, src, dst));
                }
            }
            Instruction::Idiv(w, op) => {
                if op.is_immediate() {
                    out.push(Instruction::Mov(w, op, Operand::Register(SRC_SCRATCH)));
                    out.push(Instruction::Idiv(w, Operand::Register(SRC_SCRATCH)));
                } else {
                    out.push(Instruction::Idiv(w, op));
                }
            }
            Instruction::Push(op) => {
                let op = Self::fix_oversized_imm(Width::Quad, op, out);
                out.push(Instruction::Push(op));
            }
            Instruction::Cvtsi2sd(w, src, dst) => {
                // `cvtsi2sd` can't take an immediate source.
                if src.is_immediate() {
                    out.push(Instruction::Mov(w, src, Operand::Register(SRC_SCRATCH)));
                    out.push(Instruction::Cvtsi2sd(w, Operand::Register(SRC_SCRATCH), dst));
                } else {
                    out.push(Instruction::Cvtsi2sd(w, src, dst));
                }
            }
            Instruction::Cvttsd2si(w, src, dst) => {
                // `cvttsd2si`'s destination must be a general-purpose
                // register; shuttle through one if the pseudo landed on the
                // stack.
                if dst.is_memory() {
                    out.push(Instruction::Cvttsd2si(w, src, Operand::Register(DST_SCRATCH)));
                    out.push(Instruction::Mov(w, Operand::Register(DST_SCRATCH), dst));
                } else {
                    out.push(Instruction::Cvttsd2si(w, src, dst));
                }
            }
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TopLevel;

    fn run(instructions: Vec<Instruction>, frame_size: i64) -> Vec<Instruction> {
        let mut program = Program {
            top_level: vec![TopLevel::Function(FunctionDefinition {
                name: "f".into(),
                global: true,
                instructions,
            })],
        };

        let mut symbols = crate::symbol_table::SymbolTable::new();
        symbols.insert(
            "f",
            crate::symbol_table::SymbolEntry {
                ty: crate::types::Type::function(crate::types::Type::Int32, vec![]),
                attribute: crate::symbol_table::Attribute::Function {
                    defined: true,
                    global: true,
                },
            },
        );
        let mut backend = BackendSymbolTable::from_symbol_table(&symbols);
        backend.set_stack_frame_size("f", frame_size);

        Legalizer::new(&backend).legalize_program(&mut program);
        let TopLevel::Function(f) = &program.top_level[0] else {
            panic!()
        };
        f.instructions.clone()
    }

    #[test]
    fn mem_to_mem_mov_shuttles_through_r10() {
        let out = run(
            vec![
                Instruction::Push(Operand::Register(Register::BP)),
                Instruction::Mov(Width::Quad, Operand::Register(Register::SP), Operand::Register(Register::BP)),
                Instruction::Mov(Width::Long, Operand::StackAddress(-4), Operand::StackAddress(-8)),
            ],
            16,
        );
        let shuttled = out.iter().any(|i| matches!(i, Instruction::Mov(_, Operand::StackAddress(-4), Operand::Register(Register::R10))));
        assert!(shuttled);
    }

    #[test]
    fn cmp_with_immediate_dst_shuttles_through_r11() {
        let out = run(
            vec![
                Instruction::Push(Operand::Register(Register::BP)),
                Instruction::Mov(Width::Quad, Operand::Register(Register::SP), Operand::Register(Register::BP)),
                Instruction::Cmp(Width::Long, Operand::StackAddress(-4), Operand::Immediate(0)),
            ],
            16,
        );
        assert!(out.iter().any(|i| matches!(i, Instruction::Mov(_, Operand::Immediate(0), Operand::Register(Register::R11)))));
    }

    #[test]
    fn stack_allocation_is_inserted_after_prologue() {
        let out = run(
            vec![
                Instruction::Push(Operand::Register(Register::BP)),
                Instruction::Mov(Width::Quad, Operand::Register(Register::SP), Operand::Register(Register::BP)),
            ],
            32,
        );
        assert!(matches!(
            out[2],
            Instruction::Binary(BinaryOp::Sub, Width::Quad, Operand::Immediate(32), Operand::Register(Register::SP))
        ));
    }
}
