//! Assembly text emitter (spec.md §4.8, C12).
//!
//! Pure serialization: no rewriting, no validation beyond what the type
//! system already enforces. Produces GNU AT&T syntax assembleable by the
//! system toolchain (spec.md §6 "Assembly output").

use crate::target::{Cc, FunctionDefinition, Instruction, Operand, Program, Register, StaticVariable, TopLevel, Width};
use std::fmt::Write as _;

pub struct AssemblyEmitter;

impl AssemblyEmitter {
    pub fn new() -> Self {
        AssemblyEmitter
    }

    #[tracing::instrument(skip(self, program))]
    pub fn emit_program(&self, program: &Program) -> String {
        let mut out = String::new();
        for item in &program.top_level {
            match item {
                TopLevel::Function(f) => self.emit_function(&mut out, f),
                TopLevel::StaticVariable(s) => self.emit_static(&mut out, s),
            }
        }
        writeln!(out, "\t.section .note.GNU-stack,\"\",@progbits").unwrap();
        out
    }

    fn emit_function(&self, out: &mut String, f: &FunctionDefinition) {
        if f.global {
            writeln!(out, "\t.globl {}", f.name).unwrap();
        }
        writeln!(out, "\t.text").unwrap();
        writeln!(out, "{}:", f.name).unwrap();
        for instr in &f.instructions {
            self.emit_instruction(out, instr);
        }
    }

    fn emit_static(&self, out: &mut String, s: &StaticVariable) {
        if s.global {
            writeln!(out, "\t.globl {}", s.name).unwrap();
        }
        if s.zero {
            writeln!(out, "\t.bss").unwrap();
            writeln!(out, "\t.balign {}", s.alignment).unwrap();
            writeln!(out, "{}:", s.name).unwrap();
            let size = if s.bytes.is_empty() { s.alignment } else { s.bytes.len() };
            writeln!(out, "\t.zero {size}").unwrap();
        } else {
            writeln!(out, "\t{}", if s.read_only { ".section .rodata" } else { ".data" }).unwrap();
            writeln!(out, "\t.balign {}", s.alignment).unwrap();
            writeln!(out, "{}:", s.name).unwrap();
            for chunk in s.bytes.chunks(8) {
                if chunk.len() == 8 {
                    let v = u64::from_le_bytes(chunk.try_into().unwrap());
                    writeln!(out, "\t.quad {v}").unwrap();
                } else if chunk.len() == 4 {
                    let v = u32::from_le_bytes(chunk.try_into().unwrap());
                    writeln!(out, "\t.long {v}").unwrap();
                } else {
                    for byte in chunk {
                        writeln!(out, "\t.byte {byte}").unwrap();
                    }
                }
            }
        }
    }

    fn emit_instruction(&self, out: &mut String, instr: &Instruction) {
        match instr {
            Instruction::Mov(w, src, dst) => {
                writeln!(out, "\tmov{}\t{}, {}", w.suffix(), self.operand(w, src), self.operand(w, dst)).unwrap();
            }
            Instruction::Movsx(src, dst) => {
                writeln!(
                    out,
                    "\tmovslq\t{}, {}",
                    self.operand(&Width::Long, src),
                    self.operand(&Width::Quad, dst)
                )
                .unwrap();
            }
            Instruction::Unary(op, w, operand) => {
                let mnemonic = match op {
                    crate::target::UnaryOp::Neg => "neg",
                    crate::target::UnaryOp::Not => "not",
                };
                writeln!(out, "\t{}{}\t{}", mnemonic, w.suffix(), self.operand(w, operand)).unwrap();
            }
            Instruction::Binary(op, w, src, dst) => {
                let mnemonic = match op {
                    crate::target::BinaryOp::Add => "add",
                    crate::target::BinaryOp::Sub => "sub",
                    crate::target::BinaryOp::Mult => "imul",
                    crate::target::BinaryOp::Div => {
                        unreachable!("InternalCompilerError: integer division lowers through Idiv, not Binary(Div)")
                    }
                };
                writeln!(out, "\t{}{}\t{}, {}", mnemonic, w.suffix(), self.operand(w, src), self.operand(w, dst)).unwrap();
            }
            Instruction::Cmp(w, src, dst) => {
                writeln!(out, "\tcmp{}\t{}, {}", w.suffix(), self.operand(w, src), self.operand(w, dst)).unwrap();
            }
            Instruction::Idiv(w, operand) => {
                writeln!(out, "\tidiv{}\t{}", w.suffix(), self.operand(w, operand)).unwrap();
            }
            Instruction::Cdq => {
                writeln!(out, "\tcltd").unwrap();
            }
            Instruction::Jmp(label) => {
                writeln!(out, "\tjmp\t.L{label}").unwrap();
            }
            Instruction::JmpCC(cc, label) => {
                writeln!(out, "\tj{}\t.L{label}", cc.mnemonic()).unwrap();
            }
            Instruction::SetCC(cc, operand) => {
                writeln!(out, "\tset{}\t{}", cc.mnemonic(), self.operand(&Width::Byte, operand)).unwrap();
            }
            Instruction::Push(operand) => {
                writeln!(out, "\tpushq\t{}", self.operand(&Width::Quad, operand)).unwrap();
            }
            Instruction::Call { name, via_plt } => {
                if *via_plt {
                    writeln!(out, "\tcall\t{name}@PLT").unwrap();
                } else {
                    writeln!(out, "\tcall\t{name}").unwrap();
                }
            }
            Instruction::Ret => {
                writeln!(out, "\tmovq\t%rbp, %rsp").unwrap();
                writeln!(out, "\tpopq\t%rbp").unwrap();
                writeln!(out, "\tret").unwrap();
            }
            Instruction::Label(name) => {
                writeln!(out, ".L{name}:").unwrap();
            }
            Instruction::MovSd(src, dst) => {
                writeln!(out, "\tmovsd\t{}, {}", self.xmm_operand(src), self.xmm_operand(dst)).unwrap();
            }
            Instruction::BinarySd(op, src, dst) => {
                let mnemonic = match op {
                    crate::target::BinaryOp::Add => "addsd",
                    crate::target::BinaryOp::Sub => "subsd",
                    crate::target::BinaryOp::Mult => "mulsd",
                    crate::target::BinaryOp::Div => "divsd",
                };
                writeln!(out, "\t{}\t{}, {}", mnemonic, self.xmm_operand(src), self.xmm_operand(dst)).unwrap();
            }
            Instruction::UComiSd(src, dst) => {
                writeln!(out, "\tucomisd\t{}, {}", self.xmm_operand(src), self.xmm_operand(dst)).unwrap();
            }
            Instruction::PxorZero(reg) => {
                writeln!(out, "\tpxor\t{}, {}", self.xmm_operand(reg), self.xmm_operand(reg)).unwrap();
            }
            Instruction::Cvttsd2si(w, src, dst) => {
                writeln!(out, "\tcvttsd2si{}\t{}, {}", w.suffix(), self.xmm_operand(src), self.operand(w, dst)).unwrap();
            }
            Instruction::Cvtsi2sd(w, src, dst) => {
                writeln!(out, "\tcvtsi2sd{}\t{}, {}", w.suffix(), self.operand(w, src), self.xmm_operand(dst)).unwrap();
            }
        }
    }

    /// Like [`Self::operand`], but for an operand known to carry a `double`:
    /// a register always renders as `%xmmN` regardless of `Width`, which
    /// doesn't apply to xmm registers the way it does to general-purpose
    /// ones.
    fn xmm_operand(&self, operand: &Operand) -> String {
        match operand {
            Operand::Register(Register::Xmm(n)) => format!("%xmm{n}"),
            other => self.operand(&Width::Quad, other),
        }
    }

    fn operand(&self, width: &Width, operand: &Operand) -> String {
        match operand {
            Operand::Immediate(v) => format!("${v}"),
            Operand::Register(r) => format!("%{}", register_name(*r, *width)),
            Operand::StackAddress(offset) => format!("{offset}(%rbp)"),
            Operand::DataOperand(name) => format!("{name}(%rip)"),
            Operand::PseudoRegister(name) => {
                unreachable!("InternalCompilerError: unresolved pseudo-register '{name}' reached the emitter")
            }
        }
    }
}

impl Default for AssemblyEmitter {
    fn default() -> Self {
        AssemblyEmitter::new()
    }
}

fn register_name(reg: Register, width: Width) -> &'static str {
    match (reg, width) {
        (Register::AX, Width::Byte) => "al",
        (Register::AX, Width::Word) => "ax",
        (Register::AX, Width::Long) => "eax",
        (Register::AX, Width::Quad) => "rax",
        (Register::CX, Width::Byte) => "cl",
        (Register::CX, Width::Word) => "cx",
        (Register::CX, Width::Long) => "ecx",
        (Register::CX, Width::Quad) => "rcx",
        (Register::DX, Width::Byte) => "dl",
        (Register::DX, Width::Word) => "dx",
        (Register::DX, Width::Long) => "edx",
        (Register::DX, Width::Quad) => "rdx",
        (Register::DI, Width::Byte) => "dil",
        (Register::DI, Width::Word) => "di",
        (Register::DI, Width::Long) => "edi",
        (Register::DI, Width::Quad) => "rdi",
        (Register::SI, Width::Byte) => "sil",
        (Register::SI, Width::Word) => "si",
        (Register::SI, Width::Long) => "esi",
        (Register::SI, Width::Quad) => "rsi",
        (Register::R8, Width::Byte) => "r8b",
        (Register::R8, Width::Word) => "r8w",
        (Register::R8, Width::Long) => "r8d",
        (Register::R8, Width::Quad) => "r8",
        (Register::R9, Width::Byte) => "r9b",
        (Register::R9, Width::Word) => "r9w",
        (Register::R9, Width::Long) => "r9d",
        (Register::R9, Width::Quad) => "r9",
        (Register::R10, Width::Byte) => "r10b",
        (Register::R10, Width::Word) => "r10w",
        (Register::R10, Width::Long) => "r10d",
        (Register::R10, Width::Quad) => "r10",
        (Register::R11, Width::Byte) => "r11b",
        (Register::R11, Width::Word) => "r11w",
        (Register::R11, Width::Long) => "r11d",
        (Register::R11, Width::Quad) => "r11",
        (Register::SP, _) => "rsp",
        (Register::BP, _) => "rbp",
        (Register::Xmm(_), _) => {
            unreachable!("InternalCompilerError: xmm registers are named by xmm_operand, not register_name")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{BinaryOp, UnaryOp};

    #[test]
    fn emits_globl_and_return_sequence() {
        let program = Program {
            top_level: vec![TopLevel::Function(FunctionDefinition {
                name: "main".into(),
                global: true,
                instructions: vec![
                    Instruction::Mov(Width::Long, Operand::Immediate(2), Operand::Register(Register::AX)),
                    Instruction::Ret,
                ],
            })],
        };
        let text = AssemblyEmitter::new().emit_program(&program);
        assert!(text.contains(".globl main"));
        assert!(text.contains("movl\t$2, %eax"));
        assert!(text.contains("ret"));
        assert!(text.ends_with(".section .note.GNU-stack,\"\",@progbits\n"));
    }

    #[test]
    fn emits_bss_for_tentative_static() {
        let program = Program {
            top_level: vec![TopLevel::StaticVariable(StaticVariable {
                name: "counter".into(),
                global: true,
                alignment: 4,
                zero: true,
                bytes: vec![0, 0, 0, 0],
                read_only: false,
            })],
        };
        let text = AssemblyEmitter::new().emit_program(&program);
        assert!(text.contains(".bss"));
        assert!(text.contains("counter:"));
        assert!(text.contains(".zero 4"));
    }

    #[test]
    fn external_call_gets_plt_suffix() {
        let program = Program {
            top_level: vec![TopLevel::Function(FunctionDefinition {
                name: "main".into(),
                global: true,
                instructions: vec![Instruction::Call {
                    name: "puts".into(),
                    via_plt: true,
                }],
            })],
        };
        let text = AssemblyEmitter::new().emit_program(&program);
        assert!(text.contains("call\tputs@PLT"));
    }

    #[test]
    fn unary_and_binary_mnemonics_are_suffixed_by_width() {
        let program = Program {
            top_level: vec![TopLevel::Function(FunctionDefinition {
                name: "f".into(),
                global: false,
                instructions: vec![
                    Instruction::Unary(UnaryOp::Neg, Width::Long, Operand::Register(Register::AX)),
                    Instruction::Binary(BinaryOp::Add, Width::Quad, Operand::Immediate(1), Operand::Register(Register::BP)),
                ],
            })],
        };
        let text = AssemblyEmitter::new().emit_program(&program);
        assert!(text.contains("negl\t%eax"));
        assert!(text.contains("addq\t$1, %rbp"));
    }
}
