/// Capstoneによる逆アセンブル
///
/// コードセクションのバイト列を `Instruction` レコード列に変換する。
/// デコード自体はCapstoneに任せ、ここではオペランド詳細の変換のみ行う

use crate::error::{RecoverError, Result};
use crate::instruction::{Instruction, Operand, Register};
use crate::loader::CodeSection;
use capstone::arch::x86::{X86OpMem, X86Operand, X86OperandType, X86Reg};
use capstone::prelude::*;
use tracing::{debug, info};

pub struct Disassembler {
    cs: Capstone,
}

impl Disassembler {
    /// x86-64用のエンジンを作成（詳細モード有効）
    pub fn new() -> Result<Self> {
        let cs = Capstone::new()
            .x86()
            .mode(capstone::arch::x86::ArchMode::Mode64)
            .detail(true)
            .build()
            .map_err(|e| RecoverError::Disassembly(format!("Failed to create Capstone engine: {}", e)))?;

        Ok(Self { cs })
    }

    /// セクション全体を逆アセンブル
    pub fn decode(&self, section: &CodeSection) -> Result<Vec<Instruction>> {
        self.decode_bytes(&section.bytes, section.address)
    }

    pub fn decode_bytes(&self, code: &[u8], base_address: u64) -> Result<Vec<Instruction>> {
        let insns = self
            .cs
            .disasm_all(code, base_address)
            .map_err(|e| RecoverError::Disassembly(e.to_string()))?;

        let mut records = Vec::with_capacity(insns.len());
        for insn in insns.iter() {
            let operands = match self.cs.insn_detail(insn) {
                Ok(detail) => {
                    let arch_detail = detail.arch_detail();
                    if let Some(x86_detail) = arch_detail.x86() {
                        x86_detail.operands().map(|op| convert_operand(&op)).collect()
                    } else {
                        Vec::new()
                    }
                }
                Err(e) => {
                    debug!("No detail for 0x{:x}: {}", insn.address(), e);
                    Vec::new()
                }
            };

            records.push(Instruction {
                address: insn.address(),
                size: insn.bytes().len() as u8,
                mnemonic: insn.mnemonic().unwrap_or("???").to_string(),
                op_str: insn.op_str().unwrap_or("").to_string(),
                operands,
            });
        }

        info!(
            count = records.len(),
            "Decoded instructions from 0x{:x} ({} bytes)",
            base_address,
            code.len()
        );

        Ok(records)
    }
}

/// 全命令をログに出力（--dump-disasm）
pub fn dump(instructions: &[Instruction]) {
    info!("=== Disassembly ({} instructions) ===", instructions.len());
    for insn in instructions {
        info!("{}", insn);
    }
    info!("=== End of disassembly ===");
}

fn convert_operand(op: &X86Operand) -> Operand {
    match &op.op_type {
        X86OperandType::Reg(reg) => Operand::Register {
            reg: capstone_reg_to_x86(*reg),
            size: op.size,
        },
        X86OperandType::Imm(imm) => Operand::Immediate {
            value: *imm,
            size: op.size,
        },
        X86OperandType::Mem(mem) => convert_memory(mem, op.size),
        // Invalid
        _ => Operand::Register {
            reg: Register::Other(0),
            size: op.size,
        },
    }
}

fn convert_memory(mem: &X86OpMem, size: u8) -> Operand {
    let base = if mem.base().0 != 0 {
        Some(capstone_reg_to_x86(mem.base()))
    } else {
        None
    };

    let index = if mem.index().0 != 0 {
        Some(capstone_reg_to_x86(mem.index()))
    } else {
        None
    };

    Operand::Memory {
        base,
        index,
        scale: mem.scale() as u8,
        displacement: mem.disp(),
        size,
    }
}

/// Capstoneレジスタ番号をRegisterに変換
fn capstone_reg_to_x86(reg: RegId) -> Register {
    let reg_id = reg.0 as u32;

    match reg_id {
        x if x == X86Reg::X86_REG_RAX as u32 || x == X86Reg::X86_REG_EAX as u32 || x == X86Reg::X86_REG_AX as u32 || x == X86Reg::X86_REG_AL as u32 => Register::RAX,
        x if x == X86Reg::X86_REG_RCX as u32 || x == X86Reg::X86_REG_ECX as u32 || x == X86Reg::X86_REG_CX as u32 || x == X86Reg::X86_REG_CL as u32 => Register::RCX,
        x if x == X86Reg::X86_REG_RDX as u32 || x == X86Reg::X86_REG_EDX as u32 || x == X86Reg::X86_REG_DX as u32 || x == X86Reg::X86_REG_DL as u32 => Register::RDX,
        x if x == X86Reg::X86_REG_RBX as u32 || x == X86Reg::X86_REG_EBX as u32 || x == X86Reg::X86_REG_BX as u32 || x == X86Reg::X86_REG_BL as u32 => Register::RBX,
        x if x == X86Reg::X86_REG_RSP as u32 || x == X86Reg::X86_REG_ESP as u32 || x == X86Reg::X86_REG_SP as u32 || x == X86Reg::X86_REG_SPL as u32 => Register::RSP,
        x if x == X86Reg::X86_REG_RBP as u32 || x == X86Reg::X86_REG_EBP as u32 || x == X86Reg::X86_REG_BP as u32 || x == X86Reg::X86_REG_BPL as u32 => Register::RBP,
        x if x == X86Reg::X86_REG_RSI as u32 || x == X86Reg::X86_REG_ESI as u32 || x == X86Reg::X86_REG_SI as u32 || x == X86Reg::X86_REG_SIL as u32 => Register::RSI,
        x if x == X86Reg::X86_REG_RDI as u32 || x == X86Reg::X86_REG_EDI as u32 || x == X86Reg::X86_REG_DI as u32 || x == X86Reg::X86_REG_DIL as u32 => Register::RDI,
        x if x == X86Reg::X86_REG_R8 as u32 || x == X86Reg::X86_REG_R8D as u32 || x == X86Reg::X86_REG_R8W as u32 || x == X86Reg::X86_REG_R8B as u32 => Register::R8,
        x if x == X86Reg::X86_REG_R9 as u32 || x == X86Reg::X86_REG_R9D as u32 || x == X86Reg::X86_REG_R9W as u32 || x == X86Reg::X86_REG_R9B as u32 => Register::R9,
        x if x == X86Reg::X86_REG_R10 as u32 || x == X86Reg::X86_REG_R10D as u32 || x == X86Reg::X86_REG_R10W as u32 || x == X86Reg::X86_REG_R10B as u32 => Register::R10,
        x if x == X86Reg::X86_REG_R11 as u32 || x == X86Reg::X86_REG_R11D as u32 || x == X86Reg::X86_REG_R11W as u32 || x == X86Reg::X86_REG_R11B as u32 => Register::R11,
        x if x == X86Reg::X86_REG_R12 as u32 || x == X86Reg::X86_REG_R12D as u32 || x == X86Reg::X86_REG_R12W as u32 || x == X86Reg::X86_REG_R12B as u32 => Register::R12,
        x if x == X86Reg::X86_REG_R13 as u32 || x == X86Reg::X86_REG_R13D as u32 || x == X86Reg::X86_REG_R13W as u32 || x == X86Reg::X86_REG_R13B as u32 => Register::R13,
        x if x == X86Reg::X86_REG_R14 as u32 || x == X86Reg::X86_REG_R14D as u32 || x == X86Reg::X86_REG_R14W as u32 || x == X86Reg::X86_REG_R14B as u32 => Register::R14,
        x if x == X86Reg::X86_REG_R15 as u32 || x == X86Reg::X86_REG_R15D as u32 || x == X86Reg::X86_REG_R15W as u32 || x == X86Reg::X86_REG_R15B as u32 => Register::R15,
        x if x == X86Reg::X86_REG_RIP as u32 || x == X86Reg::X86_REG_EIP as u32 => Register::RIP,
        other => Register::Other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rip_relative_store() {
        // mov dword ptr [rip + 0x100], 0x12345678
        let code = [0xc7, 0x05, 0x00, 0x01, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12];
        let disasm = Disassembler::new().unwrap();
        let insns = disasm.decode_bytes(&code, 0x1000).unwrap();

        assert_eq!(insns.len(), 1);
        let insn = &insns[0];
        assert_eq!(insn.mnemonic, "mov");
        assert_eq!(insn.size, 10);
        assert_eq!(insn.operands.len(), 2);
        assert_eq!(insn.effective_address(&insn.operands[0]), Some(0x1000 + 10 + 0x100));
        assert_eq!(insn.operands[1].immediate(), Some(0x12345678));
    }

    #[test]
    fn test_movabs() {
        // movabs rax, 0x1122334455667788
        let code = [0x48, 0xb8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
        let disasm = Disassembler::new().unwrap();
        let insns = disasm.decode_bytes(&code, 0x2000).unwrap();

        assert_eq!(insns.len(), 1);
        assert_eq!(insns[0].mnemonic, "movabs");
        assert_eq!(insns[0].operands[0].register(), Some(Register::RAX));
        assert_eq!(insns[0].operands[1].immediate(), Some(0x1122334455667788));
    }

    #[test]
    fn test_add_delta() {
        // add eax, 0x9e3779b9
        let code = [0x05, 0xb9, 0x79, 0x37, 0x9e];
        let disasm = Disassembler::new().unwrap();
        let insns = disasm.decode_bytes(&code, 0x3000).unwrap();

        assert_eq!(insns[0].mnemonic, "add");
        let imm = insns[0].operands[1].immediate().unwrap();
        assert_eq!(imm as u32, 0x9e3779b9);
    }
}
