/// 逆アセンブル結果の命令レコード
///
/// Capstoneの型に依存しない形で保持するので、解析側は合成した命令列でテストできる

use serde::Serialize;
use std::fmt;

/// x86-64レジスタ（サブレジスタは64-bit親レジスタに畳み込む）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Register {
    RAX,
    RCX,
    RDX,
    RBX,
    RSP,
    RBP,
    RSI,
    RDI,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
    RIP,
    /// 上記以外（セグメント、XMM等）。Capstoneのレジスタ番号をそのまま保持
    Other(u32),
}

impl Register {
    /// レジスタ名からパース（"eax" → RAX）
    pub fn from_name(name: &str) -> Option<Self> {
        let reg = match name.to_lowercase().as_str() {
            "rax" | "eax" | "ax" | "al" => Self::RAX,
            "rcx" | "ecx" | "cx" | "cl" => Self::RCX,
            "rdx" | "edx" | "dx" | "dl" => Self::RDX,
            "rbx" | "ebx" | "bx" | "bl" => Self::RBX,
            "rsp" | "esp" | "sp" | "spl" => Self::RSP,
            "rbp" | "ebp" | "bp" | "bpl" => Self::RBP,
            "rsi" | "esi" | "si" | "sil" => Self::RSI,
            "rdi" | "edi" | "di" | "dil" => Self::RDI,
            "r8" | "r8d" | "r8w" | "r8b" => Self::R8,
            "r9" | "r9d" | "r9w" | "r9b" => Self::R9,
            "r10" | "r10d" | "r10w" | "r10b" => Self::R10,
            "r11" | "r11d" | "r11w" | "r11b" => Self::R11,
            "r12" | "r12d" | "r12w" | "r12b" => Self::R12,
            "r13" | "r13d" | "r13w" | "r13b" => Self::R13,
            "r14" | "r14d" | "r14w" | "r14b" => Self::R14,
            "r15" | "r15d" | "r15w" | "r15b" => Self::R15,
            "rip" | "eip" => Self::RIP,
            _ => return None,
        };
        Some(reg)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Other(id) => write!(f, "reg#{}", id),
            other => write!(f, "{}", format!("{:?}", other).to_lowercase()),
        }
    }
}

/// オペランドの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// レジスタ
    Register { reg: Register, size: u8 },
    /// メモリ [base + index*scale + disp]
    Memory {
        base: Option<Register>,
        index: Option<Register>,
        scale: u8,
        displacement: i64,
        size: u8,
    },
    /// 即値（Capstoneと同じく符号付きで保持）
    Immediate { value: i64, size: u8 },
}

impl Operand {
    pub fn immediate(&self) -> Option<i64> {
        match self {
            Operand::Immediate { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn register(&self) -> Option<Register> {
        match self {
            Operand::Register { reg, .. } => Some(*reg),
            _ => None,
        }
    }

    /// [rip + disp] 形式ならdispを返す
    pub fn rip_displacement(&self) -> Option<i64> {
        match self {
            Operand::Memory { base: Some(Register::RIP), index: None, displacement, .. } => Some(*displacement),
            _ => None,
        }
    }
}

/// 1命令分のレコード（生成後は不変）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub address: u64,
    pub size: u8,
    pub mnemonic: String,
    pub op_str: String,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(address: u64, size: u8, mnemonic: &str, operands: Vec<Operand>) -> Self {
        Self {
            address,
            size,
            mnemonic: mnemonic.to_string(),
            op_str: String::new(),
            operands,
        }
    }

    /// 次の命令のアドレス（RIP相対の基準）
    pub fn next_address(&self) -> u64 {
        self.address.wrapping_add(self.size as u64)
    }

    /// RIP相対メモリオペランドの実効アドレス
    /// = 命令アドレス + 命令長 + disp
    pub fn effective_address(&self, operand: &Operand) -> Option<u64> {
        operand
            .rip_displacement()
            .map(|disp| self.next_address().wrapping_add(disp as u64))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}:  {:<8}  {}", self.address, self.mnemonic, self.op_str)
    }
}
