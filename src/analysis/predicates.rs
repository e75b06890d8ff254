/// 命令単位のヒューリスティック判定
///
/// どれも単一命令（または小さな集合）に対する純粋関数なので、
/// 合成した命令列だけで個別にテストできる

use crate::instruction::{Instruction, Register};

/// RIP相対の即値ストア `mov [rip+disp], imm`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmediateStore {
    pub address: u64,
    /// 下位32bitに切り詰めた即値
    pub value: u32,
    pub effective_address: u64,
}

/// `movabs reg, imm64` の即値ロード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideLoad {
    pub address: u64,
    pub register: Option<Register>,
    pub value: u64,
}

/// `add x, delta` か（即値は下位32bitで比較）
pub fn is_delta_add(insn: &Instruction, delta: u32) -> bool {
    insn.mnemonic == "add"
        && insn
            .operands
            .iter()
            .filter_map(|op| op.immediate())
            .any(|imm| imm as u32 == delta)
}

pub fn rip_relative_imm_store(insn: &Instruction) -> Option<ImmediateStore> {
    if insn.mnemonic != "mov" || insn.operands.len() != 2 {
        return None;
    }

    let effective_address = insn.effective_address(&insn.operands[0])?;
    let imm = insn.operands[1].immediate()?;

    Some(ImmediateStore {
        address: insn.address,
        value: imm as u32,
        effective_address,
    })
}

/// 制御用の小さな定数を除外する
pub fn is_key_sized(value: u32, min_immediate: u32) -> bool {
    value >= min_immediate
}

/// 32bit範囲を超える即値のmovabs
pub fn wide_immediate_load(insn: &Instruction) -> Option<WideLoad> {
    if insn.mnemonic != "movabs" || insn.operands.len() != 2 {
        return None;
    }

    // 負値は2の補数としてu64に
    let value = insn.operands.iter().find_map(|op| op.immediate())? as u64;
    if value <= u32::MAX as u64 {
        return None;
    }

    Some(WideLoad {
        address: insn.address,
        register: insn.operands.iter().find_map(|op| op.register()),
        value,
    })
}

/// 実効アドレスが4バイト間隔で連続しているか（昇順ソート済みが前提）
pub fn is_contiguous_words(addresses: &[u64]) -> bool {
    addresses
        .windows(2)
        .all(|pair| pair[1].wrapping_sub(pair[0]) == 4)
}

/// reg を読む比較命令か
pub fn compares_register(insn: &Instruction, reg: Register) -> bool {
    matches!(insn.mnemonic.as_str(), "cmp" | "test")
        && insn.operands.iter().any(|op| op.register() == Some(reg))
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_delta_add() {
        assert!(is_delta_add(&add_imm(0x10, Register::RAX, 0x9e3779b9), 0x9e3779b9));
        // 64-bit加算では符号拡張された値で現れる
        assert!(is_delta_add(&add_imm(0x10, Register::RAX, -0x61c88647), 0x9e3779b9));
        assert!(!is_delta_add(&add_imm(0x10, Register::RAX, 0x9e3779b8), 0x9e3779b9));
        assert!(!is_delta_add(&movabs(0x10, Register::RAX, 0x9e3779b9), 0x9e3779b9));
    }

    #[test]
    fn test_rip_store() {
        let store = rip_relative_imm_store(&rip_store(0x1000, 0x20, 0xdeadbeef)).unwrap();
        assert_eq!(store.value, 0xdeadbeef);
        assert_eq!(store.effective_address, 0x1000 + 10 + 0x20);

        assert!(rip_relative_imm_store(&stack_store(0x1000, -0x10, 0xdeadbeef)).is_none());
        assert!(rip_relative_imm_store(&nop(0x1000)).is_none());
    }

    #[test]
    fn test_key_sized_threshold() {
        assert!(is_key_sized(0x10000000, 0x10000000));
        assert!(!is_key_sized(0x0fffffff, 0x10000000));
    }

    #[test]
    fn test_wide_load() {
        let load = wide_immediate_load(&movabs(0x10, Register::RDX, 0x1_0000_0000)).unwrap();
        assert_eq!(load.value, 0x1_0000_0000);
        assert_eq!(load.register, Some(Register::RDX));

        let negative = wide_immediate_load(&movabs(0x10, Register::RAX, -2)).unwrap();
        assert_eq!(negative.value, 0xFFFF_FFFF_FFFF_FFFE);

        assert!(wide_immediate_load(&movabs(0x10, Register::RAX, 0xFFFF_FFFF)).is_none());
    }

    #[test]
    fn test_contiguous_words() {
        assert!(is_contiguous_words(&[0x100, 0x104, 0x108, 0x10c]));
        assert!(!is_contiguous_words(&[0x100, 0x104, 0x10c, 0x110]));
        assert!(!is_contiguous_words(&[0x100, 0x100, 0x104, 0x108]));
    }

    #[test]
    fn test_compares_register() {
        assert!(compares_register(&cmp_reg(0x10, Register::RAX, Register::RDX), Register::RDX));
        assert!(!compares_register(&cmp_reg(0x10, Register::RAX, Register::RDX), Register::RCX));
        assert!(!compares_register(&movabs(0x10, Register::RCX, 0x1_0000_0000), Register::RCX));
    }
}
