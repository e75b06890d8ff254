/// 比較用64-bit定数の検出
///
/// 32bit範囲を超える `movabs` 即値のうち、命令順で最後の2つを採用する。
/// 位置だけに頼った推定なので、ロード先レジスタが直後の比較命令で
/// 使われているかを別途確認し、確認できなければ警告を出す

use super::predicates::{compares_register, wide_immediate_load, WideLoad};
use crate::error::{RecoverError, Result};
use crate::instruction::{Instruction, Register};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConstantSite {
    pub address: u64,
    pub register: Option<Register>,
    pub value: u64,
    /// ロード後 compare_window 命令以内で比較に使われているか
    pub compared: bool,
}

pub struct ConstantLocator {
    pub compare_window: usize,
}

impl ConstantLocator {
    pub fn new(compare_window: usize) -> Self {
        Self { compare_window }
    }

    /// 32bit範囲を超える即値ロードを命令順に全列挙
    pub fn wide_loads(&self, instructions: &[Instruction]) -> Vec<(usize, WideLoad)> {
        instructions
            .iter()
            .enumerate()
            .filter_map(|(i, insn)| wide_immediate_load(insn).map(|load| (i, load)))
            .collect()
    }

    pub fn locate(&self, instructions: &[Instruction]) -> Result<[ConstantSite; 2]> {
        let loads = self.wide_loads(instructions);
        info!("Found {} movabs 64-bit constants", loads.len());

        if loads.len() < 2 {
            return Err(RecoverError::ConstantsNotFound { found: loads.len() });
        }

        let last_two = &loads[loads.len() - 2..];
        let sites = [
            self.site(instructions, last_two[0]),
            self.site(instructions, last_two[1]),
        ];

        for site in &sites {
            if !site.compared {
                warn!(
                    "Constant 0x{:016x} at 0x{:x} is not compared within {} instructions (positional heuristic unconfirmed)",
                    site.value, site.address, self.compare_window
                );
            }
        }

        info!(
            "Extracted constants: [0x{:016x}, 0x{:016x}]",
            sites[0].value, sites[1].value
        );

        Ok(sites)
    }

    fn site(&self, instructions: &[Instruction], (index, load): (usize, WideLoad)) -> ConstantSite {
        let compared = load
            .register
            .map(|reg| self.is_compared_after(instructions, index, reg))
            .unwrap_or(false);

        ConstantSite {
            address: load.address,
            register: load.register,
            value: load.value,
            compared,
        }
    }

    fn is_compared_after(&self, instructions: &[Instruction], index: usize, reg: Register) -> bool {
        instructions
            .iter()
            .skip(index + 1)
            .take(self.compare_window)
            .any(|insn| compares_register(insn, reg))
    }
}
