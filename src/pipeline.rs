/// 解析パイプライン
///
/// ロード → コードセクション → 逆アセンブル → 鍵/定数検出 → 復号・検証。
/// 一方通行で、どの段の失敗も即座に返す（再試行はしない）

use crate::analysis::{ConstantLocator, ConstantSite, KeyDiscovery, KeyLocator};
use crate::config::RecoverConfig;
use crate::disassembler::{self, Disassembler};
use crate::error::Result;
use crate::instruction::Instruction;
use crate::loader::{CodeSection, LoadedBinary};
use crate::mask::derive_mask;
use crate::solver::{Solution, Solver};
use crate::tea::{Cascade, Tea};
use std::path::Path;
use tracing::{debug, info};

/// パイプライン全体の結果（レポート出力にも使う）
#[derive(Debug, Clone)]
pub struct Recovery {
    pub format: String,
    pub section: CodeSection,
    pub instruction_count: usize,
    pub key: KeyDiscovery,
    pub constants: [ConstantSite; 2],
    pub mask: u8,
    pub solutions: [Solution; 2],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// 全命令をログに出す
    pub dump_disassembly: bool,
}

pub fn recover(binary_path: &Path, config: &RecoverConfig, options: PipelineOptions) -> Result<Recovery> {
    config.validate()?;

    let binary = LoadedBinary::open(binary_path)?;
    info!(
        "{} {} binary, entry point 0x{:x}",
        binary.format, binary.architecture, binary.entry_point
    );
    for s in binary.sections() {
        debug!("  {:<20} 0x{:016x} 0x{:x}", s.name, s.address, s.size);
    }

    let section = binary.code_section(&config.section)?;

    let instructions = Disassembler::new()?.decode(&section)?;
    if options.dump_disassembly {
        disassembler::dump(&instructions);
    }

    recover_from_instructions(&instructions, config, &binary.format, section)
}

/// 逆アセンブル済みの命令列から先の処理
pub fn recover_from_instructions(
    instructions: &[Instruction],
    config: &RecoverConfig,
    format: &str,
    section: CodeSection,
) -> Result<Recovery> {
    // 鍵と定数は両方揃ってから復号に進む
    let key = KeyLocator::new(config.delta, config.key_min_immediate, config.require_delta_anchor)
        .locate(instructions)?;
    let constants = ConstantLocator::new(config.compare_window).locate(instructions)?;

    let mask = derive_mask(&config.mask);
    info!("XOR byte: 0x{:02x}", mask);

    let cipher = Cascade::new(Tea::with_rounds(key.key, config.rounds), config.cascade_depth);
    let solutions = Solver::new(cipher, mask).solve([constants[0].value, constants[1].value])?;

    Ok(Recovery {
        format: format.to_string(),
        section,
        instruction_count: instructions.len(),
        key,
        constants,
        mask,
        solutions,
    })
}
