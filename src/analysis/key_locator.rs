/// TEA鍵の検出
///
/// 1. `add x, DELTA` を探してアンカーとする（位置情報のみ）
/// 2. `mov [rip+disp], imm32` のうち大きな即値を候補にする
/// 3. 命令順に4個ずつのウィンドウで見て、実効アドレスが4バイト間隔で
///    連続するもの（= u32[4] 配列の初期化）を鍵とする

use super::predicates::{is_contiguous_words, is_delta_add, is_key_sized, rip_relative_imm_store, ImmediateStore};
use crate::error::{RecoverError, Result};
use crate::instruction::Instruction;
use crate::tea::Key;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyDiscovery {
    pub key: Key,
    /// DELTA加算命令のアドレス
    pub anchor: Option<u64>,
    /// 鍵配列先頭の実効アドレス
    pub base_address: u64,
}

pub struct KeyLocator {
    pub delta: u32,
    pub min_immediate: u32,
    pub require_anchor: bool,
}

impl KeyLocator {
    pub fn new(delta: u32, min_immediate: u32, require_anchor: bool) -> Self {
        Self {
            delta,
            min_immediate,
            require_anchor,
        }
    }

    pub fn find_anchor(&self, instructions: &[Instruction]) -> Option<u64> {
        instructions
            .iter()
            .find(|insn| is_delta_add(insn, self.delta))
            .map(|insn| insn.address)
    }

    /// 鍵候補（命令アドレス順）
    pub fn candidates(&self, instructions: &[Instruction]) -> Vec<ImmediateStore> {
        let mut candidates: Vec<_> = instructions
            .iter()
            .filter_map(rip_relative_imm_store)
            .filter(|store| is_key_sized(store.value, self.min_immediate))
            .collect();

        candidates.sort_by_key(|store| store.address);
        candidates
    }

    pub fn locate(&self, instructions: &[Instruction]) -> Result<KeyDiscovery> {
        let anchor = self.find_anchor(instructions);
        match anchor {
            Some(addr) => info!("Found TEA delta at 0x{:x}", addr),
            None if self.require_anchor => {
                return Err(RecoverError::DeltaAnchorNotFound { delta: self.delta });
            }
            None => warn!("TEA delta 0x{:08x} not found, continuing without anchor", self.delta),
        }

        let candidates = self.candidates(instructions);
        info!("Found {} potential key values", candidates.len());

        for window in candidates.windows(4) {
            let mut cluster = window.to_vec();
            cluster.sort_by_key(|store| store.effective_address);

            let addresses: Vec<u64> = cluster.iter().map(|s| s.effective_address).collect();
            if !is_contiguous_words(&addresses) {
                debug!("Rejected cluster starting at 0x{:x}", window[0].address);
                continue;
            }

            let key = [cluster[0].value, cluster[1].value, cluster[2].value, cluster[3].value];
            info!(
                "Found key array at 0x{:x}: [{:#010x}, {:#010x}, {:#010x}, {:#010x}]",
                addresses[0], key[0], key[1], key[2], key[3]
            );

            return Ok(KeyDiscovery {
                key,
                anchor,
                base_address: addresses[0],
            });
        }

        Err(RecoverError::KeyClusterNotFound {
            candidates: candidates.len(),
        })
    }
}
