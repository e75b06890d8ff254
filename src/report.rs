/// JSONレポート出力（--report）
///
/// 検証済みの復元結果だけを書く。セクションはxxh3で指紋を取る

use crate::analysis::ConstantSite;
use crate::pipeline::Recovery;
use crate::tea::Key;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// 解析結果のJSONレポート
#[derive(Debug, Serialize)]
pub struct RecoveryReport {
    pub binary: String,
    pub format: String,
    pub section: SectionSummary,
    pub instruction_count: usize,
    pub delta_anchor: Option<String>,
    pub key: Vec<String>,
    pub key_address: String,
    pub constants: Vec<ConstantSummary>,
    pub xor_byte: String,
    pub solutions: Vec<SolutionSummary>,
}

#[derive(Debug, Serialize)]
pub struct SectionSummary {
    pub name: String,
    pub address: String,
    pub size: usize,
    /// xxh3-64（同じバイナリかどうかの確認用）
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct ConstantSummary {
    pub address: String,
    pub register: Option<String>,
    pub value: String,
    pub compared: bool,
}

#[derive(Debug, Serialize)]
pub struct SolutionSummary {
    pub file: String,
    pub hex: String,
    pub text: String,
}

fn hex_key(key: &Key) -> Vec<String> {
    key.iter().map(|w| format!("0x{:08x}", w)).collect()
}

fn constant_summary(site: &ConstantSite) -> ConstantSummary {
    ConstantSummary {
        address: format!("0x{:x}", site.address),
        register: site.register.map(|r| r.to_string()),
        value: format!("0x{:016x}", site.value),
        compared: site.compared,
    }
}

impl RecoveryReport {
    pub fn new(binary: &Path, recovery: &Recovery, outputs: &[String]) -> Self {
        let section = &recovery.section;

        Self {
            binary: binary.display().to_string(),
            format: recovery.format.clone(),
            section: SectionSummary {
                name: section.name.clone(),
                address: format!("0x{:x}", section.address),
                size: section.bytes.len(),
                fingerprint: format!("{:016x}", xxh3_64(&section.bytes)),
            },
            instruction_count: recovery.instruction_count,
            delta_anchor: recovery.key.anchor.map(|a| format!("0x{:x}", a)),
            key: hex_key(&recovery.key.key),
            key_address: format!("0x{:x}", recovery.key.base_address),
            constants: recovery.constants.iter().map(constant_summary).collect(),
            xor_byte: format!("0x{:02x}", recovery.mask),
            solutions: recovery
                .solutions
                .iter()
                .zip(outputs)
                .map(|(s, file)| SolutionSummary {
                    file: file.clone(),
                    hex: s.bytes().iter().map(|b| format!("{:02x}", b)).collect(),
                    text: s.text(),
                })
                .collect(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }
}
