//! 設定モジュール - JSON設定ファイルの読み込み
//!
//! 全項目にデフォルト値があり、ファイルを指定しない場合もそのまま動く

use crate::error::{RecoverError, Result};
use crate::mask::MaskParams;
use crate::tea::{DELTA, ROUNDS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// ヒューリスティックと出力先の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoverConfig {
    /// 走査するコードセクション名
    pub section: String,

    /// TEAのラウンド定数（アンカー検出用）
    pub delta: u32,

    /// キー候補とみなす即値の下限
    pub key_min_immediate: u32,

    /// アンカーが見つからない場合に失敗とするか
    pub require_delta_anchor: bool,

    /// movabs定数の後ろで比較命令を探す命令数
    pub compare_window: usize,

    pub rounds: u32,

    /// 同一鍵での暗号化段数
    pub cascade_depth: usize,

    pub mask: MaskParams,

    /// 解ごとの出力ファイル名
    pub outputs: Vec<String>,
}

impl Default for RecoverConfig {
    fn default() -> Self {
        Self {
            section: ".text".to_string(),
            delta: DELTA,
            key_min_immediate: 0x1000_0000,
            require_delta_anchor: true,
            compare_window: 16,
            rounds: ROUNDS,
            cascade_depth: 2,
            mask: MaskParams::default(),
            outputs: vec!["1.txt".to_string(), "2.txt".to_string()],
        }
    }
}

impl RecoverConfig {
    /// JSONファイルから読み込み（欠けた項目はデフォルト値）
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).map_err(|e| RecoverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.outputs.len() != 2 {
            return Err(RecoverError::Config(format!(
                "exactly 2 output files required, got {}",
                self.outputs.len()
            )));
        }
        if self.cascade_depth == 0 {
            return Err(RecoverError::Config("cascade_depth must be at least 1".to_string()));
        }
        if self.rounds == 0 {
            return Err(RecoverError::Config("rounds must be at least 1".to_string()));
        }
        Ok(())
    }
}
