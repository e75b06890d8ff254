//! エラー型定義
//!
//! ヒューリスティックの失敗はそれぞれ名前付きのバリアントで表現する

use thiserror::Error;

/// tea-recover 統一エラー型
#[derive(Error, Debug)]
pub enum RecoverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse binary: {0}")]
    Parse(#[from] goblin::error::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unsupported binary format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported architecture: {0} (x86-64 required)")]
    UnsupportedArchitecture(String),

    #[error("Section not found: {name}")]
    SectionNotFound { name: String },

    #[error("Address range 0x{address:x}+0x{len:x} is not backed by any section")]
    AddressOutOfRange { address: u64, len: usize },

    #[error("Disassembly failed: {0}")]
    Disassembly(String),

    /// `add reg, DELTA` が見つからない
    #[error("TEA delta anchor 0x{delta:08x} not found in code")]
    DeltaAnchorNotFound { delta: u32 },

    /// 4ワード連続のキー配列が見つからない
    #[error("No contiguous 4-word key cluster among {candidates} immediate stores")]
    KeyClusterNotFound { candidates: usize },

    /// movabs 定数が2個未満
    #[error("Expected at least 2 wide immediate loads, found {found}")]
    ConstantsNotFound { found: usize },

    /// 復号結果を再暗号化しても期待値と一致しない
    #[error("Verification failed for solution {index}: expected 0x{expected:016x}, got 0x{actual:016x}")]
    VerificationFailed { index: usize, expected: u64, actual: u64 },
}

pub type Result<T> = std::result::Result<T, RecoverError>;
