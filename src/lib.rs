/// tea-recover ライブラリ
///
/// ストリップ済みバイナリからTEA鍵と比較定数を取り出し、
/// 2段TEAを逆算して入力を復元する

pub mod error;
pub mod config;
pub mod loader;
pub mod instruction;
pub mod disassembler;
pub mod analysis;
pub mod mask;
pub mod tea;
pub mod solver;
pub mod pipeline;
pub mod report;

pub use error::{RecoverError, Result};
pub use config::RecoverConfig;
pub use pipeline::{recover, PipelineOptions, Recovery};
