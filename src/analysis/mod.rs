/// 命令列からのTEAパラメータ抽出
///
/// 鍵: RIP相対の即値ストア群 / 定数: movabsの即値

pub mod predicates;
pub mod key_locator;
pub mod constant_locator;

pub use predicates::{ImmediateStore, WideLoad};
pub use key_locator::{KeyDiscovery, KeyLocator};
pub use constant_locator::{ConstantLocator, ConstantSite};
