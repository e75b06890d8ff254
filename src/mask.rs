/// XORマスクの導出
///
/// バイナリ側は比較前に各バイトを固定値でXORしている。
/// 値はバイナリから読まず、同じ計算を再現して求める

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaskParams {
    /// アキュムレータ初期値
    pub seed: u32,
    /// [0, range_end) を走査
    pub range_end: u32,
    /// 加算しない値
    pub exclusions: Vec<u32>,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            seed: 3,
            range_end: 100,
            exclusions: vec![13, 27, 87],
        }
    }
}

pub fn derive_mask(params: &MaskParams) -> u8 {
    let acc = (0..params.range_end)
        .filter(|i| !params.exclusions.contains(i))
        .fold(params.seed, |acc, i| acc.wrapping_add(i % 10 + 1));

    (acc & 0xFF) as u8
}

/// 8バイトそれぞれを独立にXOR
pub fn xor_bytes(value: u64, mask: u8) -> u64 {
    let mut bytes = value.to_le_bytes();
    for b in bytes.iter_mut() {
        *b ^= mask;
    }
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mask() {
        // 3 + 550 - (4 + 8 + 8) = 533 = 0x215
        assert_eq!(derive_mask(&MaskParams::default()), 0x15);
        assert_eq!(derive_mask(&MaskParams::default()), derive_mask(&MaskParams::default()));
    }

    #[test]
    fn test_exclusions_change_mask() {
        let params = MaskParams {
            exclusions: vec![],
            ..MaskParams::default()
        };
        // 553 = 0x229
        assert_eq!(derive_mask(&params), 0x29);
    }

    #[test]
    fn test_xor_is_bytewise() {
        assert_eq!(xor_bytes(0, 0x15), 0x1515151515151515);
        assert_eq!(xor_bytes(0xFF00FF00FF00FF00, 0xFF), 0x00FF00FF00FF00FF);
        assert_eq!(xor_bytes(0x1234, 0), 0x1234);
    }

    #[test]
    fn test_xor_idempotence() {
        let values = [0u64, 1, u64::MAX, 0x0123456789ABCDEF, 0x8000000000000001];
        for &v in &values {
            for mask in [0u8, 0x15, 0x80, 0xFF] {
                assert_eq!(xor_bytes(xor_bytes(v, mask), mask), v);
            }
        }
    }
}
