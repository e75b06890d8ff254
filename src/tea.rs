/// TEA (Tiny Encryption Algorithm) ブロック暗号
///
/// 64-bitブロック（2×u32）、128-bit鍵（4×u32）、32ラウンド。
/// 対象バイナリは同じ鍵で2回暗号化するので `Cascade` で段数を表現する

use serde::Serialize;

/// ラウンド定数（黄金比由来）
pub const DELTA: u32 = 0x9E37_79B9;
pub const ROUNDS: u32 = 32;

/// 4ワード鍵（格納アドレス順）
pub type Key = [u32; 4];

/// 暗号の作業単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Block {
    pub v0: u32,
    pub v1: u32,
}

impl Block {
    pub fn new(v0: u32, v1: u32) -> Self {
        Self { v0, v1 }
    }

    /// 下位32bit → v0、上位32bit → v1
    pub fn from_u64(value: u64) -> Self {
        Self {
            v0: value as u32,
            v1: (value >> 32) as u32,
        }
    }

    pub fn to_u64(self) -> u64 {
        (self.v0 as u64) | ((self.v1 as u64) << 32)
    }

    /// v0, v1 をそれぞれリトルエンディアンで連結
    pub fn to_le_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.v0.to_le_bytes());
        out[4..].copy_from_slice(&self.v1.to_le_bytes());
        out
    }
}

/// ブロック単位の暗号化・復号
pub trait BlockCipher {
    fn encrypt(&self, block: Block) -> Block;
    fn decrypt(&self, block: Block) -> Block;
}

/// 1ブロック暗号化
pub fn encrypt_block(block: Block, key: &Key, rounds: u32) -> Block {
    let Block { mut v0, mut v1 } = block;
    let mut sum: u32 = 0;

    for _ in 0..rounds {
        sum = sum.wrapping_add(DELTA);
        v0 = v0.wrapping_add(
            (v1 << 4).wrapping_add(key[0]) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(key[1]),
        );
        v1 = v1.wrapping_add(
            (v0 << 4).wrapping_add(key[2]) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(key[3]),
        );
    }

    Block { v0, v1 }
}

/// 1ブロック復号（encrypt_blockの逆変換）
pub fn decrypt_block(block: Block, key: &Key, rounds: u32) -> Block {
    let Block { mut v0, mut v1 } = block;
    let mut sum: u32 = DELTA.wrapping_mul(rounds);

    for _ in 0..rounds {
        v1 = v1.wrapping_sub(
            (v0 << 4).wrapping_add(key[2]) ^ v0.wrapping_add(sum) ^ (v0 >> 5).wrapping_add(key[3]),
        );
        v0 = v0.wrapping_sub(
            (v1 << 4).wrapping_add(key[0]) ^ v1.wrapping_add(sum) ^ (v1 >> 5).wrapping_add(key[1]),
        );
        sum = sum.wrapping_sub(DELTA);
    }

    Block { v0, v1 }
}

#[derive(Debug, Clone, Copy)]
pub struct Tea {
    pub key: Key,
    pub rounds: u32,
}

impl Tea {
    pub fn new(key: Key) -> Self {
        Self { key, rounds: ROUNDS }
    }

    pub fn with_rounds(key: Key, rounds: u32) -> Self {
        Self { key, rounds }
    }
}

impl BlockCipher for Tea {
    fn encrypt(&self, block: Block) -> Block {
        encrypt_block(block, &self.key, self.rounds)
    }

    fn decrypt(&self, block: Block) -> Block {
        decrypt_block(block, &self.key, self.rounds)
    }
}

/// 同一鍵での多段暗号化
#[derive(Debug, Clone, Copy)]
pub struct Cascade<C> {
    inner: C,
    depth: usize,
}

impl<C: BlockCipher> Cascade<C> {
    pub fn new(inner: C, depth: usize) -> Self {
        Self { inner, depth }
    }

    /// 対象バイナリと同じ2段構成
    pub fn double(inner: C) -> Self {
        Self::new(inner, 2)
    }
}

impl<C: BlockCipher> BlockCipher for Cascade<C> {
    fn encrypt(&self, block: Block) -> Block {
        (0..self.depth).fold(block, |b, _| self.inner.encrypt(b))
    }

    fn decrypt(&self, block: Block) -> Block {
        (0..self.depth).fold(block, |b, _| self.inner.decrypt(b))
    }
}
