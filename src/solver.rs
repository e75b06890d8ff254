/// 解の復元と検証
///
/// 定数 → バイト毎XOR → 多段復号 → 再暗号化で検証 → ファイル出力。
/// 検証は2つの解の両方が通ってから書き込みに進む

use crate::error::{RecoverError, Result};
use crate::mask::xor_bytes;
use crate::tea::{Block, BlockCipher};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Solution {
    /// 1始まり
    pub index: usize,
    /// バイナリから取り出した定数
    pub constant: u64,
    /// マスク適用後の期待暗号文
    pub expected: Block,
    pub plaintext: Block,
}

impl Solution {
    pub fn bytes(&self) -> [u8; 8] {
        self.plaintext.to_le_bytes()
    }

    /// 表示用（非ASCIIはエスケープ）
    pub fn text(&self) -> String {
        self.bytes().escape_ascii().to_string()
    }
}

pub struct Solver<C> {
    cipher: C,
    mask: u8,
}

impl<C: BlockCipher> Solver<C> {
    pub fn new(cipher: C, mask: u8) -> Self {
        Self { cipher, mask }
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// 定数1つ分を復号（未検証）
    pub fn recover(&self, index: usize, constant: u64) -> Solution {
        let expected = Block::from_u64(xor_bytes(constant, self.mask));
        debug!("Expected {}: 0x{:016x}", index, expected.to_u64());

        let plaintext = self.cipher.decrypt(expected);
        Solution {
            index,
            constant,
            expected,
            plaintext,
        }
    }

    /// 両方の解を復元し、両方の検証が通った場合のみ返す
    pub fn solve(&self, constants: [u64; 2]) -> Result<[Solution; 2]> {
        let solutions = [self.recover(1, constants[0]), self.recover(2, constants[1])];

        for solution in &solutions {
            verify_solution(&self.cipher, solution.index, solution.plaintext, solution.expected)?;
            info!("Solution {}: b\"{}\"", solution.index, solution.text());
        }

        Ok(solutions)
    }

    /// 検証済みの解のみをディレクトリに書き出す
    pub fn solve_into(&self, constants: [u64; 2], dir: &Path, names: &[String]) -> Result<[Solution; 2]> {
        let solutions = self.solve(constants)?;
        write_solutions(dir, names, &solutions)?;
        Ok(solutions)
    }
}

/// 平文を再暗号化して期待暗号文と一致するか確認
pub fn verify_solution<C: BlockCipher>(cipher: &C, index: usize, plaintext: Block, expected: Block) -> Result<()> {
    let actual = cipher.encrypt(plaintext);
    if actual != expected {
        return Err(RecoverError::VerificationFailed {
            index,
            expected: expected.to_u64(),
            actual: actual.to_u64(),
        });
    }
    Ok(())
}

/// 8バイト + 改行 を各ファイルへ
///
/// 一時ファイルに全て書けた後でリネームする。リネームの途中で失敗した
/// 場合も、配置済みの出力と残りの一時ファイルを消してからエラーを返す
pub fn write_solutions(dir: &Path, names: &[String], solutions: &[Solution]) -> Result<Vec<PathBuf>> {
    if names.len() != solutions.len() {
        return Err(RecoverError::Config(format!(
            "{} output names for {} solutions",
            names.len(),
            solutions.len()
        )));
    }

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(solutions.len());
    for (name, solution) in names.iter().zip(solutions) {
        let target = dir.join(name);
        let tmp = match target.file_name() {
            // 一時ファイルは出力先と同じディレクトリに置く
            Some(file_name) => target.with_file_name(format!(".{}.tmp", file_name.to_string_lossy())),
            None => {
                discard(staged.iter().map(|(tmp, _)| tmp));
                return Err(RecoverError::Config(format!("Invalid output name: {}", name)));
            }
        };

        let mut content = solution.bytes().to_vec();
        content.push(b'\n');

        if let Err(e) = fs::write(&tmp, &content) {
            discard(staged.iter().map(|(tmp, _)| tmp));
            return Err(e.into());
        }
        staged.push((tmp, target));
    }

    let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
    for (i, (tmp, target)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp, target) {
            warn!("Failed to place {}: {}", target.display(), e);
            discard(written.iter().chain(staged[i..].iter().map(|(tmp, _)| tmp)));
            return Err(e.into());
        }
        info!("Wrote {}", target.display());
        written.push(target.clone());
    }

    Ok(written)
}

/// 後始末（削除の失敗は無視）
fn discard<'a>(paths: impl Iterator<Item = &'a PathBuf>) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{derive_mask, MaskParams};
    use crate::tea::{Cascade, Tea};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tea-recover-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn names() -> Vec<String> {
        vec!["1.txt".to_string(), "2.txt".to_string()]
    }

    /// 再暗号化の結果を1bit壊す
    struct FaultyCipher(Cascade<Tea>);

    impl BlockCipher for FaultyCipher {
        fn encrypt(&self, block: Block) -> Block {
            let mut out = self.0.encrypt(block);
            out.v0 ^= 1;
            out
        }

        fn decrypt(&self, block: Block) -> Block {
            self.0.decrypt(block)
        }
    }

    #[test]
    fn test_end_to_end_fixture() {
        let key = [0x1, 0x2, 0x3, 0x4];
        let cascade = Cascade::double(Tea::new(key));
        let plaintext = Block::new(0x41424344, 0x45464748);

        // マスク0なので定数 = 暗号文
        let constant = cascade.encrypt(plaintext).to_u64();
        let solver = Solver::new(cascade, 0x00);
        let [first, second] = solver.solve([constant, constant]).unwrap();

        assert_eq!(first.plaintext, plaintext);
        assert_eq!(&first.bytes(), b"DCBAHGFE");
        assert_eq!(first.text(), "DCBAHGFE");
        assert_eq!(second.index, 2);
    }

    #[test]
    fn test_mask_is_applied_before_decrypt() {
        let key = [0xDEADBEEF, 0xCAFEBABE, 0x12345678, 0x9ABCDEF0];
        let cascade = Cascade::double(Tea::new(key));
        let mask = derive_mask(&MaskParams::default());

        let secret = Block::from_u64(u64::from_le_bytes(*b"s3cr3t!!"));
        let constant = xor_bytes(cascade.encrypt(secret).to_u64(), mask);

        let solver = Solver::new(cascade, mask);
        let [solution, _] = solver.solve([constant, constant]).unwrap();
        assert_eq!(&solution.bytes(), b"s3cr3t!!");
        assert_eq!(solution.constant, constant);
    }

    #[test]
    fn test_corrupted_expected_fails_verification() {
        let cascade = Cascade::double(Tea::new([0x1, 0x2, 0x3, 0x4]));
        let plaintext = Block::new(0x41424344, 0x45464748);
        let expected = cascade.encrypt(plaintext);

        assert!(verify_solution(&cascade, 1, plaintext, expected).is_ok());

        let corrupted = Block::from_u64(expected.to_u64() ^ (1 << 17));
        match verify_solution(&cascade, 1, plaintext, corrupted) {
            Err(RecoverError::VerificationFailed { index, expected, actual }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, corrupted.to_u64());
                assert_eq!(actual, cascade.encrypt(plaintext).to_u64());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_verification_failure_writes_nothing() {
        let dir = temp_dir("fatal");
        let solver = Solver::new(FaultyCipher(Cascade::double(Tea::new([1, 2, 3, 4]))), 0x15);

        let result = solver.solve_into([0x1122334455667788, 0x99AABBCCDDEEFF00], &dir, &names());
        assert!(matches!(result, Err(RecoverError::VerificationFailed { index: 1, .. })));
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_writes_nine_bytes_per_solution() {
        let dir = temp_dir("write");
        let cascade = Cascade::double(Tea::new([1, 2, 3, 4]));
        let c1 = cascade.encrypt(Block::from_u64(u64::from_le_bytes(*b"ABCDEFGH"))).to_u64();
        let c2 = cascade.encrypt(Block::from_u64(u64::from_le_bytes(*b"\x00\x01\x02\x03\xfc\xfd\xfe\xff"))).to_u64();

        let solver = Solver::new(cascade, 0);
        solver.solve_into([c1, c2], &dir, &names()).unwrap();

        assert_eq!(fs::read(dir.join("1.txt")).unwrap(), b"ABCDEFGH\n");
        assert_eq!(fs::read(dir.join("2.txt")).unwrap(), b"\x00\x01\x02\x03\xfc\xfd\xfe\xff\n");
        // 一時ファイルは残らない
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 2);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_failed_rename_leaves_no_output() {
        let dir = temp_dir("rollback");
        // 2.txt が空でないディレクトリなのでリネームに失敗する
        fs::create_dir_all(dir.join("2.txt")).unwrap();
        fs::write(dir.join("2.txt").join("x"), b"keep").unwrap();

        let cascade = Cascade::double(Tea::new([1, 2, 3, 4]));
        let c1 = cascade.encrypt(Block::from_u64(u64::from_le_bytes(*b"ABCDEFGH"))).to_u64();
        let c2 = cascade.encrypt(Block::from_u64(u64::from_le_bytes(*b"IJKLMNOP"))).to_u64();

        let result = Solver::new(cascade, 0).solve_into([c1, c2], &dir, &names());
        assert!(matches!(result, Err(RecoverError::Io(_))));

        let mut entries: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["2.txt".to_string()]);
        assert_eq!(fs::read(dir.join("2.txt").join("x")).unwrap(), b"keep");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_output_name_with_subdirectory() {
        let dir = temp_dir("subdir");
        fs::create_dir_all(dir.join("out")).unwrap();

        let cascade = Cascade::double(Tea::new([1, 2, 3, 4]));
        let c = cascade.encrypt(Block::from_u64(u64::from_le_bytes(*b"ABCDEFGH"))).to_u64();
        let outputs = vec!["out/1.txt".to_string(), "2.txt".to_string()];

        let solutions = Solver::new(cascade, 0).solve_into([c, c], &dir, &outputs).unwrap();
        let written = write_solutions(&dir, &outputs, &solutions).unwrap();
        assert_eq!(written[0], dir.join("out").join("1.txt"));
        assert_eq!(fs::read(dir.join("out").join("1.txt")).unwrap(), b"ABCDEFGH\n");
        assert_eq!(fs::read_dir(dir.join("out")).unwrap().count(), 1);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 2);

        let _ = fs::remove_dir_all(&dir);
    }
}
