/// 実行ファイルのロード
///
/// goblinでELF/PEをパースし、x86-64であることを確認してセクション表を保持する。
/// 仮想アドレスからファイル上のバイト列への変換もここで行う

use crate::error::{RecoverError, Result};
use goblin::Object;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// セクションのメタデータ
#[derive(Debug, Clone, Serialize)]
pub struct SectionInfo {
    pub name: String,
    pub address: u64,
    pub size: u64,
    /// ファイル内オフセット（.bss等ファイルに実体がない場合はNone）
    pub file_offset: Option<u64>,
}

impl SectionInfo {
    fn contains(&self, address: u64, len: usize) -> bool {
        let Some(end) = address.checked_add(len as u64) else {
            return false;
        };
        address >= self.address && end <= self.address.saturating_add(self.size)
    }
}

/// 逆アセンブル対象のバイト列とロードアドレス
#[derive(Debug, Clone)]
pub struct CodeSection {
    pub name: String,
    pub address: u64,
    pub bytes: Vec<u8>,
}

/// 読み込み済みの実行ファイル（読み取り専用）
pub struct LoadedBinary {
    pub format: String,
    pub architecture: String,
    pub entry_point: u64,
    data: Vec<u8>,
    sections: Vec<SectionInfo>,
}

impl LoadedBinary {
    /// ファイルを開いてパース
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        info!("Loaded {} ({} bytes)", path.display(), data.len());
        Self::parse(data)
    }

    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let (format, architecture, entry_point, sections) = match Object::parse(&data)? {
            Object::Elf(elf) => {
                if elf.header.e_machine != 0x3E {
                    return Err(RecoverError::UnsupportedArchitecture(format!(
                        "ELF e_machine 0x{:x}",
                        elf.header.e_machine
                    )));
                }

                let sections = elf
                    .section_headers
                    .iter()
                    .filter_map(|section| {
                        let name = elf.shdr_strtab.get_at(section.sh_name)?;
                        // SHT_NOBITS(8) はファイル上に実体がない
                        let file_offset = (section.sh_type != 8).then_some(section.sh_offset);
                        Some(SectionInfo {
                            name: name.to_string(),
                            address: section.sh_addr,
                            size: section.sh_size,
                            file_offset,
                        })
                    })
                    .collect();

                ("ELF", "x86-64", elf.header.e_entry, sections)
            }
            Object::PE(pe) => {
                if pe.header.coff_header.machine != 0x8664 {
                    return Err(RecoverError::UnsupportedArchitecture(format!(
                        "PE machine 0x{:x}",
                        pe.header.coff_header.machine
                    )));
                }

                let image_base = pe.image_base as u64;
                let sections = pe
                    .sections
                    .iter()
                    .map(|section| {
                        let name = String::from_utf8_lossy(&section.name)
                            .trim_end_matches('\0')
                            .to_string();
                        // 生データより仮想サイズが大きい部分はゼロ埋め領域なので読めない範囲とする
                        let size = section.virtual_size.min(section.size_of_raw_data) as u64;
                        SectionInfo {
                            name,
                            address: image_base + section.virtual_address as u64,
                            size,
                            file_offset: (section.size_of_raw_data > 0)
                                .then_some(section.pointer_to_raw_data as u64),
                        }
                    })
                    .collect();

                let entry = image_base + pe.entry as u64;
                ("PE", "x86-64", entry, sections)
            }
            Object::Mach(_) => return Err(RecoverError::UnsupportedFormat("Mach-O".to_string())),
            _ => return Err(RecoverError::UnsupportedFormat("unknown".to_string())),
        };

        Ok(Self::from_parts(data, format, architecture, entry_point, sections))
    }

    /// パース済みのセクション表から直接構築
    pub fn from_parts(
        data: Vec<u8>,
        format: &str,
        architecture: &str,
        entry_point: u64,
        sections: Vec<SectionInfo>,
    ) -> Self {
        debug!("{} sections", sections.len());
        Self {
            format: format.to_string(),
            architecture: architecture.to_string(),
            entry_point,
            data,
            sections,
        }
    }

    pub fn sections(&self) -> &[SectionInfo] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Result<&SectionInfo> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| RecoverError::SectionNotFound { name: name.to_string() })
    }

    /// 仮想アドレス範囲のバイト列を読む
    pub fn read(&self, address: u64, len: usize) -> Result<&[u8]> {
        let out_of_range = || RecoverError::AddressOutOfRange { address, len };

        let section = self
            .sections
            .iter()
            .find(|s| s.file_offset.is_some() && s.contains(address, len))
            .ok_or_else(out_of_range)?;

        let start = section
            .file_offset
            .and_then(|offset| offset.checked_add(address - section.address))
            .ok_or_else(out_of_range)?;

        self.slice(start, len).ok_or_else(out_of_range)
    }

    /// 名前付きセクションを丸ごと取り出す
    ///
    /// アドレスが重なるセクション（再配置可能オブジェクト等）があっても
    /// 指定したセクション自身のファイルオフセットから読む
    pub fn code_section(&self, name: &str) -> Result<CodeSection> {
        let section = self.section(name)?;
        let len = section.size as usize;
        let out_of_range = || RecoverError::AddressOutOfRange {
            address: section.address,
            len,
        };

        let bytes = section
            .file_offset
            .and_then(|offset| self.slice(offset, len))
            .ok_or_else(out_of_range)?
            .to_vec();

        info!(
            "Section {} at 0x{:x} ({} bytes)",
            section.name, section.address, section.size
        );

        Ok(CodeSection {
            name: section.name.clone(),
            address: section.address,
            bytes,
        })
    }

    fn slice(&self, file_offset: u64, len: usize) -> Option<&[u8]> {
        let start = usize::try_from(file_offset).ok()?;
        let end = start.checked_add(len)?;
        self.data.get(start..end)
    }
}
