//! journal 存储的磁盘数据结构

use crate::config::JournalConfig;
use crate::consts::{JOURNAL_BLOCK_SIZE, JOURNAL_MAGIC};
use crate::crc::{crc32_append, JOURNAL_CRC32_INIT};
use crate::error::{JournalError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// superblock 中参与校验的字节数
const JSB_CHECKSUM_OFFSET: usize = 20;

/// journal superblock
///
/// 磁盘布局（小端）：
///
/// | 偏移 | 字段 |
/// |---|---|
/// | 0 | magic (0xCDEF) |
/// | 4 | journal 区域起始块 |
/// | 8 | journal 总大小（字节） |
/// | 12 | 当前小文件 |
/// | 16 | 当前空闲槽位 |
/// | 20 | 前 20 字节的 CRC32 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalSuperblock {
    /// 魔数
    pub magic: u32,
    /// journal 区域起始块
    pub start_addr: u32,
    /// journal 总大小（字节）
    pub file_size: u32,
    /// 当前小文件
    pub current_small_file: u32,
    /// 当前小文件中下一个空闲槽位
    pub current_free_log_entry: u32,
}

impl JournalSuperblock {
    /// 按配置生成初始 superblock
    pub fn new(config: &JournalConfig) -> Self {
        Self {
            magic: JOURNAL_MAGIC,
            start_addr: config.journal_start() as u32,
            file_size: config.total_bytes() as u32,
            current_small_file: 0,
            current_free_log_entry: 0,
        }
    }

    /// 从块数据解析
    ///
    /// 魔数或校验和不对时返回 None。
    pub fn from_bytes(block: &[u8]) -> Option<Self> {
        if block.len() < JSB_CHECKSUM_OFFSET + 4 {
            return None;
        }
        let sb = Self {
            magic: LittleEndian::read_u32(&block[0..4]),
            start_addr: LittleEndian::read_u32(&block[4..8]),
            file_size: LittleEndian::read_u32(&block[8..12]),
            current_small_file: LittleEndian::read_u32(&block[12..16]),
            current_free_log_entry: LittleEndian::read_u32(&block[16..20]),
        };
        if sb.magic != JOURNAL_MAGIC {
            return None;
        }
        let stored = LittleEndian::read_u32(&block[JSB_CHECKSUM_OFFSET..JSB_CHECKSUM_OFFSET + 4]);
        let computed = crc32_append(JOURNAL_CRC32_INIT, &block[..JSB_CHECKSUM_OFFSET]);
        if stored != computed {
            log::warn!(
                "[JSTORE] superblock checksum mismatch: stored={:#x} computed={:#x}",
                stored,
                computed
            );
            return None;
        }
        Some(sb)
    }

    /// 序列化为一个完整块
    pub fn to_block(&self) -> [u8; JOURNAL_BLOCK_SIZE] {
        let mut block = [0u8; JOURNAL_BLOCK_SIZE];
        LittleEndian::write_u32(&mut block[0..4], self.magic);
        LittleEndian::write_u32(&mut block[4..8], self.start_addr);
        LittleEndian::write_u32(&mut block[8..12], self.file_size);
        LittleEndian::write_u32(&mut block[12..16], self.current_small_file);
        LittleEndian::write_u32(&mut block[16..20], self.current_free_log_entry);
        let crc = crc32_append(JOURNAL_CRC32_INIT, &block[..JSB_CHECKSUM_OFFSET]);
        LittleEndian::write_u32(&mut block[JSB_CHECKSUM_OFFSET..JSB_CHECKSUM_OFFSET + 4], crc);
        block
    }

    /// 解析并校验 superblock
    ///
    /// # 错误
    ///
    /// 魔数、校验和或布局与配置不符时返回 `InvalidSuperblock`
    pub fn load(block: &[u8], config: &JournalConfig) -> Result<Self> {
        Self::from_bytes(block)
            .filter(|sb| sb.matches(config))
            .ok_or_else(|| JournalError::InvalidSuperblock.into())
    }

    /// 布局是否与配置一致
    pub fn matches(&self, config: &JournalConfig) -> bool {
        self.start_addr as u64 == config.journal_start()
            && self.file_size as u64 == config.total_bytes()
            && self.current_small_file < config.nr_small_files
    }
}

/// 小文件状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileState {
    /// 未使用
    Idle = 0,
    /// 在用，没有未持久化的槽位
    InUse = 1,
    /// 文件写满，整个文件等待持久化
    WholeFileWaitCommit = 2,
    /// 部分槽位等待持久化
    PartialFileWaitCommit = 3,
}

/// journal 槽位地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JournalSlot {
    file: u32,
    index: u32,
}

impl JournalSlot {
    /// 构造槽位地址
    pub const fn new(file: u32, index: u32) -> Self {
        Self { file, index }
    }

    /// 小文件下标
    pub const fn file(&self) -> u32 {
        self.file
    }

    /// 小文件内的槽位下标
    pub const fn index(&self) -> u32 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superblock_roundtrip_and_checksum() {
        let config = JournalConfig::default();
        let mut sb = JournalSuperblock::new(&config);
        sb.current_free_log_entry = 1234;

        let mut block = sb.to_block();
        assert_eq!(JournalSuperblock::from_bytes(&block), Some(sb));
        assert!(sb.matches(&config));

        block[16] ^= 0xFF;
        assert_eq!(JournalSuperblock::from_bytes(&block), None);
    }

    #[test]
    fn test_superblock_bad_magic() {
        let block = [0u8; JOURNAL_BLOCK_SIZE];
        assert_eq!(JournalSuperblock::from_bytes(&block), None);
        let err = JournalSuperblock::load(&block, &JournalConfig::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Corrupted);
    }

    #[test]
    fn test_superblock_layout_mismatch() {
        let config = JournalConfig::default();
        let block = JournalSuperblock::new(&config).to_block();
        assert!(JournalSuperblock::load(&block, &config).is_ok());

        let other = JournalConfig {
            blocks_per_small_file: config.blocks_per_small_file / 2,
            ..config
        };
        assert!(JournalSuperblock::load(&block, &other).is_err());
    }
}
