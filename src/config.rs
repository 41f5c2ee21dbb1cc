//! journal 配置

use crate::consts::*;
use crate::error::{Error, ErrorKind, Result};

/// journal 配置
///
/// 默认值与生产部署一致：1 个 256 MiB 小文件，superblock 位于块 3866624，
/// 每 5 个 tick 提交一次，剩余空间不足 5% 或每 3 个 tick 做一次 checkpoint。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalConfig {
    /// journal superblock 块地址，journal 区域紧随其后
    pub sb_block_addr: u64,
    /// 小文件数量
    pub nr_small_files: u32,
    /// 每个小文件的块数
    pub blocks_per_small_file: u32,
    /// 单次 I/O 最多提交的页数
    pub max_io_pages: u32,
    /// commit 驱动每隔多少 tick 提交一次
    pub commit_interval_ticks: u64,
    /// checkpoint 驱动超时触发的 tick 数
    pub checkpoint_timeout_ticks: u64,
    /// 剩余空间阈值（百分比）
    pub free_space_threshold_percent: u32,
    /// tick 长度（毫秒），仅后台线程使用
    pub tick_ms: u64,
    /// 日志条目池容量
    pub max_pending_entries: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            sb_block_addr: JOURNAL_SB_BLOCK_ADDR,
            nr_small_files: NR_JOURNAL_SMALL_FILE,
            blocks_per_small_file: JOURNAL_BLK_PER_SMALL_FILE,
            max_io_pages: MAX_IO_PAGES,
            commit_interval_ticks: DEFAULT_COMMIT_INTERVAL_TICKS,
            checkpoint_timeout_ticks: DEFAULT_CHECKPOINT_TIMEOUT_TICKS,
            free_space_threshold_percent: DEFAULT_FREE_SPACE_THRESHOLD_PERCENT,
            tick_ms: DEFAULT_TICK_MS,
            max_pending_entries: DEFAULT_MAX_PENDING_ENTRIES,
        }
    }
}

impl JournalConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.nr_small_files == 0 || self.blocks_per_small_file == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Journal must contain at least one block"));
        }
        if self.max_io_pages == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "max_io_pages must be positive"));
        }
        if self.commit_interval_ticks == 0 || self.checkpoint_timeout_ticks == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Driver intervals must be positive"));
        }
        if self.free_space_threshold_percent > 100 {
            return Err(Error::new(ErrorKind::InvalidInput, "Free space threshold exceeds 100%"));
        }
        if self.max_pending_entries == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "Entry pool capacity must be positive"));
        }
        // superblock 用 u32 记录总大小
        if self.total_bytes() > u32::MAX as u64 {
            return Err(Error::new(ErrorKind::InvalidInput, "Journal region too large"));
        }
        Ok(())
    }

    /// journal 区域起始块
    pub const fn journal_start(&self) -> u64 {
        self.sb_block_addr + 1
    }

    /// 第 `index` 个小文件的起始块
    pub const fn small_file_start(&self, index: u32) -> u64 {
        self.journal_start() + index as u64 * self.blocks_per_small_file as u64
    }

    /// 每个小文件可容纳的日志条目数
    pub const fn entries_per_file(&self) -> u32 {
        self.blocks_per_small_file * J_LOG_ENTRY_PER_BLOCK
    }

    /// journal 总大小（字节）
    pub const fn total_bytes(&self) -> u64 {
        self.nr_small_files as u64 * self.blocks_per_small_file as u64 * JOURNAL_BLOCK_SIZE as u64
    }

    /// 触发 checkpoint 的剩余空间阈值（字节）
    pub const fn free_space_threshold(&self) -> u64 {
        self.total_bytes() * self.free_space_threshold_percent as u64 / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let config = JournalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.journal_start(), 3_866_625);
        assert_eq!(config.total_bytes(), 256 * 1024 * 1024);
        assert_eq!(config.entries_per_file(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = JournalConfig { max_io_pages: 0, ..Default::default() };
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::InvalidInput);

        let config = JournalConfig { free_space_threshold_percent: 101, ..Default::default() };
        assert!(config.validate().is_err());

        let config = JournalConfig { nr_small_files: 64, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold() {
        let config = JournalConfig { blocks_per_small_file: 100, ..Default::default() };
        assert_eq!(config.free_space_threshold(), 100 * 4096 * 5 / 100);
    }
}
