//! journal 层常量定义
//!
//! 磁盘布局和 epoch 模型中所有固定的数值。

// ===== Epoch 模型 =====

/// 全局 epoch 环的容量
pub const MAX_GLOBAL_EP_NUM: usize = 8;

/// 每个 inode 的本地 epoch 数量（与全局环一致）
pub const MAX_LOCAL_EP_NUM: usize = MAX_GLOBAL_EP_NUM;

// ===== Journal 文件布局 =====

/// journal superblock 魔数
pub const JOURNAL_MAGIC: u32 = 0xCDEF;

/// journal 块大小（字节）
pub const JOURNAL_BLOCK_SIZE: usize = 4096;

/// journal superblock 所在块地址
pub const JOURNAL_SB_BLOCK_ADDR: u64 = 3_866_624;

/// 每个小文件包含的块数（256 MiB）
pub const JOURNAL_BLK_PER_SMALL_FILE: u32 = 256 * 1024 * 1024 / JOURNAL_BLOCK_SIZE as u32;

/// 小文件数量
pub const NR_JOURNAL_SMALL_FILE: u32 = 1;

/// 每个日志条目槽位大小（字节）
pub const J_LOG_ENTRY_SIZE: usize = 128;

/// 每块日志条目数
pub const J_LOG_ENTRY_PER_BLOCK: u32 = (JOURNAL_BLOCK_SIZE / J_LOG_ENTRY_SIZE) as u32;

/// 单次 I/O 最多提交的页数
pub const MAX_IO_PAGES: u32 = 256;

// ===== 日志记录 =====

/// 日志头大小：log_type (u32) + log_size (u32)
pub const J_LOG_HEAD_SIZE: usize = 8;

/// 日志中文件名字段宽度
pub const J_NAME_LEN: usize = 16;

/// 符号链接目标字段宽度
pub const J_SYMLINK_TARGET_LEN: usize = 21;

/// "无目标" 哨兵值
pub const NONE_ID: u32 = 0;

// ===== 驱动节奏 =====

/// commit 线程每隔多少 tick 提交一次
pub const DEFAULT_COMMIT_INTERVAL_TICKS: u64 = 5;

/// checkpoint 超时触发的 tick 数
pub const DEFAULT_CHECKPOINT_TIMEOUT_TICKS: u64 = 3;

/// 剩余空间低于该百分比时触发 checkpoint
pub const DEFAULT_FREE_SPACE_THRESHOLD_PERCENT: u32 = 5;

/// 一个 tick 的毫秒数
pub const DEFAULT_TICK_MS: u64 = 1000;

/// 日志条目池默认容量
pub const DEFAULT_MAX_PENDING_ENTRIES: usize = 1 << 20;

/// 日志条目在块内的偏移（字节）
#[inline]
pub const fn entry_offset_in_block(entry_idx: u32) -> usize {
    (entry_idx % J_LOG_ENTRY_PER_BLOCK) as usize * J_LOG_ENTRY_SIZE
}

/// 日志条目所在的块（相对小文件起始块）
#[inline]
pub const fn entry_to_block(entry_idx: u32) -> u32 {
    entry_idx / J_LOG_ENTRY_PER_BLOCK
}
