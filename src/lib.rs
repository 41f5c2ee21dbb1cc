//! f2fsj_core: epoch 式元数据 journal
//!
//! 为 f2fs 类日志结构文件系统提供的元数据 journal 层：
//! - 文件系统操作按**全局 epoch** 分组，每个 inode 在 epoch 内有自己的本地日志队列
//! - 日志写入磁盘上的**环形 journal 区域**（128 字节定长槽位）
//! - commit 线程周期性封存 epoch，把日志归约为 checkpoint 三元组并持久化
//! - checkpoint 线程在空间不足或超时时把元数据页交还宿主写回
//!
//! # 示例
//!
//! ```rust,ignore
//! use f2fsj_core::{Journal, JournalConfig, JournalInode, LogRecord, NewInodeLog};
//!
//! let (journal, report) = Journal::mount(device, host, JournalConfig::default())?;
//!
//! let inode = JournalInode::shared(42);
//! journal.log_operation(&inode, LogRecord::Create(NewInodeLog::new(42, 2, 0o100644, b"a")))?;
//!
//! // fsync
//! journal.sync()?;
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 块设备抽象
//! - [`consts`] - 常量定义
//! - [`config`] - journal 配置
//! - [`host`] - 宿主文件系统接口
//! - [`record`] - 日志记录模型与编解码
//! - [`epoch`] - 全局 / 本地 epoch
//! - [`store`] - 磁盘环形存储与恢复
//! - [`commit`] - commit 流水线
//! - [`checkpoint`] - 检查点流水线
//! - [`driver`] - commit / checkpoint 驱动
//! - [`journal`] - 门面

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// ===== 基础 =====

/// 错误处理
pub mod error;

/// 块设备抽象
pub mod block;

/// 常量定义
pub mod consts;

/// journal 配置
pub mod config;

/// CRC32 校验
pub(crate) mod crc;

/// 宿主文件系统接口
pub mod host;

// ===== 日志模型 =====

/// 日志记录
pub mod record;

/// 日志条目与条目池
pub mod entry;

/// journal 视角的 inode
pub mod inode;

/// Epoch 管理
pub mod epoch;

// ===== 存储与流水线 =====

/// journal 环形存储
pub mod store;

/// commit 流水线
pub mod commit;

/// 检查点
pub mod checkpoint;

/// 运行统计
pub mod stats;

/// 驱动
pub mod driver;

/// 门面
pub mod journal;

#[cfg(test)]
pub(crate) mod test_utils;

// 重新导出常用类型
pub use block::{BlockDev, BlockDevice};
pub use checkpoint::{
    CheckpointBatch, CheckpointInfo, CheckpointList, CheckpointSummary, CheckpointTrigger,
};
pub use commit::CommitSummary;
pub use config::JournalConfig;
pub use driver::{CheckpointDriver, CommitDriver};
pub use entry::{EntryPool, EntryReservation, LogEntry};
pub use epoch::{EpochRing, EpochStatus, GlobalEpoch, LogListStatus};
pub use error::{Error, ErrorKind, JournalError, Result};
pub use host::{CheckpointReason, HostFs, MetaPage, PageFlags};
pub use inode::JournalInode;
pub use journal::Journal;
pub use record::{LogKind, LogRecord, NewInodeLog};
pub use stats::StatsSnapshot;
pub use store::{JournalSlot, JournalStore, RecoveryReport};

#[cfg(feature = "std")]
pub use driver::JournalThreads;
