//! 日志分类
//!
//! commit 时把每条日志归约为 checkpoint 需要的 (inode, node, segment) 三元组。
//!
//! | 类型 | inode | node | segment |
//! |---|---|---|---|
//! | create / mkdir / symlink | 新 inode | 无 | 无 |
//! | 目录项变更 | 父目录 | 无 | 无 |
//! | 数据写回 | 写者 inode | NAT 快照中的 nid | SIT 快照中的段号 |
//! | chown | 目标 inode | 无 | 无 |
//! | unlink | 被删 inode | 无 | 无 |
//!
//! 其余类型没有需要重新置脏的宿主元数据页。

use super::LogRecord;
use crate::checkpoint::CheckpointInfo;

impl LogRecord {
    /// 归约为 checkpoint 三元组
    ///
    /// 返回 `None` 表示该记录没有 checkpoint 目标。
    pub fn classify(&self) -> Option<CheckpointInfo> {
        match self {
            LogRecord::Create(inode) | LogRecord::Mkdir(inode) => {
                Some(CheckpointInfo::inode_only(inode.ino))
            }
            LogRecord::Symlink(log) => Some(CheckpointInfo::inode_only(log.inode.ino)),
            LogRecord::Dir(log) => Some(CheckpointInfo::inode_only(log.parent_ino)),
            LogRecord::DataWrite(log) => {
                Some(CheckpointInfo::new(log.ino, log.nat.nid, log.sit.segno))
            }
            LogRecord::Chown(log) => Some(CheckpointInfo::inode_only(log.ino)),
            LogRecord::Unlink(log) => Some(CheckpointInfo::inode_only(log.ino)),
            LogRecord::Link(_)
            | LogRecord::Rename(_)
            | LogRecord::ReadFileData(_)
            | LogRecord::ReadDir(_)
            | LogRecord::Stat(_) => None,
        }
    }

    /// 三元组生效前是否需要先写回 inode 的数据页
    pub const fn requires_data_flush(&self) -> bool {
        matches!(self, LogRecord::DataWrite(_))
    }
}
