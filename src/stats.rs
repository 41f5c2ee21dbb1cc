//! journal 运行统计

use core::sync::atomic::{AtomicU64, Ordering};

/// 运行统计计数器
#[derive(Debug, Default)]
pub struct JournalStats {
    epochs_committed: AtomicU64,
    entries_committed: AtomicU64,
    entries_dropped: AtomicU64,
    checkpoints: AtomicU64,
    pages_persisted: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// 已 commit 的 epoch 数
    pub epochs_committed: u64,
    /// 已 commit 的日志数
    pub entries_committed: u64,
    /// 因背压或池耗尽而放弃的日志数
    pub entries_dropped: u64,
    /// 完成的检查点数
    pub checkpoints: u64,
    /// 持久化的页数
    pub pages_persisted: u64,
    /// 小文件绕回次数
    pub wraps: u64,
}

impl JournalStats {
    pub(crate) fn committed(&self, epochs: u64, entries: u64) {
        self.epochs_committed.fetch_add(epochs, Ordering::Relaxed);
        self.entries_committed.fetch_add(entries, Ordering::Relaxed);
    }

    pub(crate) fn entry_dropped(&self) {
        self.entries_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn checkpoint_done(&self) {
        self.checkpoints.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn pages_persisted(&self, pages: u64) {
        self.pages_persisted.fetch_add(pages, Ordering::Relaxed);
    }

    /// 读取快照
    ///
    /// 绕回次数由存储层维护，这里填 0，由调用者补齐。
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            epochs_committed: self.epochs_committed.load(Ordering::Relaxed),
            entries_committed: self.entries_committed.load(Ordering::Relaxed),
            entries_dropped: self.entries_dropped.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
            pages_persisted: self.pages_persisted.load(Ordering::Relaxed),
            wraps: 0,
        }
    }
}
