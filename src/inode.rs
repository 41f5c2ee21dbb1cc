//! journal 视角的 inode
//!
//! 宿主 inode 在 journal 层只需要 inode 号和一把保护本地 epoch 状态的自旋锁。

use crate::epoch::InodeEpochState;
use alloc::sync::Arc;
use spin::{Mutex, MutexGuard};

/// 参与 journal 的 inode
#[derive(Debug)]
pub struct JournalInode {
    ino: u32,
    state: Mutex<InodeEpochState>,
}

impl JournalInode {
    /// 创建 inode
    pub fn new(ino: u32) -> Self {
        Self {
            ino,
            state: Mutex::new(InodeEpochState::new()),
        }
    }

    /// 创建共享 inode
    pub fn shared(ino: u32) -> Arc<Self> {
        Arc::new(Self::new(ino))
    }

    /// inode 号
    pub fn ino(&self) -> u32 {
        self.ino
    }

    /// 获取 inode 锁
    pub fn lock(&self) -> MutexGuard<'_, InodeEpochState> {
        self.state.lock()
    }

    /// 尚未 commit 的日志数
    pub fn pending_entries(&self) -> usize {
        self.state.lock().pending_entries()
    }
}
