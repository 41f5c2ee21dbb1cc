//! 每个 inode 的本地 epoch
//!
//! 一个 inode 持有 8 个本地日志队列，以及全局序号到本地槽位的映射
//! `g2l_ep_map`。同一全局序号最多对应一个在用的本地槽位；
//! 该全局 epoch 被 commit 排空后，本地槽位回到 Idle，映射被清除。

use crate::consts::{MAX_GLOBAL_EP_NUM, MAX_LOCAL_EP_NUM};
use crate::entry::LogEntry;
use alloc::collections::VecDeque;

/// 本地日志队列状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogListStatus {
    /// 空闲
    Idle = 0,
    /// 正在接收日志
    InUse = 1,
    /// commit 正在排空
    Committing = 2,
}

/// 本地 epoch：一个日志队列
#[derive(Debug)]
pub struct LocalEpoch {
    status: LogListStatus,
    entries: VecDeque<LogEntry>,
}

impl LocalEpoch {
    const fn new() -> Self {
        Self {
            status: LogListStatus::Idle,
            entries: VecDeque::new(),
        }
    }

    /// 队列状态
    pub fn status(&self) -> LogListStatus {
        self.status
    }

    /// 队列中的日志数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 队列是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按插入顺序遍历日志
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }
}

/// inode 的 epoch 状态，受 inode 锁保护
#[derive(Debug)]
pub struct InodeEpochState {
    locals: [LocalEpoch; MAX_LOCAL_EP_NUM],
    g2l_ep_map: [Option<u8>; MAX_GLOBAL_EP_NUM],
    active: Option<u8>,
}

impl Default for InodeEpochState {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeEpochState {
    /// 创建空状态
    pub fn new() -> Self {
        Self {
            locals: core::array::from_fn(|_| LocalEpoch::new()),
            g2l_ep_map: [None; MAX_GLOBAL_EP_NUM],
            active: None,
        }
    }

    /// 全局序号映射到的本地槽位
    pub fn local_for(&self, ordinal: u8) -> Option<u8> {
        self.g2l_ep_map[ordinal as usize]
    }

    /// 当前活跃的本地槽位
    pub fn active_local(&self) -> Option<u8> {
        self.active
    }

    /// 第 `idx` 个本地 epoch
    pub fn local(&self, idx: u8) -> &LocalEpoch {
        &self.locals[idx as usize]
    }

    /// 在用的本地槽位数
    pub fn in_use_count(&self) -> usize {
        self.locals
            .iter()
            .filter(|l| l.status == LogListStatus::InUse)
            .count()
    }

    /// 所有本地队列中尚未 commit 的日志数
    pub fn pending_entries(&self) -> usize {
        self.locals.iter().map(LocalEpoch::len).sum()
    }

    /// 首次适配查找空闲本地槽位
    pub(crate) fn find_idle_local(&self) -> Option<u8> {
        self.locals
            .iter()
            .position(|l| l.status == LogListStatus::Idle)
            .map(|idx| idx as u8)
    }

    /// 重新激活已映射的本地槽位
    pub(crate) fn activate(&mut self, local: u8) {
        self.active = Some(local);
    }

    /// 为全局序号启用本地槽位
    pub(crate) fn bind_local(&mut self, ordinal: u8, local: u8) {
        self.locals[local as usize].status = LogListStatus::InUse;
        self.g2l_ep_map[ordinal as usize] = Some(local);
        self.active = Some(local);
    }

    /// 追加日志到活跃队列
    ///
    /// 没有活跃队列时把日志原样交还。
    pub(crate) fn push(&mut self, entry: LogEntry) -> core::result::Result<(), LogEntry> {
        match self.active {
            Some(idx) if self.locals[idx as usize].status == LogListStatus::InUse => {
                self.locals[idx as usize].entries.push_back(entry);
                Ok(())
            }
            _ => Err(entry),
        }
    }

    /// 是否有可追加的活跃队列
    pub(crate) fn can_push(&self) -> bool {
        matches!(self.active, Some(idx) if self.locals[idx as usize].status == LogListStatus::InUse)
    }

    /// 开始排空某全局序号对应的本地队列
    ///
    /// 本地槽位进入 Committing，若它是活跃槽位则清除活跃标记，
    /// 之后该 inode 的新操作必须重新 check-in。
    pub(crate) fn begin_drain(&mut self, ordinal: u8) -> Option<(u8, VecDeque<LogEntry>)> {
        let local = self.g2l_ep_map[ordinal as usize]?;
        let slot = &mut self.locals[local as usize];
        slot.status = LogListStatus::Committing;
        if self.active == Some(local) {
            self.active = None;
        }
        Some((local, core::mem::take(&mut slot.entries)))
    }

    /// 排空结束，本地槽位回到 Idle
    pub(crate) fn finish_drain(&mut self, ordinal: u8, local: u8) {
        self.locals[local as usize].status = LogListStatus::Idle;
        if self.g2l_ep_map[ordinal as usize] == Some(local) {
            self.g2l_ep_map[ordinal as usize] = None;
        }
    }
}
