//! 日志条目与条目池
//!
//! `LogEntry` 不实现 `Clone`：一条日志在任一时刻只属于一个本地队列，
//! 被 commit 排空后通过 `EntryPool::release` 归还。

use crate::error::{JournalError, Result};
use crate::record::{LogKind, LogRecord};
use crate::store::JournalSlot;
use core::sync::atomic::{AtomicUsize, Ordering};

/// 一条待提交日志
#[derive(Debug, PartialEq, Eq)]
pub struct LogEntry {
    slot: JournalSlot,
    record: LogRecord,
}

impl LogEntry {
    /// journal 中的槽位
    pub fn slot(&self) -> JournalSlot {
        self.slot
    }

    /// 日志内容
    pub fn record(&self) -> &LogRecord {
        &self.record
    }

    /// 日志类型
    pub fn kind(&self) -> LogKind {
        self.record.kind()
    }
}

/// 日志条目池
///
/// 限制同时存在的条目数量，耗尽时返回可恢复错误，
/// 调用者放弃本次日志覆盖而不是阻塞。
#[derive(Debug)]
pub struct EntryPool {
    capacity: usize,
    in_use: AtomicUsize,
}

impl EntryPool {
    /// 创建条目池
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: AtomicUsize::new(0),
        }
    }

    /// 分配条目
    pub fn alloc(&self, slot: JournalSlot, record: LogRecord) -> Result<LogEntry> {
        Ok(self.reserve()?.fill(slot, record))
    }

    /// 预留一个条目名额
    ///
    /// 在分配 journal 槽位之前占住名额。
    pub fn reserve(&self) -> Result<EntryReservation<'_>> {
        let reserved = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            });
        if reserved.is_err() {
            log::warn!("[ENTRY] pool exhausted, capacity={}", self.capacity);
            return Err(JournalError::PoolExhausted.into());
        }
        Ok(EntryReservation { pool: self })
    }

    /// 归还条目
    pub fn release(&self, entry: LogEntry) {
        drop(entry);
        self.put();
    }

    fn put(&self) {
        let _ = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// 当前在用条目数
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// 池容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// 条目池中预留的名额
///
/// 未填充就被丢弃时名额自动归还。
#[derive(Debug)]
pub struct EntryReservation<'a> {
    pool: &'a EntryPool,
}

impl EntryReservation<'_> {
    /// 用槽位和记录填充名额
    pub fn fill(self, slot: JournalSlot, record: LogRecord) -> LogEntry {
        core::mem::forget(self);
        LogEntry { slot, record }
    }
}

impl Drop for EntryReservation<'_> {
    fn drop(&mut self) {
        self.pool.put();
    }
}
