//! Journal 门面
//!
//! `Journal` 在挂载时创建一次，持有存储、epoch 环、检查点队列和条目池，
//! 被所有记录日志的调用点和两个驱动循环共享。
//!
//! # 前台路径
//!
//! ```text
//! EntryPool::reserve ─> check_in ─> [inode 锁] append_record ─> 追加到本地队列 ─> 页交接 1-2
//! ```
//!
//! 前台任何一步失败都只放弃本次日志覆盖，文件系统操作本身照常完成。
//! 失败的记录不会写进 journal 映像，也不会留下 journal 私有脏页。
//! 记录与页交接都在 inode 锁内完成，commit 排空该 inode 时二者已经一致。

use crate::block::{BlockDev, BlockDevice};
use crate::checkpoint::{do_checkpoint, CheckpointList, CheckpointSummary};
use crate::commit::{do_commit, CommitSummary};
use crate::config::JournalConfig;
use crate::entry::{EntryPool, LogEntry};
use crate::epoch::EpochRing;
use crate::error::{JournalError, Result};
use crate::host::{mark_page_journaled, CheckpointReason, HostFs};
use crate::inode::JournalInode;
use crate::record::{LogKind, LogRecord};
use crate::stats::{JournalStats, StatsSnapshot};
use crate::store::{recover, JournalSlot, JournalStore, RecoveryReport};
use alloc::sync::Arc;

/// epoch journal
pub struct Journal<D: BlockDevice, H: HostFs> {
    store: JournalStore<D>,
    ring: EpochRing,
    checkpoints: CheckpointList,
    pool: EntryPool,
    host: H,
    stats: JournalStats,
}

impl<D: BlockDevice, H: HostFs> Journal<D, H> {
    /// 挂载 journal
    ///
    /// 1. 打开存储（superblock 不存在时初始化）
    /// 2. superblock 有效时扫描并重放日志
    /// 3. 清空 journal 区域
    ///
    /// 返回后即可接受 check-in。
    ///
    /// # 参数
    ///
    /// * `device` - journal 所在块设备
    /// * `host` - 宿主文件系统
    /// * `config` - journal 配置
    pub fn mount(device: D, host: H, config: JournalConfig) -> Result<(Self, RecoveryReport)> {
        let store = JournalStore::open(BlockDev::new(device)?, config)?;

        let report = if store.formatted() {
            log::info!("[JOURNAL] fresh journal, nothing to recover");
            RecoveryReport::default()
        } else {
            recover(&store, &host)?
        };
        store.clear_after_recovery()?;

        let journal = Self {
            store,
            ring: EpochRing::new(),
            checkpoints: CheckpointList::new(),
            pool: EntryPool::new(config.max_pending_entries),
            host,
            stats: JournalStats::default(),
        };
        log::info!(
            "[JOURNAL] mounted: total={} bytes, replayed={}",
            journal.total_space(),
            report.replayed
        );
        Ok((journal, report))
    }

    /// 配置
    pub fn config(&self) -> &JournalConfig {
        self.store.config()
    }

    /// inode 登记到运行中的 epoch
    pub fn check_in(&self, inode: &Arc<JournalInode>) -> Result<u8> {
        self.ring.check_in(inode)
    }

    /// 为记录预留一个 journal 槽位
    pub fn allocate_journal_slot(&self, kind: LogKind) -> JournalSlot {
        self.store.allocate_entry(kind)
    }

    /// 从条目池分配日志条目
    pub fn new_entry(&self, slot: JournalSlot, record: LogRecord) -> Result<LogEntry> {
        self.pool.alloc(slot, record)
    }

    /// 追加日志到 inode 的活跃本地队列
    ///
    /// inode 没有活跃本地队列时条目归还条目池，返回 `NotCheckedIn`。
    pub fn append_log(&self, inode: &JournalInode, entry: LogEntry) -> Result<()> {
        let rejected = inode.lock().push(entry);
        match rejected {
            Ok(()) => Ok(()),
            Err(entry) => {
                self.pool.release(entry);
                Err(JournalError::NotCheckedIn.into())
            }
        }
    }

    /// 记录一次文件系统操作
    ///
    /// 失败时放弃本次日志覆盖并计入丢弃统计。
    ///
    /// # 返回
    ///
    /// 记录所在的 journal 槽位
    pub fn log_operation(&self, inode: &Arc<JournalInode>, record: LogRecord) -> Result<JournalSlot> {
        let result = self.try_log(inode, record);
        if let Err(e) = &result {
            log::warn!(
                "[JOURNAL] ino={} {} not journaled: {}",
                inode.ino(),
                record.kind().name(),
                e
            );
            self.stats.entry_dropped();
        }
        result
    }

    fn try_log(&self, inode: &Arc<JournalInode>, record: LogRecord) -> Result<JournalSlot> {
        let reservation = self.pool.reserve()?;

        for _ in 0..2 {
            self.check_in(inode)?;

            let mut state = inode.lock();
            // check-in 之后 epoch 可能已被封存并排空
            if !state.can_push() {
                continue;
            }

            let slot = self.store.append_record(&record)?;
            if let Err(entry) = state.push(reservation.fill(slot, record)) {
                drop(state);
                self.pool.release(entry);
                return Err(JournalError::NotCheckedIn.into());
            }
            if let Some(info) = record.classify() {
                for page in info.pages() {
                    if let Err(e) = mark_page_journaled(&self.host, page) {
                        log::warn!("[JOURNAL] mark {:?} journaled failed: {}", page, e);
                    }
                }
            }
            drop(state);

            log::trace!(
                "[JOURNAL] ino={} {} -> file={} idx={}",
                inode.ino(),
                record.kind().name(),
                slot.file(),
                slot.index()
            );
            return Ok(slot);
        }
        Err(JournalError::EpochSealed.into())
    }

    /// 封存运行中的 epoch
    pub fn trigger_commit(&self) -> Result<u8> {
        self.ring.trigger_epoch_commit()
    }

    /// 排空所有待 commit 的 epoch
    pub fn epoch_commit(&self) -> CommitSummary {
        let summary = do_commit(&self.ring, &self.pool, &self.checkpoints, &self.store, &self.host);
        self.stats.committed(summary.epochs, summary.entries);
        self.stats.pages_persisted(summary.pages);
        summary
    }

    /// 执行检查点
    pub fn epoch_checkpoint(&self) -> Result<CheckpointSummary> {
        let summary = do_checkpoint(&self.checkpoints, &self.store, &self.host)?;
        self.stats.checkpoint_done();
        Ok(summary)
    }

    /// 封存并 commit 当前所有日志（fsync 路径）
    pub fn sync(&self) -> Result<CommitSummary> {
        match self.trigger_commit() {
            Ok(_) => {}
            Err(e) if e.is_retryable() => {
                // 环已满：先排空，再封存
                self.epoch_commit();
                self.trigger_commit()?;
            }
            Err(e) => return Err(e),
        }
        let summary = self.epoch_commit();
        self.store.flush()?;
        Ok(summary)
    }

    /// 卸载前的最终同步与检查点
    pub fn unmount(&self) -> Result<()> {
        self.sync()?;
        self.epoch_checkpoint()?;
        self.host.checkpoint(CheckpointReason::Umount)?;
        self.store.flush()?;
        log::info!("[JOURNAL] unmounted");
        Ok(())
    }

    /// 剩余空间（字节）
    pub fn free_space(&self) -> u64 {
        self.store.free_space()
    }

    /// 总空间（字节）
    pub fn total_space(&self) -> u64 {
        self.store.total_space()
    }

    /// 触发检查点的剩余空间阈值（字节）
    pub fn free_space_threshold(&self) -> u64 {
        self.config().free_space_threshold()
    }

    /// 运行统计
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            wraps: self.store.wraps(),
            ..self.stats.snapshot()
        }
    }

    /// 宿主文件系统
    pub fn host(&self) -> &H {
        &self.host
    }

    /// epoch 环
    pub fn ring(&self) -> &EpochRing {
        &self.ring
    }

    /// journal 存储
    pub fn store(&self) -> &JournalStore<D> {
        &self.store
    }

    /// 检查点队列
    pub fn checkpoints(&self) -> &CheckpointList {
        &self.checkpoints
    }

    /// 日志条目池
    pub fn pool(&self) -> &EntryPool {
        &self.pool
    }
}
