//! Epoch commit 流水线
//!
//! 逐个处理待 commit 队列中被封存的 epoch：
//!
//! 1. 依次取出登记在该 epoch 上的 inode
//! 2. 在 inode 锁外排空其本地队列，把日志归约为 checkpoint 三元组；
//!    数据写回类日志先同步写回 inode 的数据页，每个 inode 最多一次；
//!    写回失败时丢弃三元组，其元数据页立即交还宿主
//! 3. 归还日志条目，本地槽位回到 Idle
//! 4. 三元组批次挂到检查点队列
//! 5. 持久化 journal 映像
//! 6. epoch 回到 Idle

use crate::block::BlockDevice;
use crate::checkpoint::{CheckpointBatch, CheckpointList};
use crate::entry::EntryPool;
use crate::epoch::EpochRing;
use crate::host::{release_page_to_host, HostFs};
use crate::inode::JournalInode;
use crate::store::JournalStore;
use alloc::sync::Arc;

/// 一次 commit 的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// 排空的 epoch 数
    pub epochs: u64,
    /// 处理的 inode 数
    pub inodes: u64,
    /// 归还的日志数
    pub entries: u64,
    /// 因数据写回失败而丢弃的三元组数（页已交还宿主）
    pub dropped_triples: u64,
    /// 持久化的页数
    pub pages: u64,
    /// 持久化失败次数
    pub persist_errors: u64,
}

/// 排空所有待 commit 的 epoch
///
/// 单个 inode 或持久化的失败只记录日志，不中断流水线。
pub fn do_commit<D: BlockDevice, H: HostFs + ?Sized>(
    ring: &EpochRing,
    pool: &EntryPool,
    checkpoints: &CheckpointList,
    store: &JournalStore<D>,
    host: &H,
) -> CommitSummary {
    let mut summary = CommitSummary::default();

    while let Some(epoch) = ring.begin_commit() {
        log::debug!("[COMMIT] epoch ordinal={} seq={}", epoch.ordinal, epoch.seq);
        let mut batch = CheckpointBatch::new(epoch.seq);

        while let Some(inode) = ring.pop_registered(epoch.ordinal) {
            aggregate_inode(&inode, epoch.ordinal, pool, host, &mut batch, &mut summary);
            summary.inodes += 1;
        }

        if !batch.infos.is_empty() {
            checkpoints.push(batch);
        }

        match store.persist() {
            Ok(pages) => summary.pages += pages,
            Err(e) => {
                log::error!("[COMMIT] persist failed for seq={}: {}", epoch.seq, e);
                summary.persist_errors += 1;
            }
        }

        ring.finish_commit(epoch.ordinal);
        summary.epochs += 1;
    }

    if summary.epochs > 0 {
        log::info!(
            "[COMMIT] epochs={} inodes={} entries={} pages={}",
            summary.epochs,
            summary.inodes,
            summary.entries,
            summary.pages
        );
    }
    summary
}

/// 排空一个 inode 在该 epoch 下的本地队列
fn aggregate_inode<H: HostFs + ?Sized>(
    inode: &Arc<JournalInode>,
    ordinal: u8,
    pool: &EntryPool,
    host: &H,
    batch: &mut CheckpointBatch,
    summary: &mut CommitSummary,
) {
    let drained = inode.lock().begin_drain(ordinal);
    let Some((local, entries)) = drained else {
        log::warn!("[COMMIT] ino={} has no local epoch for ordinal={}", inode.ino(), ordinal);
        return;
    };

    let mut flushed: Option<bool> = None;
    for entry in entries {
        if let Some(info) = entry.record().classify() {
            let keep = !entry.record().requires_data_flush()
                || *flushed.get_or_insert_with(|| match host.writepages(inode.ino()) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("[COMMIT] writepages ino={} failed: {}", inode.ino(), e);
                        false
                    }
                });
            if keep {
                batch.infos.push(info);
            } else {
                // 三元组不进检查点，页直接交还宿主
                for page in info.pages() {
                    if let Err(e) = release_page_to_host(host, page) {
                        log::warn!("[COMMIT] release {:?} failed: {}", page, e);
                    }
                }
                summary.dropped_triples += 1;
            }
        } else {
            log::trace!("[COMMIT] ino={} {} has no checkpoint target", inode.ino(), entry.kind().name());
        }
        pool.release(entry);
        summary.entries += 1;
    }

    inode.lock().finish_drain(ordinal, local);
}
