//! Journal 检查点
//!
//! commit 把每个 epoch 归约出的 (inode, node, segment) 三元组作为一批
//! 挂到检查点队列。检查点时：
//!
//! 1. 取出队列中的所有批次
//! 2. 三元组展开成宿主元数据页，逐页执行交接阶段 3-4
//! 3. 调用宿主 checkpoint 写回这些页
//! 4. 清零 journal 已用空间
//!
//! 宿主 checkpoint 失败时已用空间保持不变，页已经是普通脏页，
//! 宿主下一次 checkpoint 仍会写回它们。

use crate::block::BlockDevice;
use crate::consts::NONE_ID;
use crate::error::Result;
use crate::host::{release_page_to_host, CheckpointReason, HostFs, MetaPage};
use crate::store::JournalStore;
use alloc::collections::{BTreeSet, VecDeque};
use alloc::vec::Vec;
use spin::Mutex;

/// checkpoint 三元组
///
/// 0 表示该位置没有目标。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointInfo {
    /// inode 号
    pub ino: u32,
    /// node 号
    pub nid: u32,
    /// 段号
    pub segno: u32,
}

impl CheckpointInfo {
    /// 完整三元组
    pub const fn new(ino: u32, nid: u32, segno: u32) -> Self {
        Self { ino, nid, segno }
    }

    /// 只有 inode 的三元组
    pub const fn inode_only(ino: u32) -> Self {
        Self::new(ino, NONE_ID, NONE_ID)
    }

    /// 三元组对应的宿主元数据页
    ///
    /// - inode：node 页和 NAT 页
    /// - node：node 页和 NAT 页
    /// - 段：SIT 页和 SSA 页
    pub fn pages(&self) -> impl Iterator<Item = MetaPage> {
        let ino = (self.ino != NONE_ID).then_some([MetaPage::Node(self.ino), MetaPage::Nat(self.ino)]);
        let nid = (self.nid != NONE_ID).then_some([MetaPage::Node(self.nid), MetaPage::Nat(self.nid)]);
        let seg = (self.segno != NONE_ID)
            .then_some([MetaPage::Sit(self.segno), MetaPage::Ssa(self.segno)]);
        ino.into_iter().chain(nid).chain(seg).flatten()
    }
}

/// 一个 epoch 的 checkpoint 批次
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointBatch {
    /// 来源 epoch 的序列号
    pub seq: u64,
    /// 三元组
    pub infos: Vec<CheckpointInfo>,
}

impl CheckpointBatch {
    /// 创建空批次
    pub fn new(seq: u64) -> Self {
        Self {
            seq,
            infos: Vec::new(),
        }
    }
}

/// 检查点队列，按 commit 顺序排列
#[derive(Debug, Default)]
pub struct CheckpointList {
    batches: Mutex<VecDeque<CheckpointBatch>>,
}

impl CheckpointList {
    /// 创建空队列
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一批
    pub fn push(&self, batch: CheckpointBatch) {
        self.batches.lock().push_back(batch);
    }

    /// 队列是否为空
    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }

    /// 批次数
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    /// 取出全部批次
    pub fn take_all(&self) -> VecDeque<CheckpointBatch> {
        core::mem::take(&mut *self.batches.lock())
    }
}

/// 一次检查点的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointSummary {
    /// 处理的批次数
    pub batches: usize,
    /// 交还给宿主的页数
    pub pages: usize,
    /// 交接失败的页数
    pub page_errors: usize,
}

/// 执行检查点
///
/// # 参数
///
/// * `list` - 检查点队列
/// * `store` - journal 存储
/// * `host` - 宿主文件系统
///
/// # 返回
///
/// 宿主 checkpoint 失败时返回错误，已用空间不清零
pub fn do_checkpoint<D: BlockDevice, H: HostFs + ?Sized>(
    list: &CheckpointList,
    store: &JournalStore<D>,
    host: &H,
) -> Result<CheckpointSummary> {
    let batches = list.take_all();
    let mut summary = CheckpointSummary {
        batches: batches.len(),
        ..Default::default()
    };

    // 同一页只交接一次
    let pages: BTreeSet<MetaPage> = batches
        .iter()
        .flat_map(|b| b.infos.iter())
        .flat_map(CheckpointInfo::pages)
        .collect();

    for page in pages {
        match release_page_to_host(host, page) {
            Ok(()) => summary.pages += 1,
            Err(e) => {
                log::warn!("[CKPT] release {:?} failed: {}", page, e);
                summary.page_errors += 1;
            }
        }
    }

    if let Err(e) = host.checkpoint(CheckpointReason::FastBoot) {
        log::error!("[CKPT] host checkpoint failed: {}", e);
        return Err(e);
    }
    store.reset_after_checkpoint();

    log::info!(
        "[CKPT] done: batches={} pages={} errors={}",
        summary.batches,
        summary.pages,
        summary.page_errors
    );
    Ok(summary)
}

/// 检查点触发原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointTrigger {
    /// 剩余空间不高于阈值
    SpacePressure,
    /// 距上次检查点超时
    Timeout,
}

/// 是否应当做检查点
///
/// 空间压力优先；队列非空且超时也触发。
pub fn should_checkpoint(
    free_space: u64,
    threshold: u64,
    ticks_since_last: u64,
    timeout_ticks: u64,
    has_pending: bool,
) -> Option<CheckpointTrigger> {
    if free_space <= threshold {
        Some(CheckpointTrigger::SpacePressure)
    } else if has_pending && ticks_since_last >= timeout_ticks {
        Some(CheckpointTrigger::Timeout)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockDev;
    use crate::host::{mark_page_journaled, PageFlags};
    use crate::record::{AccessLog, LogRecord};
    use crate::test_utils::{test_config, MockDevice, MockHost};
    use alloc::vec;

    fn store() -> JournalStore<MockDevice> {
        JournalStore::open(BlockDev::new(MockDevice::new(16)).unwrap(), test_config()).unwrap()
    }

    #[test]
    fn test_triple_pages() {
        let pages: Vec<_> = CheckpointInfo::new(42, 300, 17).pages().collect();
        assert_eq!(
            pages,
            vec![
                MetaPage::Node(42),
                MetaPage::Nat(42),
                MetaPage::Node(300),
                MetaPage::Nat(300),
                MetaPage::Sit(17),
                MetaPage::Ssa(17),
            ]
        );
        assert_eq!(CheckpointInfo::inode_only(5).pages().count(), 2);
        assert_eq!(CheckpointInfo::default().pages().count(), 0);
    }

    #[test]
    fn test_checkpoint_hands_pages_back() {
        let store = store();
        let host = MockHost::new();
        let list = CheckpointList::new();

        for page in CheckpointInfo::new(42, 300, 17).pages() {
            mark_page_journaled(&host, page).unwrap();
        }
        let mut batch = CheckpointBatch::new(1);
        batch.infos.push(CheckpointInfo::new(42, 300, 17));
        batch.infos.push(CheckpointInfo::inode_only(42));
        list.push(batch);

        store.append_record(&LogRecord::Stat(AccessLog::default())).unwrap();
        store.persist().unwrap();
        assert!(store.used_space() > 0);

        let summary = do_checkpoint(&list, &store, &host).unwrap();
        assert_eq!(summary.batches, 1);
        assert_eq!(summary.pages, 6);
        assert!(list.is_empty());
        assert_eq!(host.page_flags(MetaPage::Ssa(17)), PageFlags::DIRTY);
        assert_eq!(host.page_flags(MetaPage::Node(42)), PageFlags::DIRTY);
        assert_eq!(host.checkpoints(), vec![CheckpointReason::FastBoot]);
        assert_eq!(store.used_space(), 0);
    }

    #[test]
    fn test_host_failure_keeps_used_space() {
        let store = store();
        let host = MockHost::new();
        host.fail_checkpoint(true);
        store.append_record(&LogRecord::Stat(AccessLog::default())).unwrap();
        store.persist().unwrap();

        let list = CheckpointList::new();
        list.push(CheckpointBatch::new(1));
        assert!(do_checkpoint(&list, &store, &host).is_err());
        assert_eq!(store.used_space(), 4096);
    }

    #[test]
    fn test_should_checkpoint() {
        // 空间压力优先
        assert_eq!(
            should_checkpoint(4, 5, 0, 3, false),
            Some(CheckpointTrigger::SpacePressure)
        );
        assert_eq!(should_checkpoint(50, 5, 3, 3, true), Some(CheckpointTrigger::Timeout));
        assert_eq!(should_checkpoint(50, 5, 3, 3, false), None);
        assert_eq!(should_checkpoint(50, 5, 2, 3, true), None);
    }

    #[test]
    fn test_space_pressure_at_exact_threshold() {
        assert_eq!(
            should_checkpoint(5, 5, 0, 3, true),
            Some(CheckpointTrigger::SpacePressure)
        );
        assert_eq!(should_checkpoint(6, 5, 0, 3, true), None);
    }
}
