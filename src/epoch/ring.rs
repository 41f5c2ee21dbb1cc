//! 全局 epoch 环
//!
//! # 锁
//!
//! - epoch 切换锁：保护运行中序号、序列号、各槽位状态和待提交队列
//! - 每个全局序号一把登记锁：保护该 epoch 的 inode 登记列表
//! - inode 锁：保护 inode 自己的本地 epoch 状态
//!
//! 加锁顺序固定为 inode → 登记锁 → 切换锁，任何路径都不会在持有
//! 切换锁时再获取其它锁。

use super::{EpochStatus, GlobalEpoch};
use crate::consts::MAX_GLOBAL_EP_NUM;
use crate::error::{JournalError, Result};
use crate::inode::JournalInode;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use spin::Mutex;

#[derive(Debug)]
struct SwitchState {
    running: u8,
    seq: u64,
    epochs: [GlobalEpoch; MAX_GLOBAL_EP_NUM],
    commit_queue: VecDeque<u8>,
}

impl SwitchState {
    /// 推进到下一个槽位
    ///
    /// 下一个槽位不是 Idle 时不做任何修改，返回 `NoIdleEpoch`。
    fn advance(&mut self) -> Result<u8> {
        let next = ((self.running as usize + 1) % MAX_GLOBAL_EP_NUM) as u8;
        let slot = &mut self.epochs[next as usize];
        if slot.status != EpochStatus::Idle {
            log::warn!(
                "[EPOCH] no idle epoch, next={} status={:?}, need to wait",
                next,
                slot.status
            );
            return Err(JournalError::NoIdleEpoch.into());
        }
        self.seq += 1;
        slot.status = EpochStatus::Running;
        slot.seq = self.seq;
        self.running = next;
        log::debug!("[EPOCH] advance: running={} seq={}", next, self.seq);
        Ok(next)
    }
}

/// 全局 epoch 环
///
/// 挂载时创建一次，由 journal 持有，commit 线程和所有 check-in 调用点共享。
#[derive(Debug)]
pub struct EpochRing {
    switch: Mutex<SwitchState>,
    registrations: [Mutex<VecDeque<Arc<JournalInode>>>; MAX_GLOBAL_EP_NUM],
}

impl Default for EpochRing {
    fn default() -> Self {
        Self::new()
    }
}

impl EpochRing {
    /// 创建 epoch 环，槽位 0 处于 Running
    pub fn new() -> Self {
        let mut epochs: [GlobalEpoch; MAX_GLOBAL_EP_NUM] =
            core::array::from_fn(|i| GlobalEpoch::new(i as u8));
        epochs[0].status = EpochStatus::Running;

        Self {
            switch: Mutex::new(SwitchState {
                running: 0,
                seq: 0,
                epochs,
                commit_queue: VecDeque::with_capacity(MAX_GLOBAL_EP_NUM),
            }),
            registrations: core::array::from_fn(|_| Mutex::new(VecDeque::new())),
        }
    }

    /// 当前运行中的序号
    pub fn running_ordinal(&self) -> u8 {
        self.switch.lock().running
    }

    /// 全局序列号
    pub fn sequence(&self) -> u64 {
        self.switch.lock().seq
    }

    /// 槽位快照
    pub fn epoch(&self, ordinal: u8) -> GlobalEpoch {
        self.switch.lock().epochs[ordinal as usize]
    }

    /// 槽位状态
    pub fn status(&self, ordinal: u8) -> EpochStatus {
        self.switch.lock().epochs[ordinal as usize].status
    }

    /// 已登记到该 epoch 的 inode 数
    pub fn registered_count(&self, ordinal: u8) -> usize {
        self.registrations[ordinal as usize].lock().len()
    }

    /// 是否有待 commit 的 epoch
    pub fn has_pending_commit(&self) -> bool {
        !self.switch.lock().commit_queue.is_empty()
    }

    /// 待 commit 的 epoch 数
    pub fn pending_commit_count(&self) -> usize {
        self.switch.lock().commit_queue.len()
    }

    /// inode 登记到当前运行中的 epoch
    ///
    /// 对同一 (inode, 运行中 epoch) 幂等：已登记时只重新激活映射的本地槽位。
    ///
    /// # 返回
    ///
    /// 登记的全局序号
    ///
    /// # 错误
    ///
    /// - `NoIdleEpoch`：运行中槽位不是 Running
    /// - `LocalEpochExhausted`：inode 的本地槽位全部积压
    /// - `EpochSealed`：两次尝试中运行中 epoch 都在登记途中被封存
    ///
    /// 以上错误均可重试。
    pub fn check_in(&self, inode: &Arc<JournalInode>) -> Result<u8> {
        for _ in 0..2 {
            let ordinal = {
                let switch = self.switch.lock();
                let running = switch.running;
                if switch.epochs[running as usize].status != EpochStatus::Running {
                    log::warn!("[EPOCH] check-in ino={}: no running epoch", inode.ino());
                    return Err(JournalError::NoIdleEpoch.into());
                }
                running
            };

            let mut state = inode.lock();
            if let Some(local) = state.local_for(ordinal) {
                state.activate(local);
                return Ok(ordinal);
            }

            let local = match state.find_idle_local() {
                Some(local) => local,
                None => {
                    log::warn!(
                        "[EPOCH] check-in ino={}: all local epochs backlogged",
                        inode.ino()
                    );
                    return Err(JournalError::LocalEpochExhausted.into());
                }
            };

            {
                let mut list = self.registrations[ordinal as usize].lock();
                // 读取序号后 epoch 可能已被封存
                if self.status(ordinal) != EpochStatus::Running {
                    continue;
                }
                list.push_back(Arc::clone(inode));
            }
            state.bind_local(ordinal, local);
            log::trace!(
                "[EPOCH] check-in ino={} ordinal={} local={}",
                inode.ino(),
                ordinal,
                local
            );
            return Ok(ordinal);
        }
        Err(JournalError::EpochSealed.into())
    }

    /// 封存运行中的 epoch 并推进环
    ///
    /// 新 epoch 立即开始接受 check-in，前台操作不等待 commit。
    /// 下一个槽位不空闲时什么都不做并返回可重试的 `NoIdleEpoch`，
    /// 当前 epoch 继续运行。
    ///
    /// # 返回
    ///
    /// 被封存的序号
    pub fn trigger_epoch_commit(&self) -> Result<u8> {
        let mut switch = self.switch.lock();
        let sealed = switch.running;
        let next = (sealed as usize + 1) % MAX_GLOBAL_EP_NUM;
        if switch.epochs[next].status != EpochStatus::Idle {
            log::warn!(
                "[EPOCH] cannot seal ordinal={}: next epoch {} is {:?}",
                sealed,
                next,
                switch.epochs[next].status
            );
            return Err(JournalError::NoIdleEpoch.into());
        }

        switch.commit_queue.push_back(sealed);
        switch.epochs[sealed as usize].status = EpochStatus::ToBeCommitted;
        switch.advance()?;
        log::debug!("[EPOCH] sealed ordinal={} for commit", sealed);
        Ok(sealed)
    }

    /// 取出队首待 commit 的 epoch 并标记为 Committing
    pub(crate) fn begin_commit(&self) -> Option<GlobalEpoch> {
        let mut switch = self.switch.lock();
        let ordinal = *switch.commit_queue.front()?;
        let epoch = &mut switch.epochs[ordinal as usize];
        epoch.status = EpochStatus::Committing;
        Some(*epoch)
    }

    /// 从登记列表中取出一个 inode
    pub(crate) fn pop_registered(&self, ordinal: u8) -> Option<Arc<JournalInode>> {
        self.registrations[ordinal as usize].lock().pop_front()
    }

    /// epoch 排空完成：出队并回到 Idle
    pub(crate) fn finish_commit(&self, ordinal: u8) {
        let mut switch = self.switch.lock();
        if switch.commit_queue.front() == Some(&ordinal) {
            switch.commit_queue.pop_front();
        } else {
            log::error!("[EPOCH] commit queue head mismatch, ordinal={}", ordinal);
            switch.commit_queue.retain(|o| *o != ordinal);
        }
        switch.epochs[ordinal as usize].status = EpochStatus::Idle;
    }
}
