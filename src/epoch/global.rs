//! 全局 epoch

/// 全局 epoch 状态
///
/// `Idle → Running → ToBeCommitted → Committing → Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EpochStatus {
    /// 空闲，可被推进选中
    Idle = 0,
    /// 正在接受 check-in
    Running = 1,
    /// 已封存，等待 commit
    ToBeCommitted = 2,
    /// commit 正在排空
    Committing = 3,
}

/// 全局 epoch 环上的一个槽位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalEpoch {
    /// 序号（同时是环下标）
    pub ordinal: u8,
    /// 状态
    pub status: EpochStatus,
    /// 最近一次进入 Running 时的全局序列号
    pub seq: u64,
}

impl GlobalEpoch {
    pub(crate) const fn new(ordinal: u8) -> Self {
        Self {
            ordinal,
            status: EpochStatus::Idle,
            seq: 0,
        }
    }
}
