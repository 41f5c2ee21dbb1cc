//! Epoch 管理
//!
//! 文件系统操作按 epoch 分组提交：
//!
//! 1. 操作记录日志前，inode 登记（check-in）到当前运行中的全局 epoch，
//!    并获得一个本地日志队列
//! 2. commit 线程周期性封存运行中的 epoch，环推进到下一个空闲槽位
//! 3. commit 流水线排空被封存 epoch 的所有 inode 队列

mod global;
mod local;
mod ring;

pub use global::{EpochStatus, GlobalEpoch};
pub use local::{InodeEpochState, LocalEpoch, LogListStatus};
pub use ring::EpochRing;
