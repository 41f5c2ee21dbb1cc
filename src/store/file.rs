//! journal 小文件
//!
//! journal 区域被切成若干等长小文件，每个小文件是一个槽位环：
//! 写游标走到容量上限时文件整体进入 `WholeFileWaitCommit`，随即重置为
//! 在用、游标归零。尚未持久化的尾部块被记下来，由下一次持久化补写。

use super::FileState;
use crate::consts::entry_to_block;

/// 闭区间块范围
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    /// 起始块
    pub start: u64,
    /// 结束块（包含）
    pub end: u64,
}

impl BlockRange {
    pub(crate) fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    fn merge(self, other: BlockRange) -> BlockRange {
        BlockRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// 小文件的内存元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmallFile {
    index: u32,
    state: FileState,
    cursor: u32,
    capacity: u32,
    start_blk: u64,
    end_blk: u64,
    first_inused: u64,
    pending_tail: Option<BlockRange>,
}

impl SmallFile {
    pub(crate) fn new(index: u32, start_blk: u64, nr_blocks: u32, capacity: u32) -> Self {
        Self {
            index,
            state: FileState::Idle,
            cursor: 0,
            capacity,
            start_blk,
            end_blk: start_blk + nr_blocks as u64,
            first_inused: start_blk,
            pending_tail: None,
        }
    }

    /// 小文件下标
    pub fn index(&self) -> u32 {
        self.index
    }

    /// 状态
    pub fn state(&self) -> FileState {
        self.state
    }

    /// 下一个空闲槽位
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// 槽位容量
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 起始块
    pub fn start_blk(&self) -> u64 {
        self.start_blk
    }

    /// 结束块（不包含）
    pub fn end_blk(&self) -> u64 {
        self.end_blk
    }

    /// 第一个尚未持久化完成的块
    pub fn first_inused(&self) -> u64 {
        self.first_inused
    }

    /// 绕回前遗留的未持久化尾部
    pub fn pending_tail(&self) -> Option<BlockRange> {
        self.pending_tail
    }

    /// 分配一个槽位
    ///
    /// # 返回
    ///
    /// (槽位下标, 本次分配是否使文件绕回)
    pub(crate) fn allocate(&mut self) -> (u32, bool) {
        if self.state == FileState::Idle {
            log::debug!("[JSTORE] idle j_file[{}] is in use", self.index);
            self.state = FileState::InUse;
        }

        let idx = self.cursor;
        self.cursor += 1;

        if self.cursor == self.capacity {
            self.state = FileState::WholeFileWaitCommit;
            let tail = BlockRange {
                start: self.first_inused,
                end: self.end_blk - 1,
            };
            self.pending_tail = Some(match self.pending_tail {
                Some(prev) => {
                    log::warn!(
                        "[JSTORE] j_file[{}] wrapped twice without persist",
                        self.index
                    );
                    prev.merge(tail)
                }
                None => tail,
            });
            self.cursor = 0;
            self.state = FileState::InUse;
            self.first_inused = self.start_blk;
            log::info!("[JSTORE] no free entry on j_file[{}], reuse from start", self.index);
            (idx, true)
        } else {
            self.state = FileState::PartialFileWaitCommit;
            (idx, false)
        }
    }

    /// 取出待持久化的块范围
    ///
    /// 最后一块可能只写了一部分，水位线停在该块上，下次持久化会重写它。
    ///
    /// # 返回
    ///
    /// (绕回前的尾部, 当前已用区间)
    pub(crate) fn take_dirty_ranges(&mut self) -> (Option<BlockRange>, Option<BlockRange>) {
        let tail = self.pending_tail.take();
        let head = match self.state {
            FileState::WholeFileWaitCommit | FileState::PartialFileWaitCommit if self.cursor > 0 => {
                let end = self.start_blk + entry_to_block(self.cursor - 1) as u64;
                Some(BlockRange {
                    start: self.first_inused,
                    end,
                })
            }
            _ => None,
        };
        if let Some(range) = head {
            self.first_inused = range.end;
            self.state = FileState::InUse;
        }
        (tail, head)
    }

    /// 持久化失败，把范围放回待写集合
    pub(crate) fn requeue(&mut self, range: BlockRange) {
        self.pending_tail = Some(match self.pending_tail {
            Some(prev) => prev.merge(range),
            None => range,
        });
    }

    /// 清零后回到初始状态
    pub(crate) fn reset(&mut self) {
        self.state = FileState::Idle;
        self.cursor = 0;
        self.first_inused = self.start_blk;
        self.pending_tail = None;
    }
}
