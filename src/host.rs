//! 宿主文件系统接口
//!
//! journal 层只通过这里定义的窄接口与宿主交互：
//!
//! - 元数据页寻址：node 页、NAT 页、SIT 页、SSA 页
//! - 页脏标志的四阶段交接协议
//! - `checkpoint(reason)` / `writepages(ino)`
//! - 挂载恢复时的重放钩子
//!
//! # 四阶段交接
//!
//! 记录日志时：
//! 1. 清除 I/O 脏标志（`clear_page_dirty_for_io`）
//! 2. 设置 journal 私有脏标志
//!
//! checkpoint 时：
//! 3. 清除 journal 私有脏标志
//! 4. 设置普通脏标志，交给宿主自己的 checkpoint 写回

use crate::error::Result;
use crate::record::{DeleteLog, LogKind, LogRecord, NewInodeLog};
use bitflags::bitflags;

/// 宿主元数据页地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetaPage {
    /// node 页（按 nid 或 ino）
    Node(u32),
    /// 记录该 nid 地址映射的 NAT 页
    Nat(u32),
    /// 段的 SIT 页
    Sit(u32),
    /// 段的 SSA（summary）页
    Ssa(u32),
}

bitflags! {
    /// 页面标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// 普通脏页，宿主 checkpoint 会写回
        const DIRTY         = 0x01;
        /// journal 私有脏标志，已被日志覆盖，宿主不得写回
        const JOURNAL_DIRTY = 0x02;
    }
}

/// 调用宿主 checkpoint 的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointReason {
    /// journal 回收空间后的快速 checkpoint
    FastBoot,
    /// 卸载前的最终 checkpoint
    Umount,
}

/// 宿主文件系统
pub trait HostFs: Send + Sync {
    /// 清除页面标志
    fn clear_page_flags(&self, page: MetaPage, flags: PageFlags) -> Result<()>;

    /// 设置页面标志
    fn set_page_flags(&self, page: MetaPage, flags: PageFlags) -> Result<()>;

    /// 同步写回一个 inode 的脏数据页
    fn writepages(&self, ino: u32) -> Result<()>;

    /// 执行宿主 checkpoint
    fn checkpoint(&self, reason: CheckpointReason) -> Result<()>;

    /// 重放 create / mkdir / symlink
    fn recover_new_inode(&self, _kind: LogKind, _inode: &NewInodeLog) -> Result<()> {
        Ok(())
    }

    /// 重放 unlink
    fn recover_unlink(&self, _log: &DeleteLog) -> Result<()> {
        Ok(())
    }

    /// 重放其余记录
    fn recover_record(&self, _record: &LogRecord) -> Result<()> {
        Ok(())
    }
}

/// 阶段 1-2：页面被日志覆盖
pub fn mark_page_journaled<H: HostFs + ?Sized>(host: &H, page: MetaPage) -> Result<()> {
    host.clear_page_flags(page, PageFlags::DIRTY)?;
    host.set_page_flags(page, PageFlags::JOURNAL_DIRTY)
}

/// 阶段 3-4：页面交还给宿主写回
pub fn release_page_to_host<H: HostFs + ?Sized>(host: &H, page: MetaPage) -> Result<()> {
    host.clear_page_flags(page, PageFlags::JOURNAL_DIRTY)?;
    host.set_page_flags(page, PageFlags::DIRTY)
}
