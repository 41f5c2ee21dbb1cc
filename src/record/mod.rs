//! 日志记录模型
//!
//! - `kind` 磁盘类型标签
//! - `content` 按操作类型划分的定长记录
//! - `codec` 128 字节槽位编解码
//! - `classify` 归约为 checkpoint 三元组

mod classify;
mod codec;
mod content;
mod kind;

pub use codec::{decode, encode, LogHeader};
pub use content::{
    AccessLog, ChownLog, DataWriteLog, DeleteLog, DirLog, FileName, LinkLog, LogName, LogRecord,
    NatSnapshot, NewInodeLog, ParentAttr, RenameLog, SitSnapshot, SsaSnapshot, SymlinkLog,
    SymlinkTarget,
};
pub use kind::LogKind;
