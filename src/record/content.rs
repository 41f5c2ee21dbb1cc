//! 日志记录内容
//!
//! 每种操作一个固定布局的结构体，只保存该操作需要的字段。
//! 时间戳以秒为单位。

use super::LogKind;
use crate::consts::{J_NAME_LEN, J_SYMLINK_TARGET_LEN};

/// 定长名字字段
///
/// 超过宽度的名字被截断。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LogName<const N: usize> {
    len: u8,
    bytes: [u8; N],
}

/// 文件名字段
pub type FileName = LogName<J_NAME_LEN>;

/// 符号链接目标字段
pub type SymlinkTarget = LogName<J_SYMLINK_TARGET_LEN>;

impl<const N: usize> LogName<N> {
    /// 从字节构造（超长截断）
    pub fn new(name: &[u8]) -> Self {
        let len = name.len().min(N).min(u8::MAX as usize);
        let mut bytes = [0u8; N];
        bytes[..len].copy_from_slice(&name[..len]);
        Self { len: len as u8, bytes }
    }

    /// 名字内容
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// 名字长度
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn raw(&self) -> &[u8; N] {
        &self.bytes
    }

    pub(crate) fn from_raw(len: u8, bytes: [u8; N]) -> Option<Self> {
        if len as usize > N {
            return None;
        }
        Some(Self { len, bytes })
    }
}

impl<const N: usize> Default for LogName<N> {
    fn default() -> Self {
        Self { len: 0, bytes: [0u8; N] }
    }
}

impl<const N: usize> core::fmt::Debug for LogName<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match core::str::from_utf8(self.as_bytes()) {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "{:?}", self.as_bytes()),
        }
    }
}

/// 新 inode 快照（create / mkdir / symlink）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NewInodeLog {
    /// 文件模式
    pub mode: u16,
    /// 文件提示
    pub advise: u8,
    /// inline 标志
    pub inline: u8,
    /// 用户 ID
    pub uid: u32,
    /// 组 ID
    pub gid: u32,
    /// 链接数
    pub links: u32,
    /// 文件大小（字节）
    pub size: u64,
    /// 文件块数
    pub blocks: u64,
    /// 访问时间
    pub atime: u64,
    /// 状态改变时间
    pub ctime: u64,
    /// 修改时间
    pub mtime: u64,
    /// 版本号
    pub generation: u32,
    /// 目录深度
    pub current_depth: u32,
    /// xattr 所在 nid
    pub xattr_nid: u32,
    /// 文件属性
    pub flags: u32,
    /// 父目录 inode 号
    pub pino: u32,
    /// 自身 inode 号
    pub ino: u32,
    /// 大目录的 dentry 层级
    pub dir_level: u8,
    /// 文件名
    pub name: FileName,
}

impl NewInodeLog {
    /// 以最常用字段构造
    pub fn new(ino: u32, pino: u32, mode: u16, name: &[u8]) -> Self {
        Self {
            ino,
            pino,
            mode,
            links: 1,
            name: FileName::new(name),
            ..Default::default()
        }
    }
}

/// NAT 表项快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NatSnapshot {
    /// node id
    pub nid: u32,
    /// 所属 inode
    pub ino: u32,
    /// node 块地址
    pub block_addr: u32,
}

/// SIT 表项快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SitSnapshot {
    /// 当前段类型
    pub cur_seg: u32,
    /// 段号
    pub segno: u32,
    /// 有效块数
    pub valid_blocks: u32,
    /// 位图大小
    pub bitmap_size: u32,
}

/// SSA 表项快照（块地址到 nid 的反向映射）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SsaSnapshot {
    /// 当前段号
    pub cur_seg: u32,
    /// 块在 inode 内的偏移
    pub blk_ofs: u16,
    /// 块地址
    pub block_addr: u32,
    /// node id
    pub nid: u32,
}

/// 数据写回日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataWriteLog {
    /// 数据是否内联在 inode 中
    pub is_inline: bool,
    /// inode 号
    pub ino: u32,
    /// 页偏移
    pub page_ofs: u32,
    /// 当前文件大小
    pub file_size: u64,
    /// NAT 快照
    pub nat: NatSnapshot,
    /// SIT 快照
    pub sit: SitSnapshot,
    /// SSA 快照
    pub ssa: SsaSnapshot,
}

impl DataWriteLog {
    /// 构造数据写回日志
    pub fn new(ino: u32, page_ofs: u32, file_size: u64, nid: u32, segno: u32) -> Self {
        Self {
            ino,
            page_ofs,
            file_size,
            nat: NatSnapshot { nid, ino, block_addr: 0 },
            sit: SitSnapshot { segno, ..Default::default() },
            ssa: SsaSnapshot { nid, ..Default::default() },
            ..Default::default()
        }
    }
}

/// 删除日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteLog {
    /// 被删除 inode
    pub ino: u32,
    /// 父目录
    pub parent_ino: u32,
    /// 删除后的链接数
    pub nlink: u32,
    /// 文件名
    pub name: FileName,
    /// NAT 快照
    pub nat: NatSnapshot,
}

/// 硬链接日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkLog {
    /// 目标 inode
    pub ino: u32,
    /// 新目录项所在目录
    pub parent_ino: u32,
    /// 新目录项名
    pub name: FileName,
}

/// 重命名日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameLog {
    /// 被重命名的 inode
    pub ino: u32,
    /// 原父目录
    pub old_parent: u32,
    /// 新父目录
    pub new_parent: u32,
    /// 原名
    pub old_name: FileName,
    /// 新名
    pub new_name: FileName,
}

/// 符号链接日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymlinkLog {
    /// 新 inode 快照
    pub inode: NewInodeLog,
    /// 链接目标
    pub target: SymlinkTarget,
}

/// 修改属主日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChownLog {
    /// inode 号
    pub ino: u32,
    /// 新用户 ID
    pub uid: u32,
    /// 新组 ID
    pub gid: u32,
    /// 文件大小
    pub size: u64,
    /// 修改时间
    pub mtime: u64,
    /// 状态改变时间
    pub ctime: u64,
}

/// 目录项变更同时修改的父目录属性
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParentAttr {
    /// 状态改变时间
    pub ctime: u64,
    /// 修改时间
    pub mtime: u64,
    /// 目录大小
    pub size: u64,
}

/// 目录项变更日志
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirLog {
    /// 目录项内联在 inode 中还是普通块
    pub inline_dentry: bool,
    /// 文件名哈希
    pub hash: u32,
    /// 目录项指向的 inode
    pub ino: u32,
    /// 父目录
    pub parent_ino: u32,
    /// 文件类型
    pub file_type: u8,
    /// 文件名
    pub name: FileName,
    /// 父目录属性
    pub parent: ParentAttr,
}

/// 访问时间日志（读文件、读目录、stat）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessLog {
    /// inode 号
    pub ino: u32,
    /// 访问时间（秒）
    pub atime_sec: u64,
    /// 访问时间（纳秒部分）
    pub atime_nsec: u32,
}

/// 日志记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRecord {
    /// 创建文件
    Create(NewInodeLog),
    /// 创建目录
    Mkdir(NewInodeLog),
    /// 删除
    Unlink(DeleteLog),
    /// 硬链接
    Link(LinkLog),
    /// 重命名
    Rename(RenameLog),
    /// 符号链接
    Symlink(SymlinkLog),
    /// 修改属主
    Chown(ChownLog),
    /// 目录项变更
    Dir(DirLog),
    /// 读文件数据
    ReadFileData(AccessLog),
    /// 读目录
    ReadDir(AccessLog),
    /// stat
    Stat(AccessLog),
    /// 数据写回
    DataWrite(DataWriteLog),
}

impl LogRecord {
    /// 记录类型
    pub const fn kind(&self) -> LogKind {
        match self {
            LogRecord::Create(_) => LogKind::Create,
            LogRecord::Mkdir(_) => LogKind::Mkdir,
            LogRecord::Unlink(_) => LogKind::Unlink,
            LogRecord::Link(_) => LogKind::Link,
            LogRecord::Rename(_) => LogKind::Rename,
            LogRecord::Symlink(_) => LogKind::Symlink,
            LogRecord::Chown(_) => LogKind::Chown,
            LogRecord::Dir(_) => LogKind::Dir,
            LogRecord::ReadFileData(_) => LogKind::ReadFileData,
            LogRecord::ReadDir(_) => LogKind::ReadDir,
            LogRecord::Stat(_) => LogKind::Stat,
            LogRecord::DataWrite(_) => LogKind::DataWrite,
        }
    }
}
