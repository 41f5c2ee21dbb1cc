//! 日志类型标签

/// 日志类型（磁盘上的 `log_type` 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LogKind {
    /// 创建文件
    Create = 0,
    /// 创建目录
    Mkdir = 1,
    /// 删除
    Unlink = 2,
    /// 硬链接
    Link = 3,
    /// 重命名
    Rename = 4,
    /// 符号链接
    Symlink = 5,
    /// 修改属主
    Chown = 6,
    /// 目录项变更
    Dir = 7,
    /// 读文件数据（访问时间）
    ReadFileData = 8,
    /// 读目录（访问时间）
    ReadDir = 9,
    /// stat（访问时间）
    Stat = 10,
    /// 数据写回
    DataWrite = 11,
}

impl LogKind {
    /// 全部类型，按标签顺序
    pub const ALL: [LogKind; 12] = [
        LogKind::Create,
        LogKind::Mkdir,
        LogKind::Unlink,
        LogKind::Link,
        LogKind::Rename,
        LogKind::Symlink,
        LogKind::Chown,
        LogKind::Dir,
        LogKind::ReadFileData,
        LogKind::ReadDir,
        LogKind::Stat,
        LogKind::DataWrite,
    ];

    /// 从磁盘标签解析，未知标签返回 None
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(LogKind::Create),
            1 => Some(LogKind::Mkdir),
            2 => Some(LogKind::Unlink),
            3 => Some(LogKind::Link),
            4 => Some(LogKind::Rename),
            5 => Some(LogKind::Symlink),
            6 => Some(LogKind::Chown),
            7 => Some(LogKind::Dir),
            8 => Some(LogKind::ReadFileData),
            9 => Some(LogKind::ReadDir),
            10 => Some(LogKind::Stat),
            11 => Some(LogKind::DataWrite),
            _ => None,
        }
    }

    /// 磁盘标签
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    /// 类型名（用于日志输出）
    pub const fn name(self) -> &'static str {
        match self {
            LogKind::Create => "create",
            LogKind::Mkdir => "mkdir",
            LogKind::Unlink => "unlink",
            LogKind::Link => "link",
            LogKind::Rename => "rename",
            LogKind::Symlink => "symlink",
            LogKind::Chown => "chown",
            LogKind::Dir => "dir",
            LogKind::ReadFileData => "read_file_data",
            LogKind::ReadDir => "read_dir",
            LogKind::Stat => "stat",
            LogKind::DataWrite => "data_write",
        }
    }
}
