//! 错误类型定义
//!
//! 提供 journal 层操作的错误类型。
//!
//! 错误分为三级：成功、可恢复错误（调用者记录日志后可重试或跳过）、
//! 致命错误（初始化阶段失败，journal 服务无法启动）。

use core::fmt;

/// journal 操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 磁盘数据损坏
    Corrupted,
    /// 对象不存在
    NotFound,
    /// 空间不足
    NoSpace,
    /// 不支持的操作
    Unsupported,
    /// 资源忙，可稍后重试
    Busy,
    /// 无效状态
    InvalidState,
    /// 内存池耗尽
    OutOfMemory,
    /// 致命错误（初始化失败）
    Fatal,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 是否为致命错误
    pub const fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::Fatal)
    }

    /// 是否可以重试（背压类错误）
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Busy)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Journal 层领域错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalError {
    /// 环上没有空闲的全局 epoch
    NoIdleEpoch,
    /// 目标 epoch 在登记过程中已被封存
    EpochSealed,
    /// inode 的 8 个本地 epoch 全部积压
    LocalEpochExhausted,
    /// inode 没有活跃的本地 epoch（需先 check-in）
    NotCheckedIn,
    /// 日志条目池耗尽
    PoolExhausted,
    /// journal superblock 无效
    InvalidSuperblock,
    /// journal 文件内存映像分配失败
    BackingStoreAlloc,
    /// 日志记录无法解析
    InvalidRecord,
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::NoIdleEpoch => write!(f, "no idle global epoch"),
            JournalError::EpochSealed => write!(f, "running epoch was sealed during check-in"),
            JournalError::LocalEpochExhausted => write!(f, "all local epochs are backlogged"),
            JournalError::NotCheckedIn => write!(f, "inode has no active local epoch"),
            JournalError::PoolExhausted => write!(f, "log entry pool exhausted"),
            JournalError::InvalidSuperblock => write!(f, "invalid journal superblock"),
            JournalError::BackingStoreAlloc => write!(f, "journal backing store allocation failed"),
            JournalError::InvalidRecord => write!(f, "invalid log record"),
        }
    }
}

impl From<JournalError> for Error {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::NoIdleEpoch => Error::new(ErrorKind::Busy, "No idle global epoch"),
            JournalError::EpochSealed => Error::new(ErrorKind::Busy, "Running epoch sealed during check-in"),
            JournalError::LocalEpochExhausted => {
                Error::new(ErrorKind::Busy, "All local epochs of inode are backlogged")
            }
            JournalError::NotCheckedIn => {
                Error::new(ErrorKind::InvalidState, "Inode has no active local epoch")
            }
            JournalError::PoolExhausted => Error::new(ErrorKind::OutOfMemory, "Log entry pool exhausted"),
            JournalError::InvalidSuperblock => {
                Error::new(ErrorKind::Corrupted, "Invalid journal superblock")
            }
            JournalError::BackingStoreAlloc => {
                Error::new(ErrorKind::Fatal, "Journal backing store allocation failed")
            }
            JournalError::InvalidRecord => Error::new(ErrorKind::Corrupted, "Invalid log record"),
        }
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
