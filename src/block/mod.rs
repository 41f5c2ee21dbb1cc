//! 块设备抽象
//!
//! 提供块设备接口和块级直接 I/O。
//! journal 文件不经过宿主的页缓存，持久化、恢复读取和清零都通过
//! `BlockDev::read_blocks_direct` / `write_blocks_direct` 直接访问设备。

mod device;

pub use device::{BlockDevice, BlockDev};
