//! 块设备核心类型

use crate::error::{Error, ErrorKind, Result};

/// 块设备接口
///
/// 宿主文件系统的块 I/O 提交原语，实现此 trait 以提供底层块设备访问。
///
/// # 示例
///
/// ```rust,ignore
/// use f2fsj_core::{BlockDevice, Result};
///
/// struct MyDevice {
///     // ...
/// }
///
/// impl BlockDevice for MyDevice {
///     fn block_size(&self) -> u32 {
///         4096
///     }
///
///     fn sector_size(&self) -> u32 {
///         512
///     }
///
///     fn total_blocks(&self) -> u64 {
///         1000000
///     }
///
///     fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
///         // 实现块读取
///         Ok(count as usize * self.sector_size() as usize)
///     }
///
///     fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
///         // 实现块写入
///         Ok(count as usize * self.sector_size() as usize)
///     }
/// }
/// ```
pub trait BlockDevice {
    /// 逻辑块大小（journal 要求 4096）
    fn block_size(&self) -> u32;

    /// 物理扇区大小（通常 512）
    fn sector_size(&self) -> u32;

    /// 总块数
    fn total_blocks(&self) -> u64;

    /// 读取扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 逻辑块地址（以扇区为单位）
    /// * `count` - 要读取的扇区数
    /// * `buf` - 目标缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际读取的字节数
    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize>;

    /// 写入扇区
    ///
    /// # 参数
    ///
    /// * `lba` - 逻辑块地址（以扇区为单位）
    /// * `count` - 要写入的扇区数
    /// * `buf` - 源缓冲区（大小至少为 count * sector_size）
    ///
    /// # 返回
    ///
    /// 成功返回实际写入的字节数
    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize>;

    /// 刷新缓存
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// 打开设备
    ///
    /// 在开始使用设备前调用，默认实现什么都不做。
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// 关闭设备
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// 块设备包装器
///
/// 以 journal 块为单位访问设备，统计读写次数。
///
/// BlockDev 本身不包含内部锁，journal 存储层用自旋锁包装它。
pub struct BlockDev<D> {
    /// 底层设备
    device: D,
    /// 分区偏移（字节）
    partition_offset: u64,
    /// 读取次数
    read_count: u64,
    /// 写入次数
    write_count: u64,
    /// 写入的块总数
    blocks_written: u64,
}

impl<D: BlockDevice> BlockDev<D> {
    /// 创建新的块设备包装器
    pub fn new(device: D) -> Result<Self> {
        let block_size = device.block_size();
        let sector_size = device.sector_size();

        // 验证块大小是扇区大小的整数倍
        if sector_size == 0 || block_size % sector_size != 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Block size must be a multiple of sector size",
            ));
        }

        Ok(Self {
            device,
            partition_offset: 0,
            read_count: 0,
            write_count: 0,
            blocks_written: 0,
        })
    }

    /// 创建指定分区偏移的块设备包装器
    ///
    /// # 参数
    ///
    /// * `device` - 底层块设备
    /// * `offset` - 分区起始偏移（字节）
    pub fn new_partition(device: D, offset: u64) -> Result<Self> {
        let mut bd = Self::new(device)?;
        bd.partition_offset = offset;
        Ok(bd)
    }

    /// 获取底层设备的引用
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 获取底层设备的可变引用
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// 获取逻辑块大小
    pub fn block_size(&self) -> u32 {
        self.device.block_size()
    }

    /// 获取总块数
    pub fn total_blocks(&self) -> u64 {
        self.device.total_blocks()
    }

    /// 获取读取次数
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// 获取写入次数
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    /// 获取累计写入块数
    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    /// 将逻辑块地址转换为物理扇区地址
    fn logical_to_physical(&self, lba: u64) -> u64 {
        let block_size = self.device.block_size() as u64;
        let sector_size = self.device.sector_size() as u64;
        (lba * block_size + self.partition_offset) / sector_size
    }

    /// 每个逻辑块包含的物理扇区数
    fn sectors_per_block(&self) -> u32 {
        self.device.block_size() / self.device.sector_size()
    }

    fn check_range(&self, lba: u64, count: u32, buf_len: usize) -> Result<()> {
        let required_size = count as usize * self.device.block_size() as usize;
        if buf_len < required_size {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Buffer too small for requested blocks",
            ));
        }
        if lba + count as u64 > self.device.total_blocks() {
            return Err(Error::new(ErrorKind::InvalidInput, "Block range beyond device end"));
        }
        Ok(())
    }

    /// 直接读取连续块
    ///
    /// # 参数
    ///
    /// * `lba` - 起始逻辑块地址
    /// * `count` - 要读取的块数
    /// * `buf` - 目标缓冲区
    ///
    /// # 返回
    ///
    /// 成功返回读取的字节数
    pub fn read_blocks_direct(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        self.check_range(lba, count, buf.len())?;

        let pba = self.logical_to_physical(lba);
        let sector_count = count * self.sectors_per_block();

        self.read_count += 1;
        self.device.read_blocks(pba, sector_count, buf)
    }

    /// 直接写入连续块
    ///
    /// # 参数
    ///
    /// * `lba` - 起始逻辑块地址
    /// * `count` - 要写入的块数
    /// * `buf` - 源数据缓冲区
    ///
    /// # 返回
    ///
    /// 成功返回写入的字节数
    pub fn write_blocks_direct(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        self.check_range(lba, count, buf.len())?;

        let pba = self.logical_to_physical(lba);
        let sector_count = count * self.sectors_per_block();

        self.write_count += 1;
        self.blocks_written += count as u64;
        self.device.write_blocks(pba, sector_count, buf)
    }

    /// 刷新设备缓存
    pub fn flush(&mut self) -> Result<()> {
        self.device.flush()
    }

    /// 打开底层设备
    pub fn open(&mut self) -> Result<()> {
        self.device.open()
    }

    /// 关闭底层设备
    ///
    /// 先刷新，然后调用底层设备的 `close()` 方法。
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.device.close()
    }
}
