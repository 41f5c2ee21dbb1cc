//! journal 环形存储
//!
//! 磁盘布局：
//!
//! ```text
//! sb_block_addr      journal superblock
//! sb_block_addr + 1  小文件 0（blocks_per_small_file 块）
//! ...                小文件 1..n
//! ```
//!
//! 每个小文件在内存中有一份完整映像，日志先编码进映像，
//! commit 时由 `persist` 按块批量写到设备。
//!
//! # 锁
//!
//! - 元数据锁：superblock、小文件游标、已用空间
//! - 每个小文件一把映像锁
//! - 设备锁
//!
//! 顺序为 元数据 → 映像，设备锁单独获取。

mod file;
mod recovery;
mod types;

pub use file::{BlockRange, SmallFile};
pub use recovery::RecoveryReport;
pub use types::{FileState, JournalSlot, JournalSuperblock};

pub(crate) use recovery::recover;

use crate::block::{BlockDev, BlockDevice};
use crate::config::JournalConfig;
use crate::consts::{entry_offset_in_block, entry_to_block, J_LOG_ENTRY_SIZE, JOURNAL_BLOCK_SIZE};
use crate::error::{Error, ErrorKind, JournalError, Result};
use crate::record::{self, LogKind, LogRecord};
use alloc::vec::Vec;
use spin::Mutex;

#[derive(Debug)]
struct StoreMeta {
    sb: JournalSuperblock,
    files: Vec<SmallFile>,
    used_bytes: u64,
    wraps: u64,
}

/// journal 环形存储
pub struct JournalStore<D: BlockDevice> {
    config: JournalConfig,
    meta: Mutex<StoreMeta>,
    images: Vec<Mutex<Vec<u8>>>,
    dev: Mutex<BlockDev<D>>,
    formatted: bool,
}

impl<D: BlockDevice> JournalStore<D> {
    /// 打开 journal 存储
    ///
    /// 读取 superblock，魔数、校验和或布局不符时按配置重新初始化并写回。
    /// 随后为每个小文件分配内存映像。
    ///
    /// # 错误
    ///
    /// - 配置非法、设备块大小不是 4096、设备容量不足
    /// - superblock 读写失败
    /// - 映像分配失败（致命）
    pub fn open(mut bdev: BlockDev<D>, config: JournalConfig) -> Result<Self> {
        config.validate()?;
        if bdev.block_size() as usize != JOURNAL_BLOCK_SIZE {
            return Err(Error::new(
                ErrorKind::Unsupported,
                "Journal requires 4096-byte blocks",
            ));
        }
        let end = config.small_file_start(config.nr_small_files);
        if end > bdev.total_blocks() {
            log::error!(
                "[JSTORE] device too small: need {} blocks, have {}",
                end,
                bdev.total_blocks()
            );
            return Err(Error::new(ErrorKind::NoSpace, "Device too small for journal"));
        }

        let (sb, formatted) = load_or_init_superblock(&mut bdev, &config)?;

        let file_bytes = config.blocks_per_small_file as usize * JOURNAL_BLOCK_SIZE;
        let mut images = Vec::with_capacity(config.nr_small_files as usize);
        let mut files = Vec::with_capacity(config.nr_small_files as usize);
        for i in 0..config.nr_small_files {
            images.push(Mutex::new(alloc_image(file_bytes)?));
            files.push(SmallFile::new(
                i,
                config.small_file_start(i),
                config.blocks_per_small_file,
                config.entries_per_file(),
            ));
        }

        log::info!(
            "[JSTORE] opened: start={} files={} blocks_per_file={}",
            config.journal_start(),
            config.nr_small_files,
            config.blocks_per_small_file
        );

        Ok(Self {
            config,
            meta: Mutex::new(StoreMeta {
                sb,
                files,
                used_bytes: 0,
                wraps: 0,
            }),
            images,
            dev: Mutex::new(bdev),
            formatted,
        })
    }

    /// 配置
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// 打开时是否重新初始化了 superblock
    pub fn formatted(&self) -> bool {
        self.formatted
    }

    /// 内存中的 superblock
    pub fn superblock(&self) -> JournalSuperblock {
        self.meta.lock().sb
    }

    /// 小文件元数据快照
    pub fn small_file(&self, index: u32) -> Option<SmallFile> {
        self.meta.lock().files.get(index as usize).copied()
    }

    /// 当前写入的小文件
    pub fn current_file(&self) -> u32 {
        self.meta.lock().sb.current_small_file
    }

    /// 小文件绕回次数
    pub fn wraps(&self) -> u64 {
        self.meta.lock().wraps
    }

    /// 分配一个日志槽位
    ///
    /// 当前小文件写满时自动绕回，调用者不会看到分配失败。
    pub fn allocate_entry(&self, kind: LogKind) -> JournalSlot {
        let mut meta = self.meta.lock();
        let slot = allocate_locked(&mut meta, self.config.nr_small_files);
        log::trace!(
            "[JSTORE] allocate {} -> file={} idx={}",
            kind.name(),
            slot.file(),
            slot.index()
        );
        slot
    }

    /// 把记录编码进槽位
    pub fn write_entry(&self, slot: JournalSlot, record: &LogRecord) -> Result<()> {
        let image = self.image(slot.file())?;
        let off = slot_offset(slot);
        let mut image = image.lock();
        let buf = image
            .get_mut(off..off + J_LOG_ENTRY_SIZE)
            .ok_or(Error::new(ErrorKind::InvalidInput, "Journal slot out of range"))?;
        record::encode(record, buf)
    }

    /// 分配槽位并写入记录
    ///
    /// 分配与编码在元数据锁内完成，`persist` 不会看到已分配但未写入的槽位。
    pub fn append_record(&self, record: &LogRecord) -> Result<JournalSlot> {
        let mut meta = self.meta.lock();
        let slot = allocate_locked(&mut meta, self.config.nr_small_files);
        self.write_entry(slot, record)?;
        Ok(slot)
    }

    /// 读回槽位中的记录
    pub fn read_entry(&self, slot: JournalSlot) -> Result<LogRecord> {
        let image = self.image(slot.file())?;
        let off = slot_offset(slot);
        let image = image.lock();
        let buf = image
            .get(off..off + J_LOG_ENTRY_SIZE)
            .ok_or(Error::new(ErrorKind::InvalidInput, "Journal slot out of range"))?;
        record::decode(buf)
    }

    /// 把已写入但未持久化的槽位写到设备
    ///
    /// 每个小文件最多产生两段：绕回前遗留的尾部和当前已用区间。
    /// 每段按 `max_io_pages` 切分提交，全部成功后更新 superblock 并刷新设备。
    ///
    /// # 返回
    ///
    /// 写入的页数
    pub fn persist(&self) -> Result<u64> {
        let (jobs, sb) = {
            let mut meta = self.meta.lock();
            let mut jobs: Vec<(u32, BlockRange)> = Vec::new();
            for file in meta.files.iter_mut() {
                let (tail, head) = file.take_dirty_ranges();
                jobs.extend(tail.map(|r| (file.index(), r)));
                jobs.extend(head.map(|r| (file.index(), r)));
            }
            let current = meta.sb.current_small_file as usize;
            let cursor = meta.files[current].cursor();
            meta.sb.current_free_log_entry = cursor;
            (jobs, meta.sb)
        };

        if jobs.is_empty() {
            return Ok(0);
        }

        let mut pages = 0u64;
        for (i, &(file, range)) in jobs.iter().enumerate() {
            if let Err(e) = self.write_range(file, range) {
                log::error!(
                    "[JSTORE] persist j_file[{}] blocks {}..={} failed: {}",
                    file,
                    range.start,
                    range.end,
                    e
                );
                let mut meta = self.meta.lock();
                for &(file, range) in &jobs[i..] {
                    meta.files[file as usize].requeue(range);
                }
                return Err(e);
            }
            pages += range.len();
        }

        self.write_superblock(&sb)?;
        self.dev.lock().flush()?;

        let total = self.total_space();
        let mut meta = self.meta.lock();
        let used = meta.used_bytes + pages * JOURNAL_BLOCK_SIZE as u64;
        if used > total {
            log::warn!("[JSTORE] used space saturated at {} bytes", total);
        }
        meta.used_bytes = used.min(total);
        log::debug!("[JSTORE] persisted {} pages, used={}", pages, meta.used_bytes);
        Ok(pages)
    }

    /// journal 总空间（字节）
    pub fn total_space(&self) -> u64 {
        self.config.total_bytes()
    }

    /// 自上次 checkpoint 以来持久化的字节数
    pub fn used_space(&self) -> u64 {
        self.meta.lock().used_bytes
    }

    /// 剩余空间（字节）
    pub fn free_space(&self) -> u64 {
        self.total_space().saturating_sub(self.used_space())
    }

    /// checkpoint 完成，已用空间清零
    pub fn reset_after_checkpoint(&self) {
        self.meta.lock().used_bytes = 0;
    }

    /// 恢复完成后清空整个 journal 区域
    pub fn clear_after_recovery(&self) -> Result<()> {
        for i in 0..self.config.nr_small_files {
            self.image(i)?.lock().fill(0);
            let start = self.config.small_file_start(i);
            let range = BlockRange {
                start,
                end: start + self.config.blocks_per_small_file as u64 - 1,
            };
            self.write_range(i, range)?;
        }

        let sb = {
            let mut meta = self.meta.lock();
            for file in meta.files.iter_mut() {
                file.reset();
            }
            meta.used_bytes = 0;
            meta.sb.current_small_file = 0;
            meta.sb.current_free_log_entry = 0;
            meta.sb
        };
        self.write_superblock(&sb)?;
        self.dev.lock().flush()?;
        log::info!("[JSTORE] journal area cleared");
        Ok(())
    }

    /// 刷新设备
    pub fn flush(&self) -> Result<()> {
        self.dev.lock().flush()
    }

    /// 访问块设备
    pub fn with_device<R>(&self, f: impl FnOnce(&mut BlockDev<D>) -> R) -> R {
        f(&mut self.dev.lock())
    }

    /// 从设备读入整个小文件映像
    pub(crate) fn load_file(&self, index: u32) -> Result<()> {
        let image = self.image(index)?;
        let start = self.config.small_file_start(index);
        let max = self.config.max_io_pages as u64;
        let nr_blocks = self.config.blocks_per_small_file as u64;
        let mut image = image.lock();
        let mut done = 0u64;
        while done < nr_blocks {
            let count = max.min(nr_blocks - done);
            let off = done as usize * JOURNAL_BLOCK_SIZE;
            let len = count as usize * JOURNAL_BLOCK_SIZE;
            self.dev
                .lock()
                .read_blocks_direct(start + done, count as u32, &mut image[off..off + len])?;
            done += count;
        }
        Ok(())
    }

    /// 在映像上执行只读操作
    pub(crate) fn with_image<R>(&self, index: u32, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let image = self.image(index)?;
        let image = image.lock();
        Ok(f(&image))
    }

    fn image(&self, index: u32) -> Result<&Mutex<Vec<u8>>> {
        self.images
            .get(index as usize)
            .ok_or(Error::new(ErrorKind::InvalidInput, "Small file index out of range"))
    }

    fn write_range(&self, index: u32, range: BlockRange) -> Result<u64> {
        let image = self.image(index)?;
        let file_start = self.config.small_file_start(index);
        let max = self.config.max_io_pages as u64;
        let mut buf = Vec::new();
        let mut lba = range.start;
        while lba <= range.end {
            let count = max.min(range.end - lba + 1);
            let off = (lba - file_start) as usize * JOURNAL_BLOCK_SIZE;
            let len = count as usize * JOURNAL_BLOCK_SIZE;
            buf.clear();
            buf.extend_from_slice(&image.lock()[off..off + len]);
            self.dev.lock().write_blocks_direct(lba, count as u32, &buf)?;
            lba += count;
        }
        Ok(range.len())
    }

    fn write_superblock(&self, sb: &JournalSuperblock) -> Result<()> {
        let block = sb.to_block();
        self.dev
            .lock()
            .write_blocks_direct(self.config.sb_block_addr, 1, &block)?;
        Ok(())
    }
}

fn allocate_locked(meta: &mut StoreMeta, nr_files: u32) -> JournalSlot {
    let current = meta.sb.current_small_file;
    let (index, wrapped) = meta.files[current as usize].allocate();
    if wrapped {
        meta.wraps += 1;
        meta.sb.current_small_file = (current + 1) % nr_files;
    }
    meta.sb.current_free_log_entry = meta.files[meta.sb.current_small_file as usize].cursor();
    JournalSlot::new(current, index)
}

fn slot_offset(slot: JournalSlot) -> usize {
    entry_to_block(slot.index()) as usize * JOURNAL_BLOCK_SIZE + entry_offset_in_block(slot.index())
}

fn alloc_image(bytes: usize) -> Result<Vec<u8>> {
    let mut image = Vec::new();
    if image.try_reserve_exact(bytes).is_err() {
        log::error!("[JSTORE] cannot allocate {} bytes for journal image", bytes);
        return Err(JournalError::BackingStoreAlloc.into());
    }
    image.resize(bytes, 0);
    Ok(image)
}

fn load_or_init_superblock<D: BlockDevice>(
    bdev: &mut BlockDev<D>,
    config: &JournalConfig,
) -> Result<(JournalSuperblock, bool)> {
    let mut block = alloc::vec![0u8; JOURNAL_BLOCK_SIZE];
    bdev.read_blocks_direct(config.sb_block_addr, 1, &mut block)?;

    match JournalSuperblock::load(&block, config) {
        Ok(sb) => {
            log::info!(
                "[JSTORE] valid superblock: file={} entry={}",
                sb.current_small_file,
                sb.current_free_log_entry
            );
            return Ok((sb, false));
        }
        Err(e) => log::info!("[JSTORE] {}, init", e),
    }

    let sb = JournalSuperblock::new(config);
    bdev.write_blocks_direct(config.sb_block_addr, 1, &sb.to_block())?;
    bdev.flush()?;
    Ok((sb, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AccessLog, NewInodeLog};
    use crate::test_utils::{test_config, MockDevice};

    fn open(blocks: u64) -> JournalStore<MockDevice> {
        let bdev = BlockDev::new(MockDevice::new(blocks)).unwrap();
        JournalStore::open(bdev, test_config()).unwrap()
    }

    fn stat(ino: u32) -> LogRecord {
        LogRecord::Stat(AccessLog { ino, atime_sec: 1, atime_nsec: 2 })
    }

    #[test]
    fn test_open_formats_blank_device() {
        let store = open(16);
        assert!(store.formatted());
        let sb = store.superblock();
        assert_eq!(sb.start_addr, 5);
        assert_eq!(sb.file_size, 4 * 4096);

        let bytes = store.with_device(|bd| bd.device().storage()[4 * 4096..5 * 4096].to_vec());
        assert_eq!(JournalSuperblock::from_bytes(&bytes), Some(sb));
    }

    #[test]
    fn test_reopen_keeps_superblock() {
        let store = open(16);
        store.append_record(&stat(1)).unwrap();
        store.persist().unwrap();
        let device = store.dev.into_inner().device().clone();

        let store = JournalStore::open(BlockDev::new(device).unwrap(), test_config()).unwrap();
        assert!(!store.formatted());
        assert_eq!(store.superblock().current_free_log_entry, 1);
    }

    #[test]
    fn test_device_too_small() {
        let bdev = BlockDev::new(MockDevice::new(6)).unwrap();
        let err = JournalStore::open(bdev, test_config()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NoSpace);
    }

    #[test]
    fn test_image_allocation_failure_is_fatal() {
        let err = alloc_image(usize::MAX).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_append_and_read_back() {
        let store = open(16);
        let create = LogRecord::Create(NewInodeLog::new(42, 2, 0o100644, b"hello"));
        let a = store.append_record(&create).unwrap();
        let b = store.append_record(&stat(42)).unwrap();
        assert_eq!(a, JournalSlot::new(0, 0));
        assert_eq!(b, JournalSlot::new(0, 1));
        assert_eq!(store.read_entry(a).unwrap(), create);
        assert_eq!(store.read_entry(b).unwrap(), stat(42));
    }

    #[test]
    fn test_allocate_then_write() {
        let store = open(16);
        let slot = store.allocate_entry(LogKind::Stat);
        store.write_entry(slot, &stat(5)).unwrap();
        assert_eq!(store.read_entry(slot).unwrap(), stat(5));
    }

    #[test]
    fn test_persist_writes_dirty_blocks_in_chunks() {
        let store = open(16);
        // 70 条占用块 0..=2
        for i in 0..70 {
            store.append_record(&stat(i)).unwrap();
        }
        let writes = store.with_device(|bd| bd.write_count());
        let pages = store.persist().unwrap();
        assert_eq!(pages, 3);
        // max_io_pages = 2：两次数据写 + 一次 superblock
        assert_eq!(store.with_device(|bd| bd.write_count()) - writes, 3);
        assert_eq!(store.used_space(), 3 * 4096);
        assert_eq!(store.free_space(), 4096);

        let on_disk = store.with_device(|bd| bd.device().storage()[5 * 4096..5 * 4096 + 128].to_vec());
        assert_eq!(record::decode(&on_disk).unwrap(), stat(0));

        // 没有新日志时不写
        assert_eq!(store.persist().unwrap(), 0);
    }

    #[test]
    fn test_used_space_saturates() {
        let store = open(16);
        for round in 0..3 {
            for i in 0..128 {
                store.append_record(&stat(round * 128 + i)).unwrap();
            }
            store.persist().unwrap();
        }
        assert_eq!(store.used_space(), store.total_space());
        assert_eq!(store.free_space(), 0);
        store.reset_after_checkpoint();
        assert_eq!(store.free_space(), store.total_space());
    }

    #[test]
    fn test_wrap_persists_tail_and_head() {
        let store = open(16);
        for i in 0..130 {
            store.append_record(&stat(i)).unwrap();
        }
        assert_eq!(store.wraps(), 1);
        assert_eq!(store.small_file(0).unwrap().cursor(), 2);

        assert_eq!(store.persist().unwrap(), 5);
        let last = store.with_device(|bd| {
            let off = 8 * 4096 + 31 * 128;
            bd.device().storage()[off..off + 128].to_vec()
        });
        assert_eq!(record::decode(&last).unwrap(), stat(127));
        let first = store.with_device(|bd| bd.device().storage()[5 * 4096..5 * 4096 + 128].to_vec());
        assert_eq!(record::decode(&first).unwrap(), stat(128));
    }

    #[test]
    fn test_failed_persist_is_retried() {
        let store = open(16);
        store.append_record(&stat(1)).unwrap();
        store.with_device(|bd| bd.device_mut().fail_writes(true));
        assert!(store.persist().is_err());
        assert_eq!(store.used_space(), 0);

        store.with_device(|bd| bd.device_mut().fail_writes(false));
        assert_eq!(store.persist().unwrap(), 1);
    }

    #[test]
    fn test_clear_after_recovery() {
        let store = open(16);
        for i in 0..40 {
            store.append_record(&stat(i)).unwrap();
        }
        store.persist().unwrap();
        store.clear_after_recovery().unwrap();

        let file = store.small_file(0).unwrap();
        assert_eq!(file.state(), FileState::Idle);
        assert_eq!(file.cursor(), 0);
        assert_eq!(store.used_space(), 0);
        let zero = store.with_device(|bd| bd.device().storage()[5 * 4096..9 * 4096].iter().all(|b| *b == 0));
        assert!(zero);
        assert_eq!(store.superblock().current_free_log_entry, 0);
    }
}
