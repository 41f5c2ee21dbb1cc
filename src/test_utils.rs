//! 测试用内存块设备和宿主

use crate::block::BlockDevice;
use crate::config::JournalConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::host::{CheckpointReason, HostFs, MetaPage, PageFlags};
use crate::record::{DeleteLog, LogKind, LogRecord, NewInodeLog};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};
use spin::Mutex;

/// superblock 在块 4，journal 占块 5..=8，共 128 个槽位
pub(crate) fn test_config() -> JournalConfig {
    JournalConfig {
        sb_block_addr: 4,
        blocks_per_small_file: 4,
        max_io_pages: 2,
        ..Default::default()
    }
}

#[derive(Clone)]
pub(crate) struct MockDevice {
    block_size: u32,
    sector_size: u32,
    total_blocks: u64,
    storage: Vec<u8>,
    fail_writes: bool,
}

impl MockDevice {
    pub(crate) fn new(total_blocks: u64) -> Self {
        let block_size = 4096;
        let sector_size = 512;
        let storage = alloc::vec![0u8; (total_blocks * block_size as u64) as usize];
        Self {
            block_size,
            sector_size,
            total_blocks,
            storage,
            fail_writes: false,
        }
    }

    pub(crate) fn storage(&self) -> &[u8] {
        &self.storage
    }

    pub(crate) fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl BlockDevice for MockDevice {
    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn read_blocks(&mut self, lba: u64, count: u32, buf: &mut [u8]) -> Result<usize> {
        let start = (lba * self.sector_size as u64) as usize;
        let len = (count * self.sector_size) as usize;
        buf[..len].copy_from_slice(&self.storage[start..start + len]);
        Ok(len)
    }

    fn write_blocks(&mut self, lba: u64, count: u32, buf: &[u8]) -> Result<usize> {
        if self.fail_writes {
            return Err(Error::new(ErrorKind::Io, "Injected write failure"));
        }
        let start = (lba * self.sector_size as u64) as usize;
        let len = (count * self.sector_size) as usize;
        self.storage[start..start + len].copy_from_slice(&buf[..len]);
        Ok(len)
    }
}

/// 宿主收到的重放调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Replay {
    NewInode(LogKind, u32),
    Unlink(u32),
    Record(LogRecord),
}

#[derive(Default)]
pub(crate) struct MockHost {
    pages: Mutex<BTreeMap<MetaPage, PageFlags>>,
    writepages: Mutex<Vec<u32>>,
    checkpoints: Mutex<Vec<CheckpointReason>>,
    replays: Mutex<Vec<Replay>>,
    fail_writepages: AtomicBool,
    fail_checkpoint: AtomicBool,
    fail_replay: AtomicBool,
}

impl MockHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page_flags(&self, page: MetaPage) -> PageFlags {
        self.pages
            .lock()
            .get(&page)
            .copied()
            .unwrap_or(PageFlags::empty())
    }

    pub(crate) fn writepages_calls(&self) -> Vec<u32> {
        self.writepages.lock().clone()
    }

    pub(crate) fn checkpoints(&self) -> Vec<CheckpointReason> {
        self.checkpoints.lock().clone()
    }

    pub(crate) fn replays(&self) -> Vec<Replay> {
        self.replays.lock().clone()
    }

    pub(crate) fn fail_writepages(&self, fail: bool) {
        self.fail_writepages.store(fail, Ordering::Relaxed);
    }

    pub(crate) fn fail_checkpoint(&self, fail: bool) {
        self.fail_checkpoint.store(fail, Ordering::Relaxed);
    }

    pub(crate) fn fail_replay(&self, fail: bool) {
        self.fail_replay.store(fail, Ordering::Relaxed);
    }

    fn replay(&self, call: Replay) -> Result<()> {
        if self.fail_replay.load(Ordering::Relaxed) {
            return Err(Error::new(ErrorKind::Io, "Injected replay failure"));
        }
        self.replays.lock().push(call);
        Ok(())
    }
}

impl HostFs for MockHost {
    fn clear_page_flags(&self, page: MetaPage, flags: PageFlags) -> Result<()> {
        self.pages.lock().entry(page).or_insert(PageFlags::empty()).remove(flags);
        Ok(())
    }

    fn set_page_flags(&self, page: MetaPage, flags: PageFlags) -> Result<()> {
        self.pages.lock().entry(page).or_insert(PageFlags::empty()).insert(flags);
        Ok(())
    }

    fn writepages(&self, ino: u32) -> Result<()> {
        self.writepages.lock().push(ino);
        if self.fail_writepages.load(Ordering::Relaxed) {
            return Err(Error::new(ErrorKind::Io, "Injected writepages failure"));
        }
        Ok(())
    }

    fn checkpoint(&self, reason: CheckpointReason) -> Result<()> {
        if self.fail_checkpoint.load(Ordering::Relaxed) {
            return Err(Error::new(ErrorKind::Io, "Injected checkpoint failure"));
        }
        self.checkpoints.lock().push(reason);
        Ok(())
    }

    fn recover_new_inode(&self, kind: LogKind, inode: &NewInodeLog) -> Result<()> {
        self.replay(Replay::NewInode(kind, inode.ino))
    }

    fn recover_unlink(&self, log: &DeleteLog) -> Result<()> {
        self.replay(Replay::Unlink(log.ino))
    }

    fn recover_record(&self, record: &LogRecord) -> Result<()> {
        self.replay(Replay::Record(*record))
    }
}
