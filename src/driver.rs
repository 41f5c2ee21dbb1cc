//! commit / checkpoint 驱动
//!
//! 两个驱动只通过 `Journal` 的加锁操作交互，没有其它共享状态。
//! 驱动本身只维护 tick 计数，由调用者决定节奏：
//!
//! - 内核式部署：宿主定时器每个 tick 调用一次 `tick`
//! - `std` 特性：`JournalThreads` 启动两个后台线程，按 `tick_ms` 唤醒，
//!   也可以被 fsync 路径或空间压力提前唤醒

use crate::block::BlockDevice;
use crate::checkpoint::{should_checkpoint, CheckpointTrigger};
use crate::commit::CommitSummary;
use crate::host::HostFs;
use crate::journal::Journal;

/// commit 驱动
#[derive(Debug, Default)]
pub struct CommitDriver {
    ticks: u64,
}

impl CommitDriver {
    /// 创建驱动
    pub fn new() -> Self {
        Self::default()
    }

    /// 推进一个 tick，每 `commit_interval_ticks` 个 tick 提交一次
    pub fn tick<D: BlockDevice, H: HostFs>(&mut self, journal: &Journal<D, H>) -> Option<CommitSummary> {
        self.ticks += 1;
        if self.ticks < journal.config().commit_interval_ticks {
            return None;
        }
        self.run(journal)
    }

    /// 立即封存并提交
    pub fn run<D: BlockDevice, H: HostFs>(&mut self, journal: &Journal<D, H>) -> Option<CommitSummary> {
        self.ticks = 0;
        if let Err(e) = journal.trigger_commit() {
            if e.is_retryable() {
                log::warn!("[DRIVER] commit trigger deferred: {}", e);
            } else {
                log::error!("[DRIVER] commit trigger failed: {}", e);
            }
        }
        if !journal.ring().has_pending_commit() {
            return None;
        }
        Some(journal.epoch_commit())
    }
}

/// checkpoint 驱动
#[derive(Debug, Default)]
pub struct CheckpointDriver {
    ticks_since_last: u64,
}

impl CheckpointDriver {
    /// 创建驱动
    pub fn new() -> Self {
        Self::default()
    }

    /// 推进一个 tick
    ///
    /// # 返回
    ///
    /// 本 tick 触发检查点的原因
    pub fn tick<D: BlockDevice, H: HostFs>(&mut self, journal: &Journal<D, H>) -> Option<CheckpointTrigger> {
        self.ticks_since_last += 1;
        let trigger = should_checkpoint(
            journal.free_space(),
            journal.free_space_threshold(),
            self.ticks_since_last,
            journal.config().checkpoint_timeout_ticks,
            !journal.checkpoints().is_empty(),
        )?;

        log::info!("[DRIVER] checkpoint triggered by {:?}", trigger);
        match journal.epoch_checkpoint() {
            Ok(_) => self.ticks_since_last = 0,
            Err(e) => log::error!("[DRIVER] checkpoint failed: {}", e),
        }
        Some(trigger)
    }
}

#[cfg(feature = "std")]
pub use threads::JournalThreads;

#[cfg(feature = "std")]
mod threads {
    use super::{CheckpointDriver, CommitDriver};
    use crate::block::BlockDevice;
    use crate::error::{Error, ErrorKind, Result};
    use crate::host::HostFs;
    use crate::journal::Journal;
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use core::sync::atomic::{AtomicBool, Ordering};
    use core::time::Duration;
    use std::sync::{Condvar, Mutex, PoisonError};
    use std::thread::{self, JoinHandle};

    #[derive(Default)]
    struct Signal {
        pending: Mutex<bool>,
        cv: Condvar,
    }

    impl Signal {
        fn notify(&self) {
            *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = true;
            self.cv.notify_one();
        }

        /// 等待通知或超时，返回是否被通知
        fn wait(&self, timeout: Duration) -> bool {
            let guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            let (mut guard, _) = self
                .cv
                .wait_timeout_while(guard, timeout, |pending| !*pending)
                .unwrap_or_else(PoisonError::into_inner);
            core::mem::replace(&mut *guard, false)
        }
    }

    #[derive(Default)]
    struct Shared {
        stop: AtomicBool,
        commit: Signal,
        checkpoint: Signal,
    }

    /// 后台 commit / checkpoint 线程
    pub struct JournalThreads {
        shared: Arc<Shared>,
        handles: Vec<JoinHandle<()>>,
    }

    impl JournalThreads {
        /// 启动两个后台线程
        pub fn spawn<D, H>(journal: Arc<Journal<D, H>>) -> Result<Self>
        where
            D: BlockDevice + Send + 'static,
            H: HostFs + 'static,
        {
            let shared = Arc::new(Shared::default());
            let tick = Duration::from_millis(journal.config().tick_ms);
            let mut threads = Self {
                shared: Arc::clone(&shared),
                handles: Vec::with_capacity(2),
            };

            let (j, s) = (Arc::clone(&journal), Arc::clone(&shared));
            threads.start("f2fsj-commit", move || commit_loop(&j, &s, tick))?;
            let (j, s) = (journal, shared);
            threads.start("f2fsj-checkpoint", move || checkpoint_loop(&j, &s, tick))?;

            log::info!("[DRIVER] journal threads started, tick={}ms", tick.as_millis());
            Ok(threads)
        }

        fn start(&mut self, name: &str, f: impl FnOnce() + Send + 'static) -> Result<()> {
            let handle = thread::Builder::new()
                .name(name.into())
                .spawn(f)
                .map_err(|_| Error::new(ErrorKind::Fatal, "Cannot spawn journal thread"))?;
            self.handles.push(handle);
            Ok(())
        }

        /// 提前唤醒 commit 线程（fsync 路径）
        pub fn kick_commit(&self) {
            self.shared.commit.notify();
        }

        /// 提前唤醒 checkpoint 线程
        pub fn kick_checkpoint(&self) {
            self.shared.checkpoint.notify();
        }

        /// 停止并等待线程退出，正在进行的工作会完成
        pub fn stop(mut self) {
            self.shutdown();
        }

        fn shutdown(&mut self) {
            if self.handles.is_empty() {
                return;
            }
            self.shared.stop.store(true, Ordering::Release);
            self.shared.commit.notify();
            self.shared.checkpoint.notify();
            for handle in self.handles.drain(..) {
                if handle.join().is_err() {
                    log::error!("[DRIVER] journal thread panicked");
                }
            }
            log::info!("[DRIVER] journal threads stopped");
        }
    }

    impl Drop for JournalThreads {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    fn commit_loop<D: BlockDevice, H: HostFs>(journal: &Journal<D, H>, shared: &Shared, tick: Duration) {
        let mut driver = CommitDriver::new();
        while !shared.stop.load(Ordering::Acquire) {
            let kicked = shared.commit.wait(tick);
            if shared.stop.load(Ordering::Acquire) {
                break;
            }
            let committed = if kicked {
                driver.run(journal)
            } else {
                driver.tick(journal)
            };
            if committed.is_some() && journal.free_space() <= journal.free_space_threshold() {
                shared.checkpoint.notify();
            }
        }
    }

    fn checkpoint_loop<D: BlockDevice, H: HostFs>(journal: &Journal<D, H>, shared: &Shared, tick: Duration) {
        let mut driver = CheckpointDriver::new();
        while !shared.stop.load(Ordering::Acquire) {
            shared.checkpoint.wait(tick);
            if shared.stop.load(Ordering::Acquire) {
                break;
            }
            driver.tick(journal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JournalConfig;
    use crate::host::CheckpointReason;
    use crate::inode::JournalInode;
    use crate::record::{AccessLog, LogRecord, NewInodeLog};
    use crate::test_utils::{test_config, MockDevice, MockHost};

    fn mount(config: JournalConfig, blocks: u64) -> Journal<MockDevice, MockHost> {
        Journal::mount(MockDevice::new(blocks), MockHost::new(), config).unwrap().0
    }

    #[test]
    fn test_commit_every_interval() {
        let journal = mount(test_config(), 16);
        let inode = JournalInode::shared(1);
        journal
            .log_operation(&inode, LogRecord::Create(NewInodeLog::new(1, 2, 0, b"a")))
            .unwrap();

        let mut driver = CommitDriver::new();
        for _ in 0..4 {
            assert!(driver.tick(&journal).is_none());
        }
        let summary = driver.tick(&journal).unwrap();
        assert_eq!(summary.entries, 1);
        assert_eq!(inode.pending_entries(), 0);
    }

    #[test]
    fn test_commit_driver_survives_full_ring() {
        let journal = mount(test_config(), 16);
        for _ in 0..7 {
            journal.trigger_commit().unwrap();
        }
        let mut driver = CommitDriver::new();
        // 封存失败但仍排空已封存的 epoch
        let summary = driver.run(&journal).unwrap();
        assert_eq!(summary.epochs, 7);
        assert_eq!(driver.run(&journal).unwrap().epochs, 1);
    }

    #[test]
    fn test_checkpoint_on_timeout() {
        let journal = mount(test_config(), 16);
        let inode = JournalInode::shared(1);
        journal
            .log_operation(&inode, LogRecord::Create(NewInodeLog::new(1, 2, 0, b"a")))
            .unwrap();
        journal.sync().unwrap();

        let mut driver = CheckpointDriver::new();
        assert_eq!(driver.tick(&journal), None);
        assert_eq!(driver.tick(&journal), None);
        assert_eq!(driver.tick(&journal), Some(CheckpointTrigger::Timeout));
        assert!(journal.checkpoints().is_empty());
        assert_eq!(journal.host().checkpoints(), alloc::vec![CheckpointReason::FastBoot]);

        // 队列为空时超时不触发
        for _ in 0..5 {
            assert_eq!(driver.tick(&journal), None);
        }
    }

    #[test]
    fn test_space_pressure_preempts_timeout() {
        // 100 块，阈值 5% = 5 页
        let config = JournalConfig {
            blocks_per_small_file: 100,
            ..test_config()
        };
        let journal = mount(config, 128);
        let inode = JournalInode::shared(42);
        journal
            .log_operation(&inode, LogRecord::Create(NewInodeLog::new(42, 2, 0, b"f")))
            .unwrap();
        for i in 1..96 * 32 {
            journal
                .log_operation(&inode, LogRecord::Stat(AccessLog { ino: 42, atime_sec: i as u64, atime_nsec: 0 }))
                .unwrap();
        }
        journal.sync().unwrap();
        // 剩余 4%
        assert_eq!(journal.free_space() * 100 / journal.total_space(), 4);
        assert!(!journal.checkpoints().is_empty());

        let mut driver = CheckpointDriver::new();
        assert_eq!(driver.tick(&journal), Some(CheckpointTrigger::SpacePressure));
        assert!(journal.checkpoints().is_empty());
        assert_eq!(journal.store().used_space(), 0);
    }

    #[test]
    fn test_space_pressure_mid_interval_at_threshold() {
        let config = JournalConfig {
            blocks_per_small_file: 100,
            ..test_config()
        };
        let journal = mount(config, 128);
        let inode = JournalInode::shared(42);
        journal
            .log_operation(&inode, LogRecord::Create(NewInodeLog::new(42, 2, 0, b"f")))
            .unwrap();
        journal.sync().unwrap();

        let mut driver = CheckpointDriver::new();
        assert_eq!(driver.tick(&journal), None);
        assert_eq!(driver.tick(&journal), None);
        assert_eq!(driver.tick(&journal), Some(CheckpointTrigger::Timeout));
        assert_eq!(journal.store().used_space(), 0);

        // 槽位 1..=3039，连同块 0 重写共 95 页，剩余正好 5%
        for i in 1..95 * 32 {
            journal
                .log_operation(&inode, LogRecord::Stat(AccessLog { ino: 42, atime_sec: i as u64, atime_nsec: 0 }))
                .unwrap();
        }
        journal.sync().unwrap();
        assert_eq!(journal.free_space(), journal.free_space_threshold());

        // 超时计数只走了一个 tick
        assert_eq!(driver.tick(&journal), Some(CheckpointTrigger::SpacePressure));
        assert_eq!(journal.store().used_space(), 0);
        assert_eq!(
            journal.host().checkpoints(),
            alloc::vec![CheckpointReason::FastBoot, CheckpointReason::FastBoot]
        );
        assert_eq!(driver.tick(&journal), None);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_threads_commit_on_kick() {
        use alloc::sync::Arc;
        use std::time::{Duration, Instant};

        let config = JournalConfig {
            tick_ms: 10,
            commit_interval_ticks: 1000,
            ..test_config()
        };
        let journal = Arc::new(mount(config, 16));
        let threads = JournalThreads::spawn(Arc::clone(&journal)).unwrap();

        let inode = JournalInode::shared(5);
        journal
            .log_operation(&inode, LogRecord::Create(NewInodeLog::new(5, 2, 0, b"k")))
            .unwrap();
        threads.kick_commit();

        let deadline = Instant::now() + Duration::from_secs(5);
        while inode.pending_entries() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        threads.stop();
        assert_eq!(inode.pending_entries(), 0);
        assert!(journal.stats().epochs_committed >= 1);
    }
}
