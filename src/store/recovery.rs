//! 挂载时的日志重放
//!
//! 按块顺序扫描每个小文件，遇到第一个无效槽位即停止。
//! 有效记录按类型交给宿主的重放钩子，单条失败只计数不中断。
//! 扫描完成后由调用者清空 journal 区域。
//!
//! 已经 checkpoint 过的记录在清空前仍留在磁盘上，宿主的重放钩子必须幂等。

use super::{JournalSlot, JournalStore};
use crate::block::BlockDevice;
use crate::consts::{J_LOG_ENTRY_PER_BLOCK, J_LOG_ENTRY_SIZE, JOURNAL_BLOCK_SIZE};
use crate::error::Result;
use crate::host::HostFs;
use crate::record::{self, LogRecord};
use alloc::vec::Vec;

/// 恢复结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// 成功重放的记录数
    pub replayed: u64,
    /// 重放失败的记录数
    pub failed: u64,
    /// 扫描停止的位置（第一个无效槽位）
    pub stopped_at: Option<JournalSlot>,
}

/// 扫描并重放 journal
pub(crate) fn recover<D: BlockDevice, H: HostFs + ?Sized>(
    store: &JournalStore<D>,
    host: &H,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();
    let config = *store.config();

    'files: for file in 0..config.nr_small_files {
        store.load_file(file)?;
        log::info!("[RECOVERY] scanning j_file[{}]", file);

        for blk in 0..config.blocks_per_small_file {
            let (records, end) = store.with_image(file, |image| decode_block(image, blk))?;
            for (index, record) in records {
                replay(host, JournalSlot::new(file, index), &record, &mut report);
            }
            if let Some(index) = end {
                report.stopped_at = Some(JournalSlot::new(file, index));
                break 'files;
            }
        }
    }

    log::info!(
        "[RECOVERY] done: replayed={} failed={} stopped_at={:?}",
        report.replayed,
        report.failed,
        report.stopped_at
    );
    Ok(report)
}

/// 解码一个块中的槽位
///
/// # 返回
///
/// (有效记录, 第一个无效槽位的下标)
fn decode_block(image: &[u8], blk: u32) -> (Vec<(u32, LogRecord)>, Option<u32>) {
    let mut records = Vec::new();
    let base = blk as usize * JOURNAL_BLOCK_SIZE;
    for i in 0..J_LOG_ENTRY_PER_BLOCK {
        let index = blk * J_LOG_ENTRY_PER_BLOCK + i;
        let off = base + i as usize * J_LOG_ENTRY_SIZE;
        match record::decode(&image[off..off + J_LOG_ENTRY_SIZE]) {
            Ok(record) => records.push((index, record)),
            Err(_) => return (records, Some(index)),
        }
    }
    (records, None)
}

fn replay<H: HostFs + ?Sized>(
    host: &H,
    slot: JournalSlot,
    record: &LogRecord,
    report: &mut RecoveryReport,
) {
    let result = match record {
        LogRecord::Create(inode) | LogRecord::Mkdir(inode) => {
            host.recover_new_inode(record.kind(), inode)
        }
        LogRecord::Symlink(log) => host.recover_new_inode(record.kind(), &log.inode),
        LogRecord::Unlink(log) => host.recover_unlink(log),
        _ => host.recover_record(record),
    };
    match result {
        Ok(()) => report.replayed += 1,
        Err(e) => {
            log::warn!(
                "[RECOVERY] replay {} at file={} idx={} failed: {}",
                record.kind().name(),
                slot.file(),
                slot.index(),
                e
            );
            report.failed += 1;
        }
    }
}
