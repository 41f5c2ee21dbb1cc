//! 日志记录编解码
//!
//! 每条记录占一个 128 字节槽位，小端布局：
//!
//! ```text
//! +-----------+-----------+------------------------------+
//! | log_type  | log_size  | payload（按类型的定长字段）   |
//! |   u32     | u32 = 128 |                              |
//! +-----------+-----------+------------------------------+
//! ```
//!
//! 槽位剩余部分填零。`log_size != 128` 或未知 `log_type` 的槽位视为日志结束。

use super::content::*;
use super::{LogKind, LogRecord};
use crate::consts::{J_LOG_ENTRY_SIZE, J_LOG_HEAD_SIZE};
use crate::error::{JournalError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// 日志头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    /// 原始类型标签
    pub log_type: u32,
    /// 声明的记录大小
    pub log_size: u32,
}

impl LogHeader {
    /// 解析槽位头部
    pub fn parse(slot: &[u8]) -> Option<Self> {
        if slot.len() < J_LOG_HEAD_SIZE {
            return None;
        }
        Some(Self {
            log_type: LittleEndian::read_u32(&slot[0..4]),
            log_size: LittleEndian::read_u32(&slot[4..8]),
        })
    }

    /// 头部是否描述一条有效记录
    pub fn kind(&self) -> Option<LogKind> {
        if self.log_size as usize != J_LOG_ENTRY_SIZE {
            return None;
        }
        LogKind::from_raw(self.log_type)
    }
}

struct SlotWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> SlotWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn u16(&mut self, v: u16) {
        LittleEndian::write_u16(&mut self.buf[self.pos..self.pos + 2], v);
        self.pos += 2;
    }

    fn u32(&mut self, v: u32) {
        LittleEndian::write_u32(&mut self.buf[self.pos..self.pos + 4], v);
        self.pos += 4;
    }

    fn u64(&mut self, v: u64) {
        LittleEndian::write_u64(&mut self.buf[self.pos..self.pos + 8], v);
        self.pos += 8;
    }

    fn name<const N: usize>(&mut self, name: &LogName<N>) {
        self.u8(name.len() as u8);
        self.buf[self.pos..self.pos + N].copy_from_slice(name.raw());
        self.pos += N;
    }
}

struct SlotReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SlotReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u16(&mut self) -> u16 {
        let v = LittleEndian::read_u16(&self.buf[self.pos..self.pos + 2]);
        self.pos += 2;
        v
    }

    fn u32(&mut self) -> u32 {
        let v = LittleEndian::read_u32(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        v
    }

    fn u64(&mut self) -> u64 {
        let v = LittleEndian::read_u64(&self.buf[self.pos..self.pos + 8]);
        self.pos += 8;
        v
    }

    fn name<const N: usize>(&mut self) -> Result<LogName<N>> {
        let len = self.u8();
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        LogName::from_raw(len, bytes).ok_or_else(|| JournalError::InvalidRecord.into())
    }
}

/// 将记录编码进槽位
///
/// # 参数
///
/// * `record` - 日志记录
/// * `slot` - 目标槽位，长度必须为 128
pub fn encode(record: &LogRecord, slot: &mut [u8]) -> Result<()> {
    if slot.len() != J_LOG_ENTRY_SIZE {
        return Err(JournalError::InvalidRecord.into());
    }
    slot.fill(0);

    let mut w = SlotWriter::new(slot);
    w.u32(record.kind().as_raw());
    w.u32(J_LOG_ENTRY_SIZE as u32);

    match record {
        LogRecord::Create(inode) | LogRecord::Mkdir(inode) => put_new_inode(&mut w, inode),
        LogRecord::Symlink(log) => {
            put_new_inode(&mut w, &log.inode);
            w.name(&log.target);
        }
        LogRecord::Unlink(log) => {
            w.u32(log.ino);
            w.u32(log.parent_ino);
            w.u32(log.nlink);
            w.name(&log.name);
            put_nat(&mut w, &log.nat);
        }
        LogRecord::Link(log) => {
            w.u32(log.ino);
            w.u32(log.parent_ino);
            w.name(&log.name);
        }
        LogRecord::Rename(log) => {
            w.u32(log.ino);
            w.u32(log.old_parent);
            w.u32(log.new_parent);
            w.name(&log.old_name);
            w.name(&log.new_name);
        }
        LogRecord::Chown(log) => {
            w.u32(log.ino);
            w.u32(log.uid);
            w.u32(log.gid);
            w.u64(log.size);
            w.u64(log.mtime);
            w.u64(log.ctime);
        }
        LogRecord::Dir(log) => {
            w.u8(log.inline_dentry as u8);
            w.u32(log.hash);
            w.u32(log.ino);
            w.u32(log.parent_ino);
            w.u8(log.file_type);
            w.name(&log.name);
            w.u64(log.parent.ctime);
            w.u64(log.parent.mtime);
            w.u64(log.parent.size);
        }
        LogRecord::ReadFileData(log) | LogRecord::ReadDir(log) | LogRecord::Stat(log) => {
            w.u32(log.ino);
            w.u64(log.atime_sec);
            w.u32(log.atime_nsec);
        }
        LogRecord::DataWrite(log) => {
            w.u8(log.is_inline as u8);
            w.u32(log.ino);
            w.u32(log.page_ofs);
            w.u64(log.file_size);
            put_nat(&mut w, &log.nat);
            w.u32(log.sit.cur_seg);
            w.u32(log.sit.segno);
            w.u32(log.sit.valid_blocks);
            w.u32(log.sit.bitmap_size);
            w.u32(log.ssa.cur_seg);
            w.u16(log.ssa.blk_ofs);
            w.u32(log.ssa.block_addr);
            w.u32(log.ssa.nid);
        }
    }

    debug_assert!(w.pos <= J_LOG_ENTRY_SIZE);
    Ok(())
}

/// 从槽位解码记录
///
/// 头部无效（大小不是 128 或类型未知）时返回 `InvalidRecord`。
pub fn decode(slot: &[u8]) -> Result<LogRecord> {
    if slot.len() < J_LOG_ENTRY_SIZE {
        return Err(JournalError::InvalidRecord.into());
    }
    let kind = LogHeader::parse(slot)
        .and_then(|h| h.kind())
        .ok_or(JournalError::InvalidRecord)?;

    let mut r = SlotReader::new(&slot[..J_LOG_ENTRY_SIZE]);
    r.pos = J_LOG_HEAD_SIZE;

    let record = match kind {
        LogKind::Create => LogRecord::Create(get_new_inode(&mut r)?),
        LogKind::Mkdir => LogRecord::Mkdir(get_new_inode(&mut r)?),
        LogKind::Symlink => {
            let inode = get_new_inode(&mut r)?;
            let target = r.name()?;
            LogRecord::Symlink(SymlinkLog { inode, target })
        }
        LogKind::Unlink => LogRecord::Unlink(DeleteLog {
            ino: r.u32(),
            parent_ino: r.u32(),
            nlink: r.u32(),
            name: r.name()?,
            nat: get_nat(&mut r),
        }),
        LogKind::Link => LogRecord::Link(LinkLog {
            ino: r.u32(),
            parent_ino: r.u32(),
            name: r.name()?,
        }),
        LogKind::Rename => LogRecord::Rename(RenameLog {
            ino: r.u32(),
            old_parent: r.u32(),
            new_parent: r.u32(),
            old_name: r.name()?,
            new_name: r.name()?,
        }),
        LogKind::Chown => LogRecord::Chown(ChownLog {
            ino: r.u32(),
            uid: r.u32(),
            gid: r.u32(),
            size: r.u64(),
            mtime: r.u64(),
            ctime: r.u64(),
        }),
        LogKind::Dir => LogRecord::Dir(DirLog {
            inline_dentry: r.u8() != 0,
            hash: r.u32(),
            ino: r.u32(),
            parent_ino: r.u32(),
            file_type: r.u8(),
            name: r.name()?,
            parent: ParentAttr {
                ctime: r.u64(),
                mtime: r.u64(),
                size: r.u64(),
            },
        }),
        LogKind::ReadFileData => LogRecord::ReadFileData(get_access(&mut r)),
        LogKind::ReadDir => LogRecord::ReadDir(get_access(&mut r)),
        LogKind::Stat => LogRecord::Stat(get_access(&mut r)),
        LogKind::DataWrite => LogRecord::DataWrite(DataWriteLog {
            is_inline: r.u8() != 0,
            ino: r.u32(),
            page_ofs: r.u32(),
            file_size: r.u64(),
            nat: get_nat(&mut r),
            sit: SitSnapshot {
                cur_seg: r.u32(),
                segno: r.u32(),
                valid_blocks: r.u32(),
                bitmap_size: r.u32(),
            },
            ssa: SsaSnapshot {
                cur_seg: r.u32(),
                blk_ofs: r.u16(),
                block_addr: r.u32(),
                nid: r.u32(),
            },
        }),
    };
    Ok(record)
}

fn put_new_inode(w: &mut SlotWriter<'_>, inode: &NewInodeLog) {
    w.u16(inode.mode);
    w.u8(inode.advise);
    w.u8(inode.inline);
    w.u32(inode.uid);
    w.u32(inode.gid);
    w.u32(inode.links);
    w.u64(inode.size);
    w.u64(inode.blocks);
    w.u64(inode.atime);
    w.u64(inode.ctime);
    w.u64(inode.mtime);
    w.u32(inode.generation);
    w.u32(inode.current_depth);
    w.u32(inode.xattr_nid);
    w.u32(inode.flags);
    w.u32(inode.pino);
    w.u32(inode.ino);
    w.u8(inode.dir_level);
    w.name(&inode.name);
}

fn get_new_inode(r: &mut SlotReader<'_>) -> Result<NewInodeLog> {
    Ok(NewInodeLog {
        mode: r.u16(),
        advise: r.u8(),
        inline: r.u8(),
        uid: r.u32(),
        gid: r.u32(),
        links: r.u32(),
        size: r.u64(),
        blocks: r.u64(),
        atime: r.u64(),
        ctime: r.u64(),
        mtime: r.u64(),
        generation: r.u32(),
        current_depth: r.u32(),
        xattr_nid: r.u32(),
        flags: r.u32(),
        pino: r.u32(),
        ino: r.u32(),
        dir_level: r.u8(),
        name: r.name()?,
    })
}

fn put_nat(w: &mut SlotWriter<'_>, nat: &NatSnapshot) {
    w.u32(nat.nid);
    w.u32(nat.ino);
    w.u32(nat.block_addr);
}

fn get_nat(r: &mut SlotReader<'_>) -> NatSnapshot {
    NatSnapshot {
        nid: r.u32(),
        ino: r.u32(),
        block_addr: r.u32(),
    }
}

fn get_access(r: &mut SlotReader<'_>) -> AccessLog {
    AccessLog {
        ino: r.u32(),
        atime_sec: r.u64(),
        atime_nsec: r.u32(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> [u8; J_LOG_ENTRY_SIZE] {
        [0u8; J_LOG_ENTRY_SIZE]
    }

    #[test]
    fn test_header_layout() {
        let mut buf = slot();
        let record = LogRecord::Stat(AccessLog { ino: 5, atime_sec: 100, atime_nsec: 7 });
        encode(&record, &mut buf).unwrap();

        let header = LogHeader::parse(&buf).unwrap();
        assert_eq!(header.log_type, 10);
        assert_eq!(header.log_size, 128);
        assert_eq!(header.kind(), Some(LogKind::Stat));
        assert_eq!(&buf[8..12], &5u32.to_le_bytes());
    }

    #[test]
    fn test_symlink_fills_whole_slot() {
        let mut buf = slot();
        let mut inode = NewInodeLog::new(77, 2, 0o120777, b"link");
        inode.mtime = u64::MAX;
        let record = LogRecord::Symlink(SymlinkLog {
            inode,
            target: SymlinkTarget::new(b"/usr/lib/very/long/path/to/target"),
        });
        encode(&record, &mut buf).unwrap();
        assert_ne!(buf[J_LOG_ENTRY_SIZE - 1], 0);

        match decode(&buf).unwrap() {
            LogRecord::Symlink(log) => {
                assert_eq!(log.inode, inode);
                assert_eq!(log.target.as_bytes(), b"/usr/lib/very/long/pa");
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_data_write_preserves_snapshots() {
        let mut buf = slot();
        let mut log = DataWriteLog::new(42, 3, 8192, 1001, 77);
        log.ssa.blk_ofs = 0xBEEF;
        log.sit.valid_blocks = 511;
        encode(&LogRecord::DataWrite(log), &mut buf).unwrap();
        assert_eq!(decode(&buf).unwrap(), LogRecord::DataWrite(log));
    }

    fn sample(kind: LogKind) -> LogRecord {
        let mut inode = NewInodeLog::new(42, 2, 0o100644, b"report.txt");
        inode.uid = 1000;
        inode.gid = 100;
        inode.size = 8192;
        inode.blocks = 16;
        inode.atime = 1_700_000_000;
        inode.ctime = 1_700_000_001;
        inode.mtime = 1_700_000_002;
        inode.generation = 7;
        inode.xattr_nid = 99;
        inode.flags = 0x10;
        inode.dir_level = 1;
        let access = AccessLog { ino: 42, atime_sec: 1_700_000_123, atime_nsec: 456 };

        match kind {
            LogKind::Create => LogRecord::Create(inode),
            LogKind::Mkdir => LogRecord::Mkdir(NewInodeLog {
                mode: 0o040755,
                links: 2,
                current_depth: 3,
                ..inode
            }),
            LogKind::Unlink => LogRecord::Unlink(DeleteLog {
                ino: 42,
                parent_ino: 2,
                nlink: 0,
                name: FileName::new(b"old.log"),
                nat: NatSnapshot { nid: 42, ino: 42, block_addr: 0xDEAD },
            }),
            LogKind::Link => LogRecord::Link(LinkLog {
                ino: 42,
                parent_ino: 3,
                name: FileName::new(b"hard"),
            }),
            LogKind::Rename => LogRecord::Rename(RenameLog {
                ino: 42,
                old_parent: 2,
                new_parent: 3,
                old_name: FileName::new(b"a.txt"),
                new_name: FileName::new(b"b_sixteen_chars_"),
            }),
            LogKind::Symlink => LogRecord::Symlink(SymlinkLog {
                inode: NewInodeLog { mode: 0o120777, ..inode },
                target: SymlinkTarget::new(b"/etc/hosts"),
            }),
            LogKind::Chown => LogRecord::Chown(ChownLog {
                ino: 42,
                uid: 1001,
                gid: 1002,
                size: 4096,
                mtime: 11,
                ctime: 12,
            }),
            LogKind::Dir => LogRecord::Dir(DirLog {
                inline_dentry: true,
                hash: 0xCAFE_BABE,
                ino: 42,
                parent_ino: 2,
                file_type: 1,
                name: FileName::new(b"report.txt"),
                parent: ParentAttr { ctime: 21, mtime: 22, size: 4096 },
            }),
            LogKind::ReadFileData => LogRecord::ReadFileData(access),
            LogKind::ReadDir => LogRecord::ReadDir(AccessLog { ino: 2, ..access }),
            LogKind::Stat => LogRecord::Stat(access),
            LogKind::DataWrite => {
                let mut log = DataWriteLog::new(42, 5, 24576, 301, 17);
                log.is_inline = true;
                log.nat.block_addr = 0x1234;
                log.sit = SitSnapshot { cur_seg: 2, segno: 17, valid_blocks: 300, bitmap_size: 64 };
                log.ssa = SsaSnapshot { cur_seg: 2, blk_ofs: 5, block_addr: 0x5678, nid: 301 };
                LogRecord::DataWrite(log)
            }
        }
    }

    #[test]
    fn test_every_kind_decodes_to_itself() {
        for kind in LogKind::ALL {
            let record = sample(kind);
            assert_eq!(record.kind(), kind);

            let mut buf = slot();
            encode(&record, &mut buf).unwrap();
            assert_eq!(LogHeader::parse(&buf).unwrap().kind(), Some(kind));
            assert_eq!(decode(&buf).unwrap(), record, "{:?}", kind);
        }
    }

    #[test]
    fn test_zero_slot_is_end_of_log() {
        let buf = slot();
        assert!(LogHeader::parse(&buf).unwrap().kind().is_none());
        assert!(decode(&buf).is_err());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut buf = slot();
        buf[0..4].copy_from_slice(&99u32.to_le_bytes());
        buf[4..8].copy_from_slice(&128u32.to_le_bytes());
        assert!(decode(&buf).is_err());
    }

    #[test]
    fn test_bad_name_length_rejected() {
        let mut buf = slot();
        let record = LogRecord::Link(LinkLog { ino: 1, parent_ino: 2, name: FileName::new(b"x") });
        encode(&record, &mut buf).unwrap();
        // name length byte follows ino + parent_ino
        buf[16] = 200;
        assert!(decode(&buf).is_err());
    }

    #[test]
    fn test_encode_rejects_wrong_slot_size() {
        let mut buf = [0u8; 64];
        let record = LogRecord::Stat(AccessLog::default());
        assert!(encode(&record, &mut buf).is_err());
    }
}
