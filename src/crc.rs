//! CRC32 校验和计算
//!
//! 为 journal superblock 提供校验和

use crc32fast::Hasher;

/// CRC32 初始值
pub const JOURNAL_CRC32_INIT: u32 = !0u32;

/// 计算 CRC32 校验和（追加模式）
///
/// # 参数
/// * `crc` - 初始 CRC 值
/// * `data` - 要计算校验和的数据
///
/// # 返回
/// 更新后的 CRC32 值
#[inline]
pub fn crc32_append(crc: u32, data: &[u8]) -> u32 {
    let mut hasher = Hasher::new_with_initial(crc);
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_detects_change() {
        let a = crc32_append(JOURNAL_CRC32_INIT, &[0xEF, 0xCD, 0, 0]);
        let b = crc32_append(JOURNAL_CRC32_INIT, &[0xEF, 0xCD, 0, 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_crc32_incremental() {
        let once = crc32_append(JOURNAL_CRC32_INIT, b"journal superblock");
        let first = crc32_append(JOURNAL_CRC32_INIT, b"journal ");
        let second = crc32_append(first, b"superblock");
        assert_eq!(once, second);
    }
}
