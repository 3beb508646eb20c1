use crate::error::{IndexError, Result};

/// 哨兵 `$`：比所有真实符号都小，且在序列末尾恰好出现一次。
pub const SENTINEL: u8 = b'$';

/// 正文允许的符号：大写字母或数字。
///
/// 每个符号在索引目录里对应文件 `occ.<符号>`，所以符号必须是可作文件名、
/// 且在大小写不敏感的文件系统上也不会互相覆盖的字节。它们都大于哨兵。
#[inline]
pub fn is_symbol(b: u8) -> bool {
    b.is_ascii_uppercase() || b.is_ascii_digit()
}

/// 以哨兵结尾的不可变字节序列。
///
/// 长度 `len()` 包含哨兵。构建后不再修改，索引构建与查询都通过引用借用它。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sequence {
    bytes: Vec<u8>,
}

impl Sequence {
    /// 由正文（不含哨兵）构建序列，并在末尾追加哨兵。
    ///
    /// 正文只能含 [`is_symbol`] 接受的字节，哨兵因此是唯一最小符号。
    pub fn new(body: impl Into<Vec<u8>>) -> Result<Self> {
        let mut bytes = body.into();
        if let Some(pos) = bytes.iter().position(|&b| !is_symbol(b)) {
            return Err(IndexError::InvalidSymbol { pos, byte: bytes[pos] });
        }
        if bytes.len() >= u32::MAX as usize {
            return Err(IndexError::TooLong(bytes.len() + 1));
        }
        bytes.push(SENTINEL);
        Ok(Self { bytes })
    }

    /// 含哨兵的完整字节。
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 不含哨兵的正文。
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    /// 序列长度 n（含哨兵），至少为 1。
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// 哨兵所在的位置，即 n - 1。
    #[inline]
    pub fn sentinel_pos(&self) -> usize {
        self.bytes.len() - 1
    }

    /// 取子串 `[start, start + len)`；越界返回 None。
    pub fn slice(&self, start: usize, len: usize) -> Option<&[u8]> {
        let end = start.checked_add(len)?;
        self.bytes.get(start..end)
    }
}

impl AsRef<[u8]> for Sequence {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
