//! 索引构建、持久化与序列读入的错误类型。

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// 读写某个文件失败
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 必需的文件不存在（序列文件或索引中的某张表）
    #[error("missing file '{}'", .0.display())]
    Missing(PathBuf),

    /// 文件长度与声明的长度不符
    #[error("'{}' has {actual} bytes, expected {expected}", path.display())]
    Truncated {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// 文件内容不自洽（符号顺序错、越界等）
    #[error("corrupt index component '{}': {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// 序列中出现了大写字母和数字以外的字节
    #[error("invalid symbol 0x{byte:02x} at position {pos}: expected an upper-case letter or digit")]
    InvalidSymbol { pos: usize, byte: u8 },

    /// 序列超过 u32 可寻址范围
    #[error("sequence of length {0} does not fit 32-bit offsets")]
    TooLong(usize),

    #[error("index metadata: {0}")]
    Meta(#[from] bincode::Error),
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            IndexError::Missing(path)
        } else {
            IndexError::Io { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
