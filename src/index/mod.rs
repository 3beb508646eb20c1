//! FM 索引：序列 -> 后缀数组 -> BWT -> 秩表，以及查询与持久化。

pub mod bwt;
pub mod fm;
pub mod sa;
pub mod sequence;
pub mod store;

pub use fm::{FMIndex, IndexMeta};
pub use sequence::{Sequence, SENTINEL};
