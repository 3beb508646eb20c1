//! # fm-readsim
//!
//! 基于 FM 索引的 DNA 序列精确匹配，以及建立在其上的 read 模拟与校验工具。
//!
//! 本 crate 提供：
//!
//! - **索引构建**：序列 -> 后缀数组 -> BWT -> C / EP / Occ 秩表
//! - **精确查询**：反向搜索（backward search），返回全部出现位置
//! - **持久化**：每张表一个文件的目录格式，u32 小端
//! - **read 模拟 / 校验**：随机抽取子串、并行查询、注入替换错误，并可反向核对
//! - **变异基因组 / 比对评估**：按 SNP 谱生成多条基因组，按真实位置给外部比对结果打分
//!
//! ## 快速示例
//!
//! ```rust
//! use fm_readsim::index::{FMIndex, Sequence};
//!
//! let seq = Sequence::new(b"ACGT".to_vec()).unwrap();
//! let idx = FMIndex::build(&seq);
//!
//! assert_eq!(idx.sa(), &[4, 0, 1, 2, 3]);
//! // 查询 seq[1..3) = "CG"
//! assert_eq!(idx.search(&seq, 1, 2), vec![1]);
//! assert!(idx.search_pattern(b"GA").is_empty());
//! ```
//!
//! ## 模块说明
//!
//! - [`index`] — 序列、后缀数组、BWT、FM 索引与持久化
//! - [`io`] — 序列文件读入（纯文本 / FASTA）与 read 行格式
//! - [`sim`] — read 模拟与校验、变异基因组生成、比对评估
//! - [`util`] — 碱基工具函数
//! - [`error`] — 索引相关错误类型

pub mod error;
pub mod index;
pub mod io;
pub mod sim;
pub mod util;
