//! 索引持久化：一个目录，每张表一个文件，整数一律为 u32 小端。
//!
//! | 文件 | 内容 |
//! |---|---|
//! | `len` | n（含哨兵） |
//! | `end_pos` | 哨兵所在行 |
//! | `symbols` | 个数 + 各符号 1 字节，升序 |
//! | `c` / `ep` | 每个符号：1 字节符号 + u32 |
//! | `sa` | n 个 u32 |
//! | `occ.<符号>` | n 个 u32，每个非哨兵符号一个文件 |
//! | `meta` | 可选，bincode 编码的 [`IndexMeta`] |

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::fm::{FMIndex, IndexMeta};
use super::sequence::is_symbol;
use crate::error::{IndexError, Result};

/// 索引目录后缀：`genome.fasta` -> `genome.fasta.index`
pub const INDEX_SUFFIX: &str = ".index";

const LEN_FILE: &str = "len";
const END_POS_FILE: &str = "end_pos";
const SYMBOLS_FILE: &str = "symbols";
const C_FILE: &str = "c";
const EP_FILE: &str = "ep";
const SA_FILE: &str = "sa";
const META_FILE: &str = "meta";

/// 与序列文件同名的默认索引目录。
pub fn default_dir(source: &Path) -> PathBuf {
    let mut s = source.as_os_str().to_owned();
    s.push(INDEX_SUFFIX);
    PathBuf::from(s)
}

fn occ_file(sym: u8) -> String {
    format!("occ.{}", sym as char)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let f = File::create(path).map_err(|e| IndexError::io(path, e))?;
    let mut w = BufWriter::with_capacity(1 << 16, f);
    w.write_all(bytes)
        .and_then(|()| w.flush())
        .map_err(|e| IndexError::io(path, e))?;
    debug!("saved {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn encode_u32s(values: &[u32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    buf
}

fn encode_table(symbols: &[u8], idx: &FMIndex, get: fn(&FMIndex, u8) -> Option<u32>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(symbols.len() * 5);
    for &s in symbols {
        buf.push(s);
        buf.extend_from_slice(&get(idx, s).unwrap_or_default().to_le_bytes());
    }
    buf
}

/// 将索引的全部表写入 `dir`（目录不存在时创建）。
pub fn save(idx: &FMIndex, dir: &Path) -> Result<()> {
    let t = std::time::Instant::now();
    fs::create_dir_all(dir).map_err(|e| IndexError::io(dir, e))?;

    let symbols = idx.symbols();
    for &s in symbols {
        if let Some(col) = idx.occ_column(s) {
            write_file(&dir.join(occ_file(s)), &encode_u32s(col))?;
        }
    }
    write_file(&dir.join(SA_FILE), &encode_u32s(idx.sa()))?;
    write_file(&dir.join(C_FILE), &encode_table(symbols, idx, FMIndex::c))?;
    write_file(&dir.join(EP_FILE), &encode_table(symbols, idx, FMIndex::ep))?;
    write_file(&dir.join(END_POS_FILE), &(idx.end_pos() as u32).to_le_bytes())?;

    let mut sym_buf = (symbols.len() as u32).to_le_bytes().to_vec();
    sym_buf.extend_from_slice(symbols);
    write_file(&dir.join(SYMBOLS_FILE), &sym_buf)?;

    if let Some(meta) = idx.meta() {
        write_file(&dir.join(META_FILE), &bincode::serialize(meta)?)?;
    }
    // len 最后写：只有它存在时目录才被视为完整写出过
    write_file(&dir.join(LEN_FILE), &(idx.len() as u32).to_le_bytes())?;

    info!("index saved to {} in {:.2?}", dir.display(), t.elapsed());
    Ok(())
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| IndexError::io(path, e))
}

fn expect_size(path: &Path, bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(IndexError::Truncated {
            path: path.to_path_buf(),
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn read_u32s(path: &Path, count: usize) -> Result<Vec<u32>> {
    let bytes = read_file(path)?;
    expect_size(path, &bytes, count * 4)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect())
}

fn read_scalar(path: &Path) -> Result<u32> {
    Ok(read_u32s(path, 1)?[0])
}

fn corrupt(path: &Path, reason: impl Into<String>) -> IndexError {
    IndexError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_symbols(path: &Path) -> Result<Vec<u8>> {
    let bytes = read_file(path)?;
    if bytes.len() < 4 {
        return Err(IndexError::Truncated { path: path.to_path_buf(), expected: 4, actual: bytes.len() });
    }
    let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    expect_size(path, &bytes, 4 + count)?;
    let symbols = bytes[4..].to_vec();
    if !symbols.windows(2).all(|w| w[0] < w[1]) {
        return Err(corrupt(path, "symbols are not strictly ascending"));
    }
    if let Some(&bad) = symbols.iter().find(|&&b| !is_symbol(b)) {
        return Err(corrupt(path, format!("symbol 0x{:02x} is not an upper-case letter or digit", bad)));
    }
    Ok(symbols)
}

fn read_table(path: &Path, symbols: &[u8]) -> Result<Vec<u32>> {
    let bytes = read_file(path)?;
    expect_size(path, &bytes, symbols.len() * 5)?;
    let mut values = Vec::with_capacity(symbols.len());
    for (rec, &sym) in bytes.chunks_exact(5).zip(symbols) {
        if rec[0] != sym {
            return Err(corrupt(
                path,
                format!("expected symbol '{}', found '{}'", sym as char, rec[0] as char),
            ));
        }
        values.push(u32::from_le_bytes([rec[1], rec[2], rec[3], rec[4]]));
    }
    Ok(values)
}

/// Occ 列必须是逐行最多加 1 的前缀计数，且总数等于该符号的行数。
/// 否则反向搜索得到的区间可能越过 SA。
fn check_occ_column(path: &Path, col: &[u32], freq: u32) -> Result<()> {
    let mut prev = 0u32;
    for (row, &v) in col.iter().enumerate() {
        if v < prev || v - prev > 1 {
            return Err(corrupt(path, format!("rank {} at row {} after {}", v, row, prev)));
        }
        prev = v;
    }
    if prev != freq {
        return Err(corrupt(path, format!("total count {} but symbol spans {} rows", prev, freq)));
    }
    Ok(())
}

fn read_meta(path: &Path) -> Result<Option<IndexMeta>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(IndexError::io(path, e)),
    }
}

/// 从 `dir` 重建索引，不需要原始序列。
///
/// 任一必需文件缺失、长度与 n 不符或内容不自洽都会返回错误，
/// 不会返回不完整的索引。
pub fn load(dir: &Path) -> Result<FMIndex> {
    let t = std::time::Instant::now();
    let len_path = dir.join(LEN_FILE);
    let len = read_scalar(&len_path)?;
    let n = len as usize;
    if n == 0 {
        return Err(corrupt(&len_path, "sequence length is zero"));
    }

    let end_pos_path = dir.join(END_POS_FILE);
    let end_pos = read_scalar(&end_pos_path)?;
    if end_pos >= len {
        return Err(corrupt(&end_pos_path, format!("end_pos {} out of range for n={}", end_pos, n)));
    }

    let symbols = read_symbols(&dir.join(SYMBOLS_FILE))?;
    let c = read_table(&dir.join(C_FILE), &symbols)?;
    let ep = read_table(&dir.join(EP_FILE), &symbols)?;
    for (i, (&lo, &hi)) in c.iter().zip(&ep).enumerate() {
        if lo > hi || hi >= len {
            return Err(corrupt(
                &dir.join(EP_FILE),
                format!("row range {}..={} of '{}' invalid for n={}", lo, hi, symbols[i] as char, n),
            ));
        }
    }

    let sa_path = dir.join(SA_FILE);
    let sa = read_u32s(&sa_path, n)?;
    if let Some(&bad) = sa.iter().find(|&&p| p >= len) {
        return Err(corrupt(&sa_path, format!("suffix position {} out of range", bad)));
    }
    // 哨兵行的后缀从文本开头开始
    if sa[end_pos as usize] != 0 {
        return Err(corrupt(&sa_path, format!("row end_pos={} does not hold suffix 0", end_pos)));
    }

    let mut occ = Vec::with_capacity(symbols.len());
    for (i, &s) in symbols.iter().enumerate() {
        let path = dir.join(occ_file(s));
        let col = read_u32s(&path, n)?;
        check_occ_column(&path, &col, ep[i] - c[i] + 1)?;
        occ.push(col);
    }

    let meta = read_meta(&dir.join(META_FILE))?;

    info!("index loaded from {} (n={}) in {:.2?}", dir.display(), n, t.elapsed());
    Ok(FMIndex::from_parts(len, end_pos, symbols, c, ep, occ, sa, meta))
}

impl FMIndex {
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        save(self, dir.as_ref())
    }

    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        load(dir.as_ref())
    }
}
