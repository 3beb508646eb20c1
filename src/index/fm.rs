use std::ops::Range;

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::bwt::build_bwt;
use super::sa::suffix_array;
use super::sequence::{Sequence, SENTINEL};

/// 索引的构建元信息（来源文件、命令行、时间戳），不影响查询。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub source_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// 未出现在序列中的符号在 `slots` 中的标记
const NO_SLOT: u8 = u8::MAX;

/// FM 索引：完整 SA + C 表 + EP 表 + 逐符号前缀 Occ 表。
///
/// - 符号表只保存正文中真实出现的符号（升序，不含哨兵），按字节值查 `slots`
///   得到列号，C / EP / Occ 都按列号存放。
/// - 哨兵只在构建时参与 C 表累加；查询时它固定占据第 0 行，
///   其 rank 由 `end_pos` 直接算出，不需要单独的 Occ 列。
/// - 构建完成后不可变，可被任意多个线程同时只读查询。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FMIndex {
    len: u32,
    end_pos: u32,
    symbols: Vec<u8>,
    slots: [u8; 256],
    /// C[c]：按行排序后，首字符为 c 的第一行
    c: Vec<u32>,
    /// EP[c] = C[c] + freq(c) - 1：首字符为 c 的最后一行
    ep: Vec<u32>,
    /// occ[c][i] = BWT[0..=i] 中 c 的个数
    occ: Vec<Vec<u32>>,
    sa: Vec<u32>,
    meta: Option<IndexMeta>,
}

impl FMIndex {
    /// 单线程按顺序构建：SA -> BWT -> 秩表。
    pub fn build(seq: &Sequence) -> Self {
        let text = seq.as_bytes();
        let n = text.len();

        let t = std::time::Instant::now();
        let sa = suffix_array(seq);
        info!("suffix array built: n={} in {:.2?}", n, t.elapsed());

        let (bwt, end_pos) = build_bwt(text, &sa);
        debug!("bwt built: end_pos={}", end_pos);

        let t = std::time::Instant::now();
        let idx = Self::from_bwt(text, &bwt, sa, end_pos);
        info!(
            "rank tables built: {} symbols in {:.2?}",
            idx.symbols.len(),
            t.elapsed()
        );
        idx
    }

    fn from_bwt(text: &[u8], bwt: &[u8], sa: Vec<u32>, end_pos: u32) -> Self {
        let n = bwt.len();

        // 频次直接从序列统计（含哨兵）
        let mut freq = [0u32; 256];
        for &ch in text {
            freq[ch as usize] += 1;
        }

        // 升序遍历所有出现的符号；哨兵最小，先用它的频次给 C 表打底
        let mut symbols = Vec::new();
        let mut c = Vec::new();
        let mut ep = Vec::new();
        let mut slots = [NO_SLOT; 256];
        let mut acc = 0u32;
        for sym in 0..=255u8 {
            let f = freq[sym as usize];
            if f == 0 {
                continue;
            }
            if sym != SENTINEL {
                slots[sym as usize] = symbols.len() as u8;
                symbols.push(sym);
                c.push(acc);
                ep.push(acc + f - 1);
            }
            acc += f;
        }

        // 单次从左到右的前缀和；哨兵行不计入任何列
        let sigma = symbols.len();
        let mut occ: Vec<Vec<u32>> = (0..sigma).map(|_| Vec::with_capacity(n)).collect();
        let mut running = vec![0u32; sigma];
        for &ch in bwt {
            let slot = slots[ch as usize];
            if slot != NO_SLOT {
                running[slot as usize] += 1;
            }
            for (col, &r) in occ.iter_mut().zip(&running) {
                col.push(r);
            }
        }

        Self {
            len: n as u32,
            end_pos,
            symbols,
            slots,
            c,
            ep,
            occ,
            sa,
            meta: None,
        }
    }

    /// 由已持久化的各张表直接组装索引（不重新推导）。
    ///
    /// 调用方负责保证各表长度一致；`store::load` 在调用前已逐项校验。
    pub(crate) fn from_parts(
        len: u32,
        end_pos: u32,
        symbols: Vec<u8>,
        c: Vec<u32>,
        ep: Vec<u32>,
        occ: Vec<Vec<u32>>,
        sa: Vec<u32>,
        meta: Option<IndexMeta>,
    ) -> Self {
        let mut slots = [NO_SLOT; 256];
        for (i, &sym) in symbols.iter().enumerate() {
            slots[sym as usize] = i as u8;
        }
        Self { len, end_pos, symbols, slots, c, ep, occ, sa, meta }
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = Some(meta);
    }

    pub fn meta(&self) -> Option<&IndexMeta> {
        self.meta.as_ref()
    }

    /// 序列长度 n（含哨兵）
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// 哨兵所在的 BWT 行
    #[inline]
    pub fn end_pos(&self) -> usize {
        self.end_pos as usize
    }

    /// 升序、不含哨兵的符号集
    #[inline]
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    #[inline]
    pub fn sa(&self) -> &[u32] {
        &self.sa
    }

    #[inline]
    fn slot(&self, sym: u8) -> Option<usize> {
        match self.slots[sym as usize] {
            NO_SLOT => None,
            s => Some(s as usize),
        }
    }

    /// C 表；哨兵和未出现的符号返回 None。
    pub fn c(&self, sym: u8) -> Option<u32> {
        self.slot(sym).map(|s| self.c[s])
    }

    /// EP 表；哨兵和未出现的符号返回 None。
    pub fn ep(&self, sym: u8) -> Option<u32> {
        self.slot(sym).map(|s| self.ep[s])
    }

    /// 某符号的完整 Occ 列。
    pub fn occ_column(&self, sym: u8) -> Option<&[u32]> {
        self.slot(sym).map(|s| self.occ[s].as_slice())
    }

    /// BWT[0..=row] 中 sym 的个数；未出现的符号为 0。
    #[inline]
    pub fn occ(&self, sym: u8, row: usize) -> u32 {
        if sym == SENTINEL {
            return u32::from(row >= self.end_pos as usize);
        }
        self.slot(sym).map_or(0, |s| self.occ[s][row])
    }

    /// sym 的 (C, EP)；哨兵固定为第 0 行。
    #[inline]
    fn bounds(&self, sym: u8) -> Option<(usize, usize)> {
        if sym == SENTINEL {
            return (self.len > 0).then_some((0, 0));
        }
        self.slot(sym)
            .map(|s| (self.c[s] as usize, self.ep[s] as usize))
    }

    /// 反向搜索精确匹配，返回 SA 行区间 `sp..ep+1`。
    ///
    /// 任一符号不在索引中、或区间收缩为空时返回 None（零次出现，不是错误）。
    /// 空模式匹配所有行。
    pub fn backward_search(&self, pat: &[u8]) -> Option<Range<usize>> {
        let Some((&last, rest)) = pat.split_last() else {
            return (self.len > 0).then_some(0..self.len as usize);
        };
        let (mut sp, mut ep) = self.bounds(last)?;
        for &a in rest.iter().rev() {
            // 哨兵只可能是模式的最后一个符号，出现在别处必然无匹配
            if a == SENTINEL {
                return None;
            }
            let (c0, _) = self.bounds(a)?;
            let lo = if sp > 0 { self.occ(a, sp - 1) as usize } else { 0 };
            let hi = self.occ(a, ep) as usize;
            // hi == lo 表示区间内没有 a，避免 ep 下溢
            if hi <= lo {
                return None;
            }
            sp = c0 + lo;
            ep = c0 + hi - 1;
        }
        Some(sp..ep + 1)
    }

    /// 取出 SA 区间对应的文本位置。
    pub fn sa_interval_positions(&self, rows: Range<usize>) -> &[u32] {
        &self.sa[rows]
    }

    /// 模式在序列中的全部出现位置（按 SA 行序）。
    pub fn search_pattern(&self, pat: &[u8]) -> Vec<u32> {
        match self.backward_search(pat) {
            Some(rows) => self.sa_interval_positions(rows).to_vec(),
            None => Vec::new(),
        }
    }

    /// 查询 `seq[start..start + len)` 的全部出现位置。
    ///
    /// 子串越界时没有任何出现，返回空。
    pub fn search(&self, seq: &Sequence, start: usize, len: usize) -> Vec<u32> {
        match seq.slice(start, len) {
            Some(pat) => self.search_pattern(pat),
            None => {
                debug!("query {}+{} outside sequence of length {}", start, len, seq.len());
                Vec::new()
            }
        }
    }

    /// 出现次数（不物化位置）。
    pub fn count(&self, pat: &[u8]) -> usize {
        self.backward_search(pat).map_or(0, |r| r.len())
    }

    /// 并行执行一批 `(start, len)` 查询，结果与输入一一对应。
    pub fn search_batch(&self, seq: &Sequence, queries: &[(usize, usize)]) -> Vec<Vec<u32>> {
        queries
            .par_iter()
            .map(|&(start, len)| self.search(seq, start, len))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(body: &[u8]) -> (Sequence, FMIndex) {
        let seq = Sequence::new(body.to_vec()).unwrap();
        let idx = FMIndex::build(&seq);
        (seq, idx)
    }

    fn brute_force(text: &[u8], pat: &[u8]) -> Vec<u32> {
        if pat.is_empty() {
            return (0..text.len() as u32).collect();
        }
        text.windows(pat.len())
            .enumerate()
            .filter(|(_, w)| *w == pat)
            .map(|(i, _)| i as u32)
            .collect()
    }

    fn make_body(len: usize, seed: u32) -> Vec<u8> {
        let bases = [b'A', b'C', b'G', b'T'];
        let mut x = seed;
        (0..len)
            .map(|_| {
                x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                bases[(x >> 16) as usize % 4]
            })
            .collect()
    }

    #[test]
    fn worked_example_tables() {
        let (seq, idx) = index(b"ACGT");
        assert_eq!(idx.len(), 5);
        assert_eq!(idx.sa(), &[4, 0, 1, 2, 3]);
        assert_eq!(idx.end_pos(), 1);
        assert_eq!(idx.symbols(), b"ACGT");
        for (i, &s) in b"ACGT".iter().enumerate() {
            assert_eq!(idx.c(s), Some(i as u32 + 1));
            assert_eq!(idx.ep(s), Some(i as u32 + 1));
        }
        assert_eq!(idx.c(SENTINEL), None);
        assert_eq!(idx.search(&seq, 1, 2), vec![1]);
        // 第 0 行是只含哨兵的后缀，end_pos 行是整条序列
        assert_eq!(idx.sa()[0] as usize, seq.sentinel_pos());
        assert_eq!(idx.sa()[idx.end_pos()], 0);
    }

    #[test]
    fn rank_tables_match_bwt_on_random_text() {
        let alphabet = [b'A', b'C', b'G', b'N', b'T'];
        for seed in [1u32, 7, 99] {
            let mut x = seed;
            let body: Vec<u8> = (0..700)
                .map(|_| {
                    x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                    alphabet[(x >> 16) as usize % alphabet.len()]
                })
                .collect();
            let (seq, idx) = index(&body);
            let text = seq.as_bytes();
            let (bwt, end_pos) = build_bwt(text, &crate::index::sa::build_sa(text));
            assert_eq!(idx.end_pos(), end_pos as usize);
            assert_eq!(idx.sa()[0] as usize, seq.sentinel_pos());

            for &c in idx.symbols() {
                let col = idx.occ_column(c).unwrap();
                let mut seen = 0u32;
                for (row, &b) in bwt.iter().enumerate() {
                    seen += u32::from(b == c);
                    assert_eq!(col[row], seen, "seed {} symbol {} row {}", seed, c as char, row);
                }
                // C[c] 加上 c 的总数是不大于 c 的符号总数（含哨兵），
                // 且等于 EP[c] + 1；总数取 Occ 列末行，EP[c] 行之前不一定已数全
                let at_most = text.iter().filter(|&&b| b <= c).count() as u32;
                let total = col[bwt.len() - 1];
                assert_eq!(idx.c(c).unwrap() + total, at_most, "seed {} symbol {}", seed, c as char);
                assert_eq!(idx.ep(c).unwrap() + 1, at_most);
            }
        }
    }

    #[test]
    fn occ_counts_bwt_prefixes() {
        // BWT(BANANA$) = ANNB$AA
        let (_, idx) = index(b"BANANA");
        assert_eq!(idx.occ_column(b'A').unwrap(), &[1, 1, 1, 1, 1, 2, 3]);
        assert_eq!(idx.occ_column(b'N').unwrap(), &[0, 1, 2, 2, 2, 2, 2]);
        assert_eq!(idx.occ_column(b'B').unwrap(), &[0, 0, 0, 1, 1, 1, 1]);
        assert_eq!(idx.occ(b'Z', 3), 0);
        assert_eq!(idx.occ(SENTINEL, 3), 0);
        assert_eq!(idx.occ(SENTINEL, 4), 1);
    }

    #[test]
    fn symbols_strictly_ascending_without_sentinel() {
        let (_, idx) = index(b"TTGNACCAGT");
        assert_eq!(idx.symbols(), b"ACGNT");
        assert!(idx.symbols().windows(2).all(|w| w[0] < w[1]));
        assert!(!idx.symbols().contains(&SENTINEL));
    }

    #[test]
    fn ep_is_last_row_of_symbol() {
        let (_, idx) = index(b"GATTACAGATTACA");
        let mut expected_c = 1u32;
        for &s in idx.symbols() {
            let freq = idx.occ_column(s).unwrap()[idx.len() - 1];
            assert_eq!(idx.c(s), Some(expected_c));
            assert_eq!(idx.ep(s), Some(expected_c + freq - 1));
            expected_c += freq;
        }
        assert_eq!(expected_c as usize, idx.len());
    }

    #[test]
    fn planted_occurrence_and_counts_agree() {
        let body = make_body(300, 7);
        let (seq, idx) = index(&body);
        let text = seq.as_bytes();
        for len in [1usize, 2, 3, 5, 8, 13] {
            for p in (0..=text.len() - len).step_by(7) {
                let hits = idx.search(&seq, p, len);
                assert!(hits.contains(&(p as u32)), "p={} len={}", p, len);
                let mut sorted = hits.clone();
                sorted.sort_unstable();
                assert_eq!(sorted, brute_force(text, &text[p..p + len]));
            }
        }
    }

    #[test]
    fn query_reaching_sentinel_is_found() {
        let (seq, idx) = index(b"ACGTACGT");
        assert_eq!(idx.search(&seq, 5, 4), vec![5]);
        assert_eq!(idx.search(&seq, 8, 1), vec![8]);
        assert_eq!(idx.search_pattern(b"$A"), Vec::<u32>::new());
    }

    #[test]
    fn absent_symbol_yields_empty() {
        let (_, idx) = index(b"ACGTACGT");
        assert!(idx.search_pattern(b"ACN").is_empty());
        assert!(idx.search_pattern(b"X").is_empty());
        assert!(idx.backward_search(b"NA").is_none());
    }

    #[test]
    fn collapsed_interval_yields_empty() {
        let (_, idx) = index(b"AAAACCCC");
        assert!(idx.search_pattern(b"CA").is_empty());
        assert_eq!(idx.count(b"CA"), 0);
        assert_eq!(idx.count(b"AC"), 1);
        assert_eq!(idx.count(b"AA"), 3);
    }

    #[test]
    fn out_of_range_query_is_empty() {
        let (seq, idx) = index(b"ACGT");
        assert!(idx.search(&seq, 4, 2).is_empty());
        assert!(idx.search(&seq, 10, 1).is_empty());
    }

    #[test]
    fn degenerate_sequences() {
        let (seq, idx) = index(b"");
        assert_eq!(idx.len(), 1);
        assert!(idx.symbols().is_empty());
        assert_eq!(idx.search(&seq, 0, 1), vec![0]);
        assert!(idx.search_pattern(b"A").is_empty());

        let (seq, idx) = index(b"AAAA");
        assert_eq!(idx.symbols(), b"A");
        let mut hits = idx.search(&seq, 1, 2);
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1, 2]);
    }

    #[test]
    fn empty_pattern_matches_every_row() {
        let (_, idx) = index(b"ACGT");
        assert_eq!(idx.backward_search(b""), Some(0..5));
        assert_eq!(idx.count(b""), 5);
    }

    #[test]
    fn batch_matches_sequential() {
        let body = make_body(200, 99);
        let (seq, idx) = index(&body);
        let queries: Vec<(usize, usize)> = (0..50).map(|i| (i * 3, 6)).collect();
        let batch = idx.search_batch(&seq, &queries);
        for (q, hits) in queries.iter().zip(&batch) {
            assert_eq!(hits, &idx.search(&seq, q.0, q.1));
        }
    }
}
