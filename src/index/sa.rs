use log::debug;

use super::sequence::Sequence;

/// 构建后缀数组（前缀倍增法，每轮一次 O(n log n) 排序）。
///
/// 输入为以唯一最小哨兵结尾的文本，因此所有后缀互不相同，排序结果是全序。
/// 结果与逐后缀直接比较（朴素排序）得到的顺序完全一致。
pub fn build_sa(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<usize> = (0..n).collect();
    // rank 从 1 开始，0 表示越过文本末尾（比任何后缀都小）
    let mut rank: Vec<u32> = text.iter().map(|&b| b as u32 + 1).collect();
    let mut tmp: Vec<u32> = vec![0; n];

    let mut k = 1usize;
    let mut rounds = 0usize;
    loop {
        let key = |i: usize| (rank[i], if i + k < n { rank[i + k] } else { 0 });
        sa.sort_unstable_by_key(|&i| key(i));

        tmp[sa[0]] = 1;
        for w in 1..n {
            let (a, b) = (sa[w - 1], sa[w]);
            tmp[b] = tmp[a] + u32::from(key(a) != key(b));
        }
        rank.copy_from_slice(&tmp);
        rounds += 1;

        // 所有 rank 互不相同时顺序已确定
        if rank[sa[n - 1]] as usize == n || k >= n {
            break;
        }
        k <<= 1;
    }
    debug!("suffix array: n={} rounds={}", n, rounds);

    sa.into_iter().map(|x| x as u32).collect()
}

/// 对 [`Sequence`] 构建后缀数组。
pub fn suffix_array(seq: &Sequence) -> Vec<u32> {
    build_sa(seq.as_bytes())
}
