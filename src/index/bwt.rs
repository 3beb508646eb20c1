use super::sequence::SENTINEL;

/// 根据后缀数组构建 BWT，同时返回哨兵所在行 `end_pos`。
///
/// `BWT[i] = text[(SA[i] - 1 + n) mod n]`；SA[i] 为 0 的那一行回绕到文本末尾的哨兵。
pub fn build_bwt(text: &[u8], sa: &[u32]) -> (Vec<u8>, u32) {
    let n = text.len();
    if n == 0 {
        return (Vec::new(), 0);
    }
    let mut bwt = Vec::with_capacity(n);
    let mut end_pos = 0u32;
    for (row, &p) in sa.iter().enumerate() {
        let i = p as usize;
        let prev = if i == 0 { text[n - 1] } else { text[i - 1] };
        if prev == SENTINEL {
            end_pos = row as u32;
        }
        bwt.push(prev);
    }
    (bwt, end_pos)
}
