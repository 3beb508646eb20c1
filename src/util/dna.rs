use rand::Rng;

pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// 基因组与 read 中允许出现的符号（N 为模糊碱基）
#[inline]
pub fn is_valid_base(b: u8) -> bool {
    matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N')
}

/// 第一个非法符号的位置及字节
pub fn first_invalid(seq: &[u8]) -> Option<(usize, u8)> {
    seq.iter()
        .position(|&b| !is_valid_base(b))
        .map(|i| (i, seq[i]))
}

/// 随机替换为另一个碱基：ACGT 从其余三个中等概率选择，其他符号（如 N）从四个中选择。
pub fn substitute<R: Rng + ?Sized>(base: u8, rng: &mut R) -> u8 {
    let up = base.to_ascii_uppercase();
    match BASES.iter().position(|&b| b == up) {
        Some(i) => BASES[(i + rng.gen_range(1..4)) % 4],
        None => BASES[rng.gen_range(0..4)],
    }
}

#[inline]
pub fn bases_equal(a: u8, b: u8) -> bool {
    a.eq_ignore_ascii_case(&b)
}
