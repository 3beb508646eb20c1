use std::fs;
use std::path::Path;

use fm_readsim::error::IndexError;
use fm_readsim::index::{store, FMIndex, IndexMeta, Sequence};

fn genome(len: usize, seed: u32) -> Sequence {
    let bases = [b'A', b'C', b'G', b'T', b'N'];
    let mut x = seed;
    let body: Vec<u8> = (0..len)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            // N 稀疏出现
            let r = (x >> 16) as usize % 50;
            if r == 0 { bases[4] } else { bases[r % 4] }
        })
        .collect();
    Sequence::new(body).unwrap()
}

fn saved(seq: &Sequence) -> (tempfile::TempDir, FMIndex) {
    let dir = tempfile::tempdir().unwrap();
    let idx = FMIndex::build(seq);
    idx.save_to_dir(dir.path().join("g.index")).unwrap();
    (dir, idx)
}

fn index_dir(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("g.index")
}

#[test]
fn round_trip_preserves_every_table() {
    let seq = genome(2_000, 3);
    let (dir, idx) = saved(&seq);
    let loaded = FMIndex::load_from_dir(index_dir(&dir)).unwrap();

    assert_eq!(loaded, idx);
    assert_eq!(loaded.len(), idx.len());
    assert_eq!(loaded.end_pos(), idx.end_pos());
    assert_eq!(loaded.symbols(), idx.symbols());
    assert_eq!(loaded.sa(), idx.sa());
    for &s in idx.symbols() {
        assert_eq!(loaded.c(s), idx.c(s));
        assert_eq!(loaded.ep(s), idx.ep(s));
        assert_eq!(loaded.occ_column(s), idx.occ_column(s));
    }
    for p in (0..seq.len() - 12).step_by(37) {
        assert_eq!(loaded.search(&seq, p, 12), idx.search(&seq, p, 12));
    }
}

#[test]
fn saving_a_loaded_index_is_identical() {
    let seq = genome(500, 9);
    let (dir, _) = saved(&seq);
    let loaded = FMIndex::load_from_dir(index_dir(&dir)).unwrap();
    let again = dir.path().join("again.index");
    loaded.save_to_dir(&again).unwrap();

    for entry in fs::read_dir(index_dir(&dir)).unwrap() {
        let name = entry.unwrap().file_name();
        assert_eq!(
            fs::read(index_dir(&dir).join(&name)).unwrap(),
            fs::read(again.join(&name)).unwrap(),
            "{:?} differs",
            name
        );
    }
}

#[test]
fn metadata_round_trips() {
    let seq = genome(100, 1);
    let dir = tempfile::tempdir().unwrap();
    let mut idx = FMIndex::build(&seq);
    let meta = IndexMeta {
        source_file: Some("g.fasta".into()),
        build_args: Some("fm-readsim index g.fasta".into()),
        build_timestamp: Some("2024-01-01T00:00:00+00:00".into()),
    };
    idx.set_meta(meta.clone());
    idx.save_to_dir(dir.path()).unwrap();
    let loaded = FMIndex::load_from_dir(dir.path()).unwrap();
    assert_eq!(loaded.meta(), Some(&meta));
}

#[test]
fn degenerate_index_round_trips() {
    let seq = Sequence::new(Vec::new()).unwrap();
    let (dir, idx) = saved(&seq);
    let loaded = FMIndex::load_from_dir(index_dir(&dir)).unwrap();
    assert_eq!(loaded, idx);
    assert!(loaded.symbols().is_empty());
    assert_eq!(loaded.search(&seq, 0, 1), vec![0]);
}

fn remove(dir: &Path, name: &str) {
    fs::remove_file(dir.join(name)).unwrap();
}

#[test]
fn missing_component_fails() {
    for name in ["len", "end_pos", "symbols", "c", "ep", "sa", "occ.A"] {
        let (dir, _) = saved(&genome(200, 5));
        remove(&index_dir(&dir), name);
        match FMIndex::load_from_dir(index_dir(&dir)) {
            Err(IndexError::Missing(p)) => assert!(p.ends_with(name)),
            other => panic!("{}: unexpected {:?}", name, other.map(|_| ())),
        }
    }
}

#[test]
fn missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(store::load(&dir.path().join("nope.index")).is_err());
}

#[test]
fn truncated_component_fails() {
    for name in ["sa", "occ.C", "len", "c"] {
        let (dir, _) = saved(&genome(200, 5));
        let path = index_dir(&dir).join(name);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 1]).unwrap();
        assert!(
            matches!(FMIndex::load_from_dir(index_dir(&dir)), Err(IndexError::Truncated { .. })),
            "{} accepted after truncation",
            name
        );
    }
}

#[test]
fn inconsistent_length_fails() {
    let (dir, idx) = saved(&genome(200, 5));
    fs::write(index_dir(&dir).join("len"), (idx.len() as u32 + 1).to_le_bytes()).unwrap();
    assert!(FMIndex::load_from_dir(index_dir(&dir)).is_err());
}

#[test]
fn corrupt_values_fail() {
    let (dir, idx) = saved(&genome(200, 5));
    let d = index_dir(&dir);
    fs::write(d.join("end_pos"), (idx.len() as u32).to_le_bytes()).unwrap();
    assert!(matches!(FMIndex::load_from_dir(&d), Err(IndexError::Corrupt { .. })));

    let (dir, _) = saved(&genome(200, 5));
    let d = index_dir(&dir);
    let mut c = fs::read(d.join("c")).unwrap();
    c[0] = b'Z';
    fs::write(d.join("c"), c).unwrap();
    assert!(matches!(FMIndex::load_from_dir(&d), Err(IndexError::Corrupt { .. })));

    let (dir, _) = saved(&genome(200, 5));
    let d = index_dir(&dir);
    let mut sa = fs::read(d.join("sa")).unwrap();
    sa[..4].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(d.join("sa"), sa).unwrap();
    assert!(matches!(FMIndex::load_from_dir(&d), Err(IndexError::Corrupt { .. })));
}

fn rewrite_u32s(path: &Path, values: impl Iterator<Item = u32>) {
    let bytes: Vec<u8> = values.flat_map(u32::to_le_bytes).collect();
    fs::write(path, bytes).unwrap();
}

#[test]
fn corrupt_occ_column_fails_instead_of_panicking_later() {
    // 大小正确但不是前缀计数：加载若放行，搜索会越过 SA 切片
    let (dir, idx) = saved(&genome(200, 5));
    let d = index_dir(&dir);
    rewrite_u32s(&d.join("occ.A"), (0..idx.len() as u32).map(|i| i * 1000));
    match FMIndex::load_from_dir(&d) {
        Err(IndexError::Corrupt { path, .. }) => assert!(path.ends_with("occ.A")),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }

    // 逐行合法但总数对不上 C/EP
    let (dir, idx) = saved(&genome(200, 5));
    let d = index_dir(&dir);
    rewrite_u32s(&d.join("occ.C"), std::iter::repeat(0).take(idx.len()));
    assert!(matches!(FMIndex::load_from_dir(&d), Err(IndexError::Corrupt { .. })));

    // 计数回退
    let (dir, idx) = saved(&genome(200, 5));
    let d = index_dir(&dir);
    let mut col = idx.occ_column(b'G').unwrap().to_vec();
    let last = col.len() - 1;
    col[last] -= 1;
    rewrite_u32s(&d.join("occ.G"), col.into_iter());
    assert!(matches!(FMIndex::load_from_dir(&d), Err(IndexError::Corrupt { .. })));
}

#[test]
fn end_pos_must_hold_the_first_suffix() {
    let (dir, idx) = saved(&genome(200, 5));
    let d = index_dir(&dir);
    let moved = (idx.end_pos() as u32 + 1) % idx.len() as u32;
    fs::write(d.join("end_pos"), moved.to_le_bytes()).unwrap();
    match FMIndex::load_from_dir(&d) {
        Err(IndexError::Corrupt { path, .. }) => assert!(path.ends_with("sa")),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn symbol_that_is_not_a_file_name_fails() {
    let (dir, _) = saved(&genome(200, 5));
    let d = index_dir(&dir);
    let mut symbols = fs::read(d.join("symbols")).unwrap();
    // 升序仍然成立：'/' < 'A'
    symbols[4] = b'/';
    fs::write(d.join("symbols"), symbols).unwrap();
    match FMIndex::load_from_dir(&d) {
        Err(IndexError::Corrupt { path, .. }) => assert!(path.ends_with("symbols")),
        other => panic!("unexpected {:?}", other.map(|_| ())),
    }
}

#[test]
fn garbage_metadata_fails() {
    let (dir, _) = saved(&genome(50, 5));
    fs::write(index_dir(&dir).join("meta"), [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]).unwrap();
    assert!(matches!(FMIndex::load_from_dir(index_dir(&dir)), Err(IndexError::Meta(_))));
}
