use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::{debug, info};

use crate::error::{IndexError, Result};
use crate::index::Sequence;

/// Extensions treated as FASTA regardless of content.
const FASTA_EXTENSIONS: &[&str] = &["fasta", "fa", "fna"];

#[derive(Debug, Clone)]
pub struct FastaRecord {
    pub id: String,
    pub seq: Vec<u8>,
}

/// Streams records from a (possibly multi-record) FASTA source.
///
/// Sequence lines have every ASCII whitespace byte removed and are upper-cased.
/// Lines before the first header are ignored.
pub struct FastaReader<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
    peek_header: Option<String>,
}

fn header_id(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(&line[1..]);
    text.split_whitespace().next().unwrap_or("").to_string()
}

fn push_bases(line: &[u8], out: &mut Vec<u8>) {
    out.extend(
        line.iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(u8::to_ascii_uppercase),
    );
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            done: false,
            peek_header: None,
        }
    }

    fn next_line(&mut self) -> std::io::Result<bool> {
        self.buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.buf)?;
        if n == 0 {
            self.done = true;
        }
        Ok(n > 0)
    }

    pub fn next_record(&mut self) -> std::io::Result<Option<FastaRecord>> {
        if self.done {
            return Ok(None);
        }

        let id = match self.peek_header.take() {
            Some(h) => h,
            None => loop {
                if !self.next_line()? {
                    return Ok(None);
                }
                if self.buf.first() == Some(&b'>') {
                    break header_id(&self.buf);
                }
            },
        };

        let mut seq = Vec::new();
        while self.next_line()? {
            if self.buf.first() == Some(&b'>') {
                self.peek_header = Some(header_id(&self.buf));
                break;
            }
            push_bases(&self.buf, &mut seq);
        }

        Ok(Some(FastaRecord { id, seq }))
    }
}

fn has_fasta_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FASTA_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Parses an in-memory source into the sequence body.
///
/// FASTA input (by flag, or when the first non-blank line is a header) has all
/// records concatenated with header lines dropped; anything else is taken whole.
pub fn parse_body(data: &[u8], fasta: bool) -> std::io::Result<Vec<u8>> {
    let first = data
        .split(|&b| b == b'\n')
        .find(|l| l.iter().any(|b| !b.is_ascii_whitespace()));
    let looks_fasta = first.map_or(false, |l| l.first() == Some(&b'>'));

    let mut body = Vec::with_capacity(data.len());
    if fasta || looks_fasta {
        let mut reader = FastaReader::new(data);
        let mut records = 0usize;
        // headerless leading lines still belong to the body
        if !looks_fasta {
            for line in data.split(|&b| b == b'\n') {
                if line.first() == Some(&b'>') {
                    break;
                }
                push_bases(line, &mut body);
            }
        }
        while let Some(rec) = reader.next_record()? {
            debug!("record '{}': {} bases", rec.id, rec.seq.len());
            body.extend_from_slice(&rec.seq);
            records += 1;
        }
        debug!("{} FASTA records", records);
    } else {
        push_bases(data, &mut body);
    }
    Ok(body)
}

/// Reads a sequence file and appends the sentinel.
pub fn read_sequence(path: impl AsRef<Path>) -> Result<Sequence> {
    let path = path.as_ref();
    let mut data = Vec::new();
    File::open(path)
        .map(BufReader::new)
        .and_then(|mut r| r.read_to_end(&mut data))
        .map_err(|e| IndexError::io(path, e))?;
    let body = parse_body(&data, has_fasta_extension(path)).map_err(|e| IndexError::io(path, e))?;
    let seq = Sequence::new(body)?;
    info!("sequence '{}': n={} (with sentinel)", path.display(), seq.len());
    Ok(seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_simple_fasta() {
        let data = b">chr1 first\nACgTNN\n>chr2\nAAA\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "chr1");
        assert_eq!(r1.seq, b"ACGTNN");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "chr2");
        assert_eq!(r2.seq, b"AAA");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn parse_fasta_with_crlf_and_whitespace() {
        let data = b">chr1 desc\r\nAC g t n\r\n acgt\r\n>chr2 \r\n N N N \r\n";
        let mut r = FastaReader::new(Cursor::new(&data[..]));

        let r1 = r.next_record().unwrap().unwrap();
        assert_eq!(r1.id, "chr1");
        assert_eq!(r1.seq, b"ACGTNACGT");

        let r2 = r.next_record().unwrap().unwrap();
        assert_eq!(r2.id, "chr2");
        assert_eq!(r2.seq, b"NNN");

        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn body_concatenates_records_and_drops_headers() {
        let data = b"\n\n>chr1\nACGT\nAC\n>chr2 x\nGG\n";
        assert_eq!(parse_body(data, false).unwrap(), b"ACGTACGG");
    }

    #[test]
    fn raw_text_body_strips_whitespace() {
        let data = b"  acgt\nAC GT\r\n\n";
        assert_eq!(parse_body(data, false).unwrap(), b"ACGTACGT");
    }

    #[test]
    fn fasta_flag_keeps_headerless_prefix() {
        let data = b"AC\n>r1\nGT\n";
        assert_eq!(parse_body(data, true).unwrap(), b"ACGT");
    }

    #[test]
    fn detects_extension() {
        assert!(has_fasta_extension(Path::new("g.fasta")));
        assert!(has_fasta_extension(Path::new("g.FA")));
        assert!(!has_fasta_extension(Path::new("g.txt")));
        assert!(!has_fasta_extension(Path::new("genome")));
    }

    #[test]
    fn read_sequence_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.fasta");
        std::fs::write(&path, ">g\nACGT\nTT\n").unwrap();
        let seq = read_sequence(&path).unwrap();
        assert_eq!(seq.as_bytes(), b"ACGTTT$");

        let missing = dir.path().join("none.txt");
        assert!(matches!(read_sequence(&missing), Err(IndexError::Missing(_))));
    }

    #[test]
    fn read_sequence_rejects_sentinel_in_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.txt");
        std::fs::write(&path, "AC$GT").unwrap();
        assert!(matches!(read_sequence(&path), Err(IndexError::InvalidSymbol { pos: 2, .. })));
    }
}
