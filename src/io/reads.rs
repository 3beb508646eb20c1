use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};

/// One simulated read line:
///
/// ```text
/// <read> <count> <p1> ... <pN> <error count> <e1> ... <eE>
/// ```
///
/// `positions` are the genome offsets where the unmutated read occurs,
/// `errors` are offsets inside the read that were substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    pub read: Vec<u8>,
    pub positions: Vec<u32>,
    pub errors: Vec<usize>,
}

impl fmt::Display for ReadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", String::from_utf8_lossy(&self.read), self.positions.len())?;
        for p in &self.positions {
            write!(f, " {}", p)?;
        }
        write!(f, " {}", self.errors.len())?;
        for e in &self.errors {
            write!(f, " {}", e)?;
        }
        Ok(())
    }
}

fn take_number<'a, T>(items: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let tok = items.next().ok_or_else(|| anyhow!("missing {}", what))?;
    tok.parse().with_context(|| format!("invalid {} '{}'", what, tok))
}

impl FromStr for ReadRecord {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut items = line.split_whitespace();
        let read = items.next().ok_or_else(|| anyhow!("empty line"))?.as_bytes().to_vec();

        let count: usize = take_number(&mut items, "occurrence count")?;
        let positions = (0..count)
            .map(|_| take_number(&mut items, "position"))
            .collect::<Result<Vec<u32>>>()?;

        let n_err: usize = take_number(&mut items, "error count")?;
        let errors = (0..n_err)
            .map(|_| take_number(&mut items, "error offset"))
            .collect::<Result<Vec<usize>>>()?;

        if let Some(extra) = items.next() {
            bail!("unexpected trailing field '{}'", extra);
        }
        if let Some(&e) = errors.iter().find(|&&e| e >= read.len()) {
            bail!("error offset {} outside read of length {}", e, read.len());
        }
        Ok(Self { read, positions, errors })
    }
}
