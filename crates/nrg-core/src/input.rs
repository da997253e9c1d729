//! Reader for the foreign ASCII data-file format produced by the
//! (external, out of scope) symbolic front end: a header declaring
//! channel/operator counts and mode flags, followed by the invariant and
//! eigenvalue list, hopping operator blocks, and named operator blocks.
//!
//! Hand-rolled rather than `serde`-derived: this is a fixed, already
//! standardized wire format we only ever consume, not one we control the
//! shape of. Whitespace-delimited tokens, one logical record per line,
//! matching the plain-text layout described for this format.

use std::io::BufRead;

use crate::error::{NrgError, Result};
use crate::invariant::Invariant;
use crate::operator::OperatorBlockSet;
use crate::scalar::Matrix;

struct TokenReader<R: BufRead> {
    reader: R,
    line: String,
    tokens: std::collections::VecDeque<String>,
}

impl<R: BufRead> TokenReader<R> {
    fn new(reader: R) -> Self {
        TokenReader {
            reader,
            line: String::new(),
            tokens: std::collections::VecDeque::new(),
        }
    }

    fn fill(&mut self) -> Result<()> {
        while self.tokens.is_empty() {
            self.line.clear();
            let n = self
                .reader
                .read_line(&mut self.line)
                .map_err(|e| NrgError::io("<data-file>", e))?;
            if n == 0 {
                return Err(NrgError::CorruptInput("unexpected end of data file".into()));
            }
            self.tokens
                .extend(self.line.split_whitespace().map(|s| s.to_string()));
        }
        Ok(())
    }

    fn next_token(&mut self) -> Result<String> {
        self.fill()?;
        Ok(self.tokens.pop_front().unwrap())
    }

    fn peek_token(&mut self) -> Result<&str> {
        self.fill()?;
        Ok(self.tokens.front().unwrap())
    }

    fn next_usize(&mut self) -> Result<usize> {
        self.next_token()?
            .parse()
            .map_err(|_| NrgError::CorruptInput("expected an integer".into()))
    }

    fn next_i32(&mut self) -> Result<i32> {
        self.next_token()?
            .parse()
            .map_err(|_| NrgError::CorruptInput("expected an integer".into()))
    }

    fn next_f64(&mut self) -> Result<f64> {
        self.next_token()?
            .parse()
            .map_err(|_| NrgError::CorruptInput("expected a float".into()))
    }

    fn next_invariant(&mut self, arity: usize) -> Result<Invariant> {
        let mut components = Vec::with_capacity(arity);
        for _ in 0..arity {
            components.push(self.next_i32()?);
        }
        Ok(Invariant::new(components))
    }
}

/// The header flags every data file carries ahead of its invariant list
/// and operator blocks.
#[derive(Clone, Copy, Debug)]
pub struct DataFileHeader {
    pub n_channels: usize,
    pub n_flavors: usize,
    pub arity: usize,
    pub complex: bool,
    pub rescaled: bool,
    pub absolute: bool,
}

/// The fully parsed contents of one step's data file: header, the
/// subspace invariant/eigenvalue list, and the named/hopping operator
/// blocks that follow it.
pub struct DataFile {
    pub header: DataFileHeader,
    pub eigenvalues: Vec<(Invariant, Vec<f64>)>,
    pub hopping: Vec<Vec<OperatorBlockSet<f64>>>,
    pub named: std::collections::HashMap<String, OperatorBlockSet<f64>>,
}

fn read_dense_block<R: BufRead>(r: &mut TokenReader<R>, rows: usize, cols: usize) -> Result<Matrix<f64>> {
    let mut m = Matrix::<f64>::zeros(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            m[(i, j)] = r.next_f64()?;
        }
    }
    Ok(m)
}

fn read_operator_block_set<R: BufRead>(r: &mut TokenReader<R>, arity: usize) -> Result<OperatorBlockSet<f64>> {
    let mut set = OperatorBlockSet::new();
    let n_pairs = r.next_usize()?;
    for _ in 0..n_pairs {
        let i1 = r.next_invariant(arity)?;
        let i2 = r.next_invariant(arity)?;
        let rows = r.next_usize()?;
        let cols = r.next_usize()?;
        let block = read_dense_block(r, rows, cols)?;
        set.insert(i1, i2, block);
    }
    Ok(set)
}

/// Parses a complete data file from `input`. Only the real (`COMPLEX`
/// absent) wire encoding is decoded into matrices here; the `COMPLEX` flag
/// is still read and surfaced on [`DataFileHeader::complex`] so callers
/// can reject a mismatched `Scalar` instantiation early.
pub fn read_data_file<R: BufRead>(input: R) -> Result<DataFile> {
    let mut r = TokenReader::new(input);

    let n_channels = r.next_usize()?;
    let n_flavors = r.next_usize()?;
    let arity = r.next_usize()?;
    let complex = if r.peek_token()?.eq_ignore_ascii_case("COMPLEX") {
        r.next_token()?;
        true
    } else {
        false
    };
    let rescaled = r.next_usize()? != 0;
    let absolute = r.next_usize()? != 0;

    let header = DataFileHeader {
        n_channels,
        n_flavors,
        arity,
        complex,
        rescaled,
        absolute,
    };

    let n_subspaces = r.next_usize()?;
    let mut eigenvalues = Vec::with_capacity(n_subspaces);
    for _ in 0..n_subspaces {
        let invariant = r.next_invariant(arity)?;
        let n_states = r.next_usize()?;
        let mut energies = Vec::with_capacity(n_states);
        for _ in 0..n_states {
            energies.push(r.next_f64()?);
        }
        eigenvalues.push((invariant, energies));
    }

    let mut hopping = Vec::with_capacity(n_channels);
    for _ in 0..n_channels {
        let mut flavors = Vec::with_capacity(n_flavors);
        for _ in 0..n_flavors {
            flavors.push(read_operator_block_set(&mut r, arity)?);
        }
        hopping.push(flavors);
    }

    let n_named = r.next_usize()?;
    let mut named = std::collections::HashMap::with_capacity(n_named);
    for _ in 0..n_named {
        let name = r.next_token()?;
        let set = read_operator_block_set(&mut r, arity)?;
        named.insert(name, set);
    }

    Ok(DataFile {
        header,
        eigenvalues,
        hopping,
        named,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_minimal_file_with_no_subspaces_or_operators() {
        let text = "1\n1\n2\nNOTCOMPLEX\n1\n0\n0\n0\n0\n";
        let file = read_data_file(Cursor::new(text.as_bytes())).unwrap();
        assert_eq!(file.header.n_channels, 1);
        assert!(file.header.rescaled);
        assert!(file.eigenvalues.is_empty());
        assert_eq!(file.hopping.len(), 1);
    }

    #[test]
    fn reads_one_subspace_with_two_energies() {
        let text = "1\n1\n2\nNOTCOMPLEX\n1\n0\n1\n0 0\n2\n0.0 1.5\n0\n0\n";
        let file = read_data_file(Cursor::new(text.as_bytes())).unwrap();
        assert_eq!(file.eigenvalues[0].1, vec![0.0, 1.5]);
    }
}
