use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use crate::error::{Error, Result};

/// Target size of the negative sampling table.
pub const NEGATIVE_TABLE_SIZE: usize = 10_000_000;

/// Negative sampling table.
///
/// The table contains every output index with a multiplicity that is
/// proportional to the square root of its count. Negatives are drawn
/// by cycling through the shuffled table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NegativeTable {
    negatives: Vec<usize>,
    pos: usize,
}

impl NegativeTable {
    /// Build a table of `NEGATIVE_TABLE_SIZE` entries, shuffled with a
    /// PRNG seeded with `seed`.
    pub fn new(counts: &[u64], seed: u64) -> Result<Self> {
        Self::with_table_size(counts, NEGATIVE_TABLE_SIZE, seed)
    }

    /// Build a table of approximately `table_size` entries.
    pub fn with_table_size(counts: &[u64], table_size: usize, seed: u64) -> Result<Self> {
        if counts.is_empty() {
            return Err(Error::Precondition(String::from(
                "Cannot build a negative sampling table without outputs",
            )));
        }

        let z: f64 = counts.iter().map(|&count| (count as f64).sqrt()).sum();

        let mut negatives = Vec::with_capacity(table_size);
        if z > 0. {
            for (idx, &count) in counts.iter().enumerate() {
                let n = ((count as f64).sqrt() * table_size as f64 / z).floor() as usize;
                negatives.extend(std::iter::repeat(idx).take(n));
            }
        }

        if negatives.is_empty() {
            return Err(Error::Precondition(String::from(
                "Negative sampling table is empty, counts are too small",
            )));
        }

        negatives.shuffle(&mut XorShiftRng::seed_from_u64(seed));

        Ok(NegativeTable { negatives, pos: 0 })
    }

    /// Draw the next negative that is not `target`.
    ///
    /// Loops forever if the table only contains `target`.
    pub fn negative(&mut self, target: usize) -> usize {
        loop {
            let negative = self.negatives[self.pos];
            self.pos = (self.pos + 1) % self.negatives.len();
            if negative != target {
                return negative;
            }
        }
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.negatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.negatives.is_empty()
    }
}
