//! Candidate generation: every subset of the non-anchor widths with at most `N - 1` members,
//! each completed with the anchor.
//!
//! Subsets are addressed by a bit mask over the non-anchor widths (bit `i` selects the `i`-th
//! widest one). Masks are visited in ascending integer order; that order is also the tie-break
//! order used by the search, so the mask doubles as a stable candidate index.

use crate::model::{CandidateSet, DemandHistogram};

/// The anchor plus the widths subsets are drawn from, widest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUniverse {
    anchor: u32,
    rest: Vec<u32>,
}

impl CandidateUniverse {
    /// Returns `None` for an empty histogram.
    pub fn from_histogram(histogram: &DemandHistogram) -> Option<Self> {
        let mut widths = histogram.widths_descending().into_iter();
        let anchor = widths.next()?;
        Some(Self {
            anchor,
            rest: widths.collect(),
        })
    }

    pub fn anchor(&self) -> u32 {
        self.anchor
    }

    /// Non-anchor widths, widest first.
    pub fn rest(&self) -> &[u32] {
        &self.rest
    }

    /// One past the largest mask (`2^(k-1)`). Callers keep `rest().len()` at most 63.
    pub fn mask_end(&self) -> u64 {
        debug_assert!(self.rest.len() < 64);
        1u64 << self.rest.len()
    }

    /// Number of candidates [`candidates`](Self::candidates) yields for `widths_number`.
    pub fn admissible_count(&self, widths_number: usize) -> u64 {
        let n = self.rest.len() as u64;
        let max_extra = (widths_number.saturating_sub(1) as u64).min(n);
        (0..=max_extra).map(|j| binomial(n, j)).sum()
    }

    /// Writes the widths selected by `mask` (anchor first, descending) into `buf`.
    pub fn fill(&self, mask: u64, buf: &mut Vec<u32>) {
        buf.clear();
        buf.push(self.anchor);
        let mut bits = mask;
        while bits != 0 {
            let i = bits.trailing_zeros() as usize;
            buf.push(self.rest[i]);
            bits &= bits - 1;
        }
    }

    pub fn candidate(&self, mask: u64) -> CandidateSet {
        let mut buf = Vec::with_capacity(mask.count_ones() as usize + 1);
        self.fill(mask, &mut buf);
        CandidateSet::from_descending(buf)
    }

    /// Enumerates admissible candidates for `widths_number` in mask order.
    pub fn candidates(&self, widths_number: usize) -> Candidates<'_> {
        Candidates {
            universe: self,
            max_extra: widths_number.saturating_sub(1) as u32,
            next: 0,
            end: self.mask_end(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    universe: &'a CandidateUniverse,
    max_extra: u32,
    next: u64,
    end: u64,
}

impl Iterator for Candidates<'_> {
    /// `(mask, candidate)`.
    type Item = (u64, CandidateSet);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let mask = self.next;
            self.next += 1;
            if mask.count_ones() <= self.max_extra {
                return Some((mask, self.universe.candidate(mask)));
            }
        }
        None
    }
}

pub(crate) fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * u128::from(n - i) / u128::from(i + 1);
    }
    u64::try_from(acc).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::binomial;

    #[test]
    fn binomial_matches_pascal_triangle() {
        assert_eq!(binomial(0, 0), 1);
        assert_eq!(binomial(5, 0), 1);
        assert_eq!(binomial(5, 2), 10);
        assert_eq!(binomial(5, 5), 1);
        assert_eq!(binomial(3, 4), 0);
        assert_eq!(binomial(63, 31), 916_312_070_471_295_267);
    }

    #[test]
    fn binomial_rows_sum_to_powers_of_two() {
        for n in 0..=20u64 {
            let sum: u64 = (0..=n).map(|k| binomial(n, k)).sum();
            assert_eq!(sum, 1u64 << n);
        }
    }
}
