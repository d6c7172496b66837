/**
 * OrdRec
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use fnv::{FnvHashMap, FnvHashSet};

use crate::errors::{Error, Result};

pub type SparseVector = FnvHashMap<u32, f64>;
pub type SparseMatrix = Vec<SparseVector>;

/// Items with a test rating at or above the relevance threshold, per user.
pub type RelevantItemsByUser = FnvHashMap<u32, FnvHashSet<u32>>;

/// Ranked item indices per user, indexed by user.
pub type TopNItemsByUser = Vec<Vec<u32>>;

/// Probability of each quantizer level for a (user, item) cell.
pub type OrdinalDistributions = FnvHashMap<(u32, u32), Vec<f64>>;

pub fn new_sparse_matrix(num_rows: usize) -> SparseMatrix {
    vec![FnvHashMap::with_capacity_and_hasher(0, Default::default()); num_rows]
}

/// Ordered, strictly increasing rating levels, e.g. `[1, 2, 3, 4, 5]` for star ratings.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantizer {
    levels: Vec<f64>,
}

impl Quantizer {

    pub fn new(levels: Vec<f64>) -> Result<Self> {
        if levels.len() < 2 {
            return Err(Error::InvalidConfiguration(
                format!("a quantizer needs at least two levels, got {}", levels.len())));
        }

        let strictly_increasing = levels.windows(2).all(|pair| pair[0] < pair[1]);
        if !strictly_increasing || levels.iter().any(|level| !level.is_finite()) {
            return Err(Error::InvalidConfiguration(
                format!("quantizer levels must be finite and strictly increasing: {:?}", levels)));
        }

        Ok(Quantizer { levels })
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> f64 {
        self.levels[index]
    }

    pub fn min(&self) -> f64 {
        self.levels[0]
    }

    pub fn max(&self) -> f64 {
        self.levels[self.levels.len() - 1]
    }

    pub fn range(&self) -> f64 {
        self.max() - self.min()
    }

    /// Index of the level closest to `value`, ties go to the lower level.
    pub fn nearest_index(&self, value: f64) -> usize {
        let mut best = 0;
        let mut best_distance = (value - self.levels[0]).abs();

        for (index, level) in self.levels.iter().enumerate().skip(1) {
            let distance = (value - level).abs();
            if distance < best_distance {
                best = index;
                best_distance = distance;
            }
        }

        best
    }

    pub fn nearest(&self, value: f64) -> f64 {
        self.levels[self.nearest_index(value)]
    }

    /// Probability-weighted mean of the levels.
    pub fn expectation(&self, distribution: &[f64]) -> f64 {
        distribution.iter().zip(self.levels.iter()).map(|(p, level)| p * level).sum()
    }

    /// Level with the highest probability, the first one wins on ties.
    pub fn most_likely(&self, distribution: &[f64]) -> f64 {
        self.levels[arg_max(distribution)]
    }
}

pub fn arg_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

#[cfg(test)]
mod tests {

    use super::{arg_max, Quantizer};

    #[test]
    fn rejects_unordered_levels() {
        assert!(Quantizer::new(vec![1.0]).is_err());
        assert!(Quantizer::new(vec![1.0, 1.0, 2.0]).is_err());
        assert!(Quantizer::new(vec![3.0, 2.0]).is_err());
        assert!(Quantizer::new(vec![1.0, 2.0, 3.0]).is_ok());
    }

    #[test]
    fn nearest_level() {
        let quantizer = Quantizer::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        assert_eq!(quantizer.nearest_index(0.2), 0);
        assert_eq!(quantizer.nearest_index(2.4), 1);
        assert_eq!(quantizer.nearest_index(2.5), 1);
        assert_eq!(quantizer.nearest_index(2.6), 2);
        assert_eq!(quantizer.nearest_index(9.0), 4);
        assert_eq!(quantizer.nearest(4.0), 4.0);
    }

    #[test]
    fn expectation_and_mode() {
        let quantizer = Quantizer::new(vec![1.0, 2.0, 3.0]).unwrap();
        let distribution = [0.2, 0.5, 0.3];

        assert!((quantizer.expectation(&distribution) - 2.1).abs() < 1e-12);
        assert_eq!(quantizer.most_likely(&distribution), 2.0);
        assert_eq!(arg_max(&[0.4, 0.4, 0.2]), 0);
    }
}
