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

use log::debug;

use crate::errors::{ensure_same_shape, Error, Result};
use crate::types;
use crate::types::{Quantizer, SparseMatrix, SparseVector};

/// Sparse user x item matrix. An absent cell means "unrated", never a rating of zero. All
/// derivations return a new matrix, the receiver is left untouched.
#[derive(Clone, Debug)]
pub struct RatingMatrix {
    num_users: usize,
    num_items: usize,
    rows: SparseMatrix,
}

impl RatingMatrix {

    pub fn new(num_users: usize, num_items: usize) -> Self {
        RatingMatrix { num_users, num_items, rows: types::new_sparse_matrix(num_users) }
    }

    pub fn from_triplets<I>(num_users: usize, num_items: usize, triplets: I) -> Result<Self>
        where I: IntoIterator<Item=(u32, u32, f64)> {

        let mut matrix = RatingMatrix::new(num_users, num_items);
        for (user, item, value) in triplets {
            if user as usize >= num_users || item as usize >= num_items {
                return Err(Error::InvalidConfiguration(format!(
                    "cell ({}, {}) lies outside of a {}x{} matrix",
                    user, item, num_users, num_items)));
            }
            matrix.rows[user as usize].insert(item, value);
        }

        Ok(matrix)
    }

    /// Only used while a new matrix is being assembled inside the crate.
    pub(crate) fn insert(&mut self, user: u32, item: u32, value: f64) {
        self.rows[user as usize].insert(item, value);
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }

    pub fn num_ratings(&self) -> usize {
        self.rows.iter().map(|row| row.len()).sum()
    }

    pub fn get(&self, user: u32, item: u32) -> Option<f64> {
        self.rows.get(user as usize).and_then(|row| row.get(&item).cloned())
    }

    pub fn contains(&self, user: u32, item: u32) -> bool {
        self.get(user, item).is_some()
    }

    pub fn user_ratings(&self, user: u32) -> &SparseVector {
        &self.rows[user as usize]
    }

    /// The rated items of a user in ascending order.
    pub fn items_of(&self, user: u32) -> Vec<u32> {
        let mut items: Vec<u32> = self.rows[user as usize].keys().cloned().collect();
        items.sort();
        items
    }

    /// All known cells ordered by user and item. Every training loop iterates in this order, which
    /// keeps runs with the same seed reproducible.
    pub fn triplets(&self) -> Vec<(u32, u32, f64)> {
        let mut triplets = Vec::with_capacity(self.num_ratings());
        for (user, row) in self.rows.iter().enumerate() {
            let start = triplets.len();
            for (item, value) in row.iter() {
                triplets.push((user as u32, *item, *value));
            }
            triplets[start..].sort_by_key(|&(_, item, _)| item);
        }
        triplets
    }

    fn map_values<F: Fn(f64) -> f64>(&self, func: F) -> RatingMatrix {
        let rows = self.rows.iter()
            .map(|row| row.iter().map(|(item, value)| (*item, func(*value))).collect())
            .collect();

        RatingMatrix { num_users: self.num_users, num_items: self.num_items, rows }
    }

    /// A 0/1 mask of the known cells, used to describe which cells a predictor has to fill.
    pub fn indexes_of_non_zero_elements(&self) -> RatingMatrix {
        self.map_values(|_| 1.0)
    }

    pub fn scale(&self, factor: f64) -> RatingMatrix {
        self.map_values(|value| value * factor)
    }

    /// Union of the known cells of both matrices. Cells known in both keep the value of `self`.
    pub fn merge_non_overlap(&self, other: &RatingMatrix) -> Result<RatingMatrix> {
        ensure_same_shape(self.shape(), other.shape())?;

        let mut merged = self.clone();
        let mut num_skipped = 0;

        for (user, row) in other.rows.iter().enumerate() {
            for (item, value) in row.iter() {
                let merged_row = &mut merged.rows[user];
                if merged_row.contains_key(item) {
                    num_skipped += 1;
                } else {
                    merged_row.insert(*item, *value);
                }
            }
        }

        if num_skipped > 0 {
            debug!("Skipped {} overlapping cells while merging", num_skipped);
        }

        Ok(merged)
    }

    /// Maps every known value onto the quantizer scale via `min + value * range` and snaps it to
    /// the nearest level. With `min = 0` and `range = 1` values already on a level stay put.
    pub fn quantization(&self, min: f64, range: f64, quantizer: &Quantizer) -> RatingMatrix {
        self.map_values(|value| quantizer.nearest(min + value * range))
    }

    pub fn global_mean(&self) -> f64 {
        let num_ratings = self.num_ratings();
        if num_ratings == 0 {
            return 0.0;
        }

        let sum: f64 = self.rows.iter().flat_map(|row| row.values()).sum();
        sum / num_ratings as f64
    }

    /// Mean rating per user, users without ratings get the global mean.
    pub fn user_means(&self) -> Vec<f64> {
        let global_mean = self.global_mean();
        self.rows.iter()
            .map(|row| {
                if row.is_empty() {
                    global_mean
                } else {
                    row.values().sum::<f64>() / row.len() as f64
                }
            })
            .collect()
    }

    /// Mean rating per item, items without ratings get the global mean.
    pub fn item_means(&self) -> Vec<f64> {
        let global_mean = self.global_mean();
        let mut sums = vec![0.0; self.num_items];
        let counts = self.item_counts();

        for row in self.rows.iter() {
            for (item, value) in row.iter() {
                sums[*item as usize] += value;
            }
        }

        sums.into_iter()
            .zip(counts.into_iter())
            .map(|(sum, count)| if count == 0 { global_mean } else { sum / count as f64 })
            .collect()
    }

    pub fn user_counts(&self) -> Vec<usize> {
        self.rows.iter().map(|row| row.len()).collect()
    }

    pub fn item_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_items];
        for row in self.rows.iter() {
            for item in row.keys() {
                counts[*item as usize] += 1;
            }
        }
        counts
    }

    /// The transposed rows, i.e. the ratings of every item keyed by user.
    pub fn columns(&self) -> SparseMatrix {
        let mut columns = types::new_sparse_matrix(self.num_items);
        for (user, row) in self.rows.iter().enumerate() {
            for (item, value) in row.iter() {
                columns[*item as usize].insert(user as u32, *value);
            }
        }
        columns
    }

    pub fn brief(&self, name: &str) -> String {
        let num_ratings = self.num_ratings();
        let density = if self.num_users * self.num_items == 0 {
            0.0
        } else {
            num_ratings as f64 / (self.num_users * self.num_items) as f64
        };

        format!("{}: {} users, {} items, {} ratings ({:.2}% dense), global mean {:.4}",
            name, self.num_users, self.num_items, num_ratings, density * 100.0,
            self.global_mean())
    }
}
