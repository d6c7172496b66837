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

use std::time::Instant;

use log::info;
use scoped_pool::Pool;

use crate::dense::DenseMatrix;
use crate::preferences::{PreferenceRelations, EQUALLY_PREFERRED};
use crate::rating_matrix::RatingMatrix;
use crate::types::SparseVector;
use crate::utils;

/// User-user Pearson correlations over co-rated items.
pub fn pearson_of_rows(ratings: &RatingMatrix, num_threads: usize) -> DenseMatrix {
    let rows: Vec<SparseVector> = (0..ratings.num_users() as u32)
        .map(|user| ratings.user_ratings(user).clone())
        .collect();

    pairwise(&rows, num_threads, "user-user pearson", pearson)
}

/// Item-item Pearson correlations over the users who rated both items.
pub fn pearson_of_columns(ratings: &RatingMatrix, num_threads: usize) -> DenseMatrix {
    pairwise(&ratings.columns(), num_threads, "item-item pearson", pearson)
}

/// User-user cosine similarities of the preference relations, centered so that ties count as
/// zero. Each user is a vector over the item pairs `a < b` they rated.
pub fn cosine_of_pref_relations(prefs: &PreferenceRelations, num_threads: usize) -> DenseMatrix {
    let vectors: Vec<Vec<(u64, f64)>> = prefs.users().iter()
        .map(|relations| {
            let items = relations.items();
            relations.upper_pairs()
                .map(|(a, b, value)| {
                    let key = ((items[a] as u64) << 32) | items[b] as u64;
                    (key, value - EQUALLY_PREFERRED)
                })
                .collect()
        })
        .collect();

    pairwise(&vectors, num_threads, "user-user preference cosine", cosine_of_sorted)
}

/// Fills a symmetric similarity matrix, one row per task. Every pair is computed from a canonical
/// ordering of the shared keys, so `sim(a, b)` and `sim(b, a)` are bitwise equal.
fn pairwise<V, F>(vectors: &[V], num_threads: usize, name: &str, similarity: F) -> DenseMatrix
    where V: Sync, F: Fn(&V, &V) -> f64 + Sync {

    let start = Instant::now();
    let n = vectors.len();
    let mut similarities = DenseMatrix::zeros(n, n);

    let pool = Pool::new(num_threads.max(1));
    let similarity = &similarity;

    pool.scoped(|scope| {
        for (index, row) in similarities.rows_mut().enumerate() {
            scope.execute(move || {
                for other in 0..n {
                    row[other] = if other == index {
                        1.0
                    } else {
                        similarity(&vectors[index], &vectors[other])
                    };
                }
            });
        }
    });
    pool.shutdown();

    info!("Computed {} similarities for {} entities in {}ms (sum {:.4}, abs sum {:.4})",
        name, n, utils::to_millis(start.elapsed()), similarities.sum(), similarities.abs_sum());

    similarities
}

pub fn pearson(a: &SparseVector, b: &SparseVector) -> f64 {
    let (small, large, swapped) = if a.len() <= b.len() { (a, b, false) } else { (b, a, true) };

    let mut shared: Vec<(u32, f64, f64)> = small.iter()
        .filter_map(|(key, value)| large.get(key).map(|other| {
            if swapped { (*key, *other, *value) } else { (*key, *value, *other) }
        }))
        .collect();

    if shared.len() < 2 {
        return 0.0;
    }
    shared.sort_by_key(|&(key, _, _)| key);

    let count = shared.len() as f64;
    let mean_a = shared.iter().map(|&(_, x, _)| x).sum::<f64>() / count;
    let mean_b = shared.iter().map(|&(_, _, y)| y).sum::<f64>() / count;

    let mut numerator = 0.0;
    let mut variance_a = 0.0;
    let mut variance_b = 0.0;
    for &(_, x, y) in shared.iter() {
        numerator += (x - mean_a) * (y - mean_b);
        variance_a += (x - mean_a) * (x - mean_a);
        variance_b += (y - mean_b) * (y - mean_b);
    }

    if variance_a == 0.0 || variance_b == 0.0 {
        return 0.0;
    }

    (numerator / (variance_a * variance_b).sqrt()).max(-1.0).min(1.0)
}

/// Cosine of two vectors given as `(key, value)` lists sorted by key.
pub fn cosine_of_sorted(a: &Vec<(u64, f64)>, b: &Vec<(u64, f64)>) -> f64 {
    let norm_a: f64 = a.iter().map(|&(_, x)| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|&(_, y)| y * y).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let mut dot = 0.0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].0 < b[j].0 {
            i += 1;
        } else if a[i].0 > b[j].0 {
            j += 1;
        } else {
            dot += a[i].1 * b[j].1;
            i += 1;
            j += 1;
        }
    }

    (dot / (norm_a * norm_b)).max(-1.0).min(1.0)
}
