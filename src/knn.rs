/*
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

//! User-based neighbourhood predictors, over rating correlations (`UserKNN`) or over the
//! similarities of the users' preference relations (`PrefUserKNN`).

use std::cmp::Ordering;
use std::time::Instant;

use log::info;
use scoped_pool::Pool;

use crate::dense::DenseMatrix;
use crate::errors::{ensure_same_shape, Result};
use crate::preferences::{PreferenceRelations, EQUALLY_PREFERRED};
use crate::rating_matrix::RatingMatrix;
use crate::types::{SparseMatrix, SparseVector};
use crate::utils;

/// A neighbour of a user who knows the target item: `(similarity, neighbour, value)`.
type Neighbour = (f64, u32, f64);

/// The `k` most similar users to `user` with positive similarity that have a value in `column`,
/// most similar first and the lower user index on ties.
fn nearest_neighbours(
    user: u32,
    column: &SparseVector,
    similarities: &DenseMatrix,
    k: usize,
) -> Vec<Neighbour> {
    let mut candidates: Vec<Neighbour> = column.iter()
        .filter(|(other, _)| **other != user)
        .map(|(other, value)| (similarities.get(user as usize, *other as usize), *other, *value))
        .filter(|&(similarity, _, _)| similarity > 0.0)
        .collect();

    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal).then_with(|| a.1.cmp(&b.1))
    });
    candidates.truncate(k);
    candidates
}

/// Predicts every known cell of `unknown` from the `k` nearest neighbours who know the item,
/// with `aggregate(user, neighbours)`. Users are processed in parallel.
fn predict_with_neighbours<F>(
    columns: &SparseMatrix,
    unknown: &RatingMatrix,
    similarities: &DenseMatrix,
    k: usize,
    num_threads: usize,
    aggregate: F,
) -> RatingMatrix where F: Fn(u32, &[Neighbour]) -> f64 + Sync {

    let num_users = unknown.num_users();
    let mut rows: Vec<Vec<(u32, f64)>> = vec![Vec::new(); num_users];

    let pool = Pool::new(num_threads.max(1));
    let aggregate = &aggregate;

    pool.scoped(|scope| {
        for (user, row) in rows.iter_mut().enumerate() {
            scope.execute(move || {
                let user = user as u32;
                for item in unknown.items_of(user) {
                    let neighbours = nearest_neighbours(user, &columns[item as usize], similarities, k);
                    row.push((item, aggregate(user, &neighbours)));
                }
            });
        }
    });
    pool.shutdown();

    let mut predicted = RatingMatrix::new(unknown.num_users(), unknown.num_items());
    for (user, row) in rows.into_iter().enumerate() {
        for (item, value) in row {
            predicted.insert(user as u32, item, value);
        }
    }
    predicted
}

/// Mean-centered weighted average of the neighbours' ratings,
/// `mean(u) + sum(s * (r_v - mean(v))) / sum(|s|)`, or `mean(u)` without neighbours.
pub fn predict_ratings(
    train: &RatingMatrix,
    unknown: &RatingMatrix,
    user_similarities: &DenseMatrix,
    neighbors: usize,
    num_threads: usize,
) -> Result<RatingMatrix> {
    ensure_same_shape(train.shape(), unknown.shape())?;
    ensure_same_shape((train.num_users(), train.num_users()), user_similarities.shape())?;

    let start = Instant::now();
    let means = train.user_means();

    let predicted = predict_with_neighbours(&train.columns(), unknown, user_similarities,
        neighbors, num_threads, |user, neighbours| {
            let mut weighted = 0.0;
            let mut total = 0.0;
            for &(similarity, other, rating) in neighbours.iter() {
                weighted += similarity * (rating - means[other as usize]);
                total += similarity.abs();
            }
            if total > 0.0 {
                means[user as usize] + weighted / total
            } else {
                means[user as usize]
            }
        });

    info!("UserKNN with {} neighbours predicted {} cells in {}ms",
        neighbors, predicted.num_ratings(), utils::to_millis(start.elapsed()));

    Ok(predicted)
}

/// Weighted average of the neighbours' positions of the item, 0.5 without neighbours. The
/// result is a position in [0, 1], usable for ranking.
pub fn predict_positions(
    relations: &PreferenceRelations,
    unknown: &RatingMatrix,
    user_similarities: &DenseMatrix,
    neighbors: usize,
    num_threads: usize,
) -> Result<RatingMatrix> {
    ensure_same_shape(relations.shape(), unknown.shape())?;
    ensure_same_shape((relations.num_users(), relations.num_users()), user_similarities.shape())?;

    let start = Instant::now();
    let positions = relations.position_matrix();

    let predicted = predict_with_neighbours(&positions.columns(), unknown, user_similarities,
        neighbors, num_threads, |_, neighbours| {
            let mut weighted = 0.0;
            let mut total = 0.0;
            for &(similarity, _, position) in neighbours.iter() {
                weighted += similarity * position;
                total += similarity;
            }
            if total > 0.0 { weighted / total } else { EQUALLY_PREFERRED }
        });

    info!("PrefUserKNN with {} neighbours predicted {} cells in {}ms",
        neighbors, predicted.num_ratings(), utils::to_millis(start.elapsed()));

    Ok(predicted)
}
