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

//! Ordinal random field (ORF) smoothing: the distributions of a user's unknown cells are pulled
//! toward the distributions of similar items of the same user, with a mean-field relaxation.

use std::time::Instant;

use fnv::FnvHashMap;
use log::info;
use scoped_pool::Pool;

use crate::config::OrfConfig;
use crate::dense::DenseMatrix;
use crate::errors::{ensure_same_shape, Error, Result};
use crate::ordinal::{normalize, OrdinalPrediction};
use crate::rating_matrix::RatingMatrix;
use crate::types::{OrdinalDistributions, Quantizer};
use crate::utils;

const STAGE: &str = "ORF";

#[derive(Clone, Copy, Debug)]
enum Neighbour {
    /// Another unknown cell of the same user, by node index.
    Node(usize),
    /// A train cell, with the index of its nearest level.
    Observed(usize),
}

/// The unknown cells of one user, with their unary distributions and their neighbourhoods.
struct UserField {
    unary: Vec<Vec<f64>>,
    neighbours: Vec<Vec<(Neighbour, f64)>>,
}

impl UserField {

    fn build(
        nodes: Vec<(u32, Vec<f64>)>,
        observed: &[(u32, usize)],
        item_similarities: &DenseMatrix,
        config: &OrfConfig,
    ) -> UserField {
        let is_neighbour = |similarity: f64| similarity > config.min_similarity && similarity > 0.0;

        let neighbours = nodes.iter()
            .map(|&(item, _)| {
                let mut neighbours = Vec::new();
                for (index, &(other, _)) in nodes.iter().enumerate() {
                    let similarity = item_similarities.get(item as usize, other as usize);
                    if other != item && is_neighbour(similarity) {
                        neighbours.push((Neighbour::Node(index), similarity));
                    }
                }
                for &(other, level) in observed.iter() {
                    let similarity = item_similarities.get(item as usize, other as usize);
                    if other != item && is_neighbour(similarity) {
                        neighbours.push((Neighbour::Observed(level), similarity));
                    }
                }
                neighbours
            })
            .collect();

        let unary = nodes.into_iter().map(|(_, distribution)| distribution).collect();

        UserField { unary, neighbours }
    }

    /// Jacobi sweeps until `max_epoch` or until no probability changes by `tolerance` or more.
    fn relax(&self, config: &OrfConfig) -> Result<Vec<Vec<f64>>> {
        let mut current = self.unary.clone();
        if self.neighbours.iter().all(|neighbours| neighbours.is_empty()) {
            return Ok(current);
        }

        let regularization = config.regularization;
        let damping = config.learn_rate;

        for epoch in 0..config.max_epoch {
            let mut next = current.clone();
            let mut largest_change: f64 = 0.0;

            for (node, neighbours) in self.neighbours.iter().enumerate() {
                if neighbours.is_empty() {
                    continue;
                }

                let unary = &self.unary[node];
                let mut messages = vec![0.0; unary.len()];
                let mut total_weight = 0.0;

                for &(neighbour, weight) in neighbours.iter() {
                    total_weight += weight;
                    match neighbour {
                        Neighbour::Node(other) => {
                            for (message, probability) in messages.iter_mut().zip(current[other].iter()) {
                                *message += weight * probability;
                            }
                        }
                        Neighbour::Observed(level) => messages[level] += weight,
                    }
                }

                let denominator = 1.0 + regularization * total_weight;
                let mut updated: Vec<f64> = unary.iter()
                    .zip(messages.iter())
                    .zip(current[node].iter())
                    .map(|((psi, message), previous)| {
                        let target = (psi + regularization * message) / denominator;
                        (1.0 - damping) * previous + damping * target
                    })
                    .collect();

                if !utils::all_finite(&updated) {
                    return Err(Error::Divergence { stage: STAGE, epoch });
                }
                normalize(&mut updated);

                for (new, old) in updated.iter().zip(current[node].iter()) {
                    largest_change = largest_change.max((new - old).abs());
                }
                next[node] = updated;
            }

            current = next;
            if largest_change < config.tolerance {
                break;
            }
        }

        Ok(current)
    }
}

/// Smooths `distributions`, which must hold a distribution over the quantizer levels for every
/// known cell of `unknown`. `item_similarities` is an item by item matrix over the columns of
/// `train`.
pub fn predict_ratings(
    train: &RatingMatrix,
    unknown: &RatingMatrix,
    item_similarities: &DenseMatrix,
    distributions: &OrdinalDistributions,
    quantizer: &Quantizer,
    config: &OrfConfig,
    num_threads: usize,
) -> Result<OrdinalPrediction> {
    ensure_same_shape(train.shape(), unknown.shape())?;
    ensure_same_shape((train.num_items(), train.num_items()), item_similarities.shape())?;

    let start = Instant::now();
    let num_users = train.num_users();

    let mut fields = Vec::with_capacity(num_users);
    let mut items_by_user = Vec::with_capacity(num_users);

    for user in 0..num_users as u32 {
        let items = unknown.items_of(user);

        let mut nodes = Vec::with_capacity(items.len());
        for &item in items.iter() {
            let distribution = distributions.get(&(user, item)).ok_or_else(|| {
                Error::InvalidConfiguration(format!(
                    "no ordinal distribution for unknown cell ({}, {})", user, item))
            })?;
            if distribution.len() != quantizer.len() {
                return Err(Error::InvalidConfiguration(format!(
                    "distribution of ({}, {}) has {} levels, expected {}",
                    user, item, distribution.len(), quantizer.len())));
            }
            nodes.push((item, distribution.clone()));
        }

        let observed: Vec<(u32, usize)> = train.items_of(user).into_iter()
            .filter_map(|item| train.get(user, item).map(|value| (item, quantizer.nearest_index(value))))
            .collect();

        fields.push(UserField::build(nodes, &observed, item_similarities, config));
        items_by_user.push(items);
    }

    let num_edges: usize = fields.iter()
        .map(|field| field.neighbours.iter().map(|neighbours| neighbours.len()).sum::<usize>())
        .sum();

    let mut relaxed: Vec<Result<Vec<Vec<f64>>>> = (0..num_users).map(|_| Ok(Vec::new())).collect();

    let pool = Pool::new(num_threads.max(1));
    pool.scoped(|scope| {
        for (slot, field) in relaxed.iter_mut().zip(fields.iter()) {
            scope.execute(move || {
                *slot = field.relax(config);
            });
        }
    });
    pool.shutdown();

    let mut smoothed: OrdinalDistributions =
        FnvHashMap::with_capacity_and_hasher(unknown.num_ratings(), Default::default());

    for (user, (result, items)) in relaxed.into_iter().zip(items_by_user.into_iter()).enumerate() {
        for (item, distribution) in items.into_iter().zip(result?.into_iter()) {
            smoothed.insert((user as u32, item), distribution);
        }
    }

    info!("Smoothed {} cells over {} neighbourhood edges in {}ms",
        smoothed.len(), num_edges, utils::to_millis(start.elapsed()));

    Ok(OrdinalPrediction::from_distributions(
        train.num_users(), train.num_items(), smoothed, quantizer))
}

#[cfg(test)]
mod tests {

    use fnv::FnvHashMap;

    use super::predict_ratings;
    use crate::config::OrfConfig;
    use crate::dense::DenseMatrix;
    use crate::rating_matrix::RatingMatrix;
    use crate::types::{OrdinalDistributions, Quantizer};

    fn quantizer() -> Quantizer {
        Quantizer::new(vec![1.0, 2.0, 3.0]).unwrap()
    }

    fn train() -> RatingMatrix {
        RatingMatrix::from_triplets(2, 3, vec![(0, 2, 3.0), (1, 0, 1.0)]).unwrap()
    }

    fn unknown() -> RatingMatrix {
        RatingMatrix::from_triplets(2, 3, vec![(0, 0, 1.0), (0, 1, 1.0), (1, 1, 1.0)]).unwrap()
    }

    fn similarities() -> DenseMatrix {
        DenseMatrix::from_rows(vec![
            vec![1.0, 0.05, 0.9],
            vec![0.05, 1.0, -0.5],
            vec![0.9, -0.5, 1.0],
        ]).unwrap()
    }

    fn distributions() -> OrdinalDistributions {
        let mut distributions = FnvHashMap::default();
        distributions.insert((0, 0), vec![0.6, 0.3, 0.1]);
        distributions.insert((0, 1), vec![0.2, 0.5, 0.3]);
        distributions.insert((1, 1), vec![0.1, 0.1, 0.8]);
        distributions
    }

    #[test]
    fn no_neighbours_no_change() {
        let config = OrfConfig { min_similarity: 2.0, ..OrfConfig::default() };
        let input = distributions();

        let prediction = predict_ratings(&train(), &unknown(), &similarities(), &input,
            &quantizer(), &config, 2).unwrap();

        assert_eq!(prediction.distributions, input);
        assert!((prediction.expectations.get(1, 1).unwrap() - 2.7).abs() < 1e-9);
        assert_eq!(prediction.most_likely.get(0, 0), Some(1.0));
    }

    #[test]
    fn observed_neighbours_pull_distributions() {
        let prediction = predict_ratings(&train(), &unknown(), &similarities(), &distributions(),
            &quantizer(), &OrfConfig::default(), 1).unwrap();

        // item 0 of user 0 is similar to the train cell (0, 2) at the highest level
        let smoothed = &prediction.distributions[&(0, 0)];
        assert!(smoothed[2] > 0.1);
        assert!(smoothed[0] < 0.6);
        assert!((smoothed.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        // neither (0, 1) nor (1, 1) has a neighbour above the cutoff
        assert_eq!(prediction.distributions[&(0, 1)], vec![0.2, 0.5, 0.3]);
        assert_eq!(prediction.distributions[&(1, 1)], vec![0.1, 0.1, 0.8]);
    }

    #[test]
    fn thread_count_does_not_change_the_result() {
        let single = predict_ratings(&train(), &unknown(), &similarities(), &distributions(),
            &quantizer(), &OrfConfig::default(), 1).unwrap();
        let parallel = predict_ratings(&train(), &unknown(), &similarities(), &distributions(),
            &quantizer(), &OrfConfig::default(), 4).unwrap();

        assert_eq!(single.distributions, parallel.distributions);
    }

    #[test]
    fn rejects_incomplete_inputs() {
        let mut partial = distributions();
        partial.remove(&(0, 1));
        assert!(predict_ratings(&train(), &unknown(), &similarities(), &partial,
            &quantizer(), &OrfConfig::default(), 1).is_err());

        let too_small = DenseMatrix::zeros(2, 2);
        assert!(predict_ratings(&train(), &unknown(), &too_small, &distributions(),
            &quantizer(), &OrfConfig::default(), 1).is_err());
    }
}
