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

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use super::{ensure_factors, FactorModel};
use crate::config::PrefNmfConfig;
use crate::errors::{ensure_same_shape, Error, Result};
use crate::preferences::{PreferenceRelations, UserRelations};
use crate::rating_matrix::RatingMatrix;
use crate::utils;

const STAGE: &str = "PrefNMF";

/// Learns factors from pairwise preferences. For every pair `a < b` a user rated, the modelled
/// relation is `sigmoid(u . (v_a - v_b))` and the squared difference to the observed relation
/// value is minimized. Factors are unconstrained and start uniformly in [-0.5, 0.5)/sqrt(F).
pub fn train(relations: &PreferenceRelations, config: &PrefNmfConfig) -> Result<FactorModel> {
    ensure_factors(config.factors)?;

    let mut rng = XorShiftRng::seed_from_u64(config.seed);
    let scale = 1.0 / (config.factors as f64).sqrt();

    let mut model = FactorModel::random(
        relations.num_users(), relations.num_items(), config.factors, &mut rng,
        |rng| (rng.gen::<f64>() - 0.5) * scale);

    let learn_rate = config.learn_rate;
    let user_regularization = config.user_regularization;
    let item_regularization = config.item_regularization;

    let num_factors = config.factors;
    let mut difference = vec![0.0; num_factors];
    let mut user_copy = vec![0.0; num_factors];
    let num_pairs = relations.num_relations() / 2;
    let start = Instant::now();

    for epoch in 0..config.max_epoch {
        let mut squared_error = 0.0;

        for (user, user_relations) in relations.users().iter().enumerate() {
            let items = user_relations.items();

            for (a, b, target) in user_relations.upper_pairs() {
                let item_a = items[a] as usize;
                let item_b = items[b] as usize;

                for factor in 0..num_factors {
                    difference[factor] = model.item_factors.get(item_a, factor)
                        - model.item_factors.get(item_b, factor);
                }

                let user_row = model.user_factors.row_mut(user);
                let predicted = utils::sigmoid(utils::dot(user_row, &difference));
                let error = target - predicted;
                if !error.is_finite() {
                    return Err(Error::Divergence { stage: STAGE, epoch });
                }
                squared_error += error * error;

                let gradient = error * predicted * (1.0 - predicted);

                user_copy.copy_from_slice(user_row);
                for factor in 0..num_factors {
                    user_row[factor] += learn_rate
                        * (gradient * difference[factor] - user_regularization * user_copy[factor]);
                }

                let item_row_a = model.item_factors.row_mut(item_a);
                for factor in 0..num_factors {
                    item_row_a[factor] += learn_rate
                        * (gradient * user_copy[factor] - item_regularization * item_row_a[factor]);
                }

                let item_row_b = model.item_factors.row_mut(item_b);
                for factor in 0..num_factors {
                    item_row_b[factor] += learn_rate
                        * (-gradient * user_copy[factor] - item_regularization * item_row_b[factor]);
                }
            }
        }

        model.ensure_finite(STAGE, epoch)?;

        if num_pairs > 0 {
            debug!("PrefNMF epoch {}: relation RMSE {:.4}", epoch, (squared_error / num_pairs as f64).sqrt());
        }
    }

    info!("Trained PrefNMF with {} factors on {} preference pairs for {} epochs in {}ms",
        num_factors, num_pairs, config.max_epoch, utils::to_millis(start.elapsed()));

    Ok(model)
}

/// Trains on the relations and scores every known cell of `unknown` with `u . v`, a proxy for the
/// position of the item in the user's preference order.
pub fn predict_ratings(
    relations: &PreferenceRelations,
    unknown: &RatingMatrix,
    config: &PrefNmfConfig,
) -> Result<RatingMatrix> {
    ensure_same_shape(relations.shape(), unknown.shape())?;
    let model = train(relations, config)?;
    Ok(model.fill(unknown))
}

/// Trains on the relations and predicts the relations between all items that `targets` holds
/// for each user, as `sigmoid(u . (v_a - v_b))` in (0, 1).
pub fn predict_pref_relations(
    relations: &PreferenceRelations,
    targets: &PreferenceRelations,
    config: &PrefNmfConfig,
) -> Result<PreferenceRelations> {
    ensure_same_shape(relations.shape(), targets.shape())?;
    let model = train(relations, config)?;
    Ok(relations_of(&model, targets))
}

pub fn relations_of(model: &FactorModel, targets: &PreferenceRelations) -> PreferenceRelations {
    let users = targets.users().iter()
        .enumerate()
        .map(|(user, target_relations)| {
            let items = target_relations.items().to_vec();
            let n = items.len();
            let scores: Vec<f64> = items.iter()
                .map(|item| model.score(user as u32, *item))
                .collect();

            let mut values = vec![0.5; n * n];
            for a in 0..n {
                for b in 0..n {
                    if a != b {
                        values[a * n + b] = utils::sigmoid(scores[a] - scores[b]);
                    }
                }
            }

            UserRelations::new(items, values)
        })
        .collect();

    PreferenceRelations::from_users(targets.num_users(), targets.num_items(), users)
}

#[cfg(test)]
mod tests {

    use super::{predict_pref_relations, predict_ratings, train};
    use crate::config::PrefNmfConfig;
    use crate::errors::Error;
    use crate::preferences::{is_antisymmetric, PreferenceRelations};
    use crate::rating_matrix::RatingMatrix;

    fn ratings() -> RatingMatrix {
        RatingMatrix::from_triplets(4, 4, vec![
            (0, 0, 5.0), (0, 1, 3.0), (0, 2, 1.0),
            (1, 0, 4.0), (1, 1, 3.0), (1, 3, 1.0),
            (2, 0, 5.0), (2, 2, 2.0), (2, 3, 1.0),
            (3, 1, 5.0), (3, 2, 4.0), (3, 3, 2.0),
        ]).unwrap()
    }

    fn config() -> PrefNmfConfig {
        PrefNmfConfig {
            max_epoch: 300,
            learn_rate: 0.5,
            user_regularization: 0.001,
            item_regularization: 0.001,
            factors: 2,
            seed: 11,
        }
    }

    #[test]
    fn learns_the_observed_order() {
        let relations = PreferenceRelations::create_discrete(&ratings());
        let model = train(&relations, &config()).unwrap();

        assert!(model.score(0, 0) > model.score(0, 2));
        assert!(model.score(1, 0) > model.score(1, 3));
        assert!(model.score(3, 1) > model.score(3, 3));
    }

    #[test]
    fn predicted_relations_are_antisymmetric() {
        let matrix = ratings();
        let relations = PreferenceRelations::create_discrete(&matrix);
        let targets = PreferenceRelations::create_discrete(&matrix.indexes_of_non_zero_elements());

        let predicted = predict_pref_relations(&relations, &targets, &config()).unwrap();

        assert!(is_antisymmetric(&predicted));
        assert!(predicted.relation(0, 0, 2).unwrap() > 0.5);
        assert_eq!(predicted.num_relations(), targets.num_relations());
    }

    #[test]
    fn scores_unknown_cells() {
        let relations = PreferenceRelations::create_discrete(&ratings());
        let unknown = RatingMatrix::from_triplets(4, 4, vec![(0, 3, 1.0), (3, 0, 1.0)]).unwrap();

        let predicted = predict_ratings(&relations, &unknown, &config()).unwrap();

        assert_eq!(predicted.num_ratings(), 2);
        assert!(predicted.get(0, 3).unwrap().is_finite());
    }

    #[test]
    fn oscillating_regularization_diverges() {
        let relations = PreferenceRelations::create_discrete(&ratings());
        let mut diverging = config();
        diverging.learn_rate = 1000.0;
        diverging.user_regularization = 0.05;
        diverging.item_regularization = 0.05;

        match train(&relations, &diverging) {
            Err(Error::Divergence { stage, .. }) => assert_eq!(stage, "PrefNMF"),
            Err(other) => panic!("expected divergence, got {}", other),
            Ok(_) => panic!("expected divergence"),
        }
    }
}
