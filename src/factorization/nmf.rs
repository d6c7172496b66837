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
use crate::config::NmfConfig;
use crate::errors::{ensure_same_shape, Error, Result};
use crate::rating_matrix::RatingMatrix;
use crate::utils;

const STAGE: &str = "NMF";

/// Non-negative matrix factorization of the train ratings. Factors start uniformly in
/// [0, 1/sqrt(F)) and are clipped at zero after every update. Runs for exactly `max_epoch`
/// epochs.
pub fn train(ratings: &RatingMatrix, config: &NmfConfig) -> Result<FactorModel> {
    ensure_factors(config.factors)?;

    let mut rng = XorShiftRng::seed_from_u64(config.seed);
    let scale = 1.0 / (config.factors as f64).sqrt();

    let mut model = FactorModel::random(
        ratings.num_users(), ratings.num_items(), config.factors, &mut rng,
        |rng| rng.gen::<f64>() * scale);

    let cells = ratings.triplets();
    let learn_rate = config.learn_rate;
    let regularization = config.regularization;
    let start = Instant::now();

    for epoch in 0..config.max_epoch {
        let mut squared_error = 0.0;

        for &(user, item, rating) in cells.iter() {
            let user_row = model.user_factors.row_mut(user as usize);
            let item_row = model.item_factors.row_mut(item as usize);

            let error = rating - utils::dot(user_row, item_row);
            if !error.is_finite() {
                return Err(Error::Divergence { stage: STAGE, epoch });
            }
            squared_error += error * error;

            for factor in 0..user_row.len() {
                let user_value = user_row[factor];
                let item_value = item_row[factor];

                let updated_user = user_value + learn_rate * (error * item_value - regularization * user_value);
                let updated_item = item_value + learn_rate * (error * user_value - regularization * item_value);

                if !updated_user.is_finite() || !updated_item.is_finite() {
                    return Err(Error::Divergence { stage: STAGE, epoch });
                }

                user_row[factor] = if updated_user < 0.0 { 0.0 } else { updated_user };
                item_row[factor] = if updated_item < 0.0 { 0.0 } else { updated_item };
            }
        }

        model.ensure_finite(STAGE, epoch)?;

        if !cells.is_empty() {
            debug!("NMF epoch {}: train RMSE {:.4}", epoch, (squared_error / cells.len() as f64).sqrt());
        }
    }

    info!("Trained NMF with {} factors for {} epochs in {}ms",
        config.factors, config.max_epoch, utils::to_millis(start.elapsed()));

    Ok(model)
}

/// Trains on `ratings` and predicts the dot product of the factors for every known cell of
/// `unknown`. Predictions are not clipped to the rating range.
pub fn predict_ratings(
    ratings: &RatingMatrix,
    unknown: &RatingMatrix,
    config: &NmfConfig,
) -> Result<RatingMatrix> {
    ensure_same_shape(ratings.shape(), unknown.shape())?;
    let model = train(ratings, config)?;
    Ok(model.fill(unknown))
}
