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

//! Latent factor models trained with stochastic gradient descent, either on ratings (`nmf`) or on
//! pairwise preference relations (`pref_nmf`).

use rand::Rng;

use crate::config::{NmfConfig, PrefNmfConfig};
use crate::dense::DenseMatrix;
use crate::errors::{Error, Result};
use crate::preferences::PreferenceRelations;
use crate::rating_matrix::RatingMatrix;
use crate::utils;

pub mod nmf;
pub mod pref_nmf;

/// Learned user and item factors, one row per entity.
#[derive(Clone, Debug)]
pub struct FactorModel {
    pub user_factors: DenseMatrix,
    pub item_factors: DenseMatrix,
}

impl FactorModel {

    fn random<R, F>(num_users: usize, num_items: usize, num_factors: usize, rng: &mut R, init: F)
        -> FactorModel where R: Rng, F: Fn(&mut R) -> f64 {

        let mut user_factors = DenseMatrix::zeros(num_users, num_factors);
        let mut item_factors = DenseMatrix::zeros(num_items, num_factors);

        for user in 0..num_users {
            for factor in user_factors.row_mut(user).iter_mut() {
                *factor = init(rng);
            }
        }
        for item in 0..num_items {
            for factor in item_factors.row_mut(item).iter_mut() {
                *factor = init(rng);
            }
        }

        FactorModel { user_factors, item_factors }
    }

    pub fn num_factors(&self) -> usize {
        self.user_factors.num_cols()
    }

    pub fn score(&self, user: u32, item: u32) -> f64 {
        utils::dot(self.user_factors.row(user as usize), self.item_factors.row(item as usize))
    }

    /// Predicted score for every known cell of `targets`.
    pub fn fill(&self, targets: &RatingMatrix) -> RatingMatrix {
        let mut predicted = RatingMatrix::new(targets.num_users(), targets.num_items());
        for (user, item, _) in targets.triplets() {
            predicted.insert(user, item, self.score(user, item));
        }
        predicted
    }

    fn is_finite(&self) -> bool {
        utils::all_finite(self.user_factors.values()) && utils::all_finite(self.item_factors.values())
    }

    fn ensure_finite(&self, stage: &'static str, epoch: usize) -> Result<()> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(Error::Divergence { stage, epoch })
        }
    }
}

fn ensure_factors(num_factors: usize) -> Result<()> {
    if num_factors == 0 {
        return Err(Error::InvalidConfiguration(String::from("factor count must be positive")));
    }
    Ok(())
}

/// What a scorer may train on: the train ratings, and preference relations once they are built.
#[derive(Clone, Copy)]
pub struct TrainingData<'a> {
    pub ratings: &'a RatingMatrix,
    pub relations: Option<&'a PreferenceRelations>,
}

/// The latent factor predictors, selected explicitly by the caller.
#[derive(Clone, Debug)]
pub enum Scorer {
    Nmf(NmfConfig),
    PrefNmf(PrefNmfConfig),
}

impl Scorer {

    pub fn name(&self) -> &'static str {
        match self {
            Scorer::Nmf(_) => "NMF",
            Scorer::PrefNmf(_) => "PrefNMF",
        }
    }

    /// Trains on `data` and predicts every known cell of `targets`.
    pub fn predict(&self, data: TrainingData, targets: &RatingMatrix) -> Result<RatingMatrix> {
        match self {
            Scorer::Nmf(config) => nmf::predict_ratings(data.ratings, targets, config),
            Scorer::PrefNmf(config) => {
                let relations = data.relations.ok_or(Error::NotReady { stage: "PrefNMF" })?;
                pref_nmf::predict_ratings(relations, targets, config)
            }
        }
    }
}
