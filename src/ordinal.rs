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

//! Ordinal matrix factorization (OMF): calibrates the continuous output of a scorer into a
//! probability distribution over the quantizer levels, with a cumulative logistic model per user.
//!
//! For user `u` with thresholds `t_0 < ... < t_{K-2}` and scale `b > 0`,
//! `P(y <= k | s) = sigmoid(b * (t_k - s))` and `P(y = k) = P(y <= k) - P(y <= k - 1)`.
//! Scores are first mapped onto [0, 1] using the range the scorer produced on the train cells.

use std::time::Instant;

use fnv::FnvHashMap;
use log::{debug, info};
use scoped_pool::Pool;

use crate::config::{OmfConfig, OrfConfig};
use crate::dense::DenseMatrix;
use crate::errors::{ensure_same_shape, Error, Result};
use crate::rating_matrix::RatingMatrix;
use crate::smoothing;
use crate::types::{OrdinalDistributions, Quantizer};
use crate::utils;

const STAGE: &str = "OMF";

/// Smallest distance between two consecutive thresholds after a gradient step.
pub const MIN_GAP: f64 = 1e-3;
/// Smallest admissible scale after a gradient step.
pub const MIN_SCALE: f64 = 1e-2;

const MIN_PROBABILITY: f64 = 1e-12;

/// Expected values, most likely levels and the full distributions of the predicted cells.
#[derive(Clone, Debug)]
pub struct OrdinalPrediction {
    pub expectations: RatingMatrix,
    pub most_likely: RatingMatrix,
    pub distributions: OrdinalDistributions,
}

impl OrdinalPrediction {

    pub fn from_distributions(
        num_users: usize,
        num_items: usize,
        distributions: OrdinalDistributions,
        quantizer: &Quantizer,
    ) -> OrdinalPrediction {
        let mut expectations = RatingMatrix::new(num_users, num_items);
        let mut most_likely = RatingMatrix::new(num_users, num_items);

        for (&(user, item), distribution) in distributions.iter() {
            expectations.insert(user, item, quantizer.expectation(distribution));
            most_likely.insert(user, item, quantizer.most_likely(distribution));
        }

        OrdinalPrediction { expectations, most_likely, distributions }
    }
}

/// Cumulative logistic link of a single user.
#[derive(Clone, Debug, PartialEq)]
pub struct Thresholds {
    pub thresholds: Vec<f64>,
    pub scale: f64,
}

impl Thresholds {

    /// Evenly spaced thresholds over [0, 1] for `num_levels` levels.
    pub fn uniform(num_levels: usize) -> Thresholds {
        let spacing = 1.0 / num_levels as f64;
        Thresholds {
            thresholds: (1..num_levels).map(|k| k as f64 * spacing).collect(),
            scale: 1.0 / spacing,
        }
    }

    fn cumulative(&self, k: usize, score: f64) -> f64 {
        utils::sigmoid(self.scale * (self.thresholds[k] - score))
    }

    /// Probability of every level for a normalized score.
    pub fn distribution(&self, score: f64) -> Vec<f64> {
        let num_levels = self.thresholds.len() + 1;
        let mut distribution = Vec::with_capacity(num_levels);
        let mut previous = 0.0;

        for k in 0..num_levels {
            let current = if k + 1 < num_levels { self.cumulative(k, score) } else { 1.0 };
            distribution.push((current - previous).max(0.0));
            previous = current;
        }

        normalize(&mut distribution);
        distribution
    }

    /// Mean negative log-likelihood of the true levels.
    pub fn loss(&self, cells: &[(f64, usize)]) -> f64 {
        if cells.is_empty() {
            return 0.0;
        }
        let total: f64 = cells.iter()
            .map(|&(score, level)| -self.distribution(score)[level].max(MIN_PROBABILITY).ln())
            .sum();
        total / cells.len() as f64
    }

    /// Forces `t_{k+1} >= t_k + MIN_GAP` and `scale >= MIN_SCALE`, walking the thresholds from
    /// the lowest one upwards.
    fn enforce_order(&mut self) {
        for k in 1..self.thresholds.len() {
            let lowest_allowed = self.thresholds[k - 1] + MIN_GAP;
            if self.thresholds[k] < lowest_allowed {
                self.thresholds[k] = lowest_allowed;
            }
        }
        if self.scale < MIN_SCALE {
            self.scale = MIN_SCALE;
        }
    }

    fn is_finite(&self) -> bool {
        self.scale.is_finite() && utils::all_finite(&self.thresholds)
    }

    pub fn is_strictly_increasing(&self) -> bool {
        self.thresholds.windows(2).all(|pair| pair[0] < pair[1])
    }
}

pub fn normalize(distribution: &mut [f64]) {
    let sum: f64 = distribution.iter().sum();
    if sum > 0.0 {
        for probability in distribution.iter_mut() {
            *probability /= sum;
        }
    } else {
        let uniform = 1.0 / distribution.len() as f64;
        for probability in distribution.iter_mut() {
            *probability = uniform;
        }
    }
}

/// Full-batch gradient descent on the mean negative log-likelihood of one user's train cells,
/// plus `regularization / 2 * |t - t_init|^2` on the thresholds.
pub fn fit_thresholds(
    cells: &[(f64, usize)],
    initial: &Thresholds,
    config: &OmfConfig,
) -> Result<Thresholds> {
    let mut current = initial.clone();
    if cells.is_empty() {
        return Ok(current);
    }

    let num_thresholds = current.thresholds.len();
    let mut threshold_gradients = vec![0.0; num_thresholds];

    for epoch in 0..config.max_epoch {
        for gradient in threshold_gradients.iter_mut() {
            *gradient = 0.0;
        }
        let mut scale_gradient = 0.0;

        for &(score, level) in cells.iter() {
            let scale = current.scale;

            let upper = if level < num_thresholds {
                let cumulative = current.cumulative(level, score);
                Some((cumulative, cumulative * (1.0 - cumulative), current.thresholds[level] - score))
            } else {
                None
            };
            let lower = if level > 0 {
                let cumulative = current.cumulative(level - 1, score);
                Some((cumulative, cumulative * (1.0 - cumulative), current.thresholds[level - 1] - score))
            } else {
                None
            };

            let upper_cumulative = upper.map(|(c, _, _)| c).unwrap_or(1.0);
            let lower_cumulative = lower.map(|(c, _, _)| c).unwrap_or(0.0);
            let probability = (upper_cumulative - lower_cumulative).max(MIN_PROBABILITY);

            if let Some((_, density, distance)) = upper {
                threshold_gradients[level] -= scale * density / probability;
                scale_gradient -= density * distance / probability;
            }
            if let Some((_, density, distance)) = lower {
                threshold_gradients[level - 1] += scale * density / probability;
                scale_gradient += density * distance / probability;
            }
        }

        let num_cells = cells.len() as f64;
        for k in 0..num_thresholds {
            let gradient = threshold_gradients[k] / num_cells
                + config.regularization * (current.thresholds[k] - initial.thresholds[k]);
            current.thresholds[k] -= config.learn_rate * gradient;
        }
        current.scale -= config.learn_rate * scale_gradient / num_cells;

        if !current.is_finite() {
            return Err(Error::Divergence { stage: STAGE, epoch });
        }
        current.enforce_order();
    }

    Ok(current)
}

/// Maps raw scores onto [0, 1] using the range seen on the train cells.
#[derive(Clone, Copy, Debug)]
struct Normalization {
    min: f64,
    range: f64,
}

impl Normalization {

    fn from_scores<I: Iterator<Item=f64>>(scores: I) -> Normalization {
        let (min, max) = scores.fold((std::f64::INFINITY, std::f64::NEG_INFINITY),
            |(min, max), score| (min.min(score), max.max(score)));

        if !min.is_finite() || !max.is_finite() || max - min <= 0.0 {
            let min = if min.is_finite() { min - 0.5 } else { 0.0 };
            return Normalization { min, range: 1.0 };
        }
        Normalization { min, range: max - min }
    }

    fn apply(&self, score: f64) -> f64 {
        (score - self.min) / self.range
    }
}

/// Calibrates `scorer` against the train levels. `train` holds the true values of the train
/// cells (ratings or quantized positions), `unknown` the cells to predict, and `scorer` a
/// continuous prediction that covers every unknown cell and ideally every train cell.
pub fn predict_ratings(
    train: &RatingMatrix,
    unknown: &RatingMatrix,
    scorer: &RatingMatrix,
    quantizer: &Quantizer,
    config: &OmfConfig,
    num_threads: usize,
) -> Result<OrdinalPrediction> {
    ensure_same_shape(train.shape(), unknown.shape())?;
    ensure_same_shape(train.shape(), scorer.shape())?;

    let start = Instant::now();
    let num_users = train.num_users();

    let mut cells_by_user: Vec<Vec<(f64, usize)>> = vec![Vec::new(); num_users];
    let mut num_uncovered = 0;
    for (user, item, value) in train.triplets() {
        match scorer.get(user, item) {
            Some(score) => cells_by_user[user as usize].push((score, quantizer.nearest_index(value))),
            None => num_uncovered += 1,
        }
    }
    if num_uncovered > 0 {
        debug!("{} train cells have no score and are left out of the calibration", num_uncovered);
    }

    let normalization = if cells_by_user.iter().any(|cells| !cells.is_empty()) {
        Normalization::from_scores(cells_by_user.iter().flat_map(|cells| cells.iter().map(|c| c.0)))
    } else {
        Normalization::from_scores(scorer.triplets().into_iter().map(|(_, _, score)| score))
    };

    for cells in cells_by_user.iter_mut() {
        for cell in cells.iter_mut() {
            cell.0 = normalization.apply(cell.0);
        }
    }

    let initial = Thresholds::uniform(quantizer.len());
    let mut fitted: Vec<Result<Thresholds>> = (0..num_users).map(|_| Ok(initial.clone())).collect();

    let pool = Pool::new(num_threads.max(1));
    pool.scoped(|scope| {
        for (slot, cells) in fitted.iter_mut().zip(cells_by_user.iter()) {
            let initial = &initial;
            scope.execute(move || {
                *slot = fit_thresholds(cells, initial, config);
            });
        }
    });
    pool.shutdown();

    let fitted = fitted.into_iter().collect::<Result<Vec<Thresholds>>>()?;

    let mut distributions: OrdinalDistributions =
        FnvHashMap::with_capacity_and_hasher(unknown.num_ratings(), Default::default());

    for (user, item, _) in unknown.triplets() {
        let score = scorer.get(user, item).ok_or_else(|| Error::InvalidConfiguration(format!(
            "the scorer has no prediction for unknown cell ({}, {})", user, item)))?;
        let distribution = fitted[user as usize].distribution(normalization.apply(score));
        distributions.insert((user, item), distribution);
    }

    let train_loss: f64 = fitted.iter().zip(cells_by_user.iter())
        .map(|(thresholds, cells)| thresholds.loss(cells) * cells.len() as f64)
        .sum::<f64>() / (train.num_ratings() - num_uncovered).max(1) as f64;

    info!("Calibrated {} users over {} levels in {}ms, train NLL {:.4}",
        num_users, quantizer.len(), utils::to_millis(start.elapsed()), train_loss);

    Ok(OrdinalPrediction::from_distributions(
        train.num_users(), train.num_items(), distributions, quantizer))
}

/// The ordinal post-processing applied on top of a scorer.
#[derive(Clone, Debug)]
pub enum OrdinalStage {
    Omf(OmfConfig),
    /// OMF followed by smoothing over the item similarities.
    Orf(OmfConfig, OrfConfig),
}

impl OrdinalStage {

    pub fn name(&self) -> &'static str {
        match self {
            OrdinalStage::Omf(_) => "OMF",
            OrdinalStage::Orf(_, _) => "ORF",
        }
    }

    pub fn predict(
        &self,
        train: &RatingMatrix,
        unknown: &RatingMatrix,
        scorer: &RatingMatrix,
        item_similarities: &DenseMatrix,
        quantizer: &Quantizer,
        num_threads: usize,
    ) -> Result<OrdinalPrediction> {
        match self {
            OrdinalStage::Omf(omf) =>
                predict_ratings(train, unknown, scorer, quantizer, omf, num_threads),
            OrdinalStage::Orf(omf, orf) => {
                let calibrated = predict_ratings(train, unknown, scorer, quantizer, omf, num_threads)?;
                smoothing::predict_ratings(train, unknown, item_similarities,
                    &calibrated.distributions, quantizer, orf, num_threads)
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::{fit_thresholds, predict_ratings, Thresholds, MIN_GAP, MIN_SCALE};
    use crate::config::OmfConfig;
    use crate::errors::Error;
    use crate::rating_matrix::RatingMatrix;
    use crate::types::{arg_max, Quantizer};

    fn quantizer() -> Quantizer {
        Quantizer::new(vec![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap()
    }

    fn train() -> RatingMatrix {
        RatingMatrix::from_triplets(2, 6, vec![
            (0, 0, 5.0), (0, 1, 4.0), (0, 2, 2.0), (0, 3, 1.0),
            (1, 0, 4.0), (1, 1, 3.0), (1, 2, 3.0),
        ]).unwrap()
    }

    fn unknown() -> RatingMatrix {
        RatingMatrix::from_triplets(2, 6, vec![
            (0, 4, 1.0), (0, 5, 1.0), (1, 3, 1.0), (1, 4, 1.0), (1, 5, 1.0),
        ]).unwrap()
    }

    /// A scorer that is a noisy copy of the truth on train cells.
    fn scorer() -> RatingMatrix {
        RatingMatrix::from_triplets(2, 6, vec![
            (0, 0, 4.6), (0, 1, 4.1), (0, 2, 2.2), (0, 3, 1.3), (0, 4, 4.9), (0, 5, 1.1),
            (1, 0, 4.2), (1, 1, 3.1), (1, 2, 2.8), (1, 3, 1.0), (1, 4, 3.5), (1, 5, 5.2),
        ]).unwrap()
    }

    #[test]
    fn distributions_are_normalized_and_consistent() {
        let prediction =
            predict_ratings(&train(), &unknown(), &scorer(), &quantizer(), &OmfConfig::default(), 2)
                .unwrap();

        assert_eq!(prediction.distributions.len(), 5);

        for (&(user, item), distribution) in prediction.distributions.iter() {
            assert_eq!(distribution.len(), 5);
            let sum: f64 = distribution.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
            assert!(distribution.iter().all(|p| *p >= 0.0));

            let most_likely = prediction.most_likely.get(user, item).unwrap();
            assert_eq!(most_likely, quantizer().level(arg_max(distribution)));

            let expectation = prediction.expectations.get(user, item).unwrap();
            assert!(expectation >= 1.0 && expectation <= 5.0);
        }

        // only unknown cells are predicted
        assert_eq!(prediction.expectations.num_ratings(), 5);
        assert!(!prediction.expectations.contains(0, 0));
    }

    #[test]
    fn higher_scores_mean_higher_expectations() {
        let prediction =
            predict_ratings(&train(), &unknown(), &scorer(), &quantizer(), &OmfConfig::default(), 1)
                .unwrap();

        assert!(prediction.expectations.get(0, 4).unwrap() > prediction.expectations.get(0, 5).unwrap());
        assert!(prediction.expectations.get(1, 5).unwrap() > prediction.expectations.get(1, 3).unwrap());
    }

    #[test]
    fn fitting_lowers_the_loss_and_keeps_the_order() {
        let cells = vec![(0.1, 0), (0.15, 0), (0.3, 1), (0.5, 2), (0.55, 2), (0.7, 3), (0.95, 4)];
        let initial = Thresholds::uniform(5);
        let config = OmfConfig { max_epoch: 500, learn_rate: 0.01, regularization: 0.0 };

        let fitted = fit_thresholds(&cells, &initial, &config).unwrap();

        assert!(fitted.loss(&cells) < initial.loss(&cells));
        assert!(fitted.is_strictly_increasing());
    }

    #[test]
    fn exploding_thresholds_are_reported() {
        let cells = vec![(0.1, 0), (0.3, 1), (0.5, 2), (0.7, 3), (0.95, 4)];
        let config = OmfConfig { max_epoch: 10, learn_rate: 1e300, regularization: 1e10 };

        match fit_thresholds(&cells, &Thresholds::uniform(5), &config) {
            Err(Error::Divergence { stage, .. }) => assert_eq!(stage, "OMF"),
            Err(other) => panic!("expected Divergence, got {}", other),
            Ok(thresholds) => panic!("expected Divergence, got {:?}", thresholds),
        }
    }

    #[test]
    fn clamping_restores_the_order() {
        let mut thresholds = Thresholds { thresholds: vec![0.5, 0.2, 0.2], scale: -1.0 };
        thresholds.enforce_order();

        assert!(thresholds.is_strictly_increasing());
        assert!(thresholds.thresholds[1] - thresholds.thresholds[0] >= MIN_GAP - 1e-12);
        assert_eq!(thresholds.thresholds[0], 0.5);
        assert_eq!(thresholds.scale, MIN_SCALE);
    }

    #[test]
    fn scorer_must_cover_unknown_cells() {
        let partial = RatingMatrix::from_triplets(2, 6, vec![(0, 4, 3.0)]).unwrap();
        assert!(predict_ratings(&train(), &unknown(), &partial, &quantizer(),
            &OmfConfig::default(), 1).is_err());

        let wrong_shape = RatingMatrix::new(2, 7);
        assert!(predict_ratings(&train(), &unknown(), &wrong_shape, &quantizer(),
            &OmfConfig::default(), 1).is_err());
    }
}
