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

//! Prepares the data shared by all methods once, then runs and evaluates the methods on it.
//!
//! `Experiment::prepare` builds the numerical context (train/test split, the cells to predict,
//! relevant items and rating similarities). `with_ordinal` adds the preference relations of the
//! train set and their similarities, which the preference-based and ordinal methods need.

use std::path::Path;
use std::time::Instant;

use log::info;

use crate::baselines;
use crate::config::Config;
use crate::dataset::{self, Split};
use crate::dense::DenseMatrix;
use crate::errors::{ensure_same_shape, Error, Result};
use crate::evaluation;
use crate::factorization::{pref_nmf, Scorer, TrainingData};
use crate::io;
use crate::knn;
use crate::ordinal::{OrdinalPrediction, OrdinalStage};
use crate::preferences::{PreferenceRelations, EQUALLY_PREFERRED, LESS_PREFERRED, PREFERRED};
use crate::rating_matrix::RatingMatrix;
use crate::similarity;
use crate::smoothing;
use crate::stats::{DataDictionary, Renaming};
use crate::types::{Quantizer, RelevantItemsByUser, TopNItemsByUser};
use crate::utils;

/// Evaluation results of a single method. RMSE and MAE are only reported for methods that
/// predict on the rating scale.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub method: String,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    /// NDCG at cutoffs 1 to `top_n` of the expected values (or plain predictions).
    pub ndcg: Vec<f64>,
    /// NDCG at cutoffs 1 to `top_n` of the most likely levels, ordinal smoothing only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ndcg_most_likely: Vec<f64>,
    pub elapsed_ms: u64,
}

pub struct NumericalContext {
    pub train: RatingMatrix,
    pub test: RatingMatrix,
    /// 0/1 mask of the test cells, the cells every method predicts.
    pub unknown: RatingMatrix,
    pub relevant_items: RelevantItemsByUser,
    pub user_similarities: DenseMatrix,
    pub item_similarities: DenseMatrix,
    pub data_dict: DataDictionary,
}

pub struct OrdinalContext {
    pub relations: PreferenceRelations,
    pub user_similarities: DenseMatrix,
    /// Pearson correlations of the items over the train positions.
    pub item_similarities: DenseMatrix,
}

pub struct Experiment {
    config: Config,
    quantizer: Quantizer,
    numerical: NumericalContext,
    ordinal: Option<OrdinalContext>,
}

impl Experiment {

    /// Reads and splits the dataset named in the config.
    pub fn prepare(config: Config) -> Result<Experiment> {
        info!("Reading ratings from {}", config.dataset.path);
        let ratings = io::read_ratings(&config.dataset.path)?;
        let split = dataset::split_by_count(&ratings, &config.dataset)?;
        Experiment::from_split(config, split)
    }

    pub fn from_split(config: Config, split: Split) -> Result<Experiment> {
        let quantizer = config.quantizer()?;
        let Split { train, test, data_dict } = split;
        ensure_same_shape(train.shape(), test.shape())?;

        let unknown = test.indexes_of_non_zero_elements();
        let relevant_items = evaluation::relevant_items_by_user(&test, config.relevance_threshold);

        let num_threads = config.num_threads;
        let user_similarities = cached_similarities(
            config.cache.user_similarities_of_rating.as_ref().map(String::as_str),
            config.cache.load, config.cache.save, (train.num_users(), train.num_users()),
            || similarity::pearson_of_rows(&train, num_threads))?;

        let item_similarities = cached_similarities(
            config.cache.item_similarities_of_rating.as_ref().map(String::as_str),
            config.cache.load, config.cache.save, (train.num_items(), train.num_items()),
            || similarity::pearson_of_columns(&train, num_threads))?;

        let numerical = NumericalContext {
            train,
            test,
            unknown,
            relevant_items,
            user_similarities,
            item_similarities,
            data_dict,
        };

        Ok(Experiment { config, quantizer, numerical, ordinal: None })
    }

    /// Builds the preference relations of the train ratings and their similarities.
    pub fn with_ordinal(self) -> Result<Experiment> {
        let start = Instant::now();
        let num_threads = self.config.num_threads;
        let (num_users, num_items) = self.numerical.train.shape();
        let cache = &self.config.cache;

        let relations = PreferenceRelations::create_discrete(&self.numerical.train);

        let user_similarities = cached_similarities(
            cache.user_similarities_of_pref.as_ref().map(String::as_str),
            cache.load, cache.save, (num_users, num_users),
            || similarity::cosine_of_pref_relations(&relations, num_threads))?;

        let item_similarities = cached_similarities(
            cache.item_similarities_of_pref.as_ref().map(String::as_str),
            cache.load, cache.save, (num_items, num_items),
            || similarity::pearson_of_columns(&relations.position_matrix(), num_threads))?;

        info!("Prepared {} preference relations in {}ms",
            relations.num_relations(), utils::to_millis(start.elapsed()));

        let ordinal = OrdinalContext { relations, user_similarities, item_similarities };
        Ok(Experiment { ordinal: Some(ordinal), ..self })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn numerical(&self) -> &NumericalContext {
        &self.numerical
    }

    pub fn ordinal(&self) -> Option<&OrdinalContext> {
        self.ordinal.as_ref()
    }

    pub fn into_renaming(self) -> Renaming {
        Renaming::from(self.numerical.data_dict)
    }

    fn require_ordinal(&self, stage: &'static str) -> Result<&OrdinalContext> {
        self.ordinal.as_ref().ok_or(Error::NotReady { stage })
    }

    fn training_data(&self) -> TrainingData<'_> {
        TrainingData {
            ratings: &self.numerical.train,
            relations: self.ordinal.as_ref().map(|ordinal| &ordinal.relations),
        }
    }

    /// The unknown cells merged with a 0/1 mask of the train cells.
    fn all_cells(&self) -> Result<RatingMatrix> {
        self.numerical.unknown.merge_non_overlap(&self.numerical.train.indexes_of_non_zero_elements())
    }

    /// Predicts every unknown cell with the given factor model.
    pub fn predict(&self, scorer: &Scorer) -> Result<RatingMatrix> {
        scorer.predict(self.training_data(), &self.numerical.unknown)
    }

    pub fn top_n(&self, predicted: &RatingMatrix) -> TopNItemsByUser {
        evaluation::top_n_items_by_user(predicted, self.config.top_n)
    }

    fn ndcg_curve(&self, predicted: &RatingMatrix) -> Vec<f64> {
        let top_n = self.top_n(predicted);
        evaluation::ndcg_curve(&self.numerical.relevant_items, &top_n, self.config.top_n)
    }

    fn report(
        &self,
        method: &str,
        predicted: &RatingMatrix,
        on_rating_scale: bool,
        start: Instant,
    ) -> Result<Report> {
        let elapsed_ms = utils::to_millis(start.elapsed());

        let (rmse, mae) = if on_rating_scale {
            (Some(evaluation::rmse(&self.numerical.test, predicted)?),
             Some(evaluation::mae(&self.numerical.test, predicted)?))
        } else {
            (None, None)
        };

        let report = Report {
            method: method.to_owned(),
            rmse,
            mae,
            ndcg: self.ndcg_curve(predicted),
            ndcg_most_likely: Vec::new(),
            elapsed_ms,
        };
        log_report(&report);

        Ok(report)
    }

    fn ordinal_report(
        &self,
        method: &str,
        prediction: &OrdinalPrediction,
        on_rating_scale: bool,
        start: Instant,
    ) -> Result<Report> {
        let mut report = self.report(method, &prediction.expectations, on_rating_scale, start)?;
        report.ndcg_most_likely = self.ndcg_curve(&prediction.most_likely);
        if let Some(last) = report.ndcg_most_likely.last() {
            info!("{}: NDCG@{} of the most likely levels {:.4}", method, self.config.top_n, last);
        }
        Ok(report)
    }

    pub fn run_global_mean(&self) -> Result<Report> {
        let start = Instant::now();
        let predicted = baselines::global_mean(&self.numerical.train, &self.numerical.unknown)?;
        let mut report = self.report("GlobalMean", &predicted, true, start)?;
        // a constant prediction carries no ranking
        report.ndcg.clear();
        Ok(report)
    }

    pub fn run_most_popular(&self) -> Result<Report> {
        let start = Instant::now();
        let predicted = baselines::most_popular(&self.numerical.train, &self.numerical.unknown)?;
        self.report("MostPopular", &predicted, false, start)
    }

    pub fn run_nmf(&self) -> Result<Report> {
        let start = Instant::now();
        let predicted = self.predict(&Scorer::Nmf(self.config.nmf.clone()))?;
        self.report("NMF", &predicted, true, start)
    }

    pub fn run_user_knn(&self) -> Result<Report> {
        let start = Instant::now();
        let predicted = knn::predict_ratings(&self.numerical.train, &self.numerical.unknown,
            &self.numerical.user_similarities, self.config.knn.neighbors, self.config.num_threads)?;
        self.report("UserKNN", &predicted, true, start)
    }

    pub fn run_pref_nmf(&self) -> Result<Report> {
        self.require_ordinal("PrefNMF")?;
        let start = Instant::now();
        let predicted = self.predict(&Scorer::PrefNmf(self.config.pref_nmf.clone()))?;
        self.report("PrefNMF", &predicted, false, start)
    }

    pub fn run_pref_knn(&self) -> Result<Report> {
        let ordinal = self.require_ordinal("PrefKNN")?;
        let start = Instant::now();
        let predicted = knn::predict_positions(&ordinal.relations, &self.numerical.unknown,
            &ordinal.user_similarities, self.config.knn.neighbors, self.config.num_threads)?;
        self.report("PrefKNN", &predicted, false, start)
    }

    /// Scores the train and unknown cells with `scorer`, then applies the ordinal `stage`. NMF
    /// scores are calibrated against the train ratings, PrefNMF scores are the positions of the
    /// predicted relations, calibrated against the quantized train positions.
    pub fn run_ordinal(&self, scorer: &Scorer, stage: &OrdinalStage)
        -> Result<(Report, OrdinalPrediction)> {

        let method = format!("{}-based {}", scorer.name(), stage.name());
        info!("Running {}", method);

        let start = Instant::now();
        let all_cells = self.all_cells()?;

        let (train_levels, scores, item_similarities) = match scorer {
            Scorer::Nmf(_) => {
                let scores = scorer.predict(self.training_data(), &all_cells)?;
                (self.numerical.train.clone(), scores, &self.numerical.item_similarities)
            }
            Scorer::PrefNmf(config) => {
                let ordinal = self.require_ordinal("PrefNMF-based ordinal prediction")?;
                let targets = PreferenceRelations::create_discrete(&all_cells);
                let predicted = pref_nmf::predict_pref_relations(&ordinal.relations, &targets, config)?;

                let scores = predicted
                    .quantization(0.0, 1.0, &relation_levels()?)
                    .position_matrix();
                (self.train_positions(ordinal), scores, &ordinal.item_similarities)
            }
        };

        let prediction = stage.predict(&train_levels, &self.numerical.unknown, &scores,
            item_similarities, &self.quantizer, self.config.num_threads)?;

        let on_rating_scale = match scorer {
            Scorer::Nmf(_) => true,
            Scorer::PrefNmf(_) => false,
        };
        let report = match stage {
            OrdinalStage::Omf(_) => self.report(&method, &prediction.expectations, on_rating_scale, start)?,
            OrdinalStage::Orf(_, _) => self.ordinal_report(&method, &prediction, on_rating_scale, start)?,
        };

        Ok((report, prediction))
    }

    pub fn run_nmf_based_omf(&self) -> Result<(Report, OrdinalPrediction)> {
        self.run_ordinal(&Scorer::Nmf(self.config.nmf.clone()), &OrdinalStage::Omf(self.config.omf.clone()))
    }

    pub fn run_pref_nmf_based_omf(&self) -> Result<(Report, OrdinalPrediction)> {
        self.require_ordinal("PrefNMF-based OMF")?;
        self.run_ordinal(&Scorer::PrefNmf(self.config.pref_nmf.clone()),
            &OrdinalStage::Omf(self.config.omf.clone()))
    }

    /// Smooths the distributions of an earlier NMF-based OMF run over the rating item
    /// similarities.
    pub fn run_nmf_based_orf(&self, calibrated: &OrdinalPrediction) -> Result<Report> {
        let start = Instant::now();
        let prediction = smoothing::predict_ratings(&self.numerical.train, &self.numerical.unknown,
            &self.numerical.item_similarities, &calibrated.distributions, &self.quantizer,
            &self.config.orf, self.config.num_threads)?;
        self.ordinal_report("NMF-based ORF", &prediction, true, start)
    }

    /// Smooths the distributions of an earlier PrefNMF-based OMF run over the preference item
    /// similarities, with the quantized train positions as observed levels.
    pub fn run_pref_nmf_based_orf(&self, calibrated: &OrdinalPrediction) -> Result<Report> {
        let ordinal = self.require_ordinal("PrefNMF-based ORF")?;
        let start = Instant::now();
        let prediction = smoothing::predict_ratings(&self.train_positions(ordinal),
            &self.numerical.unknown, &ordinal.item_similarities, &calibrated.distributions,
            &self.quantizer, &self.config.orf, self.config.num_threads)?;
        self.ordinal_report("PrefNMF-based ORF", &prediction, false, start)
    }

    fn train_positions(&self, ordinal: &OrdinalContext) -> RatingMatrix {
        ordinal.relations.position_matrix()
            .quantization(self.quantizer.min(), self.quantizer.range(), &self.quantizer)
    }
}

fn relation_levels() -> Result<Quantizer> {
    Quantizer::new(vec![LESS_PREFERRED, EQUALLY_PREFERRED, PREFERRED])
}

fn log_report(report: &Report) {
    match (report.rmse, report.mae) {
        (Some(rmse), Some(mae)) =>
            info!("{}: RMSE {:.4}, MAE {:.4} ({}ms)", report.method, rmse, mae, report.elapsed_ms),
        _ => info!("{} ({}ms)", report.method, report.elapsed_ms),
    }
    for (cutoff, ndcg) in report.ndcg.iter().enumerate() {
        info!("{}: NDCG@{} {:.4}", report.method, cutoff + 1, ndcg);
    }
}

/// Loads a similarity matrix from `path` if asked to and the file exists, otherwise computes it
/// and optionally writes it to `path`.
fn cached_similarities<F>(
    path: Option<&str>,
    load: bool,
    save: bool,
    shape: (usize, usize),
    compute: F,
) -> Result<DenseMatrix> where F: FnOnce() -> DenseMatrix {

    if let Some(path) = path {
        if load && Path::new(path).exists() {
            let similarities = io::read_dense_matrix(path)?;
            ensure_same_shape(shape, similarities.shape())?;
            info!("Loaded {}x{} similarities from {}", shape.0, shape.1, path);
            return Ok(similarities);
        }
    }

    let similarities = compute();

    if let Some(path) = path {
        if save {
            io::write_dense_matrix(&similarities, path)?;
            info!("Saved similarities to {}", path);
        }
    }

    Ok(similarities)
}

#[cfg(test)]
mod tests {

    use super::Experiment;
    use crate::config::Config;
    use crate::dataset::Split;
    use crate::dense::DenseMatrix;
    use crate::errors::Error;
    use crate::io;
    use crate::rating_matrix::RatingMatrix;
    use crate::stats::DataDictionary;

    fn split() -> Split {
        let mut data_dict = DataDictionary::new();
        for user in 0..3 {
            for item in 0..4 {
                data_dict.add(&user.to_string(), &item.to_string());
            }
        }

        let train = RatingMatrix::from_triplets(3, 4, vec![
            (0, 0, 5.0), (0, 1, 3.0), (1, 0, 4.0), (1, 2, 2.0), (2, 1, 4.0), (2, 3, 1.0),
        ]).unwrap();
        let test = RatingMatrix::from_triplets(3, 4, vec![
            (0, 2, 5.0), (1, 3, 1.0), (2, 0, 5.0),
        ]).unwrap();

        Split { train, test, data_dict }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.num_threads = 2;
        config.top_n = 2;
        config.nmf.factors = 2;
        config.pref_nmf.factors = 2;
        config
    }

    #[test]
    fn ordinal_runs_need_preferences() {
        let experiment = Experiment::from_split(config(), split()).unwrap();

        for result in vec![experiment.run_pref_nmf(), experiment.run_pref_knn()] {
            match result {
                Err(Error::NotReady { .. }) => {}
                other => panic!("expected NotReady, got {:?}", other.map(|report| report.method)),
            }
        }
        assert!(matches!(experiment.run_pref_nmf_based_omf(), Err(Error::NotReady { .. })));
    }

    #[test]
    fn omf_distributions_feed_orf() {
        let experiment = Experiment::from_split(config(), split()).unwrap().with_ordinal().unwrap();

        let (report, calibrated) = experiment.run_nmf_based_omf().unwrap();
        assert_eq!(calibrated.distributions.len(), 3);
        assert!(report.rmse.is_some());
        assert_eq!(report.ndcg.len(), 2);

        let smoothed = experiment.run_nmf_based_orf(&calibrated).unwrap();
        assert_eq!(smoothed.ndcg_most_likely.len(), 2);

        let (pref_report, pref_calibrated) = experiment.run_pref_nmf_based_omf().unwrap();
        assert!(pref_report.rmse.is_none());
        assert_eq!(pref_calibrated.expectations.num_ratings(), 3);
        assert!(experiment.run_pref_nmf_based_orf(&pref_calibrated).is_ok());
    }

    #[test]
    fn preference_similarities_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let users_path = dir.path().join("user_similarities_of_pref.tsv");
        let items_path = dir.path().join("item_similarities_of_pref.tsv");

        let mut saving = config();
        saving.cache.user_similarities_of_pref = Some(users_path.to_string_lossy().into_owned());
        saving.cache.item_similarities_of_pref = Some(items_path.to_string_lossy().into_owned());
        saving.cache.save = true;

        let computed = Experiment::from_split(saving.clone(), split()).unwrap()
            .with_ordinal().unwrap();
        assert!(users_path.exists());
        assert!(items_path.exists());

        /* A loaded file wins over recomputing, so overwrite it with something recognizable. */
        let identity = DenseMatrix::from_rows(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ]).unwrap();
        io::write_dense_matrix(&identity, &users_path).unwrap();

        let mut loading = saving;
        loading.cache.save = false;
        loading.cache.load = true;

        let loaded = Experiment::from_split(loading, split()).unwrap().with_ordinal().unwrap();
        let loaded = loaded.ordinal().unwrap();
        let computed = computed.ordinal().unwrap();

        assert_eq!(loaded.user_similarities, identity);
        assert_eq!(loaded.item_similarities, computed.item_similarities);
    }

    #[test]
    fn cached_similarities_must_match_the_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_similarities_of_pref.tsv");
        io::write_dense_matrix(&DenseMatrix::zeros(2, 2), &path).unwrap();

        let mut config = config();
        config.cache.user_similarities_of_pref = Some(path.to_string_lossy().into_owned());
        config.cache.load = true;

        let experiment = Experiment::from_split(config, split()).unwrap();
        assert!(matches!(experiment.with_ordinal(), Err(Error::ShapeMismatch { .. })));
    }
}
