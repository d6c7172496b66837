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

//! Experiment settings. Every field has a default, so a JSON config only needs to name what it
//! changes, e.g. `{"nmf": {"factors": 20}, "top_n": 5}`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::errors::Result;
use crate::types::Quantizer;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    /// Test ratings at or above this value make an item relevant for a user.
    pub relevance_threshold: f64,
    pub top_n: usize,
    pub quantizer: Vec<f64>,
    pub num_threads: usize,
    pub nmf: NmfConfig,
    pub pref_nmf: PrefNmfConfig,
    pub omf: OmfConfig,
    pub orf: OrfConfig,
    pub knn: KnnConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dataset: DatasetConfig::default(),
            relevance_threshold: 5.0,
            top_n: 10,
            quantizer: vec![1.0, 2.0, 3.0, 4.0, 5.0],
            num_threads: num_cpus::get(),
            nmf: NmfConfig::default(),
            pref_nmf: PrefNmfConfig::default(),
            omf: OmfConfig::default(),
            orf: OrfConfig::default(),
            knn: KnnConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let reader = BufReader::new(File::open(path)?);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    pub fn quantizer(&self) -> Result<Quantizer> {
        Quantizer::new(self.quantizer.clone())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: String,
    /// Users with fewer ratings are dropped.
    pub min_ratings: usize,
    /// Ratings per user that go into the train set, the rest is test.
    pub train_count: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        DatasetConfig {
            path: String::from("u.data"),
            min_ratings: 60,
            train_count: 50,
            shuffle: false,
            seed: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NmfConfig {
    pub max_epoch: usize,
    pub learn_rate: f64,
    pub regularization: f64,
    pub factors: usize,
    pub seed: u64,
}

impl Default for NmfConfig {
    fn default() -> Self {
        NmfConfig { max_epoch: 100, learn_rate: 0.01, regularization: 0.05, factors: 10, seed: 1 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefNmfConfig {
    pub max_epoch: usize,
    pub learn_rate: f64,
    pub user_regularization: f64,
    pub item_regularization: f64,
    pub factors: usize,
    pub seed: u64,
}

impl Default for PrefNmfConfig {
    fn default() -> Self {
        PrefNmfConfig {
            max_epoch: 10,
            learn_rate: 0.1,
            user_regularization: 0.05,
            item_regularization: 0.05,
            factors: 10,
            seed: 1,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OmfConfig {
    pub max_epoch: usize,
    pub learn_rate: f64,
    /// Pulls the thresholds of each user towards the shared initialization.
    pub regularization: f64,
}

impl Default for OmfConfig {
    fn default() -> Self {
        OmfConfig { max_epoch: 50, learn_rate: 0.05, regularization: 0.01 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OrfConfig {
    /// Weight of the similar-item neighbours relative to the calibrated distribution.
    pub regularization: f64,
    /// Damping of each relaxation step, 1.0 replaces a distribution by its target.
    pub learn_rate: f64,
    pub min_similarity: f64,
    pub max_epoch: usize,
    pub tolerance: f64,
}

impl Default for OrfConfig {
    fn default() -> Self {
        OrfConfig {
            regularization: 1.0,
            learn_rate: 1.0,
            min_similarity: 0.1,
            max_epoch: 10,
            tolerance: 1e-6,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnConfig {
    pub neighbors: usize,
}

impl Default for KnnConfig {
    fn default() -> Self {
        KnnConfig { neighbors: 50 }
    }
}

/// Optional files for the similarity matrices, which are the slowest part of the setup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub user_similarities_of_rating: Option<String>,
    pub item_similarities_of_rating: Option<String>,
    pub user_similarities_of_pref: Option<String>,
    pub item_similarities_of_pref: Option<String>,
    pub save: bool,
    pub load: bool,
}

#[cfg(test)]
mod tests {

    use super::Config;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"nmf": {"factors": 3}, "top_n": 5}"#).unwrap();

        assert_eq!(config.nmf.factors, 3);
        assert_eq!(config.nmf.max_epoch, 100);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.dataset.min_ratings, 60);
        assert!(config.quantizer().is_ok());
    }

    #[test]
    fn invalid_quantizer_is_reported() {
        let config: Config = serde_json::from_str(r#"{"quantizer": [3.0, 1.0]}"#).unwrap();
        assert!(config.quantizer().is_err());
    }
}
