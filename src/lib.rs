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

//! Offline evaluation of rating prediction and top-n recommendation methods, with ordinal
//! post-processing of latent factor scores (OMF) and smoothing over item similarities (ORF).

extern crate csv;
extern crate fnv;
extern crate num_cpus;
extern crate rand;
extern crate rand_xorshift;
extern crate scoped_pool;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;

pub mod baselines;
pub mod config;
pub mod dataset;
pub mod dense;
pub mod errors;
pub mod evaluation;
pub mod experiment;
pub mod factorization;
pub mod io;
pub mod knn;
pub mod ordinal;
pub mod preferences;
pub mod rating_matrix;
pub mod similarity;
pub mod smoothing;
pub mod stats;
pub mod types;
pub mod utils;

#[cfg(test)]
mod usage_tests;

pub use crate::config::Config;
pub use crate::errors::{Error, Result};
pub use crate::experiment::{Experiment, Report};
pub use crate::ordinal::{OrdinalPrediction, OrdinalStage};
pub use crate::preferences::PreferenceRelations;
pub use crate::rating_matrix::RatingMatrix;
pub use crate::types::Quantizer;
