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

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while preparing or running an experiment. Numerical failures are
/// never retried, they indicate a bad learning rate or regularization for the data at hand.
#[derive(Debug, Error)]
pub enum Error {
    /// A stage was invoked before the data it depends on was prepared.
    #[error("{stage} requires preference relations, prepare the experiment with with_ordinal() first")]
    NotReady { stage: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A parameter became NaN or infinite during training.
    #[error("{stage} diverged in epoch {epoch}, try a smaller learning rate or more regularization")]
    Divergence { stage: &'static str, epoch: usize },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Fails with a shape mismatch unless both shapes agree.
pub fn ensure_same_shape(expected: (usize, usize), found: (usize, usize)) -> Result<()> {
    if expected != found {
        return Err(Error::ShapeMismatch { expected, found });
    }
    Ok(())
}
