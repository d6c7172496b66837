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

use crate::errors::{ensure_same_shape, Result};
use crate::rating_matrix::RatingMatrix;

/// Every unknown cell gets the mean of all train ratings.
pub fn global_mean(train: &RatingMatrix, unknown: &RatingMatrix) -> Result<RatingMatrix> {
    ensure_same_shape(train.shape(), unknown.shape())?;
    Ok(unknown.indexes_of_non_zero_elements().scale(train.global_mean()))
}

/// Every unknown cell gets the mean train rating of its item.
pub fn most_popular(train: &RatingMatrix, unknown: &RatingMatrix) -> Result<RatingMatrix> {
    ensure_same_shape(train.shape(), unknown.shape())?;

    let item_means = train.item_means();
    let mut predicted = RatingMatrix::new(unknown.num_users(), unknown.num_items());
    for (user, item, _) in unknown.triplets() {
        predicted.insert(user, item, item_means[item as usize]);
    }
    Ok(predicted)
}

#[cfg(test)]
mod tests {

    use super::{global_mean, most_popular};
    use crate::rating_matrix::RatingMatrix;

    #[test]
    fn baselines_fill_the_unknown_cells() {
        let train = RatingMatrix::from_triplets(2, 3, vec![(0, 0, 5.0), (1, 0, 3.0), (1, 1, 1.0)])
            .unwrap();
        let unknown = RatingMatrix::from_triplets(2, 3, vec![(0, 1, 1.0), (0, 2, 1.0)]).unwrap();

        let mean = global_mean(&train, &unknown).unwrap();
        assert_eq!(mean.get(0, 1), Some(3.0));
        assert_eq!(mean.num_ratings(), 2);

        let popular = most_popular(&train, &unknown).unwrap();
        assert_eq!(popular.get(0, 1), Some(1.0));
        // item 2 has no train ratings
        assert_eq!(popular.get(0, 2), Some(3.0));
    }
}
