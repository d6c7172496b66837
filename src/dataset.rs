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

use fnv::{FnvHashMap, FnvHashSet};
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use crate::config::DatasetConfig;
use crate::errors::{Error, Result};
use crate::io::RawRating;
use crate::rating_matrix::RatingMatrix;
use crate::stats::DataDictionary;

/// Train and test ratings over the same users and items, with disjoint cells per user.
pub struct Split {
    pub train: RatingMatrix,
    pub test: RatingMatrix,
    pub data_dict: DataDictionary,
}

/// Keeps the users with at least `min_ratings` ratings and puts the first `train_count` ratings
/// of each of them into the train set, the remaining ones into the test set. Ratings are visited
/// in file order unless `shuffle` is set, in which case each user's ratings are shuffled with a
/// generator seeded by `seed`. Repeated (user, item) pairs keep their first rating.
pub fn split_by_count(ratings: &[RawRating], config: &DatasetConfig) -> Result<Split> {

    if config.train_count == 0 || config.train_count >= config.min_ratings {
        return Err(Error::InvalidConfiguration(format!(
            "train_count ({}) must be positive and smaller than min_ratings ({})",
            config.train_count, config.min_ratings)));
    }

    let mut user_order: Vec<&str> = Vec::new();
    let mut ratings_by_user: FnvHashMap<&str, Vec<&RawRating>> = FnvHashMap::default();
    let mut seen: FnvHashSet<(&str, &str)> = FnvHashSet::default();
    let mut num_duplicates = 0;

    for rating in ratings {
        if !seen.insert((rating.user.as_str(), rating.item.as_str())) {
            num_duplicates += 1;
            continue;
        }

        let user_ratings = ratings_by_user.entry(rating.user.as_str()).or_insert_with(|| {
            user_order.push(rating.user.as_str());
            Vec::new()
        });
        user_ratings.push(rating);
    }

    if num_duplicates > 0 {
        warn!("Ignored {} repeated ratings of the same item by the same user", num_duplicates);
    }

    let mut rng = XorShiftRng::seed_from_u64(config.seed);
    let mut data_dict = DataDictionary::new();
    let mut train_triplets = Vec::new();
    let mut test_triplets = Vec::new();

    for user in user_order {
        let user_ratings = ratings_by_user.get_mut(user)
            .ok_or_else(|| Error::InvalidConfiguration(format!("lost ratings of user {}", user)))?;

        if user_ratings.len() < config.min_ratings {
            continue;
        }

        if config.shuffle {
            user_ratings.shuffle(&mut rng);
        }

        for (position, rating) in user_ratings.iter().enumerate() {
            let (user_index, item_index) = data_dict.add(&rating.user, &rating.item);
            if position < config.train_count {
                train_triplets.push((user_index, item_index, rating.rating));
            } else {
                test_triplets.push((user_index, item_index, rating.rating));
            }
        }
    }

    let num_users = data_dict.num_users();
    let num_items = data_dict.num_items();

    if num_users == 0 {
        return Err(Error::InvalidConfiguration(format!(
            "no user has at least {} ratings", config.min_ratings)));
    }

    let train = RatingMatrix::from_triplets(num_users, num_items, train_triplets)?;
    let test = RatingMatrix::from_triplets(num_users, num_items, test_triplets)?;

    info!("{}", train.brief("Train set"));
    info!("{}", test.brief("Test set"));

    Ok(Split { train, test, data_dict })
}
