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

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use fnv::FnvHashSet;

use crate::errors::{ensure_same_shape, Result};
use crate::rating_matrix::RatingMatrix;
use crate::types::{RelevantItemsByUser, TopNItemsByUser};

/// An item with its predicted value. Orders by value, then prefers the lower item index, so that
/// the "largest" element of a min-heap of these is the one to evict first.
#[derive(PartialEq, Debug)]
struct ScoredItem {
    item: u32,
    score: f64,
}

impl Eq for ScoredItem {}

impl Ord for ScoredItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed on the score to get a min-heap, the higher item index ranks worse
        match other.score.partial_cmp(&self.score) {
            Some(Ordering::Equal) | None => self.item.cmp(&other.item),
            Some(ordering) => ordering,
        }
    }
}

impl PartialOrd for ScoredItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The `n` highest predicted items of every user, best first. Ties go to the smaller item index.
pub fn top_n_items_by_user(predicted: &RatingMatrix, n: usize) -> TopNItemsByUser {
    (0..predicted.num_users() as u32)
        .map(|user| {
            if n == 0 {
                return Vec::new();
            }

            let mut heap = BinaryHeap::with_capacity(n + 1);
            for (&item, &score) in predicted.user_ratings(user).iter() {
                let scored_item = ScoredItem { item, score };
                if heap.len() < n {
                    heap.push(scored_item);
                } else if let Some(mut worst) = heap.peek_mut() {
                    if scored_item < *worst {
                        *worst = scored_item;
                    }
                }
            }

            heap.into_sorted_vec().into_iter().map(|scored_item| scored_item.item).collect()
        })
        .collect()
}

/// For every user with test ratings, the items rated at least `threshold`. Users whose test items
/// are all below the threshold get an empty set.
pub fn relevant_items_by_user(test: &RatingMatrix, threshold: f64) -> RelevantItemsByUser {
    let mut relevant = RelevantItemsByUser::default();

    for (user, item, rating) in test.triplets() {
        let items = relevant.entry(user).or_insert_with(FnvHashSet::default);
        if rating >= threshold {
            items.insert(item);
        }
    }

    relevant
}

fn residuals<'a>(truth: &'a RatingMatrix, predicted: &'a RatingMatrix)
    -> impl Iterator<Item=f64> + 'a {
    truth.triplets().into_iter()
        .map(move |(user, item, rating)| rating - predicted.get(user, item).unwrap_or(0.0))
}

pub fn rmse(truth: &RatingMatrix, predicted: &RatingMatrix) -> Result<f64> {
    ensure_same_shape(truth.shape(), predicted.shape())?;
    if truth.num_ratings() == 0 {
        return Ok(0.0);
    }
    let squared: f64 = residuals(truth, predicted).map(|residual| residual * residual).sum();
    Ok((squared / truth.num_ratings() as f64).sqrt())
}

pub fn mae(truth: &RatingMatrix, predicted: &RatingMatrix) -> Result<f64> {
    ensure_same_shape(truth.shape(), predicted.shape())?;
    if truth.num_ratings() == 0 {
        return Ok(0.0);
    }
    let absolute: f64 = residuals(truth, predicted).map(f64::abs).sum();
    Ok(absolute / truth.num_ratings() as f64)
}

/// Binary relevance NDCG at `n`, averaged over the users with at least one relevant item.
pub fn ndcg(relevant: &RelevantItemsByUser, top_n: &TopNItemsByUser, n: usize) -> f64 {
    let mut total = 0.0;
    let mut num_users = 0;

    for (user, recommended) in top_n.iter().enumerate() {
        let relevant_items = match relevant.get(&(user as u32)) {
            Some(items) if !items.is_empty() => items,
            _ => continue,
        };

        let dcg: f64 = recommended.iter()
            .take(n)
            .enumerate()
            .filter(|&(_, item)| relevant_items.contains(item))
            .map(|(rank, _)| discount(rank))
            .sum();

        let ideal: f64 = (0..n.min(relevant_items.len())).map(discount).sum();

        if ideal > 0.0 {
            total += dcg / ideal;
        }
        num_users += 1;
    }

    if num_users == 0 {
        return 0.0;
    }
    total / num_users as f64
}

fn discount(rank: usize) -> f64 {
    1.0 / (rank as f64 + 2.0).log2()
}

/// NDCG at every cutoff from 1 to `n`.
pub fn ndcg_curve(relevant: &RelevantItemsByUser, top_n: &TopNItemsByUser, n: usize) -> Vec<f64> {
    (1..=n).map(|cutoff| ndcg(relevant, top_n, cutoff)).collect()
}

#[cfg(test)]
mod tests {

    use fnv::FnvHashSet;

    use super::{mae, ndcg, ndcg_curve, relevant_items_by_user, rmse, top_n_items_by_user};
    use crate::rating_matrix::RatingMatrix;
    use crate::types::RelevantItemsByUser;

    fn close_enough_to(value: f64, expected: f64) -> bool {
        (value - expected).abs() < 1e-9
    }

    #[test]
    fn top_n_orders_by_score_then_item() {
        let predicted = RatingMatrix::from_triplets(2, 5, vec![
            (0, 0, 3.0), (0, 1, 4.5), (0, 2, 4.5), (0, 3, 1.0), (0, 4, 4.5),
            (1, 3, 2.0),
        ]).unwrap();

        let top_n = top_n_items_by_user(&predicted, 3);

        assert_eq!(top_n[0], vec![1, 2, 4]);
        assert_eq!(top_n[1], vec![3]);

        assert_eq!(top_n_items_by_user(&predicted, 10)[0], vec![1, 2, 4, 0, 3]);
        assert!(top_n_items_by_user(&predicted, 0)[0].is_empty());
    }

    #[test]
    fn relevance_keeps_users_without_relevant_items() {
        let test = RatingMatrix::from_triplets(3, 3, vec![
            (0, 0, 5.0), (0, 1, 2.0), (1, 2, 3.0),
        ]).unwrap();

        let relevant = relevant_items_by_user(&test, 5.0);

        assert_eq!(relevant.len(), 2);
        assert!(relevant[&0].contains(&0));
        assert!(!relevant[&0].contains(&1));
        assert!(relevant[&1].is_empty());
        assert!(relevant.get(&2).is_none());
    }

    #[test]
    fn errors_count_missing_predictions_as_zero() {
        let truth = RatingMatrix::from_triplets(1, 3, vec![(0, 0, 4.0), (0, 1, 2.0)]).unwrap();
        let predicted = RatingMatrix::from_triplets(1, 3, vec![(0, 0, 3.0), (0, 2, 5.0)]).unwrap();

        assert!(close_enough_to(rmse(&truth, &predicted).unwrap(), (2.5f64).sqrt()));
        assert!(close_enough_to(mae(&truth, &predicted).unwrap(), 1.5));

        assert!(rmse(&truth, &RatingMatrix::new(2, 3)).is_err());
    }

    #[test]
    fn ndcg_ignores_items_beyond_the_cutoff() {
        let mut relevant = RelevantItemsByUser::default();
        relevant.insert(0, vec![7].into_iter().collect::<FnvHashSet<u32>>());

        let top_n = vec![vec![1, 2, 7]];

        assert!(close_enough_to(ndcg(&relevant, &top_n, 2), 0.0));
        assert!(close_enough_to(ndcg(&relevant, &top_n, 3), 0.5));

        let short = vec![vec![1, 7]];
        let padded = vec![vec![1, 7, 3, 4]];
        assert!(close_enough_to(ndcg(&relevant, &short, 2), ndcg(&relevant, &padded, 2)));
        assert!(close_enough_to(ndcg(&relevant, &padded, 2), 1.0 / 3f64.log2()));
    }

    #[test]
    fn ndcg_skips_users_without_relevant_items() {
        let mut relevant = RelevantItemsByUser::default();
        relevant.insert(0, vec![1, 2].into_iter().collect::<FnvHashSet<u32>>());
        relevant.insert(1, FnvHashSet::default());

        let top_n = vec![vec![1, 2], vec![5, 6], vec![8]];

        assert!(close_enough_to(ndcg(&relevant, &top_n, 2), 1.0));
        assert_eq!(ndcg_curve(&relevant, &top_n, 2), vec![1.0, 1.0]);
        assert_eq!(ndcg(&RelevantItemsByUser::default(), &top_n, 2), 0.0);
    }
}
