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

use crate::rating_matrix::RatingMatrix;
use crate::types::Quantizer;

pub const PREFERRED: f64 = 1.0;
pub const EQUALLY_PREFERRED: f64 = 0.5;
pub const LESS_PREFERRED: f64 = 0.0;

/// Discrete reading of a relation value, `a` compared to `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Preferred,
    EquallyPreferred,
    LessPreferred,
}

impl Relation {

    pub fn from_value(value: f64) -> Relation {
        match value.partial_cmp(&EQUALLY_PREFERRED) {
            Some(Ordering::Greater) => Relation::Preferred,
            Some(Ordering::Less) => Relation::LessPreferred,
            _ => Relation::EquallyPreferred,
        }
    }
}

/// Dense relation block over the rated items of one user. `values[a * n + b]` holds how much the
/// user prefers `items[a]` over `items[b]`, the diagonal is never read.
#[derive(Clone, Debug, Default)]
pub struct UserRelations {
    items: Vec<u32>,
    values: Vec<f64>,
}

impl UserRelations {

    pub(crate) fn new(items: Vec<u32>, values: Vec<f64>) -> Self {
        debug_assert_eq!(items.len() * items.len(), values.len());
        UserRelations { items, values }
    }

    pub fn items(&self) -> &[u32] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn index_of(&self, item: u32) -> Option<usize> {
        self.items.binary_search(&item).ok()
    }

    /// Relation value between the `a`-th and `b`-th item of this user.
    pub fn at(&self, a: usize, b: usize) -> f64 {
        self.values[a * self.items.len() + b]
    }

    /// All pairs `a < b` of positions into `items()` with the value of `a` compared to `b`.
    pub fn upper_pairs<'a>(&'a self) -> impl Iterator<Item=(usize, usize, f64)> + 'a {
        let n = self.items.len();
        (0..n).flat_map(move |a| ((a + 1)..n).map(move |b| (a, b, self.at(a, b))))
    }
}

/// Pairwise preference relations per user, derived from ratings or predicted by a model.
/// Pairs involving an item the user did not rate are not materialized.
#[derive(Clone, Debug)]
pub struct PreferenceRelations {
    num_users: usize,
    num_items: usize,
    users: Vec<UserRelations>,
}

impl PreferenceRelations {

    pub(crate) fn from_users(num_users: usize, num_items: usize, users: Vec<UserRelations>) -> Self {
        debug_assert_eq!(users.len(), num_users);
        PreferenceRelations { num_users, num_items, users }
    }

    /// Compares every pair of items a user rated: a higher rating means preferred, equal ratings
    /// mean equally preferred.
    pub fn create_discrete(ratings: &RatingMatrix) -> PreferenceRelations {
        let users = (0..ratings.num_users() as u32)
            .map(|user| {
                let items = ratings.items_of(user);
                let user_ratings = ratings.user_ratings(user);
                let n = items.len();

                let mut values = vec![EQUALLY_PREFERRED; n * n];
                for a in 0..n {
                    let rating_a = user_ratings[&items[a]];
                    for b in 0..n {
                        if a != b {
                            let rating_b = user_ratings[&items[b]];
                            values[a * n + b] = discrete_value(rating_a, rating_b);
                        }
                    }
                }

                UserRelations::new(items, values)
            })
            .collect();

        PreferenceRelations::from_users(ratings.num_users(), ratings.num_items(), users)
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_users, self.num_items)
    }

    pub fn users(&self) -> &[UserRelations] {
        &self.users
    }

    pub fn items_of(&self, user: u32) -> &[u32] {
        self.users[user as usize].items()
    }

    /// Number of materialized ordered pairs, the diagonal excluded.
    pub fn num_relations(&self) -> usize {
        self.users.iter().map(|user| user.len() * user.len().saturating_sub(1)).sum()
    }

    /// How much `user` prefers item `a` over item `b`. `None` on the diagonal or when the user did
    /// not rate both items.
    pub fn relation(&self, user: u32, a: u32, b: u32) -> Option<f64> {
        if a == b {
            return None;
        }
        let relations = self.users.get(user as usize)?;
        let index_of_a = relations.index_of(a)?;
        let index_of_b = relations.index_of(b)?;

        Some(relations.at(index_of_a, index_of_b))
    }

    pub fn discrete_relation(&self, user: u32, a: u32, b: u32) -> Option<Relation> {
        self.relation(user, a, b).map(Relation::from_value)
    }

    /// Collapses the relations of every user into a per-item position in [0, 1]: the mean relation
    /// value of the item against all other items of that user. If `a` is preferred to `b`, the
    /// position of `a` is strictly higher. Users with a single item place it at 0.5.
    pub fn position_matrix(&self) -> RatingMatrix {
        let mut positions = RatingMatrix::new(self.num_users, self.num_items);

        for (user, relations) in self.users.iter().enumerate() {
            let n = relations.len();
            for a in 0..n {
                let position = if n == 1 {
                    EQUALLY_PREFERRED
                } else {
                    let wins: f64 = (0..n).filter(|&b| b != a).map(|b| relations.at(a, b)).sum();
                    wins / (n - 1) as f64
                };
                positions.insert(user as u32, relations.items[a], position);
            }
        }

        positions
    }

    /// Snaps every relation value to the nearest of `levels` after mapping it via
    /// `min + value * range`. For levels symmetric around 0.5 the lower triangle mirrors the upper
    /// one so the result stays antisymmetric.
    pub fn quantization(&self, min: f64, range: f64, levels: &Quantizer) -> PreferenceRelations {
        let symmetric = levels.levels().iter()
            .all(|level| levels.levels().iter().any(|other| (other - (1.0 - level)).abs() < 1e-12));

        let users = self.users.iter()
            .map(|relations| {
                let n = relations.len();
                let mut values = relations.values.clone();

                for a in 0..n {
                    for b in (a + 1)..n {
                        let upper = levels.nearest(min + relations.at(a, b) * range);
                        let lower = if symmetric {
                            1.0 - upper
                        } else {
                            levels.nearest(min + relations.at(b, a) * range)
                        };
                        values[a * n + b] = upper;
                        values[b * n + a] = lower;
                    }
                }

                UserRelations::new(relations.items.clone(), values)
            })
            .collect();

        PreferenceRelations::from_users(self.num_users, self.num_items, users)
    }
}

fn discrete_value(rating_a: f64, rating_b: f64) -> f64 {
    match rating_a.partial_cmp(&rating_b) {
        Some(Ordering::Greater) => PREFERRED,
        Some(Ordering::Less) => LESS_PREFERRED,
        _ => EQUALLY_PREFERRED,
    }
}

/// Checks `r(a, b) + r(b, a) = 1` for every materialized pair.
pub fn is_antisymmetric(relations: &PreferenceRelations) -> bool {
    relations.users().iter()
        .all(|user| user.upper_pairs().all(|(a, b, value)| (value + user.at(b, a) - 1.0).abs() < 1e-9))
}
