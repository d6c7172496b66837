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

#[cfg(test)]
mod tests {

    use crate::config::{Config, OrfConfig};
    use crate::dataset::{self, Split};
    use crate::errors::Error;
    use crate::experiment::Experiment;
    use crate::factorization::Scorer;
    use crate::io::RawRating;
    use crate::ordinal::OrdinalStage;
    use crate::rating_matrix::RatingMatrix;
    use crate::stats::DataDictionary;

    fn close_enough_to(value: f64, expected: f64) -> bool {
        (value - expected).abs() < 1e-9
    }

    /// Mean and population variance of the known cells.
    fn mean_and_variance(ratings: &RatingMatrix) -> (f64, f64) {
        let values: Vec<f64> = ratings.triplets().into_iter().map(|(_, _, value)| value).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>()
            / values.len() as f64;
        (mean, variance)
    }

    /// Ten users who rated all of five items, on a 1 to 5 scale.
    fn toy_ratings() -> Vec<RawRating> {
        let mut ratings = Vec::new();
        for user in 0..10 {
            for item in 0..5 {
                ratings.push(RawRating {
                    user: format!("user{}", user),
                    item: format!("item{}", item),
                    rating: (1 + (user * 3 + item * 2) % 5) as f64,
                    timestamp: None,
                });
            }
        }
        ratings
    }

    fn toy_config() -> Config {
        let mut config = Config::default();
        config.dataset.min_ratings = 5;
        config.dataset.train_count = 3;
        config.dataset.shuffle = true;
        config.top_n = 2;
        config.num_threads = 2;
        config.nmf.factors = 2;
        config.nmf.max_epoch = 100;
        config.nmf.seed = 42;
        config.pref_nmf.factors = 2;
        config
    }

    fn toy_experiment() -> Experiment {
        let config = toy_config();
        let split = dataset::split_by_count(&toy_ratings(), &config.dataset).unwrap();
        Experiment::from_split(config, split).unwrap()
    }

    #[test]
    fn programmatic_usage() {

        /* The ratings are split per user: the first `train_count` ratings of every user with at
           least `min_ratings` ratings are used for training, the rest for testing. */
        let config = toy_config();
        let split = dataset::split_by_count(&toy_ratings(), &config.dataset).unwrap();

        assert_eq!(split.train.num_ratings(), 30);
        assert_eq!(split.test.num_ratings(), 20);

        let train_mean = split.train.global_mean();
        let (test_mean, test_variance) = mean_and_variance(&split.test);

        /* The experiment computes everything the methods share once: the cells to predict, the
           relevant items of every user and the rating similarities. */
        let experiment = Experiment::from_split(config, split).unwrap();

        let global_mean = experiment.run_global_mean().unwrap();
        let nmf = experiment.run_nmf().unwrap();
        let most_popular = experiment.run_most_popular().unwrap();

        /* No constant prediction beats the standard deviation of the test ratings. The squared
           error of the train mean is that variance plus the squared shift between the means. */
        let rmse = global_mean.rmse.unwrap();
        assert!(rmse >= test_variance.sqrt() - 1e-12);
        let shift = test_mean - train_mean;
        assert!(close_enough_to(rmse * rmse, test_variance + shift * shift));
        assert!(global_mean.mae.unwrap() <= rmse);

        assert!(nmf.rmse.unwrap().is_finite());
        assert_eq!(nmf.ndcg.len(), 2);
        assert!(most_popular.rmse.is_none());

        for report in vec![global_mean, nmf, most_popular] {
            println!("{}", serde_json::to_string(&report).unwrap());
        }

        /* Preference relations are only built on request, the ordinal methods need them. */
        let experiment = experiment.with_ordinal().unwrap();
        let (omf, calibrated) = experiment.run_nmf_based_omf().unwrap();
        let orf = experiment.run_nmf_based_orf(&calibrated).unwrap();

        println!("{}", serde_json::to_string(&omf).unwrap());
        println!("{}", serde_json::to_string(&orf).unwrap());
    }

    #[test]
    fn nmf_results_are_reproducible() {
        let first = toy_experiment().run_nmf().unwrap();
        let second = toy_experiment().run_nmf().unwrap();

        assert_eq!(first.rmse, second.rmse);
        assert_eq!(first.mae, second.mae);
        assert_eq!(first.ndcg, second.ndcg);
    }

    #[test]
    fn ordinal_methods_need_preference_relations() {
        let experiment = toy_experiment();

        match experiment.run_pref_nmf_based_omf() {
            Err(Error::NotReady { .. }) => {}
            Err(other) => panic!("expected NotReady, got {}", other),
            Ok(_) => panic!("expected NotReady"),
        }

        let scorer = Scorer::PrefNmf(experiment.config().pref_nmf.clone());
        let stage = OrdinalStage::Omf(experiment.config().omf.clone());
        assert!(matches!(experiment.run_ordinal(&scorer, &stage), Err(Error::NotReady { .. })));

        /* NMF based OMF only needs the ratings. */
        assert!(experiment.run_nmf_based_omf().is_ok());
    }

    #[test]
    fn smoothing_without_similar_items_keeps_the_calibration() {
        let experiment = toy_experiment();
        let scorer = Scorer::Nmf(experiment.config().nmf.clone());
        let omf = experiment.config().omf.clone();
        let orf = OrfConfig { min_similarity: 2.0, ..experiment.config().orf.clone() };

        let (_, calibrated) = experiment.run_ordinal(&scorer, &OrdinalStage::Omf(omf.clone()))
            .unwrap();
        let (_, smoothed) = experiment.run_ordinal(&scorer, &OrdinalStage::Orf(omf, orf)).unwrap();

        assert_eq!(calibrated.distributions, smoothed.distributions);
        assert_eq!(calibrated.expectations.triplets(), smoothed.expectations.triplets());
        assert_eq!(calibrated.most_likely.triplets(), smoothed.most_likely.triplets());
    }

    #[test]
    fn users_without_relevant_items_do_not_count_for_ndcg() {
        let mut data_dict = DataDictionary::new();
        for &(user, item) in [("a", "x"), ("a", "y"), ("b", "x"), ("b", "z")].iter() {
            data_dict.add(user, item);
        }

        let train = RatingMatrix::from_triplets(2, 3, vec![(0, 0, 4.0), (1, 0, 3.0)]).unwrap();
        /* a rated y at 5, which is relevant, b's only test rating is below the threshold */
        let test = RatingMatrix::from_triplets(2, 3, vec![(0, 1, 5.0), (1, 2, 2.0)]).unwrap();

        let mut config = toy_config();
        config.top_n = 1;
        let experiment = Experiment::from_split(config, Split { train, test, data_dict }).unwrap();

        assert!(experiment.numerical().relevant_items[&1].is_empty());

        let report = experiment.run_most_popular().unwrap();

        /* a's only candidate is relevant, b is excluded instead of counting as zero */
        assert!(close_enough_to(report.ndcg[0], 1.0));
    }
}
