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

extern crate env_logger;
extern crate getopts;
extern crate log;
extern crate ordrec;

use std::env;
use std::error::Error;
use std::process;

use getopts::Options;
use log::{info, warn};

use ordrec::factorization::Scorer;
use ordrec::{io, Config, Experiment, OrdinalPrediction, OrdinalStage, Report};

const METHODS: &[&str] = &[
    "global-mean", "most-popular", "nmf", "user-knn", "pref-nmf", "pref-knn",
    "nmf-omf", "pref-nmf-omf", "nmf-orf", "pref-nmf-orf",
];

const DEFAULT_METHODS: &str = "global-mean,most-popular,nmf,user-knn";

fn main() {

    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    opts.optopt("i", "inputfile", "Input file name (optional, overrides the dataset path of the \
        config). The input must contain a user, an item and a rating per line, separated by tabs, \
        optionally followed by a timestamp.", "PATH");
    opts.optopt("c", "config", "Experiment configuration in JSON (optional, every setting has a \
        default).", "PATH");
    opts.optopt("o", "outputfile", "Output file name for the reports (optional, output will be \
        written to stdout by default).", "PATH");
    opts.optopt("m", "methods", &format!("Comma separated list of methods to run (optional, \
        defaults to {}). Available: {}.", DEFAULT_METHODS, METHODS.join(", ")), "LIST");
    opts.optopt("r", "recommendations", "Write the top-n NMF recommendations of every user to \
        this file (optional).", "PATH");
    opts.optflag("h", "help", "Print this help menu");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    let methods: Vec<String> = matches.opt_str("m")
        .unwrap_or_else(|| DEFAULT_METHODS.to_owned())
        .split(',')
        .map(|method| method.trim().to_owned())
        .filter(|method| !method.is_empty())
        .collect();

    if let Some(unknown) = methods.iter().find(|method| !METHODS.contains(&method.as_str())) {
        let hint = format!("Unknown method '{}'.", unknown);
        return print_usage_and_exit(&program, opts, Some(&hint));
    }

    let result = run_experiment(
        matches.opt_str("c"),
        matches.opt_str("i"),
        &methods,
        matches.opt_str("o"),
        matches.opt_str("r"),
    );

    if let Err(failure) = result {
        eprintln!("{}", failure);
        process::exit(1);
    }
}

fn print_usage_and_exit(
    program: &str,
    opts: Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));
}

fn run_experiment(
    config_path: Option<String>,
    ratings_path: Option<String>,
    methods: &[String],
    reports_path: Option<String>,
    recommendations_path: Option<String>,
) -> Result<(), Box<dyn Error>> {

    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(path) = ratings_path {
        config.dataset.path = path;
    }

    let needs_ordinal = methods.iter().any(|method| method.starts_with("pref") || method.ends_with("orf"));

    let mut experiment = Experiment::prepare(config)?;
    if needs_ordinal {
        experiment = experiment.with_ordinal()?;
    }

    let mut reports: Vec<Report> = Vec::with_capacity(methods.len());
    let mut nmf_calibration: Option<OrdinalPrediction> = None;
    let mut pref_nmf_calibration: Option<OrdinalPrediction> = None;

    for method in methods {
        info!("Running {}", method);

        let report = match method.as_str() {
            "global-mean" => experiment.run_global_mean()?,
            "most-popular" => experiment.run_most_popular()?,
            "nmf" => experiment.run_nmf()?,
            "user-knn" => experiment.run_user_knn()?,
            "pref-nmf" => experiment.run_pref_nmf()?,
            "pref-knn" => experiment.run_pref_knn()?,
            "nmf-omf" => {
                let (report, calibrated) = experiment.run_nmf_based_omf()?;
                nmf_calibration = Some(calibrated);
                report
            }
            "pref-nmf-omf" => {
                let (report, calibrated) = experiment.run_pref_nmf_based_omf()?;
                pref_nmf_calibration = Some(calibrated);
                report
            }
            "nmf-orf" => match nmf_calibration {
                Some(ref calibrated) => experiment.run_nmf_based_orf(calibrated)?,
                None => run_orf(&experiment, Scorer::Nmf(experiment.config().nmf.clone()))?,
            },
            "pref-nmf-orf" => match pref_nmf_calibration {
                Some(ref calibrated) => experiment.run_pref_nmf_based_orf(calibrated)?,
                None => run_orf(&experiment, Scorer::PrefNmf(experiment.config().pref_nmf.clone()))?,
            },
            other => {
                warn!("Skipping unknown method {}", other);
                continue;
            }
        };

        reports.push(report);
    }

    io::write_reports(&reports, reports_path.as_ref().map(String::as_str))?;

    if let Some(path) = recommendations_path {
        let predicted = experiment.predict(&Scorer::Nmf(experiment.config().nmf.clone()))?;
        let top_n = experiment.top_n(&predicted);

        // Build reverse index, make sure we consume the experiment
        let renaming = experiment.into_renaming();

        info!("Writing recommendations to {}", path);
        io::write_recommendations(&top_n, &renaming, Some(path.as_str()))?;
    }

    Ok(())
}

/// Calibrates and smooths in one go when no calibration of the same scorer was computed before.
fn run_orf(experiment: &Experiment, scorer: Scorer) -> Result<Report, Box<dyn Error>> {
    let stage = OrdinalStage::Orf(experiment.config().omf.clone(), experiment.config().orf.clone());
    let (report, _) = experiment.run_ordinal(&scorer, &stage)?;
    Ok(report)
}
