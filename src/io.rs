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

use std::fs::File;
use std::io::prelude::*;
use std::io::{stdout, BufWriter};
use std::path::Path;

use crate::dense::DenseMatrix;
use crate::errors::{Error, Result};
use crate::experiment::Report;
use crate::stats::Renaming;
use crate::types::TopNItemsByUser;

/// A single line of a ratings file.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRating {
    pub user: String,
    pub item: String,
    pub rating: f64,
    pub timestamp: Option<u64>,
}

/// Reads a tab separated file. We expect NO headers.
pub fn csv_reader<P: AsRef<Path>>(file: P) -> Result<csv::Reader<File>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .flexible(true)
        .from_path(file)?;

    Ok(reader)
}

/// Parses `user, item, rating[, timestamp]` records, e.g. the MovieLens `u.data` format.
pub fn ratings_from_csv<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<RawRating>> {
    let mut ratings = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = index + 1;

        if record.len() < 3 {
            return Err(Error::Parse {
                line,
                message: format!("expected at least 3 fields, found {}", record.len()),
            });
        }

        let rating: f64 = record[2].trim().parse()
            .map_err(|_| Error::Parse { line, message: format!("invalid rating '{}'", &record[2]) })?;

        let timestamp: Option<u64> = match record.get(3) {
            Some(field) if !field.trim().is_empty() => Some(field.trim().parse()
                .map_err(|_| Error::Parse { line, message: format!("invalid timestamp '{}'", field) })?),
            _ => None,
        };

        ratings.push(RawRating {
            user: record[0].trim().to_owned(),
            item: record[1].trim().to_owned(),
            rating,
            timestamp,
        });
    }

    Ok(ratings)
}

pub fn read_ratings<P: AsRef<Path>>(file: P) -> Result<Vec<RawRating>> {
    let mut reader = csv_reader(file)?;
    ratings_from_csv(&mut reader)
}

/// Reads a dense matrix with one tab separated row per line.
pub fn read_dense_matrix<P: AsRef<Path>>(file: P) -> Result<DenseMatrix> {
    let mut reader = csv_reader(file)?;
    let mut rows = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row = record.iter()
            .map(|field| field.trim().parse::<f64>().map_err(|_| Error::Parse {
                line: index + 1,
                message: format!("invalid value '{}'", field),
            }))
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    DenseMatrix::from_rows(rows)
}

pub fn write_dense_matrix<P: AsRef<Path>>(matrix: &DenseMatrix, file: P) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(file)?;

    for row in 0..matrix.num_rows() {
        writer.write_record(matrix.row(row).iter().map(|value| value.to_string()))?;
    }
    writer.flush()?;

    Ok(())
}

fn output(path: Option<&str>) -> Result<Box<dyn Write>> {
    let out: Box<dyn Write> = match path {
        Some(path) => Box::new(BufWriter::new(File::create(Path::new(path))?)),
        _ => Box::new(stdout()),
    };
    Ok(out)
}

/// Writes one JSON object per report. If a `reports_path` is supplied, we write to a file at the
/// specified path, otherwise, we output to stdout.
pub fn write_reports(reports: &[Report], reports_path: Option<&str>) -> Result<()> {
    let mut out = output(reports_path)?;

    for report in reports {
        writeln!(out, "{}", serde_json::to_string(report)?)?;
    }
    out.flush()?;

    Ok(())
}

/// Struct used for JSON serialization of computed recommendations. Field names will be used in
/// JSON.
#[derive(Serialize)]
struct Recommendations<'a> {
    for_user: &'a str,
    recommended_items: Vec<&'a str>,
}

/// Output the top-n items per user in JSON format, using the original identifiers from the
/// input file.
pub fn write_recommendations(
    top_n_items_by_user: &TopNItemsByUser,
    renaming: &Renaming,
    recommendations_path: Option<&str>,
) -> Result<()> {
    let mut out = output(recommendations_path)?;

    for (user_index, items) in top_n_items_by_user.iter().enumerate() {
        if items.is_empty() {
            continue;
        }

        let recommendations = Recommendations {
            for_user: renaming.user_name(user_index as u32),
            recommended_items: items.iter().map(|item| renaming.item_name(*item)).collect(),
        };

        writeln!(out, "{}", serde_json::to_string(&recommendations)?)?;
    }
    out.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {

    use std::io::Write;

    use super::{ratings_from_csv, read_dense_matrix, write_dense_matrix};
    use crate::dense::DenseMatrix;

    fn reader(data: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(data.as_bytes())
    }

    #[test]
    fn parses_movielens_lines() {
        let mut lines = reader("196\t242\t3\t881250949\n186\t302\t3.5\n");
        let ratings = ratings_from_csv(&mut lines).unwrap();

        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].user, "196");
        assert_eq!(ratings[0].item, "242");
        assert_eq!(ratings[0].rating, 3.0);
        assert_eq!(ratings[0].timestamp, Some(881250949));
        assert_eq!(ratings[1].rating, 3.5);
        assert_eq!(ratings[1].timestamp, None);
    }

    #[test]
    fn reports_malformed_lines() {
        let mut bad = reader("196\t242\tgood\n");
        assert!(ratings_from_csv(&mut bad).is_err());

        let mut short = reader("196\t242\n");
        assert!(ratings_from_csv(&mut short).is_err());
    }

    #[test]
    fn dense_matrix_cache_round_trip() {
        let matrix = DenseMatrix::from_rows(vec![
            vec![1.0, -0.25, 0.0],
            vec![-0.25, 1.0, 0.5],
            vec![0.0, 0.5, 1.0],
        ]).unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        write_dense_matrix(&matrix, file.path()).unwrap();

        assert_eq!(read_dense_matrix(file.path()).unwrap(), matrix);
    }

    #[test]
    fn ragged_matrix_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "1\t2\n3\n").unwrap();
        file.flush().unwrap();

        assert!(read_dense_matrix(file.path()).is_err());
    }
}
