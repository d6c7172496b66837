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

use crate::errors::{Error, Result};

/// Row-major dense matrix, used for user-user and item-item similarities.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    num_rows: usize,
    num_cols: usize,
    values: Vec<f64>,
}

impl DenseMatrix {

    pub fn zeros(num_rows: usize, num_cols: usize) -> Self {
        DenseMatrix { num_rows, num_cols, values: vec![0.0; num_rows * num_cols] }
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let num_rows = rows.len();
        let num_cols = rows.first().map(|row| row.len()).unwrap_or(0);

        let mut values = Vec::with_capacity(num_rows * num_cols);
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != num_cols {
                return Err(Error::Parse {
                    line: index + 1,
                    message: format!("expected {} columns, found {}", num_cols, row.len()),
                });
            }
            values.extend(row);
        }

        Ok(DenseMatrix { num_rows, num_cols, values })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_cols)
    }

    #[inline(always)]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.num_cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row * self.num_cols..(row + 1) * self.num_cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.values[row * self.num_cols..(row + 1) * self.num_cols]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn rows_mut(&mut self) -> std::slice::ChunksMut<'_, f64> {
        self.values.chunks_mut(self.num_cols.max(1))
    }

    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn abs_sum(&self) -> f64 {
        self.values.iter().map(|value| value.abs()).sum()
    }
}

#[cfg(test)]
mod tests {

    use super::DenseMatrix;

    #[test]
    fn rows_must_have_equal_length() {
        assert!(DenseMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_err());

        let matrix = DenseMatrix::from_rows(vec![vec![1.0, -2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(matrix.shape(), (2, 2));
        assert_eq!(matrix.get(1, 0), 3.0);
        assert_eq!(matrix.row(0), &[1.0, -2.0]);
        assert_eq!(matrix.sum(), 6.0);
        assert_eq!(matrix.abs_sum(), 10.0);
    }
}
