//! Per-feature standardization to zero mean and unit variance.

use crate::config::DegeneratePolicy;

/// Standard deviations at or below this are treated as zero.
const DEGENERATE_STD: f64 = 1e-12;

/// Fitted per-column mean and population standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit column statistics over row-major `rows` of equal width.
    ///
    /// Returns `None` for an empty input.
    pub fn fit(rows: &[Vec<f64>]) -> Option<Self> {
        let dim = rows.first()?.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; dim];
        for row in rows {
            for (m, &x) in means.iter_mut().zip(row) {
                *m += x;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut stds = vec![0.0; dim];
        for row in rows {
            for ((s, &x), &m) in stds.iter_mut().zip(row).zip(&means) {
                *s += (x - m) * (x - m);
            }
        }
        stds.iter_mut().for_each(|s| *s = (*s / n).sqrt());

        Some(Self { means, stds })
    }

    /// Indices of columns with (numerically) zero spread.
    pub fn degenerate_columns(&self) -> Vec<usize> {
        self.stds
            .iter()
            .enumerate()
            .filter(|(_, s)| **s <= DEGENERATE_STD)
            .map(|(i, _)| i)
            .collect()
    }

    /// Scale one row. Degenerate columns map to 0.
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&x, (&m, &s))| if s <= DEGENERATE_STD { 0.0 } else { (x - m) / s })
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform_row(row)).collect()
    }
}

/// Outcome of fitting under a degenerate-feature policy.
#[derive(Debug)]
pub enum Standardized {
    Scaled {
        scaler: StandardScaler,
        rows: Vec<Vec<f64>>,
    },
    /// A zero-variance column under `DegeneratePolicy::Fail`.
    Degenerate { column: usize },
}

/// Fit and transform `rows`, applying `policy` to zero-variance columns.
pub fn standardize(rows: &[Vec<f64>], policy: DegeneratePolicy) -> Option<Standardized> {
    let scaler = StandardScaler::fit(rows)?;
    let degenerate = scaler.degenerate_columns();
    if let Some(&column) = degenerate.first() {
        if policy == DegeneratePolicy::Fail {
            return Some(Standardized::Degenerate { column });
        }
    }
    let rows = scaler.transform(rows);
    Some(Standardized::Scaled { scaler, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(rows: &[Vec<f64>], j: usize) -> Vec<f64> {
        rows.iter().map(|r| r[j]).collect()
    }

    fn mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    fn population_std(values: &[f64]) -> f64 {
        let m = mean(values);
        (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
    }

    #[test]
    fn test_standardized_columns_have_zero_mean_unit_std() {
        let rows = vec![
            vec![800.0, 50.0, 5.0, 600.0, 1200.0],
            vec![790.0, 60.0, 6.0, 590.0, 12.0],
            vec![10.0, 5.0, 400.0, 20.0, 1.0],
            vec![420.0, 33.0, 80.0, 300.0, 450.0],
        ];
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform(&rows);

        for j in 0..5 {
            let col = column(&scaled, j);
            assert!(mean(&col).abs() < 1e-12, "column {} mean", j);
            assert!((population_std(&col) - 1.0).abs() < 1e-12, "column {} std", j);
        }
    }

    #[test]
    fn test_degenerate_column_zero_policy() {
        let rows = vec![vec![1.0, 7.0], vec![3.0, 7.0]];
        match standardize(&rows, DegeneratePolicy::Zero).unwrap() {
            Standardized::Scaled { scaler, rows } => {
                assert_eq!(scaler.degenerate_columns(), vec![1]);
                assert_eq!(rows, vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
            }
            other => panic!("Expected Scaled, got {:?}", other),
        }
    }

    #[test]
    fn test_degenerate_column_fail_policy() {
        let rows = vec![vec![1.0, 7.0], vec![3.0, 7.0]];
        match standardize(&rows, DegeneratePolicy::Fail).unwrap() {
            Standardized::Degenerate { column } => assert_eq!(column, 1),
            other => panic!("Expected Degenerate, got {:?}", other),
        }
    }

    #[test]
    fn test_fit_empty() {
        assert!(StandardScaler::fit(&[]).is_none());
    }
}
