//! Principal component projection to two dimensions for scatter plots.

use nalgebra::{DMatrix, SymmetricEigen};

/// Points projected onto the two leading principal components.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// (PC1, PC2) per input row
    pub points: Vec<[f64; 2]>,
    /// Unit loading vectors of PC1 and PC2 over the input columns
    pub components: [Vec<f64>; 2],
    /// Share of total variance carried by PC1 and PC2
    pub explained_variance_ratio: [f64; 2],
}

/// Flip `v` so its largest-magnitude entry is positive (first index wins ties).
fn fix_sign(v: &mut [f64]) {
    let mut pivot = 0;
    for (i, x) in v.iter().enumerate() {
        if x.abs() > v[pivot].abs() {
            pivot = i;
        }
    }
    if v.get(pivot).is_some_and(|&x| x < 0.0) {
        v.iter_mut().for_each(|x| *x = -*x);
    }
}

/// Project row-major `rows` onto their top two principal directions.
///
/// Rows are mean-centred before the covariance is taken. With a single
/// input column the second coordinate is always 0. Returns `None` for an
/// empty input or zero-width rows.
pub fn project_2d(rows: &[Vec<f64>]) -> Option<Projection> {
    let n = rows.len();
    let d = rows.first()?.len();
    if d == 0 {
        return None;
    }

    let data = DMatrix::from_fn(n, d, |i, j| rows[i][j]);
    let means = data.row_mean();
    let centered = DMatrix::from_fn(n, d, |i, j| data[(i, j)] - means[j]);

    let denom = n.saturating_sub(1).max(1) as f64;
    let covariance = (centered.transpose() * &centered) / denom;
    let eigen = SymmetricEigen::new(covariance);

    // SymmetricEigen does not sort its output
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .total_cmp(&eigen.eigenvalues[a])
            .then(a.cmp(&b))
    });

    let total: f64 = eigen.eigenvalues.iter().map(|v| v.max(0.0)).sum();

    let component = |rank: usize| -> (Vec<f64>, f64) {
        match order.get(rank) {
            Some(&col) => {
                let mut v: Vec<f64> = eigen.eigenvectors.column(col).iter().copied().collect();
                fix_sign(&mut v);
                let ratio = if total > 0.0 {
                    eigen.eigenvalues[col].max(0.0) / total
                } else {
                    0.0
                };
                (v, ratio)
            }
            None => (vec![0.0; d], 0.0),
        }
    };
    let (pc1, r1) = component(0);
    let (pc2, r2) = component(1);

    let points = centered
        .row_iter()
        .map(|row| {
            let dot = |v: &[f64]| row.iter().zip(v).map(|(x, w)| x * w).sum::<f64>();
            [dot(&pc1), dot(&pc2)]
        })
        .collect();

    Some(Projection {
        points,
        components: [pc1, pc2],
        explained_variance_ratio: [r1, r2],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_collinear_points_fall_on_first_component() {
        let rows = vec![vec![-1.0, -2.0], vec![0.0, 0.0], vec![1.0, 2.0]];
        let projection = project_2d(&rows).unwrap();

        assert!((projection.explained_variance_ratio[0] - 1.0).abs() < EPS);
        assert!(projection.explained_variance_ratio[1].abs() < EPS);

        let norm = 5.0f64.sqrt();
        assert!((projection.points[0][0] + norm).abs() < EPS);
        assert!(projection.points[1][0].abs() < EPS);
        assert!((projection.points[2][0] - norm).abs() < EPS);
        for p in &projection.points {
            assert!(p[1].abs() < EPS);
        }
    }

    #[test]
    fn test_components_are_orthonormal_and_sign_fixed() {
        let rows = vec![
            vec![1.0, 0.3, -0.5],
            vec![-0.7, 1.2, 0.1],
            vec![0.4, -1.1, 0.9],
            vec![-0.7, -0.4, -0.5],
        ];
        let projection = project_2d(&rows).unwrap();
        let [a, b] = &projection.components;

        let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f64 = a.iter().map(|x| x * x).sum();
        let norm_b: f64 = b.iter().map(|x| x * x).sum();
        assert!(dot.abs() < EPS);
        assert!((norm_a - 1.0).abs() < EPS);
        assert!((norm_b - 1.0).abs() < EPS);

        for v in [a, b] {
            let pivot = v
                .iter()
                .copied()
                .fold(0.0f64, |m, x| if x.abs() > m.abs() { x } else { m });
            assert!(pivot > 0.0);
        }

        let [r1, r2] = projection.explained_variance_ratio;
        assert!(r1 >= r2);
        assert!(r1 + r2 <= 1.0 + EPS);
    }

    #[test]
    fn test_single_column_pads_second_coordinate() {
        let rows = vec![vec![1.0], vec![2.0], vec![4.0]];
        let projection = project_2d(&rows).unwrap();
        assert!(projection.points.iter().all(|p| p[1] == 0.0));
        assert_eq!(projection.explained_variance_ratio[1], 0.0);
    }

    #[test]
    fn test_deterministic() {
        let rows = vec![vec![0.5, 1.5, -2.0], vec![1.0, -0.5, 0.0], vec![-1.5, -1.0, 2.0]];
        assert_eq!(project_2d(&rows), project_2d(&rows));
    }

    #[test]
    fn test_empty() {
        assert!(project_2d(&[]).is_none());
    }
}
