//! Seeded K-Means with k-means++ initialization and restarts.
//!
//! Each restart runs Lloyd's algorithm to convergence (or `max_iter`) from its
//! own k-means++ seeding. Restart seeds are drawn up front from a master RNG,
//! so the restarts can run on the rayon pool and the selected result depends
//! only on `(points, k, seed, n_init, max_iter)`.
//!
//! # Example
//!
//! ```
//! use signal_clustering::processors::kmeans::{fit, KMeansParams};
//!
//! let points = vec![vec![0.0, 0.0], vec![0.1, 0.0], vec![9.0, 9.0]];
//! let result = fit(&points, &KMeansParams { k: 2, seed: 7, n_init: 4, max_iter: 100 }).unwrap();
//! assert_eq!(result.labels[0], result.labels[1]);
//! assert_ne!(result.labels[0], result.labels[2]);
//! ```

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Parameters for one K-Means fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KMeansParams {
    pub k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
}

/// The best restart of a K-Means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index per point, in input order
    pub labels: Vec<usize>,
    /// Final centroids, indexed by label
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each point to its centroid
    pub inertia: f64,
    /// Lloyd iterations used by the selected restart
    pub iterations: usize,
    /// Index of the selected restart
    pub run: usize,
}

#[inline]
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centroid and its squared distance. Ties go to the lower index.
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    points.par_iter().map(|p| nearest(p, centroids).0).collect()
}

/// Assign arbitrary points to fitted centroids.
pub fn predict(points: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    assign(points, centroids)
}

fn inertia(points: &[Vec<f64>], labels: &[usize], centroids: &[Vec<f64>]) -> f64 {
    points
        .iter()
        .zip(labels)
        .map(|(p, &l)| squared_distance(p, &centroids[l]))
        .sum()
}

/// k-means++ seeding.
///
/// The first centre is uniform; each later one is drawn with probability
/// proportional to its squared distance to the nearest chosen centre. When
/// every remaining point coincides with a chosen centre the weights are all
/// zero and the lowest unchosen index is taken instead.
fn init_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut potentials: Vec<f64> = vec![f64::INFINITY; n];
    let mut chosen = vec![false; n];
    let mut centroids = Vec::with_capacity(k);

    while centroids.len() < k {
        let i = if centroids.is_empty() {
            rng.random_range(0..n)
        } else {
            match WeightedIndex::new(potentials.iter()) {
                Ok(dist) => dist.sample(rng),
                Err(_) => match chosen.iter().position(|&c| !c) {
                    Some(i) => i,
                    None => break,
                },
            }
        };
        let x = &points[i];
        centroids.push(x.clone());
        chosen[i] = true;
        potentials[i] = 0.0;
        for (p, point) in potentials.iter_mut().zip(points) {
            *p = p.min(squared_distance(x, point));
        }
    }
    centroids
}

/// Recompute centroids as member means, re-seeding empty clusters with the
/// point farthest from its own centroid.
fn update(points: &[Vec<f64>], labels: &[usize], previous: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let k = previous.len();
    let dim = points.first().map_or(0, |p| p.len());

    let mut sums = vec![vec![0.0; dim]; k];
    let mut counts = vec![0usize; k];
    for (p, &l) in points.iter().zip(labels) {
        counts[l] += 1;
        for (s, x) in sums[l].iter_mut().zip(p) {
            *s += x;
        }
    }

    let mut next: Vec<Vec<f64>> = sums
        .into_iter()
        .zip(&counts)
        .enumerate()
        .map(|(j, (sum, &count))| {
            if count == 0 {
                previous[j].clone()
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect();

    let mut taken = vec![false; points.len()];
    for j in (0..k).filter(|&j| counts[j] == 0) {
        let mut farthest: Option<(usize, f64)> = None;
        for (i, p) in points.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let d = squared_distance(p, &next[labels[i]]);
            if farthest.map_or(true, |(_, best)| d > best) {
                farthest = Some((i, d));
            }
        }
        if let Some((i, d)) = farthest {
            if d > 0.0 {
                next[j] = points[i].clone();
                taken[i] = true;
            }
        }
    }
    next
}

/// One seeded restart of Lloyd's algorithm.
fn lloyd(points: &[Vec<f64>], k: usize, max_iter: usize, seed: u64, run: usize) -> KMeansFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut centroids = init_plus_plus(points, k, &mut rng);
    let mut labels = assign(points, &centroids);
    let mut iterations = 0;

    for _ in 0..max_iter {
        iterations += 1;
        centroids = update(points, &labels, &centroids);
        let next = assign(points, &centroids);
        let converged = next == labels;
        // labels always belong to the returned centroids, even at max_iter
        labels = next;
        if converged {
            break;
        }
    }

    KMeansFit {
        inertia: inertia(points, &labels, &centroids),
        labels,
        centroids,
        iterations,
        run,
    }
}

/// Fit K-Means and keep the restart with the lowest inertia.
///
/// Ties on inertia go to the earlier restart. Returns `None` when `k`,
/// `n_init` or `max_iter` is zero, or when there are fewer points than `k`.
pub fn fit(points: &[Vec<f64>], params: &KMeansParams) -> Option<KMeansFit> {
    if params.k == 0 || params.n_init == 0 || params.max_iter == 0 || points.len() < params.k {
        return None;
    }

    let mut master = StdRng::seed_from_u64(params.seed);
    let seeds: Vec<u64> = (0..params.n_init).map(|_| master.random()).collect();

    let fits: Vec<KMeansFit> = seeds
        .par_iter()
        .enumerate()
        .map(|(run, &seed)| lloyd(points, params.k, params.max_iter, seed, run))
        .collect();

    for f in &fits {
        log::debug!(
            "restart {}: inertia={:.6} iterations={}",
            f.run,
            f.inertia,
            f.iterations
        );
    }

    fits.into_iter()
        .min_by(|a, b| a.inertia.total_cmp(&b.inertia).then(a.run.cmp(&b.run)))
}
