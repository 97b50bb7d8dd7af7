//! Dimensionality reduction for embedding sub-clustering
//!
//! A neighborhood-smoothed principal-component projection: each point is
//! averaged with its k nearest cosine neighbors (k ~ sqrt(n), as in manifold
//! reducers), then projected onto the leading principal components by seeded
//! power iteration. The target dimension is capped at `n - 2`, mirroring the
//! constraint manifold reducers put on tiny inputs.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

const POWER_ITERATIONS: usize = 60;

/// Reduce `data` (one row per point) to at most `target_dim` columns.
pub(crate) fn reduce(data: &Array2<f64>, target_dim: usize, seed: u64) -> Array2<f64> {
    let n = data.nrows();
    let d = data.ncols();
    let target = target_dim.min(n.saturating_sub(2)).max(1).min(d);

    if n <= 3 || target == d {
        return center_columns(data);
    }

    let k = ((n as f64 - 1.0).sqrt() as usize).max(2).min(n - 1);
    let smoothed = neighborhood_smooth(data, k);
    let centered = center_columns(&smoothed);
    project(&centered, target, seed)
}

/// Replace each point by the midpoint of itself and its k-neighborhood mean.
fn neighborhood_smooth(data: &Array2<f64>, k: usize) -> Array2<f64> {
    let n = data.nrows();
    let d = data.ncols();

    let norms: Vec<f64> = (0..n)
        .map(|i| data.row(i).iter().map(|x| x * x).sum::<f64>().sqrt())
        .collect();

    let mut smoothed = Array2::zeros((n, d));
    for i in 0..n {
        let mut sims: Vec<(usize, f64)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| {
                let dot: f64 = data
                    .row(i)
                    .iter()
                    .zip(data.row(j).iter())
                    .map(|(a, b)| a * b)
                    .sum();
                let denom = norms[i] * norms[j];
                let sim = if denom > 0.0 { dot / denom } else { 0.0 };
                (j, sim)
            })
            .collect();
        sims.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        sims.truncate(k);

        let mut mean = Array1::zeros(d);
        for (j, _) in &sims {
            mean = mean + data.row(*j);
        }
        mean /= sims.len().max(1) as f64;

        let row = data.row(i);
        for j in 0..d {
            smoothed[[i, j]] = 0.5 * row[j] + 0.5 * mean[j];
        }
    }
    smoothed
}

fn center_columns(data: &Array2<f64>) -> Array2<f64> {
    let n = data.nrows() as f64;
    let mut centered = data.clone();
    for j in 0..data.ncols() {
        let mean = data.column(j).sum() / n;
        for i in 0..data.nrows() {
            centered[[i, j]] -= mean;
        }
    }
    centered
}

/// Leading principal components by power iteration with deflation.
fn project(centered: &Array2<f64>, target: usize, seed: u64) -> Array2<f64> {
    let n = centered.nrows();
    let d = centered.ncols();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut residual = centered.clone();
    let mut output = Array2::zeros((n, target));

    for c in 0..target {
        let mut v: Array1<f64> = Array1::from_iter(
            (0..d).map(|_| StandardNormal.sample(&mut rng)),
        );
        normalize(&mut v);

        for _ in 0..POWER_ITERATIONS {
            let scores = residual.dot(&v);
            let mut next = residual.t().dot(&scores);
            let norm = normalize(&mut next);
            if norm < 1e-12 {
                next.fill(0.0);
                v = next;
                break;
            }
            v = next;
        }

        let scores = centered.dot(&v);
        output.column_mut(c).assign(&scores);

        let deflate = residual.dot(&v);
        for i in 0..n {
            for j in 0..d {
                residual[[i, j]] -= deflate[i] * v[j];
            }
        }
    }

    output
}

fn normalize(v: &mut Array1<f64>) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        *v /= norm;
    }
    norm
}
