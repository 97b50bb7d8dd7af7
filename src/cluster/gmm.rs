//! Gaussian mixture sub-clustering with BIC model selection
//!
//! Diagonal-covariance GMM fitted by EM in log space. The component count is
//! chosen by minimising the Bayesian information criterion over candidate
//! counts; ties prefer the smaller model. All randomness comes from the
//! caller's seed, so a fixed seed gives a fixed clustering.

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_ITER: usize = 100;
const CONVERGENCE_TOL: f64 = 1e-6;
const REG_COVAR: f64 = 1e-6;

/// A fitted mixture: hard labels plus the model-selection score.
#[derive(Debug, Clone)]
pub(crate) struct GmmFit {
    pub labels: Vec<usize>,
    pub n_components: usize,
    pub bic: f64,
}

/// Fit mixtures for every component count in `1..=max_components` and return
/// the fit with the lowest BIC.
pub(crate) fn select_components(data: &Array2<f64>, max_components: usize, seed: u64) -> GmmFit {
    let n = data.nrows();
    let cap = max_components.min(n).max(1);

    let mut best: Option<GmmFit> = None;
    for k in 1..=cap {
        let fit = fit_gmm(data, k, seed);
        let better = match &best {
            Some(current) => fit.bic < current.bic,
            None => true,
        };
        if better {
            best = Some(fit);
        }
    }
    best.expect("at least one candidate component count")
}

/// One EM fit with `k` components.
pub(crate) fn fit_gmm(data: &Array2<f64>, k: usize, seed: u64) -> GmmFit {
    let n = data.nrows();
    let d = data.ncols();
    let k = k.min(n).max(1);

    let mut rng = StdRng::seed_from_u64(seed);

    // Means: farthest-point init from a seeded first pick, so well-separated
    // groups each receive a component.
    let mut means = Array2::zeros((k, d));
    let first = rng.gen_range(0..n);
    let mut chosen = vec![first];
    means.row_mut(0).assign(&data.row(first));
    while chosen.len() < k {
        let next = (0..n)
            .max_by(|&a, &b| {
                let da = min_sq_distance(&data.row(a), &chosen, data);
                let db = min_sq_distance(&data.row(b), &chosen, data);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(first);
        means.row_mut(chosen.len()).assign(&data.row(next));
        chosen.push(next);
    }

    // Variances: per-dimension data variance, floored by the regulariser.
    let col_var = column_variances(data);
    let mut variances = Array2::zeros((k, d));
    for c in 0..k {
        for j in 0..d {
            variances[[c, j]] = col_var[j].max(REG_COVAR);
        }
    }

    let mut weights = Array1::from_elem(k, 1.0 / k as f64);
    let mut resp = Array2::zeros((n, k));
    let mut log_likelihood = f64::NEG_INFINITY;

    for _ in 0..MAX_ITER {
        // E-step
        let mut new_ll = 0.0;
        for i in 0..n {
            let point = data.row(i);
            let mut log_probs = vec![0.0; k];
            for c in 0..k {
                log_probs[c] =
                    weights[c].ln() + log_gaussian(&point, &means.row(c), &variances.row(c));
            }
            let log_sum = logsumexp(&log_probs);
            new_ll += log_sum;
            for c in 0..k {
                resp[[i, c]] = (log_probs[c] - log_sum).exp();
            }
        }

        // M-step
        let resp_sum: Vec<f64> = (0..k).map(|c| resp.column(c).sum()).collect();
        let total: f64 = resp_sum.iter().sum();

        for c in 0..k {
            weights[c] = (resp_sum[c] / total).max(f64::MIN_POSITIVE);
        }

        for c in 0..k {
            if resp_sum[c] <= 1e-10 {
                continue;
            }
            for j in 0..d {
                let mut mean = 0.0;
                for i in 0..n {
                    mean += resp[[i, c]] * data[[i, j]];
                }
                means[[c, j]] = mean / resp_sum[c];
            }
            for j in 0..d {
                let mut var = REG_COVAR;
                for i in 0..n {
                    let diff = data[[i, j]] - means[[c, j]];
                    var += resp[[i, c]] * diff * diff;
                }
                variances[[c, j]] = (var / resp_sum[c]).max(REG_COVAR);
            }
        }

        if (new_ll - log_likelihood).abs() < CONVERGENCE_TOL {
            log_likelihood = new_ll;
            break;
        }
        log_likelihood = new_ll;
    }

    // Hard assignment: argmax responsibility
    let labels = (0..n)
        .map(|i| {
            (0..k)
                .max_by(|&a, &b| {
                    resp[[i, a]]
                        .partial_cmp(&resp[[i, b]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(0)
        })
        .collect();

    // BIC = -2 log L + p ln n, with p = means + variances + free weights
    let n_params = (2 * k * d + k - 1) as f64;
    let bic = -2.0 * log_likelihood + n_params * (n as f64).ln();

    GmmFit {
        labels,
        n_components: k,
        bic,
    }
}

fn min_sq_distance(point: &ArrayView1<'_, f64>, chosen: &[usize], data: &Array2<f64>) -> f64 {
    chosen
        .iter()
        .map(|&c| {
            let row = data.row(c);
            point
                .iter()
                .zip(row.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
        })
        .fold(f64::INFINITY, f64::min)
}

fn column_variances(data: &Array2<f64>) -> Vec<f64> {
    let n = data.nrows() as f64;
    (0..data.ncols())
        .map(|j| {
            let col = data.column(j);
            let mean = col.sum() / n;
            col.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n
        })
        .collect()
}

fn log_gaussian(
    point: &ArrayView1<'_, f64>,
    mean: &ArrayView1<'_, f64>,
    var: &ArrayView1<'_, f64>,
) -> f64 {
    let d = point.len() as f64;
    let mut log_prob = -0.5 * d * (2.0 * std::f64::consts::PI).ln();
    for i in 0..point.len() {
        let diff = point[i] - mean[i];
        log_prob -= 0.5 * var[i].ln();
        log_prob -= 0.5 * diff * diff / var[i];
    }
    log_prob
}

fn logsumexp(values: &[f64]) -> f64 {
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    max_val
        + values
            .iter()
            .map(|&v| (v - max_val).exp())
            .sum::<f64>()
            .ln()
}
