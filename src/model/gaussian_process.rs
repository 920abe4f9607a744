//! Gaussian-process surrogate over log-frequency.
//!
//! ## Model
//!
//! y = f(x) + ε,  f ~ GP(0, k),  ε ~ N(0, σ²_n)
//!
//! with kernel k(x, x') = C · exp(-(x - x')² / 2ℓ²) plus white noise σ²_n
//! and a small fixed diagonal `alpha` for numerical stability.
//!
//! ## Fitting
//!
//! Targets are standardized (zero mean, unit variance) before fitting.
//! Hyperparameters θ = (ln C, ln ℓ, ln σ²_n) maximize the log marginal
//! likelihood
//!
//! log p(y | θ) = -½ yᵀK⁻¹y - Σ ln Lᵢᵢ - (n/2) ln 2π
//!
//! using a bounded simplex search, started once from the configured initial
//! values and then from `n_restarts` log-uniform random points. The best
//! likelihood wins. Restart draws come from a fixed seed so refitting the
//! same data gives the same posterior.
//!
//! ## Prediction
//!
//! mean = k*ᵀα,  var = C + σ²_n - vᵀv with v = L⁻¹k*, both un-standardized.

use nalgebra::{Cholesky, DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::GpConfig;
use crate::error::{log_model_error, ModelError};

use super::observation::Observation;
use super::optimizer;

/// ln(2π)
const LOG_2PI: f64 = 1.837_877_066_409_345_5;

/// Cholesky retries, each multiplying the jitter by 10
const MAX_JITTER_ATTEMPTS: usize = 6;
const BASE_JITTER: f64 = 1e-10;

/// Predictive mean and standard deviation per query point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

/// Probabilistic regressor over log-frequency
///
/// Implementations must tolerate `predict` before any `fit` and treat
/// `fit` with fewer than two observations as a no-op.
pub trait SurrogateModel: Send {
    fn fit(&mut self, observations: &[Observation]);

    fn predict(&self, log_frequencies: &[f64]) -> Prediction;

    /// Drop any fitted state, returning to the prior
    fn reset(&mut self);

    fn is_fitted(&self) -> bool;

    /// Likelihood of the current fit, if the model has one
    fn log_marginal_likelihood(&self) -> Option<f64> {
        None
    }
}

/// Kernel hyperparameters in natural units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hyperparameters {
    pub constant: f64,
    pub length_scale: f64,
    pub noise: f64,
}

impl Hyperparameters {
    fn from_log(theta: &[f64]) -> Self {
        Self {
            constant: theta[0].exp(),
            length_scale: theta[1].exp(),
            noise: theta[2].exp(),
        }
    }

    fn to_log(self) -> [f64; 3] {
        [self.constant.ln(), self.length_scale.ln(), self.noise.ln()]
    }

    #[inline]
    fn covariance(&self, a: f64, b: f64) -> f64 {
        let d = (a - b) / self.length_scale;
        self.constant * (-0.5 * d * d).exp()
    }
}

/// Factorized training covariance for one hyperparameter setting
struct Factorization {
    lower: DMatrix<f64>,
    weights: DVector<f64>,
    log_likelihood: f64,
}

fn factorize(
    x: &[f64],
    y: &DVector<f64>,
    hyper: &Hyperparameters,
    alpha: f64,
) -> Result<Factorization, String> {
    let n = x.len();
    let mut k = DMatrix::from_fn(n, n, |i, j| hyper.covariance(x[i], x[j]));
    for i in 0..n {
        k[(i, i)] += hyper.noise + alpha;
    }

    let mean_diag = k.trace() / n as f64;
    let mut chol = Cholesky::new(k.clone());
    let mut jitter = BASE_JITTER + mean_diag * 1e-8;
    let mut attempts = 0;
    while chol.is_none() && attempts < MAX_JITTER_ATTEMPTS {
        let mut regularized = k.clone();
        for i in 0..n {
            regularized[(i, i)] += jitter;
        }
        chol = Cholesky::new(regularized);
        jitter *= 10.0;
        attempts += 1;
    }
    let chol = chol.ok_or_else(|| {
        format!(
            "covariance not positive definite after {} jitter attempts",
            MAX_JITTER_ATTEMPTS
        )
    })?;

    let weights = chol.solve(y);
    let lower = chol.unpack();
    let log_det_half: f64 = lower.diagonal().iter().map(|d| d.ln()).sum();
    let log_likelihood = -0.5 * y.dot(&weights) - log_det_half - 0.5 * n as f64 * LOG_2PI;

    if !log_likelihood.is_finite() {
        return Err("log marginal likelihood is not finite".to_string());
    }

    Ok(Factorization {
        lower,
        weights,
        log_likelihood,
    })
}

struct FittedState {
    hyper: Hyperparameters,
    x_train: Vec<f64>,
    factor: Factorization,
    y_mean: f64,
    y_scale: f64,
}

/// Gaussian-process regressor with a `C·RBF + White` kernel
pub struct GaussianProcess {
    config: GpConfig,
    state: Option<FittedState>,
}

impl GaussianProcess {
    pub fn new(config: GpConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    fn initial_hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            constant: self.config.initial_constant,
            length_scale: self.config.initial_length_scale,
            noise: self.config.initial_noise,
        }
    }

    fn log_bounds(&self) -> [(f64, f64); 3] {
        let c = self.config.constant_bounds;
        let l = self.config.length_scale_bounds;
        let n = self.config.noise_bounds;
        [
            (c.0.ln(), c.1.ln()),
            (l.0.ln(), l.1.ln()),
            (n.0.ln(), n.1.ln()),
        ]
    }

    /// Fitted hyperparameters, or the initial ones before a fit
    pub fn hyperparameters(&self) -> Hyperparameters {
        self.state
            .as_ref()
            .map(|s| s.hyper)
            .unwrap_or_else(|| self.initial_hyperparameters())
    }

    fn optimize(&self, x: &[f64], y: &DVector<f64>) -> Option<(Hyperparameters, Factorization)> {
        let bounds = self.log_bounds();
        let mut rng = StdRng::seed_from_u64(self.config.restart_seed);

        let mut starts = Vec::with_capacity(self.config.n_restarts + 1);
        starts.push(self.initial_hyperparameters().to_log());
        for _ in 0..self.config.n_restarts {
            starts.push([
                rng.gen_range(bounds[0].0..bounds[0].1),
                rng.gen_range(bounds[1].0..bounds[1].1),
                rng.gen_range(bounds[2].0..bounds[2].1),
            ]);
        }

        let alpha = self.config.alpha;
        let mut best: Option<(Hyperparameters, Factorization)> = None;

        for (restart, start) in starts.iter().enumerate() {
            let result = optimizer::minimize(
                |theta| match factorize(x, y, &Hyperparameters::from_log(theta), alpha) {
                    Ok(f) => -f.log_likelihood,
                    Err(_) => f64::INFINITY,
                },
                start,
                &bounds,
                self.config.max_iterations,
                self.config.tolerance,
            );

            let hyper = Hyperparameters::from_log(&result.x);
            match factorize(x, y, &hyper, alpha) {
                Ok(factor) => {
                    let improves = best
                        .as_ref()
                        .map_or(true, |(_, b)| factor.log_likelihood > b.log_likelihood);
                    if improves {
                        best = Some((hyper, factor));
                    }
                }
                Err(details) => {
                    log_model_error(
                        &ModelError::NumericInstability { restart, details },
                        "GaussianProcess::fit",
                    );
                }
            }
        }

        best
    }
}

impl SurrogateModel for GaussianProcess {
    fn fit(&mut self, observations: &[Observation]) {
        if observations.len() < 2 {
            log::debug!(
                "[GaussianProcess] Skipping fit with {} observation(s)",
                observations.len()
            );
            return;
        }

        let x: Vec<f64> = observations.iter().map(|o| o.log_frequency()).collect();
        let raw: Vec<f64> = observations.iter().map(|o| o.volume()).collect();
        let n = raw.len() as f64;
        let y_mean = raw.iter().sum::<f64>() / n;
        let variance = raw.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n;
        let y_scale = if variance > 0.0 { variance.sqrt() } else { 1.0 };
        let y = DVector::from_iterator(raw.len(), raw.iter().map(|v| (v - y_mean) / y_scale));

        match self.optimize(&x, &y) {
            Some((hyper, factor)) => {
                log::debug!(
                    "[GaussianProcess] Fitted {} points: C={:.4}, l={:.4}, noise={:.2e}, lml={:.3}",
                    x.len(),
                    hyper.constant,
                    hyper.length_scale,
                    hyper.noise,
                    factor.log_likelihood
                );
                self.state = Some(FittedState {
                    hyper,
                    x_train: x,
                    factor,
                    y_mean,
                    y_scale,
                });
            }
            None => {
                log::warn!(
                    "[GaussianProcess] No restart produced a usable fit for {} points; keeping prior",
                    x.len()
                );
                self.state = None;
            }
        }
    }

    fn predict(&self, log_frequencies: &[f64]) -> Prediction {
        let Some(state) = self.state.as_ref() else {
            let hyper = self.initial_hyperparameters();
            let prior_std = (hyper.constant + hyper.noise).sqrt();
            return Prediction {
                mean: vec![0.0; log_frequencies.len()],
                std: vec![prior_std; log_frequencies.len()],
            };
        };

        let hyper = &state.hyper;
        let prior_var = hyper.constant + hyper.noise;
        let n = state.x_train.len();
        let mut mean = Vec::with_capacity(log_frequencies.len());
        let mut std = Vec::with_capacity(log_frequencies.len());

        for &query in log_frequencies {
            let k_star = DVector::from_fn(n, |i, _| hyper.covariance(query, state.x_train[i]));
            let mu = k_star.dot(&state.factor.weights);
            let explained = state
                .factor
                .lower
                .solve_lower_triangular(&k_star)
                .map(|v| v.dot(&v))
                .unwrap_or(0.0);
            let var = (prior_var - explained).max(0.0);

            mean.push(mu * state.y_scale + state.y_mean);
            std.push(var.sqrt() * state.y_scale);
        }

        Prediction { mean, std }
    }

    fn reset(&mut self) {
        self.state = None;
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn log_marginal_likelihood(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.factor.log_likelihood)
    }
}
