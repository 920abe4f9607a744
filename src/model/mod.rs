//! Adaptive loudness model
//!
//! Leaf-first: observations and bands in log-frequency space, the
//! Gaussian-process surrogate, acquisition and seeding policies, and the
//! `CurveFitter` tying them together.

pub mod acquisition;
pub mod bands;
pub mod fitter;
pub mod gaussian_process;
pub mod observation;
pub mod optimizer;
pub mod seeding;

pub use acquisition::{AcquisitionStrategy, BandPoint, MaxUncertainty};
pub use bands::{BandLayout, FrequencyBand};
pub use fitter::{Curve, CurveFitter, FitReport, FitterSettings, ObservedPoints, MIN_OBSERVATIONS};
pub use gaussian_process::{GaussianProcess, Hyperparameters, Prediction, SurrogateModel};
pub use observation::{Observation, ObservationSet};
pub use seeding::{fixed_seeds, quasi_random_schedule, SeedRequest};
