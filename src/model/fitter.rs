//! Curve fitter: observation set + surrogate + acquisition.
//!
//! One `CurveFitter` belongs to exactly one test session. It never fits
//! implicitly; callers append observations and call [`CurveFitter::fit`]
//! when they want the surrogate refreshed.

use std::time::Instant;

use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};

use crate::config::{AppConfig, ModelConfig};
use crate::error::ModelError;

use super::acquisition::{AcquisitionStrategy, BandPoint, MaxUncertainty};
use super::bands::BandLayout;
use super::gaussian_process::{GaussianProcess, SurrogateModel};
use super::observation::{to_hz, Observation, ObservationSet};
use super::seeding::fixed_seeds;

/// Minimum observations before the surrogate is fit or queried
pub const MIN_OBSERVATIONS: usize = 2;

/// Grid and anchor settings for a fitter
#[derive(Debug, Clone, Copy)]
pub struct FitterSettings {
    /// Points in the rendered curve, spanning the full range inclusive
    pub curve_points: usize,
    /// Frequency returned by `next_query` in single mode before any fit
    pub anchor_freq: f64,
}

impl From<&ModelConfig> for FitterSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            curve_points: config.curve_points.max(MIN_OBSERVATIONS),
            anchor_freq: config.anchor_freq,
        }
    }
}

/// Raw observations in insertion order, for overlay on the curve
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObservedPoints {
    pub freqs: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl ObservedPoints {
    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }
}

/// Empty overlays serialize as `[]`, populated ones as `{freqs, volumes}`
fn serialize_points<S: Serializer>(points: &ObservedPoints, serializer: S) -> Result<S::Ok, S::Error> {
    if points.is_empty() {
        serializer.serialize_seq(Some(0))?.end()
    } else {
        points.serialize(serializer)
    }
}

/// Dense predictive curve over the full frequency range
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Curve {
    pub freqs: Vec<f64>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    #[serde(serialize_with = "serialize_points")]
    pub points: ObservedPoints,
}

impl Curve {
    /// Curve signalling "not enough data to draw"
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }
}

/// Summary of one completed `fit` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub observations: usize,
    pub log_likelihood: Option<f64>,
    pub duration_ms: u64,
}

pub struct CurveFitter {
    layout: BandLayout,
    observations: ObservationSet,
    surrogate: Box<dyn SurrogateModel>,
    acquisition: Box<dyn AcquisitionStrategy>,
    settings: FitterSettings,
}

impl CurveFitter {
    pub fn new(
        layout: BandLayout,
        surrogate: Box<dyn SurrogateModel>,
        acquisition: Box<dyn AcquisitionStrategy>,
        settings: FitterSettings,
    ) -> Self {
        Self {
            layout,
            observations: ObservationSet::new(),
            surrogate,
            acquisition,
            settings,
        }
    }

    /// Fitter with a Gaussian-process surrogate and max-uncertainty search
    pub fn from_config(config: &AppConfig) -> Result<Self, ModelError> {
        let layout = BandLayout::from_config(&config.model)?;
        Ok(Self::new(
            layout,
            Box::new(GaussianProcess::new(config.gp.clone())),
            Box::new(MaxUncertainty::new(config.model.acquisition_grid_points)),
            FitterSettings::from(&config.model),
        ))
    }

    /// Drop all observations and fitted state
    pub fn reset(&mut self) {
        self.observations.clear();
        self.surrogate.reset();
    }

    pub fn add(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn add_all<I: IntoIterator<Item = Observation>>(&mut self, observations: I) {
        self.observations.extend(observations);
    }

    /// Append `(frequency_hz, volume)` pairs in order
    pub fn add_points(&mut self, points: &[(f64, f64)]) {
        self.observations
            .extend(points.iter().map(|&(hz, vol)| Observation::from_hz(hz, vol)));
    }

    /// Refit the surrogate from scratch; `None` below two observations
    pub fn fit(&mut self) -> Option<FitReport> {
        let count = self.observations.len();
        if count < MIN_OBSERVATIONS {
            log::debug!("[CurveFitter] Not fitting: {} observation(s)", count);
            return None;
        }

        let started = Instant::now();
        self.surrogate.fit(self.observations.as_slice());
        let report = FitReport {
            observations: count,
            log_likelihood: self.surrogate.log_marginal_likelihood(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log::info!(
            "[CurveFitter] Fitted {} observations in {} ms",
            report.observations,
            report.duration_ms
        );
        Some(report)
    }

    /// Next frequencies to test: fixed seeds until the model can be fit,
    /// then one max-uncertainty point per band
    pub fn next_query(&self) -> Vec<BandPoint> {
        if self.observations.len() < MIN_OBSERVATIONS {
            return fixed_seeds(&self.layout, self.settings.anchor_freq);
        }
        self.acquisition.select(self.surrogate.as_ref(), &self.layout)
    }

    pub fn curve(&self) -> Curve {
        if self.observations.len() < MIN_OBSERVATIONS {
            return Curve::empty();
        }

        let grid = self.layout.full_grid(self.settings.curve_points);
        let prediction = self.surrogate.predict(&grid);
        let points = ObservedPoints {
            freqs: self.observations.iter().map(|o| o.frequency_hz()).collect(),
            volumes: self.observations.iter().map(|o| o.volume()).collect(),
        };

        Curve {
            freqs: grid.into_iter().map(to_hz).collect(),
            mean: prediction.mean,
            std: prediction.std,
            points,
        }
    }

    pub fn observations(&self) -> &[Observation] {
        self.observations.as_slice()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    pub fn is_fitted(&self) -> bool {
        self.surrogate.is_fitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AcquisitionMode, GpConfig};

    fn quick_config(mode: AcquisitionMode) -> AppConfig {
        let mut config = AppConfig::default();
        config.model.mode = mode;
        config.model.acquisition_grid_points = 100;
        config.gp = GpConfig {
            n_restarts: 2,
            ..GpConfig::default()
        };
        config
    }

    fn fitter(mode: AcquisitionMode) -> CurveFitter {
        CurveFitter::from_config(&quick_config(mode)).unwrap()
    }

    const SAMPLE: [(f64, f64); 5] = [
        (1_000.0, -25.0),
        (60.0, -6.0),
        (300.0, -18.0),
        (3_000.0, -28.0),
        (12_000.0, -14.0),
    ];

    #[test]
    fn test_curve_has_grid_length_and_nonnegative_std() {
        let mut fitter = fitter(AcquisitionMode::Single);
        fitter.add_points(&SAMPLE);
        fitter.fit();

        let curve = fitter.curve();
        assert_eq!(curve.freqs.len(), 200);
        assert_eq!(curve.mean.len(), 200);
        assert_eq!(curve.std.len(), 200);
        assert!(curve.std.iter().all(|s| *s >= 0.0));
        assert!((curve.freqs[0] - 40.0).abs() < 1e-9);
        assert!((curve.freqs[199] - 16_000.0).abs() < 1e-6);
        assert_eq!(curve.points.freqs.len(), SAMPLE.len());
    }

    #[test]
    fn test_reset_empties_curve_and_returns_anchor() {
        let mut fitter = fitter(AcquisitionMode::Single);
        fitter.add_points(&SAMPLE);
        fitter.fit();
        assert!(fitter.is_fitted());

        fitter.reset();
        assert!(fitter.is_empty());
        assert!(!fitter.is_fitted());
        assert!(fitter.curve().is_empty());
        assert_eq!(fitter.next_query(), vec![BandPoint::new("full", 1_000.0)]);
    }

    #[test]
    fn test_single_observation_curve_serializes_empty() {
        let mut fitter = fitter(AcquisitionMode::Single);
        fitter.add(Observation::from_hz(1_000.0, -25.0));
        assert!(fitter.fit().is_none());

        let json = serde_json::to_value(fitter.curve()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"freqs": [], "mean": [], "std": [], "points": []})
        );
    }

    #[test]
    fn test_populated_points_serialize_as_object() {
        let mut fitter = fitter(AcquisitionMode::Single);
        fitter.add_points(&[(500.0, -20.0), (500.0, -30.0)]);
        fitter.fit();

        let json = serde_json::to_value(fitter.curve()).unwrap();
        assert_eq!(json["points"]["volumes"], serde_json::json!([-20.0, -30.0]));
        assert_eq!(json["points"]["freqs"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_fit_twice_is_idempotent() {
        let mut fitter = fitter(AcquisitionMode::Single);
        fitter.add_points(&SAMPLE);
        fitter.fit();
        let first = fitter.curve();
        fitter.fit();
        let second = fitter.curve();

        for (a, b) in first.mean.iter().zip(&second.mean) {
            assert!((a - b).abs() < 1e-9);
        }
        for (a, b) in first.std.iter().zip(&second.std) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_observations_only_grow_until_reset() {
        let mut fitter = fitter(AcquisitionMode::Single);
        let mut last = 0;
        for &(hz, vol) in &SAMPLE {
            fitter.add(Observation::from_hz(hz, vol));
            fitter.fit();
            assert!(fitter.len() > last);
            last = fitter.len();
        }
        fitter.add_points(&[]);
        assert_eq!(fitter.len(), last);
    }

    #[test]
    fn test_stratified_next_query_one_point_per_band() {
        let mut fitter = fitter(AcquisitionMode::Stratified);
        assert_eq!(fitter.next_query().len(), 3);

        fitter.add_points(&SAMPLE);
        fitter.fit();
        let points = fitter.next_query();
        assert_eq!(points.len(), fitter.layout().len());
        for (point, band) in points.iter().zip(fitter.layout().bands()) {
            assert_eq!(point.band, band.name);
            assert!(band.contains_log(point.frequency_hz.log10()));
        }
    }

    #[test]
    fn test_fit_report_counts_observations() {
        let mut fitter = fitter(AcquisitionMode::Single);
        fitter.add_points(&SAMPLE[..3]);
        let report = fitter.fit().unwrap();
        assert_eq!(report.observations, 3);
        assert!(report.log_likelihood.is_some());
    }
}
