//! Frequency bands partitioning the testable range.
//!
//! A [`BandLayout`] is validated on construction: bands are ordered,
//! non-overlapping, gap-free, and together cover exactly the configured
//! range in log space.

use serde::Serialize;

use crate::config::{AcquisitionMode, ModelConfig};
use crate::error::ModelError;

use super::observation::{to_hz, to_log};

/// Tolerance when comparing band boundaries in log space
const EDGE_TOLERANCE: f64 = 1e-9;

/// Named half-open sub-range `[log_min, log_max)` of the frequency domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyBand {
    pub name: String,
    pub log_min: f64,
    pub log_max: f64,
}

impl FrequencyBand {
    pub fn from_hz(name: impl Into<String>, min_hz: f64, max_hz: f64) -> Self {
        Self {
            name: name.into(),
            log_min: to_log(min_hz),
            log_max: to_log(max_hz),
        }
    }

    pub fn width(&self) -> f64 {
        self.log_max - self.log_min
    }

    pub fn contains_log(&self, log_frequency: f64) -> bool {
        log_frequency >= self.log_min && log_frequency < self.log_max
    }

    /// Geometric centre in Hz; used as the fixed seed for this band
    pub fn center_hz(&self) -> f64 {
        to_hz(0.5 * (self.log_min + self.log_max))
    }

    /// Evenly spaced half-open grid over the band
    pub fn grid(&self, points: usize) -> Vec<f64> {
        let step = self.width() / points as f64;
        (0..points).map(|i| self.log_min + i as f64 * step).collect()
    }
}

/// Validated partition of `[log_min, log_max]` into bands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandLayout {
    bands: Vec<FrequencyBand>,
}

impl BandLayout {
    /// One band named `full` covering the whole range
    pub fn single(min_hz: f64, max_hz: f64) -> Result<Self, ModelError> {
        Self::new(vec![FrequencyBand::from_hz("full", min_hz, max_hz)])
    }

    /// Split `[min_hz, max_hz]` at `edges_hz`
    pub fn stratified(
        min_hz: f64,
        max_hz: f64,
        edges_hz: &[f64],
        names: &[String],
    ) -> Result<Self, ModelError> {
        if names.len() != edges_hz.len() + 1 {
            return Err(ModelError::InvalidBands {
                reason: format!(
                    "{} edges need {} names, got {}",
                    edges_hz.len(),
                    edges_hz.len() + 1,
                    names.len()
                ),
            });
        }

        let mut bounds = Vec::with_capacity(edges_hz.len() + 2);
        bounds.push(min_hz);
        bounds.extend_from_slice(edges_hz);
        bounds.push(max_hz);

        let bands = bounds
            .windows(2)
            .zip(names)
            .map(|(pair, name)| FrequencyBand::from_hz(name.clone(), pair[0], pair[1]))
            .collect();
        Self::new(bands)
    }

    /// Build the layout requested by the model config
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        match config.mode {
            AcquisitionMode::Single => Self::single(config.freq_min, config.freq_max),
            AcquisitionMode::Stratified => Self::stratified(
                config.freq_min,
                config.freq_max,
                &config.band_edges,
                &config.band_names,
            ),
        }
    }

    /// Validate an explicit band list
    pub fn new(bands: Vec<FrequencyBand>) -> Result<Self, ModelError> {
        if bands.is_empty() {
            return Err(ModelError::InvalidBands {
                reason: "at least one band is required".to_string(),
            });
        }

        for band in &bands {
            if !(band.log_min.is_finite() && band.log_max.is_finite()) {
                return Err(ModelError::InvalidBands {
                    reason: format!("band '{}' has non-finite bounds", band.name),
                });
            }
            if band.log_min >= band.log_max {
                return Err(ModelError::InvalidBands {
                    reason: format!("band '{}' must satisfy min < max", band.name),
                });
            }
        }

        for pair in bands.windows(2) {
            let gap = pair[1].log_min - pair[0].log_max;
            if gap.abs() > EDGE_TOLERANCE {
                let kind = if gap > 0.0 { "gap" } else { "overlap" };
                return Err(ModelError::InvalidBands {
                    reason: format!(
                        "{} between bands '{}' and '{}'",
                        kind, pair[0].name, pair[1].name
                    ),
                });
            }
        }

        Ok(Self { bands })
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn is_stratified(&self) -> bool {
        self.bands.len() > 1
    }

    pub fn log_min(&self) -> f64 {
        self.bands[0].log_min
    }

    pub fn log_max(&self) -> f64 {
        self.bands[self.bands.len() - 1].log_max
    }

    /// Inclusive evenly spaced grid over the whole range
    pub fn full_grid(&self, points: usize) -> Vec<f64> {
        let (lo, hi) = (self.log_min(), self.log_max());
        if points == 1 {
            return vec![lo];
        }
        let step = (hi - lo) / (points - 1) as f64;
        (0..points).map(|i| lo + i as f64 * step).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_single_layout_covers_range() {
        let layout = BandLayout::single(40.0, 16_000.0).unwrap();
        assert_eq!(layout.len(), 1);
        assert!(!layout.is_stratified());
        assert!((layout.log_min() - 40f64.log10()).abs() < 1e-12);
        assert!((layout.log_max() - 16_000f64.log10()).abs() < 1e-12);
    }

    #[test]
    fn test_stratified_layout_is_gap_free() {
        let layout = BandLayout::stratified(
            40.0,
            16_000.0,
            &[250.0, 2_000.0],
            &names(&["low", "mid", "high"]),
        )
        .unwrap();

        assert_eq!(layout.len(), 3);
        for pair in layout.bands().windows(2) {
            assert_eq!(pair[0].log_max, pair[1].log_min);
        }
        assert_eq!(layout.bands()[1].name, "mid");
    }

    #[test]
    fn test_overlap_rejected() {
        let bands = vec![
            FrequencyBand::from_hz("a", 40.0, 500.0),
            FrequencyBand::from_hz("b", 400.0, 16_000.0),
        ];
        match BandLayout::new(bands) {
            Err(ModelError::InvalidBands { reason }) => assert!(reason.contains("overlap")),
            other => panic!("expected overlap error, got {:?}", other),
        }
    }

    #[test]
    fn test_gap_rejected() {
        let bands = vec![
            FrequencyBand::from_hz("a", 40.0, 300.0),
            FrequencyBand::from_hz("b", 400.0, 16_000.0),
        ];
        match BandLayout::new(bands) {
            Err(ModelError::InvalidBands { reason }) => assert!(reason.contains("gap")),
            other => panic!("expected gap error, got {:?}", other),
        }
    }

    #[test]
    fn test_unsorted_edges_rejected() {
        let result =
            BandLayout::stratified(40.0, 16_000.0, &[2_000.0, 250.0], &names(&["a", "b", "c"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_name_count_mismatch_rejected() {
        let result = BandLayout::stratified(40.0, 16_000.0, &[250.0], &names(&["only"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_band_grid_is_half_open() {
        let band = FrequencyBand::from_hz("mid", 250.0, 2_000.0);
        let grid = band.grid(100);
        assert_eq!(grid.len(), 100);
        assert_eq!(grid[0], band.log_min);
        assert!(grid.iter().all(|&x| band.contains_log(x)));
    }

    #[test]
    fn test_full_grid_is_inclusive() {
        let layout = BandLayout::single(40.0, 16_000.0).unwrap();
        let grid = layout.full_grid(200);
        assert_eq!(grid.len(), 200);
        assert_eq!(grid[0], layout.log_min());
        assert!((grid[199] - layout.log_max()).abs() < 1e-12);
    }

    #[test]
    fn test_center_is_geometric_mean() {
        let band = FrequencyBand::from_hz("x", 100.0, 10_000.0);
        assert!((band.center_hz() - 1_000.0).abs() < 1e-6);
    }
}
