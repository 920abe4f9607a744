// Acquisition strategies: which frequencies to test next
//
// Each band contributes exactly one point per round, so stratified layouts
// force coverage of low/mid/high regions instead of letting the search
// settle wherever uncertainty happens to peak globally.

use serde::Serialize;

use super::bands::BandLayout;
use super::gaussian_process::SurrogateModel;
use super::observation::to_hz;

/// A query point tagged with the band it was chosen for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandPoint {
    pub band: String,
    pub frequency_hz: f64,
}

impl BandPoint {
    pub fn new(band: impl Into<String>, frequency_hz: f64) -> Self {
        Self {
            band: band.into(),
            frequency_hz,
        }
    }
}

/// Policy choosing the next query points from a fitted surrogate
pub trait AcquisitionStrategy: Send {
    /// Return exactly one point per band, in band order
    fn select(&self, model: &dyn SurrogateModel, layout: &BandLayout) -> Vec<BandPoint>;
}

/// Pick the point of largest predictive standard deviation in each band
#[derive(Debug, Clone)]
pub struct MaxUncertainty {
    grid_points: usize,
}

impl MaxUncertainty {
    pub fn new(grid_points: usize) -> Self {
        Self {
            grid_points: grid_points.max(1),
        }
    }
}

impl Default for MaxUncertainty {
    fn default() -> Self {
        Self::new(300)
    }
}

/// Index of the first maximum; NaN never wins
pub(crate) fn first_argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        let v = if v.is_nan() { f64::NEG_INFINITY } else { v };
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

impl AcquisitionStrategy for MaxUncertainty {
    fn select(&self, model: &dyn SurrogateModel, layout: &BandLayout) -> Vec<BandPoint> {
        layout
            .bands()
            .iter()
            .map(|band| {
                let grid = band.grid(self.grid_points);
                let prediction = model.predict(&grid);
                let idx = first_argmax(&prediction.std).unwrap_or(0);
                BandPoint::new(band.name.clone(), to_hz(grid[idx]))
            })
            .collect()
    }
}
