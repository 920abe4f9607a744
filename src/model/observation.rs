// Observation storage in log-frequency space
//
// Frequencies cross the interface in Hz and are stored as log10(Hz) here.
// Nothing outside this module and `bands` converts between the two.

use serde::{Deserialize, Serialize};

/// Convert Hz to the model's log10 space
#[inline]
pub fn to_log(frequency_hz: f64) -> f64 {
    frequency_hz.log10()
}

/// Convert a log10 frequency back to Hz
#[inline]
pub fn to_hz(log_frequency: f64) -> f64 {
    10f64.powf(log_frequency)
}

/// One volume judgment at one frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    log_frequency: f64,
    volume: f64,
}

impl Observation {
    pub fn from_hz(frequency_hz: f64, volume: f64) -> Self {
        Self {
            log_frequency: to_log(frequency_hz),
            volume,
        }
    }

    pub fn from_log(log_frequency: f64, volume: f64) -> Self {
        Self {
            log_frequency,
            volume,
        }
    }

    pub fn log_frequency(&self) -> f64 {
        self.log_frequency
    }

    pub fn frequency_hz(&self) -> f64 {
        to_hz(self.log_frequency)
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }
}

/// Insertion-ordered observations; duplicates are kept
#[derive(Debug, Clone, Default)]
pub struct ObservationSet {
    items: Vec<Observation>,
}

impl ObservationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observation: Observation) {
        self.items.push(observation);
    }

    pub fn extend<I: IntoIterator<Item = Observation>>(&mut self, observations: I) {
        self.items.extend(observations);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Observation] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_transform_recovers_hz() {
        let obs = Observation::from_hz(1_000.0, -25.0);
        assert!((obs.log_frequency() - 3.0).abs() < 1e-12);
        assert!((obs.frequency_hz() - 1_000.0).abs() < 1e-9);
        assert_eq!(obs.volume(), -25.0);
    }

    #[test]
    fn test_set_preserves_order_and_duplicates() {
        let mut set = ObservationSet::new();
        set.push(Observation::from_hz(500.0, -20.0));
        set.extend([
            Observation::from_hz(500.0, -30.0),
            Observation::from_hz(100.0, -10.0),
        ]);

        assert_eq!(set.len(), 3);
        let volumes: Vec<f64> = set.iter().map(|o| o.volume()).collect();
        assert_eq!(volumes, vec![-20.0, -30.0, -10.0]);

        set.clear();
        assert!(set.is_empty());
    }
}
