//! Synthetic listener answering loudness-matching queries.
//!
//! The underlying curve is a smooth equal-loudness-like shape: loud at the
//! frequency extremes, a trough in the 2-4 kHz region. Answers add seeded
//! Gaussian noise so runs are reproducible.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

pub struct SimulatedListener {
    rng: StdRng,
    noise_db: f64,
}

impl SimulatedListener {
    pub fn new(seed: u64, noise_db: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            noise_db: noise_db.max(0.0),
        }
    }

    /// Noise-free matched volume at `frequency_hz`
    pub fn true_volume(frequency_hz: f64) -> f64 {
        let x = frequency_hz.max(1.0).log10();
        let bowl = 9.0 * (x - 3.4).powi(2);
        let low_rise = 14.0 * (-(x - 1.6) / 0.35).exp().min(4.0);
        -30.0 + bowl + low_rise
    }

    /// Volume the listener submits for `frequency_hz`
    pub fn respond(&mut self, frequency_hz: f64) -> f64 {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        Self::true_volume(frequency_hz) + self.noise_db * z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_free_listener_matches_curve() {
        let mut listener = SimulatedListener::new(1, 0.0);
        for f in [40.0, 250.0, 1_000.0, 4_000.0, 16_000.0] {
            assert_eq!(listener.respond(f), SimulatedListener::true_volume(f));
        }
    }

    #[test]
    fn test_curve_has_mid_frequency_trough() {
        let trough = SimulatedListener::true_volume(2_500.0);
        assert!(SimulatedListener::true_volume(40.0) > trough);
        assert!(SimulatedListener::true_volume(16_000.0) > trough);
    }

    #[test]
    fn test_same_seed_same_answers() {
        let mut a = SimulatedListener::new(9, 2.0);
        let mut b = SimulatedListener::new(9, 2.0);
        for f in [100.0, 900.0, 7_000.0] {
            assert_eq!(a.respond(f), b.respond(f));
        }
    }

    #[test]
    fn test_noise_has_expected_spread() {
        let mut listener = SimulatedListener::new(5, 3.0);
        let base = SimulatedListener::true_volume(1_000.0);
        let n = 4_000;
        let var = (0..n)
            .map(|_| (listener.respond(1_000.0) - base).powi(2))
            .sum::<f64>()
            / n as f64;
        assert!((var.sqrt() - 3.0).abs() < 0.3, "std {}", var.sqrt());
    }
}
