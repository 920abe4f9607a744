//! Configuration management for the loudness profiler
//!
//! This module provides runtime configuration loading from JSON files, so
//! frequency range, band layout, surrogate hyperparameters and session
//! defaults can be adjusted without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ModelError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub gp: GpConfig,
    pub session: SessionConfig,
    pub audio: AudioConfig,
}

/// HTTP/WebSocket transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the server binds to
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Whether each round asks for one frequency or one per band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMode {
    Single,
    Stratified,
}

/// Frequency domain, bands, grids and seeding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Lowest testable frequency (Hz)
    pub freq_min: f64,
    /// Highest testable frequency (Hz)
    pub freq_max: f64,
    pub mode: AcquisitionMode,
    /// Inner band boundaries for stratified mode (Hz, ascending)
    pub band_edges: Vec<f64>,
    /// Names for stratified bands; must have `band_edges.len() + 1` entries
    pub band_names: Vec<String>,
    /// Grid size per band for uncertainty search
    pub acquisition_grid_points: usize,
    /// Grid size of the rendered curve
    pub curve_points: usize,
    /// Anchor returned before the model can be fit (single mode)
    pub anchor_freq: f64,
    /// Minimum log10 distance between seed points
    pub seed_separation: f64,
    /// Random draws per requested seed before the grid fallback kicks in
    pub seed_attempts_per_point: usize,
    /// Seed for the seeding RNG; `None` draws from entropy
    pub seed_rng_seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            freq_min: 40.0,
            freq_max: 16_000.0,
            mode: AcquisitionMode::Single,
            band_edges: vec![250.0, 2_000.0],
            band_names: vec!["low".to_string(), "mid".to_string(), "high".to_string()],
            acquisition_grid_points: 300,
            curve_points: 200,
            anchor_freq: 1_000.0,
            seed_separation: 0.1,
            seed_attempts_per_point: 1_000,
            seed_rng_seed: None,
        }
    }
}

/// Gaussian-process surrogate hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpConfig {
    pub initial_constant: f64,
    pub initial_length_scale: f64,
    pub initial_noise: f64,
    pub constant_bounds: (f64, f64),
    pub length_scale_bounds: (f64, f64),
    pub noise_bounds: (f64, f64),
    /// Fixed diagonal added to the training covariance
    pub alpha: f64,
    /// Optimizer runs from random starts after the initial run
    pub n_restarts: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Seed for restart draws; fixed so repeated fits agree
    pub restart_seed: u64,
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            initial_constant: 1.0,
            initial_length_scale: 0.5,
            initial_noise: 0.5,
            constant_bounds: (1e-5, 1e5),
            length_scale_bounds: (1e-2, 1e2),
            noise_bounds: (1e-6, 1e2),
            alpha: 1e-5,
            n_restarts: 15,
            max_iterations: 200,
            tolerance: 1e-6,
            restart_seed: 0x5eed,
        }
    }
}

/// Defaults applied when a client omits optional fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub default_root_freq: f64,
    pub default_root_volume: f64,
    pub default_seed_count: usize,
    pub max_seed_count: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_root_freq: 1_000.0,
            default_root_volume: -25.0,
            default_seed_count: 5,
            max_seed_count: 24,
        }
    }
}

/// Tone synthesis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub tone_duration_ms: u32,
    pub fade_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            tone_duration_ms: 500,
            fade_ms: 10,
        }
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ModelError {
    ModelError::InvalidConfig {
        field: field.to_string(),
        reason: reason.into(),
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Missing or malformed files fall back to defaults with a warning.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load from `$LOUDNESS_CONFIG`, or `config/loudness.json`
    pub fn load() -> Self {
        let path = std::env::var("LOUDNESS_CONFIG")
            .unwrap_or_else(|_| "config/loudness.json".to_string());
        Self::load_from_file(path)
    }

    /// Check ranges that would otherwise surface as odd model behavior
    pub fn validate(&self) -> Result<(), ModelError> {
        let m = &self.model;
        if !(m.freq_min > 0.0 && m.freq_min.is_finite()) {
            return Err(invalid("model.freq_min", "must be positive"));
        }
        if !(m.freq_max > m.freq_min && m.freq_max.is_finite()) {
            return Err(invalid("model.freq_max", "must exceed model.freq_min"));
        }
        if !(100..=300).contains(&m.acquisition_grid_points) {
            return Err(invalid(
                "model.acquisition_grid_points",
                "must be within 100..=300",
            ));
        }
        if m.curve_points < 2 {
            return Err(invalid("model.curve_points", "must be at least 2"));
        }
        if !(m.seed_separation >= 0.0 && m.seed_separation.is_finite()) {
            return Err(invalid("model.seed_separation", "must be non-negative"));
        }
        if m.seed_attempts_per_point == 0 {
            return Err(invalid("model.seed_attempts_per_point", "must be positive"));
        }
        if !(m.anchor_freq >= m.freq_min && m.anchor_freq <= m.freq_max) {
            return Err(invalid("model.anchor_freq", "must lie inside the range"));
        }
        if m.mode == AcquisitionMode::Stratified && m.band_names.len() != m.band_edges.len() + 1 {
            return Err(invalid(
                "model.band_names",
                "needs exactly one more name than band_edges",
            ));
        }

        let gp = &self.gp;
        for (field, (lo, hi)) in [
            ("gp.constant_bounds", gp.constant_bounds),
            ("gp.length_scale_bounds", gp.length_scale_bounds),
            ("gp.noise_bounds", gp.noise_bounds),
        ] {
            if !(lo > 0.0 && hi > lo && hi.is_finite()) {
                return Err(invalid(field, "bounds must satisfy 0 < low < high"));
            }
        }
        if gp.alpha < 0.0 {
            return Err(invalid("gp.alpha", "must be non-negative"));
        }
        if gp.max_iterations == 0 {
            return Err(invalid("gp.max_iterations", "must be positive"));
        }

        let s = &self.session;
        if s.default_seed_count == 0 || s.default_seed_count > s.max_seed_count {
            return Err(invalid(
                "session.default_seed_count",
                "must be within 1..=max_seed_count",
            ));
        }

        // Seeds plus the root must fit at full separation across the range
        let decades = (m.freq_max / m.freq_min).log10();
        if m.seed_separation > 0.0
            && (s.max_seed_count + 1) as f64 * m.seed_separation > decades + 1e-9
        {
            return Err(invalid(
                "session.max_seed_count",
                format!(
                    "{} seeds at separation {} do not fit in {:.3} decades",
                    s.max_seed_count, m.seed_separation, decades
                ),
            ));
        }

        if self.audio.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", "must be positive"));
        }

        Ok(())
    }
}
