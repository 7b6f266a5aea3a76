// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Initial pulse shapes.
//!
//! Each shape is evaluated at the slot start times t ∈ [0, T), multiplied by
//! `scaling`, shifted by `offset` and finally clipped to the amplitude bounds.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Initial pulse shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PulseType {
    /// Constant `offset`.
    #[default]
    Zero,
    /// Uniform random in [−1, 1).
    Rnd,
    /// Linear ramp from −1 to 1.
    Lin,
    Sine,
    Square,
    Saw,
    Triangle,
    /// Gaussian centred at T/2 with σ = T/6.
    Gaussian,
}

impl PulseType {
    pub const ALL: [PulseType; 8] = [
        PulseType::Zero,
        PulseType::Rnd,
        PulseType::Lin,
        PulseType::Sine,
        PulseType::Square,
        PulseType::Saw,
        PulseType::Triangle,
        PulseType::Gaussian,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PulseType::Zero => "ZERO",
            PulseType::Rnd => "RND",
            PulseType::Lin => "LIN",
            PulseType::Sine => "SINE",
            PulseType::Square => "SQUARE",
            PulseType::Saw => "SAW",
            PulseType::Triangle => "TRIANGLE",
            PulseType::Gaussian => "GAUSSIAN",
        }
    }

    /// Unit-amplitude shape value at fractional wave position `x = ν·t/T`.
    fn shape(self, frac_time: f64, num_waves: f64, rng: &mut StdRng) -> f64 {
        let x = num_waves * frac_time;
        match self {
            PulseType::Zero => 0.0,
            PulseType::Rnd => rng.gen_range(-1.0..1.0),
            PulseType::Lin => 2.0 * frac_time - 1.0,
            PulseType::Sine => (2.0 * PI * x).sin(),
            PulseType::Square => {
                if (2.0 * PI * x).sin() >= 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            PulseType::Saw => 2.0 * (x - x.floor()) - 1.0,
            PulseType::Triangle => 4.0 * (x - (x + 0.5).floor()).abs() - 1.0,
            PulseType::Gaussian => {
                let z = (frac_time - 0.5) * 6.0;
                (-0.5 * z * z).exp()
            }
        }
    }
}

impl fmt::Display for PulseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PulseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        PulseType::ALL
            .into_iter()
            .find(|p| p.as_str() == upper)
            .ok_or_else(|| {
                format!(
                    "unknown pulse type '{}', expected one of: {}",
                    s,
                    PulseType::ALL.map(|p| p.as_str()).join(", ")
                )
            })
    }
}

/// Initial pulse parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Shape of the initial pulse
    #[serde(default)]
    pub init_pulse_type: PulseType,

    /// Amplitude scaling applied to the unit shape
    #[serde(default = "default_scaling")]
    pub scaling: f64,

    /// Constant offset added after scaling
    #[serde(default)]
    pub offset: f64,

    /// Number of periods over the evolution time (periodic shapes)
    #[serde(default = "default_num_waves")]
    pub num_waves: f64,

    /// Lower amplitude bound (unbounded if absent)
    #[serde(default)]
    pub amp_lbound: Option<f64>,

    /// Upper amplitude bound (unbounded if absent)
    #[serde(default)]
    pub amp_ubound: Option<f64>,

    /// Seed for RND pulses
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            init_pulse_type: PulseType::default(),
            scaling: default_scaling(),
            offset: 0.0,
            num_waves: default_num_waves(),
            amp_lbound: None,
            amp_ubound: None,
            seed: None,
        }
    }
}

fn default_scaling() -> f64 {
    1.0
}

fn default_num_waves() -> f64 {
    1.0
}

impl PulseConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), String> {
        if !self.scaling.is_finite() || !self.offset.is_finite() {
            return Err("scaling and offset must be finite".into());
        }
        if !(self.num_waves > 0.0) {
            return Err("num_waves must be > 0".into());
        }
        if let (Some(lb), Some(ub)) = (self.amp_lbound, self.amp_ubound) {
            if lb >= ub {
                return Err(format!("amp_lbound ({lb}) must be < amp_ubound ({ub})"));
            }
        }
        Ok(())
    }

    /// Lower bound, −∞ when unbounded.
    pub fn lower(&self) -> f64 {
        self.amp_lbound.unwrap_or(f64::NEG_INFINITY)
    }

    /// Upper bound, +∞ when unbounded.
    pub fn upper(&self) -> f64 {
        self.amp_ubound.unwrap_or(f64::INFINITY)
    }

    /// Clip a value to the amplitude bounds.
    pub fn clip(&self, x: f64) -> f64 {
        x.max(self.lower()).min(self.upper())
    }
}

/// Generate initial amplitudes (n_ts × n_ctrls).
///
/// `start_times` are the slot start times and `evo_time` the total time.
/// Each control gets its own draw for RND pulses; deterministic shapes are
/// identical across controls.
pub fn initial_amps(
    config: &PulseConfig,
    start_times: &[f64],
    evo_time: f64,
    n_ctrls: usize,
) -> Array2<f64> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let n_ts = start_times.len();
    let mut amps = Array2::zeros((n_ts, n_ctrls));
    for j in 0..n_ctrls {
        for (k, &t) in start_times.iter().enumerate() {
            let frac = if evo_time > 0.0 { t / evo_time } else { 0.0 };
            let unit = config
                .init_pulse_type
                .shape(frac, config.num_waves, &mut rng);
            amps[[k, j]] = config.clip(config.scaling * unit + config.offset);
        }
    }
    amps
}
