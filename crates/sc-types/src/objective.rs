//! The closed set of optimization objectives the engine understands.
//!
//! The engine never evaluates images itself; objective scores arrive from the
//! external measurement capability keyed by label. Each variant declares the
//! extra inputs its external evaluator needs and whether larger or smaller
//! scores are better.

use serde::{Deserialize, Serialize};

/// Whether larger or smaller scores are better for an objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    Maximize,
    Minimize,
}

impl Default for Polarity {
    fn default() -> Self {
        Self::Maximize
    }
}

/// Identity and required extra inputs of a scoring objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Signal-to-noise ratio of the acquired frame over foreground pixels.
    SignalRatio { percentile: f64 },
    /// Fluorophore loss between the opening and closing reference frames.
    Bleach,
    /// Full width at half maximum of fitted line profiles, in nanometres.
    Fwhm { pixel_size_nm: f64 },
    /// Fourier ring correlation resolution estimate.
    Frc { pixel_size_um: f64 },
    /// First-maximum minus first-minimum of the autocorrelation curve.
    Autocorrelation,
    /// Operator- or service-assigned quality rating.
    Quality,
}

impl ObjectiveKind {
    /// Label under which the measurement capability reports this score.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SignalRatio { .. } => "Signal_Ratio",
            Self::Bleach => "Bleach",
            Self::Fwhm { .. } => "FWHM",
            Self::Frc { .. } => "FRC",
            Self::Autocorrelation => "Autocorrelation",
            Self::Quality => "Quality",
        }
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            Self::Bleach | Self::Fwhm { .. } => Polarity::Minimize,
            _ => Polarity::Maximize,
        }
    }
}

/// One objective as enabled for a session, with the scaling the reward
/// combiner needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    pub kind: ObjectiveKind,
    /// Upper bound on the standard deviation of score noise. Normalizes the
    /// objective in weighted combinations and clips single-objective rewards.
    pub noise_ub: f64,
    /// Relative weight in the weighted combination policy.
    pub weight: f64,
}

impl ObjectiveSpec {
    pub fn new(kind: ObjectiveKind, noise_ub: f64) -> Self {
        Self {
            kind,
            noise_ub,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn label(&self) -> &'static str {
        self.kind.label()
    }

    pub fn polarity(&self) -> Polarity {
        self.kind.polarity()
    }
}
