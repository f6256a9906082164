//! Instrument parameters and the discretized action grid.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// How a parameter's physical range is discretized into candidate values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    /// N evenly spaced points including both bounds.
    Count(usize),
    /// Points spaced by a fixed increment starting at the lower bound,
    /// clipped at the upper bound.
    Step(f64),
}

/// A single tunable instrument parameter (e.g. "Dwelltime" in seconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub unit: String,
    pub lower: f64,
    pub upper: f64,
    pub resolution: Resolution,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        lower: f64,
        upper: f64,
        resolution: Resolution,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            lower,
            upper,
            resolution,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.lower.is_finite() || !self.upper.is_finite() {
            return Err(ConfigError::InvalidParameterRange {
                name: self.name.clone(),
                reason: format!("bounds must be finite, got [{}, {}]", self.lower, self.upper),
            });
        }
        if self.lower >= self.upper {
            return Err(ConfigError::InvalidParameterRange {
                name: self.name.clone(),
                reason: format!(
                    "lower bound {} is not below upper bound {}",
                    self.lower, self.upper
                ),
            });
        }
        match self.resolution {
            Resolution::Count(n) if n < 2 => Err(ConfigError::InvalidParameterRange {
                name: self.name.clone(),
                reason: format!("point count must be at least 2, got {n}"),
            }),
            Resolution::Step(s) if !(s > 0.0) => Err(ConfigError::InvalidParameterRange {
                name: self.name.clone(),
                reason: format!("step must be positive, got {s}"),
            }),
            _ => Ok(()),
        }
    }

    /// The discretized values for this parameter, in ascending order.
    /// Endpoints of a `Count` grid are exact, not accumulated.
    pub fn values(&self) -> Vec<f64> {
        match self.resolution {
            Resolution::Count(n) => (0..n)
                .map(|i| {
                    if i == n - 1 {
                        self.upper
                    } else {
                        self.lower + (self.upper - self.lower) * i as f64 / (n - 1) as f64
                    }
                })
                .collect(),
            Resolution::Step(step) => {
                let mut values = Vec::new();
                let mut v = self.lower;
                // tolerate accumulated float error on the final point
                while v <= self.upper + step * 1e-9 {
                    values.push(v.min(self.upper));
                    v += step;
                }
                values
            }
        }
    }

    /// Map a physical value into [0, 1] relative to this parameter's range.
    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.lower) / (self.upper - self.lower)
    }

    /// Whether a physical value lies within this parameter's closed range,
    /// with a small relative tolerance for values read back from disk.
    pub fn contains(&self, value: f64) -> bool {
        let tol = (self.upper - self.lower) * 1e-9;
        value >= self.lower - tol && value <= self.upper + tol
    }
}

/// One concrete setting per selected parameter, drawn from the grid.
///
/// Two actions are equal iff all coordinates match exactly; grid values are
/// produced once by the builder and flow through unmodified, so exact
/// comparison is well defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub values: Vec<f64>,
}

impl Action {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }
}

/// The set of all candidate actions: the Cartesian product of each
/// parameter's discretized values, in deterministic enumeration order
/// (last parameter varies fastest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpace {
    parameters: Vec<Parameter>,
    actions: Vec<Action>,
}

impl ActionSpace {
    /// Build the grid from the validated parameter list.
    pub fn build(parameters: Vec<Parameter>) -> Result<Self, ConfigError> {
        if parameters.is_empty() {
            return Err(ConfigError::NoParameterSelected);
        }
        for param in &parameters {
            param.validate()?;
        }

        let axes: Vec<Vec<f64>> = parameters.iter().map(|p| p.values()).collect();

        // Cartesian product
        let mut result: Vec<Vec<f64>> = vec![Vec::new()];
        for axis in &axes {
            let mut next = Vec::with_capacity(result.len() * axis.len());
            for existing in &result {
                for value in axis {
                    let mut combo = existing.clone();
                    combo.push(*value);
                    next.push(combo);
                }
            }
            result = next;
        }

        Ok(Self {
            parameters,
            actions: result.into_iter().map(Action::new).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn action(&self, index: usize) -> &Action {
        &self.actions[index]
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn dims(&self) -> usize {
        self.parameters.len()
    }

    /// Per-dimension (lower, upper) grid bounds.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.parameters.iter().map(|p| (p.lower, p.upper)).collect()
    }

    /// Normalize physical coordinates to per-dimension [0, 1] space. Values
    /// outside the range (pseudo-actions) map outside [0, 1] accordingly.
    pub fn normalize(&self, values: &[f64]) -> Vec<f64> {
        self.parameters
            .iter()
            .zip(values)
            .map(|(p, v)| p.normalize(*v))
            .collect()
    }

    /// Whether physical coordinates have the right arity and lie within the
    /// current parameter bounds. Used to re-validate warm-started history.
    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.parameters.len()
            && self
                .parameters
                .iter()
                .zip(values)
                .all(|(p, v)| p.contains(*v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dwelltime() -> Parameter {
        Parameter::new("Dwelltime", "s", 1e-5, 1e-4, Resolution::Count(10))
    }

    #[test]
    fn count_grid_includes_both_bounds() {
        let values = dwelltime().values();
        assert_eq!(values.len(), 10);
        assert_eq!(values[0], 1e-5);
        assert_eq!(values[9], 1e-4);
    }

    #[test]
    fn step_grid_clips_at_upper_bound() {
        let param = Parameter::new("Line_Step", "", 1.0, 10.0, Resolution::Step(4.0));
        let values = param.values();
        assert_eq!(values, vec![1.0, 5.0, 9.0]);
    }

    #[test]
    fn invalid_range_rejected() {
        let param = Parameter::new("Power", "mW", 5.0, 5.0, Resolution::Count(4));
        assert!(matches!(
            param.validate(),
            Err(ConfigError::InvalidParameterRange { .. })
        ));

        let param = Parameter::new("Power", "mW", 0.0, 5.0, Resolution::Count(1));
        assert!(param.validate().is_err());

        let param = Parameter::new("Power", "mW", 0.0, 5.0, Resolution::Step(0.0));
        assert!(param.validate().is_err());
    }

    #[test]
    fn space_size_is_product_of_point_counts() {
        let space = ActionSpace::build(vec![
            Parameter::new("a", "", 0.0, 1.0, Resolution::Count(5)),
            Parameter::new("b", "", 0.0, 1.0, Resolution::Count(5)),
        ])
        .unwrap();
        assert_eq!(space.len(), 25);
    }

    #[test]
    fn space_has_no_duplicate_actions() {
        let space = ActionSpace::build(vec![
            Parameter::new("a", "", 0.0, 2.0, Resolution::Count(3)),
            Parameter::new("b", "", -1.0, 1.0, Resolution::Count(4)),
        ])
        .unwrap();
        for (i, a) in space.actions().iter().enumerate() {
            for b in space.actions().iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn enumeration_order_is_deterministic() {
        let build = || {
            ActionSpace::build(vec![
                Parameter::new("a", "", 0.0, 1.0, Resolution::Count(2)),
                Parameter::new("b", "", 0.0, 1.0, Resolution::Count(2)),
            ])
            .unwrap()
        };
        assert_eq!(build().actions(), build().actions());
        // last parameter varies fastest
        assert_eq!(build().action(0).values, vec![0.0, 0.0]);
        assert_eq!(build().action(1).values, vec![0.0, 1.0]);
        assert_eq!(build().action(2).values, vec![1.0, 0.0]);
    }

    #[test]
    fn empty_parameter_list_rejected() {
        assert!(matches!(
            ActionSpace::build(vec![]),
            Err(ConfigError::NoParameterSelected)
        ));
    }

    #[test]
    fn normalize_maps_bounds_to_unit_interval() {
        let space = ActionSpace::build(vec![dwelltime()]).unwrap();
        let n = space.normalize(&[1e-5]);
        assert!(n[0].abs() < 1e-12);
        let n = space.normalize(&[1e-4]);
        assert!((n[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn contains_rejects_out_of_bounds_and_wrong_arity() {
        let space = ActionSpace::build(vec![dwelltime()]).unwrap();
        assert!(space.contains(&[5e-5]));
        assert!(!space.contains(&[2e-4]));
        assert!(!space.contains(&[5e-5, 1.0]));
    }
}
