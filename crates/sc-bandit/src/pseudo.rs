//! Synthetic boundary points countering edge under-sampling.
//!
//! Grid-edge actions have fewer kernel neighbours than interior actions, so
//! the raw estimator systematically under-weights them. For every real
//! observation sitting on a grid boundary this decorator mirrors the point one
//! full span outside that bound, carrying the observed reward unchanged. The
//! mirrored points exist only in the regression input; they are never written
//! to the session history.

use crate::kernel::RewardPoint;
use sc_types::ActionSpace;

/// Mirror generator for one action space's bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct PseudoActions {
    bounds: Vec<(f64, f64)>,
}

impl PseudoActions {
    pub fn new(space: &ActionSpace) -> Self {
        Self {
            bounds: space.bounds(),
        }
    }

    pub fn from_bounds(bounds: Vec<(f64, f64)>) -> Self {
        Self { bounds }
    }

    /// The regression input: all real points followed by their boundary
    /// mirrors.
    pub fn augment(&self, history: &[RewardPoint]) -> Vec<RewardPoint> {
        let mut augmented = history.to_vec();
        for point in history {
            for (dim, &(lower, upper)) in self.bounds.iter().enumerate() {
                let span = upper - lower;
                if on_bound(point.values[dim], lower, span) {
                    let mut mirrored = point.values.clone();
                    mirrored[dim] = lower - span;
                    augmented.push(RewardPoint::new(mirrored, point.reward));
                } else if on_bound(point.values[dim], upper, span) {
                    let mut mirrored = point.values.clone();
                    mirrored[dim] = upper + span;
                    augmented.push(RewardPoint::new(mirrored, point.reward));
                }
            }
        }
        augmented
    }
}

fn on_bound(value: f64, bound: f64, span: f64) -> bool {
    (value - bound).abs() <= span * 1e-9
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_types::{Parameter, Resolution};

    fn space_2d() -> ActionSpace {
        ActionSpace::build(vec![
            Parameter::new("a", "", 0.0, 1.0, Resolution::Count(5)),
            Parameter::new("b", "", 10.0, 20.0, Resolution::Count(5)),
        ])
        .unwrap()
    }

    #[test]
    fn interior_point_adds_no_mirrors() {
        let pseudo = PseudoActions::new(&space_2d());
        let history = vec![RewardPoint::new(vec![0.5, 15.0], 0.8)];
        assert_eq!(pseudo.augment(&history).len(), 1);
    }

    #[test]
    fn corner_point_mirrors_once_per_dimension() {
        let pseudo = PseudoActions::new(&space_2d());
        let history = vec![RewardPoint::new(vec![0.0, 20.0], 0.8)];
        let augmented = pseudo.augment(&history);
        assert_eq!(augmented.len(), 3);
        // reflected one full span outside each touched bound
        assert!(augmented.contains(&RewardPoint::new(vec![-1.0, 20.0], 0.8)));
        assert!(augmented.contains(&RewardPoint::new(vec![0.0, 30.0], 0.8)));
    }

    #[test]
    fn mirrors_keep_the_observed_reward() {
        let pseudo = PseudoActions::new(&space_2d());
        let history = vec![RewardPoint::new(vec![1.0, 15.0], 0.42)];
        let augmented = pseudo.augment(&history);
        assert_eq!(augmented.len(), 2);
        assert!(augmented.iter().all(|p| p.reward == 0.42));
    }

    #[test]
    fn real_points_come_first_and_are_untouched() {
        let pseudo = PseudoActions::new(&space_2d());
        let history = vec![
            RewardPoint::new(vec![0.0, 15.0], 0.1),
            RewardPoint::new(vec![0.5, 15.0], 0.2),
        ];
        let augmented = pseudo.augment(&history);
        assert_eq!(&augmented[..2], &history[..]);
    }
}
