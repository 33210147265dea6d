//! Estimating the inertia constant which wind turbines can emulate.
use crate::units::Seconds;
use anyhow::{Result, ensure};
use itertools::Itertools;

/// Estimates the inertia constant of wind turbines from their normalised power output.
///
/// The result is scaled by the energy system's `emulated_inertia_constant`.
pub trait WindInertiaEstimator {
    /// The inertia constant for a normalised output (`fix` of the correlated flow)
    fn estimate(&self, normalised_output: f64) -> Seconds;
}

/// A piecewise-linear curve through a set of (output, inertia constant) points.
///
/// Outside the range of the points the curve is flat.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinearCurve {
    points: Vec<(f64, f64)>,
}

impl Default for PiecewiseLinearCurve {
    /// Identity on [0, 1]
    fn default() -> Self {
        Self {
            points: vec![(0.0, 0.0), (1.0, 1.0)],
        }
    }
}

impl PiecewiseLinearCurve {
    /// Create a curve from points with strictly increasing x values
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self> {
        ensure!(!points.is_empty(), "Wind inertia curve needs at least one point");
        ensure!(
            points.iter().all(|(x, y)| x.is_finite() && y.is_finite()),
            "Wind inertia curve points must be finite"
        );
        ensure!(
            points.iter().all(|&(_, y)| y >= 0.0),
            "Wind inertia curve values cannot be negative"
        );
        ensure!(
            points.iter().tuple_windows().all(|(a, b)| a.0 < b.0),
            "Wind inertia curve points must have strictly increasing outputs"
        );

        Ok(Self { points })
    }

    /// The points of the curve
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}

impl WindInertiaEstimator for PiecewiseLinearCurve {
    fn estimate(&self, normalised_output: f64) -> Seconds {
        let (first, last) = (self.points[0], self.points[self.points.len() - 1]);
        if normalised_output <= first.0 {
            return Seconds(first.1);
        }
        if normalised_output >= last.0 {
            return Seconds(last.1);
        }

        let value = self
            .points
            .iter()
            .tuple_windows()
            .find(|(_, b)| normalised_output <= b.0)
            .map_or(last.1, |(a, b)| {
                a.1 + (b.1 - a.1) * (normalised_output - a.0) / (b.0 - a.0)
            });
        Seconds(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(-0.5, 0.0)]
    #[case(0.0, 0.0)]
    #[case(0.25, 0.25)]
    #[case(1.0, 1.0)]
    #[case(3.0, 1.0)]
    fn test_default_curve(#[case] output: f64, #[case] expected: f64) {
        let curve = PiecewiseLinearCurve::default();
        assert_approx_eq!(f64, curve.estimate(output).value(), expected);
    }

    #[test]
    fn test_interpolation() {
        let curve = PiecewiseLinearCurve::new(vec![(0.0, 0.0), (0.2, 4.0), (1.0, 6.0)]).unwrap();
        assert_approx_eq!(f64, curve.estimate(0.1).value(), 2.0);
        assert_approx_eq!(f64, curve.estimate(0.6).value(), 5.0);
        assert_approx_eq!(f64, curve.estimate(0.2).value(), 4.0);
    }

    #[test]
    fn test_single_point() {
        let curve = PiecewiseLinearCurve::new(vec![(0.5, 3.0)]).unwrap();
        assert_eq!(curve.estimate(0.0), Seconds(3.0));
        assert_eq!(curve.estimate(1.0), Seconds(3.0));
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![(0.0, 0.0), (0.0, 1.0)])]
    #[case(vec![(0.5, 0.0), (0.2, 1.0)])]
    #[case(vec![(0.0, -1.0)])]
    #[case(vec![(f64::NAN, 1.0)])]
    fn test_invalid_curve(#[case] points: Vec<(f64, f64)>) {
        assert!(PiecewiseLinearCurve::new(points).is_err());
    }
}
