//! Membership Functions
//!
//! Curves mapping a crisp value to a degree of truth in [0, 1]. Parameter
//! ordering is checked once at construction so evaluation never fails.

use serde::{Deserialize, Serialize};

use crate::error::FuzzyError;

/// A validated membership curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MembershipSpec", into = "MembershipSpec")]
pub enum MembershipFunction {
    /// Rises from `a` to a peak at `b`, falls to `c`
    Triangular { a: f64, b: f64, c: f64 },
    /// Rises from `a` to `b`, flat to `c`, falls to `d`
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
    /// Bell curve around `mean`
    Gaussian { mean: f64, sigma: f64 },
    /// Logistic curve centred on `center`; negative slopes fall
    Sigmoid { center: f64, slope: f64 },
}

/// Unvalidated wire form of a membership function
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MembershipSpec {
    Triangular { a: f64, b: f64, c: f64 },
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
    Gaussian { mean: f64, sigma: f64 },
    Sigmoid { center: f64, slope: f64 },
}

fn ensure_finite(name: &str, params: &[f64]) -> Result<(), FuzzyError> {
    if params.iter().all(|p| p.is_finite()) {
        Ok(())
    } else {
        Err(FuzzyError::InvalidMembership(format!(
            "{} parameters must be finite: {:?}",
            name, params
        )))
    }
}

impl MembershipFunction {
    pub fn triangular(a: f64, b: f64, c: f64) -> Result<Self, FuzzyError> {
        ensure_finite("triangular", &[a, b, c])?;
        if !(a <= b && b <= c) || a == c {
            return Err(FuzzyError::InvalidMembership(format!(
                "triangular requires a <= b <= c and a < c (got {}, {}, {})",
                a, b, c
            )));
        }
        Ok(Self::Triangular { a, b, c })
    }

    pub fn trapezoidal(a: f64, b: f64, c: f64, d: f64) -> Result<Self, FuzzyError> {
        ensure_finite("trapezoidal", &[a, b, c, d])?;
        if !(a <= b && b <= c && c <= d) || a == d {
            return Err(FuzzyError::InvalidMembership(format!(
                "trapezoidal requires a <= b <= c <= d and a < d (got {}, {}, {}, {})",
                a, b, c, d
            )));
        }
        Ok(Self::Trapezoidal { a, b, c, d })
    }

    pub fn gaussian(mean: f64, sigma: f64) -> Result<Self, FuzzyError> {
        ensure_finite("gaussian", &[mean, sigma])?;
        if sigma <= 0.0 {
            return Err(FuzzyError::InvalidMembership(format!(
                "gaussian sigma must be positive (got {})",
                sigma
            )));
        }
        Ok(Self::Gaussian { mean, sigma })
    }

    pub fn sigmoid(center: f64, slope: f64) -> Result<Self, FuzzyError> {
        ensure_finite("sigmoid", &[center, slope])?;
        if slope == 0.0 {
            return Err(FuzzyError::InvalidMembership(
                "sigmoid slope must be non-zero".to_string(),
            ));
        }
        Ok(Self::Sigmoid { center, slope })
    }

    /// Degree of membership for `x`, always within [0, 1]
    pub fn degree(&self, x: f64) -> f64 {
        if !x.is_finite() {
            return 0.0;
        }

        let raw = match *self {
            MembershipFunction::Triangular { a, b, c } => {
                if x == b {
                    1.0
                } else if x <= a || x >= c {
                    0.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (c - x) / (c - b)
                }
            }
            MembershipFunction::Trapezoidal { a, b, c, d } => {
                if x >= b && x <= c {
                    1.0
                } else if x <= a || x >= d {
                    0.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (d - x) / (d - c)
                }
            }
            MembershipFunction::Gaussian { mean, sigma } => {
                (-(x - mean).powi(2) / (2.0 * sigma.powi(2))).exp()
            }
            MembershipFunction::Sigmoid { center, slope } => {
                1.0 / (1.0 + (-slope * (x - center)).exp())
            }
        };

        raw.clamp(0.0, 1.0)
    }

    /// Short name of the curve family, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            MembershipFunction::Triangular { .. } => "triangular",
            MembershipFunction::Trapezoidal { .. } => "trapezoidal",
            MembershipFunction::Gaussian { .. } => "gaussian",
            MembershipFunction::Sigmoid { .. } => "sigmoid",
        }
    }
}

impl TryFrom<MembershipSpec> for MembershipFunction {
    type Error = FuzzyError;

    fn try_from(spec: MembershipSpec) -> Result<Self, Self::Error> {
        match spec {
            MembershipSpec::Triangular { a, b, c } => Self::triangular(a, b, c),
            MembershipSpec::Trapezoidal { a, b, c, d } => Self::trapezoidal(a, b, c, d),
            MembershipSpec::Gaussian { mean, sigma } => Self::gaussian(mean, sigma),
            MembershipSpec::Sigmoid { center, slope } => Self::sigmoid(center, slope),
        }
    }
}

impl From<MembershipFunction> for MembershipSpec {
    fn from(function: MembershipFunction) -> Self {
        match function {
            MembershipFunction::Triangular { a, b, c } => MembershipSpec::Triangular { a, b, c },
            MembershipFunction::Trapezoidal { a, b, c, d } => {
                MembershipSpec::Trapezoidal { a, b, c, d }
            }
            MembershipFunction::Gaussian { mean, sigma } => MembershipSpec::Gaussian { mean, sigma },
            MembershipFunction::Sigmoid { center, slope } => {
                MembershipSpec::Sigmoid { center, slope }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangular_shape() {
        let f = MembershipFunction::triangular(0.0, 10.0, 20.0).unwrap();
        assert_eq!(f.degree(10.0), 1.0);
        assert_eq!(f.degree(0.0), 0.0);
        assert_eq!(f.degree(20.0), 0.0);
        assert_eq!(f.degree(-5.0), 0.0);
        assert!((f.degree(5.0) - 0.5).abs() < 1e-9);
        assert!((f.degree(15.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_triangular_shoulders_reach_one() {
        let left = MembershipFunction::triangular(0.0, 0.0, 10.0).unwrap();
        assert_eq!(left.degree(0.0), 1.0);
        assert!((left.degree(5.0) - 0.5).abs() < 1e-9);

        let right = MembershipFunction::triangular(0.0, 10.0, 10.0).unwrap();
        assert_eq!(right.degree(10.0), 1.0);
    }

    #[test]
    fn test_trapezoidal_plateau() {
        let f = MembershipFunction::trapezoidal(0.0, 5.0, 10.0, 15.0).unwrap();
        assert_eq!(f.degree(5.0), 1.0);
        assert_eq!(f.degree(7.5), 1.0);
        assert_eq!(f.degree(10.0), 1.0);
        assert_eq!(f.degree(16.0), 0.0);
        assert!((f.degree(12.5) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_gaussian_and_sigmoid() {
        let g = MembershipFunction::gaussian(20.0, 5.0).unwrap();
        assert_eq!(g.degree(20.0), 1.0);
        assert!(g.degree(35.0) < 0.05);

        let s = MembershipFunction::sigmoid(30.0, 1.0).unwrap();
        assert!((s.degree(30.0) - 0.5).abs() < 1e-9);
        assert!(s.degree(40.0) > 0.99);
        assert!(s.degree(20.0) < 0.01);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(MembershipFunction::triangular(10.0, 5.0, 20.0).is_err());
        assert!(MembershipFunction::triangular(5.0, 5.0, 5.0).is_err());
        assert!(MembershipFunction::trapezoidal(0.0, 10.0, 5.0, 20.0).is_err());
        assert!(MembershipFunction::gaussian(0.0, 0.0).is_err());
        assert!(MembershipFunction::sigmoid(0.0, 0.0).is_err());
        assert!(MembershipFunction::triangular(0.0, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_degree_bounded_over_sweep() {
        let functions = [
            MembershipFunction::triangular(-3.0, 1.5, 7.0).unwrap(),
            MembershipFunction::trapezoidal(0.0, 0.0, 4.0, 9.0).unwrap(),
            MembershipFunction::gaussian(2.0, 0.3).unwrap(),
            MembershipFunction::sigmoid(1.0, -4.0).unwrap(),
        ];
        for f in &functions {
            let mut x = -20.0;
            while x <= 20.0 {
                let d = f.degree(x);
                assert!((0.0..=1.0).contains(&d), "{} gave {} at {}", f.kind(), d, x);
                x += 0.25;
            }
            assert_eq!(f.degree(f64::NAN), 0.0);
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: MembershipFunction =
            serde_yaml::from_str("type: triangular\na: 0\nb: 5\nc: 10\n").unwrap();
        assert_eq!(ok.kind(), "triangular");

        let bad = serde_yaml::from_str::<MembershipFunction>("type: gaussian\nmean: 0\nsigma: -1\n");
        assert!(bad.is_err());
    }
}
