//! The reflow curve a run is started with, loaded from a JSON file the
//! host writes out before spawning this process.
//!
//! This is a deliberately minimal duplicate of `reflow_host::data_model
//! ::ReflowCurve`: the supervisor is spawned as an independent binary
//! and must not depend on the host crate, so it carries just enough of
//! the curve shape to validate and drive the optimizer.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Curve {
    #[serde(default)]
    pub name: Option<String>,
    pub times: Vec<u32>,
    pub temperatures: Vec<f64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurveError {
    #[error("times and temperatures must be the same length ({times} vs {temperatures})")]
    LengthMismatch { times: usize, temperatures: usize },
    #[error("curve must contain at least one point")]
    Empty,
    #[error("times must be strictly ascending (index {index} is not greater than the previous)")]
    NotAscending { index: usize },
}

impl Curve {
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.times.len() != self.temperatures.len() {
            return Err(CurveError::LengthMismatch {
                times: self.times.len(),
                temperatures: self.temperatures.len(),
            });
        }
        if self.times.is_empty() {
            return Err(CurveError::Empty);
        }
        for (index, pair) in self.times.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(CurveError::NotAscending { index: index + 1 });
            }
        }
        Ok(())
    }

    pub fn points(&self) -> Vec<(f64, f64)> {
        self.times
            .iter()
            .zip(self.temperatures.iter())
            .map(|(&t, &temp)| (t as f64, temp))
            .collect()
    }

    pub fn end_temperature(&self) -> f64 {
        *self.temperatures.last().expect("validated: non-empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_length_mismatch() {
        let curve = Curve {
            name: None,
            times: vec![0, 1],
            temperatures: vec![25.0],
        };
        assert_eq!(
            curve.validate(),
            Err(CurveError::LengthMismatch {
                times: 2,
                temperatures: 1
            })
        );
    }

    #[test]
    fn validate_rejects_non_ascending_times() {
        let curve = Curve {
            name: None,
            times: vec![0, 30, 20],
            temperatures: vec![25.0, 150.0, 200.0],
        };
        assert_eq!(curve.validate(), Err(CurveError::NotAscending { index: 2 }));
    }

    #[test]
    fn validate_accepts_well_formed_curve() {
        let curve = Curve {
            name: Some("standard leaded".to_string()),
            times: vec![0, 30, 60, 90],
            temperatures: vec![25.0, 150.0, 210.0, 25.0],
        };
        assert!(curve.validate().is_ok());
        assert_eq!(curve.end_temperature(), 25.0);
    }
}
