//! Turns a reflow curve into the time-varying reference trajectory the MPC
//! tracks.

/// Seconds of preheat the curve's own `t=0` is shifted by, so that the
/// curve's first point lines up with "end of preheat" rather than
/// "controller start".
pub const PRE_CURVE_TIME_S: f64 = 15.0;

/// A curve truncated at its peak and time-shifted for MPC tracking.
/// Cooldown (everything after the peak) is not represented here: it is
/// open-loop and outside the optimizer's concern.
#[derive(Debug, Clone)]
pub struct ReferenceTrajectory {
    /// Shifted times, strictly ascending, ending at the peak.
    times: Vec<f64>,
    temperatures: Vec<f64>,
    peak_temperature: f64,
}

impl ReferenceTrajectory {
    /// Builds a reference trajectory from raw curve points
    /// `(time_s, temperature_c)`, strictly ascending in time.
    ///
    /// Panics if `points` is empty; curve validation (see
    /// `reflow-host::data_model`) must reject empty curves before they
    /// reach here.
    pub fn from_curve(points: &[(f64, f64)]) -> Self {
        assert!(!points.is_empty(), "reference curve must not be empty");

        let peak_idx = points
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        let truncated = &points[..=peak_idx];
        let times = truncated
            .iter()
            .map(|(t, _)| t + PRE_CURVE_TIME_S)
            .collect();
        let temperatures = truncated.iter().map(|(_, temp)| *temp).collect();
        let peak_temperature = points[peak_idx].1;

        Self {
            times,
            temperatures,
            peak_temperature,
        }
    }

    /// Linear interpolation within the curve's domain, linear
    /// extrapolation from the nearest segment outside it.
    pub fn at(&self, t: f64) -> f64 {
        let n = self.times.len();
        if n == 1 {
            return self.temperatures[0];
        }

        if t <= self.times[0] {
            return Self::lerp(self.times[0], self.temperatures[0], self.times[1], self.temperatures[1], t);
        }
        if t >= self.times[n - 1] {
            return Self::lerp(
                self.times[n - 2],
                self.temperatures[n - 2],
                self.times[n - 1],
                self.temperatures[n - 1],
                t,
            );
        }

        let seg = self.times.partition_point(|&time| time <= t).saturating_sub(1);
        let seg = seg.min(n - 2);
        Self::lerp(
            self.times[seg],
            self.temperatures[seg],
            self.times[seg + 1],
            self.temperatures[seg + 1],
            t,
        )
    }

    fn lerp(t0: f64, y0: f64, t1: f64, y1: f64, t: f64) -> f64 {
        if (t1 - t0).abs() < f64::EPSILON {
            return y0;
        }
        y0 + (y1 - y0) * (t - t0) / (t1 - t0)
    }

    pub fn peak_temperature(&self) -> f64 {
        self.peak_temperature
    }

    /// The time (already shifted by [`PRE_CURVE_TIME_S`]) at which the
    /// curve reaches its peak.
    pub fn peak_time(&self) -> f64 {
        *self.times.last().expect("non-empty by construction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn sample_curve() -> Vec<(f64, f64)> {
        vec![(0.0, 25.0), (30.0, 150.0), (60.0, 210.0), (90.0, 25.0)]
    }

    #[test]
    fn truncates_at_peak() {
        let reference = ReferenceTrajectory::from_curve(&sample_curve());
        assert!(approx_eq!(f64, reference.peak_temperature(), 210.0));
        assert!(approx_eq!(f64, reference.peak_time(), 60.0 + PRE_CURVE_TIME_S));
    }

    #[test]
    fn interpolates_between_points() {
        let reference = ReferenceTrajectory::from_curve(&sample_curve());
        let mid = reference.at(15.0 + PRE_CURVE_TIME_S);
        assert!(mid > 25.0 && mid < 150.0);
    }

    #[test]
    fn extrapolates_before_and_after_domain() {
        let reference = ReferenceTrajectory::from_curve(&sample_curve());
        let before = reference.at(-100.0);
        let after = reference.at(1000.0);
        assert!(before.is_finite());
        assert!(after.is_finite());
    }
}
