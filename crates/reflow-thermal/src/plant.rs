//! The identified 2nd-order linear thermal plant.
//!
//! Both the MPC's internal rollout and the `reflow-sim` TMS simulator step
//! this exact model, with the same Euler discretization, so their
//! trajectories agree given the same input sequence.

/// Plant gain, rad/s and damping constants identified from the physical
/// oven. These are fixed: this crate does not perform online
/// identification.
pub const K: f64 = 4.7875771211019;
pub const OMEGA: f64 = 0.005328475532226316;
pub const XI: f64 = 1.54264888649055;

/// Upper temperature bound enforced as a soft constraint in the optimizer.
pub const MAX_TEMPERATURE_C: f64 = 270.0;

/// Duty cycle bounds, percent.
pub const MIN_DUTY: f64 = 0.0;
pub const MAX_DUTY: f64 = 100.0;

/// State of the plant: temperature and its time derivative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlantState {
    pub temperature: f64,
    pub d_temperature: f64,
}

impl PlantState {
    pub fn new(temperature: f64, d_temperature: f64) -> Self {
        Self {
            temperature,
            d_temperature,
        }
    }

    /// Advances the state by one Euler step of `dt` seconds under duty
    /// cycle `u` (percent, `0..=100`).
    ///
    /// ```text
    /// dT_next  = T + dT * dt
    /// ddT_next = k*omega^2*u - 2*xi*omega*dT - omega^2*T
    /// ```
    pub fn step(self, u: f64, dt: f64) -> Self {
        let a1 = K * OMEGA * OMEGA;
        let a2 = 2.0 * XI * OMEGA;
        let a3 = OMEGA * OMEGA;

        let d_temperature_next = a1 * u - a2 * self.d_temperature - a3 * self.temperature;
        let temperature_next = self.temperature + self.d_temperature * dt;

        Self {
            temperature: temperature_next,
            d_temperature: d_temperature_next,
        }
    }
}

/// Rolls the plant forward over a full control sequence, returning the
/// state *after* each applied input (length `controls.len()`).
pub fn rollout(initial: PlantState, controls: &[f64], dt: f64) -> Vec<PlantState> {
    let mut state = initial;
    let mut states = Vec::with_capacity(controls.len());
    for &u in controls {
        state = state.step(u, dt);
        states.push(state);
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn zero_duty_from_rest_cools_toward_zero_derivative_drift() {
        let state = PlantState::new(25.0, 0.0);
        let next = state.step(0.0, 1.0);
        // With u=0 and dT=0, ddT = -omega^2 * T, a small negative nudge.
        assert!(next.d_temperature < 0.0);
        assert!(approx_eq!(f64, next.temperature, 25.0, epsilon = 1e-9));
    }

    #[test]
    fn full_duty_increases_derivative() {
        let state = PlantState::new(25.0, 0.0);
        let next = state.step(100.0, 1.0);
        assert!(next.d_temperature > 0.0);
    }

    #[test]
    fn rollout_length_matches_control_sequence() {
        let state = PlantState::new(25.0, 0.0);
        let controls = vec![50.0; 10];
        let states = rollout(state, &controls, 1.0);
        assert_eq!(states.len(), 10);
    }
}
