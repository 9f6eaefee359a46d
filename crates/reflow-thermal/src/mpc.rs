//! Finite-horizon box-constrained MPC optimizer.
//!
//! The plant is linear and the cost is a smooth quadratic (plus a
//! peak-amplification term that stays convex in the region the optimizer
//! actually operates in), so the whole horizon can be solved by direct
//! single-shooting: roll the plant forward from the candidate control
//! sequence, and walk the cost gradient back down the same sequence with
//! the adjoint of the linear recursion. No QP crate needed, no symbolic
//! differentiation -- the gradient is in closed form.

use crate::plant::{PlantState, K, MAX_TEMPERATURE_C, OMEGA, XI};
use crate::reference::ReferenceTrajectory;
use crate::Error;

/// Tuning weights and solver knobs for the optimizer. The plant constants
/// themselves are not tunable; these are.
#[derive(Debug, Clone, Copy)]
pub struct MpcConfig {
    /// Steps in the receding horizon.
    pub horizon: usize,
    /// Seconds per step.
    pub dt: f64,
    /// Weight on tracking error.
    pub p_t: f64,
    /// Weight on raw control effort.
    pub p_u: f64,
    /// Weight on control rate of change.
    pub r_u: f64,
    /// Soft penalty weight for exceeding [`MAX_TEMPERATURE_C`].
    pub p_soft: f64,
    /// Hard cap on solver iterations per step, bounding worst-case
    /// latency within the 1 s step budget.
    pub max_iterations: usize,
    /// Fixed gradient step size. Conservative relative to the stage
    /// weights above so FISTA stays stable without a line search.
    pub step_size: f64,
    /// Gradient-norm threshold below which the solver is considered
    /// converged.
    pub tolerance: f64,
}

impl Default for MpcConfig {
    fn default() -> Self {
        Self {
            horizon: 120,
            dt: 1.0,
            p_t: 1e4,
            p_u: 1e-8,
            r_u: 0.01,
            p_soft: 1e2,
            max_iterations: 60,
            step_size: 1e-7,
            tolerance: 1e-3,
        }
    }
}

/// Outcome of one `solve()` call.
#[derive(Debug, Clone)]
pub struct MpcSolution {
    /// The full optimized control sequence, kept for the next call's
    /// warm start.
    pub controls: Vec<f64>,
    /// `controls[0]`, clipped to `[0, 100]` and rounded -- the duty cycle
    /// to actually apply for the next step.
    pub duty_cycle: u8,
    pub iterations: usize,
    pub converged: bool,
}

/// Finite-horizon MPC optimizer, warm-started across calls.
pub struct Mpc {
    config: MpcConfig,
    controls: Vec<f64>,
}

impl Mpc {
    pub fn new(config: MpcConfig) -> Self {
        let controls = vec![0.0; config.horizon];
        Self { config, controls }
    }

    /// Solves one receding-horizon step from `state`, tracking
    /// `reference` starting at absolute time `t0`, with `prev_duty` (the
    /// duty actually applied on the previous real-time tick) anchoring
    /// the rate-of-change cost for the first control.
    pub fn solve(
        &mut self,
        state: PlantState,
        reference: &ReferenceTrajectory,
        t0: f64,
        prev_duty: f64,
    ) -> Result<MpcSolution, Error> {
        let n = self.config.horizon;

        // Warm start: shift the previous solution by one sample, holding
        // the tail at its last value.
        let mut y = self.controls.clone();
        y.rotate_left(1);
        if let Some(last) = y.last_mut() {
            *last = self.controls[n - 1];
        }

        let mut controls = y.clone();
        let mut momentum = y;
        let mut t_accel = 1.0_f64;
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;
            let grad = self.gradient(&momentum, state, reference, t0, prev_duty)?;

            let grad_norm: f64 = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
            if grad_norm < self.config.tolerance {
                converged = true;
                controls = momentum;
                break;
            }

            let mut next_controls = vec![0.0; n];
            for i in 0..n {
                next_controls[i] = (momentum[i] - self.config.step_size * grad[i]).clamp(0.0, 100.0);
            }

            let t_next = (1.0 + (1.0 + 4.0 * t_accel * t_accel).sqrt()) / 2.0;
            let blend = (t_accel - 1.0) / t_next;
            for i in 0..n {
                momentum[i] = next_controls[i] + blend * (next_controls[i] - controls[i]);
            }
            controls = next_controls;
            t_accel = t_next;
        }

        if controls.iter().any(|u| !u.is_finite()) {
            return Err(Error::SolverDiverged);
        }

        self.controls = controls.clone();
        let duty_cycle = controls[0].round().clamp(0.0, 100.0) as u8;

        Ok(MpcSolution {
            controls,
            duty_cycle,
            iterations,
            converged,
        })
    }

    /// Analytic gradient of total cost with respect to every control,
    /// via the adjoint of the linear state recursion.
    fn gradient(
        &self,
        controls: &[f64],
        initial: PlantState,
        reference: &ReferenceTrajectory,
        t0: f64,
        prev_duty: f64,
    ) -> Result<Vec<f64>, Error> {
        let n = controls.len();
        let dt = self.config.dt;
        let a1 = K * OMEGA * OMEGA;
        let a2 = 2.0 * XI * OMEGA;
        let a3 = OMEGA * OMEGA;

        let states = crate::plant::rollout(initial, controls, dt);
        if states.iter().any(|s| !s.temperature.is_finite()) {
            return Err(Error::SolverDiverged);
        }

        let peak = reference.peak_temperature();

        // Backward pass: costate lambda_k for k = n down to 1, lambda_{n+1} = 0.
        let mut lambda = [0.0_f64, 0.0_f64];
        let mut grad = vec![0.0_f64; n];

        for k in (0..n).rev() {
            let t_k = t0 + (k as f64 + 1.0) * dt;
            let r_k = reference.at(t_k);
            let temp = states[k].temperature;

            let amp = 1.0 / (0.01 + (r_k - peak).abs());
            let mut d_l_d_temp = 2.0 * self.config.p_t * (temp - r_k)
                + 2.0 * self.config.p_t * amp * (temp - peak);
            if temp > MAX_TEMPERATURE_C {
                d_l_d_temp += 2.0 * self.config.p_soft * (temp - MAX_TEMPERATURE_C);
            }

            // lambda_k = dL_k/dx_k + A^T lambda_{k+1}
            let at_lambda = [lambda[0] - a3 * lambda[1], dt * lambda[0] - a2 * lambda[1]];
            lambda = [d_l_d_temp + at_lambda[0], at_lambda[1]];

            // dC/du_k = B^T lambda_{k+1 in this iteration's "lambda" is lambda_k} + control-cost terms.
            grad[k] += a1 * lambda[1];
        }

        // Control-effort and rate-of-change terms.
        for k in 0..n {
            grad[k] += 2.0 * self.config.p_u * controls[k];

            let prev = if k == 0 { prev_duty } else { controls[k - 1] };
            grad[k] += 2.0 * self.config.r_u * (controls[k] - prev);

            if k + 1 < n {
                grad[k] -= 2.0 * self.config.r_u * (controls[k + 1] - controls[k]);
            }
        }

        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_reference(temp: f64) -> ReferenceTrajectory {
        ReferenceTrajectory::from_curve(&[(0.0, temp), (200.0, temp)])
    }

    #[test]
    fn cold_start_tracking_a_hot_reference_commands_heat() {
        let mut mpc = Mpc::new(MpcConfig::default());
        let state = PlantState::new(25.0, 0.0);
        let reference = flat_reference(150.0);
        let solution = mpc.solve(state, &reference, 0.0, 0.0).unwrap();
        assert!(solution.duty_cycle > 0);
    }

    #[test]
    fn duty_cycle_is_always_in_bounds() {
        let mut mpc = Mpc::new(MpcConfig::default());
        let state = PlantState::new(250.0, 5.0);
        let reference = flat_reference(25.0);
        let solution = mpc.solve(state, &reference, 0.0, 100.0).unwrap();
        assert!(solution.duty_cycle <= 100);
    }

    #[test]
    fn warm_start_reuses_previous_solution_shifted_by_one() {
        let mut mpc = Mpc::new(MpcConfig::default());
        let state = PlantState::new(25.0, 0.0);
        let reference = flat_reference(150.0);
        let first = mpc.solve(state, &reference, 0.0, 0.0).unwrap();
        let second = mpc.solve(state, &reference, 1.0, first.duty_cycle as f64).unwrap();
        assert_eq!(second.controls.len(), first.controls.len());
    }
}
