//! Crate-level integration test: runs the MPC in closed loop against
//! the plant it's identified from and checks the whole control loop
//! actually reaches and tracks the target, not just that one call
//! produces a plausible-looking duty cycle.

use float_cmp::approx_eq;
use reflow_thermal::{Mpc, MpcConfig, PlantState, ReferenceTrajectory};

#[test]
fn closed_loop_tracks_a_flat_reference_within_tolerance() {
    let curve = [(0.0, 150.0), (300.0, 150.0)];
    let reference = ReferenceTrajectory::from_curve(&curve);
    let mut mpc = Mpc::new(MpcConfig::default());

    let mut state = PlantState::new(25.0, 0.0);
    let mut prev_duty = 0.0;

    for step in 0..180 {
        let t0 = step as f64;
        let solution = mpc.solve(state, &reference, t0, prev_duty).unwrap();
        state = state.step(solution.duty_cycle as f64, 1.0);
        prev_duty = solution.duty_cycle as f64;
    }

    assert!(
        approx_eq!(f64, state.temperature, 150.0, epsilon = 5.0),
        "expected the plant to settle near 150C, got {}",
        state.temperature
    );
}

#[test]
fn closed_loop_never_exceeds_the_soft_temperature_ceiling_by_much() {
    let curve = [(0.0, 260.0), (200.0, 260.0)];
    let reference = ReferenceTrajectory::from_curve(&curve);
    let mut mpc = Mpc::new(MpcConfig::default());

    let mut state = PlantState::new(25.0, 0.0);
    let mut prev_duty = 0.0;
    let mut peak = state.temperature;

    for step in 0..150 {
        let t0 = step as f64;
        let solution = mpc.solve(state, &reference, t0, prev_duty).unwrap();
        state = state.step(solution.duty_cycle as f64, 1.0);
        prev_duty = solution.duty_cycle as f64;
        peak = peak.max(state.temperature);
    }

    assert!(peak < reflow_thermal::plant::MAX_TEMPERATURE_C + 10.0);
}
