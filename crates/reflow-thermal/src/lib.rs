//! # Reflow Thermal
//!
//! The identified plant model, the MPC optimizer that drives it, the
//! reference-trajectory generator the optimizer tracks, and the
//! derivative estimator the TMS link uses to turn raw temperature
//! samples into a rate of change.

pub mod derivative;
pub mod mpc;
pub mod plant;
pub mod reference;

pub use derivative::{calculate_derivative, DerivativeEstimator};
pub use mpc::{Mpc, MpcConfig, MpcSolution};
pub use plant::PlantState;
pub use reference::ReferenceTrajectory;

/// Errors from the MPC optimizer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The rollout under the candidate control sequence produced a
    /// non-finite temperature; the caller should retain the previous
    /// duty cycle rather than trust this step's output.
    #[error("MPC rollout diverged to a non-finite state")]
    SolverDiverged,
}
