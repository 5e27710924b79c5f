//! Errors produced by the solver.

use thiserror::Error;

/// Something that can go wrong while mutating or resolving a [`Solver`](crate::solver::Solver).
#[derive(Clone, Debug, Error)]
pub enum SolverError {
    /// A required constraint is inconsistent with the constraints already in the solver.
    #[error("required constraint could not be satisfied")]
    RequiredFailure,

    /// Expression arithmetic produced a term that isn't linear (multiplying or dividing two
    /// non-constant expressions).
    #[error("operation would produce a non-linear expression")]
    NonLinearResult,

    /// A resolve needed more stay constraints than are currently registered.
    ///
    /// Reserved for callers that build their own edit/stay policy on top of the solver; the base
    /// algorithm never raises this itself.
    #[error("not enough stay constraints to resolve the system")]
    NotEnoughStays,

    /// An internal invariant was violated. The solver's state is undefined after this error;
    /// callers should discard it.
    #[error("internal solver error: {0}")]
    InternalError(String),
}
