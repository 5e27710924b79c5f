//! An incremental implementation of the Cassowary linear-arithmetic constraint solving
//! algorithm (Badros, Borning & Stuckey, 1997, *Constraints* 6(3)).
//!
//! A [`Solver`] holds a set of [`Constraint`]s over [`Variable`]s and keeps them
//! satisfied as constraints are added and removed one at a time, without re-solving the
//! whole system from scratch. Constraints that cannot all be satisfied exactly are
//! ranked by [`Strength`], so a UI layout engine (this algorithm's original home) can
//! mix hard invariants with soft preferences about where things should end up.
//!
//! ```
//! use cassowary::{Constraint, Solver, Strength, Variable};
//!
//! let mut solver = Solver::new();
//! let left = Variable::new();
//! let width = Variable::new();
//! let right = Variable::new();
//!
//! solver
//!     .add_constraint(Constraint::equal_to(
//!         &left + &width - &right,
//!         Strength::REQUIRED,
//!     ))
//!     .unwrap();
//! solver
//!     .add_constraint(Constraint::equal_to(&left - 10.0, Strength::REQUIRED))
//!     .unwrap();
//! solver
//!     .add_constraint(Constraint::equal_to(&width - 100.0, Strength::STRONG))
//!     .unwrap();
//!
//! assert_eq!(right.value(), 110.0);
//! ```

mod constraint;
mod error;
mod expression;
mod solver;
mod strength;
mod tableau;
#[cfg(test)]
mod tests;
mod variable;

pub use constraint::{Constraint, Relation};
pub use error::SolverError;
pub use expression::{checked_multiply, LinearExpression};
pub use solver::{Config, Solver};
pub use strength::{Strength, SymbolicWeight};
pub use variable::Variable;
