//! Constraints: immutable value objects describing an equality/inequality, an edit,
//! or a stay, each carrying a strength and a weight.

use crate::expression::LinearExpression;
use crate::strength::Strength;
use crate::variable::Variable;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONSTRAINT_ID: AtomicU64 = AtomicU64::new(0);

/// The relation an ordinary constraint's expression is held to, once moved to the
/// `expr REL 0` canonical form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    LessThan,
    LessThanOrEqual,
    Equal,
    GreaterThanOrEqual,
    GreaterThan,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::LessThan => "<",
            Relation::LessThanOrEqual => "<=",
            Relation::Equal => "==",
            Relation::GreaterThanOrEqual => ">=",
            Relation::GreaterThan => ">",
        };
        write!(f, "{s}")
    }
}

/// What a [`Constraint`] actually demands of the system.
#[derive(Clone, Debug)]
pub(crate) enum ConstraintKind {
    /// `expression REL 0`, where `REL` has already been normalized to `<=`, `==`, or `>=`
    /// (strict `<`/`>` are folded into the inequality's expression at construction time,
    /// per the documented quirk of subtracting/adding 1).
    Linear {
        expression: LinearExpression<f64>,
        relation: Relation,
    },
    /// `variable == <dynamically suggested value>`.
    Edit { variable: Variable },
    /// A weak preference that `variable` keep its current value.
    Stay { variable: Variable },
}

#[derive(Debug)]
struct ConstraintInner {
    id: u64,
    kind: ConstraintKind,
    strength: Strength,
    weight: f64,
}

/// A constraint enabled (or about to be enabled) in a [`Solver`](crate::solver::Solver).
///
/// Cheap to clone: internally reference-counted and compared/hashed by a stable id
/// assigned at construction, never by structural content. This is what lets the solver
/// and its constraints refer to each other by plain keys instead of borrowed
/// lifetimes.
#[derive(Clone, Debug)]
pub struct Constraint(Rc<ConstraintInner>);

impl Constraint {
    fn new(kind: ConstraintKind, strength: Strength, weight: f64) -> Self {
        let id = NEXT_CONSTRAINT_ID.fetch_add(1, Ordering::Relaxed);
        Constraint(Rc::new(ConstraintInner {
            id,
            kind,
            strength,
            weight,
        }))
    }

    /// `expression == 0`.
    pub fn equal_to(expression: LinearExpression<f64>, strength: Strength) -> Self {
        Self::equal_to_weighted(expression, strength, 1.0)
    }

    pub fn equal_to_weighted(expression: LinearExpression<f64>, strength: Strength, weight: f64) -> Self {
        Self::new(
            ConstraintKind::Linear {
                expression,
                relation: Relation::Equal,
            },
            strength,
            weight,
        )
    }

    /// `expression <= 0`.
    pub fn less_than_or_equal(expression: LinearExpression<f64>, strength: Strength) -> Self {
        Self::less_than_or_equal_weighted(expression, strength, 1.0)
    }

    pub fn less_than_or_equal_weighted(expression: LinearExpression<f64>, strength: Strength, weight: f64) -> Self {
        Self::new(
            ConstraintKind::Linear {
                expression,
                relation: Relation::LessThanOrEqual,
            },
            strength,
            weight,
        )
    }

    /// `expression >= 0`.
    pub fn greater_than_or_equal(expression: LinearExpression<f64>, strength: Strength) -> Self {
        Self::greater_than_or_equal_weighted(expression, strength, 1.0)
    }

    pub fn greater_than_or_equal_weighted(
        expression: LinearExpression<f64>,
        strength: Strength,
        weight: f64,
    ) -> Self {
        Self::new(
            ConstraintKind::Linear {
                expression,
                relation: Relation::GreaterThanOrEqual,
            },
            strength,
            weight,
        )
    }

    /// `expression < 0`, realized as `(expression - 1) <= 0`. This only makes sense for
    /// integer-like domains and is preserved here purely as a documented quirk of the
    /// strict-comparison operators.
    pub fn less_than(mut expression: LinearExpression<f64>, strength: Strength) -> Self {
        expression.constant -= 1.0;
        Self::new(
            ConstraintKind::Linear {
                expression,
                relation: Relation::LessThanOrEqual,
            },
            strength,
            1.0,
        )
    }

    /// `expression > 0`, realized as `(expression + 1) >= 0`. See [`Constraint::less_than`].
    pub fn greater_than(mut expression: LinearExpression<f64>, strength: Strength) -> Self {
        expression.constant += 1.0;
        Self::new(
            ConstraintKind::Linear {
                expression,
                relation: Relation::GreaterThanOrEqual,
            },
            strength,
            1.0,
        )
    }

    /// An edit constraint on `variable`, enabled by
    /// [`Solver::add_edit_var`](crate::solver::Solver::add_edit_var).
    pub fn edit(variable: Variable, strength: Strength) -> Self {
        Self::new(ConstraintKind::Edit { variable }, strength, 1.0)
    }

    /// A weak preference that `variable` keep its current value.
    pub fn stay(variable: Variable, strength: Strength) -> Self {
        Self::new(ConstraintKind::Stay { variable }, strength, 1.0)
    }

    pub(crate) fn id(&self) -> u64 {
        self.0.id
    }

    pub(crate) fn kind(&self) -> &ConstraintKind {
        &self.0.kind
    }

    pub fn strength(&self) -> Strength {
        self.0.strength
    }

    pub fn weight(&self) -> f64 {
        self.0.weight
    }

    pub fn is_required(&self) -> bool {
        self.0.strength.is_required()
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Constraint {}

impl std::hash::Hash for Constraint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            ConstraintKind::Linear { relation, .. } => write!(f, "constraint#{} ({relation} 0)", self.0.id),
            ConstraintKind::Edit { variable } => write!(f, "edit#{}({variable})", self.0.id),
            ConstraintKind::Stay { variable } => write!(f, "stay#{}({variable})", self.0.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::LinearExpression;

    #[test]
    fn distinct_constraints_never_compare_equal() {
        let a = Constraint::equal_to(LinearExpression::from_constant(0.0), Strength::REQUIRED);
        let b = Constraint::equal_to(LinearExpression::from_constant(0.0), Strength::REQUIRED);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn strict_inequalities_shift_the_constant() {
        let lt = Constraint::less_than(LinearExpression::from_constant(5.0), Strength::REQUIRED);
        match lt.kind() {
            ConstraintKind::Linear { expression, relation } => {
                assert_eq!(expression.constant, 4.0);
                assert_eq!(*relation, Relation::LessThanOrEqual);
            }
            _ => panic!("expected a linear constraint"),
        }
    }
}
