//! Strengths and the symbolic weights that back them.

use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Tolerance used everywhere two floating-point quantities are compared for equality.
pub const EPSILON: f64 = 1e-8;

/// Returns whether `value` is within [`EPSILON`] of zero.
pub fn near_zero(value: f64) -> bool {
    value.abs() < EPSILON
}

/// A lexicographically-ordered triple of weights, one per non-required strength tier
/// (strong, medium, weak in that order).
///
/// Two symbolic weights are compared component by component, left to right: the first
/// component that differs decides the ordering. This is what lets a single `strong`
/// constraint outweigh any number of `medium`/`weak` constraints regardless of their
/// individual coefficients.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SymbolicWeight(pub [f64; 3]);

impl SymbolicWeight {
    /// The zero weight.
    pub const ZERO: SymbolicWeight = SymbolicWeight([0.0, 0.0, 0.0]);

    /// Returns true if the first nonzero component (scanning strong, medium, weak) is
    /// less than `-EPSILON`.
    pub fn definitely_negative(&self) -> bool {
        for &c in &self.0 {
            if c < -EPSILON {
                return true;
            }
            if c > EPSILON {
                return false;
            }
        }
        false
    }

    /// Approximate equality, componentwise.
    pub fn approx_eq(&self, other: &SymbolicWeight) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| near_zero(a - b))
    }

    /// Approximate equality to zero.
    pub fn is_approx_zero(&self) -> bool {
        self.0.iter().all(|&c| near_zero(c))
    }
}

impl Add for SymbolicWeight {
    type Output = SymbolicWeight;
    fn add(self, rhs: SymbolicWeight) -> SymbolicWeight {
        SymbolicWeight([self.0[0] + rhs.0[0], self.0[1] + rhs.0[1], self.0[2] + rhs.0[2]])
    }
}

impl Sub for SymbolicWeight {
    type Output = SymbolicWeight;
    fn sub(self, rhs: SymbolicWeight) -> SymbolicWeight {
        SymbolicWeight([self.0[0] - rhs.0[0], self.0[1] - rhs.0[1], self.0[2] - rhs.0[2]])
    }
}

impl Neg for SymbolicWeight {
    type Output = SymbolicWeight;
    fn neg(self) -> SymbolicWeight {
        SymbolicWeight([-self.0[0], -self.0[1], -self.0[2]])
    }
}

impl Mul<f64> for SymbolicWeight {
    type Output = SymbolicWeight;
    fn mul(self, rhs: f64) -> SymbolicWeight {
        SymbolicWeight([self.0[0] * rhs, self.0[1] * rhs, self.0[2] * rhs])
    }
}

impl Div<f64> for SymbolicWeight {
    type Output = SymbolicWeight;
    fn div(self, rhs: f64) -> SymbolicWeight {
        SymbolicWeight([self.0[0] / rhs, self.0[1] / rhs, self.0[2] / rhs])
    }
}

impl PartialOrd for SymbolicWeight {
    fn partial_cmp(&self, other: &SymbolicWeight) -> Option<Ordering> {
        for (&a, &b) in self.0.iter().zip(other.0.iter()) {
            if near_zero(a - b) {
                continue;
            }
            return a.partial_cmp(&b);
        }
        Some(Ordering::Equal)
    }
}

/// A named priority tier for a non-required constraint, plus the algebraic weight it
/// contributes to the objective row once multiplied by the constraint's own `weight`.
///
/// `required` constraints do not carry a symbolic weight at all -- they are modelled
/// with a dummy marker variable that is never allowed to become basic, rather than by
/// participating in the objective row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Strength {
    pub(crate) required: bool,
    pub(crate) symbolic_weight: SymbolicWeight,
}

impl Strength {
    /// A constraint that must hold exactly; never traded off against anything else.
    pub const REQUIRED: Strength = Strength {
        required: true,
        symbolic_weight: SymbolicWeight::ZERO,
    };

    /// The strongest non-required tier.
    pub const STRONG: Strength = Strength {
        required: false,
        symbolic_weight: SymbolicWeight([1.0, 0.0, 0.0]),
    };

    /// The middle non-required tier.
    pub const MEDIUM: Strength = Strength {
        required: false,
        symbolic_weight: SymbolicWeight([0.0, 1.0, 0.0]),
    };

    /// The weakest non-required tier, typically used for "stay where you are".
    pub const WEAK: Strength = Strength {
        required: false,
        symbolic_weight: SymbolicWeight([0.0, 0.0, 1.0]),
    };

    /// Build a custom non-required strength from an explicit symbolic weight.
    pub fn custom(weight: SymbolicWeight) -> Self {
        Self {
            required: false,
            symbolic_weight: weight,
        }
    }

    /// Whether this is the distinguished `required` tier.
    pub fn is_required(&self) -> bool {
        self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strong_dominates_any_medium_weight() {
        let strong = Strength::STRONG.symbolic_weight;
        let medium_scaled = Strength::MEDIUM.symbolic_weight * 1_000_000.0;
        assert!(strong > medium_scaled);
    }

    #[test]
    fn medium_dominates_any_weak_weight() {
        let medium = Strength::MEDIUM.symbolic_weight;
        let weak_scaled = Strength::WEAK.symbolic_weight * 1_000_000.0;
        assert!(medium > weak_scaled);
    }

    #[test]
    fn definitely_negative_respects_lexicographic_order() {
        assert!(SymbolicWeight([-1.0, 5.0, 5.0]).definitely_negative());
        assert!(SymbolicWeight([0.0, -1.0, 5.0]).definitely_negative());
        assert!(!SymbolicWeight([0.0, 0.0, 0.0]).definitely_negative());
    }

    #[test]
    fn required_has_no_symbolic_weight_contribution() {
        assert_eq!(Strength::REQUIRED.symbolic_weight, SymbolicWeight::ZERO);
        assert!(Strength::REQUIRED.is_required());
        assert!(!Strength::STRONG.is_required());
    }
}
