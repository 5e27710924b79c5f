//! Linear expressions: a constant plus a sparse sum of coefficient-weighted variables.
//!
//! The same arithmetic serves both ordinary tableau rows, whose constant and
//! coefficients are plain `f64`s, and the objective row, whose constant and
//! coefficients are [`SymbolicWeight`]s. [`LinearExpression`] is generic over this
//! choice rather than duplicating the bookkeeping once per domain.

use crate::error::SolverError;
use crate::strength::{near_zero, SymbolicWeight};
use crate::variable::{Symbol, Variable};
use itertools::Itertools;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// The scalar domain a [`LinearExpression`] can be built over.
pub trait RowValue:
    Copy + Add<Output = Self> + Sub<Output = Self> + Neg<Output = Self> + Mul<f64, Output = Self>
{
    /// The additive identity.
    const ZERO: Self;

    /// Whether this value is close enough to [`Self::ZERO`] to be dropped from a row.
    fn is_approx_zero(&self) -> bool;
}

impl RowValue for f64 {
    const ZERO: f64 = 0.0;

    fn is_approx_zero(&self) -> bool {
        near_zero(*self)
    }
}

impl RowValue for SymbolicWeight {
    const ZERO: SymbolicWeight = SymbolicWeight::ZERO;

    fn is_approx_zero(&self) -> bool {
        SymbolicWeight::is_approx_zero(self)
    }
}

/// A constant plus a sparse linear combination of [`Symbol`]s: `constant + sum(coeff * sym)`.
///
/// Invariant: no stored coefficient is approximately zero. A coefficient that would
/// become zero after an update is removed from the map instead of stored.
#[derive(Clone, Debug)]
pub struct LinearExpression<C: RowValue> {
    pub constant: C,
    terms: HashMap<Symbol, C>,
    /// Back-references to the [`Variable`] handles any `External` terms came from, so a
    /// solver that only ever sees bare `Symbol`s can still write solved values back into
    /// the caller's own handles. Empty for expressions that never touched a `Variable`
    /// directly (in particular, the objective row never populates this).
    variable_handles: HashMap<u64, Variable>,
}

impl<C: RowValue> Default for LinearExpression<C> {
    fn default() -> Self {
        Self::from_constant(C::ZERO)
    }
}

impl<C: RowValue> LinearExpression<C> {
    /// A constant expression with no variable terms.
    pub fn from_constant(constant: C) -> Self {
        Self {
            constant,
            terms: HashMap::new(),
            variable_handles: HashMap::new(),
        }
    }

    /// An expression consisting of exactly one term with coefficient `coeff`.
    pub fn from_term(symbol: Symbol, coeff: C) -> Self {
        let mut terms = HashMap::new();
        if !coeff.is_approx_zero() {
            terms.insert(symbol, coeff);
        }
        Self {
            constant: C::ZERO,
            terms,
            variable_handles: HashMap::new(),
        }
    }

    /// The [`Variable`] handles known to back `External` terms in this expression (and
    /// anything it has since been combined with).
    pub(crate) fn variable_handles(&self) -> &HashMap<u64, Variable> {
        &self.variable_handles
    }

    /// Record `var` as the handle behind one of this expression's `External` terms.
    pub(crate) fn register_variable(&mut self, var: &Variable) {
        self.variable_handles.insert(var.id(), var.clone());
    }

    fn merge_variable_handles(&mut self, other: &HashMap<u64, Variable>) {
        for (&id, var) in other {
            self.variable_handles.entry(id).or_insert_with(|| var.clone());
        }
    }

    /// Absorb `other`'s [`Variable`] handles without otherwise combining the two
    /// expressions. Used when building a derived row that should still let the solver
    /// resolve the original expression's externals.
    pub(crate) fn merge_handles_from(&mut self, other: &LinearExpression<C>) {
        self.merge_variable_handles(&other.variable_handles);
    }

    /// The coefficient of `symbol` in this expression, or zero if absent.
    pub fn coefficient(&self, symbol: Symbol) -> C {
        self.terms.get(&symbol).copied().unwrap_or(C::ZERO)
    }

    /// Whether `symbol` has a nonzero coefficient in this expression.
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.terms.contains_key(&symbol)
    }

    /// Iterate over the nonzero terms.
    pub fn terms(&self) -> impl Iterator<Item = (Symbol, C)> + '_ {
        self.terms.iter().map(|(&s, &c)| (s, c))
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Add `coeff` to the existing coefficient of `symbol`, dropping the term if the
    /// result becomes approximately zero. Returns whether the term was newly introduced
    /// (`true`), removed (`false` and previously present), or simply updated (`None`
    /// case folded into `false` for callers that only care about "did this column
    /// appearance change").
    pub fn add_variable(&mut self, symbol: Symbol, coeff: C) -> TermChange {
        if coeff.is_approx_zero() {
            return TermChange::Unchanged;
        }
        let was_present = self.terms.contains_key(&symbol);
        let entry = self.terms.entry(symbol).or_insert(C::ZERO);
        *entry = *entry + coeff;
        if entry.is_approx_zero() {
            self.terms.remove(&symbol);
            if was_present {
                return TermChange::Removed;
            }
            return TermChange::Unchanged;
        }
        if was_present {
            TermChange::Unchanged
        } else {
            TermChange::Added
        }
    }

    /// Forcefully set the coefficient of `symbol`, bypassing accumulation. Used when
    /// building a fresh row where each symbol is inserted exactly once.
    pub fn set_term(&mut self, symbol: Symbol, coeff: C) {
        if coeff.is_approx_zero() {
            self.terms.remove(&symbol);
        } else {
            self.terms.insert(symbol, coeff);
        }
    }

    /// Add `multiplier * other` to this expression, term by term. Returns the changes
    /// made to this expression's terms so the caller can update column-incidence
    /// bookkeeping without re-scanning the whole row.
    pub fn add_expression(&mut self, other: &LinearExpression<C>, multiplier: f64) -> Vec<(Symbol, TermChange)> {
        self.constant = self.constant + other.constant * multiplier;
        self.merge_variable_handles(&other.variable_handles);
        other
            .terms
            .iter()
            .map(|(&s, &c)| (s, self.add_variable(s, c * multiplier)))
            .collect()
    }

    /// Replace every occurrence of `symbol` in this expression with `replacement`,
    /// scaled by the coefficient `symbol` had. `replacement` is always an ordinary
    /// tableau row (`f64` coefficients) even when substituting into the objective row,
    /// since only ordinary rows are ever promoted to basic and substituted elsewhere.
    /// Returns the changes made to this expression's terms so the caller can update
    /// column-incidence bookkeeping.
    pub fn substitute_variable(
        &mut self,
        symbol: Symbol,
        replacement: &LinearExpression<f64>,
    ) -> Vec<(Symbol, TermChange)>
    where
        C: Mul<f64, Output = C>,
    {
        let Some(coeff) = self.terms.remove(&symbol) else {
            return Vec::new();
        };
        self.constant = self.constant + coeff * replacement.constant;
        self.merge_variable_handles(&replacement.variable_handles);
        replacement
            .terms
            .iter()
            .map(|(&s, &c)| (s, self.add_variable(s, coeff * c)))
            .collect()
    }

    /// Rewrite `self = constant + ... + coeff*subject + ...` (with `coeff` the
    /// coefficient of `subject`, which must be nonzero) in place into the equivalent
    /// `subject = (-constant/coeff) + ...` form, i.e. solve the row for `subject`.
    pub fn solve_for_subject(&mut self, subject: Symbol)
    where
        C: Div64,
    {
        let coeff = self
            .terms
            .remove(&subject)
            .expect("solve_for_subject: subject must have a nonzero coefficient in this row");
        let multiplier = coeff.reciprocal_neg();
        self.constant = self.constant * multiplier;
        for c in self.terms.values_mut() {
            *c = *c * multiplier;
        }
    }
}

impl fmt::Display for LinearExpression<f64> {
    /// Terms sorted by their stable identity so two rows with the same content always
    /// print identically, regardless of the underlying `HashMap`'s iteration order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms = self
            .terms
            .iter()
            .sorted_by_key(|(s, _)| s.tie_break_id())
            .map(|(s, c)| format!("{c}*{s}"))
            .join(" + ");
        if terms.is_empty() {
            write!(f, "{}", self.constant)
        } else {
            write!(f, "{} + {terms}", self.constant)
        }
    }
}

/// Tracks what happened to a term as a result of a row mutation, so the tableau can
/// keep its `columns` incidence index in sync without re-scanning the whole row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermChange {
    Added,
    Removed,
    Unchanged,
}

/// Helper trait providing "solve this row for its subject" without requiring a general
/// `Div` impl on `SymbolicWeight` (which has no sensible division by another weight).
pub trait Div64: RowValue {
    /// `-1 / self`, used to flip a row so `subject`'s coefficient becomes `-1`.
    fn reciprocal_neg(self) -> f64;
}

impl Div64 for f64 {
    fn reciprocal_neg(self) -> f64 {
        -1.0 / self
    }
}

// -- Arithmetic sugar for building expressions out of `Variable`s and `f64` rows --

impl From<&Variable> for LinearExpression<f64> {
    fn from(var: &Variable) -> Self {
        let mut expr = LinearExpression::from_term(Symbol::external(var), 1.0);
        expr.register_variable(var);
        expr
    }
}

impl From<f64> for LinearExpression<f64> {
    fn from(value: f64) -> Self {
        LinearExpression::from_constant(value)
    }
}

impl Add for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn add(mut self, rhs: LinearExpression<f64>) -> Self::Output {
        self.add_expression(&rhs, 1.0);
        self
    }
}

impl Sub for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn sub(mut self, rhs: LinearExpression<f64>) -> Self::Output {
        self.add_expression(&rhs, -1.0);
        self
    }
}

impl Mul<f64> for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn mul(mut self, rhs: f64) -> Self::Output {
        self.constant *= rhs;
        for c in self.terms.values_mut() {
            *c *= rhs;
        }
        self
    }
}

impl Neg for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn neg(self) -> Self::Output {
        self * -1.0
    }
}

impl Add<f64> for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn add(mut self, rhs: f64) -> Self::Output {
        self.constant += rhs;
        self
    }
}

impl Sub<f64> for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn sub(mut self, rhs: f64) -> Self::Output {
        self.constant -= rhs;
        self
    }
}

impl Div<f64> for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn div(self, rhs: f64) -> Self::Output {
        self * (1.0 / rhs)
    }
}

impl Add<&Variable> for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn add(mut self, rhs: &Variable) -> Self::Output {
        self.add_expression(&LinearExpression::from(rhs), 1.0);
        self
    }
}

impl Sub<&Variable> for LinearExpression<f64> {
    type Output = LinearExpression<f64>;
    fn sub(mut self, rhs: &Variable) -> Self::Output {
        self.add_expression(&LinearExpression::from(rhs), -1.0);
        self
    }
}

// -- The same sugar, but starting from a bare `&Variable` or `f64` on the left --
//
// These forward onto the `LinearExpression<f64>` impls above so a caller can write
// `&left + &width - &right` or `&width - 100.0` without first wrapping a variable in an
// expression by hand. Kept to the combinations layout-style constraint expressions
// actually need (variable/variable, variable/constant, expression/variable,
// constant/expression); this arithmetic layer stops at ordinary Rust operators, not a
// full comparison DSL.

impl Add<&Variable> for &Variable {
    type Output = LinearExpression<f64>;
    fn add(self, rhs: &Variable) -> Self::Output {
        LinearExpression::from(self) + LinearExpression::from(rhs)
    }
}

impl Sub<&Variable> for &Variable {
    type Output = LinearExpression<f64>;
    fn sub(self, rhs: &Variable) -> Self::Output {
        LinearExpression::from(self) - LinearExpression::from(rhs)
    }
}

impl Add<f64> for &Variable {
    type Output = LinearExpression<f64>;
    fn add(self, rhs: f64) -> Self::Output {
        LinearExpression::from(self) + rhs
    }
}

impl Sub<f64> for &Variable {
    type Output = LinearExpression<f64>;
    fn sub(self, rhs: f64) -> Self::Output {
        LinearExpression::from(self) - rhs
    }
}

impl Mul<f64> for &Variable {
    type Output = LinearExpression<f64>;
    fn mul(self, rhs: f64) -> Self::Output {
        LinearExpression::from(self) * rhs
    }
}

impl Div<f64> for &Variable {
    type Output = LinearExpression<f64>;
    fn div(self, rhs: f64) -> Self::Output {
        LinearExpression::from(self) / rhs
    }
}

impl Neg for &Variable {
    type Output = LinearExpression<f64>;
    fn neg(self) -> Self::Output {
        -LinearExpression::from(self)
    }
}

impl Add<LinearExpression<f64>> for &Variable {
    type Output = LinearExpression<f64>;
    fn add(self, rhs: LinearExpression<f64>) -> Self::Output {
        rhs + self
    }
}

impl Sub<LinearExpression<f64>> for &Variable {
    type Output = LinearExpression<f64>;
    fn sub(self, rhs: LinearExpression<f64>) -> Self::Output {
        -rhs + self
    }
}

/// Multiply two expressions, failing unless at least one side is a bare constant.
/// This is the crate's only entry point for `*`/`/` between two expressions, since the
/// algebra the solver works in is linear.
pub fn checked_multiply(
    lhs: &LinearExpression<f64>,
    rhs: &LinearExpression<f64>,
) -> Result<LinearExpression<f64>, SolverError> {
    if lhs.is_empty() {
        let mut result = rhs.clone();
        result.constant *= lhs.constant;
        for c in result.terms.values_mut() {
            *c *= lhs.constant;
        }
        Ok(result)
    } else if rhs.is_empty() {
        let mut result = lhs.clone();
        result.constant *= rhs.constant;
        for c in result.terms.values_mut() {
            *c *= rhs.constant;
        }
        Ok(result)
    } else {
        Err(SolverError::NonLinearResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_variable_drops_term_when_it_cancels_to_zero() {
        let mut expr = LinearExpression::<f64>::from_constant(0.0);
        let s = Symbol::new_slack();
        assert_eq!(expr.add_variable(s, 2.0), TermChange::Added);
        assert_eq!(expr.add_variable(s, -2.0), TermChange::Removed);
        assert!(!expr.contains(s));
    }

    #[test]
    fn add_expression_scales_and_merges_terms() {
        let s1 = Symbol::new_slack();
        let s2 = Symbol::new_slack();
        let mut a = LinearExpression::<f64>::from_constant(1.0);
        a.set_term(s1, 2.0);
        let mut b = LinearExpression::<f64>::from_constant(3.0);
        b.set_term(s1, 1.0);
        b.set_term(s2, 5.0);

        a.add_expression(&b, 2.0);
        assert_eq!(a.constant, 7.0);
        assert_eq!(a.coefficient(s1), 4.0);
        assert_eq!(a.coefficient(s2), 10.0);
    }

    #[test]
    fn checked_multiply_rejects_two_non_constant_expressions() {
        let s1 = Symbol::new_slack();
        let s2 = Symbol::new_slack();
        let mut a = LinearExpression::<f64>::from_constant(0.0);
        a.set_term(s1, 1.0);
        let mut b = LinearExpression::<f64>::from_constant(0.0);
        b.set_term(s2, 1.0);
        assert!(matches!(checked_multiply(&a, &b), Err(SolverError::NonLinearResult)));
    }

    #[test]
    fn checked_multiply_allows_scaling_by_a_constant() {
        let s1 = Symbol::new_slack();
        let mut a = LinearExpression::<f64>::from_constant(1.0);
        a.set_term(s1, 2.0);
        let k = LinearExpression::<f64>::from_constant(3.0);
        let result = checked_multiply(&a, &k).unwrap();
        assert_eq!(result.constant, 3.0);
        assert_eq!(result.coefficient(s1), 6.0);
    }

    #[test]
    fn variable_arithmetic_sugar_builds_the_expected_expression() {
        let left = Variable::new();
        let width = Variable::new();
        let right = Variable::new();

        let expr = &left + &width - &right;
        assert_eq!(expr.constant, 0.0);
        assert_eq!(expr.coefficient(Symbol::external(&left)), 1.0);
        assert_eq!(expr.coefficient(Symbol::external(&width)), 1.0);
        assert_eq!(expr.coefficient(Symbol::external(&right)), -1.0);

        let shifted = &left - 10.0;
        assert_eq!(shifted.constant, -10.0);
        assert_eq!(shifted.coefficient(Symbol::external(&left)), 1.0);
    }

    #[test]
    fn new_subject_solves_row_for_requested_symbol() {
        // row: 0 = 4 + 2*x  =>  x = -2
        let x = Symbol::new_slack();
        let mut row = LinearExpression::<f64>::from_constant(4.0);
        row.set_term(x, 2.0);
        row.solve_for_subject(x);
        assert_eq!(row.constant, -2.0);
    }

    #[test]
    fn display_sorts_terms_by_stable_identity_regardless_of_insertion_order() {
        let a = Symbol::new_slack();
        let b = Symbol::new_slack();
        let mut row = LinearExpression::<f64>::from_constant(1.0);
        row.set_term(b, 3.0);
        row.set_term(a, 2.0);
        let printed = row.to_string();
        assert!(printed.find(&a.to_string()).unwrap() < printed.find(&b.to_string()).unwrap());
    }
}
