//! The tableau: row/column incidence bookkeeping shared by every operation in
//! [`crate::solver`].
//!
//! A tableau is a set of rows, each naming a *basic* variable as its subject and
//! expressing it in terms of the *parametric* (non-basic) variables that remain. The
//! `columns` map is the inverse index: for each parametric variable, which basic rows
//! mention it. Keeping this index in sync as rows are substituted and pivoted is most
//! of the bookkeeping complexity in an incremental simplex implementation.

use crate::constraint::Constraint;
use crate::expression::{LinearExpression, TermChange};
use crate::strength::SymbolicWeight;
use crate::variable::{Symbol, Variable};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::trace;

/// Bookkeeping for one active edit-variable session, in the order `begin_edit` /
/// `add_edit_var` established it.
#[derive(Debug)]
pub(crate) struct EditInfo {
    pub variable: Variable,
    pub constraint: Constraint,
    pub plus_error: Symbol,
    pub minus_error: Symbol,
    pub prev_constant: f64,
}

/// Bookkeeping for one active stay constraint.
#[derive(Debug)]
pub(crate) struct StayInfo {
    pub variable: Variable,
    pub constraint: Constraint,
    pub plus_error: Symbol,
    pub minus_error: Symbol,
}

#[derive(Debug, Default)]
pub(crate) struct Tableau {
    pub(crate) rows: HashMap<Symbol, LinearExpression<f64>>,
    pub(crate) objective: LinearExpression<SymbolicWeight>,
    /// For every variable that appears parametrically somewhere, the set of basic
    /// variables whose row mentions it. `Symbol::Objective` is a valid key here too,
    /// so `columns` can answer "does x appear anywhere, including the objective" with
    /// no special case.
    pub(crate) columns: HashMap<Symbol, HashSet<Symbol>>,
    pub(crate) infeasible_rows: VecDeque<Symbol>,
    pub(crate) marker_vars: HashMap<u64, Symbol>,
    pub(crate) error_vars: HashMap<u64, Vec<Symbol>>,
    pub(crate) edits: Vec<EditInfo>,
    pub(crate) stays: Vec<StayInfo>,
}

impl Tableau {
    pub(crate) fn new() -> Self {
        Self {
            objective: LinearExpression::from_constant(SymbolicWeight::ZERO),
            ..Default::default()
        }
    }

    pub(crate) fn is_basic(&self, symbol: Symbol) -> bool {
        self.rows.contains_key(&symbol)
    }

    pub(crate) fn row(&self, symbol: Symbol) -> Option<&LinearExpression<f64>> {
        self.rows.get(&symbol)
    }

    /// Record that `column_var` now appears in `row_var`'s row (or the objective, if
    /// `row_var` is `Symbol::Objective`).
    fn note_occurs_in(&mut self, column_var: Symbol, row_var: Symbol) {
        self.columns.entry(column_var).or_default().insert(row_var);
    }

    fn note_absent_from(&mut self, column_var: Symbol, row_var: Symbol) {
        if let Some(set) = self.columns.get_mut(&column_var) {
            set.remove(&row_var);
            if set.is_empty() {
                self.columns.remove(&column_var);
            }
        }
    }

    fn apply_changes(&mut self, row_var: Symbol, changes: Vec<(Symbol, TermChange)>) {
        for (symbol, change) in changes {
            match change {
                TermChange::Added => self.note_occurs_in(symbol, row_var),
                TermChange::Removed => self.note_absent_from(symbol, row_var),
                TermChange::Unchanged => {}
            }
        }
    }

    /// Insert a freshly built row, recording column incidence for every parametric
    /// variable it mentions.
    pub(crate) fn insert_row(&mut self, subject: Symbol, row: LinearExpression<f64>) {
        let symbols: Vec<Symbol> = row.terms().map(|(s, _)| s).collect();
        self.rows.insert(subject, row);
        for s in symbols {
            self.note_occurs_in(s, subject);
        }
    }

    /// Remove a basic row entirely, clearing its column incidence.
    pub(crate) fn remove_row(&mut self, subject: Symbol) -> Option<LinearExpression<f64>> {
        let row = self.rows.remove(&subject)?;
        for (s, _) in row.terms() {
            self.note_absent_from(s, subject);
        }
        self.columns.remove(&subject);
        Some(row)
    }

    /// Substitute `symbol` (now basic, defined by `definition`) into every row and the
    /// objective that mentions it parametrically. Restricted rows that become negative
    /// are queued onto `infeasible_rows`.
    pub(crate) fn substitute_out(&mut self, symbol: Symbol, definition: &LinearExpression<f64>) {
        let dependents: Vec<Symbol> = self
            .columns
            .get(&symbol)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();

        for row_var in dependents {
            if row_var == Symbol::Objective {
                continue;
            }
            let Some(mut row) = self.rows.remove(&row_var) else {
                continue;
            };
            let changes = row.substitute_variable(symbol, definition);
            self.apply_changes(row_var, changes);
            if row_var.is_restricted() && row.constant < 0.0 {
                self.infeasible_rows.push_back(row_var);
            }
            self.rows.insert(row_var, row);
        }

        if self.columns.get(&symbol).map_or(false, |set| set.contains(&Symbol::Objective)) {
            let changes = self.objective.substitute_variable(symbol, definition);
            self.apply_changes(Symbol::Objective, changes);
        }

        self.columns.remove(&symbol);
    }

    /// Pivot `entering` into the basis in place of `leaving`: solve `leaving`'s row for
    /// `entering`, then substitute `entering`'s new definition everywhere it used to
    /// occur.
    pub(crate) fn pivot(&mut self, entering: Symbol, leaving: Symbol) {
        let mut row = self
            .rows
            .remove(&leaving)
            .expect("pivot: leaving variable must currently be basic");
        self.columns.remove(&leaving);
        // `leaving`'s row no longer mentions `entering` once solved for it; the
        // occurrences of `entering` elsewhere in the tableau are exactly what
        // `substitute_out` below will rewrite.
        row.solve_for_subject(entering);
        trace!(%entering, %leaving, "pivoting");
        self.substitute_out(entering, &row);
        self.insert_row(entering, row);
    }

    pub(crate) fn add_marker(&mut self, constraint_id: u64, marker: Symbol) {
        self.marker_vars.insert(constraint_id, marker);
    }

    pub(crate) fn marker_for(&self, constraint_id: u64) -> Option<Symbol> {
        self.marker_vars.get(&constraint_id).copied()
    }

    pub(crate) fn add_error_vars(&mut self, constraint_id: u64, vars: Vec<Symbol>) {
        self.error_vars.insert(constraint_id, vars);
    }

    pub(crate) fn error_vars_for(&self, constraint_id: u64) -> Option<&[Symbol]> {
        self.error_vars.get(&constraint_id).map(|v| v.as_slice())
    }

    pub(crate) fn remove_constraint_bookkeeping(&mut self, constraint_id: u64) {
        self.marker_vars.remove(&constraint_id);
        self.error_vars.remove(&constraint_id);
    }

    /// Add `weight` to the objective row's coefficient for `symbol`, keeping `columns`
    /// in sync. Used when an error variable is introduced for a non-required constraint.
    pub(crate) fn objective_add_term(&mut self, symbol: Symbol, weight: SymbolicWeight) {
        let change = self.objective.add_variable(symbol, weight);
        self.apply_changes(Symbol::Objective, vec![(symbol, change)]);
    }

    /// Remove the objective row's contribution attributable to `symbol` at `weight`,
    /// substituting `symbol`'s defining row first if it is currently basic. Used when a
    /// constraint carrying error variables is removed.
    pub(crate) fn objective_remove_contribution(&mut self, symbol: Symbol, weight: SymbolicWeight) {
        if let Some(def) = self.rows.get(&symbol).cloned() {
            let negated = weight * -1.0;
            self.objective.constant = self.objective.constant + negated * def.constant;
            let changes: Vec<(Symbol, TermChange)> = def
                .terms()
                .map(|(s, c)| (s, self.objective.add_variable(s, negated * c)))
                .collect();
            self.apply_changes(Symbol::Objective, changes);
        } else {
            self.objective_add_term(symbol, weight * -1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_row_keeps_columns_consistent() {
        let mut tableau = Tableau::new();
        let basic = Symbol::new_slack();
        let param = Symbol::new_slack();
        let mut row = LinearExpression::from_constant(1.0);
        row.set_term(param, 2.0);
        tableau.insert_row(basic, row);

        assert!(tableau.columns.get(&param).unwrap().contains(&basic));
        tableau.remove_row(basic);
        assert!(tableau.columns.get(&param).is_none());
    }

    #[test]
    fn substitute_out_rewrites_every_dependent_row() {
        let mut tableau = Tableau::new();
        let x = Symbol::new_slack();
        let basic_a = Symbol::new_slack();
        let basic_b = Symbol::new_slack();

        let mut row_a = LinearExpression::from_constant(0.0);
        row_a.set_term(x, 1.0);
        tableau.insert_row(basic_a, row_a);

        let mut row_b = LinearExpression::from_constant(5.0);
        row_b.set_term(x, -1.0);
        tableau.insert_row(basic_b, row_b);

        // x = 3 (a constant substitution)
        let definition = LinearExpression::from_constant(3.0);
        tableau.substitute_out(x, &definition);

        assert_eq!(tableau.row(basic_a).unwrap().constant, 3.0);
        assert_eq!(tableau.row(basic_b).unwrap().constant, 2.0);
        assert!(!tableau.row(basic_a).unwrap().contains(x));
    }
}
