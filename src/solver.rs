//! The incremental solver: turns [`Constraint`]s into tableau rows, keeps the tableau
//! optimal and feasible as constraints come and go, and writes solved values back into
//! the [`Variable`] handles callers hold.

use crate::constraint::{Constraint, ConstraintKind, Relation};
use crate::error::SolverError;
use crate::expression::LinearExpression;
use crate::strength::{near_zero, SymbolicWeight, EPSILON};
use crate::tableau::{EditInfo, StayInfo, Tableau};
use crate::variable::{Symbol, Variable};
use std::collections::HashMap;
use tracing::{debug, info, instrument, trace};

/// A generous default for [`Config::max_pivots`]: large enough that no legitimate tableau
/// ever comes close to it, so its only job is turning a latent cycling bug into a
/// reported [`SolverError::InternalError`] instead of a hung caller thread.
const DEFAULT_MAX_PIVOTS: usize = 10_000;

/// Knobs controlling how eagerly the solver re-optimizes.
///
/// Mirrors the shape of a plain configuration struct with a sensible [`Default`] rather
/// than a builder: there just isn't enough here to justify one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    /// Re-run [`Solver::optimize`] and write external values back after every
    /// [`Solver::add_constraint`]/[`Solver::remove_constraint`]. Disable to batch several
    /// mutations and call [`Solver::solve`] once yourself.
    pub auto_solve: bool,
    /// Safety cap on the number of pivots a single primal/dual optimization pass may
    /// perform before giving up with [`SolverError::InternalError`]. Bland's rule already
    /// guarantees termination, so this only ever fires on a programmer bug (e.g. a
    /// corrupted tableau produced by code that bypassed the public API); `None` disables
    /// the cap entirely.
    pub max_pivots: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_solve: true,
            max_pivots: Some(DEFAULT_MAX_PIVOTS),
        }
    }
}

/// An incremental Cassowary constraint solver.
///
/// Constraints are added and removed one at a time; each mutation leaves the tableau
/// optimal (subject to the active strengths) and feasible before control returns to the
/// caller. A separate edit/suggest/resolve protocol exists for cheaply re-solving after a
/// batch of external-variable nudges without rebuilding the whole tableau.
#[derive(Debug)]
pub struct Solver {
    config: Config,
    tableau: Tableau,
    constraints: HashMap<u64, Constraint>,
    variables: HashMap<u64, Variable>,
    new_edit_constants: Vec<f64>,
    edit_session_active: bool,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            tableau: Tableau::new(),
            constraints: HashMap::new(),
            variables: HashMap::new(),
            new_edit_constants: Vec::new(),
            edit_session_active: false,
        }
    }

    /// Add `cn` to the solver, failing if it is required and conflicts with what is
    /// already enabled.
    #[instrument(skip(self, cn), fields(constraint = %cn))]
    pub fn add_constraint(&mut self, cn: Constraint) -> Result<(), SolverError> {
        if self.constraints.contains_key(&cn.id()) {
            return Ok(());
        }
        let row = self.make_expression(&cn)?;
        let added_directly = self.try_adding_directly(row.clone())?;
        if !added_directly {
            self.add_with_artificial_variable(row)?;
        }
        self.constraints.insert(cn.id(), cn);
        if self.config.auto_solve {
            self.optimize()?;
            self.set_external_variables();
        }
        Ok(())
    }

    /// Remove a previously added constraint. Errors if `cn` was never enabled.
    #[instrument(skip(self, cn), fields(constraint = %cn))]
    pub fn remove_constraint(&mut self, cn: &Constraint) -> Result<(), SolverError> {
        let marker = self
            .tableau
            .marker_for(cn.id())
            .ok_or_else(|| SolverError::InternalError(format!("{cn} is not currently enabled")))?;

        self.reset_stay_constants();
        if let Some(vars) = self.tableau.error_vars_for(cn.id()).map(<[_]>::to_vec) {
            let weight = cn.strength().symbolic_weight * cn.weight();
            for sym in vars {
                self.tableau.objective_remove_contribution(sym, weight);
            }
        }

        self.remove_marker_row(marker);

        if let Some(vars) = self.tableau.error_vars_for(cn.id()).map(<[_]>::to_vec) {
            for sym in vars {
                if sym != marker && self.tableau.is_basic(sym) {
                    self.tableau.remove_row(sym);
                }
            }
        }

        self.tableau.remove_constraint_bookkeeping(cn.id());
        self.tableau.edits.retain(|e| e.constraint.id() != cn.id());
        self.tableau.stays.retain(|s| s.constraint.id() != cn.id());
        self.constraints.remove(&cn.id());

        if self.config.auto_solve {
            self.optimize()?;
            self.set_external_variables();
        }
        Ok(())
    }

    /// Convenience wrapper around [`Constraint::edit`] + [`Solver::add_constraint`].
    pub fn add_edit_var(&mut self, variable: &Variable, strength: crate::strength::Strength) -> Result<(), SolverError> {
        self.add_constraint(Constraint::edit(variable.clone(), strength))
    }

    /// Convenience wrapper around [`Constraint::stay`] + [`Solver::add_constraint`].
    pub fn add_stay(&mut self, variable: &Variable, strength: crate::strength::Strength) -> Result<(), SolverError> {
        self.add_constraint(Constraint::stay(variable.clone(), strength))
    }

    /// Begin a batch of [`Solver::suggest_value`] calls, to be applied together by
    /// [`Solver::resolve`].
    pub fn begin_edit(&mut self) {
        self.new_edit_constants = self.tableau.edits.iter().map(|e| e.prev_constant).collect();
        self.edit_session_active = true;
    }

    /// Record a new target value for `variable`'s active edit constraint. Does not take
    /// effect until [`Solver::resolve`] is called.
    pub fn suggest_value(&mut self, variable: &Variable, value: f64) -> Result<(), SolverError> {
        if !self.edit_session_active {
            return Err(SolverError::InternalError(
                "suggest_value called without an active begin_edit session".into(),
            ));
        }
        let idx = self
            .tableau
            .edits
            .iter()
            .position(|e| e.variable == *variable)
            .ok_or_else(|| SolverError::InternalError("suggest_value: variable has no active edit constraint".into()))?;
        self.new_edit_constants[idx] = value;
        Ok(())
    }

    /// Apply every pending [`Solver::suggest_value`] and restore feasibility, without
    /// re-running the (much more expensive) primal optimization from scratch.
    #[instrument(skip(self))]
    pub fn resolve(&mut self) -> Result<(), SolverError> {
        self.resolve_inner(None)
    }

    /// Like [`Solver::resolve`], but adopts `values` as the new edit constants directly
    /// instead of reading back whatever [`Solver::suggest_value`] wrote into them.
    /// `values` must have one entry per currently active edit variable, in the order
    /// [`Solver::add_edit_var`] enabled them.
    #[instrument(skip(self, values))]
    pub fn resolve_with(&mut self, values: &[f64]) -> Result<(), SolverError> {
        self.resolve_inner(Some(values))
    }

    fn resolve_inner(&mut self, values: Option<&[f64]>) -> Result<(), SolverError> {
        if let Some(values) = values {
            self.new_edit_constants = values.to_vec();
        }
        self.tableau.infeasible_rows.clear();
        self.reset_stay_constants();
        self.apply_edit_deltas();
        self.dual_optimize()?;
        self.set_external_variables();
        Ok(())
    }

    /// End the current edit session, disabling every edit constraint it was tracking.
    pub fn end_edit(&mut self) -> Result<(), SolverError> {
        let active: Vec<Constraint> = self.tableau.edits.iter().map(|e| e.constraint.clone()).collect();
        for cn in active {
            self.remove_constraint(&cn)?;
        }
        self.edit_session_active = false;
        self.new_edit_constants.clear();
        Ok(())
    }

    /// Re-run the primal optimization and write values back, without touching any edit
    /// bookkeeping. Useful after a batch of [`Config::auto_solve`]-disabled mutations.
    #[instrument(skip(self))]
    pub fn solve(&mut self) -> Result<(), SolverError> {
        self.optimize()?;
        self.set_external_variables();
        Ok(())
    }

    // -- construction of tableau rows from constraints --------------------------------

    /// Build the tableau row for `cn`: substitute already-basic variables into its
    /// expression, append whatever marker/error variables its relation and strength
    /// require, and register the resulting bookkeeping. Does not insert the row.
    fn make_expression(&mut self, cn: &Constraint) -> Result<LinearExpression<f64>, SolverError> {
        enum Kind {
            Inequality,
            Equality,
        }

        let (kind, mut row) = match cn.kind() {
            ConstraintKind::Linear { expression, relation } => {
                let substituted = self.substitute_basic_vars(expression);
                match relation {
                    Relation::LessThanOrEqual => (Kind::Inequality, substituted * -1.0),
                    Relation::GreaterThanOrEqual => (Kind::Inequality, substituted),
                    Relation::Equal => (Kind::Equality, substituted),
                    Relation::LessThan | Relation::GreaterThan => {
                        unreachable!("strict relations are normalized to <=/>= at construction")
                    }
                }
            }
            ConstraintKind::Edit { variable } | ConstraintKind::Stay { variable } => {
                let mut expression = LinearExpression::from_constant(variable.value());
                expression.set_term(Symbol::external(variable), -1.0);
                expression.register_variable(variable);
                self.variables.insert(variable.id(), variable.clone());
                let substituted = self.substitute_basic_vars(&expression);
                (Kind::Equality, substituted)
            }
        };

        self.variables.extend(
            row.variable_handles()
                .iter()
                .map(|(&id, v)| (id, v.clone())),
        );

        let marker;
        let mut error_vars = Vec::new();

        match kind {
            Kind::Inequality => {
                let slack = Symbol::new_slack();
                marker = slack;
                row.set_term(slack, -1.0);
                if !cn.is_required() {
                    let eminus = Symbol::new_slack();
                    row.set_term(eminus, 1.0);
                    self.tableau.objective_add_term(eminus, cn.strength().symbolic_weight * cn.weight());
                    error_vars.push(eminus);
                }
            }
            Kind::Equality => {
                if cn.is_required() {
                    let dummy = Symbol::new_dummy();
                    marker = dummy;
                    row.set_term(dummy, 1.0);
                } else {
                    let eplus = Symbol::new_slack();
                    let eminus = Symbol::new_slack();
                    marker = eplus;
                    row.set_term(eplus, -1.0);
                    row.set_term(eminus, 1.0);
                    let weight = cn.strength().symbolic_weight * cn.weight();
                    self.tableau.objective_add_term(eplus, weight);
                    self.tableau.objective_add_term(eminus, weight);
                    error_vars = vec![eplus, eminus];
                }
            }
        }

        if row.constant < 0.0 {
            row = row * -1.0;
        }

        self.tableau.add_marker(cn.id(), marker);
        if !error_vars.is_empty() {
            self.tableau.add_error_vars(cn.id(), error_vars.clone());
        }

        match cn.kind() {
            ConstraintKind::Edit { variable } => {
                if let [plus, minus] = error_vars[..] {
                    self.tableau.edits.push(EditInfo {
                        variable: variable.clone(),
                        constraint: cn.clone(),
                        plus_error: plus,
                        minus_error: minus,
                        prev_constant: variable.value(),
                    });
                }
            }
            ConstraintKind::Stay { variable } => {
                if let [plus, minus] = error_vars[..] {
                    self.tableau.stays.push(StayInfo {
                        variable: variable.clone(),
                        constraint: cn.clone(),
                        plus_error: plus,
                        minus_error: minus,
                    });
                }
            }
            _ => {}
        }

        Ok(row)
    }

    fn substitute_basic_vars(&self, expression: &LinearExpression<f64>) -> LinearExpression<f64> {
        let mut row = LinearExpression::from_constant(expression.constant);
        row.merge_handles_from(expression);
        for (symbol, coeff) in expression.terms() {
            if let Some(basic_row) = self.tableau.row(symbol) {
                row.add_expression(basic_row, coeff);
            } else {
                row.add_variable(symbol, coeff);
            }
        }
        row
    }

    /// Step 2 of adding a constraint: pick a subject already in the row and solve for it
    /// directly, with no artificial variable required. Returns `Ok(false)` if no such
    /// subject exists.
    fn try_adding_directly(&mut self, mut row: LinearExpression<f64>) -> Result<bool, SolverError> {
        let Some(subject) = self.choose_subject(&mut row)? else {
            return Ok(false);
        };
        row.solve_for_subject(subject);
        self.tableau.substitute_out(subject, &row);
        self.tableau.insert_row(subject, row);
        Ok(true)
    }

    /// Whether `symbol` counts as "new" for [`Solver::choose_subject`]'s purposes: it
    /// must not already be basic, and its only appearance in `columns` (if any) may be
    /// the objective row.
    fn is_new_to_tableau(&self, symbol: Symbol) -> bool {
        if self.tableau.is_basic(symbol) {
            return false;
        }
        match self.tableau.columns.get(&symbol) {
            None => true,
            Some(rows) => rows.iter().all(|&r| r == Symbol::Objective),
        }
    }

    /// Picks which variable in `row` should become the tableau's new basic variable, per
    /// the four-step preference order: an unconstrained variable new to the solver, any
    /// unconstrained variable, a new restricted variable with a negative coefficient, or
    /// (if every term is a dummy) any dummy not already basic. Negates `row` in place if
    /// case four lands on a positive coefficient. Ties within a step are broken by
    /// smallest stable identity, the same determinism Bland's rule relies on elsewhere,
    /// rather than by whatever order the row's underlying map happens to iterate in.
    fn choose_subject(&self, row: &mut LinearExpression<f64>) -> Result<Option<Symbol>, SolverError> {
        let new_unrestricted = row
            .terms()
            .filter(|(s, _)| !s.is_restricted() && self.is_new_to_tableau(*s))
            .map(|(s, _)| s)
            .min_by_key(Symbol::tie_break_id);
        if let Some(symbol) = new_unrestricted {
            return Ok(Some(symbol));
        }

        let known_unrestricted = row
            .terms()
            .filter(|(s, _)| !s.is_restricted())
            .map(|(s, _)| s)
            .min_by_key(Symbol::tie_break_id);
        if let Some(symbol) = known_unrestricted {
            return Ok(Some(symbol));
        }

        let new_negative_restricted = row
            .terms()
            .filter(|(s, c)| s.is_pivotable() && *c < -EPSILON && self.is_new_to_tableau(*s))
            .map(|(s, _)| s)
            .min_by_key(Symbol::tie_break_id);
        if let Some(symbol) = new_negative_restricted {
            return Ok(Some(symbol));
        }

        if row.terms().all(|(s, _)| s.is_dummy()) {
            if !near_zero(row.constant) {
                return Err(SolverError::RequiredFailure);
            }
            let candidate = row
                .terms()
                .filter(|(s, _)| !self.tableau.is_basic(*s))
                .min_by_key(|(s, _)| s.tie_break_id());
            if let Some((symbol, coeff)) = candidate {
                if coeff > EPSILON {
                    let negated = std::mem::replace(row, LinearExpression::from_constant(0.0)) * -1.0;
                    *row = negated;
                }
                return Ok(Some(symbol));
            }
        }

        Ok(None)
    }

    /// Step 3 of adding a constraint: introduce an artificial variable standing in for
    /// the whole row, minimize it to zero (failing if that isn't possible -- the
    /// constraint is inconsistent with what's already enabled), then pivot it back out.
    fn add_with_artificial_variable(&mut self, row: LinearExpression<f64>) -> Result<(), SolverError> {
        let artificial = Symbol::new_slack();
        self.tableau.insert_row(artificial, row.clone());
        let mut artificial_objective = row;
        self.optimize_artificial(&mut artificial_objective)?;

        if !near_zero(artificial_objective.constant) {
            return Err(SolverError::RequiredFailure);
        }

        if let Some(def) = self.tableau.row(artificial).cloned() {
            if def.is_empty() {
                self.tableau.remove_row(artificial);
            } else if let Some((entering, _)) = def.terms().next() {
                self.tableau.pivot(entering, artificial);
            } else {
                self.tableau.remove_row(artificial);
            }
        }
        self.tableau.columns.remove(&artificial);
        Ok(())
    }

    // -- primal/dual optimization -------------------------------------------------------

    /// Drive the main (symbolic-weight) objective row to optimality via Bland's rule.
    #[instrument(skip(self))]
    fn optimize(&mut self) -> Result<(), SolverError> {
        let mut pivots = 0usize;
        loop {
            let entering = self
                .tableau
                .objective
                .terms()
                .filter(|(s, c)| s.is_pivotable() && c.definitely_negative())
                .min_by_key(|(s, _)| s.tie_break_id())
                .map(|(s, _)| s);
            let Some(entering) = entering else {
                return Ok(());
            };
            let Some(leaving) = self.find_leaving_row(entering) else {
                return Err(SolverError::InternalError("optimize: objective is unbounded".into()));
            };
            trace!(%entering, %leaving, "optimize pivot");
            self.tableau.pivot(entering, leaving);
            self.check_pivot_budget(&mut pivots, "optimize")?;
        }
    }

    /// Minimize an ad hoc `f64` objective (the phase-1 artificial-variable cost) that
    /// isn't tracked by the tableau itself, manually propagating substitutions into it.
    fn optimize_artificial(&mut self, objective: &mut LinearExpression<f64>) -> Result<(), SolverError> {
        info!("entering phase-1 artificial-variable recovery");
        let mut pivots = 0usize;
        loop {
            let entering = objective
                .terms()
                .filter(|(s, c)| s.is_pivotable() && *c < -EPSILON)
                .min_by_key(|(s, _)| s.tie_break_id())
                .map(|(s, _)| s);
            let Some(entering) = entering else {
                break;
            };
            let Some(leaving) = self.find_leaving_row(entering) else {
                return Err(SolverError::InternalError("phase-1 optimize: unbounded".into()));
            };
            self.tableau.pivot(entering, leaving);
            if let Some(def) = self.tableau.row(entering).cloned() {
                objective.substitute_variable(entering, &def);
            }
            self.check_pivot_budget(&mut pivots, "phase-1 optimize")?;
        }
        info!("leaving phase-1 artificial-variable recovery");
        Ok(())
    }

    /// Increment `pivots` and fail with [`SolverError::InternalError`] once it exceeds
    /// [`Config::max_pivots`], guarding against a latent cycling bug hanging the caller.
    fn check_pivot_budget(&self, pivots: &mut usize, stage: &str) -> Result<(), SolverError> {
        *pivots += 1;
        if let Some(max) = self.config.max_pivots {
            if *pivots > max {
                return Err(SolverError::InternalError(format!(
                    "{stage}: exceeded {max} pivots without reaching optimality"
                )));
            }
        }
        Ok(())
    }

    /// The standard ratio test: among restricted basic rows with a negative coefficient
    /// for `entering`, pick the smallest `-constant/coeff`, breaking ties by stable id.
    fn find_leaving_row(&self, entering: Symbol) -> Option<Symbol> {
        let mut best: Option<(Symbol, f64)> = None;
        for (&row_var, row) in &self.tableau.rows {
            if !row_var.is_restricted() {
                continue;
            }
            let coeff = row.coefficient(entering);
            if coeff >= -EPSILON {
                continue;
            }
            let ratio = -row.constant / coeff;
            best = Some(match best {
                None => (row_var, ratio),
                Some((best_var, best_ratio)) => {
                    if ratio < best_ratio - EPSILON
                        || (near_zero(ratio - best_ratio) && row_var.tie_break_id() < best_var.tie_break_id())
                    {
                        (row_var, ratio)
                    } else {
                        (best_var, best_ratio)
                    }
                }
            });
        }
        best.map(|(s, _)| s)
    }

    /// Restore feasibility after a batch of edit-constant deltas by repeatedly fixing up
    /// whichever infeasible row is cheapest to fix, per the dual simplex method.
    #[instrument(skip(self))]
    fn dual_optimize(&mut self) -> Result<(), SolverError> {
        if !self.tableau.infeasible_rows.is_empty() {
            info!("entering dual re-optimization");
        }
        let mut pivots = 0usize;
        while let Some(exit_var) = self.tableau.infeasible_rows.pop_front() {
            let Some(row) = self.tableau.row(exit_var) else {
                continue;
            };
            if row.constant >= -EPSILON {
                continue;
            }
            let row = row.clone();

            let mut best: Option<(Symbol, SymbolicWeight)> = None;
            for (symbol, coeff) in row.terms() {
                if !symbol.is_pivotable() || coeff <= EPSILON {
                    continue;
                }
                let ratio = self.tableau.objective.coefficient(symbol) / coeff;
                let better = match &best {
                    None => true,
                    Some((best_symbol, best_ratio)) => {
                        ratio < *best_ratio || (ratio.approx_eq(best_ratio) && symbol.tie_break_id() < best_symbol.tie_break_id())
                    }
                };
                if better {
                    best = Some((symbol, ratio));
                }
            }

            let Some((entering, _)) = best else {
                return Err(SolverError::InternalError(
                    "dual_optimize: no entering variable; system is over-constrained".into(),
                ));
            };
            debug!(%entering, %exit_var, "dual pivot");
            self.tableau.pivot(entering, exit_var);
            self.check_pivot_budget(&mut pivots, "dual_optimize")?;
        }
        Ok(())
    }

    // -- edit/stay bookkeeping ----------------------------------------------------------

    /// Zero out the constant of every stay's basic error row, so a stale violation left
    /// over from a previous resolve doesn't leak into the next one.
    fn reset_stay_constants(&mut self) {
        let stay_symbols: Vec<Symbol> = self
            .tableau
            .stays
            .iter()
            .flat_map(|s| [s.plus_error, s.minus_error])
            .collect();
        for symbol in stay_symbols {
            if let Some(row) = self.tableau.rows.get_mut(&symbol) {
                row.constant = 0.0;
            }
        }
    }

    fn apply_edit_deltas(&mut self) {
        let deltas: Vec<(usize, f64, f64, Symbol, Symbol)> = self
            .tableau
            .edits
            .iter()
            .enumerate()
            .map(|(idx, e)| {
                let new_value = self.new_edit_constants.get(idx).copied().unwrap_or(e.prev_constant);
                (idx, new_value, new_value - e.prev_constant, e.plus_error, e.minus_error)
            })
            .collect();

        for (idx, new_value, delta, plus, minus) in deltas {
            if !near_zero(delta) {
                self.delta_edit_constant(delta, plus, minus);
            }
            self.tableau.edits[idx].prev_constant = new_value;
        }
    }

    /// Propagate a change of `delta` in an edit variable's target value through whichever
    /// row currently carries its plus/minus error variable as the basic subject, or
    /// (if both are parametric) through every row that mentions the minus error.
    fn delta_edit_constant(&mut self, delta: f64, plus: Symbol, minus: Symbol) {
        if let Some(row) = self.tableau.rows.get_mut(&plus) {
            row.constant += delta;
            if row.constant < 0.0 {
                self.tableau.infeasible_rows.push_back(plus);
            }
            return;
        }
        if let Some(row) = self.tableau.rows.get_mut(&minus) {
            row.constant -= delta;
            if row.constant < 0.0 {
                self.tableau.infeasible_rows.push_back(minus);
            }
            return;
        }
        let dependents: Vec<Symbol> = self
            .tableau
            .columns
            .get(&minus)
            .map(|set| set.iter().copied().filter(|&s| s != Symbol::Objective).collect())
            .unwrap_or_default();
        for row_var in dependents {
            if let Some(row) = self.tableau.rows.get_mut(&row_var) {
                let coeff = row.coefficient(minus);
                row.constant += coeff * delta;
                if row_var.is_restricted() && row.constant < 0.0 {
                    self.tableau.infeasible_rows.push_back(row_var);
                }
            }
        }
    }

    /// Eliminate a constraint's marker from the tableau: drop its row directly if it's
    /// already basic, otherwise pivot it into the basis (replacing whichever row is
    /// cheapest to give up) and then drop the row that results.
    fn remove_marker_row(&mut self, marker: Symbol) {
        if self.tableau.is_basic(marker) {
            self.tableau.remove_row(marker);
            return;
        }
        match self.find_exit_variable_for_marker(marker) {
            Some(exit) => {
                self.tableau.pivot(marker, exit);
                self.tableau.remove_row(marker);
            }
            None => {
                self.tableau.columns.remove(&marker);
            }
        }
    }

    /// Among the basic rows that mention `marker` parametrically, pick one to pivot out
    /// in `marker`'s favor: prefer a restricted row where `marker`'s coefficient is
    /// negative (minimizing `-constant/coeff`), then any restricted row (minimizing
    /// `constant/coeff`), then any dependent row at all. `None` if nothing depends on
    /// `marker`.
    fn find_exit_variable_for_marker(&self, marker: Symbol) -> Option<Symbol> {
        let dependents: Vec<Symbol> = self
            .tableau
            .columns
            .get(&marker)
            .map(|set| set.iter().copied().filter(|&s| s != Symbol::Objective).collect())
            .unwrap_or_default();
        if dependents.is_empty() {
            return None;
        }

        let mut best_negative: Option<(Symbol, f64)> = None;
        let mut best_restricted: Option<(Symbol, f64)> = None;
        let mut any_dependent: Option<Symbol> = None;

        for row_var in dependents {
            let Some(row) = self.tableau.row(row_var) else {
                continue;
            };
            let coeff = row.coefficient(marker);
            if coeff.abs() < EPSILON {
                continue;
            }
            any_dependent.get_or_insert(row_var);
            if !row_var.is_restricted() {
                continue;
            }
            if coeff < -EPSILON {
                let ratio = -row.constant / coeff;
                best_negative = Some(pick_better(best_negative, row_var, ratio));
            } else {
                let ratio = row.constant / coeff;
                best_restricted = Some(pick_better(best_restricted, row_var, ratio));
            }
        }

        best_negative.or(best_restricted).map(|(s, _)| s).or(any_dependent)
    }

    /// Write every known external variable's current tableau value back into its
    /// [`Variable`] handle: the row's constant if it is basic, zero otherwise.
    fn set_external_variables(&mut self) {
        for (&id, var) in &self.variables {
            let value = self
                .tableau
                .row(Symbol::External(id))
                .map(|row| row.constant)
                .unwrap_or(0.0);
            var.write(value);
        }
    }
}

fn pick_better(current: Option<(Symbol, f64)>, candidate: Symbol, ratio: f64) -> (Symbol, f64) {
    match current {
        None => (candidate, ratio),
        Some((best_symbol, best_ratio)) => {
            if ratio < best_ratio - EPSILON || (near_zero(ratio - best_ratio) && candidate.tie_break_id() < best_symbol.tie_break_id()) {
                (candidate, ratio)
            } else {
                (best_symbol, best_ratio)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strength::Strength;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_equality_is_solved_directly() {
        let mut solver = Solver::new();
        let x = Variable::new();
        solver
            .add_constraint(Constraint::equal_to(
                LinearExpression::from(&x) - LinearExpression::from(5.0),
                Strength::REQUIRED,
            ))
            .unwrap();
        assert!((x.value() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn inequality_is_respected() {
        let mut solver = Solver::new();
        let x = Variable::new();
        solver
            .add_constraint(Constraint::greater_than_or_equal(
                LinearExpression::from(&x) - LinearExpression::from(10.0),
                Strength::REQUIRED,
            ))
            .unwrap();
        solver.add_stay(&x, Strength::WEAK).unwrap();
        assert!(x.value() >= 10.0 - 1e-6);
    }

    #[test]
    fn stronger_constraint_wins_over_weaker_one() {
        let mut solver = Solver::new();
        let x = Variable::new();
        solver
            .add_constraint(Constraint::equal_to_weighted(
                LinearExpression::from(&x) - LinearExpression::from(1.0),
                Strength::WEAK,
                1.0,
            ))
            .unwrap();
        solver
            .add_constraint(Constraint::equal_to_weighted(
                LinearExpression::from(&x) - LinearExpression::from(2.0),
                Strength::STRONG,
                1.0,
            ))
            .unwrap();
        assert!((x.value() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn two_variables_satisfy_a_shared_equality() {
        let mut solver = Solver::new();
        let x = Variable::new();
        let y = Variable::new();
        solver
            .add_constraint(Constraint::equal_to(
                LinearExpression::from(&x) + LinearExpression::from(10.0) - LinearExpression::from(&y),
                Strength::REQUIRED,
            ))
            .unwrap();
        solver.add_edit_var(&x, Strength::STRONG).unwrap();
        solver.begin_edit();
        solver.suggest_value(&x, 3.0).unwrap();
        solver.resolve().unwrap();
        assert!((y.value() - 13.0).abs() < 1e-6);
    }

    #[test]
    fn conflicting_required_constraints_fail() {
        let mut solver = Solver::new();
        let x = Variable::new();
        solver
            .add_constraint(Constraint::equal_to(
                LinearExpression::from(&x) - LinearExpression::from(1.0),
                Strength::REQUIRED,
            ))
            .unwrap();
        let err = solver
            .add_constraint(Constraint::equal_to(
                LinearExpression::from(&x) - LinearExpression::from(2.0),
                Strength::REQUIRED,
            ))
            .unwrap_err();
        assert!(matches!(err, SolverError::RequiredFailure));
    }

    #[test]
    fn removing_a_constraint_relaxes_the_system() {
        let mut solver = Solver::new();
        let x = Variable::new();
        let pinned = Constraint::equal_to(LinearExpression::from(&x) - LinearExpression::from(5.0), Strength::REQUIRED);
        solver.add_constraint(pinned.clone()).unwrap();
        solver.add_stay(&x, Strength::WEAK).unwrap();
        assert!((x.value() - 5.0).abs() < 1e-6);

        solver.remove_constraint(&pinned).unwrap();
        solver.solve().unwrap();
        assert!((x.value() - 5.0).abs() < 1e-6, "stay should hold x at its last value once the pin is gone");
    }

    #[test]
    fn edit_session_can_be_ended_without_leaving_the_constraint_enabled() {
        let mut solver = Solver::new();
        let x = Variable::new();
        solver.add_edit_var(&x, Strength::STRONG).unwrap();
        solver.begin_edit();
        solver.suggest_value(&x, 42.0).unwrap();
        solver.resolve().unwrap();
        assert!((x.value() - 42.0).abs() < 1e-6);

        solver.end_edit().unwrap();
        assert!(solver.tableau.edits.is_empty());
    }

    #[test]
    fn stay_on_an_already_basic_variable_does_not_clobber_its_row() {
        let mut solver = Solver::new();
        let x = Variable::new();
        solver
            .add_constraint(Constraint::equal_to(
                LinearExpression::from(&x) - LinearExpression::from(5.0),
                Strength::REQUIRED,
            ))
            .unwrap();
        // x is now basic, defined by its own row. A stay built without substituting the
        // basic variable out would let `choose_subject` hand `External(x)` straight back
        // as a "new" subject and overwrite that row in place.
        solver.add_stay(&x, Strength::WEAK).unwrap();
        assert!((x.value() - 5.0).abs() < 1e-6);

        let err = solver
            .add_constraint(Constraint::equal_to(
                LinearExpression::from(&x) - LinearExpression::from(6.0),
                Strength::REQUIRED,
            ))
            .unwrap_err();
        assert!(matches!(err, SolverError::RequiredFailure));
    }
}
