//! Dense two-phase simplex solver for small linear programs.
//!
//! Problems have the form
//!
//! ```text
//! minimize    c · x
//! subject to  a_i · x  (<= | >= | =)  b_i
//!             x >= 0
//! ```
//!
//! Phase 1 minimizes the sum of artificial variables to find a feasible
//! basis; phase 2 optimizes the real objective from there. Pivoting uses
//! Bland's rule, so degenerate problems cannot cycle. Mass-balance programs
//! have one variable per composition variant and at most fifteen rows, so a
//! dense tableau is the right tool.

use std::fmt;

/// Pivot tolerance.
const EPS: f64 = 1e-9;

/// Relation of a constraint row to its right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

/// One linear constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub coeffs: Vec<f64>,
    pub relation: Relation,
    pub rhs: f64,
}

/// Minimization problem over non-negative variables.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    num_vars: usize,
    objective: Vec<f64>,
    constraints: Vec<Constraint>,
    max_iterations: usize,
}

/// Terminal status reported by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

impl fmt::Display for LpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LpStatus::Optimal => "optimal",
            LpStatus::Infeasible => "infeasible",
            LpStatus::Unbounded => "unbounded",
            LpStatus::IterationLimit => "iteration limit",
        };
        f.write_str(s)
    }
}

/// Solver output. `values` and `objective` are meaningful only when optimal.
#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub status: LpStatus,
    pub values: Vec<f64>,
    pub objective: f64,
}

impl LpSolution {
    fn failed(status: LpStatus, num_vars: usize) -> Self {
        Self {
            status,
            values: vec![0.0; num_vars],
            objective: f64::NAN,
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == LpStatus::Optimal
    }
}

impl LinearProgram {
    /// Create a problem with `num_vars` non-negative variables and a zero objective.
    pub fn minimize(num_vars: usize) -> Self {
        Self {
            num_vars,
            objective: vec![0.0; num_vars],
            constraints: Vec::new(),
            max_iterations: 10_000,
        }
    }

    /// Set the objective coefficients.
    ///
    /// Missing trailing coefficients are zero.
    pub fn with_objective(mut self, coeffs: &[f64]) -> Self {
        for (slot, c) in self.objective.iter_mut().zip(coeffs) {
            *slot = *c;
        }
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Add a constraint row. Missing trailing coefficients are zero.
    pub fn constrain(
        &mut self,
        name: impl Into<String>,
        coeffs: &[f64],
        relation: Relation,
        rhs: f64,
    ) -> &mut Self {
        let mut row = vec![0.0; self.num_vars];
        for (slot, c) in row.iter_mut().zip(coeffs) {
            *slot = *c;
        }
        self.constraints.push(Constraint {
            name: name.into(),
            coeffs: row,
            relation,
            rhs,
        });
        self
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Solve the program.
    pub fn solve(&self) -> LpSolution {
        if self.constraints.iter().any(|c| !c.rhs.is_finite())
            || self.constraints.iter().flat_map(|c| &c.coeffs).any(|v| !v.is_finite())
        {
            return LpSolution::failed(LpStatus::Infeasible, self.num_vars);
        }

        let mut tableau = Tableau::build(self);

        // Phase 1: drive the artificial variables to zero.
        let phase1_cost: Vec<f64> = (0..tableau.cols)
            .map(|j| if tableau.is_artificial(j) { 1.0 } else { 0.0 })
            .collect();
        tableau.set_objective(&phase1_cost);
        match tableau.run(self.max_iterations, true) {
            Ok(()) => {}
            Err(status) => return LpSolution::failed(status, self.num_vars),
        }

        let infeasibility: f64 = tableau
            .basis
            .iter()
            .enumerate()
            .filter(|&(_, &col)| tableau.is_artificial(col))
            .map(|(row, _)| tableau.rhs(row))
            .sum();
        let scale = 1.0 + self.constraints.iter().map(|c| c.rhs.abs()).fold(0.0, f64::max);
        if infeasibility > 1e-7 * scale {
            return LpSolution::failed(LpStatus::Infeasible, self.num_vars);
        }
        tableau.evict_artificials();

        // Phase 2: optimize the real objective without artificial columns.
        let mut phase2_cost = vec![0.0; tableau.cols];
        phase2_cost[..self.num_vars].copy_from_slice(&self.objective);
        tableau.set_objective(&phase2_cost);
        if let Err(status) = tableau.run(self.max_iterations, false) {
            return LpSolution::failed(status, self.num_vars);
        }

        let mut values = vec![0.0; self.num_vars];
        for (row, &col) in tableau.basis.iter().enumerate() {
            if col < self.num_vars {
                values[col] = tableau.rhs(row).max(0.0);
            }
        }
        let objective = values
            .iter()
            .zip(&self.objective)
            .map(|(x, c)| x * c)
            .sum();

        LpSolution {
            status: LpStatus::Optimal,
            values,
            objective,
        }
    }
}

/// Simplex tableau. Column layout: structural | slack/surplus | artificial | rhs.
struct Tableau {
    rows: Vec<Vec<f64>>,
    /// Reduced-cost row; its last cell holds the negated objective value.
    cost: Vec<f64>,
    basis: Vec<usize>,
    cols: usize,
    artificial_start: usize,
}

impl Tableau {
    fn build(lp: &LinearProgram) -> Self {
        let n = lp.num_vars;
        let num_slack = lp
            .constraints
            .iter()
            .filter(|c| c.relation != Relation::Equal)
            .count();

        // Normalize every row to a non-negative right-hand side first; that
        // decides which rows need an artificial variable.
        let normalized: Vec<(Vec<f64>, Relation, f64)> = lp
            .constraints
            .iter()
            .map(|c| {
                if c.rhs < 0.0 {
                    let flipped = match c.relation {
                        Relation::LessEq => Relation::GreaterEq,
                        Relation::GreaterEq => Relation::LessEq,
                        Relation::Equal => Relation::Equal,
                    };
                    (c.coeffs.iter().map(|v| -v).collect(), flipped, -c.rhs)
                } else {
                    (c.coeffs.clone(), c.relation, c.rhs)
                }
            })
            .collect();

        let num_artificial = normalized
            .iter()
            .filter(|(_, rel, _)| *rel != Relation::LessEq)
            .count();

        let artificial_start = n + num_slack;
        let cols = artificial_start + num_artificial;
        let mut rows = Vec::with_capacity(normalized.len());
        let mut basis = Vec::with_capacity(normalized.len());
        let mut next_slack = n;
        let mut next_artificial = artificial_start;

        for (coeffs, relation, rhs) in normalized {
            let mut row = vec![0.0; cols + 1];
            row[..n].copy_from_slice(&coeffs);
            row[cols] = rhs;
            match relation {
                Relation::LessEq => {
                    row[next_slack] = 1.0;
                    basis.push(next_slack);
                    next_slack += 1;
                }
                Relation::GreaterEq => {
                    row[next_slack] = -1.0;
                    next_slack += 1;
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
                Relation::Equal => {
                    row[next_artificial] = 1.0;
                    basis.push(next_artificial);
                    next_artificial += 1;
                }
            }
            rows.push(row);
        }

        Self {
            rows,
            cost: vec![0.0; cols + 1],
            basis,
            cols,
            artificial_start,
        }
    }

    fn is_artificial(&self, col: usize) -> bool {
        col >= self.artificial_start && col < self.cols
    }

    fn rhs(&self, row: usize) -> f64 {
        self.rows[row][self.cols]
    }

    /// Load `costs` and price out the current basis.
    fn set_objective(&mut self, costs: &[f64]) {
        self.cost = vec![0.0; self.cols + 1];
        self.cost[..self.cols].copy_from_slice(costs);
        for (row, &col) in self.basis.iter().enumerate() {
            let c = self.cost[col];
            if c != 0.0 {
                for (slot, v) in self.cost.iter_mut().zip(&self.rows[row]) {
                    *slot -= c * v;
                }
            }
        }
    }

    fn pivot(&mut self, pivot_row: usize, pivot_col: usize) {
        let p = self.rows[pivot_row][pivot_col];
        for v in self.rows[pivot_row].iter_mut() {
            *v /= p;
        }
        let pivot_values = self.rows[pivot_row].clone();

        for (r, row) in self.rows.iter_mut().enumerate() {
            if r == pivot_row {
                continue;
            }
            let factor = row[pivot_col];
            if factor.abs() > 0.0 {
                for (slot, v) in row.iter_mut().zip(&pivot_values) {
                    *slot -= factor * v;
                }
            }
        }

        let factor = self.cost[pivot_col];
        if factor.abs() > 0.0 {
            for (slot, v) in self.cost.iter_mut().zip(&pivot_values) {
                *slot -= factor * v;
            }
        }

        self.basis[pivot_row] = pivot_col;
    }

    /// Iterate until optimal. Artificial columns may enter only in phase 1.
    fn run(&mut self, max_iterations: usize, allow_artificial: bool) -> Result<(), LpStatus> {
        let limit = if allow_artificial { self.cols } else { self.artificial_start };

        for _ in 0..max_iterations {
            // Bland: lowest-index column with a negative reduced cost.
            let Some(entering) = (0..limit).find(|&j| self.cost[j] < -EPS) else {
                return Ok(());
            };

            // Ratio test; ties go to the lowest basis index.
            let mut leaving: Option<(usize, f64)> = None;
            for (r, row) in self.rows.iter().enumerate() {
                let a = row[entering];
                if a <= EPS {
                    continue;
                }
                let ratio = row[self.cols] / a;
                leaving = match leaving {
                    None => Some((r, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - EPS
                            || (ratio <= best_ratio + EPS && self.basis[r] < self.basis[best])
                        {
                            Some((r, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }

            let Some((pivot_row, _)) = leaving else {
                return Err(LpStatus::Unbounded);
            };
            self.pivot(pivot_row, entering);
        }

        Err(LpStatus::IterationLimit)
    }

    /// After phase 1, pivot artificial variables out of the basis. Rows
    /// where that is impossible are linearly dependent and get dropped.
    fn evict_artificials(&mut self) {
        let mut redundant = Vec::new();
        for row in 0..self.rows.len() {
            if !self.is_artificial(self.basis[row]) {
                continue;
            }
            let replacement = (0..self.artificial_start).find(|&j| self.rows[row][j].abs() > EPS);
            match replacement {
                Some(col) => self.pivot(row, col),
                None => redundant.push(row),
            }
        }
        for row in redundant.into_iter().rev() {
            self.rows.remove(row);
            self.basis.remove(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-7
    }

    #[test]
    fn simple_minimization() {
        // min x + y  s.t. x + y >= 2, x <= 1
        let mut lp = LinearProgram::minimize(2).with_objective(&[1.0, 1.0]);
        lp.constrain("sum", &[1.0, 1.0], Relation::GreaterEq, 2.0)
            .constrain("cap", &[1.0, 0.0], Relation::LessEq, 1.0);
        let sol = lp.solve();
        assert!(sol.is_optimal());
        assert!(close(sol.objective, 2.0));
        assert!(close(sol.values[0] + sol.values[1], 2.0));
        assert!(sol.values[0] <= 1.0 + 1e-9);
    }

    #[test]
    fn textbook_maximization_as_minimization() {
        // max 3x + 5y  s.t. x <= 4, 2y <= 12, 3x + 2y <= 18  -> (2, 6), 36
        let mut lp = LinearProgram::minimize(2).with_objective(&[-3.0, -5.0]);
        lp.constrain("a", &[1.0, 0.0], Relation::LessEq, 4.0)
            .constrain("b", &[0.0, 2.0], Relation::LessEq, 12.0)
            .constrain("c", &[3.0, 2.0], Relation::LessEq, 18.0);
        let sol = lp.solve();
        assert!(sol.is_optimal());
        assert!(close(sol.values[0], 2.0));
        assert!(close(sol.values[1], 6.0));
        assert!(close(sol.objective, -36.0));
    }

    #[test]
    fn equality_with_cheaper_variable() {
        // min 2x + y  s.t. x + y = 10  -> y = 10
        let mut lp = LinearProgram::minimize(2).with_objective(&[2.0, 1.0]);
        lp.constrain("balance", &[1.0, 1.0], Relation::Equal, 10.0);
        let sol = lp.solve();
        assert!(sol.is_optimal());
        assert!(close(sol.values[0], 0.0));
        assert!(close(sol.values[1], 10.0));
    }

    #[test]
    fn infeasible_bounds() {
        let mut lp = LinearProgram::minimize(1).with_objective(&[1.0]);
        lp.constrain("lo", &[1.0], Relation::GreaterEq, 3.0)
            .constrain("hi", &[1.0], Relation::LessEq, 1.0);
        assert_eq!(lp.solve().status, LpStatus::Infeasible);
    }

    #[test]
    fn unbounded_objective() {
        let mut lp = LinearProgram::minimize(1).with_objective(&[-1.0]);
        lp.constrain("lo", &[1.0], Relation::GreaterEq, 1.0);
        assert_eq!(lp.solve().status, LpStatus::Unbounded);
    }

    #[test]
    fn negative_rhs_is_normalized() {
        // -x <= -4  is  x >= 4
        let mut lp = LinearProgram::minimize(1).with_objective(&[1.0]);
        lp.constrain("flip", &[-1.0], Relation::LessEq, -4.0);
        let sol = lp.solve();
        assert!(sol.is_optimal());
        assert!(close(sol.values[0], 4.0));
    }

    #[test]
    fn redundant_equalities_are_dropped() {
        let mut lp = LinearProgram::minimize(2).with_objective(&[1.0, 2.0]);
        lp.constrain("e1", &[1.0, 1.0], Relation::Equal, 5.0)
            .constrain("e2", &[2.0, 2.0], Relation::Equal, 10.0);
        let sol = lp.solve();
        assert!(sol.is_optimal());
        assert!(close(sol.values[0], 5.0));
        assert!(close(sol.objective, 5.0));
    }

    #[test]
    fn degenerate_problem_terminates() {
        // Classic degenerate vertex at the origin.
        let mut lp = LinearProgram::minimize(3).with_objective(&[-0.75, 20.0, -0.5]);
        lp.constrain("r1", &[0.25, -8.0, -1.0], Relation::LessEq, 0.0)
            .constrain("r2", &[0.5, -12.0, -0.5], Relation::LessEq, 0.0)
            .constrain("r3", &[0.0, 0.0, 1.0], Relation::LessEq, 1.0);
        let sol = lp.solve();
        assert!(sol.is_optimal());
        assert!(close(sol.objective, -1.25));
    }

    #[test]
    fn non_finite_input_is_infeasible() {
        let mut lp = LinearProgram::minimize(1).with_objective(&[1.0]);
        lp.constrain("nan", &[f64::NAN], Relation::Equal, 1.0);
        assert_eq!(lp.solve().status, LpStatus::Infeasible);
    }
}
