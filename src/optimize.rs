//! Mass-balance optimization for one variant.
//!
//! Variables are the masses `x_i ≥ 0` of the feedstock's composition
//! variants. The program is
//!
//! ```text
//! minimize   Σ x_i
//! subject to Σ ratio·x_i                 = M
//!            C_min[k]·M ≤ Σ c_ik·w_i ≤ C_max[k]·M    for every bounded key k
//! ```
//!
//! where `c_ik` is the component's fraction of key `k`, and `w_i` is
//! `ratio·x_i` for the main component and `x_i` for impurities.

use crate::bounds::ConcentrationBounds;
use crate::formula::{AnchorElement, stoichiometric_ratio};
use crate::lp::{LinearProgram, LpStatus, Relation};
use crate::route::{AllocationOutcome, ComponentMass, MassAllocation, Variant};
use crate::substance::Substance;

/// Masses below this are reported as zero.
pub const DEFAULT_ZERO_THRESHOLD: f64 = 1e-6;

/// Builds and solves the allocation program for variants.
#[derive(Debug, Clone)]
pub struct MassBalanceOptimizer {
    anchor: AnchorElement,
    zero_threshold: f64,
}

impl Default for MassBalanceOptimizer {
    fn default() -> Self {
        Self::new(AnchorElement::default(), DEFAULT_ZERO_THRESHOLD)
    }
}

impl MassBalanceOptimizer {
    pub fn new(anchor: AnchorElement, zero_threshold: f64) -> Self {
        Self {
            anchor,
            zero_threshold,
        }
    }

    pub fn anchor(&self) -> &AnchorElement {
        &self.anchor
    }

    /// Stoichiometric ratio between the variant's feedstock and `target`.
    pub fn ratio(&self, feedstock: &Substance, target: &Substance) -> f64 {
        stoichiometric_ratio(
            &feedstock.formula,
            feedstock.molar_mass,
            &target.formula,
            target.molar_mass,
            &self.anchor,
        )
    }

    /// Assemble the linear program for `variant`.
    pub fn build_program(
        &self,
        variant: &Variant,
        ratio: f64,
        target_mass: f64,
        bounds: &ConcentrationBounds,
    ) -> LinearProgram {
        let n = variant.components.len();
        let mut program = LinearProgram::minimize(n).with_objective(&vec![1.0; n]);
        program.constrain("mass_balance", &vec![ratio; n], Relation::Equal, target_mass);

        for (key, bound) in bounds.iter() {
            let weight = if key.is_main() { ratio } else { 1.0 };
            let row: Vec<f64> = variant
                .components
                .iter()
                .map(|c| c.fraction(key) * weight)
                .collect();
            program.constrain(
                format!("{key}_max"),
                &row,
                Relation::LessEq,
                bound.max * target_mass,
            );
            program.constrain(
                format!("{key}_min"),
                &row,
                Relation::GreaterEq,
                bound.min * target_mass,
            );
        }
        program
    }

    /// Allocate feedstock mass for `variant` so that `target_mass` of
    /// `target` is produced within `bounds`.
    pub fn optimize(
        &self,
        variant: &Variant,
        target: &Substance,
        target_mass: f64,
        bounds: &ConcentrationBounds,
    ) -> AllocationOutcome {
        if variant.components.is_empty() {
            tracing::debug!(
                feedstock = %variant.feedstock.formula,
                "no composition variants to allocate"
            );
            return AllocationOutcome::Unsolved {
                status: LpStatus::Infeasible,
            };
        }

        let ratio = self.ratio(&variant.feedstock, target);
        let solution = self
            .build_program(variant, ratio, target_mass, bounds)
            .solve();

        if !solution.is_optimal() {
            tracing::debug!(
                feedstock = %variant.feedstock.formula,
                status = %solution.status,
                "mass balance unsolved"
            );
            return AllocationOutcome::Unsolved {
                status: solution.status,
            };
        }

        let components: Vec<ComponentMass> = variant
            .components
            .iter()
            .zip(&solution.values)
            .map(|(c, &x)| ComponentMass {
                variant_id: c.id,
                mass: if x > self.zero_threshold { x } else { 0.0 },
            })
            .collect();
        let total_input = components.iter().map(|c| c.mass).sum();

        AllocationOutcome::Solved(MassAllocation {
            ratio,
            total_input,
            components,
        })
    }
}
