//! Report types for planner output.
//!
//! These are formula-resolved, serializable views of the ranked variants,
//! suitable for JSON export or plain-text display.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;
use crate::rank::RankedVariant;
use crate::route::{OptimizedVariant, Variant};
use crate::substance::{CompositionVariant, Substance, SubstanceId};

/// Status string attached to variants without a feasible allocation.
pub const UNSOLVED: &str = "unsolved";

/// Complete answer to a route request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteReport {
    /// Requested product formula.
    pub target: String,
    /// Requested product mass.
    pub target_mass: f64,
    /// Complete chains discovered before variant expansion.
    pub chains_found: usize,
    /// Whether variants are ordered by complexity.
    pub ranked: bool,
    /// Feasible variants in output order.
    pub variants: Vec<VariantReport>,
    /// Variants without a feasible allocation, in discovery order.
    pub unsolved: Vec<UnsolvedReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantReport {
    /// "variant N", N being the 1-based output position.
    pub label: String,
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<f64>,
    pub steps: Vec<StepReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// 1-based step number.
    pub index: usize,
    pub operation_id: u64,
    /// Temperature followed by auxiliary conditions.
    pub conditions: String,
    /// Input formulas, in operation order.
    pub inputs: Vec<String>,
    pub product: String,
    /// Present on the first step only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<AllocationReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub feedstock: String,
    pub molar_mass: f64,
    pub ratio: f64,
    pub total_input: f64,
    pub components: Vec<ComponentReport>,
}

/// One composition variant of the feedstock with its allocated mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentReport {
    pub id: u64,
    pub main_percent: f64,
    pub fe_percent: f64,
    pub si_percent: f64,
    pub k_percent: f64,
    pub ca_percent: f64,
    pub mg_percent: f64,
    pub na_percent: f64,
    pub mass: f64,
}

impl ComponentReport {
    fn new(component: &CompositionVariant, mass: f64) -> Self {
        Self {
            id: component.id.get(),
            main_percent: component.main_percent,
            fe_percent: component.fe_percent,
            si_percent: component.si_percent,
            k_percent: component.k_percent,
            ca_percent: component.ca_percent,
            mg_percent: component.mg_percent,
            na_percent: component.na_percent,
            mass,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsolvedReport {
    pub feedstock: String,
    pub operations: Vec<u64>,
    /// Always [`UNSOLVED`].
    pub status: String,
    /// Solver status that caused it.
    pub reason: String,
}

/// Resolves substance ids to formulas while building a [`RouteReport`].
pub struct ReportBuilder<'a> {
    pub target: &'a Substance,
    pub target_mass: f64,
    pub delimiter: &'a str,
    pub substances: &'a HashMap<SubstanceId, Substance>,
}

impl ReportBuilder<'_> {
    fn formula(&self, id: SubstanceId) -> Result<String, DiscoveryError> {
        self.substances
            .get(&id)
            .map(|s| s.formula.clone())
            .ok_or(DiscoveryError::SubstanceNotFound { id: id.get() })
    }

    fn steps(&self, variant: &Variant) -> Result<Vec<StepReport>, DiscoveryError> {
        variant
            .chain
            .steps()
            .iter()
            .enumerate()
            .map(|(i, op)| -> Result<StepReport, DiscoveryError> {
                Ok(StepReport {
                    index: i + 1,
                    operation_id: op.id.get(),
                    conditions: op.condition_line(self.delimiter),
                    inputs: op
                        .sources
                        .iter()
                        .map(|s| self.formula(*s))
                        .collect::<Result<_, _>>()?,
                    product: self.formula(op.target)?,
                    allocation: None,
                })
            })
            .collect()
    }

    fn variant(&self, ranked: &RankedVariant) -> Result<VariantReport, DiscoveryError> {
        let variant = &ranked.variant;
        let mut steps = self.steps(variant)?;
        let components = variant
            .components
            .iter()
            .map(|c| ComponentReport::new(c, ranked.allocation.mass_of(c.id).unwrap_or(0.0)))
            .collect();
        if let Some(first) = steps.first_mut() {
            first.allocation = Some(AllocationReport {
                feedstock: variant.feedstock.formula.clone(),
                molar_mass: variant.feedstock.molar_mass,
                ratio: ranked.allocation.ratio,
                total_input: ranked.allocation.total_input,
                components,
            });
        }
        Ok(VariantReport {
            label: format!("variant {}", ranked.rank),
            rank: ranked.rank,
            complexity: ranked.complexity,
            steps,
        })
    }

    /// Assemble the report from ranked and unsolved variants.
    pub fn build(
        &self,
        chains_found: usize,
        ranked: bool,
        variants: &[RankedVariant],
        unsolved: &[OptimizedVariant],
    ) -> Result<RouteReport, DiscoveryError> {
        let variants = variants
            .iter()
            .map(|v| self.variant(v))
            .collect::<Result<Vec<_>, _>>()?;
        let unsolved = unsolved
            .iter()
            .filter_map(|o| match &o.outcome {
                crate::route::AllocationOutcome::Unsolved { status } => Some(UnsolvedReport {
                    feedstock: o.variant.feedstock.formula.clone(),
                    operations: o.variant.chain.steps().iter().map(|s| s.id.get()).collect(),
                    status: UNSOLVED.to_string(),
                    reason: status.to_string(),
                }),
                crate::route::AllocationOutcome::Solved(_) => None,
            })
            .collect();

        Ok(RouteReport {
            target: self.target.formula.clone(),
            target_mass: self.target_mass,
            chains_found,
            ranked,
            variants,
            unsolved,
        })
    }
}

impl fmt::Display for RouteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} g of {}: {} chain(s), {} feasible variant(s), {} unsolved",
            self.target_mass,
            self.target,
            self.chains_found,
            self.variants.len(),
            self.unsolved.len()
        )?;
        for variant in &self.variants {
            match variant.complexity {
                Some(c) => writeln!(f, "\n{} (complexity {c:.3})", variant.label)?,
                None => writeln!(f, "\n{}", variant.label)?,
            }
            for step in &variant.steps {
                writeln!(
                    f,
                    "  step {}: {} -> {} [{}]",
                    step.index,
                    step.inputs.join(" + "),
                    step.product,
                    step.conditions
                )?;
                if let Some(alloc) = &step.allocation {
                    writeln!(
                        f,
                        "    feed {} (ratio {:.4}, total {:.4} g)",
                        alloc.feedstock, alloc.ratio, alloc.total_input
                    )?;
                    for c in &alloc.components {
                        writeln!(
                            f,
                            "      batch {}: {:.4} g (main {}%, Fe {}%, Si {}%, K {}%, Ca {}%, Mg {}%, Na {}%)",
                            c.id,
                            c.mass,
                            c.main_percent,
                            c.fe_percent,
                            c.si_percent,
                            c.k_percent,
                            c.ca_percent,
                            c.mg_percent,
                            c.na_percent
                        )?;
                    }
                }
            }
        }
        if !self.unsolved.is_empty() {
            writeln!(f, "\nunsolved:")?;
            for u in &self.unsolved {
                writeln!(f, "  {} via ops {:?}: {}", u.feedstock, u.operations, u.reason)?;
            }
        }
        Ok(())
    }
}
