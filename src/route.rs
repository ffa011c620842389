//! Variants: a discovered chain paired with one of its first-step inputs.
//!
//! Every source of a chain's first operation yields its own variant. The
//! composition variants of that input are the components the mass-balance
//! optimizer allocates over.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::DiscoveryError;
use crate::graph::Chain;
use crate::lp::LpStatus;
use crate::substance::{CompositionVariant, Substance, SubstanceId, VariantId};

/// A chain with a chosen feedstock and its candidate components.
#[derive(Debug, Clone)]
pub struct Variant {
    pub chain: Arc<Chain>,
    /// The first-step input being allocated.
    pub feedstock: Substance,
    /// Composition variants of the feedstock, by ascending id.
    pub components: Vec<CompositionVariant>,
    /// Position in discovery order, used as the stable tie-breaker.
    pub discovery_index: usize,
}

/// Mass assigned to one component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComponentMass {
    pub variant_id: VariantId,
    pub mass: f64,
}

/// Feasible allocation of feedstock mass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassAllocation {
    /// Target mass produced per unit feedstock mass.
    pub ratio: f64,
    /// Sum of all component masses.
    pub total_input: f64,
    /// One entry per component, in component order.
    pub components: Vec<ComponentMass>,
}

impl MassAllocation {
    pub fn mass_of(&self, id: VariantId) -> Option<f64> {
        self.components
            .iter()
            .find(|c| c.variant_id == id)
            .map(|c| c.mass)
    }
}

/// Result of optimizing one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationOutcome {
    Solved(MassAllocation),
    /// No optimal allocation; `status` says why.
    Unsolved { status: LpStatus },
}

impl AllocationOutcome {
    pub fn allocation(&self) -> Option<&MassAllocation> {
        match self {
            AllocationOutcome::Solved(a) => Some(a),
            AllocationOutcome::Unsolved { .. } => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, AllocationOutcome::Solved(_))
    }
}

/// A variant after optimization.
#[derive(Debug, Clone)]
pub struct OptimizedVariant {
    pub variant: Variant,
    pub outcome: AllocationOutcome,
}

/// Expand chains into variants, one per (chain, first-step source).
///
/// `substances` and `components` come from batched store lookups; a missing
/// substance record is an error, a missing component list is an empty one.
pub fn expand_variants(
    chains: Vec<Chain>,
    substances: &HashMap<SubstanceId, Substance>,
    components: &HashMap<SubstanceId, Vec<CompositionVariant>>,
) -> Result<Vec<Variant>, DiscoveryError> {
    let mut variants = Vec::new();
    for chain in chains {
        let chain = Arc::new(chain);
        let mut seen = Vec::new();
        for &input in &chain.first().sources {
            if seen.contains(&input) {
                continue;
            }
            seen.push(input);
            let feedstock = substances
                .get(&input)
                .cloned()
                .ok_or(DiscoveryError::SubstanceNotFound { id: input.get() })?;
            let discovery_index = variants.len();
            variants.push(Variant {
                chain: Arc::clone(&chain),
                feedstock,
                components: components.get(&input).cloned().unwrap_or_default(),
                discovery_index,
            });
        }
    }
    Ok(variants)
}
