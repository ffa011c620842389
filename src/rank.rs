//! Complexity ranking of feasible variants.
//!
//! Each step's condition line is featurized, scored by the injected oracle,
//! and the step scores are summed per variant. Variants are ordered by
//! ascending total; ties keep discovery order.

use std::collections::BTreeSet;
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::RouteResult;
use crate::oracle::{
    ComplexityOracle, FEATURE_NAMES, FeatureVector, MICROIMPURITIES, PRESSURE, TEMPERATURE,
    is_declared_flag,
};
use crate::route::{MassAllocation, OptimizedVariant, Variant};

/// How condition lines are split and recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSyntax {
    pub delimiter: String,
    pub pressure_marker: String,
    pub microimpurity_marker: String,
}

impl Default for ConditionSyntax {
    fn default() -> Self {
        Self {
            delimiter: "; ".into(),
            pressure_marker: "MPa".into(),
            microimpurity_marker: "microimpurit".into(),
        }
    }
}

/// Parsed process conditions of one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepFeatures {
    pub temperature: f64,
    pub pressure: f64,
    pub microimpurities: bool,
    /// Declared boolean flags present in the line.
    pub flags: BTreeSet<String>,
    /// Flags the model does not know about. Kept for display, never scored.
    pub unrecognized: Vec<String>,
}

impl StepFeatures {
    /// Featurize a condition line. Malformed numbers read as 0.
    pub fn parse(line: &str, syntax: &ConditionSyntax) -> Self {
        let mut fields = line.split(syntax.delimiter.as_str());
        let temperature = fields.next().map(parse_number).unwrap_or(0.0);
        let mut features = StepFeatures {
            temperature,
            ..Default::default()
        };

        for field in fields.map(str::trim).filter(|f| !f.is_empty()) {
            if field.contains(syntax.pressure_marker.as_str()) {
                features.pressure = field.split_whitespace().next().map(parse_number).unwrap_or(0.0);
            } else if field.contains(syntax.microimpurity_marker.as_str()) {
                features.microimpurities = true;
            } else if is_declared_flag(field) {
                features.flags.insert(field.to_string());
            } else {
                tracing::debug!(flag = field, "condition flag not known to the model");
                features.unrecognized.push(field.to_string());
            }
        }
        features
    }

    /// Model input, in declared feature order.
    pub fn vector(&self) -> FeatureVector {
        let on = |set: bool| if set { 1.0 } else { 0.0 };
        FeatureVector::new(FEATURE_NAMES.map(|name| match name {
            TEMPERATURE => self.temperature,
            PRESSURE => self.pressure,
            MICROIMPURITIES => on(self.microimpurities),
            flag => on(self.flags.contains(flag)),
        }))
    }
}

fn parse_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// A feasible variant in its final position.
#[derive(Debug, Clone)]
pub struct RankedVariant {
    /// 1-based position in the output.
    pub rank: usize,
    /// Summed step complexity; `None` when ranking was skipped.
    pub complexity: Option<f64>,
    pub variant: Variant,
    pub allocation: MassAllocation,
}

/// Scores variants with a [`ComplexityOracle`].
#[derive(Clone)]
pub struct ComplexityRanker {
    oracle: Arc<dyn ComplexityOracle>,
    syntax: ConditionSyntax,
}

impl std::fmt::Debug for ComplexityRanker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplexityRanker")
            .field("syntax", &self.syntax)
            .finish_non_exhaustive()
    }
}

impl ComplexityRanker {
    pub fn new(oracle: Arc<dyn ComplexityOracle>, syntax: ConditionSyntax) -> Self {
        Self { oracle, syntax }
    }

    pub fn syntax(&self) -> &ConditionSyntax {
        &self.syntax
    }

    /// Sum of the oracle's step scores over the variant's chain.
    pub fn score(&self, variant: &Variant, cancel: &CancelToken) -> RouteResult<f64> {
        let mut total = 0.0;
        for (i, step) in variant.chain.steps().iter().enumerate() {
            cancel.check()?;
            let line = step.condition_line(&self.syntax.delimiter);
            let features = StepFeatures::parse(&line, &self.syntax);
            let score = self.oracle.predict(&features.vector())?;
            tracing::debug!(operation = %step.id, step = i + 1, score, "scored step");
            total += score;
        }
        Ok(total)
    }

    /// Drop unsolved variants, score the rest in parallel, and order them by
    /// ascending complexity.
    pub fn rank(
        &self,
        optimized: Vec<OptimizedVariant>,
        cancel: &CancelToken,
    ) -> RouteResult<Vec<RankedVariant>> {
        let feasible: Vec<(Variant, MassAllocation)> = solved(optimized).collect();

        let scores: Vec<f64> = feasible
            .par_iter()
            .map(|(variant, _)| self.score(variant, cancel))
            .collect::<RouteResult<Vec<f64>>>()?;

        let mut scored: Vec<(f64, (Variant, MassAllocation))> =
            scores.into_iter().zip(feasible).collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (score, (variant, allocation)))| RankedVariant {
                rank: i + 1,
                complexity: Some(score),
                variant,
                allocation,
            })
            .collect())
    }
}

/// Feasible variants in discovery order, numbered but unscored.
pub fn in_discovery_order(optimized: Vec<OptimizedVariant>) -> Vec<RankedVariant> {
    solved(optimized)
        .enumerate()
        .map(|(i, (variant, allocation))| RankedVariant {
            rank: i + 1,
            complexity: None,
            variant,
            allocation,
        })
        .collect()
}

fn solved(optimized: Vec<OptimizedVariant>) -> impl Iterator<Item = (Variant, MassAllocation)> {
    optimized.into_iter().filter_map(|o| match o.outcome {
        crate::route::AllocationOutcome::Solved(allocation) => Some((o.variant, allocation)),
        crate::route::AllocationOutcome::Unsolved { .. } => None,
    })
}
