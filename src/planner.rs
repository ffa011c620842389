//! Planner facade: top-level API for route planning.
//!
//! The `Planner` owns the store handle, the complexity oracle, the
//! configuration and a bounded worker pool, and runs discovery, mass-balance
//! optimization and ranking for each request.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;

use crate::bounds::{ConcentrationBounds, validate_target_mass};
use crate::cancel::CancelToken;
use crate::config::PlannerConfig;
use crate::error::{DiscoveryError, EngineError, RouteResult};
use crate::graph;
use crate::optimize::MassBalanceOptimizer;
use crate::oracle::ComplexityOracle;
use crate::rank::{ComplexityRanker, ConditionSyntax, in_discovery_order};
use crate::report::{ReportBuilder, RouteReport};
use crate::route::{OptimizedVariant, expand_variants};
use crate::store::GraphAccessor;
use crate::substance::{CompositionVariant, Substance, SubstanceId};

/// Result of a route request.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// The target exists but no chain from source material reaches it.
    NoChains { target: String },
    Planned(RouteReport),
}

impl PlanOutcome {
    pub fn report(&self) -> Option<&RouteReport> {
        match self {
            PlanOutcome::NoChains { .. } => None,
            PlanOutcome::Planned(report) => Some(report),
        }
    }
}

/// Route planner over a reaction network.
pub struct Planner {
    config: PlannerConfig,
    accessor: Arc<dyn GraphAccessor>,
    optimizer: MassBalanceOptimizer,
    ranker: ComplexityRanker,
    pool: rayon::ThreadPool,
}

impl Planner {
    /// Create a planner, validating the configuration.
    pub fn new(
        config: PlannerConfig,
        accessor: Arc<dyn GraphAccessor>,
        oracle: Arc<dyn ComplexityOracle>,
    ) -> RouteResult<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("synthroute-worker-{i}"))
            .build()
            .map_err(|e| EngineError::WorkerPool {
                message: e.to_string(),
            })?;

        tracing::info!(
            anchor = %config.anchor_element,
            workers = pool.current_num_threads(),
            "initializing route planner"
        );

        let syntax = ConditionSyntax {
            delimiter: config.condition_delimiter.clone(),
            pressure_marker: config.pressure_marker.clone(),
            microimpurity_marker: config.microimpurity_marker.clone(),
        };

        Ok(Self {
            optimizer: config.optimizer(),
            ranker: ComplexityRanker::new(oracle, syntax),
            config,
            accessor,
            pool,
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Discover, optimize and rank every route to `target_formula`.
    pub fn discover_and_rank<K, V, I>(
        &self,
        target_formula: &str,
        bounds_raw: I,
        target_mass: f64,
    ) -> RouteResult<PlanOutcome>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.discover_and_rank_with(target_formula, bounds_raw, target_mass, &CancelToken::new())
    }

    /// [`discover_and_rank`](Self::discover_and_rank) with cooperative cancellation.
    pub fn discover_and_rank_with<K, V, I>(
        &self,
        target_formula: &str,
        bounds_raw: I,
        target_mass: f64,
        cancel: &CancelToken,
    ) -> RouteResult<PlanOutcome>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let bounds = ConcentrationBounds::parse(bounds_raw)?;
        self.run(target_formula, &bounds, target_mass, cancel, true)
    }

    /// The pipeline without the ranking stage. Variants stay in discovery
    /// order and carry no complexity.
    pub fn discover_unranked<K, V, I>(
        &self,
        target_formula: &str,
        bounds_raw: I,
        target_mass: f64,
    ) -> RouteResult<PlanOutcome>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let bounds = ConcentrationBounds::parse(bounds_raw)?;
        self.run(target_formula, &bounds, target_mass, &CancelToken::new(), false)
    }

    /// Formulas of every non-source substance, sorted.
    pub fn target_formulas(&self) -> RouteResult<Vec<String>> {
        let formulas: BTreeSet<String> = self
            .accessor
            .all_substances()?
            .into_iter()
            .filter(|s| !s.is_source)
            .map(|s| s.formula)
            .collect();
        Ok(formulas.into_iter().collect())
    }

    /// Distinct formulas of the direct inputs of operations producing the target.
    pub fn source_formulas_for(&self, target_formula: &str) -> RouteResult<Vec<String>> {
        let target = self.resolve_target(target_formula)?;
        let ids: BTreeSet<SubstanceId> = self
            .accessor
            .operations_producing(target.id)?
            .into_iter()
            .flat_map(|op| op.sources)
            .collect();
        let ids: Vec<SubstanceId> = ids.into_iter().collect();
        let formulas: BTreeSet<String> = self
            .accessor
            .substances_by_ids(&ids)?
            .into_iter()
            .map(|s| s.formula)
            .collect();
        Ok(formulas.into_iter().collect())
    }

    fn resolve_target(&self, formula: &str) -> RouteResult<Substance> {
        let target = self.accessor.substance_by_formula(formula)?;
        Ok(target.ok_or_else(|| DiscoveryError::TargetNotFound {
            formula: formula.to_string(),
        })?)
    }

    fn run(
        &self,
        target_formula: &str,
        bounds: &ConcentrationBounds,
        target_mass: f64,
        cancel: &CancelToken,
        rank: bool,
    ) -> RouteResult<PlanOutcome> {
        let target_mass = validate_target_mass(target_mass)?;
        let cancel = match self.config.request_timeout_secs {
            Some(secs) => cancel.tightened(Duration::from_secs(secs)),
            None => cancel.clone(),
        };
        let target = self.resolve_target(target_formula)?;

        // Store round trips stay on the calling thread; the pool only runs
        // enumeration, solves and scoring.
        let sources: BTreeSet<SubstanceId> =
            self.accessor.source_substance_ids()?.into_iter().collect();
        let (network, _) = graph::materialize(self.accessor.as_ref(), &sources)?;
        let discovery = self.config.discovery();
        let (chains, explored) = self
            .pool
            .install(|| graph::discover_chains(&network, &sources, target.id, &discovery))?;
        cancel.check()?;
        tracing::info!(
            target = target_formula,
            chains = chains.len(),
            explored,
            operations = network.operation_count(),
            "chain discovery finished"
        );
        if chains.is_empty() {
            tracing::info!(target = target_formula, "no chains reach the target");
            return Ok(PlanOutcome::NoChains {
                target: target.formula.clone(),
            });
        }
        let chains_found = chains.len();

        let mut ids: BTreeSet<SubstanceId> = BTreeSet::from([target.id]);
        let mut feedstocks: BTreeSet<SubstanceId> = BTreeSet::new();
        for chain in &chains {
            ids.extend(chain.substance_ids());
            feedstocks.extend(chain.first().sources.iter().copied());
        }
        let substances: HashMap<SubstanceId, Substance> = self
            .accessor
            .substances_by_ids(&ids.into_iter().collect::<Vec<_>>())?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let mut components: HashMap<SubstanceId, Vec<CompositionVariant>> = HashMap::new();
        for c in self
            .accessor
            .composition_variants_for(&feedstocks.into_iter().collect::<Vec<_>>())?
        {
            components.entry(c.substance_id).or_default().push(c);
        }

        let variants = expand_variants(chains, &substances, &components)?;
        let optimized: Vec<OptimizedVariant> = self.pool.install(|| {
            variants
                .into_par_iter()
                .map(|variant| -> RouteResult<OptimizedVariant> {
                    cancel.check()?;
                    let outcome = self.optimizer.optimize(&variant, &target, target_mass, bounds);
                    Ok(OptimizedVariant { variant, outcome })
                })
                .collect::<RouteResult<Vec<_>>>()
        })?;

        let (feasible, unsolved): (Vec<_>, Vec<_>) =
            optimized.into_iter().partition(|o| o.outcome.is_solved());
        tracing::info!(
            target = target_formula,
            chains = chains_found,
            solved = feasible.len(),
            unsolved = unsolved.len(),
            "mass balance finished"
        );

        let ranked = if rank {
            self.pool.install(|| self.ranker.rank(feasible, &cancel))?
        } else {
            in_discovery_order(feasible)
        };

        let builder = ReportBuilder {
            target: &target,
            target_mass,
            delimiter: &self.config.condition_delimiter,
            substances: &substances,
        };
        let report = builder.build(chains_found, rank, &ranked, &unsolved)?;
        Ok(PlanOutcome::Planned(report))
    }
}

impl std::fmt::Debug for Planner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Planner")
            .field("config", &self.config)
            .field("ranker", &self.ranker)
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}
