//! Chain discovery: layered materialization and breadth-first enumeration.
//!
//! A chain is an operation sequence starting at source material and ending
//! at the requested target. No operation may consume a substance already
//! consumed earlier in the chain, which bounds every chain by the number of
//! substances and makes enumeration terminate even on cyclic networks.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::error::{DiscoveryError, RouteResult};
use crate::store::{GraphAccessor, StoreResult};
use crate::substance::{Operation, SubstanceId};

use super::index::ReactionGraph;

/// Limits for a discovery run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DiscoveryConfig {
    /// Longest chain allowed, in operations. Unset means bounded only by the
    /// no-reuse rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chain_length: Option<usize>,
    /// Maximum number of partial chains explored before giving up.
    pub max_chains: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_chain_length: None,
            max_chains: 100_000,
        }
    }
}

/// An ordered, non-repeating operation sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    steps: Vec<Operation>,
    consumed: BTreeSet<SubstanceId>,
}

impl Chain {
    fn start(op: &Operation) -> Self {
        Self {
            consumed: op.sources.iter().copied().collect(),
            steps: vec![op.clone()],
        }
    }

    /// Extend with `op` unless it would consume an already-consumed substance.
    fn extended(&self, op: &Operation) -> Option<Self> {
        if op.consumes_any(&self.consumed) {
            return None;
        }
        let mut next = self.clone();
        next.consumed.extend(op.sources.iter().copied());
        next.steps.push(op.clone());
        Some(next)
    }

    pub fn steps(&self) -> &[Operation] {
        &self.steps
    }

    pub fn first(&self) -> &Operation {
        &self.steps[0]
    }

    pub fn last(&self) -> &Operation {
        &self.steps[self.steps.len() - 1]
    }

    /// Product of the final step.
    pub fn target(&self) -> SubstanceId {
        self.last().target
    }

    /// Union of all sources consumed along the chain.
    pub fn consumed(&self) -> &BTreeSet<SubstanceId> {
        &self.consumed
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every substance id mentioned by any step.
    pub fn substance_ids(&self) -> BTreeSet<SubstanceId> {
        self.steps
            .iter()
            .flat_map(|op| op.sources.iter().copied().chain(std::iter::once(op.target)))
            .collect()
    }
}

/// Result of a discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    /// Complete chains, in breadth-first discovery order.
    pub chains: Vec<Chain>,
    /// Operations materialized from the store.
    pub operations_fetched: usize,
    /// Store round trips spent materializing.
    pub fetch_layers: usize,
    /// Partial chains explored.
    pub explored: usize,
}

/// Fetch every operation reachable from `seeds`, one batched query per layer.
///
/// Each layer asks only for substances not asked about before: first the
/// seeds, then the targets of operations the previous layer returned.
pub fn materialize(
    accessor: &dyn GraphAccessor,
    seeds: &BTreeSet<SubstanceId>,
) -> StoreResult<(ReactionGraph, usize)> {
    let mut graph = ReactionGraph::new();
    let mut queried: BTreeSet<SubstanceId> = BTreeSet::new();
    let mut pending: Vec<SubstanceId> = seeds.iter().copied().collect();
    let mut layers = 0;

    while !pending.is_empty() {
        queried.extend(pending.iter().copied());
        let ops = accessor.operations_intersecting(&pending)?;
        layers += 1;

        let mut next = BTreeSet::new();
        for op in ops {
            if graph.contains_operation(op.id) {
                continue;
            }
            if !queried.contains(&op.target) {
                next.insert(op.target);
            }
            graph.insert_operation(op);
        }
        tracing::trace!(layer = layers, next = next.len(), "materialized layer");
        pending = next.into_iter().collect();
    }

    Ok((graph, layers))
}

/// Enumerate complete chains over an already-materialized graph.
///
/// Layers are expanded in parallel; results keep frontier order, so the
/// output is deterministic.
pub fn discover_chains(
    graph: &ReactionGraph,
    sources: &BTreeSet<SubstanceId>,
    target: SubstanceId,
    config: &DiscoveryConfig,
) -> Result<(Vec<Chain>, usize), DiscoveryError> {
    let mut seeds: Vec<&Operation> = graph
        .operations()
        .iter()
        .filter(|op| op.consumes_any(sources))
        .collect();
    seeds.sort_by_key(|op| op.id);

    let mut frontier: Vec<Chain> = seeds.into_iter().map(Chain::start).collect();
    let mut explored = frontier.len();
    if explored > config.max_chains {
        return Err(DiscoveryError::ChainLimitExceeded {
            limit: config.max_chains,
        });
    }

    let mut complete = Vec::new();
    let mut depth = 1;

    while !frontier.is_empty() {
        complete.extend(frontier.iter().filter(|c| c.target() == target).cloned());

        let next: Vec<Vec<Chain>> = frontier
            .par_iter()
            .map(|chain| {
                graph
                    .consumers_of(chain.target())
                    .into_iter()
                    .filter_map(|idx| chain.extended(graph.operation(idx)))
                    .collect()
            })
            .collect();
        frontier = next.into_iter().flatten().collect();

        if let Some(limit) = config.max_chain_length {
            if depth >= limit && !frontier.is_empty() {
                return Err(DiscoveryError::ChainLengthExceeded { limit });
            }
        }

        explored += frontier.len();
        if explored > config.max_chains {
            return Err(DiscoveryError::ChainLimitExceeded {
                limit: config.max_chains,
            });
        }
        depth += 1;
    }

    Ok((complete, explored))
}

/// Discover every complete chain ending at `target`.
pub fn discover(
    accessor: &dyn GraphAccessor,
    target: SubstanceId,
    config: &DiscoveryConfig,
) -> RouteResult<DiscoveryResult> {
    let sources: BTreeSet<SubstanceId> = accessor.source_substance_ids()?.into_iter().collect();
    let (graph, fetch_layers) = materialize(accessor, &sources)?;
    let (chains, explored) = discover_chains(&graph, &sources, target, config)?;

    tracing::info!(
        target = %target,
        chains = chains.len(),
        explored,
        operations = graph.operation_count(),
        "chain discovery finished"
    );

    Ok(DiscoveryResult {
        chains,
        operations_fetched: graph.operation_count(),
        fetch_layers,
        explored,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemGraphStore;
    use crate::substance::{OperationId, Substance};

    fn sub(id: u64) -> SubstanceId {
        SubstanceId::new(id).unwrap()
    }

    fn op(id: u64, sources: &[u64], target: u64) -> Operation {
        Operation {
            id: OperationId::new(id).unwrap(),
            sources: sources.iter().map(|s| sub(*s)).collect(),
            target: sub(target),
            temperature: 100.0,
            conditions: None,
        }
    }

    fn store(substances: &[(u64, bool)], ops: &[Operation]) -> MemGraphStore {
        let store = MemGraphStore::new();
        for &(id, is_source) in substances {
            store
                .insert_substance(Substance {
                    id: sub(id),
                    formula: format!("S{id}"),
                    molar_mass: 10.0,
                    is_source,
                })
                .unwrap();
        }
        for o in ops {
            store.insert_operation(o.clone()).unwrap();
        }
        store
    }

    fn op_ids(chain: &Chain) -> Vec<u64> {
        chain.steps().iter().map(|o| o.id.get()).collect()
    }

    #[test]
    fn linear_chain() {
        // 1 -> 2 -> 3
        let s = store(
            &[(1, true), (2, false), (3, false)],
            &[op(1, &[1], 2), op(2, &[2], 3)],
        );
        let result = discover(&s, sub(3), &DiscoveryConfig::default()).unwrap();
        assert_eq!(result.chains.len(), 1);
        assert_eq!(op_ids(&result.chains[0]), vec![1, 2]);
        assert_eq!(result.fetch_layers, 3);
    }

    #[test]
    fn target_without_inbound_operations_yields_nothing() {
        let s = store(&[(1, true), (2, false), (3, false)], &[op(1, &[1], 2)]);
        let result = discover(&s, sub(3), &DiscoveryConfig::default()).unwrap();
        assert!(result.chains.is_empty());
    }

    #[test]
    fn branches_are_all_enumerated_shortest_first() {
        // 1 -> 3 directly, and 1 -> 2 -> 3
        let s = store(
            &[(1, true), (2, false), (3, false)],
            &[op(1, &[1], 3), op(2, &[1], 2), op(3, &[2], 3)],
        );
        let result = discover(&s, sub(3), &DiscoveryConfig::default()).unwrap();
        let chains: Vec<Vec<u64>> = result.chains.iter().map(op_ids).collect();
        assert_eq!(chains, vec![vec![1], vec![2, 3]]);
    }

    #[test]
    fn cycle_terminates_by_no_reuse() {
        // 1 -> 2 -> 3 -> 2 would reuse 2's consumption.
        let s = store(
            &[(1, true), (2, false), (3, false)],
            &[op(1, &[1], 2), op(2, &[2], 3), op(3, &[3], 2)],
        );
        let result = discover(&s, sub(2), &DiscoveryConfig::default()).unwrap();
        // [1] reaches 2; [1,2,3] reaches 2 again via 3 without reusing a source.
        let chains: Vec<Vec<u64>> = result.chains.iter().map(op_ids).collect();
        assert_eq!(chains, vec![vec![1], vec![1, 2, 3]]);
    }

    #[test]
    fn extension_rejected_when_sources_overlap() {
        // op 2 consumes both 2 and the already-consumed 1.
        let s = store(
            &[(1, true), (2, false), (3, false)],
            &[op(1, &[1], 2), op(2, &[2, 1], 3)],
        );
        let result = discover(&s, sub(3), &DiscoveryConfig::default()).unwrap();
        // op 2 alone is a valid seed because it consumes source 1 directly.
        let chains: Vec<Vec<u64>> = result.chains.iter().map(op_ids).collect();
        assert_eq!(chains, vec![vec![2]]);
    }

    #[test]
    fn source_flagged_intermediate_starts_its_own_chain() {
        let s = store(
            &[(1, true), (2, true), (3, false)],
            &[op(1, &[1], 2), op(2, &[2], 3)],
        );
        let result = discover(&s, sub(3), &DiscoveryConfig::default()).unwrap();
        let chains: Vec<Vec<u64>> = result.chains.iter().map(op_ids).collect();
        assert_eq!(chains, vec![vec![2], vec![1, 2]]);
    }

    fn linear_store(len: u64) -> MemGraphStore {
        let substances: Vec<(u64, bool)> = (1..=len).map(|id| (id, id == 1)).collect();
        let ops: Vec<Operation> = (1..len).map(|id| op(id, &[id], id + 1)).collect();
        store(&substances, &ops)
    }

    #[test]
    fn long_chains_are_found_by_default() {
        let s = linear_store(40);
        let result = discover(&s, sub(40), &DiscoveryConfig::default()).unwrap();
        assert_eq!(result.chains.len(), 1);
        assert_eq!(result.chains[0].len(), 39);
    }

    #[test]
    fn exceeding_chain_length_limit_is_an_error() {
        let s = linear_store(3);
        let config = DiscoveryConfig {
            max_chain_length: Some(1),
            ..Default::default()
        };
        let err = discover(&s, sub(3), &config).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RouteError::Discovery(DiscoveryError::ChainLengthExceeded { limit: 1 })
        ));
    }

    #[test]
    fn chain_length_limit_exactly_reached_is_fine() {
        let s = linear_store(3);
        let config = DiscoveryConfig {
            max_chain_length: Some(2),
            ..Default::default()
        };
        let result = discover(&s, sub(3), &config).unwrap();
        assert_eq!(result.chains.len(), 1);
    }

    #[test]
    fn chain_limit_is_an_error() {
        let s = store(
            &[(1, true), (2, false), (3, false)],
            &[op(1, &[1], 2), op(2, &[2], 3)],
        );
        let config = DiscoveryConfig {
            max_chains: 1,
            ..Default::default()
        };
        let err = discover(&s, sub(3), &config).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RouteError::Discovery(DiscoveryError::ChainLimitExceeded { limit: 1 })
        ));
    }

    #[test]
    fn consumed_set_tracks_all_sources() {
        let s = store(
            &[(1, true), (2, false), (3, false), (4, true)],
            &[op(1, &[1], 2), op(2, &[2, 4], 3)],
        );
        let result = discover(&s, sub(3), &DiscoveryConfig::default()).unwrap();
        let long = result.chains.iter().find(|c| c.len() == 2).unwrap();
        let consumed: Vec<u64> = long.consumed().iter().map(|s| s.get()).collect();
        assert_eq!(consumed, vec![1, 2, 4]);
    }
}
