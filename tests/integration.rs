//! End-to-end integration tests for the synthroute planner.
//!
//! These tests load a store snapshot and a model from disk, run the full
//! discovery → optimization → ranking pipeline, and check chain discovery
//! against an exhaustive search on random networks.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use synthroute::config::PlannerConfig;
use synthroute::graph::{self, DiscoveryConfig};
use synthroute::oracle::{ComplexityOracle, RegressionModel};
use synthroute::planner::{PlanOutcome, Planner};
use synthroute::report::{RouteReport, UNSOLVED};
use synthroute::store::{GraphAccessor, MemGraphStore};
use synthroute::substance::{Operation, OperationId, Substance, SubstanceId};

const NETWORK: &str = r#"{
    "substances": [
        {"id": 1, "formula": "Al(OH)3", "molar_mass": 78.0, "is_source": true},
        {"id": 2, "formula": "NaOH", "molar_mass": 40.0, "is_source": true},
        {"id": 3, "formula": "NaAlO2", "molar_mass": 82.0},
        {"id": 4, "formula": "Al2O3", "molar_mass": 102.0},
        {"id": 5, "formula": "AlF3", "molar_mass": 84.0}
    ],
    "operations": [
        {"id": 1, "sources": [1], "target": 4, "temperature": 1100, "conditions": "vacuum"},
        {"id": 2, "sources": [1, 2], "target": 3, "temperature": 150, "conditions": "hydrothermal process"},
        {"id": 3, "sources": [3], "target": 4, "temperature": 1200,
         "conditions": "2 MPa; equilibrium crystallization"}
    ],
    "composition_variants": [
        {"id": 1, "substance_id": 1, "main_percent": 99.5, "fe_percent": 0.01},
        {"id": 2, "substance_id": 1, "main_percent": 98.0, "fe_percent": 0.2},
        {"id": 3, "substance_id": 2, "main_percent": 97.0, "na_percent": 57.0}
    ]
}"#;

const MODEL: &str = r#"{
    "kind": "linear",
    "intercept": 0.0,
    "weights": {
        "temperature": 0.001,
        "MPa": 0.1,
        "hydrothermal process": 1.0,
        "vacuum": 0.5,
        "equilibrium crystallization": 0.2
    }
}"#;

fn planner_from_disk(dir: &std::path::Path) -> Planner {
    let store_path = dir.join("network.json");
    let model_path = dir.join("model.json");
    std::fs::write(&store_path, NETWORK).unwrap();
    std::fs::write(&model_path, MODEL).unwrap();

    let store = MemGraphStore::load(&store_path).unwrap();
    let model = RegressionModel::load(&model_path).unwrap();
    Planner::new(PlannerConfig::default(), Arc::new(store), Arc::new(model)).unwrap()
}

fn planned(outcome: PlanOutcome) -> RouteReport {
    match outcome {
        PlanOutcome::Planned(report) => report,
        PlanOutcome::NoChains { target } => panic!("expected chains to {target}"),
    }
}

#[test]
fn end_to_end_discover_optimize_rank() {
    let dir = tempfile::TempDir::new().unwrap();
    let planner = planner_from_disk(dir.path());

    let report = planned(
        planner
            .discover_and_rank("Al2O3", [("main_percent", "99-100"), ("fe_percent", "<0.1")], 100.0)
            .unwrap(),
    );

    assert_eq!(report.target, "Al2O3");
    assert_eq!(report.chains_found, 2);
    assert!(report.ranked);

    // Direct calcination scores 1.1 + 0.5; the sodium route scores
    // (0.15 + 1.0) + (1.2 + 0.2 + 0.2).
    assert_eq!(report.variants.len(), 2);
    let first = &report.variants[0];
    let second = &report.variants[1];
    assert_eq!(first.label, "variant 1");
    assert_eq!(second.label, "variant 2");
    assert!((first.complexity.unwrap() - 1.6).abs() < 1e-9);
    assert!((second.complexity.unwrap() - 2.75).abs() < 1e-9);
    assert_eq!(first.steps.len(), 1);
    assert_eq!(second.steps.len(), 2);
    assert_eq!(second.steps[0].inputs, vec!["Al(OH)3", "NaOH"]);
    assert_eq!(second.steps[1].conditions, "1200; 2 MPa; equilibrium crystallization");

    let alloc = first.steps[0].allocation.as_ref().unwrap();
    assert_eq!(alloc.feedstock, "Al(OH)3");
    assert!((alloc.ratio - 102.0 / 156.0).abs() < 1e-12);
    assert!((alloc.total_input - 156.0 * 100.0 / 102.0).abs() < 1e-6);
    let main: f64 = alloc
        .components
        .iter()
        .map(|c| c.main_percent / 100.0 * c.mass)
        .sum::<f64>()
        / alloc.total_input;
    assert!(main >= 0.99 - 1e-9);
    assert!(second.steps[1].allocation.is_none());

    // NaOH at 97 % main cannot meet the 99 % floor.
    assert_eq!(report.unsolved.len(), 1);
    assert_eq!(report.unsolved[0].feedstock, "NaOH");
    assert_eq!(report.unsolved[0].status, UNSOLVED);
    assert_eq!(report.unsolved[0].operations, vec![2, 3]);
}

#[test]
fn repeated_requests_are_identical() {
    let dir = tempfile::TempDir::new().unwrap();
    let planner = planner_from_disk(dir.path());
    let bounds = [("fe_percent", "<0.5")];

    let a = planner.discover_and_rank("Al2O3", bounds, 250.0).unwrap();
    let b = planner.discover_and_rank("Al2O3", bounds, 250.0).unwrap();
    assert_eq!(a, b);
    assert_eq!(planned(a).variants.len(), 3);
}

#[test]
fn unranked_keeps_discovery_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let planner = planner_from_disk(dir.path());
    let report = planned(
        planner
            .discover_unranked("Al2O3", Vec::<(String, String)>::new(), 10.0)
            .unwrap(),
    );
    let feeds: Vec<&str> = report
        .variants
        .iter()
        .map(|v| v.steps[0].allocation.as_ref().unwrap().feedstock.as_str())
        .collect();
    assert_eq!(feeds, vec!["Al(OH)3", "Al(OH)3", "NaOH"]);
    assert!(report.variants.iter().all(|v| v.complexity.is_none()));
}

#[test]
fn target_without_inbound_operations() {
    let dir = tempfile::TempDir::new().unwrap();
    let planner = planner_from_disk(dir.path());
    let outcome = planner
        .discover_and_rank("AlF3", Vec::<(String, String)>::new(), 1.0)
        .unwrap();
    assert_eq!(
        outcome,
        PlanOutcome::NoChains {
            target: "AlF3".into()
        }
    );
}

#[test]
fn listing_queries() {
    let dir = tempfile::TempDir::new().unwrap();
    let planner = planner_from_disk(dir.path());
    assert_eq!(
        planner.target_formulas().unwrap(),
        vec!["Al2O3", "AlF3", "NaAlO2"]
    );
    assert_eq!(
        planner.source_formulas_for("Al2O3").unwrap(),
        vec!["Al(OH)3", "NaAlO2"]
    );
}

#[test]
fn ranking_is_independent_of_worker_count() {
    let store: Arc<dyn GraphAccessor> =
        Arc::new(MemGraphStore::from_snapshot(serde_json::from_str(NETWORK).unwrap()).unwrap());
    let oracle: Arc<dyn ComplexityOracle> = Arc::new(RegressionModel::from_json(MODEL).unwrap());
    let run = |workers: usize| {
        let config = PlannerConfig {
            worker_threads: workers,
            ..Default::default()
        };
        Planner::new(config, Arc::clone(&store), Arc::clone(&oracle))
            .unwrap()
            .discover_and_rank("Al2O3", [("si_percent", "0-1")], 50.0)
            .unwrap()
    };
    assert_eq!(run(1), run(4));
}

// ---------------------------------------------------------------------------
// Random networks
// ---------------------------------------------------------------------------

fn sub(id: u64) -> SubstanceId {
    SubstanceId::new(id).unwrap()
}

struct RandomNetwork {
    store: MemGraphStore,
    operations: Vec<Operation>,
    sources: BTreeSet<SubstanceId>,
    substances: u64,
}

fn random_network(seed: u64) -> RandomNetwork {
    let mut rng = StdRng::seed_from_u64(seed);
    let substances = 9u64;
    let store = MemGraphStore::new();
    let mut sources = BTreeSet::new();
    for id in 1..=substances {
        let is_source = id == 1 || rng.gen_bool(0.3);
        if is_source {
            sources.insert(sub(id));
        }
        store
            .insert_substance(Substance {
                id: sub(id),
                formula: format!("S{id}"),
                molar_mass: 10.0 + id as f64,
                is_source,
            })
            .unwrap();
    }

    let mut operations = Vec::new();
    for op_id in 1..=14u64 {
        let target = rng.gen_range(1..=substances);
        let mut op_sources = Vec::new();
        let arity = rng.gen_range(1..=2);
        while op_sources.len() < arity {
            let s = rng.gen_range(1..=substances);
            if s != target && !op_sources.contains(&sub(s)) {
                op_sources.push(sub(s));
            }
        }
        let op = Operation {
            id: OperationId::new(op_id).unwrap(),
            sources: op_sources,
            target: sub(target),
            temperature: rng.gen_range(20.0..1200.0),
            conditions: None,
        };
        store.insert_operation(op.clone()).unwrap();
        operations.push(op);
    }

    RandomNetwork {
        store,
        operations,
        sources,
        substances,
    }
}

/// Every valid chain to `target`, by depth-first search over all operations.
fn exhaustive_chains(
    operations: &[Operation],
    sources: &BTreeSet<SubstanceId>,
    target: SubstanceId,
) -> BTreeSet<Vec<u64>> {
    fn walk(
        path: &mut Vec<u64>,
        last_target: SubstanceId,
        consumed: &BTreeSet<SubstanceId>,
        operations: &[Operation],
        target: SubstanceId,
        out: &mut BTreeSet<Vec<u64>>,
    ) {
        if last_target == target {
            out.insert(path.clone());
        }
        for op in operations {
            if op.sources.contains(&last_target) && !op.consumes_any(consumed) {
                let mut next = consumed.clone();
                next.extend(op.sources.iter().copied());
                path.push(op.id.get());
                walk(path, op.target, &next, operations, target, out);
                path.pop();
            }
        }
    }

    let mut out = BTreeSet::new();
    for op in operations.iter().filter(|op| op.consumes_any(sources)) {
        let consumed: BTreeSet<SubstanceId> = op.sources.iter().copied().collect();
        walk(&mut vec![op.id.get()], op.target, &consumed, operations, target, &mut out);
    }
    out
}

#[test]
fn random_networks_respect_no_reuse() {
    let config = DiscoveryConfig {
        max_chains: 1_000_000,
        ..Default::default()
    };
    for seed in 0..20 {
        let net = random_network(seed);
        for target in 1..=net.substances {
            let result = graph::discover(&net.store, sub(target), &config).unwrap();

            for chain in &result.chains {
                let steps = chain.steps();
                assert!(steps[0].consumes_any(&net.sources), "seed {seed}");
                assert_eq!(chain.target(), sub(target));
                assert!(chain.len() as u64 <= net.substances);

                let mut consumed: BTreeSet<SubstanceId> = BTreeSet::new();
                for (i, op) in steps.iter().enumerate() {
                    if i > 0 {
                        assert!(op.sources.contains(&steps[i - 1].target), "seed {seed}");
                    }
                    assert!(!op.consumes_any(&consumed), "seed {seed}: reuse in {:?}", op.id);
                    consumed.extend(op.sources.iter().copied());
                }
            }

            let found: Vec<Vec<u64>> = result
                .chains
                .iter()
                .map(|c| c.steps().iter().map(|op| op.id.get()).collect())
                .collect();
            let unique: BTreeSet<Vec<u64>> = found.iter().cloned().collect();
            assert_eq!(unique.len(), found.len(), "seed {seed}: duplicate chains");
            assert_eq!(
                unique,
                exhaustive_chains(&net.operations, &net.sources, sub(target)),
                "seed {seed}, target {target}"
            );
        }
    }
}

#[test]
fn random_discovery_is_deterministic() {
    let net = random_network(7);
    let config = DiscoveryConfig {
        max_chains: 1_000_000,
        ..Default::default()
    };
    for target in 1..=net.substances {
        let a = graph::discover(&net.store, sub(target), &config).unwrap();
        let b = graph::discover(&net.store, sub(target), &config).unwrap();
        assert_eq!(a.chains, b.chains);
    }
}
