// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # synthroute
//!
//! Synthesis route planning over a reaction hypergraph: find every chain of
//! operations that turns source raw materials into a target substance, size
//! the feedstock for each chain with a mass-balance linear program, and rank
//! the feasible chains by predicted process complexity.
//!
//! ## Architecture
//!
//! - **Store** (`store`): read-only [`GraphAccessor`](store::GraphAccessor) with a DashMap-backed in-memory implementation
//! - **Discovery** (`graph`): layered materialization into a petgraph arena, then parallel BFS under the no-reuse rule
//! - **Optimization** (`optimize`, `lp`): stoichiometric ratio plus a two-phase simplex solve per variant
//! - **Ranking** (`rank`, `oracle`): condition featurization scored by an injected regression oracle
//! - **Facade** (`planner`): owns the worker pool and runs the pipeline per request
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use synthroute::config::PlannerConfig;
//! use synthroute::oracle::RegressionModel;
//! use synthroute::planner::Planner;
//! use synthroute::store::MemGraphStore;
//!
//! let store = MemGraphStore::load("network.json".as_ref()).unwrap();
//! let model = RegressionModel::load("model.json".as_ref()).unwrap();
//! let planner = Planner::new(PlannerConfig::default(), Arc::new(store), Arc::new(model)).unwrap();
//! let outcome = planner
//!     .discover_and_rank("Al2O3", [("fe_percent", "<0.05")], 100.0)
//!     .unwrap();
//! ```

pub mod bounds;
pub mod cancel;
pub mod config;
pub mod error;
pub mod formula;
pub mod graph;
pub mod lp;
pub mod optimize;
pub mod oracle;
pub mod planner;
pub mod rank;
pub mod report;
pub mod route;
pub mod store;
pub mod substance;
