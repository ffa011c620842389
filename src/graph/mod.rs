//! Reaction hypergraph and chain discovery.
//!
//! - **Arena** ([`ReactionGraph`]): materialized operations in a `petgraph`
//!   digraph, one edge per (source, operation) pair
//! - **Discovery** ([`traverse`]): layered materialization from the store,
//!   then breadth-first chain enumeration under the no-reuse invariant

pub mod index;
pub mod traverse;

pub use index::ReactionGraph;
pub use traverse::{Chain, DiscoveryConfig, DiscoveryResult, discover, discover_chains, materialize};
