//! Read access to the reaction network.
//!
//! The planner never talks to a database directly. Everything it needs goes
//! through [`GraphAccessor`], a read-only interface with batched lookups so
//! that a backing store can answer one round trip per id set.
//!
//! [`MemGraphStore`] is the in-process implementation, loaded from a JSON
//! [`StoreSnapshot`].

pub mod mem;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::substance::{CompositionVariant, Operation, Substance, SubstanceId};

pub use mem::MemGraphStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read-only access to substances, operations and composition variants.
///
/// All methods are pure reads. Implementations should return records in
/// ascending id order so repeated requests see identical input.
pub trait GraphAccessor: Send + Sync {
    /// Ids of every substance flagged as source material.
    fn source_substance_ids(&self) -> StoreResult<Vec<SubstanceId>>;

    /// Operations whose source set intersects `ids`.
    fn operations_intersecting(&self, ids: &[SubstanceId]) -> StoreResult<Vec<Operation>>;

    /// Operations whose target is `target`.
    fn operations_producing(&self, target: SubstanceId) -> StoreResult<Vec<Operation>>;

    fn substance_by_id(&self, id: SubstanceId) -> StoreResult<Option<Substance>>;

    fn substance_by_formula(&self, formula: &str) -> StoreResult<Option<Substance>>;

    fn composition_variants(&self, id: SubstanceId) -> StoreResult<Vec<CompositionVariant>>;

    /// Every substance in the store.
    fn all_substances(&self) -> StoreResult<Vec<Substance>>;

    /// Batched substance lookup. Unknown ids are omitted.
    fn substances_by_ids(&self, ids: &[SubstanceId]) -> StoreResult<Vec<Substance>> {
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(s) = self.substance_by_id(id)? {
                out.push(s);
            }
        }
        Ok(out)
    }

    /// Batched composition-variant lookup.
    fn composition_variants_for(&self, ids: &[SubstanceId]) -> StoreResult<Vec<CompositionVariant>> {
        let mut out = Vec::new();
        for &id in ids {
            out.extend(self.composition_variants(id)?);
        }
        Ok(out)
    }
}

/// Serialized form of a whole store, as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub substances: Vec<Substance>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub composition_variants: Vec<CompositionVariant>,
}

impl StoreSnapshot {
    /// Read a JSON snapshot from `path`.
    pub fn load(path: &std::path::Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            StoreError::Parse { message, .. } => StoreError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Write the snapshot as pretty-printed JSON.
    pub fn save(&self, path: &std::path::Path) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| StoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| StoreError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Parse a JSON snapshot from a string.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::Parse {
            path: "(inline)".into(),
            message: e.to_string(),
        })
    }
}
