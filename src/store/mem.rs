//! In-memory graph store backed by DashMap.
//!
//! Holds a full copy of the reaction network with secondary indexes for
//! formula lookup and for the consumer/producer sides of every operation.
//! Readers never block each other. All data is lost on process exit.

use std::collections::BTreeSet;

use dashmap::DashMap;

use crate::error::StoreError;
use crate::substance::{CompositionVariant, Operation, OperationId, Substance, SubstanceId};

use super::{GraphAccessor, StoreResult, StoreSnapshot};

/// Concurrent in-memory implementation of [`GraphAccessor`].
#[derive(Debug, Default)]
pub struct MemGraphStore {
    substances: DashMap<SubstanceId, Substance>,
    by_formula: DashMap<String, SubstanceId>,
    operations: DashMap<OperationId, Operation>,
    /// Substance → operations that consume it.
    consumers: DashMap<SubstanceId, BTreeSet<OperationId>>,
    /// Substance → operations that produce it.
    producers: DashMap<SubstanceId, BTreeSet<OperationId>>,
    variants: DashMap<SubstanceId, Vec<CompositionVariant>>,
}

impl MemGraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot, validating references.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> StoreResult<Self> {
        let store = Self::new();
        for substance in snapshot.substances {
            store.insert_substance(substance)?;
        }
        for variant in snapshot.composition_variants {
            store.insert_variant(variant)?;
        }
        for operation in snapshot.operations {
            store.insert_operation(operation)?;
        }
        tracing::debug!(
            substances = store.substances.len(),
            operations = store.operations.len(),
            "loaded graph store snapshot"
        );
        Ok(store)
    }

    /// Load a JSON snapshot file.
    pub fn load(path: &std::path::Path) -> StoreResult<Self> {
        Self::from_snapshot(StoreSnapshot::load(path)?)
    }

    /// Copy the store contents out, ordered by id.
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut substances: Vec<Substance> = self.substances.iter().map(|e| e.value().clone()).collect();
        substances.sort_by_key(|s| s.id);
        let mut operations: Vec<Operation> = self.operations.iter().map(|e| e.value().clone()).collect();
        operations.sort_by_key(|o| o.id);
        let mut composition_variants: Vec<CompositionVariant> = self
            .variants
            .iter()
            .flat_map(|e| e.value().clone())
            .collect();
        composition_variants.sort_by_key(|v| v.id);
        StoreSnapshot {
            substances,
            operations,
            composition_variants,
        }
    }

    /// Write the store as a JSON snapshot file.
    pub fn save(&self, path: &std::path::Path) -> StoreResult<()> {
        self.snapshot().save(path)
    }

    pub fn insert_substance(&self, substance: Substance) -> StoreResult<()> {
        if !(substance.molar_mass.is_finite() && substance.molar_mass > 0.0) {
            return Err(StoreError::Invalid {
                message: format!(
                    "substance {} ({}) has non-positive molar mass {}",
                    substance.id, substance.formula, substance.molar_mass
                ),
            });
        }
        if let Some(existing) = self.by_formula.get(&substance.formula) {
            if *existing.value() != substance.id {
                return Err(StoreError::Invalid {
                    message: format!(
                        "formula {} is used by both {} and {}",
                        substance.formula,
                        existing.value(),
                        substance.id
                    ),
                });
            }
        }
        if let Some(previous) = self.substances.get(&substance.id) {
            if previous.formula != substance.formula {
                self.by_formula.remove(&previous.formula);
            }
        }
        self.by_formula.insert(substance.formula.clone(), substance.id);
        self.substances.insert(substance.id, substance);
        Ok(())
    }

    pub fn insert_variant(&self, variant: CompositionVariant) -> StoreResult<()> {
        if !self.substances.contains_key(&variant.substance_id) {
            return Err(StoreError::Invalid {
                message: format!(
                    "composition variant {} references unknown substance {}",
                    variant.id, variant.substance_id
                ),
            });
        }
        let out_of_range = crate::substance::PropertyKey::ALL
            .iter()
            .map(|k| variant.percent(*k))
            .find(|p| !(0.0..=100.0).contains(p));
        if let Some(p) = out_of_range {
            return Err(StoreError::Invalid {
                message: format!("composition variant {} has percentage {p} outside 0..=100", variant.id),
            });
        }

        let mut entry = self.variants.entry(variant.substance_id).or_default();
        entry.retain(|v| v.id != variant.id);
        entry.push(variant);
        entry.sort_by_key(|v| v.id);
        Ok(())
    }

    pub fn insert_operation(&self, operation: Operation) -> StoreResult<()> {
        if operation.sources.is_empty() {
            return Err(StoreError::Invalid {
                message: format!("operation {} has no sources", operation.id),
            });
        }
        let referenced = operation.sources.iter().chain(std::iter::once(&operation.target));
        for id in referenced {
            if !self.substances.contains_key(id) {
                return Err(StoreError::Invalid {
                    message: format!("operation {} references unknown substance {id}", operation.id),
                });
            }
        }
        let unique: BTreeSet<_> = operation.sources.iter().collect();
        if unique.len() != operation.sources.len() {
            tracing::warn!(operation = %operation.id, "operation lists a source more than once");
        }

        if let Some((_, previous)) = self.operations.remove(&operation.id) {
            self.unindex(&previous);
        }
        for source in &operation.sources {
            self.consumers.entry(*source).or_default().insert(operation.id);
        }
        self.producers
            .entry(operation.target)
            .or_default()
            .insert(operation.id);
        self.operations.insert(operation.id, operation);
        Ok(())
    }

    fn unindex(&self, operation: &Operation) {
        for source in &operation.sources {
            if let Some(mut set) = self.consumers.get_mut(source) {
                set.remove(&operation.id);
            }
        }
        if let Some(mut set) = self.producers.get_mut(&operation.target) {
            set.remove(&operation.id);
        }
    }

    fn operations_by_ids(&self, ids: impl IntoIterator<Item = OperationId>) -> Vec<Operation> {
        ids.into_iter()
            .filter_map(|id| self.operations.get(&id).map(|op| op.value().clone()))
            .collect()
    }

    pub fn substance_count(&self) -> usize {
        self.substances.len()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}

impl GraphAccessor for MemGraphStore {
    fn source_substance_ids(&self) -> StoreResult<Vec<SubstanceId>> {
        let mut ids: Vec<SubstanceId> = self
            .substances
            .iter()
            .filter(|entry| entry.value().is_source)
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn operations_intersecting(&self, ids: &[SubstanceId]) -> StoreResult<Vec<Operation>> {
        let mut op_ids = BTreeSet::new();
        for id in ids {
            if let Some(set) = self.consumers.get(id) {
                op_ids.extend(set.value().iter().copied());
            }
        }
        Ok(self.operations_by_ids(op_ids))
    }

    fn operations_producing(&self, target: SubstanceId) -> StoreResult<Vec<Operation>> {
        let op_ids: Vec<OperationId> = self
            .producers
            .get(&target)
            .map(|set| set.value().iter().copied().collect())
            .unwrap_or_default();
        Ok(self.operations_by_ids(op_ids))
    }

    fn substance_by_id(&self, id: SubstanceId) -> StoreResult<Option<Substance>> {
        Ok(self.substances.get(&id).map(|s| s.value().clone()))
    }

    fn substance_by_formula(&self, formula: &str) -> StoreResult<Option<Substance>> {
        let id = self.by_formula.get(formula).map(|id| *id.value());
        match id {
            Some(id) => self.substance_by_id(id),
            None => Ok(None),
        }
    }

    fn composition_variants(&self, id: SubstanceId) -> StoreResult<Vec<CompositionVariant>> {
        Ok(self
            .variants
            .get(&id)
            .map(|v| v.value().clone())
            .unwrap_or_default())
    }

    fn all_substances(&self) -> StoreResult<Vec<Substance>> {
        let mut all: Vec<Substance> = self.substances.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|s| s.id);
        Ok(all)
    }
}
