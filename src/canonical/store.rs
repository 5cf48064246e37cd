use std::collections::{BTreeMap, BTreeSet, HashMap};

use indexmap::map::Entry as MapEntry;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{Dimension, FkSlot, ForeignKeyOwner};

/// A deduplicated dimension row ready for emission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRow<D> {
    pub id: Uuid,
    #[serde(flatten)]
    pub attrs: D,
}

#[derive(Debug, Clone)]
struct Entry<D> {
    row: CanonicalRow<D>,
    /// Owner rows (media or review ids) that point at this canonical row.
    refs: Vec<Uuid>,
}

/// Identity store for one dimension type, keyed by the dimension's identity key.
///
/// Insertion order is preserved, so the first candidate seen for a key keeps its payload and
/// emission order follows first occurrence.
#[derive(Debug, Clone)]
pub struct DistinctStore<D> {
    entries: IndexMap<String, Entry<D>>,
}

impl<D> Default for DistinctStore<D> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<D: Dimension> DistinctStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `candidate` as referenced by `owner_id` and return its canonical id.
    pub fn map_distinct(&mut self, candidate: D, owner_id: Uuid) -> Uuid {
        match self.entries.entry(candidate.identity_key()) {
            MapEntry::Occupied(mut occupied) => {
                occupied.get_mut().refs.push(owner_id);
                occupied.get().row.id
            }
            MapEntry::Vacant(vacant) => {
                let id = Uuid::new_v4();
                vacant.insert(Entry {
                    row: CanonicalRow {
                        id,
                        attrs: candidate,
                    },
                    refs: vec![owner_id],
                });
                id
            }
        }
    }

    pub fn map_distinct_all<I>(&mut self, candidates: I)
    where
        I: IntoIterator<Item = (D, Uuid)>,
    {
        for (candidate, owner_id) in candidates {
            self.map_distinct(candidate, owner_id);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &CanonicalRow<D>> {
        self.entries.values().map(|e| &e.row)
    }

    /// Mutable access to payloads. Callers must not touch identity attributes.
    pub fn attrs_mut(&mut self) -> impl Iterator<Item = &mut D> {
        self.entries.values_mut().map(|e| &mut e.row.attrs)
    }

    /// Identity key -> owner ids, independent of the generated canonical ids.
    pub fn partition(&self) -> BTreeMap<String, BTreeSet<Uuid>> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.refs.iter().copied().collect()))
            .collect()
    }

    /// Write every canonical id into its owners' foreign-key slot and emit the canonical rows.
    ///
    /// All references are checked before the first slot is written, so on error the owner
    /// table is left untouched.
    pub fn remap_and_finalize<O: ForeignKeyOwner>(
        self,
        owners: &mut IndexMap<Uuid, O>,
    ) -> Result<Vec<CanonicalRow<D>>> {
        let key = D::FOREIGN_KEY;
        let mut single_bindings: HashMap<Uuid, Uuid> = HashMap::new();

        for entry in self.entries.values() {
            for owner_id in &entry.refs {
                let owner = owners.get_mut(owner_id).ok_or(EngineError::UnknownOwner {
                    dimension: D::TABLE,
                    canonical_id: entry.row.id,
                    owner_id: *owner_id,
                })?;
                match owner.slot_mut(key) {
                    None => {
                        return Err(EngineError::NoSuchSlot {
                            owner: O::ROW_KIND,
                            field: key.column(),
                        })
                    }
                    Some(FkSlot::Many(_)) => {}
                    Some(FkSlot::One(slot)) => {
                        let bound = (*slot).or_else(|| single_bindings.get(owner_id).copied());
                        if let Some(existing) = bound.filter(|id| *id != entry.row.id) {
                            return Err(EngineError::SlotAlreadyBound {
                                field: key.column(),
                                owner_id: *owner_id,
                                existing,
                                incoming: entry.row.id,
                            });
                        }
                        single_bindings.insert(*owner_id, entry.row.id);
                    }
                }
            }
        }

        let mut rows = Vec::with_capacity(self.entries.len());
        let mut links = 0usize;
        for (_, Entry { row, refs }) in self.entries {
            for owner_id in refs {
                let Some(owner) = owners.get_mut(&owner_id) else {
                    continue;
                };
                match owner.slot_mut(key) {
                    Some(FkSlot::Many(ids)) => {
                        // a document listing the same genre twice still links it once
                        if !ids.contains(&row.id) {
                            ids.push(row.id);
                            links += 1;
                        }
                    }
                    Some(FkSlot::One(slot)) => {
                        *slot = Some(row.id);
                        links += 1;
                    }
                    None => {}
                }
            }
            rows.push(row);
        }

        debug!(
            table = D::TABLE,
            field = key.column(),
            rows = rows.len(),
            links,
            "canonical rows remapped"
        );
        Ok(rows)
    }
}
