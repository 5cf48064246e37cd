use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{FkSlot, ForeignKey, ForeignKeyOwner};

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeRow {
    pub owner_id: Uuid,
    pub dimension_id: Uuid,
    pub weight: f64,
}

/// Many-to-many link rows for one foreign-key list, e.g. `BRIDGE_MEDIA_GENRE`.
#[derive(Debug, Clone)]
pub struct BridgeTable {
    pub name: String,
    pub owner_key: &'static str,
    pub field: ForeignKey,
    pub rows: Vec<BridgeRow>,
}

impl BridgeTable {
    fn new(owner_key: &'static str, field: ForeignKey) -> Self {
        let entity = |column: &str| column.trim_end_matches("_id").to_uppercase();
        Self {
            name: format!("BRIDGE_{}_{}", entity(owner_key), entity(field.column())),
            owner_key,
            field,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of weights per owner; each owner with at least one link sums to 1.
    pub fn weight_per_owner(&self) -> IndexMap<Uuid, f64> {
        let mut sums: IndexMap<Uuid, f64> = IndexMap::new();
        for row in &self.rows {
            *sums.entry(row.owner_id).or_insert(0.0) += row.weight;
        }
        sums
    }

    pub fn to_row_maps(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                let mut map = Map::new();
                map.insert(self.owner_key.to_string(), json!(row.owner_id));
                map.insert(self.field.column().to_string(), json!(row.dimension_id));
                map.insert("weight".to_string(), json!(row.weight));
                map
            })
            .collect()
    }
}

/// Expand each listed foreign-key list on the owners into weighted bridge rows.
///
/// The lists are drained from the owners: once bridged, the relationship lives only in the
/// bridge table. An empty list contributes no rows.
pub fn build_bridges<O: ForeignKeyOwner>(
    owners: &mut IndexMap<Uuid, O>,
    fields: &[ForeignKey],
    owner_key: &'static str,
) -> Result<Vec<BridgeTable>> {
    let mut tables: Vec<BridgeTable> = fields
        .iter()
        .map(|field| BridgeTable::new(owner_key, *field))
        .collect();

    for (owner_id, owner) in owners.iter_mut() {
        for table in tables.iter_mut() {
            let ids = match owner.slot_mut(table.field) {
                Some(FkSlot::Many(ids)) => std::mem::take(ids),
                _ => {
                    return Err(EngineError::NoSuchSlot {
                        owner: O::ROW_KIND,
                        field: table.field.column(),
                    })
                }
            };
            if ids.is_empty() {
                continue;
            }
            let weight = 1.0 / ids.len() as f64;
            table.rows.extend(ids.into_iter().map(|dimension_id| BridgeRow {
                owner_id: *owner_id,
                dimension_id,
                weight,
            }));
        }
    }

    Ok(tables)
}
