// 🗃️ Mapping Store - Immutable snapshots of the mapping set
//
// Every mutation returns a NEW store; the receiver is never modified.
// Records are shared between snapshots through Arc, so a snapshot costs one
// pointer per mapping, not a deep copy.
//
// Structural checks only (duplicate pair, unknown id). Cardinality and
// coverage problems are the validator's job and never block a mutation.

use crate::accounts::{AccountCatalog, Universe};
use crate::history::{Change, ChangeBatch};
use crate::mapping::{Mapping, MappingFilter, MappingPatch, MappingType};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// STORE ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("mapping {source_account} -> {target_account} already exists as {existing_id}")]
    DuplicateEdge {
        source_account: String,
        target_account: String,
        existing_id: String,
    },

    #[error("mapping id {mapping_id} is already in use")]
    DuplicateId { mapping_id: String },

    #[error("mapping {mapping_id} not found")]
    NotFound { mapping_id: String },

    #[error("batch contains no changes")]
    EmptyBatch,
}

// ============================================================================
// ACCOUNT SUMMARY (badge query)
// ============================================================================

/// How one account participates in the mapping set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMappingSummary {
    pub universe: Universe,
    pub account_number: String,
    pub is_mapped: bool,
    pub edge_count: usize,

    /// Set when every edge of the account agrees on one type
    pub mapping_type: Option<MappingType>,

    /// Distinct types across the account's edges, sorted
    pub mapping_types: Vec<MappingType>,
}

// ============================================================================
// MAPPING STORE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    mappings: Arc<Vec<Arc<Mapping>>>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from an external store as-is
    ///
    /// No structural checks: persisted data may already contain duplicate
    /// pairs, and the validator is what reports them.
    pub fn from_mappings(mappings: Vec<Mapping>) -> Self {
        MappingStore {
            mappings: Arc::new(mappings.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mapping> {
        self.mappings.iter().map(|m| m.as_ref())
    }

    /// Owned copy of every record, in store order
    pub fn to_vec(&self) -> Vec<Mapping> {
        self.iter().cloned().collect()
    }

    pub fn get(&self, mapping_id: &str) -> Option<&Mapping> {
        self.iter().find(|m| m.mapping_id == mapping_id)
    }

    /// Existing mapping for a (source, target) pair, if any
    pub fn find_edge(&self, source: &str, target: &str) -> Option<&Mapping> {
        self.iter().find(|m| m.edge_key() == (source, target))
    }

    /// Whether two snapshots share the same backing list (no copy happened)
    pub fn shares_storage_with(&self, other: &MappingStore) -> bool {
        Arc::ptr_eq(&self.mappings, &other.mappings)
    }

    // ========================================================================
    // MUTATIONS (each returns a new snapshot)
    // ========================================================================

    pub fn add_mapping(&self, mapping: Mapping) -> Result<MappingStore, StoreError> {
        let mut next = self.working_copy();
        insert(&mut next, mapping)?;
        Ok(Self::wrap(next))
    }

    pub fn update_mapping(&self, mapping_id: &str, patch: &MappingPatch) -> Result<MappingStore, StoreError> {
        let mut next = self.working_copy();
        update(&mut next, mapping_id, patch)?;
        Ok(Self::wrap(next))
    }

    pub fn remove_mapping(&self, mapping_id: &str) -> Result<MappingStore, StoreError> {
        let mut next = self.working_copy();
        remove(&mut next, mapping_id)?;
        Ok(Self::wrap(next))
    }

    pub fn apply_change(&self, change: &Change) -> Result<MappingStore, StoreError> {
        self.apply_batch(std::slice::from_ref(change))
    }

    /// Apply every change in order, all or nothing
    ///
    /// On error the receiver is still the valid snapshot; nothing partial
    /// escapes.
    pub fn apply_batch(&self, changes: &[Change]) -> Result<MappingStore, StoreError> {
        if changes.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let mut next = self.working_copy();
        for change in changes {
            apply_checked(&mut next, change)?;
        }
        Ok(Self::wrap(next))
    }

    /// Apply a new batch with full checks and stamp it for the history
    ///
    /// The returned batch records, for every CREATE and DELETE, the index the
    /// record was inserted at or removed from.
    pub fn apply_recorded(&self, batch: ChangeBatch) -> Result<(MappingStore, ChangeBatch), StoreError> {
        if batch.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let mut next = self.working_copy();
        let mut stamped = Vec::with_capacity(batch.len());
        for change in &batch.changes {
            stamped.push(apply_checked(&mut next, change)?);
        }
        Ok((Self::wrap(next), ChangeBatch::new(&batch.label, stamped)))
    }

    /// Re-apply a batch handed back by undo or redo
    ///
    /// Such a batch only leads back to a state this store already held, so
    /// pair and id uniqueness are not re-checked. Records return to their
    /// stamped positions.
    pub fn restore_batch(&self, changes: &[Change]) -> Result<MappingStore, StoreError> {
        if changes.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let mut next = self.working_copy();
        for change in changes {
            match change {
                Change::Create { mapping, position } => {
                    let index = position.unwrap_or(next.len()).min(next.len());
                    next.insert(index, Arc::new(mapping.clone()));
                }
                Change::Update { mapping_id, after, .. } => update(&mut next, mapping_id, after)?,
                Change::Delete { mapping, position } => {
                    let at_stamp = position.filter(|&i| {
                        next.get(i).map_or(false, |m| m.mapping_id == mapping.mapping_id)
                    });
                    let index = at_stamp
                        .or_else(|| next.iter().rposition(|m| m.mapping_id == mapping.mapping_id))
                        .ok_or_else(|| StoreError::NotFound {
                            mapping_id: mapping.mapping_id.clone(),
                        })?;
                    next.remove(index);
                }
            }
        }
        Ok(Self::wrap(next))
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn list_mappings(&self, filter: Option<&MappingFilter>) -> Vec<&Mapping> {
        self.iter()
            .filter(|m| filter.map_or(true, |f| f.matches(m)))
            .collect()
    }

    /// Every mapping whose endpoint in `universe` is `account_number`
    pub fn mappings_for_account(&self, universe: Universe, account_number: &str) -> Vec<&Mapping> {
        self.iter()
            .filter(|m| match universe {
                Universe::Source => m.source_account_number == account_number,
                Universe::Target => m.target_account_number == account_number,
            })
            .collect()
    }

    /// Mappings whose source account was exported by `provider`
    pub fn list_mappings_for_provider(&self, catalog: &AccountCatalog, provider: &str) -> Vec<&Mapping> {
        self.iter()
            .filter(|m| {
                catalog
                    .source_account(&m.source_account_number)
                    .map_or(false, |a| a.provider.eq_ignore_ascii_case(provider))
            })
            .collect()
    }

    /// Badge data for one account: mapped or not, edge count, type(s)
    pub fn account_summary(&self, universe: Universe, account_number: &str) -> AccountMappingSummary {
        let edges = self.mappings_for_account(universe, account_number);

        let mut mapping_types: Vec<MappingType> = edges.iter().map(|m| m.mapping_type).collect();
        mapping_types.sort();
        mapping_types.dedup();

        AccountMappingSummary {
            universe,
            account_number: account_number.to_string(),
            is_mapped: !edges.is_empty(),
            edge_count: edges.len(),
            mapping_type: if mapping_types.len() == 1 { Some(mapping_types[0]) } else { None },
            mapping_types,
        }
    }

    fn working_copy(&self) -> Vec<Arc<Mapping>> {
        self.mappings.as_ref().clone()
    }

    fn wrap(mappings: Vec<Arc<Mapping>>) -> Self {
        MappingStore {
            mappings: Arc::new(mappings),
        }
    }
}

// ============================================================================
// IN-PLACE HELPERS (on a private working copy only)
// ============================================================================

/// Apply one change with full checks; returns it stamped with its position
fn apply_checked(list: &mut Vec<Arc<Mapping>>, change: &Change) -> Result<Change, StoreError> {
    let stamped = match change {
        Change::Create { mapping, .. } => Change::Create {
            mapping: mapping.clone(),
            position: Some(insert(list, mapping.clone())?),
        },
        Change::Update { mapping_id, after, .. } => {
            update(list, mapping_id, after)?;
            change.clone()
        }
        Change::Delete { mapping, .. } => Change::Delete {
            mapping: mapping.clone(),
            position: Some(remove(list, &mapping.mapping_id)?),
        },
    };
    Ok(stamped)
}

fn insert(list: &mut Vec<Arc<Mapping>>, mapping: Mapping) -> Result<usize, StoreError> {
    if let Some(existing) = list.iter().find(|m| m.edge_key() == mapping.edge_key()) {
        return Err(StoreError::DuplicateEdge {
            source_account: mapping.source_account_number.clone(),
            target_account: mapping.target_account_number.clone(),
            existing_id: existing.mapping_id.clone(),
        });
    }
    if list.iter().any(|m| m.mapping_id == mapping.mapping_id) {
        return Err(StoreError::DuplicateId {
            mapping_id: mapping.mapping_id,
        });
    }
    list.push(Arc::new(mapping));
    Ok(list.len() - 1)
}

fn update(list: &mut [Arc<Mapping>], mapping_id: &str, patch: &MappingPatch) -> Result<(), StoreError> {
    let slot = list
        .iter_mut()
        .find(|m| m.mapping_id == mapping_id)
        .ok_or_else(|| StoreError::NotFound {
            mapping_id: mapping_id.to_string(),
        })?;
    let patched = patch.apply(slot);
    *slot = Arc::new(patched);
    Ok(())
}

fn remove(list: &mut Vec<Arc<Mapping>>, mapping_id: &str) -> Result<usize, StoreError> {
    let index = list
        .iter()
        .position(|m| m.mapping_id == mapping_id)
        .ok_or_else(|| StoreError::NotFound {
            mapping_id: mapping_id.to_string(),
        })?;
    list.remove(index);
    Ok(index)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{LedgerSection, SourceAccount};
    use crate::mapping::MappingStatus;

    fn store_with(mappings: &[(&str, &str, &str)]) -> MappingStore {
        MappingStore::from_mappings(
            mappings
                .iter()
                .map(|(id, s, t)| Mapping::one_to_one(id, s, t))
                .collect(),
        )
    }

    #[test]
    fn test_add_returns_new_snapshot() {
        let empty = MappingStore::new();
        let one = empty
            .add_mapping(Mapping::one_to_one("MAP-1", "1050", "EAGLE-1050"))
            .unwrap();

        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert!(one.get("MAP-1").is_some());
    }

    #[test]
    fn test_add_duplicate_edge_fails() {
        let store = store_with(&[("MAP-1", "1050", "EAGLE-1050")]);
        let err = store
            .add_mapping(Mapping::one_to_one("MAP-2", "1050", "EAGLE-1050"))
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::DuplicateEdge {
                source_account: "1050".to_string(),
                target_account: "EAGLE-1050".to_string(),
                existing_id: "MAP-1".to_string(),
            }
        );
    }

    #[test]
    fn test_add_duplicate_id_fails() {
        let store = store_with(&[("MAP-1", "1050", "EAGLE-1050")]);
        let err = store
            .add_mapping(Mapping::one_to_one("MAP-1", "1100", "EAGLE-1100"))
            .unwrap_err();

        assert!(matches!(err, StoreError::DuplicateId { .. }));
    }

    #[test]
    fn test_update_and_remove_unknown_id() {
        let store = store_with(&[("MAP-1", "1050", "EAGLE-1050")]);
        let patch = MappingPatch::new().with_status(MappingStatus::Active);

        assert!(matches!(
            store.update_mapping("MAP-9", &patch),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(store.remove_mapping("MAP-9"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_update_leaves_previous_snapshot_intact() {
        let before = store_with(&[("MAP-1", "1050", "EAGLE-1050")]);
        let patch = MappingPatch::new().with_status(MappingStatus::Active);
        let after = before.update_mapping("MAP-1", &patch).unwrap();

        assert_eq!(before.get("MAP-1").unwrap().status, MappingStatus::Draft);
        assert_eq!(after.get("MAP-1").unwrap().status, MappingStatus::Active);
        assert!(!before.shares_storage_with(&after));
        assert!(before.shares_storage_with(&before.clone()));
    }

    #[test]
    fn test_batch_is_all_or_nothing() {
        let store = store_with(&[("MAP-1", "1050", "EAGLE-1050")]);
        let batch = vec![
            Change::create(Mapping::one_to_one("MAP-2", "1100", "EAGLE-1100")),
            Change::delete(Mapping::one_to_one("MAP-9", "x", "y")),
        ];

        assert!(store.apply_batch(&batch).is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.apply_batch(&[]).unwrap_err(), StoreError::EmptyBatch);
    }

    #[test]
    fn test_mappings_for_account_by_universe() {
        let store = store_with(&[
            ("MAP-1", "1050", "EAGLE-1050"),
            ("MAP-2", "1050", "EAGLE-1060"),
            ("MAP-3", "1100", "EAGLE-1050"),
        ]);

        assert_eq!(store.mappings_for_account(Universe::Source, "1050").len(), 2);
        assert_eq!(store.mappings_for_account(Universe::Target, "EAGLE-1050").len(), 2);
        assert!(store.mappings_for_account(Universe::Target, "1050").is_empty());
    }

    #[test]
    fn test_list_with_filter() {
        let store = store_with(&[("MAP-1", "1050", "EAGLE-1050"), ("MAP-2", "1100", "EAGLE-1100")]);
        let filter = MappingFilter::default().with_target("EAGLE-1100");

        assert_eq!(store.list_mappings(None).len(), 2);
        let filtered = store.list_mappings(Some(&filter));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].mapping_id, "MAP-2");
    }

    #[test]
    fn test_provider_listing_uses_catalog() {
        let catalog = AccountCatalog::new(
            vec![
                SourceAccount::new("1050", "CASH", LedgerSection::Assets, "STATE_STREET"),
                SourceAccount::new("1100", "AR", LedgerSection::Assets, "BNY"),
            ],
            vec![],
        );
        let store = store_with(&[("MAP-1", "1050", "EAGLE-1050"), ("MAP-2", "1100", "EAGLE-1100")]);

        let listed = store.list_mappings_for_provider(&catalog, "BNY");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].mapping_id, "MAP-2");
    }

    #[test]
    fn test_account_summary() {
        let mut store = store_with(&[("MAP-1", "1050", "EAGLE-1050")]);
        store = store
            .add_mapping(Mapping::grouped("MAP-2", "1100", "EAGLE-1050", MappingType::ManyToOne, 0.5, "G"))
            .unwrap();

        let single = store.account_summary(Universe::Source, "1050");
        assert!(single.is_mapped);
        assert_eq!(single.edge_count, 1);
        assert_eq!(single.mapping_type, Some(MappingType::OneToOne));

        let mixed = store.account_summary(Universe::Target, "EAGLE-1050");
        assert_eq!(mixed.edge_count, 2);
        assert_eq!(mixed.mapping_type, None);
        assert_eq!(mixed.mapping_types, vec![MappingType::OneToOne, MappingType::ManyToOne]);

        let free = store.account_summary(Universe::Source, "9999");
        assert!(!free.is_mapped);
        assert_eq!(free.edge_count, 0);
    }

    #[test]
    fn test_recorded_batch_is_stamped_with_positions() {
        let store = store_with(&[("MAP-1", "1050", "EAGLE-1050"), ("MAP-2", "1100", "EAGLE-1100")]);
        let batch = ChangeBatch::new(
            "edit",
            vec![
                Change::delete(store.get("MAP-1").unwrap().clone()),
                Change::create(Mapping::one_to_one("MAP-3", "1200", "EAGLE-1200")),
            ],
        );

        let (next, stamped) = store.apply_recorded(batch).unwrap();
        assert!(matches!(stamped.changes[0], Change::Delete { position: Some(0), .. }));
        assert!(matches!(stamped.changes[1], Change::Create { position: Some(1), .. }));

        let back = next.restore_batch(&stamped.inverse().changes).unwrap();
        assert_eq!(back.to_vec(), store.to_vec());
    }

    #[test]
    fn test_restore_brings_back_seeded_duplicates() {
        let seeded = store_with(&[
            ("MAP-1", "1050", "EAGLE-1050"),
            ("MAP-2", "1050", "EAGLE-1050"),
            ("MAP-2", "1100", "EAGLE-1100"),
        ]);
        let (removed, stamped) = seeded
            .apply_recorded(ChangeBatch::single(
                "delete",
                Change::delete(seeded.get("MAP-1").unwrap().clone()),
            ))
            .unwrap();
        assert_eq!(removed.len(), 2);

        // The checked path refuses the re-create; the restore path does not
        let inverse = stamped.inverse();
        assert!(matches!(
            removed.apply_batch(&inverse.changes),
            Err(StoreError::DuplicateEdge { .. })
        ));
        let restored = removed.restore_batch(&inverse.changes).unwrap();
        assert_eq!(restored.to_vec(), seeded.to_vec());
    }
}
