// 🧭 Mapping Session - One operator editing one mapping set
//
// Wires the pieces together:
//   user action -> ChangeBatch -> MappingStore (new snapshot)
//               -> CommandHistory (only if the store accepted it)
//               -> CardinalityValidator (post-commit, always)
//               -> ConnectorLayer (marked dirty, redrawn on next frame)
//
// A batch the store rejects is never recorded, so every history entry is
// known to be appliable and undo/redo stay symmetric.

use crate::accounts::{AccountCatalog, Universe};
use crate::config::EngineConfig;
use crate::geometry::{ConnectionLine, CurveSettings, LayoutProvider};
use crate::history::{Change, ChangeBatch, CommandHistory, HistoryState};
use crate::mapping::{generate_group_id, generate_mapping_id, Mapping, MappingDraft, MappingPatch, MappingType};
use crate::scheduler::{ConnectorLayer, RecomputeReason};
use crate::store::{AccountMappingSummary, MappingStore, StoreError};
use crate::validator::{CardinalityValidator, ValidationResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

// ============================================================================
// SESSION ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{universe} account {account_number} not found")]
    UnknownAccount {
        universe: Universe,
        account_number: String,
    },
}

// ============================================================================
// BULK RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkCreateError {
    /// Position of the failed entry in the request
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkCreateResult {
    pub created: usize,
    pub errors: Vec<BulkCreateError>,
    pub mappings: Vec<Mapping>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkDeleteResult {
    pub deleted: usize,
    pub requested: usize,
}

// ============================================================================
// MAPPING SESSION
// ============================================================================

pub struct MappingSession {
    catalog: AccountCatalog,
    store: MappingStore,
    history: CommandHistory,
    validator: CardinalityValidator,
    validation: ValidationResult,
    selected: Option<String>,
    connectors: ConnectorLayer,
    curve: CurveSettings,

    /// Recorded as `createdBy` when a draft does not name its author
    actor: Option<String>,
}

impl MappingSession {
    pub fn new(catalog: AccountCatalog, mappings: Vec<Mapping>) -> Self {
        Self::with_config(catalog, mappings, &EngineConfig::default())
    }

    pub fn with_config(catalog: AccountCatalog, mappings: Vec<Mapping>, config: &EngineConfig) -> Self {
        let store = MappingStore::from_mappings(mappings);
        let validator = config.validator();
        let validation = validator.validate(&catalog, store.iter());

        MappingSession {
            catalog,
            store,
            history: config.history(),
            validator,
            validation,
            selected: None,
            connectors: ConnectorLayer::new(),
            curve: config.curve(),
            actor: None,
        }
    }

    pub fn set_actor(&mut self, actor: &str) {
        self.actor = Some(actor.to_string());
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn catalog(&self) -> &AccountCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &MappingStore {
        &self.store
    }

    pub fn mappings(&self) -> Vec<&Mapping> {
        self.store.iter().collect()
    }

    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    pub fn history_state(&self) -> HistoryState {
        self.history.get_state()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn account_summary(&self, universe: Universe, account_number: &str) -> AccountMappingSummary {
        self.store.account_summary(universe, account_number)
    }

    /// Swap in refreshed reference data; mappings are kept as they are
    pub fn refresh_catalog(&mut self, catalog: AccountCatalog) {
        self.catalog = catalog;
        self.revalidate();
        self.connectors.invalidate(RecomputeReason::MappingsChanged);
    }

    // ========================================================================
    // EDITING
    // ========================================================================

    /// Apply a batch and record it; a rejected batch leaves everything as is
    pub fn commit(&mut self, batch: ChangeBatch) -> Result<&ValidationResult, SessionError> {
        let (next, batch) = self.store.apply_recorded(batch)?;
        tracing::debug!(label = %batch.label, changes = batch.len(), "committed batch");
        self.history.record_changes(batch);
        self.install(next);
        Ok(&self.validation)
    }

    pub fn create_mapping(&mut self, draft: MappingDraft) -> Result<Mapping, SessionError> {
        self.ensure_account(Universe::Source, &draft.source_account_number)?;
        self.ensure_account(Universe::Target, &draft.target_account_number)?;

        let now = Utc::now();
        let mapping_id = generate_mapping_id(&draft.source_account_number, None, now);
        let mapping = self.with_author(draft).into_mapping(mapping_id, now);

        self.commit(ChangeBatch::single("create mapping", Change::create(mapping.clone())))?;
        Ok(mapping)
    }

    /// Patch a mapping; `updatedAt` is refreshed unless the patch sets it
    pub fn update_mapping(&mut self, mapping_id: &str, patch: MappingPatch) -> Result<Mapping, SessionError> {
        let current = self.require(mapping_id)?.clone();
        let patch = match patch.updated_at {
            Some(_) => patch,
            None => patch.touched_at(Utc::now()),
        };

        let updated = patch.apply(&current);
        self.commit(ChangeBatch::single("update mapping", Change::update(&current, patch)))?;
        Ok(updated)
    }

    pub fn remove_mapping(&mut self, mapping_id: &str) -> Result<Mapping, SessionError> {
        let current = self.require(mapping_id)?.clone();
        self.commit(ChangeBatch::single("delete mapping", Change::delete(current.clone())))?;
        Ok(current)
    }

    /// Drag a source account onto a target account
    ///
    /// Two free accounts get a ONE_TO_ONE edge. If the source already has
    /// edges the whole fan becomes one ONE_TO_MANY group with equal weights;
    /// otherwise, if the target already has edges, the fan-in becomes a
    /// MANY_TO_ONE group. Groups that lose an edge to the new fan are
    /// re-weighted, and a group left with one edge falls back to ONE_TO_ONE.
    /// The new edge and all regrouping are one batch.
    pub fn connect(&mut self, source: &str, target: &str) -> Result<Mapping, SessionError> {
        self.ensure_account(Universe::Source, source)?;
        self.ensure_account(Universe::Target, target)?;
        if let Some(existing) = self.store.find_edge(source, target) {
            return Err(StoreError::DuplicateEdge {
                source_account: source.to_string(),
                target_account: target.to_string(),
                existing_id: existing.mapping_id.clone(),
            }
            .into());
        }

        let source_edges: Vec<Mapping> = self
            .store
            .mappings_for_account(Universe::Source, source)
            .into_iter()
            .cloned()
            .collect();
        let target_edges: Vec<Mapping> = self
            .store
            .mappings_for_account(Universe::Target, target)
            .into_iter()
            .cloned()
            .collect();

        let (mapping_type, fan) = if !source_edges.is_empty() {
            (MappingType::OneToMany, source_edges)
        } else if !target_edges.is_empty() {
            (MappingType::ManyToOne, target_edges)
        } else {
            (MappingType::OneToOne, Vec::new())
        };

        let now = Utc::now();
        let mut draft = MappingDraft::new(source, target);
        let mut changes = Vec::new();

        if !fan.is_empty() {
            let group_id = fan
                .iter()
                .find(|m| m.mapping_type == mapping_type)
                .and_then(|m| m.group_id.clone())
                .unwrap_or_else(generate_group_id);
            let weight = 1.0 / (fan.len() + 1) as f64;

            for edge in &fan {
                let patch = MappingPatch::new()
                    .with_mapping_type(mapping_type)
                    .with_split_weight(weight)
                    .with_group_id(Some(group_id.clone()))
                    .touched_at(now);
                changes.push(Change::update(edge, patch));
            }

            let moved: HashSet<&str> = fan.iter().map(|m| m.mapping_id.as_str()).collect();
            let abandoned: BTreeSet<&str> = fan
                .iter()
                .filter_map(|m| m.group_id.as_deref())
                .filter(|g| *g != group_id)
                .collect();
            for old_group in abandoned {
                let remaining: Vec<&Mapping> = self
                    .store
                    .iter()
                    .filter(|m| m.group_id.as_deref() == Some(old_group) && !moved.contains(m.mapping_id.as_str()))
                    .collect();
                changes.extend(rebalance_group(&remaining, now));
            }

            draft.mapping_type = mapping_type;
            draft.split_weight = weight;
            draft.group_id = Some(group_id);
        }

        let mapping_id = generate_mapping_id(source, None, now);
        let mapping = self.with_author(draft).into_mapping(mapping_id, now);
        changes.push(Change::create(mapping.clone()));

        self.commit(ChangeBatch::new("connect accounts", changes))?;
        Ok(mapping)
    }

    /// Create many mappings; failures are reported per input index
    ///
    /// All successful entries are committed as ONE batch, so a single undo
    /// removes the whole import.
    pub fn bulk_create(&mut self, drafts: Vec<MappingDraft>) -> BulkCreateResult {
        let now = Utc::now();
        let mut working = self.store.clone();
        let mut errors = Vec::new();
        let mut created = Vec::new();
        let mut attempted = Vec::new();

        for (index, draft) in drafts.into_iter().enumerate() {
            if !self.catalog.contains(Universe::Source, &draft.source_account_number) {
                errors.push(BulkCreateError {
                    index,
                    error: format!("Source account {} not found", draft.source_account_number),
                });
                continue;
            }
            if !self.catalog.contains(Universe::Target, &draft.target_account_number) {
                errors.push(BulkCreateError {
                    index,
                    error: format!("Target account {} not found", draft.target_account_number),
                });
                continue;
            }

            let mapping_id = generate_mapping_id(&draft.source_account_number, Some(index), now);
            let mapping = self.with_author(draft).into_mapping(mapping_id, now);
            match working.add_mapping(mapping.clone()) {
                Ok(next) => {
                    working = next;
                    created.push(mapping);
                    attempted.push(index);
                }
                Err(err) => errors.push(BulkCreateError {
                    index,
                    error: err.to_string(),
                }),
            }
        }

        if !created.is_empty() {
            let changes = created
                .iter()
                .map(|m| Change::create(m.clone()))
                .collect();
            if let Err(err) = self.commit(ChangeBatch::new("bulk create", changes)) {
                tracing::warn!("bulk create rejected on commit: {err}");
                return BulkCreateResult {
                    created: 0,
                    errors: reject_entries(errors, &attempted, &err.to_string()),
                    mappings: Vec::new(),
                };
            }
        }

        BulkCreateResult {
            created: created.len(),
            errors,
            mappings: created,
        }
    }

    /// Delete many mappings as one batch; unknown ids are skipped
    pub fn bulk_delete(&mut self, mapping_ids: &[&str]) -> BulkDeleteResult {
        let mut seen = HashSet::new();
        let changes: Vec<Change> = mapping_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.store.get(id))
            .map(|m| Change::delete(m.clone()))
            .collect();
        let deleted = changes.len();

        if deleted > 0 {
            if let Err(err) = self.commit(ChangeBatch::new("bulk delete", changes)) {
                tracing::warn!("bulk delete rejected on commit: {err}");
                return BulkDeleteResult {
                    deleted: 0,
                    requested: mapping_ids.len(),
                };
            }
        }

        BulkDeleteResult {
            deleted,
            requested: mapping_ids.len(),
        }
    }

    // ========================================================================
    // UNDO / REDO
    // ========================================================================

    /// Revert the last batch; Ok(false) when there is nothing to undo
    pub fn undo(&mut self) -> Result<bool, SessionError> {
        let Some(inverse) = self.history.undo() else {
            return Ok(false);
        };

        match self.store.restore_batch(&inverse.changes) {
            Ok(next) => {
                tracing::debug!(label = %inverse.label, changes = inverse.len(), "undo");
                self.install(next);
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("undo of '{}' failed, history cursor restored: {err}", inverse.label);
                let _ = self.history.redo();
                Err(err.into())
            }
        }
    }

    /// Re-apply the next batch; Ok(false) when there is nothing to redo
    pub fn redo(&mut self) -> Result<bool, SessionError> {
        let Some(batch) = self.history.redo() else {
            return Ok(false);
        };

        match self.store.restore_batch(&batch.changes) {
            Ok(next) => {
                tracing::debug!(label = %batch.label, changes = batch.len(), "redo");
                self.install(next);
                Ok(true)
            }
            Err(err) => {
                tracing::warn!("redo of '{}' failed, history cursor restored: {err}", batch.label);
                let _ = self.history.undo();
                Err(err.into())
            }
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    // ========================================================================
    // SELECTION & CONNECTORS
    // ========================================================================

    /// Select a mapping by id, or clear with `None`; unknown ids clear
    pub fn select(&mut self, mapping_id: Option<&str>) -> bool {
        let next = mapping_id
            .filter(|id| self.store.get(id).is_some())
            .map(str::to_string);
        let found = next.is_some() || mapping_id.is_none();

        if next != self.selected {
            self.selected = next;
            self.connectors.invalidate(RecomputeReason::SelectionChanged);
        }
        found
    }

    pub fn notify_scroll(&mut self, universe: Universe) {
        self.connectors.invalidate(RecomputeReason::ColumnScrolled(universe));
    }

    pub fn notify_column_resize(&mut self, universe: Universe) {
        self.connectors.invalidate(RecomputeReason::ColumnResized(universe));
    }

    pub fn notify_window_resize(&mut self) {
        self.connectors.invalidate(RecomputeReason::WindowResized);
    }

    /// Frame tick from the host; true when connectors were recomputed
    pub fn on_frame<L>(&mut self, layout: &L) -> bool
    where
        L: LayoutProvider + ?Sized,
    {
        self.connectors
            .on_frame(self.store.iter(), self.selected.as_deref(), layout)
    }

    pub fn connections(&self) -> &[ConnectionLine] {
        self.connectors.lines()
    }

    /// SVG path for a drawn connector
    pub fn connection_path(&self, line: &ConnectionLine) -> String {
        line.path(&self.curve)
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn install(&mut self, next: MappingStore) {
        self.store = next;
        self.revalidate();

        if let Some(id) = &self.selected {
            if self.store.get(id).is_none() {
                self.selected = None;
                self.connectors.invalidate(RecomputeReason::SelectionChanged);
            }
        }
        self.connectors.invalidate(RecomputeReason::MappingsChanged);
    }

    fn revalidate(&mut self) {
        self.validation = self.validator.validate(&self.catalog, self.store.iter());
    }

    fn ensure_account(&self, universe: Universe, account_number: &str) -> Result<(), SessionError> {
        if self.catalog.contains(universe, account_number) {
            Ok(())
        } else {
            Err(SessionError::UnknownAccount {
                universe,
                account_number: account_number.to_string(),
            })
        }
    }

    fn require(&self, mapping_id: &str) -> Result<&Mapping, SessionError> {
        self.store.get(mapping_id).ok_or_else(|| {
            StoreError::NotFound {
                mapping_id: mapping_id.to_string(),
            }
            .into()
        })
    }

    fn with_author(&self, mut draft: MappingDraft) -> MappingDraft {
        if draft.created_by.is_none() {
            draft.created_by = self.actor.clone();
        }
        draft
    }
}

// ============================================================================
// REGROUPING HELPERS
// ============================================================================

/// Updates that keep a group valid after some of its edges left
///
/// A single survivor becomes a plain ONE_TO_ONE edge; two or more keep their
/// relative weights, scaled back to a sum of 1.
fn rebalance_group(remaining: &[&Mapping], now: DateTime<Utc>) -> Vec<Change> {
    match remaining {
        [] => Vec::new(),
        [only] => {
            let patch = MappingPatch::new()
                .with_mapping_type(MappingType::OneToOne)
                .with_split_weight(1.0)
                .with_group_id(None)
                .touched_at(now);
            vec![Change::update(only, patch)]
        }
        members => {
            let total: f64 = members.iter().map(|m| m.split_weight).sum();
            let equal = 1.0 / members.len() as f64;
            members
                .iter()
                .map(|m| {
                    let weight = if total > 0.0 { m.split_weight / total } else { equal };
                    Change::update(m, MappingPatch::new().with_split_weight(weight).touched_at(now))
                })
                .collect()
        }
    }
}

/// Fold a batch-level rejection into the per-entry errors, in input order
fn reject_entries(mut errors: Vec<BulkCreateError>, attempted: &[usize], reason: &str) -> Vec<BulkCreateError> {
    errors.extend(attempted.iter().map(|&index| BulkCreateError {
        index,
        error: reason.to_string(),
    }));
    errors.sort_by_key(|e| e.index);
    errors
}

// ============================================================================
// TESTS
// ============================================================================
