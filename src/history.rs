// ↩️ Command History - Batched undo/redo over mapping edits
//
// One ordered list of batches plus a cursor:
//
//   batches:  [b0, b1, b2, b3]
//   applied:            ^ 3   (b0..b2 applied, b3 is redoable)
//
// Undo hands back the INVERSE of the last applied batch; redo hands back the
// original batch. Nothing is ever replayed from scratch, so both cost
// O(batch size). Recording after an undo drops the redo branch.

use crate::mapping::{Mapping, MappingPatch};
use serde::Serialize;

/// Default cap on retained batches; older batches become un-undoable
pub const MAX_HISTORY: usize = 50;

// ============================================================================
// CHANGE
// ============================================================================

/// One atomic edge mutation, carrying enough data to be inverted
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Change {
    /// `position` is the store index the record landed at, once applied
    Create {
        mapping: Mapping,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },

    /// `before` holds the prior values of exactly the fields `after` sets
    #[serde(rename_all = "camelCase")]
    Update {
        mapping_id: String,
        before: MappingPatch,
        after: MappingPatch,
    },

    /// `position` is the store index the record was removed from
    Delete {
        mapping: Mapping,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
    },
}

impl Change {
    pub fn create(mapping: Mapping) -> Change {
        Change::Create { mapping, position: None }
    }

    pub fn delete(mapping: Mapping) -> Change {
        Change::Delete { mapping, position: None }
    }

    /// Build an UPDATE against the current record, capturing prior values now
    pub fn update(current: &Mapping, patch: MappingPatch) -> Change {
        Change::Update {
            mapping_id: current.mapping_id.clone(),
            before: patch.capture(current),
            after: patch,
        }
    }

    pub fn mapping_id(&self) -> &str {
        match self {
            Change::Create { mapping, .. } | Change::Delete { mapping, .. } => &mapping.mapping_id,
            Change::Update { mapping_id, .. } => mapping_id,
        }
    }

    /// CREATE <-> DELETE of the same record; UPDATE swaps before/after
    ///
    /// The original mapping id is kept, so undo followed by redo restores the
    /// very same record.
    pub fn inverse(&self) -> Change {
        match self {
            Change::Create { mapping, position } => Change::Delete {
                mapping: mapping.clone(),
                position: *position,
            },
            Change::Delete { mapping, position } => Change::Create {
                mapping: mapping.clone(),
                position: *position,
            },
            Change::Update {
                mapping_id,
                before,
                after,
            } => Change::Update {
                mapping_id: mapping_id.clone(),
                before: after.clone(),
                after: before.clone(),
            },
        }
    }
}

// ============================================================================
// CHANGE BATCH
// ============================================================================

/// The unit of undo: every change in a batch is reverted together
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeBatch {
    pub label: String,
    pub changes: Vec<Change>,
}

impl ChangeBatch {
    pub fn new(label: &str, changes: Vec<Change>) -> Self {
        ChangeBatch {
            label: label.to_string(),
            changes,
        }
    }

    pub fn single(label: &str, change: Change) -> Self {
        Self::new(label, vec![change])
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Every change inverted, last change first
    pub fn inverse(&self) -> ChangeBatch {
        ChangeBatch {
            label: self.label.clone(),
            changes: self.changes.iter().rev().map(Change::inverse).collect(),
        }
    }
}

// ============================================================================
// HISTORY STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
    pub history_size: usize,

    /// Index of the last applied batch, -1 before the first
    pub current_index: i64,
}

// ============================================================================
// COMMAND HISTORY
// ============================================================================

#[derive(Debug, Clone)]
pub struct CommandHistory {
    batches: Vec<ChangeBatch>,

    /// Number of batches currently applied (cursor + 1)
    applied: usize,

    max_history: usize,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::with_max_history(MAX_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        CommandHistory {
            batches: Vec::new(),
            applied: 0,
            max_history: max_history.max(1),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn record_change(&mut self, label: &str, change: Change) {
        self.record_changes(ChangeBatch::single(label, change));
    }

    /// Append a batch after the cursor, discarding the redo branch
    ///
    /// Empty batches are ignored.
    pub fn record_changes(&mut self, batch: ChangeBatch) {
        if batch.is_empty() {
            tracing::debug!("ignoring empty history batch '{}'", batch.label);
            return;
        }

        let discarded = self.batches.len() - self.applied;
        if discarded > 0 {
            tracing::debug!("recording '{}' discards {} redoable batch(es)", batch.label, discarded);
        }
        self.batches.truncate(self.applied);
        self.batches.push(batch);
        self.applied = self.batches.len();

        if self.batches.len() > self.max_history {
            let overflow = self.batches.len() - self.max_history;
            self.batches.drain(..overflow);
            self.applied -= overflow;
            tracing::warn!(
                "history cap of {} reached, dropped {} oldest batch(es)",
                self.max_history,
                overflow
            );
        }
    }

    /// Step back one batch and return its inverse for the caller to apply
    pub fn undo(&mut self) -> Option<ChangeBatch> {
        if self.applied == 0 {
            return None;
        }
        self.applied -= 1;
        Some(self.batches[self.applied].inverse())
    }

    /// Step forward one batch and return it unchanged for re-application
    pub fn redo(&mut self) -> Option<ChangeBatch> {
        if self.applied >= self.batches.len() {
            return None;
        }
        let batch = self.batches[self.applied].clone();
        self.applied += 1;
        Some(batch)
    }

    pub fn clear(&mut self) {
        self.batches.clear();
        self.applied = 0;
    }

    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    pub fn can_redo(&self) -> bool {
        self.applied < self.batches.len()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn get_state(&self) -> HistoryState {
        HistoryState {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            history_size: self.batches.len(),
            current_index: self.applied as i64 - 1,
        }
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingStatus, MappingType};
    use crate::store::MappingStore;
    use proptest::prelude::*;

    fn create(id: &str, source: &str, target: &str) -> Change {
        Change::create(Mapping::one_to_one(id, source, target))
    }

    #[test]
    fn test_undo_on_empty_history() {
        let mut history = CommandHistory::new();

        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert_eq!(
            history.get_state(),
            HistoryState {
                can_undo: false,
                can_redo: false,
                history_size: 0,
                current_index: -1,
            }
        );
    }

    #[test]
    fn test_undo_returns_inverse_in_reverse_order() {
        let mut history = CommandHistory::new();
        let first = create("MAP-1", "1050", "EAGLE-1050");
        let second = create("MAP-2", "1100", "EAGLE-1100");
        history.record_changes(ChangeBatch::new("import", vec![first.clone(), second.clone()]));

        let undo = history.undo().unwrap();
        assert_eq!(undo.changes, vec![second.inverse(), first.inverse()]);
        assert!(matches!(&undo.changes[0], Change::Delete { mapping, .. } if mapping.mapping_id == "MAP-2"));

        let redo = history.redo().unwrap();
        assert_eq!(redo.changes, vec![first, second]);
    }

    #[test]
    fn test_inverse_keeps_original_id() {
        let change = create("MAP-7", "1050", "EAGLE-1050");
        let back = change.inverse().inverse();

        assert_eq!(back, change);
        assert_eq!(change.inverse().mapping_id(), "MAP-7");
    }

    #[test]
    fn test_update_inverse_restores_prior_fields() {
        let current = Mapping::one_to_one("MAP-1", "1050", "EAGLE-1050");
        let change = Change::update(&current, MappingPatch::new().with_status(MappingStatus::Active));

        let store = MappingStore::from_mappings(vec![current.clone()]);
        let forward = store.apply_change(&change).unwrap();
        assert_eq!(forward.get("MAP-1").unwrap().status, MappingStatus::Active);

        let back = forward.apply_change(&change.inverse()).unwrap();
        assert_eq!(back.get("MAP-1"), Some(&current));
    }

    #[test]
    fn test_record_after_undo_discards_redo_branch() {
        let mut history = CommandHistory::new();
        history.record_change("a", create("MAP-1", "1", "A"));
        history.record_change("b", create("MAP-2", "2", "B"));

        history.undo().unwrap();
        assert!(history.get_state().can_redo);

        history.record_change("c", create("MAP-3", "3", "C"));
        assert!(history.redo().is_none());
        assert_eq!(history.len(), 2);
        assert_eq!(history.get_state().current_index, 1);
    }

    #[test]
    fn test_history_cap_drops_oldest() {
        let mut history = CommandHistory::new();
        for i in 0..(MAX_HISTORY + 10) {
            history.record_change("edit", create(&format!("MAP-{i}"), &i.to_string(), "T"));
        }

        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history.get_state().current_index, MAX_HISTORY as i64 - 1);

        let mut undone = 0;
        while history.undo().is_some() {
            undone += 1;
        }
        assert_eq!(undone, MAX_HISTORY);
    }

    #[test]
    fn test_cap_applies_after_undo_and_record() {
        let mut history = CommandHistory::with_max_history(3);
        for i in 0..3 {
            history.record_change("edit", create(&format!("MAP-{i}"), "S", &i.to_string()));
        }
        history.undo().unwrap();
        history.record_change("edit", create("MAP-X", "S", "X"));
        history.record_change("edit", create("MAP-Y", "S", "Y"));

        let state = history.get_state();
        assert_eq!(state.history_size, 3);
        assert_eq!(state.current_index, 2);
        assert!(!state.can_redo);
    }

    #[test]
    fn test_empty_batch_not_recorded() {
        let mut history = CommandHistory::new();
        history.record_changes(ChangeBatch::new("nothing", vec![]));

        assert!(history.is_empty());
    }

    #[test]
    fn test_clear_resets_cursor() {
        let mut history = CommandHistory::new();
        history.record_change("a", create("MAP-1", "1", "A"));
        history.clear();

        assert_eq!(history.get_state().current_index, -1);
        assert!(!history.can_undo());
    }

    // ------------------------------------------------------------------------
    // Property tests
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Action {
        Create(u8, u8),
        Reweight(usize, u8),
        Delete(usize),
    }

    fn action_strategy() -> impl Strategy<Value = Action> {
        prop_oneof![
            (0u8..6, 0u8..6).prop_map(|(s, t)| Action::Create(s, t)),
            (any::<usize>(), 1u8..=10).prop_map(|(i, w)| Action::Reweight(i, w)),
            any::<usize>().prop_map(Action::Delete),
        ]
    }

    /// Turn an action into a change that is valid against `store`
    fn to_change(store: &MappingStore, action: &Action, serial: usize) -> Option<Change> {
        let all = store.to_vec();
        match action {
            Action::Create(s, t) => {
                let (source, target) = (format!("S{s}"), format!("T{t}"));
                if store.find_edge(&source, &target).is_some() {
                    return None;
                }
                Some(create(&format!("MAP-{serial}"), &source, &target))
            }
            Action::Reweight(i, w) => all.get(i % all.len().max(1)).map(|m| {
                Change::update(
                    m,
                    MappingPatch::new()
                        .with_split_weight(*w as f64 / 10.0)
                        .with_mapping_type(MappingType::OneToMany),
                )
            }),
            Action::Delete(i) => all
                .get(i % all.len().max(1))
                .map(|m| Change::delete(m.clone())),
        }
    }

    /// Record every valid action as its own batch; returns the final store
    fn run(history: &mut CommandHistory, start: &MappingStore, actions: &[Action]) -> (MappingStore, usize) {
        let mut store = start.clone();
        let mut recorded = 0;
        for (serial, action) in actions.iter().enumerate() {
            if let Some(change) = to_change(&store, action, serial) {
                let (next, batch) = store.apply_recorded(ChangeBatch::single("edit", change)).unwrap();
                store = next;
                history.record_changes(batch);
                recorded += 1;
            }
        }
        (store, recorded)
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn undo_all_restores_start(actions in prop::collection::vec(action_strategy(), 0..30)) {
            let start = MappingStore::from_mappings(vec![Mapping::one_to_one("SEED", "S0", "T0")]);
            let mut history = CommandHistory::new();
            let (mut store, recorded) = run(&mut history, &start, &actions);

            for _ in 0..recorded {
                let inverse = history.undo().unwrap();
                store = store.restore_batch(&inverse.changes).unwrap();
            }

            prop_assert!(history.undo().is_none());
            prop_assert_eq!(store.to_vec(), start.to_vec());
        }

        #[test]
        fn undo_then_redo_restores(actions in prop::collection::vec(action_strategy(), 1..30), k in 0usize..30) {
            let mut history = CommandHistory::new();
            let (end, recorded) = run(&mut history, &MappingStore::new(), &actions);
            let k = k.min(recorded);

            let mut store = end.clone();
            for _ in 0..k {
                let inverse = history.undo().unwrap();
                store = store.restore_batch(&inverse.changes).unwrap();
            }
            for _ in 0..k {
                let batch = history.redo().unwrap();
                store = store.restore_batch(&batch.changes).unwrap();
            }

            prop_assert!(history.redo().is_none());
            prop_assert_eq!(store.to_vec(), end.to_vec());
        }

        #[test]
        fn history_never_exceeds_cap(cap in 1usize..8, edits in 0usize..40) {
            let mut history = CommandHistory::with_max_history(cap);
            for i in 0..edits {
                history.record_change("edit", create(&format!("MAP-{i}"), &format!("S{i}"), "T"));
                prop_assert!(history.len() <= cap);
            }
            prop_assert_eq!(history.len(), edits.min(cap));
        }
    }
}
