// ⏱️ Frame Scheduler - Coalesce recompute requests to one run per frame
//
// Scroll and resize signals arrive in storms. Each signal only REQUESTS a
// recompute; the host drives `run_frame` once per animation frame and the
// work runs at most once, seeing every reason collected since the last run.
// Recomputing is idempotent, so coalescing never changes the result.

use crate::accounts::Universe;
use crate::geometry::{compute_connections, ConnectionLine, LayoutProvider};
use crate::mapping::Mapping;
use serde::Serialize;

// ============================================================================
// RECOMPUTE REASON
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecomputeReason {
    MappingsChanged,
    SelectionChanged,
    ColumnScrolled(Universe),
    ColumnResized(Universe),
    WindowResized,
}

// ============================================================================
// FRAME SCHEDULER
// ============================================================================

#[derive(Debug, Default)]
pub struct FrameScheduler {
    /// Distinct reasons since the last run, in arrival order
    pending: Vec<RecomputeReason>,
    scheduled: bool,
    requests: u64,
    runs: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule-if-not-already-scheduled; true when this call scheduled
    pub fn request(&mut self, reason: RecomputeReason) -> bool {
        self.requests += 1;
        if !self.pending.contains(&reason) {
            self.pending.push(reason);
        }
        if self.scheduled {
            return false;
        }
        self.scheduled = true;
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Drop pending work; true if something was scheduled
    pub fn cancel(&mut self) -> bool {
        let was_scheduled = self.scheduled;
        self.pending.clear();
        self.scheduled = false;
        was_scheduled
    }

    /// Frame tick: run `work` once if anything is scheduled
    pub fn run_frame<T, F>(&mut self, work: F) -> Option<T>
    where
        F: FnOnce(&[RecomputeReason]) -> T,
    {
        if !self.scheduled {
            return None;
        }
        let reasons = std::mem::take(&mut self.pending);
        self.scheduled = false;
        self.runs += 1;
        Some(work(&reasons))
    }

    /// Total requests received
    pub fn request_count(&self) -> u64 {
        self.requests
    }

    /// Total frames that actually ran work
    pub fn run_count(&self) -> u64 {
        self.runs
    }
}

// ============================================================================
// CONNECTOR LAYER
// ============================================================================

/// Cached connectors plus the scheduler that decides when to refresh them
#[derive(Debug)]
pub struct ConnectorLayer {
    scheduler: FrameScheduler,
    lines: Vec<ConnectionLine>,
}

impl ConnectorLayer {
    /// Starts dirty so the first frame draws
    pub fn new() -> Self {
        let mut scheduler = FrameScheduler::new();
        scheduler.request(RecomputeReason::MappingsChanged);
        ConnectorLayer {
            scheduler,
            lines: Vec::new(),
        }
    }

    pub fn invalidate(&mut self, reason: RecomputeReason) -> bool {
        self.scheduler.request(reason)
    }

    pub fn is_dirty(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    pub fn cancel(&mut self) -> bool {
        self.scheduler.cancel()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Last computed connectors (possibly stale while dirty)
    pub fn lines(&self) -> &[ConnectionLine] {
        &self.lines
    }

    /// Frame tick; true when the connectors were recomputed
    pub fn on_frame<'a, L>(
        &mut self,
        mappings: impl IntoIterator<Item = &'a Mapping>,
        selected_mapping_id: Option<&str>,
        layout: &L,
    ) -> bool
    where
        L: LayoutProvider + ?Sized,
    {
        let recomputed = self.scheduler.run_frame(|reasons| {
            tracing::debug!(?reasons, "recomputing connectors");
            compute_connections(mappings, selected_mapping_id, layout)
        });

        match recomputed {
            Some(lines) => {
                self.lines = lines;
                true
            }
            None => false,
        }
    }
}

impl Default for ConnectorLayer {
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
    use crate::geometry::{Rect, RowLayout};

    fn layout() -> RowLayout {
        RowLayout {
            surface: Rect::new(0.0, 0.0, 600.0, 100.0),
            source_column: Rect::new(0.0, 0.0, 200.0, 100.0),
            target_column: Rect::new(400.0, 0.0, 200.0, 100.0),
            row_height: 20.0,
            source_rows: vec!["1050".to_string()],
            target_rows: vec!["EAGLE-1050".to_string()],
            source_scroll: 0.0,
            target_scroll: 0.0,
        }
    }

    #[test]
    fn test_storm_coalesces_to_one_run() {
        let mut scheduler = FrameScheduler::new();

        assert!(scheduler.request(RecomputeReason::ColumnScrolled(Universe::Source)));
        for _ in 0..99 {
            assert!(!scheduler.request(RecomputeReason::ColumnScrolled(Universe::Source)));
        }
        scheduler.request(RecomputeReason::WindowResized);

        let seen = scheduler.run_frame(|reasons| reasons.to_vec()).unwrap();
        assert_eq!(
            seen,
            vec![
                RecomputeReason::ColumnScrolled(Universe::Source),
                RecomputeReason::WindowResized,
            ]
        );
        assert_eq!(scheduler.request_count(), 101);
        assert_eq!(scheduler.run_count(), 1);

        // Nothing new: the next frame does no work
        assert!(scheduler.run_frame(|_| ()).is_none());
    }

    #[test]
    fn test_cancel_drops_pending_work() {
        let mut scheduler = FrameScheduler::new();
        scheduler.request(RecomputeReason::SelectionChanged);

        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        assert!(scheduler.run_frame(|_| ()).is_none());
    }

    #[test]
    fn test_layer_recomputes_only_when_dirty() {
        let mappings = vec![Mapping::one_to_one("MAP-1", "1050", "EAGLE-1050")];
        let layout = layout();
        let mut layer = ConnectorLayer::new();

        assert!(layer.on_frame(&mappings, None, &layout));
        assert_eq!(layer.lines().len(), 1);
        assert!(!layer.on_frame(&mappings, None, &layout));

        layer.invalidate(RecomputeReason::SelectionChanged);
        assert!(layer.on_frame(&mappings, Some("MAP-1"), &layout));
        assert!(layer.lines()[0].is_selected);
    }

    #[test]
    fn test_layer_follows_scroll() {
        let mappings = vec![Mapping::one_to_one("MAP-1", "1050", "EAGLE-1050")];
        let mut layout = layout();
        let mut layer = ConnectorLayer::new();
        layer.on_frame(&mappings, None, &layout);

        layout.scroll_to(Universe::Source, 50.0);
        layout.scroll_to(Universe::Target, 50.0);
        layer.invalidate(RecomputeReason::ColumnScrolled(Universe::Source));
        layer.invalidate(RecomputeReason::ColumnScrolled(Universe::Target));
        layer.on_frame(&mappings, None, &layout);

        assert!(layer.lines().is_empty());
        assert_eq!(layer.scheduler().run_count(), 2);
    }
}
