// GL Account Mapping Engine - Core Library
// Exposes all modules for use in the CLI, a host UI, and tests

pub mod accounts;   // Source/target account universes
pub mod mapping;    // Mapping edges, patches, drafts, filters
pub mod store;      // Immutable mapping snapshots
pub mod history;    // Undo/redo of change batches
pub mod validator;  // Cardinality and reference checks
pub mod geometry;   // Connector lines between account columns
pub mod scheduler;  // Once-per-frame connector recompute
pub mod session;    // Store + history + validation + selection
pub mod config;
pub mod import;

// Re-export commonly used types
pub use accounts::{AccountCatalog, LedgerSection, SourceAccount, TargetAccount, Universe};
pub use mapping::{
    generate_group_id, generate_mapping_id, Mapping, MappingDraft, MappingFilter, MappingPatch, MappingStatus,
    MappingType,
};
pub use store::{AccountMappingSummary, MappingStore, StoreError};
pub use history::{Change, ChangeBatch, CommandHistory, HistoryState, MAX_HISTORY};
pub use validator::{
    CardinalityValidator, IssueType, ItemStatus, ValidationIssue, ValidationResult, DEFAULT_WEIGHT_EPSILON,
};
pub use geometry::{
    compute_connections, generate_line_path, resolve_style, ConnectionLine, CurveSettings, LayoutProvider,
    LineStyle, Point, Rect, RowLayout,
};
pub use scheduler::{ConnectorLayer, FrameScheduler, RecomputeReason};
pub use session::{BulkCreateError, BulkCreateResult, BulkDeleteResult, MappingSession, SessionError};
pub use config::{ConnectorPalette, EngineConfig};
pub use import::{
    load_catalog, load_drafts_json, load_layout_json, load_mappings_json, load_source_accounts,
    load_target_accounts,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
