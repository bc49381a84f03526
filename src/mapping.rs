// 🔗 GL Account Mapping - One edge between a source and a target account
//
// A mapping is a VALUE: it is never edited in place. Every change produces a
// new record (via MappingPatch) so that history entries can keep the prior
// record around and restore it exactly on undo.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// MAPPING TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingType {
    /// One source account to one target account (implicit weight 1.0)
    OneToOne,

    /// One source account fanning out into several targets
    OneToMany,

    /// Several source accounts folding into one target
    ManyToOne,
}

impl MappingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingType::OneToOne => "ONE_TO_ONE",
            MappingType::OneToMany => "ONE_TO_MANY",
            MappingType::ManyToOne => "MANY_TO_ONE",
        }
    }

    /// Whether edges of this type are expected to live in a weighted group
    pub fn is_split(&self) -> bool {
        !matches!(self, MappingType::OneToOne)
    }
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MAPPING STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Draft => "DRAFT",
            MappingStatus::Active => "ACTIVE",
            MappingStatus::Archived => "ARCHIVED",
        }
    }
}

// ============================================================================
// MAPPING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    /// Stable identity - survives undo/redo unchanged
    pub mapping_id: String,

    // ========================================================================
    // EDGE
    // ========================================================================
    pub source_account_number: String,

    pub target_account_number: String,

    pub mapping_type: MappingType,

    /// Share of the account's value carried by this edge, in (0, 1]
    #[serde(default = "default_split_weight")]
    pub split_weight: f64,

    /// Edges sharing a group id form one fan-out / fan-in
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default)]
    pub status: MappingStatus,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<NaiveDate>,

    // ========================================================================
    // AUDIT
    // ========================================================================
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_split_weight() -> f64 {
    1.0
}

impl Mapping {
    /// Plain ONE_TO_ONE draft edge with weight 1.0
    pub fn one_to_one(mapping_id: &str, source: &str, target: &str) -> Self {
        let now = Utc::now();
        Mapping {
            mapping_id: mapping_id.to_string(),
            source_account_number: source.to_string(),
            target_account_number: target.to_string(),
            mapping_type: MappingType::OneToOne,
            split_weight: 1.0,
            group_id: None,
            status: MappingStatus::Draft,
            effective_date: None,
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Edge that belongs to a weighted group
    pub fn grouped(
        mapping_id: &str,
        source: &str,
        target: &str,
        mapping_type: MappingType,
        split_weight: f64,
        group_id: &str,
    ) -> Self {
        Mapping {
            mapping_type,
            split_weight,
            group_id: Some(group_id.to_string()),
            ..Mapping::one_to_one(mapping_id, source, target)
        }
    }

    /// The (source, target) pair that must be unique across the set
    pub fn edge_key(&self) -> (&str, &str) {
        (&self.source_account_number, &self.target_account_number)
    }
}

// ============================================================================
// MAPPING PATCH
// ============================================================================

/// Partial update of the mutable fields of a mapping
///
/// The edge endpoints are not patchable: re-pointing an edge is a delete plus
/// a create. `None` means "leave unchanged"; for the optional fields
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping_type: Option<MappingType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_weight: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MappingStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_date: Option<Option<NaiveDate>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MappingPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping_type(mut self, mapping_type: MappingType) -> Self {
        self.mapping_type = Some(mapping_type);
        self
    }

    pub fn with_split_weight(mut self, split_weight: f64) -> Self {
        self.split_weight = Some(split_weight);
        self
    }

    pub fn with_group_id(mut self, group_id: Option<String>) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_status(mut self, status: MappingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_effective_date(mut self, effective_date: Option<NaiveDate>) -> Self {
        self.effective_date = Some(effective_date);
        self
    }

    pub fn touched_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mapping_type.is_none()
            && self.split_weight.is_none()
            && self.group_id.is_none()
            && self.status.is_none()
            && self.effective_date.is_none()
            && self.updated_at.is_none()
    }

    /// Produce the patched record; the input is left untouched
    pub fn apply(&self, mapping: &Mapping) -> Mapping {
        let mut next = mapping.clone();
        if let Some(mapping_type) = self.mapping_type {
            next.mapping_type = mapping_type;
        }
        if let Some(split_weight) = self.split_weight {
            next.split_weight = split_weight;
        }
        if let Some(group_id) = &self.group_id {
            next.group_id = group_id.clone();
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(effective_date) = self.effective_date {
            next.effective_date = effective_date;
        }
        if let Some(updated_at) = self.updated_at {
            next.updated_at = updated_at;
        }
        next
    }

    /// Snapshot the current values of exactly the fields this patch touches
    ///
    /// Applying the captured patch to `self.apply(mapping)` yields `mapping`.
    pub fn capture(&self, mapping: &Mapping) -> MappingPatch {
        MappingPatch {
            mapping_type: self.mapping_type.map(|_| mapping.mapping_type),
            split_weight: self.split_weight.map(|_| mapping.split_weight),
            group_id: self.group_id.as_ref().map(|_| mapping.group_id.clone()),
            status: self.status.map(|_| mapping.status),
            effective_date: self.effective_date.map(|_| mapping.effective_date),
            updated_at: self.updated_at.map(|_| mapping.updated_at),
        }
    }
}

// ============================================================================
// MAPPING DRAFT (create request)
// ============================================================================

/// Request to create one mapping; the session assigns id and audit fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDraft {
    pub source_account_number: String,

    pub target_account_number: String,

    #[serde(default = "default_mapping_type")]
    pub mapping_type: MappingType,

    #[serde(default = "default_split_weight")]
    pub split_weight: f64,

    #[serde(default)]
    pub group_id: Option<String>,

    #[serde(default)]
    pub effective_date: Option<NaiveDate>,

    #[serde(default)]
    pub created_by: Option<String>,
}

fn default_mapping_type() -> MappingType {
    MappingType::OneToOne
}

impl MappingDraft {
    pub fn new(source: &str, target: &str) -> Self {
        MappingDraft {
            source_account_number: source.to_string(),
            target_account_number: target.to_string(),
            mapping_type: MappingType::OneToOne,
            split_weight: 1.0,
            group_id: None,
            effective_date: None,
            created_by: None,
        }
    }

    pub fn into_mapping(self, mapping_id: String, now: DateTime<Utc>) -> Mapping {
        Mapping {
            mapping_id,
            source_account_number: self.source_account_number,
            target_account_number: self.target_account_number,
            mapping_type: self.mapping_type,
            split_weight: self.split_weight,
            group_id: self.group_id,
            status: MappingStatus::Draft,
            effective_date: self.effective_date,
            created_by: self.created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Mint a mapping id: `MAP-<timestamp>-<source prefix>[-<index>]-<nonce>`
///
/// The timestamp and source prefix keep ids readable in audit logs; the nonce
/// keeps ids minted within the same second unique.
pub fn generate_mapping_id(source_account_number: &str, index: Option<usize>, now: DateTime<Utc>) -> String {
    let prefix: String = source_account_number.chars().take(6).collect();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let nonce = &nonce[..8];
    match index {
        Some(i) => format!("MAP-{}-{}-{}-{}", now.format("%Y%m%d%H%M%S"), prefix, i, nonce),
        None => format!("MAP-{}-{}-{}", now.format("%Y%m%d%H%M%S"), prefix, nonce),
    }
}

/// Mint a group id for a new fan-out / fan-in
pub fn generate_group_id() -> String {
    format!("GRP-{}", uuid::Uuid::new_v4())
}

// ============================================================================
// MAPPING FILTER
// ============================================================================

/// Conjunctive filter over mappings; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingFilter {
    pub status: Option<MappingStatus>,
    pub source_account_number: Option<String>,
    pub target_account_number: Option<String>,
    pub mapping_type: Option<MappingType>,
    pub group_id: Option<String>,
}

impl MappingFilter {
    pub fn with_status(mut self, status: MappingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, account_number: &str) -> Self {
        self.source_account_number = Some(account_number.to_string());
        self
    }

    pub fn with_target(mut self, account_number: &str) -> Self {
        self.target_account_number = Some(account_number.to_string());
        self
    }

    pub fn with_mapping_type(mut self, mapping_type: MappingType) -> Self {
        self.mapping_type = Some(mapping_type);
        self
    }

    pub fn with_group(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }

    pub fn matches(&self, mapping: &Mapping) -> bool {
        self.status.map_or(true, |s| mapping.status == s)
            && self
                .source_account_number
                .as_ref()
                .map_or(true, |s| &mapping.source_account_number == s)
            && self
                .target_account_number
                .as_ref()
                .map_or(true, |t| &mapping.target_account_number == t)
            && self.mapping_type.map_or(true, |t| mapping.mapping_type == t)
            && self
                .group_id
                .as_ref()
                .map_or(true, |g| mapping.group_id.as_ref() == Some(g))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_capture_restores_prior_values() {
        let original = Mapping::one_to_one("MAP-1", "1050", "EAGLE-1050");
        let patch = MappingPatch::new()
            .with_mapping_type(MappingType::OneToMany)
            .with_split_weight(0.6)
            .with_group_id(Some("GRP-A".to_string()));

        let prior = patch.capture(&original);
        let patched = patch.apply(&original);

        assert_eq!(patched.mapping_type, MappingType::OneToMany);
        assert_eq!(patched.split_weight, 0.6);
        assert_eq!(patched.group_id.as_deref(), Some("GRP-A"));

        // Untouched fields stay out of the captured patch
        assert!(prior.status.is_none());
        assert_eq!(prior.group_id, Some(None));

        assert_eq!(prior.apply(&patched), original);
    }

    #[test]
    fn test_patch_clears_optional_field() {
        let grouped = Mapping::grouped("MAP-1", "1050", "EAGLE-1050", MappingType::OneToMany, 0.5, "GRP-A");
        let cleared = MappingPatch::new().with_group_id(None).apply(&grouped);

        assert!(cleared.group_id.is_none());
        assert!(MappingPatch::new().is_empty());
    }

    #[test]
    fn test_mapping_wire_format() {
        let json = r#"{
            "mappingId": "MAP-1",
            "sourceAccountNumber": "1050",
            "targetAccountNumber": "EAGLE-1050",
            "mappingType": "ONE_TO_MANY",
            "splitWeight": 0.25,
            "groupId": "GRP-1",
            "status": "ACTIVE",
            "effectiveDate": "2025-01-31"
        }"#;

        let mapping: Mapping = serde_json::from_str(json).unwrap();
        assert_eq!(mapping.mapping_type, MappingType::OneToMany);
        assert_eq!(mapping.status, MappingStatus::Active);
        assert_eq!(mapping.effective_date, NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(mapping.edge_key(), ("1050", "EAGLE-1050"));
    }

    #[test]
    fn test_mapping_defaults_when_fields_missing() {
        let json = r#"{"mappingId":"M","sourceAccountNumber":"1","targetAccountNumber":"2","mappingType":"ONE_TO_ONE"}"#;
        let mapping: Mapping = serde_json::from_str(json).unwrap();

        assert_eq!(mapping.split_weight, 1.0);
        assert_eq!(mapping.status, MappingStatus::Draft);
        assert!(mapping.group_id.is_none());
    }

    #[test]
    fn test_generate_mapping_id_shape() {
        let now = Utc::now();
        let single = generate_mapping_id("1050-CASH-LONG", None, now);
        let bulk = generate_mapping_id("1050", Some(3), now);

        assert!(single.starts_with("MAP-"));
        assert!(single.contains("-1050-C-"));
        assert!(bulk.contains("-1050-3-"));
        assert_ne!(generate_mapping_id("1050", None, now), generate_mapping_id("1050", None, now));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let mut active = Mapping::one_to_one("MAP-1", "1050", "EAGLE-1050");
        active.status = MappingStatus::Active;
        let draft = Mapping::one_to_one("MAP-2", "1050", "EAGLE-2000");

        let filter = MappingFilter::default().with_source("1050").with_status(MappingStatus::Active);
        assert!(filter.matches(&active));
        assert!(!filter.matches(&draft));
        assert!(MappingFilter::default().matches(&draft));
    }
}
