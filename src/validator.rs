// ✅ Cardinality Validator - Structural integrity of the mapping set
//
// Pure function over (accounts, mappings). Violations are DATA, never
// errors: the editor must be able to show an invalid intermediate state
// instead of refusing the edit that produced it.
//
// Checks run in a fixed order so results are deterministic:
//   1. Dangling reference      (error, per mapping)
//   2. Duplicate edge          (error, per duplicated pair)
//   3. Weight-sum mismatch     (error, per group)
//   4. Mixed cardinality       (error, per group)
//   5. Split-weight range      (error, per mapping)
//   6. Grouped one-to-one      (error, per mapping)
//   7. Unmapped account        (warning, per account; also listed separately)
//   8. Ledger-section mismatch (warning, per mapping)

use crate::accounts::{AccountCatalog, Universe};
use crate::mapping::{Mapping, MappingType};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tolerance when comparing a group's weight sum against 1.0
pub const DEFAULT_WEIGHT_EPSILON: f64 = 1e-6;

// ============================================================================
// ISSUES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    DanglingReference,
    DuplicateEdge,
    WeightSumMismatch,
    MixedCardinality,
    InvalidSplitWeight,
    GroupedOneToOne,
    UnmappedAccount,
    LedgerSectionMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_account_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_account_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mapping_ids: Vec<String>,

    pub message: String,
}

impl ValidationIssue {
    fn new(issue_type: IssueType, message: String) -> Self {
        ValidationIssue {
            issue_type,
            source_account_number: None,
            target_account_number: None,
            group_id: None,
            mapping_ids: Vec::new(),
            message,
        }
    }

    fn for_mapping(issue_type: IssueType, mapping: &Mapping, message: String) -> Self {
        ValidationIssue {
            source_account_number: Some(mapping.source_account_number.clone()),
            target_account_number: Some(mapping.target_account_number.clone()),
            mapping_ids: vec![mapping.mapping_id.clone()],
            ..Self::new(issue_type, message)
        }
    }

    pub fn references(&self, mapping_id: &str) -> bool {
        self.mapping_ids.iter().any(|id| id == mapping_id)
    }
}

/// Per-edge / per-account annotation for the rendering layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Valid,
    Warning,
    Error,
}

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub mapping_count: usize,

    /// Source accounts with zero mappings
    pub unmapped_incumbent: Vec<String>,

    /// Target accounts with zero mappings
    pub unmapped_eagle: Vec<String>,
}

impl ValidationResult {
    pub fn errors_of(&self, issue_type: IssueType) -> Vec<&ValidationIssue> {
        self.errors.iter().filter(|e| e.issue_type == issue_type).collect()
    }

    pub fn warnings_of(&self, issue_type: IssueType) -> Vec<&ValidationIssue> {
        self.warnings.iter().filter(|w| w.issue_type == issue_type).collect()
    }

    pub fn mapping_status(&self, mapping_id: &str) -> ItemStatus {
        if self.errors.iter().any(|e| e.references(mapping_id)) {
            ItemStatus::Error
        } else if self.warnings.iter().any(|w| w.references(mapping_id)) {
            ItemStatus::Warning
        } else {
            ItemStatus::Valid
        }
    }

    pub fn account_status(&self, universe: Universe, account_number: &str) -> ItemStatus {
        let mentions = |issue: &&ValidationIssue| match universe {
            Universe::Source => issue.source_account_number.as_deref() == Some(account_number),
            Universe::Target => issue.target_account_number.as_deref() == Some(account_number),
        };

        if self.errors.iter().any(|e| mentions(&e)) {
            ItemStatus::Error
        } else if self.warnings.iter().any(|w| mentions(&w)) {
            ItemStatus::Warning
        } else {
            ItemStatus::Valid
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} mappings: {} errors, {} warnings, {} unmapped source, {} unmapped target",
            self.mapping_count,
            self.errors.len(),
            self.warnings.len(),
            self.unmapped_incumbent.len(),
            self.unmapped_eagle.len()
        )
    }
}

// ============================================================================
// CARDINALITY VALIDATOR
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct CardinalityValidator {
    /// Tolerance for group weight sums (default: 1e-6)
    pub weight_epsilon: f64,
}

impl CardinalityValidator {
    pub fn new() -> Self {
        Self::with_epsilon(DEFAULT_WEIGHT_EPSILON)
    }

    pub fn with_epsilon(weight_epsilon: f64) -> Self {
        CardinalityValidator { weight_epsilon }
    }

    pub fn validate<'a>(
        &self,
        catalog: &AccountCatalog,
        mappings: impl IntoIterator<Item = &'a Mapping>,
    ) -> ValidationResult {
        let mappings: Vec<&Mapping> = mappings.into_iter().collect();
        let groups = group_by_id(&mappings);

        let mut errors = Vec::new();
        errors.extend(self.check_dangling(catalog, &mappings));
        errors.extend(self.check_duplicates(&mappings));
        errors.extend(self.check_weight_sums(&groups));
        errors.extend(self.check_mixed_cardinality(&groups));
        errors.extend(self.check_weight_range(&mappings));
        errors.extend(self.check_grouped_one_to_one(&mappings));

        let (unmapped_incumbent, unmapped_eagle) = unmapped_accounts(catalog, &mappings);
        let mut warnings = Vec::new();
        for number in &unmapped_incumbent {
            warnings.push(ValidationIssue {
                source_account_number: Some(number.clone()),
                ..ValidationIssue::new(
                    IssueType::UnmappedAccount,
                    format!("Source account {} is not mapped", number),
                )
            });
        }
        for number in &unmapped_eagle {
            warnings.push(ValidationIssue {
                target_account_number: Some(number.clone()),
                ..ValidationIssue::new(
                    IssueType::UnmappedAccount,
                    format!("Target account {} is not mapped", number),
                )
            });
        }
        warnings.extend(self.check_ledger_sections(catalog, &mappings));

        tracing::debug!(
            mappings = mappings.len(),
            errors = errors.len(),
            warnings = warnings.len(),
            "validated mapping set"
        );

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            mapping_count: mappings.len(),
            unmapped_incumbent,
            unmapped_eagle,
        }
    }

    /// 1. Source or target account no longer in reference data
    fn check_dangling(&self, catalog: &AccountCatalog, mappings: &[&Mapping]) -> Vec<ValidationIssue> {
        let mut errors = Vec::new();
        for m in mappings {
            let source_missing = !catalog.contains(Universe::Source, &m.source_account_number);
            let target_missing = !catalog.contains(Universe::Target, &m.target_account_number);

            let message = match (source_missing, target_missing) {
                (false, false) => continue,
                (true, false) => format!(
                    "Mapping {} references missing source account {}",
                    m.mapping_id, m.source_account_number
                ),
                (false, true) => format!(
                    "Mapping {} references missing target account {}",
                    m.mapping_id, m.target_account_number
                ),
                (true, true) => format!(
                    "Mapping {} references missing source account {} and target account {}",
                    m.mapping_id, m.source_account_number, m.target_account_number
                ),
            };
            errors.push(ValidationIssue::for_mapping(IssueType::DanglingReference, m, message));
        }
        errors
    }

    /// 2. Same (source, target) pair on more than one record
    fn check_duplicates(&self, mappings: &[&Mapping]) -> Vec<ValidationIssue> {
        // Pairs in first-occurrence order
        let mut order: Vec<(&str, &str)> = Vec::new();
        let mut ids: HashMap<(&str, &str), Vec<String>> = HashMap::new();
        for m in mappings {
            let key = m.edge_key();
            let entry = ids.entry(key).or_default();
            if entry.is_empty() {
                order.push(key);
            }
            entry.push(m.mapping_id.clone());
        }

        order
            .into_iter()
            .filter_map(|key| {
                let mapping_ids = ids.remove(&key)?;
                if mapping_ids.len() < 2 {
                    return None;
                }
                Some(ValidationIssue {
                    source_account_number: Some(key.0.to_string()),
                    target_account_number: Some(key.1.to_string()),
                    message: format!(
                        "{} mappings connect {} to {}",
                        mapping_ids.len(),
                        key.0,
                        key.1
                    ),
                    mapping_ids,
                    ..ValidationIssue::new(IssueType::DuplicateEdge, String::new())
                })
            })
            .collect()
    }

    /// 3. Group weights must sum to 1.0
    fn check_weight_sums(&self, groups: &BTreeMap<&str, Vec<&Mapping>>) -> Vec<ValidationIssue> {
        let mut errors = Vec::new();
        for (group_id, members) in groups {
            let total: f64 = members.iter().map(|m| m.split_weight).sum();
            if (total - 1.0).abs() <= self.weight_epsilon {
                continue;
            }
            errors.push(group_issue(
                IssueType::WeightSumMismatch,
                group_id,
                members,
                format!("Split weights in group {} sum to {:.4}, expected 1.0", group_id, total),
            ));
        }
        errors
    }

    /// 4. Every edge of a group must declare the same mapping type
    fn check_mixed_cardinality(&self, groups: &BTreeMap<&str, Vec<&Mapping>>) -> Vec<ValidationIssue> {
        let mut errors = Vec::new();
        for (group_id, members) in groups {
            let mut types: Vec<MappingType> = members.iter().map(|m| m.mapping_type).collect();
            types.sort();
            types.dedup();
            if types.len() <= 1 {
                continue;
            }
            let names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
            errors.push(group_issue(
                IssueType::MixedCardinality,
                group_id,
                members,
                format!("Group {} mixes mapping types: {}", group_id, names.join(", ")),
            ));
        }
        errors
    }

    /// 5. A split weight lives in (0, 1]
    fn check_weight_range(&self, mappings: &[&Mapping]) -> Vec<ValidationIssue> {
        mappings
            .iter()
            .filter(|m| !(m.split_weight > 0.0 && m.split_weight <= 1.0))
            .map(|m| {
                ValidationIssue::for_mapping(
                    IssueType::InvalidSplitWeight,
                    m,
                    format!(
                        "Mapping {} has split weight {}, expected a value in (0, 1]",
                        m.mapping_id, m.split_weight
                    ),
                )
            })
            .collect()
    }

    /// 6. ONE_TO_ONE edges carry an implicit weight of 1.0 and no group
    fn check_grouped_one_to_one(&self, mappings: &[&Mapping]) -> Vec<ValidationIssue> {
        mappings
            .iter()
            .filter(|m| m.mapping_type == MappingType::OneToOne && m.group_id.is_some())
            .map(|m| {
                let mut issue = ValidationIssue::for_mapping(
                    IssueType::GroupedOneToOne,
                    m,
                    format!("ONE_TO_ONE mapping {} must not belong to a group", m.mapping_id),
                );
                issue.group_id = m.group_id.clone();
                issue
            })
            .collect()
    }

    /// 8. Source and target sit in different sections of the ledger
    fn check_ledger_sections(&self, catalog: &AccountCatalog, mappings: &[&Mapping]) -> Vec<ValidationIssue> {
        let mut warnings = Vec::new();
        for m in mappings {
            let source = catalog.ledger_section(Universe::Source, &m.source_account_number);
            let target = catalog.ledger_section(Universe::Target, &m.target_account_number);
            if let (Some(source), Some(target)) = (source, target) {
                if source != target {
                    warnings.push(ValidationIssue::for_mapping(
                        IssueType::LedgerSectionMismatch,
                        m,
                        format!(
                            "Mapping {}: source ({}) and target ({}) ledger sections differ",
                            m.mapping_id, source, target
                        ),
                    ));
                }
            }
        }
        warnings
    }
}

impl Default for CardinalityValidator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Grouped edges keyed by group id, sorted for stable output
fn group_by_id<'a>(mappings: &[&'a Mapping]) -> BTreeMap<&'a str, Vec<&'a Mapping>> {
    let mut groups: BTreeMap<&str, Vec<&Mapping>> = BTreeMap::new();
    for m in mappings {
        if let Some(group_id) = m.group_id.as_deref() {
            groups.entry(group_id).or_default().push(*m);
        }
    }
    groups
}

fn group_issue(issue_type: IssueType, group_id: &str, members: &[&Mapping], message: String) -> ValidationIssue {
    // Groups are never empty: they are built by pushing members
    let first = members[0];
    let source_account_number = members
        .iter()
        .all(|m| m.source_account_number == first.source_account_number)
        .then(|| first.source_account_number.clone());
    let target_account_number = members
        .iter()
        .all(|m| m.target_account_number == first.target_account_number)
        .then(|| first.target_account_number.clone());

    ValidationIssue {
        issue_type,
        source_account_number,
        target_account_number,
        group_id: Some(group_id.to_string()),
        mapping_ids: members.iter().map(|m| m.mapping_id.clone()).collect(),
        message,
    }
}

/// Account numbers with zero edges, in catalog order
fn unmapped_accounts(catalog: &AccountCatalog, mappings: &[&Mapping]) -> (Vec<String>, Vec<String>) {
    let mapped_sources: HashSet<&str> = mappings.iter().map(|m| m.source_account_number.as_str()).collect();
    let mapped_targets: HashSet<&str> = mappings.iter().map(|m| m.target_account_number.as_str()).collect();

    let unmapped_source = catalog
        .account_numbers(Universe::Source)
        .into_iter()
        .filter(|n| !mapped_sources.contains(n))
        .map(str::to_string)
        .collect();
    let unmapped_target = catalog
        .account_numbers(Universe::Target)
        .into_iter()
        .filter(|n| !mapped_targets.contains(n))
        .map(str::to_string)
        .collect();

    (unmapped_source, unmapped_target)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{LedgerSection, SourceAccount, TargetAccount};

    fn catalog() -> AccountCatalog {
        AccountCatalog::new(
            vec![
                SourceAccount::new("1050", "CASH", LedgerSection::Assets, "STATE_STREET"),
                SourceAccount::new("4000", "Dividends", LedgerSection::Income, "STATE_STREET"),
            ],
            vec![
                TargetAccount::new("EAGLE-1050", "Cash Account", LedgerSection::Assets, "Cash"),
                TargetAccount::new("EAGLE-1060", "Cash Collateral", LedgerSection::Assets, "Cash"),
                TargetAccount::new("EAGLE-4000", "Dividend Income", LedgerSection::Income, "Income"),
            ],
        )
    }

    fn pair_catalog() -> AccountCatalog {
        AccountCatalog::new(
            vec![SourceAccount::new("1050", "CASH", LedgerSection::Assets, "STATE_STREET")],
            vec![TargetAccount::new("EAGLE-1050", "Cash Account", LedgerSection::Assets, "Cash")],
        )
    }

    #[test]
    fn test_single_one_to_one_pair_is_clean() {
        let mappings = vec![Mapping::one_to_one("MAP-1", "1050", "EAGLE-1050")];
        let result = CardinalityValidator::new().validate(&pair_catalog(), &mappings);

        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.mapping_count, 1);
    }

    #[test]
    fn test_removing_mapping_unmaps_both_accounts() {
        let result = CardinalityValidator::new().validate(&pair_catalog(), &Vec::<Mapping>::new());

        assert!(result.is_valid);
        assert_eq!(result.unmapped_incumbent, vec!["1050"]);
        assert_eq!(result.unmapped_eagle, vec!["EAGLE-1050"]);
        assert_eq!(result.warnings_of(IssueType::UnmappedAccount).len(), 2);
    }

    #[test]
    fn test_weight_sum_exact() {
        let mappings = vec![
            Mapping::grouped("MAP-1", "1050", "EAGLE-1050", MappingType::OneToMany, 0.6, "G1"),
            Mapping::grouped("MAP-2", "1050", "EAGLE-1060", MappingType::OneToMany, 0.4, "G1"),
        ];
        let result = CardinalityValidator::new().validate(&catalog(), &mappings);

        assert!(result.errors_of(IssueType::WeightSumMismatch).is_empty());
    }

    #[test]
    fn test_weight_sum_mismatch_references_group() {
        let mappings = vec![
            Mapping::grouped("MAP-1", "1050", "EAGLE-1050", MappingType::OneToMany, 0.6, "G1"),
            Mapping::grouped("MAP-2", "1050", "EAGLE-1060", MappingType::OneToMany, 0.3, "G1"),
        ];
        let result = CardinalityValidator::new().validate(&catalog(), &mappings);
        let mismatches = result.errors_of(IssueType::WeightSumMismatch);

        assert!(!result.is_valid);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].mapping_ids, vec!["MAP-1", "MAP-2"]);
        assert_eq!(mismatches[0].source_account_number.as_deref(), Some("1050"));
        assert!(mismatches[0].target_account_number.is_none());
        assert_eq!(result.mapping_status("MAP-2"), ItemStatus::Error);
    }

    #[test]
    fn test_duplicate_edge_reported_once_and_cleared() {
        let mut mappings = vec![
            Mapping::one_to_one("MAP-1", "1050", "EAGLE-1050"),
            Mapping::one_to_one("MAP-2", "1050", "EAGLE-1050"),
        ];
        let validator = CardinalityValidator::new();

        let result = validator.validate(&catalog(), &mappings);
        let duplicates = result.errors_of(IssueType::DuplicateEdge);
        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].mapping_ids, vec!["MAP-1", "MAP-2"]);

        mappings.pop();
        let result = validator.validate(&catalog(), &mappings);
        assert!(result.errors_of(IssueType::DuplicateEdge).is_empty());
    }

    #[test]
    fn test_dangling_reference_is_error_not_drop() {
        let mappings = vec![Mapping::one_to_one("MAP-1", "9999", "EAGLE-1050")];
        let result = CardinalityValidator::new().validate(&catalog(), &mappings);
        let dangling = result.errors_of(IssueType::DanglingReference);

        assert_eq!(result.mapping_count, 1);
        assert_eq!(dangling.len(), 1);
        assert!(dangling[0].message.contains("missing source account 9999"));
        assert_eq!(result.account_status(Universe::Target, "EAGLE-1050"), ItemStatus::Error);
    }

    #[test]
    fn test_mixed_cardinality() {
        let mappings = vec![
            Mapping::grouped("MAP-1", "1050", "EAGLE-1050", MappingType::OneToMany, 0.5, "G1"),
            Mapping::grouped("MAP-2", "1050", "EAGLE-1060", MappingType::ManyToOne, 0.5, "G1"),
        ];
        let result = CardinalityValidator::new().validate(&catalog(), &mappings);

        assert_eq!(result.errors_of(IssueType::MixedCardinality).len(), 1);
        assert!(result.errors_of(IssueType::WeightSumMismatch).is_empty());
    }

    #[test]
    fn test_error_order_is_fixed() {
        let mappings = vec![
            Mapping::grouped("MAP-1", "1050", "EAGLE-1050", MappingType::OneToMany, 0.5, "G1"),
            Mapping::grouped("MAP-2", "1050", "EAGLE-1060", MappingType::ManyToOne, 0.2, "G1"),
            Mapping::one_to_one("MAP-3", "4000", "EAGLE-4000"),
            Mapping::one_to_one("MAP-4", "4000", "EAGLE-4000"),
            Mapping::one_to_one("MAP-5", "GONE", "EAGLE-4000"),
        ];
        let result = CardinalityValidator::new().validate(&catalog(), &mappings);
        let kinds: Vec<IssueType> = result.errors.iter().map(|e| e.issue_type).collect();

        assert_eq!(
            kinds,
            vec![
                IssueType::DanglingReference,
                IssueType::DuplicateEdge,
                IssueType::WeightSumMismatch,
                IssueType::MixedCardinality,
            ]
        );
    }

    #[test]
    fn test_weight_range_and_grouped_one_to_one() {
        let mut zero = Mapping::one_to_one("MAP-1", "4000", "EAGLE-4000");
        zero.split_weight = 0.0;
        let mut grouped = Mapping::one_to_one("MAP-2", "1050", "EAGLE-1050");
        grouped.group_id = Some("G9".to_string());

        let result = CardinalityValidator::new().validate(&catalog(), &[zero, grouped]);

        assert_eq!(result.errors_of(IssueType::InvalidSplitWeight).len(), 1);
        let grouped_errors = result.errors_of(IssueType::GroupedOneToOne);
        assert_eq!(grouped_errors.len(), 1);
        assert_eq!(grouped_errors[0].group_id.as_deref(), Some("G9"));
    }

    #[test]
    fn test_ledger_section_mismatch_warning() {
        let mappings = vec![Mapping::one_to_one("MAP-1", "1050", "EAGLE-4000")];
        let result = CardinalityValidator::new().validate(&catalog(), &mappings);
        let mismatches = result.warnings_of(IssueType::LedgerSectionMismatch);

        assert!(result.is_valid);
        assert_eq!(mismatches.len(), 1);
        assert!(mismatches[0].message.contains("ASSETS"));
        assert_eq!(result.mapping_status("MAP-1"), ItemStatus::Warning);
    }

    #[test]
    fn test_custom_epsilon() {
        let mappings = vec![
            Mapping::grouped("MAP-1", "1050", "EAGLE-1050", MappingType::OneToMany, 0.6, "G1"),
            Mapping::grouped("MAP-2", "1050", "EAGLE-1060", MappingType::OneToMany, 0.3995, "G1"),
        ];

        let loose = CardinalityValidator::with_epsilon(0.001).validate(&catalog(), &mappings);
        let strict = CardinalityValidator::new().validate(&catalog(), &mappings);

        assert!(loose.errors_of(IssueType::WeightSumMismatch).is_empty());
        assert_eq!(strict.errors_of(IssueType::WeightSumMismatch).len(), 1);
    }

    #[test]
    fn test_result_wire_format() {
        let result = CardinalityValidator::new().validate(&pair_catalog(), &Vec::<Mapping>::new());
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["isValid"], true);
        assert_eq!(json["mappingCount"], 0);
        assert_eq!(json["unmappedIncumbent"][0], "1050");
        assert_eq!(json["warnings"][0]["type"], "UNMAPPED_ACCOUNT");
    }
}
