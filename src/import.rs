// 📥 Import - Reference data and mapping sets from disk
//
// Account universes arrive as CSV exports (one file per universe); mapping
// sets, bulk drafts and connector layouts as JSON. Every loader reports the
// file and row that failed.

use crate::accounts::{AccountCatalog, LedgerSection, SourceAccount, TargetAccount};
use crate::geometry::RowLayout;
use crate::mapping::{Mapping, MappingDraft};
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct SourceAccountRow {
    #[serde(alias = "accountNumber")]
    account_number: String,
    #[serde(default)]
    description: String,
    #[serde(alias = "ledgerSection")]
    ledger_section: String,
    #[serde(default)]
    provider: String,
}

#[derive(Debug, Deserialize)]
struct TargetAccountRow {
    #[serde(alias = "accountNumber")]
    account_number: String,
    #[serde(default)]
    description: String,
    #[serde(alias = "ledgerSection")]
    ledger_section: String,
    #[serde(default)]
    category: String,
}

fn parse_section(raw: &str, line: usize) -> Result<LedgerSection> {
    LedgerSection::parse(raw).ok_or_else(|| anyhow!("Unknown ledger section '{}' on row {}", raw, line))
}

/// Load the incumbent chart of accounts
///
/// Columns: account_number, description, ledger_section, provider
pub fn load_source_accounts(csv_path: &Path) -> Result<Vec<SourceAccount>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;

    let mut accounts = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let row: SourceAccountRow = result.context("Failed to deserialize source account")?;
        let ledger_section = parse_section(&row.ledger_section, i + 2)?;
        accounts.push(SourceAccount {
            account_number: row.account_number,
            description: row.description,
            ledger_section,
            provider: row.provider,
        });
    }

    tracing::debug!(count = accounts.len(), path = ?csv_path, "loaded source accounts");
    Ok(accounts)
}

/// Load the target chart of accounts
///
/// Columns: account_number, description, ledger_section, category
pub fn load_target_accounts(csv_path: &Path) -> Result<Vec<TargetAccount>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("Failed to open CSV file: {:?}", csv_path))?;

    let mut accounts = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let row: TargetAccountRow = result.context("Failed to deserialize target account")?;
        let ledger_section = parse_section(&row.ledger_section, i + 2)?;
        accounts.push(TargetAccount {
            account_number: row.account_number,
            description: row.description,
            ledger_section,
            category: row.category,
        });
    }

    tracing::debug!(count = accounts.len(), path = ?csv_path, "loaded target accounts");
    Ok(accounts)
}

pub fn load_catalog(source_csv: &Path, target_csv: &Path) -> Result<AccountCatalog> {
    Ok(AccountCatalog::new(
        load_source_accounts(source_csv)?,
        load_target_accounts(target_csv)?,
    ))
}

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {} file: {:?}", what, path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {} JSON: {:?}", what, path))
}

/// JSON array of mappings (camelCase fields)
pub fn load_mappings_json(path: &Path) -> Result<Vec<Mapping>> {
    load_json(path, "mappings")
}

/// JSON array of create requests for a bulk import
pub fn load_drafts_json(path: &Path) -> Result<Vec<MappingDraft>> {
    load_json(path, "drafts")
}

pub fn load_layout_json(path: &Path) -> Result<RowLayout> {
    load_json(path, "layout")
}
