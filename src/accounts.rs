// 📒 Account Universes - Reference data for both charts of accounts
//
// Two independently-numbered GL account systems:
//   Source (incumbent ledger) - carries the provider it came from
//   Target (new ledger)       - carries a reporting category
//
// Accounts are immutable for the duration of an editing session. They can be
// refreshed from upstream independently of the mapping set, which is why the
// validator treats a missing account as a dangling reference instead of
// dropping the mapping.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

// ============================================================================
// LEDGER SECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerSection {
    Assets,
    Liabilities,
    Equity,
    Income,
    Expense,
}

impl LedgerSection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerSection::Assets => "ASSETS",
            LedgerSection::Liabilities => "LIABILITIES",
            LedgerSection::Equity => "EQUITY",
            LedgerSection::Income => "INCOME",
            LedgerSection::Expense => "EXPENSE",
        }
    }

    /// Parse from the upper-case wire name ("ASSETS", "INCOME", ...)
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ASSETS" => Some(LedgerSection::Assets),
            "LIABILITIES" => Some(LedgerSection::Liabilities),
            "EQUITY" => Some(LedgerSection::Equity),
            "INCOME" => Some(LedgerSection::Income),
            "EXPENSE" => Some(LedgerSection::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// UNIVERSE
// ============================================================================

/// Which chart of accounts an account number belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Universe {
    /// Incumbent ledger (left column)
    Source,
    /// New ledger (right column)
    Target,
}

impl Universe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Universe::Source => "source",
            Universe::Target => "target",
        }
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ACCOUNTS
// ============================================================================

/// Account in the incumbent (source) chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAccount {
    /// Unique within the source universe (e.g. "1050")
    pub account_number: String,

    pub description: String,

    pub ledger_section: LedgerSection,

    /// Servicing provider the account was exported from (e.g. "STATE_STREET")
    pub provider: String,
}

/// Account in the new (target) chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetAccount {
    /// Unique within the target universe (e.g. "EAGLE-1050")
    pub account_number: String,

    pub description: String,

    pub ledger_section: LedgerSection,

    /// Reporting category in the target ledger
    pub category: String,
}

impl SourceAccount {
    pub fn new(account_number: &str, description: &str, ledger_section: LedgerSection, provider: &str) -> Self {
        SourceAccount {
            account_number: account_number.to_string(),
            description: description.to_string(),
            ledger_section,
            provider: provider.to_string(),
        }
    }
}

impl TargetAccount {
    pub fn new(account_number: &str, description: &str, ledger_section: LedgerSection, category: &str) -> Self {
        TargetAccount {
            account_number: account_number.to_string(),
            description: description.to_string(),
            ledger_section,
            category: category.to_string(),
        }
    }
}

// ============================================================================
// ACCOUNT CATALOG
// ============================================================================

/// Both account universes, indexed by account number
///
/// Built once per reference-data refresh. Lookups are O(1); listings keep the
/// order the accounts were supplied in unless a sorted view is requested.
#[derive(Debug, Clone, Default)]
pub struct AccountCatalog {
    source: Vec<SourceAccount>,
    target: Vec<TargetAccount>,
    source_index: HashMap<String, usize>,
    target_index: HashMap<String, usize>,
}

impl AccountCatalog {
    pub fn new(source: Vec<SourceAccount>, target: Vec<TargetAccount>) -> Self {
        // Later duplicates lose: the first record for a number wins
        let mut source_index = HashMap::new();
        for (i, account) in source.iter().enumerate() {
            source_index.entry(account.account_number.clone()).or_insert(i);
        }
        let mut target_index = HashMap::new();
        for (i, account) in target.iter().enumerate() {
            target_index.entry(account.account_number.clone()).or_insert(i);
        }

        AccountCatalog {
            source,
            target,
            source_index,
            target_index,
        }
    }

    pub fn source_accounts(&self) -> &[SourceAccount] {
        &self.source
    }

    pub fn target_accounts(&self) -> &[TargetAccount] {
        &self.target
    }

    pub fn source_account(&self, account_number: &str) -> Option<&SourceAccount> {
        self.source_index.get(account_number).map(|&i| &self.source[i])
    }

    pub fn target_account(&self, account_number: &str) -> Option<&TargetAccount> {
        self.target_index.get(account_number).map(|&i| &self.target[i])
    }

    /// Check whether an account number resolves in the given universe
    pub fn contains(&self, universe: Universe, account_number: &str) -> bool {
        match universe {
            Universe::Source => self.source_index.contains_key(account_number),
            Universe::Target => self.target_index.contains_key(account_number),
        }
    }

    pub fn ledger_section(&self, universe: Universe, account_number: &str) -> Option<LedgerSection> {
        match universe {
            Universe::Source => self.source_account(account_number).map(|a| a.ledger_section),
            Universe::Target => self.target_account(account_number).map(|a| a.ledger_section),
        }
    }

    /// Account numbers of one universe, in catalog order, without duplicates
    pub fn account_numbers(&self, universe: Universe) -> Vec<&str> {
        let numbers: Vec<&str> = match universe {
            Universe::Source => self.source.iter().map(|a| a.account_number.as_str()).collect(),
            Universe::Target => self.target.iter().map(|a| a.account_number.as_str()).collect(),
        };
        let mut seen = HashSet::new();
        numbers.into_iter().filter(|n| seen.insert(*n)).collect()
    }

    /// Source accounts exported by one provider, sorted by account number
    pub fn source_accounts_for_provider(&self, provider: &str) -> Vec<&SourceAccount> {
        let mut accounts: Vec<&SourceAccount> = self
            .source
            .iter()
            .filter(|a| a.provider.eq_ignore_ascii_case(provider))
            .collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        accounts
    }

    /// Target accounts in one ledger section, sorted by account number
    pub fn target_accounts_in_section(&self, section: LedgerSection) -> Vec<&TargetAccount> {
        let mut accounts: Vec<&TargetAccount> = self
            .target
            .iter()
            .filter(|a| a.ledger_section == section)
            .collect();
        accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
        accounts
    }
}

// ============================================================================
// TESTS
// ============================================================================
