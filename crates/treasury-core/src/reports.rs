//! Ledger reports
//!
//! Pure functions over committed entries: dashboard totals, per-account
//! balances, category and cost-center breakdowns, member history and the
//! receipt rows handed to the document renderer.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Counterparty, Direction, LedgerEntry, ReceiptRow};

/// Total credits, debits and the resulting balance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub credits: Decimal,
    pub debits: Decimal,
    pub balance: Decimal,
}

impl BalanceSummary {
    fn add(&mut self, entry: &LedgerEntry) {
        match entry.direction {
            Direction::Credit => self.credits += entry.amount,
            Direction::Debit => self.debits += entry.amount,
        }
        self.balance = self.credits - self.debits;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    #[serde(flatten)]
    pub totals: BalanceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub direction: Direction,
    pub category: String,
    pub total: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostCenterTotal {
    pub cost_center: String,
    pub direction: Direction,
    pub total: Decimal,
    pub count: usize,
}

/// Everything a member gave or received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberHistory {
    pub name: String,
    pub entries: Vec<LedgerEntry>,
    #[serde(flatten)]
    pub totals: BalanceSummary,
}

pub fn balance_summary(entries: &[LedgerEntry]) -> BalanceSummary {
    let mut summary = BalanceSummary::default();
    for entry in entries {
        summary.add(entry);
    }
    summary
}

/// Balances per account: configured accounts first, in order, then any other
/// account found on entries. Entries without an account are not counted.
pub fn account_balances(entries: &[LedgerEntry], accounts: &[String]) -> Vec<AccountBalance> {
    let mut balances: Vec<AccountBalance> = accounts
        .iter()
        .map(|account| AccountBalance {
            account: account.clone(),
            totals: BalanceSummary::default(),
        })
        .collect();

    for entry in entries {
        let Some(account) = &entry.account else {
            continue;
        };
        match balances.iter_mut().find(|b| &b.account == account) {
            Some(balance) => balance.totals.add(entry),
            None => {
                let mut totals = BalanceSummary::default();
                totals.add(entry);
                balances.push(AccountBalance {
                    account: account.clone(),
                    totals,
                });
            }
        }
    }

    balances
}

/// Totals by direction, then category
pub fn category_summary(entries: &[LedgerEntry]) -> Vec<CategoryTotal> {
    let mut groups: BTreeMap<(Direction, String), (Decimal, usize)> = BTreeMap::new();
    for entry in entries {
        let slot = groups
            .entry((entry.direction, entry.category.clone()))
            .or_insert((Decimal::ZERO, 0));
        slot.0 += entry.amount;
        slot.1 += 1;
    }

    groups
        .into_iter()
        .map(|((direction, category), (total, count))| CategoryTotal {
            direction,
            category,
            total,
            count,
        })
        .collect()
}

/// Totals by cost center, then direction. Entries without one are grouped
/// under `default_cost_center`.
pub fn cost_center_summary(
    entries: &[LedgerEntry],
    default_cost_center: &str,
) -> Vec<CostCenterTotal> {
    let mut groups: BTreeMap<(String, Direction), (Decimal, usize)> = BTreeMap::new();
    for entry in entries {
        let cost_center = entry
            .cost_center
            .clone()
            .unwrap_or_else(|| default_cost_center.to_string());
        let slot = groups
            .entry((cost_center, entry.direction))
            .or_insert((Decimal::ZERO, 0));
        slot.0 += entry.amount;
        slot.1 += 1;
    }

    groups
        .into_iter()
        .map(|((cost_center, direction), (total, count))| CostCenterTotal {
            cost_center,
            direction,
            total,
            count,
        })
        .collect()
}

/// Entries dated within `[from, to]`; either bound may be open
pub fn filter_by_period(
    entries: &[LedgerEntry],
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<LedgerEntry> {
    entries
        .iter()
        .filter(|e| from.map_or(true, |from| e.date >= from))
        .filter(|e| to.map_or(true, |to| e.date <= to))
        .cloned()
        .collect()
}

pub fn member_history(entries: &[LedgerEntry], name: &str) -> MemberHistory {
    let matching: Vec<LedgerEntry> = entries
        .iter()
        .filter(|e| matches!(&e.counterparty, Counterparty::Named(n) if n == name))
        .cloned()
        .collect();

    MemberHistory {
        name: name.to_string(),
        totals: balance_summary(&matching),
        entries: matching,
    }
}

/// Receipt rows for credit entries, optionally restricted to `ids`.
/// Debits never get a receipt, even when asked for by id.
pub fn receipt_rows(entries: &[LedgerEntry], ids: Option<&[i64]>) -> Vec<ReceiptRow> {
    entries
        .iter()
        .filter(|e| e.direction == Direction::Credit)
        .filter(|e| ids.map_or(true, |ids| ids.contains(&e.id)))
        .map(|e| ReceiptRow {
            id: e.id,
            date: e.date,
            category: e.category.clone(),
            description: e.description.clone(),
            amount: e.amount,
            counterparty: e.counterparty.label().to_string(),
            account: e.account.clone().unwrap_or_default(),
        })
        .collect()
}
