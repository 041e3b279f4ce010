//! Totals and groupings over comparison results.
//!
//! Every aggregate here is a pure fold over a slice of [`ComparisonResult`]; groups re-run the
//! same fold on their own members.

use crate::comparison::{ComparisonResult, PaymentStatus};
use crate::constants::UNKNOWN_GROUP_KEY;
use crate::AuditError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Status counts and money totals for a set of results.
///
/// `matches + below + above + not_paid + unclassified == total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub matches: usize,
    pub below: usize,
    pub above: usize,
    pub not_paid: usize,
    pub unclassified: usize,
    pub total_reference: Decimal,
    pub total_paid: Decimal,
    /// `total_paid - total_reference`, signed.
    pub total_difference: Decimal,
    /// Money owed: underpayment on `below` lines plus the reference value of unpaid lines.
    pub total_shortfall: Decimal,
}

impl Summary {
    fn add(&mut self, result: &ComparisonResult) {
        self.total += 1;
        match result.status {
            PaymentStatus::Matches => self.matches += 1,
            PaymentStatus::Below => {
                self.below += 1;
                self.total_shortfall += result.difference;
            }
            PaymentStatus::Above => self.above += 1,
            PaymentStatus::NotPaid => {
                self.not_paid += 1;
                self.total_shortfall += result.reference_value;
            }
            PaymentStatus::Unclassified => self.unclassified += 1,
        }
        self.total_reference += result.reference_value;
        self.total_paid += result.paid_amount;
        self.total_difference = self.total_paid - self.total_reference;
    }
}

/// Summarise results in a single pass. An empty slice gives an all-zero summary.
pub fn summarize(results: &[ComparisonResult]) -> Summary {
    results.iter().fold(Summary::default(), |mut summary, result| {
        summary.add(result);
        summary
    })
}

/// Built-in grouping dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    Role,
    Hospital,
    Period,
}

impl GroupKey {
    /// Key of a result under this dimension.
    ///
    /// Roles are used verbatim; an empty hospital or missing period falls back to
    /// `"Desconhecido"`.
    pub fn key_of(&self, result: &ComparisonResult) -> String {
        match self {
            GroupKey::Role => result.role.clone(),
            GroupKey::Hospital => {
                if result.hospital.trim().is_empty() {
                    UNKNOWN_GROUP_KEY.to_string()
                } else {
                    result.hospital.clone()
                }
            }
            GroupKey::Period => result
                .period
                .clone()
                .unwrap_or_else(|| UNKNOWN_GROUP_KEY.to_string()),
        }
    }

    /// Parse an optional group key, where an empty value means no grouping.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::InvalidInput` for unrecognised keys.
    pub fn parse_optional(value: &str) -> Result<Option<Self>, AuditError> {
        if value.trim().is_empty() {
            return Ok(None);
        }
        value.parse().map(Some)
    }
}

impl FromStr for GroupKey {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "role" | "papel" => Ok(GroupKey::Role),
            "hospital" | "prestador" => Ok(GroupKey::Hospital),
            "period" | "competencia" | "competência" => Ok(GroupKey::Period),
            other => Err(AuditError::InvalidInput(format!(
                "unknown group key {other:?} (expected role, hospital or period)"
            ))),
        }
    }
}

/// Results sharing one group key, with their own summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub key: String,
    pub summary: Summary,
    pub results: Vec<ComparisonResult>,
}

/// Group by one of the built-in dimensions.
pub fn group_by(results: &[ComparisonResult], key: GroupKey) -> BTreeMap<String, GroupSummary> {
    group_by_with(results, |result| key.key_of(result))
}

/// Group by an arbitrary key. Keys are compared as exact strings.
pub fn group_by_with<F>(results: &[ComparisonResult], key_fn: F) -> BTreeMap<String, GroupSummary>
where
    F: Fn(&ComparisonResult) -> String,
{
    let mut groups: BTreeMap<String, GroupSummary> = BTreeMap::new();
    for result in results {
        let key = key_fn(result);
        let group = groups.entry(key.clone()).or_insert_with(|| GroupSummary {
            key,
            summary: Summary::default(),
            results: Vec::new(),
        });
        group.summary.add(result);
        group.results.push(result.clone());
    }
    groups
}

/// Per-procedure tally for the "most frequent procedures" report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureTally {
    pub code: String,
    pub description: String,
    pub count: usize,
    pub total_reference: Decimal,
    pub total_paid: Decimal,
    pub total_difference: Decimal,
}

/// The `limit` most frequent procedure codes, most frequent first, ties broken by code.
pub fn top_procedures(results: &[ComparisonResult], limit: usize) -> Vec<ProcedureTally> {
    let mut by_code: HashMap<&str, ProcedureTally> = HashMap::new();
    for result in results {
        let tally = by_code
            .entry(result.code.as_str())
            .or_insert_with(|| ProcedureTally {
                code: result.code.clone(),
                description: result.description.clone(),
                count: 0,
                total_reference: Decimal::ZERO,
                total_paid: Decimal::ZERO,
                total_difference: Decimal::ZERO,
            });
        tally.count += 1;
        tally.total_reference += result.reference_value;
        tally.total_paid += result.paid_amount;
        tally.total_difference = tally.total_paid - tally.total_reference;
    }

    let mut tallies: Vec<ProcedureTally> = by_code.into_values().collect();
    tallies.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));
    tallies.truncate(limit);
    tallies
}
