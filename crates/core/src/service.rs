//! Audit service and report types.
//!
//! This module provides the main entry point used by the API surfaces and the CLI. It wires the
//! configured reference table and comparison options into a [`Comparator`] and assembles the
//! per-audit report.

use crate::aggregate::{group_by, summarize, top_procedures, GroupKey, GroupSummary, ProcedureTally, Summary};
use crate::comparison::{BilledProcedure, Comparator, ComparisonResult};
use crate::constants::TOP_PROCEDURES_LIMIT;
use crate::contestation::{generate_contestation, Contestation, Signatory};
use crate::ingest::{reconcile, Guide, Statement, StatementLine};
use crate::reference::{ReferenceLookup, ReferenceProcedure};
use crate::CoreConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Results of one audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Identifier of this run, for correlating logs and exported reports.
    pub audit_id: Uuid,
    pub results: Vec<ComparisonResult>,
    pub summary: Summary,
    /// Empty unless a group key was requested.
    pub groups: Vec<GroupSummary>,
    pub top_procedures: Vec<ProcedureTally>,
}

/// An audit run over reconciled guides, with the reconciliation bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub audit: AuditReport,
    pub rejected_guides: Vec<String>,
    pub duplicate_guides: usize,
    pub unmatched_lines: Vec<StatementLine>,
}

/// Comparison result together with the generated letter, if the line is contestable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestOutcome {
    pub result: ComparisonResult,
    pub contestation: Option<Contestation>,
}

/// Pure audit operations - no API concerns
#[derive(Clone, Debug)]
pub struct AuditService {
    cfg: Arc<CoreConfig>,
    comparator: Comparator,
}

impl AuditService {
    /// Creates a new instance of AuditService.
    ///
    /// The comparator shares the configuration's reference table; nothing is reloaded.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        let comparator = Comparator::new(cfg.reference_table().clone(), cfg.options());
        Self { cfg, comparator }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// Compares billed procedures against the reference table and aggregates the outcome.
    ///
    /// # Arguments
    ///
    /// * `procedures` - Billed line items, in the order they should be reported.
    /// * `group_key` - Optional dimension to break the summary down by.
    ///
    /// # Returns
    ///
    /// An `AuditReport` whose `results` are in input order. Groups are ordered by key.
    pub fn audit(&self, procedures: &[BilledProcedure], group_key: Option<GroupKey>) -> AuditReport {
        let audit_id = Uuid::new_v4();
        let results = self.comparator.compare(procedures);
        let summary = summarize(&results);
        let groups = group_key
            .map(|key| group_by(&results, key).into_values().collect())
            .unwrap_or_default();
        let top_procedures = top_procedures(&results, TOP_PROCEDURES_LIMIT);

        tracing::info!(
            %audit_id,
            total = summary.total,
            matches = summary.matches,
            below = summary.below,
            above = summary.above,
            not_paid = summary.not_paid,
            unclassified = summary.unclassified,
            "audit completed"
        );

        AuditReport {
            audit_id,
            results,
            summary,
            groups,
            top_procedures,
        }
    }

    /// Pairs guides with payer statements and audits the resulting procedures.
    ///
    /// Guides are filtered by the configured CRM, when there is one.
    pub fn reconcile(
        &self,
        guides: Vec<Guide>,
        statements: &[Statement],
        group_key: Option<GroupKey>,
    ) -> ReconciliationReport {
        self.reconcile_for(guides, statements, self.cfg.registered_crm(), group_key)
    }

    /// As [`AuditService::reconcile`], with an explicit physician filter.
    pub fn reconcile_for(
        &self,
        guides: Vec<Guide>,
        statements: &[Statement],
        crm: Option<&medcheck_types::Crm>,
        group_key: Option<GroupKey>,
    ) -> ReconciliationReport {
        let reconciliation = reconcile(guides, statements, crm);
        let audit = self.audit(&reconciliation.procedures, group_key);

        ReconciliationReport {
            audit,
            rejected_guides: reconciliation.rejected_guides,
            duplicate_guides: reconciliation.duplicate_guides,
            unmatched_lines: reconciliation.unmatched_lines,
        }
    }

    /// Reference value for a (code, role) pair under the configured role matching.
    pub fn lookup(&self, code: &str, role_text: &str) -> ReferenceLookup {
        self.cfg
            .reference_table()
            .lookup(code, role_text, self.cfg.options().role_matching)
    }

    /// Full reference entry for a code, if present.
    pub fn procedure(&self, code: &str) -> Option<&ReferenceProcedure> {
        self.cfg.reference_table().find_by_code(code)
    }

    /// Compares a single procedure and drafts a contestation letter when it was underpaid or
    /// not paid.
    pub fn contest(
        &self,
        procedure: &BilledProcedure,
        reason_given: Option<&str>,
        date: NaiveDate,
        signatory: Option<&Signatory>,
    ) -> ContestOutcome {
        let result = self.comparator.compare_one(procedure);
        let contestation = generate_contestation(&result, reason_given, date, signatory);
        ContestOutcome {
            result,
            contestation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::PaymentStatus;
    use crate::ingest::{GuideProcedure, Participation, StatementLine};
    use medcheck_types::Crm;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn service(crm: Option<&str>) -> AuditService {
        let cfg = CoreConfig::from_env_values(None, None, None, crm.map(String::from)).unwrap();
        AuditService::new(Arc::new(cfg))
    }

    fn billed(code: &str, role: &str, paid: &str, hospital: &str) -> BilledProcedure {
        let paid_amount = Decimal::from_str(paid).unwrap();
        BilledProcedure {
            code: code.into(),
            role: role.into(),
            paid_amount,
            was_paid: paid_amount > Decimal::ZERO,
            hospital: hospital.into(),
            execution_date: "05/09/2024".into(),
            ..Default::default()
        }
    }

    #[test]
    fn audit_reports_results_in_input_order() {
        let svc = service(None);
        let procedures = vec![
            billed("30602246", "Cirurgião", "3772.88", "A"),
            billed("30602246", "Anestesista", "400.00", "B"),
            billed("30602076", "Cirurgião", "0", "A"),
        ];

        let report = svc.audit(&procedures, Some(GroupKey::Hospital));

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.results[0].status, PaymentStatus::Matches);
        assert_eq!(report.results[1].status, PaymentStatus::Below);
        assert_eq!(report.results[2].status, PaymentStatus::NotPaid);
        assert_eq!(report.summary.total, 3);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].key, "A");
        assert_eq!(report.top_procedures[0].code, "30602246");
        assert_eq!(report.top_procedures[0].count, 2);
    }

    #[test]
    fn audits_get_distinct_ids() {
        let svc = service(None);
        assert_ne!(svc.audit(&[], None).audit_id, svc.audit(&[], None).audit_id);
        assert!(svc.audit(&[], None).groups.is_empty());
    }

    #[test]
    fn reconcile_applies_configured_crm() {
        let svc = service(Some("7546"));
        let guide = |number: &str, crm: &str| Guide {
            number: number.into(),
            procedures: vec![GuideProcedure {
                code: "30602246".into(),
                execution_date: "04/09/2024".into(),
                participations: vec![Participation {
                    role: "Cirurgião".into(),
                    crm: crm.into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let statements = vec![Statement {
            lines: vec![StatementLine {
                guide_number: "G1".into(),
                code: "30602246".into(),
                paid_amount: Decimal::from_str("3000.00").unwrap(),
                ..Default::default()
            }],
            ..Default::default()
        }];

        let report = svc.reconcile(vec![guide("G1", "7546"), guide("G2", "6091")], &statements, None);

        assert_eq!(report.rejected_guides, vec!["G2".to_string()]);
        assert_eq!(report.audit.results.len(), 1);
        assert_eq!(report.audit.results[0].status, PaymentStatus::Below);

        let unfiltered = svc.reconcile_for(
            vec![guide("G1", "7546"), guide("G2", "6091")],
            &statements,
            Some(&Crm::new("6091").unwrap()),
            None,
        );
        assert_eq!(unfiltered.rejected_guides, vec!["G1".to_string()]);
    }

    #[test]
    fn lookup_uses_configured_table() {
        let svc = service(None);
        assert_eq!(
            svc.lookup("30602246", "Cirurgião").value(),
            Some(Decimal::from_str("3772.88").unwrap())
        );
        assert_eq!(svc.lookup("99999999", "Cirurgião"), ReferenceLookup::NotFound);
        assert!(svc.procedure("30602246").is_some());
    }

    #[test]
    fn contest_drafts_letter_for_underpayment_only() {
        let svc = service(None);
        let date = NaiveDate::from_ymd_opt(2024, 9, 5).unwrap();

        let underpaid = svc.contest(&billed("30602246", "Cirurgião", "3200.50", ""), None, date, None);
        assert_eq!(underpaid.result.status, PaymentStatus::Below);
        assert!(underpaid.contestation.is_some());

        let fully_paid = svc.contest(&billed("30602246", "Cirurgião", "3772.88", ""), None, date, None);
        assert!(fully_paid.contestation.is_none());
    }
}
