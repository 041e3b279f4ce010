//! Conversions between protobuf messages and core types.
//!
//! Amounts travel as decimal strings on the wire. Inbound conversions parse them with
//! [`parse_amount`] and are therefore fallible; outbound conversions always succeed.

use crate::aggregate::{GroupKey, GroupSummary, ProcedureTally, Summary};
use crate::comparison::{BilledProcedure, ComparisonResult, DoctorParticipation};
use crate::contestation::Signatory;
use crate::ingest::{Guide, GuideProcedure, Participation, Party, Statement, StatementLine};
use crate::money::parse_amount;
use crate::period::parse_document_date;
use crate::pb;
use crate::reference::ReferenceProcedure;
use crate::service::{AuditReport, AuditService, ReconciliationReport};
use crate::{AuditError, AuditResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Two-decimal string as sent to clients.
pub fn amount_to_wire(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

impl From<pb::Doctor> for DoctorParticipation {
    fn from(d: pb::Doctor) -> Self {
        Self {
            code: d.code,
            name: d.name,
            role: d.role,
            start_time: d.start_time,
            end_time: d.end_time,
            status: d.status,
        }
    }
}

impl TryFrom<pb::BilledProcedure> for BilledProcedure {
    type Error = AuditError;

    fn try_from(p: pb::BilledProcedure) -> Result<Self, Self::Error> {
        Ok(Self {
            paid_amount: parse_amount(&p.paid_amount)?,
            code: p.code,
            description: p.description,
            role: p.role,
            was_paid: p.was_paid,
            guide_number: p.guide_number,
            beneficiary: p.beneficiary,
            hospital: p.hospital,
            execution_date: p.execution_date,
            doctors: p.doctors.into_iter().map(Into::into).collect(),
        })
    }
}

impl From<&ComparisonResult> for pb::ComparisonResult {
    fn from(r: &ComparisonResult) -> Self {
        Self {
            code: r.code.clone(),
            description: r.description.clone(),
            role: r.role.clone(),
            reference_value: amount_to_wire(r.reference_value),
            reference_found: r.reference_found,
            paid_amount: amount_to_wire(r.paid_amount),
            difference: amount_to_wire(r.difference),
            status: r.status.as_str().to_string(),
            guide_number: r.guide_number.clone(),
            beneficiary: r.beneficiary.clone(),
            hospital: r.hospital.clone(),
            period: r.period.clone().unwrap_or_default(),
        }
    }
}

impl From<&Summary> for pb::Summary {
    fn from(s: &Summary) -> Self {
        Self {
            total: s.total as u64,
            matches: s.matches as u64,
            below: s.below as u64,
            above: s.above as u64,
            not_paid: s.not_paid as u64,
            unclassified: s.unclassified as u64,
            total_reference: amount_to_wire(s.total_reference),
            total_paid: amount_to_wire(s.total_paid),
            total_difference: amount_to_wire(s.total_difference),
            total_shortfall: amount_to_wire(s.total_shortfall),
        }
    }
}

impl From<&GroupSummary> for pb::GroupSummary {
    fn from(g: &GroupSummary) -> Self {
        Self {
            key: g.key.clone(),
            summary: Some((&g.summary).into()),
            results: g.results.iter().map(Into::into).collect(),
        }
    }
}

impl From<&ProcedureTally> for pb::ProcedureTally {
    fn from(t: &ProcedureTally) -> Self {
        Self {
            code: t.code.clone(),
            description: t.description.clone(),
            count: t.count as u64,
            total_reference: amount_to_wire(t.total_reference),
            total_paid: amount_to_wire(t.total_paid),
            total_difference: amount_to_wire(t.total_difference),
        }
    }
}

impl From<&AuditReport> for pb::CompareRes {
    fn from(report: &AuditReport) -> Self {
        Self {
            audit_id: report.audit_id.to_string(),
            results: report.results.iter().map(Into::into).collect(),
            summary: Some((&report.summary).into()),
            groups: report.groups.iter().map(Into::into).collect(),
            top_procedures: report.top_procedures.iter().map(Into::into).collect(),
        }
    }
}

impl From<pb::Party> for Party {
    fn from(p: pb::Party) -> Self {
        Self {
            code: p.code,
            name: p.name,
        }
    }
}

impl From<pb::Participation> for Participation {
    fn from(p: pb::Participation) -> Self {
        Self {
            role: p.role,
            crm: p.crm,
            name: p.name,
            start_time: p.start_time,
            end_time: p.end_time,
            status: p.status,
        }
    }
}

impl From<pb::GuideProcedure> for GuideProcedure {
    fn from(p: pb::GuideProcedure) -> Self {
        Self {
            code: p.code,
            description: p.description,
            execution_date: p.execution_date,
            quantity: p.quantity,
            status: p.status,
            participations: p.participations.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<pb::Guide> for Guide {
    fn from(g: pb::Guide) -> Self {
        Self {
            number: g.number,
            execution: g.execution,
            beneficiary: g.beneficiary.map(Into::into).unwrap_or_default(),
            provider: g.provider.map(Into::into).unwrap_or_default(),
            procedures: g.procedures.into_iter().map(Into::into).collect(),
        }
    }
}

impl TryFrom<pb::StatementLine> for StatementLine {
    type Error = AuditError;

    fn try_from(l: pb::StatementLine) -> Result<Self, Self::Error> {
        Ok(Self {
            paid_amount: parse_amount(&l.paid_amount)?,
            guide_number: l.guide_number,
            code: l.code,
            description: l.description,
            glosa_reason: l.glosa_reason,
        })
    }
}

impl From<&StatementLine> for pb::StatementLine {
    fn from(l: &StatementLine) -> Self {
        Self {
            guide_number: l.guide_number.clone(),
            code: l.code.clone(),
            description: l.description.clone(),
            paid_amount: amount_to_wire(l.paid_amount),
            glosa_reason: l.glosa_reason.clone(),
        }
    }
}

impl TryFrom<pb::Statement> for Statement {
    type Error = AuditError;

    fn try_from(s: pb::Statement) -> Result<Self, Self::Error> {
        Ok(Self {
            lines: s
                .lines
                .into_iter()
                .map(StatementLine::try_from)
                .collect::<Result<_, _>>()?,
            number: s.number,
            competence: s.competence,
            hospital: s.hospital,
        })
    }
}

impl From<&ReconciliationReport> for pb::ReconcileRes {
    fn from(report: &ReconciliationReport) -> Self {
        Self {
            audit: Some((&report.audit).into()),
            rejected_guides: report.rejected_guides.clone(),
            duplicate_guides: report.duplicate_guides as u64,
            unmatched_lines: report.unmatched_lines.iter().map(Into::into).collect(),
        }
    }
}

/// Inbound procedures, failing on the first unreadable amount.
pub fn procedures_from_pb(procedures: Vec<pb::BilledProcedure>) -> Result<Vec<BilledProcedure>, AuditError> {
    procedures.into_iter().map(BilledProcedure::try_from).collect()
}

pub fn statements_from_pb(statements: Vec<pb::Statement>) -> Result<Vec<Statement>, AuditError> {
    statements.into_iter().map(Statement::try_from).collect()
}

/// Lookup response for `code` and `role`; `procedure` is `None` for unknown codes.
pub fn lookup_to_pb(
    code: &str,
    procedure: Option<&ReferenceProcedure>,
    value: Option<Decimal>,
) -> pb::LookupReferenceRes {
    pb::LookupReferenceRes {
        code: code.trim().to_string(),
        description: procedure.map(|p| p.description.clone()).unwrap_or_default(),
        found: value.is_some(),
        value: value.map(amount_to_wire).unwrap_or_default(),
        values: procedure
            .map(|p| {
                p.value_by_role
                    .iter()
                    .map(|(role, value)| (role.as_str().to_string(), amount_to_wire(*value)))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Handle a `CompareReq` end to end.
pub fn compare(svc: &AuditService, req: pb::CompareReq) -> AuditResult<pb::CompareRes> {
    let group_key = GroupKey::parse_optional(&req.group_by)?;
    let procedures = procedures_from_pb(req.procedures)?;
    Ok((&svc.audit(&procedures, group_key)).into())
}

/// Handle a `ReconcileReq` end to end, using the configured CRM filter.
pub fn reconcile(svc: &AuditService, req: pb::ReconcileReq) -> AuditResult<pb::ReconcileRes> {
    let group_key = GroupKey::parse_optional(&req.group_by)?;
    let guides = req.guides.into_iter().map(Guide::from).collect();
    let statements = statements_from_pb(req.statements)?;
    Ok((&svc.reconcile(guides, &statements, group_key)).into())
}

/// Handle a `ContestReq`. An empty date means `today`.
pub fn contest(svc: &AuditService, req: pb::ContestReq, today: NaiveDate) -> AuditResult<pb::ContestRes> {
    let procedure = req
        .procedure
        .ok_or_else(|| AuditError::InvalidInput("procedure is required".into()))?;
    let procedure = BilledProcedure::try_from(procedure)?;
    let date = if req.date.trim().is_empty() {
        today
    } else {
        parse_document_date(&req.date)?
    };
    let signatory = (!req.doctor_name.trim().is_empty() || !req.doctor_crm.trim().is_empty())
        .then(|| Signatory {
            name: req.doctor_name.trim().to_string(),
            crm: req.doctor_crm.trim().to_string(),
        });
    let reason_given = Some(req.reason_given.as_str()).filter(|r| !r.trim().is_empty());

    let outcome = svc.contest(&procedure, reason_given, date, signatory.as_ref());
    let (reason, text) = outcome
        .contestation
        .as_ref()
        .map(|c| (c.reason.as_str().to_string(), c.text.clone()))
        .unwrap_or_default();

    Ok(pb::ContestRes {
        result: Some((&outcome.result).into()),
        contestable: outcome.contestation.is_some(),
        reason,
        text,
    })
}

/// Handle a `LookupReferenceReq`. Returns `None` when the code is not in the table.
pub fn lookup(svc: &AuditService, req: &pb::LookupReferenceReq) -> Option<pb::LookupReferenceRes> {
    let procedure = svc.procedure(&req.code)?;
    let value = svc.lookup(&req.code, &req.role).value();
    Some(lookup_to_pb(&req.code, Some(procedure), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::PaymentStatus;
    use std::str::FromStr;

    #[test]
    fn inbound_amounts_accept_brazilian_notation() {
        let procedure = BilledProcedure::try_from(pb::BilledProcedure {
            code: "30602246".into(),
            paid_amount: "R$ 3.200,50".into(),
            was_paid: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(procedure.paid_amount, Decimal::from_str("3200.50").unwrap());
    }

    #[test]
    fn empty_amount_is_zero_and_garbage_is_rejected() {
        let empty = BilledProcedure::try_from(pb::BilledProcedure::default()).unwrap();
        assert_eq!(empty.paid_amount, Decimal::ZERO);

        let bad = pb::Statement {
            lines: vec![pb::StatementLine {
                paid_amount: "dez reais".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            Statement::try_from(bad),
            Err(AuditError::InvalidAmount(_))
        ));
    }

    #[test]
    fn outbound_result_uses_status_names_and_two_decimals() {
        let result = ComparisonResult {
            code: "30602246".into(),
            description: String::new(),
            role: "Cirurgião".into(),
            reference_value: Decimal::from_str("3772.88").unwrap(),
            reference_found: true,
            paid_amount: Decimal::from_str("3200.5").unwrap(),
            difference: Decimal::from_str("572.38").unwrap(),
            status: PaymentStatus::Below,
            guide_number: String::new(),
            beneficiary: String::new(),
            hospital: String::new(),
            period: None,
        };
        let wire = pb::ComparisonResult::from(&result);
        assert_eq!(wire.status, "below");
        assert_eq!(wire.paid_amount, "3200.50");
        assert_eq!(wire.period, "");
    }

    fn service() -> AuditService {
        let cfg = crate::CoreConfig::from_env_values(None, None, None, None).unwrap();
        AuditService::new(std::sync::Arc::new(cfg))
    }

    #[test]
    fn compare_request_groups_and_rejects_unknown_keys() {
        let svc = service();
        let req = pb::CompareReq {
            procedures: vec![pb::BilledProcedure {
                code: "30602246".into(),
                role: "Anestesista".into(),
                paid_amount: "456,40".into(),
                was_paid: true,
                ..Default::default()
            }],
            group_by: "role".into(),
        };
        let res = compare(&svc, req.clone()).unwrap();
        assert_eq!(res.results[0].status, "matches");
        assert_eq!(res.groups[0].key, "Anestesista");
        assert_eq!(res.summary.unwrap().matches, 1);

        let bad = pb::CompareReq {
            group_by: "beneficiary".into(),
            ..req
        };
        assert!(matches!(compare(&svc, bad), Err(AuditError::InvalidInput(_))));
    }

    #[test]
    fn contest_request_defaults_date_and_requires_procedure() {
        let svc = service();
        let today = NaiveDate::from_ymd_opt(2024, 9, 5).unwrap();
        let req = pb::ContestReq {
            procedure: Some(pb::BilledProcedure {
                code: "30602076".into(),
                role: "Cirurgião".into(),
                ..Default::default()
            }),
            doctor_crm: "7546".into(),
            ..Default::default()
        };
        let res = contest(&svc, req, today).unwrap();
        assert!(res.contestable);
        assert_eq!(res.reason, "procedimento_nao_coberto");
        assert!(res.text.contains("05/09/2024"));
        assert!(res.text.contains("CRM: 7546"));

        assert!(contest(&svc, pb::ContestReq::default(), today).is_err());
        let bad_date = pb::ContestReq {
            procedure: Some(pb::BilledProcedure::default()),
            date: "amanhã".into(),
            ..Default::default()
        };
        assert!(matches!(
            contest(&svc, bad_date, today),
            Err(AuditError::InvalidDate(_))
        ));
    }

    #[test]
    fn lookup_request_reports_per_role_values() {
        let svc = service();
        let res = lookup(
            &svc,
            &pb::LookupReferenceReq {
                code: " 30602246 ".into(),
                role: "Auxiliar".into(),
            },
        )
        .unwrap();
        assert!(res.found);
        assert_eq!(res.value, "228.82");
        assert_eq!(res.values["surgeon"], "3772.88");
        assert!(lookup(&svc, &pb::LookupReferenceReq { code: "0".into(), role: String::new() }).is_none());
    }

    #[test]
    fn guide_parties_default_when_absent() {
        let guide = Guide::from(pb::Guide {
            number: "G1".into(),
            ..Default::default()
        });
        assert_eq!(guide.beneficiary, Party::default());
    }
}
