//! Merging extracted billing guides with payer statements.
//!
//! Guides list what was billed and who took part; statements list what the payer actually paid.
//! Extraction itself happens elsewhere. This module takes the already extracted records,
//! removes duplicate guides, optionally restricts the audit to one physician (by CRM), and pairs
//! every guide procedure with its statement line to produce [`BilledProcedure`]s.

use crate::coerce;
use crate::comparison::{BilledProcedure, DoctorParticipation};
use crate::constants::UNSPECIFIED_ROLE_LABEL;
use medcheck_types::{Crm, GuideNumber};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A party named on a guide (beneficiary or provider).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Party {
    #[serde(deserialize_with = "coerce::string_or_number", alias = "codigo")]
    pub code: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "nome")]
    pub name: String,
}

/// A physician's participation in a guide procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Participation {
    #[serde(deserialize_with = "coerce::string_or_number", alias = "funcao")]
    pub role: String,
    #[serde(deserialize_with = "coerce::string_or_number")]
    pub crm: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "nome")]
    pub name: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "dataInicio")]
    pub start_time: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "dataFim")]
    pub end_time: String,
    #[serde(deserialize_with = "coerce::string_or_number")]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideProcedure {
    #[serde(deserialize_with = "coerce::string_or_number", alias = "codigo")]
    pub code: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "descricao")]
    pub description: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "dataExecucao")]
    pub execution_date: String,
    #[serde(deserialize_with = "coerce::null_as_default", alias = "quantidade")]
    pub quantity: u32,
    #[serde(deserialize_with = "coerce::string_or_number")]
    pub status: String,
    #[serde(deserialize_with = "coerce::null_as_default", alias = "participacoes")]
    pub participations: Vec<Participation>,
}

/// A billing guide (guia) as extracted from the provider's submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guide {
    #[serde(deserialize_with = "coerce::string_or_number", alias = "numero")]
    pub number: String,
    /// Secondary identifier used when the guide number is missing.
    #[serde(deserialize_with = "coerce::string_or_number", alias = "execucao")]
    pub execution: String,
    #[serde(deserialize_with = "coerce::null_as_default", alias = "beneficiario")]
    pub beneficiary: Party,
    #[serde(deserialize_with = "coerce::null_as_default", alias = "prestador")]
    pub provider: Party,
    #[serde(deserialize_with = "coerce::null_as_default", alias = "procedimentos")]
    pub procedures: Vec<GuideProcedure>,
}

/// One paid (or glosa'd) line on a payer statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementLine {
    #[serde(deserialize_with = "coerce::string_or_number", alias = "guia")]
    pub guide_number: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "codigo")]
    pub code: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "descricao")]
    pub description: String,
    #[serde(deserialize_with = "coerce::amount", alias = "valor_pago")]
    pub paid_amount: Decimal,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "motivo_glosa")]
    pub glosa_reason: String,
}

/// A payer statement (demonstrativo).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Statement {
    #[serde(deserialize_with = "coerce::string_or_number", alias = "numero")]
    pub number: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "competencia")]
    pub competence: String,
    #[serde(deserialize_with = "coerce::string_or_number")]
    pub hospital: String,
    #[serde(deserialize_with = "coerce::null_as_default", alias = "linhas")]
    pub lines: Vec<StatementLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideDedup {
    pub guides: Vec<Guide>,
    pub duplicates: usize,
}

fn guide_key(guide: &Guide) -> Option<GuideNumber> {
    GuideNumber::new(&guide.number)
        .or_else(|_| GuideNumber::new(&guide.execution))
        .ok()
}

/// Remove duplicate guides, keeping the first occurrence of each number.
///
/// Guides are keyed by their normalised number, falling back to the execution identifier. A
/// guide with neither is always kept since there is nothing to compare it by.
pub fn dedupe_guides(guides: Vec<Guide>) -> GuideDedup {
    let mut seen: HashSet<GuideNumber> = HashSet::new();
    let mut unique = Vec::with_capacity(guides.len());
    let mut duplicates = 0;

    for guide in guides {
        match guide_key(&guide) {
            Some(key) if !seen.insert(key.clone()) => {
                tracing::debug!(guide = %key, "duplicate guide skipped");
                duplicates += 1;
            }
            _ => unique.push(guide),
        }
    }

    GuideDedup {
        guides: unique,
        duplicates,
    }
}

/// Whether any procedure on the guide lists the physician.
pub fn guide_matches_crm(guide: &Guide, crm: &Crm) -> bool {
    guide
        .procedures
        .iter()
        .flat_map(|p| p.participations.iter())
        .any(|part| crm.matches(&part.crm))
}

/// Participating physicians of a procedure, restricted to `crm` when given.
pub fn participants_for(procedure: &GuideProcedure, crm: Option<&Crm>) -> Vec<DoctorParticipation> {
    procedure
        .participations
        .iter()
        .filter(|part| crm.map_or(true, |crm| crm.matches(&part.crm)))
        .map(|part| DoctorParticipation {
            code: part.crm.trim().to_string(),
            name: part.name.clone(),
            role: part.role.clone(),
            start_time: part.start_time.clone(),
            end_time: part.end_time.clone(),
            status: part.status.clone(),
        })
        .collect()
}

/// Role a physician played on a guide procedure.
///
/// Looks for an exact match on guide, code, execution date and CRM first. Failing that, the role
/// of the first participant of the first procedure with the same guide and code is returned.
pub fn role_for(
    guides: &[Guide],
    guide_number: &str,
    code: &str,
    execution_date: &str,
    crm: &Crm,
) -> Option<String> {
    let wanted = GuideNumber::new(guide_number).ok()?;
    let code = code.trim();
    let execution_date = execution_date.trim();

    let candidates: Vec<&GuideProcedure> = guides
        .iter()
        .filter(|guide| guide_key(guide).as_ref() == Some(&wanted))
        .flat_map(|guide| guide.procedures.iter())
        .filter(|procedure| procedure.code.trim() == code)
        .collect();

    let exact = candidates
        .iter()
        .filter(|procedure| procedure.execution_date.trim() == execution_date)
        .flat_map(|procedure| procedure.participations.iter())
        .find(|part| crm.matches(&part.crm));
    if let Some(part) = exact {
        tracing::debug!(guide = %wanted, code, "role matched exactly");
        return Some(part.role.clone());
    }

    let partial = candidates
        .first()
        .and_then(|procedure| procedure.participations.first())
        .map(|part| part.role.clone())
        .filter(|role| !role.trim().is_empty());
    if partial.is_none() {
        tracing::warn!(guide = %wanted, code, "no participation found for role lookup");
    }
    partial
}

/// Result of pairing guides with statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub procedures: Vec<BilledProcedure>,
    /// Guide numbers excluded because the physician does not appear on them.
    pub rejected_guides: Vec<String>,
    pub duplicate_guides: usize,
    /// Statement lines with no matching guide procedure.
    pub unmatched_lines: Vec<StatementLine>,
}

type LineKey = (GuideNumber, String);

struct PaidLine<'a> {
    line: &'a StatementLine,
    hospital: &'a str,
}

/// Pair deduplicated guides with statement lines by (guide number, code).
///
/// The first statement line for a pair wins; later duplicates are ignored. A procedure counts as
/// paid when its matched line has a positive amount.
pub fn reconcile(guides: Vec<Guide>, statements: &[Statement], crm: Option<&Crm>) -> Reconciliation {
    let GuideDedup { guides, duplicates } = dedupe_guides(guides);
    if duplicates > 0 {
        tracing::info!(duplicates, "duplicate guides removed");
    }

    let mut paid_lines: HashMap<LineKey, PaidLine<'_>> = HashMap::new();
    let mut unkeyed_lines: Vec<StatementLine> = Vec::new();
    for statement in statements {
        for line in &statement.lines {
            let Ok(number) = GuideNumber::new(&line.guide_number) else {
                unkeyed_lines.push(line.clone());
                continue;
            };
            let key = (number, line.code.trim().to_string());
            if paid_lines.contains_key(&key) {
                tracing::warn!(guide = %key.0, code = %key.1, "duplicate statement line ignored");
                continue;
            }
            paid_lines.insert(
                key,
                PaidLine {
                    line,
                    hospital: statement.hospital.as_str(),
                },
            );
        }
    }

    let mut used: HashSet<LineKey> = HashSet::new();
    let mut reconciliation = Reconciliation {
        duplicate_guides: duplicates,
        ..Default::default()
    };

    for guide in &guides {
        let number = guide_key(guide);
        if let Some(crm) = crm {
            if !guide_matches_crm(guide, crm) {
                tracing::warn!(guide = %guide.number, "guide rejected: physician not listed");
                reconciliation.rejected_guides.push(guide.number.clone());
                // its lines belong to an existing guide, so they are not unmatched
                if let Some(n) = &number {
                    used.extend(
                        guide
                            .procedures
                            .iter()
                            .map(|p| (n.clone(), p.code.trim().to_string())),
                    );
                }
                continue;
            }
        }

        for procedure in &guide.procedures {
            let key = number
                .clone()
                .map(|n| (n, procedure.code.trim().to_string()));
            let paid = key.as_ref().and_then(|k| paid_lines.get(k));
            if let (Some(key), Some(_)) = (key.as_ref(), paid) {
                used.insert(key.clone());
            }

            let doctors = participants_for(procedure, crm);
            let role = doctors
                .first()
                .map(|d| d.role.clone())
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_ROLE_LABEL.to_string());

            let paid_amount = paid.map_or(Decimal::ZERO, |p| p.line.paid_amount);
            let description = if procedure.description.trim().is_empty() {
                paid.map(|p| p.line.description.clone()).unwrap_or_default()
            } else {
                procedure.description.clone()
            };
            let hospital = paid
                .map(|p| p.hospital)
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(guide.provider.name.as_str())
                .to_string();

            reconciliation.procedures.push(BilledProcedure {
                code: procedure.code.trim().to_string(),
                description,
                role,
                paid_amount,
                was_paid: paid_amount > Decimal::ZERO,
                guide_number: guide.number.trim().to_string(),
                beneficiary: guide.beneficiary.name.clone(),
                hospital,
                execution_date: procedure.execution_date.clone(),
                doctors,
            });
        }
    }

    let mut unmatched: Vec<StatementLine> = statements
        .iter()
        .flat_map(|s| s.lines.iter())
        .filter(|line| {
            GuideNumber::new(&line.guide_number)
                .map(|n| !used.contains(&(n, line.code.trim().to_string())))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    unmatched.extend(unkeyed_lines);
    if !unmatched.is_empty() {
        tracing::warn!(lines = unmatched.len(), "statement lines without a guide procedure");
    }
    reconciliation.unmatched_lines = unmatched;

    tracing::info!(
        procedures = reconciliation.procedures.len(),
        rejected = reconciliation.rejected_guides.len(),
        "reconciliation finished"
    );
    reconciliation
}
