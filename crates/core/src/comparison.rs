//! Comparison of billed procedures against the reference table.
//!
//! Each billed line is looked up by `(code, role)`, the paid amount is compared with the reference
//! value, and the line gets a [`PaymentStatus`]. The comparator never fails: missing data degrades
//! to zero or defaults, and missing reference data is either treated as a zero reference (the
//! baseline) or reported as [`PaymentStatus::Unclassified`], depending on [`MissingReference`].

use crate::coerce;
use crate::constants::DEFAULT_ROLE_LABEL;
use crate::money::epsilon;
use crate::period::period_of;
use crate::reference::{ReferenceTable, RoleMatching};
use crate::AuditError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// A physician listed on a billed procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorParticipation {
    /// CRM of the physician.
    #[serde(deserialize_with = "coerce::string_or_number", alias = "crm")]
    pub code: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "nome")]
    pub name: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "funcao")]
    pub role: String,
    #[serde(
        deserialize_with = "coerce::string_or_number",
        alias = "startTime",
        alias = "data_inicio",
    )]
    pub start_time: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "endTime", alias = "data_fim")]
    pub end_time: String,
    #[serde(deserialize_with = "coerce::string_or_number")]
    pub status: String,
}

/// A billed line item as produced by ingestion.
///
/// Every field defaults when absent: amounts to zero, `was_paid` to false and text to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BilledProcedure {
    #[serde(deserialize_with = "coerce::string_or_number", alias = "codigo")]
    pub code: String,
    #[serde(
        deserialize_with = "coerce::string_or_number",
        alias = "procedimento",
        alias = "descricao",
    )]
    pub description: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "papel")]
    pub role: String,
    #[serde(deserialize_with = "coerce::amount", alias = "valor_pago")]
    pub paid_amount: Decimal,
    #[serde(deserialize_with = "coerce::null_as_default", alias = "pago")]
    pub was_paid: bool,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "guia")]
    pub guide_number: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "beneficiario")]
    pub beneficiary: String,
    #[serde(deserialize_with = "coerce::string_or_number")]
    pub hospital: String,
    #[serde(deserialize_with = "coerce::string_or_number", alias = "data_execucao")]
    pub execution_date: String,
    #[serde(deserialize_with = "coerce::null_as_default")]
    pub doctors: Vec<DoctorParticipation>,
}

/// Payment classification of a billed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    NotPaid,
    Matches,
    Below,
    Above,
    /// Paid, but no reference value exists. Only produced with
    /// [`MissingReference::Unclassified`].
    Unclassified,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::NotPaid => "not_paid",
            PaymentStatus::Matches => "matches",
            PaymentStatus::Below => "below",
            PaymentStatus::Above => "above",
            PaymentStatus::Unclassified => "unclassified",
        }
    }

    /// Portuguese label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::NotPaid => "não pago",
            PaymentStatus::Matches => "conforme",
            PaymentStatus::Below => "abaixo",
            PaymentStatus::Above => "acima",
            PaymentStatus::Unclassified => "sem referência",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with paid lines that have no reference data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReference {
    /// The reference value is zero, so any positive payment is `above`.
    #[default]
    TreatAsZero,
    /// The line is reported as `unclassified`.
    Unclassified,
}

impl FromStr for MissingReference {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" | "treat_as_zero" => Ok(MissingReference::TreatAsZero),
            "unclassified" => Ok(MissingReference::Unclassified),
            other => Err(AuditError::InvalidInput(format!(
                "unknown missing reference mode {other:?} (expected zero or unclassified)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComparisonOptions {
    pub role_matching: RoleMatching,
    pub missing_reference: MissingReference,
}

/// Outcome of comparing one billed line.
///
/// `difference` is the magnitude of `paid_amount - reference_value`; the sign is carried by
/// `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub code: String,
    pub description: String,
    pub role: String,
    pub reference_value: Decimal,
    pub reference_found: bool,
    pub paid_amount: Decimal,
    pub difference: Decimal,
    pub status: PaymentStatus,
    pub guide_number: String,
    pub beneficiary: String,
    pub hospital: String,
    pub period: Option<String>,
}

/// Classify a payment given whether it was paid and `paid - reference`.
///
/// Precedence: unpaid, then within one cent, then below, then above.
pub fn classify(was_paid: bool, difference: Decimal) -> PaymentStatus {
    if !was_paid {
        PaymentStatus::NotPaid
    } else if difference.abs() < epsilon() {
        PaymentStatus::Matches
    } else if difference.is_sign_negative() {
        PaymentStatus::Below
    } else {
        PaymentStatus::Above
    }
}

/// Compares billed procedures against a shared reference table.
#[derive(Debug, Clone)]
pub struct Comparator {
    table: Arc<ReferenceTable>,
    options: ComparisonOptions,
}

impl Comparator {
    pub fn new(table: Arc<ReferenceTable>, options: ComparisonOptions) -> Self {
        Self { table, options }
    }

    pub fn options(&self) -> ComparisonOptions {
        self.options
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    /// Compare every billed procedure, preserving input order.
    pub fn compare(&self, procedures: &[BilledProcedure]) -> Vec<ComparisonResult> {
        let results: Vec<ComparisonResult> =
            procedures.iter().map(|p| self.compare_one(p)).collect();
        tracing::debug!(procedures = results.len(), "comparison finished");
        results
    }

    pub fn compare_one(&self, procedure: &BilledProcedure) -> ComparisonResult {
        let lookup = self.table.lookup(
            &procedure.code,
            &procedure.role,
            self.options.role_matching,
        );
        let reference_value = lookup.value_or_zero();
        let difference = procedure.paid_amount - reference_value;

        let status = if procedure.was_paid
            && !lookup.is_found()
            && self.options.missing_reference == MissingReference::Unclassified
        {
            PaymentStatus::Unclassified
        } else {
            classify(procedure.was_paid, difference)
        };

        let description = if procedure.description.trim().is_empty() {
            self.table
                .find_by_code(&procedure.code)
                .map(|r| r.description.clone())
                .unwrap_or_default()
        } else {
            procedure.description.clone()
        };

        let role = if procedure.role.trim().is_empty() {
            DEFAULT_ROLE_LABEL.to_string()
        } else {
            procedure.role.clone()
        };

        ComparisonResult {
            code: procedure.code.trim().to_string(),
            description,
            role,
            reference_value,
            reference_found: lookup.is_found(),
            paid_amount: procedure.paid_amount,
            difference: difference.abs(),
            status,
            guide_number: procedure.guide_number.clone(),
            beneficiary: procedure.beneficiary.clone(),
            hospital: procedure.hospital.clone(),
            period: period_of(&procedure.execution_date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amount(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn table() -> Arc<ReferenceTable> {
        Arc::new(
            ReferenceTable::from_json_str(
                "test",
                r#"[
                    {"codigo": "30602246", "procedimento": "Reconstrução mamária",
                     "valor_cirurgiao": "3772.88", "valor_anestesista": "456.40",
                     "valor_primeiro_auxiliar": "228.82"},
                    {"codigo": "30602076", "procedimento": "Exérese de lesão da mama",
                     "valor_cirurgiao": "1117.84", "valor_anestesista": "230.40"}
                ]"#,
            )
            .unwrap(),
        )
    }

    fn comparator() -> Comparator {
        Comparator::new(table(), ComparisonOptions::default())
    }

    fn paid(code: &str, role: &str, paid_amount: &str) -> BilledProcedure {
        BilledProcedure {
            code: code.into(),
            role: role.into(),
            paid_amount: amount(paid_amount),
            was_paid: true,
            ..Default::default()
        }
    }

    #[test]
    fn underpaid_surgeon_is_below() {
        let result = comparator().compare_one(&paid("30602246", "Cirurgiao", "3200.50"));

        assert_eq!(result.reference_value, amount("3772.88"));
        assert_eq!(result.difference, amount("572.38"));
        assert_eq!(result.status, PaymentStatus::Below);
        assert_eq!(result.description, "Reconstrução mamária");
    }

    #[test]
    fn unpaid_is_not_paid_regardless_of_amount() {
        let procedure = BilledProcedure {
            code: "30602076".into(),
            role: "Anestesista".into(),
            paid_amount: Decimal::ZERO,
            was_paid: false,
            ..Default::default()
        };
        assert_eq!(comparator().compare_one(&procedure).status, PaymentStatus::NotPaid);

        let overpaid_but_flagged_unpaid = BilledProcedure {
            paid_amount: amount("99999"),
            ..procedure
        };
        assert_eq!(
            comparator().compare_one(&overpaid_but_flagged_unpaid).status,
            PaymentStatus::NotPaid
        );
    }

    #[test]
    fn exact_payment_matches() {
        let result = comparator().compare_one(&paid("30602246", "Cirurgião", "3772.88"));
        assert_eq!(result.status, PaymentStatus::Matches);
        assert_eq!(result.difference, Decimal::ZERO);
    }

    #[test]
    fn half_a_cent_off_still_matches() {
        let result = comparator().compare_one(&paid("30602246", "Cirurgião", "3772.875"));
        assert_eq!(result.status, PaymentStatus::Matches);
    }

    #[test]
    fn exactly_one_cent_off_is_outside_tolerance() {
        let below = comparator().compare_one(&paid("30602246", "Cirurgião", "3772.87"));
        let above = comparator().compare_one(&paid("30602246", "Cirurgião", "3772.89"));
        assert_eq!(below.status, PaymentStatus::Below);
        assert_eq!(above.status, PaymentStatus::Above);
    }

    #[test]
    fn unknown_code_with_payment_is_above() {
        let result = comparator().compare_one(&paid("11111111", "Cirurgião", "10.00"));
        assert_eq!(result.reference_value, Decimal::ZERO);
        assert!(!result.reference_found);
        assert_eq!(result.status, PaymentStatus::Above);
    }

    #[test]
    fn unknown_code_is_unclassified_when_configured() {
        let comparator = Comparator::new(
            table(),
            ComparisonOptions {
                missing_reference: MissingReference::Unclassified,
                ..Default::default()
            },
        );
        let result = comparator.compare_one(&paid("11111111", "Cirurgião", "10.00"));
        assert_eq!(result.status, PaymentStatus::Unclassified);

        let unpaid = BilledProcedure {
            was_paid: false,
            ..paid("11111111", "Cirurgião", "0")
        };
        assert_eq!(comparator.compare_one(&unpaid).status, PaymentStatus::NotPaid);
    }

    #[test]
    fn assistant_roles_use_first_assistant_value() {
        let first = comparator().compare_one(&paid("30602246", "Primeiro Auxiliar", "228.82"));
        let second = comparator().compare_one(&paid("30602246", "Segundo Auxiliar", "228.82"));
        assert_eq!(first.status, PaymentStatus::Matches);
        assert_eq!(second.status, PaymentStatus::Matches);
    }

    #[test]
    fn empty_role_defaults_to_surgeon_value_and_label() {
        let result = comparator().compare_one(&paid("30602076", "", "1117.84"));
        assert_eq!(result.status, PaymentStatus::Matches);
        assert_eq!(result.role, "Cirurgião");
    }

    #[test]
    fn strict_mode_does_not_guess_unknown_roles() {
        let comparator = Comparator::new(
            table(),
            ComparisonOptions {
                role_matching: RoleMatching::Strict,
                missing_reference: MissingReference::Unclassified,
            },
        );
        let result = comparator.compare_one(&paid("30602076", "Instrumentador", "100"));
        assert_eq!(result.status, PaymentStatus::Unclassified);
        assert!(!result.reference_found);
    }

    #[test]
    fn compare_is_repeatable() {
        let procedures = vec![
            paid("30602246", "Cirurgiao", "3200.50"),
            paid("30602076", "Anestesista", "230.40"),
            BilledProcedure {
                execution_date: "04/09/2024".into(),
                ..paid("99999999", "", "1")
            },
        ];
        let comparator = comparator();
        let first = comparator.compare(&procedures);
        let second = comparator.compare(&procedures);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[2].period.as_deref(), Some("2024-09"));
    }

    #[test]
    fn deserializes_portuguese_field_names_with_defaults() {
        let procedure: BilledProcedure = serde_json::from_str(
            r#"{"codigo": "30602246", "papel": "Cirurgião", "valor_pago": 3200.50, "pago": true}"#,
        )
        .unwrap();
        assert_eq!(procedure.code, "30602246");
        assert_eq!(procedure.paid_amount, amount("3200.50"));
        assert!(procedure.was_paid);
        assert!(procedure.guide_number.is_empty());
    }

    #[test]
    fn extractor_output_is_coerced() {
        let procedure: BilledProcedure = serde_json::from_str(
            r#"{"codigo": 30602246, "papel": null, "valor_pago": "3.200,50", "pago": true,
                "guia": 10467538, "doctors": [{"crm": 7546, "nome": null}]}"#,
        )
        .unwrap();
        assert_eq!(procedure.code, "30602246");
        assert_eq!(procedure.role, "");
        assert_eq!(procedure.paid_amount, amount("3200.50"));
        assert_eq!(procedure.guide_number, "10467538");
        assert_eq!(procedure.doctors[0].code, "7546");

        let result = comparator().compare_one(&procedure);
        assert_eq!(result.status, PaymentStatus::Below);
        assert_eq!(result.reference_value, amount("3772.88"));
    }

    #[test]
    fn null_fields_default_instead_of_failing() {
        let procedure: BilledProcedure = serde_json::from_str(
            r#"{"codigo": "30602246", "papel": null, "valor_pago": null, "pago": null, "doctors": null}"#,
        )
        .unwrap();
        assert_eq!(procedure.paid_amount, Decimal::ZERO);
        assert!(!procedure.was_paid);
        assert!(procedure.doctors.is_empty());
        assert_eq!(comparator().compare_one(&procedure).status, PaymentStatus::NotPaid);
    }

    #[test]
    fn classify_precedence() {
        assert_eq!(classify(false, amount("-5")), PaymentStatus::NotPaid);
        assert_eq!(classify(true, amount("-0.009")), PaymentStatus::Matches);
        assert_eq!(classify(true, amount("-0.01")), PaymentStatus::Below);
        assert_eq!(classify(true, amount("0.01")), PaymentStatus::Above);
    }

    #[test]
    fn missing_reference_modes_parse() {
        assert_eq!(
            "unclassified".parse::<MissingReference>().unwrap(),
            MissingReference::Unclassified
        );
        assert_eq!(
            " ZERO ".parse::<MissingReference>().unwrap(),
            MissingReference::TreatAsZero
        );
        assert!("sometimes".parse::<MissingReference>().is_err());
    }
}
