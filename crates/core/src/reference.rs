//! CBHPM reference table lookup.
//!
//! The reference table is loaded once (from the bundled dataset or an override file) and is
//! immutable afterwards. Callers share it through an `Arc<ReferenceTable>` rather than a global.
//!
//! Looking up the expected value for a billed line takes two steps: find the procedure by its
//! exact (trimmed) code, then pick the value for the billed role. Role text on documents is free
//! text, so it is classified into a [`Role`] according to a [`RoleMatching`] mode:
//!
//! - [`RoleMatching::Lenient`] is a keyword heuristic: anything mentioning `anest` is the
//!   anesthetist, anything mentioning `aux` is the first assistant (second assistants included),
//!   everything else is the surgeon.
//! - [`RoleMatching::Strict`] distinguishes first and second assistants and refuses to guess for
//!   unrecognised roles.

use crate::coerce;
use crate::constants::{ANESTHESIA_KEYWORD, ASSISTANT_KEYWORD, BUNDLED_REFERENCE_SOURCE, BUNDLED_REFERENCE_TABLE};
use crate::{AuditError, AuditResult};
use medcheck_types::ProcedureCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

/// Professional role of a physician taking part in a procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Surgeon,
    Anesthetist,
    FirstAssistant,
    SecondAssistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Surgeon => "surgeon",
            Role::Anesthetist => "anesthetist",
            Role::FirstAssistant => "first_assistant",
            Role::SecondAssistant => "second_assistant",
        }
    }

    /// Portuguese label as printed on guides.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Surgeon => "Cirurgião",
            Role::Anesthetist => "Anestesista",
            Role::FirstAssistant => "Primeiro Auxiliar",
            Role::SecondAssistant => "Segundo Auxiliar",
        }
    }
}

/// How free-text roles are mapped onto [`Role`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleMatching {
    /// Keyword heuristic with a surgeon fallback. Never fails to classify.
    #[default]
    Lenient,
    /// Explicit role vocabulary; unknown roles are left unclassified.
    Strict,
}

impl FromStr for RoleMatching {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(RoleMatching::Lenient),
            "strict" => Ok(RoleMatching::Strict),
            other => Err(AuditError::InvalidInput(format!(
                "unknown role matching mode {other:?} (expected lenient or strict)"
            ))),
        }
    }
}

/// Classify free-text role into a [`Role`].
///
/// Lenient mode always returns `Some`.
pub fn classify_role(role_text: &str, mode: RoleMatching) -> Option<Role> {
    match mode {
        RoleMatching::Lenient => Some(classify_lenient(role_text)),
        RoleMatching::Strict => classify_strict(role_text),
    }
}

fn classify_lenient(role_text: &str) -> Role {
    let lowered = role_text.to_lowercase();
    if lowered.contains(ANESTHESIA_KEYWORD) {
        Role::Anesthetist
    } else if lowered.contains(ASSISTANT_KEYWORD) {
        Role::FirstAssistant
    } else {
        Role::Surgeon
    }
}

fn classify_strict(role_text: &str) -> Option<Role> {
    const SECOND_ASSISTANT: &[&str] = &[
        "segundo aux",
        "2º aux",
        "2° aux",
        "2o aux",
        "2 aux",
        "second assistant",
        "secondassistant",
    ];
    const FIRST_ASSISTANT: &[&str] = &[
        "primeiro aux",
        "1º aux",
        "1° aux",
        "1o aux",
        "1 aux",
        "auxiliar",
        "first assistant",
        "firstassistant",
        "assistant",
    ];
    const SURGEON: &[&str] = &["cirurg", "surgeon"];

    let folded = fold_accents(&role_text.to_lowercase());
    let folded = folded.trim();
    if folded.is_empty() {
        return None;
    }

    let has_any = |needles: &[&str]| needles.iter().any(|n| folded.contains(n));

    if folded.contains(ANESTHESIA_KEYWORD) {
        Some(Role::Anesthetist)
    } else if has_any(SECOND_ASSISTANT) {
        Some(Role::SecondAssistant)
    } else if has_any(FIRST_ASSISTANT) {
        Some(Role::FirstAssistant)
    } else if has_any(SURGEON) {
        Some(Role::Surgeon)
    } else {
        None
    }
}

fn fold_accents(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Outcome of a reference value lookup.
///
/// `NotFound` is kept distinct from `Found(0)` so callers can decide whether missing reference
/// data counts as zero or as unclassifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceLookup {
    Found(Decimal),
    NotFound,
}

impl ReferenceLookup {
    pub fn is_found(&self) -> bool {
        matches!(self, ReferenceLookup::Found(_))
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            ReferenceLookup::Found(value) => Some(*value),
            ReferenceLookup::NotFound => None,
        }
    }

    /// The value, or zero when no reference data exists.
    pub fn value_or_zero(&self) -> Decimal {
        self.value().unwrap_or(Decimal::ZERO)
    }
}

/// One row of the reference table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceProcedure {
    pub code: ProcedureCode,
    pub description: String,
    pub value_by_role: BTreeMap<Role, Decimal>,
}

impl ReferenceProcedure {
    /// Reference value for an already classified role.
    pub fn value(&self, role: Role) -> Option<Decimal> {
        self.value_by_role.get(&role).copied()
    }

    /// Reference value for a free-text role.
    ///
    /// Lenient mode treats a second assistant as the first assistant, so the first assistant
    /// value is used for both.
    pub fn value_for(&self, role_text: &str, mode: RoleMatching) -> ReferenceLookup {
        classify_role(role_text, mode)
            .and_then(|role| self.value(role))
            .map_or(ReferenceLookup::NotFound, ReferenceLookup::Found)
    }
}

#[derive(Deserialize)]
struct ReferenceRecord {
    #[serde(alias = "codigo", deserialize_with = "coerce::string_or_number")]
    code: String,
    #[serde(default, alias = "procedimento")]
    description: String,
    #[serde(default, alias = "valor_cirurgiao")]
    surgeon_value: Option<Decimal>,
    #[serde(default, alias = "valor_anestesista")]
    anesthetist_value: Option<Decimal>,
    #[serde(default, alias = "valor_primeiro_auxiliar")]
    first_assistant_value: Option<Decimal>,
    #[serde(default, alias = "valor_segundo_auxiliar")]
    second_assistant_value: Option<Decimal>,
}

impl ReferenceRecord {
    fn into_procedure(self) -> AuditResult<ReferenceProcedure> {
        let code = ProcedureCode::new(self.code)?;

        let mut value_by_role = BTreeMap::new();
        for (role, value) in [
            (Role::Surgeon, self.surgeon_value),
            (Role::Anesthetist, self.anesthetist_value),
            (Role::FirstAssistant, self.first_assistant_value),
            (Role::SecondAssistant, self.second_assistant_value),
        ] {
            let Some(value) = value else { continue };
            if value.is_sign_negative() && !value.is_zero() {
                return Err(AuditError::InvalidInput(format!(
                    "negative {} value for reference code {code}",
                    role.label()
                )));
            }
            value_by_role.insert(role, value);
        }

        Ok(ReferenceProcedure {
            code,
            description: self.description.trim().to_string(),
            value_by_role,
        })
    }
}

/// Immutable CBHPM reference table keyed by procedure code.
#[derive(Debug, Clone)]
pub struct ReferenceTable {
    source: String,
    by_code: HashMap<String, ReferenceProcedure>,
}

impl ReferenceTable {
    /// Build a table from already validated procedures.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::DuplicateReferenceCode` if two procedures share a code.
    pub fn from_procedures(
        source: impl Into<String>,
        procedures: impl IntoIterator<Item = ReferenceProcedure>,
    ) -> AuditResult<Self> {
        let mut by_code = HashMap::new();
        for procedure in procedures {
            let key = procedure.code.as_str().to_string();
            if by_code.contains_key(&key) {
                return Err(AuditError::DuplicateReferenceCode(key));
            }
            by_code.insert(key, procedure);
        }

        let table = Self {
            source: source.into(),
            by_code,
        };
        tracing::info!(
            entries = table.len(),
            source = %table.source,
            "reference table loaded"
        );
        Ok(table)
    }

    /// Parse a JSON array of reference records.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed, a record has an unusable code or a negative
    /// value, or a code appears twice.
    pub fn from_json_str(source: impl Into<String>, json: &str) -> AuditResult<Self> {
        let records: Vec<ReferenceRecord> =
            serde_json::from_str(json).map_err(AuditError::ReferenceTableParse)?;
        let procedures = records
            .into_iter()
            .map(ReferenceRecord::into_procedure)
            .collect::<AuditResult<Vec<_>>>()?;
        Self::from_procedures(source, procedures)
    }

    /// Load a table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::ReferenceTableRead` if the file cannot be read, otherwise the errors
    /// of [`ReferenceTable::from_json_str`].
    pub fn load(path: &Path) -> AuditResult<Self> {
        let json = std::fs::read_to_string(path).map_err(AuditError::ReferenceTableRead)?;
        Self::from_json_str(path.display().to_string(), &json)
    }

    /// The dataset compiled into the crate.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled file is malformed.
    pub fn bundled() -> AuditResult<Self> {
        Self::from_json_str(BUNDLED_REFERENCE_SOURCE, BUNDLED_REFERENCE_TABLE)
    }

    /// Where this table was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Exact match on the trimmed code. No case folding or fuzzy matching.
    pub fn find_by_code(&self, code: &str) -> Option<&ReferenceProcedure> {
        self.by_code.get(code.trim())
    }

    /// Reference value for a (code, role) pair.
    pub fn lookup(&self, code: &str, role_text: &str, mode: RoleMatching) -> ReferenceLookup {
        self.find_by_code(code)
            .map_or(ReferenceLookup::NotFound, |procedure| {
                procedure.value_for(role_text, mode)
            })
    }
}
