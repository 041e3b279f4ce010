//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The reference table is loaded here exactly once and shared through
//! an `Arc`, so request handling never reads environment variables or touches the filesystem.

use crate::comparison::{ComparisonOptions, MissingReference};
use crate::reference::{ReferenceTable, RoleMatching};
use crate::{AuditError, AuditResult};
use medcheck_types::Crm;
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    reference_table: Arc<ReferenceTable>,
    options: ComparisonOptions,
    registered_crm: Option<Crm>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `AuditError::InvalidInput` if the reference table has no procedures.
    pub fn new(
        reference_table: Arc<ReferenceTable>,
        options: ComparisonOptions,
        registered_crm: Option<Crm>,
    ) -> AuditResult<Self> {
        if reference_table.is_empty() {
            return Err(AuditError::InvalidInput(format!(
                "reference table {} has no procedures",
                reference_table.source()
            )));
        }

        Ok(Self {
            reference_table,
            options,
            registered_crm,
        })
    }

    /// Build a configuration from raw environment values.
    ///
    /// Each argument is the value of the corresponding variable, `None` when unset:
    /// `MEDCHECK_REFERENCE_TABLE`, `MEDCHECK_ROLE_MATCHING`, `MEDCHECK_MISSING_REFERENCE` and
    /// `MEDCHECK_CRM`.
    pub fn from_env_values(
        reference_table: Option<String>,
        role_matching: Option<String>,
        missing_reference: Option<String>,
        crm: Option<String>,
    ) -> AuditResult<Self> {
        let table = resolve_reference_table(non_empty(reference_table).map(PathBuf::from))?;
        let options = ComparisonOptions {
            role_matching: role_matching_from_env_value(role_matching)?,
            missing_reference: missing_reference_from_env_value(missing_reference)?,
        };
        Self::new(Arc::new(table), options, crm_from_env_value(crm)?)
    }

    /// Build a configuration from the process environment. Call once at startup.
    pub fn from_env() -> AuditResult<Self> {
        Self::from_env_values(
            std::env::var("MEDCHECK_REFERENCE_TABLE").ok(),
            std::env::var("MEDCHECK_ROLE_MATCHING").ok(),
            std::env::var("MEDCHECK_MISSING_REFERENCE").ok(),
            std::env::var("MEDCHECK_CRM").ok(),
        )
    }

    pub fn reference_table(&self) -> &Arc<ReferenceTable> {
        &self.reference_table
    }

    pub fn options(&self) -> ComparisonOptions {
        self.options
    }

    /// Physician whose guides are audited, when the deployment is tied to one.
    pub fn registered_crm(&self) -> Option<&Crm> {
        self.registered_crm.as_ref()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Load the reference table from `override_path`, or the bundled table when `None`.
pub fn resolve_reference_table(override_path: Option<PathBuf>) -> AuditResult<ReferenceTable> {
    match override_path {
        Some(path) => ReferenceTable::load(&path),
        None => ReferenceTable::bundled(),
    }
}

/// Parse the role matching mode. Unset or blank means lenient.
pub fn role_matching_from_env_value(value: Option<String>) -> AuditResult<RoleMatching> {
    let parsed = non_empty(value)
        .map(|v| v.parse::<RoleMatching>())
        .transpose()?;
    Ok(parsed.unwrap_or_default())
}

/// Parse the missing reference policy. Unset or blank means treat as zero.
pub fn missing_reference_from_env_value(value: Option<String>) -> AuditResult<MissingReference> {
    let parsed = non_empty(value)
        .map(|v| v.parse::<MissingReference>())
        .transpose()?;
    Ok(parsed.unwrap_or_default())
}

pub fn crm_from_env_value(value: Option<String>) -> AuditResult<Option<Crm>> {
    Ok(non_empty(value).map(Crm::new).transpose()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_use_bundled_table_and_baseline_modes() {
        let cfg = CoreConfig::from_env_values(None, None, None, None).unwrap();
        assert_eq!(cfg.reference_table().source(), "bundled");
        assert_eq!(cfg.options(), ComparisonOptions::default());
        assert!(cfg.registered_crm().is_none());
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        assert_eq!(
            role_matching_from_env_value(Some("  ".into())).unwrap(),
            RoleMatching::Lenient
        );
        assert_eq!(
            missing_reference_from_env_value(Some(String::new())).unwrap(),
            MissingReference::TreatAsZero
        );
        assert!(crm_from_env_value(Some(" ".into())).unwrap().is_none());
    }

    #[test]
    fn parses_explicit_modes() {
        assert_eq!(
            role_matching_from_env_value(Some("STRICT".into())).unwrap(),
            RoleMatching::Strict
        );
        assert_eq!(
            missing_reference_from_env_value(Some("unclassified".into())).unwrap(),
            MissingReference::Unclassified
        );
        assert!(role_matching_from_env_value(Some("fuzzy".into())).is_err());
        assert_eq!(
            crm_from_env_value(Some(" 7546 ".into())).unwrap().unwrap().as_str(),
            "7546"
        );
    }

    #[test]
    fn loads_override_table_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"codigo": "10101012", "procedimento": "Consulta", "valor_cirurgiao": 100}}]"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let cfg = CoreConfig::from_env_values(Some(path), None, None, None).unwrap();
        assert_eq!(cfg.reference_table().len(), 1);
    }

    #[test]
    fn missing_override_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            resolve_reference_table(Some(missing)),
            Err(AuditError::ReferenceTableRead(_))
        ));
    }

    #[test]
    fn empty_table_is_rejected() {
        let table = ReferenceTable::from_json_str("empty", "[]").unwrap();
        assert!(CoreConfig::new(Arc::new(table), ComparisonOptions::default(), None).is_err());
    }
}
