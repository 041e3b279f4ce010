//! Constants used throughout the MedCheck core crate.
//!
//! Labels here are user-facing Portuguese strings matching the documents being audited.

/// Bundled CBHPM reference table, used when no override path is configured.
pub const BUNDLED_REFERENCE_TABLE: &str = include_str!("../data/cbhpm.json");

/// Label identifying the bundled table in logs.
pub const BUNDLED_REFERENCE_SOURCE: &str = "bundled";

/// Two-decimal tolerance below which a payment is considered to match the reference, in cents.
pub const MONEY_EPSILON_CENTS: i64 = 1;

/// Role label shown for procedures billed without a role.
pub const DEFAULT_ROLE_LABEL: &str = "Cirurgião";

/// Role label for reconciled procedures where no participating physician could be found.
pub const UNSPECIFIED_ROLE_LABEL: &str = "Não especificado";

/// Grouping key used when a result has no hospital or no period.
pub const UNKNOWN_GROUP_KEY: &str = "Desconhecido";

/// Number of entries returned by the top procedures report.
pub const TOP_PROCEDURES_LIMIT: usize = 10;

/// Lenient role keyword identifying anesthesiology.
pub const ANESTHESIA_KEYWORD: &str = "anest";

/// Lenient role keyword identifying assistants.
pub const ASSISTANT_KEYWORD: &str = "aux";
