//! # MedCheck Core
//!
//! Core business logic for auditing medical procedure payments against the CBHPM reference fee
//! table.
//!
//! This crate contains pure data operations:
//! - Reference table loading and `(code, role)` lookup
//! - Comparison of billed procedures against reference values
//! - Summaries, groupings and the most frequent procedures
//! - Merging extracted guides with payer statements
//! - Contestation letters for underpaid or unpaid procedures
//!
//! **No API concerns**: Authentication, HTTP/gRPC servers, or service interfaces belong in
//! `api-grpc`, `api-rest`, or `api-shared`.

pub mod aggregate;
pub mod coerce;
pub mod comparison;
pub mod config;
pub mod constants;
pub mod contestation;
pub mod error;
pub mod ingest;
pub mod money;
pub mod period;
pub mod reference;
pub mod service;
pub mod wire;

// Use the shared api-shared crate for generated protobuf types.
pub use api_shared::pb;

pub use aggregate::{
    group_by, summarize, top_procedures, GroupKey, GroupSummary, ProcedureTally, Summary,
};
pub use comparison::{
    BilledProcedure, Comparator, ComparisonOptions, ComparisonResult, DoctorParticipation,
    MissingReference, PaymentStatus,
};
pub use config::CoreConfig;
pub use contestation::{Contestation, GlosaReason, Signatory};
pub use error::{AuditError, AuditResult};
pub use ingest::{Guide, Statement};
pub use reference::{ReferenceLookup, ReferenceProcedure, ReferenceTable, Role, RoleMatching};
pub use service::{AuditReport, AuditService, ContestOutcome, ReconciliationReport};

pub use medcheck_types::{Crm, GuideNumber, ProcedureCode, TextError};
