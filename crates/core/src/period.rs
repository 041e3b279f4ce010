//! Document date parsing and billing period (competência) derivation.

use crate::{AuditError, AuditResult};
use chrono::{Datelike, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%Y-%m-%d"];
const DATE_TIME_FORMATS: &[&str] = &["%d/%m/%Y %H:%M", "%d/%m/%Y %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a date as printed on guides and statements.
///
/// Accepts `dd/mm/yyyy`, `yyyy-mm-dd` and the same with a time of day.
///
/// # Errors
///
/// Returns `AuditError::InvalidDate` if none of the accepted layouts match.
pub fn parse_document_date(input: &str) -> AuditResult<NaiveDate> {
    let trimmed = input.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(date_time.date());
        }
    }

    Err(AuditError::InvalidDate(input.to_string()))
}

/// Billing period as `YYYY-MM`, or `None` when the date is missing or unreadable.
pub fn period_of(execution_date: &str) -> Option<String> {
    parse_document_date(execution_date)
        .ok()
        .map(|date| format!("{:04}-{:02}", date.year(), date.month()))
}
