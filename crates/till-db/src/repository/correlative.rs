//! # Correlatives
//!
//! Human-readable invoice numbers, one counter per journal series.
//!
//! ```text
//! Sale          F-000001, F-000002, ...
//! Debt payment  C-000001, ...
//! Adjustment    A-000001, ...
//! ```
//!
//! The counter is bumped inside the same unit as the journal insert, so a
//! rolled-back sale never burns a number.

use sqlx::SqliteConnection;

use crate::error::{DbError, DbResult};
use till_core::EntryKind;

/// Series letter for a journal entry kind.
pub fn series_for(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::Sale => "F",
        EntryKind::DebtPayment => "C",
        EntryKind::Adjustment => "A",
    }
}

/// Formats a counter value, e.g. `("F", 42)` → `F-000042`.
pub fn format_number(series: &str, value: i64) -> String {
    format!("{}-{:06}", series, value)
}

/// Allocates the next invoice number for `kind` inside the caller's unit.
pub async fn next(conn: &mut SqliteConnection, kind: EntryKind) -> DbResult<String> {
    let series = series_for(kind);

    let value: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO correlatives (series, last_value) VALUES (?1, 1)
        ON CONFLICT(series) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(series)
    .fetch_optional(&mut *conn)
    .await?;

    let value = value.ok_or_else(|| DbError::not_found("Correlative series", series))?;
    Ok(format_number(series, value))
}
