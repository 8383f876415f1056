//! # Journal Repository
//!
//! Append-only journal of sales, debt payments and adjustments.
//!
//! ## Storage Layout
//! ```text
//! journal_entries ─┬─< journal_lines     (sale line items, factor frozen)
//!                  ├─< journal_payments  (normalized, own rate + base amount)
//!                  └─< journal_changes   (physical change handed back)
//! ```
//!
//! An entry is written once. The only later updates are the `completed →
//! void` flip (plus void metadata) and the link to the Z-report that folded
//! it in.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{
    Change, Currency, CustomerQuadrant, EntryKind, EntryStatus, ExchangeRate, JournalEntry,
    LineItem, Medium, Money, Payment, Quantity, TaxRate, UnitLevel, VoidInfo,
};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: String,
    kind: EntryKind,
    invoice_number: String,
    status: EntryStatus,
    created_at: DateTime<Utc>,
    actor: String,
    session_id: Option<String>,
    customer_id: Option<String>,
    rate_scaled: i64,
    is_credit: bool,
    subtotal_cents: i64,
    tax_cents: i64,
    igtf_cents: i64,
    total_cents: i64,
    paid_base_cents: i64,
    change_owed_cents: i64,
    debt_created_cents: i64,
    consumed_wallet_cents: i64,
    applied_to_debt_cents: i64,
    applied_to_wallet_cents: i64,
    resulting_debt_cents: Option<i64>,
    resulting_wallet_cents: Option<i64>,
    adjusted_quadrant: Option<CustomerQuadrant>,
    adjusted_amount_cents: i64,
    reason: Option<String>,
    void_reason: Option<String>,
    voided_by: Option<String>,
    voided_at: Option<DateTime<Utc>>,
    closed_session_id: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct LineRow {
    product_id: String,
    name: String,
    quantity_milli: i64,
    level: UnitLevel,
    factor: i64,
    unit_price_cents: i64,
    tax_rate_bps: i64,
    line_total_cents: i64,
    tax_cents: i64,
}

impl LineRow {
    fn into_line(self) -> DbResult<LineItem> {
        let factor = u32::try_from(self.factor).map_err(|_| DbError::corrupt("factor", self.factor))?;
        let bps = u32::try_from(self.tax_rate_bps)
            .map_err(|_| DbError::corrupt("tax_rate_bps", self.tax_rate_bps))?;
        Ok(LineItem {
            product_id: self.product_id,
            name: self.name,
            quantity: Quantity::from_milli(self.quantity_milli),
            level: self.level,
            factor,
            unit_price: Money::from_cents(self.unit_price_cents),
            tax_rate: TaxRate::from_bps(bps),
            line_total: Money::from_cents(self.line_total_cents),
            tax: Money::from_cents(self.tax_cents),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    amount_cents: i64,
    currency: Currency,
    medium: Medium,
    rate_scaled: i64,
    base_amount_cents: i64,
    reference: Option<String>,
}

impl PaymentRow {
    fn into_payment(self) -> DbResult<Payment> {
        Ok(Payment {
            amount: Money::from_cents(self.amount_cents),
            currency: self.currency,
            medium: self.medium,
            rate: rate(self.rate_scaled)?,
            base_amount: Money::from_cents(self.base_amount_cents),
            reference: self.reference,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChangeRow {
    amount_cents: i64,
    currency: Currency,
    medium: Medium,
}

impl From<ChangeRow> for Change {
    fn from(row: ChangeRow) -> Self {
        Change {
            amount: Money::from_cents(row.amount_cents),
            currency: row.currency,
            medium: row.medium,
        }
    }
}

fn rate(scaled: i64) -> DbResult<ExchangeRate> {
    ExchangeRate::from_scaled(scaled).ok_or_else(|| DbError::corrupt("rate_scaled", scaled))
}

const ENTRY_COLUMNS: &str = "id, kind, invoice_number, status, created_at, actor, \
     session_id, customer_id, rate_scaled, is_credit, \
     subtotal_cents, tax_cents, igtf_cents, total_cents, paid_base_cents, change_owed_cents, \
     debt_created_cents, consumed_wallet_cents, applied_to_debt_cents, applied_to_wallet_cents, \
     resulting_debt_cents, resulting_wallet_cents, adjusted_quadrant, adjusted_amount_cents, \
     reason, void_reason, voided_by, voided_at, closed_session_id";

/// Loads the child rows and assembles the entry.
async fn hydrate(conn: &mut SqliteConnection, row: EntryRow) -> DbResult<JournalEntry> {
    let lines: Vec<LineRow> = sqlx::query_as(
        r#"
        SELECT product_id, name, quantity_milli, level, factor,
               unit_price_cents, tax_rate_bps, line_total_cents, tax_cents
        FROM journal_lines WHERE entry_id = ?1 ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let payments: Vec<PaymentRow> = sqlx::query_as(
        r#"
        SELECT amount_cents, currency, medium, rate_scaled, base_amount_cents, reference
        FROM journal_payments WHERE entry_id = ?1 ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let changes: Vec<ChangeRow> = sqlx::query_as(
        r#"
        SELECT amount_cents, currency, medium
        FROM journal_changes WHERE entry_id = ?1 ORDER BY position
        "#,
    )
    .bind(&row.id)
    .fetch_all(&mut *conn)
    .await?;

    let void = match (row.void_reason, row.voided_by, row.voided_at) {
        (Some(reason), Some(actor), Some(voided_at)) => Some(VoidInfo {
            reason,
            actor,
            voided_at,
        }),
        _ => None,
    };

    Ok(JournalEntry {
        id: row.id,
        kind: row.kind,
        invoice_number: row.invoice_number,
        status: row.status,
        created_at: row.created_at,
        actor: row.actor,
        session_id: row.session_id,
        customer_id: row.customer_id,
        rate: rate(row.rate_scaled)?,
        is_credit: row.is_credit,
        lines: lines
            .into_iter()
            .map(LineRow::into_line)
            .collect::<DbResult<Vec<_>>>()?,
        payments: payments
            .into_iter()
            .map(PaymentRow::into_payment)
            .collect::<DbResult<Vec<_>>>()?,
        changes: changes.into_iter().map(Change::from).collect(),
        subtotal: Money::from_cents(row.subtotal_cents),
        tax: Money::from_cents(row.tax_cents),
        igtf: Money::from_cents(row.igtf_cents),
        total: Money::from_cents(row.total_cents),
        paid_base: Money::from_cents(row.paid_base_cents),
        change_owed: Money::from_cents(row.change_owed_cents),
        debt_created: Money::from_cents(row.debt_created_cents),
        consumed_wallet: Money::from_cents(row.consumed_wallet_cents),
        applied_to_debt: Money::from_cents(row.applied_to_debt_cents),
        applied_to_wallet: Money::from_cents(row.applied_to_wallet_cents),
        resulting_debt: row.resulting_debt_cents.map(Money::from_cents),
        resulting_wallet: row.resulting_wallet_cents.map(Money::from_cents),
        adjusted_quadrant: row.adjusted_quadrant,
        adjusted_amount: Money::from_cents(row.adjusted_amount_cents),
        reason: row.reason,
        void,
        closed_session_id: row.closed_session_id,
    })
}

// =============================================================================
// Unit-level Operations
// =============================================================================

/// Appends an entry with its lines, payments and change.
pub async fn insert(conn: &mut SqliteConnection, entry: &JournalEntry) -> DbResult<()> {
    debug!(
        entry_id = %entry.id,
        invoice = %entry.invoice_number,
        kind = %entry.kind,
        "Inserting journal entry"
    );

    sqlx::query(
        r#"
        INSERT INTO journal_entries (
            id, kind, invoice_number, status, created_at, actor,
            session_id, customer_id, rate_scaled, is_credit,
            subtotal_cents, tax_cents, igtf_cents, total_cents, paid_base_cents, change_owed_cents,
            debt_created_cents, consumed_wallet_cents, applied_to_debt_cents, applied_to_wallet_cents,
            resulting_debt_cents, resulting_wallet_cents, adjusted_quadrant, adjusted_amount_cents,
            reason, closed_session_id
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15, ?16,
            ?17, ?18, ?19, ?20,
            ?21, ?22, ?23, ?24,
            ?25, ?26
        )
        "#,
    )
    .bind(&entry.id)
    .bind(entry.kind)
    .bind(&entry.invoice_number)
    .bind(entry.status)
    .bind(entry.created_at)
    .bind(&entry.actor)
    .bind(&entry.session_id)
    .bind(&entry.customer_id)
    .bind(entry.rate.scaled())
    .bind(entry.is_credit)
    .bind(entry.subtotal.cents())
    .bind(entry.tax.cents())
    .bind(entry.igtf.cents())
    .bind(entry.total.cents())
    .bind(entry.paid_base.cents())
    .bind(entry.change_owed.cents())
    .bind(entry.debt_created.cents())
    .bind(entry.consumed_wallet.cents())
    .bind(entry.applied_to_debt.cents())
    .bind(entry.applied_to_wallet.cents())
    .bind(entry.resulting_debt.map(|m| m.cents()))
    .bind(entry.resulting_wallet.map(|m| m.cents()))
    .bind(entry.adjusted_quadrant)
    .bind(entry.adjusted_amount.cents())
    .bind(&entry.reason)
    .bind(&entry.closed_session_id)
    .execute(&mut *conn)
    .await?;

    for (position, line) in entry.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO journal_lines (
                entry_id, position, product_id, name, quantity_milli, level, factor,
                unit_price_cents, tax_rate_bps, line_total_cents, tax_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&entry.id)
        .bind(position as i64)
        .bind(&line.product_id)
        .bind(&line.name)
        .bind(line.quantity.milli())
        .bind(line.level)
        .bind(line.factor as i64)
        .bind(line.unit_price.cents())
        .bind(line.tax_rate.bps() as i64)
        .bind(line.line_total.cents())
        .bind(line.tax.cents())
        .execute(&mut *conn)
        .await?;
    }

    for (position, payment) in entry.payments.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO journal_payments (
                entry_id, position, amount_cents, currency, medium,
                rate_scaled, base_amount_cents, reference
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(position as i64)
        .bind(payment.amount.cents())
        .bind(payment.currency)
        .bind(payment.medium)
        .bind(payment.rate.scaled())
        .bind(payment.base_amount.cents())
        .bind(&payment.reference)
        .execute(&mut *conn)
        .await?;
    }

    for (position, change) in entry.changes.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO journal_changes (entry_id, position, amount_cents, currency, medium)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&entry.id)
        .bind(position as i64)
        .bind(change.amount.cents())
        .bind(change.currency)
        .bind(change.medium)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Reads one entry inside the caller's unit.
pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<JournalEntry>> {
    let row: Option<EntryRow> = sqlx::query_as(&format!(
        "SELECT {} FROM journal_entries WHERE id = ?1",
        ENTRY_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Ok(Some(hydrate(conn, row).await?)),
        None => Ok(None),
    }
}

/// Flips a completed entry to void.
///
/// `session_id` is the drawer the refund went through, if any; the Z-report
/// of that session counts the void.
pub async fn mark_void(
    conn: &mut SqliteConnection,
    id: &str,
    void: &VoidInfo,
    session_id: Option<&str>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE journal_entries SET
            status = 'void',
            void_reason = ?2,
            voided_by = ?3,
            voided_at = ?4,
            voided_in_session = ?5
        WHERE id = ?1 AND status = 'completed'
        "#,
    )
    .bind(id)
    .bind(&void.reason)
    .bind(&void.actor)
    .bind(void.voided_at)
    .bind(session_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Journal entry (completed)", id));
    }

    Ok(())
}

/// Links every entry recorded in `session_id` to its Z-report.
///
/// Returns the linked ids in recording order.
pub async fn link_to_closed(
    conn: &mut SqliteConnection,
    session_id: &str,
    closed_id: &str,
) -> DbResult<Vec<String>> {
    sqlx::query("UPDATE journal_entries SET closed_session_id = ?2 WHERE session_id = ?1")
        .bind(session_id)
        .bind(closed_id)
        .execute(&mut *conn)
        .await?;

    let ids: Vec<String> = sqlx::query_scalar(
        "SELECT id FROM journal_entries WHERE closed_session_id = ?1 ORDER BY created_at, rowid",
    )
    .bind(closed_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for journal reads.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pool: SqlitePool,
}

impl JournalRepository {
    /// Creates a new JournalRepository.
    pub fn new(pool: SqlitePool) -> Self {
        JournalRepository { pool }
    }

    /// Gets an entry by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// Gets an entry by invoice number.
    pub async fn get_by_invoice(&self, invoice_number: &str) -> DbResult<Option<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM journal_entries WHERE invoice_number = ?1",
            ENTRY_COLUMNS
        ))
        .bind(invoice_number)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(Some(hydrate(&mut conn, row).await?)),
            None => Ok(None),
        }
    }

    /// Most recent entries, newest first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM journal_entries ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            ENTRY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(hydrate(&mut conn, row).await?);
        }
        Ok(entries)
    }

    /// A customer's statement, newest first.
    pub async fn for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<JournalEntry>> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {} FROM journal_entries WHERE customer_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            ENTRY_COLUMNS
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(hydrate(&mut conn, row).await?);
        }
        Ok(entries)
    }

    /// Number of entries in the journal.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM journal_entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
