//! # Cash Session Repository
//!
//! Storage for the singleton open drawer, its withdrawals and the Z-report
//! history.
//!
//! ## Table Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   cash_session (0 or 1 row, UNIQUE singleton = 1)                      │
//! │        │                                                                │
//! │        │ insert_session()        open                                   │
//! │        │ store_balances()        every flow / withdrawal                │
//! │        │ delete_session()        close                                  │
//! │        ▼                                                                │
//! │   closed_sessions (append-only)  insert_closed()                        │
//! │                                                                         │
//! │   cash_movements                 insert_movement() per withdrawal       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lifecycle rules (already open, register closed) live in the engines; this
//! module only reads and writes rows.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{
    Balances, CashMovement, CashSession, ClosedSession, Money, Quadrant, SessionState,
    SessionTotals,
};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    opened_at: DateTime<Utc>,
    opened_by: String,
    opening_usd_cash: i64,
    opening_ves_cash: i64,
    opening_usd_digital: i64,
    opening_ves_digital: i64,
    usd_cash: i64,
    ves_cash: i64,
    usd_digital: i64,
    ves_digital: i64,
}

fn balances(usd_cash: i64, ves_cash: i64, usd_digital: i64, ves_digital: i64) -> Balances {
    Balances {
        usd_cash: Money::from_cents(usd_cash),
        ves_cash: Money::from_cents(ves_cash),
        usd_digital: Money::from_cents(usd_digital),
        ves_digital: Money::from_cents(ves_digital),
    }
}

impl From<SessionRow> for CashSession {
    fn from(row: SessionRow) -> Self {
        CashSession {
            id: row.id,
            opened_at: row.opened_at,
            opened_by: row.opened_by,
            opening: balances(
                row.opening_usd_cash,
                row.opening_ves_cash,
                row.opening_usd_digital,
                row.opening_ves_digital,
            ),
            balances: balances(row.usd_cash, row.ves_cash, row.usd_digital, row.ves_digital),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ClosedRow {
    id: String,
    session_id: String,
    opened_at: DateTime<Utc>,
    opened_by: String,
    closed_at: DateTime<Utc>,
    closed_by: String,
    opening_usd_cash: i64,
    opening_ves_cash: i64,
    opening_usd_digital: i64,
    opening_ves_digital: i64,
    final_usd_cash: i64,
    final_ves_cash: i64,
    final_usd_digital: i64,
    final_ves_digital: i64,
    sales_count: i64,
    void_count: i64,
    debt_payments_count: i64,
    gross_sales_cents: i64,
    withdrawn_usd_cash: i64,
    withdrawn_ves_cash: i64,
    withdrawn_usd_digital: i64,
    withdrawn_ves_digital: i64,
    extras: String,
}

impl ClosedRow {
    fn into_closed(self, entry_ids: Vec<String>) -> DbResult<ClosedSession> {
        let extras = serde_json::from_str(&self.extras)?;
        Ok(ClosedSession {
            id: self.id,
            session_id: self.session_id,
            opened_at: self.opened_at,
            opened_by: self.opened_by,
            closed_at: self.closed_at,
            closed_by: self.closed_by,
            opening: balances(
                self.opening_usd_cash,
                self.opening_ves_cash,
                self.opening_usd_digital,
                self.opening_ves_digital,
            ),
            final_balances: balances(
                self.final_usd_cash,
                self.final_ves_cash,
                self.final_usd_digital,
                self.final_ves_digital,
            ),
            totals: SessionTotals {
                sales_count: self.sales_count,
                void_count: self.void_count,
                debt_payments_count: self.debt_payments_count,
                gross_sales: Money::from_cents(self.gross_sales_cents),
                withdrawals: balances(
                    self.withdrawn_usd_cash,
                    self.withdrawn_ves_cash,
                    self.withdrawn_usd_digital,
                    self.withdrawn_ves_digital,
                ),
            },
            extras,
            entry_ids,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: String,
    session_id: String,
    quadrant: Quadrant,
    amount_cents: i64,
    reason: String,
    created_at: DateTime<Utc>,
}

impl From<MovementRow> for CashMovement {
    fn from(row: MovementRow) -> Self {
        CashMovement {
            id: row.id,
            session_id: row.session_id,
            quadrant: row.quadrant,
            amount: Money::from_cents(row.amount_cents),
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

const SESSION_COLUMNS: &str = "id, opened_at, opened_by, \
     opening_usd_cash, opening_ves_cash, opening_usd_digital, opening_ves_digital, \
     usd_cash, ves_cash, usd_digital, ves_digital";

const CLOSED_COLUMNS: &str = "id, session_id, opened_at, opened_by, closed_at, closed_by, \
     opening_usd_cash, opening_ves_cash, opening_usd_digital, opening_ves_digital, \
     final_usd_cash, final_ves_cash, final_usd_digital, final_ves_digital, \
     sales_count, void_count, debt_payments_count, gross_sales_cents, \
     withdrawn_usd_cash, withdrawn_ves_cash, withdrawn_usd_digital, withdrawn_ves_digital, \
     extras";

// =============================================================================
// Unit-level Operations
// =============================================================================

/// Reads the open session inside the caller's unit.
pub async fn current_in(conn: &mut SqliteConnection) -> DbResult<Option<CashSession>> {
    let row: Option<SessionRow> = sqlx::query_as(&format!(
        "SELECT {} FROM cash_session WHERE singleton = 1",
        SESSION_COLUMNS
    ))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(CashSession::from))
}

/// Inserts the singleton row. Fails with `UniqueViolation` if one exists.
pub async fn insert_session(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cash_session (
            id, singleton, opened_at, opened_by,
            opening_usd_cash, opening_ves_cash, opening_usd_digital, opening_ves_digital,
            usd_cash, ves_cash, usd_digital, ves_digital
        ) VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&session.id)
    .bind(session.opened_at)
    .bind(&session.opened_by)
    .bind(session.opening.usd_cash.cents())
    .bind(session.opening.ves_cash.cents())
    .bind(session.opening.usd_digital.cents())
    .bind(session.opening.ves_digital.cents())
    .bind(session.balances.usd_cash.cents())
    .bind(session.balances.ves_cash.cents())
    .bind(session.balances.usd_digital.cents())
    .bind(session.balances.ves_digital.cents())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Overwrites the live balances of the open session.
pub async fn store_balances(
    conn: &mut SqliteConnection,
    session_id: &str,
    balances: &Balances,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE cash_session SET
            usd_cash = ?2, ves_cash = ?3, usd_digital = ?4, ves_digital = ?5
        WHERE id = ?1
        "#,
    )
    .bind(session_id)
    .bind(balances.usd_cash.cents())
    .bind(balances.ves_cash.cents())
    .bind(balances.usd_digital.cents())
    .bind(balances.ves_digital.cents())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Cash session", session_id));
    }

    debug!(
        session_id = %session_id,
        usd_cash = %balances.usd_cash,
        ves_cash = %balances.ves_cash,
        usd_digital = %balances.usd_digital,
        ves_digital = %balances.ves_digital,
        "Drawer balances stored"
    );
    Ok(())
}

/// Logs a withdrawal.
pub async fn insert_movement(conn: &mut SqliteConnection, movement: &CashMovement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cash_movements (id, session_id, quadrant, amount_cents, reason, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.session_id)
    .bind(movement.quadrant)
    .bind(movement.amount.cents())
    .bind(&movement.reason)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Aggregates the journal and withdrawals of a session for its Z-report.
pub async fn session_totals(conn: &mut SqliteConnection, session_id: &str) -> DbResult<SessionTotals> {
    let (sales_count, gross_sales): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(total_cents), 0)
        FROM journal_entries
        WHERE session_id = ?1 AND kind = 'sale' AND status = 'completed'
        "#,
    )
    .bind(session_id)
    .fetch_one(&mut *conn)
    .await?;

    let debt_payments_count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM journal_entries
        WHERE session_id = ?1 AND kind = 'debt_payment' AND status = 'completed'
        "#,
    )
    .bind(session_id)
    .fetch_one(&mut *conn)
    .await?;

    let void_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM journal_entries WHERE voided_in_session = ?1")
            .bind(session_id)
            .fetch_one(&mut *conn)
            .await?;

    let withdrawn: Vec<(Quadrant, i64)> = sqlx::query_as(
        r#"
        SELECT quadrant, SUM(amount_cents)
        FROM cash_movements
        WHERE session_id = ?1
        GROUP BY quadrant
        "#,
    )
    .bind(session_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut withdrawals = Balances::default();
    for (quadrant, cents) in withdrawn {
        *withdrawals.get_mut(quadrant) = Money::from_cents(cents);
    }

    Ok(SessionTotals {
        sales_count,
        void_count,
        debt_payments_count,
        gross_sales: Money::from_cents(gross_sales),
        withdrawals,
    })
}

/// Appends a Z-report.
pub async fn insert_closed(conn: &mut SqliteConnection, closed: &ClosedSession) -> DbResult<()> {
    let extras = serde_json::to_string(&closed.extras)?;

    sqlx::query(
        r#"
        INSERT INTO closed_sessions (
            id, session_id, opened_at, opened_by, closed_at, closed_by,
            opening_usd_cash, opening_ves_cash, opening_usd_digital, opening_ves_digital,
            final_usd_cash, final_ves_cash, final_usd_digital, final_ves_digital,
            sales_count, void_count, debt_payments_count, gross_sales_cents,
            withdrawn_usd_cash, withdrawn_ves_cash, withdrawn_usd_digital, withdrawn_ves_digital,
            extras
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18,
            ?19, ?20, ?21, ?22,
            ?23
        )
        "#,
    )
    .bind(&closed.id)
    .bind(&closed.session_id)
    .bind(closed.opened_at)
    .bind(&closed.opened_by)
    .bind(closed.closed_at)
    .bind(&closed.closed_by)
    .bind(closed.opening.usd_cash.cents())
    .bind(closed.opening.ves_cash.cents())
    .bind(closed.opening.usd_digital.cents())
    .bind(closed.opening.ves_digital.cents())
    .bind(closed.final_balances.usd_cash.cents())
    .bind(closed.final_balances.ves_cash.cents())
    .bind(closed.final_balances.usd_digital.cents())
    .bind(closed.final_balances.ves_digital.cents())
    .bind(closed.totals.sales_count)
    .bind(closed.totals.void_count)
    .bind(closed.totals.debt_payments_count)
    .bind(closed.totals.gross_sales.cents())
    .bind(closed.totals.withdrawals.usd_cash.cents())
    .bind(closed.totals.withdrawals.ves_cash.cents())
    .bind(closed.totals.withdrawals.usd_digital.cents())
    .bind(closed.totals.withdrawals.ves_digital.cents())
    .bind(extras)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Deletes the singleton row. Returns false if there was none.
pub async fn delete_session(conn: &mut SqliteConnection, session_id: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM cash_session WHERE id = ?1")
        .bind(session_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

async fn closed_entry_ids(conn: &mut SqliteConnection, closed_id: &str) -> DbResult<Vec<String>> {
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

/// Repository for drawer reads and Z-report history.
#[derive(Debug, Clone)]
pub struct CashSessionRepository {
    pool: SqlitePool,
}

impl CashSessionRepository {
    /// Creates a new CashSessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CashSessionRepository { pool }
    }

    /// Current drawer state.
    pub async fn state(&self) -> DbResult<SessionState> {
        let mut conn = self.pool.acquire().await?;
        Ok(match current_in(&mut conn).await? {
            Some(session) => SessionState::Open(session),
            None => SessionState::Closed,
        })
    }

    /// Closed sessions, newest first.
    pub async fn history(&self, limit: u32) -> DbResult<Vec<ClosedSession>> {
        let mut conn = self.pool.acquire().await?;
        let rows: Vec<ClosedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM closed_sessions ORDER BY closed_at DESC, rowid DESC LIMIT ?1",
            CLOSED_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            let entry_ids = closed_entry_ids(&mut conn, &row.id).await?;
            history.push(row.into_closed(entry_ids)?);
        }
        Ok(history)
    }

    /// One Z-report by id.
    pub async fn get_closed(&self, id: &str) -> DbResult<Option<ClosedSession>> {
        let mut conn = self.pool.acquire().await?;
        let row: Option<ClosedRow> = sqlx::query_as(&format!(
            "SELECT {} FROM closed_sessions WHERE id = ?1",
            CLOSED_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => {
                let entry_ids = closed_entry_ids(&mut conn, &row.id).await?;
                Ok(Some(row.into_closed(entry_ids)?))
            }
            None => Ok(None),
        }
    }

    /// How many Z-reports exist.
    pub async fn closed_count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM closed_sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Withdrawals of one session, oldest first.
    pub async fn movements(&self, session_id: &str) -> DbResult<Vec<CashMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, quadrant, amount_cents, reason, created_at
            FROM cash_movements
            WHERE session_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CashMovement::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
