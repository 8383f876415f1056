//! # Cash Session Engine
//!
//! Lifecycle of the drawer singleton.
//!
//! ```text
//!            open(float, actor)
//!   Closed ────────────────────► Open ──┐ apply_flow / withdraw
//!     ▲                           │  ◄──┘
//!     └─────── close(extras) ─────┘
//!              Z-report appended, session row deleted
//! ```
//!
//! `close` runs under `BEGIN IMMEDIATE`: concurrent closers queue on the
//! write lock, the first one deletes the session and every later one reads
//! no session and gets `AlreadyClosed`.

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::events::LedgerEvent;
use super::{logged, Ledger};
use crate::error::LedgerResult;
use crate::repository::{cash_session, journal};
use till_core::drawer;
use till_core::validation::{validate_actor, validate_positive_amount, validate_reason};
use till_core::{
    Balances, CashMovement, CashSession, Change, ClosedSession, Currency, FlowKind, Medium,
    OpeningFloat, Payment, Quadrant, SessionState, StateConflict, ValidationError,
};

impl Ledger {
    /// Current drawer state.
    pub async fn session_state(&self) -> LedgerResult<SessionState> {
        Ok(self.db.sessions().state().await?)
    }

    /// Opens the drawer with an opening float.
    ///
    /// ## Errors
    /// - `Conflict(AlreadyOpen)` if a session is already open
    /// - `Validation` for a negative or non-finite float
    pub async fn open_session(
        &self,
        opening: OpeningFloat,
        actor: &str,
    ) -> LedgerResult<CashSession> {
        logged("open_session", self.open_session_unit(opening, actor).await)
    }

    async fn open_session_unit(
        &self,
        opening: OpeningFloat,
        actor: &str,
    ) -> LedgerResult<CashSession> {
        let actor = validate_actor(actor)?;
        let opening = opening.into_balances()?;

        let mut unit = self.db.begin_unit().await?;
        if let Some(current) = cash_session::current_in(&mut unit).await? {
            return Err(StateConflict::AlreadyOpen {
                session_id: current.id,
            }
            .into());
        }

        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            opened_at: Utc::now(),
            opened_by: actor,
            opening,
            balances: opening,
        };
        cash_session::insert_session(&mut unit, &session).await?;
        unit.commit().await?;

        info!(session_id = %session.id, opened_by = %session.opened_by, "Cash session opened");
        self.publish(LedgerEvent::SessionOpened {
            session_id: session.id.clone(),
            opened_by: session.opened_by.clone(),
            opening,
        });

        Ok(session)
    }

    /// Applies a drawer flow on its own.
    ///
    /// `Sale` adds payments and subtracts change; `Refund` inverts both.
    /// Returns the new balances.
    pub async fn apply_flow(
        &self,
        kind: FlowKind,
        payments: &[Payment],
        changes: &[Change],
    ) -> LedgerResult<Balances> {
        logged(
            "apply_flow",
            self.apply_flow_unit(kind, payments, changes).await,
        )
    }

    async fn apply_flow_unit(
        &self,
        kind: FlowKind,
        payments: &[Payment],
        changes: &[Change],
    ) -> LedgerResult<Balances> {
        let mut unit = self.db.begin_unit().await?;
        let session = self.apply_flow_in(&mut unit, kind, payments, changes).await?;
        unit.commit().await?;
        Ok(session.balances)
    }

    /// Drawer flow inside the caller's unit. Returns the session as updated.
    pub(crate) async fn apply_flow_in(
        &self,
        conn: &mut SqliteConnection,
        kind: FlowKind,
        payments: &[Payment],
        changes: &[Change],
    ) -> LedgerResult<CashSession> {
        let mut session = cash_session::current_in(conn)
            .await?
            .ok_or(StateConflict::RegisterClosed)?;

        let balances = drawer::apply_flow(
            &session.balances,
            kind,
            payments,
            changes,
            self.policy.allow_negative_cash,
        )?;
        cash_session::store_balances(conn, &session.id, &balances).await?;

        session.balances = balances;
        Ok(session)
    }

    /// Takes money out of one drawer quadrant.
    ///
    /// Cash quadrants are floored at zero; the movement records what was
    /// actually removed.
    ///
    /// ## Errors
    /// - `Validation(InvalidAmount)` when `amount` ≤ 0
    /// - `Validation(NotADrawerMedium)` for wallet or credit
    /// - `Validation(MissingReason)` for a blank reason
    /// - `Conflict(RegisterClosed)` with no open session
    pub async fn withdraw(
        &self,
        amount: f64,
        currency: Currency,
        medium: Medium,
        reason: &str,
    ) -> LedgerResult<CashMovement> {
        logged(
            "withdraw",
            self.withdraw_unit(amount, currency, medium, reason).await,
        )
    }

    async fn withdraw_unit(
        &self,
        amount: f64,
        currency: Currency,
        medium: Medium,
        reason: &str,
    ) -> LedgerResult<CashMovement> {
        let amount = validate_positive_amount("amount", amount)?;
        let quadrant = Quadrant::for_tender(currency, medium)
            .ok_or(ValidationError::NotADrawerMedium { medium })?;
        let reason = validate_reason(reason)?;

        let mut unit = self.db.begin_unit().await?;
        let session = cash_session::current_in(&mut unit)
            .await?
            .ok_or(StateConflict::RegisterClosed)?;

        let (balances, removed) = drawer::withdraw(&session.balances, quadrant, amount);
        cash_session::store_balances(&mut unit, &session.id, &balances).await?;

        let movement = CashMovement {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            quadrant,
            amount: removed,
            reason,
            created_at: Utc::now(),
        };
        cash_session::insert_movement(&mut unit, &movement).await?;
        unit.commit().await?;

        if removed < amount {
            warn!(
                %quadrant,
                requested = %amount,
                removed = %removed,
                "Withdrawal floored at the cash available"
            );
        }
        info!(session_id = %session.id, %quadrant, amount = %removed, "Cash withdrawn");

        Ok(movement)
    }

    /// Closes the drawer and appends its Z-report.
    ///
    /// `extras` are caller aggregates merged into the report as-is.
    ///
    /// ## Errors
    /// `Conflict(AlreadyClosed)` when no session is open, including every
    /// caller that lost a concurrent close.
    pub async fn close_session(
        &self,
        actor: &str,
        extras: Map<String, Value>,
    ) -> LedgerResult<ClosedSession> {
        logged("close_session", self.close_session_unit(actor, extras).await)
    }

    async fn close_session_unit(
        &self,
        actor: &str,
        extras: Map<String, Value>,
    ) -> LedgerResult<ClosedSession> {
        let actor = validate_actor(actor)?;

        let mut unit = self.db.begin_unit().await?;
        let session = cash_session::current_in(&mut unit)
            .await?
            .ok_or(StateConflict::AlreadyClosed)?;

        let totals = cash_session::session_totals(&mut unit, &session.id).await?;
        let closed_id = Uuid::new_v4().to_string();
        let entry_ids = journal::link_to_closed(&mut unit, &session.id, &closed_id).await?;

        let closed = ClosedSession {
            id: closed_id,
            session_id: session.id.clone(),
            opened_at: session.opened_at,
            opened_by: session.opened_by,
            closed_at: Utc::now(),
            closed_by: actor,
            opening: session.opening,
            final_balances: session.balances,
            totals,
            extras: Value::Object(extras),
            entry_ids,
        };
        cash_session::insert_closed(&mut unit, &closed).await?;

        if !cash_session::delete_session(&mut unit, &session.id).await? {
            return Err(StateConflict::AlreadyClosed.into());
        }
        unit.commit().await?;

        info!(
            closed_id = %closed.id,
            session_id = %closed.session_id,
            sales = closed.totals.sales_count,
            gross = %closed.totals.gross_sales,
            "Cash session closed"
        );
        self.publish(LedgerEvent::SessionClosed {
            closed_id: closed.id.clone(),
            session_id: closed.session_id.clone(),
            final_balances: closed.final_balances,
            sales_count: closed.totals.sales_count,
            gross_sales: closed.totals.gross_sales,
        });

        Ok(closed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
