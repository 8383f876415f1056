//! # Customer Repository
//!
//! Debt / wallet quadrants per customer.
//!
//! Every write goes through [`AccountPosition`], which normalizes before the
//! row is stored. The table's `CHECK (debt_cents = 0 OR wallet_cents = 0)`
//! rejects anything that slipped past.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::account::AccountEffects;
use till_core::{AccountPosition, ChangeSplit, Customer, CustomerQuadrant, Money};

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: String,
    name: String,
    debt_cents: i64,
    wallet_cents: i64,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: row.id,
            name: row.name,
            debt: Money::from_cents(row.debt_cents),
            wallet: Money::from_cents(row.wallet_cents),
        }
    }
}

// =============================================================================
// Unit-level Operations
// =============================================================================

/// Reads a customer inside the caller's unit.
pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let row: Option<CustomerRow> = sqlx::query_as(
        "SELECT id, name, debt_cents, wallet_cents FROM customers WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Customer::from))
}

async fn position_in(conn: &mut SqliteConnection, id: &str) -> DbResult<AccountPosition> {
    get_in(conn, id)
        .await?
        .map(|customer| AccountPosition::from(&customer))
        .ok_or_else(|| DbError::not_found("Customer", id))
}

async fn store_position(
    conn: &mut SqliteConnection,
    id: &str,
    position: AccountPosition,
) -> DbResult<()> {
    let position = position.normalized();
    let result = sqlx::query(
        "UPDATE customers SET debt_cents = ?2, wallet_cents = ?3, updated_at = ?4 WHERE id = ?1",
    )
    .bind(id)
    .bind(position.debt.cents())
    .bind(position.wallet.cents())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", id));
    }

    debug!(
        customer_id = %id,
        debt = %position.debt,
        wallet = %position.wallet,
        "Customer position stored"
    );
    Ok(())
}

/// `debt += debt_delta − payment_toward_debt`, `wallet −= wallet_consumed`,
/// then normalize.
pub async fn apply_charge_and_payment(
    conn: &mut SqliteConnection,
    id: &str,
    debt_delta: Money,
    payment_toward_debt: Money,
    wallet_consumed: Money,
) -> DbResult<AccountPosition> {
    let after = position_in(conn, id).await?.apply_charge_and_payment(
        debt_delta,
        payment_toward_debt,
        wallet_consumed,
    );
    store_position(conn, id, after).await?;
    Ok(after)
}

/// Absorbs change that was not handed back. Debt first, then wallet.
///
/// The returned split must be frozen on the journal entry.
pub async fn apply_change(
    conn: &mut SqliteConnection,
    id: &str,
    amount: Money,
) -> DbResult<(AccountPosition, ChangeSplit)> {
    let (after, split) = position_in(conn, id).await?.apply_change(amount);
    store_position(conn, id, after).await?;
    Ok((after, split))
}

/// Sets one quadrant to zero. Returns the new position and the amount cleared.
pub async fn zero(
    conn: &mut SqliteConnection,
    id: &str,
    which: CustomerQuadrant,
) -> DbResult<(AccountPosition, Money)> {
    let (after, cleared) = position_in(conn, id).await?.zero(which);
    store_position(conn, id, after).await?;
    Ok((after, cleared))
}

/// Undoes the account effects of a journal entry.
pub async fn reverse(
    conn: &mut SqliteConnection,
    id: &str,
    effects: &AccountEffects,
) -> DbResult<AccountPosition> {
    let after = position_in(conn, id).await?.reverse(effects);
    store_position(conn, id, after).await?;
    Ok(after)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for customer accounts.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a customer. Debt and wallet are normalized first.
    pub async fn insert(&self, customer: &Customer) -> DbResult<Customer> {
        let position = AccountPosition::from(customer);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, debt_cents, wallet_cents, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(position.debt.cents())
        .bind(position.wallet.cents())
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(customer_id = %customer.id, "Customer created");

        Ok(Customer {
            debt: position.debt,
            wallet: position.wallet,
            ..customer.clone()
        })
    }

    /// Gets a customer by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// Lists customers sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            "SELECT id, name, debt_cents, wallet_cents FROM customers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }

    /// Customers that owe money, largest debt first.
    pub async fn debtors(&self) -> DbResult<Vec<Customer>> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            "SELECT id, name, debt_cents, wallet_cents FROM customers \
             WHERE debt_cents > 0 ORDER BY debt_cents DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Customer::from).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn customer(debt: i64, wallet: i64) -> Customer {
        Customer {
            id: "c1".to_string(),
            name: "Luis".to_string(),
            debt: Money::from_cents(debt),
            wallet: Money::from_cents(wallet),
        }
    }

    #[tokio::test]
    async fn test_insert_normalizes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stored = db.customers().insert(&customer(1_000, 300)).await.unwrap();
        assert_eq!(stored.debt, Money::from_cents(700));
        assert_eq!(stored.wallet, Money::zero());
    }

    #[tokio::test]
    async fn test_change_pays_debt_then_wallet() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().insert(&customer(1_000, 0)).await.unwrap();

        let mut unit = db.begin_unit().await.unwrap();
        let (after, split) = apply_change(&mut unit, "c1", Money::from_cents(1_500))
            .await
            .unwrap();
        unit.commit().await.unwrap();

        assert_eq!(split.applied_to_debt, Money::from_cents(1_000));
        assert_eq!(split.applied_to_wallet, Money::from_cents(500));
        assert_eq!(after.debt, Money::zero());

        let stored = db.customers().get("c1").await.unwrap().unwrap();
        assert_eq!(stored.wallet, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_charge_nets_against_wallet() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().insert(&customer(0, 400)).await.unwrap();

        let mut unit = db.begin_unit().await.unwrap();
        let after = apply_charge_and_payment(
            &mut unit,
            "c1",
            Money::from_cents(1_000),
            Money::zero(),
            Money::zero(),
        )
        .await
        .unwrap();
        unit.commit().await.unwrap();

        assert_eq!(after.debt, Money::from_cents(600));
        assert_eq!(after.wallet, Money::zero());
    }

    #[tokio::test]
    async fn test_zero_and_missing_customer() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.customers().insert(&customer(0, 250)).await.unwrap();

        let mut unit = db.begin_unit().await.unwrap();
        let (after, cleared) = zero(&mut unit, "c1", CustomerQuadrant::Wallet).await.unwrap();
        assert_eq!(cleared, Money::from_cents(250));
        assert_eq!(after.wallet, Money::zero());

        let err = zero(&mut unit, "nobody", CustomerQuadrant::Debt).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
