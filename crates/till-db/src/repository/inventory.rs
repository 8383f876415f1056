//! # Inventory Repository
//!
//! Products as the ledger sees them, stock mutations and the kardex.
//!
//! ## Stock Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Stock Mutations                                 │
//! │                                                                         │
//! │  sale commit ──► decrement_stock() ──┐                                 │
//! │  void        ──► restore_stock()  ───┼──► UPDATE products.stock_milli   │
//! │  remote delta ─► apply_delta()    ───┘    INSERT stock_movements        │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                              pending_movements() ──► replication agent  │
//! │                              mark_exported(ids)  ◄── ack                │
//! │                                                                         │
//! │  Remote movements are recorded for the kardex but never exported back. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::sale::Catalog;
use till_core::{Money, PackLevel, Product, Quantity, UnitKind};

// =============================================================================
// Types
// =============================================================================

/// Why a stock movement happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    /// Stock left with a sale.
    Sale,
    /// Stock came back with a void.
    Void,
    /// Delta replayed from another terminal.
    Remote,
}

/// One kardex row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub kind: MovementKind,
    /// Signed: negative leaves the shelf.
    pub quantity: Quantity,
    pub stock_after: Quantity,
    /// Journal entry id, or the remote origin.
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub exported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    price_cents: i64,
    stock_milli: i64,
    unit_kind: UnitKind,
    pack_contents: Option<i64>,
    pack_price_cents: Option<i64>,
    case_contents: Option<i64>,
    case_price_cents: Option<i64>,
}

impl ProductRow {
    fn into_product(self) -> DbResult<Product> {
        let pack = pack_level("pack_contents", self.pack_contents, self.pack_price_cents)?;
        let case = pack_level("case_contents", self.case_contents, self.case_price_cents)?;
        Ok(Product {
            id: self.id,
            name: self.name,
            price: Money::from_cents(self.price_cents),
            stock: Quantity::from_milli(self.stock_milli),
            unit_kind: self.unit_kind,
            pack,
            case,
        })
    }
}

fn pack_level(
    column: &str,
    contents: Option<i64>,
    price_cents: Option<i64>,
) -> DbResult<Option<PackLevel>> {
    match contents {
        None => Ok(None),
        Some(contents) => {
            let contents = u32::try_from(contents).map_err(|_| DbError::corrupt(column, contents))?;
            Ok(Some(PackLevel {
                contents,
                price: Money::from_cents(price_cents.unwrap_or(0)),
            }))
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MovementRow {
    id: String,
    product_id: String,
    kind: MovementKind,
    quantity_milli: i64,
    stock_after_milli: i64,
    reference: Option<String>,
    created_at: DateTime<Utc>,
    exported_at: Option<DateTime<Utc>>,
}

impl From<MovementRow> for StockMovement {
    fn from(row: MovementRow) -> Self {
        StockMovement {
            id: row.id,
            product_id: row.product_id,
            kind: row.kind,
            quantity: Quantity::from_milli(row.quantity_milli),
            stock_after: Quantity::from_milli(row.stock_after_milli),
            reference: row.reference,
            created_at: row.created_at,
            exported_at: row.exported_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, price_cents, stock_milli, unit_kind, \
     pack_contents, pack_price_cents, case_contents, case_price_cents";

const MOVEMENT_COLUMNS: &str = "id, product_id, kind, quantity_milli, stock_after_milli, \
     reference, created_at, exported_at";

// =============================================================================
// Unit-level Operations
// =============================================================================

/// Reads one product inside the caller's unit.
pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let row: Option<ProductRow> =
        sqlx::query_as(&format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    row.map(ProductRow::into_product).transpose()
}

/// Reads every product in `ids` inside the caller's unit.
///
/// Missing ids are simply absent from the returned catalog.
pub async fn load_catalog(conn: &mut SqliteConnection, ids: &[&str]) -> DbResult<Catalog> {
    let mut catalog = Catalog::new();
    for &id in ids {
        if catalog.contains_key(id) {
            continue;
        }
        if let Some(product) = get_in(conn, id).await? {
            catalog.insert(product.id.clone(), product);
        }
    }
    Ok(catalog)
}

/// Takes `quantity` base units off the shelf for a sale.
pub async fn decrement_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: Quantity,
    reference: &str,
) -> DbResult<Quantity> {
    apply_delta(conn, product_id, -quantity, MovementKind::Sale, Some(reference)).await
}

/// Puts `quantity` base units back on the shelf for a void.
pub async fn restore_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    quantity: Quantity,
    reference: &str,
) -> DbResult<Quantity> {
    apply_delta(conn, product_id, quantity, MovementKind::Void, Some(reference)).await
}

/// Adds a signed delta to a product's stock and writes the kardex row.
///
/// Returns the stock after the change. Guards are the caller's job.
pub async fn apply_delta(
    conn: &mut SqliteConnection,
    product_id: &str,
    delta: Quantity,
    kind: MovementKind,
    reference: Option<&str>,
) -> DbResult<Quantity> {
    let now = Utc::now();

    let stock_after: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE products SET
            stock_milli = stock_milli + ?2,
            updated_at = ?3
        WHERE id = ?1
        RETURNING stock_milli
        "#,
    )
    .bind(product_id)
    .bind(delta.milli())
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    let stock_after = stock_after.ok_or_else(|| DbError::not_found("Product", product_id))?;

    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, kind, quantity_milli, stock_after_milli,
            reference, created_at, exported_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(product_id)
    .bind(kind)
    .bind(delta.milli())
    .bind(stock_after)
    .bind(reference)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    debug!(
        product_id = %product_id,
        delta = %delta,
        stock_after = %Quantity::from_milli(stock_after),
        ?kind,
        "Stock updated"
    );

    Ok(Quantity::from_milli(stock_after))
}

/// Inserts or replaces one product row.
pub async fn upsert_in(conn: &mut SqliteConnection, product: &Product) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO products (
            id, name, price_cents, stock_milli, unit_kind,
            pack_contents, pack_price_cents, case_contents, case_price_cents,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            price_cents = excluded.price_cents,
            stock_milli = excluded.stock_milli,
            unit_kind = excluded.unit_kind,
            pack_contents = excluded.pack_contents,
            pack_price_cents = excluded.pack_price_cents,
            case_contents = excluded.case_contents,
            case_price_cents = excluded.case_price_cents,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.price.cents())
    .bind(product.stock.milli())
    .bind(product.unit_kind)
    .bind(product.pack.map(|p| p.contents as i64))
    .bind(product.pack.map(|p| p.price.cents()))
    .bind(product.case.map(|c| c.contents as i64))
    .bind(product.case.map(|c| c.price.cents()))
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product and kardex reads.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// repo.upsert_snapshot(&products).await?;
/// let pending = repo.pending_movements(100).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// Lists all products sorted by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let rows: Vec<ProductRow> =
            sqlx::query_as(&format!("SELECT {} FROM products ORDER BY name", PRODUCT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(ProductRow::into_product).collect()
    }

    /// Loads a product snapshot from the replication collaborator.
    ///
    /// All rows land in one transaction; returns how many were written.
    pub async fn upsert_snapshot(&self, products: &[Product]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;
        for product in products {
            upsert_in(&mut tx, product).await?;
        }
        tx.commit().await?;

        debug!(count = products.len(), "Product snapshot loaded");
        Ok(products.len())
    }

    /// Kardex for one product, newest first.
    pub async fn movements_for(&self, product_id: &str, limit: u32) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stock_movements WHERE product_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Local movements not yet handed to the replication agent, oldest first.
    pub async fn pending_movements(&self, limit: u32) -> DbResult<Vec<StockMovement>> {
        let rows: Vec<MovementRow> = sqlx::query_as(&format!(
            "SELECT {} FROM stock_movements \
             WHERE exported_at IS NULL AND kind != 'remote' \
             ORDER BY created_at, rowid LIMIT ?1",
            MOVEMENT_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StockMovement::from).collect())
    }

    /// Marks movements as exported. Returns how many rows changed.
    pub async fn mark_exported(&self, ids: &[String]) -> DbResult<u64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut affected = 0;
        for id in ids {
            let result = sqlx::query(
                "UPDATE stock_movements SET exported_at = ?2 WHERE id = ?1 AND exported_at IS NULL",
            )
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            affected += result.rows_affected();
        }
        tx.commit().await?;

        debug!(count = affected, "Stock movements marked exported");
        Ok(affected)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
