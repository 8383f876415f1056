//! # Domain Types
//!
//! Core domain types for the ledger.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Ledger Types                                  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   CashSession   │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  stock (milli)  │   │  opening        │   │  debt  ≥ 0      │       │
//! │  │  pack / case    │   │  balances (4q)  │   │  wallet ≥ 0     │       │
//! │  │  unit_kind      │   │  opened_by      │   │  never both > 0 │       │
//! │  └────────┬────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │           │                     │                     │                │
//! │           └──────────┬──────────┴──────────┬──────────┘                │
//! │                      ▼                     ▼                           │
//! │             ┌─────────────────┐   ┌─────────────────┐                  │
//! │             │  JournalEntry   │   │  ClosedSession  │                  │
//! │             │  ─────────────  │   │  ─────────────  │                  │
//! │             │  Sale           │   │  opening        │                  │
//! │             │  DebtPayment    │   │  final balances │                  │
//! │             │  Adjustment     │   │  entry ids      │                  │
//! │             └─────────────────┘   └─────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Journal entries carry:
//! - `id`: UUID v4, used for relations and voids
//! - `invoice_number`: correlative (`F-000123`), printed on the ticket

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{ValidationError, ValidationResult};
use crate::money::{ExchangeRate, Money};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1600 bps = 16% (IVA) and 300 bps = 3% (IGTF).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Checks if tax rate is zero (exempt).
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// A stock quantity in thousandths of the product's base unit.
///
/// Counted goods move in steps of 1000; weighed goods keep three decimals
/// (grams of a kilogram) without float drift, so a sale followed by its void
/// restores stock exactly.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Quantity(i64);

impl Quantity {
    /// Milli-units per base unit.
    pub const SCALE: i64 = 1_000;

    /// Largest magnitude accepted from a caller: one billion base units.
    pub const MAX_INPUT: Quantity = Quantity(1_000_000_000 * Self::SCALE);

    #[inline]
    pub const fn from_milli(milli: i64) -> Self {
        Quantity(milli)
    }

    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Quantity(units * Self::SCALE)
    }

    /// Converts a caller-supplied decimal quantity (rounded to 3 places).
    pub fn from_decimal(field: &str, value: f64) -> ValidationResult<Self> {
        if !value.is_finite() {
            return Err(ValidationError::non_finite(field));
        }
        let milli = (value * Self::SCALE as f64 * 1_000.0).round() / 1_000.0;
        let quantity = Quantity(milli.round() as i64);
        if quantity.0.unsigned_abs() > Self::MAX_INPUT.0 as u64 {
            return Err(ValidationError::out_of_range(field));
        }
        Ok(quantity)
    }

    #[inline]
    pub const fn milli(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Quantity(0)
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// True when the quantity has no fractional part.
    #[inline]
    pub const fn is_whole(&self) -> bool {
        self.0 % Self::SCALE == 0
    }

    /// Scales by a unit-hierarchy factor (e.g. 2 cases × 24 = 48 units).
    #[inline]
    pub const fn times_factor(&self, factor: u32) -> Self {
        Quantity(self.0.saturating_mul(factor as i64))
    }

    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }
}

impl std::ops::Add for Quantity {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Quantity(self.0.saturating_add(other.0))
    }
}

impl std::ops::Sub for Quantity {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Quantity(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Neg for Quantity {
    type Output = Self;

    fn neg(self) -> Self {
        Quantity(self.0.saturating_neg())
    }
}

/// Whole quantities print without decimals; fractions keep only what they need.
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let whole = (self.0 / Self::SCALE).abs();
        let frac = (self.0 % Self::SCALE).abs();
        if frac == 0 {
            write!(f, "{}{}", sign, whole)
        } else {
            let digits = format!("{:03}", frac);
            write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
        }
    }
}

// =============================================================================
// Currency & Medium
// =============================================================================

/// The two currencies a drawer holds. USD is the base currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    /// Base currency; totals and customer quadrants are expressed in it.
    Usd,
    /// Local currency, converted through the frozen exchange rate.
    Ves,
}

impl Currency {
    /// The currency every total, debt and wallet is expressed in.
    pub const BASE: Currency = Currency::Usd;

    pub fn is_base(&self) -> bool {
        *self == Self::BASE
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Usd => write!(f, "USD"),
            Currency::Ves => write!(f, "VES"),
        }
    }
}

/// How money physically moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Medium {
    /// Notes and coins in the drawer.
    Cash,
    /// Card terminal, transfer, mobile payment.
    Digital,
    /// Store credit extended to the customer (creates debt).
    Credit,
    /// Consumes the customer's wallet; never touches the drawer.
    Internal,
}

impl Medium {
    /// True for mediums that move money in or out of the drawer.
    pub fn touches_drawer(&self) -> bool {
        matches!(self, Medium::Cash | Medium::Digital)
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Medium::Cash => write!(f, "cash"),
            Medium::Digital => write!(f, "digital"),
            Medium::Credit => write!(f, "credit"),
            Medium::Internal => write!(f, "wallet"),
        }
    }
}

// =============================================================================
// Drawer Quadrants
// =============================================================================

/// One of the four drawer balance buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    UsdCash,
    VesCash,
    UsdDigital,
    VesDigital,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::UsdCash,
        Quadrant::VesCash,
        Quadrant::UsdDigital,
        Quadrant::VesDigital,
    ];

    /// Maps a currency/medium pair to its quadrant.
    ///
    /// Returns `None` for credit and wallet mediums, which never reach the
    /// drawer.
    pub fn for_tender(currency: Currency, medium: Medium) -> Option<Quadrant> {
        match (currency, medium) {
            (Currency::Usd, Medium::Cash) => Some(Quadrant::UsdCash),
            (Currency::Ves, Medium::Cash) => Some(Quadrant::VesCash),
            (Currency::Usd, Medium::Digital) => Some(Quadrant::UsdDigital),
            (Currency::Ves, Medium::Digital) => Some(Quadrant::VesDigital),
            (_, Medium::Credit | Medium::Internal) => None,
        }
    }

    /// True for physical cash quadrants.
    pub fn is_cash(&self) -> bool {
        matches!(self, Quadrant::UsdCash | Quadrant::VesCash)
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quadrant::UsdCash => write!(f, "USD cash"),
            Quadrant::VesCash => write!(f, "VES cash"),
            Quadrant::UsdDigital => write!(f, "USD digital"),
            Quadrant::VesDigital => write!(f, "VES digital"),
        }
    }
}

/// Drawer balances, each quadrant in its own currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Balances {
    pub usd_cash: Money,
    pub ves_cash: Money,
    pub usd_digital: Money,
    pub ves_digital: Money,
}

impl Balances {
    pub fn get(&self, quadrant: Quadrant) -> Money {
        match quadrant {
            Quadrant::UsdCash => self.usd_cash,
            Quadrant::VesCash => self.ves_cash,
            Quadrant::UsdDigital => self.usd_digital,
            Quadrant::VesDigital => self.ves_digital,
        }
    }

    pub fn get_mut(&mut self, quadrant: Quadrant) -> &mut Money {
        match quadrant {
            Quadrant::UsdCash => &mut self.usd_cash,
            Quadrant::VesCash => &mut self.ves_cash,
            Quadrant::UsdDigital => &mut self.usd_digital,
            Quadrant::VesDigital => &mut self.ves_digital,
        }
    }
}

/// The opening float as a caller sends it.
///
/// Either a single base-currency amount, which lands in USD cash, or an
/// explicit four-quadrant object with missing quadrants defaulting to zero.
///
/// ```json
/// 100.0
/// { "usd_cash": 100.0, "ves_cash": 3650.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpeningFloat {
    Single(f64),
    Quadrants {
        #[serde(default)]
        usd_cash: Option<f64>,
        #[serde(default)]
        ves_cash: Option<f64>,
        #[serde(default)]
        usd_digital: Option<f64>,
        #[serde(default)]
        ves_digital: Option<f64>,
    },
}

impl OpeningFloat {
    /// Normalizes the float into four rounded quadrants.
    pub fn into_balances(self) -> ValidationResult<Balances> {
        match self {
            OpeningFloat::Single(amount) => Ok(Balances {
                usd_cash: opening_amount("usd_cash", Some(amount))?,
                ..Balances::default()
            }),
            OpeningFloat::Quadrants {
                usd_cash,
                ves_cash,
                usd_digital,
                ves_digital,
            } => Ok(Balances {
                usd_cash: opening_amount("usd_cash", usd_cash)?,
                ves_cash: opening_amount("ves_cash", ves_cash)?,
                usd_digital: opening_amount("usd_digital", usd_digital)?,
                ves_digital: opening_amount("ves_digital", ves_digital)?,
            }),
        }
    }
}

fn opening_amount(field: &str, value: Option<f64>) -> ValidationResult<Money> {
    let amount = Money::from_decimal(field, value.unwrap_or(0.0))?;
    if amount.is_negative() {
        return Err(ValidationError::invalid_amount(field));
    }
    Ok(amount)
}

// =============================================================================
// Cash Session
// =============================================================================

/// The open drawer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub opened_by: String,
    /// Snapshot taken at open; never mutated.
    pub opening: Balances,
    /// Live balances, mutated by every flow and withdrawal.
    pub balances: Balances,
}

/// Lifecycle of the drawer: `Closed → Open → Closed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Closed,
    Open(CashSession),
}

impl SessionState {
    /// Returns the open session, if any.
    pub fn open(&self) -> Option<&CashSession> {
        match self {
            SessionState::Open(session) => Some(session),
            SessionState::Closed => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open(_))
    }
}

/// Aggregates computed when a session is closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionTotals {
    pub sales_count: i64,
    pub void_count: i64,
    pub debt_payments_count: i64,
    /// Sum of completed sale totals (IGTF included), base currency.
    pub gross_sales: Money,
    /// Withdrawals per quadrant.
    pub withdrawals: Balances,
}

/// Immutable Z-report produced by `close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClosedSession {
    pub id: String,
    pub session_id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    pub opened_by: String,
    #[ts(as = "String")]
    pub closed_at: DateTime<Utc>,
    pub closed_by: String,
    pub opening: Balances,
    pub final_balances: Balances,
    pub totals: SessionTotals,
    /// Caller-supplied report fields, merged as-is.
    #[ts(type = "Record<string, unknown>")]
    pub extras: serde_json::Value,
    /// Journal entries recorded while the session was open.
    pub entry_ids: Vec<String>,
}

/// A logged withdrawal from the drawer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashMovement {
    pub id: String,
    pub session_id: String,
    pub quadrant: Quadrant,
    /// Amount actually removed (after the cash floor).
    pub amount: Money,
    pub reason: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Product
// =============================================================================

/// Whether a product is counted or weighed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    #[default]
    Counted,
    Weighed,
}

/// The level a line item is sold at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UnitLevel {
    #[default]
    Unit,
    Pack,
    Case,
}

impl fmt::Display for UnitLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitLevel::Unit => write!(f, "unit"),
            UnitLevel::Pack => write!(f, "pack"),
            UnitLevel::Case => write!(f, "case"),
        }
    }
}

/// A packaging level above the base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PackLevel {
    /// How many of the level below this one it contains.
    pub contents: u32,
    /// Selling price at this level.
    pub price: Money,
}

/// Inventory view of a product: what the ledger reads and decrements.
///
/// ## Unit Hierarchy
/// ```text
/// case ──contents──► pack ──contents──► unit
///   (if no pack level: case ──contents──► unit)
///
/// factor(unit) = 1
/// factor(pack) = pack.contents
/// factor(case) = case.contents × pack.contents   (pack present)
///              = case.contents                   (no pack)
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Price per base unit.
    pub price: Money,
    /// Current stock in base units.
    pub stock: Quantity,
    pub unit_kind: UnitKind,
    pub pack: Option<PackLevel>,
    pub case: Option<PackLevel>,
}

impl Product {
    /// Base units contained in one `level`.
    pub fn factor(&self, level: UnitLevel) -> ValidationResult<u32> {
        match level {
            UnitLevel::Unit => Ok(1),
            UnitLevel::Pack => self
                .pack
                .map(|pack| pack.contents.max(1))
                .ok_or_else(|| self.unknown_level(level)),
            UnitLevel::Case => {
                let case = self.case.ok_or_else(|| self.unknown_level(level))?;
                let inner = self.pack.map(|pack| pack.contents.max(1)).unwrap_or(1);
                Ok(case.contents.max(1) * inner)
            }
        }
    }

    /// Catalog price for one `level`.
    pub fn price_for(&self, level: UnitLevel) -> ValidationResult<Money> {
        match level {
            UnitLevel::Unit => Ok(self.price),
            UnitLevel::Pack => self
                .pack
                .map(|pack| pack.price)
                .ok_or_else(|| self.unknown_level(level)),
            UnitLevel::Case => self
                .case
                .map(|case| case.price)
                .ok_or_else(|| self.unknown_level(level)),
        }
    }

    fn unknown_level(&self, level: UnitLevel) -> ValidationError {
        ValidationError::UnknownUnitLevel {
            product: self.name.clone(),
            level,
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer account with its two base-currency quadrants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    /// Owed to the business. Never positive together with `wallet`.
    pub debt: Money,
    /// Owed by the business (store credit).
    pub wallet: Money,
}

/// Which customer quadrant an adjustment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum CustomerQuadrant {
    Debt,
    Wallet,
}

impl fmt::Display for CustomerQuadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerQuadrant::Debt => write!(f, "debt"),
            CustomerQuadrant::Wallet => write!(f, "wallet"),
        }
    }
}

// =============================================================================
// Journal
// =============================================================================

/// Discriminates the rows of the journal table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Sale,
    DebtPayment,
    Adjustment,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Sale => write!(f, "sale"),
            EntryKind::DebtPayment => write!(f, "debt_payment"),
            EntryKind::Adjustment => write!(f, "adjustment"),
        }
    }
}

/// Journal entry status. Flips at most once, `Completed → Void`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Completed,
    Void,
}

/// A normalized payment line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    /// Amount in `currency`.
    pub amount: Money,
    pub currency: Currency,
    pub medium: Medium,
    /// Rate this payment was taken at (may differ from the sale's rate).
    pub rate: ExchangeRate,
    /// Same payment in the base currency, computed once at commit.
    pub base_amount: Money,
    pub reference: Option<String>,
}

impl Payment {
    /// Drawer quadrant this payment lands in, if any.
    pub fn quadrant(&self) -> Option<Quadrant> {
        Quadrant::for_tender(self.currency, self.medium)
    }
}

/// A change disbursement handed back to the payer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Change {
    /// Amount in `currency`.
    pub amount: Money,
    pub currency: Currency,
    pub medium: Medium,
}

impl Change {
    pub fn quadrant(&self) -> Option<Quadrant> {
        Quadrant::for_tender(self.currency, self.medium)
    }
}

/// A sold line, frozen at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub product_id: String,
    /// Product name snapshot.
    pub name: String,
    /// Quantity at `level`.
    pub quantity: Quantity,
    pub level: UnitLevel,
    /// Base units per `level` at the time of sale.
    pub factor: u32,
    pub unit_price: Money,
    pub tax_rate: TaxRate,
    pub line_total: Money,
    pub tax: Money,
}

impl LineItem {
    /// Stock consumed by this line, in base units.
    pub fn base_quantity(&self) -> Quantity {
        self.quantity.times_factor(self.factor)
    }
}

/// Who voided an entry, when and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VoidInfo {
    pub reason: String,
    pub actor: String,
    #[ts(as = "String")]
    pub voided_at: DateTime<Utc>,
}

/// An append-only journal entry: sale, debt payment or adjustment.
///
/// Everything the reversal engine needs is frozen here. A void reads these
/// fields back and never recomputes from current prices, rates or hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct JournalEntry {
    pub id: String,
    pub kind: EntryKind,
    pub invoice_number: String,
    pub status: EntryStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub actor: String,
    /// Cash session the entry was recorded in (none for adjustments).
    pub session_id: Option<String>,
    pub customer_id: Option<String>,
    /// Rate frozen at commit.
    pub rate: ExchangeRate,
    pub is_credit: bool,
    pub lines: Vec<LineItem>,
    pub payments: Vec<Payment>,
    pub changes: Vec<Change>,
    pub subtotal: Money,
    pub tax: Money,
    pub igtf: Money,
    /// `subtotal + tax + igtf`, base currency.
    pub total: Money,
    pub paid_base: Money,
    pub change_owed: Money,
    pub debt_created: Money,
    pub consumed_wallet: Money,
    pub applied_to_debt: Money,
    pub applied_to_wallet: Money,
    /// Customer quadrants right after the commit (ticket/audit snapshot).
    pub resulting_debt: Option<Money>,
    pub resulting_wallet: Option<Money>,
    /// Adjustment target and the amount it zeroed.
    pub adjusted_quadrant: Option<CustomerQuadrant>,
    pub adjusted_amount: Money,
    /// Mandatory for adjustments.
    pub reason: Option<String>,
    pub void: Option<VoidInfo>,
    /// Z-report this entry was folded into.
    pub closed_session_id: Option<String>,
}

impl JournalEntry {
    pub fn is_void(&self) -> bool {
        self.status == EntryStatus::Void
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn soda() -> Product {
        Product {
            id: "p1".to_string(),
            name: "Soda 355ml".to_string(),
            price: Money::from_cents(100),
            stock: Quantity::from_units(100),
            unit_kind: UnitKind::Counted,
            pack: Some(PackLevel {
                contents: 6,
                price: Money::from_cents(550),
            }),
            case: Some(PackLevel {
                contents: 4,
                price: Money::from_cents(2000),
            }),
        }
    }

    #[test]
    fn test_unit_hierarchy_factors() {
        let product = soda();
        assert_eq!(product.factor(UnitLevel::Unit).unwrap(), 1);
        assert_eq!(product.factor(UnitLevel::Pack).unwrap(), 6);
        assert_eq!(product.factor(UnitLevel::Case).unwrap(), 24);

        let no_pack = Product { pack: None, ..soda() };
        assert_eq!(no_pack.factor(UnitLevel::Case).unwrap(), 4);
        assert!(matches!(
            no_pack.factor(UnitLevel::Pack),
            Err(ValidationError::UnknownUnitLevel { .. })
        ));
    }

    #[test]
    fn test_quantity_parsing_and_display() {
        assert_eq!(Quantity::from_decimal("q", 1.25).unwrap().milli(), 1_250);
        assert_eq!(Quantity::from_decimal("q", 0.1 + 0.2).unwrap().milli(), 300);
        assert!(Quantity::from_decimal("q", f64::NAN).is_err());
        assert_eq!(Quantity::from_milli(7_000).to_string(), "7");
        assert_eq!(Quantity::from_milli(1_250).to_string(), "1.25");
        assert_eq!(Quantity::from_milli(-500).to_string(), "-0.5");
        assert!(Quantity::from_units(3).is_whole());
        assert!(!Quantity::from_milli(2_500).is_whole());
    }

    #[test]
    fn test_quantity_range_and_saturation() {
        assert_eq!(
            Quantity::from_decimal("q", 1e15),
            Err(ValidationError::out_of_range("q"))
        );
        assert_eq!(Quantity::from_decimal("q", 1e9).unwrap(), Quantity::MAX_INPUT);
        let huge = Quantity::from_milli(i64::MAX);
        assert_eq!(huge.times_factor(24), huge);
        assert_eq!(huge + Quantity::from_units(1), huge);
    }

    #[test]
    fn test_quadrant_for_tender() {
        assert_eq!(
            Quadrant::for_tender(Currency::Ves, Medium::Digital),
            Some(Quadrant::VesDigital)
        );
        assert_eq!(Quadrant::for_tender(Currency::Usd, Medium::Internal), None);
        assert_eq!(Quadrant::for_tender(Currency::Usd, Medium::Credit), None);
    }

    #[test]
    fn test_opening_float_normalization() {
        let single = OpeningFloat::Single(100.0).into_balances().unwrap();
        assert_eq!(single.usd_cash, Money::from_cents(10_000));
        assert_eq!(single.ves_cash, Money::zero());

        let parsed: OpeningFloat =
            serde_json::from_str(r#"{ "ves_cash": 3650.5 }"#).unwrap();
        let balances = parsed.into_balances().unwrap();
        assert_eq!(balances.ves_cash, Money::from_cents(365_050));
        assert_eq!(balances.usd_cash, Money::zero());

        assert!(OpeningFloat::Single(-1.0).into_balances().is_err());
        assert!(OpeningFloat::Single(f64::NAN).into_balances().is_err());
    }
}
