//! # Seed Data Generator
//!
//! Populates a ledger database with a small catalog and a few customers
//! for development.
//!
//! ## Usage
//! ```bash
//! # Seed the configured database (ledger.toml / TILL_DB_PATH)
//! cargo run -p till-db --bin seed
//!
//! # Specify database path
//! cargo run -p till-db --bin seed -- --db ./data/till.db
//!
//! # Also open a cash session with a $100 float
//! cargo run -p till-db --bin seed -- --open 100
//! ```
//!
//! ## Generated Data
//! - Counted products with pack and case levels (sodas, water, snacks)
//! - Weighed products sold by the kilogram (cheese, ham)
//! - Three customers with empty accounts

use std::env;
use std::path::PathBuf;
use till_core::{Money, OpeningFloat, PackLevel, Product, Quantity, UnitKind};
use till_db::{Ledger, LedgerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (id, name, unit price cents, stock, pack (contents, price cents), case (packs, price cents))
type CountedRow = (&'static str, &'static str, i64, i64, Option<(u32, i64)>, Option<(u32, i64)>);

const COUNTED: &[CountedRow] = &[
    ("BEV-COLA-355", "Cola 355ml", 100, 240, Some((6, 550)), Some((4, 2000))),
    ("BEV-WATER-600", "Water 600ml", 60, 480, Some((12, 650)), None),
    ("BEV-MALT-250", "Malt drink 250ml", 120, 96, Some((6, 660)), Some((4, 2500))),
    ("SNK-CHIPS-45", "Potato chips 45g", 150, 60, None, Some((24, 3200))),
    ("SNK-COOKIE-90", "Cookies 90g", 90, 80, Some((10, 850)), None),
    ("GRO-RICE-1K", "Rice 1kg", 180, 50, None, Some((24, 4000))),
    ("GRO-FLOUR-1K", "Corn flour 1kg", 160, 75, None, Some((20, 3000))),
];

/// (id, name, price cents per kg, stock grams)
const WEIGHED: &[(&str, &str, i64, i64)] = &[
    ("DLI-CHEESE", "White cheese", 800, 12_500),
    ("DLI-HAM", "Sliced ham", 1100, 6_000),
];

const CUSTOMERS: &[&str] = &["María Pérez", "José Rodríguez", "Bodega La Esquina"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut opening: Option<f64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--open" | "-o" => {
                if i + 1 < args.len() {
                    opening = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (overrides config)");
                println!("  -c, --config <PATH>   ledger.toml to load");
                println!("  -o, --open <USD>      Open a cash session with this float");
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = LedgerConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!(path = %config.database.path.display(), "Seeding ledger database");
    let ledger = Ledger::open(&config).await?;

    let existing = ledger.db().products().list().await?.len();
    if existing > 0 {
        warn!(existing, "Database already has products, skipping catalog");
    } else {
        let catalog = catalog();
        let loaded = ledger.load_snapshot(&catalog).await?;
        info!(loaded, "Catalog loaded");

        for name in CUSTOMERS {
            let customer = ledger.create_customer(name).await?;
            info!(id = %customer.id, name = %customer.name, "Customer created");
        }
    }

    if let Some(amount) = opening {
        if ledger.session_state().await?.open().is_some() {
            warn!("A cash session is already open");
        } else {
            let session = ledger
                .open_session(OpeningFloat::Single(amount), "seed")
                .await?;
            info!(session_id = %session.id, usd_cash = %session.balances.usd_cash, "Cash session opened");
        }
    }

    info!("Seed complete");
    Ok(())
}

fn catalog() -> Vec<Product> {
    let counted = COUNTED.iter().map(|(id, name, price, stock, pack, case)| Product {
        id: id.to_string(),
        name: name.to_string(),
        price: Money::from_cents(*price),
        stock: Quantity::from_units(*stock),
        unit_kind: UnitKind::Counted,
        pack: pack.map(|(contents, price)| PackLevel {
            contents,
            price: Money::from_cents(price),
        }),
        case: case.map(|(contents, price)| PackLevel {
            contents,
            price: Money::from_cents(price),
        }),
    });

    let weighed = WEIGHED.iter().map(|(id, name, price, grams)| Product {
        id: id.to_string(),
        name: name.to_string(),
        price: Money::from_cents(*price),
        stock: Quantity::from_milli(*grams),
        unit_kind: UnitKind::Weighed,
        pack: None,
        case: None,
    });

    counted.chain(weighed).collect()
}
