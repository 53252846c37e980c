use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate};
use serde::Serialize;

/// One line of the generated CSV, in the column order the dashboard expects.
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Order {
    order_date: String,
    product: &'static str,
    category: &'static str,
    quantity: u32,
    unit_price: f64,
    total_price: f64,
}

/// (product, category, list price)
const CATALOGUE: [(&str, &str, f64); 8] = [
    ("Laptop", "Electronics", 899.0),
    ("Monitor", "Electronics", 229.0),
    ("Keyboard", "Accessories", 49.5),
    ("Mouse", "Accessories", 19.99),
    ("Desk", "Furniture", 315.0),
    ("Chair", "Furniture", 145.0),
    ("Notebook", "Stationery", 3.25),
    ("Pen", "Stationery", 1.1),
];

/// Small deterministic PRNG (xorshift64*), so every run writes the same file.
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Rng(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }

    /// Uniform in `[lo, hi)`.
    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        lo + (hi - lo) * unit
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let output_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data.csv"));
    let mut rng = Rng::new(42);
    let first_day = NaiveDate::from_ymd_opt(2024, 1, 1).context("invalid start date")?;

    let mut writer = csv::Writer::from_path(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;

    let n_orders = 500;
    for _ in 0..n_orders {
        let (product, category, list_price) = CATALOGUE[rng.below(CATALOGUE.len() as u64) as usize];
        let date = first_day
            .checked_add_days(Days::new(rng.below(366)))
            .context("order date out of range")?;
        let quantity = 1 + rng.below(20) as u32;
        // Prices drift by up to ±10% around the list price.
        let unit_price = (list_price * rng.uniform(0.9, 1.1) * 100.0).round() / 100.0;
        let total_price = (unit_price * quantity as f64 * 100.0).round() / 100.0;

        writer.serialize(Order {
            order_date: date.format("%Y-%m-%d").to_string(),
            product,
            category,
            quantity,
            unit_price,
            total_price,
        })?;
    }
    writer.flush()?;

    log::info!("wrote {n_orders} orders to {}", output_path.display());
    println!("Wrote {n_orders} orders to {}", output_path.display());
    Ok(())
}
