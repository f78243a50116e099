use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const REGIONS: [&str; 5] = ["North", "South", "East", "West", "Central"];

const PRODUCTS: [(&str, &str, f64); 9] = [
    ("Electronics", "Laptop", 1200.0),
    ("Electronics", "Smartphone", 800.0),
    ("Electronics", "Headphones", 150.0),
    ("Furniture", "Desk", 350.0),
    ("Furniture", "Chair", 120.0),
    ("Furniture", "Bookshelf", 90.0),
    ("Office Supplies", "Notebook", 4.5),
    ("Office Supplies", "Pen", 1.2),
    ("Office Supplies", "Stapler", 12.0),
];

const MONTH_DAYS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Writes a synthetic sales CSV for the dashboard.
#[derive(Parser, Debug)]
#[command(name = "data_generator", version)]
struct Args {
    /// Number of orders
    #[arg(short = 'n', long, default_value_t = 100)]
    rows: usize,

    #[arg(short, long, default_value = "sales_test_data_100.csv")]
    output: PathBuf,

    /// Seed for reproducible data
    #[arg(long)]
    seed: Option<u64>,
}

/// Day `day` (0-based) of 2024 as `YYYY-MM-DD`.
fn date_of(mut day: u32) -> String {
    for (month, &len) in MONTH_DAYS.iter().enumerate() {
        if day < len {
            return format!("2024-{:02}-{:02}", month + 1, day + 1);
        }
        day -= len;
    }
    "2024-12-31".to_string()
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "order_id,date,region,category,product,quantity,unit_price,sales"
    )?;

    for i in 0..args.rows {
        let date = date_of(rng.random_range(0..366));
        let region = REGIONS[rng.random_range(0..REGIONS.len())];
        let (category, product, base_price) = PRODUCTS[rng.random_range(0..PRODUCTS.len())];
        let quantity: u32 = rng.random_range(1..=20);
        // +-10% around the list price, in cents
        let unit_price = (base_price * rng.random_range(0.9..1.1) * 100.0).round() / 100.0;
        let sales = (unit_price * f64::from(quantity) * 100.0).round() / 100.0;
        writeln!(
            writer,
            "{},{},{},{},{},{},{:.2},{:.2}",
            i + 1,
            date,
            region,
            category,
            product,
            quantity,
            unit_price,
            sales
        )?;
    }
    writer.flush()?;

    println!("Sample CSV generated: {}", args.output.display());
    Ok(())
}
