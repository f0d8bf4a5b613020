//! Assembles a small MRMS precipitation dataset from the live archive.
//!
//! Usage: `cargo run --example assemble [config.toml]`

use chrono::{TimeZone, Utc};
use mrms_qpe::{DatasetAssembler, Settings};
use std::env;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    configure_polars_display();

    let settings = match env::args().nth(1) {
        Some(path) => Settings::load(Path::new(&path)).await?,
        None => Settings::default(),
    };

    let start = Utc.with_ymd_and_hms(2017, 8, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2017, 8, 1, 5, 0, 0).unwrap();
    let time_range = settings.time_range(start, end)?;

    let assembler = DatasetAssembler::from_settings(&settings, time_range).await?;
    let data = assembler.get_data().await?;

    print!("{}", data.manifest);
    let filled = data.gap_fill(assembler.time_range())?;
    println!("{:#?}", filled.frame.collect()?);

    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    // show 20 rows
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
