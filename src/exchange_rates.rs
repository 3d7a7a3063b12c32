// SPDX-FileCopyrightText: 2025 Joost van der Laan
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use csv::Writer;
use std::fs;
use std::path::{Path, PathBuf};

use crate::context::CurrencyState;

/// Export the context's rate table to a timestamped CSV file in `output_dir`
pub fn export_exchange_rates_csv(state: &CurrencyState, output_dir: &Path) -> Result<PathBuf> {
    // Create output directory if it doesn't exist
    if !output_dir.exists() {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    }

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = output_dir.join(format!("exchange_rates_{}.csv", timestamp));
    let file = fs::File::create(&filename)
        .with_context(|| format!("Failed to create {}", filename.display()))?;
    write_rates(state, Writer::from_writer(file))?;

    Ok(filename)
}

fn write_rates<W: std::io::Write>(state: &CurrencyState, mut writer: Writer<W>) -> Result<()> {
    writer.write_record([
        "Code",
        "Name",
        "Symbol",
        "Rate",
        "Base Currency",
        "Fetched At",
        "Stale",
    ])?;

    let fetched_at = state
        .fetched_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    for (code, rate) in state.rates.iter() {
        writer.write_record([
            code.as_str(),
            code.name(),
            code.symbol(),
            rate.to_string().as_str(),
            crate::models::CurrencyCode::BASE.as_str(),
            fetched_at.as_str(),
            if state.stale { "true" } else { "false" },
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Print the rate table the way the CLI shows it
pub fn print_rates(state: &CurrencyState) {
    println!("Exchange rates (1 {} =)", crate::models::CurrencyCode::BASE);
    for (code, rate) in state.rates.iter() {
        let marker = if code == state.currency { "*" } else { " " };
        println!("{} {} {:>12.4}  {}", marker, code, rate, code.name());
    }
    match state.fetched_at {
        Some(fetched_at) => println!("Fetched: {}", describe_age(fetched_at, Utc::now())),
        None => println!("⚠️  No rates fetched yet, showing identity rates"),
    }
    if state.stale {
        println!("⚠️  Rates are stale");
    }
}

fn describe_age(fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now - fetched_at;
    let ago = if age.num_hours() > 0 {
        format!("{}h {}m ago", age.num_hours(), age.num_minutes() % 60)
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    };
    format!("{} ({})", fetched_at.to_rfc3339(), ago)
}
