// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use storefront_fx::config::{Config, StoreBackend};
use storefront_fx::exchange_rates::{export_exchange_rates_csv, print_rates};
use storefront_fx::store::{FileStore, KeyValueStore, MemoryStore, SqliteStore};
use storefront_fx::utils::parse_amount;
use storefront_fx::{CurrencyCode, CurrencyContext, FxClient, InitOptions, RateCache, Supervisor};

#[derive(Parser)]
#[command(author, version, about = "Storefront currency rates and price display")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Currency to display in for this run (not persisted)
    #[arg(long, global = true)]
    currency: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current rate table, refreshing it if stale
    Rates,
    /// Convert a base-currency amount into the selected currency
    Convert {
        #[arg(value_parser = parse_amount, allow_hyphen_values = true)]
        amount: f64,
    },
    /// Convert and format a base-currency amount
    Format {
        #[arg(value_parser = parse_amount, allow_hyphen_values = true)]
        amount: f64,
    },
    /// List supported currencies
    Currencies,
    /// Persist a new selected currency
    Use { code: String },
    /// Export the rate table to CSV
    Export {
        #[arg(long, default_value = "output")]
        output: PathBuf,
    },
    /// Keep rates fresh in the background until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storefront_fx=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let store = open_store(&config).await?;
    let client = FxClient::new(config.rates_url.clone(), config.request_timeout())
        .context("Failed to set up rates client")?;
    let context = CurrencyContext::initialize(
        Arc::new(client),
        RateCache::new(store),
        InitOptions {
            requested_currency: cli.currency.clone(),
            locale: config.locale.clone(),
            ttl: Some(config.ttl()),
        },
    )
    .await;

    if let Some(notice) = context.notice() {
        println!("⚠️  {} - showing prices in {}", notice, CurrencyCode::BASE);
    }

    match cli.command {
        Commands::Rates => {
            refresh_if_needed(&context).await;
            print_rates(&context.snapshot());
        }
        Commands::Convert { amount } => {
            refresh_if_needed(&context).await;
            println!("{} {}", context.convert(amount), context.currency());
        }
        Commands::Format { amount } => {
            refresh_if_needed(&context).await;
            println!("{}", context.format(amount));
        }
        Commands::Currencies => {
            let active = context.currency();
            for info in context.supported_currencies() {
                let marker = if info.code == active { "*" } else { " " };
                println!("{} {} {:<4} {}", marker, info.code, info.symbol, info.name);
            }
        }
        Commands::Use { code } => {
            if context.set_currency_str(&code).await? {
                println!("✅ Currency set to {}", code.trim());
            } else {
                println!("{} is already selected", code.trim());
            }
        }
        Commands::Export { output } => {
            refresh_if_needed(&context).await;
            let filename = export_exchange_rates_csv(&context.snapshot(), &output)?;
            println!("✅ Exchange rates written to {}", filename.display());
        }
        Commands::Watch => {
            let supervisor = Supervisor::spawn(context.clone(), config.check_interval());
            println!("Watching {} (Ctrl-C to stop)", config.rates_url);
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            supervisor.shutdown().await;
            print_rates(&context.snapshot());
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.store {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::File => Arc::new(FileStore::new(&config.store_path)),
        StoreBackend::Sqlite => {
            let db_url = if config.store_path.starts_with("sqlite:") {
                config.store_path.clone()
            } else {
                format!("sqlite://{}", config.store_path)
            };
            Arc::new(
                SqliteStore::connect(&db_url)
                    .await
                    .with_context(|| format!("Failed to open {}", db_url))?,
            )
        }
    };
    Ok(store)
}

/// One-shot commands fetch inline instead of running the supervisor.
async fn refresh_if_needed(context: &CurrencyContext) {
    if !context.needs_refresh() {
        return;
    }
    println!("Fetching current exchange rates...");
    match context.refresh().await {
        Ok(_) => println!("✅ Exchange rates fetched"),
        Err(e) => {
            let fallback = if context.fetched_at().is_some() { "cached" } else { "identity" };
            println!("⚠️  {} - using {} rates", e, fallback);
        }
    }
}
