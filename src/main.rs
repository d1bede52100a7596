//! Cross-fee-tier arbitrage engine entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feetier_arb::api::{create_router, AppState};
use feetier_arb::arbitrage::ScanReport;
use feetier_arb::config::Config;
use feetier_arb::engine::Engine;
use feetier_arb::metrics;
use feetier_arb::utils::{format_units, redact_address, shutdown_signal, NATIVE_DECIMALS};

/// Cross-fee-tier DEX arbitrage engine.
#[derive(Parser, Debug)]
#[command(name = "feetier-arb")]
#[command(about = "Scans fee tiers of the same pair for round-trip spreads and trades them")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP control surface (default).
    Run {
        /// Default mode for /start (overrides DRY_RUN).
        #[arg(long)]
        dry_run: Option<bool>,

        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,

        /// Start the engine immediately instead of waiting for /start.
        #[arg(long)]
        autostart: bool,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Connect to every network and print balances.
    CheckNetworks,

    /// Scan one network once and print ranked opportunities.
    Scan {
        /// Network id (e.g. base).
        #[arg(long)]
        network: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("feetier_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if args.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::CheckNetworks) => cmd_check_networks().await,
        Some(Command::Scan { network }) => cmd_scan(&network).await,
        Some(Command::Run {
            dry_run,
            port,
            autostart,
        }) => cmd_run(dry_run, port, autostart).await,
        None => cmd_run(None, None, false).await,
    }
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    Ok(config)
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("FEE-TIER ARB - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    let engine = config.engine_config()?;
    let networks = config.network_configs()?;

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Wallet: {}", redact_address(&config.wallet()?));
    for network in &networks {
        println!(
            "  Network: {} (chain {}) {} / {}",
            network.id, network.chain_id, network.native_symbol, network.quote_symbol
        );
    }
    println!("  Fee Tiers: {:?}", engine.fee_tiers);
    println!("  Trade Size: {}", engine.trade_size);
    println!("  Min Profit: {} bps", engine.min_profit_bps);
    println!("  Max Slippage: {} bps", engine.max_slippage_bps);
    println!("  Scan Interval: {}ms", engine.scan_interval.as_millis());
    println!("  Gas Budget: {} units", engine.gas_limits.total());
    println!("  Dry Run: {}", engine.default_dry_run);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Connect to every network and print balances.
async fn cmd_check_networks() -> anyhow::Result<()> {
    let config = load_config()?;
    let engine = Engine::from_config(&config)?;

    println!("======================================================================");
    println!("FEE-TIER ARB - NETWORK CHECK");
    println!("======================================================================");

    let connected = engine.init().await;
    let snapshot = engine.snapshot().await;
    for network in &snapshot.networks {
        let state = if network.connected { "OK" } else { "FAILED" };
        println!("\n{} ({}): {}", network.name, network.id, state);
        if let Some(balances) = &network.balances {
            println!("   Native:  {}", balances.native_formatted);
            println!("   Wrapped: {}", balances.wrapped_formatted);
            println!("   Quote:   {}", balances.quote_formatted);
            println!("   Price:   ${}", network.native_price_usd);
            println!("   Active:  {}", network.active);
        }
        if let Some(err) = &network.last_error {
            println!("   Error: {}", err);
        }
    }

    println!("\n======================================================================");
    println!("{}/{} NETWORKS CONNECTED", connected, snapshot.networks.len());
    println!("======================================================================");

    if connected == 0 {
        return Err(anyhow::anyhow!("No network reachable"));
    }
    Ok(())
}

/// Scan one network once.
async fn cmd_scan(network: &str) -> anyhow::Result<()> {
    let config = load_config()?;
    let engine = Engine::from_config(&config)?;
    engine.init().await;

    let report = engine.scan_network(network).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!("======================================================================");
    println!(
        "SCAN {} - {} quoted, {} skipped, gas {} gwei{} ({}ms)",
        report.network,
        report.pairs_quoted,
        report.pairs_skipped,
        format_units(report.gas_price, 9),
        if report.gas_price_fallback { " (fallback)" } else { "" },
        report.duration.as_millis()
    );
    println!("======================================================================");

    if report.opportunities.is_empty() {
        println!("No round trips quoted.");
        return;
    }

    for opp in &report.opportunities {
        println!(
            "{} {:<40} spread {:>5} bps  out {:<12} net ${:.4}",
            if opp.profitable { "+" } else { " " },
            opp.route,
            opp.spread_bps,
            format_units(opp.amount_out, NATIVE_DECIMALS),
            opp.net_profit_usd
        );
    }
}

fn install_prometheus() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            metrics::init_metrics();
            Some(handle)
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

/// Serve the HTTP control surface until shutdown.
async fn cmd_run(dry_run: Option<bool>, port: Option<u16>, autostart: bool) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;

    // Override with CLI args if provided
    if let Some(dry_run) = dry_run {
        config.dry_run = dry_run;
    }
    let port = port.unwrap_or(config.port);

    let engine = Arc::new(Engine::from_config(&config)?);
    let connected = engine.init().await;
    if connected == 0 {
        warn!("No network reachable; the engine will keep retrying on refresh");
    }

    info!("Mode: {}", if config.dry_run { "SIMULATION" } else { "LIVE TRADING" });
    info!("Wallet: {}", redact_address(&engine.wallet()));

    let mut state = AppState::new(engine.clone());
    if let Some(handle) = install_prometheus() {
        state = state.with_prometheus(handle);
    }

    if autostart {
        let outcome = engine.start(None).await;
        info!(dry_run = outcome.is_dry_run, "Engine autostarted");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let outcome = engine.stop().await;
    info!(
        real_profit_usd = %outcome.real_profit_usd,
        trades = outcome.stats.trades_attempted,
        "Shutdown complete"
    );

    Ok(())
}
