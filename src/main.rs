use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use fno_analyzer::classifier::CriteriaSet;
use fno_analyzer::config::{self, AppConfig, InstrumentConfig, SymbolSource};
use fno_analyzer::merger::MergeConfig;
use fno_analyzer::models::{DashboardRow, InstrumentKind};
use fno_analyzer::normalizer;
use fno_analyzer::nse_client::MarketDataClient;
use fno_analyzer::processor::{process_batch, InstrumentResult};
use fno_analyzer::{logging, sink};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

enum RunOutcome {
    Processed(Vec<InstrumentResult>),
    MarketClosed(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging();

    println!("{}", "=".repeat(60).blue());
    println!("{}", "FNO Analyzer".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!();

    let cfg = AppConfig::load(&config::config_path())?;
    let criteria = CriteriaSet::from_config(&cfg.criteria)?;
    let client = MarketDataClient::new()?;

    let mut consecutive_failures: u32 = 0;
    // The dashboard accumulates across runs; each run's rows are appended
    // and the sink rewrites the whole table.
    let mut dashboard: Vec<DashboardRow> = Vec::new();

    loop {
        let today = Local::now().format("%d-%b-%Y").to_string();
        if cfg.holidays.contains(&today) {
            warn!("today {} is a market holiday, exiting", today);
            break;
        }

        match run_once(&client, &cfg, &criteria, &mut dashboard).await {
            Ok(RunOutcome::MarketClosed(trade_date)) => {
                error!(
                    "capital market is closed, next trade date is {}, market starts at 9:15 am",
                    trade_date
                );
                break;
            }
            Ok(RunOutcome::Processed(results)) => {
                consecutive_failures = 0;
                print_summary(&results);
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(
                    "run failed ({}/{}): {:#}",
                    consecutive_failures, cfg.max_error_count, e
                );
                if consecutive_failures >= cfg.max_error_count {
                    error!("max error count reached, giving up");
                    return Err(e);
                }
            }
        }

        if config::is_single_run() {
            break;
        }

        info!("sleeping {} minutes", cfg.run_interval_mins);
        tokio::time::sleep(Duration::from_secs(cfg.run_interval_mins * 60)).await;
    }

    Ok(())
}

/// One full pass: fetch, normalize, merge, classify, derive, write.
/// Instruments are processed strictly one after another; the only await
/// points are the I/O collaborators.
async fn run_once(
    client: &MarketDataClient,
    cfg: &AppConfig,
    criteria: &CriteriaSet,
    dashboard: &mut Vec<DashboardRow>,
) -> Result<RunOutcome> {
    let status = client.fetch_market_status().await?;
    if status.is_closed() {
        return Ok(RunOutcome::MarketClosed(status.trade_date));
    }

    let instr = &cfg.instruments;

    println!("{}", "Step 1: Fetching raw tables...".cyan());
    let futures_cfg = instr.table(InstrumentKind::Futures);
    let futures_table =
        normalizer::normalize(&client.fetch_raw_table(futures_cfg).await?, futures_cfg)?;
    let options_cfg = instr.table(InstrumentKind::Options);
    let options_table =
        normalizer::normalize(&client.fetch_raw_table(options_cfg).await?, options_cfg)?;
    println!(
        "{} {} futures rows, {} options rows",
        "✓".green(),
        futures_table.rows.len(),
        options_table.rows.len()
    );

    let extraction = normalizer::extract_option_records(&options_table)?;
    for (idx, err) in &extraction.skipped {
        warn!(row = *idx, "{}", err);
    }
    let mut records = extraction.records;
    normalizer::filter_symbols(&mut records, instr.include.as_deref(), instr.exclude.as_deref());

    let mut symbols = match instr.symbols_from {
        SymbolSource::Futures => normalizer::distinct_symbols(&futures_table)?,
        SymbolSource::Options => normalizer::distinct_symbols(&options_table)?,
    };
    normalizer::filter_symbol_names(&mut symbols, instr.include.as_deref(), instr.exclude.as_deref());
    println!("{} {} symbols to process", "✓".green(), symbols.len());

    let expiries = match instr.symbols_from {
        SymbolSource::Futures => normalizer::distinct_expiry_dates(&futures_table)?,
        SymbolSource::Options => normalizer::distinct_expiry_dates(&options_table)?,
    };
    if let Some(current) = expiries.first() {
        info!("current expiry {}", current);
    }

    println!("{}", "Step 2: Opening prices...".cyan());
    let opening_prices = load_or_fetch_opening_prices(client, instr, &symbols).await?;
    println!("{} {} opening prices", "✓".green(), opening_prices.len());

    println!("{}", "Step 3: Processing instruments...".cyan());
    let merge_cfg = MergeConfig {
        band_percent: instr.band_percent,
        price_multiple: instr.price_multiple,
        keep_only_central_strikes: instr.keep_only_central_strikes,
    };
    let now = Local::now().time();
    let results = process_batch(
        records,
        &symbols,
        &opening_prices,
        &merge_cfg,
        criteria,
        now,
        dashboard,
    );

    println!("{}", "Step 4: Writing tables...".cyan());
    for result in &results {
        if result.failed() {
            continue;
        }
        sink::write_table(&cfg.output_dir, &result.symbol, &result.rows)?;
    }

    let levels_table: Vec<_> = results
        .iter()
        .filter_map(|r| {
            r.levels.map(|l| {
                serde_json::json!({
                    "SYMBOL": r.symbol,
                    "SUPPORT1": l.support1,
                    "SUPPORT2": l.support2,
                    "RESISTANCE1": l.resistance1,
                    "RESISTANCE2": l.resistance2,
                })
            })
        })
        .collect();
    sink::write_table(&cfg.output_dir, "levels", &levels_table)?;
    sink::write_table(&cfg.output_dir, "dashboard", &dashboard)?;
    println!(
        "{} Wrote {} instrument tables + levels + dashboard ({} rows)",
        "✓".green(),
        results.iter().filter(|r| !r.failed()).count(),
        dashboard.len()
    );

    Ok(RunOutcome::Processed(results))
}

/// Opening prices from the snapshot file when configured and present,
/// otherwise live quotes (saved back as the next snapshot).
async fn load_or_fetch_opening_prices(
    client: &MarketDataClient,
    instr: &InstrumentConfig,
    symbols: &[String],
) -> Result<BTreeMap<String, f64>> {
    if let Some(path) = &instr.opening_prices_snapshot {
        if Path::new(path).exists() {
            info!("loading opening prices from snapshot {}", path);
            return sink::load_opening_prices(path);
        }
    }

    let prices = client.fetch_opening_prices(symbols).await?;
    if let Some(path) = &instr.opening_prices_snapshot {
        sink::save_opening_prices(path, &prices)?;
    }
    Ok(prices)
}

fn print_summary(results: &[InstrumentResult]) {
    let ok = results.iter().filter(|r| !r.failed()).count();
    let failed = results.len() - ok;
    let row_errors: usize = results.iter().map(|r| r.row_errors).sum();

    println!();
    println!("{}", "=".repeat(60).blue());
    println!("{}", "Summary".cyan().bold());
    println!("{}", "=".repeat(60).blue());
    println!("{} Processed: {}", "✓".green(), ok);
    println!("{} Failed: {}", "✗".red(), failed);
    if row_errors > 0 {
        println!("{} Rows with conversion errors: {}", "⚠".yellow(), row_errors);
    }

    if failed > 0 {
        println!("{}", "Failed instruments:".red());
        for result in results.iter().filter(|r| r.failed()) {
            if let Some(error) = &result.error {
                println!("  {} {} → {}", "✗".red(), result.symbol.yellow(), error);
            }
        }
    }
    println!();
}
