use crate::classifier::{classify_rows, CriteriaSet};
use crate::dashboard::append_to_dashboard;
use crate::error::AnalyzerError;
use crate::levels::derive_levels;
use crate::merger::{merge_option_chain, MergeConfig};
use crate::models::{DashboardRow, InstrumentRecord, MergedStrikeRow, SupportResistanceLevels};
use chrono::NaiveTime;
use std::collections::BTreeMap;
use tracing::warn;

/// Outcome of one instrument's pass through the pipeline. `error` is set
/// only for instrument-level failures (the instrument emitted nothing);
/// row-scoped conversion failures are counted in `row_errors` and the rest
/// of the table stands.
#[derive(Debug)]
pub struct InstrumentResult {
    pub symbol: String,
    pub rows: Vec<MergedStrikeRow>,
    pub levels: Option<SupportResistanceLevels>,
    pub row_errors: usize,
    pub error: Option<AnalyzerError>,
}

impl InstrumentResult {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Process every instrument of a batch sequentially: merge, classify,
/// derive levels, extend the dashboard. The classification criteria are
/// selected once from `now` (the clock captured at batch start) so all
/// rows of the batch see the same window boundary. A failing instrument
/// never takes the rest of the batch down with it.
pub fn process_batch(
    records: Vec<InstrumentRecord>,
    symbols: &[String],
    opening_prices: &BTreeMap<String, f64>,
    merge_cfg: &MergeConfig,
    criteria: &CriteriaSet,
    now: NaiveTime,
    dashboard: &mut Vec<DashboardRow>,
) -> Vec<InstrumentResult> {
    let selected = criteria.select(now);

    let mut by_symbol: BTreeMap<&str, Vec<InstrumentRecord>> = BTreeMap::new();
    for record in records {
        let Some(symbol) = symbols.iter().find(|s| **s == record.symbol) else {
            continue;
        };
        by_symbol.entry(symbol.as_str()).or_default().push(record);
    }

    let mut results = Vec::with_capacity(symbols.len());

    for symbol in symbols {
        let instrument_records = by_symbol.remove(symbol.as_str()).unwrap_or_default();

        let outcome = merge_option_chain(instrument_records, opening_prices, merge_cfg);
        if let Some(error) = outcome.skipped.into_iter().next() {
            warn!(symbol = %symbol, %error, "instrument skipped");
            results.push(InstrumentResult {
                symbol: symbol.clone(),
                rows: Vec::new(),
                levels: None,
                row_errors: 0,
                error: Some(error),
            });
            continue;
        }

        let mut rows = outcome.rows;
        let row_errors = classify_rows(&mut rows, &selected);
        for row_error in &row_errors {
            warn!("{}", row_error);
        }

        let levels = if rows.is_empty() {
            None
        } else {
            match derive_levels(&rows) {
                Ok(levels) => Some(levels),
                Err(error) => {
                    warn!(symbol = %symbol, %error, "no support/resistance levels");
                    None
                }
            }
        };

        append_to_dashboard(dashboard, symbol, &rows);

        results.push(InstrumentResult {
            symbol: symbol.clone(),
            rows,
            levels,
            row_errors: row_errors.len(),
            error: None,
        });
    }

    results
}
