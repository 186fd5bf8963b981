use crate::error::AnalyzerError;
use crate::models::{ActivityFlags, InstrumentRecord, MergedStrikeRow, OptionType};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Symmetric band around the opening price, in percent of it.
    pub band_percent: f64,
    /// Strikes must be divisible by this to stay visible. Non-positive
    /// disables the divisibility check.
    pub price_multiple: f64,
    /// Drop out-of-band strikes when set; otherwise keep everything and
    /// mark in-band strikes via the legacy `Display` column.
    pub keep_only_central_strikes: bool,
}

/// Merged rows plus the per-symbol skips (missing opening price) that were
/// surfaced instead of silently dropping the group.
#[derive(Debug)]
pub struct MergeOutcome {
    pub rows: Vec<MergedStrikeRow>,
    pub skipped: Vec<AnalyzerError>,
}

/// Full outer join of CE and PE rows on (symbol, expiry, strike), followed
/// by the strike-band filter per (symbol, expiry) group. Output is sorted
/// ascending by strike within each group, groups ordered by symbol then
/// expiry.
pub fn merge_option_chain(
    records: Vec<InstrumentRecord>,
    opening_prices: &BTreeMap<String, f64>,
    cfg: &MergeConfig,
) -> MergeOutcome {
    let mut rows: Vec<MergedStrikeRow> = Vec::new();
    let mut index: HashMap<(String, String, u64), usize> = HashMap::new();

    for record in records {
        let key = (
            record.symbol.clone(),
            record.expiry_date.clone(),
            record.strike_price.to_bits(),
        );
        let at = *index.entry(key).or_insert_with(|| {
            rows.push(MergedStrikeRow {
                symbol: record.symbol.clone(),
                expiry_date: record.expiry_date.clone(),
                strike_price: record.strike_price,
                call: None,
                put: None,
                flags: ActivityFlags::default(),
                display: None,
            });
            rows.len() - 1
        });

        let row = &mut rows[at];
        let side = match record.option_type {
            OptionType::CE => &mut row.call,
            OptionType::PE => &mut row.put,
        };
        if side.is_some() {
            warn!(
                symbol = %record.symbol,
                strike = record.strike_price,
                "duplicate {:?} row, keeping the later one",
                record.option_type
            );
        }
        *side = Some(record.quote);
    }

    rows.sort_by(|a, b| {
        (a.symbol.as_str(), a.expiry_date.as_str())
            .cmp(&(b.symbol.as_str(), b.expiry_date.as_str()))
            .then(
                a.strike_price
                    .partial_cmp(&b.strike_price)
                    .unwrap_or(Ordering::Equal),
            )
    });

    let mut out = Vec::with_capacity(rows.len());
    let mut skipped: Vec<AnalyzerError> = Vec::new();
    let mut skipped_symbols: Vec<String> = Vec::new();

    for row in rows {
        let Some(open) = opening_prices.get(&row.symbol) else {
            if !skipped_symbols.contains(&row.symbol) {
                skipped_symbols.push(row.symbol.clone());
                skipped.push(AnalyzerError::MissingReferenceData(row.symbol.clone()));
            }
            continue;
        };

        let delta = open * cfg.band_percent / 100.0;
        let in_band = (open - delta) <= row.strike_price
            && row.strike_price <= (open + delta)
            && is_price_multiple(row.strike_price, cfg.price_multiple);

        if cfg.keep_only_central_strikes {
            if in_band {
                out.push(row);
            }
        } else {
            let mut row = row;
            row.display = Some(in_band);
            out.push(row);
        }
    }

    MergeOutcome { rows: out, skipped }
}

fn is_price_multiple(strike: f64, multiple: f64) -> bool {
    if multiple <= 0.0 {
        return true;
    }
    let rem = strike.rem_euclid(multiple);
    rem < 1e-9 || (multiple - rem) < 1e-9
}
