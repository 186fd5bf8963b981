use crate::error::AnalyzerError;
use crate::models::{MergedStrikeRow, SideQuote, SupportResistanceLevels};
use std::cmp::Ordering;

/// Derive support/resistance strike prices for one instrument from traded
/// volume concentration: supports from the two highest-volume PE rows,
/// resistances from the two highest-volume CE rows. Equal volumes resolve
/// by ascending strike. Rows with an absent side or a non-numeric volume
/// do not take part in that side's ranking.
pub fn derive_levels(rows: &[MergedStrikeRow]) -> Result<SupportResistanceLevels, AnalyzerError> {
    let (pe_top, pe_second) = top_two(rows, |row| row.put.as_ref(), "PE")?;
    let (ce_top, ce_second) = top_two(rows, |row| row.call.as_ref(), "CE")?;

    Ok(SupportResistanceLevels {
        support1: pe_second,
        support2: pe_top,
        resistance1: ce_top,
        resistance2: ce_second,
    })
}

fn top_two(
    rows: &[MergedStrikeRow],
    side: impl Fn(&MergedStrikeRow) -> Option<&SideQuote>,
    label: &str,
) -> Result<(f64, f64), AnalyzerError> {
    let mut ranked: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|row| {
            let volume: f64 = side(row)?.total_traded_volume.trim().parse().ok()?;
            Some((row.strike_price, volume))
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
    });

    let top = ranked.first().map(|(strike, _)| *strike);
    let second = ranked
        .iter()
        .map(|(strike, _)| *strike)
        .find(|strike| Some(*strike) != top);

    match (top, second) {
        (Some(top), Some(second)) => Ok((top, second)),
        _ => Err(AnalyzerError::InsufficientData(format!(
            "need two distinct {} strikes with traded volume",
            label
        ))),
    }
}
