use crate::config::TableConfig;
use crate::error::AnalyzerError;
use crate::models::{InstrumentRecord, OptionType, RawTable, SideQuote};
use chrono::NaiveDate;

/// Canonical shared key columns every normalized table must carry.
pub const COL_SYMBOL: &str = "Symbol";
pub const COL_EXPIRY: &str = "ExpiryDate";
pub const COL_STRIKE: &str = "StrikePrice";
pub const COL_OPTION_TYPE: &str = "OptionType";

/// Normalize a raw tabular extract into the canonical schema:
/// rename columns, split compound columns into named parts (split specs
/// refer to the renamed names), strip `%`/`,` punctuation from the split
/// parts, and remove spaces from every header name.
///
/// Pure transform: the input table is never touched.
pub fn normalize(table: &RawTable, cfg: &TableConfig) -> Result<RawTable, AnalyzerError> {
    let mut columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| cfg.rename.get(c).cloned().unwrap_or_else(|| c.clone()))
        .collect();
    let mut rows: Vec<Vec<String>> = table.rows.clone();

    for spec in &cfg.split {
        let src = match columns.iter().position(|c| *c == spec.column) {
            Some(idx) => idx,
            None if spec.optional => continue,
            None => return Err(AnalyzerError::Schema(spec.column.clone())),
        };

        for row in rows.iter_mut() {
            let cell = row.get(src).cloned().unwrap_or_default();
            let mut parts: Vec<String> = cell
                .split(spec.delimiter.as_str())
                .filter(|p| !p.is_empty())
                .map(clean_numeric_text)
                .collect();
            parts.resize(spec.into.len(), String::new());
            if src < row.len() {
                row.remove(src);
            }
            row.extend(parts);
        }
        columns.remove(src);
        columns.extend(spec.into.iter().cloned());
    }

    for col in columns.iter_mut() {
        col.retain(|ch| ch != ' ');
    }

    Ok(RawTable { columns, rows })
}

/// Strip the thousands/percent punctuation the sources decorate numbers with.
fn clean_numeric_text(part: &str) -> String {
    part.chars().filter(|ch| *ch != ',' && *ch != '%').collect()
}

/// Typed extraction result: parsed option rows plus the row-scoped
/// failures that were skipped (by source row index).
#[derive(Debug)]
pub struct Extraction {
    pub records: Vec<InstrumentRecord>,
    pub skipped: Vec<(usize, AnalyzerError)>,
}

/// Extract one `InstrumentRecord` per CE/PE row of a normalized options
/// table. Symbol, expiry, strike and option type are required columns;
/// a quote column the source never carried just yields an empty field.
/// Rows with an unparseable strike are skipped and recorded; rows with an
/// option type other than CE/PE are not option contracts and are dropped.
pub fn extract_option_records(table: &RawTable) -> Result<Extraction, AnalyzerError> {
    for required in [COL_SYMBOL, COL_EXPIRY, COL_STRIKE, COL_OPTION_TYPE] {
        if table.column_index(required).is_none() {
            return Err(AnalyzerError::Schema(required.to_string()));
        }
    }

    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for (idx, row) in table.rows.iter().enumerate() {
        let option_type = match table.cell(row, COL_OPTION_TYPE) {
            Some("CE") => OptionType::CE,
            Some("PE") => OptionType::PE,
            _ => continue,
        };

        let strike_text = table.cell(row, COL_STRIKE).unwrap_or("").trim();
        let strike_price: f64 = match strike_text.parse() {
            Ok(v) => v,
            Err(_) => {
                skipped.push((
                    idx,
                    AnalyzerError::ValueConversion {
                        column: COL_STRIKE.to_string(),
                        value: strike_text.to_string(),
                    },
                ));
                continue;
            }
        };

        let text = |name: &str| table.cell(row, name).unwrap_or("").trim().to_string();

        records.push(InstrumentRecord {
            symbol: text(COL_SYMBOL),
            expiry_date: text(COL_EXPIRY),
            strike_price,
            option_type,
            quote: SideQuote {
                last_price: text("lastPrice"),
                change: text("change"),
                p_change: text("pChange"),
                open_interest: text("openInterest"),
                oi_change: text("OIChange"),
                p_oi_change: text("pOIChange"),
                total_traded_volume: text("totalTradedVolume"),
                total_traded_value: text("totalTradedValue"),
            },
        });
    }

    Ok(Extraction { records, skipped })
}

/// Apply the configured symbol include/exclude lists.
pub fn filter_symbols(
    records: &mut Vec<InstrumentRecord>,
    include: Option<&[String]>,
    exclude: Option<&[String]>,
) {
    if let Some(exclude) = exclude {
        records.retain(|r| !exclude.contains(&r.symbol));
    }
    if let Some(include) = include {
        records.retain(|r| include.contains(&r.symbol));
    }
}

/// Same filters for a bare symbol list (discovery output).
pub fn filter_symbol_names(
    symbols: &mut Vec<String>,
    include: Option<&[String]>,
    exclude: Option<&[String]>,
) {
    if let Some(exclude) = exclude {
        symbols.retain(|s| !exclude.contains(s));
    }
    if let Some(include) = include {
        symbols.retain(|s| include.contains(s));
    }
}

/// Distinct symbols of a normalized table in first-occurrence order.
pub fn distinct_symbols(table: &RawTable) -> Result<Vec<String>, AnalyzerError> {
    let idx = table
        .column_index(COL_SYMBOL)
        .ok_or_else(|| AnalyzerError::Schema(COL_SYMBOL.to_string()))?;

    let mut symbols: Vec<String> = Vec::new();
    for row in &table.rows {
        if let Some(symbol) = row.get(idx) {
            if !symbol.is_empty() && !symbols.contains(symbol) {
                symbols.push(symbol.clone());
            }
        }
    }
    Ok(symbols)
}

/// Distinct expiry dates of a normalized table, earliest first.
/// Dates are "%d-%b-%Y"; an unparseable date is a schema-level defect in
/// the source and fails the discovery.
pub fn distinct_expiry_dates(table: &RawTable) -> Result<Vec<String>, AnalyzerError> {
    let idx = table
        .column_index(COL_EXPIRY)
        .ok_or_else(|| AnalyzerError::Schema(COL_EXPIRY.to_string()))?;

    let mut dates: Vec<(NaiveDate, String)> = Vec::new();
    for row in &table.rows {
        let Some(text) = row.get(idx) else { continue };
        if text.is_empty() || dates.iter().any(|(_, s)| s == text) {
            continue;
        }
        let parsed = NaiveDate::parse_from_str(text, "%d-%b-%Y")
            .map_err(|e| AnalyzerError::Parse(format!("expiry date '{}': {}", text, e)))?;
        dates.push((parsed, text.clone()));
    }
    dates.sort_by_key(|(d, _)| *d);
    Ok(dates.into_iter().map(|(_, s)| s).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitSpec;
    use std::collections::BTreeMap;

    fn split_spec(column: &str, into: &[&str], optional: bool) -> SplitSpec {
        serde_json::from_value(serde_json::json!({
            "column": column,
            "into": into,
            "optional": optional,
        }))
        .unwrap()
    }

    fn table(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_rename_then_split_then_strip_spaces() {
        let raw = table(
            &["Sym", "Chg Pct", "Open Int"],
            &[&["RELIANCE", "12.5 2.3%", "1,200"]],
        );
        let cfg = TableConfig {
            url: String::new(),
            rename: BTreeMap::from([("Sym".to_string(), "Symbol".to_string())]),
            split: vec![split_spec("Chg Pct", &["change", "pChange"], false)],
        };

        let normalized = normalize(&raw, &cfg).unwrap();
        assert_eq!(normalized.columns, vec!["Symbol", "OpenInt", "change", "pChange"]);
        assert_eq!(normalized.rows[0], vec!["RELIANCE", "1,200", "12.5", "2.3"]);
    }

    #[test]
    fn test_split_pads_short_cells() {
        let raw = table(&["Chg Pct"], &[&["12.5"]]);
        let cfg = TableConfig {
            url: String::new(),
            rename: BTreeMap::new(),
            split: vec![split_spec("Chg Pct", &["change", "pChange"], false)],
        };

        let normalized = normalize(&raw, &cfg).unwrap();
        assert_eq!(normalized.rows[0], vec!["12.5", ""]);
    }

    #[test]
    fn test_missing_split_column() {
        let raw = table(&["Symbol"], &[&["ACC"]]);
        let required = TableConfig {
            url: String::new(),
            rename: BTreeMap::new(),
            split: vec![split_spec("Chg Pct", &["change", "pChange"], false)],
        };
        let optional = TableConfig {
            url: String::new(),
            rename: BTreeMap::new(),
            split: vec![split_spec("Chg Pct", &["change", "pChange"], true)],
        };

        assert!(matches!(
            normalize(&raw, &required),
            Err(AnalyzerError::Schema(col)) if col == "Chg Pct"
        ));
        // Optional split is skipped when the source column is absent.
        let normalized = normalize(&raw, &optional).unwrap();
        assert_eq!(normalized.columns, vec!["Symbol"]);
    }

    #[test]
    fn test_extract_partitions_and_skips_bad_strikes() {
        let normalized = table(
            &["Symbol", "ExpiryDate", "StrikePrice", "OptionType", "pChange", "pOIChange"],
            &[
                &["ACC", "30-Dec-2025", "100", "CE", "1.0", "2.0"],
                &["ACC", "30-Dec-2025", "100", "PE", "-1.0", "3.0"],
                &["ACC", "30-Dec-2025", "n/a", "CE", "1.0", "2.0"],
                &["ACC", "30-Dec-2025", "100", "XX", "1.0", "2.0"],
            ],
        );

        let extraction = extract_option_records(&normalized).unwrap();
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].option_type, OptionType::CE);
        assert_eq!(extraction.records[1].option_type, OptionType::PE);
        assert_eq!(extraction.records[0].quote.p_change, "1.0");
        // The unparseable strike is recorded, not fatal.
        assert_eq!(extraction.skipped.len(), 1);
        assert!(matches!(
            extraction.skipped[0].1,
            AnalyzerError::ValueConversion { .. }
        ));
    }

    #[test]
    fn test_extract_requires_key_columns() {
        let normalized = table(&["Symbol", "ExpiryDate", "OptionType"], &[]);
        assert!(matches!(
            extract_option_records(&normalized),
            Err(AnalyzerError::Schema(col)) if col == "StrikePrice"
        ));
    }

    #[test]
    fn test_symbol_filters() {
        let normalized = table(
            &["Symbol", "ExpiryDate", "StrikePrice", "OptionType"],
            &[
                &["ACC", "30-Dec-2025", "100", "CE"],
                &["ZYDUSLIFE", "30-Dec-2025", "200", "CE"],
                &["RELIANCE", "30-Dec-2025", "300", "CE"],
            ],
        );
        let mut records = extract_option_records(&normalized).unwrap().records;

        filter_symbols(&mut records, None, Some(&["ZYDUSLIFE".to_string()]));
        assert_eq!(records.len(), 2);

        filter_symbols(&mut records, Some(&["ACC".to_string()]), None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol, "ACC");
    }

    #[test]
    fn test_symbol_and_expiry_discovery() {
        let futures = table(
            &["Symbol", "ExpiryDate"],
            &[
                &["RELIANCE", "27-Jan-2026"],
                &["ACC", "30-Dec-2025"],
                &["RELIANCE", "30-Dec-2025"],
            ],
        );

        assert_eq!(distinct_symbols(&futures).unwrap(), vec!["RELIANCE", "ACC"]);
        // Earliest expiry first regardless of row order.
        assert_eq!(
            distinct_expiry_dates(&futures).unwrap(),
            vec!["30-Dec-2025", "27-Jan-2026"]
        );
    }
}
