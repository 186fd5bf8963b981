use crate::config::{CriteriaConfig, CriterionSpec};
use crate::error::{AnalyzerError, RowError};
use crate::models::{ActivityFlags, MergedStrikeRow, SideQuote};
use chrono::NaiveTime;

/// One threshold pair valid during a `(start, end]` wall-clock window.
#[derive(Debug, Clone)]
pub struct ActivityCriterion {
    pub price_change_percent: f64,
    pub oi_change_percent: f64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub default: bool,
}

impl ActivityCriterion {
    fn from_spec(spec: &CriterionSpec) -> Result<Self, AnalyzerError> {
        Ok(Self {
            price_change_percent: spec.price_change_percent,
            oi_change_percent: spec.oi_change_percent,
            start_time: parse_clock(&spec.start_time)?,
            end_time: parse_clock(&spec.end_time)?,
            default: spec.default,
        })
    }

    /// Window membership: start exclusive, end inclusive.
    fn contains(&self, now: NaiveTime) -> bool {
        self.start_time < now && now <= self.end_time
    }
}

fn parse_clock(text: &str) -> Result<NaiveTime, AnalyzerError> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .map_err(|e| AnalyzerError::Config(format!("bad criterion time '{}': {}", text, e)))
}

/// The writing and unwinding criteria lists, loaded once per run and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct CriteriaSet {
    writing: Vec<ActivityCriterion>,
    unwinding: Vec<ActivityCriterion>,
}

/// The criteria picked for one batch. Selection happens once, from the
/// clock captured at batch start, so every row sees the same boundary.
#[derive(Debug, Clone, Copy)]
pub struct SelectedCriteria<'a> {
    pub writing: &'a ActivityCriterion,
    pub unwinding: &'a ActivityCriterion,
}

impl CriteriaSet {
    pub fn from_config(cfg: &CriteriaConfig) -> Result<Self, AnalyzerError> {
        Ok(Self {
            writing: parse_list("writing", &cfg.writing)?,
            unwinding: parse_list("unwinding", &cfg.unwinding)?,
        })
    }

    pub fn select(&self, now: NaiveTime) -> SelectedCriteria<'_> {
        SelectedCriteria {
            writing: select_one(&self.writing, now),
            unwinding: select_one(&self.unwinding, now),
        }
    }
}

fn parse_list(name: &str, specs: &[CriterionSpec]) -> Result<Vec<ActivityCriterion>, AnalyzerError> {
    let list = specs
        .iter()
        .map(ActivityCriterion::from_spec)
        .collect::<Result<Vec<_>, _>>()?;
    if !list.iter().any(|c| c.default) {
        return Err(AnalyzerError::Config(format!(
            "{} criteria need one entry flagged default",
            name
        )));
    }
    Ok(list)
}

fn select_one(list: &[ActivityCriterion], now: NaiveTime) -> &ActivityCriterion {
    // Construction guarantees a default entry, so the list is never empty.
    list.iter()
        .find(|c| c.contains(now))
        .or_else(|| list.iter().find(|c| c.default))
        .unwrap_or(&list[0])
}

/// Evaluate the four activity flags for every merged row against the
/// selected criteria. A non-numeric value on a present side leaves all
/// four flags of that row false and records one conversion error; the
/// batch itself never aborts.
pub fn classify_rows(rows: &mut [MergedStrikeRow], selected: &SelectedCriteria) -> Vec<RowError> {
    let mut errors = Vec::new();

    for row in rows.iter_mut() {
        row.flags = ActivityFlags::default();
        match evaluate_row(row.call.as_ref(), row.put.as_ref(), selected) {
            Ok(flags) => row.flags = flags,
            Err(error) => errors.push(RowError {
                symbol: row.symbol.clone(),
                strike_price: row.strike_price,
                error,
            }),
        }
    }

    errors
}

fn evaluate_row(
    call: Option<&SideQuote>,
    put: Option<&SideQuote>,
    selected: &SelectedCriteria,
) -> Result<ActivityFlags, AnalyzerError> {
    let mut flags = ActivityFlags::default();

    if let Some(ce) = call {
        let (p_change, p_oi_change) = side_numbers("CE", ce)?;
        flags.ce_writing = selected.writing.price_change_percent > p_change
            && selected.writing.oi_change_percent < p_oi_change;
        flags.ce_unwinding = selected.unwinding.price_change_percent < p_change
            && selected.unwinding.oi_change_percent > p_oi_change;
    }

    if let Some(pe) = put {
        let (p_change, p_oi_change) = side_numbers("PE", pe)?;
        flags.pe_writing = selected.writing.price_change_percent > p_change
            && selected.writing.oi_change_percent < p_oi_change;
        flags.pe_unwinding = selected.unwinding.price_change_percent < p_change
            && selected.unwinding.oi_change_percent > p_oi_change;
    }

    Ok(flags)
}

fn side_numbers(side: &str, quote: &SideQuote) -> Result<(f64, f64), AnalyzerError> {
    Ok((
        coerce(&format!("{}.pChange", side), &quote.p_change)?,
        coerce(&format!("{}.pOIChange", side), &quote.p_oi_change)?,
    ))
}

fn coerce(column: &str, value: &str) -> Result<f64, AnalyzerError> {
    value.trim().parse().map_err(|_| AnalyzerError::ValueConversion {
        column: column.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MergedStrikeRow;

    fn criterion(price: f64, oi: f64, start: &str, end: &str, default: bool) -> CriterionSpec {
        CriterionSpec {
            price_change_percent: price,
            oi_change_percent: oi,
            start_time: start.to_string(),
            end_time: end.to_string(),
            default,
        }
    }

    fn quote(p_change: &str, p_oi_change: &str) -> SideQuote {
        SideQuote {
            p_change: p_change.to_string(),
            p_oi_change: p_oi_change.to_string(),
            ..SideQuote::default()
        }
    }

    fn row(strike: f64, call: Option<SideQuote>, put: Option<SideQuote>) -> MergedStrikeRow {
        MergedStrikeRow {
            symbol: "ACC".to_string(),
            expiry_date: "30-Dec-2025".to_string(),
            strike_price: strike,
            call,
            put,
            flags: ActivityFlags::default(),
            display: None,
        }
    }

    fn single_criteria(writing: CriterionSpec, unwinding: CriterionSpec) -> CriteriaSet {
        CriteriaSet::from_config(&CriteriaConfig {
            writing: vec![writing],
            unwinding: vec![unwinding],
        })
        .unwrap()
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn test_writing_flag_set_when_both_thresholds_hold() {
        // Criterion {2, 1} vs row {pChange: 1, pOIChange: 5}: 2 > 1 and 1 < 5.
        let set = single_criteria(
            criterion(2.0, 1.0, "00:00:00", "23:59:59", true),
            criterion(-100.0, -100.0, "00:00:00", "23:59:59", true),
        );
        let selected = set.select(noon());
        let mut rows = vec![row(100.0, Some(quote("1", "5")), None)];

        let errors = classify_rows(&mut rows, &selected);
        assert!(errors.is_empty());
        assert!(rows[0].flags.ce_writing);
        assert!(!rows[0].flags.pe_writing);
    }

    #[test]
    fn test_writing_flag_needs_both_thresholds() {
        // Criterion {5, 10} vs row {pChange: 3, pOIChange: 5}: 5 > 3 holds
        // but 10 < 5 fails, so no writing flag.
        let set = single_criteria(
            criterion(5.0, 10.0, "00:00:00", "23:59:59", true),
            criterion(-100.0, -100.0, "00:00:00", "23:59:59", true),
        );
        let selected = set.select(noon());
        let mut rows = vec![row(100.0, Some(quote("3", "5")), None)];

        classify_rows(&mut rows, &selected);
        assert!(!rows[0].flags.ce_writing);
    }

    #[test]
    fn test_unwinding_flag() {
        // Unwinding {2, 10} vs PE row {pChange: 6, pOIChange: -12}:
        // 2 < 6 and 10 > -12.
        let set = single_criteria(
            criterion(100.0, -100.0, "00:00:00", "23:59:59", true),
            criterion(2.0, 10.0, "00:00:00", "23:59:59", true),
        );
        let selected = set.select(noon());
        let mut rows = vec![row(100.0, None, Some(quote("6", "-12")))];

        classify_rows(&mut rows, &selected);
        assert!(rows[0].flags.pe_unwinding);
        assert!(!rows[0].flags.ce_unwinding);
    }

    #[test]
    fn test_window_selection_half_open() {
        let morning = criterion(1.0, 1.0, "09:15:00", "12:00:00", false);
        let fallback = criterion(9.0, 9.0, "00:00:00", "23:59:59", true);
        let set = CriteriaSet::from_config(&CriteriaConfig {
            writing: vec![morning, fallback.clone()],
            unwinding: vec![fallback],
        })
        .unwrap();

        // Inside the window.
        let at_11 = set.select(NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        assert_eq!(at_11.writing.price_change_percent, 1.0);

        // End is inclusive.
        let at_noon = set.select(noon());
        assert_eq!(at_noon.writing.price_change_percent, 1.0);

        // Start is exclusive: 09:15:00 sharp falls through to the default.
        let at_open = set.select(NaiveTime::from_hms_opt(9, 15, 0).unwrap());
        assert_eq!(at_open.writing.price_change_percent, 9.0);
    }

    #[test]
    fn test_fallback_when_no_window_matches() {
        // Neither window covers 23:00; the entry flagged default wins even
        // though its own window does not match either.
        let set = CriteriaSet::from_config(&CriteriaConfig {
            writing: vec![
                criterion(1.0, 1.0, "09:15:00", "12:00:00", false),
                criterion(5.0, 5.0, "12:00:00", "15:30:00", true),
            ],
            unwinding: vec![criterion(7.0, 7.0, "09:15:00", "15:30:00", true)],
        })
        .unwrap();

        let late = set.select(NaiveTime::from_hms_opt(23, 0, 0).unwrap());
        assert_eq!(late.writing.price_change_percent, 5.0);
        assert_eq!(late.unwinding.price_change_percent, 7.0);
    }

    #[test]
    fn test_missing_default_rejected() {
        let result = CriteriaSet::from_config(&CriteriaConfig {
            writing: vec![criterion(1.0, 1.0, "09:15:00", "12:00:00", false)],
            unwinding: vec![criterion(1.0, 1.0, "00:00:00", "23:59:59", true)],
        });
        assert!(matches!(result, Err(AnalyzerError::Config(_))));
    }

    #[test]
    fn test_conversion_error_is_row_scoped() {
        let set = single_criteria(
            criterion(2.0, 1.0, "00:00:00", "23:59:59", true),
            criterion(-100.0, -100.0, "00:00:00", "23:59:59", true),
        );
        let selected = set.select(noon());
        let mut rows = vec![
            // CE side is fine, PE side is not numeric: whole row stays false.
            row(100.0, Some(quote("1", "5")), Some(quote("-", "5"))),
            row(105.0, Some(quote("1", "5")), None),
        ];

        let errors = classify_rows(&mut rows, &selected);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].strike_price, 100.0);
        assert!(matches!(
            errors[0].error,
            AnalyzerError::ValueConversion { .. }
        ));
        assert_eq!(rows[0].flags, ActivityFlags::default());
        // The neighbouring row still classifies.
        assert!(rows[1].flags.ce_writing);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let set = single_criteria(
            criterion(2.0, 1.0, "00:00:00", "23:59:59", true),
            criterion(-1.0, 4.0, "00:00:00", "23:59:59", true),
        );
        let selected = set.select(noon());
        let mut rows = vec![row(100.0, Some(quote("1", "5")), Some(quote("0", "2")))];

        classify_rows(&mut rows, &selected);
        let first = rows[0].flags;
        classify_rows(&mut rows, &selected);
        assert_eq!(rows[0].flags, first);
    }
}
