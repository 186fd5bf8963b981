use serde::{Deserialize, Serialize};

/// Tabular hand-off format from the scraper collaborator: a header row plus
/// string cells. All normalization happens against this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.column_index(name)
            .and_then(|idx| row.get(idx))
            .map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionType {
    CE,
    PE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentKind {
    Options,
    Futures,
}

/// Per-side quote columns in canonical form. Values stay as cleaned text;
/// numeric coercion happens in the consumer that needs it, so one bad cell
/// fails one evaluation rather than the whole ingest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideQuote {
    #[serde(rename = "lastPrice")]
    pub last_price: String,

    #[serde(rename = "change")]
    pub change: String,

    #[serde(rename = "pChange")]
    pub p_change: String,

    #[serde(rename = "openInterest")]
    pub open_interest: String,

    #[serde(rename = "OIChange")]
    pub oi_change: String,

    #[serde(rename = "pOIChange")]
    pub p_oi_change: String,

    #[serde(rename = "totalTradedVolume")]
    pub total_traded_volume: String,

    #[serde(rename = "totalTradedValue")]
    pub total_traded_value: String,
}

/// One normalized row for one option contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentRecord {
    #[serde(rename = "Symbol")]
    pub symbol: String,

    #[serde(rename = "ExpiryDate")]
    pub expiry_date: String,

    #[serde(rename = "StrikePrice")]
    pub strike_price: f64,

    #[serde(rename = "OptionType")]
    pub option_type: OptionType,

    #[serde(flatten)]
    pub quote: SideQuote,
}

/// Activity flags set by the classifier and mutated nowhere else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFlags {
    #[serde(rename = "CE.WRITING")]
    pub ce_writing: bool,

    #[serde(rename = "PE.WRITING")]
    pub pe_writing: bool,

    #[serde(rename = "CE.UNWINDING")]
    pub ce_unwinding: bool,

    #[serde(rename = "PE.UNWINDING")]
    pub pe_unwinding: bool,
}

impl ActivityFlags {
    pub fn any(&self) -> bool {
        self.ce_writing || self.pe_writing || self.ce_unwinding || self.pe_unwinding
    }
}

/// One row per (symbol, expiry, strike) with CE and PE sides side by side.
/// A strike missing one side has `None` there (outer join).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedStrikeRow {
    #[serde(rename = "Symbol")]
    pub symbol: String,

    #[serde(rename = "ExpiryDate")]
    pub expiry_date: String,

    #[serde(rename = "StrikePrice")]
    pub strike_price: f64,

    #[serde(rename = "CE")]
    pub call: Option<SideQuote>,

    #[serde(rename = "PE")]
    pub put: Option<SideQuote>,

    #[serde(flatten)]
    pub flags: ActivityFlags,

    /// Legacy mode only: in-band marker instead of dropping out-of-band strikes.
    #[serde(rename = "Display", skip_serializing_if = "Option::is_none")]
    pub display: Option<bool>,
}

/// Strike prices with the highest traded-volume concentration per side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupportResistanceLevels {
    pub support1: f64,
    pub support2: f64,
    pub resistance1: f64,
    pub resistance2: f64,
}

/// Dashboard projection of an active strike. Activity cells hold the
/// semantic tag string when the flag is set, null otherwise, in the fixed
/// order PE writing, PE unwinding, CE writing, CE unwinding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRow {
    #[serde(rename = "SYMBOL")]
    pub symbol: String,

    #[serde(rename = "STRIKE PRICE")]
    pub strike_price: f64,

    #[serde(rename = "ACTIVITY1")]
    pub pe_writing: Option<String>,

    #[serde(rename = "ACTIVITY2")]
    pub pe_unwinding: Option<String>,

    #[serde(rename = "ACTIVITY3")]
    pub ce_writing: Option<String>,

    #[serde(rename = "ACTIVITY4")]
    pub ce_unwinding: Option<String>,
}
