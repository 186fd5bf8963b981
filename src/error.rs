use std::fmt;

#[derive(Debug, Clone)]
pub enum AnalyzerError {
    /// A required column is absent from a raw table.
    Schema(String),
    /// A value could not be coerced to a number. Row-scoped: recorded,
    /// never aborts a batch.
    ValueConversion { column: String, value: String },
    /// Support/resistance ranking needs at least two distinct strikes per side.
    InsufficientData(String),
    /// No opening price for a symbol being merged.
    MissingReferenceData(String),
    Request(String),
    NonJsonResponse(String),
    Parse(String),
    Config(String),
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalyzerError::Schema(col) => write!(f, "Schema error: required column '{}' is missing", col),
            AnalyzerError::ValueConversion { column, value } => {
                write!(f, "Value conversion error: column '{}' holds non-numeric '{}'", column, value)
            }
            AnalyzerError::InsufficientData(msg) => write!(f, "Insufficient data: {}", msg),
            AnalyzerError::MissingReferenceData(symbol) => {
                write!(f, "Missing reference data: no opening price for '{}'", symbol)
            }
            AnalyzerError::Request(msg) => write!(f, "Request error: {}", msg),
            AnalyzerError::NonJsonResponse(preview) => write!(f, "Non-JSON response: {}", preview),
            AnalyzerError::Parse(msg) => write!(f, "Parse error: {}", msg),
            AnalyzerError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for AnalyzerError {}

impl From<reqwest::Error> for AnalyzerError {
    fn from(err: reqwest::Error) -> Self {
        AnalyzerError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for AnalyzerError {
    fn from(err: serde_json::Error) -> Self {
        AnalyzerError::Parse(err.to_string())
    }
}

/// A row-scoped failure, recorded alongside the batch instead of aborting it.
#[derive(Debug, Clone)]
pub struct RowError {
    pub symbol: String,
    pub strike_price: f64,
    pub error: AnalyzerError,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} strike {}: {}", self.symbol, self.strike_price, self.error)
    }
}
