pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod levels;
pub mod logging;
pub mod merger;
pub mod models;
pub mod normalizer;
pub mod nse_client;
pub mod processor;
pub mod sink;

// Re-exports (public API)
pub use classifier::{classify_rows, ActivityCriterion, CriteriaSet, SelectedCriteria};
pub use config::AppConfig;
pub use dashboard::append_to_dashboard;
pub use error::{AnalyzerError, RowError};
pub use levels::derive_levels;
pub use merger::{merge_option_chain, MergeConfig, MergeOutcome};
pub use models::{
    ActivityFlags, DashboardRow, InstrumentKind, InstrumentRecord, MergedStrikeRow, OptionType,
    RawTable, SideQuote, SupportResistanceLevels,
};
pub use nse_client::MarketDataClient;
pub use processor::{process_batch, InstrumentResult};
