//! Domain error taxonomy.

/// Top-level error type for tradewind.
#[derive(Debug, thiserror::Error)]
pub enum TradewindError {
    /// The market data feed is gone for good; the run aborts.
    #[error("feed unavailable after {failures} consecutive failures: {reason}")]
    FeedUnavailable { failures: u32, reason: String },

    /// A bar failed validation. Recoverable: the feed skips it with a warning.
    #[error("malformed bar for {symbol}: {reason}")]
    MalformedBar { symbol: String, reason: String },

    /// A fill would drive available cash negative. The intent is rejected
    /// without mutating the ledger.
    #[error("insufficient margin: required {required:.2}, available {available:.2}")]
    InsufficientMargin { required: f64, available: f64 },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("order timed out after {attempts} attempts")]
    OrderTimeout { attempts: u32 },

    /// The executor has already consumed this intent id.
    #[error("duplicate intent {intent_id}")]
    DuplicateIntent { intent_id: u64 },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("no data for {symbol} ({timeframe})")]
    NoData { symbol: String, timeframe: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&TradewindError> for std::process::ExitCode {
    fn from(err: &TradewindError) -> Self {
        let code: u8 = match err {
            TradewindError::Io(_) | TradewindError::Report { .. } => 1,
            TradewindError::ConfigParse { .. }
            | TradewindError::ConfigMissing { .. }
            | TradewindError::ConfigInvalid { .. } => 2,
            TradewindError::UnknownStrategy { .. } => 3,
            TradewindError::NoData { .. }
            | TradewindError::MalformedBar { .. }
            | TradewindError::FeedUnavailable { .. } => 4,
            TradewindError::InsufficientMargin { .. }
            | TradewindError::OrderRejected { .. }
            | TradewindError::OrderTimeout { .. }
            | TradewindError::DuplicateIntent { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
