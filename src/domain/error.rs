//! Domain error types.

use crate::domain::candle::Candle;

/// Failure of a single page request against one endpoint.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// Network failure, timeout, HTTP error status or a non-zero API code.
    #[error("transient network error: {reason}")]
    Transient { reason: String },

    /// The response arrived but could not be interpreted as candles.
    #[error("malformed response: {reason}")]
    Format { reason: String },
}

/// Terminal failure of a paginated history fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("all endpoints failed after {attempts} attempts: {last_error}")]
    EndpointsExhausted {
        partial: Vec<Candle>,
        attempts: usize,
        last_error: String,
    },

    #[error("data format error: {reason}")]
    DataFormat { reason: String },

    #[error("fetch cancelled")]
    Cancelled { partial: Vec<Candle> },

    #[error("no endpoints configured")]
    NoEndpoints,
}

impl FetchError {
    /// Candles accumulated before the failure, if the variant carries any.
    pub fn partial(&self) -> &[Candle] {
        match self {
            FetchError::EndpointsExhausted { partial, .. } | FetchError::Cancelled { partial } => {
                partial
            }
            FetchError::DataFormat { .. } | FetchError::NoEndpoints => &[],
        }
    }
}

/// Top-level error type for bandtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
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

    #[error("fetching {symbol} {timeframe} failed: {source}")]
    Fetch {
        symbol: String,
        timeframe: String,
        #[source]
        source: FetchError,
    },

    #[error("cache error: {reason}")]
    Cache { reason: String },

    #[error("insufficient data for {symbol} {timeframe}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        timeframe: String,
        bars: usize,
        minimum: usize,
    },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error("trade log error: {reason}")]
    TradeLog { reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            TraderError::Io(_) | TraderError::Cancelled => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Fetch { .. } => 3,
            TraderError::Cache { .. } => 4,
            TraderError::InsufficientData { .. } => 5,
            TraderError::Report { .. } | TraderError::TradeLog { .. } => 6,
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
