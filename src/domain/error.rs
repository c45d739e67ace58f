//! Domain error types.

/// An indicator that cannot produce a value yet.
///
/// Callers treat this as "not ready" and skip the bar; it is never replaced by a
/// zero default.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndicatorError {
    #[error("insufficient history for {indicator}: have {have} samples, need {need}")]
    InsufficientHistory {
        indicator: String,
        have: usize,
        need: usize,
    },
}

/// A statistic that has no defined value for the given journal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricsError {
    #[error("{metric} is undefined: {reason}")]
    Undefined { metric: String, reason: String },
}

/// Top-level error type for pulltrader.
#[derive(Debug, thiserror::Error)]
pub enum PulltraderError {
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

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {symbol}")]
    NoData { symbol: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PulltraderError {
    pub fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        PulltraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&PulltraderError> for std::process::ExitCode {
    fn from(err: &PulltraderError) -> Self {
        let code: u8 = match err {
            PulltraderError::Io(_) | PulltraderError::Json(_) => 1,
            PulltraderError::ConfigParse { .. }
            | PulltraderError::ConfigMissing { .. }
            | PulltraderError::ConfigInvalid { .. } => 2,
            PulltraderError::Data { .. } | PulltraderError::Csv(_) => 3,
            PulltraderError::NoData { .. } | PulltraderError::InsufficientData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
