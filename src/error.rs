use thiserror::Error;

/// Problems with the usage history itself. Any of these rejects the whole request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UsageError {
    #[error("no valid interval readings found in usage feed")]
    NoValidReadings,

    #[error("insufficient usage history: found {found} months, need at least {required}")]
    InsufficientHistory { found: usize, required: usize },

    #[error("negative usage recorded for {month} ({total_kwh} kWh)")]
    NegativeUsage { month: String, total_kwh: f64 },

    #[error("usage history spans {found} days, need at least {required}")]
    ShortDateSpan { found: i64, required: i64 },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("malformed usage feed: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("plan catalog is empty")]
    EmptyCatalog,

    #[error("plan '{0}' not found in catalog")]
    UnknownPlan(String),

    #[error("preferences must sum to 100 (cost {cost} + renewable {renewable})")]
    InvalidPreferences { cost: f64, renewable: f64 },

    #[error("malformed usage feed: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Settings(#[from] config::ConfigError),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
