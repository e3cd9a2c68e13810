use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Configuration for logging.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
    pub include_file: bool,
    pub include_line: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
            include_file: false,
            include_line: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initializes the logging system with the given configuration.
pub fn init_logging(config: &LogConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(config.include_target)
                .with_file(config.include_file)
                .with_line_number(config.include_line)
                .with_span_events(FmtSpan::CLOSE);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(config.include_target)
                .with_file(config.include_file)
                .with_line_number(config.include_line);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(config.include_target)
                .with_file(config.include_file)
                .with_line_number(config.include_line);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
    }

    tracing::info!("Logging initialized with level: {}", config.level);
}

/// Masks sensitive data in strings such as client idempotency keys.
pub fn mask_sensitive(value: &str, visible_chars: usize) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= visible_chars * 2 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..visible_chars].iter().collect();
    let suffix: String = chars[chars.len() - visible_chars..].iter().collect();
    let masked_len = chars.len() - (visible_chars * 2);

    format!("{}{}{}", prefix, "*".repeat(masked_len), suffix)
}

impl LogConfig {
    pub fn new(level: impl Into<String>, format: LogFormat) -> Self {
        Self {
            level: level.into(),
            format,
            ..Self::default()
        }
    }
}
