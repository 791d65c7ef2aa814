// ABOUTME: Structured logging setup driven by environment variables
// ABOUTME: Tracing subscriber with level, format and noise-reduction directives

// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Gatehouse Contributors

//! Logging initialization. `RUST_LOG` sets the base level, `LOG_FORMAT`
//! selects json/pretty/compact output, and chatty dependencies are capped
//! independently of the requested level.

use anyhow::Result;
use std::env;
use std::io;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Base log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
    /// Environment name, logged at startup
    pub environment: String,
}

/// Log output format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    /// JSON lines for production log pipelines
    Json,
    /// Human-readable output for development
    Pretty,
    /// Single-line output for space-constrained environments
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
            include_location: false,
            environment: "development".into(),
        }
    }
}

impl LoggingConfig {
    /// Read logging configuration from the environment
    #[must_use]
    pub fn from_env() -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());
        Self {
            level: env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                Ok("compact") => LogFormat::Compact,
                _ => LogFormat::Pretty,
            },
            include_location: environment == "production"
                || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            environment,
        }
    }

    /// Install the global tracing subscriber
    ///
    /// # Errors
    ///
    /// Returns an error if a subscriber is already installed
    pub fn init(&self) -> Result<()> {
        let filter = self.env_filter();
        let registry = tracing_subscriber::registry().with(filter);

        let layer = fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_writer(io::stdout)
            .with_span_events(FmtSpan::NONE);

        match self.format {
            LogFormat::Json => registry.with(layer.json()).init(),
            LogFormat::Pretty => registry.with(layer).init(),
            LogFormat::Compact => registry.with(layer.compact().with_target(false)).init(),
        }

        info!(
            service.version = env!("CARGO_PKG_VERSION"),
            environment = %self.environment,
            log.level = %self.level,
            log.format = ?self.format,
            "Logging initialized"
        );
        Ok(())
    }

    /// Dependency noise is capped regardless of the requested base level
    fn env_filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::new(&self.level);
        for directive in [
            "hyper=warn",
            "reqwest=warn",
            "sled=info",
            "warp::server=info",
            &format!("gatehouse_mcp_server={}", self.level),
        ] {
            if let Ok(parsed) = directive.parse() {
                filter = filter.add_directive(parsed);
            }
        }
        filter
    }
}

/// Initialize logging from environment variables
///
/// # Errors
///
/// Returns an error if the subscriber cannot be installed
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}
