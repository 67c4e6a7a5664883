//! Logger contract and the default `tracing`-backed sink.

use std::collections::HashMap;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs a global `tracing` subscriber that writes formatted output to
/// stdout, filtered by the `CORE_LOG` environment variable (`info` if unset).
/// A process embedding this crate calls this once at startup before routing
/// any packages.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("CORE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Severity levels accepted by the logger contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

/// Structured log sink, routed per-channel.
///
/// The default implementation forwards to `tracing`; downstream bootstraps
/// may inject an alternative sink (file, external aggregator, ...).
pub trait LogSink: Send + Sync {
    fn log(&self, channel: &str, level: LogLevel, message: &str, extra: &HashMap<String, String>);
}

/// Default sink: forwards to `tracing`, attaching `channel` and `extra` as
/// structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&self, channel: &str, level: LogLevel, message: &str, extra: &HashMap<String, String>) {
        let extra_str = format_extra(extra);
        match level {
            LogLevel::Debug => {
                tracing::debug!(channel, extra = %extra_str, "{message}")
            }
            LogLevel::Info => {
                tracing::info!(channel, extra = %extra_str, "{message}")
            }
            LogLevel::Warning => {
                tracing::warn!(channel, extra = %extra_str, "{message}")
            }
            LogLevel::Error => {
                tracing::error!(channel, extra = %extra_str, "{message}")
            }
            LogLevel::Critical => {
                tracing::error!(channel, extra = %extra_str, critical = true, "{message}")
            }
        }
    }
}

fn format_extra(extra: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> = extra.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join(",")
}
