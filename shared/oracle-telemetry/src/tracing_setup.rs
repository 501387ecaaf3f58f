//! Tracing Setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// HTTP client internals log every long-poll round trip at debug
const QUIET_TARGETS: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

/// Install the global subscriber: env filter plus JSON or human-readable output
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(build_filter(&config.log_level))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "Tracing initialized"
    );

    Ok(())
}

/// `level` with the noisy transport crates capped at warn. Directives given
/// explicitly for those crates still win.
fn build_filter(level: &str) -> EnvFilter {
    let mut directives = vec![level.trim().to_string()];
    for quiet in QUIET_TARGETS {
        let target = quiet.split('=').next().unwrap_or(quiet);
        let overridden = level
            .split(',')
            .any(|d| d.trim().split('=').next() == Some(target));
        if !overridden {
            directives.push(quiet.to_string());
        }
    }

    EnvFilter::try_new(directives.join(",")).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_quiets_http_crates() {
        let filter = build_filter("debug").to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("reqwest=warn"));
    }

    #[test]
    fn test_explicit_directive_wins() {
        let filter = build_filter("info,reqwest=trace").to_string();
        assert!(filter.contains("reqwest=trace"));
        assert!(!filter.contains("reqwest=warn"));
    }
}
