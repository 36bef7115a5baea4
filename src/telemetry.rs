//! Structured logging and optional OpenTelemetry export
//!
//! Every binary calls [`init_tracing`] once at startup. Console output goes
//! to stderr so it never interleaves with the chat client's transcript.
//! When an OTLP endpoint is configured, spans are also exported over gRPC.
//!
//! ```text
//! chatvisor-server → OTLP (gRPC) → OTel Collector → Tempo (traces)
//! ```

use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "info,chatvisor=debug";

/// How the subscriber should be assembled
#[derive(Debug, Clone, Default)]
pub struct TelemetryOptions {
    /// OTLP collector endpoint; no export when `None`
    pub otlp_endpoint: Option<String>,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
    /// Filter used when `RUST_LOG` is unset, [`DEFAULT_LOG_FILTER`] if `None`
    pub default_filter: Option<String>,
}

impl TelemetryOptions {
    /// Read `OTEL_EXPORTER_OTLP_ENDPOINT` and `CHATVISOR_LOG_FORMAT=json`
    pub fn from_env() -> Self {
        let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let json = std::env::var("CHATVISOR_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        Self {
            otlp_endpoint,
            json,
            default_filter: None,
        }
    }

    pub fn with_default_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = Some(filter.into());
        self
    }
}

/// Initialize the global tracing subscriber
///
/// # Arguments
/// * `service_name` - Reported as `service.name` on exported spans
/// * `options` - Output format, filter and export settings
///
/// # Example
/// ```ignore
/// init_tracing("chatvisor-server", TelemetryOptions::from_env())?;
/// ```
pub fn init_tracing(
    service_name: &str,
    options: TelemetryOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let otel_layer = match options.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint);

            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(sdktrace::Config::default().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", service_name.to_string()),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])))
                .install_batch(runtime::Tokio)?;

            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let text_layer = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
    });
    let json_layer = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
    });

    let default_filter = options
        .default_filter
        .as_deref()
        .unwrap_or(DEFAULT_LOG_FILTER);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::info!(
        service = service_name,
        otlp = options.otlp_endpoint.as_deref().unwrap_or("disabled"),
        "Tracing initialized"
    );

    Ok(())
}

/// Flush pending spans to the collector
pub fn shutdown_tracing() {
    opentelemetry::global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_disable_export() {
        let options = TelemetryOptions::default();
        assert!(options.otlp_endpoint.is_none());
        assert!(!options.json);

        let options = options.with_default_filter("warn");
        assert_eq!(options.default_filter.as_deref(), Some("warn"));
    }
}
