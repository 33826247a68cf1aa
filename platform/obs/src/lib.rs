use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{self as sdk, Resource};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "info,tower_http=info,sqlx=warn";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Plain
        }
    }
}

/// Configuration for tracing initialization.
#[derive(Clone, Debug)]
pub struct ObsConfig {
    pub service_name: String,
    pub env_filter: Option<String>,
    pub otlp_endpoint: Option<String>,
    pub format: LogFormat,
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            service_name: "activities-server".to_string(),
            env_filter: None,
            otlp_endpoint: None,
            format: LogFormat::Plain,
        }
    }
}

impl ObsConfig {
    /// Defaults overlaid with `RUST_LOG`, `OTLP_ENDPOINT`, `LOG_FORMAT` and `OTEL_SERVICE_NAME`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var("OTEL_SERVICE_NAME") {
            if !name.trim().is_empty() {
                config.service_name = name.trim().to_string();
            }
        }
        config.env_filter = std::env::var("RUST_LOG").ok();
        config.otlp_endpoint = std::env::var("OTLP_ENDPOINT")
            .ok()
            .filter(|value| !value.trim().is_empty());
        config.format = std::env::var("LOG_FORMAT")
            .map(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();
        config
    }
}

fn resolve_filter(explicit: Option<String>) -> String {
    explicit
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install tracing subscribers with optional OTLP exporter.
pub fn init_tracing(config: ObsConfig) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(resolve_filter(config.env_filter))?;
    let (plain, json) = match config.format {
        LogFormat::Plain => (Some(tracing_subscriber::fmt::layer().with_target(false)), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(plain)
        .with(json);

    if let Some(endpoint) = config.otlp_endpoint {
        let exporter = SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(endpoint)
            .build()?;

        let resource = Resource::builder()
            .with_service_name(config.service_name.clone())
            .build();

        let provider = sdk::trace::SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();
        let tracer = provider.tracer(config.service_name);

        registry
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .try_init()?;
    } else {
        registry.try_init()?;
    }

    INIT.set(())
        .map_err(|_| anyhow!("tracing already initialized"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filter_falls_back_to_default() {
        assert_eq!(resolve_filter(None), DEFAULT_FILTER);
        assert_eq!(resolve_filter(Some("  ".into())), DEFAULT_FILTER);
        assert_eq!(resolve_filter(Some("debug".into())), "debug");
    }

    #[test]
    fn log_format_accepts_json_case_insensitively() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Plain);
    }

    #[test]
    fn init_is_idempotent() {
        init_tracing(ObsConfig::default()).unwrap();
        init_tracing(ObsConfig::default()).unwrap();
    }
}
