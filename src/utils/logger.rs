use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

#[derive(Default)]
struct JsonFieldVisitor {
    fields: Map<String, Value>,
}

impl Visit for JsonFieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields
            .insert(field.name().to_string(), Value::from(format!("{:?}", value)));
    }
}

/// One JSON object per event, laid out after the OpenTelemetry log data model.
#[derive(Clone)]
struct OtelJsonEventFormatter {
    resource: Map<String, Value>,
}

impl OtelJsonEventFormatter {
    fn new(config: &LoggingConfig) -> Self {
        let mut resource = Map::new();
        resource.insert("service.name".to_string(), Value::from(config.service_name.as_str()));
        resource.insert(
            "service.version".to_string(),
            Value::from(config.service_version.as_str()),
        );
        OtelJsonEventFormatter { resource }
    }

    fn severity_number(level: &Level) -> u64 {
        match *level {
            Level::TRACE => 1,
            Level::DEBUG => 5,
            Level::INFO => 9,
            Level::WARN => 13,
            Level::ERROR => 17,
        }
    }

    fn to_json(&self, event: &Event<'_>) -> Value {
        let metadata = event.metadata();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut attributes = visitor.fields;
        if let Some(file) = metadata.file() {
            attributes.insert("code.filepath".to_string(), Value::from(file));
        }
        if let Some(line) = metadata.line() {
            attributes.insert("code.lineno".to_string(), Value::from(line));
        }
        attributes.insert("code.target".to_string(), Value::from(metadata.target()));

        let body = attributes
            .remove("message")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| metadata.name().to_string());

        let mut root = Map::new();
        root.insert(
            "timestamp".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        root.insert(
            "severity_text".to_string(),
            Value::from(metadata.level().as_str()),
        );
        root.insert(
            "severity_number".to_string(),
            Value::from(Self::severity_number(metadata.level())),
        );
        root.insert("body".to_string(), Value::from(body));
        root.insert("resource".to_string(), Value::Object(self.resource.clone()));
        root.insert("attributes".to_string(), Value::Object(attributes));
        Value::Object(root)
    }
}

impl<S, N> FormatEvent<S, N> for OtelJsonEventFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let serialized = serde_json::to_string(&self.to_json(event)).map_err(|_| std::fmt::Error)?;
        writer.write_str(&serialized)?;
        writer.write_char('\n')
    }
}

/// Parses a `logging.level` string, case-insensitively.
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Some(LevelFilter::TRACE),
        "debug" => Some(LevelFilter::DEBUG),
        "info" => Some(LevelFilter::INFO),
        "warn" => Some(LevelFilter::WARN),
        "error" => Some(LevelFilter::ERROR),
        _ => None,
    }
}

pub fn init_logging(logging_config: &LoggingConfig) {
    let level_filter = parse_level(&logging_config.level).unwrap_or_else(|| {
        panic!(
            "Invalid logging.level '{}'. Valid values: trace, debug, info, warn, error",
            logging_config.level
        )
    });

    // RUST_LOG directives still apply on top of the configured level.
    let filter_layer = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    match logging_config.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().event_format(OtelJsonEventFormatter::new(logging_config)))
                .init();
        }
        // "console" and anything unrecognised
        _ => {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
