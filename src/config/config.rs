use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use crate::metrics::RecorderOptions;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Settings for the request recorder and its scrape endpoint.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct MetricsConfig {
    /// Prefix for the metric names, e.g. "checkout" -> "checkout_requests_total".
    pub app_name: Option<String>,
    /// Histogram buckets in seconds.
    pub buckets: Option<Vec<f64>>,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            app_name: None,
            buckets: None,
            path: default_metrics_path(),
        }
    }
}

impl From<&MetricsConfig> for RecorderOptions {
    fn from(config: &MetricsConfig) -> Self {
        RecorderOptions {
            app_name: config.app_name.clone(),
            buckets: config.buckets.clone(),
        }
    }
}

/// Layered sources: `./config.yaml`, overridden by `REQMETRICS_*` env vars
/// (nested keys separated by `__`, e.g. `REQMETRICS_METRICS__APP_NAME`).
pub fn figment() -> Figment {
    Figment::new()
        .merge(Yaml::file("./config.yaml"))
        .merge(Env::prefixed("REQMETRICS_").split("__"))
}

/// Extracts a config from any figment, unwrapping the version tag.
pub fn extract_config(figment: &Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from "config.yaml" in the current directory plus env overrides.
pub fn load_config() -> ConfigV1 {
    match extract_config(&figment()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing schema: {}", e),
    }
}
