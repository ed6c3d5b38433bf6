use std::sync::Arc;

use reqmetrics::config::{load_config, print_schema};
use reqmetrics::startup::run;
use reqmetrics::utils::logger::init_logging;
use tracing::error;

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--print-schema") {
        print_schema();
        return;
    }

    let config = Arc::new(load_config());
    init_logging(&config.logging);

    if let Err(e) = run(config).await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}
