use std::process;

use clap::Parser;

use cryptapp::config::AppConfig;
use cryptapp::telemetry::{LoggingConfig, init_logging};
use cryptapp::web::AppServer;

#[tokio::main]
async fn main() {
    let config = AppConfig::parse();

    let logging = LoggingConfig {
        level: &config.log_level,
        format: config.log_format,
    };
    if let Err(e) = init_logging(&logging) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    let server = AppServer::new(&config);
    if let Err(e) = server.serve(config.bind).await {
        tracing::error!(error = %format!("{:#}", e), "server stopped");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
