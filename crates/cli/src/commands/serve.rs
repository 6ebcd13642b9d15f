//! `souschef serve` — start the HTTP gateway.

use souschef_config::AppConfig;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!(
        "Starting gateway on http://{}:{}",
        config.gateway.host, config.gateway.port
    );
    souschef_gateway::start(config).await
}
