use colored::Colorize;
use kiln_client::{DaemonClient, HealthChecker};
use kiln_config::ClientConfig;

pub async fn handle(config: &ClientConfig) -> anyhow::Result<()> {
    let client = DaemonClient::new(&config.socket);
    client.health_check().await?;

    println!(
        "{} {}",
        "✓ daemon is healthy:".green().bold(),
        config.socket.display()
    );
    Ok(())
}
