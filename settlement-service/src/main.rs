use service_core::observability::init_tracing;
use settlement_service::config::SettlementConfig;
use settlement_service::startup::Application;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SettlementConfig::load()?;
    init_tracing("settlement-service", &config.common.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.common.port,
        "Starting settlement service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}
