use finance_react_agent::{
    agent::{spawn_preset_worker, supervise},
    api::{start_server, ApiState},
    AgentConfig, AgentFactory, TaskPreset,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AgentConfig::from_env()?;

    info!("Finance ReAct Agent - API Server");
    info!("Port: {}", config.port);
    info!("Backend: {}", config.backend_url);

    let factory = AgentFactory::from_config(&config).await?;

    if config.background_presets {
        info!("Starting background preset worker");
        let worker = spawn_preset_worker(factory.build(), factory.memory(), TaskPreset::ALL.to_vec());
        tokio::spawn(supervise(worker));
    }

    info!("Starting API server...");
    start_server(ApiState::new(factory), config.port).await?;

    Ok(())
}
