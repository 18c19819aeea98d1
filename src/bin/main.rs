use finance_react_agent::{
    events::{LineSink, LogLine},
    AgentConfig, AgentFactory,
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

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: agent <prompt...>");
        eprintln!("       agent /alpha | /ui | /oracle");
        std::process::exit(2);
    }

    let config = AgentConfig::from_env()?;
    let factory = AgentFactory::from_config(&config).await?;
    let mut agent = factory.build();

    info!(tools = agent.tools().len(), "Agent ready");

    let sink = LineSink::new(|line: String| match LogLine::parse(&line) {
        LogLine::Screenshot(path) => println!("[screenshot] {}", path.display()),
        LogLine::Text(text) => println!("{}", text),
    });

    let outcome = agent.respond(&prompt, &sink).await;

    println!("\n=== {} ({} iterations) ===", outcome.termination, outcome.iterations);
    println!("{}", outcome.answer);

    Ok(())
}
