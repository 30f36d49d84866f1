use anyhow::Result;
use joplin_mcp::config::Config;
use joplin_mcp::joplin::JoplinClient;
use joplin_mcp::server::McpServer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr; stdout belongs to the protocol)
    pretty_env_logger::init();
    log::info!("Starting Joplin MCP server...");

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;
    log::info!("Configuration loaded (API port {})", config.port);

    let client = JoplinClient::from_config(&config);
    let server = McpServer::new(client);

    server.run().await?;

    log::info!("Server stopped");
    Ok(())
}
