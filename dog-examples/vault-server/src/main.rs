use anyhow::Result;
use tracing::info;
use vault_server::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env();
    if !config.auth.required {
        info!("API key check disabled");
    }

    let app = vault_server::build(&config).await?;
    let addr = config.addr();

    info!("Server running on http://{}", addr);
    app.listen(addr).await?;

    Ok(())
}
