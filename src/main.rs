use std::net::TcpListener;

use env_logger::Env;
use tradelead::{
    configuration::get_configuration,
    startup::{build_lead_finder, get_connection_pool, run},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration()?;

    if let Some(parent) = std::path::Path::new(&configuration.database.filename).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let connection_pool = get_connection_pool(&configuration.database);
    sqlx::migrate!("./migrations").run(&connection_pool).await?;

    if configuration.completion.api_key.is_none() {
        log::warn!("No completion API key configured; searches will fail until APP_COMPLETION__API_KEY is set");
    }

    let lead_finder = build_lead_finder(&configuration, connection_pool)?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    log::info!("Listening on {}", address);

    run(listener, lead_finder)?.await?;

    Ok(())
}
