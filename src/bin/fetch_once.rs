//! Runs one aggregate fetch with the configured login and prints the result.
//!
//! Useful for checking credentials before starting the server.

use bjgas_api::config::Config;
use bjgas_api::gas_client::GasClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let client = GasClient::new(config.base_url.clone(), config.credentials())?;

    let data = client.async_get_data().await?;
    println!("{}", serde_json::to_string_pretty(&data)?);

    Ok(())
}
