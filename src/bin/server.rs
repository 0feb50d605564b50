use anyhow::Result;
use proposer_rewards::{env::EnvConfig, log, server};

#[tokio::main]
pub async fn main() -> Result<()> {
    let config = EnvConfig::from_env()?;
    log::init_with_env(config.log_json);

    server::start_server(&config).await
}
