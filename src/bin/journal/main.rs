use clap::Parser;
use foodie_journal::{config::Config, db, discover::DiscoveryClient, journal::Journal};
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_ansi(true)
        .with_file(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = commands::Cli::parse();
    let config = Config::from_env()?;
    tracing::debug!(?config, "loaded configuration");

    let db_conn = db::connect(&config.database_url).await?;
    let journal = Journal::load(db_conn).await;
    let client = DiscoveryClient::new(config.discover_api_url.as_str());

    commands::run(cli.command, journal, &client).await
}
