use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;

use plaza::api::{Api, Backend, HttpBackend, MemoryBackend};
use plaza::app::{App, Flags};
use plaza::cli::Cli;
use plaza::config::Config;
use plaza::runtime::Runtime;
use plaza::subscription::http::QueryClient;
use plaza::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).wrap_err("Failed to load config")?;
    cli.apply(&mut config);
    config.validate()?;

    let _guard = telemetry::init(&config.log)?;
    let session = config.session();

    let backend: Arc<dyn Backend> = if cli.demo {
        info!("using built-in sample data");
        Arc::new(
            MemoryBackend::demo(session.account_id.clone(), &session.username)
                .with_latency(Duration::from_millis(150)),
        )
    } else {
        info!(base_url = %config.api.base_url, "using REST backend");
        Arc::new(HttpBackend::new(
            &config.api.base_url,
            config.api.token.clone(),
            config.timeout(),
        )?)
    };
    let api = Api::new(backend, QueryClient::with_config(config.query_config()));

    let flags = Flags {
        api,
        session,
        ui: config.ui.clone(),
        gc_interval: Duration::from_millis(config.cache.gc_interval_ms),
        start: cli.open,
    };

    let mut terminal = ratatui::init();
    let result = Runtime::<App>::new(flags)
        .run(&mut terminal, config.ui.frame_rate)
        .await;
    ratatui::restore();

    result
}
