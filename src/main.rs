mod cache;
mod config;
mod dashboard;
mod fetcher;
mod presenter;
mod refresh;
mod shaper;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use crate::{config::Settings, fetcher::Fetcher, refresh::RefreshController};

#[derive(Debug, Parser)]
#[command(name = "defidash", version, about = "Live DeFi & crypto dashboard")]
struct Cli {
    /// Override DASHBOARD_HOST
    #[arg(long)]
    host: Option<String>,

    /// Override DASHBOARD_PORT
    #[arg(long)]
    port: Option<u16>,

    /// Open the dashboard in a browser once it is listening
    #[arg(long)]
    open_browser: bool,

    /// Run one fetch/shape/present cycle, print the view as JSON and exit
    #[arg(long)]
    snapshot: bool,

    /// Minimum APY for --snapshot (defaults to DEFAULT_MIN_APY)
    #[arg(long)]
    min_apy: Option<f64>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(h) = cli.host {
        settings.dashboard_host = h;
    }
    if let Some(p) = cli.port {
        settings.dashboard_port = p;
    }
    if cli.open_browser {
        settings.dashboard_open_browser = true;
    }

    let controller = Arc::new(RefreshController::new(Fetcher::new(&settings)?));

    if cli.snapshot {
        let min_apy = cli.min_apy.unwrap_or(settings.default_min_apy);
        let view = controller.render(min_apy).await;
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    log::info!(
        "app.start host={} port={} ttl_secs={} timeout_secs={}",
        settings.dashboard_host,
        settings.dashboard_port,
        settings.cache_ttl_secs,
        settings.http_timeout_secs
    );

    if settings.dashboard_open_browser {
        let url = format!(
            "http://{}:{}/",
            settings.dashboard_host, settings.dashboard_port
        );
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(650)).await;
            if let Err(e) = std::process::Command::new("xdg-open").arg(&url).spawn() {
                log::warn!("browser.open.failed url={} err={}", url, e);
            }
        });
    }

    dashboard::serve_dashboard(settings, controller).await
}
