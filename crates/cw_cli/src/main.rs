use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use cw_core::dates::ScrapeWindow;
use cw_core::storage::ArticleStorage;
use cw_scrapers::{GoogleGeocoder, IngestionManager, KeywordCloud, NewsApiClient, Scheduler};
use cw_storage::{create_storage, StorageConfig, StorageKind};
use cw_web::{create_app, AppState, RateLimiter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod logging;

#[derive(Parser, Debug)]
#[command(author, version, about = "Supply-chain disruption news backend", long_about = None)]
pub struct Cli {
    #[arg(long, env = "STORAGE", value_enum, default_value_t = StorageKind::Sqlite)]
    storage: StorageKind,
    /// Defaults to `sqlite://<database-name>.db`
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long, env = "DATABASE_NAME", default_value = "chainwatch")]
    database_name: String,
    #[arg(long, env = "COLLECTION_NAME", default_value = "articles")]
    collection_name: String,
    #[arg(long, env = "NEWS_API_KEY", hide_env_values = true)]
    news_api_key: Option<String>,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,
    #[arg(long, env = "OPENAI_BASE_URL", default_value = cw_inference::DEFAULT_BASE_URL)]
    openai_base_url: String,
    #[arg(long, env = "OPENAI_MODEL", default_value = cw_inference::DEFAULT_MODEL)]
    model: String,
    #[arg(long, env = "GOOGLE_GEOCODING_API_KEY", hide_env_values = true)]
    geocoding_api_key: Option<String>,
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 60)]
    http_timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the REST API and run the daily scrape
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 5001)]
        port: u16,
        /// Hour of day (UTC) of the scheduled scrape
        #[arg(long, env = "SCRAPE_HOUR", default_value_t = 8)]
        scrape_hour: u32,
        #[arg(long, env = "RATE_LIMIT_MAX", default_value_t = 100)]
        rate_limit_max: usize,
        #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
        rate_limit_window_secs: u64,
        /// Reverse proxies in front of the server. Zero ignores `X-Forwarded-For`.
        #[arg(long, env = "TRUST_PROXY_HOPS", default_value_t = 0)]
        trust_proxy_hops: usize,
    },
    /// Run one ingestion and print the report
    Scrape {
        /// First day, YYYY-MM-DD. Defaults to seven days ago.
        #[arg(long)]
        from: Option<String>,
        /// Last day, YYYY-MM-DD. Defaults to today.
        #[arg(long)]
        to: Option<String>,
    },
    /// Delete every stored article
    Reset,
}

impl Cli {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            kind: self.storage,
            url: self
                .database_url
                .clone()
                .unwrap_or_else(|| format!("sqlite://{}.db", self.database_name)),
            collection: self.collection_name.clone(),
        }
    }

    fn build_ingestion(&self, storage: Arc<dyn ArticleStorage>) -> cw_core::Result<IngestionManager> {
        let news = NewsApiClient::new(self.news_api_key.clone(), self.timeout())?;
        let geocoder = GoogleGeocoder::new(self.geocoding_api_key.clone(), self.timeout())?;
        let model = cw_inference::create_model(&cw_inference::Config {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model_name: self.model.clone(),
            timeout: self.timeout(),
        })?;
        Ok(IngestionManager::new(
            Arc::new(news),
            model,
            Arc::new(geocoder),
            storage,
        ))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn serve(
    cli: &Cli,
    storage: Arc<dyn ArticleStorage>,
    addr: SocketAddr,
    scrape_hour: u32,
    limiter: RateLimiter,
) -> anyhow::Result<()> {
    let ingestion = match cli.build_ingestion(storage.clone()) {
        Ok(manager) => Some(Arc::new(manager)),
        Err(e) => {
            warn!("Scraping disabled: {}", e);
            None
        }
    };

    let scheduler = match &ingestion {
        Some(manager) => {
            let scheduler = Scheduler::new(manager.clone(), scrape_hour)?;
            info!("Daily scrape scheduled at {:02}:00 UTC", scrape_hour);
            Some(tokio::spawn(scheduler.run_forever()))
        }
        None => None,
    };

    let state = AppState {
        storage,
        ingestion,
        keywords: Arc::new(KeywordCloud::new(cli.timeout())?),
        limiter: Arc::new(limiter),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Server is running on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = scheduler {
        handle.abort();
    }
    Ok(())
}

async fn run(cli: Cli, storage: Arc<dyn ArticleStorage>) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Serve {
            host,
            port,
            scrape_hour,
            rate_limit_max,
            rate_limit_window_secs,
            trust_proxy_hops,
        } => {
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("invalid listen address {}:{}", host, port))?;
            let limiter = RateLimiter::new(
                *rate_limit_max,
                Duration::from_secs(*rate_limit_window_secs),
            )
            .with_trusted_proxy_hops(*trust_proxy_hops);
            serve(&cli, storage, addr, *scrape_hour, limiter).await
        }
        Commands::Scrape { from, to } => {
            let window =
                ScrapeWindow::resolve(from.as_deref(), to.as_deref(), Utc::now().date_naive())?;
            let manager = cli.build_ingestion(storage)?;
            let report = manager.run(window).await?;
            println!("{} ({} articles)", report.message, report.total);
            Ok(())
        }
        Commands::Reset => {
            let deleted = storage.delete_all().await?;
            println!("Deleted {} articles", deleted);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_logging();
    let cli = Cli::parse();

    let storage = create_storage(&cli.storage_config())
        .await
        .context("connecting to storage")?;
    info!("Storage initialized (using {})", cli.storage);

    let result = run(cli, storage.clone()).await;
    if let Err(e) = storage.close().await {
        warn!("Failed to close storage: {}", e);
    }
    result
}
