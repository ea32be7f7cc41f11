use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use vitibrasil_api::config::{Config, CONFIG_PATH};
use vitibrasil_api::constants::SITE_INDEX_URL;
use vitibrasil_api::infra::http_client::ReqwestHttp;
use vitibrasil_api::observability::{self, metrics};
use vitibrasil_api::pipeline::{Dataset, Pipeline, SourceLoader};
use vitibrasil_api::server::{self, cache::DatasetCache, AppState};
use vitibrasil_api::site;

#[derive(Parser)]
#[command(name = "vitibrasil_api")]
#[command(about = "Normalized Brazilian viticulture statistics")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults are used when it does not exist)
    #[arg(long, global = true, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Read the local snapshots instead of the remote download area
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Preprocess one dataset and write it as CSV
    Export {
        /// producao, processamento, comercializacao, importacao or exportacao
        dataset: Dataset,
        /// Output file (defaults to <dataset>.csv)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the data table of one page of the statistics site as JSON
    Page {
        /// Page option, 2 to 6
        #[arg(long)]
        option: u8,
        #[arg(long)]
        year: u16,
        /// Required for options 3, 5 and 6
        #[arg(long)]
        suboption: Option<u8>,
    },
    /// List every page URL of the statistics site
    Pages,
}

fn build_pipeline(config: &Config) -> Pipeline {
    let fetcher = Arc::new(ReqwestHttp::new());
    Pipeline::new(SourceLoader::from_config(fetcher, &config.sources))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    observability::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load_with_env(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    if cli.local {
        config.sources.use_local_data = true;
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Err(e) = metrics::init() {
                error!(error = %e, "Metrics disabled");
            }

            info!(
                base_url = %config.sources.base_url,
                data_root = %config.sources.data_root.display(),
                use_local_data = config.sources.use_local_data,
                cache_ttl_secs = config.cache.ttl_seconds,
                "Starting server"
            );
            let state = AppState::new(build_pipeline(&config), DatasetCache::new(config.cache.ttl()));
            server::start_server(state, &config.server.host, config.server.port).await?;
        }
        Commands::Export { dataset, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(dataset.csv_file_name()));
            let table = build_pipeline(&config)
                .preprocess(dataset)
                .await
                .with_context(|| format!("preprocessing {}", dataset))?;

            let file = std::fs::File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            table.write_csv(std::io::BufWriter::new(file))?;
            println!("Wrote {} rows of {} to {}", table.len(), dataset, output.display());
        }
        Commands::Page { option, year, suboption } => {
            let url = site::page_url(SITE_INDEX_URL, option, year, suboption)?;
            let fetcher = ReqwestHttp::new();
            let table = site::fetch_table(&fetcher, &url).await?;
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Commands::Pages => {
            for (key, url) in site::map_urls(SITE_INDEX_URL) {
                println!("{}\t{}", key, url);
            }
        }
    }

    Ok(())
}
