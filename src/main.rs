use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swarm_commits::config::{ApiConfig, ScrapeConfig, CONFIG_FILE};
use swarm_commits::model::ResultSink;
use swarm_commits::process::{render_table, run_changes, run_scrape};
use swarm_commits::range::{guide_text, DateRange};
use swarm_commits::{info_time, Result};

/// Fetch Perforce Swarm commit history for a KST date range
#[derive(Parser)]
#[command(name = "swarm-commits", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the commits list and print it as a table
    Scrape {
        #[command(flatten)]
        range: RangeArgs,
        /// JSON file with username and password
        #[arg(short, long, default_value = CONFIG_FILE)]
        config: PathBuf,
        /// Print rows as JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Open the first link of this change in the browser when done
        #[arg(long, value_name = "CHANGE")]
        open: Option<String>,
    },
    /// List changes through the REST API and print their diffs
    Changes {
        #[command(flatten)]
        range: RangeArgs,
        /// Maximum number of changes to fetch
        #[arg(short, long, default_value_t = 100)]
        max: usize,
        /// Env file with SWARM_URL, USERNAME and PASSWORD (defaults to .env)
        #[arg(long)]
        env_file: Option<PathBuf>,
    },
    /// Show how a KST range is sent to Swarm
    Range {
        #[command(flatten)]
        range: RangeArgs,
    },
}

#[derive(clap::Args)]
struct RangeArgs {
    /// First day, KST (YYYY-MM-DD or YYYY/MM/DD)
    #[arg(short, long)]
    start: String,
    /// Last day, KST, inclusive
    #[arg(short, long)]
    end: String,
}

impl RangeArgs {
    fn parse(&self) -> Result<DateRange> {
        DateRange::parse(&self.start, &self.end)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let start_time = Local::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Range { range } => {
            println!("{}", guide_text(&range.parse()?));
        }
        Commands::Scrape {
            range,
            config,
            json,
            open,
        } => {
            let range = range.parse()?;
            let config = ScrapeConfig::load(&config)?;
            eprintln!("{}", guide_text(&range));

            let sink = Arc::new(ResultSink::new());
            let query = run_scrape(config, range, sink.clone());
            tokio::pin!(query);
            let mut ticker = tokio::time::interval(Duration::from_secs(10));
            ticker.tick().await;
            let count = loop {
                tokio::select! {
                    res = &mut query => break res?,
                    _ = ticker.tick() => info_time!(start_time, "Still loading commits..."),
                }
            };

            let published = sink.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(published.rows.as_slice())?);
            } else {
                print!("{}", render_table(&published.rows));
            }
            info_time!("Found {} commits.", count);

            if let Some(id) = open {
                match sink.link_for(&id) {
                    Some(link) => open::that(&link)?,
                    None => tracing::warn!(change = %id, "no linked row with this change"),
                }
            }
        }
        Commands::Changes {
            range,
            max,
            env_file,
        } => {
            let range = range.parse()?;
            let config = ApiConfig::from_env(env_file.as_deref())?;
            let mut stdout = std::io::stdout().lock();
            run_changes(&config, &range, max, &mut stdout).await?;
        }
    }

    info_time!(start_time, "Full program time:");
    Ok(())
}
