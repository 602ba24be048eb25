use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use steam_sentinel::free_games::{repository, FreeGameFilter, FreeGameService, Platform};
use steam_sentinel::logging::{init_tracing, DEFAULT_FILTER};
use steam_sentinel::util::db::Db;
use steam_sentinel::SentinelConfig;

#[derive(Parser, Debug)]
#[command(name = "free_games", version, about = "SteamSentinel free-games one-shot runner")]
struct Cli {
    /// Optional override for the database URL
    #[arg(long, global = true)]
    db_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Fetch the feed once and store/announce new promotions
    Check,
    /// Re-check Steam promotions against the store (all active ones, or a single id)
    Verify {
        #[arg(long)]
        id: Option<i64>,
    },
    /// Delete unclaimed records older than N days (default: FREE_GAMES_RETENTION_DAYS)
    Cleanup {
        #[arg(long)]
        days: Option<i64>,
    },
    /// Print stored promotions
    List {
        /// Include expired records
        #[arg(long, default_value_t = false)]
        all: bool,
        /// epic or steam
        #[arg(long)]
        platform: Option<Platform>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print aggregate counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    steam_sentinel::util::env::init_env();
    init_tracing(DEFAULT_FILTER)?;
    let cli = Cli::parse();

    let mut cfg = SentinelConfig::from_env()?;
    if let Some(url) = cli.db_url.clone() {
        cfg.database_url = url;
    }
    let db = Db::connect(&cfg.database_url, cfg.db_max_connections)
        .await
        .context("Db::connect failed")?;

    match cli.command {
        Commands::Check => {
            let service = FreeGameService::from_config(db, &cfg)?;
            let summary = service.check_feed().await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if let Some(err) = summary.error {
                bail!("feed check failed: {err}");
            }
        }
        Commands::Verify { id } => {
            let service = FreeGameService::from_config(db, &cfg)?;
            match id {
                Some(id) => {
                    let outcome = service.verify_one(id).await?;
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
                None => {
                    let summary = service.verify_all().await?;
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
            }
        }
        Commands::Cleanup { days } => {
            let days = days.unwrap_or(cfg.retention_days);
            if days < 1 {
                bail!("--days must be at least 1");
            }
            let deleted = repository::cleanup_older_than(&db, days, Utc::now()).await?;
            println!("deleted {deleted} unclaimed record(s) older than {days} day(s)");
        }
        Commands::List {
            all,
            platform,
            limit,
        } => {
            let filter = FreeGameFilter {
                platform,
                include_expired: all,
                limit,
                ..FreeGameFilter::default()
            };
            for game in repository::list(&db, &filter).await? {
                let status = match (game.is_expired, game.is_claimed) {
                    (_, true) => "claimed",
                    (true, false) => "expired",
                    (false, false) => "active",
                };
                let until = game
                    .end_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>5}  {:<5}  {:<8}  {:<10}  {}  {}",
                    game.id, game.platform, status, until, game.title, game.url
                );
            }
        }
        Commands::Stats => {
            let stats = repository::stats(&db, Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
