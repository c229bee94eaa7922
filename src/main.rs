mod commands;

use std::path::Path;

use clap::{Parser, Subcommand};
use redwatch_core::{MonitorConfig, SearchSort, SortOrder, TimeFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Redwatch - read-only Reddit monitor
#[derive(Parser, Debug)]
#[command(name = "redwatch", version, about = "Monitor subreddits for keyword matches")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify Reddit API credentials
    Test,

    /// Fetch posts from a subreddit and store them
    Fetch {
        /// Subreddit to fetch from (without r/)
        subreddit: String,

        /// Number of posts
        #[arg(short, long, default_value_t = 10)]
        limit: u32,

        /// Sort order (new, hot, top, rising, controversial)
        #[arg(short, long, default_value = "new")]
        sort: SortOrder,

        /// Time window for top/controversial
        #[arg(short, long, default_value = "day")]
        time: TimeFilter,

        /// JSON output
        #[arg(short, long)]
        json: bool,
    },

    /// Search Reddit posts
    Search {
        /// Search query
        query: String,

        /// Limit to one subreddit
        #[arg(short, long)]
        subreddit: Option<String>,

        /// Number of results
        #[arg(short, long, default_value_t = 10)]
        limit: u32,

        /// Sort order (relevance, new, hot, top, comments)
        #[arg(long, default_value = "relevance")]
        sort: SearchSort,

        /// Time window
        #[arg(short, long, default_value = "all")]
        time: TimeFilter,

        /// Store results in the database
        #[arg(long)]
        store: bool,

        /// JSON output
        #[arg(short, long)]
        json: bool,
    },

    /// Run the monitoring scheduler
    Monitor {
        /// Run one cycle and exit
        #[arg(long)]
        once: bool,

        /// Refine keyword matches with an LLM relevance check
        #[arg(short, long)]
        ai: bool,
    },

    /// View stored posts
    Posts {
        /// Filter by subreddit
        #[arg(short, long)]
        subreddit: Option<String>,

        /// Only posts marked relevant
        #[arg(short, long)]
        relevant: bool,

        /// Number of posts
        #[arg(short, long, default_value_t = 20)]
        limit: u32,

        /// Maximum age in days
        #[arg(short, long, default_value_t = 7)]
        days: u32,

        /// JSON output
        #[arg(short, long)]
        json: bool,
    },

    /// Show database statistics
    Stats {
        /// JSON output
        #[arg(short, long)]
        json: bool,
    },

    /// Show subreddit info
    Subreddit {
        /// Subreddit name (without r/)
        name: String,
    },

    /// Show a user profile
    User {
        /// Reddit username (without u/)
        username: String,
    },

    /// Delete stored posts older than the cutoff
    Cleanup {
        /// Age cutoff in days
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },
}

/// Log to stderr and to the activity log file.
fn init_logging(log_file: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let path = Path::new(log_file);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "redwatch.log".to_string());

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = MonitorConfig::from_env()?;
    let _log_guard = init_logging(&config.log_file);

    match cli.command {
        Command::Test => commands::test(&config).await?,
        Command::Fetch {
            subreddit,
            limit,
            sort,
            time,
            json,
        } => commands::fetch(&config, &subreddit, limit, sort, time, json).await?,
        Command::Search {
            query,
            subreddit,
            limit,
            sort,
            time,
            store,
            json,
        } => {
            commands::search(
                &config,
                &query,
                subreddit.as_deref(),
                limit,
                sort,
                time,
                store,
                json,
            )
            .await?
        }
        Command::Monitor { once, ai } => commands::monitor(&config, once, ai).await?,
        Command::Posts {
            subreddit,
            relevant,
            limit,
            days,
            json,
        } => commands::posts(&config, subreddit, relevant, limit, days, json).await?,
        Command::Stats { json } => commands::stats(&config, json).await?,
        Command::Subreddit { name } => commands::subreddit(&config, &name).await?,
        Command::User { username } => commands::user(&config, &username).await?,
        Command::Cleanup { days } => commands::cleanup(&config, days).await?,
    }

    Ok(())
}
