mod commands;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trendcast_core::Platform;

#[derive(Debug, Parser)]
#[command(name = "trendcast-cli")]
#[command(about = "Trendcast command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one trend detection pass
    Detect,
    /// List active trends
    Trends,
    /// Score an article headline for viral potential
    Predict {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        source: String,
        #[arg(long, default_value = "")]
        category: String,
    },
    /// Generate content candidates for a trend
    Generate {
        #[arg(long)]
        trend_id: i64,
        #[arg(long, default_value_t = 6)]
        count: usize,
    },
    /// Approve a suggested candidate
    Approve { id: i64 },
    /// Reject a candidate
    Reject { id: i64 },
    /// Schedule an approved candidate on a platform
    Schedule {
        id: i64,
        #[arg(long)]
        platform: Platform,
        /// RFC 3339 time; defaults to the candidate's suggested time
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Schedule an existing draft post, such as a retry
    SchedulePost {
        id: i64,
        /// RFC 3339 time; defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Publish an approved candidate now
    Publish {
        id: i64,
        /// Repeat for cross-posting; defaults to the configured platform
        #[arg(long = "platform")]
        platforms: Vec<Platform>,
    },
    /// Run a scheduler job by name or kind
    Trigger { job: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = trendcast_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("trendcast-cli ready; see --help for commands");
        return Ok(());
    };

    let ctx = commands::Context::open(config).await?;
    match command {
        Commands::Detect => commands::run_detect(&ctx).await,
        Commands::Trends => commands::run_trends(&ctx).await,
        Commands::Predict {
            title,
            description,
            source,
            category,
        } => {
            commands::run_predict(&ctx, &title, &description, &source, &category);
            Ok(())
        }
        Commands::Generate { trend_id, count } => {
            commands::run_generate(&ctx, trend_id, count).await
        }
        Commands::Approve { id } => commands::run_approve(&ctx, id).await,
        Commands::Reject { id } => commands::run_reject(&ctx, id).await,
        Commands::Schedule { id, platform, at } => {
            commands::run_schedule(&ctx, id, platform, at).await
        }
        Commands::SchedulePost { id, at } => commands::run_schedule_post(&ctx, id, at).await,
        Commands::Publish { id, platforms } => commands::run_publish(&ctx, id, &platforms).await,
        Commands::Trigger { job } => commands::run_trigger(&ctx, &job).await,
    }
}

#[cfg(test)]
mod tests;
