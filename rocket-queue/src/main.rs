//! rocket-queue - Manage queued posts
//!
//! Unix-style tool for inspecting and changing the SocialRocket queue, the
//! posting history and the creative library.

use anyhow::bail;
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use libsocialrocket::logging::LoggingConfig;
use libsocialrocket::queue::PostedEntry;
use libsocialrocket::scheduling::{best_times, format_12h, parse_schedule};
use libsocialrocket::service::posting::PostEdit;
use libsocialrocket::{PlatformId, PostRecord, RocketError, RocketService};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rocket-queue")]
#[command(version)]
#[command(about = "Manage queued posts")]
#[command(long_about = "\
rocket-queue - Manage queued posts

DESCRIPTION:
    rocket-queue is a Unix-style tool for managing the SocialRocket queue.
    Use it to list, edit, remove or immediately publish queued posts, to
    review what has already been posted, and to manage the creative library.

COMMANDS:
    list        List queued posts in scheduled order
    edit        Change the text, platforms or time of a queued post
    remove      Remove a queued post and its media copy
    now         Publish a queued post immediately
    history     Show published posts and their per-platform results
    best-times  Show the configured best posting times
    library     List, add or remove creative library media

USAGE EXAMPLES:
    # List all queued posts
    rocket-queue list

    # Posts queued for a given day, as JSON
    rocket-queue list --date 2026-11-02 --format json

    # Move a post to tomorrow afternoon and change its caption
    rocket-queue edit <POST_ID> --at \"tomorrow 3pm\" --caption \"New caption\"

    # Publish a queued post right away
    rocket-queue now <POST_ID> --live

    # Add an image to the creative library
    rocket-queue library add ~/Pictures/launch.png

CONFIGURATION:
    Configuration file: ~/.config/socialrocket/config.toml
    Data directory:     ~/.local/share/socialrocket

    Override with environment variables:
        SOCIALROCKET_CONFIG - Path to config file

EXIT CODES:
    0 - Success
    1 - Operation failed (unknown post ID, storage or publish failure)
    2 - Platform not configured
    3 - Invalid input (bad time, empty edit, unknown platform, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List queued posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Only posts scheduled on this local date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Filter by platform
        #[arg(short, long)]
        platform: Option<String>,
    },

    /// Edit a queued post
    Edit {
        /// Post ID to edit
        post_id: String,

        /// New caption
        #[arg(short, long)]
        caption: Option<String>,

        /// New hashtags
        #[arg(long)]
        hashtags: Option<String>,

        /// New keywords
        #[arg(long)]
        keywords: Option<String>,

        /// New platforms (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        platform: Option<Vec<String>>,

        /// New schedule time (e.g., "tomorrow 3pm", "+2h")
        #[arg(long)]
        at: Option<String>,
    },

    /// Remove a queued post
    Remove {
        /// Post ID to remove
        post_id: String,
    },

    /// Publish a queued post immediately
    Now {
        /// Post ID to publish
        post_id: String,

        /// Simulate publishing without opening a browser
        #[arg(long, conflicts_with = "live")]
        dry_run: bool,

        /// Really publish, overriding scheduling.dry_run
        #[arg(long)]
        live: bool,
    },

    /// Show posting history
    History {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Show only the most recent N posts
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show best posting times
    BestTimes,

    /// Manage the creative library
    Library {
        #[command(subcommand)]
        command: LibraryCommands,
    },
}

#[derive(Subcommand, Debug)]
enum LibraryCommands {
    /// List library media
    List,

    /// Copy a media file into the library
    Add {
        /// Image or video to import
        path: PathBuf,
    },

    /// Remove a media file from the library
    Remove {
        /// Library path as shown by `library list`
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<RocketError>()
            .map(RocketError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (service, _events) = RocketService::new()?;

    match cli.command {
        Commands::List {
            format,
            date,
            platform,
        } => cmd_list(&service, &format, date, platform.as_deref()),
        Commands::Edit {
            post_id,
            caption,
            hashtags,
            keywords,
            platform,
            at,
        } => {
            let scheduled_time = at
                .as_deref()
                .map(|at| parse_schedule(at, None))
                .transpose()?;
            let edit = PostEdit {
                caption,
                hashtags,
                keywords,
                platforms: platform,
                scheduled_time,
            };
            cmd_edit(&service, &post_id, edit)
        }
        Commands::Remove { post_id } => {
            let record = service.remove(&post_id)?;
            println!("Removed {}", record.id);
            Ok(())
        }
        Commands::Now {
            post_id,
            dry_run,
            live,
        } => {
            if dry_run {
                service.set_dry_run(true);
            } else if live {
                service.set_dry_run(false);
            }
            cmd_now(&service, &post_id).await
        }
        Commands::History { format, limit } => cmd_history(&service, &format, limit),
        Commands::BestTimes => {
            for time in best_times(service.config()) {
                println!("{}", format_12h(time));
            }
            Ok(())
        }
        Commands::Library { command } => cmd_library(&service, command),
    }
}

/// List queued posts
fn cmd_list(
    service: &RocketService,
    format: &str,
    date: Option<NaiveDate>,
    platform: Option<&str>,
) -> anyhow::Result<()> {
    validate_format(format)?;

    let mut posts = match date {
        Some(date) => service.posts_on(date),
        None => service.list(),
    };

    if let Some(platform) = platform {
        let platform: PlatformId = platform
            .parse()
            .map_err(|e: libsocialrocket::error::PlatformError| {
                RocketError::InvalidInput(e.to_string())
            })?;
        posts.retain(|p| p.platforms.iter().any(|name| name == platform.as_str()));
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&posts)?);
    } else {
        output_list_text(&posts);
    }

    Ok(())
}

/// Output posts as human-readable text
fn output_list_text(posts: &[PostRecord]) {
    let now = Utc::now();

    for post in posts {
        println!(
            "{} | {} | {} | {} | {}",
            post.id,
            format_local(post.scheduled_time),
            format_time_until(now, post.scheduled_time),
            post.platforms.join(","),
            truncate_content(&post.full_text, 50)
        );
    }
}

fn cmd_edit(service: &RocketService, post_id: &str, edit: PostEdit) -> anyhow::Result<()> {
    if edit.caption.is_none()
        && edit.hashtags.is_none()
        && edit.keywords.is_none()
        && edit.platforms.is_none()
        && edit.scheduled_time.is_none()
    {
        return Err(RocketError::InvalidInput(
            "Nothing to edit: pass --caption, --hashtags, --keywords, --platform or --at"
                .to_string(),
        )
        .into());
    }

    let record = service.edit(post_id, edit)?;
    println!(
        "Updated {} ({} on {})",
        record.id,
        format_local(record.scheduled_time),
        record.platforms.join(",")
    );
    Ok(())
}

/// Publish a queued post and report per-platform results
async fn cmd_now(service: &RocketService, post_id: &str) -> anyhow::Result<()> {
    let entry = service.publish_queued_now(post_id).await?;

    for result in &entry.results {
        let mark = if result.success { "ok" } else { "failed" };
        println!("{}\t{}\t{}", result.platform, mark, result.message);
    }

    if !entry.results.iter().any(|r| r.success) {
        bail!("Post {} failed on every platform", entry.record.id);
    }
    Ok(())
}

fn cmd_history(service: &RocketService, format: &str, limit: Option<usize>) -> anyhow::Result<()> {
    validate_format(format)?;

    let mut history = service.history();
    if let Some(limit) = limit {
        let skip = history.len().saturating_sub(limit);
        history.drain(..skip);
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else {
        output_history_text(&history);
    }
    Ok(())
}

fn output_history_text(history: &[PostedEntry]) {
    for entry in history {
        let succeeded: Vec<&str> = entry.succeeded_on().collect();
        println!(
            "{} | {} | {}/{} ok{} | {}",
            entry.record.id,
            format_local(entry.posted_at),
            succeeded.len(),
            entry.results.len(),
            if succeeded.is_empty() {
                String::new()
            } else {
                format!(" ({})", succeeded.join(","))
            },
            truncate_content(&entry.record.full_text, 50)
        );
    }
}

fn cmd_library(service: &RocketService, command: LibraryCommands) -> anyhow::Result<()> {
    let library = service.library();

    match command {
        LibraryCommands::List => {
            for path in library.list() {
                println!("{}", path.display());
            }
        }
        LibraryCommands::Add { path } => {
            let imported = library.import(&path)?;
            println!("{}", imported.display());
        }
        LibraryCommands::Remove { path } => {
            if !library.remove(&path)? {
                bail!("Not in library: {}", path.display());
            }
            println!("Removed {}", path.display());
        }
    }
    Ok(())
}

fn validate_format(format: &str) -> anyhow::Result<()> {
    if format != "text" && format != "json" {
        return Err(RocketError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        ))
        .into());
    }
    Ok(())
}

fn format_local(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %I:%M %p").to_string()
}

/// Truncate content to max chars with ellipsis, on one line
fn truncate_content(content: &str, max_chars: usize) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let head: String = flat.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

/// Format time until scheduled time in human-readable format
fn format_time_until(now: DateTime<Utc>, scheduled: DateTime<Utc>) -> String {
    let diff = (scheduled - now).num_seconds();

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}
