//! rocket-post - Generate, schedule and publish a post
//!
//! Takes one media file, optionally asks the configured AI providers for a
//! caption, and either queues the post for later or publishes it right away.

use anyhow::{bail, Context};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::Parser;
use libsocialrocket::error::GenerationError;
use libsocialrocket::generation::{GeneratedContent, Prompts};
use libsocialrocket::logging::LoggingConfig;
use libsocialrocket::scheduling::{
    best_times, parse_clock_time, parse_schedule, Randomization, SchedulePlan,
};
use libsocialrocket::service::events::{Event, EventReceiver};
use libsocialrocket::service::posting::{PostNowRequest, ScheduleRequest};
use libsocialrocket::{Config, RocketError, RocketService};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "rocket-post")]
#[command(version)]
#[command(about = "Generate, schedule and publish a social media post")]
#[command(long_about = "\
rocket-post - Generate, schedule and publish a social media post

DESCRIPTION:
    rocket-post takes an image or video, optionally writes a caption,
    hashtags and keywords for it with the configured AI providers, and then
    either queues it for the rocket-send daemon or publishes it right away.

    Every scheduled time gets its own queued copy of the media file.

USAGE EXAMPLES:
    # Let the AI write the caption and queue it for tomorrow afternoon
    rocket-post launch.png --generate --at \"tomorrow 3pm\"

    # Queue a caption for 09:30 every day for a week, on X and LinkedIn
    rocket-post launch.png -c \"We are live\" --time 09:30 --days 7 -p x,linkedin

    # Three posts a day for five days at random best times
    rocket-post launch.png --generate --time 09:00 --days 5 --posts-per-day 3 --randomize best

    # Publish right now without touching the queue
    rocket-post launch.png -c \"Now live\" --now --live

    # Only generate content, print it as JSON
    rocket-post launch.png --generate --format json

SCHEDULING:
    --at accepts durations (\"30m\", \"2h\"), natural language
    (\"tomorrow 3pm\") and random windows (\"random:10m-1h\").

    --time with --date/--days/--posts-per-day plans a grid of local times;
    --randomize shifts each slot: none, jitter (+/-15 min), a local hour
    range such as hours:9-17, or best (the configured best posting times).

CONFIGURATION:
    Configuration file: ~/.config/socialrocket/config.toml
    Data directory:     ~/.local/share/socialrocket

    Override with environment variables:
        SOCIALROCKET_CONFIG     - Path to config file
        SOCIALROCKET_LOG_LEVEL  - Log level (error, warn, info, debug)
        SOCIALROCKET_LOG_FORMAT - Log format (text, json, pretty)

EXIT CODES:
    0 - Success
    1 - Posting or generation failed
    2 - Platform or AI provider not configured
    3 - Invalid input (missing media, bad time, no platforms, etc.)
")]
struct Cli {
    /// Image or video file to post
    media: PathBuf,

    /// Caption text
    #[arg(short, long)]
    caption: Option<String>,

    /// Hashtags appended below the caption
    #[arg(long)]
    hashtags: Option<String>,

    /// SEO keywords stored with the post
    #[arg(long)]
    keywords: Option<String>,

    /// Generate caption, hashtags and keywords with the AI providers
    #[arg(short, long)]
    generate: bool,

    /// Custom caption instruction for generation
    #[arg(long, requires = "generate")]
    caption_prompt: Option<String>,

    /// Custom hashtag instruction for generation
    #[arg(long, requires = "generate")]
    hashtag_prompt: Option<String>,

    /// Custom keyword instruction for generation
    #[arg(long, requires = "generate")]
    keyword_prompt: Option<String>,

    /// Target platforms (comma-separated; defaults to scheduling.default_platforms)
    #[arg(short, long, value_delimiter = ',')]
    platform: Vec<String>,

    /// Publish immediately instead of queueing
    #[arg(long, conflicts_with_all = ["at", "time"])]
    now: bool,

    /// When to publish (e.g. "30m", "tomorrow 3pm", "random:10m-1h")
    #[arg(long, conflicts_with = "time")]
    at: Option<String>,

    /// Local time of day for planned posts (HH:MM)
    #[arg(long)]
    time: Option<String>,

    /// First day of the plan (YYYY-MM-DD, default today)
    #[arg(long, requires = "time")]
    date: Option<NaiveDate>,

    /// Number of days to plan
    #[arg(long, default_value_t = 1, requires = "time")]
    days: u32,

    /// Posts per planned day (1-5)
    #[arg(long, default_value_t = 1, requires = "time")]
    posts_per_day: u32,

    /// Slot randomization: none, jitter, hours:START-END or best
    #[arg(long, default_value = "none", requires = "time")]
    randomize: String,

    /// Simulate publishing without opening a browser
    #[arg(long, conflicts_with = "live")]
    dry_run: bool,

    /// Really publish, overriding scheduling.dry_run
    #[arg(long)]
    live: bool,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<RocketError>()
        .map(RocketError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if cli.format != "text" && cli.format != "json" {
        return Err(invalid(format!(
            "Invalid format '{}'. Valid options: text, json",
            cli.format
        )));
    }

    let config = Config::load()?;
    let plan = plan_times(&cli, &config)?;

    let (service, mut events) = RocketService::from_config(config)?;
    if cli.dry_run {
        service.set_dry_run(true);
    } else if cli.live {
        service.set_dry_run(false);
    }

    let generated = if cli.generate {
        Some(generate(&service, &mut events, &cli).await?)
    } else {
        None
    };

    let caption = pick(cli.caption.as_deref(), generated.as_ref().map(|g| g.caption.as_str()));
    let hashtags = pick(cli.hashtags.as_deref(), generated.as_ref().map(|g| g.hashtags.as_str()));
    let keywords = pick(cli.keywords.as_deref(), generated.as_ref().map(|g| g.keywords.as_str()));

    if !cli.now && plan.is_none() {
        if let Some(content) = &generated {
            return print_generated(content, &cli.format);
        }
        return Err(invalid(
            "Nothing to do: pass --now, --at or --time (or --generate to only generate)",
        ));
    }

    if caption.trim().is_empty() && hashtags.trim().is_empty() {
        return Err(invalid("Post text is empty: pass --caption or --generate"));
    }

    let platforms = if cli.platform.is_empty() {
        service.config().scheduling.default_platforms.clone()
    } else {
        cli.platform.clone()
    };

    if cli.now {
        return post_now(&service, &cli, caption, hashtags, platforms).await;
    }

    let times = plan.unwrap_or_default();
    let records = service.schedule(ScheduleRequest {
        media: cli.media.clone(),
        caption,
        hashtags,
        keywords,
        platforms,
        times,
    })?;

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!(
                "{}\t{}\t{}",
                record.id,
                format_local(record.scheduled_time),
                record.platforms.join(",")
            );
        }
    }

    tracing::info!("Queued {} post(s)", records.len());
    Ok(())
}

/// Resolve `--at` or the `--time` grid into concrete times
fn plan_times(cli: &Cli, config: &Config) -> anyhow::Result<Option<Vec<DateTime<Utc>>>> {
    if let Some(at) = &cli.at {
        return Ok(Some(vec![parse_schedule(at, None)?]));
    }

    let Some(time) = &cli.time else {
        return Ok(None);
    };
    let time = parse_clock_time(time)
        .ok_or_else(|| invalid(format!("Invalid time '{}'. Expected HH:MM", time)))?;

    let plan = SchedulePlan {
        start_date: cli.date.unwrap_or_else(|| Local::now().date_naive()),
        time,
        days: cli.days,
        posts_per_day: cli.posts_per_day,
        randomization: parse_randomization(&cli.randomize, config)?,
    };
    Ok(Some(plan.expand(Utc::now())?))
}

fn parse_randomization(raw: &str, config: &Config) -> anyhow::Result<Randomization> {
    let value = raw.trim().to_lowercase();
    match value.as_str() {
        "none" => Ok(Randomization::None),
        "jitter" => Ok(Randomization::Jitter),
        "best" => Ok(Randomization::BestTime(best_times(config))),
        _ => {
            let range = value
                .strip_prefix("hours:")
                .and_then(|r| r.split_once('-'))
                .and_then(|(start, end)| Some((start.trim().parse::<u32>().ok()?, end.trim().parse::<u32>().ok()?)));
            match range {
                Some((start, end)) => Ok(Randomization::HourRange { start, end }),
                None => Err(invalid(format!(
                    "Invalid randomization '{}'. Valid options: none, jitter, hours:START-END, best",
                    raw
                ))),
            }
        }
    }
}

/// Run generation in the background and wait for its event
async fn generate(
    service: &RocketService,
    events: &mut EventReceiver,
    cli: &Cli,
) -> anyhow::Result<GeneratedContent> {
    let prompts = Prompts {
        caption: cli.caption_prompt.clone().unwrap_or_default(),
        hashtags: cli.hashtag_prompt.clone().unwrap_or_default(),
        keywords: cli.keyword_prompt.clone().unwrap_or_default(),
    };

    eprintln!("Generating content for {}...", display_name(&cli.media));
    service.spawn_generation(cli.media.clone(), prompts);

    while let Some(event) = events.recv().await {
        match event {
            Event::ContentGenerated { content, .. } => {
                for failure in &content.failures {
                    eprintln!("Note: {}", failure);
                }
                eprintln!("Generated content using {}", content.provider);
                return Ok(content);
            }
            Event::GenerationFailed { error, .. } => {
                if error == GenerationError::NoProviderConfigured.to_string() {
                    return Err(RocketError::from(GenerationError::NoProviderConfigured).into());
                }
                bail!("{}", error);
            }
            other => tracing::debug!("{}", other),
        }
    }

    bail!("Generation ended without a result")
}

async fn post_now(
    service: &RocketService,
    cli: &Cli,
    caption: String,
    hashtags: String,
    platforms: Vec<String>,
) -> anyhow::Result<()> {
    let results = service
        .post_now(PostNowRequest {
            media: cli.media.clone(),
            caption,
            hashtags,
            platforms,
        })
        .await?;

    if cli.format == "json" {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            let mark = if result.success { "ok" } else { "failed" };
            println!("{}\t{}\t{}", result.platform, mark, result.message);
        }
    }

    if !results.iter().any(|r| r.success) {
        bail!("Post failed on every platform");
    }
    Ok(())
}

fn print_generated(content: &GeneratedContent, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(content).context("Failed to encode content")?
        );
    } else {
        println!("Caption:  {}", content.caption);
        println!("Hashtags: {}", content.hashtags);
        println!("Keywords: {}", content.keywords);
    }
    Ok(())
}

/// Explicit value wins over generated content
fn pick(explicit: Option<&str>, generated: Option<&str>) -> String {
    explicit.or(generated).unwrap_or_default().to_string()
}

fn format_local(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %I:%M %p").to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    RocketError::InvalidInput(message.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_randomization() {
        let config = Config::default_config();
        assert_eq!(parse_randomization("none", &config).unwrap(), Randomization::None);
        assert_eq!(parse_randomization("Jitter", &config).unwrap(), Randomization::Jitter);
        assert_eq!(
            parse_randomization("hours:9-17", &config).unwrap(),
            Randomization::HourRange { start: 9, end: 17 }
        );
        assert!(matches!(
            parse_randomization("best", &config).unwrap(),
            Randomization::BestTime(times) if !times.is_empty()
        ));
    }

    #[test]
    fn test_parse_randomization_rejects_garbage() {
        let config = Config::default_config();
        let err = parse_randomization("hours:nine-five", &config).unwrap_err();
        assert_eq!(exit_code(&err), 3);
        assert!(parse_randomization("sometimes", &config).is_err());
    }

    #[test]
    fn test_explicit_text_wins_over_generated() {
        assert_eq!(pick(Some("mine"), Some("generated")), "mine");
        assert_eq!(pick(None, Some("generated")), "generated");
        assert_eq!(pick(None, None), "");
    }

    #[test]
    fn test_unknown_errors_exit_with_one() {
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 1);
        assert_eq!(
            exit_code(&RocketError::from(GenerationError::NoProviderConfigured).into()),
            2
        );
    }
}
