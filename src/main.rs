use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use log::info;

use regretwalk_lib::{
    metadata::{CachedLookup, CatalogLookup, VideoCard},
    models::Response,
    walkthrough::{Ingested, ProgressInfo, Step},
    ConfigStore, Database, StudyService,
};

/// Walk a participant through rating sessions of their YouTube watch history.
#[derive(Debug, Parser)]
#[command(name = "regretwalk", version, about)]
struct Cli {
    /// Google Takeout watch-history.json
    #[arg(long)]
    history: PathBuf,

    /// Participant identifier recorded with the upload
    #[arg(long)]
    participant: String,

    /// Study config (JSON); defaults apply when the file does not exist
    #[arg(long, default_value = "regretwalk.json")]
    config: PathBuf,

    /// SQLite database file
    #[arg(long, default_value = "regretwalk.db")]
    db: PathBuf,

    /// Offline video metadata catalog (JSON array)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Hours added to every watch timestamp
    #[arg(long, allow_hyphen_values = true)]
    tz_offset: Option<f64>,

    /// Seed for session sampling
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    regretwalk_lib::init_logging();
    let cli = Cli::parse();

    let store = ConfigStore::load(cli.config.clone())?;
    let config = store.config();
    let db = Database::new(cli.db.clone())?;

    let catalog = match &cli.catalog {
        Some(path) => CatalogLookup::load(path)?,
        None => CatalogLookup::new(Vec::new()),
    };
    info!("Loaded {} catalog entries", catalog.len());
    let lookup = CachedLookup::new(db.clone(), catalog);

    let service = match cli.seed {
        Some(seed) => StudyService::with_seed(db, config, lookup, seed)?,
        None => StudyService::new(db, config, lookup)?,
    };

    let history = std::fs::read_to_string(&cli.history)
        .with_context(|| format!("failed to read {}", cli.history.display()))?;
    let ingested = service
        .ingest_upload(&cli.participant, &history, cli.tz_offset)
        .await?;
    report_ingest(&ingested);
    if let Some(outcome) = ingested.rejection {
        println!("{}", outcome.message());
        return Ok(());
    }

    let upload_id = ingested.upload.id;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut step = service.next_step(&upload_id).await?;

    loop {
        step = match step {
            Step::Session { unit } => {
                println!();
                println!(
                    "== Session {} | {} | {} | {} videos ==",
                    unit.position,
                    unit.day_label(),
                    unit.time_range_label(),
                    unit.len()
                );
                service.next_step(&upload_id).await?
            }
            Step::Video {
                index,
                item,
                progress,
                ..
            } => {
                let card = VideoCard::build(&item.metadata, item.event.watched_at, Utc::now());
                println!();
                print_progress(&progress);
                println!("[{}] {}", index + 1, card.title);
                println!(
                    "    {} | {} | {} | watched {}",
                    card.channel_title, card.display_views, card.display_age, card.watched_at
                );
                let response = prompt(&mut lines, "Do you regret watching it? [r/n/d/s]")?;
                service.rate_video(&upload_id, response).await?
            }
            Step::AttentionCheck { probe, progress } => {
                println!();
                print_progress(&progress);
                println!("{}", probe.stimulus);
                let response = prompt(&mut lines, "[r/n/d/s]")?;
                service.answer_attention_check(&upload_id, response).await?
            }
            Step::Finished { outcome } => {
                println!();
                println!("{}", outcome.message());
                if outcome.is_success() {
                    print_summary(&service, &upload_id).await?;
                    service.finish(&upload_id).await?;
                }
                return Ok(());
            }
        };
    }
}

fn report_ingest(ingested: &Ingested) {
    let stats = &ingested.stats;
    println!(
        "Read {} records ({} not watches, {} ads, {} bad ids dropped) into {} sessions",
        stats.total_records,
        stats.dropped_not_watch,
        stats.dropped_ads,
        stats.dropped_bad_id,
        ingested.session_count
    );
}

fn print_progress(progress: &ProgressInfo) {
    println!(
        "Progress: {}/{} ({:.0}%)",
        progress.rated, progress.target, progress.percent
    );
}

fn prompt<B: BufRead>(lines: &mut io::Lines<B>, question: &str) -> Result<Response> {
    loop {
        print!("{question} > ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            bail!("input closed before the walkthrough finished");
        };
        match parse_answer(line?.trim()) {
            Some(response) => return Ok(response),
            None => println!("Answer r (regret), n (no regret), d (don't remember) or s (skip)."),
        }
    }
}

fn parse_answer(answer: &str) -> Option<Response> {
    match answer.to_ascii_lowercase().as_str() {
        "r" => Some(Response::Regret),
        "n" => Some(Response::NoRegret),
        "d" => Some(Response::NoRemember),
        "s" => Some(Response::Skip),
        _ => answer.parse().ok(),
    }
}

async fn print_summary<L>(service: &StudyService<L>, upload_id: &str) -> Result<()>
where
    L: regretwalk_lib::metadata::MetadataLookup,
{
    let entries = service.summary(upload_id).await?;
    println!();
    println!("== Your responses ==");
    for entry in entries {
        println!(
            "{:<12} {}",
            entry.response.as_str(),
            entry.title.as_deref().unwrap_or(entry.video_id.as_str())
        );
    }
    Ok(())
}
