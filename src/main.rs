//! embedguard - headless embed supervision
//!
//! Loads a page fixture, runs the lazy preview stage and both supervision
//! scopes against it with scripted players, then prints what became of
//! every embed.

use anyhow::Result;
use clap::Parser;
use embedguard::fixture::PageFixture;
use embedguard::{
    ApiLoader, EmbedSettings, EmbedSupervisor, EventLog, EventSink, ScriptedPlayerFactory,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Parser)]
#[command(version, about = "Supervise the video embeds of a page fixture")]
struct Args {
    /// Page fixture (JSON): url, body markup and player behaviour
    page: PathBuf,

    /// Settings file (JSON); defaults to the user config location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the JSONL event log
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Click every lazy preview once supervision has started
    #[arg(long)]
    activate_lazy: bool,

    /// Stop waiting for unsettled embeds after this many milliseconds
    #[arg(long, default_value_t = 10_000)]
    settle_timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let settings = match &args.config {
        Some(path) => EmbedSettings::load(path)?,
        None => EmbedSettings::load_or_default()?,
    };

    let (page, script) = PageFixture::load(&args.page)?.into_page()?;
    let page = Arc::new(page);
    let players = Arc::new(ScriptedPlayerFactory::new(script));
    let loader = Arc::new(ApiLoader::new(page.clone()));

    let (events, rx) = EventSink::channel();
    let recorder = match &args.event_log {
        Some(dir) => {
            let log = EventLog::new(dir).await?;
            println!("Recording events to {}", log.path().display());
            Some(tokio::spawn(async move { log.record(rx).await }))
        }
        None => None,
    };

    let supervisor =
        EmbedSupervisor::new(page.clone(), players.clone(), loader, settings)?.with_events(events);
    let run = supervisor.run_page().await;

    let mut activated = 0;
    if args.activate_lazy {
        for preview in run.previews {
            if page.click(preview.button).await && preview.activated().await.is_some() {
                activated += 1;
            }
        }
    }

    let deadline = Instant::now() + Duration::from_millis(args.settle_timeout_ms);
    let settlement = EmbedSupervisor::collect_until(run.controllers, deadline).await;

    for report in &settlement.reports {
        println!(
            "{:<20} {:<12} {:<10} {:<17} {:?}",
            report.identity,
            report.video_id,
            report.scope.as_str(),
            report.mode.as_str(),
            report.outcome
        );
    }
    if !settlement.unsettled.is_empty() {
        eprintln!(
            "WARNING: {} embeds still unsettled after {} ms",
            settlement.unsettled.len(),
            args.settle_timeout_ms
        );
        for task in &settlement.unsettled {
            println!("{:<20} {:<12} unsettled", task.identity, task.video_id);
            task.abort();
        }
    }
    if args.activate_lazy {
        println!("Activated {} lazy previews", activated);
    }
    println!("Player attachments: {}", players.attachments().await.len());
    println!();
    println!("{}", page.render_html().await);

    // Unclicked previews and unsettled controllers keep their sinks open,
    // so the recorder only gets a short grace period to drain
    drop(supervisor);
    if let Some(recorder) = recorder {
        match tokio::time::timeout(Duration::from_secs(1), recorder).await {
            Ok(Ok(written)) => println!("Logged {} events", written),
            _ => println!("Event log left open by pending embeds"),
        }
    }

    Ok(())
}
