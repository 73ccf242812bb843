use anyhow::Result;
use clap::Parser;
use kennel_care::config;
use kennel_care::midnight::SystemClock;
use kennel_care::model::Notification;
use kennel_care::{CareBoard, HttpCareClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about = "Daily care board for kennel operations")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Refresh once, print the board and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(cfg.app.log_filter.as_deref().unwrap_or("info"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let client = HttpCareClient::new(&cfg.api.base_url, cfg.api.api_key.clone())?;
    let (board, mut notifications) = CareBoard::new(Arc::new(client), &cfg.care);

    // Toasts become log lines in the terminal.
    let toasts = tokio::spawn(async move {
        while let Some(note) = notifications.recv().await {
            match note {
                Notification::Success { title, message } => info!(%title, %message, "notice"),
                Notification::Error { title, message } => warn!(%title, %message, "notice"),
            }
        }
    });

    board.refresh(true).await;

    if args.once {
        print_board(&board).await;
        board.teardown();
        drop(board);
        let _ = toasts.await;
        return Ok(());
    }

    board.start_midnight_rollover(Arc::new(SystemClock));
    if let Some(next) = board.next_midnight() {
        info!(%next, "watching for midnight rollover");
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(?err, "failed to listen for ctrl-c");
    }
    info!("shutting down");
    board.teardown();
    Ok(())
}

async fn print_board(board: &CareBoard) {
    let counts = board.appointment_counts().await;
    for dog in board.sorted_dogs().iter() {
        let last = dog
            .last_care
            .as_ref()
            .map(|c| format!("{} ({}) at {}", c.task_name, c.category, c.timestamp.format("%H:%M")))
            .unwrap_or_else(|| "no care logged".to_string());
        println!(
            "{:<12} {:<16} {:<40} events: {}{}",
            dog.group().unwrap_or("-"),
            dog.dog_name,
            last,
            counts.get(&dog.dog_id).copied().unwrap_or(0),
            if dog.flags.in_heat { "  [in heat]" } else { "" },
        );
    }
}
