use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::Row;

mod auth;
mod config;
mod db;
mod drive_api;
mod error;
mod store;
mod sync;
#[cfg(test)]
mod testutil;
mod webhook;

use drive_api::{DriveApi, DriveClient};
use store::access::Role;
use sync::classify::HeuristicClassifier;
use sync::extract::HttpExtractor;
use sync::subscriptions::SubscriptionManager;
use sync::worker::NotificationQueue;
use sync::SyncOrchestrator;

#[derive(Parser)]
#[command(
    name = "drivesyncd",
    version,
    about = "Google Drive to daily knowledge store sync daemon"
)]
struct Cli {
    /// Path to config file [default: ~/.config/drivesyncd/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the sync daemon (foreground, for systemd)
    Start,
    /// Show sync status summary
    Status,
    /// Trigger an immediate sweep over all top-level folders
    SyncNow,
    /// List today's entries as a given role would see them
    Entries {
        /// Role to filter by (superadmin, admin, relief_member, viewer)
        #[arg(long, default_value = "superadmin")]
        role: String,
        /// Only show entries with this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Record a manual entry for today (no backing Drive file)
    AddNote {
        #[arg(long, default_value = "GENERAL")]
        tag: String,
        content: String,
        #[arg(long, default_value = "operator")]
        user: String,
    },
    /// Replace the role grants on a watched folder
    Grant {
        folder: String,
        roles: Vec<String>,
    },
}

fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "drivesyncd=info",
        1 => "drivesyncd=debug",
        2 => "drivesyncd=trace",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Start => run_daemon(cfg).await,
        Command::Status => {
            let pool = db::open_db_readonly(cfg.database.path.as_deref()).await?;
            print_status(&pool).await?;
            pool.close().await;
            Ok(())
        }
        Command::SyncNow => {
            let pool = db::init_db(cfg.database.path.as_deref()).await?;
            let (orchestrator, _client) = build_orchestrator(pool.clone(), &cfg)?;

            tracing::info!("running on-demand sweep");
            let summary = orchestrator.on_demand_sync(Role::Superadmin).await?;

            pool.close().await;
            println!("{summary}");
            Ok(())
        }
        Command::Entries { role, tag } => {
            let pool = db::open_db_readonly(cfg.database.path.as_deref()).await?;
            let role: Role = role.parse()?;
            let day = store::today();

            let mut rows =
                sync::access::visible_entries(&pool, role, &day, &cfg.sync.event_category).await?;
            if let Some(tag) = tag {
                let tag = tag.to_uppercase();
                rows.retain(|e| e.tag == tag);
            }

            if rows.is_empty() {
                println!("no entries for {day}");
            }
            for e in &rows {
                let source = match (&e.file_name, &e.source_file_id) {
                    (Some(name), _) => name.as_str(),
                    (None, Some(id)) => id.as_str(),
                    (None, None) => e.uploaded_by.as_str(),
                };
                println!("{} #{:<4} [{:<12}] {}  ({source})", e.created_at, e.id, e.tag, e.content);
            }
            pool.close().await;
            Ok(())
        }
        Command::AddNote { tag, content, user } => {
            let pool = db::init_db(cfg.database.path.as_deref()).await?;
            let day = store::today();
            let tag = tag.to_uppercase();

            let id = store::entries::insert_manual_entry(&pool, &day, &tag, &content, &user).await?;
            let total = store::entries::entries_for_day_tag(&pool, &day, &tag).await?.len();

            pool.close().await;
            println!("added entry #{id}; {total} {tag} entries for {day}");
            Ok(())
        }
        Command::Grant { folder, roles } => {
            let pool = db::init_db(cfg.database.path.as_deref()).await?;
            let folder_row = store::folders::folder_by_name(&pool, &folder)
                .await?
                .with_context(|| format!("no watched folder named {folder:?}"))?;

            let parsed = roles
                .iter()
                .map(|r| r.parse())
                .collect::<Result<Vec<Role>>>()
                .with_context(|| {
                    let valid: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
                    format!("valid roles: {}", valid.join(", "))
                })?;
            store::access::set_folder_roles(&pool, folder_row.id, &parsed).await?;

            let granted = store::access::roles_for_folder(&pool, folder_row.id).await?;
            if granted.is_empty() {
                println!(
                    "{}: no explicit grants (elevated roles by default)",
                    folder_row.folder_name
                );
            } else {
                let names: Vec<&str> = granted.iter().map(Role::as_str).collect();
                println!("{}: {}", folder_row.folder_name, names.join(", "));
            }
            pool.close().await;
            Ok(())
        }
    }
}

fn build_orchestrator(
    pool: sqlx::SqlitePool,
    cfg: &config::Config,
) -> Result<(Arc<SyncOrchestrator>, Arc<dyn DriveApi>)> {
    let token_mgr = Arc::new(auth::TokenManager::new(cfg)?);
    let client: Arc<dyn DriveApi> = Arc::new(DriveClient::new(token_mgr));
    let orchestrator = Arc::new(SyncOrchestrator::new(
        pool,
        client.clone(),
        Arc::new(HeuristicClassifier),
        Arc::new(HttpExtractor::new(cfg.extractor.url.clone())),
        cfg,
    ));
    Ok((orchestrator, client))
}

async fn run_daemon(cfg: config::Config) -> Result<()> {
    let pool = db::init_db(cfg.database.path.as_deref()).await?;
    let (orchestrator, client) = build_orchestrator(pool.clone(), &cfg)?;

    tracing::info!("drivesyncd ready — running initial sweep");
    match orchestrator.on_demand_sync(Role::Superadmin).await {
        Ok(summary) => tracing::info!(%summary, "initial sweep complete"),
        Err(e) => tracing::error!(error = %format!("{e:#}"), "initial sweep failed"),
    }

    let cancel = tokio_util::sync::CancellationToken::new();

    // Push-notification plumbing only makes sense with a public callback.
    let mut subscriptions = None;
    let mut sweeper_handle = None;
    if let Some(callback_url) = cfg.webhook.callback_url.clone() {
        let subs = Arc::new(SubscriptionManager::new(
            pool.clone(),
            client.clone(),
            callback_url,
            cfg.webhook.secret.clone(),
        ));

        for folder in store::folders::all_folders(&pool).await? {
            if let Err(e) = subs.ensure_subscribed(&folder.drive_folder_id).await {
                tracing::warn!(
                    folder = %folder.folder_name,
                    error = %format!("{e:#}"),
                    "could not subscribe"
                );
            }
        }

        sweeper_handle = Some(tokio::spawn(subs.clone().run_sweeper(
            Duration::from_secs(cfg.sync.renewal_sweep_secs),
            cancel.clone(),
        )));
        subscriptions = Some(subs);
    } else {
        tracing::warn!("webhook.callback_url not set — relying on scheduled syncs only");
    }

    let (queue, rx) = NotificationQueue::new(cfg.sync.notification_queue_depth);
    let worker_handles = sync::worker::spawn_workers(
        cfg.sync.notification_workers,
        rx,
        orchestrator.clone(),
        cancel.clone(),
    );

    let app = webhook::router(webhook::WebhookState {
        queue,
        secret: cfg.webhook.secret.clone(),
    });
    let listener = tokio::net::TcpListener::bind(&cfg.webhook.bind_addr)
        .await
        .with_context(|| format!("bind webhook listener on {}", cfg.webhook.bind_addr))?;
    tracing::info!(addr = %cfg.webhook.bind_addr, "webhook listener ready");

    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        let shutdown = async move { server_cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "webhook server failed");
        }
    });

    let scheduler_handle = tokio::spawn(sync::scheduler::run_scheduler(
        cfg.schedule.clone(),
        orchestrator.clone(),
        subscriptions,
        cancel.clone(),
    ));

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, shutting down");
        }
    }
    cancel.cancel();

    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = server_handle.await;
    let _ = scheduler_handle.await;
    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }

    tracing::info!("closing database");
    pool.close().await;
    tracing::info!("drivesyncd stopped");
    Ok(())
}

/// Print a sync status summary for today.
async fn print_status(pool: &sqlx::SqlitePool) -> Result<()> {
    let day = store::today();

    let entries = store::entries::entry_count_for_day(pool, &day).await?;
    let subs = store::subscriptions::all_active(pool).await?;

    println!("drivesyncd status, {day}");
    println!("==========================");
    println!("Entries today:        {entries}");
    println!("Active subscriptions: {}", subs.len());
    for sub in &subs {
        println!(
            "  #{} channel {} folder {} expires {}",
            sub.id, sub.channel_id, sub.drive_folder_id, sub.expires_at
        );
    }

    println!();
    println!("Watched folders:");
    for folder in store::folders::all_folders(pool).await? {
        let last = folder.last_synced_at.as_deref().unwrap_or("never");
        println!("  {:<30} last synced {last}", folder.folder_name);
        for binding in store::shortcuts::bindings_for_folder(pool, folder.id).await? {
            let target = binding.target_name.as_deref().unwrap_or(&binding.target_file_id);
            println!("    shortcut {} -> {target}", binding.shortcut_name);
        }
    }

    let passes = store::sync_log::for_day(pool, &day).await?;
    if !passes.is_empty() {
        println!();
        println!("Today's passes:");
        for pass in passes.iter().rev().take(10) {
            let errors = match &pass.errors {
                Some(e) => format!("  errors: {e}"),
                None => String::new(),
            };
            let row = sqlx::query("SELECT folder_name FROM watched_folders WHERE id = ?")
                .bind(pass.folder_id)
                .fetch_optional(pool)
                .await?;
            let name = row
                .map(|r| r.get::<String, _>("folder_name"))
                .unwrap_or_else(|| "?".into());
            println!(
                "  #{} {} {:<12} {:<20} seen {:>3}, processed {:>3}{errors}",
                pass.id, pass.created_at, pass.trigger_kind, name, pass.files_seen,
                pass.files_processed
            );
        }
    }

    Ok(())
}
