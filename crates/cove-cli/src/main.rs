//! Operational CLI for a cove deployment: the invitation expiry sweep
//! (one-shot or on an interval) plus a handful of admin commands that work
//! directly against the database.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use cove_core::{App, LogNotifier};
use cove_db::Database;
use cove_types::models::Role;

#[derive(Parser, Debug)]
#[command(name = "cove", version, about = "Cove messaging platform operations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Expire invitations past their deadline. Runs once by default.
    Sweep {
        /// Keep running, sweeping every N seconds.
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Create a channel with an existing user as its admin.
    CreateChannel {
        name: String,
        /// Email of the user who will administer the channel.
        #[arg(long)]
        admin: String,
    },
    /// Add an existing user to a channel, bypassing the invitation flow.
    AddMember {
        channel_id: Uuid,
        email: String,
        #[arg(long, default_value = "member")]
        role: String,
    },
    /// List the members of a channel.
    ListMembers { channel_id: Uuid },
    /// Create an account, optionally auto-accepting an invitation.
    Register {
        name: String,
        email: String,
        #[arg(long)]
        invitation: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cove=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let db_path = std::env::var("COVE_DB_PATH").unwrap_or_else(|_| "cove.db".into());
    let db = Database::open(&PathBuf::from(&db_path))
        .with_context(|| format!("failed to open database at {db_path}"))?;

    let mut app = App::new(db, Arc::new(LogNotifier));
    if let Ok(days) = std::env::var("COVE_INVITE_TTL_DAYS") {
        let days: i64 = days.parse().context("COVE_INVITE_TTL_DAYS must be an integer")?;
        app = app.with_invite_ttl(chrono::Duration::days(days));
    }

    match cli.command {
        Commands::Sweep { interval_secs } => run_sweep(&app, interval_secs).await?,
        Commands::CreateChannel { name, admin } => {
            let user = app
                .find_account_by_email(&admin)?
                .with_context(|| format!("no account with email {admin}"))?;
            let channel = app.create_channel(&name, user.id, Utc::now())?;
            println!("created channel {} ({})", channel.name, channel.id);
        }
        Commands::AddMember { channel_id, email, role } => {
            let Some(role) = Role::from_str(&role) else {
                bail!("role must be 'member' or 'admin'");
            };
            let user = app
                .find_account_by_email(&email)?
                .with_context(|| format!("no account with email {email}"))?;
            app.db().add_member(channel_id, user.id, role, Utc::now())?;
            println!("added {} to {} as {}", email, channel_id, role.as_str());
        }
        Commands::ListMembers { channel_id } => {
            let rows = app.db().list_members(channel_id)?;
            if rows.is_empty() {
                println!("no members");
            }
            for row in rows {
                let member = row.into_member();
                println!(
                    "{}  {:<24} {:<6} joined {}",
                    member.user_id, member.name, member.role.as_str(), member.joined_at
                );
            }
        }
        Commands::Register { name, email, invitation } => {
            let user = app.register(&name, &email, invitation, Utc::now())?;
            println!("registered {} ({})", user.email, user.id);
        }
    }

    Ok(())
}

/// One-shot by default; with `--interval-secs` keeps sweeping until ctrl-c.
async fn run_sweep(app: &App, interval_secs: Option<u64>) -> anyhow::Result<()> {
    let count = app.expire_sweep(Utc::now())?;
    println!("expired {count} invitations");

    let Some(secs) = interval_secs else {
        return Ok(());
    };

    info!(interval_secs = secs, "sweeping on an interval, ctrl-c to stop");
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    ticker.tick().await; // first tick completes immediately

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let count = app.expire_sweep(Utc::now())?;
                if count > 0 {
                    println!("expired {count} invitations");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}
