use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};

use climbing_seats::{
    app::{build_app, serve},
    auth::{password::hash_password, repo_types::User},
    config::AppConfig,
    db,
    notify::Notifier,
    scheduler::Scheduler,
    state::AppState,
};

#[derive(Parser, Debug)]
#[command(name = "climbing-seats")]
#[command(version, about = "Seat registration for climbing society sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API and the scheduler (default)
    Serve,
    /// Create an admin account
    AddUser {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "climbing_seats=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::AddUser { username, password } => add_user(&config, &username, &password).await,
    }
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::init(config).await?;

    let notifier = Arc::new(Notifier::from_config(&state.config)?);
    let scheduler = Arc::new(Scheduler::new(
        state.events.clone(),
        notifier,
        state.clock.clone(),
        state.config.public_url.clone(),
        state.config.scheduler.clone(),
    ));
    let _jobs = scheduler.spawn();

    let http = state.config.http.clone();
    serve(build_app(state), &http).await
}

async fn add_user(config: &AppConfig, username: &str, password: &str) -> anyhow::Result<()> {
    let username = username.trim();
    anyhow::ensure!(!username.is_empty(), "username must not be empty");
    anyhow::ensure!(!password.is_empty(), "password must not be empty");

    let db = db::connect(
        &config.database_url,
        Duration::from_secs(config.db_busy_timeout_secs),
    )
    .await?;

    if User::find_by_username(&db, username).await?.is_some() {
        anyhow::bail!("user {username:?} already exists");
    }
    let hash = hash_password(password)?;
    let user = User::create(&db, username, &hash)
        .await
        .with_context(|| format!("create user {username:?}"))?;

    tracing::info!(user_id = user.id, username = %user.username, "admin user created");
    Ok(())
}
