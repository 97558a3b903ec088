//! sqlgate CLI Entry Point
//!
//! Subcommands:
//! - `serve` - Line-delimited JSON request loop on stdio
//! - `query` - One-shot query against the stored profile
//! - `profile show` - Print the stored profile (secrets masked)
//! - `profile init` - Create the stored profile interactively
//!
//! All output to stdout is JSON-only. Logs go to stderr, filtered by
//! `SQLGATE_LOG` (or `logFilter` in the config, default `warn`).

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Password, Select};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use sqlgate::config::{GatewayConfig, ProfileStore};
use sqlgate::output::{envelope, ErrorEnvelope};
use sqlgate::server::{self, Request};
use sqlgate::{connection, AuthSpec, ConnectionProfile, Gateway, GatewayError, SessionId, SqlServerBackend};

/// Environment variable holding the tracing filter
const LOG_ENV: &str = "SQLGATE_LOG";

/// sqlgate - Session-scoped SQL Server query gateway
#[derive(Parser)]
#[command(name = "sqlgate")]
#[command(about = "Session-scoped SQL Server gateway with normalized JSON results")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-line requests on stdin/stdout
    Serve,

    /// Run one query against the stored profile and print the result envelope
    Query {
        /// SQL text, sent verbatim
        #[arg(long)]
        sql: String,
    },

    /// Inspect or create the stored connection profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print the stored profile with secrets masked
    Show,

    /// Prompt for a profile and save it
    Init,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileView {
    path: String,
    profile: ConnectionProfile,
    connection_string: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            let envelope = match e.downcast_ref::<GatewayError>() {
                Some(err) => ErrorEnvelope::from_error(err),
                None => ErrorEnvelope::new("INTERNAL_ERROR", e.to_string()),
            };
            match serde_json::to_string(&envelope) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("{e}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command succeeded
async fn run(cli: Cli) -> Result<bool> {
    let config = GatewayConfig::resolve()?;
    init_tracing(config.log_filter.as_deref());

    let store = config.profile_store()?;

    match cli.command {
        Commands::Serve => {
            let gateway = Gateway::with_options(SqlServerBackend, config.normalize_options());
            server::serve(&gateway).await?;
            Ok(true)
        }
        Commands::Query { sql } => run_query(&config, &store, sql).await,
        Commands::Profile { action: ProfileAction::Show } => {
            let profile = store.load()?;
            let view = ProfileView {
                path: store.path().display().to_string(),
                connection_string: connection::redact(&connection::build(&profile)),
                profile: profile.redacted(),
            };
            print_json(&envelope(Ok(view))?)?;
            Ok(true)
        }
        Commands::Profile { action: ProfileAction::Init } => {
            let current = store.load().unwrap_or_default();
            let (profile, password_env) = prompt_profile(&current)?;
            store.save(&profile, password_env.as_deref())?;
            tracing::info!(path = %store.path().display(), "profile saved");

            let view = ProfileView {
                path: store.path().display().to_string(),
                connection_string: connection::redact(&connection::build(&profile)),
                profile: profile.redacted(),
            };
            print_json(&envelope(Ok(view))?)?;
            Ok(true)
        }
    }
}

async fn run_query(config: &GatewayConfig, store: &ProfileStore, sql: String) -> Result<bool> {
    let gateway = Gateway::with_options(SqlServerBackend, config.normalize_options());
    let session = SessionId::default();

    let opened =
        server::dispatch(&gateway, Request::Open { session: session.clone(), profile: store.load()? })
            .await?;
    if !is_ok(&opened) {
        print_json(&opened)?;
        return Ok(false);
    }

    let response =
        server::dispatch(&gateway, Request::Query { session: session.clone(), sql }).await?;
    gateway.close(&session).await;

    print_json(&response)?;
    Ok(is_ok(&response))
}

fn is_ok(response: &Value) -> bool {
    response.get("ok").and_then(Value::as_bool).unwrap_or(false)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn init_tracing(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Ask for a profile; returns it plus the password variable name, if chosen
fn prompt_profile(current: &ConnectionProfile) -> Result<(ConnectionProfile, Option<String>)> {
    let name: String =
        Input::new().with_prompt("Profile name").default(current.name.clone()).interact_text()?;
    let server: String = Input::new()
        .with_prompt("Server")
        .default(current.effective_server().to_string())
        .interact_text()?;
    let database: String = Input::new()
        .with_prompt("Database")
        .default(current.effective_database().to_string())
        .interact_text()?;

    let auth_choice = Select::new()
        .with_prompt("Authentication")
        .items(&["Windows (integrated)", "SQL Server login"])
        .default(match current.auth {
            AuthSpec::Windows => 0,
            AuthSpec::SqlLogin { .. } => 1,
        })
        .interact()?;

    let (auth, password_env) = if auth_choice == 0 {
        (AuthSpec::Windows, None)
    } else {
        let user: String = Input::new().with_prompt("User").interact_text()?;
        let from_env = Confirm::new()
            .with_prompt("Read the password from an environment variable?")
            .default(true)
            .interact()?;

        if from_env {
            let var: String = Input::new()
                .with_prompt("Variable name")
                .default("SQLGATE_PASSWORD".to_string())
                .interact_text()?;
            (AuthSpec::sql_login(user, String::new()), Some(var))
        } else {
            let password = Password::new().with_prompt("Password").interact()?;
            (AuthSpec::sql_login(user, password), None)
        }
    };

    let encrypt = Confirm::new()
        .with_prompt("Encrypt the connection?")
        .default(current.effective_encrypt())
        .interact()?;
    let trust_server_certificate = Confirm::new()
        .with_prompt("Trust the server certificate?")
        .default(current.effective_trust_server_certificate())
        .interact()?;

    let profile = ConnectionProfile {
        name,
        server,
        database: Some(database),
        auth,
        encrypt: Some(encrypt),
        trust_server_certificate: Some(trust_server_certificate),
        connection_string: String::new(),
    };
    Ok((profile, password_env))
}
