use clap::{Parser, Subcommand};
use senbatsu::config::Config;
use senbatsu::line::LineClient;
use senbatsu::server::{self, AppState};
use senbatsu::store::VoteStore;
use senbatsu::{engine, logging};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

#[derive(Parser)]
#[command(name = "senbatsu", version, about = "Daily two-group voting bot for LINE")]
struct Cli {
    /// Path of the JSON5 configuration file.
    #[arg(short, long, global = true, default_value = "senbatsu.json5")]
    config: PathBuf,

    /// Enable debug logging for this crate.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server (the default).
    Serve {
        /// Override the configured bind address.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load and validate the configuration, then exit.
    CheckConfig,
    /// Print the current tally report from the local store.
    Tally,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match Config::load(&cli.config) {
        Ok(config) => Arc::new(config),
        Err(error) => {
            error!(path = %cli.config.display(), %error, "cannot load configuration");
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let sender = match LineClient::new(config.clone()) {
                Ok(client) => Arc::new(client),
                Err(error) => {
                    error!(%error, "cannot build LINE client");
                    return ExitCode::FAILURE;
                }
            };
            let store = VoteStore::new(config.store_path.clone());
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            let state = Arc::new(AppState::new(config, store, sender));
            if let Err(error) = server::run(state, &bind).await {
                error!(%error, "server error");
                return ExitCode::FAILURE;
            }
        }
        Command::CheckConfig => {
            println!(
                "configuration ok: {} candidates, {} admins, window {} to {} ({})",
                config.candidates.len(),
                config.admins.len(),
                config.window.opens_at,
                config.window.closes_at,
                config.timezone,
            );
            if config.line.channel_secret.is_empty() {
                println!("warning: channel secret is not set");
            }
            if config.line.channel_access_token.is_empty() {
                println!("warning: channel access token is not set");
            }
        }
        Command::Tally => {
            let store = VoteStore::new(config.store_path.clone());
            match store.load(&config.candidates).await {
                Ok(dataset) => println!("{}", engine::report::render(&config, &dataset)),
                Err(error) => {
                    error!(%error, "cannot load vote dataset");
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    ExitCode::SUCCESS
}
