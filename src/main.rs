//! stb - submit task folders for expert review
//!
//! CLI binary that packages a folder, validates it remotely and registers it
//! as a submission.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cli::Stylize;
use stb::config::{Environment, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;

/// Log filter variable, e.g. `STB_LOG=stb=trace`
const LOG_ENV_VAR: &str = "STB_LOG";

const EXIT_FAILURE: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "stb")]
#[command(about = "Package, validate and submit task folders for review")]
#[command(version)]
struct Cli {
    /// Environment to talk to
    #[arg(long, global = true, value_enum, default_value_t = Environment::Prod, hide = true)]
    env: Environment,

    /// Log remote calls and pipeline transitions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update a submission
    Submit {
        #[command(subcommand)]
        action: SubmitCommand,
    },

    /// List your submissions
    List {
        /// Only show submissions of this project
        #[arg(long)]
        project_id: Option<String>,
    },

    /// Authentication management
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
}

#[derive(Subcommand)]
enum SubmitCommand {
    /// Create and upload a new submission from FOLDER
    Create(SubmitArgs),
    /// Update the submission recorded in FOLDER with its current content
    Update(SubmitArgs),
}

#[derive(Args)]
struct SubmitArgs {
    /// Project ID
    #[arg(long)]
    project_id: String,

    /// Package the folder without uploading anything
    #[arg(long)]
    dry_run: bool,

    /// Task folder to submit
    folder: PathBuf,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Test authentication
    Test,
    /// Show authentication setup instructions
    Setup,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "stb=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    let settings = Settings::load(cli.env)?;
    tracing::debug!(env = %settings.environment, stub = settings.is_stub(), "settings resolved");

    match cli.command {
        Commands::Submit { action } => {
            let (action, args) = match action {
                SubmitCommand::Create(args) => (cli::SubmitAction::Create, args),
                SubmitCommand::Update(args) => (cli::SubmitAction::Update, args),
            };
            let code = cli::run_submit(
                &settings,
                action,
                &args.folder,
                &args.project_id,
                args.dry_run,
            )
            .await?;
            Ok(code)
        }
        Commands::List { project_id } => {
            cli::run_list(&settings, project_id.as_deref()).await?;
            Ok(0)
        }
        Commands::Auth { action } => {
            let action = match action {
                AuthCommand::Test => cli::AuthAction::Test,
                AuthCommand::Setup => cli::AuthAction::Setup,
            };
            cli::run_auth(&settings, action).await?;
            Ok(0)
        }
    }
}

fn report(err: &anyhow::Error) -> u8 {
    anstream::eprintln!("{}: {err}", "error".error());

    match err.downcast_ref::<stb::Error>() {
        Some(stb::Error::Interrupted { retained_artifact }) => {
            if let Some(path) = retained_artifact {
                anstream::eprintln!(
                    "  {} {}",
                    "artifact kept at".muted().for_stderr(),
                    path.display()
                );
            }
            EXIT_INTERRUPTED
        }
        _ => EXIT_FAILURE,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => ExitCode::from(report(&err)),
    }
}
