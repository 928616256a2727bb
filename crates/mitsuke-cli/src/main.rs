//! `mitsuke` - browse the anime catalog and keep a watch list from the
//! terminal.
//!
//! ```bash
//! mitsuke login rin --password secret
//! mitsuke search "cowboy bebop"
//! mitsuke add 1
//! mitsuke edit 1001 --status watching --episodes 3
//! mitsuke list
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use mitsuke_core::config::AppConfig;
use mitsuke_core::models::WatchStatus;

mod commands;
mod print;

const DEFAULT_FILTER: &str = "mitsuke=info,mitsuke_runtime=info,mitsuke_core=info,mitsuke_api=warn";

#[derive(Parser)]
#[command(name = "mitsuke")]
#[command(author, version, about = "Anime discovery and watch list client")]
struct Cli {
    /// Write logs to a daily rotating file in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    // ── Account ─────────────────────────────────────────────────
    /// Sign in and remember the session
    Login {
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show who is signed in
    Whoami,
    /// Create an account
    Register {
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(short, long)]
        password: String,
    },
    /// Confirm an email address with the token from the verification mail
    Verify { token: String },
    /// Send the verification mail again
    ResendVerification { user_id: i64 },
    /// Request a password reset link
    ForgotPassword { email: String },
    /// Set a new password with the token from a reset link
    ResetPassword {
        #[arg(short, long)]
        token: Option<String>,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        confirm: String,
    },
    /// Show the signed-in user's profile
    Profile,
    /// Change the signed-in user's profile
    UpdateProfile {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// Leave out to keep the current password
        #[arg(long)]
        password: Option<String>,
    },

    // ── Catalog ─────────────────────────────────────────────────
    /// Top rated anime
    Top,
    /// Anime airing this season
    Seasonal,
    /// Anime announced for upcoming seasons
    Upcoming,
    /// Page through the whole catalog
    Browse {
        #[arg(default_value_t = 1)]
        page: u32,
    },
    /// Search the catalog by title
    Search {
        query: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Anime matching all of the given genre ids
    Genre {
        #[arg(required = true)]
        ids: Vec<u32>,
    },
    /// Full details of one anime
    Details { mal_id: u64 },
    /// Recommendations for the signed-in user
    Recommend {
        /// Leave out adult titles
        #[arg(long)]
        safe_search: bool,
    },

    // ── Watch list ──────────────────────────────────────────────
    /// Show your watch list
    List,
    /// Add an anime to your watch list
    Add { mal_id: u64 },
    /// Change status, rating or progress of a list entry
    Edit {
        record_id: i64,
        #[arg(long, value_parser = parse_status)]
        status: Option<WatchStatus>,
        #[arg(long)]
        rating: Option<f32>,
        #[arg(long)]
        episodes: Option<u32>,
    },
    /// Remove an entry from your watch list
    Remove { record_id: i64 },

    // ── Settings ────────────────────────────────────────────────
    /// Show the effective configuration and where it is read from
    Config {
        /// Write the effective configuration to the user config file
        #[arg(long)]
        init: bool,
    },
}

fn parse_status(s: &str) -> Result<WatchStatus, String> {
    WatchStatus::parse(s).ok_or_else(|| {
        format!("unknown status '{s}' (watching, completed, on_hold, dropped, plan_to_watch)")
    })
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "mitsuke.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let app = commands::App::open(config, cli.json)?;
    app.dispatch(cli.command).await
}
