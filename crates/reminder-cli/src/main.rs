use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "reminder", version, about = "Reminder notification CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show notifications as they arrive (n/p/c/r/d/q on stdin)
    Watch(commands::watch::WatchArgs),
    /// Add or replace a notification in the slot
    Publish(commands::slot::PublishArgs),
    /// List notifications stored in the slot
    List {
        /// Print JSON
        #[arg(long)]
        json: bool,
        /// Include inactive and expired entries
        #[arg(long)]
        all: bool,
    },
    /// Remove a notification from the slot
    Remove {
        /// Notification ID
        id: String,
    },
    /// Empty the slot
    Clear,
    /// Fetch one snapshot from the API (falls back to the slot)
    Fetch {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Logs go to stderr so stdout stays free for the display.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("REMINDER_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Watch(args) => commands::watch::run(args),
        Commands::Publish(args) => commands::slot::publish(args),
        Commands::List { json, all } => commands::slot::list(json, all),
        Commands::Remove { id } => commands::slot::remove(&id),
        Commands::Clear => commands::slot::clear(),
        Commands::Fetch { json } => commands::fetch::run(json),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "reminder", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
