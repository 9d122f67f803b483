//! digichar CLI
//!
//! Reconciles auction state from a ledger snapshot and prints derived views
//! as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use digichar_leaderboard::WinnerFilter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// Auction reconciliation over a ledger snapshot.
#[derive(Parser)]
#[command(name = "digichar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (JSON)
    #[arg(short, long, global = true, env = "DIGICHAR_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger snapshot (JSON). The built-in demo ledger is used when omitted.
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show one auction record
    Auction {
        /// Auction id (defaults to the open auction)
        id: Option<u64>,
    },

    /// Show past auctions, one capped window at a time
    History {
        /// Window of past auctions, 0 being the newest
        #[arg(short, long, default_value_t = 0)]
        window: usize,

        /// Page of the filtered records
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Case-insensitive character name or symbol search
        #[arg(long)]
        search: Option<String>,

        /// Winner status filter
        #[arg(long, value_enum, default_value_t = WinnerArg::All)]
        winner: WinnerArg,
    },

    /// Show a user's auction ledgers and statistics
    User {
        /// User address (defaults to the snapshot's caller)
        #[arg(short, long)]
        user: Option<String>,

        /// Window of past auctions, 0 being the newest
        #[arg(short, long, default_value_t = 0)]
        window: usize,
    },

    /// Rank winning characters across every past auction
    Leaderboard {
        /// Page of the leaderboard
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },

    /// Show aggregate figures over every past auction
    Metrics,

    /// Show the bid and withdrawal activity of an auction
    Activity {
        /// Auction id
        id: u64,

        /// Number of top bidders to list
        #[arg(long, default_value_t = 3)]
        top: usize,
    },

    /// Submit an action against the snapshot ledger
    Submit {
        #[command(subcommand)]
        action: SubmitCommands,

        /// Write the updated snapshot back to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SubmitCommands {
    /// Bid on a character of the open auction
    Bid {
        /// Character slot (0-2)
        index: u8,
        /// Amount in wei (decimal or 0x hex)
        value: String,
    },
    /// Withdraw part of a bid
    Withdraw {
        auction_id: u64,
        /// Character slot (0-2)
        index: u8,
        /// Amount in wei (decimal or 0x hex)
        amount: String,
    },
    /// Claim tokens from a closed auction
    Claim { auction_id: u64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum WinnerArg {
    All,
    WithWinner,
    NoWinner,
}

impl From<WinnerArg> for WinnerFilter {
    fn from(arg: WinnerArg) -> Self {
        match arg {
            WinnerArg::All => WinnerFilter::All,
            WinnerArg::WithWinner => WinnerFilter::WithWinner,
            WinnerArg::NoWinner => WinnerFilter::NoWinner,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays valid JSON.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context::open(cli.config.as_deref(), cli.snapshot.as_deref())?;

    match cli.command {
        Commands::Auction { id } => commands::auction(ctx, id).await,
        Commands::History {
            window,
            page,
            search,
            winner,
        } => commands::history(ctx, window, page, search, winner.into()).await,
        Commands::User { user, window } => commands::user(ctx, user, window).await,
        Commands::Leaderboard { page } => commands::leaderboard(ctx, page).await,
        Commands::Metrics => commands::metrics(ctx).await,
        Commands::Activity { id, top } => commands::activity(ctx, id, top).await,
        Commands::Submit { action, save } => {
            let action = match action {
                SubmitCommands::Bid { index, value } => commands::bid_action(index, &value)?,
                SubmitCommands::Withdraw {
                    auction_id,
                    index,
                    amount,
                } => commands::withdraw_action(auction_id, index, &amount)?,
                SubmitCommands::Claim { auction_id } => commands::claim_action(auction_id),
            };
            commands::submit(ctx, action, save).await
        }
    }
}
