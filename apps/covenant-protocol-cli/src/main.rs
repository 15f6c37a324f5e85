use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod error;

use context::{Context, Globals};
use error::CliResult;

#[derive(Parser)]
#[command(name = "covenant-protocol")]
#[command(about = "Covenant Protocol CLI - escrow commitments and milestone settlement")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a personal commitment with a fixed amount and deadline
    IssuePersonal {
        /// Owner wallet pubkey
        #[arg(long)]
        owner: String,

        /// Escrow keypair file (encrypted into the vault)
        #[arg(long, conflicts_with = "custodial_wallet")]
        escrow_keypair: Option<std::path::PathBuf>,

        /// Custodial wallet id plus escrow pubkey, "id:pubkey"
        #[arg(long)]
        custodial_wallet: Option<String>,

        /// Commitment amount in lamports
        #[arg(long)]
        amount: u64,

        /// Deadline as a unix timestamp
        #[arg(long)]
        deadline: i64,
    },

    /// Issue a creator reward commitment
    IssueReward {
        /// Owner wallet pubkey
        #[arg(long)]
        owner: String,

        /// Escrow keypair file (encrypted into the vault)
        #[arg(long, conflicts_with = "custodial_wallet")]
        escrow_keypair: Option<std::path::PathBuf>,

        /// Custodial wallet id plus escrow pubkey, "id:pubkey"
        #[arg(long)]
        custodial_wallet: Option<String>,
    },

    /// Activate a created commitment after funding its escrow
    Activate {
        commitment: String,
    },

    /// Recognize additional escrow funding on a reward commitment
    Fund {
        commitment: String,

        /// Additional lamports to recognize
        #[arg(long)]
        amount: u64,
    },

    /// Append a milestone to a reward commitment
    AddMilestone {
        commitment: String,

        #[arg(long)]
        description: String,

        /// Fixed unlock amount in lamports
        #[arg(long, conflicts_with = "percent")]
        lamports: Option<u64>,

        /// Unlock as a percentage of total funding
        #[arg(long)]
        percent: Option<u8>,

        /// Delivery deadline as a unix timestamp
        #[arg(long)]
        due_at: Option<i64>,
    },

    /// Mark a milestone delivered (owner-signed)
    CompleteMilestone {
        commitment: String,
        milestone: String,

        /// Open the review window immediately
        #[arg(long)]
        early_review: bool,

        /// Owner signature over "complete:<commitment>:<milestone>"
        #[arg(long)]
        signature: String,
    },

    /// Record a signed vote on a commitment or milestone
    CastVote {
        commitment: String,

        /// Milestone id; omit for a commitment-level vote
        #[arg(long)]
        milestone: Option<String>,

        /// Voter wallet pubkey
        #[arg(long)]
        wallet: String,

        /// "approve" or "reject"
        #[arg(long)]
        vote: String,

        /// Voter weight in USD at vote time
        #[arg(long)]
        weight_usd: String,

        /// Voter signature over "vote:<commitment>:<milestone?>:<vote>"
        #[arg(long)]
        signature: String,
    },

    /// Show a commitment, its milestones and tallies
    Status {
        /// Commitment id; omit to list all
        commitment: Option<String>,
    },

    /// Resolve a personal commitment at its deadline
    Resolve {
        commitment: String,
    },

    /// Settle a failed milestone's forfeited funds
    SettleMilestone {
        commitment: String,
        milestone: String,
    },

    /// Build the vote-reward distribution for a claimable milestone
    ReleaseMilestone {
        commitment: String,
        milestone: String,
    },

    /// Claim one wallet's share of a distribution
    Claim {
        distribution: String,

        #[arg(long)]
        wallet: String,
    },

    /// Claim every share of a distribution
    ClaimAll {
        distribution: String,
    },

    /// Rotate fee shares from a leaderboard file
    RotateFeeShares {
        /// YAML file of per-token leaderboards
        leaderboards: std::path::PathBuf,
    },

    /// Release a stuck resolving lock (admin)
    ForceUnstick {
        commitment: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => {}
        Err(e) if e.is_conflict() => {
            // The protocol treats these as success-shaped outcomes.
            println!("already done / in progress: {e}");
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let ctx = Context::build(&cli.globals).await?;

    match cli.command {
        Commands::IssuePersonal {
            owner,
            escrow_keypair,
            custodial_wallet,
            amount,
            deadline,
        } => {
            commands::issue_personal::execute(
                &ctx,
                owner,
                escrow_keypair,
                custodial_wallet,
                amount,
                deadline,
            )
            .await
        }

        Commands::IssueReward {
            owner,
            escrow_keypair,
            custodial_wallet,
        } => commands::issue_reward::execute(&ctx, owner, escrow_keypair, custodial_wallet).await,

        Commands::Activate { commitment } => commands::activate::execute(&ctx, commitment).await,

        Commands::Fund { commitment, amount } => {
            commands::fund::execute(&ctx, commitment, amount).await
        }

        Commands::AddMilestone {
            commitment,
            description,
            lamports,
            percent,
            due_at,
        } => {
            commands::add_milestone::execute(&ctx, commitment, description, lamports, percent, due_at)
                .await
        }

        Commands::CompleteMilestone {
            commitment,
            milestone,
            early_review,
            signature,
        } => {
            commands::complete_milestone::execute(&ctx, commitment, milestone, early_review, signature)
                .await
        }

        Commands::CastVote {
            commitment,
            milestone,
            wallet,
            vote,
            weight_usd,
            signature,
        } => {
            commands::cast_vote::execute(&ctx, commitment, milestone, wallet, vote, weight_usd, signature)
                .await
        }

        Commands::Status { commitment } => commands::status::execute(&ctx, commitment).await,

        Commands::Resolve { commitment } => commands::resolve::execute(&ctx, commitment).await,

        Commands::SettleMilestone {
            commitment,
            milestone,
        } => commands::settle_milestone::execute(&ctx, commitment, milestone).await,

        Commands::ReleaseMilestone {
            commitment,
            milestone,
        } => commands::release_milestone::execute(&ctx, commitment, milestone).await,

        Commands::Claim {
            distribution,
            wallet,
        } => commands::claim::execute(&ctx, distribution, wallet).await,

        Commands::ClaimAll { distribution } => {
            commands::claim_all::execute(&ctx, distribution).await
        }

        Commands::RotateFeeShares { leaderboards } => {
            commands::rotate_fee_shares::execute(&ctx, leaderboards).await
        }

        Commands::ForceUnstick { commitment } => {
            commands::force_unstick::execute(&ctx, commitment).await
        }
    }
}
