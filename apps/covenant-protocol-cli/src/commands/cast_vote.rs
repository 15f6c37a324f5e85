use crate::context::{parse_signature, Context};
use crate::error::{CliError, CliResult};
use covenant_protocol_core::Vote;
use covenant_protocol_engine::VoteOutcome;
use rust_decimal::Decimal;
use std::str::FromStr;

pub async fn execute(
    ctx: &Context,
    commitment: String,
    milestone: Option<String>,
    wallet: String,
    vote: String,
    weight_usd: String,
    signature: String,
) -> CliResult<()> {
    let vote = Vote::from_str(&vote)
        .map_err(|_| CliError::InvalidArgument(format!("vote must be approve or reject: {vote}")))?;
    let weight_usd = Decimal::from_str(&weight_usd)
        .map_err(|_| CliError::InvalidArgument(format!("invalid weight: {weight_usd}")))?;
    let signature = parse_signature(&signature)?;

    let outcome = ctx
        .voting()
        .record_vote(
            &commitment,
            milestone.as_deref(),
            &wallet,
            vote,
            weight_usd,
            &signature,
        )
        .await?;
    match outcome {
        VoteOutcome::Recorded => println!("vote recorded"),
        VoteOutcome::AlreadyVoted => println!("already voted; the first vote stands"),
    }
    Ok(())
}
