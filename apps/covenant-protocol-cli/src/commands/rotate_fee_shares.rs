use crate::context::Context;
use crate::error::CliResult;
use async_trait::async_trait;
use covenant_protocol_engine::{
    EngineResult, FeeRotationJob, FeeRouter, FeeShare, TokenLeaderboard,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Deserialize)]
struct LeaderboardFile {
    tokens: Vec<LeaderboardEntry>,
}

#[derive(Deserialize)]
struct LeaderboardEntry {
    token_mint: String,
    scores: Vec<(String, f64)>,
}

/// The on-chain router lives outside this repo; this one prints the
/// tables it would push.
struct StdoutFeeRouter;

#[async_trait]
impl FeeRouter for StdoutFeeRouter {
    async fn push_shares(&self, token_mint: &str, shares: &[FeeShare]) -> EngineResult<()> {
        println!("fee shares for {token_mint}:");
        for share in shares {
            println!("  {} -> {} bps", share.wallet, share.bps);
        }
        Ok(())
    }
}

pub async fn execute(ctx: &Context, leaderboards: PathBuf) -> CliResult<()> {
    // Rotation needs a configured base wallet; the default config has none.
    ctx.config.validate()?;
    let raw = std::fs::read_to_string(&leaderboards)?;
    let file: LeaderboardFile = serde_yaml::from_str(&raw)?;
    let batch: Vec<TokenLeaderboard> = file
        .tokens
        .into_iter()
        .map(|entry| TokenLeaderboard {
            token_mint: entry.token_mint,
            scores: entry.scores,
        })
        .collect();

    let job = FeeRotationJob::new(
        ctx.store.clone(),
        ctx.chain.clone(),
        Arc::new(StdoutFeeRouter),
        ctx.config.clone(),
    );
    let summary = job.rotate(&batch).await?;
    println!("rotated {} tokens, {} failed", summary.rotated, summary.failed);
    Ok(())
}
