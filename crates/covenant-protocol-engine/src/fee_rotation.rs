//! Periodic fee-share rotation: turn per-token engagement leaderboards
//! into √-compressed basis-point tables and push them through the
//! [`FeeRouter`] boundary, keeping one audit row per rotation.

use crate::{EngineConfig, EngineError, EngineResult};
use async_trait::async_trait;
use covenant_protocol_chain::ChainClient;
use covenant_protocol_core::{new_id, split_pot, sqrt_weights, FeeShareRotation, SplitStrategy};
use covenant_protocol_store::CommitmentStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// One wallet's slice of a token's fee stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeShare {
    pub wallet: String,
    pub bps: u64,
}

/// Engagement scores for one token, highest-wins.
#[derive(Debug, Clone)]
pub struct TokenLeaderboard {
    pub token_mint: String,
    pub scores: Vec<(String, f64)>,
}

/// Where the computed tables go. The on-chain fee router lives outside
/// this repo; only the boundary is specified here.
#[async_trait]
pub trait FeeRouter: Send + Sync {
    async fn push_shares(&self, token_mint: &str, shares: &[FeeShare]) -> EngineResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationSummary {
    pub rotated: u32,
    pub failed: u32,
}

pub struct FeeRotationJob {
    store: Arc<dyn CommitmentStore>,
    chain: Arc<dyn ChainClient>,
    router: Arc<dyn FeeRouter>,
    config: EngineConfig,
}

impl FeeRotationJob {
    pub fn new(
        store: Arc<dyn CommitmentStore>,
        chain: Arc<dyn ChainClient>,
        router: Arc<dyn FeeRouter>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            chain,
            router,
            config,
        }
    }

    /// Rotate every token in the batch. A token failing to push or record
    /// is logged and counted; the rest of the batch proceeds.
    pub async fn rotate(&self, batch: &[TokenLeaderboard]) -> EngineResult<RotationSummary> {
        let now = self.chain.current_unix_time().await?;
        let mut summary = RotationSummary::default();

        for leaderboard in batch {
            match self.rotate_token(leaderboard, now).await {
                Ok(()) => summary.rotated += 1,
                Err(e) => {
                    warn!(
                        token = %leaderboard.token_mint,
                        error = %e,
                        "fee rotation failed for token"
                    );
                    summary.failed += 1;
                }
            }
        }
        info!(
            rotated = summary.rotated,
            failed = summary.failed,
            "fee rotation batch finished"
        );
        Ok(summary)
    }

    async fn rotate_token(&self, leaderboard: &TokenLeaderboard, now: i64) -> EngineResult<()> {
        let shares = self.compute_shares(&leaderboard.scores)?;
        self.router
            .push_shares(&leaderboard.token_mint, &shares)
            .await?;

        let rotation = FeeShareRotation {
            id: new_id(),
            token_mint: leaderboard.token_mint.clone(),
            executed_at_unix: now,
            shares_json: serde_json::to_string(&shares)
                .map_err(|e| EngineError::Invariant(format!("shares not serializable: {e}")))?,
        };
        self.store.record_fee_rotation(&rotation).await?;
        info!(
            token = %leaderboard.token_mint,
            winners = shares.len().saturating_sub(1),
            "fee shares rotated"
        );
        Ok(())
    }

    /// Base wallet keeps its reserved share; the remainder is spread over
    /// the top-N leaderboard wallets with √-compressed weights by largest
    /// remainder. With no eligible winners everything goes to the base
    /// wallet.
    fn compute_shares(&self, scores: &[(String, f64)]) -> EngineResult<Vec<FeeShare>> {
        let rotation = &self.config.rotation;
        let reserved: HashSet<&str> = rotation
            .reserved_wallets
            .iter()
            .map(String::as_str)
            .collect();

        // Best score per wallet, protocol wallets excluded.
        let mut best: Vec<(String, f64)> = Vec::new();
        for (wallet, score) in scores {
            if reserved.contains(wallet.as_str()) || wallet == &rotation.base_wallet {
                continue;
            }
            match best.iter_mut().find(|(w, _)| w == wallet) {
                Some((_, existing)) if *existing < *score => *existing = *score,
                Some(_) => {}
                None => best.push((wallet.clone(), *score)),
            }
        }
        best.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        best.truncate(rotation.top_n);

        let recipients = sqrt_weights(&best);
        let rotating_bps = 10_000 - rotation.base_share_bps;

        let mut shares = vec![FeeShare {
            wallet: rotation.base_wallet.clone(),
            bps: rotation.base_share_bps,
        }];
        if recipients.is_empty() || rotating_bps == 0 {
            shares[0].bps = 10_000;
            return Ok(shares);
        }
        for split in split_pot(rotating_bps, &recipients, SplitStrategy::Weighted, 0)? {
            shares.push(FeeShare {
                wallet: split.wallet,
                bps: split.amount_lamports,
            });
        }
        Ok(shares)
    }
}
