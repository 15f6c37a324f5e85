//! In-memory [`CommitmentStore`] for environments without a database. One
//! mutex over a map set; every conditional write checks its guard and
//! mutates under the same lock, giving the exact semantics of the SQL
//! store's conditional updates.

use crate::{ClaimAcquire, CommitmentStore, CreateDistribution, StoreError, StoreResult};
use async_trait::async_trait;
use covenant_protocol_core::{
    Allocation, Claim, Commitment, CommitmentStatus, Distribution, DistributionStatus,
    FeeShareRotation, Milestone, MilestonePatch, MilestoneStatus, VoteSignal,
};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    commitments: BTreeMap<String, Commitment>,
    milestones: BTreeMap<String, Milestone>,
    /// Key: (commitment, milestone-or-"", wallet).
    votes: BTreeMap<(String, String, String), VoteSignal>,
    distributions: BTreeMap<String, Distribution>,
    distribution_ids_by_key: BTreeMap<String, String>,
    /// Key: (distribution, wallet).
    allocations: BTreeMap<(String, String), Allocation>,
    /// Key: (distribution, wallet).
    claims: BTreeMap<(String, String), Claim>,
    rotations: Vec<FeeShareRotation>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommitmentStore for MemoryStore {
    async fn insert_commitment(&self, c: &Commitment) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.commitments.contains_key(&c.id) {
            return Err(StoreError::Db(sea_orm::DbErr::RecordNotInserted));
        }
        inner.commitments.insert(c.id.clone(), c.clone());
        Ok(())
    }

    async fn fetch_commitment(&self, id: &str) -> StoreResult<Option<Commitment>> {
        Ok(self.inner.lock().await.commitments.get(id).cloned())
    }

    async fn list_commitments(&self) -> StoreResult<Vec<Commitment>> {
        let inner = self.inner.lock().await;
        let mut all: Vec<Commitment> = inner.commitments.values().cloned().collect();
        all.sort_by_key(|c| (c.created_at_unix, c.id.clone()));
        Ok(all)
    }

    async fn acquire_resolving(&self, id: &str, now: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(c) = inner.commitments.get_mut(id) else {
            return Ok(false);
        };
        if !c.status.can_enter_resolving() {
            return Ok(false);
        }
        c.prior_status = Some(c.status);
        c.status = CommitmentStatus::Resolving;
        c.updated_at_unix = now;
        Ok(true)
    }

    async fn release_resolving(&self, id: &str, now: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(c) = inner.commitments.get_mut(id) else {
            return Ok(false);
        };
        let (CommitmentStatus::Resolving, Some(prior)) = (c.status, c.prior_status) else {
            return Ok(false);
        };
        c.status = prior;
        c.prior_status = None;
        c.updated_at_unix = now;
        Ok(true)
    }

    async fn finish_resolving(
        &self,
        id: &str,
        terminal: CommitmentStatus,
        tx_sig: Option<&str>,
        now: i64,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(c) = inner.commitments.get_mut(id) else {
            return Ok(false);
        };
        if c.status != CommitmentStatus::Resolving {
            return Ok(false);
        }
        c.status = terminal;
        c.prior_status = None;
        c.resolved_tx_sig = tx_sig.map(str::to_string);
        c.updated_at_unix = now;
        Ok(true)
    }

    async fn transition_commitment(
        &self,
        id: &str,
        allowed_from: &[CommitmentStatus],
        to: CommitmentStatus,
        now: i64,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(c) = inner.commitments.get_mut(id) else {
            return Ok(false);
        };
        if !allowed_from.contains(&c.status) {
            return Ok(false);
        }
        c.status = to;
        c.updated_at_unix = now;
        Ok(true)
    }

    async fn set_reward_funding(
        &self,
        id: &str,
        total_funded_lamports: u64,
        now: i64,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(c) = inner.commitments.get_mut(id) else {
            return Ok(false);
        };
        c.total_funded_lamports = total_funded_lamports;
        c.updated_at_unix = now;
        Ok(true)
    }

    async fn add_unlocked(&self, id: &str, delta_lamports: u64, now: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(c) = inner.commitments.get_mut(id) else {
            return Ok(false);
        };
        let new_unlocked = c.unlocked_lamports.saturating_add(delta_lamports);
        if new_unlocked > c.total_funded_lamports {
            return Ok(false);
        }
        c.unlocked_lamports = new_unlocked;
        c.updated_at_unix = now;
        Ok(true)
    }

    async fn insert_milestone(&self, m: &Milestone) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.milestones.contains_key(&m.id) {
            return Err(StoreError::Db(sea_orm::DbErr::RecordNotInserted));
        }
        inner.milestones.insert(m.id.clone(), m.clone());
        Ok(())
    }

    async fn fetch_milestone(&self, id: &str) -> StoreResult<Option<Milestone>> {
        Ok(self.inner.lock().await.milestones.get(id).cloned())
    }

    async fn fetch_milestones(&self, commitment_id: &str) -> StoreResult<Vec<Milestone>> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<Milestone> = inner
            .milestones
            .values()
            .filter(|m| m.commitment_id == commitment_id)
            .cloned()
            .collect();
        matching.sort_by_key(|m| m.position);
        Ok(matching)
    }

    async fn set_milestone_completed(
        &self,
        id: &str,
        completed_at_unix: i64,
        review_opened_at_unix: Option<i64>,
        claimable_at_unix: i64,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(m) = inner.milestones.get_mut(id) else {
            return Ok(false);
        };
        if m.status != MilestoneStatus::Locked || m.completed_at_unix.is_some() {
            return Ok(false);
        }
        m.completed_at_unix = Some(completed_at_unix);
        m.review_opened_at_unix = review_opened_at_unix;
        m.claimable_at_unix = Some(claimable_at_unix);
        Ok(true)
    }

    async fn apply_milestone_advance(&self, id: &str, patch: &MilestonePatch) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(m) = inner.milestones.get_mut(id) else {
            return Ok(false);
        };
        if m.status != patch.from_status {
            return Ok(false);
        }
        m.status = patch.to_status;
        if patch.became_claimable_at_unix.is_some() {
            m.became_claimable_at_unix = patch.became_claimable_at_unix;
        }
        Ok(true)
    }

    async fn mark_milestone_released(
        &self,
        id: &str,
        released_at_unix: i64,
        tx_sig: Option<&str>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(m) = inner.milestones.get_mut(id) else {
            return Ok(false);
        };
        if m.status != MilestoneStatus::Claimable {
            return Ok(false);
        }
        m.status = MilestoneStatus::Released;
        m.released_at_unix = Some(released_at_unix);
        m.released_tx_sig = tx_sig.map(str::to_string);
        Ok(true)
    }

    async fn insert_vote_if_absent(&self, vote: &VoteSignal) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let key = (
            vote.commitment_id.clone(),
            vote.milestone_id.clone().unwrap_or_default(),
            vote.signer_wallet.clone(),
        );
        if inner.votes.contains_key(&key) {
            return Ok(false);
        }
        inner.votes.insert(key, vote.clone());
        Ok(true)
    }

    async fn fetch_votes(
        &self,
        commitment_id: &str,
        milestone_id: Option<&str>,
    ) -> StoreResult<Vec<VoteSignal>> {
        let inner = self.inner.lock().await;
        let milestone_key = milestone_id.unwrap_or_default();
        let mut matching: Vec<VoteSignal> = inner
            .votes
            .iter()
            .filter(|((c, m, _), _)| c == commitment_id && m == milestone_key)
            .map(|(_, v)| v.clone())
            .collect();
        matching.sort_by(|a, b| {
            a.created_at_unix
                .cmp(&b.created_at_unix)
                .then_with(|| a.signer_wallet.cmp(&b.signer_wallet))
        });
        Ok(matching)
    }

    async fn create_distribution_if_absent(
        &self,
        d: &Distribution,
        allocations: &[Allocation],
    ) -> StoreResult<CreateDistribution> {
        let mut inner = self.inner.lock().await;
        if let Some(existing_id) = inner.distribution_ids_by_key.get(&d.settlement_key) {
            let existing = inner
                .distributions
                .get(existing_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(d.settlement_key.clone()))?;
            return Ok(CreateDistribution::Existing(existing));
        }
        inner
            .distribution_ids_by_key
            .insert(d.settlement_key.clone(), d.id.clone());
        inner.distributions.insert(d.id.clone(), d.clone());
        for a in allocations {
            inner
                .allocations
                .insert((a.distribution_id.clone(), a.wallet.clone()), a.clone());
        }
        Ok(CreateDistribution::Created)
    }

    async fn fetch_distribution(&self, id: &str) -> StoreResult<Option<Distribution>> {
        Ok(self.inner.lock().await.distributions.get(id).cloned())
    }

    async fn fetch_distribution_by_key(
        &self,
        settlement_key: &str,
    ) -> StoreResult<Option<Distribution>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .distribution_ids_by_key
            .get(settlement_key)
            .and_then(|id| inner.distributions.get(id))
            .cloned())
    }

    async fn fetch_allocations(&self, distribution_id: &str) -> StoreResult<Vec<Allocation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .allocations
            .iter()
            .filter(|((d, _), _)| d == distribution_id)
            .map(|(_, a)| a.clone())
            .collect())
    }

    async fn complete_distribution(&self, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let Some(d) = inner.distributions.get_mut(id) else {
            return Ok(false);
        };
        if d.status != DistributionStatus::Open {
            return Ok(false);
        }
        d.status = DistributionStatus::Completed;
        Ok(true)
    }

    async fn insert_claim_if_absent(&self, c: &Claim) -> StoreResult<ClaimAcquire> {
        let mut inner = self.inner.lock().await;
        let key = (c.distribution_id.clone(), c.wallet.clone());
        if let Some(existing) = inner.claims.get(&key) {
            return Ok(ClaimAcquire::Existing(existing.clone()));
        }
        inner.claims.insert(key, c.clone());
        Ok(ClaimAcquire::Inserted)
    }

    async fn fetch_claim(&self, distribution_id: &str, wallet: &str) -> StoreResult<Option<Claim>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .claims
            .get(&(distribution_id.to_string(), wallet.to_string()))
            .cloned())
    }

    async fn fetch_claims(&self, distribution_id: &str) -> StoreResult<Vec<Claim>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .claims
            .iter()
            .filter(|((d, _), _)| d == distribution_id)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn finalize_claim(
        &self,
        distribution_id: &str,
        wallet: &str,
        tx_sig: &str,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let key = (distribution_id.to_string(), wallet.to_string());
        let Some(c) = inner.claims.get_mut(&key) else {
            return Ok(false);
        };
        if c.tx_sig.is_some() {
            return Ok(false);
        }
        c.tx_sig = Some(tx_sig.to_string());
        Ok(true)
    }

    async fn delete_unsigned_claim(
        &self,
        distribution_id: &str,
        wallet: &str,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let key = (distribution_id.to_string(), wallet.to_string());
        match inner.claims.get(&key) {
            Some(c) if c.tx_sig.is_none() => {
                inner.claims.remove(&key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_fee_rotation(&self, rotation: &FeeShareRotation) -> StoreResult<()> {
        self.inner.lock().await.rotations.push(rotation.clone());
        Ok(())
    }

    async fn list_fee_rotations(&self, token_mint: &str) -> StoreResult<Vec<FeeShareRotation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rotations
            .iter()
            .filter(|r| r.token_mint == token_mint)
            .cloned()
            .collect())
    }
}
