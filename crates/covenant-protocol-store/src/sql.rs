//! Durable [`CommitmentStore`] over sea-orm/SQLite. Every conditional
//! transition is a single `UPDATE ... WHERE` whose rows-affected count
//! decides the outcome; insert-if-absent operations use
//! `ON CONFLICT DO NOTHING` against the unique keys in the schema.

use crate::convert::*;
use crate::{ClaimAcquire, CommitmentStore, CreateDistribution, StoreError, StoreResult};
use async_trait::async_trait;
use covenant_protocol_core::{
    Allocation, Claim, Commitment, CommitmentStatus, Distribution, DistributionStatus,
    FeeShareRotation, Milestone, MilestonePatch, MilestoneStatus, VoteSignal,
};
use covenant_protocol_entities::{
    allocation, claim, commitment, distribution, fee_share_rotation, milestone, vote_signal,
};
use covenant_protocol_migrations::{Migrator, MigratorTrait};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Database, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use std::path::Path;
use tracing::debug;

pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    /// Connect to a database URL and bring the schema up to date.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let db = Database::connect(url).await?;
        Migrator::up(&db, None).await?;
        debug!("connected commitment store at {url}");
        Ok(Self { db })
    }

    /// Open (or create) a SQLite database file.
    pub async fn open_file(path: &Path) -> StoreResult<Self> {
        let url = format!("sqlite://{}?mode=rwc", path.display());
        Self::connect(&url).await
    }

    /// Private in-process SQLite database, handy for tests. Pooling is
    /// pinned to one connection so every statement sees the same database.
    pub async fn in_memory() -> StoreResult<Self> {
        let mut options = sea_orm::ConnectOptions::new("sqlite::memory:".to_string());
        options.max_connections(1);
        let db = Database::connect(options).await?;
        Migrator::up(&db, None).await?;
        Ok(Self { db })
    }
}

#[async_trait]
impl CommitmentStore for SqlStore {
    async fn insert_commitment(&self, c: &Commitment) -> StoreResult<()> {
        commitment::Entity::insert(commitment_to_active(c))
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn fetch_commitment(&self, id: &str) -> StoreResult<Option<Commitment>> {
        commitment::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(commitment_from_model)
            .transpose()
    }

    async fn list_commitments(&self) -> StoreResult<Vec<Commitment>> {
        commitment::Entity::find()
            .order_by_asc(commitment::Column::CreatedAtUnix)
            .all(&self.db)
            .await?
            .into_iter()
            .map(commitment_from_model)
            .collect()
    }

    async fn acquire_resolving(&self, id: &str, now: i64) -> StoreResult<bool> {
        let result = commitment::Entity::update_many()
            .col_expr(
                commitment::Column::PriorStatus,
                Expr::col(commitment::Column::Status).into(),
            )
            .col_expr(
                commitment::Column::Status,
                Expr::value(CommitmentStatus::Resolving.as_str()),
            )
            .col_expr(commitment::Column::UpdatedAtUnix, Expr::value(now))
            .filter(commitment::Column::Id.eq(id))
            .filter(commitment::Column::Status.is_in([
                CommitmentStatus::Created.as_str(),
                CommitmentStatus::Active.as_str(),
            ]))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn release_resolving(&self, id: &str, now: i64) -> StoreResult<bool> {
        let result = commitment::Entity::update_many()
            .col_expr(
                commitment::Column::Status,
                Expr::col(commitment::Column::PriorStatus).into(),
            )
            .col_expr(
                commitment::Column::PriorStatus,
                Expr::value(Option::<String>::None),
            )
            .col_expr(commitment::Column::UpdatedAtUnix, Expr::value(now))
            .filter(commitment::Column::Id.eq(id))
            .filter(commitment::Column::Status.eq(CommitmentStatus::Resolving.as_str()))
            .filter(commitment::Column::PriorStatus.is_not_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn finish_resolving(
        &self,
        id: &str,
        terminal: CommitmentStatus,
        tx_sig: Option<&str>,
        now: i64,
    ) -> StoreResult<bool> {
        let result = commitment::Entity::update_many()
            .col_expr(commitment::Column::Status, Expr::value(terminal.as_str()))
            .col_expr(
                commitment::Column::PriorStatus,
                Expr::value(Option::<String>::None),
            )
            .col_expr(commitment::Column::ResolvedTxSig, Expr::value(tx_sig))
            .col_expr(commitment::Column::UpdatedAtUnix, Expr::value(now))
            .filter(commitment::Column::Id.eq(id))
            .filter(commitment::Column::Status.eq(CommitmentStatus::Resolving.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn transition_commitment(
        &self,
        id: &str,
        allowed_from: &[CommitmentStatus],
        to: CommitmentStatus,
        now: i64,
    ) -> StoreResult<bool> {
        let from: Vec<&str> = allowed_from.iter().map(|s| s.as_str()).collect();
        let result = commitment::Entity::update_many()
            .col_expr(commitment::Column::Status, Expr::value(to.as_str()))
            .col_expr(commitment::Column::UpdatedAtUnix, Expr::value(now))
            .filter(commitment::Column::Id.eq(id))
            .filter(commitment::Column::Status.is_in(from))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn set_reward_funding(
        &self,
        id: &str,
        total_funded_lamports: u64,
        now: i64,
    ) -> StoreResult<bool> {
        let result = commitment::Entity::update_many()
            .col_expr(
                commitment::Column::TotalFundedLamports,
                Expr::value(total_funded_lamports.to_string()),
            )
            .col_expr(commitment::Column::UpdatedAtUnix, Expr::value(now))
            .filter(commitment::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn add_unlocked(&self, id: &str, delta_lamports: u64, now: i64) -> StoreResult<bool> {
        // Lamports live in TEXT columns, so the increment is a read plus a
        // compare-and-swap on the old value.
        let Some(current) = self.fetch_commitment(id).await? else {
            return Ok(false);
        };
        let new_unlocked = current.unlocked_lamports.saturating_add(delta_lamports);
        if new_unlocked > current.total_funded_lamports {
            return Ok(false);
        }
        let result = commitment::Entity::update_many()
            .col_expr(
                commitment::Column::UnlockedLamports,
                Expr::value(new_unlocked.to_string()),
            )
            .col_expr(commitment::Column::UpdatedAtUnix, Expr::value(now))
            .filter(commitment::Column::Id.eq(id))
            .filter(
                commitment::Column::UnlockedLamports.eq(current.unlocked_lamports.to_string()),
            )
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_milestone(&self, m: &Milestone) -> StoreResult<()> {
        milestone::Entity::insert(milestone_to_active(m))
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn fetch_milestone(&self, id: &str) -> StoreResult<Option<Milestone>> {
        milestone::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(milestone_from_model)
            .transpose()
    }

    async fn fetch_milestones(&self, commitment_id: &str) -> StoreResult<Vec<Milestone>> {
        milestone::Entity::find()
            .filter(milestone::Column::CommitmentId.eq(commitment_id))
            .order_by_asc(milestone::Column::Position)
            .all(&self.db)
            .await?
            .into_iter()
            .map(milestone_from_model)
            .collect()
    }

    async fn set_milestone_completed(
        &self,
        id: &str,
        completed_at_unix: i64,
        review_opened_at_unix: Option<i64>,
        claimable_at_unix: i64,
    ) -> StoreResult<bool> {
        let result = milestone::Entity::update_many()
            .col_expr(
                milestone::Column::CompletedAtUnix,
                Expr::value(completed_at_unix),
            )
            .col_expr(
                milestone::Column::ReviewOpenedAtUnix,
                Expr::value(review_opened_at_unix),
            )
            .col_expr(
                milestone::Column::ClaimableAtUnix,
                Expr::value(claimable_at_unix),
            )
            .filter(milestone::Column::Id.eq(id))
            .filter(milestone::Column::Status.eq(MilestoneStatus::Locked.as_str()))
            .filter(milestone::Column::CompletedAtUnix.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn apply_milestone_advance(&self, id: &str, patch: &MilestonePatch) -> StoreResult<bool> {
        let mut update = milestone::Entity::update_many().col_expr(
            milestone::Column::Status,
            Expr::value(patch.to_status.as_str()),
        );
        if let Some(at) = patch.became_claimable_at_unix {
            update = update.col_expr(milestone::Column::BecameClaimableAtUnix, Expr::value(at));
        }
        let result = update
            .filter(milestone::Column::Id.eq(id))
            .filter(milestone::Column::Status.eq(patch.from_status.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn mark_milestone_released(
        &self,
        id: &str,
        released_at_unix: i64,
        tx_sig: Option<&str>,
    ) -> StoreResult<bool> {
        let result = milestone::Entity::update_many()
            .col_expr(
                milestone::Column::Status,
                Expr::value(MilestoneStatus::Released.as_str()),
            )
            .col_expr(
                milestone::Column::ReleasedAtUnix,
                Expr::value(released_at_unix),
            )
            .col_expr(
                milestone::Column::ReleasedTxSig,
                Expr::value(tx_sig.map(str::to_string)),
            )
            .filter(milestone::Column::Id.eq(id))
            .filter(milestone::Column::Status.eq(MilestoneStatus::Claimable.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_vote_if_absent(&self, vote: &VoteSignal) -> StoreResult<bool> {
        let inserted = vote_signal::Entity::insert(vote_to_active(vote))
            .on_conflict(
                OnConflict::columns([
                    vote_signal::Column::CommitmentId,
                    vote_signal::Column::MilestoneId,
                    vote_signal::Column::SignerWallet,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(inserted > 0)
    }

    async fn fetch_votes(
        &self,
        commitment_id: &str,
        milestone_id: Option<&str>,
    ) -> StoreResult<Vec<VoteSignal>> {
        let milestone_key = milestone_id.unwrap_or(COMMITMENT_LEVEL_VOTE);
        vote_signal::Entity::find()
            .filter(vote_signal::Column::CommitmentId.eq(commitment_id))
            .filter(vote_signal::Column::MilestoneId.eq(milestone_key))
            .order_by_asc(vote_signal::Column::CreatedAtUnix)
            .order_by_asc(vote_signal::Column::SignerWallet)
            .all(&self.db)
            .await?
            .into_iter()
            .map(vote_from_model)
            .collect()
    }

    async fn create_distribution_if_absent(
        &self,
        d: &Distribution,
        allocations: &[Allocation],
    ) -> StoreResult<CreateDistribution> {
        let txn = self.db.begin().await?;
        let inserted = distribution::Entity::insert(distribution_to_active(d))
            .on_conflict(
                OnConflict::column(distribution::Column::SettlementKey)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
        if inserted == 0 {
            txn.rollback().await?;
            let existing = self
                .fetch_distribution_by_key(&d.settlement_key)
                .await?
                .ok_or_else(|| StoreError::NotFound(d.settlement_key.clone()))?;
            return Ok(CreateDistribution::Existing(existing));
        }
        if !allocations.is_empty() {
            allocation::Entity::insert_many(allocations.iter().map(allocation_to_active))
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;
        debug!(
            "created distribution {} ({} allocations)",
            d.settlement_key,
            allocations.len()
        );
        Ok(CreateDistribution::Created)
    }

    async fn fetch_distribution(&self, id: &str) -> StoreResult<Option<Distribution>> {
        distribution::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(distribution_from_model)
            .transpose()
    }

    async fn fetch_distribution_by_key(
        &self,
        settlement_key: &str,
    ) -> StoreResult<Option<Distribution>> {
        distribution::Entity::find()
            .filter(distribution::Column::SettlementKey.eq(settlement_key))
            .one(&self.db)
            .await?
            .map(distribution_from_model)
            .transpose()
    }

    async fn fetch_allocations(&self, distribution_id: &str) -> StoreResult<Vec<Allocation>> {
        allocation::Entity::find()
            .filter(allocation::Column::DistributionId.eq(distribution_id))
            .order_by_asc(allocation::Column::Wallet)
            .all(&self.db)
            .await?
            .into_iter()
            .map(allocation_from_model)
            .collect()
    }

    async fn complete_distribution(&self, id: &str) -> StoreResult<bool> {
        let result = distribution::Entity::update_many()
            .col_expr(
                distribution::Column::Status,
                Expr::value(DistributionStatus::Completed.as_str()),
            )
            .filter(distribution::Column::Id.eq(id))
            .filter(distribution::Column::Status.eq(DistributionStatus::Open.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn insert_claim_if_absent(&self, c: &Claim) -> StoreResult<ClaimAcquire> {
        // Two attempts cover the window where a TTL reaper deletes the row
        // between our failed insert and the read-back.
        for _ in 0..2 {
            let inserted = claim::Entity::insert(claim_to_active(c))
                .on_conflict(
                    OnConflict::columns([claim::Column::DistributionId, claim::Column::Wallet])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?;
            if inserted > 0 {
                return Ok(ClaimAcquire::Inserted);
            }
            if let Some(existing) = self.fetch_claim(&c.distribution_id, &c.wallet).await? {
                return Ok(ClaimAcquire::Existing(existing));
            }
        }
        Err(StoreError::NotFound(format!(
            "claim {}:{} raced during acquire",
            c.distribution_id, c.wallet
        )))
    }

    async fn fetch_claim(&self, distribution_id: &str, wallet: &str) -> StoreResult<Option<Claim>> {
        claim::Entity::find_by_id((distribution_id.to_string(), wallet.to_string()))
            .one(&self.db)
            .await?
            .map(claim_from_model)
            .transpose()
    }

    async fn fetch_claims(&self, distribution_id: &str) -> StoreResult<Vec<Claim>> {
        claim::Entity::find()
            .filter(claim::Column::DistributionId.eq(distribution_id))
            .order_by_asc(claim::Column::Wallet)
            .all(&self.db)
            .await?
            .into_iter()
            .map(claim_from_model)
            .collect()
    }

    async fn finalize_claim(
        &self,
        distribution_id: &str,
        wallet: &str,
        tx_sig: &str,
    ) -> StoreResult<bool> {
        let result = claim::Entity::update_many()
            .col_expr(claim::Column::TxSig, Expr::value(tx_sig))
            .filter(claim::Column::DistributionId.eq(distribution_id))
            .filter(claim::Column::Wallet.eq(wallet))
            .filter(claim::Column::TxSig.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_unsigned_claim(
        &self,
        distribution_id: &str,
        wallet: &str,
    ) -> StoreResult<bool> {
        let result = claim::Entity::delete_many()
            .filter(claim::Column::DistributionId.eq(distribution_id))
            .filter(claim::Column::Wallet.eq(wallet))
            .filter(claim::Column::TxSig.is_null())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn record_fee_rotation(&self, rotation: &FeeShareRotation) -> StoreResult<()> {
        fee_share_rotation::Entity::insert(rotation_to_active(rotation))
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn list_fee_rotations(&self, token_mint: &str) -> StoreResult<Vec<FeeShareRotation>> {
        Ok(fee_share_rotation::Entity::find()
            .filter(fee_share_rotation::Column::TokenMint.eq(token_mint))
            .order_by_asc(fee_share_rotation::Column::ExecutedAtUnix)
            .all(&self.db)
            .await?
            .into_iter()
            .map(rotation_from_model)
            .collect())
    }
}
