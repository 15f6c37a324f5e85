//! The conditional-write semantics both store implementations must share.
//! One suite, driven against `MemoryStore`, in-memory SQLite and on-disk
//! SQLite.

use covenant_protocol_core::{
    new_id, Allocation, Claim, Commitment, CommitmentKind, CommitmentStatus, Distribution,
    DistributionKind, DistributionStatus, Milestone, MilestonePatch, MilestoneStatus, SignerRef,
    Vote, VoteSignal,
};
use covenant_protocol_store::{
    ClaimAcquire, CommitmentStore, CreateDistribution, MemoryStore, SqlStore,
};
use rust_decimal::dec;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;

const NOW: i64 = 1_700_000_000;

fn commitment(status: CommitmentStatus) -> Commitment {
    Commitment {
        id: new_id(),
        kind: CommitmentKind::CreatorReward,
        owner_wallet: Pubkey::new_unique(),
        escrow_pubkey: Pubkey::new_unique(),
        signer_ref: SignerRef::Custodial {
            wallet_id: "custody-1".to_string(),
        },
        status,
        prior_status: None,
        amount_lamports: None,
        deadline_unix: None,
        total_funded_lamports: 10_000_000_000,
        unlocked_lamports: 0,
        resolved_tx_sig: None,
        created_at_unix: NOW,
        updated_at_unix: NOW,
    }
}

fn milestone(commitment_id: &str, status: MilestoneStatus) -> Milestone {
    Milestone {
        id: new_id(),
        commitment_id: commitment_id.to_string(),
        position: 0,
        description: "ship it".to_string(),
        unlock_lamports: None,
        unlock_percent: Some(50),
        status,
        completed_at_unix: None,
        review_opened_at_unix: None,
        due_at_unix: None,
        claimable_at_unix: None,
        became_claimable_at_unix: None,
        released_at_unix: None,
        released_tx_sig: None,
    }
}

fn distribution(commitment_id: &str) -> Distribution {
    let kind = DistributionKind::CommitmentFailure;
    Distribution {
        id: new_id(),
        kind,
        commitment_id: commitment_id.to_string(),
        milestone_id: None,
        settlement_key: kind.settlement_key(commitment_id, None),
        pot_lamports: 10_000_000_000,
        primary_wallet: "treasury".to_string(),
        primary_lamports: 5_000_000_000,
        voter_pot_lamports: 5_000_000_000,
        allocation_count: 2,
        status: DistributionStatus::Open,
        created_at_unix: NOW,
    }
}

async fn resolving_lock_semantics(store: &dyn CommitmentStore) {
    let c = commitment(CommitmentStatus::Active);
    store.insert_commitment(&c).await.unwrap();

    // Exactly one acquisition wins; re-acquiring the held lock matches
    // zero rows.
    assert!(store.acquire_resolving(&c.id, NOW).await.unwrap());
    assert!(!store.acquire_resolving(&c.id, NOW).await.unwrap());

    let held = store.fetch_commitment(&c.id).await.unwrap().unwrap();
    assert_eq!(held.status, CommitmentStatus::Resolving);
    assert_eq!(held.prior_status, Some(CommitmentStatus::Active));

    // Compensating release restores the prior status.
    assert!(store.release_resolving(&c.id, NOW + 1).await.unwrap());
    assert!(!store.release_resolving(&c.id, NOW + 1).await.unwrap());
    let released = store.fetch_commitment(&c.id).await.unwrap().unwrap();
    assert_eq!(released.status, CommitmentStatus::Active);
    assert_eq!(released.prior_status, None);

    // Re-acquire and finish; terminal states never re-enter resolving.
    assert!(store.acquire_resolving(&c.id, NOW + 2).await.unwrap());
    assert!(store
        .finish_resolving(&c.id, CommitmentStatus::ResolvedFailure, Some("sig1"), NOW + 3)
        .await
        .unwrap());
    let finished = store.fetch_commitment(&c.id).await.unwrap().unwrap();
    assert_eq!(finished.status, CommitmentStatus::ResolvedFailure);
    assert_eq!(finished.resolved_tx_sig.as_deref(), Some("sig1"));
    assert!(!store.acquire_resolving(&c.id, NOW + 4).await.unwrap());
    assert!(!store
        .finish_resolving(&c.id, CommitmentStatus::ResolvedSuccess, None, NOW + 4)
        .await
        .unwrap());
}

async fn guarded_transition_semantics(store: &dyn CommitmentStore) {
    let c = commitment(CommitmentStatus::Created);
    store.insert_commitment(&c).await.unwrap();

    assert!(store
        .transition_commitment(
            &c.id,
            &[CommitmentStatus::Created],
            CommitmentStatus::Active,
            NOW
        )
        .await
        .unwrap());
    // Guard no longer matches.
    assert!(!store
        .transition_commitment(
            &c.id,
            &[CommitmentStatus::Created],
            CommitmentStatus::Active,
            NOW
        )
        .await
        .unwrap());
}

async fn unlocked_accounting_semantics(store: &dyn CommitmentStore) {
    let c = commitment(CommitmentStatus::Active);
    store.insert_commitment(&c).await.unwrap();

    assert!(store.add_unlocked(&c.id, 4_000_000_000, NOW).await.unwrap());
    assert!(store.add_unlocked(&c.id, 6_000_000_000, NOW).await.unwrap());
    // Would exceed total funding.
    assert!(!store.add_unlocked(&c.id, 1, NOW).await.unwrap());
    let updated = store.fetch_commitment(&c.id).await.unwrap().unwrap();
    assert_eq!(updated.unlocked_lamports, 10_000_000_000);
}

async fn milestone_advance_semantics(store: &dyn CommitmentStore) {
    let c = commitment(CommitmentStatus::Active);
    store.insert_commitment(&c).await.unwrap();
    let m = milestone(&c.id, MilestoneStatus::Locked);
    store.insert_milestone(&m).await.unwrap();

    assert!(store
        .set_milestone_completed(&m.id, NOW, Some(NOW), NOW + 86_400)
        .await
        .unwrap());
    // Already completed: guard fails.
    assert!(!store
        .set_milestone_completed(&m.id, NOW + 5, None, NOW + 5)
        .await
        .unwrap());

    let patch = MilestonePatch {
        from_status: MilestoneStatus::Locked,
        to_status: MilestoneStatus::Approved,
        became_claimable_at_unix: None,
    };
    assert!(store.apply_milestone_advance(&m.id, &patch).await.unwrap());
    // Same patch a second time matches zero rows: concurrent readers
    // persist an advance at most once.
    assert!(!store.apply_milestone_advance(&m.id, &patch).await.unwrap());

    let to_claimable = MilestonePatch {
        from_status: MilestoneStatus::Approved,
        to_status: MilestoneStatus::Claimable,
        became_claimable_at_unix: Some(NOW + 86_400),
    };
    assert!(store
        .apply_milestone_advance(&m.id, &to_claimable)
        .await
        .unwrap());

    assert!(store
        .mark_milestone_released(&m.id, NOW + 90_000, Some("release-sig"))
        .await
        .unwrap());
    assert!(!store
        .mark_milestone_released(&m.id, NOW + 90_001, Some("other-sig"))
        .await
        .unwrap());

    let released = store.fetch_milestone(&m.id).await.unwrap().unwrap();
    assert_eq!(released.status, MilestoneStatus::Released);
    assert_eq!(released.released_tx_sig.as_deref(), Some("release-sig"));
    assert_eq!(released.became_claimable_at_unix, Some(NOW + 86_400));
}

async fn first_vote_wins_semantics(store: &dyn CommitmentStore) {
    let c = commitment(CommitmentStatus::Active);
    store.insert_commitment(&c).await.unwrap();

    let vote = VoteSignal {
        commitment_id: c.id.clone(),
        milestone_id: Some("m-1".to_string()),
        signer_wallet: "wallet-a".to_string(),
        vote: Vote::Approve,
        weight_usd: dec!(300),
        created_at_unix: NOW,
    };
    assert!(store.insert_vote_if_absent(&vote).await.unwrap());

    // Resubmission with a different verdict is a no-op.
    let flip = VoteSignal {
        vote: Vote::Reject,
        created_at_unix: NOW + 10,
        ..vote.clone()
    };
    assert!(!store.insert_vote_if_absent(&flip).await.unwrap());

    // Commitment-level votes live under a separate key.
    let commitment_level = VoteSignal {
        milestone_id: None,
        ..vote.clone()
    };
    assert!(store.insert_vote_if_absent(&commitment_level).await.unwrap());

    let milestone_votes = store.fetch_votes(&c.id, Some("m-1")).await.unwrap();
    assert_eq!(milestone_votes.len(), 1);
    assert_eq!(milestone_votes[0].vote, Vote::Approve);
    let commitment_votes = store.fetch_votes(&c.id, None).await.unwrap();
    assert_eq!(commitment_votes.len(), 1);
}

async fn distribution_create_if_absent_semantics(store: &dyn CommitmentStore) {
    let c = commitment(CommitmentStatus::Active);
    store.insert_commitment(&c).await.unwrap();
    let d = distribution(&c.id);
    let allocations = vec![
        Allocation {
            distribution_id: d.id.clone(),
            wallet: "voter-a".to_string(),
            amount_lamports: 1_500_000_000,
            weight: dec!(300),
        },
        Allocation {
            distribution_id: d.id.clone(),
            wallet: "voter-b".to_string(),
            amount_lamports: 3_500_000_000,
            weight: dec!(700),
        },
    ];

    let first = store
        .create_distribution_if_absent(&d, &allocations)
        .await
        .unwrap();
    assert_eq!(first, CreateDistribution::Created);

    // A retry under the same settlement key returns the stored row and
    // writes nothing.
    let mut retry = distribution(&c.id);
    retry.pot_lamports = 999;
    let second = store
        .create_distribution_if_absent(&retry, &[])
        .await
        .unwrap();
    match second {
        CreateDistribution::Existing(existing) => {
            assert_eq!(existing.id, d.id);
            assert_eq!(existing.pot_lamports, d.pot_lamports);
        }
        other => panic!("expected existing distribution, got {other:?}"),
    }

    let stored = store.fetch_allocations(&d.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].wallet, "voter-a");

    let by_key = store
        .fetch_distribution_by_key(&d.settlement_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_key.id, d.id);
    assert!(store
        .fetch_distribution_by_key("commitment_failure:no-such")
        .await
        .unwrap()
        .is_none());

    assert!(store.complete_distribution(&d.id).await.unwrap());
    assert!(!store.complete_distribution(&d.id).await.unwrap());
}

async fn claim_acquire_semantics(store: &dyn CommitmentStore) {
    let c = commitment(CommitmentStatus::Active);
    store.insert_commitment(&c).await.unwrap();
    let d = distribution(&c.id);
    store
        .create_distribution_if_absent(&d, &[])
        .await
        .unwrap();

    let claim = Claim {
        distribution_id: d.id.clone(),
        wallet: "voter-a".to_string(),
        amount_lamports: 1_500_000_000,
        claimed_at_unix: NOW,
        tx_sig: None,
    };
    assert_eq!(
        store.insert_claim_if_absent(&claim).await.unwrap(),
        ClaimAcquire::Inserted
    );
    match store.insert_claim_if_absent(&claim).await.unwrap() {
        ClaimAcquire::Existing(existing) => assert_eq!(existing.tx_sig, None),
        other => panic!("expected existing claim, got {other:?}"),
    }

    // Finalize is guarded by "still unsigned".
    assert!(store
        .finalize_claim(&d.id, "voter-a", "transfer-sig")
        .await
        .unwrap());
    assert!(!store
        .finalize_claim(&d.id, "voter-a", "second-sig")
        .await
        .unwrap());
    let stored = store.fetch_claim(&d.id, "voter-a").await.unwrap().unwrap();
    assert_eq!(stored.tx_sig.as_deref(), Some("transfer-sig"));

    // Signed rows are never deleted; unsigned ones are.
    assert!(!store.delete_unsigned_claim(&d.id, "voter-a").await.unwrap());
    let unsigned = Claim {
        wallet: "voter-b".to_string(),
        ..claim.clone()
    };
    store.insert_claim_if_absent(&unsigned).await.unwrap();
    assert!(store.delete_unsigned_claim(&d.id, "voter-b").await.unwrap());
    assert_eq!(store.fetch_claim(&d.id, "voter-b").await.unwrap(), None);
}

async fn run_suite(store: Arc<dyn CommitmentStore>) {
    resolving_lock_semantics(store.as_ref()).await;
    guarded_transition_semantics(store.as_ref()).await;
    unlocked_accounting_semantics(store.as_ref()).await;
    milestone_advance_semantics(store.as_ref()).await;
    first_vote_wins_semantics(store.as_ref()).await;
    distribution_create_if_absent_semantics(store.as_ref()).await;
    claim_acquire_semantics(store.as_ref()).await;
}

#[tokio::test]
async fn memory_store_conditional_semantics() {
    run_suite(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn sql_store_conditional_semantics() {
    run_suite(Arc::new(SqlStore::in_memory().await.unwrap())).await;
}

#[tokio::test]
async fn sql_store_conditional_semantics_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqlStore::open_file(&dir.path().join("covenant.db"))
        .await
        .unwrap();
    run_suite(Arc::new(store)).await;
}
