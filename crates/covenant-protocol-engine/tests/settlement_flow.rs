//! Deadline resolution of personal commitments: approved payout, rejected
//! failure settlement, and the idempotency / conflict edges around both.

mod common;

use common::{Harness, NOW, SOL};
use covenant_protocol_chain::ChainClient;
use covenant_protocol_core::{
    new_id, CommitmentStatus, Distribution, DistributionKind, DistributionStatus, Vote,
};
use covenant_protocol_engine::{ClaimOutcome, EngineError, Resolution};
use covenant_protocol_store::CommitmentStore;
use rust_decimal::dec;
use solana_sdk::{signature::Keypair, signer::Signer};

#[tokio::test]
async fn approved_resolution_pays_the_owner() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let deadline = NOW + 1_000;
    let commitment = h.funded_personal(&owner, &escrow, 10 * SOL, deadline).await;

    for _ in 0..15 {
        let voter = Keypair::new();
        h.cast(&voter, &commitment.id, None, Vote::Approve, dec!(10))
            .await;
    }

    h.chain.set_now(deadline);
    let resolution = h.settlement().resolve_personal(&commitment.id).await.unwrap();
    let Resolution::Success { tx_sig } = resolution else {
        panic!("expected success, got {resolution:?}");
    };

    assert_eq!(h.chain.get_balance(&owner.pubkey()).await.unwrap(), 10 * SOL);
    assert_eq!(h.chain.get_balance(&escrow.pubkey()).await.unwrap(), 0);

    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::ResolvedSuccess);
    assert_eq!(stored.resolved_tx_sig.as_deref(), Some(tx_sig.as_str()));

    // Terminal states never resolve again.
    let err = h.settlement().resolve_personal(&commitment.id).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn rejected_resolution_splits_escrow_across_voters() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let deadline = NOW + 1_000;
    let commitment = h.funded_personal(&owner, &escrow, 10 * SOL, deadline).await;

    let voter_a = Keypair::new();
    let voter_b = Keypair::new();
    h.cast(&voter_a, &commitment.id, None, Vote::Reject, dec!(300))
        .await;
    h.cast(&voter_b, &commitment.id, None, Vote::Reject, dec!(700))
        .await;

    h.chain.set_now(deadline);
    let resolution = h.settlement().resolve_personal(&commitment.id).await.unwrap();
    let Resolution::Failure { distribution_id } = resolution else {
        panic!("expected failure settlement, got {resolution:?}");
    };

    let distribution = h
        .store
        .fetch_distribution(&distribution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(distribution.kind, DistributionKind::CommitmentFailure);
    assert_eq!(distribution.pot_lamports, 10 * SOL);
    assert_eq!(distribution.primary_wallet, h.treasury);
    assert_eq!(distribution.primary_lamports, 5 * SOL);
    assert_eq!(distribution.voter_pot_lamports, 5 * SOL);

    let allocations = h.store.fetch_allocations(&distribution_id).await.unwrap();
    assert_eq!(allocations.len(), 2);
    let share_of = |wallet: String| {
        allocations
            .iter()
            .find(|a| a.wallet == wallet)
            .map(|a| a.amount_lamports)
            .unwrap()
    };
    assert_eq!(share_of(voter_a.pubkey().to_string()), 1_500_000_000);
    assert_eq!(share_of(voter_b.pubkey().to_string()), 3_500_000_000);

    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::ResolvedFailure);

    // Claims pay out lock-free afterwards.
    let outcome = h
        .claims()
        .claim(&distribution_id, &voter_a.pubkey().to_string())
        .await
        .unwrap();
    assert!(matches!(outcome, ClaimOutcome::Paid { .. }));
    assert_eq!(
        h.chain.get_balance(&voter_a.pubkey()).await.unwrap(),
        1_500_000_000
    );
}

#[tokio::test]
async fn drifted_distribution_parameters_are_a_hard_error() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let deadline = NOW + 1_000;
    let commitment = h.funded_personal(&owner, &escrow, 10 * SOL, deadline).await;

    let voter = Keypair::new();
    h.cast(&voter, &commitment.id, None, Vote::Reject, dec!(100))
        .await;

    // A stored row under the same settlement key with different numbers.
    let kind = DistributionKind::CommitmentFailure;
    let poisoned = Distribution {
        id: new_id(),
        kind,
        commitment_id: commitment.id.clone(),
        milestone_id: None,
        settlement_key: kind.settlement_key(&commitment.id, None),
        pot_lamports: 1,
        primary_wallet: h.treasury.clone(),
        primary_lamports: 1,
        voter_pot_lamports: 0,
        allocation_count: 0,
        status: DistributionStatus::Open,
        created_at_unix: NOW,
    };
    h.store
        .create_distribution_if_absent(&poisoned, &[])
        .await
        .unwrap();

    h.chain.set_now(deadline);
    let err = h.settlement().resolve_personal(&commitment.id).await.unwrap_err();
    assert!(matches!(err, EngineError::DistributionMismatch { .. }));

    // The compensating release put the commitment back.
    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::Active);
}

#[tokio::test]
async fn concurrent_resolution_loses_the_lock_race() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let deadline = NOW + 1_000;
    let commitment = h.funded_personal(&owner, &escrow, SOL, deadline).await;

    h.chain.set_now(deadline);
    assert!(h.store.acquire_resolving(&commitment.id, deadline).await.unwrap());

    let err = h.settlement().resolve_personal(&commitment.id).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyResolving(_)));

    // Manual recovery restores the prior status.
    let restored = h.commitments().force_unstick(&commitment.id).await.unwrap();
    assert_eq!(restored.status, CommitmentStatus::Active);
    let err = h.commitments().force_unstick(&commitment.id).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn resolution_before_the_deadline_is_rejected() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let commitment = h.funded_personal(&owner, &escrow, SOL, NOW + 1_000).await;

    let err = h.settlement().resolve_personal(&commitment.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::Active);
}

#[tokio::test]
async fn only_terminal_commitments_archive() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let deadline = NOW + 1_000;
    let commitment = h.funded_personal(&owner, &escrow, SOL, deadline).await;

    let err = h.commitments().archive(&commitment.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    for _ in 0..15 {
        let voter = Keypair::new();
        h.cast(&voter, &commitment.id, None, Vote::Approve, dec!(10))
            .await;
    }
    h.chain.set_now(deadline);
    h.settlement().resolve_personal(&commitment.id).await.unwrap();

    h.commitments().archive(&commitment.id).await.unwrap();
    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::Archived);
}

#[tokio::test]
async fn rejection_with_no_voters_sends_everything_to_the_treasury() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let deadline = NOW + 1_000;
    let commitment = h.funded_personal(&owner, &escrow, 4 * SOL, deadline).await;

    h.chain.set_now(deadline);
    let resolution = h.settlement().resolve_personal(&commitment.id).await.unwrap();
    let Resolution::Failure { distribution_id } = resolution else {
        panic!("expected failure settlement");
    };

    let distribution = h
        .store
        .fetch_distribution(&distribution_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(distribution.primary_lamports, 4 * SOL);
    assert_eq!(distribution.voter_pot_lamports, 0);
    assert_eq!(distribution.allocation_count, 0);
}
