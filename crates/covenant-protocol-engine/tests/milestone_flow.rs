//! Milestone lifecycle: completion, windowed voting, lazy advancement,
//! vote-reward release, and missed-delivery failure.

mod common;

use common::{Harness, NOW, SOL};
use covenant_protocol_core::{
    CommitmentStatus, DistributionKind, DistributionStatus, MilestoneStatus, Vote,
};
use covenant_protocol_engine::{ClaimOutcome, EngineError, MilestoneSpec, VoteOutcome};
use covenant_protocol_store::CommitmentStore;
use rust_decimal::dec;
use solana_sdk::{signature::Keypair, signer::Signer};

fn percent_milestone(percent: u8) -> MilestoneSpec {
    MilestoneSpec {
        description: "ship the feature".to_string(),
        unlock_lamports: None,
        unlock_percent: Some(percent),
        due_at_unix: None,
    }
}

#[tokio::test]
async fn sixteen_approvals_clear_the_threshold_and_release_pays_out() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let commitment = h.funded_reward(&owner, &escrow, 10 * SOL).await;

    let milestone = h
        .commitments()
        .add_milestone(&commitment.id, percent_milestone(50))
        .await
        .unwrap();

    // Creator-signed completion with an early review window.
    let signature = h.completion_signature(&owner, &commitment.id, &milestone.id);
    let milestone = h
        .commitments()
        .complete_milestone(&commitment.id, &milestone.id, true, &signature)
        .await
        .unwrap();
    assert_eq!(milestone.completed_at_unix, Some(NOW));
    assert_eq!(milestone.review_opened_at_unix, Some(NOW));

    // 16 approvals, 0 rejections, threshold 15.
    for _ in 0..16 {
        let voter = Keypair::new();
        h.cast(&voter, &commitment.id, Some(&milestone.id), Vote::Approve, dec!(25))
            .await;
    }

    // Window closes, then the claim delay elapses: two lazy advances.
    h.chain.set_now(NOW + h.config.cutoff_seconds);
    let view = h.commitments().load(&commitment.id).await.unwrap();
    assert_eq!(view.milestones[0].status, MilestoneStatus::Approved);

    let view = h.commitments().load(&commitment.id).await.unwrap();
    assert_eq!(view.milestones[0].status, MilestoneStatus::Claimable);

    let distribution = h
        .settlement()
        .release_milestone(&commitment.id, &milestone.id)
        .await
        .unwrap();
    assert_eq!(distribution.kind, DistributionKind::VoteReward);
    assert_eq!(distribution.pot_lamports, 5 * SOL);
    // 1% voter reward, remainder to the owner.
    assert_eq!(distribution.voter_pot_lamports, 50_000_000);
    assert_eq!(distribution.primary_lamports, 4_950_000_000);
    assert_eq!(distribution.primary_wallet, owner.pubkey().to_string());

    // The milestone stays claimable until the owner's payout confirms.
    let stored = h.store.fetch_milestone(&milestone.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MilestoneStatus::Claimable);

    let outcome = h
        .claims()
        .claim(&distribution.id, &owner.pubkey().to_string())
        .await
        .unwrap();
    let ClaimOutcome::Paid { tx_sig } = outcome else {
        panic!("expected a payout");
    };

    let stored = h.store.fetch_milestone(&milestone.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MilestoneStatus::Released);
    assert_eq!(stored.released_tx_sig.as_deref(), Some(tx_sig.as_str()));

    // Unlock accounting and the all-released completion check.
    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.unlocked_lamports, 5 * SOL);
    assert_eq!(stored.status, CommitmentStatus::Completed);
}

#[tokio::test]
async fn fifteen_approvals_against_fifteen_rejections_fail() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let commitment = h.funded_reward(&owner, &escrow, 10 * SOL).await;
    let milestone = h
        .commitments()
        .add_milestone(&commitment.id, percent_milestone(40))
        .await
        .unwrap();
    let signature = h.completion_signature(&owner, &commitment.id, &milestone.id);
    h.commitments()
        .complete_milestone(&commitment.id, &milestone.id, true, &signature)
        .await
        .unwrap();

    // Meets the threshold but not the strict majority.
    for _ in 0..15 {
        let voter = Keypair::new();
        h.cast(&voter, &commitment.id, Some(&milestone.id), Vote::Approve, dec!(1))
            .await;
        let voter = Keypair::new();
        h.cast(&voter, &commitment.id, Some(&milestone.id), Vote::Reject, dec!(1))
            .await;
    }

    h.chain.set_now(NOW + h.config.cutoff_seconds);
    let view = h.commitments().load(&commitment.id).await.unwrap();
    assert_eq!(view.milestones[0].status, MilestoneStatus::Failed);
}

#[tokio::test]
async fn duplicate_votes_and_closed_windows_are_rejected() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let commitment = h.funded_reward(&owner, &escrow, SOL).await;
    let milestone = h
        .commitments()
        .add_milestone(&commitment.id, percent_milestone(100))
        .await
        .unwrap();

    // No completion yet: no window.
    let voter = Keypair::new();
    let signature = h.vote_signature(&voter, &commitment.id, Some(&milestone.id), Vote::Approve);
    let err = h
        .voting()
        .record_vote(
            &commitment.id,
            Some(&milestone.id),
            &voter.pubkey().to_string(),
            Vote::Approve,
            dec!(5),
            &signature,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let signature = h.completion_signature(&owner, &commitment.id, &milestone.id);
    h.commitments()
        .complete_milestone(&commitment.id, &milestone.id, true, &signature)
        .await
        .unwrap();

    // First vote wins; the resubmission is a no-op even with a flipped
    // verdict.
    let outcome = h
        .cast(&voter, &commitment.id, Some(&milestone.id), Vote::Approve, dec!(5))
        .await;
    assert_eq!(outcome, VoteOutcome::Recorded);
    let outcome = h
        .cast(&voter, &commitment.id, Some(&milestone.id), Vote::Reject, dec!(5))
        .await;
    assert_eq!(outcome, VoteOutcome::AlreadyVoted);

    // Window closed: late votes bounce.
    h.chain.set_now(NOW + h.config.cutoff_seconds);
    let late = Keypair::new();
    let signature = h.vote_signature(&late, &commitment.id, Some(&milestone.id), Vote::Approve);
    let err = h
        .voting()
        .record_vote(
            &commitment.id,
            Some(&milestone.id),
            &late.pubkey().to_string(),
            Vote::Approve,
            dec!(5),
            &signature,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // A signature over the wrong message fails authorization.
    let voter = Keypair::new();
    let wrong = h.vote_signature(&voter, &commitment.id, Some(&milestone.id), Vote::Reject);
    let err = h
        .voting()
        .record_vote(
            &commitment.id,
            Some(&milestone.id),
            &voter.pubkey().to_string(),
            Vote::Approve,
            dec!(5),
            &wrong,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Authorization(_)));
}

#[tokio::test]
async fn missed_delivery_fails_after_grace_and_settles() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let commitment = h.funded_reward(&owner, &escrow, 10 * SOL).await;
    let milestone = h
        .commitments()
        .add_milestone(
            &commitment.id,
            MilestoneSpec {
                description: "deliver by friday".to_string(),
                unlock_lamports: None,
                unlock_percent: Some(30),
                due_at_unix: Some(NOW + 100),
            },
        )
        .await
        .unwrap();

    h.chain.set_now(NOW + 100 + h.config.grace_seconds);
    let view = h.commitments().load(&commitment.id).await.unwrap();
    assert_eq!(view.milestones[0].status, MilestoneStatus::Failed);

    let distribution = h
        .settlement()
        .settle_milestone_failure(&commitment.id, &milestone.id)
        .await
        .unwrap();
    assert_eq!(distribution.kind, DistributionKind::MilestoneFailure);
    assert_eq!(distribution.pot_lamports, 3 * SOL);
    // No voters: the whole pot goes to the treasury.
    assert_eq!(distribution.primary_lamports, 3 * SOL);
    assert_eq!(distribution.allocation_count, 0);

    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::Failed);

    // Retrying the settlement reuses the stored distribution.
    let again = h
        .settlement()
        .settle_milestone_failure(&commitment.id, &milestone.id)
        .await
        .unwrap();
    assert_eq!(again.id, distribution.id);
}

#[tokio::test]
async fn zero_unlock_amounts_are_rejected() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let commitment = h.funded_reward(&owner, &escrow, SOL).await;

    let err = h
        .commitments()
        .add_milestone(
            &commitment.id,
            MilestoneSpec {
                description: "nothing behind it".to_string(),
                unlock_lamports: Some(0),
                unlock_percent: None,
                due_at_unix: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn zero_pot_milestone_releases_without_a_claim() {
    let h = Harness::new().with_config(|c| {
        c.approval_threshold = 1;
        c.claim_delay_seconds = 0;
    });
    let owner = Keypair::new();
    let escrow = Keypair::new();

    // The escrow holds lamports but no funding is ever recognized, so a
    // percent milestone resolves to a zero unlock.
    h.chain.set_balance(escrow.pubkey(), SOL);
    let commitment = h
        .commitments()
        .issue_reward(owner.pubkey(), escrow.pubkey(), h.local_signer(&escrow))
        .await
        .unwrap();
    let commitment = h.commitments().activate(&commitment.id).await.unwrap();
    let milestone = h
        .commitments()
        .add_milestone(&commitment.id, percent_milestone(50))
        .await
        .unwrap();

    let signature = h.completion_signature(&owner, &commitment.id, &milestone.id);
    h.commitments()
        .complete_milestone(&commitment.id, &milestone.id, true, &signature)
        .await
        .unwrap();
    let voter = Keypair::new();
    h.cast(&voter, &commitment.id, Some(&milestone.id), Vote::Approve, dec!(5))
        .await;

    h.chain.set_now(NOW + h.config.cutoff_seconds);
    let view = h.commitments().load(&commitment.id).await.unwrap();
    assert_eq!(view.milestones[0].status, MilestoneStatus::Claimable);

    // Nothing to transfer: the milestone releases immediately instead of
    // waiting on an owner claim that a zero share would reject.
    let distribution = h
        .settlement()
        .release_milestone(&commitment.id, &milestone.id)
        .await
        .unwrap();
    assert_eq!(distribution.pot_lamports, 0);
    assert_eq!(distribution.primary_lamports, 0);
    assert_eq!(distribution.allocation_count, 0);
    assert_eq!(distribution.status, DistributionStatus::Completed);

    let stored = h.store.fetch_milestone(&milestone.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MilestoneStatus::Released);
    assert_eq!(stored.released_tx_sig, None);
    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::Completed);

    // Idempotent: release on a released milestone is a plain validation
    // error, nothing re-persists.
    let err = h
        .settlement()
        .release_milestone(&commitment.id, &milestone.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn percent_budget_and_reopening_are_enforced() {
    let h = Harness::new();
    let owner = Keypair::new();
    let escrow = Keypair::new();
    let commitment = h.funded_reward(&owner, &escrow, 10 * SOL).await;

    h.commitments()
        .add_milestone(&commitment.id, percent_milestone(60))
        .await
        .unwrap();
    let err = h
        .commitments()
        .add_milestone(&commitment.id, percent_milestone(50))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // Release the first milestone, completing the commitment, then verify
    // a new milestone reopens it.
    let milestone = h
        .commitments()
        .load(&commitment.id)
        .await
        .unwrap()
        .milestones
        .remove(0);
    let signature = h.completion_signature(&owner, &commitment.id, &milestone.id);
    h.commitments()
        .complete_milestone(&commitment.id, &milestone.id, true, &signature)
        .await
        .unwrap();
    for _ in 0..16 {
        let voter = Keypair::new();
        h.cast(&voter, &commitment.id, Some(&milestone.id), Vote::Approve, dec!(2))
            .await;
    }
    h.chain.set_now(NOW + h.config.cutoff_seconds);
    h.commitments().load(&commitment.id).await.unwrap();
    h.commitments().load(&commitment.id).await.unwrap();
    let distribution = h
        .settlement()
        .release_milestone(&commitment.id, &milestone.id)
        .await
        .unwrap();
    h.claims()
        .claim(&distribution.id, &owner.pubkey().to_string())
        .await
        .unwrap();
    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::Completed);

    let reopened = h
        .commitments()
        .add_milestone(&commitment.id, percent_milestone(40))
        .await
        .unwrap();
    assert_eq!(reopened.position, 1);
    let stored = h.store.fetch_commitment(&commitment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CommitmentStatus::Active);
}
