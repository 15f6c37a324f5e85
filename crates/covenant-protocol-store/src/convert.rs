//! TEXT-column parsing between sea-orm models and domain types. Lamports
//! and weights are persisted as strings; a row that fails to parse is
//! surfaced as [`StoreError::Corrupt`], never silently coerced.

use crate::StoreResult;
use covenant_protocol_core::{
    Allocation, Claim, Commitment, Distribution, FeeShareRotation, Milestone, SignerRef,
    VoteSignal,
};
use covenant_protocol_entities::{
    allocation, claim, commitment, distribution, fee_share_rotation, milestone, vote_signal,
};
use covenant_protocol_core::CoreError;
use rust_decimal::Decimal;
use sea_orm::Set;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Sentinel stored in `vote_signals.milestone_id` for commitment-level votes.
pub(crate) const COMMITMENT_LEVEL_VOTE: &str = "";

pub(crate) fn parse_u64(field: &'static str, value: &str) -> StoreResult<u64> {
    value
        .parse::<u64>()
        .map_err(|_| CoreError::parse(field, value).into())
}

pub(crate) fn parse_decimal(field: &'static str, value: &str) -> StoreResult<Decimal> {
    Decimal::from_str(value).map_err(|_| CoreError::parse(field, value).into())
}

pub(crate) fn parse_pubkey(field: &'static str, value: &str) -> StoreResult<Pubkey> {
    Pubkey::from_str(value).map_err(|_| CoreError::parse(field, value).into())
}

pub(crate) fn commitment_from_model(m: commitment::Model) -> StoreResult<Commitment> {
    Ok(Commitment {
        kind: m.kind.parse()?,
        owner_wallet: parse_pubkey("owner wallet", &m.owner_wallet)?,
        escrow_pubkey: parse_pubkey("escrow pubkey", &m.escrow_pubkey)?,
        signer_ref: SignerRef::from_columns(&m.signer_kind, &m.signer_payload)?,
        status: m.status.parse()?,
        prior_status: m.prior_status.as_deref().map(str::parse).transpose()?,
        amount_lamports: m
            .amount_lamports
            .as_deref()
            .map(|v| parse_u64("amount", v))
            .transpose()?,
        deadline_unix: m.deadline_unix,
        total_funded_lamports: parse_u64("total funded", &m.total_funded_lamports)?,
        unlocked_lamports: parse_u64("unlocked", &m.unlocked_lamports)?,
        resolved_tx_sig: m.resolved_tx_sig,
        created_at_unix: m.created_at_unix,
        updated_at_unix: m.updated_at_unix,
        id: m.id,
    })
}

pub(crate) fn commitment_to_active(c: &Commitment) -> commitment::ActiveModel {
    commitment::ActiveModel {
        id: Set(c.id.clone()),
        kind: Set(c.kind.to_string()),
        owner_wallet: Set(c.owner_wallet.to_string()),
        escrow_pubkey: Set(c.escrow_pubkey.to_string()),
        signer_kind: Set(c.signer_ref.kind().to_string()),
        signer_payload: Set(c.signer_ref.payload()),
        status: Set(c.status.to_string()),
        prior_status: Set(c.prior_status.map(|s| s.to_string())),
        amount_lamports: Set(c.amount_lamports.map(|v| v.to_string())),
        deadline_unix: Set(c.deadline_unix),
        total_funded_lamports: Set(c.total_funded_lamports.to_string()),
        unlocked_lamports: Set(c.unlocked_lamports.to_string()),
        resolved_tx_sig: Set(c.resolved_tx_sig.clone()),
        created_at_unix: Set(c.created_at_unix),
        updated_at_unix: Set(c.updated_at_unix),
    }
}

pub(crate) fn milestone_from_model(m: milestone::Model) -> StoreResult<Milestone> {
    Ok(Milestone {
        commitment_id: m.commitment_id,
        position: m.position,
        description: m.description,
        unlock_lamports: m
            .unlock_lamports
            .as_deref()
            .map(|v| parse_u64("unlock", v))
            .transpose()?,
        unlock_percent: m.unlock_percent,
        status: m.status.parse()?,
        completed_at_unix: m.completed_at_unix,
        review_opened_at_unix: m.review_opened_at_unix,
        due_at_unix: m.due_at_unix,
        claimable_at_unix: m.claimable_at_unix,
        became_claimable_at_unix: m.became_claimable_at_unix,
        released_at_unix: m.released_at_unix,
        released_tx_sig: m.released_tx_sig,
        id: m.id,
    })
}

pub(crate) fn milestone_to_active(m: &Milestone) -> milestone::ActiveModel {
    milestone::ActiveModel {
        id: Set(m.id.clone()),
        commitment_id: Set(m.commitment_id.clone()),
        position: Set(m.position),
        description: Set(m.description.clone()),
        unlock_lamports: Set(m.unlock_lamports.map(|v| v.to_string())),
        unlock_percent: Set(m.unlock_percent),
        status: Set(m.status.to_string()),
        completed_at_unix: Set(m.completed_at_unix),
        review_opened_at_unix: Set(m.review_opened_at_unix),
        due_at_unix: Set(m.due_at_unix),
        claimable_at_unix: Set(m.claimable_at_unix),
        became_claimable_at_unix: Set(m.became_claimable_at_unix),
        released_at_unix: Set(m.released_at_unix),
        released_tx_sig: Set(m.released_tx_sig.clone()),
    }
}

pub(crate) fn vote_from_model(m: vote_signal::Model) -> StoreResult<VoteSignal> {
    Ok(VoteSignal {
        commitment_id: m.commitment_id,
        milestone_id: if m.milestone_id == COMMITMENT_LEVEL_VOTE {
            None
        } else {
            Some(m.milestone_id)
        },
        vote: m.vote.parse()?,
        weight_usd: parse_decimal("vote weight", &m.weight_usd)?,
        created_at_unix: m.created_at_unix,
        signer_wallet: m.signer_wallet,
    })
}

pub(crate) fn vote_to_active(v: &VoteSignal) -> vote_signal::ActiveModel {
    vote_signal::ActiveModel {
        commitment_id: Set(v.commitment_id.clone()),
        milestone_id: Set(v
            .milestone_id
            .clone()
            .unwrap_or_else(|| COMMITMENT_LEVEL_VOTE.to_string())),
        signer_wallet: Set(v.signer_wallet.clone()),
        vote: Set(v.vote.to_string()),
        weight_usd: Set(v.weight_usd.to_string()),
        created_at_unix: Set(v.created_at_unix),
    }
}

pub(crate) fn distribution_from_model(m: distribution::Model) -> StoreResult<Distribution> {
    Ok(Distribution {
        kind: m.kind.parse()?,
        commitment_id: m.commitment_id,
        milestone_id: m.milestone_id,
        settlement_key: m.settlement_key,
        pot_lamports: parse_u64("pot", &m.pot_lamports)?,
        primary_wallet: m.primary_wallet,
        primary_lamports: parse_u64("primary share", &m.primary_lamports)?,
        voter_pot_lamports: parse_u64("voter pot", &m.voter_pot_lamports)?,
        allocation_count: m.allocation_count,
        status: m.status.parse()?,
        created_at_unix: m.created_at_unix,
        id: m.id,
    })
}

pub(crate) fn distribution_to_active(d: &Distribution) -> distribution::ActiveModel {
    distribution::ActiveModel {
        id: Set(d.id.clone()),
        kind: Set(d.kind.to_string()),
        commitment_id: Set(d.commitment_id.clone()),
        milestone_id: Set(d.milestone_id.clone()),
        settlement_key: Set(d.settlement_key.clone()),
        pot_lamports: Set(d.pot_lamports.to_string()),
        primary_wallet: Set(d.primary_wallet.clone()),
        primary_lamports: Set(d.primary_lamports.to_string()),
        voter_pot_lamports: Set(d.voter_pot_lamports.to_string()),
        allocation_count: Set(d.allocation_count),
        status: Set(d.status.to_string()),
        created_at_unix: Set(d.created_at_unix),
    }
}

pub(crate) fn allocation_from_model(m: allocation::Model) -> StoreResult<Allocation> {
    Ok(Allocation {
        distribution_id: m.distribution_id,
        amount_lamports: parse_u64("allocation amount", &m.amount_lamports)?,
        weight: parse_decimal("allocation weight", &m.weight)?,
        wallet: m.wallet,
    })
}

pub(crate) fn allocation_to_active(a: &Allocation) -> allocation::ActiveModel {
    allocation::ActiveModel {
        distribution_id: Set(a.distribution_id.clone()),
        wallet: Set(a.wallet.clone()),
        amount_lamports: Set(a.amount_lamports.to_string()),
        weight: Set(a.weight.to_string()),
    }
}

pub(crate) fn claim_from_model(m: claim::Model) -> StoreResult<Claim> {
    Ok(Claim {
        distribution_id: m.distribution_id,
        amount_lamports: parse_u64("claim amount", &m.amount_lamports)?,
        claimed_at_unix: m.claimed_at_unix,
        tx_sig: m.tx_sig,
        wallet: m.wallet,
    })
}

pub(crate) fn claim_to_active(c: &Claim) -> claim::ActiveModel {
    claim::ActiveModel {
        distribution_id: Set(c.distribution_id.clone()),
        wallet: Set(c.wallet.clone()),
        amount_lamports: Set(c.amount_lamports.to_string()),
        claimed_at_unix: Set(c.claimed_at_unix),
        tx_sig: Set(c.tx_sig.clone()),
    }
}

pub(crate) fn rotation_from_model(m: fee_share_rotation::Model) -> FeeShareRotation {
    FeeShareRotation {
        id: m.id,
        token_mint: m.token_mint,
        executed_at_unix: m.executed_at_unix,
        shares_json: m.shares_json,
    }
}

pub(crate) fn rotation_to_active(r: &FeeShareRotation) -> fee_share_rotation::ActiveModel {
    fee_share_rotation::ActiveModel {
        id: Set(r.id.clone()),
        token_mint: Set(r.token_mint.clone()),
        executed_at_unix: Set(r.executed_at_unix),
        shares_json: Set(r.shares_json.clone()),
    }
}
