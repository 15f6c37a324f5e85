/*!
# Weighted Allocation Engine

Turns an integer pot and a set of (wallet, weight) pairs into integer shares
that sum **exactly** to the pot, using the largest-remainder method. Both
strategies are pure functions: identical inputs always produce identical
output order and amounts, which is what makes re-derived distributions
comparable byte-for-byte against stored ones.
*/

use crate::{CoreError, CoreResult};
use rust_decimal::prelude::*;

/// A payout candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub wallet: String,
    pub weight: Decimal,
}

/// One computed share. Output preserves recipient input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub wallet: String,
    pub amount_lamports: u64,
    pub weight: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// `pot / n` each, remainder handed out one unit at a time from the
    /// first recipient.
    Equal,
    /// Proportional to weight, leftover units by descending fractional
    /// remainder (ties: descending weight, then ascending wallet).
    Weighted,
}

/// Split `pot` across `recipients`.
///
/// Weighted recipients with zero or negative weight are excluded before
/// normalization; if none survive, the split falls back to `Equal` over the
/// original recipient set. Shares below `dust_lamports` are dropped and
/// their units redistributed over the survivors by the same
/// largest-remainder discipline; if every share is dust the whole pot goes
/// to the single best-weighted recipient.
pub fn split_pot(
    pot: u64,
    recipients: &[Recipient],
    strategy: SplitStrategy,
    dust_lamports: u64,
) -> CoreResult<Vec<Share>> {
    if recipients.is_empty() {
        if pot == 0 {
            return Ok(Vec::new());
        }
        return Err(CoreError::Validation(
            "cannot split a non-zero pot across zero recipients".to_string(),
        ));
    }
    if pot == 0 {
        return Ok(recipients
            .iter()
            .map(|r| Share {
                wallet: r.wallet.clone(),
                amount_lamports: 0,
                weight: r.weight,
            })
            .collect());
    }

    // The weighted fallback is decided once, against the original set.
    let strategy = match strategy {
        SplitStrategy::Weighted if !recipients.iter().any(|r| r.weight > Decimal::ZERO) => {
            SplitStrategy::Equal
        }
        other => other,
    };

    let mut pool: Vec<Recipient> = recipients.to_vec();
    loop {
        let shares = match strategy {
            SplitStrategy::Equal => equal_split(pot, &pool),
            SplitStrategy::Weighted => weighted_split(pot, &pool)?,
        };
        verify_sum(pot, &shares)?;

        if dust_lamports == 0 {
            return Ok(shares);
        }
        let survivors: Vec<Share> = shares
            .iter()
            .filter(|s| s.amount_lamports >= dust_lamports)
            .cloned()
            .collect();
        if survivors.len() == shares.len() {
            return Ok(shares);
        }
        if survivors.is_empty() {
            let best = best_recipient(&pool);
            let shares = vec![Share {
                wallet: best.wallet.clone(),
                amount_lamports: pot,
                weight: best.weight,
            }];
            verify_sum(pot, &shares)?;
            return Ok(shares);
        }
        pool = survivors
            .into_iter()
            .map(|s| Recipient {
                wallet: s.wallet,
                weight: s.weight,
            })
            .collect();
    }
}

/// Compress raw engagement scores with √ so outliers do not dominate.
/// Scores that fail `Decimal` conversion (NaN, ±∞) or are non-positive are
/// excluded.
pub fn sqrt_weights(scores: &[(String, f64)]) -> Vec<Recipient> {
    scores
        .iter()
        .filter_map(|(wallet, score)| {
            let weight = Decimal::from_f64(*score)?;
            if weight <= Decimal::ZERO {
                return None;
            }
            weight.sqrt().map(|root| Recipient {
                wallet: wallet.clone(),
                weight: root,
            })
        })
        .collect()
}

fn equal_split(pot: u64, pool: &[Recipient]) -> Vec<Share> {
    let n = pool.len() as u64;
    let base = pot / n;
    let remainder = pot % n;
    pool.iter()
        .enumerate()
        .map(|(i, r)| Share {
            wallet: r.wallet.clone(),
            amount_lamports: base + u64::from((i as u64) < remainder),
            weight: r.weight,
        })
        .collect()
}

fn weighted_split(pot: u64, pool: &[Recipient]) -> CoreResult<Vec<Share>> {
    let valid: Vec<&Recipient> = pool.iter().filter(|r| r.weight > Decimal::ZERO).collect();
    if valid.is_empty() {
        // Dust recursion can only shrink a set that already passed the
        // positive-weight check, so this indicates a computation bug.
        return Err(CoreError::Invariant(
            "weighted split invoked with no positive weights".to_string(),
        ));
    }

    let total: Decimal = valid.iter().map(|r| r.weight).sum();
    let pot_dec = Decimal::from(pot);

    struct Entry {
        wallet: String,
        weight: Decimal,
        amount: u64,
        fraction: Decimal,
    }

    let mut entries = Vec::with_capacity(valid.len());
    let mut allocated: u64 = 0;
    for recipient in &valid {
        let raw = recipient.weight / total * pot_dec;
        let floored = raw.floor();
        let amount = floored
            .to_u64()
            .ok_or_else(|| CoreError::Invariant(format!("share overflow: {raw}")))?;
        allocated += amount;
        entries.push(Entry {
            wallet: recipient.wallet.clone(),
            weight: recipient.weight,
            amount,
            fraction: raw - floored,
        });
    }
    if allocated > pot {
        return Err(CoreError::Invariant(format!(
            "floored shares {allocated} exceed pot {pot}"
        )));
    }

    // Largest-remainder pass: descending fraction, then descending weight,
    // then ascending wallet for determinism.
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| {
        entries[b]
            .fraction
            .cmp(&entries[a].fraction)
            .then_with(|| entries[b].weight.cmp(&entries[a].weight))
            .then_with(|| entries[a].wallet.cmp(&entries[b].wallet))
    });
    let leftover = pot - allocated;
    for k in 0..leftover {
        entries[order[(k as usize) % order.len()]].amount += 1;
    }

    Ok(entries
        .into_iter()
        .map(|e| Share {
            wallet: e.wallet,
            amount_lamports: e.amount,
            weight: e.weight,
        })
        .collect())
}

fn best_recipient(pool: &[Recipient]) -> &Recipient {
    let mut best = &pool[0];
    for candidate in &pool[1..] {
        let better = candidate.weight > best.weight
            || (candidate.weight == best.weight && candidate.wallet < best.wallet);
        if better {
            best = candidate;
        }
    }
    best
}

fn verify_sum(pot: u64, shares: &[Share]) -> CoreResult<()> {
    let total: u64 = shares.iter().map(|s| s.amount_lamports).sum();
    if total != pot {
        return Err(CoreError::Invariant(format!(
            "allocations sum to {total}, expected {pot}"
        )));
    }
    Ok(())
}
