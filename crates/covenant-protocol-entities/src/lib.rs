//! sea-orm entity definitions for the Covenant Protocol schema.
//!
//! Lamport quantities (u64) and decimal weights are stored as TEXT and
//! parsed at the store boundary; unix timestamps are stored as i64.

pub mod allocation;
pub mod claim;
pub mod commitment;
pub mod distribution;
pub mod fee_share_rotation;
pub mod milestone;
pub mod vote_signal;
