//! Chain boundary: balance reads, cluster time, escrow transfers with
//! bounded retry, and at-rest keypair encryption. Everything above this
//! crate talks to the chain through the [`ChainClient`] trait; the RPC
//! implementation and the in-process test fakes both live here.

mod client;
mod config;
mod error;
mod vault;

pub mod testing;

pub use client::{ChainClient, CustodialSigner, RpcChainClient};
pub use config::ChainConfig;
pub use error::{ChainError, ChainResult};
pub use vault::{EscrowSigner, SecretVault};
