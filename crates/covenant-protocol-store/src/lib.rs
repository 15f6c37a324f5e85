/*!
# Covenant Protocol Store

Persistence for the commitment settlement engine. All coordination is pushed
into the backing store through conditional writes: the resolving lock, the
first-vote-wins vote insert, the create-if-absent distribution and the
unique-key claim acquire. There is no in-process lock manager.

Two implementations of [`CommitmentStore`] ship here:

- [`SqlStore`] — sea-orm over SQLite, the durable store.
- [`MemoryStore`] — a mutexed map set with identical conditional semantics,
  for environments without a database and for tests.

Both are injected at startup; nothing in this workspace reaches for ambient
global state.
*/

mod convert;
mod error;
mod memory;
mod sql;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sql::SqlStore;
pub use store::{ClaimAcquire, CommitmentStore, CreateDistribution};
