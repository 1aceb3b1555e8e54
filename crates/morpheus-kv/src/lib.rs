//! C5: the key-value store. Ephemeral coordination only — group admission,
//! webhook/click dedup, and provider rate caches — never a source of
//! truth (that's the relational store).

pub mod ops;
pub mod pool;

pub use ops::KvError;
pub use pool::{build_pool, KvPool};
