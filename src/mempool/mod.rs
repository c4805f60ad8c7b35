//! Bounded FIFO sets used to deduplicate nonces (and, with a custom indexer, transactions).
mod fifo_set;
mod nonce;

pub use fifo_set::{GenericFifoSet, NonceDeduper};
pub use nonce::get_nonce;
