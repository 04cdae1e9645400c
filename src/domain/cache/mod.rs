//! Cache domain - key derivation and the cache store boundary

mod key;
mod store;

pub use key::KeyScheme;
pub use store::{CacheStore, CacheStoreExt};

#[cfg(test)]
pub use store::mock;
