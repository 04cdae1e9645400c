//! Backend infrastructure - backing store implementations

mod in_memory;
mod postgres;

pub use in_memory::InMemoryBackend;
pub use postgres::{PostgresBackend, PostgresConfig};
