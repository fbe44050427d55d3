//! Backend user store.
//!
//! Dynamic requests (login, registration) talk to the store through a
//! [`UserStore`] handle borrowed from a [`StorePool`] for the duration of a
//! single query.

pub mod memory;
pub mod pool;

pub use memory::MemoryStore;
pub use pool::{PooledConn, StorePool};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0:?} already exists")]
    Duplicate(String),
    #[error("store pool must hold at least one connection")]
    EmptyPool,
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// One connection to the user table.
pub trait UserStore: Send {
    /// Looks up the password row for `user`.
    fn find_password(&mut self, user: &str) -> Result<Option<String>, StoreError>;

    /// Inserts a new row. Fails with [`StoreError::Duplicate`] if `user` is
    /// already present.
    fn insert_user(&mut self, user: &str, password: &str) -> Result<(), StoreError>;
}
