use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::store::{StoreError, UserStore};

/// In-process user table.
///
/// Clones are separate handles onto the same table, so a pool can be filled
/// with `n` clones of one store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users<I, U, P>(users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        let users = users
            .into_iter()
            .map(|(u, p)| (u.into(), p.into()))
            .collect();
        Self {
            users: Arc::new(RwLock::new(users)),
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserStore for MemoryStore {
    fn find_password(&mut self, user: &str) -> Result<Option<String>, StoreError> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(user).cloned())
    }

    fn insert_user(&mut self, user: &str, password: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(user) {
            return Err(StoreError::Duplicate(user.to_string()));
        }
        users.insert(user.to_string(), password.to_string());
        tracing::debug!(user, "registered new user");
        Ok(())
    }
}
