use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tinyserve::store::{MemoryStore, StoreError, StorePool, UserStore};

#[test]
fn test_memory_store_lookup_and_insert() {
    let mut store = MemoryStore::with_users([("alice", "secret")]);

    assert_eq!(store.find_password("alice").unwrap().as_deref(), Some("secret"));
    assert_eq!(store.find_password("bob").unwrap(), None);

    store.insert_user("bob", "pw").unwrap();
    assert_eq!(store.find_password("bob").unwrap().as_deref(), Some("pw"));
}

#[test]
fn test_memory_store_rejects_duplicate() {
    let mut store = MemoryStore::with_users([("alice", "secret")]);
    let err = store.insert_user("alice", "other").unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(ref user) if user == "alice"));
}

#[test]
fn test_clones_share_one_table() {
    let store = MemoryStore::new();
    let mut handle = store.clone();
    handle.insert_user("carol", "pw").unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn test_empty_pool_is_rejected() {
    assert!(matches!(StorePool::new(Vec::new()), Err(StoreError::EmptyPool)));
}

#[test]
fn test_pool_returns_connections_on_drop() {
    let store = MemoryStore::new();
    let pool = StorePool::from_fn(2, || store.clone()).unwrap();
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.idle(), 2);

    let a = pool.acquire();
    let b = pool.acquire();
    assert_eq!(pool.idle(), 0);
    assert!(pool.acquire_timeout(Duration::from_millis(20)).is_none());

    drop(a);
    assert_eq!(pool.idle(), 1);
    drop(b);
    assert_eq!(pool.idle(), 2);
}

#[test]
fn test_acquire_blocks_until_release() {
    let store = MemoryStore::new();
    let pool = Arc::new(StorePool::from_fn(1, || store.clone()).unwrap());

    let held = pool.acquire();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let mut conn = pool.acquire();
            conn.insert_user("late", "pw").unwrap();
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert_eq!(store.len(), 0);
    drop(held);

    waiter.join().unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(pool.idle(), 1);
}
