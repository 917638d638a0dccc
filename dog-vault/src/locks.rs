//! Per-path mutual exclusion.
//!
//! Mutations of one sharded path (probe old size, write, account) must not
//! interleave, otherwise two uploads of the same key both see the same old size
//! and the usage total drifts. A fixed set of striped mutexes keeps memory
//! bounded; unrelated paths that share a stripe just wait a little.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

const STRIPES: usize = 64;

#[derive(Debug)]
pub struct KeyLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        Self {
            stripes: (0..STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Wait for exclusive access to `path`
    pub async fn lock(&self, path: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe(path)].lock().await
    }

    fn stripe(&self, path: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        (hasher.finish() as usize) % self.stripes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn same_path_same_stripe() {
        let locks = KeyLocks::new();
        assert_eq!(locks.stripe("s/ab/abc"), locks.stripe("s/ab/abc"));
    }

    #[tokio::test]
    async fn second_holder_waits() {
        let locks = Arc::new(KeyLocks::new());
        let guard = locks.lock("s/ab/abc").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("s/ab/abc").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }
}
