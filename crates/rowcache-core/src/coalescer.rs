//! Per-key request coalescing
//!
//! The first caller for a key becomes the leader and runs the populate
//! future; callers arriving while it runs become followers and wait on a
//! `watch` channel for the leader's result. The in-flight entry is removed
//! before the result is published, so a caller arriving after completion
//! always starts a fresh attempt. Errors are shared with the followers of
//! that window and then forgotten.

use crate::error::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

type Outcome<V> = Option<Result<V>>;

struct Flight<V> {
    generation: u64,
    outcome: watch::Receiver<Outcome<V>>,
}

enum Role<V> {
    Leader {
        generation: u64,
        publish: watch::Sender<Outcome<V>>,
    },
    Follower(watch::Receiver<Outcome<V>>),
}

/// Deduplicates concurrent operations that share a key.
pub struct Coalescer<V> {
    in_flight: DashMap<String, Flight<V>>,
    next_generation: AtomicU64,
    followers: AtomicU64,
}

impl<V> Default for Coalescer<V> {
    fn default() -> Self {
        Self {
            in_flight: DashMap::new(),
            next_generation: AtomicU64::new(0),
            followers: AtomicU64::new(0),
        }
    }
}

impl<V> Coalescer<V>
where
    V: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `populate` for `key` unless a run is already in flight, in which
    /// case wait for it and return a clone of its result.
    ///
    /// Keys are independent: a slow populate for one key never delays
    /// another. If the leader is dropped before finishing, its followers
    /// retry and one of them takes over with its own `populate`.
    pub async fn run<F, Fut>(&self, key: &str, populate: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        loop {
            match self.join(key) {
                Role::Leader {
                    generation,
                    publish,
                } => {
                    let guard = FlightGuard {
                        in_flight: &self.in_flight,
                        key,
                        generation,
                    };
                    let result = populate().await;
                    drop(guard);
                    publish.send_replace(Some(result.clone()));
                    return result;
                }
                Role::Follower(mut outcome) => {
                    self.followers.fetch_add(1, Ordering::Relaxed);
                    match outcome.wait_for(Option::is_some).await {
                        Ok(done) => {
                            if let Some(result) = done.as_ref() {
                                return result.clone();
                            }
                        }
                        Err(_) => {
                            debug!("Leader for {} went away, retrying", key);
                        }
                    }
                }
            }
        }
    }

    /// Number of keys with a populate currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total number of callers that attached to another caller's run.
    pub fn followers(&self) -> u64 {
        self.followers.load(Ordering::Relaxed)
    }

    fn join(&self, key: &str) -> Role<V> {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => Role::Follower(entry.get().outcome.clone()),
            Entry::Vacant(entry) => {
                let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                let (publish, outcome) = watch::channel(None);
                entry.insert(Flight {
                    generation,
                    outcome,
                });
                Role::Leader {
                    generation,
                    publish,
                }
            }
        }
    }
}

/// Clears the leader's entry on completion and on cancellation alike.
struct FlightGuard<'a, V> {
    in_flight: &'a DashMap<String, Flight<V>>,
    key: &'a str,
    generation: u64,
}

impl<V> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        self.in_flight
            .remove_if(self.key, |_, flight| flight.generation == self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CacheError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_caller_runs_populate() {
        let coalescer = Coalescer::<u32>::new();
        let value = coalescer.run("k", || async { Ok(7) }).await.unwrap();

        assert_eq!(value, 7);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let coalescer = Arc::new(Coalescer::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let coalescer = coalescer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .run("shared", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(99)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 99);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.followers(), 19);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_error_is_shared_then_forgotten() {
        let coalescer = Arc::new(Coalescer::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coalescer = coalescer.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .run("flaky", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Err(CacheError::Backend("connection reset".into()))
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(
                handle.await.unwrap(),
                Err(CacheError::Backend("connection reset".into()))
            );
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The window is closed, so the next caller gets a fresh attempt.
        let value = coalescer.run("flaky", || async { Ok(1) }).await.unwrap();
        assert_eq!(value, 1);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_wait_for_each_other() {
        let coalescer = Arc::new(Coalescer::<u32>::new());
        let started = tokio::time::Instant::now();

        let a = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                coalescer
                    .run("a", || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        let b = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                coalescer
                    .run("b", || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(2)
                    })
                    .await
            })
        };

        assert_eq!(a.await.unwrap().unwrap(), 1);
        assert_eq!(b.await.unwrap().unwrap(), 2);
        assert!(started.elapsed() < Duration::from_millis(190));
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over_to_follower() {
        let coalescer = Arc::new(Coalescer::<u32>::new());

        let leader = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move {
                coalescer
                    .run("slow", || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(0)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(coalescer.in_flight(), 1);

        let follower = {
            let coalescer = coalescer.clone();
            tokio::spawn(async move { coalescer.run("slow", || async { Ok(5) }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader.abort();
        let value = tokio::time::timeout(Duration::from_secs(1), follower)
            .await
            .expect("follower should not hang")
            .unwrap()
            .unwrap();

        assert_eq!(value, 5);
        assert_eq!(coalescer.in_flight(), 0);
    }
}
