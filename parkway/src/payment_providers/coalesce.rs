//! Single-flight call coalescing.
//!
//! [`SingleFlight::run`] executes at most one future per key at a time. Callers arriving while
//! a flight for their key is in progress await that flight and receive a clone of its output.
//! Once the flight finishes the key is released, so later callers start a fresh one.

use std::{future::Future, hash::Hash};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};

type Flight<T> = Shared<BoxFuture<'static, T>>;

struct InFlight<T>
where
    T: Clone,
{
    flight: Flight<T>,
    /// Callers currently awaiting `flight`
    waiters: usize,
}

pub struct SingleFlight<K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    inflight: DashMap<K, InFlight<T>>,
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    fn default() -> Self {
        Self { inflight: DashMap::new() }
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, or join the flight already running for it.
    ///
    /// `work` is only invoked when this caller starts a new flight. A caller that is dropped
    /// before the flight finishes leaves it running for the others; the key is released once
    /// the flight completes, or once every caller awaiting it has been dropped.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = match self.inflight.entry(key.clone()) {
            Entry::Occupied(mut existing) => {
                tracing::debug!("Joining in-flight call");
                let entry = existing.get_mut();
                entry.waiters += 1;
                entry.flight.clone()
            }
            Entry::Vacant(slot) => {
                let flight = work().boxed().shared();
                slot.insert(InFlight {
                    flight: flight.clone(),
                    waiters: 1,
                });
                flight
            }
        };

        let mut release = Release {
            inflight: &self.inflight,
            key,
            flight: flight.clone(),
            finished: false,
        };

        let output = flight.await;
        release.finished = true;
        output
    }

    /// Number of keys with a flight in progress
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

/// Drops one caller's interest in a flight. The entry is removed when the flight has finished
/// or its last waiter goes away, unless the key already belongs to a newer flight.
struct Release<'a, K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    inflight: &'a DashMap<K, InFlight<T>>,
    key: K,
    flight: Flight<T>,
    finished: bool,
}

impl<K, T> Drop for Release<'_, K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    fn drop(&mut self) {
        let finished = self.finished;
        self.inflight.remove_if_mut(&self.key, |_, current| {
            if !current.flight.ptr_eq(&self.flight) {
                return false;
            }
            current.waiters = current.waiters.saturating_sub(1);
            finished || current.waiters == 0
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_execution() {
        let flights: Arc<SingleFlight<u32, usize>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flights = flights.clone();
            let calls = calls.clone();
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                flights
                    .run(7, move || async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        gate.notified().await;
                        n
                    })
                    .await
            }));
        }

        // Let every task join the flight before releasing it
        while flights.in_flight() == 0 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        gate.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 1);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_sequential_calls_run_separately() {
        let flights: SingleFlight<&'static str, usize> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in 1..=3 {
            let calls = calls.clone();
            let got = flights
                .run("key", move || async move { calls.fetch_add(1, Ordering::SeqCst) + 1 })
                .await;
            assert_eq!(got, expected);
        }
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();
        let (a, b) = tokio::join!(
            flights.run(1, || async { 10 }),
            flights.run(2, || async { 20 }),
        );
        assert_eq!((a, b), (10, 20));
    }

    #[tokio::test]
    async fn test_dropped_caller_releases_key() {
        let flights: SingleFlight<u32, u32> = SingleFlight::new();

        let pending = flights.run(1, || futures::future::pending::<u32>());
        let timed_out = tokio::time::timeout(Duration::from_millis(20), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(flights.in_flight(), 0);

        assert_eq!(flights.run(1, || async { 5 }).await, 5);
    }

    #[tokio::test]
    async fn test_dropped_follower_keeps_flight_for_later_callers() {
        let flights: Arc<SingleFlight<u32, usize>> = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let work = |calls: Arc<AtomicUsize>, gate: Arc<Notify>| {
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                gate.notified().await;
                n
            }
        };

        let leader = {
            let flights = flights.clone();
            let work = work(calls.clone(), gate.clone());
            tokio::spawn(async move { flights.run(9, work).await })
        };
        while flights.in_flight() == 0 {
            tokio::task::yield_now().await;
        }

        let follower = flights.run(9, work(calls.clone(), gate.clone()));
        assert!(tokio::time::timeout(Duration::from_millis(20), follower).await.is_err());
        assert_eq!(flights.in_flight(), 1);

        let late = {
            let flights = flights.clone();
            let work = work(calls.clone(), gate.clone());
            tokio::spawn(async move { flights.run(9, work).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_one();

        assert_eq!(leader.await.unwrap(), 1);
        assert_eq!(late.await.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }
}
