//! Single-flight coalescing of concurrent loads for the same key.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::counter;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

const METRIC_COALESCED: &str = "feddit_requests_coalesced_total";

type Slot<V, E> = watch::Receiver<Option<Result<V, E>>>;

/// The producer for a key stopped without publishing an outcome.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("in-flight load ended without producing a result")]
pub struct Abandoned;

/// Runs at most one producer per key; concurrent callers for the same key
/// share its outcome.
///
/// The producer is spawned on its own task, so cancelling any caller
/// (including the one that started it) never cancels the load or leaves the
/// others waiting forever.
pub struct RequestCoalescer<K, V, E> {
    inflight: Arc<DashMap<K, Slot<V, E>>>,
}

impl<K, V, E> Default for RequestCoalescer<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

enum Role<V, E> {
    Leader(watch::Sender<Option<Result<V, E>>>, Slot<V, E>),
    Follower(Slot<V, E>),
}

impl<K, V, E> RequestCoalescer<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + From<Abandoned> + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a load in progress.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Return the outcome of `producer` for `key`, invoking it only if no
    /// load for `key` is already running.
    pub async fn run<F, Fut>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let role = match self.inflight.entry(key.clone()) {
            Entry::Occupied(occupied) => Role::Follower(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let (sender, receiver) = watch::channel(None);
                vacant.insert(receiver.clone());
                Role::Leader(sender, receiver)
            }
        };

        let mut receiver = match role {
            Role::Follower(receiver) => {
                counter!(METRIC_COALESCED).increment(1);
                debug!("Joined in-flight load");
                receiver
            }
            Role::Leader(sender, receiver) => {
                let release = Release {
                    key,
                    slot: receiver.clone(),
                    inflight: Arc::clone(&self.inflight),
                };
                let load = producer();
                tokio::spawn(async move {
                    let outcome = load.await;
                    // Unregister before publishing so that a caller arriving
                    // afterwards starts a fresh load.
                    drop(release);
                    let _ = sender.send(Some(outcome));
                });
                receiver
            }
        };

        let outcome = match receiver.wait_for(Option::is_some).await {
            Ok(published) => (*published).clone(),
            Err(_) => None,
        };

        outcome.unwrap_or_else(|| {
            warn!("In-flight load abandoned");
            Err(E::from(Abandoned))
        })
    }
}

/// Removes the key on drop, including when the producer task panics.
struct Release<K, V, E>
where
    K: Eq + Hash,
{
    key: K,
    slot: Slot<V, E>,
    inflight: Arc<DashMap<K, Slot<V, E>>>,
}

impl<K, V, E> Drop for Release<K, V, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.inflight
            .remove_if(&self.key, |_, current| current.same_channel(&self.slot));
    }
}
