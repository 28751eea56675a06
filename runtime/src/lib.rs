//! # Matchday Runtime
//!
//! The [`Store`] owns one screen's state, runs its reducer for every action
//! and drives the returned effects on tokio.
//!
//! Actions produced by effects take a round trip through the store: they
//! are reduced first and then published on a broadcast channel, so anyone
//! holding a receiver from [`Store::subscribe_actions`] can read the state
//! an action produced as soon as it arrives. Actions sent from outside via
//! [`Store::send`] are reduced but not published.
//!
//! ```ignore
//! use matchday_runtime::Store;
//!
//! let catalog = Store::new(CatalogState::new(50), CatalogReducer::new(), env).named("catalog");
//! let mut updates = catalog.subscribe_actions();
//!
//! catalog.send(CatalogAction::Query).await?;
//! while let Ok(action) = updates.recv().await {
//!     if matches!(action, CatalogAction::Loaded { .. }) {
//!         break;
//!     }
//! }
//! let shown = catalog.state(|s| s.events().len()).await;
//! ```

use matchday_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Notify, RwLock, broadcast};
use tracing::Instrument;

/// Broadcast buffer used by [`Store::new`]
pub const DEFAULT_BROADCAST_CAPACITY: usize = 16;

/// Store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// [`Store::shutdown`] was called; no new actions are accepted
    #[error("store `{0}` is shut down")]
    ShutDown(&'static str),

    /// Effects were still running when the shutdown deadline passed
    #[error("store `{store}` shut down with {pending} effects still running")]
    ShutdownTimeout {
        /// Store name
        store: &'static str,
        /// Effects left running
        pending: usize,
    },

    /// No matching action arrived in time
    #[error("timed out waiting for an action")]
    Timeout,

    /// Every sender of the action broadcast is gone
    #[error("action broadcast closed")]
    ChannelClosed,
}

/// Count of running effect tasks with a wake-up when it drops to zero
#[derive(Debug, Default)]
struct InFlight {
    running: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn count(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    /// Resolve once nothing is running
    async fn settled(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            // Register before checking so a finish in between is not missed
            idle.as_mut().enable();
            if self.count() == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Marks one effect task as running until dropped
///
/// The count is released even when the effect panics.
struct Running(Vec<Arc<InFlight>>);

impl Running {
    fn start(counters: Vec<Arc<InFlight>>) -> Self {
        for counter in &counters {
            counter.running.fetch_add(1, Ordering::AcqRel);
        }
        Self(counters)
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        for counter in &self.0 {
            if counter.running.fetch_sub(1, Ordering::AcqRel) == 1 {
                counter.idle.notify_waiters();
            }
        }
    }
}

/// Completion of the effects started by one [`Store::send`]
///
/// Covers those effects and the reduction of the actions they feed back,
/// but not the effects that those actions start in turn.
#[derive(Clone, Debug)]
pub struct EffectHandle(Arc<InFlight>);

impl EffectHandle {
    /// Wait until the effects finished
    pub async fn wait(&self) {
        self.0.settled().await;
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.0.count()
    }
}

/// Runtime for one reducer
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    name: &'static str,
    state: Arc<RwLock<S>>,
    reducer: R,
    environment: E,
    closed: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
    actions: broadcast::Sender<A>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Store with a [`DEFAULT_BROADCAST_CAPACITY`] action buffer
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_broadcast_capacity(initial_state, reducer, environment, DEFAULT_BROADCAST_CAPACITY)
    }

    /// Store whose observers may fall `capacity` actions behind
    #[must_use]
    pub fn with_broadcast_capacity(
        initial_state: S,
        reducer: R,
        environment: E,
        capacity: usize,
    ) -> Self {
        let (actions, _) = broadcast::channel(capacity.max(1));
        Self {
            name: "store",
            state: Arc::new(RwLock::new(initial_state)),
            reducer,
            environment,
            closed: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(InFlight::default()),
            actions,
        }
    }

    /// Name used in logs and metric labels
    #[must_use]
    pub const fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// The store's name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Reduce `action` and start its effects
    ///
    /// Returns once the state is updated; the effects keep running. Await
    /// the returned [`EffectHandle`] to wait for them.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutDown`] after [`Store::shutdown`]
    #[tracing::instrument(skip_all, name = "store_send", fields(store = self.name))]
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        if self.closed.load(Ordering::Acquire) {
            tracing::warn!(store = self.name, "Action rejected after shutdown");
            return Err(StoreError::ShutDown(self.name));
        }
        metrics::counter!("matchday_store_actions_total", "store" => self.name).increment(1);

        let effects = {
            let mut state = self.state.write().await;
            let started = Instant::now();
            let effects = self.reducer.reduce(&mut state, action, &self.environment);
            metrics::histogram!("matchday_store_reduce_seconds", "store" => self.name)
                .record(started.elapsed().as_secs_f64());
            tracing::trace!(effects = effects.len(), "Reduced");
            effects
        };

        let handle = Arc::new(InFlight::default());
        for effect in effects {
            self.spawn_effect(effect, &handle);
        }
        Ok(EffectHandle(handle))
    }

    /// Send `action`, then wait for the first published action matching `predicate`
    ///
    /// The subscription is taken before sending, so a fast effect cannot
    /// slip past.
    ///
    /// # Errors
    ///
    /// [`StoreError::Timeout`] if nothing matched within `timeout`,
    /// [`StoreError::ChannelClosed`] if the broadcast closed and
    /// [`StoreError::ShutDown`] if the store no longer accepts actions.
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        let mut updates = self.actions.subscribe();
        self.send(action).await?;

        let matched = async {
            loop {
                match updates.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(store = self.name, skipped, "Observer fell behind");
                    },
                    Err(broadcast::error::RecvError::Closed) => return Err(StoreError::ChannelClosed),
                }
            }
        };
        tokio::time::timeout(timeout, matched)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Follow every action produced by effects
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.actions.subscribe()
    }

    /// Read from the current state
    pub async fn state<F, T>(&self, read: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        read(&*self.state.read().await)
    }

    /// Stop accepting actions and wait for running effects
    ///
    /// Effects still running after `timeout` are left to finish on their
    /// own; the actions they produce are dropped.
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownTimeout`] if effects outlived `timeout`
    #[tracing::instrument(skip(self), fields(store = self.name))]
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        tracing::debug!(store = self.name, pending = self.in_flight.count(), "Shutting down");

        if tokio::time::timeout(timeout, self.in_flight.settled()).await.is_ok() {
            return Ok(());
        }
        let pending = self.in_flight.count();
        tracing::warn!(store = self.name, pending, "Shutdown deadline passed");
        Err(StoreError::ShutdownTimeout {
            store: self.name,
            pending,
        })
    }

    fn spawn_effect(&self, effect: Effect<A>, handle: &Arc<InFlight>) {
        match effect {
            Effect::None => {},
            Effect::Parallel(effects) => {
                for effect in effects {
                    self.spawn_effect(effect, handle);
                }
            },
            Effect::Future(fut) => {
                metrics::counter!("matchday_store_effects_total", "store" => self.name).increment(1);
                let running = Running::start(vec![Arc::clone(handle), Arc::clone(&self.in_flight)]);
                let store = self.clone();
                let span = tracing::debug_span!("effect", store = self.name);

                tokio::spawn(
                    async move {
                        let _running = running;
                        if let Some(action) = fut.await {
                            store.feed_back(action).await;
                        }
                    }
                    .instrument(span),
                );
            },
        }
    }

    /// Reduce an effect's action, then publish it
    async fn feed_back(&self, action: A) {
        match self.send(action.clone()).await {
            Ok(_) => {
                // No receivers is fine
                let _ = self.actions.send(action);
            },
            Err(error) => tracing::debug!(%error, "Dropping effect result"),
        }
    }
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            state: Arc::clone(&self.state),
            reducer: self.reducer.clone(),
            environment: self.environment.clone(),
            closed: Arc::clone(&self.closed),
            in_flight: Arc::clone(&self.in_flight),
            actions: self.actions.clone(),
        }
    }
}

impl<S, A, E, R> std::fmt::Debug for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("running_effects", &self.in_flight.count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use matchday_core::{SmallVec, async_effect, smallvec};

    /// Tickets held in a basket; `Reserve` asks a slow backend first
    #[derive(Clone, Debug, Default)]
    struct Basket {
        tickets: u32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum BasketAction {
        Add(u32),
        Reserve(u32),
        ReserveBoth(u32, u32),
        Reserved(u32),
        Chain(u32),
        Crash,
    }

    #[derive(Clone)]
    struct BasketReducer;

    impl Reducer for BasketReducer {
        type State = Basket;
        type Action = BasketAction;
        type Environment = Duration;

        fn reduce(
            &self,
            basket: &mut Basket,
            action: BasketAction,
            latency: &Duration,
        ) -> SmallVec<[Effect<BasketAction>; 4]> {
            let reserve = |count: u32| {
                let latency = *latency;
                async_effect! {
                    tokio::time::sleep(latency).await;
                    Some(BasketAction::Reserved(count))
                }
            };
            match action {
                BasketAction::Add(count) | BasketAction::Reserved(count) => {
                    basket.tickets += count;
                    smallvec![Effect::None]
                },
                BasketAction::Reserve(count) => smallvec![reserve(count)],
                BasketAction::ReserveBoth(first, second) => {
                    smallvec![Effect::merge(vec![reserve(first), reserve(second)])]
                },
                BasketAction::Chain(count) => smallvec![async_effect! {
                    Some(BasketAction::Reserve(count))
                }],
                BasketAction::Crash => smallvec![async_effect! {
                    let reply: Option<BasketAction> = None;
                    assert!(reply.is_some(), "backend exploded");
                    reply
                }],
            }
        }
    }

    fn basket(latency: Duration) -> Store<Basket, BasketAction, Duration, BasketReducer> {
        Store::new(Basket::default(), BasketReducer, latency).named("basket")
    }

    #[tokio::test]
    async fn test_direct_actions_apply_immediately() {
        let store = basket(Duration::ZERO);
        store.send(BasketAction::Add(2)).await.unwrap();
        store.send(BasketAction::Add(3)).await.unwrap();
        assert_eq!(store.state(|b| b.tickets).await, 5);
    }

    #[tokio::test]
    async fn test_handle_covers_fed_back_reduction() {
        let store = basket(Duration::from_millis(5));
        let handle = store.send(BasketAction::Reserve(2)).await.unwrap();
        assert_eq!(store.state(|b| b.tickets).await, 0);

        tokio::time::timeout(Duration::from_secs(1), handle.wait()).await.unwrap();
        assert_eq!(handle.pending(), 0);
        assert_eq!(store.state(|b| b.tickets).await, 2);
    }

    #[tokio::test]
    async fn test_handle_does_not_cover_cascaded_effects() {
        let store = basket(Duration::from_millis(200));
        let handle = store.send(BasketAction::Chain(2)).await.unwrap();

        // Reserve was reduced, its slow effect is still running
        tokio::time::timeout(Duration::from_millis(150), handle.wait()).await.unwrap();
        assert_eq!(store.state(|b| b.tickets).await, 0);

        tokio::time::timeout(Duration::from_secs(2), async {
            while store.state(|b| b.tickets).await != 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_parallel_effects_all_feed_back() {
        let store = basket(Duration::from_millis(1));
        let handle = store.send(BasketAction::ReserveBoth(1, 4)).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle.wait()).await.unwrap();
        assert_eq!(store.state(|b| b.tickets).await, 5);
    }

    #[tokio::test]
    async fn test_panicking_effect_is_contained() {
        let store = basket(Duration::ZERO);
        let handle = store.send(BasketAction::Crash).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle.wait()).await.unwrap();

        store.send(BasketAction::Add(1)).await.unwrap();
        assert_eq!(store.state(|b| b.tickets).await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_state_and_name() {
        let store = basket(Duration::ZERO);
        let other = store.clone();
        other.send(BasketAction::Add(1)).await.unwrap();
        assert_eq!(store.state(|b| b.tickets).await, 1);
        assert_eq!(other.name(), "basket");
    }

    #[tokio::test]
    async fn test_shutdown_waits_then_rejects() {
        let store = basket(Duration::from_millis(10));
        store.send(BasketAction::Reserve(3)).await.unwrap();

        store.shutdown(Duration::from_secs(1)).await.unwrap();

        assert_eq!(
            store.send(BasketAction::Add(1)).await.unwrap_err(),
            StoreError::ShutDown("basket")
        );
        assert_eq!(store.state(|b| b.tickets).await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_reports_stragglers() {
        let store = basket(Duration::from_secs(60));
        store.send(BasketAction::Reserve(1)).await.unwrap();

        let error = store.shutdown(Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(
            error,
            StoreError::ShutdownTimeout {
                store: "basket",
                pending: 1
            }
        );
    }
}
