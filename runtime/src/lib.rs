//! # livetodo runtime
//!
//! The [`Store`] runtime that coordinates reducer execution and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: owns state, serializes reduction, executes effects on tokio
//! - **Effect execution**: futures, delays, live streams, cancellation scopes
//! - **Feedback loop**: actions produced by effects are reduced, then broadcast
//!
//! ## Example
//!
//! ```ignore
//! use livetodo_runtime::Store;
//!
//! let store = Store::new(initial_state, reducer, environment);
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use livetodo_core::{
    effect::{Effect, EffectId},
    reducer::Reducer,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

mod cancellation;

use cancellation::CancellationRegistry;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Effects did not finish in time
        ///
        /// Returned by [`EffectHandle::wait_with_timeout`](crate::EffectHandle::wait_with_timeout).
        #[error("Timeout waiting for effects")]
        Timeout,
    }
}

pub use error::StoreError;

/// Capacity of the action broadcast channel
const BROADCAST_CAPACITY: usize = 64;

/// How long [`Store::shutdown`] waits for in-flight effects
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects started by
/// that action. Futures, delays and sequences are tracked; live streams are
/// not, since they only end when cancelled.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Start).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // All effects from Action::Start are now complete
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Number of tracked effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all tracked effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker is gone, so every effect is done.
                break;
            }
        }
    }

    /// Wait for all tracked effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires first.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.pending())
            .finish_non_exhaustive()
    }
}

/// Internal: counter shared by the effects of one action
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    /// Marks one effect as started; the guard marks it finished on drop,
    /// including when the task is aborted or panics.
    fn start(&self) -> DecrementGuard {
        self.counter.fetch_add(1, Ordering::SeqCst);
        DecrementGuard(self.clone())
    }
}

struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        if self.0.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.0.notifier.send(());
        }
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, CancellationRegistry, Duration,
        BROADCAST_CAPACITY, Effect, EffectHandle, EffectId, EffectTracking, Ordering, Reducer,
        RwLock, SHUTDOWN_TIMEOUT, StoreError,
    };
    use futures::StreamExt;
    use std::future::Future;
    use tokio::sync::broadcast;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer and environment
    /// 3. Effect execution (with feedback loop)
    /// 4. Cancellation scopes for long-lived effects
    ///
    /// Cloning a store is cheap; clones share state and running effects.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        pub(crate) cancellations: CancellationRegistry,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Every action produced by an effect is broadcast here after it has
        /// been reduced, so observers reading state see its result.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            let (action_broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                cancellations: CancellationRegistry::default(),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
            }
        }

        /// Returns the injected environment
        #[must_use]
        pub fn environment(&self) -> &E {
            &self.environment
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Starts the returned effects before releasing the lock
        /// 4. Effects may produce more actions (feedback loop)
        ///
        /// Starting effects under the lock keeps cancellation ordered: a
        /// `Cancel` returned for a later action always sees the tasks
        /// registered by an earlier one.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::debug!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let mut state = self.state.write().await;

            let start = std::time::Instant::now();
            let effects = {
                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();
                self.reducer.reduce(&mut state, action, &self.environment)
            };
            metrics::histogram!("store.reducer.duration_seconds")
                .record(start.elapsed().as_secs_f64());

            tracing::trace!("Reducer returned {} effects", effects.len());
            for effect in effects {
                self.execute_effect(effect, &tracking, None);
            }
            drop(state);

            Ok(handle)
        }

        /// Subscribe to all actions produced by effects
        ///
        /// Only feedback actions are broadcast, not the ones passed to `send`.
        /// A lagging receiver skips old actions.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.todos.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Whether any task is still running under `id`
        #[must_use]
        pub fn is_running(&self, id: &EffectId) -> bool {
            self.cancellations.in_flight(id) > 0
        }

        /// Number of effect tasks currently running
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::SeqCst)
        }

        /// Gracefully shut down, waiting up to five seconds for effects
        ///
        /// # Errors
        ///
        /// See [`Store::shutdown_with_timeout`].
        pub async fn shutdown(&self) -> Result<(), StoreError> {
            self.shutdown_with_timeout(SHUTDOWN_TIMEOUT).await
        }

        /// Gracefully shut down the store
        ///
        /// 1. Rejects new actions
        /// 2. Cancels every long-lived effect (live queries, session watches)
        /// 3. Waits for in-flight futures to finish
        ///
        /// Calling it twice is harmless.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
        /// when the timeout elapses.
        pub async fn shutdown_with_timeout(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            self.shutdown.store(true, Ordering::Release);

            let cancelled = self.cancellations.cancel_all();
            if cancelled > 0 {
                tracing::debug!(cancelled, "Cancelled long-lived effects");
                #[allow(clippy::cast_possible_truncation)]
                metrics::counter!("store.effects.cancelled").increment(cancelled as u64);
            }

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);
                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timed out");
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Reduces an action produced by an effect, then broadcasts it
        async fn feed_back(&self, action: A) {
            match self.send(action.clone()).await {
                Ok(_) => {
                    // No receivers is fine
                    let _ = self.action_broadcast.send(action);
                },
                Err(error) => tracing::debug!(%error, "Dropped feedback action"),
            }
        }

        fn pending_guard(&self) -> AtomicCounterGuard {
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            AtomicCounterGuard(Arc::clone(&self.pending_effects))
        }

        fn spawn<F>(&self, scope: Option<&EffectId>, detached: bool, fut: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            let handle = tokio::spawn(fut);
            if scope.is_some() || detached {
                self.cancellations.register(scope, handle.abort_handle());
            }
        }

        fn cancel(&self, id: &EffectId) {
            let cancelled = self.cancellations.cancel(id);
            if cancelled > 0 {
                tracing::debug!(effect_id = %id, cancelled, "Cancelled effect");
                #[allow(clippy::cast_possible_truncation)]
                metrics::counter!("store.effects.cancelled").increment(cancelled as u64);
            }
        }

        /// Execute an effect
        ///
        /// Synchronous: it only spawns tasks and touches the cancellation
        /// registry, so it can run while the state lock is held.
        #[allow(clippy::needless_pass_by_value)]
        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking, scope: Option<&EffectId>) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let guard = tracking.start();
                    let pending = self.pending_guard();
                    let store = self.clone();

                    self.spawn(scope, false, async move {
                        let _guard = guard;
                        let _pending = pending;
                        if let Some(action) = fut.await {
                            store.feed_back(action).await;
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let guard = tracking.start();
                    let pending = self.pending_guard();
                    let store = self.clone();

                    self.spawn(scope, false, async move {
                        let _guard = guard;
                        let _pending = pending;
                        tokio::time::sleep(duration).await;
                        store.feed_back(*action).await;
                    });
                },
                Effect::Stream(mut stream) => {
                    metrics::counter!("store.effects.executed", "type" => "stream").increment(1);
                    let pending = self.pending_guard();
                    let store = self.clone();

                    self.spawn(scope, scope.is_none(), async move {
                        let _pending = pending;
                        while let Some(action) = stream.next().await {
                            if store.shutdown.load(Ordering::Acquire) {
                                break;
                            }
                            store.feed_back(action).await;
                        }
                        tracing::trace!("Effect::Stream ended");
                    });
                },
                Effect::Parallel(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking, scope);
                    }
                },
                Effect::Sequential(effects) => {
                    metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
                    let guard = tracking.start();
                    let pending = self.pending_guard();
                    let store = self.clone();
                    let scope_owned = scope.cloned();

                    self.spawn(scope, false, async move {
                        let _guard = guard;
                        let _pending = pending;
                        for effect in effects {
                            let (mut step, step_tracking) = EffectHandle::new();
                            store.execute_effect(effect, &step_tracking, scope_owned.as_ref());
                            drop(step_tracking);
                            step.wait().await;
                        }
                    });
                },
                Effect::Cancellable { id, effect } => {
                    self.cancel(&id);
                    self.execute_effect(*effect, tracking, Some(&id));
                },
                Effect::Cancel(id) => self.cancel(&id),
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
        A: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                cancellations: self.cancellations.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
