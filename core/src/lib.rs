//! # livetodo core
//!
//! Core traits and types for the livetodo client.
//!
//! The client is organised as a unidirectional data flow:
//!
//! - **State**: plain owned data for a feature (the session, the todo list)
//! - **Action**: every input a feature reacts to, user intents and provider results alike
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`, synchronous and pure
//! - **Effect**: a description of asynchronous work (a provider call, a live query)
//! - **Environment**: the injected providers and clock
//!
//! Reducers never perform I/O. They return effects, the runtime executes them and
//! feeds resulting actions back into the reducer.
//!
//! ## Example
//!
//! ```
//! use livetodo_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Default)]
//! struct Checklist {
//!     done: Vec<bool>,
//! }
//!
//! enum ChecklistAction {
//!     Add,
//!     Check(usize),
//! }
//!
//! struct ChecklistReducer;
//!
//! impl Reducer for ChecklistReducer {
//!     type State = Checklist;
//!     type Action = ChecklistAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut Checklist,
//!         action: ChecklistAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<ChecklistAction>; 4]> {
//!         match action {
//!             ChecklistAction::Add => state.done.push(false),
//!             ChecklistAction::Check(index) => {
//!                 if let Some(done) = state.done.get_mut(index) {
//!                     *done = true;
//!                 }
//!             },
//!         }
//!         smallvec![]
//!     }
//! }
//!
//! let mut state = Checklist::default();
//! let _ = ChecklistReducer.reduce(&mut state, ChecklistAction::Add, &());
//! let _ = ChecklistReducer.reduce(&mut state, ChecklistAction::Check(0), &());
//! assert_eq!(state.done, vec![true]);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// Reducer scoping: lift a feature reducer into a parent state/action
pub mod composition;

/// Reducer module - The core trait for client logic
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for client logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state slice this reducer owns
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates state in place and returns descriptions of the
        /// asynchronous work to run. Must not block or perform I/O.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects are values. The runtime decides when and where they run.
pub mod effect {
    use futures::{Stream, StreamExt};
    use std::borrow::Cow;
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// Boxed future produced by [`Effect::Future`]
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Boxed stream produced by [`Effect::Stream`]
    pub type EffectStream<Action> = Pin<Box<dyn Stream<Item = Action> + Send>>;

    /// Identifier for a cancellable effect
    ///
    /// At most one effect is in flight per identifier: registering a new
    /// [`Effect::Cancellable`] under an id cancels whatever was running under it.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct EffectId(Cow<'static, str>);

    impl EffectId {
        /// Creates an id from a static name
        #[must_use]
        pub const fn new(id: &'static str) -> Self {
            Self(Cow::Borrowed(id))
        }

        /// Creates an id from a runtime string
        #[must_use]
        pub fn owned(id: impl Into<String>) -> Self {
            Self(Cow::Owned(id.into()))
        }

        /// Returns the id as a string slice
        #[must_use]
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially, each one finishing before the next starts
        Sequential(Vec<Effect<Action>>),

        /// Delayed action
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(EffectFuture<Action>),

        /// Long-lived source of actions (live queries, session watches)
        ///
        /// Every item is fed back into the reducer until the stream ends or
        /// the effect is cancelled.
        Stream(EffectStream<Action>),

        /// Runs `effect` under `id` so a later [`Effect::Cancel`] can stop it
        Cancellable {
            /// Cancellation key
            id: EffectId,
            /// The effect to run
            effect: Box<Effect<Action>>,
        },

        /// Cancels everything currently running under the given id
        Cancel(EffectId),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Stream(_) => write!(f, "Effect::Stream(<stream>)"),
                Effect::Cancellable { id, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Wraps an async block that may produce a follow-up action
        #[must_use]
        pub fn future<F>(fut: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(fut))
        }

        /// Marks this effect as cancellable under `id`
        #[must_use]
        pub fn cancellable(self, id: EffectId) -> Effect<Action> {
            Effect::Cancellable {
                id,
                effect: Box::new(self),
            }
        }

        /// Returns `true` for [`Effect::None`]
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// Transforms every action this effect can produce
        ///
        /// Used to embed a feature's effects into a parent action type.
        #[must_use]
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            F: Fn(Action) -> B + Send + Sync + 'static,
            Action: Send + 'static,
            B: Send + 'static,
        {
            self.map_shared(&Arc::new(f))
        }

        fn map_shared<B, F>(self, f: &Arc<F>) -> Effect<B>
        where
            F: Fn(Action) -> B + Send + Sync + 'static,
            Action: Send + 'static,
            B: Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => {
                    Effect::Parallel(effects.into_iter().map(|e| e.map_shared(f)).collect())
                },
                Effect::Sequential(effects) => {
                    Effect::Sequential(effects.into_iter().map(|e| e.map_shared(f)).collect())
                },
                Effect::Delay { duration, action } => Effect::Delay {
                    duration,
                    action: Box::new((**f)(*action)),
                },
                Effect::Future(fut) => {
                    let f = Arc::clone(f);
                    Effect::Future(Box::pin(async move { fut.await.map(|action| (*f)(action)) }))
                },
                Effect::Stream(stream) => {
                    let f = Arc::clone(f);
                    Effect::Stream(Box::pin(stream.map(move |action| (*f)(action))))
                },
                Effect::Cancellable { id, effect } => Effect::Cancellable {
                    id,
                    effect: Box::new(effect.map_shared(f)),
                },
                Effect::Cancel(id) => Effect::Cancel(id),
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
