//! Reducer composition.
//!
//! A feature reducer owns a slice of state, its own action enum and its own
//! environment. [`scope_reducer`] lifts it into a parent so several features
//! can share one store:
//!
//! - state is focused through a `&mut` lens (no cloning of the slice)
//! - parent actions are filtered down to the feature's actions
//! - the feature's effects are mapped back into parent actions
//! - the environment is focused through a `&` lens
//!
//! # Example
//!
//! ```
//! use livetodo_core::composition::scope_reducer;
//! use livetodo_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Default)]
//! struct Draft {
//!     text: String,
//! }
//!
//! enum DraftAction {
//!     Type(char),
//! }
//!
//! struct DraftReducer;
//!
//! impl Reducer for DraftReducer {
//!     type State = Draft;
//!     type Action = DraftAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut Draft, action: DraftAction, _env: &()) -> SmallVec<[Effect<DraftAction>; 4]> {
//!         match action {
//!             DraftAction::Type(c) => state.text.push(c),
//!         }
//!         smallvec![]
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Screen {
//!     draft: Draft,
//! }
//!
//! enum ScreenAction {
//!     Draft(DraftAction),
//!     Refresh,
//! }
//!
//! let scoped = scope_reducer(
//!     DraftReducer,
//!     |screen: &mut Screen| &mut screen.draft,
//!     |action: ScreenAction| match action {
//!         ScreenAction::Draft(action) => Some(action),
//!         ScreenAction::Refresh => None,
//!     },
//!     ScreenAction::Draft,
//!     |env: &()| env,
//! );
//!
//! let mut screen = Screen::default();
//! let _ = scoped.reduce(&mut screen, ScreenAction::Draft(DraftAction::Type('a')), &());
//! let _ = scoped.reduce(&mut screen, ScreenAction::Refresh, &());
//! assert_eq!(screen.draft.text, "a");
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// Scopes a reducer to operate on a subset of a larger state and action space.
///
/// Actions that `to_child` maps to `None` are ignored and produce no effects.
pub fn scope_reducer<S, SubS, A, SubA, E, SubE, R>(
    reducer: R,
    state: fn(&mut S) -> &mut SubS,
    to_child: fn(A) -> Option<SubA>,
    from_child: fn(SubA) -> A,
    env: fn(&E) -> &SubE,
) -> ScopedReducer<S, SubS, A, SubA, E, SubE, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = SubE>,
{
    ScopedReducer {
        reducer,
        state,
        to_child,
        from_child,
        env,
    }
}

/// A reducer lifted into a parent state/action/environment.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, A, SubA, E, SubE, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = SubE>,
{
    reducer: R,
    state: fn(&mut S) -> &mut SubS,
    to_child: fn(A) -> Option<SubA>,
    from_child: fn(SubA) -> A,
    env: fn(&E) -> &SubE,
}

impl<S, SubS, A, SubA, E, SubE, R> ScopedReducer<S, SubS, A, SubA, E, SubE, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = SubE>,
{
    /// Returns the wrapped feature reducer
    #[must_use]
    pub const fn inner(&self) -> &R {
        &self.reducer
    }
}

impl<S, SubS, A, SubA, E, SubE, R> Clone for ScopedReducer<S, SubS, A, SubA, E, SubE, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = SubE> + Clone,
{
    fn clone(&self) -> Self {
        Self {
            reducer: self.reducer.clone(),
            state: self.state,
            to_child: self.to_child,
            from_child: self.from_child,
            env: self.env,
        }
    }
}

impl<S, SubS, A, SubA, E, SubE, R> Reducer for ScopedReducer<S, SubS, A, SubA, E, SubE, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = SubE>,
    A: Send + 'static,
    SubA: Send + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let Some(child_action) = (self.to_child)(action) else {
            return SmallVec::new();
        };

        let from_child = self.from_child;
        self.reducer
            .reduce((self.state)(state), child_action, (self.env)(env))
            .into_iter()
            .filter(|effect| !effect.is_none())
            .map(|effect| effect.map(from_child))
            .collect()
    }
}
