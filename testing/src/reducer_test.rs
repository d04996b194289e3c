//! Given/When/Then harness for reducers.
//!
//! Reducers are pure, so a test only needs a state, an environment and a list
//! of actions; effects are inspected as values and never executed.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use livetodo_core::{effect::Effect, reducer::Reducer};

type StateAssertion<S> = Box<dyn FnOnce(&S)>;

type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Builder that reduces a sequence of actions and checks the outcome
///
/// # Example
///
/// ```ignore
/// use livetodo_testing::ReducerTest;
///
/// ReducerTest::new(SessionReducer)
///     .with_env(test_environment())
///     .given_state(SessionState::default())
///     .when_action(SessionAction::LogOut)
///     .then_state(|state| assert!(state.loading))
///     .then_effects(|effects| assert_eq!(effects.len(), 1))
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Starts a test for `reducer`
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Environment handed to every `reduce` call
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// State before the first action (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Apply an action before the one under test (Given)
    ///
    /// Effects from these actions are discarded.
    #[must_use]
    pub fn given_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Set the action to test (When)
    ///
    /// Only the effects of this last action reach `then_effects`.
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Check on the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Check on the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Reduces every action in order, then runs the checks
    ///
    /// # Panics
    ///
    /// Panics when state, environment or action is missing, and whenever a
    /// check fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        assert!(
            !self.actions.is_empty(),
            "Action must be set with when_action()"
        );

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Effect checks for use inside `then_effects`
///
/// Assertions look through [`Effect::Parallel`], [`Effect::Sequential`] and
/// [`Effect::Cancellable`] wrappers.
pub mod assertions {
    use livetodo_core::effect::{Effect, EffectId};

    fn any<A>(effects: &[Effect<A>], pred: &dyn Fn(&Effect<A>) -> bool) -> bool {
        effects.iter().any(|effect| {
            pred(effect)
                || match effect {
                    Effect::Parallel(inner) | Effect::Sequential(inner) => any(inner, pred),
                    Effect::Cancellable { effect, .. } => any(std::slice::from_ref(&**effect), pred),
                    _ => false,
                }
        })
    }

    /// Nothing to run: empty, or only `Effect::None`
    ///
    /// # Panics
    ///
    /// Panics on any other effect.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "expected no effects, got {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Exactly `expected` top-level effects
    ///
    /// # Panics
    ///
    /// Panics on a different count.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "expected {expected} effects, got {}",
            effects.len()
        );
    }

    /// At least one future, possibly wrapped
    ///
    /// # Panics
    ///
    /// Panics when there is none.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            any(effects, &|e| matches!(e, Effect::Future(_))),
            "expected a future effect, found none"
        );
    }

    /// Assert that a Stream effect is started under `id`
    ///
    /// # Panics
    ///
    /// Panics if no matching cancellable stream is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_starts_stream<A>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            any(effects, &|e| matches!(
                e,
                Effect::Cancellable { id: found, effect } if found == id && matches!(**effect, Effect::Stream(_))
            )),
            "expected a stream started under {id}, found none"
        );
    }

    /// Assert that effects cancel `id`
    ///
    /// # Panics
    ///
    /// Panics if no `Cancel(id)` is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_cancels<A>(effects: &[Effect<A>], id: &EffectId) {
        assert!(
            any(effects, &|e| matches!(e, Effect::Cancel(found) if found == id)),
            "expected Cancel({id}), found none"
        );
    }
}

/// Resolves effects in tests without a store
pub mod helpers {
    use livetodo_core::effect::Effect;

    /// Awaits every future and delay in `effects`, collecting produced actions
    ///
    /// Streams and cancellations are skipped; wrappers are flattened in order.
    pub async fn resolve_futures<A>(effects: Vec<Effect<A>>) -> Vec<A> {
        let mut actions = Vec::new();
        let mut queue: std::collections::VecDeque<Effect<A>> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Future(fut) => actions.extend(fut.await),
                Effect::Delay { action, .. } => actions.push(*action),
                Effect::Parallel(inner) | Effect::Sequential(inner) => {
                    for (i, effect) in inner.into_iter().enumerate() {
                        queue.insert(i, effect);
                    }
                },
                Effect::Cancellable { effect, .. } => queue.push_front(*effect),
                Effect::None | Effect::Stream(_) | Effect::Cancel(_) => {},
            }
        }
        actions
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic
mod tests {
    use super::*;
    use livetodo_core::effect::{Effect, EffectId};
    use livetodo_core::{SmallVec, smallvec};

    #[derive(Clone, Debug, Default)]
    struct Checklist {
        items: Vec<String>,
        following: bool,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum ChecklistAction {
        Add(String),
        Clear,
        Follow,
        Unfollow,
        Sync,
    }

    const FEED: EffectId = EffectId::new("checklist.feed");

    struct ChecklistReducer;

    struct NoEnv;

    impl Reducer for ChecklistReducer {
        type State = Checklist;
        type Action = ChecklistAction;
        type Environment = NoEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                ChecklistAction::Add(item) => {
                    state.items.push(item);
                    smallvec![Effect::None]
                },
                ChecklistAction::Clear => {
                    state.items.clear();
                    smallvec![]
                },
                ChecklistAction::Follow => {
                    state.following = true;
                    smallvec![Effect::Stream(Box::pin(futures::stream::empty())).cancellable(FEED)]
                },
                ChecklistAction::Unfollow => {
                    state.following = false;
                    smallvec![Effect::Cancel(FEED)]
                },
                ChecklistAction::Sync => smallvec![Effect::Parallel(vec![
                    Effect::future(async { Some(ChecklistAction::Add("eggs".to_string())) }),
                    Effect::future(async { Some(ChecklistAction::Clear) }),
                ])],
            }
        }
    }

    fn checklist() -> ReducerTest<ChecklistReducer, Checklist, ChecklistAction, NoEnv> {
        ReducerTest::new(ChecklistReducer)
            .with_env(NoEnv)
            .given_state(Checklist::default())
    }

    #[test]
    fn test_state_after_single_action() {
        checklist()
            .when_action(ChecklistAction::Add("milk".to_string()))
            .then_state(|state| assert_eq!(state.items, vec!["milk"]))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_given_actions_run_before_the_last_one() {
        checklist()
            .given_action(ChecklistAction::Add("milk".to_string()))
            .given_action(ChecklistAction::Follow)
            .when_action(ChecklistAction::Add("bread".to_string()))
            .then_state(|state| {
                assert_eq!(state.items, vec!["milk", "bread"]);
                assert!(state.following);
            })
            // The stream from Follow is not reported
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_stream_and_cancel_checks() {
        checklist()
            .when_action(ChecklistAction::Follow)
            .then_effects(|effects| assertions::assert_starts_stream(effects, &FEED))
            .run();

        checklist()
            .given_action(ChecklistAction::Follow)
            .when_action(ChecklistAction::Unfollow)
            .then_state(|state| assert!(!state.following))
            .then_effects(|effects| assertions::assert_cancels(effects, &FEED))
            .run();
    }

    #[test]
    fn test_futures_are_found_inside_parallel() {
        checklist()
            .when_action(ChecklistAction::Sync)
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn test_resolve_futures_keeps_order() {
        let mut state = Checklist::default();
        let effects = ChecklistReducer.reduce(&mut state, ChecklistAction::Sync, &NoEnv);
        let actions = tokio_test::block_on(helpers::resolve_futures(effects.into_vec()));
        assert_eq!(
            actions,
            vec![ChecklistAction::Add("eggs".to_string()), ChecklistAction::Clear]
        );
    }

    #[test]
    #[should_panic(expected = "expected Cancel(checklist.feed)")]
    fn test_missing_cancel_panics() {
        checklist()
            .when_action(ChecklistAction::Follow)
            .then_effects(|effects| assertions::assert_cancels(effects, &FEED))
            .run();
    }
}
