//! # Matchday Core
//!
//! Shared building blocks of the matchday booking client.
//!
//! Each screen of the client (login, catalog, booking flow, history) is a
//! [`Reducer`](reducer::Reducer): a pure function from the current state and
//! an [`Action`](reducer::Reducer::Action) to the next state plus a list of
//! [`Effect`](effect::Effect)s. Effects only *describe* backend calls and
//! storage writes; the runtime executes them and feeds their results back
//! as new actions.
//!
//! Dependencies such as the backend client or the clock arrive through the
//! reducer's `Environment`, which is how tests swap in scripted doubles.
//!
//! ## Example
//!
//! ```ignore
//! use matchday_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for CatalogReducer {
//!     type State = CatalogState;
//!     type Action = CatalogAction;
//!     type Environment = CatalogEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CatalogState,
//!         action: CatalogAction,
//!         env: &CatalogEnvironment,
//!     ) -> SmallVec<[Effect<CatalogAction>; 4]> {
//!         match action {
//!             CatalogAction::SetPage { page } => {
//!                 state.query.page = page.max(1);
//!                 smallvec![Self::fetch(state, env)]
//!             }
//!             _ => smallvec![Effect::None],
//!         }
//!     }
//! }
//! ```

pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

/// Macros for building effects
pub mod effect_macros;

/// The reducer abstraction
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// State machine of one screen
    ///
    /// `reduce` must not perform I/O. Anything that talks to the outside
    /// world is returned as an [`Effect`].
    pub trait Reducer {
        /// State owned by the screen
        type State;

        /// User intents and I/O results
        type Action;

        /// Injected dependencies
        type Environment;

        /// Apply `action` to `state` and describe the follow-up work
        ///
        /// Nearly every action yields zero or one effect, so the result is
        /// kept inline.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect descriptions
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Boxed future resolving to an optional follow-up action
    pub type ActionFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Work a reducer asks the runtime to do
    pub enum Effect<Action> {
        /// Nothing to do
        None,

        /// Independent effects started together
        Parallel(Vec<Effect<Action>>),

        /// An async computation; `Some(action)` is reduced when it finishes
        Future(ActionFuture<Action>),
    }

    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => f.write_str("Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => f.write_str("Effect::Future(..)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Start several effects at once
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Rewrap the actions this effect produces
        ///
        /// A parent reducer that embeds a child uses this to lift the
        /// child's effects into its own action type.
        #[must_use]
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            Action: Send + 'static,
            B: Send + 'static,
            F: Fn(Action) -> B + Clone + Send + Sync + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => Effect::Parallel(
                    effects.into_iter().map(|effect| effect.map(f.clone())).collect(),
                ),
                Effect::Future(fut) => Effect::Future(Box::pin(async move { fut.await.map(f) })),
            }
        }

        /// Whether running this effect would do nothing
        #[must_use]
        pub fn is_none(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Parallel(effects) => effects.iter().all(Effect::is_none),
                Effect::Future(_) => false,
            }
        }
    }
}

/// Injected capabilities
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Source of the current time
    pub trait Clock: Send + Sync {
        /// Now, in UTC
        fn now(&self) -> DateTime<Utc>;
    }

    /// The system clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
