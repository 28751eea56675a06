//! # Matchday Testing
//!
//! Test support for matchday reducers: a given/when/then harness, a fixed
//! clock and a helper that runs effect descriptions by hand.
//!
//! ```ignore
//! use matchday_testing::{ReducerTest, assertions};
//!
//! ReducerTest::new(CatalogReducer::new())
//!     .with_env(env())
//!     .given_state(CatalogState::new(10))
//!     .when_action(CatalogAction::SetSearch { search: "derby".into() })
//!     .then_state(|state| assert_eq!(state.query.page, 1))
//!     .then_effects(assertions::assert_has_future_effect)
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use matchday_core::environment::Clock;


/// Deterministic stand-ins for environment capabilities
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// A clock stopped at one instant
    ///
    /// ```
    /// use matchday_core::environment::Clock;
    /// use matchday_testing::mocks::FixedClock;
    ///
    /// let clock = FixedClock::new(chrono::Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock(DateTime<Utc>);

    impl FixedClock {
        /// Stop the clock at `instant`
        #[must_use]
        pub const fn new(instant: DateTime<Utc>) -> Self {
            Self(instant)
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// New Year 2025, midnight UTC
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }
}

/// Running effects without a store
pub mod helpers {
    use matchday_core::effect::Effect;

    /// Await every effect and collect the actions they produce
    ///
    /// Parallel effects are flattened depth-first in declaration order, so
    /// the result is deterministic.
    pub async fn resolve_effects<A, I>(effects: I) -> Vec<A>
    where
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut stack: Vec<Effect<A>> = effects.into_iter().collect();
        stack.reverse();

        let mut actions = Vec::new();
        while let Some(effect) = stack.pop() {
            match effect {
                Effect::None => {},
                Effect::Parallel(inner) => stack.extend(inner.into_iter().rev()),
                Effect::Future(fut) => actions.extend(fut.await),
            }
        }
        actions
    }
}

pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
