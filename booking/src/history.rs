//! Booking history view-model
//!
//! Paginated, filterable list of the user's past orders plus a detail view
//! with the reconstructed price breakdown and a printable receipt.

use crate::api::BookingApi;
use crate::error::BookingError;
use crate::pricing::{PriceBreakdown, reconstruct};
use crate::receipt::Receipt;
use crate::types::{BookingHistoryEntry, HistoryFilter, HistoryQuery, HistorySort, Page};
use matchday_core::environment::Clock;
use matchday_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use std::sync::Arc;

/// An opened history entry
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryDetail {
    /// The booking
    pub entry: BookingHistoryEntry,
    /// Breakdown rebuilt from the recorded amounts
    pub breakdown: PriceBreakdown,
    /// Receipt ready for export
    pub receipt: Receipt,
    /// Whether the event is still ahead
    pub upcoming: bool,
}

/// History state
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryState {
    /// Current query
    pub query: HistoryQuery,
    /// Last page received
    pub page: Option<Page<BookingHistoryEntry>>,
    /// A request is in flight
    pub loading: bool,
    /// Last failure
    pub error: Option<BookingError>,
    /// Generation of the latest request
    pub generation: u64,
    /// Open detail view
    pub selected: Option<HistoryDetail>,
    /// Whether the view is showing; cleared when the session is revoked
    pub mounted: bool,
}

impl HistoryState {
    /// Empty history with the given page size
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            query: HistoryQuery::first_page(page_size),
            page: None,
            loading: false,
            error: None,
            generation: 0,
            selected: None,
            mounted: false,
        }
    }

    /// Entries on the current page
    #[must_use]
    pub fn entries(&self) -> &[BookingHistoryEntry] {
        self.page
            .as_ref()
            .map(|page| page.items.as_slice())
            .unwrap_or_default()
    }
}

impl Default for HistoryState {
    fn default() -> Self {
        Self::new(10)
    }
}

/// History actions
#[derive(Clone, Debug, PartialEq)]
pub enum HistoryAction {
    /// Mount the view and fetch the current page
    Load,
    /// Time filter; resets to page 1
    SetType {
        /// Filter
        type_filter: HistoryFilter,
    },
    /// Date sort; resets to page 1
    SetSort {
        /// Sort
        sort: HistorySort,
    },
    /// Jump to a page
    SetPage {
        /// 1-based page
        page: u32,
    },
    /// A page arrived
    Loaded {
        /// Generation of the request
        generation: u64,
        /// Page
        page: Page<BookingHistoryEntry>,
    },
    /// A request failed
    LoadFailed {
        /// Generation of the request
        generation: u64,
        /// Cause
        error: BookingError,
    },
    /// Open an entry by record id
    Select {
        /// Record id
        id: String,
    },
    /// Close the detail view
    CloseDetail,
    /// The session was revoked
    Unauthorized,
}

/// History dependencies
#[derive(Clone)]
pub struct HistoryEnvironment {
    /// Backend
    pub api: Arc<dyn BookingApi>,
    /// Decides which bookings are upcoming
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for HistoryEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEnvironment").finish_non_exhaustive()
    }
}

/// History reducer
#[derive(Clone, Debug, Default)]
pub struct HistoryReducer;

impl HistoryReducer {
    /// Create a history reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fetch(state: &mut HistoryState, env: &HistoryEnvironment) -> Effect<HistoryAction> {
        state.generation += 1;
        state.loading = true;
        state.mounted = true;

        let generation = state.generation;
        let query = state.query.clone();
        let api = Arc::clone(&env.api);
        tracing::debug!(generation, page = query.page, "Fetching booking history");

        async_effect! {
            match api.my_bookings(query).await {
                Ok(page) => Some(HistoryAction::Loaded { generation, page }),
                Err(error) => Some(HistoryAction::LoadFailed { generation, error }),
            }
        }
    }

    /// Reset the view; the generation keeps counting so replies to
    /// requests from before the reset never match a later one
    fn unmount(state: &mut HistoryState) {
        *state = HistoryState {
            generation: state.generation,
            ..HistoryState::new(state.query.limit)
        };
    }
}

impl Reducer for HistoryReducer {
    type State = HistoryState;
    type Action = HistoryAction;
    type Environment = HistoryEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            HistoryAction::Load => smallvec![Self::fetch(state, env)],

            HistoryAction::SetType { type_filter } => {
                state.query.type_filter = type_filter;
                state.query.page = 1;
                smallvec![Self::fetch(state, env)]
            },

            HistoryAction::SetSort { sort } => {
                state.query.sort = sort;
                state.query.page = 1;
                smallvec![Self::fetch(state, env)]
            },

            HistoryAction::SetPage { page } => {
                state.query.page = page.max(1);
                smallvec![Self::fetch(state, env)]
            },

            HistoryAction::Loaded { generation, page } => {
                if state.mounted && generation == state.generation {
                    state.loading = false;
                    state.error = None;
                    state.page = Some(page);
                }
                smallvec![Effect::None]
            },

            HistoryAction::LoadFailed { generation, error } => {
                if !state.mounted || generation != state.generation {
                    return smallvec![Effect::None];
                }
                if error == BookingError::Unauthorized {
                    Self::unmount(state);
                } else {
                    tracing::warn!(%error, "Booking history failed to load");
                    state.loading = false;
                    state.error = Some(error);
                }
                smallvec![Effect::None]
            },

            HistoryAction::Select { id } => {
                let Some(entry) = state.entries().iter().find(|entry| entry.id == id).cloned() else {
                    tracing::debug!(%id, "Ignoring selection of unknown booking");
                    return smallvec![Effect::None];
                };
                state.selected = Some(HistoryDetail {
                    breakdown: reconstruct(&entry),
                    receipt: Receipt::from_history(&entry),
                    upcoming: entry.start > env.clock.now(),
                    entry,
                });
                smallvec![Effect::None]
            },

            HistoryAction::CloseDetail => {
                state.selected = None;
                smallvec![Effect::None]
            },

            HistoryAction::Unauthorized => {
                tracing::info!("Unmounting booking history");
                Self::unmount(state);
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::api::MockBookingApi;
    use crate::types::{BookingStatus, Organizer};
    use chrono::Duration;
    use matchday_testing::{ReducerTest, assertions, test_clock};

    fn env() -> HistoryEnvironment {
        HistoryEnvironment {
            api: Arc::new(MockBookingApi::new()),
            clock: Arc::new(test_clock()),
        }
    }

    fn entry(id: &str, days_from_now: i64) -> BookingHistoryEntry {
        BookingHistoryEntry {
            id: id.into(),
            booking_id: format!("WTF-{id}"),
            event_id: "e1".into(),
            event_name: "Derby Night".into(),
            location: "Kochi".into(),
            start: test_clock().now() + Duration::days(days_from_now),
            amount: 1056.0,
            platform_fees: 50.0,
            tax: 6.0,
            ticket_count: 2,
            status: BookingStatus::Confirmed,
            organizer: Organizer::default(),
            images: vec![],
        }
    }

    fn loaded() -> HistoryState {
        HistoryState {
            page: Some(Page {
                items: vec![entry("b1", 3), entry("b2", -3)],
                page: 1,
                per_page: 10,
                total: 2,
                total_pages: 1,
                next_page: None,
            }),
            generation: 1,
            mounted: true,
            ..HistoryState::default()
        }
    }

    #[test]
    fn test_filter_change_resets_page() {
        let mut state = loaded();
        state.query.page = 3;

        ReducerTest::new(HistoryReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HistoryAction::SetType {
                type_filter: HistoryFilter::Upcoming,
            })
            .then_state(|state| {
                assert_eq!(state.query.page, 1);
                assert_eq!(state.query.type_filter, HistoryFilter::Upcoming);
                assert_eq!(state.generation, 2);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_select_reconstructs_breakdown() {
        ReducerTest::new(HistoryReducer::new())
            .with_env(env())
            .given_state(loaded())
            .when_action(HistoryAction::Select { id: "b2".into() })
            .then_state(|state| {
                let detail = state.selected.as_ref().unwrap();
                assert!((detail.breakdown.net - 1000.0).abs() < 1e-9);
                assert!(!detail.upcoming);
                assert_eq!(detail.receipt.booking_id, "WTF-b2");
            })
            .run();
    }

    #[test]
    fn test_unauthorized_failure_unmounts() {
        ReducerTest::new(HistoryReducer::new())
            .with_env(env())
            .given_state(loaded())
            .when_action(HistoryAction::LoadFailed {
                generation: 1,
                error: BookingError::Unauthorized,
            })
            .then_state(|state| {
                assert!(!state.mounted);
                assert!(state.entries().is_empty());
                assert!(state.error.is_none());
            })
            .run();
    }

    #[test]
    fn test_reply_from_revoked_session_is_dropped_after_remount() {
        let stale = loaded().page.map(|page| Page { page: 7, ..page }).unwrap();

        ReducerTest::new(HistoryReducer::new())
            .with_env(env())
            .given_state(HistoryState::default())
            .given_actions([
                HistoryAction::Load,
                HistoryAction::Unauthorized,
                HistoryAction::Load,
            ])
            .when_action(HistoryAction::Loaded {
                generation: 1,
                page: stale,
            })
            .then_state(|state| {
                assert_eq!(state.generation, 2);
                assert!(state.mounted);
                assert!(state.loading);
                assert!(state.page.is_none());
            })
            .run();
    }

    #[test]
    fn test_late_page_after_unmount_is_dropped() {
        ReducerTest::new(HistoryReducer::new())
            .with_env(env())
            .given_state(loaded())
            .given_actions([HistoryAction::Unauthorized])
            .when_action(HistoryAction::Loaded {
                generation: 1,
                page: loaded().page.unwrap(),
            })
            .then_state(|state| assert!(state.page.is_none()))
            .run();
    }
}
