//! Event catalog view-model
//!
//! Every query change bumps a generation counter; responses carrying an
//! older generation are dropped, so the page always matches the latest
//! query.

use crate::api::BookingApi;
use crate::error::BookingError;
use crate::types::{CatalogQuery, EventFilter, EventListing, EventSort, Organizer, Page, Team};
use matchday_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use std::sync::Arc;

/// Catalog state
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogState {
    /// Current query
    pub query: CatalogQuery,
    /// Last page received
    pub page: Option<Page<EventListing>>,
    /// A query is in flight
    pub loading: bool,
    /// Last failure; the previous page stays visible
    pub error: Option<BookingError>,
    /// Generation of the latest query
    pub generation: u64,
    /// Favourite teams for the filter panel
    pub teams: Vec<Team>,
    /// Organizers for the filter panel
    pub organizers: Vec<Organizer>,
}

impl CatalogState {
    /// Empty catalog with the given page size
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            query: CatalogQuery::first_page(page_size),
            page: None,
            loading: false,
            error: None,
            generation: 0,
            teams: Vec::new(),
            organizers: Vec::new(),
        }
    }

    /// Events on the current page
    #[must_use]
    pub fn events(&self) -> &[EventListing] {
        self.page
            .as_ref()
            .map(|page| page.items.as_slice())
            .unwrap_or_default()
    }
}

impl Default for CatalogState {
    fn default() -> Self {
        Self::new(50)
    }
}

/// Catalog actions
#[derive(Clone, Debug, PartialEq)]
pub enum CatalogAction {
    /// Run the current query again
    Query,
    /// Free-text search; resets to page 1
    SetSearch {
        /// Search text
        search: String,
    },
    /// Location search; resets to page 1
    SetLocation {
        /// Location text
        location: String,
    },
    /// Sort order; resets to page 1
    SetSort {
        /// Sort
        sort: EventSort,
    },
    /// Filter; resets to page 1
    SetFilter {
        /// Filter
        filter: EventFilter,
    },
    /// Drop search, location and filter
    ClearFilters,
    /// Jump to a page
    SetPage {
        /// 1-based page
        page: u32,
    },
    /// A page arrived
    Loaded {
        /// Generation of the query that produced it
        generation: u64,
        /// Page
        page: Page<EventListing>,
    },
    /// A query failed
    LoadFailed {
        /// Generation of the query that failed
        generation: u64,
        /// Cause
        error: BookingError,
    },
    /// Fetch teams and organizers for the filter panel
    LoadFilterOptions,
    /// Favourite teams arrived
    TeamsLoaded {
        /// Teams
        teams: Vec<Team>,
    },
    /// Followed organizers arrived
    OrganizersLoaded {
        /// Organizers
        organizers: Vec<Organizer>,
    },
}

/// Catalog dependencies
#[derive(Clone)]
pub struct CatalogEnvironment {
    /// Backend
    pub api: Arc<dyn BookingApi>,
}

impl std::fmt::Debug for CatalogEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEnvironment").finish_non_exhaustive()
    }
}

/// Catalog reducer
#[derive(Clone, Debug, Default)]
pub struct CatalogReducer;

impl CatalogReducer {
    /// Create a catalog reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Start a query for the current parameters
    fn query(state: &mut CatalogState, env: &CatalogEnvironment) -> Effect<CatalogAction> {
        state.generation += 1;
        state.loading = true;

        let generation = state.generation;
        let query = state.query.clone();
        let api = Arc::clone(&env.api);
        tracing::debug!(generation, page = query.page, "Querying catalog");

        async_effect! {
            match api.search_events(query).await {
                Ok(page) => Some(CatalogAction::Loaded { generation, page }),
                Err(error) => Some(CatalogAction::LoadFailed { generation, error }),
            }
        }
    }

    /// Apply a parameter change that restarts pagination
    fn requery(
        state: &mut CatalogState,
        env: &CatalogEnvironment,
        change: impl FnOnce(&mut CatalogQuery),
    ) -> SmallVec<[Effect<CatalogAction>; 4]> {
        change(&mut state.query);
        state.query.page = 1;
        smallvec![Self::query(state, env)]
    }
}

impl Reducer for CatalogReducer {
    type State = CatalogState;
    type Action = CatalogAction;
    type Environment = CatalogEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            CatalogAction::Query => smallvec![Self::query(state, env)],

            CatalogAction::SetSearch { search } => {
                Self::requery(state, env, |query| query.search = search.trim().to_string())
            },
            CatalogAction::SetLocation { location } => {
                Self::requery(state, env, |query| query.location = location.trim().to_string())
            },
            CatalogAction::SetSort { sort } => Self::requery(state, env, |query| query.sort = sort),
            CatalogAction::SetFilter { filter } => {
                Self::requery(state, env, |query| query.filter = filter)
            },
            CatalogAction::ClearFilters => Self::requery(state, env, |query| {
                query.search.clear();
                query.location.clear();
                query.filter = EventFilter::default();
            }),

            CatalogAction::SetPage { page } => {
                state.query.page = page.max(1);
                smallvec![Self::query(state, env)]
            },

            CatalogAction::Loaded { generation, page } => {
                if generation != state.generation {
                    tracing::debug!(generation, current = state.generation, "Dropping stale page");
                    return smallvec![Effect::None];
                }
                state.loading = false;
                state.error = None;
                state.page = Some(page);
                smallvec![Effect::None]
            },

            CatalogAction::LoadFailed { generation, error } => {
                if generation == state.generation {
                    tracing::warn!(%error, "Catalog query failed");
                    state.loading = false;
                    state.error = Some(error);
                }
                smallvec![Effect::None]
            },

            CatalogAction::LoadFilterOptions => {
                let teams_api = Arc::clone(&env.api);
                let organizers_api = Arc::clone(&env.api);
                smallvec![Effect::merge(vec![
                    async_effect! {
                        match teams_api.favorite_teams().await {
                            Ok(teams) => Some(CatalogAction::TeamsLoaded { teams }),
                            Err(error) => {
                                tracing::warn!(%error, "Failed to load favourite teams");
                                None
                            },
                        }
                    },
                    async_effect! {
                        match organizers_api.organizers().await {
                            Ok(organizers) => Some(CatalogAction::OrganizersLoaded { organizers }),
                            Err(error) => {
                                tracing::warn!(%error, "Failed to load organizers");
                                None
                            },
                        }
                    },
                ])]
            },

            CatalogAction::TeamsLoaded { teams } => {
                state.teams = teams;
                smallvec![Effect::None]
            },

            CatalogAction::OrganizersLoaded { organizers } => {
                state.organizers = organizers;
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
    use crate::types::{EventDetail, FeeConfig};
    use matchday_testing::{ReducerTest, assertions, helpers::resolve_effects};

    fn env() -> CatalogEnvironment {
        CatalogEnvironment {
            api: Arc::new(MockBookingApi::new()),
        }
    }

    fn page(ids: &[&str]) -> Page<EventListing> {
        Page {
            items: ids
                .iter()
                .map(|id| EventListing {
                    id: (*id).to_string(),
                    name: format!("Event {id}"),
                    location: "Kochi".into(),
                    price_from: 100.0,
                    start: chrono::Utc::now(),
                    images: vec![],
                    organizer: Organizer::default(),
                    tickets_remaining: 10,
                    platform_fee_percent: 5.0,
                })
                .collect(),
            page: 1,
            per_page: 50,
            total: u32::try_from(ids.len()).unwrap(),
            total_pages: 1,
            next_page: None,
        }
    }

    #[test]
    fn test_search_resets_page() {
        let mut state = CatalogState::new(10);
        state.query.page = 4;

        ReducerTest::new(CatalogReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(CatalogAction::SetSearch {
                search: " derby ".into(),
            })
            .then_state(|state| {
                assert_eq!(state.query.page, 1);
                assert_eq!(state.query.search, "derby");
                assert_eq!(state.generation, 1);
                assert!(state.loading);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_sort_resets_page() {
        let mut state = CatalogState::new(10);
        state.query.page = 3;

        ReducerTest::new(CatalogReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(CatalogAction::SetSort {
                sort: EventSort::PriceDesc,
            })
            .then_state(|state| {
                assert_eq!(state.query.page, 1);
                assert_eq!(state.query.sort, EventSort::PriceDesc);
                assert_eq!(state.generation, 1);
                assert!(state.loading);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_filter_resets_page() {
        let mut state = CatalogState::new(10);
        state.query.page = 3;
        let filter = EventFilter {
            organizer_ids: ["org-1".to_string()].into_iter().collect(),
            ..EventFilter::default()
        };

        ReducerTest::new(CatalogReducer::new())
            .with_env(env())
            .given_state(state)
            .given_actions([CatalogAction::SetPage { page: 5 }])
            .when_action(CatalogAction::SetFilter { filter })
            .then_state(|state| {
                assert_eq!(state.query.page, 1);
                assert_eq!(state.query.filter.len(), 1);
                assert_eq!(state.generation, 2);
            })
            .run();
    }

    #[test]
    fn test_stale_response_is_dropped() {
        let mut state = CatalogState::new(10);
        state.generation = 2;
        state.loading = true;

        ReducerTest::new(CatalogReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(CatalogAction::Loaded {
                generation: 1,
                page: page(&["old"]),
            })
            .then_state(|state| {
                assert!(state.page.is_none());
                assert!(state.loading);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_failure_keeps_previous_page() {
        let mut state = CatalogState::new(10);
        state.generation = 1;
        state.page = Some(page(&["a", "b"]));

        ReducerTest::new(CatalogReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(CatalogAction::LoadFailed {
                generation: 1,
                error: BookingError::Network("offline".into()),
            })
            .then_state(|state| {
                assert_eq!(state.events().len(), 2);
                assert!(state.error.as_ref().unwrap().is_retryable());
            })
            .run();
    }

    #[tokio::test]
    async fn test_filter_options_load_side_by_side() {
        let api = MockBookingApi::new();
        api.set_filter_options(
            vec![Team {
                team_id: "t1".into(),
                name: "Kerala Blasters".into(),
                image: None,
            }],
            vec![Organizer {
                id: Some("org-1".into()),
                name: "Fan Club".into(),
                image: None,
            }],
        );
        let env = CatalogEnvironment { api: Arc::new(api) };
        let reducer = CatalogReducer::new();
        let mut state = CatalogState::default();

        let effects = reducer.reduce(&mut state, CatalogAction::LoadFilterOptions, &env);
        assert!(matches!(effects.as_slice(), [Effect::Parallel(inner)] if inner.len() == 2));

        for action in resolve_effects(effects).await {
            reducer.reduce(&mut state, action, &env);
        }
        assert_eq!(state.teams.len(), 1);
        assert_eq!(state.organizers[0].name, "Fan Club");
    }

    #[tokio::test]
    async fn test_repeated_query_shows_same_events() {
        let api = Arc::new(MockBookingApi::new());
        for listing in page(&["a", "b", "c"]).items {
            api.add_event(EventDetail {
                listing,
                description: String::new(),
                match_name: None,
                ticket_types: vec![],
                fees: FeeConfig::from_percent(5.0, 0.18),
                max_tickets_per_order: 10,
            });
        }
        let env = CatalogEnvironment {
            api: Arc::clone(&api) as Arc<dyn BookingApi>,
        };
        let reducer = CatalogReducer::new();
        let mut state = CatalogState::new(10);

        let mut seen = Vec::new();
        for _ in 0..2 {
            let effects = reducer.reduce(&mut state, CatalogAction::Query, &env);
            for action in resolve_effects(effects).await {
                reducer.reduce(&mut state, action, &env);
            }
            assert!(!state.loading);
            seen.push(state.events().to_vec());
        }

        assert_eq!(seen[0].len(), 3);
        assert_eq!(seen[0], seen[1]);
        assert_eq!(api.searches(), vec![state.query.clone(), state.query.clone()]);
    }
}
