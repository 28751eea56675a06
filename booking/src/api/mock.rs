//! In-memory backend for development and testing.
//!
//! Every endpoint answers from scripted data and counts its calls, so flows
//! can be driven end to end without a server and asserted on afterwards.

use super::{ApiFuture, BookingApi, CheckoutRequest, ConfirmRequest, PhoneNumber, ProfileEdit};
use crate::error::BookingError;
use crate::types::{
    BookingHistoryEntry, CatalogQuery, CheckoutHandle, ConfirmedBooking, EventDetail,
    EventListing, EventSort, HistoryQuery, Organizer, Page, Session, Team,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Endpoint names used by [`MockBookingApi::calls`]
pub mod endpoint {
    /// OTP dispatch
    pub const REQUEST_CODE: &str = "request_code";
    /// OTP verification
    pub const VERIFY_CODE: &str = "verify_code";
    /// Profile edit
    pub const EDIT_PROFILE: &str = "edit_profile";
    /// Favourite teams
    pub const FAVORITE_TEAMS: &str = "favorite_teams";
    /// Organizer list
    pub const ORGANIZERS: &str = "organizers";
    /// Catalog search
    pub const SEARCH_EVENTS: &str = "search_events";
    /// Event detail
    pub const EVENT_DETAIL: &str = "event_detail";
    /// Create checkout
    pub const CREATE_CHECKOUT: &str = "create_checkout";
    /// Confirm booking
    pub const CONFIRM_BOOKING: &str = "confirm_booking";
    /// Booking history
    pub const MY_BOOKINGS: &str = "my_bookings";
}

#[derive(Default)]
struct Script {
    request_code: Option<BookingError>,
    session: Option<Result<Session, BookingError>>,
    edit_profile: Option<BookingError>,
    teams: Vec<Team>,
    organizers: Vec<Organizer>,
    search: Option<BookingError>,
    events: Vec<EventListing>,
    details: HashMap<String, EventDetail>,
    checkout: Option<Result<CheckoutHandle, BookingError>>,
    confirmation: Option<Result<ConfirmedBooking, BookingError>>,
    history: Option<Result<Page<BookingHistoryEntry>, BookingError>>,
    checkout_requests: Vec<CheckoutRequest>,
    confirm_requests: Vec<ConfirmRequest>,
    profile_edits: Vec<ProfileEdit>,
    searches: Vec<CatalogQuery>,
    calls: HashMap<&'static str, usize>,
}

/// Scripted [`BookingApi`]
///
/// Unscripted endpoints answer with [`BookingError::Network`].
#[derive(Default)]
pub struct MockBookingApi {
    script: Mutex<Script>,
}

impl std::fmt::Debug for MockBookingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBookingApi").finish_non_exhaustive()
    }
}

fn offline(endpoint: &str) -> BookingError {
    BookingError::Network(format!("{endpoint} is not scripted"))
}

impl MockBookingApi {
    /// Empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, endpoint: &'static str) -> MutexGuard<'_, Script> {
        let mut script = self.script();
        *script.calls.entry(endpoint).or_default() += 1;
        script
    }

    /// How often an endpoint was called; see [`endpoint`]
    #[must_use]
    pub fn calls(&self, endpoint: &str) -> usize {
        self.script().calls.get(endpoint).copied().unwrap_or(0)
    }

    /// Make OTP dispatch fail
    pub fn fail_request_code(&self, error: BookingError) {
        self.script().request_code = Some(error);
    }

    /// Session returned by OTP verification
    pub fn set_session(&self, session: Session) {
        self.script().session = Some(Ok(session));
    }

    /// Make OTP verification fail
    pub fn fail_verify(&self, error: BookingError) {
        self.script().session = Some(Err(error));
    }

    /// Make profile edits fail
    pub fn fail_edit_profile(&self, error: BookingError) {
        self.script().edit_profile = Some(error);
    }

    /// Favourite teams and organizers
    pub fn set_filter_options(&self, teams: Vec<Team>, organizers: Vec<Organizer>) {
        let mut script = self.script();
        script.teams = teams;
        script.organizers = organizers;
    }

    /// Add an event to the catalog and make its detail available
    pub fn add_event(&self, detail: EventDetail) {
        let mut script = self.script();
        script.events.push(detail.listing.clone());
        script.details.insert(detail.listing.id.clone(), detail);
    }

    /// Make catalog search fail (`None` restores it)
    pub fn set_search_failure(&self, error: Option<BookingError>) {
        self.script().search = error;
    }

    /// Result of "create checkout"
    pub fn set_checkout(&self, result: Result<CheckoutHandle, BookingError>) {
        self.script().checkout = Some(result);
    }

    /// Result of "confirm booking"
    pub fn set_confirmation(&self, result: Result<ConfirmedBooking, BookingError>) {
        self.script().confirmation = Some(result);
    }

    /// Result of "my bookings"
    pub fn set_history(&self, result: Result<Page<BookingHistoryEntry>, BookingError>) {
        self.script().history = Some(result);
    }

    /// Checkout requests received so far
    #[must_use]
    pub fn checkout_requests(&self) -> Vec<CheckoutRequest> {
        self.script().checkout_requests.clone()
    }

    /// Confirmation requests received so far
    #[must_use]
    pub fn confirm_requests(&self) -> Vec<ConfirmRequest> {
        self.script().confirm_requests.clone()
    }

    /// Profile edits received so far
    #[must_use]
    pub fn profile_edits(&self) -> Vec<ProfileEdit> {
        self.script().profile_edits.clone()
    }

    /// Catalog queries received so far
    #[must_use]
    pub fn searches(&self) -> Vec<CatalogQuery> {
        self.script().searches.clone()
    }
}

/// Search, sort and paginate scripted events
///
/// Organizer filters apply; team filters are accepted but not evaluated.
fn search(events: &[EventListing], query: &CatalogQuery) -> Page<EventListing> {
    let needle = query.search.to_lowercase();
    let location = query.location.to_lowercase();

    let mut matches: Vec<EventListing> = events
        .iter()
        .filter(|event| needle.is_empty() || event.name.to_lowercase().contains(&needle))
        .filter(|event| location.is_empty() || event.location.to_lowercase().contains(&location))
        .filter(|event| {
            query.filter.organizer_ids.is_empty()
                || event
                    .organizer
                    .id
                    .as_ref()
                    .is_some_and(|id| query.filter.organizer_ids.contains(id))
        })
        .cloned()
        .collect();

    match query.sort {
        EventSort::PriceAsc => matches.sort_by(|a, b| a.price_from.total_cmp(&b.price_from)),
        EventSort::PriceDesc => matches.sort_by(|a, b| b.price_from.total_cmp(&a.price_from)),
        EventSort::DateAsc => matches.sort_by_key(|event| event.start),
        EventSort::DateDesc => matches.sort_by_key(|event| std::cmp::Reverse(event.start)),
    }

    let limit = query.limit.max(1);
    let total = u32::try_from(matches.len()).unwrap_or(u32::MAX);
    let total_pages = total.div_ceil(limit);
    let page = query.page.max(1);
    let skip = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
    let take = usize::try_from(limit).unwrap_or(usize::MAX);

    Page {
        items: matches.into_iter().skip(skip).take(take).collect(),
        page,
        per_page: limit,
        total,
        total_pages,
        next_page: (page < total_pages).then_some(page + 1),
    }
}

impl BookingApi for MockBookingApi {
    fn request_code(&self, _phone: PhoneNumber) -> ApiFuture<'_, ()> {
        let result = match self.record(endpoint::REQUEST_CODE).request_code.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        };
        Box::pin(async move { result })
    }

    fn verify_code(&self, _phone: PhoneNumber, _code: String) -> ApiFuture<'_, Session> {
        let result = self
            .record(endpoint::VERIFY_CODE)
            .session
            .clone()
            .unwrap_or_else(|| Err(offline(endpoint::VERIFY_CODE)));
        Box::pin(async move { result })
    }

    fn edit_profile(&self, edit: ProfileEdit) -> ApiFuture<'_, ()> {
        let result = {
            let mut script = self.record(endpoint::EDIT_PROFILE);
            script.profile_edits.push(edit);
            script.edit_profile.clone().map_or(Ok(()), Err)
        };
        Box::pin(async move { result })
    }

    fn favorite_teams(&self) -> ApiFuture<'_, Vec<Team>> {
        let teams = self.record(endpoint::FAVORITE_TEAMS).teams.clone();
        Box::pin(async move { Ok(teams) })
    }

    fn organizers(&self) -> ApiFuture<'_, Vec<Organizer>> {
        let organizers = self.record(endpoint::ORGANIZERS).organizers.clone();
        Box::pin(async move { Ok(organizers) })
    }

    fn search_events(&self, query: CatalogQuery) -> ApiFuture<'_, Page<EventListing>> {
        let result = {
            let mut script = self.record(endpoint::SEARCH_EVENTS);
            script.searches.push(query.clone());
            match script.search.clone() {
                Some(error) => Err(error),
                None => Ok(search(&script.events, &query)),
            }
        };
        Box::pin(async move { result })
    }

    fn event_detail(&self, event_id: String) -> ApiFuture<'_, EventDetail> {
        let result = self
            .record(endpoint::EVENT_DETAIL)
            .details
            .get(&event_id)
            .cloned()
            .ok_or_else(|| BookingError::Fetch("Event not found".to_string()));
        Box::pin(async move { result })
    }

    fn create_checkout(&self, request: CheckoutRequest) -> ApiFuture<'_, CheckoutHandle> {
        let result = {
            let mut script = self.record(endpoint::CREATE_CHECKOUT);
            script.checkout_requests.push(request);
            script
                .checkout
                .clone()
                .unwrap_or_else(|| Err(offline(endpoint::CREATE_CHECKOUT)))
        };
        Box::pin(async move { result })
    }

    fn confirm_booking(&self, request: ConfirmRequest) -> ApiFuture<'_, ConfirmedBooking> {
        let result = {
            let mut script = self.record(endpoint::CONFIRM_BOOKING);
            script.confirm_requests.push(request);
            script
                .confirmation
                .clone()
                .unwrap_or_else(|| Err(offline(endpoint::CONFIRM_BOOKING)))
        };
        Box::pin(async move { result })
    }

    fn my_bookings(&self, _query: HistoryQuery) -> ApiFuture<'_, Page<BookingHistoryEntry>> {
        let result = self
            .record(endpoint::MY_BOOKINGS)
            .history
            .clone()
            .unwrap_or_else(|| Err(offline(endpoint::MY_BOOKINGS)));
        Box::pin(async move { result })
    }
}
