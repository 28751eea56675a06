//! Backend REST API boundary
//!
//! [`BookingApi`] is what the reducers' environments depend on;
//! [`HttpBookingApi`] is the reqwest implementation. Test doubles implement
//! the same trait; [`MockBookingApi`] is an in-memory one.

pub mod dto;
pub mod http;
pub mod mock;

use crate::error::BookingError;
use crate::pricing::PriceBreakdown;
use crate::types::{
    BookingHistoryEntry, CatalogQuery, CheckoutHandle, CheckoutLine, ConfirmedBooking,
    EventDetail, EventListing, HistoryQuery, Organizer, Page, Session, Team,
};
use chrono::NaiveDate;
use futures::future::BoxFuture;

pub use http::{AuthEvent, HttpBookingApi};
pub use mock::MockBookingApi;

/// Future returned by every API call
pub type ApiFuture<'a, T> = BoxFuture<'a, Result<T, BookingError>>;

/// Phone + country code pair used by the OTP endpoints
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhoneNumber {
    /// Digits only
    pub phone: String,
    /// Dialling code, digits only
    pub country_code: String,
}

/// Profile fields the user can change
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileEdit {
    /// Display name
    pub first_name: String,
    /// Date of birth; `None` is sent as blank
    pub dob: Option<NaiveDate>,
}

/// "Create checkout" request
#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutRequest {
    /// Event being booked
    pub event_id: String,
    /// Chosen ticket types
    pub lines: Vec<CheckoutLine>,
    /// Breakdown computed when the checkout was created
    pub breakdown: PriceBreakdown,
}

/// "Confirm booking" request
#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmRequest {
    /// Checkout being confirmed
    pub checkout: CheckoutHandle,
    /// Gateway transaction id
    pub transaction_id: String,
}

/// The backend as seen by the client
pub trait BookingApi: Send + Sync {
    /// Ask the backend to send an OTP
    fn request_code(&self, phone: PhoneNumber) -> ApiFuture<'_, ()>;

    /// Exchange an OTP for a session
    fn verify_code(&self, phone: PhoneNumber, code: String) -> ApiFuture<'_, Session>;

    /// Save the user's name and date of birth
    fn edit_profile(&self, edit: ProfileEdit) -> ApiFuture<'_, ()>;

    /// Teams the user follows
    fn favorite_teams(&self) -> ApiFuture<'_, Vec<Team>>;

    /// Organizers usable as filters
    fn organizers(&self) -> ApiFuture<'_, Vec<Organizer>>;

    /// Search the catalog
    fn search_events(&self, query: CatalogQuery) -> ApiFuture<'_, Page<EventListing>>;

    /// Ticket types and fees of one event
    fn event_detail(&self, event_id: String) -> ApiFuture<'_, EventDetail>;

    /// Reserve a price-locked order
    fn create_checkout(&self, request: CheckoutRequest) -> ApiFuture<'_, CheckoutHandle>;

    /// Mark an order as paid
    fn confirm_booking(&self, request: ConfirmRequest) -> ApiFuture<'_, ConfirmedBooking>;

    /// The user's past orders
    fn my_bookings(&self, query: HistoryQuery) -> ApiFuture<'_, Page<BookingHistoryEntry>>;
}
