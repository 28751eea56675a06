//! Domain types of the booking client
//!
//! Wire formats live in [`crate::api::dto`]; everything here is validated
//! and typed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Session
// ============================================================================

/// An authenticated user session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Backend user id
    pub user_id: String,
    /// Phone number, digits only
    pub phone: String,
    /// Country dialling code, digits only
    pub country_code: String,
    /// Display name, if the user set one
    pub display_name: Option<String>,
    /// Bearer token
    pub auth_token: String,
    /// Email on file
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub image: Option<String>,
    /// Date of birth
    #[serde(default)]
    pub dob: Option<NaiveDate>,
}

impl Session {
    /// Whether the user still has to choose a display name
    #[must_use]
    pub fn needs_profile(&self) -> bool {
        self.display_name
            .as_deref()
            .is_none_or(|name| name.trim().is_empty())
    }

    /// The part of the session cached as the user profile
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            phone: self.phone.clone(),
            country_code: self.country_code.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            image: self.image.clone(),
            dob: self.dob,
        }
    }

    /// Rebuild a session from a cached profile and token
    #[must_use]
    pub fn from_profile(profile: UserProfile, auth_token: String) -> Self {
        Self {
            user_id: profile.user_id,
            phone: profile.phone,
            country_code: profile.country_code,
            display_name: profile.display_name,
            auth_token,
            email: profile.email,
            image: profile.image,
            dob: profile.dob,
        }
    }

    /// Name to prefill in the payment widget
    #[must_use]
    pub fn prefill_name(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.phone.clone(),
        }
    }
}

/// Cached user profile (everything but the token)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Backend user id
    pub user_id: String,
    /// Phone number
    pub phone: String,
    /// Country dialling code
    pub country_code: String,
    /// Display name
    pub display_name: Option<String>,
    /// Email on file
    pub email: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
    /// Date of birth
    #[serde(default)]
    pub dob: Option<NaiveDate>,
}

/// How the backend writes dates of birth
pub const DOB_WIRE_FORMAT: &str = "%d-%m-%Y";

/// Parse a date of birth in the backend's `DD-MM-YYYY` or ISO `YYYY-MM-DD`
#[must_use]
pub fn parse_date_of_birth(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DOB_WIRE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

// ============================================================================
// Catalog
// ============================================================================

/// Event organizer
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizer {
    /// Backend id, when the endpoint provides one
    pub id: Option<String>,
    /// Display name
    pub name: String,
    /// Logo URL
    pub image: Option<String>,
}

/// A favourite team usable as a catalog filter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Id used in the catalog filter
    pub team_id: String,
    /// Display name
    pub name: String,
    /// Crest URL
    pub image: Option<String>,
}

/// A bookable event as shown in the catalog
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventListing {
    /// Event id
    pub id: String,
    /// Event name
    pub name: String,
    /// Venue location
    pub location: String,
    /// Cheapest ticket price
    pub price_from: f64,
    /// Start time
    pub start: DateTime<Utc>,
    /// Image URLs
    pub images: Vec<String>,
    /// Organizer
    pub organizer: Organizer,
    /// Venue ticket limit
    pub tickets_remaining: u32,
    /// Platform fee in percent
    pub platform_fee_percent: f64,
}

/// Catalog sort order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSort {
    /// Cheapest first
    PriceAsc,
    /// Most expensive first
    PriceDesc,
    /// Soonest first
    #[default]
    DateAsc,
    /// Latest first
    DateDesc,
}

/// Catalog filter: a conjunction of optional id sets
///
/// An empty set places no constraint on its axis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events involving these teams
    pub team_ids: BTreeSet<String>,
    /// Only events run by these organizers
    pub organizer_ids: BTreeSet<String>,
}

impl EventFilter {
    /// Whether the filter constrains nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.team_ids.is_empty() && self.organizer_ids.is_empty()
    }

    /// Number of active constraints
    #[must_use]
    pub fn len(&self) -> usize {
        self.team_ids.len() + self.organizer_ids.len()
    }
}

/// Catalog query parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// 1-based page
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Free-text search
    pub search: String,
    /// Location search
    pub location: String,
    /// Sort order
    pub sort: EventSort,
    /// Filter
    pub filter: EventFilter,
}

impl CatalogQuery {
    /// First page of the unfiltered catalog
    #[must_use]
    pub fn first_page(limit: u32) -> Self {
        Self {
            page: 1,
            limit,
            search: String::new(),
            location: String::new(),
            sort: EventSort::default(),
            filter: EventFilter::default(),
        }
    }
}

/// One page of results
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub per_page: u32,
    /// Total number of items
    pub total: u32,
    /// Total number of pages
    pub total_pages: u32,
    /// Next page, if any
    pub next_page: Option<u32>,
}

// ============================================================================
// Event detail and selection
// ============================================================================

/// A priced admission category with its own inventory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketType {
    /// Ticket type id
    pub id: String,
    /// Label, e.g. "Regular"
    pub label: String,
    /// Price per ticket
    pub unit_price: f64,
    /// Inventory
    pub total_quantity: u32,
    /// Already sold
    pub booked_quantity: u32,
    /// Backend sold-out flag
    pub is_sold_out: bool,
}

impl TicketType {
    /// Tickets left, never negative
    #[must_use]
    pub const fn available_quantity(&self) -> u32 {
        self.total_quantity.saturating_sub(self.booked_quantity)
    }

    /// Whether more tickets of this type can be chosen at all
    #[must_use]
    pub const fn can_increase(&self) -> bool {
        !self.is_sold_out && self.available_quantity() > 0
    }
}

/// Surcharges applied on top of the net ticket price
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Platform fee as a fraction of net price
    pub fee_rate: f64,
    /// Tax as a fraction of the platform fee
    pub tax_rate: f64,
}

impl FeeConfig {
    /// Build from the backend's percentage and the configured tax rate
    #[must_use]
    pub fn from_percent(fee_percent: f64, tax_rate: f64) -> Self {
        Self {
            fee_rate: fee_percent / 100.0,
            tax_rate,
        }
    }
}

/// Everything needed to book an event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    /// Catalog data
    pub listing: EventListing,
    /// Long description
    pub description: String,
    /// Match shown at the event
    pub match_name: Option<String>,
    /// Ticket types on sale
    pub ticket_types: Vec<TicketType>,
    /// Fee configuration
    pub fees: FeeConfig,
    /// Per-order ticket cap
    pub max_tickets_per_order: u32,
}

impl EventDetail {
    /// Look up a ticket type
    #[must_use]
    pub fn ticket_type(&self, id: &str) -> Option<&TicketType> {
        self.ticket_types.iter().find(|ticket| ticket.id == id)
    }
}

/// Chosen quantities per ticket type id
///
/// Only positive quantities are stored; setting zero removes the entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketSelection(BTreeMap<String, u32>);

impl TicketSelection {
    /// Empty selection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity chosen for a ticket type
    #[must_use]
    pub fn quantity(&self, ticket_type_id: &str) -> u32 {
        self.0.get(ticket_type_id).copied().unwrap_or(0)
    }

    /// Set a quantity; zero removes the entry
    pub fn set(&mut self, ticket_type_id: impl Into<String>, quantity: u32) {
        let id = ticket_type_id.into();
        if quantity == 0 {
            self.0.remove(&id);
        } else {
            self.0.insert(id, quantity);
        }
    }

    /// Total number of tickets
    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    /// Whether nothing is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in ticket type id order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(id, qty)| (id.as_str(), *qty))
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for TicketSelection {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        let mut selection = Self::new();
        for (id, quantity) in iter {
            selection.set(id, quantity);
        }
        selection
    }
}

/// In-progress selection persisted per event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDraft {
    /// Event the selection belongs to
    pub event_id: String,
    /// The selection
    pub selection: TicketSelection,
}

// ============================================================================
// Checkout
// ============================================================================

/// One line of a checkout request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutLine {
    /// Ticket type id
    pub ticket_type_id: String,
    /// Quantity
    pub quantity: u32,
}

/// Server-issued order handle from "create checkout"
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutHandle {
    /// Booking id to confirm later
    pub id: String,
    /// Payable amount in major units
    pub amount: f64,
    /// Gateway order id passed to the payment widget
    pub gateway_order_id: String,
}

/// A booking the backend confirmed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedBooking {
    /// Human-facing booking id
    pub booking_id: String,
    /// Event name
    pub event_name: String,
    /// Venue location
    pub location: String,
    /// Start time
    pub start: DateTime<Utc>,
    /// Number of tickets
    pub ticket_count: u32,
    /// Organizer name
    pub organizer: String,
    /// Amount paid
    pub amount: f64,
}

// ============================================================================
// History
// ============================================================================

/// Status of a past booking
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Paid and confirmed
    Confirmed,
    /// Awaiting confirmation
    Pending,
    /// Cancelled
    Cancelled,
    /// Any code this client does not know
    Unknown,
}

impl BookingStatus {
    /// Map a wire status code
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            2 => Self::Confirmed,
            3 => Self::Pending,
            4 => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed",
            Self::Pending => "Pending",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
        }
    }
}

/// A past order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingHistoryEntry {
    /// Record id
    pub id: String,
    /// Human-facing booking id
    pub booking_id: String,
    /// Event id
    pub event_id: String,
    /// Event name
    pub event_name: String,
    /// Venue location
    pub location: String,
    /// Start time
    pub start: DateTime<Utc>,
    /// Amount paid
    pub amount: f64,
    /// Platform fees included in the amount
    pub platform_fees: f64,
    /// Tax included in the amount
    pub tax: f64,
    /// Number of tickets
    pub ticket_count: u32,
    /// Status
    pub status: BookingStatus,
    /// Organizer
    pub organizer: Organizer,
    /// Event image URLs
    pub images: Vec<String>,
}

/// Time filter for booking history
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryFilter {
    /// Everything
    #[default]
    All,
    /// Events still ahead
    Upcoming,
    /// Events already played
    Completed,
}

/// Date sort for booking history
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistorySort {
    /// Backend default
    #[default]
    Default,
    /// Oldest first
    Asc,
    /// Newest first
    Desc,
}

/// Booking history query parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// 1-based page
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Time filter
    pub type_filter: HistoryFilter,
    /// Sort order
    pub sort: HistorySort,
}

impl HistoryQuery {
    /// First page, no filter
    #[must_use]
    pub fn first_page(limit: u32) -> Self {
        Self {
            page: 1,
            limit,
            type_filter: HistoryFilter::default(),
            sort: HistorySort::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(total: u32, booked: u32, sold_out: bool) -> TicketType {
        TicketType {
            id: "regular".into(),
            label: "Regular".into(),
            unit_price: 500.0,
            total_quantity: total,
            booked_quantity: booked,
            is_sold_out: sold_out,
        }
    }

    #[test]
    fn test_available_quantity_saturates() {
        assert_eq!(ticket(10, 4, false).available_quantity(), 6);
        assert_eq!(ticket(3, 5, false).available_quantity(), 0);
        assert!(!ticket(3, 5, false).can_increase());
        assert!(!ticket(10, 0, true).can_increase());
    }

    #[test]
    fn test_selection_drops_zero_entries() {
        let mut selection: TicketSelection = [("vip", 2), ("regular", 1)].into_iter().collect();
        assert_eq!(selection.total(), 3);

        selection.set("vip", 0);
        assert_eq!(selection.quantity("vip"), 0);
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![("regular", 1)]);
    }

    #[test]
    fn test_selection_serializes_as_map() {
        let selection: TicketSelection = [("regular", 2)].into_iter().collect();
        let json = serde_json::to_string(&selection).unwrap_or_default();
        assert_eq!(json, r#"{"regular":2}"#);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BookingStatus::from_code(2), BookingStatus::Confirmed);
        assert_eq!(BookingStatus::from_code(3), BookingStatus::Pending);
        assert_eq!(BookingStatus::from_code(4), BookingStatus::Cancelled);
        assert_eq!(BookingStatus::from_code(9), BookingStatus::Unknown);
    }

    #[test]
    fn test_date_of_birth_accepts_both_layouts() {
        let expected = NaiveDate::from_ymd_opt(1995, 8, 14);
        assert_eq!(parse_date_of_birth("14-08-1995"), expected);
        assert_eq!(parse_date_of_birth(" 1995-08-14 "), expected);
        assert_eq!(parse_date_of_birth("31-02-1995"), None);
        assert_eq!(parse_date_of_birth(""), None);
    }

    #[test]
    fn test_session_needs_profile_for_blank_name() {
        let mut session = Session {
            user_id: "u1".into(),
            phone: "9876543210".into(),
            country_code: "91".into(),
            display_name: Some("   ".into()),
            auth_token: "t".into(),
            email: None,
            image: None,
            dob: None,
        };
        assert!(session.needs_profile());
        assert_eq!(session.prefill_name(), "9876543210");

        session.display_name = Some("Asha".into());
        assert!(!session.needs_profile());
        assert_eq!(session.prefill_name(), "Asha");
    }
}
