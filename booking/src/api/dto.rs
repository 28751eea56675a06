//! Wire formats of the backend API
//!
//! Every response is decoded into these structs first and then converted
//! into domain types. Missing or malformed required fields fail closed as
//! [`BookingError::Fetch`].

use crate::error::BookingError;
use crate::types::{
    BookingHistoryEntry, BookingStatus, CatalogQuery, CheckoutHandle, ConfirmedBooking,
    EventDetail, EventListing, EventSort, FeeConfig, HistoryFilter, HistoryQuery, HistorySort,
    Organizer, Page, Session, Team, TicketType, parse_date_of_birth,
};
use crate::api::{CheckoutRequest, ConfirmRequest, PhoneNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Wire status code of a successful payment
const PAYMENT_STATUS_SUCCESS: u8 = 2;

// ============================================================================
// Envelope
// ============================================================================

/// `{ status, message, statusCode, data }`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Application-level success flag
    #[serde(default)]
    pub status: bool,
    /// A string, or an object with a `message` field
    #[serde(default)]
    pub message: Value,
    /// Echo of the HTTP status
    #[serde(rename = "statusCode", default)]
    pub status_code: Option<u16>,
    /// Payload
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Human-readable message, wherever the backend put it
    #[must_use]
    pub fn message_text(&self) -> Option<String> {
        message_text(&self.message)
    }

    /// The payload of a successful envelope
    ///
    /// # Errors
    ///
    /// [`BookingError::Fetch`] if `status` is false or `data` is missing
    pub fn into_data(self) -> Result<T, BookingError> {
        if !self.status {
            return Err(BookingError::Fetch(
                self.message_text()
                    .unwrap_or_else(|| "Request failed".to_string()),
            ));
        }
        self.data
            .ok_or_else(|| BookingError::Fetch("Response had no data".to_string()))
    }

    /// Succeed without reading a payload
    ///
    /// # Errors
    ///
    /// [`BookingError::Fetch`] if `status` is false
    pub fn into_unit(self) -> Result<(), BookingError> {
        if self.status {
            Ok(())
        } else {
            Err(BookingError::Fetch(
                self.message_text()
                    .unwrap_or_else(|| "Request failed".to_string()),
            ))
        }
    }
}

/// Extract a message from a `message` field of either shape
#[must_use]
pub fn message_text(message: &Value) -> Option<String> {
    match message {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(fields) => fields.get("message").and_then(message_text),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, BookingError> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| BookingError::Fetch(format!("Invalid timestamp {seconds}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

// ============================================================================
// Auth
// ============================================================================

/// `POST /user/v1/login`
#[derive(Debug, Serialize)]
pub struct LoginBody {
    /// Dialling code as a number
    pub country_code: u32,
    /// Phone digits
    pub phone: String,
    /// Client identifier
    pub source: &'static str,
    /// Referral code
    pub referral: String,
}

impl LoginBody {
    /// Build from a validated phone number
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] if the country code is not numeric
    pub fn new(phone: &PhoneNumber) -> Result<Self, BookingError> {
        let country_code = phone
            .country_code
            .parse()
            .map_err(|_| BookingError::Validation("Invalid country code".to_string()))?;
        Ok(Self {
            country_code,
            phone: phone.phone.clone(),
            source: "web",
            referral: String::new(),
        })
    }
}

/// `POST /user/v1/verify_otp`
#[derive(Debug, Serialize)]
pub struct VerifyOtpBody {
    /// Phone digits
    pub phone: String,
    /// Dialling code as a string
    pub country_code: String,
    /// The OTP
    pub otp: String,
}

/// User record returned by OTP verification
#[derive(Debug, Deserialize)]
pub struct UserDto {
    /// User id
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Phone digits
    pub phone: String,
    /// Dialling code
    #[serde(deserialize_with = "string_or_number")]
    pub country_code: String,
    /// Email
    #[serde(default)]
    pub email: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub image: Option<String>,
    /// Date of birth, `DD-MM-YYYY`
    #[serde(default)]
    pub dob: Option<String>,
    /// Bearer token
    #[serde(default)]
    pub token: String,
}

impl TryFrom<UserDto> for Session {
    type Error = BookingError;

    fn try_from(user: UserDto) -> Result<Self, Self::Error> {
        if user.token.trim().is_empty() {
            return Err(BookingError::Fetch("Verification returned no token".to_string()));
        }
        Ok(Self {
            user_id: user.id,
            phone: user.phone,
            country_code: user.country_code,
            display_name: non_blank(user.first_name),
            auth_token: user.token,
            email: non_blank(user.email),
            image: non_blank(user.image),
            dob: user.dob.as_deref().and_then(parse_date_of_birth),
        })
    }
}

/// `data` of `GET /user/v1/favorite_teams`
#[derive(Debug, Deserialize)]
pub struct TeamsData {
    /// Teams
    #[serde(default)]
    pub teams: Vec<TeamDto>,
}

/// One favourite team
#[derive(Debug, Deserialize)]
pub struct TeamDto {
    /// Id used by the catalog filter
    #[serde(deserialize_with = "string_or_number")]
    pub team_id: String,
    /// Name
    pub team_name: String,
    /// Crest URL
    #[serde(default)]
    pub team_image: Option<String>,
}

impl From<TeamDto> for Team {
    fn from(team: TeamDto) -> Self {
        Self {
            team_id: team.team_id,
            name: team.team_name,
            image: non_blank(team.team_image),
        }
    }
}

/// `data` of `GET /user/v1/get_organizer_list`
#[derive(Debug, Deserialize)]
pub struct OrganizerListData {
    /// Organizers
    #[serde(default)]
    pub organizer_list: Vec<OrganizerDto>,
}

/// Organizer as embedded in most payloads
#[derive(Debug, Default, Deserialize)]
pub struct OrganizerDto {
    /// Id
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    /// Name
    #[serde(default)]
    pub organizer_name: Option<String>,
    /// Logo URL
    #[serde(default)]
    pub image: Option<String>,
}

impl From<OrganizerDto> for Organizer {
    fn from(organizer: OrganizerDto) -> Self {
        Self {
            id: organizer.id,
            name: organizer.organizer_name.unwrap_or_default(),
            image: non_blank(organizer.image),
        }
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// `POST /user/v1/other_event`
#[derive(Debug, Serialize)]
pub struct EventSearchBody {
    /// Page
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Free text
    pub search: String,
    /// Location
    pub location: String,
    /// `{ "price" | "event_date": "1" | "-1" }`
    pub sort: serde_json::Map<String, Value>,
    /// Id filters
    pub filter: EventFilterBody,
}

/// Filter part of the search body
#[derive(Debug, Serialize)]
pub struct EventFilterBody {
    /// Team ids
    pub team_id: Vec<String>,
    /// Organizer ids
    pub organizer_id: Vec<String>,
}

impl From<&CatalogQuery> for EventSearchBody {
    fn from(query: &CatalogQuery) -> Self {
        let (field, direction) = match query.sort {
            EventSort::PriceAsc => ("price", "1"),
            EventSort::PriceDesc => ("price", "-1"),
            EventSort::DateAsc => ("event_date", "1"),
            EventSort::DateDesc => ("event_date", "-1"),
        };
        let mut sort = serde_json::Map::new();
        sort.insert(field.to_string(), Value::String(direction.to_string()));

        Self {
            page: query.page,
            limit: query.limit,
            search: query.search.clone(),
            location: query.location.clone(),
            sort,
            filter: EventFilterBody {
                team_id: query.filter.team_ids.iter().cloned().collect(),
                organizer_id: query.filter.organizer_ids.iter().cloned().collect(),
            },
        }
    }
}

/// Pagination fields shared by list endpoints
#[derive(Debug, Deserialize)]
pub struct PageInfo {
    /// Page
    #[serde(default)]
    pub page: u32,
    /// Page size
    #[serde(default)]
    pub per_page: u32,
    /// Page count
    #[serde(default)]
    pub total_pages: u32,
    /// Next page
    #[serde(default)]
    pub next_page: Option<u32>,
    /// Item count
    #[serde(default)]
    pub total: u32,
}

impl PageInfo {
    fn into_page<T>(self, items: Vec<T>) -> Page<T> {
        Page {
            items,
            page: self.page.max(1),
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
            next_page: self.next_page,
        }
    }
}

/// `data` of the event search
#[derive(Debug, Deserialize)]
pub struct EventSearchData {
    /// Events
    pub other_events: Vec<EventDto>,
    /// Pagination
    #[serde(flatten)]
    pub info: PageInfo,
}

impl TryFrom<EventSearchData> for Page<EventListing> {
    type Error = BookingError;

    fn try_from(data: EventSearchData) -> Result<Self, Self::Error> {
        let items = data
            .other_events
            .into_iter()
            .map(EventListing::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(data.info.into_page(items))
    }
}

/// Image wrapper
#[derive(Debug, Deserialize)]
pub struct ImageDto {
    /// URL
    pub image: String,
}

/// Event as returned by search and detail
#[derive(Debug, Deserialize)]
pub struct EventDto {
    /// Id
    #[serde(rename = "_id")]
    pub id: String,
    /// Name
    pub event_name: String,
    /// Location
    #[serde(default)]
    pub location: String,
    /// Starting price
    #[serde(default)]
    pub price: f64,
    /// Venue ticket limit
    #[serde(default)]
    pub venue_ticket_limit: u32,
    /// Unix seconds
    pub date_time: i64,
    /// Images
    #[serde(default)]
    pub event_images: Vec<ImageDto>,
    /// Organizer
    #[serde(default)]
    pub organizer_detail: Option<OrganizerDto>,
    /// Platform fee percentage on listings
    #[serde(default)]
    pub platform_fees: f64,
}

impl TryFrom<EventDto> for EventListing {
    type Error = BookingError;

    fn try_from(event: EventDto) -> Result<Self, Self::Error> {
        Ok(Self {
            start: timestamp(event.date_time)?,
            id: event.id,
            name: event.event_name,
            location: event.location,
            price_from: event.price,
            images: event.event_images.into_iter().map(|image| image.image).collect(),
            organizer: event.organizer_detail.unwrap_or_default().into(),
            tickets_remaining: event.venue_ticket_limit,
            platform_fee_percent: event.platform_fees,
        })
    }
}

/// Ticket type as returned by the detail endpoint
#[derive(Debug, Deserialize)]
pub struct TicketTypeDto {
    /// Id
    #[serde(rename = "_id")]
    pub id: String,
    /// Label
    pub item: String,
    /// Unit price
    pub price: f64,
    /// Inventory
    pub quantity: u32,
    /// Sold so far
    #[serde(rename = "totalBooked", default)]
    pub total_booked: u32,
    /// Sold-out flag
    #[serde(rename = "isSoldOut", default)]
    pub is_sold_out: bool,
}

impl From<TicketTypeDto> for TicketType {
    fn from(ticket: TicketTypeDto) -> Self {
        Self {
            id: ticket.id,
            label: ticket.item,
            unit_price: ticket.price,
            total_quantity: ticket.quantity,
            booked_quantity: ticket.total_booked,
            is_sold_out: ticket.is_sold_out,
        }
    }
}

/// Per-event booking configuration
#[derive(Debug, Deserialize)]
pub struct EventConfigDto {
    /// Per-order ticket cap
    #[serde(default)]
    pub no_of_ticket: Option<u32>,
}

/// `data` of `GET /event/v1/detail`
#[derive(Debug, Deserialize)]
pub struct EventDetailDto {
    /// Listing fields
    #[serde(flatten)]
    pub event: EventDto,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Match name
    #[serde(default)]
    pub match_name: Option<String>,
    /// Ticket types
    #[serde(default)]
    pub event_ticket_type: Vec<TicketTypeDto>,
    /// Platform fee percentage used at checkout
    #[serde(default)]
    pub admin_platform_fee: Option<f64>,
    /// Booking configuration
    #[serde(default)]
    pub config: Option<EventConfigDto>,
}

impl EventDetailDto {
    /// Convert with the client-side defaults the backend may omit
    ///
    /// # Errors
    ///
    /// [`BookingError::Fetch`] on malformed fields
    pub fn into_detail(self, tax_rate: f64, default_max_tickets: u32) -> Result<EventDetail, BookingError> {
        let fee_percent = self.admin_platform_fee.unwrap_or(self.event.platform_fees);
        if !fee_percent.is_finite() || fee_percent < 0.0 {
            return Err(BookingError::Fetch(format!("Invalid platform fee {fee_percent}")));
        }
        let max_tickets_per_order = self
            .config
            .and_then(|config| config.no_of_ticket)
            .filter(|max| *max > 0)
            .unwrap_or(default_max_tickets);

        Ok(EventDetail {
            listing: self.event.try_into()?,
            description: self.description,
            match_name: non_blank(self.match_name),
            ticket_types: self.event_ticket_type.into_iter().map(TicketType::from).collect(),
            fees: FeeConfig::from_percent(fee_percent, tax_rate),
            max_tickets_per_order,
        })
    }
}

// ============================================================================
// Checkout
// ============================================================================

/// `POST /user/v1/check_out`
#[derive(Debug, Serialize)]
pub struct CheckoutBody {
    /// Event
    pub event_id: String,
    /// Always zero; every ticket goes through a ticket type
    pub normal_ticket_count: u32,
    /// Lines
    pub event_ticket_type: Vec<CheckoutLineBody>,
    /// Breakdown (field name as the backend spells it)
    pub price_brackdown: PriceBreakdownBody,
    /// No coupons
    pub applied_coupon_id: String,
}

/// One checkout line
#[derive(Debug, Serialize)]
pub struct CheckoutLineBody {
    /// Ticket type id
    pub price_type_id: String,
    /// Quantity
    pub selected_count: u32,
    /// Attendee questions (unused)
    pub question: Vec<Value>,
}

/// Breakdown sent at checkout
#[derive(Debug, Serialize)]
pub struct PriceBreakdownBody {
    /// Net price
    pub net_price: f64,
    /// Tax on the platform fee
    pub tax: f64,
    /// No coupons
    pub applied_coupon_discount: f64,
    /// Payable total
    pub total_price: f64,
}

impl From<&CheckoutRequest> for CheckoutBody {
    fn from(request: &CheckoutRequest) -> Self {
        Self {
            event_id: request.event_id.clone(),
            normal_ticket_count: 0,
            event_ticket_type: request
                .lines
                .iter()
                .map(|line| CheckoutLineBody {
                    price_type_id: line.ticket_type_id.clone(),
                    selected_count: line.quantity,
                    question: Vec::new(),
                })
                .collect(),
            price_brackdown: PriceBreakdownBody {
                net_price: request.breakdown.net,
                tax: request.breakdown.tax,
                applied_coupon_discount: 0.0,
                total_price: request.breakdown.total,
            },
            applied_coupon_id: String::new(),
        }
    }
}

/// `data` of "create checkout"
#[derive(Debug, Deserialize)]
pub struct CheckoutDto {
    /// Booking id
    #[serde(rename = "_id")]
    pub id: String,
    /// Payable amount
    pub amount: f64,
    /// Gateway order id
    pub transaction_id: String,
}

impl From<CheckoutDto> for CheckoutHandle {
    fn from(checkout: CheckoutDto) -> Self {
        Self {
            id: checkout.id,
            amount: checkout.amount,
            gateway_order_id: checkout.transaction_id,
        }
    }
}

/// `POST /user/v1/confirm_booking`
#[derive(Debug, Serialize)]
pub struct ConfirmBookingBody {
    /// Checkout id
    pub event_booking_id: String,
    /// Gateway name
    pub payment_method: &'static str,
    /// Amount paid, as a string
    pub payment_amount: String,
    /// Gateway transaction id
    pub transaction_id: String,
    /// 2 = success
    pub payment_status: u8,
}

impl From<&ConfirmRequest> for ConfirmBookingBody {
    fn from(request: &ConfirmRequest) -> Self {
        Self {
            event_booking_id: request.checkout.id.clone(),
            payment_method: "Razorpay",
            payment_amount: request.checkout.amount.to_string(),
            transaction_id: request.transaction_id.clone(),
            payment_status: PAYMENT_STATUS_SUCCESS,
        }
    }
}

/// Ticket part of the confirmation
#[derive(Debug, Deserialize)]
pub struct TicketDetailsDto {
    /// Tickets booked
    pub ticket_count: u32,
    /// Human-facing booking id
    pub booking_id: String,
}

/// `data` of "confirm booking"
#[derive(Debug, Deserialize)]
pub struct ConfirmedBookingDto {
    /// Event name
    pub event_name: String,
    /// Location
    #[serde(default)]
    pub location: String,
    /// Unix seconds
    pub date_time: i64,
    /// Organizer
    #[serde(default)]
    pub organizer_detail: Option<OrganizerDto>,
    /// Tickets
    pub ticket_details: TicketDetailsDto,
}

impl ConfirmedBookingDto {
    /// Convert, recording the amount that was paid
    ///
    /// # Errors
    ///
    /// [`BookingError::Fetch`] on malformed fields
    pub fn into_booking(self, amount: f64) -> Result<ConfirmedBooking, BookingError> {
        Ok(ConfirmedBooking {
            booking_id: self.ticket_details.booking_id,
            event_name: self.event_name,
            location: self.location,
            start: timestamp(self.date_time)?,
            ticket_count: self.ticket_details.ticket_count,
            organizer: self
                .organizer_detail
                .and_then(|organizer| organizer.organizer_name)
                .unwrap_or_default(),
            amount,
        })
    }
}

// ============================================================================
// History
// ============================================================================

/// `POST /user/v1/my_bookings`
#[derive(Debug, Serialize)]
pub struct MyBookingsBody {
    /// Page
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// `""`, `"upcoming"` or `"completed"`
    #[serde(rename = "type")]
    pub type_filter: &'static str,
    /// `""`, `"asc"` or `"desc"`
    pub sort: &'static str,
}

impl From<&HistoryQuery> for MyBookingsBody {
    fn from(query: &HistoryQuery) -> Self {
        Self {
            page: query.page,
            limit: query.limit,
            type_filter: match query.type_filter {
                HistoryFilter::All => "",
                HistoryFilter::Upcoming => "upcoming",
                HistoryFilter::Completed => "completed",
            },
            sort: match query.sort {
                HistorySort::Default => "",
                HistorySort::Asc => "asc",
                HistorySort::Desc => "desc",
            },
        }
    }
}

/// Event fields embedded in a booking
#[derive(Debug, Deserialize)]
pub struct BookingEventDto {
    /// Name
    pub event_name: String,
    /// Location
    #[serde(default)]
    pub location: String,
    /// Unix seconds
    pub date_time: i64,
}

/// One past booking
#[derive(Debug, Deserialize)]
pub struct BookingDto {
    /// Record id
    #[serde(rename = "_id")]
    pub id: String,
    /// Human-facing booking id
    #[serde(default)]
    pub booking_id: String,
    /// Event id
    #[serde(default)]
    pub event_id: String,
    /// Amount paid
    #[serde(default)]
    pub amount: f64,
    /// Tax
    #[serde(default)]
    pub tax: f64,
    /// Platform fees
    #[serde(default)]
    pub platform_fees: f64,
    /// Tickets
    #[serde(default)]
    pub no_of_ticket: u32,
    /// Status code
    #[serde(default)]
    pub status: i64,
    /// Event fields
    pub event_detail: BookingEventDto,
    /// Organizer
    #[serde(default)]
    pub organizer_detail: Option<OrganizerDto>,
    /// Images
    #[serde(default)]
    pub event_images: Vec<ImageDto>,
}

impl TryFrom<BookingDto> for BookingHistoryEntry {
    type Error = BookingError;

    fn try_from(booking: BookingDto) -> Result<Self, Self::Error> {
        Ok(Self {
            start: timestamp(booking.event_detail.date_time)?,
            id: booking.id,
            booking_id: booking.booking_id,
            event_id: booking.event_id,
            event_name: booking.event_detail.event_name,
            location: booking.event_detail.location,
            amount: booking.amount,
            platform_fees: booking.platform_fees,
            tax: booking.tax,
            ticket_count: booking.no_of_ticket,
            status: BookingStatus::from_code(booking.status),
            organizer: booking.organizer_detail.unwrap_or_default().into(),
            images: booking.event_images.into_iter().map(|image| image.image).collect(),
        })
    }
}

/// `data` of "my bookings"
#[derive(Debug, Deserialize)]
pub struct MyBookingsData {
    /// Bookings
    pub event_bookings: Vec<BookingDto>,
    /// Pagination
    #[serde(flatten)]
    pub info: PageInfo,
}

impl TryFrom<MyBookingsData> for Page<BookingHistoryEntry> {
    type Error = BookingError;

    fn try_from(data: MyBookingsData) -> Result<Self, Self::Error> {
        let items = data
            .event_bookings
            .into_iter()
            .map(BookingHistoryEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(data.info.into_page(items))
    }
}
