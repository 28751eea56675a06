//! reqwest implementation of [`BookingApi`]

use super::dto::{
    CheckoutBody, CheckoutDto, ConfirmBookingBody, ConfirmedBookingDto, Envelope, EventDetailDto,
    EventSearchBody, EventSearchData, LoginBody, MyBookingsBody, MyBookingsData,
    OrganizerListData, TeamsData, UserDto, VerifyOtpBody, message_text,
};
use super::{ApiFuture, BookingApi, CheckoutRequest, ConfirmRequest, PhoneNumber, ProfileEdit};
use crate::config::Config;
use crate::error::BookingError;
use crate::storage::ClientStorage;
use crate::types::{
    BookingHistoryEntry, CatalogQuery, CheckoutHandle, ConfirmedBooking, EventDetail,
    DOB_WIRE_FORMAT, EventListing, HistoryQuery, Organizer, Page, Session, Team,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

/// Authentication events published by the HTTP layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthEvent {
    /// A request was answered with 401; stored credentials are already gone
    Unauthorized {
        /// Path of the rejected request
        path: String,
    },
}

/// Backend client over HTTP
///
/// The bearer token is read from [`ClientStorage`] on every request, so a
/// login or logout takes effect immediately.
#[derive(Clone)]
pub struct HttpBookingApi {
    client: Client,
    base_url: String,
    storage: ClientStorage,
    auth_events: broadcast::Sender<AuthEvent>,
    tax_rate: f64,
    default_max_tickets: u32,
}

impl HttpBookingApi {
    /// Build a client from configuration
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Network`] if the HTTP client cannot be built
    pub fn new(config: &Config, storage: ClientStorage) -> Result<Self, BookingError> {
        let client = Client::builder().timeout(config.api.timeout()).build()?;
        let (auth_events, _) = broadcast::channel(16);

        Ok(Self {
            client,
            base_url: config.api.base_url.trim_end_matches('/').to_string(),
            storage,
            auth_events,
            tax_rate: config.booking.tax_rate,
            default_max_tickets: config.booking.default_max_tickets,
        })
    }

    /// Subscribe to [`AuthEvent`]s
    #[must_use]
    pub fn subscribe_auth_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and decode its envelope
    ///
    /// A 401 clears stored credentials and publishes [`AuthEvent::Unauthorized`]
    /// before the error is returned.
    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, BookingError> {
        let request = match self.storage.auth_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        tracing::debug!(path, "Sending API request");
        let response = request.send().await.map_err(|error| {
            tracing::warn!(path, %error, "API request failed");
            BookingError::from(error)
        })?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(path, "API request unauthorized, clearing session");
            self.storage.clear_session();
            let _ = self.auth_events.send(AuthEvent::Unauthorized {
                path: path.to_string(),
            });
            return Err(BookingError::Unauthorized);
        }

        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|value| value.get("message").and_then(message_text))
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            tracing::warn!(path, status = status.as_u16(), %message, "API returned an error");
            return Err(BookingError::Fetch(message));
        }

        serde_json::from_str(&body).map_err(|error| {
            tracing::warn!(path, %error, "API response did not match the expected shape");
            BookingError::from(error)
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Envelope<T>, BookingError> {
        self.execute(path, self.client.get(self.url(path)).query(query)).await
    }

    async fn post<B: serde::Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, BookingError> {
        self.execute(path, self.client.post(self.url(path)).json(body)).await
    }
}

impl BookingApi for HttpBookingApi {
    fn request_code(&self, phone: PhoneNumber) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let body = LoginBody::new(&phone)?;
            self.post::<_, serde_json::Value>("/user/v1/login", &body)
                .await?
                .into_unit()
        })
    }

    fn verify_code(&self, phone: PhoneNumber, code: String) -> ApiFuture<'_, Session> {
        Box::pin(async move {
            let body = VerifyOtpBody {
                phone: phone.phone,
                country_code: phone.country_code,
                otp: code,
            };
            let user: UserDto = self.post("/user/v1/verify_otp", &body).await?.into_data()?;
            Session::try_from(user)
        })
    }

    fn edit_profile(&self, edit: ProfileEdit) -> ApiFuture<'_, ()> {
        Box::pin(async move {
            let path = "/user/v1/edit_profile";
            let dob = edit
                .dob
                .map(|dob| dob.format(DOB_WIRE_FORMAT).to_string())
                .unwrap_or_default();
            let form = reqwest::multipart::Form::new()
                .text("first_name", edit.first_name)
                .text("dob", dob);
            self.execute::<serde_json::Value>(path, self.client.post(self.url(path)).multipart(form))
                .await?
                .into_unit()
        })
    }

    fn favorite_teams(&self) -> ApiFuture<'_, Vec<Team>> {
        Box::pin(async move {
            let data: TeamsData = self.get("/user/v1/favorite_teams", &[]).await?.into_data()?;
            Ok(data.teams.into_iter().map(Team::from).collect())
        })
    }

    fn organizers(&self) -> ApiFuture<'_, Vec<Organizer>> {
        Box::pin(async move {
            let data: OrganizerListData = self
                .get("/user/v1/get_organizer_list", &[])
                .await?
                .into_data()?;
            Ok(data.organizer_list.into_iter().map(Organizer::from).collect())
        })
    }

    fn search_events(&self, query: CatalogQuery) -> ApiFuture<'_, Page<EventListing>> {
        Box::pin(async move {
            let body = EventSearchBody::from(&query);
            let data: EventSearchData = self.post("/user/v1/other_event", &body).await?.into_data()?;
            Page::try_from(data)
        })
    }

    fn event_detail(&self, event_id: String) -> ApiFuture<'_, EventDetail> {
        Box::pin(async move {
            let data: EventDetailDto = self
                .get("/event/v1/detail", &[("event_id", event_id.as_str())])
                .await?
                .into_data()?;
            data.into_detail(self.tax_rate, self.default_max_tickets)
        })
    }

    fn create_checkout(&self, request: CheckoutRequest) -> ApiFuture<'_, CheckoutHandle> {
        Box::pin(async move {
            let body = CheckoutBody::from(&request);
            let data: CheckoutDto = self.post("/user/v1/check_out", &body).await?.into_data()?;
            Ok(data.into())
        })
    }

    fn confirm_booking(&self, request: ConfirmRequest) -> ApiFuture<'_, ConfirmedBooking> {
        Box::pin(async move {
            let body = ConfirmBookingBody::from(&request);
            let data: ConfirmedBookingDto = self
                .post("/user/v1/confirm_booking", &body)
                .await?
                .into_data()?;
            data.into_booking(request.checkout.amount)
        })
    }

    fn my_bookings(&self, query: HistoryQuery) -> ApiFuture<'_, Page<BookingHistoryEntry>> {
        Box::pin(async move {
            let body = MyBookingsBody::from(&query);
            let data: MyBookingsData = self.post("/user/v1/my_bookings", &body).await?.into_data()?;
            Page::try_from(data)
        })
    }
}
