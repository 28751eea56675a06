//! Shared fixtures for the booking integration tests

#![allow(dead_code)] // Not every test file uses every fixture
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::{TimeZone, Utc};
use matchday_booking::api::MockBookingApi;
use matchday_booking::payment::PaymentFuture;
use matchday_booking::types::{EventDetail, EventListing, FeeConfig, Organizer, Session, TicketType};
use matchday_booking::{App, ClientStorage, Config, PaymentOutcome, PaymentRequest, PaymentWidget};
use matchday_testing::test_clock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// How long to wait for an action before failing
pub const WAIT: Duration = Duration::from_secs(5);

/// Widget that resolves every payment the same way and records requests
pub struct ScriptedWidget {
    outcome: PaymentOutcome,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedWidget {
    pub fn new(outcome: PaymentOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl PaymentWidget for ScriptedWidget {
    fn open(&self, request: PaymentRequest) -> PaymentFuture {
        self.requests.lock().unwrap().push(request);
        let outcome = self.outcome.clone();
        Box::pin(async move { outcome })
    }
}

/// Event "e1": Regular tickets at 500 with 10 left, VIP at 1500 with 2 left,
/// 5% platform fee
pub fn event_detail() -> EventDetail {
    EventDetail {
        listing: EventListing {
            id: "e1".into(),
            name: "Derby Night".into(),
            location: "Kochi".into(),
            price_from: 500.0,
            start: Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap(),
            images: vec![],
            organizer: Organizer {
                id: Some("org-1".into()),
                name: "Fan Club".into(),
                image: None,
            },
            tickets_remaining: 100,
            platform_fee_percent: 5.0,
        },
        description: "Big screen, bigger crowd".into(),
        match_name: Some("Kochi vs Goa".into()),
        ticket_types: vec![
            TicketType {
                id: "regular".into(),
                label: "Regular".into(),
                unit_price: 500.0,
                total_quantity: 10,
                booked_quantity: 0,
                is_sold_out: false,
            },
            TicketType {
                id: "vip".into(),
                label: "VIP".into(),
                unit_price: 1500.0,
                total_quantity: 5,
                booked_quantity: 3,
                is_sold_out: false,
            },
        ],
        fees: FeeConfig::from_percent(5.0, 0.12),
        max_tickets_per_order: 15,
    }
}

pub fn session(display_name: Option<&str>) -> Session {
    Session {
        user_id: "u1".into(),
        phone: "9876543210".into(),
        country_code: "91".into(),
        display_name: display_name.map(str::to_string),
        auth_token: "token-1".into(),
        email: None,
        image: None,
        dob: None,
    }
}

/// App over a mock backend that knows event "e1"
pub fn app(widget: Arc<ScriptedWidget>) -> (App, Arc<MockBookingApi>, ClientStorage) {
    let api = Arc::new(MockBookingApi::new());
    api.add_event(event_detail());
    let storage = ClientStorage::in_memory();
    let app = App::new(
        &Config::default(),
        api.clone(),
        storage.clone(),
        widget,
        Arc::new(test_clock()),
    );
    (app, api, storage)
}

/// Wait for the first broadcast action matching `predicate`
pub async fn wait_for<A, F>(rx: &mut broadcast::Receiver<A>, predicate: F) -> A
where
    A: Clone + std::fmt::Debug,
    F: Fn(&A) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(action) if predicate(&action) => return action,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {},
                Err(broadcast::error::RecvError::Closed) => panic!("action channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for action")
}
