//! End-to-end booking flows through the application shell
//!
//! Every store runs for real; the backend and payment widget are scripted.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod support;

use matchday_booking::api::mock::endpoint;
use matchday_booking::checkout::{CheckoutAction, CheckoutStep};
use matchday_booking::selection::SelectionAction;
use matchday_booking::session::{LoginPhase, SessionAction};
use matchday_booking::types::{CheckoutHandle, ConfirmedBooking, TicketSelection};
use matchday_booking::{App, PaymentOutcome, Route};
use support::{ScriptedWidget, WAIT, app, event_detail, session, wait_for};

fn handle(amount: f64) -> CheckoutHandle {
    CheckoutHandle {
        id: "chk_1".into(),
        amount,
        gateway_order_id: "order_1".into(),
    }
}

fn is_selection_changed(action: &CheckoutAction) -> bool {
    matches!(
        action,
        CheckoutAction::Selection(SelectionAction::SelectionChanged { .. })
    )
}

/// Open event "e1" and wait until its inventory is installed
async fn open_event(app: &App) {
    let mut rx = app.checkout.subscribe_actions();
    app.navigate(Route::Event {
        event_id: "e1".into(),
    })
    .await
    .unwrap();
    wait_for(&mut rx, |action| matches!(action, CheckoutAction::EventLoaded { .. })).await;
    wait_for(&mut rx, is_selection_changed).await;
}

async fn select(app: &App, ticket_type_id: &str, delta: i64) {
    app.checkout
        .send_and_wait_for(
            CheckoutAction::Selection(SelectionAction::SetQuantity {
                ticket_type_id: ticket_type_id.into(),
                delta,
            }),
            is_selection_changed,
            WAIT,
        )
        .await
        .unwrap();
}

async fn log_in(app: &App, api: &matchday_booking::MockBookingApi, display_name: Option<&str>) {
    api.set_session(session(display_name));
    app.session
        .send_and_wait_for(
            SessionAction::VerifyCode {
                phone: "9876543210".into(),
                country_code: "91".into(),
                code: "1234".into(),
            },
            |action| {
                matches!(
                    action,
                    SessionAction::Verified { .. } | SessionAction::VerificationFailed { .. }
                )
            },
            WAIT,
        )
        .await
        .unwrap();
}

async fn to_review(app: &App) {
    app.checkout.send(CheckoutAction::ProceedToSeats).await.unwrap();
    app.checkout.send(CheckoutAction::ProceedToCheckout).await.unwrap();
}

#[tokio::test]
async fn test_two_regular_tickets_price_and_pay_exact_amount() {
    let widget = ScriptedWidget::new(PaymentOutcome::Completed {
        transaction_id: "pay_1".into(),
    });
    let (app, api, storage) = app(widget.clone());
    api.set_checkout(Ok(handle(1056.0)));
    api.set_confirmation(Ok(ConfirmedBooking {
        booking_id: "WTF-1042".into(),
        event_name: "Derby Night".into(),
        location: "Kochi".into(),
        start: event_detail().listing.start,
        ticket_count: 2,
        organizer: "Fan Club".into(),
        amount: 1056.0,
    }));

    log_in(&app, &api, Some("Asha")).await;
    open_event(&app).await;
    select(&app, "regular", 2).await;
    to_review(&app).await;

    let breakdown = app.checkout.state(|state| state.price_breakdown()).await.unwrap();
    assert!((breakdown.net - 1000.0).abs() < 1e-9);
    assert!((breakdown.platform_fee - 50.0).abs() < 1e-9);
    assert!((breakdown.tax - 6.0).abs() < 1e-9);
    assert!((breakdown.total - 1056.0).abs() < 1e-9);

    let mut rx = app.checkout.subscribe_actions();
    app.pay().await.unwrap();
    wait_for(&mut rx, |action| matches!(action, CheckoutAction::BookingConfirmed { .. })).await;
    wait_for(&mut rx, is_selection_changed).await;

    let (step, booking_id) = app
        .checkout
        .state(|state| {
            (
                state.step,
                state.confirmed.as_ref().map(|booking| booking.booking_id.clone()),
            )
        })
        .await;
    assert_eq!(step, CheckoutStep::Success);
    assert_eq!(booking_id.as_deref(), Some("WTF-1042"));

    let requests = widget.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount_minor, 105_600);
    assert_eq!(requests[0].order_id, "order_1");
    assert_eq!(requests[0].prefill_name, "Asha");

    let checkouts = api.checkout_requests();
    assert_eq!(checkouts[0].lines.len(), 1);
    assert_eq!(checkouts[0].lines[0].quantity, 2);

    let confirmations = api.confirm_requests();
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].transaction_id, "pay_1");
    assert!((confirmations[0].checkout.amount - 1056.0).abs() < 1e-9);

    assert_eq!(storage.load_draft("e1"), None);
}

#[tokio::test]
async fn test_empty_selection_never_reaches_checkout() {
    let (app, _api, _storage) = app(ScriptedWidget::new(PaymentOutcome::Dismissed));
    open_event(&app).await;
    to_review(&app).await;

    let (step, notice) = app
        .checkout
        .state(|state| (state.step, state.notice.clone()))
        .await;
    assert_eq!(step, CheckoutStep::Seats);
    assert!(notice.is_some());
}

#[tokio::test]
async fn test_blank_display_name_asks_for_profile() {
    let (app, api, storage) = app(ScriptedWidget::new(PaymentOutcome::Dismissed));
    log_in(&app, &api, Some("  ")).await;
    assert_eq!(
        app.session.state(|state| state.phase).await,
        LoginPhase::CompleteProfile
    );

    app.session
        .send_and_wait_for(
            SessionAction::SubmitDisplayName {
                display_name: "Asha".into(),
            },
            |action| matches!(action, SessionAction::ProfileSaved { .. }),
            WAIT,
        )
        .await
        .unwrap();

    let (phase, name) = app
        .session
        .state(|state| {
            (
                state.phase,
                state.session.as_ref().and_then(|session| session.display_name.clone()),
            )
        })
        .await;
    assert_eq!(phase, LoginPhase::Complete);
    assert_eq!(name.as_deref(), Some("Asha"));
    assert_eq!(
        storage.load_session().and_then(|session| session.display_name),
        Some("Asha".to_string())
    );
    assert_eq!(api.calls(endpoint::EDIT_PROFILE), 1);
}

#[tokio::test]
async fn test_dismissed_payment_returns_to_checkout_without_confirming() {
    let widget = ScriptedWidget::new(PaymentOutcome::Dismissed);
    let (app, api, storage) = app(widget.clone());
    api.set_checkout(Ok(handle(1056.0)));

    log_in(&app, &api, Some("Asha")).await;
    open_event(&app).await;
    select(&app, "regular", 2).await;
    to_review(&app).await;

    let mut rx = app.checkout.subscribe_actions();
    app.pay().await.unwrap();
    wait_for(&mut rx, |action| matches!(action, CheckoutAction::PaymentDismissed)).await;

    let (step, quantity, error) = app
        .checkout
        .state(|state| {
            (
                state.step,
                state.selection.selection.quantity("regular"),
                state.error.clone(),
            )
        })
        .await;
    assert_eq!(step, CheckoutStep::Checkout);
    assert_eq!(quantity, 2);
    assert!(error.is_none());
    assert_eq!(widget.requests().len(), 1);
    assert_eq!(api.calls(endpoint::CREATE_CHECKOUT), 1);
    assert_eq!(api.calls(endpoint::CONFIRM_BOOKING), 0);

    let expected: TicketSelection = [("regular", 2)].into_iter().collect();
    assert_eq!(storage.load_draft("e1"), Some(expected));
}

#[tokio::test]
async fn test_failed_confirmation_asks_user_to_contact_support() {
    let (app, api, _storage) = app(ScriptedWidget::new(PaymentOutcome::Completed {
        transaction_id: "pay_1".into(),
    }));
    api.set_checkout(Ok(handle(1056.0)));
    api.set_confirmation(Err(matchday_booking::BookingError::Network("timeout".into())));

    log_in(&app, &api, Some("Asha")).await;
    open_event(&app).await;
    select(&app, "regular", 2).await;
    to_review(&app).await;

    let mut rx = app.checkout.subscribe_actions();
    app.pay().await.unwrap();
    wait_for(&mut rx, |action| matches!(action, CheckoutAction::ConfirmationFailed { .. })).await;

    let (step, message) = app
        .checkout
        .state(|state| (state.step, state.error.as_ref().map(|error| error.user_message())))
        .await;
    assert_eq!(step, CheckoutStep::Checkout);
    assert_eq!(
        message.as_deref(),
        Some("Failed to confirm booking. Please contact support.")
    );
}

#[tokio::test]
async fn test_login_interruption_resumes_at_checkout() {
    let (app, api, storage) = app(ScriptedWidget::new(PaymentOutcome::Dismissed));
    open_event(&app).await;
    select(&app, "regular", 2).await;
    select(&app, "vip", 1).await;
    to_review(&app).await;

    app.pay().await.unwrap();
    assert_eq!(app.route().await, Route::Landing);
    assert!(app.checkout.state(|state| state.login_required).await);
    assert_eq!(api.calls(endpoint::CREATE_CHECKOUT), 0);

    let expected: TicketSelection = [("regular", 2), ("vip", 1)].into_iter().collect();
    assert_eq!(storage.load_draft("e1"), Some(expected.clone()));

    log_in(&app, &api, Some("Asha")).await;
    let mut rx = app.checkout.subscribe_actions();
    assert!(app.resume_after_login().await.unwrap());
    wait_for(&mut rx, |action| matches!(action, CheckoutAction::EventLoaded { .. })).await;

    let (step, selection) = app
        .checkout
        .state(|state| (state.step, state.selection.selection.clone()))
        .await;
    assert_eq!(step, CheckoutStep::Checkout);
    assert_eq!(selection, expected);
    assert_eq!(
        app.route().await,
        Route::Event {
            event_id: "e1".into()
        }
    );
}

#[tokio::test]
async fn test_returning_to_catalog_instead_of_logging_in_drops_draft() {
    let (app, api, storage) = app(ScriptedWidget::new(PaymentOutcome::Dismissed));
    open_event(&app).await;
    select(&app, "regular", 2).await;
    to_review(&app).await;

    app.pay().await.unwrap();
    assert_eq!(app.route().await, Route::Landing);
    assert!(storage.load_draft("e1").is_some());

    app.navigate(Route::Catalog).await.unwrap();

    assert_eq!(app.route().await, Route::Catalog);
    assert_eq!(storage.load_draft("e1"), None);
    assert!(!app.checkout.state(|state| state.login_required).await);

    log_in(&app, &api, Some("Asha")).await;
    assert!(!app.resume_after_login().await.unwrap());
}

#[tokio::test]
async fn test_amount_mismatch_fails_closed() {
    let widget = ScriptedWidget::new(PaymentOutcome::Completed {
        transaction_id: "pay_1".into(),
    });
    let (app, api, _storage) = app(widget.clone());
    api.set_checkout(Ok(handle(1100.0)));

    log_in(&app, &api, Some("Asha")).await;
    open_event(&app).await;
    select(&app, "regular", 2).await;
    to_review(&app).await;

    let mut rx = app.checkout.subscribe_actions();
    app.pay().await.unwrap();
    wait_for(&mut rx, |action| matches!(action, CheckoutAction::CheckoutCreated { .. })).await;

    assert_eq!(app.checkout.state(|state| state.step).await, CheckoutStep::Checkout);
    assert!(widget.requests().is_empty());
    assert_eq!(api.calls(endpoint::CONFIRM_BOOKING), 0);
}

#[tokio::test]
async fn test_selection_clamps_to_remaining_inventory() {
    let (app, _api, _storage) = app(ScriptedWidget::new(PaymentOutcome::Dismissed));
    open_event(&app).await;
    select(&app, "vip", 5).await;

    let (quantity, total) = app
        .checkout
        .state(|state| {
            (
                state.selection.selection.quantity("vip"),
                state.selection.selection.total(),
            )
        })
        .await;
    assert_eq!(quantity, 2);
    assert_eq!(total, 2);
}
