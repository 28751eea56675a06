//! # Matchday Booking
//!
//! Client for booking football-viewing events: phone/OTP login, an event
//! catalog, per-event ticket selection, a checkout flow that hands payment to
//! an external widget, and the user's booking history.
//!
//! Each screen is a [`Reducer`](matchday_core::reducer::Reducer) run by a
//! [`Store`](matchday_runtime::Store); [`App`] owns the stores and the
//! current [`Route`]. The backend is reached through [`BookingApi`], with
//! [`HttpBookingApi`] as the production implementation.
//!
//! ## Example
//!
//! ```no_run
//! use matchday_booking::{App, CallbackPaymentWidget, Config, Route};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let widget = CallbackPaymentWidget::new(|_request, callbacks| {
//!     // Hand the request to the gateway SDK and resolve `callbacks` from it
//!     callbacks.dismiss();
//! });
//!
//! let app = App::with_http(&config, Arc::new(widget))?;
//! app.restore_session().await?;
//! app.navigate(Route::Catalog).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod app;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod error;
pub mod history;
pub mod payment;
pub mod pricing;
pub mod receipt;
pub mod selection;
pub mod session;
pub mod storage;
pub mod types;

pub use api::{AuthEvent, BookingApi, HttpBookingApi, MockBookingApi};
pub use app::{App, Route};
pub use config::Config;
pub use error::BookingError;
pub use payment::{CallbackPaymentWidget, PaymentOutcome, PaymentRequest, PaymentWidget};
pub use pricing::PriceBreakdown;
pub use receipt::Receipt;
pub use storage::ClientStorage;
