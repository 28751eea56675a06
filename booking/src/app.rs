//! Client application shell
//!
//! Owns one [`Store`] per view-model plus the current [`Route`], and wires
//! cross-cutting behaviour: a revoked session resets every view and sends
//! the user to the landing page; a login started from checkout resumes the
//! booking.

use crate::api::{AuthEvent, BookingApi, HttpBookingApi};
use crate::catalog::{CatalogAction, CatalogEnvironment, CatalogReducer, CatalogState};
use crate::checkout::{CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState};
use crate::config::Config;
use crate::error::BookingError;
use crate::history::{HistoryAction, HistoryEnvironment, HistoryReducer, HistoryState};
use crate::payment::PaymentWidget;
use crate::session::{SessionAction, SessionEnvironment, SessionReducer, SessionState};
use crate::storage::{ClientStorage, FileStorage};
use matchday_core::environment::{Clock, SystemClock};
use matchday_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;

/// Session store
pub type SessionStore = Store<SessionState, SessionAction, SessionEnvironment, SessionReducer>;
/// Catalog store
pub type CatalogStore = Store<CatalogState, CatalogAction, CatalogEnvironment, CatalogReducer>;
/// Booking flow store
pub type CheckoutStore = Store<CheckoutState, CheckoutAction, CheckoutEnvironment, CheckoutReducer>;
/// History store
pub type HistoryStore = Store<HistoryState, HistoryAction, HistoryEnvironment, HistoryReducer>;

/// The booking flow publishes selection changes alongside every step
const CHECKOUT_BROADCAST_CAPACITY: usize = 64;

/// Screens of the client
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Route {
    /// Landing and login
    #[default]
    Landing,
    /// Event catalog
    Catalog,
    /// Booking flow for one event
    Event {
        /// Event id
        event_id: String,
    },
    /// Booking history (requires a session)
    History,
}

/// The booking client
#[derive(Clone)]
pub struct App {
    /// Session and login
    pub session: SessionStore,
    /// Event catalog
    pub catalog: CatalogStore,
    /// Booking flow
    pub checkout: CheckoutStore,
    /// Booking history
    pub history: HistoryStore,
    route: Arc<RwLock<Route>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App").finish_non_exhaustive()
    }
}

impl App {
    /// Assemble the client over any backend
    #[must_use]
    pub fn new(
        config: &Config,
        api: Arc<dyn BookingApi>,
        storage: ClientStorage,
        widget: Arc<dyn PaymentWidget>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session = Store::new(
            SessionState::default(),
            SessionReducer::new(),
            SessionEnvironment {
                api: Arc::clone(&api),
                storage: storage.clone(),
            },
        )
        .named("session");
        let catalog = Store::new(
            CatalogState::new(config.booking.catalog_page_size),
            CatalogReducer::new(),
            CatalogEnvironment {
                api: Arc::clone(&api),
            },
        )
        .named("catalog");
        let checkout = Store::with_broadcast_capacity(
            CheckoutState::default(),
            CheckoutReducer::new(),
            CheckoutEnvironment::new(
                Arc::clone(&api),
                storage,
                widget,
                config.payment.clone(),
            ),
            CHECKOUT_BROADCAST_CAPACITY,
        )
        .named("checkout");
        let history = Store::new(
            HistoryState::new(config.booking.history_page_size),
            HistoryReducer::new(),
            HistoryEnvironment { api, clock },
        )
        .named("history");

        Self {
            session,
            catalog,
            checkout,
            history,
            route: Arc::new(RwLock::new(Route::Landing)),
        }
    }

    /// Assemble the client over the HTTP backend
    ///
    /// Storage is file-backed when a storage directory is configured and
    /// in-memory otherwise. A listener for the backend's [`AuthEvent`]s is
    /// spawned, so this must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the storage directory cannot be
    /// created, or [`BookingError::Network`] if the HTTP client cannot be built.
    pub fn with_http(config: &Config, widget: Arc<dyn PaymentWidget>) -> Result<Self, BookingError> {
        let storage = match &config.storage.dir {
            Some(dir) => ClientStorage::new(Arc::new(FileStorage::open(dir)?)),
            None => ClientStorage::in_memory(),
        };
        let api = HttpBookingApi::new(config, storage.clone())?;
        let auth_events = api.subscribe_auth_events();

        let app = Self::new(config, Arc::new(api), storage, widget, Arc::new(SystemClock));
        app.listen_auth_events(auth_events);
        Ok(app)
    }

    /// React to authentication events until the channel closes
    pub fn listen_auth_events(&self, mut events: broadcast::Receiver<AuthEvent>) -> JoinHandle<()> {
        let app = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Err(error) = app.handle_auth_event(event).await {
                            tracing::warn!(%error, "Failed to apply auth event");
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Auth event listener lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Apply an authentication event to every view
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a store is shutting down
    pub async fn handle_auth_event(&self, event: AuthEvent) -> Result<(), StoreError> {
        match event {
            AuthEvent::Unauthorized { path } => {
                tracing::warn!(%path, "Session revoked, returning to landing");
                self.session.send(SessionAction::Unauthorized).await?.wait().await;
                self.history.send(HistoryAction::Unauthorized).await?;
                *self.route.write().await = Route::Landing;
            },
        }
        Ok(())
    }

    /// Current route
    pub async fn route(&self) -> Route {
        self.route.read().await.clone()
    }

    /// Restore the stored session; call once at start-up
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the session store is shutting down
    pub async fn restore_session(&self) -> Result<(), StoreError> {
        self.session.send(SessionAction::Restore).await?.wait().await;
        Ok(())
    }

    async fn is_authenticated(&self) -> bool {
        self.session.state(SessionState::is_authenticated).await
    }

    /// Switch screens and start the new screen's loads
    ///
    /// Leaving an event abandons its flow and its draft, and so does going
    /// anywhere else while a checkout waits for a login; only
    /// [`App::resume_after_login`] keeps that draft. History without a
    /// session lands on [`Route::Landing`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a store is shutting down
    pub async fn navigate(&self, route: Route) -> Result<(), StoreError> {
        let previous = self.route().await;
        if previous == route {
            return Ok(());
        }
        let login_pending = self.checkout.state(|state| state.login_required).await;
        if login_pending || matches!(previous, Route::Event { .. }) {
            tracing::debug!(login_pending, "Abandoning booking flow");
            self.checkout.send(CheckoutAction::Leave).await?.wait().await;
        }

        let route = match route {
            Route::History if !self.is_authenticated().await => {
                tracing::info!("History needs a session");
                Route::Landing
            },
            route => route,
        };
        tracing::debug!(?previous, ?route, "Navigating");

        match &route {
            Route::Landing => {},
            Route::Catalog => {
                self.catalog.send(CatalogAction::Query).await?;
                if self.is_authenticated().await {
                    self.catalog.send(CatalogAction::LoadFilterOptions).await?;
                }
            },
            Route::Event { event_id } => {
                self.checkout
                    .send(CheckoutAction::LoadEvent {
                        event_id: event_id.clone(),
                        resume: false,
                    })
                    .await?;
            },
            Route::History => {
                self.history.send(HistoryAction::Load).await?;
            },
        }

        *self.route.write().await = route;
        Ok(())
    }

    /// Pay for the current selection as the current session
    ///
    /// Without a session the flow records that a login is needed and the
    /// user is sent to [`Route::Landing`]; the draft survives until
    /// [`App::resume_after_login`] picks it up or the user navigates away.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a store is shutting down
    pub async fn pay(&self) -> Result<(), StoreError> {
        let session = self.session.state(|state| state.session.clone()).await;
        let needs_login = session.is_none();
        let handle = self.checkout.send(CheckoutAction::Pay { session }).await?;

        if needs_login && self.checkout.state(|state| state.login_required).await {
            // Draft is on disk before the user can navigate away
            handle.wait().await;
            *self.route.write().await = Route::Landing;
        }
        Ok(())
    }

    /// Return to an interrupted checkout once the user has logged in
    ///
    /// Returns whether a booking was resumed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a store is shutting down
    pub async fn resume_after_login(&self) -> Result<bool, StoreError> {
        if !self.is_authenticated().await {
            return Ok(false);
        }
        let pending = self
            .checkout
            .state(|state| state.event_id.clone().filter(|_| state.login_required))
            .await;
        let Some(event_id) = pending else {
            return Ok(false);
        };

        tracing::info!(%event_id, "Resuming booking after login");
        self.checkout
            .send(CheckoutAction::LoadEvent {
                event_id: event_id.clone(),
                resume: true,
            })
            .await?;
        *self.route.write().await = Route::Event { event_id };
        Ok(true)
    }

    /// Stop every store and wait for in-flight work such as draft writes
    ///
    /// # Errors
    ///
    /// Returns the first [`StoreError::ShutdownTimeout`]; the remaining
    /// stores are still shut down.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        let results = [
            self.checkout.shutdown(timeout).await,
            self.session.shutdown(timeout).await,
            self.catalog.shutdown(timeout).await,
            self.history.shutdown(timeout).await,
        ];
        results.into_iter().collect()
    }
}
