//! Booking flow: event detail → seat selection → checkout → payment → confirmation
//!
//! The flow owns the event's [`SelectionState`] and delegates selection
//! changes to [`SelectionReducer`]. Once payment starts, the price breakdown
//! and payer are locked; all later network outcomes are applied only while
//! the flow is still [`CheckoutStep::Processing`].

use crate::api::{BookingApi, CheckoutRequest, ConfirmRequest};
use crate::config::PaymentConfig;
use crate::error::BookingError;
use crate::payment::{PaymentOutcome, PaymentRequest, PaymentWidget};
use crate::pricing::{PriceBreakdown, amounts_agree, price_breakdown};
use crate::selection::{SelectionAction, SelectionEnvironment, SelectionReducer, SelectionState};
use crate::storage::ClientStorage;
use crate::types::{
    CheckoutHandle, CheckoutLine, ConfirmedBooking, EventDetail, Session, TicketSelection,
};
use matchday_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use std::sync::Arc;

/// Where the user is in the flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckoutStep {
    /// Event information
    #[default]
    Details,
    /// Ticket selection
    Seats,
    /// Price review
    Checkout,
    /// Payment in flight
    Processing,
    /// Booking confirmed
    Success,
}

/// Values fixed when payment starts
#[derive(Clone, Debug, PartialEq)]
pub struct LockedPayment {
    /// Breakdown shown when the user paid
    pub breakdown: PriceBreakdown,
    /// `breakdown.total` in minor units
    pub amount_minor: u64,
    /// Who is paying
    pub payer: Session,
    /// Order created for this payment
    pub handle: Option<CheckoutHandle>,
}

/// Booking flow state
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckoutState {
    /// Event being booked
    pub event_id: Option<String>,
    /// Loaded event
    pub detail: Option<EventDetail>,
    /// Current step
    pub step: CheckoutStep,
    /// Ticket selection
    pub selection: SelectionState,
    /// Event detail is loading
    pub loading: bool,
    /// Jump to checkout once the event loads (return from login)
    pub resume: bool,
    /// Payment was attempted without a session
    pub login_required: bool,
    /// Informational message
    pub notice: Option<String>,
    /// Last error
    pub error: Option<BookingError>,
    /// Set while payment is in flight
    pub locked: Option<LockedPayment>,
    /// Result of a successful booking
    pub confirmed: Option<ConfirmedBooking>,
}

impl CheckoutState {
    /// Current breakdown, derived from the selection
    #[must_use]
    pub fn price_breakdown(&self) -> Option<PriceBreakdown> {
        self.detail
            .as_ref()
            .map(|detail| price_breakdown(&self.selection.selection, &detail.ticket_types, detail.fees))
    }

    /// Whether the user can still edit the selection
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        matches!(
            self.step,
            CheckoutStep::Details | CheckoutStep::Seats | CheckoutStep::Checkout
        )
    }

    fn is_current(&self, event_id: &str) -> bool {
        self.event_id.as_deref() == Some(event_id)
    }

    fn checkout_lines(&self) -> Vec<CheckoutLine> {
        self.selection
            .selection
            .iter()
            .map(|(id, quantity)| CheckoutLine {
                ticket_type_id: id.to_string(),
                quantity,
            })
            .collect()
    }

    /// Abandon the in-flight payment and return to review
    fn back_to_review(&mut self) {
        self.step = CheckoutStep::Checkout;
        self.locked = None;
    }
}

/// Booking flow actions
#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutAction {
    /// Open an event
    LoadEvent {
        /// Event id
        event_id: String,
        /// Go straight to checkout if a draft survives
        resume: bool,
    },
    /// Event detail and saved draft arrived
    EventLoaded {
        /// Event id
        event_id: String,
        /// Detail
        detail: Box<EventDetail>,
        /// Draft persisted for the event
        draft: Option<TicketSelection>,
    },
    /// Event detail could not be loaded
    EventLoadFailed {
        /// Event id
        event_id: String,
        /// Cause
        error: BookingError,
    },
    /// Selection change
    Selection(SelectionAction),
    /// Details → Seats
    ProceedToSeats,
    /// Seats → Checkout
    ProceedToCheckout,
    /// One step back
    Back,
    /// Start payment as `session`; `None` means nobody is logged in
    Pay {
        /// Current session
        session: Option<Session>,
    },
    /// Order created
    CheckoutCreated {
        /// Order handle
        handle: CheckoutHandle,
    },
    /// Order creation failed
    CheckoutFailed {
        /// Cause
        error: BookingError,
    },
    /// The widget reported a successful payment
    PaymentCompleted {
        /// Gateway transaction id
        transaction_id: String,
    },
    /// The widget was closed without paying
    PaymentDismissed,
    /// Backend confirmed the booking
    BookingConfirmed {
        /// Booking
        booking: ConfirmedBooking,
    },
    /// Backend did not confirm a paid booking
    ConfirmationFailed {
        /// Cause
        error: BookingError,
    },
    /// The user left the event
    Leave,
}

/// Booking flow dependencies
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Backend
    pub api: Arc<dyn BookingApi>,
    /// Drafts
    pub storage: ClientStorage,
    /// Payment widget
    pub widget: Arc<dyn PaymentWidget>,
    /// Merchant settings
    pub payment: PaymentConfig,
    /// Selection engine dependencies
    pub selection: SelectionEnvironment,
}

impl CheckoutEnvironment {
    /// Assemble an environment sharing one storage
    #[must_use]
    pub fn new(
        api: Arc<dyn BookingApi>,
        storage: ClientStorage,
        widget: Arc<dyn PaymentWidget>,
        payment: PaymentConfig,
    ) -> Self {
        Self {
            api,
            selection: SelectionEnvironment {
                storage: storage.clone(),
            },
            storage,
            widget,
            payment,
        }
    }
}

impl std::fmt::Debug for CheckoutEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutEnvironment")
            .field("payment", &self.payment)
            .finish_non_exhaustive()
    }
}

/// Booking flow reducer
#[derive(Clone, Debug, Default)]
pub struct CheckoutReducer {
    selection: SelectionReducer,
}

type Effects = SmallVec<[Effect<CheckoutAction>; 4]>;

impl CheckoutReducer {
    /// Create a checkout reducer
    #[must_use]
    pub const fn new() -> Self {
        Self {
            selection: SelectionReducer::new(),
        }
    }

    fn delegate(
        &self,
        state: &mut CheckoutState,
        action: SelectionAction,
        env: &CheckoutEnvironment,
    ) -> Effects {
        self.selection
            .reduce(&mut state.selection, action, &env.selection)
            .into_iter()
            .map(|effect| effect.map(CheckoutAction::Selection))
            .collect()
    }

    fn load_event(event_id: String, env: &CheckoutEnvironment) -> Effect<CheckoutAction> {
        let api = Arc::clone(&env.api);
        let storage = env.storage.clone();

        async_effect! {
            match api.event_detail(event_id.clone()).await {
                Ok(detail) => {
                    let draft = storage.load_draft(&event_id);
                    Some(CheckoutAction::EventLoaded {
                        event_id,
                        detail: Box::new(detail),
                        draft,
                    })
                },
                Err(error) => Some(CheckoutAction::EventLoadFailed { event_id, error }),
            }
        }
    }

    fn pay(state: &mut CheckoutState, session: Option<Session>, env: &CheckoutEnvironment) -> Effects {
        if state.step != CheckoutStep::Checkout {
            tracing::debug!(step = ?state.step, "Ignoring payment outside checkout");
            return smallvec![Effect::None];
        }
        let (Some(event_id), Some(breakdown)) = (state.event_id.clone(), state.price_breakdown())
        else {
            return smallvec![Effect::None];
        };
        if state.selection.selection.is_empty() {
            state.notice = Some("Please select at least one ticket".to_string());
            return smallvec![Effect::None];
        }

        let Some(payer) = session else {
            tracing::info!(%event_id, "Payment needs a login, keeping draft");
            state.login_required = true;
            state.notice = Some("Please log in to continue".to_string());
            let storage = env.storage.clone();
            let selection = state.selection.selection.clone();
            return smallvec![async_effect! {
                if let Err(error) = storage.save_draft(&event_id, &selection) {
                    tracing::warn!(%event_id, %error, "Failed to persist booking draft");
                }
                None
            }];
        };

        let request = CheckoutRequest {
            event_id: event_id.clone(),
            lines: state.checkout_lines(),
            breakdown,
        };
        state.step = CheckoutStep::Processing;
        state.login_required = false;
        state.notice = None;
        state.error = None;
        state.locked = Some(LockedPayment {
            breakdown,
            amount_minor: breakdown.total_minor_units(),
            payer,
            handle: None,
        });
        tracing::info!(%event_id, total = breakdown.total, "Creating checkout");

        let api = Arc::clone(&env.api);
        smallvec![async_effect! {
            match api.create_checkout(request).await {
                Ok(handle) => Some(CheckoutAction::CheckoutCreated { handle }),
                Err(error) => Some(CheckoutAction::CheckoutFailed { error }),
            }
        }]
    }

    fn checkout_created(
        state: &mut CheckoutState,
        handle: CheckoutHandle,
        env: &CheckoutEnvironment,
    ) -> Effects {
        let Some(locked) = state.locked.as_mut().filter(|locked| locked.handle.is_none()) else {
            return smallvec![Effect::None];
        };

        if !amounts_agree(handle.amount, locked.breakdown.total) {
            tracing::warn!(
                expected = locked.breakdown.total,
                received = handle.amount,
                "Checkout amount does not match the reviewed total"
            );
            state.error = Some(BookingError::Fetch(
                "The payable amount changed. Please review your order and try again.".to_string(),
            ));
            state.back_to_review();
            return smallvec![Effect::None];
        }

        let request = PaymentRequest::new(&env.payment, &handle, locked.amount_minor, &locked.payer);
        locked.handle = Some(handle);
        let widget = Arc::clone(&env.widget);

        smallvec![async_effect! {
            match widget.open(request).await {
                PaymentOutcome::Completed { transaction_id } => {
                    Some(CheckoutAction::PaymentCompleted { transaction_id })
                },
                PaymentOutcome::Dismissed => Some(CheckoutAction::PaymentDismissed),
            }
        }]
    }
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per flow transition
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let processing = state.step == CheckoutStep::Processing;

        match action {
            CheckoutAction::LoadEvent { event_id, resume } => {
                if processing {
                    tracing::warn!(%event_id, "Ignoring navigation while payment is in flight");
                    return smallvec![Effect::None];
                }
                let selection = std::mem::take(&mut state.selection);
                *state = CheckoutState {
                    event_id: Some(event_id.clone()),
                    selection,
                    loading: true,
                    resume,
                    ..CheckoutState::default()
                };
                smallvec![Self::load_event(event_id, env)]
            },

            CheckoutAction::EventLoaded {
                event_id,
                detail,
                draft,
            } => {
                if !state.is_current(&event_id) {
                    tracing::debug!(%event_id, "Dropping stale event detail");
                    return smallvec![Effect::None];
                }
                let detail = *detail;
                let load = SelectionAction::Load {
                    event_id,
                    ticket_types: detail.ticket_types.clone(),
                    max_tickets_per_order: detail.max_tickets_per_order,
                    restored: draft,
                };
                state.detail = Some(detail);
                state.loading = false;
                let effects = self.delegate(state, load, env);

                state.step = if state.resume && !state.selection.selection.is_empty() {
                    CheckoutStep::Checkout
                } else {
                    CheckoutStep::Details
                };
                state.resume = false;
                effects
            },

            CheckoutAction::EventLoadFailed { event_id, error } => {
                if state.is_current(&event_id) {
                    tracing::warn!(%event_id, %error, "Failed to load event");
                    state.loading = false;
                    state.error = Some(error);
                }
                smallvec![Effect::None]
            },

            CheckoutAction::Selection(action) => {
                let announcement = matches!(action, SelectionAction::SelectionChanged { .. });
                if !announcement && !state.is_editable() {
                    return smallvec![Effect::None];
                }
                self.delegate(state, action, env)
            },

            CheckoutAction::ProceedToSeats => {
                if state.step == CheckoutStep::Details {
                    state.step = CheckoutStep::Seats;
                }
                smallvec![Effect::None]
            },

            CheckoutAction::ProceedToCheckout => {
                if state.step == CheckoutStep::Seats {
                    if state.selection.selection.is_empty() {
                        state.notice = Some("Please select at least one ticket".to_string());
                    } else {
                        state.notice = None;
                        state.step = CheckoutStep::Checkout;
                    }
                }
                smallvec![Effect::None]
            },

            CheckoutAction::Back => {
                state.step = match state.step {
                    CheckoutStep::Seats => CheckoutStep::Details,
                    CheckoutStep::Checkout => CheckoutStep::Seats,
                    other => other,
                };
                state.login_required = false;
                smallvec![Effect::None]
            },

            CheckoutAction::Pay { session } => Self::pay(state, session, env),

            CheckoutAction::CheckoutCreated { handle } => {
                if !processing {
                    return smallvec![Effect::None];
                }
                Self::checkout_created(state, handle, env)
            },

            CheckoutAction::CheckoutFailed { error } => {
                if processing {
                    tracing::warn!(%error, "Checkout creation failed");
                    state.error = Some(error);
                    state.back_to_review();
                }
                smallvec![Effect::None]
            },

            CheckoutAction::PaymentCompleted { transaction_id } => {
                let Some(checkout) = state
                    .locked
                    .as_ref()
                    .and_then(|locked| locked.handle.clone())
                    .filter(|_| processing)
                else {
                    return smallvec![Effect::None];
                };
                tracing::info!(checkout_id = %checkout.id, "Payment completed, confirming booking");

                let api = Arc::clone(&env.api);
                smallvec![async_effect! {
                    let request = ConfirmRequest { checkout, transaction_id };
                    match api.confirm_booking(request).await {
                        Ok(booking) => Some(CheckoutAction::BookingConfirmed { booking }),
                        Err(error) => Some(CheckoutAction::ConfirmationFailed { error }),
                    }
                }]
            },

            CheckoutAction::PaymentDismissed => {
                if processing {
                    tracing::info!("Payment dismissed");
                    state.notice = Some("Payment cancelled".to_string());
                    state.back_to_review();
                }
                smallvec![Effect::None]
            },

            CheckoutAction::BookingConfirmed { booking } => {
                if !processing {
                    return smallvec![Effect::None];
                }
                tracing::info!(booking_id = %booking.booking_id, "Booking confirmed");
                state.step = CheckoutStep::Success;
                state.confirmed = Some(booking);
                state.locked = None;
                state.error = None;
                // Clearing the selection also drops the persisted draft
                self.delegate(state, SelectionAction::Clear, env)
            },

            CheckoutAction::ConfirmationFailed { error } => {
                if processing {
                    tracing::error!(%error, "Paid booking was not confirmed");
                    state.error = Some(BookingError::ConfirmationFailed(error.to_string()));
                    state.back_to_review();
                }
                smallvec![Effect::None]
            },

            CheckoutAction::Leave => {
                if processing {
                    tracing::warn!("Ignoring leave while payment is in flight");
                    return smallvec![Effect::None];
                }
                let event_id = state.event_id.take();
                *state = CheckoutState::default();

                match event_id {
                    Some(event_id) => {
                        let storage = env.storage.clone();
                        smallvec![async_effect! {
                            storage.clear_draft(&event_id);
                            None
                        }]
                    },
                    None => smallvec![Effect::None],
                }
            },
        }
    }
}
