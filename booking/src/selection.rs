//! Ticket selection engine
//!
//! Holds the per-event ticket inventory and the user's chosen quantities.
//! Every accepted change is persisted as the event's draft and announced as
//! [`SelectionAction::SelectionChanged`]; pricing is left to observers.

use crate::storage::ClientStorage;
use crate::types::{TicketSelection, TicketType};
use matchday_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};

/// Selection state for one event
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectionState {
    /// Event the inventory belongs to
    pub event_id: Option<String>,
    /// Ticket types on sale
    pub ticket_types: Vec<TicketType>,
    /// Per-order cap
    pub max_tickets_per_order: u32,
    /// Chosen quantities
    pub selection: TicketSelection,
    /// Why the last change was rejected
    pub notice: Option<String>,
}

impl SelectionState {
    fn ticket_type(&self, id: &str) -> Option<&TicketType> {
        self.ticket_types.iter().find(|ticket| ticket.id == id)
    }

    /// Whether `selection` fits this inventory and cap
    #[must_use]
    pub fn admits(&self, selection: &TicketSelection) -> bool {
        selection.total() <= self.max_tickets_per_order
            && selection.iter().all(|(id, quantity)| {
                self.ticket_type(id)
                    .is_some_and(|ticket| quantity <= ticket.available_quantity())
            })
    }
}

/// Selection actions
#[derive(Clone, Debug, PartialEq)]
pub enum SelectionAction {
    /// Install an event's inventory
    ///
    /// A different event id resets the selection; `restored` is applied
    /// only if it still fits the inventory.
    Load {
        /// Event id
        event_id: String,
        /// Ticket types on sale
        ticket_types: Vec<TicketType>,
        /// Per-order cap
        max_tickets_per_order: u32,
        /// Draft to restore
        restored: Option<TicketSelection>,
    },
    /// Change one quantity by `delta`
    SetQuantity {
        /// Ticket type id
        ticket_type_id: String,
        /// Signed change
        delta: i64,
    },
    /// 0 → 1, N → 0
    Toggle {
        /// Ticket type id
        ticket_type_id: String,
    },
    /// Drop everything
    Clear,
    /// The selection changed (emitted by the engine)
    SelectionChanged {
        /// Event id
        event_id: String,
        /// New selection
        selection: TicketSelection,
    },
}

/// Selection dependencies
#[derive(Clone, Debug)]
pub struct SelectionEnvironment {
    /// Draft persistence
    pub storage: ClientStorage,
}

/// Selection reducer
#[derive(Clone, Debug, Default)]
pub struct SelectionReducer;

impl SelectionReducer {
    /// Create a selection reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Persist the draft and announce the change
    fn changed(state: &SelectionState, env: &SelectionEnvironment) -> Effect<SelectionAction> {
        let Some(event_id) = state.event_id.clone() else {
            return Effect::None;
        };
        let selection = state.selection.clone();
        let storage = env.storage.clone();

        async_effect! {
            if let Err(error) = storage.save_draft(&event_id, &selection) {
                tracing::warn!(%event_id, %error, "Failed to persist booking draft");
            }
            Some(SelectionAction::SelectionChanged { event_id, selection })
        }
    }

    /// Apply a signed change; returns whether the selection changed
    fn apply_delta(state: &mut SelectionState, ticket_type_id: &str, delta: i64) -> bool {
        let Some((label, can_increase, available)) = state
            .ticket_type(ticket_type_id)
            .map(|ticket| (ticket.label.clone(), ticket.can_increase(), ticket.available_quantity()))
        else {
            tracing::debug!(ticket_type_id, "Ignoring change for unknown ticket type");
            return false;
        };

        let current = state.selection.quantity(ticket_type_id);
        if delta > 0 && !can_increase {
            state.notice = Some(format!("{label} is sold out"));
            return false;
        }

        let wanted = i64::from(current)
            .saturating_add(delta)
            .clamp(0, i64::from(available));
        let new_quantity = u32::try_from(wanted).unwrap_or(0);
        if new_quantity == current {
            if delta > 0 {
                state.notice = Some(format!("Only {available} {label} tickets left"));
            }
            return false;
        }

        let new_total = state.selection.total() - current + new_quantity;
        if new_quantity > current && new_total > state.max_tickets_per_order {
            state.notice = Some(format!(
                "You can book at most {} tickets per order",
                state.max_tickets_per_order
            ));
            return false;
        }

        state.selection.set(ticket_type_id, new_quantity);
        state.notice = None;
        true
    }
}

impl Reducer for SelectionReducer {
    type State = SelectionState;
    type Action = SelectionAction;
    type Environment = SelectionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            SelectionAction::Load {
                event_id,
                ticket_types,
                max_tickets_per_order,
                restored,
            } => {
                let same_event = state.event_id.as_deref() == Some(event_id.as_str());
                let previous = if same_event {
                    std::mem::take(&mut state.selection)
                } else {
                    TicketSelection::new()
                };

                state.event_id = Some(event_id);
                state.ticket_types = ticket_types;
                state.max_tickets_per_order = max_tickets_per_order;
                state.notice = None;

                let candidate = restored.unwrap_or(previous);
                state.selection = if state.admits(&candidate) {
                    candidate
                } else {
                    tracing::info!("Discarding selection that no longer fits the inventory");
                    TicketSelection::new()
                };

                smallvec![Self::changed(state, env)]
            },

            SelectionAction::SetQuantity {
                ticket_type_id,
                delta,
            } => {
                if Self::apply_delta(state, &ticket_type_id, delta) {
                    smallvec![Self::changed(state, env)]
                } else {
                    smallvec![Effect::None]
                }
            },

            SelectionAction::Toggle { ticket_type_id } => {
                let current = i64::from(state.selection.quantity(&ticket_type_id));
                let delta = if current > 0 { -current } else { 1 };
                if Self::apply_delta(state, &ticket_type_id, delta) {
                    smallvec![Self::changed(state, env)]
                } else {
                    smallvec![Effect::None]
                }
            },

            SelectionAction::Clear => {
                if state.selection.is_empty() {
                    return smallvec![Effect::None];
                }
                state.selection = TicketSelection::new();
                state.notice = None;
                smallvec![Self::changed(state, env)]
            },

            // Already applied; observers react to it
            SelectionAction::SelectionChanged { .. } => smallvec![Effect::None],
        }
    }
}
