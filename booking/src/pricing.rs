//! Price computation
//!
//! Prices are always derived on demand from a selection and the event's fee
//! configuration; nothing here is cached.

use crate::types::{BookingHistoryEntry, FeeConfig, TicketSelection, TicketType};
use serde::{Deserialize, Serialize};

/// Half of the smallest currency subunit
const MINOR_UNIT_TOLERANCE: f64 = 0.005;

/// Net price plus surcharges
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Σ unit price × quantity
    pub net: f64,
    /// net × fee rate
    pub platform_fee: f64,
    /// platform fee × tax rate
    pub tax: f64,
    /// net + platform fee + tax
    pub total: f64,
}

impl PriceBreakdown {
    /// Total in the smallest currency subunit
    #[must_use]
    pub fn total_minor_units(&self) -> u64 {
        to_minor_units(self.total)
    }
}

/// Price a selection
///
/// Entries referring to unknown ticket types contribute nothing.
#[must_use]
pub fn price_breakdown(
    selection: &TicketSelection,
    ticket_types: &[TicketType],
    fees: FeeConfig,
) -> PriceBreakdown {
    let net: f64 = selection
        .iter()
        .filter_map(|(id, quantity)| {
            ticket_types
                .iter()
                .find(|ticket| ticket.id == id)
                .map(|ticket| ticket.unit_price * f64::from(quantity))
        })
        .sum();

    let platform_fee = net * fees.fee_rate;
    let tax = platform_fee * fees.tax_rate;

    PriceBreakdown {
        net,
        platform_fee,
        tax,
        total: net + platform_fee + tax,
    }
}

/// Rebuild the breakdown of a past booking from its recorded amounts
#[must_use]
pub fn reconstruct(entry: &BookingHistoryEntry) -> PriceBreakdown {
    PriceBreakdown {
        net: entry.amount - entry.platform_fees - entry.tax,
        platform_fee: entry.platform_fees,
        tax: entry.tax,
        total: entry.amount,
    }
}

/// Convert a major-unit amount to minor units, rounding half away from zero
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to >= 0 first
pub fn to_minor_units(amount: f64) -> u64 {
    (amount.max(0.0) * 100.0).round() as u64
}

/// Whether two amounts are the same payable sum
#[must_use]
pub fn amounts_agree(a: f64, b: f64) -> bool {
    (a - b).abs() <= MINOR_UNIT_TOLERANCE
}

/// Format an amount for display
#[must_use]
pub fn format_inr(amount: f64) -> String {
    format!("₹{amount:.2}")
}
