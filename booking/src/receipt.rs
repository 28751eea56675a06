//! Ticket receipts
//!
//! Pure rendering of fetched booking data into a standalone SVG document.
//! Only [`Receipt::export`] touches the filesystem.

use crate::error::BookingError;
use crate::pricing::format_inr;
use crate::types::{BookingHistoryEntry, ConfirmedBooking};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const WIDTH: u32 = 600;
const ACCENT: &str = "#ff0033";

/// Everything printed on a receipt
#[derive(Clone, Debug, PartialEq)]
pub struct Receipt {
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
    /// Amount paid
    pub amount: f64,
    /// Organizer name
    pub organizer: Option<String>,
}

impl Receipt {
    /// Receipt for a past booking
    #[must_use]
    pub fn from_history(entry: &BookingHistoryEntry) -> Self {
        Self {
            booking_id: entry.booking_id.clone(),
            event_name: entry.event_name.clone(),
            location: entry.location.clone(),
            start: entry.start,
            ticket_count: entry.ticket_count,
            amount: entry.amount,
            organizer: Some(entry.organizer.name.clone()).filter(|name| !name.trim().is_empty()),
        }
    }

    /// Receipt for a booking just confirmed
    #[must_use]
    pub fn from_confirmed(booking: &ConfirmedBooking) -> Self {
        Self {
            booking_id: booking.booking_id.clone(),
            event_name: booking.event_name.clone(),
            location: booking.location.clone(),
            start: booking.start,
            ticket_count: booking.ticket_count,
            amount: booking.amount,
            organizer: Some(booking.organizer.clone()).filter(|name| !name.trim().is_empty()),
        }
    }

    /// File name used by [`Receipt::export`]
    #[must_use]
    pub fn file_name(&self) -> String {
        let id: String = self
            .booking_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("WTF-Ticket-{id}.svg")
    }

    /// Render as an SVG document; times are printed in UTC
    #[must_use]
    pub fn render_svg(&self) -> String {
        let date = self.start.format("%a, %b %-d, %Y");
        let time = self.start.format("%I:%M %p UTC");
        let height = if self.organizer.is_some() { 560 } else { 500 };

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height}" viewBox="0 0 {WIDTH} {height}">"#
        );
        let _ = writeln!(svg, r##"  <rect width="100%" height="100%" rx="24" fill="#0a0a0a"/>"##);
        let _ = writeln!(
            svg,
            r##"  <g font-family="Inter, 'Segoe UI', sans-serif" fill="#ffffff">"##
        );

        line(&mut svg, 40, 70, 30, "800", None, &self.event_name);
        line(&mut svg, 40, 120, 12, "400", Some("#999999"), "DATE & TIME");
        line(&mut svg, 40, 145, 18, "600", None, &date.to_string());
        line(&mut svg, 40, 172, 22, "700", None, &time.to_string());
        line(&mut svg, 420, 120, 12, "400", Some("#999999"), "TICKETS");
        line(&mut svg, 420, 170, 44, "800", Some(ACCENT), &self.ticket_count.to_string());
        line(&mut svg, 40, 225, 12, "400", Some("#999999"), "LOCATION");
        line(&mut svg, 40, 250, 16, "400", None, &self.location);
        line(&mut svg, 40, 310, 12, "400", Some("#999999"), "BOOKING ID");
        let _ = writeln!(
            svg,
            r#"    <text x="40" y="350" font-size="30" font-weight="700" font-family="'Courier New', monospace">{}</text>"#,
            escape(&self.booking_id)
        );
        line(
            &mut svg,
            40,
            385,
            14,
            "400",
            Some("#666666"),
            &format!("Amount: {}", format_inr(self.amount)),
        );

        let mut footer_y = 450;
        if let Some(organizer) = &self.organizer {
            line(&mut svg, 40, 430, 12, "400", Some("#999999"), "ORGANIZED BY");
            line(&mut svg, 40, 455, 18, "600", None, organizer);
            footer_y = 510;
        }

        let _ = writeln!(
            svg,
            r#"    <text x="{}" y="{footer_y}" text-anchor="middle" font-size="24" font-weight="800" fill="{ACCENT}">WHATHEFOOTBALL</text>"#,
            WIDTH / 2
        );
        let _ = writeln!(
            svg,
            r##"    <text x="{}" y="{}" text-anchor="middle" font-size="14" fill="#666666">Powered by WTF! Platform</text>"##,
            WIDTH / 2,
            footer_y + 24
        );
        svg.push_str("  </g>\n</svg>\n");
        svg
    }

    /// Write the SVG into `dir`, returning the file's path
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Storage`] if the file cannot be written
    pub fn export(&self, dir: &Path) -> Result<PathBuf, BookingError> {
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render_svg()).map_err(|error| {
            tracing::warn!(path = %path.display(), %error, "Failed to write receipt");
            BookingError::Storage(error.to_string())
        })?;
        tracing::info!(path = %path.display(), booking_id = %self.booking_id, "Receipt exported");
        Ok(path)
    }
}

/// Append one escaped `<text>` element
fn line(svg: &mut String, x: u32, y: u32, size: u32, weight: &str, fill: Option<&str>, text: &str) {
    let fill = fill.map(|fill| format!(r#" fill="{fill}""#)).unwrap_or_default();
    let text = escape(text);
    let _ = writeln!(
        svg,
        r#"    <text x="{x}" y="{y}" font-size="{size}" font-weight="{weight}"{fill}>{text}</text>"#
    );
}

/// Escape XML special characters
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
