//! Records to list markup.
//!
//! Rendering is a pure function of the record list and the view flags, so
//! re-rendering the same list always yields the same markup.

use skycast_store::PredictionRecord;

use crate::date::{date_label, long_date, parse_local_date};
use crate::icon::condition_icon;

pub const EMPTY_STATE: &str = r#"<p class="empty-state">No official forecasts yet.</p>"#;
pub const WAITING_TEXT: &str = "Waiting for update...";

/// Escape text for HTML element content and attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Header text: long date of the first record, or the waiting message.
pub fn header_text(records: &[PredictionRecord]) -> String {
    match records.first() {
        Some(first) => parse_local_date(&first.date)
            .map(long_date)
            .unwrap_or_else(|| first.date.clone()),
        None => WAITING_TEXT.to_string(),
    }
}

/// Full content of the `predictions-list` container.
///
/// With `admin` set, each card carries a delete form for its record.
pub fn render_list(records: &[PredictionRecord], admin: bool) -> String {
    if records.is_empty() {
        return EMPTY_STATE.to_string();
    }

    records
        .iter()
        .enumerate()
        .map(|(index, record)| render_card(index, record, admin))
        .collect()
}

/// Inline error shown in place of the list.
pub fn render_error(message: &str) -> String {
    format!(
        r#"<p class="error-state">Could not load forecasts: {}</p>"#,
        html_escape(message)
    )
}

fn render_card(index: usize, record: &PredictionRecord, admin: bool) -> String {
    let notes = if record.notes.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="note">{}</p>"#, html_escape(&record.notes))
    };

    let delete = if admin {
        format!(
            r#"<form class="delete-form" method="post" action="/admin/predictions/{}/delete"><button type="submit" class="delete-btn">Delete</button></form>"#,
            html_escape(&record.reference(index).to_string())
        )
    } else {
        String::new()
    };

    format!(
        r#"<div class="prediction-card"><div class="weather-icon">{icon}</div><div class="prediction-details"><h4>{condition} <span class="date-range">({range})</span></h4><p class="temp">{temperature}°C</p>{notes}</div>{delete}</div>"#,
        icon = condition_icon(&record.condition),
        condition = html_escape(&record.condition),
        range = html_escape(&date_label(&record.date, record.to_date.as_deref())),
        temperature = html_escape(&record.temperature),
        notes = notes,
        delete = delete,
    )
}
