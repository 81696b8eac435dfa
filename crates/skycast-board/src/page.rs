//! In-memory page models and the HTML documents built from them.
//!
//! Each view keeps the last rendered list content and header text. The
//! driver overwrites them wholesale; the server wraps them into a full
//! document on every request.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use parking_lot::RwLock;
use skycast_store::PredictionRecord;

use crate::admin::SubmissionForm;
use crate::date::long_date;
use crate::render::{header_text, html_escape, render_error, render_list, WAITING_TEXT};

/// The three pages of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// Header with the forecast date, then the list
    Index,
    /// Today's date inline, then the list
    Other,
    /// Gate, dashboard form and the list with delete controls
    Admin,
}

impl View {
    pub const ALL: [View; 3] = [View::Index, View::Other, View::Admin];

    pub fn has_header(self) -> bool {
        self == View::Index
    }

    pub fn is_admin(self) -> bool {
        self == View::Admin
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            View::Index => "index",
            View::Other => "other",
            View::Admin => "admin",
        };
        f.write_str(name)
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "index" => Ok(View::Index),
            "other" => Ok(View::Other),
            "admin" => Ok(View::Admin),
            other => Err(format!("unknown view: {} (expected index, other or admin)", other)),
        }
    }
}

/// Rendered state of one view.
#[derive(Debug, Clone, PartialEq)]
pub struct PageModel {
    pub view: View,
    /// Text of `target-date-display`, for views that have it
    pub header: Option<String>,
    /// Content of `predictions-list`
    pub list_html: String,
}

impl PageModel {
    pub fn new(view: View) -> Self {
        Self {
            view,
            header: view.has_header().then(|| WAITING_TEXT.to_string()),
            list_html: String::new(),
        }
    }

    /// Replace the list (and header) with a fresh rendering of `records`.
    pub fn apply_records(&mut self, records: &[PredictionRecord]) {
        if self.view.has_header() {
            self.header = Some(header_text(records));
        }
        self.list_html = render_list(records, self.view.is_admin());
    }

    /// Replace the list with an inline error. The header keeps its text.
    pub fn apply_error(&mut self, message: &str) {
        self.list_html = render_error(message);
    }
}

/// All three views.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSet {
    index: PageModel,
    other: PageModel,
    admin: PageModel,
}

impl Default for PageSet {
    fn default() -> Self {
        Self {
            index: PageModel::new(View::Index),
            other: PageModel::new(View::Other),
            admin: PageModel::new(View::Admin),
        }
    }
}

impl PageSet {
    /// Fresh page set behind a lock, ready to hand to the driver and server.
    pub fn shared() -> SharedPages {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn get(&self, view: View) -> &PageModel {
        match view {
            View::Index => &self.index,
            View::Other => &self.other,
            View::Admin => &self.admin,
        }
    }

    fn all_mut(&mut self) -> [&mut PageModel; 3] {
        [&mut self.index, &mut self.other, &mut self.admin]
    }

    pub fn apply_records(&mut self, records: &[PredictionRecord]) {
        for page in self.all_mut() {
            page.apply_records(records);
        }
    }

    /// Like `apply_records`, leaving the admin view as it was.
    pub fn apply_public_records(&mut self, records: &[PredictionRecord]) {
        self.index.apply_records(records);
        self.other.apply_records(records);
    }

    pub fn apply_error(&mut self, message: &str) {
        for page in self.all_mut() {
            page.apply_error(message);
        }
    }
}

/// Page models shared between the driver and the server.
pub type SharedPages = Arc<RwLock<PageSet>>;

/// Per-request admin page state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminPanel {
    /// Gate passed; dashboard shown instead of the login section
    pub unlocked: bool,
    /// Last passcode was wrong
    pub login_error: bool,
    /// Alert text from the last action
    pub alert: Option<String>,
    /// Values to pre-fill in the submission form
    pub draft: SubmissionForm,
}

/// Today's local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Build the full HTML document for a view.
///
/// `today` fills the inline date of the other view.
pub fn document(page: &PageModel, today: NaiveDate, panel: &AdminPanel) -> String {
    let top = match page.view {
        View::Index => format!(
            r#"<header class="board-header"><h1>Official Forecast</h1><h2 id="target-date-display">{}</h2></header>"#,
            html_escape(page.header.as_deref().unwrap_or(WAITING_TEXT))
        ),
        View::Other => format!(
            r#"<header class="board-header"><h1>Weather Board</h1><p>Today is <span id="target-date-inline">{}</span></p></header>"#,
            html_escape(&long_date(today))
        ),
        View::Admin => admin_sections(panel),
    };

    let list = if page.view.is_admin() && !panel.unlocked {
        String::new()
    } else {
        format!(
            r#"<section class="predictions"><h3>Forecasts</h3><div id="predictions-list">{}</div></section>"#,
            page.list_html
        )
    };

    let alert = panel
        .alert
        .as_deref()
        .filter(|_| page.view.is_admin())
        .map(|text| format!(r#"<div id="alert" class="alert" role="alert">{}</div>"#, html_escape(text)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Skycast</title>
    <style>{css}</style>
</head>
<body>
    <nav><a href="/">Forecast</a> <a href="/other">Today</a> <a href="/admin">Admin</a></nav>
    <main>
        {alert}
        {top}
        {list}
    </main>
</body>
</html>"#,
        css = CSS,
        alert = alert,
        top = top,
        list = list,
    )
}

fn hidden(flag: bool) -> &'static str {
    if flag {
        r#" style="display: none;""#
    } else {
        ""
    }
}

fn admin_sections(panel: &AdminPanel) -> String {
    let draft = &panel.draft;
    let error = if panel.login_error {
        r#"<p id="login-error" class="login-error">Incorrect password.</p>"#
    } else {
        r#"<p id="login-error" class="login-error" style="display: none;"></p>"#
    };

    format!(
        r#"<section id="login-section"{login_hidden}>
            <h2>Admin Login</h2>
            <form method="post" action="/admin/login">
                <input type="password" id="admin-password" name="password" value="" autocomplete="off">
                <button type="submit" id="login-btn">Login</button>
            </form>
            {error}
        </section>
        <section id="dashboard-section"{dashboard_hidden}>
            <h2>Publish Forecast</h2>
            <form id="prediction-form" method="post" action="/admin/predictions">
                <label>Date <input type="date" id="date" name="date" value="{date}"></label>
                <label>To date <input type="date" id="toDate" name="toDate" value="{to_date}"></label>
                <label>Condition <input type="text" id="condition" name="condition" value="{condition}"></label>
                <label>Temperature (°C) <input type="number" id="temperature" name="temperature" value="{temperature}"></label>
                <label>Notes <textarea id="notes" name="notes">{notes}</textarea></label>
                <button type="submit">Publish</button>
            </form>
        </section>"#,
        login_hidden = hidden(panel.unlocked),
        dashboard_hidden = hidden(!panel.unlocked),
        error = error,
        date = html_escape(&draft.date),
        to_date = html_escape(&draft.to_date),
        condition = html_escape(&draft.condition),
        temperature = html_escape(&draft.temperature),
        notes = html_escape(&draft.notes),
    )
}

const CSS: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 720px; padding: 1rem; color: #222; }
nav a { margin-right: 1rem; }
.prediction-card { display: flex; gap: 1rem; align-items: center; border: 1px solid #ddd; border-radius: 8px; padding: 0.75rem; margin: 0.5rem 0; }
.weather-icon { font-size: 2rem; }
.date-range { font-size: 0.8rem; opacity: 0.6; font-weight: normal; }
.temp { font-weight: bold; }
.note { color: #555; }
.empty-state, .error-state { color: #777; font-style: italic; }
.error-state { color: #a33; }
.login-error { color: #a33; }
.alert { background: #eef6ee; border: 1px solid #9c9; padding: 0.5rem; }
"#;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 14).unwrap()
    }

    fn records() -> Vec<PredictionRecord> {
        vec![PredictionRecord::new("2026-2-20", "Cloudy", "4")]
    }

    #[test]
    fn test_view_round_trips_through_text() {
        for view in View::ALL {
            assert_eq!(view.to_string().parse::<View>(), Ok(view));
        }
        assert!("home".parse::<View>().is_err());
    }

    #[test]
    fn test_apply_records_updates_every_view() {
        let mut pages = PageSet::default();
        pages.apply_records(&records());

        assert_eq!(
            pages.get(View::Index).header.as_deref(),
            Some("Friday, February 20, 2026")
        );
        assert!(pages.get(View::Other).header.is_none());
        assert!(pages.get(View::Other).list_html.contains("prediction-card"));
        assert!(pages.get(View::Admin).list_html.contains("delete-form"));
        assert!(!pages.get(View::Index).list_html.contains("delete-form"));
    }

    #[test]
    fn test_public_records_leave_admin_untouched() {
        let mut pages = PageSet::default();
        pages.apply_records(&records());
        pages.apply_public_records(&[]);

        assert!(pages.get(View::Index).list_html.contains("empty-state"));
        assert!(pages.get(View::Other).list_html.contains("empty-state"));
        assert!(pages.get(View::Admin).list_html.contains("prediction-card"));
    }

    #[test]
    fn test_error_replaces_list_keeps_header() {
        let mut pages = PageSet::default();
        pages.apply_records(&records());
        pages.apply_error("Missing or insufficient permissions.");

        let index = pages.get(View::Index);
        assert!(index.list_html.contains("error-state"));
        assert!(!index.list_html.contains("prediction-card"));
        assert_eq!(index.header.as_deref(), Some("Friday, February 20, 2026"));
    }

    #[test]
    fn test_documents_carry_element_ids() {
        let pages = PageSet::default();
        let panel = AdminPanel::default();

        let index = document(pages.get(View::Index), today(), &panel);
        assert!(index.contains(r#"id="target-date-display">Waiting for update...<"#));
        assert!(index.contains(r#"id="predictions-list""#));

        let other = document(pages.get(View::Other), today(), &panel);
        assert!(other.contains(r#"id="target-date-inline">Saturday, February 14, 2026<"#));
    }

    #[test]
    fn test_admin_document_gate_states() {
        let pages = PageSet::default();
        let locked = document(pages.get(View::Admin), today(), &AdminPanel::default());
        assert!(locked.contains(r#"<section id="login-section">"#));
        assert!(locked.contains(r#"<section id="dashboard-section" style="display: none;">"#));
        assert!(!locked.contains(r#"id="predictions-list""#));

        let rejected = AdminPanel {
            login_error: true,
            ..AdminPanel::default()
        };
        let html = document(pages.get(View::Admin), today(), &rejected);
        assert!(html.contains("Incorrect password."));
        assert!(html.contains(r#"id="admin-password" name="password" value="""#));

        let unlocked = AdminPanel {
            unlocked: true,
            alert: Some("Forecast published!".into()),
            ..AdminPanel::default()
        };
        let html = document(pages.get(View::Admin), today(), &unlocked);
        assert!(html.contains(r#"<section id="login-section" style="display: none;">"#));
        assert!(html.contains(r#"id="prediction-form""#));
        assert!(html.contains(r#"id="predictions-list""#));
        assert!(html.contains("Forecast published!"));
    }
}
