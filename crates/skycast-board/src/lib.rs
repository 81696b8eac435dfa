//! Prediction board: rendering, refresh driver, admin handling and the
//! HTTP surface.

pub mod admin;
pub mod date;
pub mod driver;
pub mod icon;
pub mod page;
pub mod render;
pub mod server;

pub use admin::{
    AuthGate, BoardError, PlaintextGate, SubmissionForm, SubmissionHandler, SubmitOutcome,
};
pub use date::{date_label, long_date, normalize_date, parse_local_date, short_date};
pub use driver::{BoardState, Driver, DriverHandle, DriverOptions, RecordListEvent};
pub use icon::condition_icon;
pub use page::{document, today, AdminPanel, PageModel, PageSet, SharedPages, View};
pub use render::{header_text, render_list};
pub use server::{routes, serve, ServerState, ADMIN_COOKIE};
