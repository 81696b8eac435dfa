//! HTTP surface serving the page models and the admin form endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::admin::{AuthGate, SubmissionForm, SubmissionHandler};
use crate::driver::DriverHandle;
use crate::page::{document, today, AdminPanel, SharedPages, View};

/// Cookie marking an unlocked admin session. Not a credential.
pub const ADMIN_COOKIE: &str = "skycast_admin";

const FORM_LIMIT: u64 = 16 * 1024;

/// Everything the routes need.
#[derive(Clone)]
pub struct ServerState {
    pages: SharedPages,
    handler: Arc<SubmissionHandler>,
    gate: Arc<dyn AuthGate>,
    driver: DriverHandle,
}

impl ServerState {
    pub fn new(
        pages: SharedPages,
        handler: Arc<SubmissionHandler>,
        gate: Arc<dyn AuthGate>,
        driver: DriverHandle,
    ) -> Self {
        Self {
            pages,
            handler,
            gate,
            driver,
        }
    }

    fn render(&self, view: View, panel: &AdminPanel) -> String {
        let pages = self.pages.read();
        document(pages.get(view), today(), panel)
    }
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    password: String,
}

fn is_unlocked(cookie: &Option<String>) -> bool {
    cookie.as_deref() == Some("1")
}

fn html(body: String, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::html(body), status).into_response()
}

fn with_state(
    state: ServerState,
) -> impl Filter<Extract = (ServerState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All board routes.
pub fn routes(
    state: ServerState,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: ServerState| {
            html(state.render(View::Index, &AdminPanel::default()), StatusCode::OK)
        });

    let other = warp::path("other")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: ServerState| {
            html(state.render(View::Other, &AdminPanel::default()), StatusCode::OK)
        });

    let admin = warp::path("admin")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::cookie::optional::<String>(ADMIN_COOKIE))
        .and(with_state(state.clone()))
        .map(|cookie: Option<String>, state: ServerState| {
            let panel = AdminPanel {
                unlocked: is_unlocked(&cookie),
                ..AdminPanel::default()
            };
            html(state.render(View::Admin, &panel), StatusCode::OK)
        });

    // Path before method, so unknown paths reject as 404 rather than 405
    let login = warp::path!("admin" / "login")
        .and(warp::post())
        .and(warp::body::content_length_limit(FORM_LIMIT))
        .and(warp::body::form::<LoginForm>())
        .and(with_state(state.clone()))
        .map(handle_login);

    let publish = warp::path!("admin" / "predictions")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(ADMIN_COOKIE))
        .and(warp::body::content_length_limit(FORM_LIMIT))
        .and(warp::body::form::<SubmissionForm>())
        .and(with_state(state.clone()))
        .and_then(handle_publish);

    let delete = warp::path!("admin" / "predictions" / String / "delete")
        .and(warp::post())
        .and(warp::cookie::optional::<String>(ADMIN_COOKIE))
        .and(with_state(state))
        .and_then(handle_delete);

    index
        .or(other)
        .unify()
        .or(admin)
        .unify()
        .or(login)
        .unify()
        .or(publish)
        .unify()
        .or(delete)
        .unify()
}

fn handle_login(form: LoginForm, state: ServerState) -> Response {
    if state.gate.check(&form.password) {
        tracing::info!("Admin unlocked");
        state.driver.refresh();
        let panel = AdminPanel {
            unlocked: true,
            ..AdminPanel::default()
        };
        let cookie = format!("{}=1; Path=/; HttpOnly; SameSite=Strict", ADMIN_COOKIE);
        warp::reply::with_header(
            warp::reply::html(state.render(View::Admin, &panel)),
            "set-cookie",
            cookie,
        )
        .into_response()
    } else {
        tracing::warn!("Rejected admin login attempt");
        let panel = AdminPanel {
            login_error: true,
            ..AdminPanel::default()
        };
        html(state.render(View::Admin, &panel), StatusCode::UNAUTHORIZED)
    }
}

fn locked(state: &ServerState) -> Response {
    html(state.render(View::Admin, &AdminPanel::default()), StatusCode::FORBIDDEN)
}

async fn handle_publish(
    cookie: Option<String>,
    mut form: SubmissionForm,
    state: ServerState,
) -> Result<Response, Rejection> {
    if !is_unlocked(&cookie) {
        return Ok(locked(&state));
    }

    let alert = match state.handler.submit(&mut form).await {
        Ok(outcome) => outcome.alert().map(String::from),
        Err(e) => Some(e.user_message().to_string()),
    };
    let panel = AdminPanel {
        unlocked: true,
        login_error: false,
        alert,
        draft: form,
    };
    Ok(html(state.render(View::Admin, &panel), StatusCode::OK))
}

async fn handle_delete(
    target: String,
    cookie: Option<String>,
    state: ServerState,
) -> Result<Response, Rejection> {
    if !is_unlocked(&cookie) {
        return Ok(locked(&state));
    }

    let alert = match state.handler.delete_by_text(&target).await {
        Ok(outcome) => outcome.alert().map(String::from),
        Err(e) => Some(e.user_message().to_string()),
    };
    let panel = AdminPanel {
        unlocked: true,
        alert,
        ..AdminPanel::default()
    };
    Ok(html(state.render(View::Admin, &panel), StatusCode::OK))
}

/// Serve the board until `cancel` fires.
///
/// # Errors
/// Returns an error if the address cannot be bound.
pub async fn serve(
    state: ServerState,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<(), warp::Error> {
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async move { cancel.cancelled().await })?;

    tracing::info!("Serving board on http://{}", bound);
    server.await;
    tracing::info!("Server stopped");
    Ok(())
}
