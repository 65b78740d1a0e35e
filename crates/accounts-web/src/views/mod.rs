//! Request handlers.
//!
//! Handlers are grouped by area:
//!
//! - [`auth`] - Sign in/out, registration and activation
//! - [`password`] - Password reset and change
//! - [`profile`] - Profile, email change and username reminder
//!
//! Access control is expressed with extractors: [`GuestOnly`] sends
//! logged-in users to `/`, [`LoginRequired`] sends anonymous users to the
//! login page with a `next` parameter, and [`CurrentUser`] just resolves the
//! user, if any.

pub mod auth;
pub mod password;
pub mod profile;

use std::collections::HashMap;

use accounts_auth::User;
use axum::extract::{FromRequestParts, State};
use axum::response::{Html, IntoResponse, Response};
use http::header::{CACHE_CONTROL, LOCATION};
use http::request::Parts;
use http::StatusCode;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Value};
use tera::Context;

use crate::error::{WebError, WebResult};
use crate::messages::{take_messages, Message};
use crate::server::AppState;
use crate::session::Session;
use crate::templates::NOT_FOUND_PAGE;

pub const LOGIN_URL: &str = "/accounts/login/";

/// Query-string parameters.
pub type QueryParams = HashMap<String, String>;

/// Characters kept literally in the `next` parameter.
const NEXT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

async fn session_from_parts(parts: &mut Parts, state: &AppState) -> Result<Session, Response> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(IntoResponse::into_response)
}

async fn user_from_parts(parts: &mut Parts, state: &AppState) -> Result<Option<User>, Response> {
    let session = session_from_parts(parts, state).await?;
    crate::auth::current_user(&session, state.store.as_ref(), state.settings.signing_key())
        .await
        .map_err(|e| WebError::from(e).into_response())
}

/// The logged-in user, if any.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Response> {
        Ok(Self(user_from_parts(parts, state).await?))
    }
}

/// The logged-in user; anonymous requests are redirected to the login page.
#[derive(Debug, Clone)]
pub struct LoginRequired(pub User);

impl FromRequestParts<AppState> for LoginRequired {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Response> {
        match user_from_parts(parts, state).await? {
            Some(user) => Ok(Self(user)),
            None => Err(redirect_to_login(parts.uri.path())),
        }
    }
}

/// Passes only anonymous requests; logged-in users are sent to `/`.
#[derive(Debug, Clone, Copy)]
pub struct GuestOnly;

impl FromRequestParts<AppState> for GuestOnly {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Response> {
        match user_from_parts(parts, state).await? {
            Some(_) => Err(redirect("/")),
            None => Ok(Self),
        }
    }
}

/// A `302 Found` redirect.
pub fn redirect(to: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, to.to_string())]).into_response()
}

/// Redirects to the login page, asking it to come back to `path`.
pub fn redirect_to_login(path: &str) -> Response {
    let next = utf8_percent_encode(path, NEXT_ENCODE_SET);
    redirect(&format!("{LOGIN_URL}?next={next}"))
}

fn user_context(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
        "first_name": user.first_name,
        "last_name": user.last_name,
        "full_name": user.full_name(),
    })
}

/// Renders a page with the shared context: site name, user and flash messages.
///
/// Pages carry `Cache-Control: no-store` because they show per-user state.
pub async fn render(
    state: &AppState,
    session: &Session,
    user: Option<&User>,
    template: &str,
    mut context: Context,
) -> WebResult<Response> {
    let messages: Vec<Value> = take_messages(session)
        .await
        .iter()
        .map(Message::to_context)
        .collect();
    context.insert("site_name", &state.settings.site_name);
    context.insert("user", &user.map(user_context));
    context.insert("messages", &messages);
    context.insert(
        "enable_user_activation",
        &state.settings.accounts.enable_user_activation,
    );

    let html = state.templates.render(template, &context)?;
    Ok(([(CACHE_CONTROL, "no-store")], Html(html)).into_response())
}

/// Context holding a form under `form`.
pub fn form_context(form: &dyn accounts_forms::Form) -> Context {
    let mut context = Context::new();
    context.insert("form", &form.as_context());
    context
}

/// `GET /`
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> WebResult<Response> {
    render(&state, &session, user.as_ref(), "index.html", Context::new()).await
}

/// Any unrouted path.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response()
}
