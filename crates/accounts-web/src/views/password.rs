//! Password reset and password change.

use accounts_auth::{decode_uid, PasswordChangeForm, PasswordResetForm, SetPasswordForm, User};
use accounts_core::error::AccountsError;
use accounts_forms::{Form as _, FormData};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Form;
use tera::Context;

use super::{form_context, redirect, render, CurrentUser, GuestOnly, LoginRequired};
use crate::error::{WebError, WebResult};
use crate::notifications::send_reset_password_email;
use crate::server::AppState;
use crate::session::Session;

/// `GET /accounts/password/reset/`
pub async fn reset_page(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
) -> WebResult<Response> {
    let form = PasswordResetForm::new(&state.settings.accounts);
    render(&state, &session, None, "accounts/password_reset.html", form_context(&form)).await
}

/// `POST /accounts/password/reset/`
pub async fn reset_submit(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let mut form = PasswordResetForm::new(&state.settings.accounts);
    form.bind(&data);
    if !form.validate(state.store.as_ref()).await? {
        return render(&state, &session, None, "accounts/password_reset.html", form_context(&form))
            .await;
    }
    for user in form.users() {
        send_reset_password_email(&state, user).await?;
    }
    Ok(redirect("/accounts/password/reset/done/"))
}

/// `GET /accounts/password/reset/done/`
pub async fn reset_done(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> WebResult<Response> {
    render(
        &state,
        &session,
        user.as_ref(),
        "accounts/password_reset_done.html",
        Context::new(),
    )
    .await
}

/// Resolves the user a reset link was issued for, if the link is still valid.
async fn reset_link_user(
    state: &AppState,
    uidb64: &str,
    token: &str,
) -> WebResult<Option<User>> {
    let Some(id) = decode_uid(uidb64) else {
        return Ok(None);
    };
    let user = state.store.get_user(id).await?;
    Ok(user.filter(|user| state.tokens.check_token(user, token)))
}

async fn render_confirm(
    state: &AppState,
    session: &Session,
    current: Option<&User>,
    form: Option<&SetPasswordForm>,
) -> WebResult<Response> {
    let mut context = form.map_or_else(Context::new, |form| form_context(form));
    context.insert("validlink", &form.is_some());
    render(state, session, current, "accounts/password_reset_confirm.html", context).await
}

/// `GET /accounts/reset/{uidb64}/{token}/`
pub async fn reset_confirm_page(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    session: Session,
    Path((uidb64, token)): Path<(String, String)>,
) -> WebResult<Response> {
    let form = reset_link_user(&state, &uidb64, &token)
        .await?
        .map(|user| SetPasswordForm::new(&user));
    render_confirm(&state, &session, current.as_ref(), form.as_ref()).await
}

/// `POST /accounts/reset/{uidb64}/{token}/`
///
/// Setting the password changes the user's hash, which invalidates the link.
pub async fn reset_confirm_submit(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    session: Session,
    Path((uidb64, token)): Path<(String, String)>,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let Some(mut user) = reset_link_user(&state, &uidb64, &token).await? else {
        return render_confirm(&state, &session, current.as_ref(), None).await;
    };

    let mut form = SetPasswordForm::new(&user);
    form.bind(&data);
    if !form.validate() {
        return render_confirm(&state, &session, current.as_ref(), Some(&form)).await;
    }
    let password = form.new_password().unwrap_or_default();
    user.set_password(password).await?;
    state.store.update_user(&user).await?;
    tracing::info!(user_id = user.id, "password reset");

    Ok(redirect("/accounts/reset/done/"))
}

/// `GET /accounts/reset/done/`
pub async fn reset_complete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> WebResult<Response> {
    render(
        &state,
        &session,
        user.as_ref(),
        "accounts/password_reset_complete.html",
        Context::new(),
    )
    .await
}

/// `GET /accounts/password/change/`
pub async fn change_page(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    session: Session,
) -> WebResult<Response> {
    let form = PasswordChangeForm::new();
    render(
        &state,
        &session,
        Some(&user),
        "accounts/password_change.html",
        form_context(&form),
    )
    .await
}

/// `POST /accounts/password/change/`
///
/// The session hash is refreshed so the user stays signed in here while other
/// sessions are logged out.
pub async fn change_submit(
    State(state): State<AppState>,
    LoginRequired(mut user): LoginRequired,
    session: Session,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let mut form = PasswordChangeForm::new();
    form.bind(&data);
    if !form.validate(&user).await? {
        return render(
            &state,
            &session,
            Some(&user),
            "accounts/password_change.html",
            form_context(&form),
        )
        .await;
    }
    let password = form.new_password().ok_or_else(|| {
        WebError(AccountsError::InternalServerError(
            "validated password form has no password".to_string(),
        ))
    })?;
    user.set_password(password).await?;
    state.store.update_user(&user).await?;
    crate::auth::update_session_auth_hash(&session, &user, state.settings.signing_key()).await?;
    tracing::info!(user_id = user.id, "password changed");

    Ok(redirect("/accounts/password/change/done/"))
}

/// `GET /accounts/password/change/done/`
pub async fn change_done(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    session: Session,
) -> WebResult<Response> {
    render(
        &state,
        &session,
        Some(&user),
        "accounts/password_change_done.html",
        Context::new(),
    )
    .await
}
