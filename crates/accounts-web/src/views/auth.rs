//! Sign in, sign out, registration and activation.

use accounts_auth::{is_email_conflict, ResendActivationCodeForm, SignInForm, SignUpForm};
use accounts_core::crypto::get_random_string;
use accounts_core::error::AccountsError;
use accounts_core::text::is_safe_url;
use accounts_forms::{Form as _, FormData};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Form;
use tera::Context;

use super::{form_context, redirect, render, GuestOnly, LoginRequired, QueryParams};
use crate::error::{WebError, WebResult};
use crate::messages;
use crate::server::AppState;
use crate::session::Session;
use crate::{auth, notifications};

async fn render_login(
    state: &AppState,
    session: &Session,
    form: &SignInForm,
    next: &str,
) -> WebResult<Response> {
    let mut context = form_context(form);
    context.insert("next", next);
    render(state, session, None, "accounts/login.html", context).await
}

/// Where to go after signing in: a safe `next`, else the configured default.
fn success_url(state: &AppState, next: &str) -> String {
    if is_safe_url(next, &state.settings.allowed_hosts) {
        next.to_string()
    } else {
        state.settings.accounts.login_redirect_url.clone()
    }
}

/// `GET /accounts/login/`
pub async fn login_page(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
    Query(query): Query<QueryParams>,
) -> WebResult<Response> {
    let form = SignInForm::new(&state.settings.accounts);
    let next = query.get("next").map_or("", String::as_str);
    render_login(&state, &session, &form, next).await
}

/// `POST /accounts/login/`
///
/// Without "remember me" the session cookie ends with the browser session.
pub async fn login_submit(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
    Query(query): Query<QueryParams>,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let next = data
        .get("next")
        .or_else(|| query.get("next"))
        .cloned()
        .unwrap_or_default();

    let mut form = SignInForm::new(&state.settings.accounts);
    form.bind(&data);
    if !form.validate(state.store.as_ref()).await? {
        return render_login(&state, &session, &form, &next).await;
    }

    let remember = form.remember_me();
    let mut user = form.into_user().ok_or_else(|| {
        WebError(AccountsError::InternalServerError(
            "validated sign-in form has no user".to_string(),
        ))
    })?;
    auth::login(
        &session,
        state.store.as_ref(),
        &mut user,
        state.settings.signing_key(),
    )
    .await?;
    if !remember {
        session.set_expire_at_browser_close().await;
    }

    Ok(redirect(&success_url(&state, &next)))
}

/// `GET|POST /accounts/logout/`
pub async fn logout(
    State(state): State<AppState>,
    _: LoginRequired,
    session: Session,
) -> WebResult<Response> {
    auth::logout(&session).await;
    render(&state, &session, None, "accounts/logout.html", Context::new()).await
}

/// `GET /accounts/register/`
pub async fn register_page(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
) -> WebResult<Response> {
    let form = SignUpForm::new(&state.settings.accounts);
    render(&state, &session, None, "accounts/register.html", form_context(&form)).await
}

/// `POST /accounts/register/`
///
/// With activation enabled the account starts inactive and an activation
/// link is mailed; otherwise the user is signed in straight away.
pub async fn register_submit(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let settings = &state.settings.accounts;
    let mut form = SignUpForm::new(settings);
    form.bind(&data);
    if !form.validate(state.store.as_ref()).await? {
        return render(&state, &session, None, "accounts/register.html", form_context(&form))
            .await;
    }

    // Replaced with `user_{id}` once the id is known.
    let placeholder = settings
        .disable_username
        .then(|| format!("pending_{}", get_random_string(20)));
    let new_user = form
        .to_new_user(placeholder.as_deref())
        .await?
        .active(!settings.enable_user_activation);
    let mut user = match state.store.create_user(new_user).await {
        Ok(user) => user,
        // Another sign-up took the address after validation.
        Err(err) if is_email_conflict(&err) => {
            form.reject_email();
            return render(&state, &session, None, "accounts/register.html", form_context(&form))
                .await;
        }
        Err(err) => return Err(err.into()),
    };
    if settings.disable_username {
        user.username = format!("user_{}", user.id);
        state.store.update_user(&user).await?;
    }
    tracing::info!(user_id = user.id, "user registered");

    if settings.enable_user_activation {
        notifications::send_activation_email(&state, &user).await?;
        messages::success(
            &session,
            "You are registered. To activate the account, follow the link sent to the mail.",
        )
        .await?;
    } else {
        auth::login(
            &session,
            state.store.as_ref(),
            &mut user,
            state.settings.signing_key(),
        )
        .await?;
        messages::success(&session, "You are successfully registered!").await?;
    }

    Ok(redirect("/"))
}

/// `GET /accounts/activate/resend/`
pub async fn resend_activation_page(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
) -> WebResult<Response> {
    let form = ResendActivationCodeForm::new(&state.settings.accounts);
    render(
        &state,
        &session,
        None,
        "accounts/resend_activation_code.html",
        form_context(&form),
    )
    .await
}

/// `POST /accounts/activate/resend/`
///
/// Replaces the user's pending activation with a fresh one.
pub async fn resend_activation_submit(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let mut form = ResendActivationCodeForm::new(&state.settings.accounts);
    form.bind(&data);
    let valid = form.validate(state.store.as_ref()).await?;
    let Some(user) = form.user().filter(|_| valid) else {
        return render(
            &state,
            &session,
            None,
            "accounts/resend_activation_code.html",
            form_context(&form),
        )
        .await;
    };

    if let Some(previous) = state.store.activation_for_user(user.id).await? {
        state.store.delete_activation(previous.id).await?;
    }
    notifications::send_activation_email(&state, user).await?;
    messages::success(&session, "A new activation code has been sent to your e-mail.").await?;

    Ok(redirect("/"))
}

/// `GET /accounts/activate/{code}/`
///
/// Activates the account, consumes the code and signs the user in. Unknown
/// codes and email-change codes are 404s.
pub async fn activate(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
    Path(code): Path<String>,
) -> WebResult<Response> {
    let activation = match state.store.activation_by_code(&code).await? {
        Some(activation) if !activation.is_email_change() => activation,
        _ => return Err(WebError::not_found("activation code")),
    };
    let Some(mut user) = state.store.get_user(activation.user_id).await? else {
        return Err(WebError::not_found("activation code"));
    };

    user.is_active = true;
    state.store.update_user(&user).await?;
    state.store.delete_activation(activation.id).await?;
    tracing::info!(user_id = user.id, "account activated");

    auth::login(
        &session,
        state.store.as_ref(),
        &mut user,
        state.settings.signing_key(),
    )
    .await?;
    messages::success(&session, "You have successfully activated your account!").await?;

    Ok(redirect("/"))
}
