//! Profile editing, email change and the username reminder.

use accounts_auth::{is_email_conflict, ChangeEmailForm, ChangeProfileForm, RemindUsernameForm};
use accounts_forms::{Form as _, FormData};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Form;

use super::{form_context, redirect, render, GuestOnly, LoginRequired, LOGIN_URL};
use crate::error::{WebError, WebResult};
use crate::messages;
use crate::notifications;
use crate::server::AppState;
use crate::session::Session;

const CHANGE_PROFILE_URL: &str = "/accounts/change/profile/";
const CHANGE_EMAIL_URL: &str = "/accounts/change/email/";

/// `GET /accounts/recover/username/`
pub async fn remind_username_page(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
) -> WebResult<Response> {
    let form = RemindUsernameForm::new();
    render(&state, &session, None, "accounts/remind_username.html", form_context(&form)).await
}

/// `POST /accounts/recover/username/`
pub async fn remind_username_submit(
    State(state): State<AppState>,
    _: GuestOnly,
    session: Session,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let mut form = RemindUsernameForm::new();
    form.bind(&data);
    let valid = form.validate(state.store.as_ref()).await?;
    let Some(user) = form.user().filter(|_| valid) else {
        return render(&state, &session, None, "accounts/remind_username.html", form_context(&form))
            .await;
    };

    notifications::send_forgotten_username_email(&state, user).await?;
    messages::success(&session, "Your username has been sent to your email.").await?;
    Ok(redirect(LOGIN_URL))
}

/// `GET /accounts/change/profile/`
pub async fn change_profile_page(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    session: Session,
) -> WebResult<Response> {
    let form = ChangeProfileForm::new(&user);
    render(
        &state,
        &session,
        Some(&user),
        "accounts/profile/change_profile.html",
        form_context(&form),
    )
    .await
}

/// `POST /accounts/change/profile/`
pub async fn change_profile_submit(
    State(state): State<AppState>,
    LoginRequired(mut user): LoginRequired,
    session: Session,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let mut form = ChangeProfileForm::new(&user);
    form.bind(&data);
    if !form.validate() {
        return render(
            &state,
            &session,
            Some(&user),
            "accounts/profile/change_profile.html",
            form_context(&form),
        )
        .await;
    }
    form.apply(&mut user);
    state.store.update_user(&user).await?;
    messages::success(&session, "Profile data has been successfully updated.").await?;
    Ok(redirect(CHANGE_PROFILE_URL))
}

/// `GET /accounts/change/email/`
pub async fn change_email_page(
    State(state): State<AppState>,
    LoginRequired(user): LoginRequired,
    session: Session,
) -> WebResult<Response> {
    let form = ChangeEmailForm::new(&user);
    render(
        &state,
        &session,
        Some(&user),
        "accounts/profile/change_email.html",
        form_context(&form),
    )
    .await
}

/// `POST /accounts/change/email/`
///
/// With email activation on, the address only changes once the link mailed
/// to the new address is followed.
pub async fn change_email_submit(
    State(state): State<AppState>,
    LoginRequired(mut user): LoginRequired,
    session: Session,
    Form(data): Form<FormData>,
) -> WebResult<Response> {
    let mut form = ChangeEmailForm::new(&user);
    form.bind(&data);
    let valid = form.validate(state.store.as_ref()).await?;
    let Some(email) = form.email().filter(|_| valid) else {
        return render(
            &state,
            &session,
            Some(&user),
            "accounts/profile/change_email.html",
            form_context(&form),
        )
        .await;
    };

    if state.settings.accounts.email_activation_after_changing {
        // Only the newest link stays valid.
        state.store.delete_email_activations(user.id).await?;
        notifications::send_activation_change_email(&state, &user, &email).await?;
        messages::success(
            &session,
            "To complete the change of mail, click on the link sent to it.",
        )
        .await?;
    } else {
        let previous = std::mem::replace(&mut user.email, email);
        match state.store.update_user(&user).await {
            Ok(()) => {}
            Err(err) if is_email_conflict(&err) => {
                user.email = previous;
                form.reject_email();
                return render(
                    &state,
                    &session,
                    Some(&user),
                    "accounts/profile/change_email.html",
                    form_context(&form),
                )
                .await;
            }
            Err(err) => return Err(err.into()),
        }
        tracing::info!(user_id = user.id, "email changed");
        messages::success(&session, "Email successfully changed.").await?;
    }
    Ok(redirect(CHANGE_EMAIL_URL))
}

/// `GET /accounts/change/email/{code}/`
///
/// Only the owner of an email-change code can use it; anything else is a 404.
pub async fn change_email_activate(
    State(state): State<AppState>,
    LoginRequired(mut user): LoginRequired,
    session: Session,
    Path(code): Path<String>,
) -> WebResult<Response> {
    let activation = state
        .store
        .activation_by_code(&code)
        .await?
        .filter(|activation| activation.user_id == user.id);
    let Some((activation, email)) =
        activation.and_then(|activation| activation.email.clone().map(|email| (activation, email)))
    else {
        return Err(WebError::not_found("email change code"));
    };

    // The address may have been taken since the link was sent.
    user.email = email;
    let taken = match state.store.update_user(&user).await {
        Ok(()) => false,
        Err(err) if is_email_conflict(&err) => true,
        Err(err) => return Err(err.into()),
    };
    state.store.delete_activation(activation.id).await?;
    if taken {
        messages::error(&session, "You can not use this mail.").await?;
        return Ok(redirect(CHANGE_EMAIL_URL));
    }

    tracing::info!(user_id = user.id, "email change confirmed");
    messages::success(&session, "You have successfully changed your email!").await?;
    Ok(redirect(CHANGE_EMAIL_URL))
}
