//! Account emails.
//!
//! Each email is rendered from an HTML template; the plain-text part is the
//! same HTML with the tags stripped. Delivery failures are logged and do not
//! fail the request: the records behind the links are already saved, and the
//! user can ask for the email again.

use accounts_auth::{encode_uid, generate_code, Activation, User};
use accounts_core::error::AccountsResult;
use accounts_core::text::strip_tags;
use tera::Context;

use crate::mail::EmailMessage;
use crate::server::AppState;

fn email_context(state: &AppState, user: &User, link: &str) -> Context {
    let mut context = Context::new();
    context.insert("site_name", &state.settings.site_name);
    context.insert("domain", &state.settings.site_domain);
    context.insert("scheme", state.settings.scheme());
    context.insert("username", &user.username);
    context.insert("link", link);
    context
}

async fn deliver(
    state: &AppState,
    subject: &str,
    template: &str,
    context: &Context,
    to: &str,
) -> AccountsResult<()> {
    let html = state.templates.render(template, context)?;
    let message = EmailMessage::new(
        subject,
        strip_tags(&html),
        state.settings.email.default_from_email.clone(),
        vec![to.to_string()],
    )
    .with_html_body(html);

    if let Err(e) = state.mailer.send(&message).await {
        tracing::error!(error = %e, subject, "failed to send email");
    }
    Ok(())
}

/// Creates an activation code for `user` and mails the activation link.
pub async fn send_activation_email(state: &AppState, user: &User) -> AccountsResult<Activation> {
    let code = generate_code();
    let activation = state.store.create_activation(user.id, &code, None).await?;
    let link = state
        .settings
        .absolute_url(&format!("/accounts/activate/{code}/"));

    let mut context = email_context(state, user, &link);
    context.insert("code", &code);
    deliver(
        state,
        "Profile Activation",
        "email/activation_profile.html",
        &context,
        &user.email,
    )
    .await?;
    tracing::info!(user_id = user.id, "activation email sent");
    Ok(activation)
}

/// Records a pending change to `new_email` and mails the confirmation link
/// to the new address.
pub async fn send_activation_change_email(
    state: &AppState,
    user: &User,
    new_email: &str,
) -> AccountsResult<Activation> {
    let code = generate_code();
    let activation = state
        .store
        .create_activation(user.id, &code, Some(new_email))
        .await?;
    let link = state
        .settings
        .absolute_url(&format!("/accounts/change/email/{code}/"));

    let mut context = email_context(state, user, &link);
    context.insert("code", &code);
    deliver(
        state,
        "Change email",
        "email/activation_change_email.html",
        &context,
        new_email,
    )
    .await?;
    tracing::info!(user_id = user.id, "email change confirmation sent");
    Ok(activation)
}

/// Mails a one-time password reset link.
pub async fn send_reset_password_email(state: &AppState, user: &User) -> AccountsResult<()> {
    let uid = encode_uid(user.id);
    let token = state.tokens.make_token(user);
    let link = state
        .settings
        .absolute_url(&format!("/accounts/reset/{uid}/{token}/"));

    let mut context = email_context(state, user, &link);
    context.insert("uid", &uid);
    context.insert("token", &token);
    deliver(
        state,
        "Password reset",
        "email/password_reset.html",
        &context,
        &user.email,
    )
    .await?;
    tracing::info!(user_id = user.id, "password reset email sent");
    Ok(())
}

/// Mails the user their username.
pub async fn send_forgotten_username_email(state: &AppState, user: &User) -> AccountsResult<()> {
    let link = state.settings.absolute_url("/accounts/login/");
    let context = email_context(state, user, &link);
    deliver(
        state,
        "Your username",
        "email/forgotten_username.html",
        &context,
        &user.email,
    )
    .await?;
    tracing::info!(user_id = user.id, "username reminder sent");
    Ok(())
}
