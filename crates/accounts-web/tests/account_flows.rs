//! End-to-end account flows through the router.

mod common;

use common::{TestApp, PASSWORD};
use http::StatusCode;

const NEW_PASSWORD: &str = "another-Sturdy-42-pass";

fn signup_data<'a>(username: &'a str, email: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("username", username),
        ("first_name", "Ada"),
        ("last_name", "Lovelace"),
        ("email", email),
        ("password1", PASSWORD),
        ("password2", PASSWORD),
    ]
}

// ── Registration and activation ──────────────────────────────────────

#[tokio::test]
async fn test_register_with_activation() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let page = client.get("/accounts/register/").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("name=\"password2\""));

    let response = client
        .post("/accounts/register/", &signup_data("ada", "Ada@Example.com"))
        .await;
    response.assert_redirect("/");

    let user = app.state.store.get_by_username("ada").await.unwrap().unwrap();
    assert!(!user.is_active);
    assert_eq!(user.email, "ada@example.com");

    let sent = app.outbox.messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Profile Activation");
    assert_eq!(sent[0].to, ["ada@example.com"]);

    let home = client.get("/").await;
    assert!(home.contains("You are registered. To activate the account"));
    assert!(home.contains("Welcome to"));

    let link = app.last_link("/accounts/activate/").await;
    client.get(&link).await.assert_redirect("/");
    assert!(app.reload(&user).await.is_active);
    assert!(app.state.store.activation_for_user(user.id).await.unwrap().is_none());

    let home = client.get("/").await;
    assert!(home.contains("You have successfully activated your account!"));
    assert!(home.contains("You are signed in as <strong>ada</strong>"));

    // The code is consumed.
    let mut other = app.client();
    assert_eq!(other.get(&link).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_register_without_activation_logs_in() {
    let app = TestApp::with_settings(|s| s.accounts.enable_user_activation = false).await;
    let mut client = app.client();

    client
        .post("/accounts/register/", &signup_data("ada", "ada@example.com"))
        .await
        .assert_redirect("/");

    assert!(app.outbox.is_empty().await);
    let home = client.get("/").await;
    assert!(home.contains("You are successfully registered!"));
    assert!(home.contains("Hello, Ada Lovelace!"));
}

#[tokio::test]
async fn test_register_without_username_assigns_generated_name() {
    let app = TestApp::with_settings(|s| {
        s.accounts.disable_username = true;
        s.accounts.login_via_email = true;
        s.accounts.enable_user_activation = false;
    })
    .await;
    let mut client = app.client();

    let page = client.get("/accounts/register/").await;
    assert!(!page.contains("name=\"username\""));

    let data: Vec<_> = signup_data("", "ada@example.com")
        .into_iter()
        .filter(|(k, _)| *k != "username")
        .collect();
    client.post("/accounts/register/", &data).await.assert_redirect("/");

    let user = app.state.store.get_by_email("ada@example.com").await.unwrap().unwrap();
    assert_eq!(user.username, format!("user_{}", user.id));
}

#[tokio::test]
async fn test_register_rejects_taken_email() {
    let app = TestApp::new().await;
    app.create_user("existing", "ada@example.com").await;
    let mut client = app.client();

    let response = client
        .post("/accounts/register/", &signup_data("ada", "ADA@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.contains("You can not use this email."));
    assert!(response.contains("value=\"ada\""));
    assert!(app.outbox.is_empty().await);
}

#[tokio::test]
async fn test_resend_activation_code() {
    let app = TestApp::with_settings(|s| s.accounts.activation_resend_hours = 0).await;
    let mut client = app.client();
    client
        .post("/accounts/register/", &signup_data("ada", "ada@example.com"))
        .await
        .assert_redirect("/");
    let first_link = app.last_link("/accounts/activate/").await;

    client
        .post("/accounts/activate/resend/", &[("email_or_username", "ada")])
        .await
        .assert_redirect("/");
    assert_eq!(app.outbox.len().await, 2);
    let second_link = app.last_link("/accounts/activate/").await;
    assert_ne!(first_link, second_link);

    let home = client.get("/").await;
    assert!(home.contains("A new activation code has been sent to your e-mail."));

    assert_eq!(client.get(&first_link).await.status, StatusCode::NOT_FOUND);
    client.get(&second_link).await.assert_redirect("/");
}

#[tokio::test]
async fn test_resend_activation_code_too_soon() {
    let app = TestApp::new().await;
    let mut client = app.client();
    client
        .post("/accounts/register/", &signup_data("ada", "ada@example.com"))
        .await
        .assert_redirect("/");

    let response = client
        .post("/accounts/activate/resend/", &[("email_or_username", "ada@example.com")])
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.contains("You can request a new code in 24 hours."));
    assert_eq!(app.outbox.len().await, 1);
}

#[tokio::test]
async fn test_unknown_activation_code_is_not_found() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let response = client.get("/accounts/activate/doesnotexist/").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = client.get("/no/such/page/").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// ── Sign in and access control ───────────────────────────────────────

#[tokio::test]
async fn test_login_and_logout() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();

    let response = client.login("alice").await;
    assert_eq!(response.location(), Some("/"));
    let cookie = response.set_cookie().unwrap();
    assert!(cookie.starts_with("sessionid="));
    assert!(cookie.contains("Max-Age=1209600"));
    assert!(cookie.contains("HttpOnly"));
    assert!(app.reload(&user).await.last_login.is_some());

    let home = client.get("/").await;
    assert!(home.contains("You are signed in as <strong>alice</strong>"));

    let response = client.post("/accounts/logout/", &[]).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.contains("Logged out"));
    assert!(client.cookie("sessionid").is_none());

    let home = client.get("/").await;
    assert!(home.contains("Welcome to"));
}

#[tokio::test]
async fn test_login_without_remember_me_uses_browser_session() {
    let app = TestApp::new().await;
    app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();

    let response = client
        .post(
            "/accounts/login/",
            &[("username", "alice"), ("password", PASSWORD)],
        )
        .await;
    response.assert_redirect("/");
    assert!(!response.set_cookie().unwrap().contains("Max-Age"));

    let home = client.get("/").await;
    assert!(home.contains("You are signed in as"));
}

#[tokio::test]
async fn test_login_errors() {
    let app = TestApp::new().await;
    let mut user = app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();

    let response = client
        .post(
            "/accounts/login/",
            &[("username", "alice"), ("password", "wrong")],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.contains("Please enter a correct username and password."));

    user.is_active = false;
    app.state.store.update_user(&user).await.unwrap();
    let response = client
        .post(
            "/accounts/login/",
            &[("username", "alice"), ("password", PASSWORD)],
        )
        .await;
    assert!(response.contains("This account is inactive."));
    assert!(client.cookie("sessionid").is_none());
}

#[tokio::test]
async fn test_login_via_email() {
    let app = TestApp::with_settings(|s| s.accounts.login_via_email = true).await;
    app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();

    let page = client.get("/accounts/login/").await;
    assert!(page.contains("name=\"email\""));

    client
        .post(
            "/accounts/login/",
            &[("email", "ALICE@example.com"), ("password", PASSWORD)],
        )
        .await
        .assert_redirect("/");
}

#[tokio::test]
async fn test_login_redirects_to_safe_next_only() {
    let app = TestApp::new().await;
    app.create_user("alice", "alice@example.com").await;

    let mut client = app.client();
    client
        .post(
            "/accounts/login/",
            &[
                ("username", "alice"),
                ("password", PASSWORD),
                ("next", "/accounts/change/profile/"),
            ],
        )
        .await
        .assert_redirect("/accounts/change/profile/");

    let mut client = app.client();
    client
        .post(
            "/accounts/login/",
            &[
                ("username", "alice"),
                ("password", PASSWORD),
                ("next", "https://evil.example.org/"),
            ],
        )
        .await
        .assert_redirect("/");
}

#[tokio::test]
async fn test_login_required_redirects_with_next() {
    let app = TestApp::new().await;
    let mut client = app.client();

    let response = client.get("/accounts/change/profile/").await;
    response.assert_redirect("/accounts/login/?next=/accounts/change/profile/");

    let page = client
        .get("/accounts/login/?next=/accounts/change/profile/")
        .await;
    assert!(page.contains("name=\"next\" value=\"&#x2F;accounts&#x2F;change&#x2F;profile&#x2F;\""));

    let response = client.post("/accounts/logout/", &[]).await;
    assert_eq!(response.status, StatusCode::FOUND);
}

#[tokio::test]
async fn test_guest_only_pages_redirect_signed_in_users() {
    let app = TestApp::new().await;
    app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();
    client.login("alice").await;

    for path in [
        "/accounts/login/",
        "/accounts/register/",
        "/accounts/activate/resend/",
        "/accounts/password/reset/",
        "/accounts/recover/username/",
    ] {
        client.get(path).await.assert_redirect("/");
    }
}

#[tokio::test]
async fn test_pages_are_not_cached() {
    let app = TestApp::new().await;
    let mut client = app.client();
    let page = client.get("/accounts/login/").await;
    assert_eq!(page.header("cache-control"), Some("no-store"));
}

// ── Passwords ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();

    client
        .post("/accounts/password/reset/", &[("email", "alice@example.com")])
        .await
        .assert_redirect("/accounts/password/reset/done/");
    let sent = app.outbox.messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Password reset");

    let link = app.last_link("/accounts/reset/").await;
    let page = client.get(&link).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("name=\"new_password1\""));

    let response = client
        .post(
            &link,
            &[("new_password1", NEW_PASSWORD), ("new_password2", "mismatch")],
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.contains("The two password fields didn’t match."));

    client
        .post(
            &link,
            &[("new_password1", NEW_PASSWORD), ("new_password2", NEW_PASSWORD)],
        )
        .await
        .assert_redirect("/accounts/reset/done/");
    assert!(app.reload(&user).await.check_password(NEW_PASSWORD).await.unwrap());

    // Used links stop working.
    let page = client.get(&link).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.contains("Password reset unsuccessful"));
}

#[tokio::test]
async fn test_password_reset_unknown_email_sends_nothing() {
    let app = TestApp::new().await;
    let mut client = app.client();
    client
        .post("/accounts/password/reset/", &[("email", "nobody@example.com")])
        .await
        .assert_redirect("/accounts/password/reset/done/");
    assert!(app.outbox.is_empty().await);
}

#[tokio::test]
async fn test_password_reset_bad_link() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let uid = accounts_auth::encode_uid(user.id);
    let mut client = app.client();

    let page = client.get(&format!("/accounts/reset/{uid}/1-abc/")).await;
    assert!(page.contains("Password reset unsuccessful"));
    let page = client.get("/accounts/reset/!!!/1-abc/").await;
    assert!(page.contains("Password reset unsuccessful"));
}

#[tokio::test]
async fn test_password_change_keeps_session() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();
    let mut other_device = app.client();
    client.login("alice").await;
    other_device.login("alice").await;

    let response = client
        .post(
            "/accounts/password/change/",
            &[
                ("old_password", "wrong"),
                ("new_password1", NEW_PASSWORD),
                ("new_password2", NEW_PASSWORD),
            ],
        )
        .await;
    assert!(response.contains("Your old password was entered incorrectly."));

    client
        .post(
            "/accounts/password/change/",
            &[
                ("old_password", PASSWORD),
                ("new_password1", NEW_PASSWORD),
                ("new_password2", NEW_PASSWORD),
            ],
        )
        .await
        .assert_redirect("/accounts/password/change/done/");
    assert!(app.reload(&user).await.check_password(NEW_PASSWORD).await.unwrap());

    let done = client.get("/accounts/password/change/done/").await;
    assert_eq!(done.status, StatusCode::OK);

    // Other sessions held the old password hash.
    other_device
        .get("/accounts/password/change/")
        .await
        .assert_redirect("/accounts/login/?next=/accounts/password/change/");
}

// ── Profile ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_change_profile() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();
    client.login("alice").await;

    client
        .post(
            "/accounts/change/profile/",
            &[("first_name", "Alice"), ("last_name", "Liddell")],
        )
        .await
        .assert_redirect("/accounts/change/profile/");

    let page = client.get("/accounts/change/profile/").await;
    assert!(page.contains("Profile data has been successfully updated."));
    assert!(page.contains("value=\"Liddell\""));
    assert_eq!(app.reload(&user).await.full_name(), "Alice Liddell");
}

#[tokio::test]
async fn test_change_email_with_confirmation() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();
    client.login("alice").await;

    let response = client
        .post("/accounts/change/email/", &[("email", "alice@example.com")])
        .await;
    assert!(response.contains("Please enter another email."));

    client
        .post("/accounts/change/email/", &[("email", "New@Example.com")])
        .await
        .assert_redirect("/accounts/change/email/");
    assert_eq!(app.reload(&user).await.email, "alice@example.com");

    let sent = app.outbox.messages().await;
    assert_eq!(sent[0].subject, "Change email");
    assert_eq!(sent[0].to, ["new@example.com"]);

    let link = app.last_link("/accounts/change/email/").await;

    // Someone else's code is not found.
    app.create_user("bob", "bob@example.com").await;
    let mut bob = app.client();
    bob.login("bob").await;
    assert_eq!(bob.get(&link).await.status, StatusCode::NOT_FOUND);

    client.get(&link).await.assert_redirect("/accounts/change/email/");
    assert_eq!(app.reload(&user).await.email, "new@example.com");
    let page = client.get("/accounts/change/email/").await;
    assert!(page.contains("You have successfully changed your email!"));

    assert_eq!(client.get(&link).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_new_email_change_request_replaces_pending_link() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();
    client.login("alice").await;

    client
        .post("/accounts/change/email/", &[("email", "first@example.com")])
        .await
        .assert_redirect("/accounts/change/email/");
    let first = app.last_link("/accounts/change/email/").await;
    client
        .post("/accounts/change/email/", &[("email", "second@example.com")])
        .await
        .assert_redirect("/accounts/change/email/");
    let second = app.last_link("/accounts/change/email/").await;
    assert_ne!(first, second);

    assert_eq!(client.get(&first).await.status, StatusCode::NOT_FOUND);
    client.get(&second).await.assert_redirect("/accounts/change/email/");
    assert_eq!(app.reload(&user).await.email, "second@example.com");
}

#[tokio::test]
async fn test_change_email_link_for_address_taken_meanwhile() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();
    client.login("alice").await;

    client
        .post("/accounts/change/email/", &[("email", "wanted@example.com")])
        .await
        .assert_redirect("/accounts/change/email/");
    let link = app.last_link("/accounts/change/email/").await;
    app.create_user("carol", "Wanted@Example.com").await;

    client.get(&link).await.assert_redirect("/accounts/change/email/");
    assert_eq!(app.reload(&user).await.email, "alice@example.com");
    let page = client.get("/accounts/change/email/").await;
    assert!(page.contains("You can not use this mail."));
    assert_eq!(client.get(&link).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_change_email_immediately() {
    let app =
        TestApp::with_settings(|s| s.accounts.email_activation_after_changing = false).await;
    let user = app.create_user("alice", "alice@example.com").await;
    app.create_user("bob", "bob@example.com").await;
    let mut client = app.client();
    client.login("alice").await;

    let response = client
        .post("/accounts/change/email/", &[("email", "bob@example.com")])
        .await;
    assert!(response.contains("You can not use this mail."));

    client
        .post("/accounts/change/email/", &[("email", "alice@new.example.com")])
        .await
        .assert_redirect("/accounts/change/email/");
    assert_eq!(app.reload(&user).await.email, "alice@new.example.com");
    assert!(app.outbox.is_empty().await);
}

#[tokio::test]
async fn test_signup_code_cannot_change_email() {
    let app = TestApp::new().await;
    let user = app.create_user("alice", "alice@example.com").await;
    let code = accounts_auth::generate_code();
    app.state
        .store
        .create_activation(user.id, &code, None)
        .await
        .unwrap();
    let mut client = app.client();
    client.login("alice").await;

    let response = client.get(&format!("/accounts/change/email/{code}/")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remind_username() {
    let app = TestApp::new().await;
    app.create_user("alice", "alice@example.com").await;
    let mut client = app.client();

    let response = client
        .post("/accounts/recover/username/", &[("email", "nobody@example.com")])
        .await;
    assert!(response.contains("You entered an invalid email address."));

    client
        .post("/accounts/recover/username/", &[("email", "alice@example.com")])
        .await
        .assert_redirect("/accounts/login/");
    let sent = app.outbox.messages().await;
    assert_eq!(sent[0].subject, "Your username");
    assert!(sent[0].body.contains("alice"));

    let page = client.get("/accounts/login/").await;
    assert!(page.contains("Your username has been sent to your email."));
}
