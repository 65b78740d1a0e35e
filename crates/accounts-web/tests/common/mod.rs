//! Shared helpers for the HTTP flow tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use accounts_auth::{NewUser, User};
use accounts_core::Settings;
use accounts_web::{router, AccountsApp, AppState, InMemoryBackend};
use axum::body::Body;
use axum::Router;
use http::header::{COOKIE, LOCATION, SET_COOKIE};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-Horse-7-battery";

/// An application with an in-memory database and a captured outbox.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub outbox: InMemoryBackend,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(|_| {}).await
    }

    pub async fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
        let mut settings = Settings {
            database_path: ":memory:".into(),
            ..Settings::default()
        };
        settings.email.backend = "memory".to_string();
        configure(&mut settings);

        let outbox = InMemoryBackend::new();
        let app = AccountsApp::from_settings(settings)
            .await
            .expect("app should build")
            .with_mailer(Arc::new(outbox.clone()));
        let state = app.state();
        Self {
            router: router(state.clone()),
            state,
            outbox,
        }
    }

    pub fn client(&self) -> TestClient {
        TestClient::new(self.router.clone())
    }

    /// Creates an active user with [`PASSWORD`].
    pub async fn create_user(&self, username: &str, email: &str) -> User {
        let new_user = NewUser::new(username, email)
            .with_password(PASSWORD)
            .await
            .expect("hashing should succeed");
        self.state
            .store
            .create_user(new_user)
            .await
            .expect("user should be created")
    }

    pub async fn reload(&self, user: &User) -> User {
        self.state
            .store
            .get_user(user.id)
            .await
            .expect("lookup should succeed")
            .expect("user should exist")
    }

    /// The path of the first link starting with `prefix` in the last email.
    pub async fn last_link(&self, prefix: &str) -> String {
        let messages = self.outbox.messages().await;
        let body = &messages.last().expect("an email should have been sent").body;
        link_path(body, prefix).unwrap_or_else(|| panic!("no {prefix} link in:\n{body}"))
    }
}

/// Extracts `prefix...` from a text body, ending at the first character that
/// cannot appear in a generated link.
pub fn link_path(body: &str, prefix: &str) -> Option<String> {
    let start = body.find(prefix)?;
    let link: String = body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_'))
        .collect();
    Some(link)
}

/// Sends requests through the router, keeping cookies between them.
pub struct TestClient {
    app: Router,
    cookies: HashMap<String, String>,
}

impl TestClient {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            cookies: HashMap::new(),
        }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = self
            .builder(Method::GET, path)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    pub async fn post(&mut self, path: &str, data: &[(&str, &str)]) -> TestResponse {
        let body = data
            .iter()
            .map(|(k, v)| {
                format!(
                    "{}={}",
                    utf8_percent_encode(k, NON_ALPHANUMERIC),
                    utf8_percent_encode(v, NON_ALPHANUMERIC)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        let request = self
            .builder(Method::POST, path)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("valid request");
        self.send(request).await
    }

    /// Signs in by username with [`PASSWORD`].
    pub async fn login(&mut self, username: &str) -> TestResponse {
        let response = self
            .post(
                "/accounts/login/",
                &[("username", username), ("password", PASSWORD), ("remember_me", "on")],
            )
            .await;
        assert_eq!(response.status, StatusCode::FOUND, "{}", response.body);
        response
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    fn builder(&self, method: Method, path: &str) -> http::request::Builder {
        let mut builder = Request::builder().method(method).uri(path);
        if !self.cookies.is_empty() {
            let cookie = self
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(COOKIE, cookie);
        }
        builder
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router should not error");

        let status = response.status();
        let headers = response.headers().clone();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(cookie) = value.to_str() else { continue };
            let Some((name, value)) = cookie.split(';').next().and_then(|p| p.split_once('='))
            else {
                continue;
            };
            if value.is_empty() || cookie.contains("Max-Age=0") {
                self.cookies.remove(name.trim());
            } else {
                self.cookies.insert(name.trim().to_string(), value.trim().to_string());
            }
        }

        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.header("set-cookie")
    }

    pub fn contains(&self, text: &str) -> bool {
        self.body.contains(text)
    }

    #[track_caller]
    pub fn assert_redirect(&self, to: &str) {
        assert_eq!(self.status, StatusCode::FOUND, "{}", self.body);
        assert_eq!(self.location(), Some(to));
    }
}
