//! HTTP rendering of [`AccountsError`].

use accounts_core::AccountsError;
use axum::response::{Html, IntoResponse, Response};
use http::StatusCode;

use crate::templates::{NOT_FOUND_PAGE, SERVER_ERROR_PAGE};

/// An [`AccountsError`] returned from a handler.
///
/// Not-found errors render the 404 page. Everything else is logged and
/// answered with the generic 500 page (or 400/403 for those variants), so
/// internals never reach the client.
#[derive(Debug)]
pub struct WebError(pub AccountsError);

pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self(AccountsError::NotFound(what.into()))
    }
}

impl From<AccountsError> for WebError {
    fn from(err: AccountsError) -> Self {
        Self(err)
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match status {
            StatusCode::NOT_FOUND => {
                tracing::debug!(error = %self.0, "not found");
                (status, Html(NOT_FOUND_PAGE)).into_response()
            }
            StatusCode::BAD_REQUEST | StatusCode::FORBIDDEN => {
                tracing::warn!(error = %self.0, "request rejected");
                (status, status.canonical_reason().unwrap_or_default()).into_response()
            }
            _ => {
                tracing::error!(error = %self.0, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Html(SERVER_ERROR_PAGE)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = WebError::not_found("activation").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = WebError(AccountsError::DoesNotExist("user".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = WebError(AccountsError::DatabaseError("disk".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = WebError(AccountsError::BadRequest("x".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
