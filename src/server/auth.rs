//! Bearer-token check applied to the `/v1` routes.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::{ApiError, AppState};

pub(crate) const MISSING_HEADER: &str = "Authorization header is missing";
pub(crate) const NOT_BEARER: &str = "Authorization header must start with 'Bearer'";
pub(crate) const INVALID_KEY: &str = "Invalid API key";

/// Compare an `Authorization` header against the configured key.
pub(crate) fn check_bearer(header: Option<&HeaderValue>, expected: &str) -> Result<(), &'static str> {
    let header = header.ok_or(MISSING_HEADER)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(NOT_BEARER)?;
    if token != expected {
        return Err(INVALID_KEY);
    }
    Ok(())
}

/// `from_fn_with_state` middleware; a no-op when no key is configured.
pub(crate) async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    match check_bearer(request.headers().get(AUTHORIZATION), expected) {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            warn!(path = %request.uri().path(), "{reason}");
            ApiError::unauthorized(reason).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_bearer() {
        let ok = HeaderValue::from_static("Bearer s3cret");
        assert_eq!(check_bearer(Some(&ok), "s3cret"), Ok(()));

        assert_eq!(check_bearer(None, "s3cret"), Err(MISSING_HEADER));

        let basic = HeaderValue::from_static("Basic s3cret");
        assert_eq!(check_bearer(Some(&basic), "s3cret"), Err(NOT_BEARER));

        let bare = HeaderValue::from_static("Bearer");
        assert_eq!(check_bearer(Some(&bare), "s3cret"), Err(NOT_BEARER));

        let wrong = HeaderValue::from_static("Bearer nope");
        assert_eq!(check_bearer(Some(&wrong), "s3cret"), Err(INVALID_KEY));
    }
}
