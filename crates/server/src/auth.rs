use std::sync::Arc;

use axum::{
    extract::State,
    headers::{authorization::Bearer, Authorization},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
    TypedHeader,
};
use axum_derive_error::ErrorResponse;
use common::{config::Config, hash};
use derive_more::{Display, Error};
use tracing::warn;

#[derive(ErrorResponse, Display, Error)]
pub(super) enum AuthenticationError {
    #[status(StatusCode::FORBIDDEN)]
    #[display(fmt = "invalid operator token was provided")]
    InvalidOperatorToken,
}

/// Require a valid operator bearer token.
///
/// Tokens are compared in constant time. Requests are rejected if the server
/// configuration has no operator token at all.
pub(super) async fn require_operator<B>(
    State(config): State<Arc<Config>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    req: Request<B>,
    next: Next<B>,
) -> Result<Response, AuthenticationError> {
    let expected = config
        .server
        .as_ref()
        .map(|server| server.operator_token.as_bytes())
        .filter(|token| !token.is_empty());

    let authorized = match (expected, &authorization) {
        (Some(expected), Some(TypedHeader(authorization))) => {
            hash::secrets_match(expected, authorization.token().as_bytes())
        }
        _ => false,
    };

    if !authorized {
        warn!(uri = %req.uri(), "operator authentication failed");
        return Err(AuthenticationError::InvalidOperatorToken);
    }

    Ok(next.run(req).await)
}
