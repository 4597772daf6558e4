use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use crate::auth::{AuthError, AuthUser, TokenKind};
use crate::response::json_error;
use crate::state::AppState;

/// Verify the bearer access token and expose the caller as an [`AuthUser`] extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = crate::auth::extract_token(req.headers()) else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", AuthError::MissingToken.to_string())
            .into_response();
    };

    let Some(secret) = state.config().jwt_secret.as_deref() else {
        tracing::warn!("JWT_SECRET is not configured, rejecting authenticated request");
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "Authentication is not configured",
        )
        .into_response();
    };

    let verified = crate::auth::verify_token(&token, secret, TokenKind::Access, Utc::now())
        .and_then(|claims| Ok(AuthUser { id: claims.user_id()?, role: claims.role }));

    match verified {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(err) => {
            tracing::debug!(error = %err, "access token rejected");
            json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", err.to_string()).into_response()
        }
    }
}
