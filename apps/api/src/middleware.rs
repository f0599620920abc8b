use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use tidewire_core::AppError;

use crate::error::ApiResult;
use crate::state::AppState;

const ACCESS_TOKEN_QUERY_PARAMETER: &str = "access_token";

/// Resolves the viewer token into a `UserIdentity` request extension.
///
/// `EventSource` cannot set headers, so the token is also accepted as the
/// `access_token` query parameter.
pub async fn require_viewer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = viewer_token(request.headers(), request.uri().query())
        .ok_or_else(|| AppError::Unauthorized("viewer token required".to_owned()))?;

    let identity = state
        .viewer_auth_service
        .authenticate(token.as_str())
        .await?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub(crate) fn viewer_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    bearer.or_else(|| {
        query
            .and_then(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .find(|(name, _)| name == ACCESS_TOKEN_QUERY_PARAMETER)
                    .map(|(_, value)| value.trim().to_owned())
            })
            .filter(|value| !value.is_empty())
    })
}
