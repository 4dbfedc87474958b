//! Share link handlers.

use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::{DepotQuery, file_response, identify, text_response};
use crate::error::Error;
use crate::http::AppError;
use crate::service::Depot;

/// Form body of `PUT /shares`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ShareForm {
    /// Artifact path to share
    pub path: Option<String>,
    pub token: Option<String>,
}

/// PUT /shares - create a share link for a visible artifact.
pub(crate) async fn share_create(
    State(depot): State<Depot>,
    Query(query): Query<DepotQuery>,
    Form(form): Form<ShareForm>,
) -> Result<Response, AppError> {
    let path = form
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::bad_request("missing 'path'"))?;
    let identity = identify(&depot, form.token.or(query.token)).await?;
    let share = depot.create_share_async(path, identity).await?;
    Ok(text_response(format!("/shares/{}", share.token)))
}

/// GET /shares/{token} - serve the shared artifact to anyone.
pub(crate) async fn share_get(
    State(depot): State<Depot>,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let (file, data) = depot.fetch_shared_async(token).await?;
    Ok(file_response(&file, data))
}

/// DELETE /shares/{token} - revoke; only the creator may.
pub(crate) async fn share_delete(
    State(depot): State<Depot>,
    Path(token): Path<String>,
    Query(query): Query<DepotQuery>,
) -> Result<Response, AppError> {
    let identity = identify(&depot, query.token).await?;
    depot.revoke_share_async(token, identity).await?;
    Ok(StatusCode::OK.into_response())
}
