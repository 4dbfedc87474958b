//! Artifact and directory handlers.
//!
//! `/artifacts` dispatches on the method itself so that unsupported
//! methods get the depot's own 405 with an `Allow` header.

use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::{DepotQuery, file_response, identify, text_response};
use crate::error::Error;
use crate::http::AppError;
use crate::listing::{ListingFormat, Resolved};
use crate::service::{Depot, DirectoryEntry, Upload};

/// Header carrying the BLAKE3 digest on HEAD responses.
pub(crate) const DIGEST_HEADER: HeaderName = HeaderName::from_static("x-content-blake3");

/// `/artifacts` and `/artifacts/` - the root.
pub(crate) async fn artifacts_root(
    State(depot): State<Depot>,
    Query(query): Query<DepotQuery>,
    request: Request,
) -> Result<Response, AppError> {
    dispatch(depot, String::new(), query, request).await
}

/// `/artifacts/{*path}`.
pub(crate) async fn artifacts(
    State(depot): State<Depot>,
    Path(path): Path<String>,
    Query(query): Query<DepotQuery>,
    request: Request,
) -> Result<Response, AppError> {
    dispatch(depot, path, query, request).await
}

async fn dispatch(
    depot: Depot,
    path: String,
    query: DepotQuery,
    request: Request,
) -> Result<Response, AppError> {
    let method = request.method().clone();
    match method {
        Method::GET => get_artifact(depot, path, query).await,
        Method::HEAD => head_artifact(depot, path, query).await,
        Method::POST => {
            let multipart = Multipart::from_request(request, &depot)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            post_artifact(depot, path, query, multipart).await
        },
        Method::DELETE => delete_artifact(depot, path, query).await,
        other => Err(Error::MethodNotAllowed(other.to_string()).into()),
    }
}

/// GET - listing for paths ending in `/`, file content otherwise.
async fn get_artifact(depot: Depot, path: String, query: DepotQuery) -> Result<Response, AppError> {
    let identity = identify(&depot, query.token).await?;
    match depot.get_async(path, identity).await? {
        (Resolved::File(file), Some(data)) => Ok(file_response(&file, data)),
        (Resolved::Listing(listing), _) => {
            let format = match query.format.as_deref() {
                Some(format) => format.parse::<ListingFormat>()?,
                None => ListingFormat::default(),
            };
            let body = format.render(&listing)?;
            Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response())
        },
        (Resolved::File(file), None) => Err(Error::not_found(file.artifact.path).into()),
    }
}

/// HEAD - size, type and digest without the body.
async fn head_artifact(depot: Depot, path: String, query: DepotQuery) -> Result<Response, AppError> {
    let identity = identify(&depot, query.token).await?;
    let info = depot.describe_async(path, identity).await?;
    Ok((
        [
            (header::CONTENT_TYPE, info.content_type),
            (header::CONTENT_LENGTH, info.size.to_string()),
            (DIGEST_HEADER, info.digest),
        ],
        (),
    )
        .into_response())
}

/// POST - multipart upload into the directory at `path`.
///
/// Fields: `path` (the file), `is_permanent`, `token`.
async fn post_artifact(
    depot: Depot,
    directory: String,
    query: DepotQuery,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut upload = Upload::default();
    let mut token = query.token;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "path" => {
                upload.filename = field.file_name().map(str::to_string);
                upload.data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?
                    .to_vec();
            },
            "is_permanent" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                upload.is_permanent = is_truthy(&value);
            },
            "token" => {
                token = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?,
                );
            },
            _ => {},
        }
    }

    let identity = identify(&depot, token).await?;
    let artifact = depot.upload_async(directory, upload, identity).await?;
    Ok(text_response(format!("/artifacts/{}", artifact.path)))
}

/// DELETE - remove one artifact.
async fn delete_artifact(depot: Depot, path: String, query: DepotQuery) -> Result<Response, AppError> {
    let identity = identify(&depot, query.token).await?;
    depot.delete_artifact_async(path, identity).await?;
    Ok(StatusCode::OK.into_response())
}

/// GET /directories - visible directories with write flag and usage.
pub(crate) async fn directories(
    State(depot): State<Depot>,
    Query(query): Query<DepotQuery>,
) -> Result<Json<Vec<DirectoryEntry>>, AppError> {
    let identity = identify(&depot, query.token).await?;
    Ok(Json(depot.directories_async(identity).await?))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}
