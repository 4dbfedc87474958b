//! HTTP handlers organized by resource.

mod artifacts;
mod shares;

pub(crate) use artifacts::{artifacts, artifacts_root, directories};
pub(crate) use shares::{share_create, share_delete, share_get};

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use super::AppError;
use crate::identity::Identity;
use crate::listing::FileRef;
use crate::service::Depot;

/// Query parameters shared by every route.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct DepotQuery {
    /// Lookup token standing in for a login
    pub token: Option<String>,
    /// Listing format (`json`, `toml`, `text`)
    pub format: Option<String>,
}

/// Resolves the caller. There is no session, so no token means anonymous.
async fn identify(depot: &Depot, token: Option<String>) -> Result<Identity, AppError> {
    Ok(depot.identify_async(Identity::Anonymous, token).await?)
}

/// Body plus exact length and guessed type of a file.
fn file_response(file: &FileRef, data: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.clone()),
            (header::CONTENT_LENGTH, data.len().to_string()),
        ],
        data,
    )
        .into_response()
}

fn text_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}
