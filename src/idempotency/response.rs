use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

/// Marker attached to a `201 Created` response naming the new resource.
///
/// The idempotency gate only inspects this extension; it never looks at the
/// response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedResource(pub i64);

/// Body of a created (or replayed) response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBody {
    pub id: i64,
}

/// `201 Created` with a `Location` of `{collection_path}/{id}` and `{"id": id}`.
///
/// Create handlers and replays both go through this type, so a replay is
/// indistinguishable from the original response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAt {
    pub id: i64,
    pub location: String,
}

impl CreatedAt {
    pub fn new(collection_path: &str, id: i64) -> Self {
        Self {
            id,
            location: format!("{}/{}", collection_path.trim_end_matches('/'), id),
        }
    }
}

impl IntoResponse for CreatedAt {
    fn into_response(self) -> Response {
        (
            StatusCode::CREATED,
            [(header::LOCATION, self.location)],
            Extension(CreatedResource(self.id)),
            Json(CreatedBody { id: self.id }),
        )
            .into_response()
    }
}

pub const CONFLICT_MESSAGE: &str = "Idempotency key reuse with different payload.";

/// Body returned when a key is reused with a different payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyConflict {
    pub error: String,
    pub key: String,
    pub existing_resource_id: i64,
}

impl IdempotencyConflict {
    pub fn new(key: impl Into<String>, existing_resource_id: i64) -> Self {
        Self {
            error: CONFLICT_MESSAGE.to_string(),
            key: key.into(),
            existing_resource_id,
        }
    }
}

impl IntoResponse for IdempotencyConflict {
    fn into_response(self) -> Response {
        (StatusCode::CONFLICT, Json(self)).into_response()
    }
}
