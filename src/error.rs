use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_db_pools::sqlx;
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::Map;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::response::OpenApiResponderInner;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

#[derive(Debug)]
pub enum ApiError {
    DatabaseError(sqlx::Error),
    Unavailable(sqlx::Error),
    NotFound(String),
    BadRequest(String),
}

/// JSON body shared by every error the API returns.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error_type, message) = match self {
            ApiError::DatabaseError(e) => {
                log::error!("database error: {}", e);
                (
                    Status::InternalServerError,
                    "DatabaseError",
                    "database error".to_string(),
                )
            }
            ApiError::Unavailable(e) => {
                log::error!("database unavailable: {}", e);
                (
                    Status::ServiceUnavailable,
                    "StorageUnavailable",
                    "storage temporarily unavailable".to_string(),
                )
            }
            ApiError::NotFound(msg) => {
                log::debug!("not found: {}", msg);
                (Status::NotFound, "NotFound", msg)
            }
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (Status::BadRequest, "BadRequest", msg)
            }
        };

        json_error(status, error_type, message)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                ApiError::Unavailable(err)
            }
            _ => ApiError::DatabaseError(err),
        }
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        Ok(error_responses(&[
            ("400", "Request body or parameters were invalid."),
            ("401", "Missing, malformed or expired bearer token."),
            ("404", "Resource does not exist or belongs to another user."),
            ("500", "Unexpected server error."),
            ("503", "Storage is temporarily unavailable."),
        ]))
    }
}

/// Build an error response with the shared JSON shape.
pub(crate) fn json_error(
    status: Status,
    error_type: &str,
    message: String,
) -> response::Result<'static> {
    let error_response = ErrorResponse {
        error: error_type.to_string(),
        message,
    };

    let json = serde_json::to_string(&error_response).unwrap_or_else(|_| {
        r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string()
    });

    Response::build()
        .status(status)
        .header(ContentType::JSON)
        .sized_body(json.len(), Cursor::new(json))
        .ok()
}

pub(crate) fn error_responses(codes: &[(&str, &str)]) -> Responses {
    let mut responses = Map::new();
    for (code, description) in codes {
        responses.insert(
            code.to_string(),
            RefOr::Object(OpenApiResponse {
                description: description.to_string(),
                ..Default::default()
            }),
        );
    }
    Responses {
        responses,
        ..Default::default()
    }
}
