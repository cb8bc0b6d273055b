//! JSON error bodies for requests that never reach a handler.
//!
//! A failed [`AuthUser`](crate::auth::AuthUser) guard lands in
//! [`unauthorized`]. The body is the same whatever the gate's reason was.

use rocket::catch;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Catcher, Request};

use crate::auth::error::UNAUTHORIZED_MESSAGE;
use crate::error::ErrorResponse;

fn body(error: &str, message: &str) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        error: error.to_string(),
        message: message.to_string(),
    })
}

#[catch(400)]
pub fn bad_request() -> Json<ErrorResponse> {
    body("BadRequest", "request could not be parsed")
}

#[catch(401)]
pub fn unauthorized() -> Json<ErrorResponse> {
    body("Unauthorized", UNAUTHORIZED_MESSAGE)
}

#[catch(404)]
pub fn not_found(request: &Request<'_>) -> Json<ErrorResponse> {
    body("NotFound", &format!("no route for {}", request.uri().path()))
}

#[catch(422)]
pub fn unprocessable(request: &Request<'_>) -> Json<ErrorResponse> {
    log::debug!("unprocessable body for {} {}", request.method(), request.uri());
    body("BadRequest", "request body is missing fields or is not valid JSON")
}

#[catch(503)]
pub fn service_unavailable() -> Json<ErrorResponse> {
    body("StorageUnavailable", "storage temporarily unavailable")
}

#[catch(default)]
pub fn fallback(status: Status, _request: &Request<'_>) -> Json<ErrorResponse> {
    body("Error", status.reason().unwrap_or("unexpected error"))
}

pub fn all() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        not_found,
        unprocessable,
        service_unavailable,
        fallback
    ]
}
