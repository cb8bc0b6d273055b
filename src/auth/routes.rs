use rocket::{State, get, post};
use rocket::response::status;
use rocket::serde::json::Json;
use rocket_okapi::openapi;

use crate::auth::guards::AuthUser;
use crate::auth::responses::{CredentialsRequest, LoginResponse, RegisterResponse, WhoAmIResponse};
use crate::auth::{AuthResult, AuthState};

/// Create an account. The password is stored only as an Argon2id hash.
#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    payload: Json<CredentialsRequest>,
) -> AuthResult<status::Created<Json<RegisterResponse>>> {
    let identity = state
        .credentials
        .register(&payload.username, &payload.password)
        .await?;

    let location = format!("/users/{}", identity.id);
    Ok(status::Created::new(location).body(Json(RegisterResponse::from(identity))))
}

/// Exchange a username and password for a bearer token.
///
/// Unknown usernames and wrong passwords produce the same 401.
#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    payload: Json<CredentialsRequest>,
) -> AuthResult<Json<LoginResponse>> {
    let identity = state
        .credentials
        .authenticate(&payload.username, &payload.password)
        .await?;

    let token = state.jwt_service.issue_access_token(identity.id)?;
    log::info!("issued access token for user {}", identity.id);

    Ok(Json(LoginResponse {
        token: token.token,
        token_type: "Bearer".to_string(),
        expires_at: token.expires_at,
    }))
}

/// Echo the identity the gate admitted.
#[openapi(tag = "Auth")]
#[get("/protected-test")]
pub async fn protected_test(user: AuthUser) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse {
        message: "You have accessed a protected route".to_string(),
        user_id: user.id,
    })
}
