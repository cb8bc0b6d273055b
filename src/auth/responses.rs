use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::auth::store::Identity;

/// Body accepted by both the register and login endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterResponse {
    pub id: i32,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl From<Identity> for RegisterResponse {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username,
            created_at: identity.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhoAmIResponse {
    pub message: String,
    pub user_id: i32,
}
