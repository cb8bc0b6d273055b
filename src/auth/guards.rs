//! Access gate for protected routes.
//!
//! Every protected handler takes an [`AuthUser`] argument. Rocket resolves
//! guards before calling the handler, so a request that fails the gate is
//! answered by the 401 catcher and the handler body never runs.
//!
//! The decision is written once into a typed per-request slot
//! ([`GateSlot`]). Later guards and the request logger read that slot
//! instead of re-verifying the token.

use std::sync::OnceLock;

use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::{AuthError, AuthState, JwtService};

/// Identity admitted by the gate for the current request.
#[derive(Debug, Clone, PartialEq, Eq, OpenApiFromRequest)]
pub struct AuthUser {
    pub id: i32,
}

/// Why the gate turned a request away. Only ever logged; clients see a
/// single uniform 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MissingToken,
    MalformedToken,
    ExpiredToken,
    Misconfigured,
}

impl GateRejection {
    fn into_error(self) -> AuthError {
        match self {
            GateRejection::MissingToken => AuthError::MissingToken,
            GateRejection::MalformedToken => AuthError::MalformedToken,
            GateRejection::ExpiredToken => AuthError::ExpiredToken,
            GateRejection::Misconfigured => {
                AuthError::SigningUnavailable("auth state missing from Rocket".into())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Admitted(AuthUser),
    Rejected(GateRejection),
}

/// Request-local storage for the gate decision. Empty means the gate has
/// not run for this request.
#[derive(Debug, Default)]
pub struct GateSlot(OnceLock<GateDecision>);

impl GateSlot {
    pub fn get(&self) -> Option<&GateDecision> {
        self.0.get()
    }
}

/// Read the gate decision for a request without triggering verification.
pub fn gate_decision<'r>(request: &'r Request<'_>) -> Option<&'r GateDecision> {
    request.local_cache(GateSlot::default).get()
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let slot = request.local_cache(GateSlot::default);
        if slot.get().is_none() {
            let decision = match request.guard::<&State<AuthState>>().await {
                Outcome::Success(state) => decide(request, &state.jwt_service),
                _ => GateDecision::Rejected(GateRejection::Misconfigured),
            };
            // A concurrent guard on the same request may have won the race;
            // either value is the same verification of the same header.
            let _ = slot.0.set(decision);
        }

        match slot.get() {
            Some(GateDecision::Admitted(user)) => Outcome::Success(user.clone()),
            Some(GateDecision::Rejected(reason)) => {
                let err = reason.into_error();
                Outcome::Error((err.status(), err))
            }
            None => {
                let err = AuthError::Unauthorized;
                Outcome::Error((err.status(), err))
            }
        }
    }
}

fn decide(request: &Request<'_>, jwt: &JwtService) -> GateDecision {
    let token = match bearer_token(request.headers().get_one("Authorization")) {
        Some(token) => token,
        None => {
            log::debug!("gate: {} {} rejected, no bearer token", request.method(), request.uri());
            return GateDecision::Rejected(GateRejection::MissingToken);
        }
    };

    match jwt.verify(token) {
        Ok(user_id) => GateDecision::Admitted(AuthUser { id: user_id }),
        Err(AuthError::ExpiredToken) => {
            log::debug!("gate: {} {} rejected, token expired", request.method(), request.uri());
            GateDecision::Rejected(GateRejection::ExpiredToken)
        }
        Err(err) => {
            log::debug!(
                "gate: {} {} rejected, token invalid ({})",
                request.method(),
                request.uri(),
                err
            );
            GateDecision::Rejected(GateRejection::MalformedToken)
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?;
    let mut parts = header.splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_headers() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(Some("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(None), None);
        assert_eq!(bearer_token(Some("Bearer")), None);
        assert_eq!(bearer_token(Some("Bearer   ")), None);
        assert_eq!(bearer_token(Some("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(Some("abc.def.ghi")), None);
    }

    #[test]
    fn rejections_map_to_unauthorized() {
        for reason in [
            GateRejection::MissingToken,
            GateRejection::MalformedToken,
            GateRejection::ExpiredToken,
        ] {
            assert_eq!(reason.into_error().status(), rocket::http::Status::Unauthorized);
        }
        assert_eq!(
            GateRejection::Misconfigured.into_error().status(),
            rocket::http::Status::InternalServerError
        );
    }

    #[test]
    fn slot_is_written_once() {
        let slot = GateSlot::default();
        assert!(slot.get().is_none());
        slot.0
            .set(GateDecision::Admitted(AuthUser { id: 3 }))
            .expect("first write");
        assert!(slot.0.set(GateDecision::Rejected(GateRejection::MissingToken)).is_err());
        assert_eq!(slot.get(), Some(&GateDecision::Admitted(AuthUser { id: 3 })));
    }
}
