use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::auth::{AuthConfig, AuthError, AuthResult};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies HS256 access tokens.
///
/// The signing secret is fixed at construction; rotating it means building
/// a new service, which invalidates every outstanding token.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_token_ttl: Duration,
}

impl JwtService {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        if config.jwt_secret.trim().is_empty() {
            return Err(AuthError::SigningUnavailable("signing secret is empty".into()));
        }
        let access_token_ttl = Duration::try_seconds(config.access_token_ttl_secs)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| {
                AuthError::InvalidConfig(format!(
                    "access token ttl out of range: {}s",
                    config.access_token_ttl_secs
                ))
            })?;
        let secret_bytes = config.jwt_secret.as_bytes();
        let encoding_key = EncodingKey::from_secret(secret_bytes);
        let decoding_key = DecodingKey::from_secret(secret_bytes);

        // Expiry is checked by `verify_at` against an explicit clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[config.audience.clone()]);
        validation.set_issuer(&[config.issuer.clone()]);
        validation.set_required_spec_claims(&["exp", "iat", "sub", "iss", "aud"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access_token_ttl,
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    pub fn issue_access_token(&self, user_id: i32) -> AuthResult<SignedAccessToken> {
        self.issue_access_token_at(user_id, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> AuthResult<SignedAccessToken> {
        // Claims carry whole seconds; `expires_at` must match `exp` exactly.
        let issued_at = now.timestamp();
        let exp = issued_at
            .checked_add(self.access_token_ttl.num_seconds())
            .ok_or_else(|| AuthError::SigningUnavailable("token expiry overflows".into()))?;
        let expires_at = DateTime::from_timestamp(exp, 0)
            .ok_or_else(|| AuthError::SigningUnavailable("token expiry out of range".into()))?;
        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp,
            iat: issued_at,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::SigningUnavailable(err.to_string()))?;

        Ok(SignedAccessToken { token, expires_at })
    }

    /// Verify a token and return the user id it was issued for.
    pub fn verify(&self, token: &str) -> AuthResult<i32> {
        self.verify_at(token, Utc::now())
    }

    /// A token is valid strictly before its `exp` second; at `exp` it has
    /// already expired.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<i32> {
        let claims = self.decode_access_token(token)?;
        if now.timestamp() >= claims.exp {
            return Err(AuthError::ExpiredToken);
        }
        claims.sub.parse().map_err(|_| AuthError::MalformedToken)
    }

    pub fn decode_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::MalformedToken,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::PasswordHashParams;

    const TEST_JWT_SECRET: &str = "super-secret-test-key";

    fn make_test_config(secret: &str) -> AuthConfig {
        AuthConfig {
            issuer: "https://todo.test".into(),
            audience: "todo-api".into(),
            access_token_ttl_secs: 900,
            password_min_length: 1,
            password_hash: PasswordHashParams::default(),
            hash_workers: 1,
            jwt_secret: secret.into(),
        }
    }

    fn service() -> JwtService {
        JwtService::from_config(&make_test_config(TEST_JWT_SECRET)).expect("jwt service")
    }

    #[test]
    fn issues_and_verifies_access_tokens() {
        let service = service();
        let token = service.issue_access_token(42).expect("issue token");
        assert_eq!(service.verify(&token.token).expect("verify"), 42);

        let claims = service
            .decode_access_token(&token.token)
            .expect("decode token");
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.exp, token.expires_at.timestamp());
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let service = service();
        let issued_at = Utc::now();
        let token = service
            .issue_access_token_at(7, issued_at)
            .expect("issue token");
        let exp = token.expires_at;

        assert_eq!(
            service
                .verify_at(&token.token, exp - Duration::seconds(1))
                .expect("valid before expiry"),
            7
        );
        assert!(matches!(
            service.verify_at(&token.token, exp),
            Err(AuthError::ExpiredToken)
        ));
        assert!(matches!(
            service.verify_at(&token.token, exp + Duration::seconds(1)),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn advertised_expiry_matches_signed_claim() {
        let service = service();
        let issued_at = DateTime::from_timestamp(1_767_225_600, 700_000_000).expect("instant");
        let token = service
            .issue_access_token_at(3, issued_at)
            .expect("issue token");

        assert_eq!(token.expires_at.timestamp_subsec_nanos(), 0);
        assert_eq!(
            token.expires_at,
            DateTime::from_timestamp(1_767_225_600 + 900, 0).expect("instant")
        );
        assert_eq!(
            service
                .verify_at(&token.token, token.expires_at - Duration::milliseconds(500))
                .expect("valid until the advertised expiry"),
            3
        );
        assert!(matches!(
            service.verify_at(&token.token, token.expires_at),
            Err(AuthError::ExpiredToken)
        ));
    }

    #[test]
    fn rejects_ttl_outside_chrono_range() {
        let mut config = make_test_config(TEST_JWT_SECRET);
        config.access_token_ttl_secs = i64::MAX;
        assert!(matches!(
            JwtService::from_config(&config),
            Err(AuthError::InvalidConfig(_))
        ));

        config.access_token_ttl_secs = 0;
        assert!(matches!(
            JwtService::from_config(&config),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    #[test]
    fn expiry_past_the_calendar_is_an_error() {
        let mut config = make_test_config(TEST_JWT_SECRET);
        config.access_token_ttl_secs = 365 * 24 * 60 * 60;
        let service = JwtService::from_config(&config).expect("jwt service");
        assert!(matches!(
            service.issue_access_token_at(1, DateTime::<Utc>::MAX_UTC),
            Err(AuthError::SigningUnavailable(_))
        ));
    }

    #[test]
    fn tampered_signature_fails() {
        let service = service();
        let token = service.issue_access_token(1).expect("issue token").token;
        let signature_start = token.rfind('.').expect("three segments") + 1;

        for idx in signature_start..token.len() {
            let mut bytes = token.clone().into_bytes();
            bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).expect("ascii token");
            assert!(
                matches!(service.verify(&tampered), Err(AuthError::MalformedToken)),
                "tampering byte {idx} should invalidate the token"
            );
        }
    }

    #[test]
    fn truncated_and_garbage_tokens_are_malformed() {
        let service = service();
        let token = service.issue_access_token(1).expect("issue token").token;
        assert!(matches!(
            service.verify(&token[..token.len() - 1]),
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(service.verify("abc"), Err(AuthError::MalformedToken)));
        assert!(matches!(service.verify(""), Err(AuthError::MalformedToken)));
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let other = JwtService::from_config(&make_test_config("rotated-secret")).expect("jwt");
        let token = other.issue_access_token(5).expect("issue").token;
        assert!(matches!(
            service().verify(&token),
            Err(AuthError::MalformedToken)
        ));
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(
            JwtService::from_config(&make_test_config("")),
            Err(AuthError::SigningUnavailable(_))
        ));
    }
}
