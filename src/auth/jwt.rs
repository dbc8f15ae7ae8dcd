/// Token Issuer
///
/// Mints and verifies the two token classes. Access and refresh tokens
/// are signed with distinct secrets, so a token of one class never
/// verifies against the other class's key.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Generate a short-lived access token for an identity.
pub fn issue_access_token(
    identity_id: Uuid,
    username: &str,
    email: &str,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = AccessClaims::new(
        identity_id,
        username.to_string(),
        email.to_string(),
        config.access_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Access token generation failed: {}", e)))
}

/// Generate a long-lived refresh token for an identity.
///
/// The returned string is also the exact value persisted as the
/// identity's current refresh token; the byte-for-byte comparison at
/// refresh time depends on that.
pub fn issue_refresh_token(identity_id: Uuid, config: &JwtSettings) -> Result<String, AppError> {
    let claims = RefreshClaims::new(
        identity_id,
        config.refresh_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Refresh token generation failed: {}", e)))
}

/// Validate an access token and extract its claims.
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::Auth(AuthError::Expired),
        _ => AppError::Auth(AuthError::InvalidSignature),
    })
}

/// Verify a refresh token's signature and expiry, returning the
/// identity id it was issued to.
///
/// Expired and forged tokens surface as distinct kinds so the logs can
/// tell a lapsed client from an attack, even though both map to the
/// same wire response.
pub fn verify_refresh_token(token: &str, config: &JwtSettings) -> Result<Uuid, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    let claims = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::Auth(AuthError::Expired),
        _ => AppError::Auth(AuthError::InvalidSignature),
    })?;

    claims.identity_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "access-test-secret-at-least-32-chars!!".to_string(),
            refresh_secret: "refresh-test-secret-at-least-32-chars".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "authgate-test".to_string(),
        }
    }

    #[test]
    fn access_token_round_trip() {
        let config = get_test_config();
        let id = Uuid::new_v4();

        let token = issue_access_token(id, "alice", "alice@example.com", &config)
            .expect("Failed to issue token");
        let claims = validate_access_token(&token, &config).expect("Failed to validate token");

        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.iss, "authgate-test");
    }

    #[test]
    fn refresh_token_round_trip() {
        let config = get_test_config();
        let id = Uuid::new_v4();

        let token = issue_refresh_token(id, &config).expect("Failed to issue token");
        let decoded_id = verify_refresh_token(&token, &config).expect("Failed to verify token");

        assert_eq!(decoded_id, id);
    }

    #[test]
    fn tampered_refresh_token_fails_invalid_signature() {
        let config = get_test_config();
        let token = issue_refresh_token(Uuid::new_v4(), &config).expect("Failed to issue token");

        let tampered = format!("{}X", token);
        match verify_refresh_token(&tampered, &config) {
            Err(AppError::Auth(AuthError::InvalidSignature)) => (),
            other => panic!("expected InvalidSignature, got {:?}", other),
        }
    }

    #[test]
    fn expired_refresh_token_fails_expired() {
        let config = get_test_config();
        let id = Uuid::new_v4();

        // Sign a token whose expiry is already in the past, beyond the
        // default validation leeway.
        let claims = RefreshClaims::new(id, -3600, config.issuer.clone());
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.refresh_secret.as_bytes()),
        )
        .expect("Failed to sign token");

        match verify_refresh_token(&token, &config) {
            Err(AppError::Auth(AuthError::Expired)) => (),
            other => panic!("expected Expired, got {:?}", other),
        }
    }

    #[test]
    fn access_token_never_verifies_as_refresh() {
        let config = get_test_config();
        let token = issue_access_token(Uuid::new_v4(), "alice", "alice@example.com", &config)
            .expect("Failed to issue token");

        match verify_refresh_token(&token, &config) {
            Err(AppError::Auth(AuthError::InvalidSignature)) => (),
            other => panic!("expected InvalidSignature, got {:?}", other),
        }
    }

    #[test]
    fn refresh_token_never_verifies_as_access() {
        let config = get_test_config();
        let token = issue_refresh_token(Uuid::new_v4(), &config).expect("Failed to issue token");

        match validate_access_token(&token, &config) {
            Err(AppError::Auth(AuthError::InvalidSignature)) => (),
            other => panic!("expected InvalidSignature, got {:?}", other),
        }
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let mut config = get_test_config();
        let token = issue_refresh_token(Uuid::new_v4(), &config).expect("Failed to issue token");

        config.issuer = "someone-else".to_string();
        assert!(verify_refresh_token(&token, &config).is_err());
    }
}
