/// Session Manager
///
/// The core state machine. Per identity, observed through the stored
/// refresh token: Anonymous (nothing stored) -> Active (token X) ->
/// Active (token Y, after rotation) -> Anonymous (after logout).
/// A stale token presented after rotation is rejected and never
/// re-extends the session.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::{
    issue_access_token, issue_refresh_token, verify_password, verify_refresh_token,
};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::session::store::{IdentityStore, SessionStore};

/// The issuance output of login and refresh.
#[derive(Debug, Clone)]
pub struct SessionPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Orchestrates credential verification, token issuance, and refresh
/// rotation. Holds its configuration explicitly so independent
/// instances can run side by side in tests.
#[derive(Clone)]
pub struct SessionManager {
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    jwt: JwtSettings,
}

impl SessionManager {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        jwt: JwtSettings,
    ) -> Self {
        Self {
            identities,
            sessions,
            jwt,
        }
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }

    /// Authenticate a password and open a session.
    ///
    /// Exactly one persisted write: the freshly issued refresh token
    /// replaces whatever was stored before.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<SessionPair, AppError> {
        let identity = self
            .identities
            .find_by_identifier(identifier)
            .await?
            .ok_or(AppError::Auth(AuthError::NotFound))?;

        if !verify_password(password, &identity.password_hash)? {
            tracing::warn!(user_id = %identity.id, "Password verification failed");
            return Err(AppError::Auth(AuthError::Unauthorized));
        }

        let access_token =
            issue_access_token(identity.id, &identity.username, &identity.email, &self.jwt)?;
        let refresh_token = issue_refresh_token(identity.id, &self.jwt)?;

        self.sessions
            .set_refresh_token(identity.id, &refresh_token)
            .await?;

        tracing::info!(user_id = %identity.id, "Session opened");

        Ok(SessionPair {
            access_token,
            refresh_token,
        })
    }

    /// Close the session by clearing the stored refresh token.
    /// Idempotent: logging out twice, or with nothing stored, is fine.
    pub async fn logout(&self, identity_id: Uuid) -> Result<(), AppError> {
        self.sessions.clear_refresh_token(identity_id).await?;
        tracing::info!(user_id = %identity_id, "Session closed");
        Ok(())
    }

    /// Rotate a refresh token and reissue the session pair.
    ///
    /// The presented token must carry a valid signature, be unexpired,
    /// and match the stored value byte for byte. The stored-value check
    /// runs as an atomic compare-and-swap, so the moment a rotation
    /// commits the previous token is dead, even for a caller whose
    /// response was lost.
    pub async fn refresh(&self, presented: &str) -> Result<SessionPair, AppError> {
        let identity_id = verify_refresh_token(presented, &self.jwt)?;

        let identity = self
            .identities
            .find_by_id(identity_id)
            .await?
            .ok_or(AppError::Auth(AuthError::Unauthorized))?;

        let refresh_token = issue_refresh_token(identity.id, &self.jwt)?;

        let rotated = self
            .sessions
            .swap_refresh_token(identity.id, presented, &refresh_token)
            .await?;
        if !rotated {
            // Signature-valid token that no longer matches the stored
            // value: a stale client or a replayed theft.
            tracing::warn!(user_id = %identity.id, "Refresh token reuse detected");
            return Err(AppError::Auth(AuthError::TokenReused));
        }

        let access_token =
            issue_access_token(identity.id, &identity.username, &identity.email, &self.jwt)?;

        tracing::info!(user_id = %identity.id, "Session rotated");

        Ok(SessionPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::session::store::{Identity, MemoryStore};

    fn test_jwt_settings() -> JwtSettings {
        JwtSettings {
            access_secret: "access-test-secret-at-least-32-chars!!".to_string(),
            refresh_secret: "refresh-test-secret-at-least-32-chars".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "authgate-test".to_string(),
        }
    }

    fn test_manager() -> (SessionManager, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::new_v4();
        store.insert_identity(Identity {
            id,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: hash_password("CorrectHorse1").expect("Failed to hash password"),
            current_refresh_token: None,
        });

        let manager = SessionManager::new(store.clone(), store.clone(), test_jwt_settings());
        (manager, store, id)
    }

    fn assert_auth_err(result: Result<SessionPair, AppError>, expected: AuthError) {
        match result {
            Err(AppError::Auth(kind)) if kind == expected => (),
            other => panic!("expected {:?}, got {:?}", expected, other.map(|_| "Ok")),
        }
    }

    #[tokio::test]
    async fn login_persists_the_issued_refresh_token() {
        let (manager, store, id) = test_manager();

        let pair = manager.login("alice", "CorrectHorse1").await.unwrap();

        assert_eq!(
            store.get_refresh_token(id).await.unwrap(),
            Some(pair.refresh_token)
        );
    }

    #[tokio::test]
    async fn login_accepts_email_as_identifier() {
        let (manager, _, _) = test_manager();
        assert!(manager
            .login("alice@example.com", "CorrectHorse1")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn login_unknown_identifier_fails_not_found() {
        let (manager, _, _) = test_manager();
        assert_auth_err(
            manager.login("nobody", "CorrectHorse1").await,
            AuthError::NotFound,
        );
    }

    #[tokio::test]
    async fn login_wrong_password_fails_unauthorized() {
        let (manager, _, _) = test_manager();
        assert_auth_err(
            manager.login("alice", "WrongHorse1").await,
            AuthError::Unauthorized,
        );
    }

    #[tokio::test]
    async fn refresh_rotates_through_the_full_chain() {
        let (manager, _, _) = test_manager();

        // login -> (A1, R1)
        let first = manager.login("alice", "CorrectHorse1").await.unwrap();

        // refresh(R1) -> (A2, R2), R2 != R1
        let second = manager.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        // refresh(R1) again -> TokenReused
        assert_auth_err(
            manager.refresh(&first.refresh_token).await,
            AuthError::TokenReused,
        );

        // refresh(R2) -> (A3, R3)
        let third = manager.refresh(&second.refresh_token).await.unwrap();
        assert_ne!(third.refresh_token, second.refresh_token);
    }

    #[tokio::test]
    async fn pre_rotation_token_stays_dead_even_though_unexpired() {
        let (manager, _, _) = test_manager();

        let first = manager.login("alice", "CorrectHorse1").await.unwrap();
        manager.refresh(&first.refresh_token).await.unwrap();

        // Signature and expiry on R1 are still fine; only the stored
        // value disqualifies it.
        assert_auth_err(
            manager.refresh(&first.refresh_token).await,
            AuthError::TokenReused,
        );
    }

    #[tokio::test]
    async fn refresh_after_logout_fails() {
        let (manager, _, id) = test_manager();

        let pair = manager.login("alice", "CorrectHorse1").await.unwrap();
        manager.logout(id).await.unwrap();

        assert_auth_err(
            manager.refresh(&pair.refresh_token).await,
            AuthError::TokenReused,
        );
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let (manager, _, id) = test_manager();

        manager.login("alice", "CorrectHorse1").await.unwrap();
        manager.logout(id).await.unwrap();
        manager.logout(id).await.unwrap();
    }

    #[tokio::test]
    async fn refresh_without_a_stored_token_never_succeeds() {
        let (manager, _, id) = test_manager();

        // Well-signed, unexpired, but no login ever happened.
        let token = issue_refresh_token(id, &test_jwt_settings()).unwrap();
        assert_auth_err(manager.refresh(&token).await, AuthError::TokenReused);
    }

    #[tokio::test]
    async fn refresh_for_a_vanished_identity_fails_unauthorized() {
        let (manager, _, _) = test_manager();

        let token = issue_refresh_token(Uuid::new_v4(), &test_jwt_settings()).unwrap();
        assert_auth_err(manager.refresh(&token).await, AuthError::Unauthorized);
    }

    #[tokio::test]
    async fn refresh_with_garbage_fails_invalid_signature() {
        let (manager, _, _) = test_manager();
        assert_auth_err(
            manager.refresh("definitely.not.ajwt").await,
            AuthError::InvalidSignature,
        );
    }

    #[tokio::test]
    async fn concurrent_refresh_with_the_same_token_has_one_winner() {
        let (manager, _, _) = test_manager();

        let pair = manager.login("alice", "CorrectHorse1").await.unwrap();

        let m1 = manager.clone();
        let m2 = manager.clone();
        let t1 = pair.refresh_token.clone();
        let t2 = pair.refresh_token.clone();

        let (a, b) = tokio::join!(
            tokio::spawn(async move { m1.refresh(&t1).await }),
            tokio::spawn(async move { m2.refresh(&t2).await }),
        );

        let successes = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(successes, 1);
    }
}
