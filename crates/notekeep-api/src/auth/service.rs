//! Authentication service layer
//!
//! Composes password hashing, access tokens and refresh-token sessions into
//! register, login, refresh and logout. Cookies are handled by the HTTP
//! handlers; this layer deals in raw token strings only.

use chrono::Utc;
use notekeep_core::{AuthConfig, CredentialStore, NewUser, User};
use std::sync::{Arc, OnceLock};

use super::jwt::{generate_access_token, validate_access_token, JwtConfig, JwtError};
use super::middleware::AuthenticatedUser;
use super::models::{AuthResponse, LoginRequest, RefreshResponse, RegisterRequest, UserResponse};
use super::password::{
    check_password_length, hash_password_with_config, verify_password, PasswordConfig,
};
use super::refresh::RefreshTokenManager;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::AppError;

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    jwt_config: JwtConfig,
    refresh_tokens: RefreshTokenManager,
    password_config: PasswordConfig,
    /// Verified against when the email is unknown so both login failures
    /// cost one Argon2 run
    dummy_hash: Arc<OnceLock<String>>,
}

const DUMMY_PASSWORD: &str = "notekeep-unknown-account";

impl AuthService {
    /// Create a new authentication service with default Argon2 parameters
    pub fn new(store: Arc<dyn CredentialStore>, config: &AuthConfig) -> Self {
        Self {
            refresh_tokens: RefreshTokenManager::new(store.clone(), config.refresh_token_ttl_secs),
            jwt_config: JwtConfig::from(config),
            password_config: PasswordConfig::default(),
            dummy_hash: Arc::new(OnceLock::new()),
            store,
        }
    }

    /// Override the Argon2 parameters used for new hashes
    pub fn with_password_config(mut self, password_config: PasswordConfig) -> Self {
        self.password_config = password_config;
        self.dummy_hash = Arc::new(OnceLock::new());
        self
    }

    fn unknown_account_hash(&self) -> &str {
        self.dummy_hash.get_or_init(|| {
            hash_password_with_config(DUMMY_PASSWORD, &self.password_config).unwrap_or_else(
                |e| {
                    tracing::warn!(error = %e, "Failed to prepare dummy password hash");
                    String::new()
                },
            )
        })
    }

    /// Register a new user and sign them in
    ///
    /// # Returns
    ///
    /// * `Ok(AuthResponse)` - access token, refresh token and the new user
    /// * `Err(AppError::Conflict)` - email already registered
    /// * `Err(AppError::BadRequest)` - password longer than the hasher accepts
    pub async fn register(
        &self,
        request: RegisterRequest,
        client: &ClientInfo,
    ) -> Result<AuthResponse, AppError> {
        let result = self.create_user(&request).await;

        let user = match result {
            Ok(user) => user,
            Err(e) => {
                audit_log(&AuditEvent::RegistrationFailure {
                    email: request.email.clone(),
                    reason: registration_failure_reason(&e).to_string(),
                    ip_address: client.ip_address.clone(),
                    user_agent: client.user_agent.clone(),
                });
                return Err(e);
            }
        };

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            email: user.email.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        self.issue_session(user).await
    }

    async fn create_user(&self, request: &RegisterRequest) -> Result<User, AppError> {
        check_password_length(&request.password)?;

        if self.store.find_user_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password_with_config(&request.password, &self.password_config)?;

        // The store enforces uniqueness too, covering concurrent registrations
        let user = self
            .store
            .create_user(NewUser {
                email: request.email.clone(),
                password_hash,
            })
            .await?;

        Ok(user)
    }

    /// Login with email and password
    ///
    /// An unknown email and a wrong password produce the same error.
    pub async fn login(
        &self,
        request: LoginRequest,
        client: &ClientInfo,
    ) -> Result<AuthResponse, AppError> {
        let user = match self.check_credentials(&request).await? {
            Some(user) => user,
            None => {
                audit_log(&AuditEvent::LoginFailure {
                    email: request.email.clone(),
                    reason: "Invalid credentials".to_string(),
                    ip_address: client.ip_address.clone(),
                    user_agent: client.user_agent.clone(),
                });
                return Err(AppError::Unauthorized);
            }
        };

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email.clone(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        });

        self.issue_session(user).await
    }

    async fn check_credentials(&self, request: &LoginRequest) -> Result<Option<User>, AppError> {
        let Some(user) = self.store.find_user_by_email(&request.email).await? else {
            let _ = verify_password(&request.password, self.unknown_account_hash());
            return Ok(None);
        };

        if verify_password(&request.password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    async fn issue_session(&self, user: User) -> Result<AuthResponse, AppError> {
        let now = Utc::now();
        let token = generate_access_token(&self.jwt_config, user.id, &user.email, now)?;
        let refresh = self.refresh_tokens.issue(user.id, now).await?;

        Ok(AuthResponse {
            token,
            refresh_token: refresh.token,
            user: UserResponse::from(user),
        })
    }

    /// Exchange a refresh token for a new access token and refresh token
    ///
    /// Missing, unknown, expired, revoked and already-rotated tokens all
    /// yield `Unauthorized`.
    pub async fn refresh(
        &self,
        refresh_token: Option<&str>,
        client: &ClientInfo,
    ) -> Result<RefreshResponse, AppError> {
        let result = match refresh_token {
            Some(token) => self.rotate(token).await,
            None => Err(AppError::Unauthorized),
        };

        match &result {
            Ok((user_id, _)) => audit_log(&AuditEvent::TokenRefresh {
                user_id: *user_id,
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            }),
            Err(AppError::Unauthorized) => audit_log(&AuditEvent::RefreshRejected {
                reason: match refresh_token {
                    Some(_) => "Invalid, expired or revoked refresh token".to_string(),
                    None => "Missing refresh token".to_string(),
                },
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
            }),
            Err(_) => {}
        }

        result.map(|(_, response)| response)
    }

    async fn rotate(&self, token: &str) -> Result<(i64, RefreshResponse), AppError> {
        let now = Utc::now();
        let (old, replacement) = self.refresh_tokens.rotate(token, now).await?;

        let user = self
            .store
            .find_user_by_id(old.user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let token = generate_access_token(&self.jwt_config, user.id, &user.email, now)?;

        Ok((
            user.id,
            RefreshResponse {
                token,
                refresh_token: replacement.token,
            },
        ))
    }

    /// Revoke the presented refresh token, if any
    ///
    /// Never fails: unknown tokens and store errors are logged and ignored.
    pub async fn logout(&self, refresh_token: Option<&str>, client: &ClientInfo) {
        let user_id = match refresh_token {
            Some(token) => self.refresh_tokens.revoke(token).await,
            None => None,
        };

        audit_log(&AuditEvent::Logout {
            user_id,
            ip_address: client.ip_address.clone(),
        });
    }

    /// Verify an access token and return the caller's identity
    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, JwtError> {
        let claims = validate_access_token(&self.jwt_config, token, Utc::now())?;
        Ok(AuthenticatedUser::from(claims))
    }

    /// Current user profile
    pub async fn get_user(&self, user_id: i64) -> Result<UserResponse, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }
}

fn registration_failure_reason(error: &AppError) -> &'static str {
    match error {
        AppError::Conflict(_) => "Email already registered",
        AppError::BadRequest(_) => "Invalid password",
        _ => "Internal error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notekeep_core::MemoryStore;

    fn service() -> (Arc<MemoryStore>, AuthService) {
        let store = Arc::new(MemoryStore::new());
        let config = AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..AuthConfig::default()
        };
        let service = AuthService::new(store.clone(), &config)
            .with_password_config(PasswordConfig::light());
        (store, service)
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (store, service) = service();
        let client = ClientInfo::default();

        let registered = service
            .register(register_request("a@b.com", "secret1"), &client)
            .await
            .unwrap();
        assert!(!registered.token.is_empty());
        assert!(!registered.refresh_token.is_empty());
        assert_eq!(registered.user.email, "a@b.com");

        let stored = store.find_user_by_email("a@b.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");

        let logged_in = service
            .login(login_request("a@b.com", "secret1"), &client)
            .await
            .unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let identity = service.authenticate(&logged_in.token).unwrap();
        assert_eq!(identity.user_id, registered.user.id);
        assert_eq!(identity.email, "a@b.com");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (_, service) = service();
        let client = ClientInfo::default();

        service
            .register(register_request("a@b.com", "secret1"), &client)
            .await
            .unwrap();
        let result = service
            .register(register_request("a@b.com", "another"), &client)
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_long_password() {
        let (store, service) = service();
        let result = service
            .register(register_request("a@b.com", &"x".repeat(73)), &ClientInfo::default())
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(store.find_user_by_email("a@b.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (_, service) = service();
        let client = ClientInfo::default();
        service
            .register(register_request("a@b.com", "secret1"), &client)
            .await
            .unwrap();

        let wrong_password = service.login(login_request("a@b.com", "wrong!"), &client).await;
        let unknown_user = service.login(login_request("x@y.com", "secret1"), &client).await;

        assert!(matches!(wrong_password, Err(AppError::Unauthorized)));
        assert!(matches!(unknown_user, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_unknown_email_still_verifies_a_hash() {
        let (_, service) = service();
        assert!(service.dummy_hash.get().is_none());

        let result = service
            .login(login_request("nobody@example.com", "secret1"), &ClientInfo::default())
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized)));

        let hash = service.dummy_hash.get().unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=1024,t=1,p=1$"));
        assert!(!verify_password("secret1", hash).unwrap());
        assert!(verify_password(DUMMY_PASSWORD, hash).unwrap());
    }

    #[tokio::test]
    async fn test_oversized_refresh_ttl_fails_without_panicking() {
        let store = Arc::new(MemoryStore::new());
        let config = AuthConfig {
            jwt_secret: "test-secret".to_string(),
            refresh_token_ttl_secs: 1_000_000_000 * 86_400,
            ..AuthConfig::default()
        };
        let service =
            AuthService::new(store.clone(), &config).with_password_config(PasswordConfig::light());

        let result = service
            .register(register_request("a@b.com", "secret1"), &ClientInfo::default())
            .await;
        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(store.refresh_token_count().await, 0);
    }

    #[tokio::test]
    async fn test_refresh_rotation() {
        let (_, service) = service();
        let client = ClientInfo::default();
        let session = service
            .register(register_request("a@b.com", "secret1"), &client)
            .await
            .unwrap();

        let first = service
            .refresh(Some(&session.refresh_token), &client)
            .await
            .unwrap();
        assert_ne!(first.refresh_token, session.refresh_token);
        assert!(service.authenticate(&first.token).is_ok());

        let reuse = service.refresh(Some(&session.refresh_token), &client).await;
        assert!(matches!(reuse, Err(AppError::Unauthorized)));

        assert!(service
            .refresh(Some(&first.refresh_token), &client)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_refresh_without_token() {
        let (_, service) = service();
        let result = service.refresh(None, &ClientInfo::default()).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));

        let result = service.refresh(Some("garbage"), &ClientInfo::default()).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let (_, service) = service();
        let client = ClientInfo::default();
        let session = service
            .register(register_request("a@b.com", "secret1"), &client)
            .await
            .unwrap();

        service.logout(Some(&session.refresh_token), &client).await;
        service.logout(Some(&session.refresh_token), &client).await;
        service.logout(None, &client).await;

        let result = service.refresh(Some(&session.refresh_token), &client).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));

        // Access tokens stay valid until they expire
        assert!(service.authenticate(&session.token).is_ok());
    }

    #[tokio::test]
    async fn test_get_user() {
        let (_, service) = service();
        let session = service
            .register(register_request("a@b.com", "secret1"), &ClientInfo::default())
            .await
            .unwrap();

        let user = service.get_user(session.user.id).await.unwrap();
        assert_eq!(user, session.user);

        let missing = service.get_user(999).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
