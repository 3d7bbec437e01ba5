//! Application state management

use notekeep_core::config::AppConfig;
use notekeep_core::{CredentialStore, NoteRepository};
use std::sync::Arc;
use std::time::Instant;

use crate::auth::{AuthService, PasswordConfig, RefreshCookie};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    /// Registration, login and token handling
    pub auth: AuthService,
    /// Note persistence
    pub notes: Arc<dyn NoteRepository>,
}

impl AppState {
    /// Create new application state with config and stores
    pub fn new(
        config: AppConfig,
        credentials: Arc<dyn CredentialStore>,
        notes: Arc<dyn NoteRepository>,
    ) -> Self {
        let auth = AuthService::new(credentials, &config.auth);
        Self {
            config,
            start_time: Instant::now(),
            auth,
            notes,
        }
    }

    /// Override the Argon2 parameters
    pub fn with_password_config(mut self, password_config: PasswordConfig) -> Self {
        self.auth = self.auth.with_password_config(password_config);
        self
    }

    /// Refresh cookie attributes derived from the configuration
    pub fn refresh_cookie(&self) -> RefreshCookie {
        RefreshCookie {
            name: self.config.auth.refresh_cookie_name.clone(),
            secure: self.config.environment.is_production(),
            max_age_secs: i64::try_from(self.config.auth.refresh_token_ttl_secs)
                .unwrap_or(i64::MAX),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
