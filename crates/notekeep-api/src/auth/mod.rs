//! Authentication
//!
//! - Password hashing with Argon2id
//! - Stateless JWT access tokens
//! - Rotating refresh tokens stored as SHA-256 digests
//! - Refresh token cookie
//! - Middleware for request authentication
//! - Authentication service composing the above

pub mod cookie;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod refresh;
pub mod service;

pub use cookie::RefreshCookie;
pub use jwt::{generate_access_token, validate_access_token, Claims, JwtConfig, JwtError};
pub use middleware::{auth_middleware, extract_bearer_token, AuthError, AuthenticatedUser};
pub use models::{
    AuthResponse, LoginRequest, MessageResponse, RefreshRequest, RefreshResponse,
    RegisterRequest, UserResponse,
};
pub use password::{hash_password, verify_password, PasswordConfig, PasswordError};
pub use refresh::{RefreshError, RefreshTokenManager};
pub use service::AuthService;
