//! Refresh token cookie
//!
//! `HttpOnly`, `Path=/`, `Secure` only in production, `Max-Age` equal to the
//! refresh token lifetime.

use axum_extra::extract::cookie::{Cookie, CookieJar};

/// Cookie attributes shared by set and clear
#[derive(Debug, Clone)]
pub struct RefreshCookie {
    pub name: String,
    pub secure: bool,
    pub max_age_secs: i64,
}

impl RefreshCookie {
    fn base(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .path("/")
            .build()
    }

    /// Cookie carrying a freshly issued refresh token
    pub fn build(&self, token: &str) -> Cookie<'static> {
        let mut cookie = self.base(token.to_string());
        cookie.set_max_age(time::Duration::seconds(self.max_age_secs));
        cookie
    }

    /// Expired cookie that makes the client drop the token
    pub fn removal(&self) -> Cookie<'static> {
        let mut cookie = self.base(String::new());
        cookie.make_removal();
        cookie
    }

    /// Raw token from the request cookies, if any
    pub fn read(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }
}
