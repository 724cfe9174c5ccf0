//! Cookie transport for the session token.
//!
//! There is no server-side session record. Clearing a session only tells
//! the client to drop its cookie; the token itself stays valid until it
//! expires.

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

/// Maps a token to and from the session cookie.
#[derive(Debug, Clone)]
pub struct SessionTransport {
    cookie_name: String,
    secure: bool,
    max_age: Duration,
}

impl SessionTransport {
    /// Create a transport.
    ///
    /// `secure` restricts the cookie to HTTPS; `max_age` should match the
    /// token lifetime.
    #[must_use]
    pub fn new(cookie_name: impl Into<String>, secure: bool, max_age: Duration) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            secure,
            max_age,
        }
    }

    /// Name of the session cookie.
    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Set the session cookie to `token`.
    #[must_use]
    pub fn attach(&self, jar: CookieJar, token: &str) -> CookieJar {
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        let mut cookie = self.base(token.to_string());
        cookie.set_max_age(time::Duration::seconds(max_age));
        jar.add(cookie)
    }

    /// Overwrite the session cookie with an empty, already-expired value.
    ///
    /// Always emits a `Set-Cookie`, whether or not the request carried one.
    #[must_use]
    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        let mut cookie = self.base(String::new());
        cookie.make_removal();
        jar.add(cookie)
    }

    /// Read the token from the request cookies, if any.
    #[must_use]
    pub fn read(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    fn base(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .build()
    }
}
