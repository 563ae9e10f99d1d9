use axum_extra::extract::PrivateCookieJar;

use super::config::WebSettings;
use super::cookies;
use crate::session::SessionStore;
use crate::types::SessionToken;

/// [`SessionStore`] backed by the client's private (encrypted and
/// authenticated) cookie jar.
///
/// Changes are collected in the jar and reach the client when the jar is
/// returned as part of the response.
pub(super) struct CookieSession {
    jar: PrivateCookieJar,
    session_cookie_name: String,
    error_cookie_name: String,
    ttl_minutes: i64,
    secure: bool,
}

impl CookieSession {
    pub(super) fn new(jar: PrivateCookieJar, settings: &WebSettings) -> Self {
        Self {
            jar,
            session_cookie_name: settings.session_cookie_name.clone(),
            error_cookie_name: settings.error_cookie_name.clone(),
            ttl_minutes: settings.session_ttl_minutes,
            secure: settings.secure_cookies,
        }
    }

    pub(super) fn into_jar(self) -> PrivateCookieJar {
        self.jar
    }

    fn remove(&mut self, name: &str) {
        self.jar = self.jar.clone().remove(cookies::removal_cookie(name));
    }
}

impl SessionStore for CookieSession {
    fn get(&self) -> Option<SessionToken> {
        self.jar
            .get(&self.session_cookie_name)
            .map(|c| SessionToken::new(c.value()))
    }

    fn set(&mut self, token: SessionToken) {
        let cookie = cookies::session_cookie(
            &self.session_cookie_name,
            token.expose(),
            self.ttl_minutes,
            self.secure,
        );
        self.jar = self.jar.clone().add(cookie);
    }

    fn clear(&mut self) {
        let name = self.session_cookie_name.clone();
        self.remove(&name);
    }

    fn push_error(&mut self, message: String) {
        let cookie = cookies::error_cookie(&self.error_cookie_name, &message, self.secure);
        self.jar = self.jar.clone().add(cookie);
    }

    fn pop_error(&mut self) -> Option<String> {
        let message = self
            .jar
            .get(&self.error_cookie_name)
            .map(|c| c.value().to_string())?;
        let name = self.error_cookie_name.clone();
        self.remove(&name);
        Some(message)
    }
}
