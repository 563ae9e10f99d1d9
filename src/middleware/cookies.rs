use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Lifetime of the one-shot error cookie.
const ERROR_TTL_MINUTES: i64 = 5;

/// Create session cookie.
pub(super) fn session_cookie(
    name: &str,
    value: &str,
    ttl_minutes: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), value.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::minutes(ttl_minutes))
        .build()
}

/// Create the cookie carrying an error message across one redirect.
pub(super) fn error_cookie(name: &str, message: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), message.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::minutes(ERROR_TTL_MINUTES))
        .build()
}

/// Create removal cookie.
pub(super) fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("__linkgate_session", "v", 60, true);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(60)));
    }

    #[test]
    fn error_cookie_is_short_lived() {
        let cookie = error_cookie("__linkgate_error", "oops", false);
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.max_age(), Some(Duration::minutes(ERROR_TTL_MINUTES)));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let cookie = removal_cookie("__linkgate_session");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
