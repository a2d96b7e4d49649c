use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::SessionConfig;
use crate::session::SessionId;

/// Build the session cookie from the configured scope and flags.
pub fn session_cookie(config: &SessionConfig, id: &SessionId) -> Cookie<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), id.as_str().to_string()))
        .path("/")
        .http_only(config.http_only)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(config.max_age.as_secs() as i64));

    if let Some(domain) = &config.cookie_domain {
        builder = builder.domain(domain.clone());
    }

    builder.build()
}

/// Removal cookie; path and domain must match the original for browsers to drop it.
pub fn clear_session_cookie(config: &SessionConfig) -> Cookie<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), ""))
        .path("/")
        .max_age(time::Duration::ZERO);

    if let Some(domain) = &config.cookie_domain {
        builder = builder.domain(domain.clone());
    }

    builder.build()
}

/// Session id carried by the request, if present and well formed.
pub fn session_id(jar: &CookieJar, config: &SessionConfig) -> Option<SessionId> {
    jar.get(&config.cookie_name)
        .and_then(|cookie| SessionId::parse(cookie.value()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn session_cookie_carries_configured_flags() {
        let config = SessionConfig {
            cookie_domain: Some("cdk.example.com".into()),
            secure: true,
            max_age: Duration::from_secs(3600),
            ..SessionConfig::default()
        };
        let id = SessionId::generate();
        let cookie = session_cookie(&config, &id);

        assert_eq!(cookie.name(), "cdk_session");
        assert_eq!(cookie.value(), id.as_str());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.domain(), Some("cdk.example.com"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
    }

    #[test]
    fn malformed_cookie_values_are_ignored() {
        let config = SessionConfig::default();
        let jar = CookieJar::new().add(Cookie::new("cdk_session", "../../etc/passwd"));
        assert!(session_id(&jar, &config).is_none());
    }
}
