use std::fmt;

use reqwest::{header, RequestBuilder};

/// Credentials attached to every gateway request.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum GatewayAuth {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    /// Full `Authorization` header value, `Bearer ` prefix included.
    Bearer(String),
}

impl GatewayAuth {
    /// Builds bearer auth from a token.
    ///
    /// If the token is missing the `Bearer ` prefix, it is added automatically.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::Bearer(normalize_bearer_authorization(token.as_ref()))
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, GatewayAuth::None)
    }

    pub(crate) fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            GatewayAuth::None => request,
            GatewayAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            GatewayAuth::Bearer(value) => request.header(header::AUTHORIZATION, value),
        }
    }
}

impl fmt::Debug for GatewayAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayAuth::None => f.write_str("None"),
            GatewayAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            GatewayAuth::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_bearer_authorization, GatewayAuth};

    #[test]
    fn normalize_bearer_adds_prefix_when_missing() {
        assert_eq!(
            normalize_bearer_authorization("abc123"),
            "Bearer abc123".to_owned()
        );
    }

    #[test]
    fn normalize_bearer_keeps_existing_prefix() {
        assert_eq!(
            normalize_bearer_authorization("bEaReR abc123"),
            "bEaReR abc123".to_owned()
        );
    }

    #[test]
    fn debug_redacts_secrets() {
        let bearer = format!("{:?}", GatewayAuth::bearer("secret-token"));
        assert!(bearer.contains("<redacted>"));
        assert!(!bearer.contains("secret-token"));

        let basic = format!("{:?}", GatewayAuth::basic("admin", "hunter2"));
        assert!(basic.contains("admin"));
        assert!(!basic.contains("hunter2"));
    }

    #[test]
    fn none_is_not_enabled() {
        assert!(!GatewayAuth::None.is_enabled());
        assert!(GatewayAuth::bearer("x").is_enabled());
    }
}
