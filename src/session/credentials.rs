use std::fmt;

use crate::{errors::WsJsonError, services::ServiceId};

/// Login material for one handshake. Only lives in memory for the session.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken {
        token: String,
        refresh_token: Option<String>,
    },
    AuthCode {
        code: String,
    },
}

impl Credentials {
    pub fn access_token(token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self::AccessToken {
            token: token.into(),
            refresh_token,
        }
    }

    pub fn auth_code(code: impl Into<String>) -> Self {
        Self::AuthCode { code: code.into() }
    }

    pub fn login_service(&self) -> ServiceId {
        match self {
            Self::AccessToken { .. } => ServiceId::Login,
            Self::AuthCode { .. } => ServiceId::LoginSchwab,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), WsJsonError> {
        match self {
            Self::AccessToken { token, .. } if token.trim().is_empty() => Err(
                WsJsonError::MissingCredentials("access token cannot be empty"),
            ),
            Self::AuthCode { code } if code.trim().is_empty() => Err(
                WsJsonError::MissingCredentials("auth code cannot be empty"),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessToken { refresh_token, .. } => f
                .debug_struct("AccessToken")
                .field("token", &"<redacted>")
                .field(
                    "refresh_token",
                    &refresh_token.as_ref().map(|_| "<redacted>"),
                )
                .finish(),
            Self::AuthCode { .. } => f
                .debug_struct("AuthCode")
                .field("code", &"<redacted>")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_never_contains_secrets() {
        let token = Credentials::access_token("secret-token", Some("secret-refresh".to_string()));
        let code = Credentials::auth_code("secret-code");

        let rendered = format!("{token:?} {code:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn empty_credentials_are_rejected_and_variants_pick_login_service() {
        assert!(matches!(
            Credentials::access_token("  ", None).validate(),
            Err(WsJsonError::MissingCredentials(_))
        ));
        assert!(matches!(
            Credentials::auth_code("").validate(),
            Err(WsJsonError::MissingCredentials(_))
        ));

        assert_eq!(
            Credentials::access_token("t", None).login_service(),
            ServiceId::Login
        );
        assert_eq!(
            Credentials::auth_code("c").login_service(),
            ServiceId::LoginSchwab
        );
    }
}
