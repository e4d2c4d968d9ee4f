use serde_json::{json, Value};

use super::credentials::Credentials;
use crate::{config::SessionConfig, envelope::RequestEnvelope};

const LOGIN_DOMAIN: &str = "TOS";
const LOGIN_PLATFORM: &str = "PROD";
const AUTHENTICATION_OK: &str = "OK";

pub(crate) fn login_request(credentials: &Credentials, config: &SessionConfig) -> RequestEnvelope {
    let service = credentials.login_service().as_str();

    let params = match credentials {
        Credentials::AccessToken {
            token,
            refresh_token,
        } => {
            let mut params = json!({
                "domain": LOGIN_DOMAIN,
                "platform": LOGIN_PLATFORM,
                "accessToken": token,
                "tag": config.client_tag,
            });
            if let Some(refresh_token) = refresh_token {
                params["refreshToken"] = json!(refresh_token);
            }
            params
        }
        Credentials::AuthCode { code } => json!({
            "authCode": code,
            "clientId": config.client_tag,
            "redirectUri": config.redirect_uri,
            "tag": config.client_tag,
        }),
    };

    RequestEnvelope::new(service, service, params)
}

pub(crate) fn login_outcome(body: &Value) -> Result<(), String> {
    let status = body
        .get("authenticationStatus")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if status == AUTHENTICATION_OK {
        return Ok(());
    }

    let detail = body
        .get("message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str);

    Err(match (status.is_empty(), detail) {
        (true, Some(detail)) => detail.to_string(),
        (true, None) => "login response carried no authenticationStatus".to_string(),
        (false, Some(detail)) => format!("authenticationStatus={status}: {detail}"),
        (false, None) => format!("authenticationStatus={status}"),
    })
}
