use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::patch::PatchPolicy;

pub const DEFAULT_WS_URL: &str = "wss://services.thinkorswim.com/Services/WsJson";
pub const DEFAULT_CLIENT_TAG: &str = "TOSWeb";
pub const DEFAULT_REDIRECT_URI: &str = "https://trade.thinkorswim.com/oauth";
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub url: String,
    pub handshake_timeout: Option<Duration>,
    pub call_timeout: Option<Duration>,
    pub patch_policy: PatchPolicy,
    pub client_tag: String,
    pub redirect_uri: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            handshake_timeout: Some(Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS)),
            call_timeout: None,
            patch_policy: PatchPolicy::Lenient,
            client_tag: DEFAULT_CLIENT_TAG.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let url = std::env::var("WSJSON_URL")
            .map(|value| value.trim().to_string())
            .unwrap_or(defaults.url);
        if url.is_empty() {
            return Err(anyhow!("WSJSON_URL cannot be empty"));
        }

        let handshake_timeout = match std::env::var("WSJSON_HANDSHAKE_TIMEOUT_MS") {
            Ok(value) => parse_optional_millis(&value)
                .with_context(|| format!("invalid WSJSON_HANDSHAKE_TIMEOUT_MS value: {value}"))?,
            Err(_) => defaults.handshake_timeout,
        };

        let call_timeout = match std::env::var("WSJSON_CALL_TIMEOUT_MS") {
            Ok(value) => parse_optional_millis(&value)
                .with_context(|| format!("invalid WSJSON_CALL_TIMEOUT_MS value: {value}"))?,
            Err(_) => defaults.call_timeout,
        };

        let patch_policy = match std::env::var("WSJSON_STRICT_PATCHES") {
            Ok(value) => {
                if parse_bool(&value)
                    .ok_or_else(|| anyhow!("invalid WSJSON_STRICT_PATCHES value: {value}"))?
                {
                    PatchPolicy::Strict
                } else {
                    PatchPolicy::Lenient
                }
            }
            Err(_) => defaults.patch_policy,
        };

        let client_tag = std::env::var("WSJSON_CLIENT_TAG")
            .map(|value| value.trim().to_string())
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.client_tag);

        let redirect_uri = std::env::var("WSJSON_REDIRECT_URI")
            .map(|value| value.trim().to_string())
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.redirect_uri);

        Ok(Self {
            url,
            handshake_timeout,
            call_timeout,
            patch_policy,
            client_tag,
            redirect_uri,
        })
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_patch_policy(mut self, policy: PatchPolicy) -> Self {
        self.patch_policy = policy;
        self
    }
}

// `0` disables the timeout.
fn parse_optional_millis(value: &str) -> Result<Option<Duration>> {
    let millis = value.trim().parse::<u64>()?;
    Ok((millis > 0).then(|| Duration::from_millis(millis)))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
