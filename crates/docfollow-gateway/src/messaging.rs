use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, Result};

const TWILIO_API_BASE: &str = "https://api.twilio.com";
const SANDBOX_NUMBER: &str = "whatsapp:+14155238886";
const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Outbound messaging channel
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send `body` to `to` (E.164 number, with or without channel prefix)
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage>;

    /// False when credentials are missing; sends then fail with `NotConfigured`
    fn is_configured(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    pub sid: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    #[serde(default = "default_from_number")]
    pub from_number: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_from_number() -> String {
    SANDBOX_NUMBER.to_string()
}

fn default_api_base() -> String {
    TWILIO_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: default_from_number(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TwilioConfig {
    /// Credentials pair, if both are present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.account_sid.as_deref(), self.auth_token.as_deref()) {
            (Some(sid), Some(token)) if !sid.is_empty() && !token.is_empty() => Some((sid, token)),
            _ => None,
        }
    }
}

/// Prefix a number with the WhatsApp channel marker unless already present
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{}{}", WHATSAPP_PREFIX, number)
    }
}

#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorResponse {
    message: String,
}

/// WhatsApp over the Twilio Messages REST API
pub struct TwilioGateway {
    http_client: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioGateway {
    pub fn new(config: TwilioConfig) -> Result<Self> {
        if config.credentials().is_none() {
            warn!("Twilio credentials not configured; WhatsApp sends will be rejected");
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn messages_url(&self, account_sid: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            account_sid
        )
    }
}

#[async_trait]
impl MessagingGateway for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<SentMessage> {
        let (account_sid, auth_token) = self
            .config
            .credentials()
            .ok_or(GatewayError::NotConfigured)?;

        let to = whatsapp_address(to);
        let from = whatsapp_address(&self.config.from_number);
        debug!(to = %to, chars = body.len(), "Sending WhatsApp message");

        let response = self
            .http_client
            .post(self.messages_url(account_sid))
            .basic_auth(account_sid, Some(auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwilioErrorResponse>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            warn!(status = status.as_u16(), error = %message, "Twilio rejected message");
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sent: TwilioMessageResponse = response.json().await?;
        info!(sid = %sent.sid, "WhatsApp message sent");

        Ok(SentMessage {
            sid: sent.sid,
            status: sent.status,
        })
    }

    fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }
}
