use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::models::company::Company;

/// Instance name and API key used to address the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    pub instance: String,
    pub api_key: String,
}

impl GatewayCredentials {
    /// Tenant settings win; blanks fall back to the process-wide defaults.
    pub fn resolve(company: Option<&Company>, defaults: &GatewayCredentials) -> Self {
        let pick = |value: Option<&String>, fallback: &String| {
            value
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| fallback.clone())
        };
        Self {
            instance: pick(
                company.and_then(|c| c.whatsapp_instance.as_ref()),
                &defaults.instance,
            ),
            api_key: pick(
                company.and_then(|c| c.whatsapp_api_key.as_ref()),
                &defaults.api_key,
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentMessage {
    pub external_id: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send_text(
        &self,
        credentials: &GatewayCredentials,
        number: &str,
        text: &str,
    ) -> Result<SentMessage>;
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    number: &'a str,
    text: &'a str,
    /// Milliseconds the gateway shows the presence before sending.
    delay: u32,
    presence: &'a str,
    #[serde(rename = "linkPreview")]
    link_preview: bool,
}

#[derive(Debug, Deserialize)]
struct SendTextResponse {
    key: Option<SentKey>,
}

#[derive(Debug, Deserialize)]
struct SentKey {
    id: Option<String>,
}

/// Evolution-API style gateway: `POST {base}/message/sendText/{instance}`.
#[derive(Clone)]
pub struct EvolutionGateway {
    client: Client,
    base_url: Url,
}

impl EvolutionGateway {
    pub fn new(base_url: &str, client: Client) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("Invalid EVOLUTION_API_URL: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    fn send_text_url(&self, instance: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config("EVOLUTION_API_URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["message", "sendText", instance]);
        Ok(url)
    }
}

#[async_trait]
impl MessageGateway for EvolutionGateway {
    async fn send_text(
        &self,
        credentials: &GatewayCredentials,
        number: &str,
        text: &str,
    ) -> Result<SentMessage> {
        let url = self.send_text_url(&credentials.instance)?;
        let body = SendTextRequest {
            number,
            text,
            delay: 1200,
            presence: "composing",
            link_preview: false,
        };

        let resp = self
            .client
            .post(url)
            .header("apikey", &credentials.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let message = provider_error_message(&raw).unwrap_or(raw);
            warn!(instance = %credentials.instance, %status, "Gateway rejected sendText");
            return Err(Error::Gateway(format!("{}: {}", status, message)));
        }

        let parsed = resp.json::<SendTextResponse>().await.ok();
        let external_id = parsed.and_then(|r| r.key).and_then(|k| k.id);
        debug!(instance = %credentials.instance, ?external_id, "Gateway accepted sendText");
        Ok(SentMessage { external_id })
    }
}

/// Pulls the human-readable part out of the gateway's error body,
/// e.g. `{"response":{"message":["number not on WhatsApp"]}}`.
fn provider_error_message(raw: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_str(raw).ok()?;
    let message = value
        .pointer("/response/message")
        .or_else(|| value.get("message"))
        .or_else(|| value.get("error"))?;
    match message {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Array(items) => Some(
            items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => Some(other.to_string()),
    }
}
