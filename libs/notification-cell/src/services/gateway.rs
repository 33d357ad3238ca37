use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::SendOutcome;
use crate::services::directory::OrgVariableStore;

/// Well-known keys in the org-scoped variable store.
pub const GATEWAY_URL_VAR: &str = "messaging_gateway_url";
pub const GATEWAY_API_KEY_VAR: &str = "messaging_gateway_api_key";

const CHAT_ID_SUFFIX: &str = "@c.us";

#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Deliver one text to one recipient. Expected failures (missing config,
    /// transport errors, non-2xx responses) come back as a failed outcome;
    /// this call never returns an error.
    async fn send_message(&self, org_id: Uuid, phone_number: &str, text: &str) -> SendOutcome;
}

/// Normalize a phone number to the gateway chat-id format: digits only plus
/// the fixed suffix.
pub fn to_chat_id(phone_number: &str) -> String {
    let digits: String = phone_number.chars().filter(char::is_ascii_digit).collect();
    format!("{}{}", digits, CHAT_ID_SUFFIX)
}

/// HTTP client for the per-organization messaging gateway. Base URL and API
/// key are resolved from the org-scoped variable store on every send, so an
/// organization can be (re)configured without a restart.
pub struct HttpGatewayClient {
    client: Client,
    variables: Arc<dyn OrgVariableStore>,
}

impl HttpGatewayClient {
    pub fn new(config: &AppConfig, variables: Arc<dyn OrgVariableStore>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, variables }
    }

    async fn resolve_variable(&self, org_id: Uuid, key: &str) -> Result<Option<String>, String> {
        match self.variables.get(org_id, key).await {
            Ok(Some(value)) if !value.is_empty() => Ok(Some(value)),
            Ok(_) => Ok(None),
            Err(e) => Err(format!("variable store error: {}", e)),
        }
    }
}

#[async_trait]
impl MessageGateway for HttpGatewayClient {
    async fn send_message(&self, org_id: Uuid, phone_number: &str, text: &str) -> SendOutcome {
        let base_url = match self.resolve_variable(org_id, GATEWAY_URL_VAR).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                warn!("Messaging gateway URL not configured for org {}", org_id);
                return SendOutcome::failure("gateway not configured");
            }
            Err(e) => return SendOutcome::failure(e),
        };
        let api_key = match self.resolve_variable(org_id, GATEWAY_API_KEY_VAR).await {
            Ok(Some(key)) => key,
            Ok(None) => {
                warn!("Messaging gateway API key not configured for org {}", org_id);
                return SendOutcome::failure("gateway not configured");
            }
            Err(e) => return SendOutcome::failure(e),
        };

        let chat_id = to_chat_id(phone_number);
        let url = format!("{}/api/sendText", base_url.trim_end_matches('/'));

        debug!("Sending gateway message for org {} to {}", org_id, chat_id);

        let result = self
            .client
            .post(&url)
            .header("X-Api-Key", &api_key)
            .json(&json!({
                "chatId": chat_id,
                "text": text,
            }))
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    info!("Gateway accepted message for org {}", org_id);
                    SendOutcome::ok()
                } else {
                    let body = response.text().await.unwrap_or_default();
                    warn!("Gateway rejected message for org {}: {} - {}", org_id, status, body);
                    SendOutcome::failure(format!("HTTP {}: {}", status, body))
                }
            }
            Err(e) => {
                warn!("Gateway request failed for org {}: {}", org_id, e);
                SendOutcome::failure(format!("request failed: {}", e))
            }
        }
    }
}
