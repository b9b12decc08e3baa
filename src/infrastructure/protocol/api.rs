//! Gateway REST Calls
//!
//! Thin wrappers over the Evolution-API-compatible endpoints the bridge uses,
//! plus the response parsing that tolerates the v1 and v2 payload shapes.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::ProtocolSettings;
use crate::domain::{Identity, PairingArtifact, ProtocolError};

/// Longest response body echoed into an error.
const MAX_ERROR_BODY: usize = 500;

/// Static gateway coordinates.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub instance_name: String,
    pub poll_interval: Duration,
}

impl From<&ProtocolSettings> for GatewayConfig {
    fn from(settings: &ProtocolSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            instance_name: settings.instance_name.clone(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
        }
    }
}

/// Stored under the `instance` credential key; lets a restart reattach to the
/// already-linked instance instead of pairing again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceCredential {
    pub instance_name: String,
    pub token: String,
}

/// Cloneable client bound to one instance.
#[derive(Debug, Clone)]
pub struct GatewayApi {
    client: reqwest::Client,
    config: Arc<GatewayConfig>,
}

impl GatewayApi {
    pub fn new(client: reqwest::Client, config: GatewayConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ProtocolError> {
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .header("apikey", &self.config.api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        debug!(%method, path, status = status.as_u16(), "Gateway response");

        if !status.is_success() {
            return Err(ProtocolError::Rejected {
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY).to_string(),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| ProtocolError::InvalidResponse(e.to_string()))
    }

    /// Create the instance and return the raw response (which carries the first QR).
    ///
    /// A name or token collision means a stale instance is still registered:
    /// it is deleted and the create is retried once.
    pub async fn create_instance(&self, token: &str) -> Result<Value, ProtocolError> {
        let body = json!({
            "instanceName": self.config.instance_name,
            "token": token,
            "qrcode": true,
        });

        info!(instance = %self.config.instance_name, "Creating gateway instance");
        match self.request(Method::POST, "/instance/create", Some(body.clone())).await {
            Err(ProtocolError::Rejected { body: text, .. }) if is_conflict(&text) => {
                info!("Instance already exists on the gateway, deleting and recreating");
                if let Err(e) = self.delete_instance().await {
                    warn!(error = %e, "Deleting stale instance failed");
                }
                self.request(Method::POST, "/instance/create", Some(body)).await
            }
            other => other,
        }
    }

    /// Reattach to an existing instance; the response carries a QR when the
    /// instance is not linked yet.
    pub async fn connect_instance(&self) -> Result<Value, ProtocolError> {
        let path = format!("/instance/connect/{}", self.config.instance_name);
        self.request(Method::GET, &path, None).await
    }

    /// Current state string ("open", "connecting", "close").
    pub async fn connection_state(&self) -> Result<String, ProtocolError> {
        let path = format!("/instance/connectionState/{}", self.config.instance_name);
        let body = self.request(Method::GET, &path, None).await?;
        Ok(extract_state(&body).unwrap_or_default().to_string())
    }

    /// Which account the instance is logged in as, if the gateway says.
    pub async fn fetch_identity(&self) -> Result<Option<Identity>, ProtocolError> {
        let path = format!(
            "/instance/fetchInstances?instanceName={}",
            self.config.instance_name
        );
        let body = self.request(Method::GET, &path, None).await?;
        Ok(extract_identity(&body))
    }

    /// `Some(jid)` if the number is registered on the network.
    pub async fn lookup_number(&self, number: &str) -> Result<Option<String>, ProtocolError> {
        let path = format!("/chat/whatsappNumbers/{}", self.config.instance_name);
        let body = self
            .request(Method::POST, &path, Some(json!({ "numbers": [number] })))
            .await?;
        Ok(extract_registered_jid(&body))
    }

    /// Send a text message and return its message id.
    pub async fn send_text(&self, number: &str, text: &str) -> Result<String, ProtocolError> {
        let path = format!("/message/sendText/{}", self.config.instance_name);
        // v2 reads `text`, v1 reads `textMessage.text`
        let body = json!({
            "number": number,
            "text": text,
            "textMessage": { "text": text },
        });
        let response = self.request(Method::POST, &path, Some(body)).await?;
        response["key"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProtocolError::InvalidResponse("send response has no key.id".into()))
    }

    pub async fn logout(&self) -> Result<(), ProtocolError> {
        let path = format!("/instance/logout/{}", self.config.instance_name);
        self.request(Method::DELETE, &path, None).await.map(|_| ())
    }

    pub async fn delete_instance(&self) -> Result<(), ProtocolError> {
        let path = format!("/instance/delete/{}", self.config.instance_name);
        match self.request(Method::DELETE, &path, None).await {
            Err(ProtocolError::Rejected { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(()),
            other => other.map(|_| ()),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn is_conflict(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("already in use")
        || ((lower.contains("instance") || lower.contains("token"))
            && (lower.contains("already") || lower.contains("exists")))
}

/// Pull a pairing artifact out of a create/connect response.
///
/// Shapes seen in the wild:
/// - create: `{ "qrcode": { "code": "...", "base64": "data:image/..." } }`
/// - connect: `{ "code": "...", "base64": "data:image/..." }`
/// - older: `{ "qrcode": "data:image/..." }`
pub fn extract_pairing(resp: &Value) -> Option<PairingArtifact> {
    let nested = &resp["qrcode"];
    let code = nested["code"]
        .as_str()
        .or_else(|| resp["code"].as_str())
        .or_else(|| resp["pairingCode"].as_str())
        .filter(|s| !s.is_empty());
    let image = nested["base64"]
        .as_str()
        .or_else(|| resp["base64"].as_str())
        .or_else(|| nested.as_str().filter(|s| s.starts_with("data:")))
        .filter(|s| !s.is_empty());

    match (code, image) {
        (Some(code), image) => Some(PairingArtifact::new(code, image.map(str::to_string))),
        (None, Some(image)) => Some(PairingArtifact::new(image, Some(image.to_string()))),
        (None, None) => None,
    }
}

pub fn extract_state(body: &Value) -> Option<&str> {
    body["instance"]["state"]
        .as_str()
        .or_else(|| body["state"].as_str())
}

/// `fetchInstances` returns a list; v1 nests under `instance.owner`, v2 uses `ownerJid`.
pub fn extract_identity(body: &Value) -> Option<Identity> {
    let entry = match body {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let instance = if entry["instance"].is_object() {
        &entry["instance"]
    } else {
        entry
    };

    let jid = instance["owner"]
        .as_str()
        .or_else(|| instance["ownerJid"].as_str())
        .filter(|s| !s.is_empty())?;
    let name = instance["profileName"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(Identity {
        jid: jid.to_string(),
        name,
    })
}

pub fn extract_registered_jid(body: &Value) -> Option<String> {
    body.as_array()?
        .iter()
        .find(|entry| entry["exists"].as_bool().unwrap_or(false))
        .and_then(|entry| entry["jid"].as_str())
        .map(str::to_string)
}
