use std::time::Duration;

use bridge_core::{BridgeError, MessageKind};
use serde_json::Value;

use crate::credentials::ProviderCredentials;
use crate::dialects::{uazapi, wuzapi, zapi};

const TEXT_TIMEOUT: Duration = Duration::from_secs(20);
const MEDIA_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const MEDIA_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const ATTACHMENT_GAP: Duration = Duration::from_secs(2);

/// One attachment to send alongside (or instead of) a text body.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: MessageKind,
    pub url: Option<String>,
    pub base64: Option<String>,
    pub filename: Option<String>,
}

/// Everything `ProviderClient::send` needs, matching 
/// `(recipient, content, kind, attachments[], lid?, jid?, replyTo?)` shape.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub recipient: String,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub lid: Option<String>,
    pub jid: Option<String>,
    pub reply_to: Option<String>,
    pub is_group: bool,
}

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub provider_message_id: String,
    pub raw: Value,
}

/// Per-tenant stateful provider client. One instance per tenant, built from
/// the credentials the tenant registry resolved.
pub struct ProviderClient {
    pub(crate) credentials: ProviderCredentials,
    pub(crate) http: reqwest::Client,
}

impl ProviderClient {
    pub fn new(credentials: ProviderCredentials) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .user_agent("wootrico-bridge-provider/0.1")
            .build()
            .map_err(|err| {
                BridgeError::permanent("provider_client_init", "failed to build HTTP client")
                    .with_source(err)
            })?;
        Ok(Self { credentials, http })
    }

    /// Sends a text-only message, or one request per attachment (only the
    /// first carries the text), with a 2 s gap between attachment sends
    ///.
    pub async fn send(&self, request: &SendRequest) -> Result<Vec<SendOutcome>, BridgeError> {
        tracing::debug!(
            dialect = self.credentials.dialect().as_str(),
            recipient = %request.recipient,
            attachments = request.attachments.len(),
            "provider send"
        );

        if request.attachments.is_empty() {
            let outcome = self.send_one(request, None, request.text.as_deref()).await?;
            return Ok(vec![outcome]);
        }

        let mut outcomes = Vec::with_capacity(request.attachments.len());
        for (index, attachment) in request.attachments.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(ATTACHMENT_GAP).await;
            }
            let text = if index == 0 { request.text.as_deref() } else { None };
            let outcome = self.send_one(request, Some(attachment), text).await.inspect_err(|err| {
                tracing::warn!(dialect = self.credentials.dialect().as_str(), attachment = index, error = %err, "attachment send failed");
            })?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn send_one(
        &self,
        request: &SendRequest,
        attachment: Option<&Attachment>,
        text: Option<&str>,
    ) -> Result<SendOutcome, BridgeError> {
        let timeout = if attachment.is_some() {
            MEDIA_UPLOAD_TIMEOUT
        } else {
            TEXT_TIMEOUT
        };

        match &self.credentials {
            ProviderCredentials::ZApi { instance, token, client_token } => {
                zapi::send(&self.http, instance, token, client_token, request, attachment, text, timeout)
                    .await
            }
            ProviderCredentials::Uazapi { base_url, token, .. } => {
                uazapi::send(&self.http, base_url, token, request, attachment, text, timeout).await
            }
            ProviderCredentials::Wuzapi { base_url, token } => {
                wuzapi::send(&self.http, base_url, token, request, attachment, text, timeout).await
            }
        }
    }

    /// Deletes a previously sent message. A missing recipient is fatal for
    /// Z-API only.
    pub async fn delete(&self, message_id: &str, recipient: Option<&str>) -> Result<(), BridgeError> {
        match &self.credentials {
            ProviderCredentials::ZApi { instance, token, client_token } => {
                let recipient = recipient.ok_or_else(|| {
                    BridgeError::permanent("zapi_delete_missing_recipient", "Z-API delete requires a recipient")
                })?;
                zapi::delete(&self.http, instance, token, client_token, message_id, recipient).await
            }
            ProviderCredentials::Uazapi { base_url, token, .. } => {
                uazapi::delete(&self.http, base_url, token, message_id).await
            }
            ProviderCredentials::Wuzapi { base_url, token } => {
                wuzapi::delete(&self.http, base_url, token, message_id).await
            }
        }
    }

    /// Fetches a message's media as base64. UAZAPI only; other
    /// dialects deliver media inline and have no separate download step.
    pub async fn download(&self, message_id: &str) -> Result<String, BridgeError> {
        match &self.credentials {
            ProviderCredentials::Uazapi { base_url, token, .. } => {
                uazapi::download(&self.http, base_url, token, message_id, MEDIA_DOWNLOAD_TIMEOUT).await
            }
            _ => Err(BridgeError::permanent(
                "download_not_supported",
                "this dialect does not support a separate media download step",
            )),
        }
    }
}

/// Shared status-code branching used by all three dialects' HTTP calls:
/// 429/5xx are retryable, 4xx is permanent, 2xx is parsed as JSON.
pub(crate) fn classify_response(status: reqwest::StatusCode, retry_after_ms: Option<u64>, body: &str) -> Result<Value, BridgeError> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(BridgeError::retryable(
            "provider_throttled",
            format!("status={} body={body}", status.as_u16()),
            retry_after_ms.unwrap_or(1_000),
        ));
    }
    if status.is_server_error() {
        return Err(BridgeError::retryable(
            "provider_remote_5xx",
            format!("status={} body={body}", status.as_u16()),
            retry_after_ms.unwrap_or(1_000),
        ));
    }
    if status.is_client_error() {
        return Err(BridgeError::permanent(
            "provider_remote_4xx",
            format!("status={} body={body}", status.as_u16()),
        ));
    }
    Ok(serde_json::from_str(body).unwrap_or(Value::Null))
}

pub(crate) fn retry_after_ms(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(|seconds| seconds * 1_000)
}

/// `*-group`/`@g.us` verbatim, else digits only, the Z-API `phone` rule
/// shared by send and delete.
pub(crate) fn zapi_phone(recipient: &str) -> String {
    if recipient.ends_with("@g.us") || recipient.ends_with("-group") {
        recipient.to_string()
    } else {
        recipient.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

/// Test hook: a `mock://<scenario>` identifier (instance for Z-API, base
/// URL for the other two) short-circuits the HTTP call entirely.
pub(crate) fn mock_scenario(identifier: &str) -> Option<&str> {
    identifier.strip_prefix("mock://")
}

pub(crate) fn mock_send_outcome(scenario: &str) -> Result<SendOutcome, BridgeError> {
    match scenario {
        "success" => Ok(SendOutcome {
            provider_message_id: "mock-msg".into(),
            raw: Value::Null,
        }),
        "throttle" => Err(BridgeError::retryable("provider_throttled", "mock throttled", 1_000)),
        other => Err(BridgeError::permanent(
            "provider_mock",
            format!("unknown mock scenario `{other}`"),
        )),
    }
}

pub(crate) fn mock_delete_outcome(scenario: &str) -> Result<(), BridgeError> {
    match scenario {
        "success" => Ok(()),
        "throttle" => Err(BridgeError::retryable("provider_throttled", "mock throttled", 1_000)),
        other => Err(BridgeError::permanent(
            "provider_mock",
            format!("unknown mock scenario `{other}`"),
        )),
    }
}
