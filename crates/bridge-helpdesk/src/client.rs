use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bridge_core::{BridgeError, ConversationStatus, Direction, MessageKind, is_strict_e164};
use serde_json::{Value, json};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::HelpdeskConfig;
use crate::sidecar;

const MEDIA_RETRY_ATTEMPTS: u32 = 3;
const MAX_REOPEN_PAGES: u32 = 50;
const URL_FETCH_RETRIES: u32 = 3;
const URL_FETCH_RETRY_GAP: Duration = Duration::from_secs(2);

/// Resolved by the registry for UAZAPI tenants only: fetches a message's
/// media from the provider as base64.
pub type MediaDownloadHook =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<String, BridgeError>> + Send>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct InboxHandle {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ContactRef {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ConversationRef {
    pub id: String,
    pub status: ConversationStatus,
}

/// Where a piece of outbound media comes from, tried in this order: a
/// UAZAPI provider download keyed by the original provider message id,
/// then a plain URL fetch, then an inline base64 payload already on hand.
#[derive(Debug, Clone, Default)]
pub struct MediaPayload {
    pub provider_msg_id: Option<String>,
    pub url: Option<String>,
    pub base64: Option<String>,
}

async fn resolve_media_bytes(
    http: &reqwest::Client,
    payload: &MediaPayload,
    download_hook: Option<&MediaDownloadHook>,
) -> Option<String> {
    if let (Some(provider_msg_id), Some(hook)) = (&payload.provider_msg_id, download_hook) {
        match hook(provider_msg_id.clone()).await {
            Ok(base64) => return Some(base64),
            Err(err) => tracing::warn!(error = %err, "uazapi download hook failed, falling back"),
        }
    }

    if let Some(url) = &payload.url {
        let mut last_ok = None;
        for attempt in 0..=URL_FETCH_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(URL_FETCH_RETRY_GAP).await;
            }
            match http.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    if let Ok(bytes) = response.bytes().await
                        && !bytes.is_empty()
                    {
                        last_ok = Some(BASE64.encode(bytes));
                        break;
                    }
                }
                _ => continue,
            }
        }
        if last_ok.is_some() {
            return last_ok;
        }
        tracing::warn!(url, "media url download failed after retries, falling back");
    }

    payload.base64.clone()
}

/// Per-tenant helpdesk REST client. Owns the inbox handle once
/// resolved, and serializes media sends through a throttle.
pub struct HelpdeskClient {
    config: HelpdeskConfig,
    http: reqwest::Client,
    inbox: RwLock<Option<InboxHandle>>,
    last_media_send: Mutex<Option<Instant>>,
}

impl HelpdeskClient {
    pub fn new(config: HelpdeskConfig) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .user_agent("wootrico-bridge-helpdesk/0.1")
            .build()
            .map_err(|err| BridgeError::permanent("helpdesk_client_init", "failed to build HTTP client").with_source(err))?;
        Ok(Self { config, http, inbox: RwLock::new(None), last_media_send: Mutex::new(None) })
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("api_access_token", &self.config.api_access_token)
    }

    async fn classify(&self, response: reqwest::Response) -> Result<Value, BridgeError> {
        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(BridgeError::retryable(
                "helpdesk_remote_retryable",
                format!("status={} body={body_text}", status.as_u16()),
                1_000,
            ));
        }
        if status.is_client_error() {
            return Err(BridgeError::permanent(
                "helpdesk_remote_4xx",
                format!("status={} body={body_text}", status.as_u16()),
            ));
        }
        Ok(serde_json::from_str(&body_text).unwrap_or(Value::Null))
    }

    /// Resolves the tenant's inbox handle, caching it after the first call
    ///.
    pub async fn ensure_inbox(&self) -> Result<InboxHandle, BridgeError> {
        if let Some(handle) = self.inbox.read().await.clone() {
            return Ok(handle);
        }

        if let Some(sidecar) = sidecar::load(&self.config.sidecar_path).await {
            if sidecar.inbox_name.eq_ignore_ascii_case(&self.config.inbox_name) {
                let url = format!("{}/inboxes/{}", self.config.accounts_base(), sidecar.inbox_id);
                let response = self.auth(self.http.get(&url)).send().await;
                if let Ok(response) = response
                    && response.status().is_success()
                {
                    let handle = InboxHandle { id: sidecar.inbox_id, name: sidecar.inbox_name };
                    *self.inbox.write().await = Some(handle.clone());
                    return Ok(handle);
                }
            }
        }

        let list_url = format!("{}/inboxes", self.config.accounts_base());
        let response = self
            .auth(self.http.get(&list_url))
            .send()
            .await
            .map_err(|err| BridgeError::retryable("helpdesk_http", "failed to list inboxes", 1_000).with_source(err))?;
        let body = self.classify(response).await?;
        if let Some(found) = body
            .get("payload")
            .and_then(Value::as_array)
            .and_then(|inboxes| {
                inboxes.iter().find(|inbox| {
                    inbox.get("name").and_then(Value::as_str).is_some_and(|name| name.eq_ignore_ascii_case(&self.config.inbox_name))
                })
            })
        {
            let id = found.get("id").and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)));
            if let Some(id) = id {
                let name = found.get("name").and_then(Value::as_str).unwrap_or(&self.config.inbox_name).to_string();
                sidecar::save(&self.config.sidecar_path, &id, &name).await.ok();
                let handle = InboxHandle { id, name };
                *self.inbox.write().await = Some(handle.clone());
                return Ok(handle);
            }
        }

        let create_url = format!("{}/inboxes", self.config.accounts_base());
        let body = json!({
            "name": self.config.inbox_name,
            "channel": {
                "type": "api",
                "webhook_url": self.config.callback_webhook_url,
            },
            "allow_messages_after_resolved": self.config.reopen_resolved,
        });
        let response = self
            .auth(self.http.post(&create_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| BridgeError::retryable("helpdesk_http", "failed to create inbox", 1_000).with_source(err))?;
        let body = self.classify(response).await?;
        let id = body
            .get("id")
            .and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)))
            .ok_or_else(|| BridgeError::permanent("helpdesk_inbox_create_failed", "create-inbox response missing id"))?;
        sidecar::save(&self.config.sidecar_path, &id, &self.config.inbox_name).await.ok();
        let handle = InboxHandle { id, name: self.config.inbox_name.clone() };
        *self.inbox.write().await = Some(handle.clone());
        Ok(handle)
    }

    /// Finds or creates a contact for `identifier`. `is_group`
    /// forces an `identifier` match/create regardless of shape.
    pub async fn find_or_create_contact(
        &self,
        identifier: &str,
        name: &str,
        is_group: bool,
        avatar_url: Option<&str>,
    ) -> Result<ContactRef, BridgeError> {
        let match_field = if !is_group && is_strict_e164(identifier) { "phone_number" } else { "identifier" };

        let search_url = format!("{}/contacts/search", self.config.accounts_base());
        let response = self
            .auth(self.http.get(&search_url))
            .query(&[("q", identifier)])
            .send()
            .await
            .map_err(|err| BridgeError::retryable("helpdesk_http", "failed to search contacts", 1_000).with_source(err))?;
        let body = self.classify(response).await?;
        if let Some(found) = body.get("payload").and_then(Value::as_array).and_then(|contacts| {
            contacts
                .iter()
                .find(|contact| contact.get(match_field).and_then(Value::as_str) == Some(identifier))
        }) && let Some(id) = found.get("id").and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)))
        {
            return Ok(ContactRef { id });
        }

        let has_phone = is_strict_e164(identifier);
        let create_url = format!("{}/contacts", self.config.accounts_base());
        let mut fields = vec![("name".to_string(), name.to_string()), ("identifier".to_string(), identifier.to_string())];
        if has_phone {
            fields.push(("phone_number".to_string(), identifier.to_string()));
        }

        let avatar_bytes = match avatar_url {
            Some(url) if !is_group => self.download_avatar(url).await,
            _ => None,
        };

        let response = if let Some(bytes) = avatar_bytes {
            let mut form = reqwest::multipart::Form::new();
            for (key, value) in &fields {
                form = form.text(key.clone(), value.clone());
            }
            form = form.part("avatar", reqwest::multipart::Part::bytes(bytes).file_name("avatar.jpg"));
            self.auth(self.http.post(&create_url)).multipart(form).send().await
        } else {
            let body: serde_json::Map<String, Value> = fields.into_iter().map(|(k, v)| (k, json!(v))).collect();
            self.auth(self.http.post(&create_url)).json(&Value::Object(body)).send().await
        };
        let response = response.map_err(|err| BridgeError::retryable("helpdesk_http", "failed to create contact", 1_000).with_source(err))?;
        let body = self.classify(response).await?;
        let id = body
            .get("payload")
            .and_then(|p| p.get("contact"))
            .or(Some(&body))
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)))
            .ok_or_else(|| BridgeError::permanent("helpdesk_contact_create_failed", "create-contact response missing id"))?;
        Ok(ContactRef { id })
    }

    async fn download_avatar(&self, url: &str) -> Option<Vec<u8>> {
        for attempt in 0..=URL_FETCH_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(URL_FETCH_RETRY_GAP).await;
            }
            if let Ok(response) = self.http.get(url).send().await
                && response.status().is_success()
                && let Ok(bytes) = response.bytes().await
                && !bytes.is_empty()
            {
                return Some(bytes.to_vec());
            }
        }
        None
    }

    /// Finds or creates a conversation for `contact` in `inbox`.
    pub async fn find_or_create_conversation(
        &self,
        inbox: &InboxHandle,
        contact: &ContactRef,
    ) -> Result<ConversationRef, BridgeError> {
        if self.config.reopen_resolved
            && let Some(id) = self.paginate_conversations(inbox, contact, ConversationStatus::Resolved).await?
        {
            self.toggle_status(&id, "open").await?;
            return Ok(ConversationRef { id, status: ConversationStatus::Open });
        }

        if let Some(id) = self.paginate_conversations(inbox, contact, ConversationStatus::Open).await? {
            return Ok(ConversationRef { id, status: ConversationStatus::Open });
        }

        let create_url = format!("{}/conversations", self.config.accounts_base());
        let body = json!({
            "inbox_id": inbox.id,
            "contact_id": contact.id,
            "status": self.config.initial_status.as_str(),
        });
        let response = self
            .auth(self.http.post(&create_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| BridgeError::retryable("helpdesk_http", "failed to create conversation", 1_000).with_source(err))?;
        let body = self.classify(response).await?;
        let id = body
            .get("id")
            .and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)))
            .ok_or_else(|| BridgeError::permanent("helpdesk_conversation_create_failed", "create-conversation response missing id"))?;
        Ok(ConversationRef { id, status: self.config.initial_status })
    }

    async fn paginate_conversations(
        &self,
        inbox: &InboxHandle,
        contact: &ContactRef,
        status: ConversationStatus,
    ) -> Result<Option<String>, BridgeError> {
        let url = format!("{}/conversations", self.config.accounts_base());
        for page in 1..=MAX_REOPEN_PAGES {
            let response = self
                .auth(self.http.get(&url))
                .query(&[
                    ("status", status.as_str()),
                    ("inbox_id", inbox.id.as_str()),
                    ("page", &page.to_string()),
                    ("sort_order", "latest_first"),
                ])
                .send()
                .await
                .map_err(|err| BridgeError::retryable("helpdesk_http", "failed to list conversations", 1_000).with_source(err))?;
            let body = self.classify(response).await?;
            let Some(conversations) = body.get("payload").and_then(Value::as_array) else {
                return Ok(None);
            };
            if conversations.is_empty() {
                return Ok(None);
            }
            for conversation in conversations {
                let sender_id = conversation
                    .get("meta")
                    .and_then(|meta| meta.get("sender"))
                    .and_then(|sender| sender.get("id"))
                    .and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)));
                if sender_id.as_deref() == Some(contact.id.as_str())
                    && let Some(id) = conversation.get("id").and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string)))
                {
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    async fn toggle_status(&self, conversation_id: &str, status: &str) -> Result<(), BridgeError> {
        let url = format!("{}/conversations/{conversation_id}/toggle_status", self.config.accounts_base());
        let response = self
            .auth(self.http.post(&url))
            .json(&json!({"status": status}))
            .send()
            .await
            .map_err(|err| BridgeError::retryable("helpdesk_http", "failed to toggle conversation status", 1_000).with_source(err))?;
        self.classify(response).await?;
        Ok(())
    }

    /// Simple JSON POST, bypassing the media throttle.
    pub async fn send_text(&self, conversation_id: &str, direction: Direction, text: &str, reply_id: Option<&str>) -> Result<String, BridgeError> {
        let url = format!("{}/conversations/{conversation_id}/messages", self.config.accounts_base());
        let mut body = json!({"content": text, "message_type": direction.as_str()});
        if let Some(reply_id) = reply_id {
            body.as_object_mut().unwrap().insert("content_attributes".into(), json!({"in_reply_to": reply_id}));
        }
        let response = self
            .auth(self.http.post(&url))
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|err| BridgeError::retryable("helpdesk_http", "failed to send text message", 1_000).with_source(err))?;
        let body = self.classify(response).await?;
        Ok(body.get("id").and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string))).unwrap_or_default())
    }

    /// Throttled, retried media send with a final text-only fallback.
    pub async fn send_media(
        &self,
        conversation_id: &str,
        direction: Direction,
        kind: MessageKind,
        payload: MediaPayload,
        caption: Option<&str>,
        reply_id: Option<&str>,
        download_hook: Option<&MediaDownloadHook>,
    ) -> Result<String, BridgeError> {
        self.wait_for_media_slot().await;

        let Some(base64) = resolve_media_bytes(&self.http, &payload, download_hook).await else {
            tracing::warn!(conversation_id, "no media bytes resolved, degrading to text");
            return self.send_text(conversation_id, direction, caption.unwrap_or_default(), reply_id).await;
        };

        let url = format!("{}/conversations/{conversation_id}/messages", self.config.accounts_base());
        let mut last_err = None;
        for attempt in 1..=MEDIA_RETRY_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
            }
            let mut form = reqwest::multipart::Form::new()
                .text("content", caption.unwrap_or_default().to_string())
                .text("message_type", direction.as_str());
            if let Some(reply_id) = reply_id {
                form = form.text("content_attributes[in_reply_to]", reply_id.to_string());
            }
            let bytes = BASE64.decode(&base64).unwrap_or_default();
            form = form.part(
                "attachments[]",
                reqwest::multipart::Part::bytes(bytes).file_name(format!("attachment.{}", kind.as_str())),
            );

            let sent = self
                .auth(self.http.post(&url))
                .multipart(form)
                .timeout(Duration::from_secs(60))
                .send()
                .await;
            let response = match sent {
                Ok(response) => response,
                Err(err) => {
                    last_err = Some(BridgeError::retryable("helpdesk_media_transport", err.to_string(), 2_000 * attempt as u64));
                    continue;
                }
            };
            match self.classify(response).await {
                Ok(body) => {
                    return Ok(body.get("id").and_then(|v| v.as_i64().map(|n| n.to_string()).or_else(|| v.as_str().map(str::to_string))).unwrap_or_default());
                }
                Err(err) if err.is_retryable() => {
                    last_err = Some(err);
                    continue;
                }
                Err(err) => return Err(err),
            }
        }

        tracing::warn!(conversation_id, "media send exhausted retries, falling back to text");
        match self.send_text(conversation_id, direction, caption.unwrap_or_default(), reply_id).await {
            Ok(id) => Ok(id),
            Err(_) => Err(last_err.unwrap_or_else(|| BridgeError::permanent("helpdesk_media_failed", "media send failed"))),
        }
    }

    async fn wait_for_media_slot(&self) {
        let mut guard = self.last_media_send.lock().await;
        let spacing = Duration::from_millis(self.config.min_media_spacing_ms);
        if let Some(last) = *guard {
            let elapsed = last.elapsed();
            if elapsed < spacing {
                tokio::time::sleep(spacing - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }

    /// Not retried.
    pub async fn delete_message(&self, conversation_id: &str, message_id: &str) -> Result<(), BridgeError> {
        let url = format!("{}/conversations/{conversation_id}/messages/{message_id}", self.config.accounts_base());
        let response = self
            .auth(self.http.delete(&url))
            .send()
            .await
            .map_err(|err| BridgeError::retryable("helpdesk_http", "failed to delete message", 1_000).with_source(err))?;
        self.classify(response).await?;
        Ok(())
    }
}
