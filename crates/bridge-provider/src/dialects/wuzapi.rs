use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bridge_core::{BridgeError, MessageKind};
use serde_json::{Value, json};

use crate::client::{Attachment, SendOutcome, SendRequest, classify_response, mock_delete_outcome, mock_scenario, mock_send_outcome, retry_after_ms};

const URL_FETCH_RETRIES: u32 = 5;
const URL_FETCH_RETRY_GAP: Duration = Duration::from_secs(2);

fn context_info(request: &SendRequest) -> Option<Value> {
    request.reply_to.as_ref().map(|stanza_id| {
        let participant = request.jid.clone().or_else(|| request.lid.clone()).unwrap_or_default();
        json!({"StanzaId": stanza_id, "Participant": participant})
    })
}

/// Wuzapi attachments that arrive as a URL rather than base64 are
/// downloaded and re-encoded before posting, retried on transient failure
///.
async fn resolve_content(http: &reqwest::Client, attachment: &Attachment) -> Result<String, BridgeError> {
    if let Some(content) = &attachment.base64 {
        return Ok(content.clone());
    }
    let url = attachment
        .url
        .as_ref()
        .ok_or_else(|| BridgeError::permanent("wuzapi_missing_attachment", "attachment has neither base64 nor url"))?;

    let mut last_err = BridgeError::permanent("wuzapi_fetch_exhausted", "attachment download retries exhausted");
    for attempt in 0..=URL_FETCH_RETRIES {
        if attempt > 0 {
            tokio::time::sleep(URL_FETCH_RETRY_GAP).await;
        }
        match http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|err| BridgeError::retryable("wuzapi_fetch_body", err.to_string(), 2_000))?;
                if bytes.is_empty() {
                    last_err = BridgeError::retryable("wuzapi_fetch_empty", "attachment body was empty", 2_000);
                    continue;
                }
                return Ok(BASE64.encode(bytes));
            }
            Ok(response) => {
                last_err = BridgeError::retryable(
                    "wuzapi_fetch_status",
                    format!("status={}", response.status().as_u16()),
                    2_000,
                );
            }
            Err(err) => {
                last_err = BridgeError::retryable("wuzapi_fetch_timeout", err.to_string(), 2_000);
            }
        }
    }
    Err(last_err)
}

fn media_field(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Image => "Image",
        MessageKind::Audio => "Audio",
        MessageKind::Video => "Video",
        MessageKind::Document => "Document",
        MessageKind::Text => "Body",
    }
}

pub async fn send(
    http: &reqwest::Client,
    base_url: &str,
    token: &str,
    request: &SendRequest,
    attachment: Option<&Attachment>,
    text: Option<&str>,
    timeout: Duration,
) -> Result<SendOutcome, BridgeError> {
    if let Some(scenario) = mock_scenario(base_url) {
        return mock_send_outcome(scenario);
    }

    let (path, mut body) = match attachment {
        Some(attachment) => {
            let content = resolve_content(http, attachment).await?;
            let field = media_field(attachment.kind);
            let mut body = json!({"Phone": request.recipient, field: content});
            if !matches!(attachment.kind, MessageKind::Audio) {
                body.as_object_mut().unwrap().insert("Caption".into(), json!(text.unwrap_or_default()));
            }
            if matches!(attachment.kind, MessageKind::Document) {
                if let Some(filename) = &attachment.filename {
                    body.as_object_mut().unwrap().insert("FileName".into(), json!(filename));
                }
            }
            (format!("/chat/send/{}", attachment.kind.as_str()), body)
        }
        None => ("/chat/send/text".to_string(), json!({"Phone": request.recipient, "Body": text.unwrap_or_default()})),
    };
    if let Some(context) = context_info(request) {
        body.as_object_mut().unwrap().insert("ContextInfo".into(), context);
    }

    let endpoint = format!("{base_url}{path}");
    let response = http
        .post(&endpoint)
        .header("token", token)
        .json(&body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| BridgeError::retryable("wuzapi_http", "failed to call Wuzapi", 1_000).with_source(err))?;

    let status = response.status();
    let retry_after = retry_after_ms(&response);
    let body_text = response
        .text()
        .await
        .map_err(|err| BridgeError::retryable("wuzapi_body", "failed to read Wuzapi response", 1_000).with_source(err))?;
    let raw = classify_response(status, retry_after, &body_text)?;

    let message_id = raw
        .get("Id")
        .or_else(|| raw.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::permanent("wuzapi_missing_message_id", "response missing Id"))?
        .to_string();

    Ok(SendOutcome { provider_message_id: message_id, raw })
}

pub async fn delete(http: &reqwest::Client, base_url: &str, token: &str, message_id: &str) -> Result<(), BridgeError> {
    if let Some(scenario) = mock_scenario(base_url) {
        return mock_delete_outcome(scenario);
    }

    let endpoint = format!("{base_url}/chat/delete");
    let response = http
        .post(&endpoint)
        .header("token", token)
        .json(&json!({"MessageId": message_id}))
        .send()
        .await
        .map_err(|err| BridgeError::retryable("wuzapi_http", "failed to call Wuzapi delete", 1_000).with_source(err))?;

    let status = response.status();
    let retry_after = retry_after_ms(&response);
    let body_text = response.text().await.unwrap_or_default();
    classify_response(status, retry_after, &body_text)?;
    Ok(())
}
