use std::time::Duration;

use bridge_core::{BridgeError, MessageKind};
use serde_json::{Value, json};

use crate::client::{Attachment, SendOutcome, SendRequest, classify_response, mock_delete_outcome, mock_scenario, mock_send_outcome, retry_after_ms, zapi_phone};

fn base(instance: &str, token: &str) -> String {
    format!("https://api.z-api.io/instances/{instance}/token/{token}")
}

/// Z-API infers the document endpoint suffix from the attachment's file
/// extension, taken from the URL tail or the filename.
fn infer_extension(attachment: &Attachment) -> String {
    let candidate = attachment
        .filename
        .as_deref()
        .or(attachment.url.as_deref())
        .unwrap_or("file.pdf");
    candidate
        .rsplit('.')
        .next()
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .unwrap_or("pdf")
        .to_ascii_lowercase()
}

fn media_payload(attachment: &Attachment, caption: Option<&str>) -> (&'static str, Value) {
    let content = attachment.base64.clone().or_else(|| attachment.url.clone()).unwrap_or_default();
    match attachment.kind {
        MessageKind::Image => ("send-image", json!({"image": content, "caption": caption.unwrap_or_default()})),
        MessageKind::Audio => ("send-audio", json!({"audio": content})),
        MessageKind::Video => ("send-video", json!({"video": content, "caption": caption.unwrap_or_default()})),
        MessageKind::Document => {
            let ext = infer_extension(attachment);
            (
                "send-document",
                json!({
                    "document": content,
                    "caption": caption.unwrap_or_default(),
                    "fileName": attachment.filename.clone().unwrap_or_else(|| format!("file.{ext}")),
                    "extension": ext,
                }),
            )
        }
        MessageKind::Text => ("send-text", json!({"message": caption.unwrap_or_default()})),
    }
}

pub async fn send(
    http: &reqwest::Client,
    instance: &str,
    token: &str,
    client_token: &str,
    request: &SendRequest,
    attachment: Option<&Attachment>,
    text: Option<&str>,
    timeout: Duration,
) -> Result<SendOutcome, BridgeError> {
    if let Some(scenario) = mock_scenario(instance) {
        return mock_send_outcome(scenario);
    }

    let phone = zapi_phone(&request.recipient);
    let (suffix, mut body) = match attachment {
        Some(attachment) => media_payload(attachment, text),
        None => ("send-text", json!({"message": text.unwrap_or_default()})),
    };
    let body_map = body.as_object_mut().expect("payload is always a JSON object");
    body_map.insert("phone".into(), json!(phone));
    if let Some(reply_to) = &request.reply_to {
        body_map.insert("messageId".into(), json!(reply_to));
    }
    let endpoint = match (suffix, attachment) {
        ("send-document", Some(att)) => format!("{}/send-document/{}", base(instance, token), infer_extension(att)),
        (suffix, _) => format!("{}/{suffix}", base(instance, token)),
    };

    let response = http
        .post(&endpoint)
        .header("Client-Token", client_token)
        .json(&body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| BridgeError::retryable("zapi_http", "failed to call Z-API", 1_000).with_source(err))?;

    let status = response.status();
    let retry_after = retry_after_ms(&response);
    let body_text = response
        .text()
        .await
        .map_err(|err| BridgeError::retryable("zapi_body", "failed to read Z-API response", 1_000).with_source(err))?;
    let raw = classify_response(status, retry_after, &body_text)?;

    let message_id = raw
        .get("messageId")
        .or_else(|| raw.get("id"))
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::permanent("zapi_missing_message_id", "response missing messageId"))?
        .to_string();

    Ok(SendOutcome { provider_message_id: message_id, raw })
}

pub async fn delete(
    http: &reqwest::Client,
    instance: &str,
    token: &str,
    client_token: &str,
    message_id: &str,
    recipient: &str,
) -> Result<(), BridgeError> {
    if let Some(scenario) = mock_scenario(instance) {
        return mock_delete_outcome(scenario);
    }

    let phone = zapi_phone(recipient);
    let endpoint = format!("{}/messages", base(instance, token));
    let response = http
        .delete(&endpoint)
        .header("Client-Token", client_token)
        .query(&[("messageId", message_id), ("phone", &phone), ("owner", &phone)])
        .send()
        .await
        .map_err(|err| BridgeError::retryable("zapi_http", "failed to call Z-API delete", 1_000).with_source(err))?;

    let status = response.status();
    let retry_after = retry_after_ms(&response);
    let body_text = response.text().await.unwrap_or_default();
    classify_response(status, retry_after, &body_text)?;
    Ok(())
}
