use std::time::Duration;

use bridge_core::{BridgeError, MessageKind};
use serde_json::{Value, json};

use crate::client::{Attachment, SendOutcome, SendRequest, classify_response, mock_delete_outcome, mock_scenario, mock_send_outcome, retry_after_ms};

const DOWNLOAD_RETRIES: u32 = 5;
const DOWNLOAD_RETRY_GAP: Duration = Duration::from_secs(2);

fn media_type(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Image => "image",
        MessageKind::Audio => "audio",
        MessageKind::Video => "video",
        MessageKind::Document => "document",
        MessageKind::Text => "text",
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
            let file = attachment.base64.clone().or_else(|| attachment.url.clone()).unwrap_or_default();
            (
                "/send/media",
                json!({
                    "number": request.recipient,
                    "type": media_type(attachment.kind),
                    "file": file,
                    "text": text.unwrap_or_default(),
                }),
            )
        }
        None => ("/send/text", json!({"number": request.recipient, "text": text.unwrap_or_default()})),
    };
    if let Some(reply_to) = &request.reply_to {
        body.as_object_mut().unwrap().insert("replyid".into(), json!(reply_to));
    }

    let endpoint = format!("{base_url}{path}");
    let response = http
        .post(&endpoint)
        .header("token", token)
        .json(&body)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| BridgeError::retryable("uazapi_http", "failed to call UAZAPI", 1_000).with_source(err))?;

    let status = response.status();
    let retry_after = retry_after_ms(&response);
    let body_text = response
        .text()
        .await
        .map_err(|err| BridgeError::retryable("uazapi_body", "failed to read UAZAPI response", 1_000).with_source(err))?;
    let raw = classify_response(status, retry_after, &body_text)?;

    let message_id = raw
        .get("id")
        .or_else(|| raw.get("messageid"))
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::permanent("uazapi_missing_message_id", "response missing id"))?
        .to_string();

    Ok(SendOutcome { provider_message_id: message_id, raw })
}

pub async fn delete(http: &reqwest::Client, base_url: &str, token: &str, message_id: &str) -> Result<(), BridgeError> {
    if let Some(scenario) = mock_scenario(base_url) {
        return mock_delete_outcome(scenario);
    }

    let endpoint = format!("{base_url}/message/delete");
    let response = http
        .post(&endpoint)
        .header("token", token)
        .json(&json!({"id": message_id}))
        .send()
        .await
        .map_err(|err| BridgeError::retryable("uazapi_http", "failed to call UAZAPI delete", 1_000).with_source(err))?;

    let status = response.status();
    let retry_after = retry_after_ms(&response);
    let body_text = response.text().await.unwrap_or_default();
    classify_response(status, retry_after, &body_text)?;
    Ok(())
}

/// UAZAPI-only media download, retried up to 5 times at a 2 s spacing on
/// 404/502/503/timeout/empty body.
pub async fn download(
    http: &reqwest::Client,
    base_url: &str,
    token: &str,
    message_id: &str,
    timeout: Duration,
) -> Result<String, BridgeError> {
    if let Some(scenario) = mock_scenario(base_url) {
        return match scenario {
            "success" => Ok("bW9jay1iYXNlNjQ=".to_string()),
            other => Err(BridgeError::permanent("uazapi_mock", format!("unknown mock scenario `{other}`"))),
        };
    }

    let endpoint = format!("{base_url}/message/download");
    let body = json!({"id": message_id, "return_base64": true, "return_link": false});

    let mut last_err = BridgeError::permanent("uazapi_download_exhausted", "download retries exhausted");
    for attempt in 0..=DOWNLOAD_RETRIES {
        if attempt > 0 {
            tokio::time::sleep(DOWNLOAD_RETRY_GAP).await;
        }

        let sent = http.post(&endpoint).header("token", token).json(&body).timeout(timeout).send().await;
        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                last_err = BridgeError::retryable("uazapi_download_timeout", err.to_string(), 2_000);
                continue;
            }
        };

        let status = response.status();
        let is_retryable_status = matches!(
            status,
            reqwest::StatusCode::NOT_FOUND | reqwest::StatusCode::BAD_GATEWAY | reqwest::StatusCode::SERVICE_UNAVAILABLE
        );
        let body_text = response.text().await.unwrap_or_default();

        if is_retryable_status || body_text.trim().is_empty() {
            last_err = BridgeError::retryable(
                "uazapi_download_retryable",
                format!("status={} body_empty={}", status.as_u16(), body_text.trim().is_empty()),
                2_000,
            );
            continue;
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(BridgeError::permanent(
                "uazapi_download_failed",
                format!("status={} body={body_text}", status.as_u16()),
            ));
        }

        let raw: Value = serde_json::from_str(&body_text).unwrap_or(Value::Null);
        return raw
            .get("base64")
            .or_else(|| raw.get("file"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| BridgeError::permanent("uazapi_download_missing_body", "download response missing base64 content"));
    }

    Err(last_err)
}
