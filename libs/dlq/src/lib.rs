//! Publishes records describing reconciliation failures to a dead-letter
//! stream. The two processors ack the originating queue message regardless
//! of outcome (no redelivery storms) and call [`DlqPublisher::publish`] so
//! the failure is not silently lost.
//!
//! ```no_run
//! use bridge_dlq::{DlqError, DlqPublisher};
//!
//! # fn main() -> anyhow::Result<()> {
//! # let rt = tokio::runtime::Runtime::new()?;
//! rt.block_on(async {
//!     let client = async_nats::connect("nats://127.0.0.1:4222").await?;
//!     let dlq = DlqPublisher::new("processor-inbound", client).await?;
//!     dlq
//!         .publish(
//!             "acme",
//!             "uazapi",
//!             "msg-1",
//!             0,
//!             DlqError {
//!                 code: "E_SEND".into(),
//!                 message: "helpdesk returned 500".into(),
//!                 stage: Some("processor-inbound".into()),
//!             },
//!             &serde_json::json!({"chat_id": "5511999998888"}),
//!         )
//!         .await?;
//!     anyhow::Ok(())
//! })
//! # }
//! ```

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_nats::{
    Client,
    jetstream::{
        Context as JsContext,
        stream::{Config as StreamConfig, RetentionPolicy},
    },
};
use bridge_telemetry::{TelemetryLabels, record_counter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;

const DLQ_ENABLED_ENV: &str = "DLQ_ENABLED";
const DLQ_SUBJECT_FMT_ENV: &str = "DLQ_SUBJECT_FMT";
const DEFAULT_DLQ_SUBJECT_FMT: &str = "dlq.{tenant}.{stage}.{platform}";
const DLQ_STREAM_NAME: &str = "DLQ";

/// Error metadata stored alongside each DLQ entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqError {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub stage: Option<String>,
}

/// Payload stored for each DLQ message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqRecord {
    pub tenant: String,
    pub stage: String,
    pub platform: String,
    pub msg_id: String,
    pub retries: u32,
    pub ts: String,
    pub error: DlqError,
    pub envelope: Value,
}

#[derive(Clone)]
pub struct DlqPublisher {
    js: JsContext,
    stage: String,
    subject_fmt: String,
    enabled: bool,
}

impl DlqPublisher {
    pub async fn new(stage: &str, client: Client) -> Result<Self> {
        let enabled = std::env::var(DLQ_ENABLED_ENV)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        let fmt =
            std::env::var(DLQ_SUBJECT_FMT_ENV).unwrap_or_else(|_| DEFAULT_DLQ_SUBJECT_FMT.into());

        let js = async_nats::jetstream::new(client);
        ensure_stream(&js, &fmt).await?;

        Ok(Self {
            js,
            stage: stage.to_string(),
            subject_fmt: fmt,
            enabled,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub async fn publish<S: Serialize>(
        &self,
        tenant: &str,
        platform: &str,
        msg_id: &str,
        retries: u32,
        error: DlqError,
        envelope: &S,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let subject = format_subject(&self.subject_fmt, tenant, &self.stage, Some(platform));
        let ts = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".into());
        let record = DlqRecord {
            tenant: tenant.to_string(),
            stage: self.stage.clone(),
            platform: platform.to_string(),
            msg_id: msg_id.to_string(),
            retries,
            ts,
            error: DlqError {
                stage: Some(self.stage.clone()),
                ..error
            },
            envelope: serde_json::to_value(envelope)?,
        };

        let payload = serde_json::to_vec(&record)?;
        self.js
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("publish DLQ entry to {subject}"))?;

        let mut labels = TelemetryLabels::new(tenant);
        labels.platform = Some(platform.to_string());
        labels.msg_id = Some(msg_id.to_string());
        labels.extra.push(("stage".into(), self.stage.clone()));
        labels
            .extra
            .push(("code".into(), record.error.code.clone()));
        record_counter("dlq_published", 1, &labels);
        info!(
            tenant = %record.tenant,
            stage = %record.stage,
            platform = %record.platform,
            msg_id = %record.msg_id,
            code = %record.error.code,
            "dlq entry published"
        );
        Ok(())
    }
}

async fn ensure_stream(js: &JsContext, subject_fmt: &str) -> Result<()> {
    let pattern = subject_fmt
        .replace("{tenant}", "*")
        .replace("{stage}", "*")
        .replace("{platform}", "*");
    let cfg = StreamConfig {
        name: DLQ_STREAM_NAME.into(),
        subjects: vec![pattern],
        retention: RetentionPolicy::WorkQueue,
        max_messages_per_subject: -1,
        max_messages: -1,
        max_bytes: -1,
        description: Some("wootrico bridge dead-letter records".into()),
        ..StreamConfig::default()
    };

    match js.get_stream(DLQ_STREAM_NAME).await {
        Ok(_) => Ok(()),
        Err(_) => {
            js.create_stream(cfg).await.context("create DLQ stream")?;
            Ok(())
        }
    }
}

pub fn format_subject(fmt: &str, tenant: &str, stage: &str, platform: Option<&str>) -> String {
    let mut map = HashMap::new();
    map.insert("tenant", tenant);
    map.insert("stage", stage);
    if let Some(p) = platform {
        map.insert("platform", p);
    }
    let mut out = String::new();
    let mut chars = fmt.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '{' {
            let mut key = String::new();
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == '}' {
                    break;
                }
                key.push(next);
            }
            if let Some(val) = map.get(key.as_str()) {
                out.push_str(val);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_subject_inserts_placeholders() {
        let s = format_subject(
            "dlq.{tenant}.{stage}.{platform}",
            "t1",
            "processor-inbound",
            Some("uazapi"),
        );
        assert_eq!(s, "dlq.t1.processor-inbound.uazapi");
    }

    #[test]
    fn format_subject_handles_missing_platform() {
        let s = format_subject("dlq.{tenant}.{stage}.{platform}", "t1", "processor-inbound", None);
        assert_eq!(s, "dlq.t1.processor-inbound.");
    }

    #[test]
    fn record_roundtrips_json() {
        let record = DlqRecord {
            tenant: "t1".into(),
            stage: "processor-outbound".into(),
            platform: "zapi".into(),
            msg_id: "abc".into(),
            retries: 2,
            ts: "2024-01-01T00:00:00Z".into(),
            error: DlqError {
                code: "E_SEND".into(),
                message: "429".into(),
                stage: Some("processor-outbound".into()),
            },
            envelope: serde_json::json!({"hello": "world"}),
        };
        let serialized = serde_json::to_string(&record).expect("serialize");
        let parsed: DlqRecord = serde_json::from_str(&serialized).expect("parse");
        assert_eq!(parsed.msg_id, "abc");
        assert_eq!(parsed.error.code, "E_SEND");
        assert_eq!(parsed.envelope["hello"], "world");
    }
}
