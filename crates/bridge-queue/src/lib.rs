//! JetStream topology for the bridge: one stream, `wootrico`,
//! carrying the two subjects the reconciliation processors pull from,
//! `webhook.principal` for provider events and `webhook.callback` for
//! helpdesk callbacks, plus the durable pull consumer for each.
//!
//! Both processors pull with manual ack and ack unconditionally, even on
//! processing error, to avoid head-of-line blocking a stuck message would
//! otherwise cause; that ack-regardless-of-outcome policy lives in the
//! processor loops themselves; this crate only hands back the message
//! stream.

use anyhow::{Context, Result};
use async_nats::{
    Client,
    jetstream::{
        Context as JsContext, Message,
        consumer::{AckPolicy, pull::Config as PullConfig, pull::Stream as PullMessages},
        stream::{Config as StreamConfig, RetentionPolicy},
    },
};
use futures::StreamExt;

const STREAM_NAME: &str = "wootrico";

/// One of the bridge's two JetStream subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    /// Inbound provider webhook events.
    Principal,
    /// Outbound helpdesk callback events.
    Callback,
}

impl Subject {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Principal => "webhook.principal",
            Subject::Callback => "webhook.callback",
        }
    }

    fn durable_name(&self) -> &'static str {
        match self {
            Subject::Principal => "consumer-webhook-principal",
            Subject::Callback => "consumer-webhook-callback",
        }
    }
}

/// Connected JetStream context with the `wootrico` stream bootstrapped.
#[derive(Clone)]
pub struct BridgeQueue {
    js: JsContext,
}

impl BridgeQueue {
    /// Connects to NATS and ensures the `wootrico` stream exists, covering
    /// both subjects regardless of which one the caller ultimately pulls
    /// from.
    pub async fn connect(nats_url: &str) -> Result<Self> {
        let client = async_nats::connect(nats_url)
            .await
            .with_context(|| format!("connect to NATS at {nats_url}"))?;
        Self::from_client(client).await
    }

    pub async fn from_client(client: Client) -> Result<Self> {
        let js = async_nats::jetstream::new(client);
        ensure_stream(&js).await?;
        Ok(Self { js })
    }

    /// Publishes `payload` to `subject`'s JetStream subject. Used by the
    /// ingress HTTP app to hand provider webhooks and helpdesk callbacks
    /// off to the reconciliation processors.
    pub async fn publish(&self, subject: Subject, payload: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(payload)?;
        self.js
            .publish(subject.as_str(), bytes.into())
            .await
            .with_context(|| format!("publish to {}", subject.as_str()))?
            .await
            .with_context(|| format!("await ack for publish to {}", subject.as_str()))?;
        Ok(())
    }

    /// Ensures the durable pull consumer for `subject` exists and returns
    /// a long-lived message stream over it. Ack policy is explicit: the
    /// caller must call `.ack()`/`.ack_with()` on each message.
    pub async fn consumer(&self, subject: Subject) -> Result<Consumer> {
        let stream = self
            .js
            .get_stream(STREAM_NAME)
            .await
            .with_context(|| format!("fetch stream {STREAM_NAME}"))?;

        let durable = subject.durable_name().to_string();
        let consumer = stream
            .get_or_create_consumer(
                &durable,
                PullConfig {
                    durable_name: Some(durable.clone()),
                    filter_subject: subject.as_str().to_string(),
                    ack_policy: AckPolicy::Explicit,
                    max_ack_pending: 256,
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("ensure consumer {durable}"))?;

        let messages = consumer
            .messages()
            .await
            .with_context(|| format!("attach consumer stream {durable}"))?;

        Ok(Consumer { subject, messages })
    }
}

async fn ensure_stream(js: &JsContext) -> Result<()> {
    let cfg = StreamConfig {
        name: STREAM_NAME.to_string(),
        subjects: vec![Subject::Principal.as_str().to_string(), Subject::Callback.as_str().to_string()],
        retention: RetentionPolicy::WorkQueue,
        max_messages: -1,
        max_messages_per_subject: -1,
        max_bytes: -1,
        description: Some("wootrico bridge webhook/callback queue".to_string()),
        ..StreamConfig::default()
    };

    match js.get_stream(STREAM_NAME).await {
        Ok(_) => Ok(()),
        Err(_) => {
            js.create_stream(cfg).await.context("create wootrico stream")?;
            Ok(())
        }
    }
}

/// A durable pull consumer's long-lived message stream.
pub struct Consumer {
    subject: Subject,
    messages: PullMessages,
}

impl Consumer {
    pub fn subject(&self) -> Subject {
        self.subject
    }

    /// Pulls the next message, or `None` if the underlying stream ended
    /// (connection closed). Callers are responsible for acking: ack
    /// unconditionally even when processing the message fails, to avoid
    /// redelivery storms on a poison message.
    pub async fn next(&mut self) -> Option<Result<Message>> {
        match self.messages.next().await {
            Some(Ok(message)) => Some(Ok(message)),
            Some(Err(err)) => Some(Err(anyhow::anyhow!(err))),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_map_to_fixed_names() {
        assert_eq!(Subject::Principal.as_str(), "webhook.principal");
        assert_eq!(Subject::Callback.as_str(), "webhook.callback");
    }

    #[test]
    fn durable_names_are_distinct() {
        assert_ne!(Subject::Principal.durable_name(), Subject::Callback.durable_name());
    }
}
