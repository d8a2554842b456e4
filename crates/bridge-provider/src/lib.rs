//! Per-tenant provider REST client: sends text/media/reply
//! messages and deletes messages across the three provider dialects, and
//! exposes UAZAPI's separate media download step. Every dialect's HTTP
//! surface is bit-exact ; this crate only assembles the request
//! bodies, dispatches by dialect, and classifies the response.

mod client;
mod credentials;
mod dialects;

pub use client::{Attachment, ProviderClient, SendOutcome, SendRequest};
pub use credentials::ProviderCredentials;

#[cfg(test)]
mod tests {
    use bridge_core::MessageKind;

    use super::*;

    fn request(recipient: &str) -> SendRequest {
        SendRequest {
            recipient: recipient.to_string(),
            text: Some("hello".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn zapi_text_send_succeeds_via_mock() {
        let client = ProviderClient::new(ProviderCredentials::ZApi {
            instance: "mock://success".into(),
            token: "t".into(),
            client_token: "ct".into(),
        })
        .unwrap();

        let outcomes = client.send(&request("+5511999998888")).await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].provider_message_id, "mock-msg");
    }

    #[tokio::test]
    async fn uazapi_throttle_is_retryable() {
        let client = ProviderClient::new(ProviderCredentials::Uazapi {
            base_url: "mock://throttle".into(),
            token: "t".into(),
            number: "5511999998888".into(),
        })
        .unwrap();

        let err = client.send(&request("+5511999998888")).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn wuzapi_unknown_scenario_is_permanent() {
        let client = ProviderClient::new(ProviderCredentials::Wuzapi {
            base_url: "mock://weird".into(),
            token: "t".into(),
        })
        .unwrap();

        let err = client.send(&request("+5511999998888")).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn zapi_delete_without_recipient_is_fatal() {
        let client = ProviderClient::new(ProviderCredentials::ZApi {
            instance: "mock://success".into(),
            token: "t".into(),
            client_token: "ct".into(),
        })
        .unwrap();

        let err = client.delete("msg-1", None).await.unwrap_err();
        assert_eq!(err.code(), "zapi_delete_missing_recipient");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn uazapi_delete_ignores_missing_recipient() {
        let client = ProviderClient::new(ProviderCredentials::Uazapi {
            base_url: "mock://success".into(),
            token: "t".into(),
            number: "5511999998888".into(),
        })
        .unwrap();

        client.delete("msg-1", None).await.unwrap();
    }

    #[tokio::test]
    async fn only_uazapi_supports_download() {
        let wuzapi = ProviderClient::new(ProviderCredentials::Wuzapi {
            base_url: "mock://success".into(),
            token: "t".into(),
        })
        .unwrap();
        assert_eq!(wuzapi.download("msg-1").await.unwrap_err().code(), "download_not_supported");

        let uazapi = ProviderClient::new(ProviderCredentials::Uazapi {
            base_url: "mock://success".into(),
            token: "t".into(),
            number: "5511999998888".into(),
        })
        .unwrap();
        assert!(!uazapi.download("msg-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn multi_attachment_send_returns_one_outcome_per_attachment() {
        let client = ProviderClient::new(ProviderCredentials::ZApi {
            instance: "mock://success".into(),
            token: "t".into(),
            client_token: "ct".into(),
        })
        .unwrap();

        let mut req = request("+5511999998888");
        req.attachments = vec![
            Attachment { kind: MessageKind::Image, url: Some("https://x/a.png".into()), base64: None, filename: None },
            Attachment { kind: MessageKind::Document, url: Some("https://x/b.pdf".into()), base64: None, filename: Some("b.pdf".into()) },
        ];

        let outcomes = client.send(&req).await.unwrap();
        assert_eq!(outcomes.len(), 2);
    }
}
