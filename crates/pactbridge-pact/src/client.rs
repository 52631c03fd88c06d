// SPDX-FileCopyrightText: 2026 Pactbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Pact conversation API.
//!
//! Provides [`PactClient`] which handles URL construction, the private API
//! token header, request timeouts and response envelope decoding. It never
//! retries: redelivery is the queue worker's job.

use std::time::Duration;

use pactbridge_core::{
    AttachmentUpload, ConversationMetadata, MessageForm, RelayError, SentMessageResult,
    UploadedAttachmentRef,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::types::{ConversationData, Envelope, FALLBACK_MIME};

/// Header carrying the company's private API token (`X-Private-Api-Token`).
pub const TOKEN_HEADER: &str = "x-private-api-token";

/// Multipart field the upload endpoint reads the file from.
const FILE_FIELD: &str = "file";

/// HTTP client for Pact API communication.
#[derive(Debug, Clone)]
pub struct PactClient {
    client: reqwest::Client,
    company_url: String,
    timeout: Duration,
}

impl PactClient {
    /// Creates a client scoped to one company.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://api.pact.im`
    /// * `company_id` - Pact company the token belongs to
    /// * `api_token` - private API token
    /// * `timeout` - upper bound for every request, connect included
    pub fn new(
        base_url: &str,
        company_id: u64,
        api_token: &str,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let mut token = HeaderValue::from_str(api_token)
            .map_err(|e| RelayError::Config(format!("invalid API token header value: {e}")))?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(TOKEN_HEADER), token);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::ExternalApi {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            company_url: format!("{}/p1/companies/{company_id}", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    fn conversation_url(&self, conversation_id: i64) -> String {
        format!("{}/conversations/{conversation_id}", self.company_url)
    }

    /// `GET /conversations/{id}`.
    pub async fn fetch_conversation(
        &self,
        conversation_id: i64,
    ) -> Result<ConversationMetadata, RelayError> {
        let response = self
            .client
            .get(self.conversation_url(conversation_id))
            .send()
            .await
            .map_err(|e| self.transport_error("fetch conversation", e))?;

        let envelope: Envelope<ConversationData> =
            self.read_envelope("fetch conversation", response).await?;
        Ok(envelope.data.conversation)
    }

    /// `POST /conversations/{id}/messages/attachments` as multipart field `file`.
    pub async fn upload_attachment(
        &self,
        conversation_id: i64,
        upload: AttachmentUpload,
    ) -> Result<UploadedAttachmentRef, RelayError> {
        let size = upload.bytes.len();
        let form = Form::new().part(FILE_FIELD, file_part(upload)?);

        let response = self
            .client
            .post(format!(
                "{}/messages/attachments",
                self.conversation_url(conversation_id)
            ))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error("upload attachment", e))?;

        let envelope: Envelope<UploadedAttachmentRef> =
            self.read_envelope("upload attachment", response).await?;
        debug!(conversation_id, size, external_id = envelope.data.external_id, "attachment stored");
        Ok(envelope.data)
    }

    /// `POST /conversations/{id}/messages`, form-encoded.
    pub async fn post_message(
        &self,
        conversation_id: i64,
        form: &MessageForm,
    ) -> Result<SentMessageResult, RelayError> {
        let response = self
            .client
            .post(format!("{}/messages", self.conversation_url(conversation_id)))
            .form(&form.pairs())
            .send()
            .await
            .map_err(|e| self.transport_error("post message", e))?;

        let envelope: Envelope<SentMessageResult> =
            self.read_envelope("post message", response).await?;
        Ok(envelope.data)
    }

    /// Checks the status, then decodes the `{status, data}` envelope.
    async fn read_envelope<T: DeserializeOwned>(
        &self,
        call: &str,
        response: reqwest::Response,
    ) -> Result<Envelope<T>, RelayError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(call, e))?;

        if !status.is_success() {
            return Err(RelayError::ExternalApi {
                message: format!("{call} returned {status}: {body}"),
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| RelayError::ExternalApi {
                message: format!("{call} returned an unexpected body: {e}"),
                status: Some(status.as_u16()),
                source: Some(Box::new(e)),
            })?;
        debug!(call, status = %status, api_status = %envelope.status, "pact response received");
        Ok(envelope)
    }

    fn transport_error(&self, call: &str, e: reqwest::Error) -> RelayError {
        if e.is_timeout() {
            return RelayError::Timeout {
                duration: self.timeout,
            };
        }
        RelayError::ExternalApi {
            message: format!("{call} request failed: {e}"),
            status: e.status().map(|s| s.as_u16()),
            source: Some(Box::new(e)),
        }
    }
}

/// The multipart `file` part, typed as declared when reqwest accepts the
/// declared type and as [`FALLBACK_MIME`] otherwise.
fn file_part(upload: AttachmentUpload) -> Result<Part, RelayError> {
    let AttachmentUpload {
        file_name,
        mime_type,
        bytes,
    } = upload;

    match Part::bytes(bytes.clone())
        .file_name(file_name.clone())
        .mime_str(mime_type.trim())
    {
        Ok(part) => Ok(part),
        Err(e) => {
            debug!(
                file = %file_name,
                declared = %mime_type,
                error = %e,
                "unusable attachment type, sending as octet-stream"
            );
            Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(FALLBACK_MIME)
                .map_err(|e| RelayError::Internal(format!("invalid part content type: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> PactClient {
        PactClient::new(base_url, 12, "secret-token", Duration::from_secs(5)).unwrap()
    }

    fn conversation_body() -> serde_json::Value {
        serde_json::json!({
            "status": "ok",
            "data": {"conversation": {
                "external_id": 42,
                "name": "Jane",
                "channel_id": 7,
                "channel_type": "whatsapp",
                "created_at": "2026-01-01T00:00:00Z",
                "avatar": "https://cdn.example/a.png",
                "sender_external_id": "79990001122",
                "meta": {}
            }}
        })
    }

    fn sent_body() -> serde_json::Value {
        serde_json::json!({
            "status": "ok",
            "data": {
                "id": 9001, "company_id": 12, "channel": {"id": 7, "type": "whatsapp"},
                "conversation_id": 42, "state": "in_progress",
                "message_id": null, "details": null, "created_at": 1767225600
            }
        })
    }

    #[tokio::test]
    async fn fetch_conversation_sends_token_and_decodes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p1/companies/12/conversations/42"))
            .and(header("X-Private-Api-Token", "secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(conversation_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let conversation = client.fetch_conversation(42).await.unwrap();
        assert_eq!(conversation.external_id, 42);
        assert_eq!(conversation.name, "Jane");
        assert_eq!(conversation.channel_id, 7);
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_ignored() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p1/companies/12/conversations/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(conversation_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&format!("{}/", server.uri()));
        client.fetch_conversation(42).await.unwrap();
    }

    #[tokio::test]
    async fn upload_sends_multipart_file_part() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/p1/companies/12/conversations/42/messages/attachments"))
            .and(header(TOKEN_HEADER, "secret-token"))
            .and(body_string_contains("name=\"file\""))
            .and(body_string_contains("filename=\"a.png\""))
            .and(body_string_contains("Content-Type: image/png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status":"ok","data":{"external_id":777}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let uploaded = client
            .upload_attachment(
                42,
                AttachmentUpload {
                    file_name: "a.png".into(),
                    mime_type: "image/png".into(),
                    bytes: vec![0, 0, 0],
                },
            )
            .await
            .unwrap();
        assert_eq!(uploaded.external_id, 777);
    }

    async fn upload_with_declared_type(declared: &str, expected_part_type: &str) {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/p1/companies/12/conversations/42/messages/attachments"))
            .and(body_string_contains(format!("Content-Type: {expected_part_type}").as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status":"ok","data":{"external_id":778}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let uploaded = client
            .upload_attachment(
                42,
                AttachmentUpload {
                    file_name: "scan.bin".into(),
                    mime_type: declared.into(),
                    bytes: vec![1, 2, 3],
                },
            )
            .await
            .unwrap_or_else(|e| panic!("upload with type {declared:?} failed: {e}"));
        assert_eq!(uploaded.external_id, 778);
    }

    #[tokio::test]
    async fn upload_keeps_declared_type_with_parameters() {
        upload_with_declared_type("text/plain; charset=utf-8", "text/plain; charset=utf-8").await;
    }

    #[tokio::test]
    async fn upload_with_malformed_parameter_falls_back_to_octet_stream() {
        upload_with_declared_type("image/png; bad param", FALLBACK_MIME).await;
    }

    #[tokio::test]
    async fn upload_with_garbage_type_falls_back_to_octet_stream() {
        for declared in ["", "png"] {
            upload_with_declared_type(declared, FALLBACK_MIME).await;
        }
    }

    #[tokio::test]
    async fn post_message_sends_ordered_form() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/p1/companies/12/conversations/42/messages"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string(
                "message=hi&attachments_ids%5B%5D=777&attachments_ids%5B%5D=778",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(sent_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let form = MessageForm {
            message: "hi".into(),
            attachment_ids: vec![777, 778],
        };
        let sent = client.post_message(42, &form).await.unwrap();
        assert_eq!(sent.id, 9001);
        assert_eq!(sent.conversation_id, 42);
    }

    #[tokio::test]
    async fn server_error_maps_to_external_api_with_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/p1/companies/12/conversations/42/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .post_message(42, &MessageForm::default())
            .await
            .unwrap_err();
        match err {
            RelayError::ExternalApi { status, message, .. } => {
                assert_eq!(status, Some(500));
                assert!(message.contains("boom"), "got: {message}");
            }
            other => panic!("expected ExternalApi, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_success_body_is_an_external_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p1/companies/12/conversations/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.fetch_conversation(42).await.unwrap_err();
        assert!(
            matches!(err, RelayError::ExternalApi { status: Some(200), .. }),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn stalled_upstream_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/p1/companies/12/conversations/42"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(conversation_body())
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client =
            PactClient::new(&server.uri(), 12, "secret-token", Duration::from_millis(100)).unwrap();
        let err = client.fetch_conversation(42).await.unwrap_err();
        assert!(matches!(err, RelayError::Timeout { .. }), "got: {err:?}");
    }

    #[test]
    fn invalid_token_is_a_config_error() {
        let err = PactClient::new("https://api.pact.im", 1, "bad\ntoken", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }
}
