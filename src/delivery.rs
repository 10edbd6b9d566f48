//! TamTam delivery: archive upload and notification with bounded retry
//!
//! TamTam processes uploaded binaries asynchronously; until it has, sending
//! a message that attaches one fails with `400` and a `file.not.processed`
//! marker in the body. That single known-transient condition is retried with
//! linearly increasing delays; every other non-2xx fails on the first
//! attempt. The asymmetry is deliberate and load-bearing — a blind retry
//! loop would spin forever on permanent rejections.

use crate::config::{SendRetryConfig, TamTamConfig};
use crate::error::{Result, TransportError};
use crate::types::{ArchivePart, UploadReceipt};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Marker TamTam puts in the 400 body while an upload is still processing
const NOT_PROCESSED_MARKER: &str = "file.not.processed";

/// Fallback notice sent when retries are exhausted
const UPLOAD_FAILED_NOTICE: &str =
    "TamTam could not finish processing the archive. Please try again later.";

/// `POST /uploads` response: where to stream the file
#[derive(Debug, Deserialize)]
struct UploadSlotDto {
    url: String,
}

/// Upload endpoint response: the receipt for the stored file
#[derive(Debug, Deserialize)]
struct UploadResultDto {
    #[serde(rename = "fileId")]
    file_id: i64,
    token: String,
}

/// Outcome of one send attempt
#[derive(Debug)]
enum SendOutcome {
    /// 2xx — the message went through
    Delivered,
    /// 400 with the not-processed marker — retryable
    NotYetProcessed {
        /// Response body, kept for the terminal error when retries run out
        body: String,
    },
    /// Any other non-2xx — permanent, fail fast
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },
}

/// Retry state for one message delivery
#[derive(Debug)]
enum SendState {
    /// About to perform a send attempt
    Sending,
    /// Sleeping before the next attempt
    WaitingRetry {
        /// How long to sleep
        delay: Duration,
    },
}

/// Client for the destination platform (TamTam)
///
/// Covers the collaborator boundary: upload-slot request, multipart archive
/// upload, and message send with the bounded retry loop.
#[derive(Clone)]
pub struct TamTamClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    retry: SendRetryConfig,
}

impl TamTamClient {
    /// Create a client from configuration
    pub fn new(config: &TamTamConfig, retry: SendRetryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.access_token.clone(),
            retry,
        }
    }

    /// Upload one archive and delete the local file on success
    ///
    /// Two steps: request an upload slot, then stream the archive to the
    /// returned URL as a multipart file.
    pub async fn upload(&self, part: &ArchivePart) -> Result<UploadReceipt> {
        let slot: UploadSlotDto = self.expect_json(
            self.http
                .post(format!("{}/uploads", self.api_base))
                .query(&[("access_token", self.token.as_str()), ("type", "file")])
                .send()
                .await
                .map_err(TransportError::from)?,
            "uploads",
        )
        .await?;

        let file_name = part
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stickers.zip".to_string());
        let bytes = tokio::fs::read(&part.path).await?;
        debug!(archive = %part.path.display(), bytes = bytes.len(), "uploading archive");

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        let result: UploadResultDto = self.expect_json(
            self.http
                .post(&slot.url)
                .multipart(form)
                .send()
                .await
                .map_err(TransportError::from)?,
            "upload",
        )
        .await?;

        tokio::fs::remove_file(&part.path).await?;
        info!(
            archive_seq = part.sequence_number,
            file_id = result.file_id,
            "archive uploaded"
        );

        Ok(UploadReceipt {
            remote_file_id: result.file_id.to_string(),
            upload_token: result.token,
        })
    }

    /// Send a text message, optionally with file attachments
    ///
    /// Bounded retry state machine: `Sending → Delivered`, or
    /// `Sending → WaitingRetry → Sending` on the not-yet-processed
    /// condition (at most `max_attempts` sends in total), or an immediate
    /// failure on any other non-2xx. When retries run out, a plain-text
    /// failure notice is sent once and the terminal error is returned.
    pub async fn send_message(
        &self,
        user_id: i64,
        text: &str,
        attachments: &[UploadReceipt],
    ) -> Result<()> {
        let mut attempts = 0u32;
        let mut state = SendState::Sending;

        loop {
            match state {
                SendState::WaitingRetry { delay } => {
                    debug!(?delay, attempts, "upload not processed yet, backing off");
                    tokio::time::sleep(delay).await;
                    state = SendState::Sending;
                }
                SendState::Sending => {
                    attempts += 1;
                    let outcome = self.send_once(user_id, text, attachments).await?;
                    match outcome {
                        SendOutcome::Delivered => {
                            debug!(user_id, attempts, "message delivered");
                            return Ok(());
                        }
                        SendOutcome::NotYetProcessed { body } => {
                            if attempts >= self.retry.max_attempts {
                                warn!(user_id, attempts, "upload never processed, giving up");
                                self.send_failure_notice(user_id).await;
                                return Err(TransportError::Status { status: 400, body }.into());
                            }
                            state = SendState::WaitingRetry {
                                delay: self.retry.delay_for(attempts),
                            };
                        }
                        SendOutcome::Rejected { status, body } => {
                            error!(user_id, status, body = %body, "message rejected");
                            return Err(TransportError::Status { status, body }.into());
                        }
                    }
                }
            }
        }
    }

    /// Upload every archive and notify the user
    ///
    /// One part: a single instructions message carrying the attachment.
    /// Multiple parts: the instructions, then a multi-part notice, then one
    /// message per attachment (TamTam caps archives at 50 stickers, so a
    /// large pack arrives as several files the user feeds to the importer
    /// one at a time).
    pub async fn deliver(&self, user_id: i64, parts: &[ArchivePart]) -> Result<Vec<UploadReceipt>> {
        let mut receipts = Vec::with_capacity(parts.len());
        for part in parts {
            receipts.push(self.upload(part).await?);
        }

        match receipts.as_slice() {
            [] => {}
            [single] => {
                self.send_message(user_id, import_instructions(), std::slice::from_ref(single))
                    .await?;
            }
            many => {
                self.send_message(user_id, import_instructions(), &[]).await?;
                self.send_message(user_id, &multi_part_notice(many.len()), &[])
                    .await?;
                for receipt in many {
                    self.send_message(user_id, "", std::slice::from_ref(receipt))
                        .await?;
                }
            }
        }

        Ok(receipts)
    }

    /// Perform exactly one send attempt and classify the response
    async fn send_once(
        &self,
        user_id: i64,
        text: &str,
        attachments: &[UploadReceipt],
    ) -> std::result::Result<SendOutcome, TransportError> {
        let user_id_param = user_id.to_string();
        let mut body = json!({ "text": text });
        if !attachments.is_empty() {
            body["attachments"] = attachments
                .iter()
                .map(|receipt| {
                    json!({
                        "type": "file",
                        "payload": { "token": receipt.upload_token }
                    })
                })
                .collect();
        }

        let response = self
            .http
            .post(format!("{}/messages", self.api_base))
            .query(&[
                ("access_token", self.token.as_str()),
                ("user_id", user_id_param.as_str()),
                ("disable_link_preview", "true"),
            ])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Ok(classify(status.as_u16(), body))
    }

    /// Tell the user the upload never went through; single attempt, errors
    /// only logged
    async fn send_failure_notice(&self, user_id: i64) {
        match self.send_once(user_id, UPLOAD_FAILED_NOTICE, &[]).await {
            Ok(SendOutcome::Delivered) => {}
            Ok(outcome) => warn!(user_id, ?outcome, "failure notice not delivered"),
            Err(e) => warn!(user_id, error = %e, "failure notice not delivered"),
        }
    }

    /// Parse a JSON response, treating non-2xx and shape mismatches as
    /// transport failures
    async fn expect_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> std::result::Result<T, TransportError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| TransportError::MalformedResponse {
            reason: format!("{operation}: {e}"),
        })
    }
}

/// Classify one send response
fn classify(status: u16, body: String) -> SendOutcome {
    if (200..300).contains(&status) {
        SendOutcome::Delivered
    } else if status == 400 && body.contains(NOT_PROCESSED_MARKER) {
        SendOutcome::NotYetProcessed { body }
    } else {
        SendOutcome::Rejected { status, body }
    }
}

/// Instructions the user needs to import the archive into TamTam
pub fn import_instructions() -> &'static str {
    "Done! To load the pack into TamTam, send the attached zip to the \
     sticker importer bot, follow its steps to name and publish the set, \
     then use any sticker once so the pack shows up in your chats."
}

/// Extra notice sent when the pack did not fit into a single archive
pub fn multi_part_notice(parts: usize) -> String {
    format!(
        "This pack has more than 50 stickers, and TamTam only accepts 50 per \
         archive. You will receive {parts} archives — feed them to the \
         importer one at a time, waiting for it to confirm each."
    )
}

/// Reply for an unknown pack name: explains and invites another try
pub fn pack_not_found_reply(name: &str) -> String {
    format!(
        "I could not find a Telegram sticker pack named '{name}'. Check the \
         name in your Telegram client (it is the last part of the pack's \
         share link) and send me another one to try again."
    )
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOT_PROCESSED_BODY: &str = r#"{"code":"attachment.not.ready","message":"errors.process.attachment.file.not.processed"}"#;

    fn fast_retry() -> SendRetryConfig {
        SendRetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            delay_step: Duration::from_millis(50),
        }
    }

    fn client_for(server: &MockServer, retry: SendRetryConfig) -> TamTamClient {
        TamTamClient::new(
            &TamTamConfig {
                access_token: "TT".to_string(),
                api_base: server.uri(),
            },
            retry,
        )
    }

    fn receipt() -> UploadReceipt {
        UploadReceipt {
            remote_file_id: "42".to_string(),
            upload_token: "tok-42".to_string(),
        }
    }

    #[tokio::test]
    async fn upload_streams_archive_and_deletes_local_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uploads"))
            .and(query_param("type", "file"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"url":"{}/upload-target"}}"#,
                server.uri()
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload-target"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"fileId":200665586,"token":"upload-tok"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("pack_0.zip");
        std::fs::write(&zip_path, b"PK\x03\x04fake").unwrap();
        let part = ArchivePart {
            path: zip_path.clone(),
            sequence_number: 0,
            member_count: 3,
        };

        let receipt = client_for(&server, fast_retry()).upload(&part).await.unwrap();

        assert_eq!(receipt.remote_file_id, "200665586");
        assert_eq!(receipt.upload_token, "upload-tok");
        assert!(!zip_path.exists(), "local archive must be deleted");
    }

    #[tokio::test]
    async fn upload_slot_failure_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uploads"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("pack_0.zip");
        std::fs::write(&zip_path, b"zip").unwrap();
        let part = ArchivePart {
            path: zip_path.clone(),
            sequence_number: 0,
            member_count: 1,
        };

        let err = client_for(&server, fast_retry()).upload(&part).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Transport(TransportError::Status { status: 503, .. })
        ));
        assert!(zip_path.exists(), "archive must survive a failed upload");
    }

    #[tokio::test]
    async fn retries_not_processed_then_succeeds_on_fifth_attempt() {
        let server = MockServer::start().await;
        // First four sends: still processing. Fifth: accepted.
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_string(NOT_PROCESSED_BODY))
            .up_to_n_times(4)
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"message":{}}"#))
            .expect(1)
            .mount(&server)
            .await;

        let retry = fast_retry();
        let client = client_for(&server, retry.clone());
        let start = Instant::now();
        client.send_message(7, "here", &[receipt()]).await.unwrap();
        let elapsed = start.elapsed();

        // Linear backoff: 50 + 100 + 150 + 200 ms of sleeping at minimum.
        assert!(
            elapsed >= Duration::from_millis(500),
            "expected >= 500ms of backoff, got {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn exhausted_retries_send_fallback_notice_and_stop() {
        let server = MockServer::start().await;
        // The attachment message never stops failing.
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_string_contains("attachments"))
            .respond_with(ResponseTemplate::new(400).set_body_string(NOT_PROCESSED_BODY))
            .expect(5)
            .mount(&server)
            .await;
        // The plain-text fallback notice goes through, exactly once.
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_string_contains("could not finish processing"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"message":{}}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry());
        let err = client
            .send_message(7, "here", &[receipt()])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::Error::Transport(TransportError::Status { status: 400, .. })
        ));
        // Mock expectations verify: exactly 5 attachment sends (no sixth)
        // plus one fallback notice.
    }

    #[tokio::test]
    async fn other_rejections_fail_fast_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(403).set_body_string(r#"{"message":"access denied"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry());
        let start = Instant::now();
        let err = client.send_message(7, "hello", &[]).await.unwrap_err();

        assert!(matches!(
            err,
            crate::error::Error::Transport(TransportError::Status { status: 403, .. })
        ));
        assert!(
            start.elapsed() < Duration::from_millis(40),
            "permanent rejection must not back off"
        );
    }

    #[tokio::test]
    async fn a_400_without_the_marker_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"message":"text too long"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry());
        let err = client.send_message(7, "hello", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Transport(TransportError::Status { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn deliver_multi_part_sends_notice_then_one_message_per_archive() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/uploads"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"{{"url":"{}/upload-target"}}"#,
                server.uri()
            )))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/upload-target"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"fileId":1,"token":"t"}"#),
            )
            .expect(2)
            .mount(&server)
            .await;
        // Instructions + multi-part notice + one message per archive.
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"message":{}}"#))
            .expect(4)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let parts: Vec<ArchivePart> = (0..2)
            .map(|i| {
                let path = dir.path().join(format!("pack_{i}.zip"));
                std::fs::write(&path, b"zip").unwrap();
                ArchivePart {
                    path,
                    sequence_number: i,
                    member_count: 50,
                }
            })
            .collect();

        let receipts = client_for(&server, fast_retry())
            .deliver(7, &parts)
            .await
            .unwrap();
        assert_eq!(receipts.len(), 2);
    }

    #[test]
    fn classify_covers_the_three_outcomes() {
        assert!(matches!(classify(200, String::new()), SendOutcome::Delivered));
        assert!(matches!(
            classify(400, NOT_PROCESSED_BODY.to_string()),
            SendOutcome::NotYetProcessed { .. }
        ));
        assert!(matches!(
            classify(400, "something else".to_string()),
            SendOutcome::Rejected { status: 400, .. }
        ));
        assert!(matches!(
            classify(500, String::new()),
            SendOutcome::Rejected { status: 500, .. }
        ));
    }

    #[test]
    fn user_facing_texts_name_the_essentials() {
        assert!(pack_not_found_reply("ghost_pack").contains("ghost_pack"));
        assert!(multi_part_notice(3).contains('3'));
        assert!(import_instructions().contains("zip"));
    }
}
