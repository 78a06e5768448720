//! signal-cli-rest-api client.
//!
//! Receives by long polling `/v1/receive`, sends through `/v2/send` and
//! acknowledges handled messages with read receipts.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::bridge::sources::ChatPlatform;
use crate::common::error::{ApiError, ApiResult};
use crate::common::messages::{Attachment, InboundChatMessage, Mention};
use crate::config::SignalConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Slack on top of the long-poll window before the HTTP request gives up.
const RECEIVE_GRACE: Duration = Duration::from_secs(10);

const GROUP_PREFIX: &str = "group.";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReceivedItem {
    envelope: Envelope,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Envelope {
    source_number: Option<String>,
    source_name: Option<String>,
    source_uuid: Option<String>,
    data_message: Option<DataMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DataMessage {
    timestamp: i64,
    message: Option<String>,
    group_info: Option<GroupInfo>,
    attachments: Option<Vec<RawAttachment>>,
    sticker: Option<Value>,
    mentions: Option<Vec<RawMention>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GroupInfo {
    group_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawAttachment {
    content_type: Option<String>,
    filename: Option<String>,
    size: Option<u64>,
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawMention {
    name: Option<String>,
    number: Option<String>,
    uuid: Option<String>,
    start: usize,
    length: usize,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a str,
    number: &'a str,
    recipients: [&'a str; 1],
}

#[derive(Serialize)]
struct ReceiptRequest<'a> {
    receipt_type: &'a str,
    recipient: &'a str,
    timestamp: i64,
}

/// REST client bound to one Signal account and optionally one group.
pub struct SignalClient {
    http: reqwest::Client,
    api_url: String,
    phone_number: String,
    /// Group id as configured, used as the send recipient.
    group_id: Option<String>,
    /// Group id as it appears on incoming messages.
    internal_group_id: Option<String>,
}

impl SignalClient {
    pub fn new(config: &SignalConfig) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|source| ApiError::Request {
                endpoint: "client".to_string(),
                source,
            })?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            phone_number: config.phone_number.clone(),
            group_id: config.group_id.clone(),
            internal_group_id: config.group_id.as_deref().map(internal_group_id),
        })
    }

    /// Check that the REST API answers.
    pub async fn health_check(&self) -> bool {
        let result = self
            .http
            .get(format!("{}/v1/about", self.api_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "Signal API health check failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Signal API health check failed");
                false
            }
        }
    }

    async fn send(&self, text: &str, recipient: &str) -> ApiResult<()> {
        const ENDPOINT: &str = "/v2/send";

        let response = self
            .http
            .post(format!("{}{}", self.api_url, ENDPOINT))
            .timeout(SEND_TIMEOUT)
            .json(&SendRequest {
                message: text,
                number: &self.phone_number,
                recipients: [recipient],
            })
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: ENDPOINT.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: ENDPOINT.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.json::<Value>().await.map_err(|e| ApiError::Malformed {
            endpoint: ENDPOINT.to_string(),
            message: e.to_string(),
        })?;

        check_send_response(&body).map_err(|reason| ApiError::Rejected {
            endpoint: ENDPOINT.to_string(),
            reason,
        })?;

        debug!(recipient, "Sent Signal message");
        Ok(())
    }
}

/// A `group.<base64>` id decodes to the id carried by incoming messages.
/// Anything else is used verbatim.
fn internal_group_id(configured: &str) -> String {
    configured
        .strip_prefix(GROUP_PREFIX)
        .and_then(|encoded| STANDARD.decode(encoded).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| configured.to_string())
}

/// `/v2/send` reports delivery with a `timestamp` and failure with `error`.
fn check_send_response(body: &Value) -> Result<(), String> {
    if body.get("timestamp").is_some() {
        return Ok(());
    }
    match body.get("error") {
        Some(error) => Err(error.as_str().unwrap_or("unknown error").to_string()),
        None => Err("response carried no timestamp".to_string()),
    }
}

/// Turn one received envelope into a message, or `None` if it should be ignored.
fn parse_envelope(envelope: Envelope, own_number: &str) -> Option<InboundChatMessage> {
    let data = envelope.data_message?;

    let text = data.message.unwrap_or_default();
    let attachments: Vec<Attachment> = data
        .attachments
        .unwrap_or_default()
        .into_iter()
        .map(|raw| Attachment {
            content_type: raw
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            filename: raw.filename,
            size: raw.size,
            id: raw.id,
        })
        .collect();
    let has_sticker = data.sticker.is_some();

    if text.is_empty() && attachments.is_empty() && !has_sticker {
        return None;
    }

    if envelope.source_number.as_deref() == Some(own_number) {
        return None;
    }

    let sender = envelope
        .source_name
        .filter(|name| !name.is_empty())
        .or_else(|| envelope.source_number.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let mentions = data
        .mentions
        .unwrap_or_default()
        .into_iter()
        .map(|raw| Mention {
            start: raw.start,
            length: raw.length,
            name: raw
                .name
                .or(raw.number)
                .unwrap_or_else(|| "Unknown".to_string()),
            uuid: raw.uuid,
        })
        .collect();

    let group_id = data.group_info.and_then(|info| info.group_id);

    Some(InboundChatMessage {
        sender,
        sender_id: envelope.source_uuid,
        text,
        timestamp: data.timestamp,
        is_group: group_id.is_some(),
        group_id,
        attachments,
        has_sticker,
        mentions,
    })
}

fn parse_received(body: Value, own_number: &str) -> Vec<InboundChatMessage> {
    let items = match body {
        Value::Array(items) => items,
        other => {
            debug!(body = %other, "Unexpected receive payload");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<ReceivedItem>(item) {
            Ok(received) => parse_envelope(received.envelope, own_number),
            Err(e) => {
                debug!(error = %e, "Skipping malformed envelope");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ChatPlatform for SignalClient {
    async fn poll_messages(&self, timeout: Duration) -> ApiResult<Vec<InboundChatMessage>> {
        let endpoint = format!("/v1/receive/{}", self.phone_number);
        let seconds = timeout.as_secs().max(1);

        let response = self
            .http
            .get(format!("{}{}?timeout={}", self.api_url, endpoint, seconds))
            .timeout(Duration::from_secs(seconds) + RECEIVE_GRACE)
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response.json::<Value>().await.map_err(|e| ApiError::Malformed {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;

        Ok(parse_received(body, &self.phone_number))
    }

    async fn send_group_message(&self, text: &str) -> ApiResult<()> {
        let group_id = self.group_id.as_deref().ok_or_else(|| ApiError::NotConfigured {
            what: "signal.group-id".to_string(),
        })?;
        self.send(text, group_id).await
    }

    async fn send_direct_message(&self, text: &str, recipient: &str) -> ApiResult<()> {
        self.send(text, recipient).await
    }

    fn is_our_group(&self, group_id: Option<&str>) -> bool {
        match (group_id, self.internal_group_id.as_deref()) {
            (Some(incoming), Some(ours)) => incoming == ours,
            _ => false,
        }
    }

    async fn send_read_receipt(&self, recipient: &str, timestamp: i64) -> ApiResult<()> {
        let endpoint = format!("/v1/receipts/{}", self.phone_number);

        let response = self
            .http
            .post(format!("{}{}", self.api_url, endpoint))
            .timeout(RECEIPT_TIMEOUT)
            .json(&ReceiptRequest {
                receipt_type: "read",
                recipient,
                timestamp,
            })
            .send()
            .await
            .map_err(|source| ApiError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        if response.status() != reqwest::StatusCode::NO_CONTENT {
            return Err(ApiError::Status {
                endpoint,
                status: response.status().as_u16(),
            });
        }

        debug!(recipient, "Sent read receipt");
        Ok(())
    }
}
