//! JSON shapes exchanged with the chat server and their conversion into
//! domain types. Ids arrive as strings or numbers depending on the endpoint,
//! timestamps as RFC 3339 strings or epoch milliseconds.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{
    conversation::{Conversation, ConversationId, ConversationType, LastMessageSummary},
    errors::SourceError,
    message::{Attachment, DeliveryStatus, Message, MessageId},
    message_sync::MessagePage,
    session::AuthToken,
    user::{User, UserId},
};
use crate::usecases::guided_auth::VerifiedSession;

#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesEnvelope {
    #[serde(default)]
    pub data: Vec<WireMessage>,
    pub pagination: Option<WirePagination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePagination {
    pub page: Option<u32>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    #[serde(rename = "_id", default, deserialize_with = "optional_id_string")]
    pub mongo_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "id_string")]
    pub sender_id: String,
    #[serde(default)]
    pub text: String,
    pub created_at: Value,
    pub status: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    #[serde(default, deserialize_with = "optional_id_string")]
    pub id: Option<String>,
    #[serde(rename = "_id", default, deserialize_with = "optional_id_string")]
    pub mongo_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireLastMessage {
    #[serde(default)]
    pub text: String,
    pub created_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireConversation {
    #[serde(rename = "_id", default, deserialize_with = "optional_id_string")]
    pub mongo_id: Option<String>,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub participants: Vec<WireUser>,
    pub last_message: Option<WireLastMessage>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OtpRequestBody {
    pub phone: u64,
}

#[derive(Debug, Serialize)]
pub struct OtpVerifyBody<'a> {
    pub phone: u64,
    pub otp: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub token: Option<String>,
    #[serde(default, deserialize_with = "optional_id_string")]
    pub user_id: Option<String>,
    pub user: Option<WireUser>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody<'a> {
    pub receiver_id: &'a str,
    pub text: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub attachments: [Value; 0],
}

impl<'a> SendMessageBody<'a> {
    pub fn text(receiver_id: &'a str, text: &'a str) -> Self {
        Self {
            receiver_id,
            text,
            kind: "text",
            attachments: [],
        }
    }
}

/// Body of a failed response; only the message is of interest.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: Option<String>,
}

impl TryFrom<WireMessage> for Message {
    type Error = SourceError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let id = wire
            .mongo_id
            .or(wire.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SourceError::InvalidData("message without id".to_owned()))?;
        let created_at_ms = timestamp_ms(&wire.created_at).ok_or_else(|| {
            SourceError::InvalidData(format!("message {id} has an unreadable createdAt"))
        })?;

        Ok(Message {
            id: MessageId(id),
            sender_id: UserId(wire.sender_id),
            text: wire.text,
            created_at_ms,
            status: wire
                .status
                .as_deref()
                .map(DeliveryStatus::from_label)
                .unwrap_or_default(),
            attachments: wire.attachments.iter().filter_map(attachment).collect(),
        })
    }
}

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        User {
            id: UserId(wire.id.or(wire.mongo_id).unwrap_or_default()),
            phone: wire.phone,
            name: wire.name,
        }
    }
}

impl From<WireConversation> for Conversation {
    fn from(wire: WireConversation) -> Self {
        Conversation {
            id: wire.mongo_id.or(wire.id).map(ConversationId),
            participants: wire.participants.into_iter().map(User::from).collect(),
            last_message: wire.last_message.map(|last| LastMessageSummary {
                text: last.text,
                created_at_ms: last.created_at.as_ref().and_then(timestamp_ms),
            }),
            kind: wire
                .kind
                .as_deref()
                .map(ConversationType::from_label)
                .unwrap_or(ConversationType::Direct),
        }
    }
}

impl MessagesEnvelope {
    pub fn into_page(self, requested_page: u32) -> Result<MessagePage, SourceError> {
        let messages = self
            .data
            .into_iter()
            .map(Message::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let (page, has_more) = match self.pagination {
            Some(pagination) => (
                pagination.page.unwrap_or(requested_page),
                pagination.has_more,
            ),
            None => (requested_page, false),
        };

        Ok(MessagePage {
            messages,
            page,
            has_more,
        })
    }
}

impl VerifyResponse {
    pub fn into_session(self) -> Result<VerifiedSession, SourceError> {
        let token = self
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| SourceError::InvalidData("verify response has no token".to_owned()))?;

        Ok(VerifiedSession {
            token: AuthToken::new(token),
            user_id: self
                .user_id
                .or_else(|| self.user.and_then(|user| user.id.or(user.mongo_id)))
                .filter(|id| !id.is_empty())
                .map(UserId),
        })
    }
}

fn timestamp_ms(value: &Value) -> Option<i64> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|parsed| parsed.timestamp_millis()),
        Value::Number(number) => number.as_i64(),
        _ => None,
    }
}

fn attachment(value: &Value) -> Option<Attachment> {
    match value {
        Value::String(url) if !url.is_empty() => Some(Attachment {
            url: url.clone(),
            kind: None,
        }),
        Value::Object(fields) => {
            let url = fields.get("url")?.as_str()?.to_owned();
            let kind = fields
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_owned);
            Some(Attachment { url, kind })
        }
        _ => None,
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn optional_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_id_string(deserializer)?.unwrap_or_default())
}
