//! HTTP adapter for the chat server. Every source trait the use cases depend
//! on is implemented here on top of one `reqwest` client; calls block on a
//! shared tokio runtime so callers stay synchronous.

pub mod http;
pub mod wire;

use std::{sync::Arc, time::Duration};

use reqwest::{Client, RequestBuilder, Url};
use tokio::runtime::Runtime;

use crate::{
    domain::{
        conversation::Conversation,
        errors::SourceError,
        message::Message,
        message_sync::MessagePage,
        session::AuthToken,
        user::{User, UserId},
    },
    infra::{config::ApiConfig, error::AppError},
    usecases::{
        guided_auth::{OtpAuthClient, VerifiedSession},
        list_conversations::ConversationsSource,
        load_messages::MessagesSource,
        search_users::UserSearchSource,
        send_message::MessageSender,
    },
};
use wire::{
    DataEnvelope, MessagesEnvelope, OtpRequestBody, OtpVerifyBody, SendMessageBody,
    VerifyResponse, WireConversation, WireMessage, WireUser,
};

pub struct ApiAdapter {
    runtime: Arc<Runtime>,
    client: Client,
    base_url: Url,
    token: Option<AuthToken>,
}

impl std::fmt::Debug for ApiAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiAdapter")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl ApiAdapter {
    pub fn new(config: &ApiConfig, runtime: Arc<Runtime>) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|error| AppError::ApiClientInit(format!("invalid base url: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ApiClientInit(format!(
                "base url {base_url} cannot carry a path"
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(concat!("convoo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| AppError::ApiClientInit(error.to_string()))?;

        Ok(Self {
            runtime,
            client,
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: AuthToken) -> Self {
        self.token = Some(token);
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::InvalidData("base url cannot carry a path".to_owned()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, SourceError> {
        let token = self.token.as_ref().ok_or(SourceError::MissingToken)?;
        Ok(request.bearer_auth(token.expose()))
    }
}

impl MessagesSource for ApiAdapter {
    fn fetch_page(
        &self,
        participant_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage, SourceError> {
        let url = self.endpoint(&["user", "conversation", participant_id.as_str()])?;
        let request = self.authorized(
            self.client
                .get(url)
                .query(&[("page", page), ("limit", limit)]),
        )?;

        let envelope: MessagesEnvelope = self.runtime.block_on(http::fetch_json(request))?;
        envelope.into_page(page)
    }
}

impl MessageSender for ApiAdapter {
    fn send_text(&self, receiver_id: &UserId, text: &str) -> Result<Message, SourceError> {
        let url = self.endpoint(&["user", "messages", "first"])?;
        let request = self.authorized(
            self.client
                .post(url)
                .json(&SendMessageBody::text(receiver_id.as_str(), text)),
        )?;

        let envelope: DataEnvelope<WireMessage> =
            self.runtime.block_on(http::fetch_json(request))?;
        let wire = envelope
            .data
            .ok_or_else(|| SourceError::InvalidData("send response has no data".to_owned()))?;
        Message::try_from(wire)
    }
}

impl ConversationsSource for ApiAdapter {
    fn list_conversations(&self) -> Result<Vec<Conversation>, SourceError> {
        let url = self.endpoint(&["user", "conversations"])?;
        let request = self.authorized(self.client.get(url))?;

        let envelope: DataEnvelope<Vec<WireConversation>> =
            self.runtime.block_on(http::fetch_json(request))?;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Conversation::from)
            .collect())
    }
}

impl UserSearchSource for ApiAdapter {
    fn search_by_phone(&self, digits: &str) -> Result<Vec<User>, SourceError> {
        let url = self.endpoint(&["user", "search"])?;
        let request = self.authorized(self.client.get(url).query(&[("phone", digits)]))?;

        let envelope: DataEnvelope<Vec<WireUser>> =
            self.runtime.block_on(http::fetch_json(request))?;
        Ok(envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(User::from)
            .collect())
    }
}

impl OtpAuthClient for ApiAdapter {
    fn request_otp(&self, phone: u64) -> Result<(), SourceError> {
        let url = self.endpoint(&["user", "log-in"])?;
        let request = self.client.post(url).json(&OtpRequestBody { phone });

        self.runtime.block_on(http::fetch_empty(request))
    }

    fn verify_otp(&self, phone: u64, otp: &str) -> Result<VerifiedSession, SourceError> {
        let url = self.endpoint(&["user", "verify"])?;
        let request = self.client.post(url).json(&OtpVerifyBody { phone, otp });

        let response: VerifyResponse = self.runtime.block_on(http::fetch_json(request))?;
        response.into_session()
    }
}

/// Runtime shared by the adapter and the poll timers.
pub fn build_runtime() -> Result<Arc<Runtime>, AppError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("convoo-io")
        .enable_all()
        .build()
        .map(Arc::new)
        .map_err(|error| AppError::ApiClientInit(format!("failed to start runtime: {error}")))
}

/// Returns the api module name for smoke checks.
pub fn module_name() -> &'static str {
    "api"
}
