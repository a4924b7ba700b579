//! Adapter for the chim OpenAI-compatible completion proxy.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::header;
use reqwest::Client;
use tracing::Instrument;

use super::stream::relay;
use super::types::CompletionRequest;
use crate::chat::{Chat, ChatRequest, EventSender, ModelType};
use crate::config::{Config, ConfigError, ProviderConfig};
use crate::error::{Error, Result};

/// Models chim serves: abstract id, vendor model name, token budget.
const MODELS: [(ModelType, &str, usize); 3] = [
    (ModelType::Gpt35Turbo16k, "gpt-3.5-turbo-16k", 15000),
    (ModelType::Gpt4, "gpt-4", 5000),
    (ModelType::Gpt35Turbo, "gpt-3.5-turbo", 4000),
];

/// Vendor model name for `model`, if chim serves it.
pub fn model_name(model: ModelType) -> Option<&'static str> {
    MODELS
        .iter()
        .find(|(m, _, _)| *m == model)
        .map(|(_, name, _)| *name)
}

/// Chat adapter for chim.
///
/// Holds one reqwest client for its whole lifetime; every request is
/// otherwise independent.
#[derive(Debug, Clone)]
pub struct Chim {
    client: Client,
    config: ProviderConfig,
}

impl Chim {
    /// Build an adapter from explicit provider settings.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));

        if let Some(proxy) = &config.proxy {
            tracing::debug!(proxy = %proxy, "Routing provider traffic through proxy");
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| {
                ConfigError::Validation(format!("provider.proxy '{}' is invalid: {}", proxy, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self { client, config })
    }

    /// Build an adapter with default settings and the key from `CHIM_KEY`.
    pub fn from_env() -> Result<Self> {
        let (config, key_source) = Config::from_env()?;
        tracing::debug!(key_source = %key_source, "Resolved chim API key");
        Self::new(config.provider)
    }

    /// The settings this adapter was built with.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Send the request and hand back the response body as a byte stream.
    async fn open_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>> {
        let model = model_name(request.model).ok_or_else(|| Error::UnsupportedModel {
            model: request.model.to_string(),
        })?;

        let body = CompletionRequest::streaming(&request.messages, model);

        let mut upstream_request = self
            .client
            .post(self.config.completions_url())
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);

        if let Some(api_key) = &self.config.api_key {
            upstream_request = upstream_request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        let upstream_response = upstream_request.send().await?;

        let status = upstream_response.status();
        if !status.is_success() {
            let error_body = upstream_response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status,
                body: error_body,
            });
        }

        Ok(upstream_response.bytes_stream())
    }
}

#[async_trait]
impl Chat for Chim {
    fn support(&self, model: ModelType) -> usize {
        MODELS
            .iter()
            .find(|(m, _, _)| *m == model)
            .map_or(0, |(_, _, budget)| *budget)
    }

    async fn ask_stream(&self, request: &ChatRequest, events: EventSender) {
        let span = tracing::info_span!(
            "chim_request",
            request_id = %uuid::Uuid::new_v4(),
            model = %request.model
        );

        async move {
            tracing::info!(
                messages = request.messages.len(),
                "Sending chat completion request"
            );

            match self.open_stream(request).await {
                Ok(body) => relay(body, events).await,
                Err(e) => {
                    tracing::error!(error = %e, "Chat completion request failed");
                    events.error(e.to_string());
                }
            }
        }
        .instrument(span)
        .await
    }
}
