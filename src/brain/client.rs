// Brain client - HTTP communication with inference backend

use super::wire::{MessageRequest, MessageResponse, ToolSchema, from_response};
use super::{BrainConfig, BrainError, BrainInitError, ChatModel, ChatResponse, Message, RequestBuilder};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Brain client for LLM inference
#[derive(Clone)]
pub struct Brain {
    config: BrainConfig,
    client: Client,
}

impl Brain {
    /// Create a new Brain instance
    pub fn new(config: BrainConfig) -> Result<Self, BrainInitError> {
        info!(
            endpoint = %config.endpoint,
            model = %config.default_model,
            timeout_secs = config.request_timeout_secs,
            max_retries = config.max_retries,
            "initializing brain"
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(BrainInitError::ClientError)?;

        Ok(Self { config, client })
    }

    /// Perform inference with retry and exponential backoff
    pub async fn infer(&self, request: MessageRequest) -> Result<MessageResponse, BrainError> {
        info!(
            model = %request.model,
            messages_count = request.messages.len(),
            has_system = request.system.is_some(),
            has_tools = request.tools.is_some(),
            max_tokens = request.max_tokens,
            "starting inference"
        );

        let start = Instant::now();
        let mut retries = 0;
        let max_retries = self.config.max_retries;
        let base_delay = Duration::from_millis(self.config.base_retry_delay_ms);

        loop {
            debug!(retry = retries, "sending request to inference backend");
            match self.send_request(&request).await {
                Ok(response) => {
                    let (input_tokens, output_tokens) = response
                        .usage
                        .as_ref()
                        .map(|u| (u.input_tokens, u.output_tokens))
                        .unwrap_or((0, 0));

                    info!(
                        model = %response.model,
                        input_tokens = input_tokens,
                        output_tokens = output_tokens,
                        latency_ms = start.elapsed().as_millis() as u64,
                        retries = retries,
                        content_blocks = response.content.len(),
                        stop_reason = ?response.stop_reason,
                        "inference completed"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_permanent() => {
                    error!(error = %e, "inference failed with non-retryable error");
                    return Err(e);
                }
                Err(e) => {
                    retries += 1;
                    if retries > max_retries {
                        error!(
                            retries = retries,
                            total_latency_ms = start.elapsed().as_millis() as u64,
                            error = %e,
                            "inference failed: exhausted retries"
                        );
                        return Err(BrainError::Exhausted {
                            retries,
                            last_error: e.to_string(),
                        });
                    }

                    let delay = backoff_delay(base_delay, retries);

                    warn!(
                        retry = retries,
                        max_retries = max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "inference failed, retrying"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn send_request(&self, request: &MessageRequest) -> Result<MessageResponse, BrainError> {
        let url = format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "received HTTP response");

        if status.is_success() {
            let body = response.text().await?;
            let response: MessageResponse = serde_json::from_str(&body)?;
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 => BrainError::AuthenticationFailed(body),
            400 => BrainError::InvalidRequest(body),
            402 => BrainError::InsufficientBalance(body),
            _ if status.is_server_error() => BrainError::ModelError(body),
            _ => BrainError::ModelError(format!("HTTP {}: {}", status, body)),
        })
    }
}

#[async_trait]
impl ChatModel for Brain {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ChatResponse, BrainError> {
        let request = RequestBuilder::new(self.config.default_model.clone())
            .conversation(messages)
            .tools(tools.to_vec())
            .max_tokens(self.config.max_output_tokens)
            .temperature(self.config.temperature)
            .top_p(self.config.top_p)
            .top_k(self.config.top_k)
            .build()
            .map_err(|e| BrainError::InvalidRequest(e.to_string()))?;

        let response = self.infer(request).await?;
        Ok(from_response(&response))
    }
}

/// Longest pause between two attempts
const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Exponential backoff for the `retry`-th retry (1-based), capped
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let multiplier = 2u64.saturating_pow(retry.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(multiplier).min(MAX_RETRY_DELAY_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 4), Duration::from_millis(4000));
        assert_eq!(backoff_delay(base, 10), Duration::from_millis(MAX_RETRY_DELAY_MS));
    }

    #[test]
    fn test_backoff_survives_huge_retry_counts() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 200), Duration::from_millis(MAX_RETRY_DELAY_MS));
        assert_eq!(backoff_delay(base, u32::MAX), Duration::from_millis(MAX_RETRY_DELAY_MS));
        assert_eq!(backoff_delay(Duration::ZERO, 5), Duration::ZERO);
    }
}
