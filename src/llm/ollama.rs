use crate::llm::client::{GenerationParams, LLMClient, TextStream};
use crate::types::{AppError, Result};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::{
    Ollama,
    generation::chat::{ChatMessage, request::ChatMessageRequest},
    models::ModelOptions,
};

pub struct OllamaClient {
    client: Ollama,
    model: String,
    params: GenerationParams,
}

/// Split `scheme://host:port` into the pieces `Ollama::new` expects.
pub(crate) fn split_base_url(base_url: &str) -> (String, u16) {
    const DEFAULT_PORT: u16 = 11434;

    let (scheme, rest) = base_url
        .split_once("://")
        .unwrap_or(("http", base_url));
    let rest = rest.trim_end_matches('/');
    match rest.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (format!("{}://{}", scheme, host), port),
            Err(_) => (format!("{}://{}", scheme, rest), DEFAULT_PORT),
        },
        None if rest.is_empty() => ("http://localhost".to_string(), DEFAULT_PORT),
        None => (format!("{}://{}", scheme, rest), DEFAULT_PORT),
    }
}

impl OllamaClient {
    pub async fn new(base_url: String, model: String, params: GenerationParams) -> Result<Self> {
        let (host, port) = split_base_url(&base_url);
        let client = Ollama::new(host, port);

        Ok(Self {
            client,
            model,
            params,
        })
    }

    fn request(&self, system: Option<&str>, prompt: &str) -> ChatMessageRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system.to_string()));
        }
        messages.push(ChatMessage::user(prompt.to_string()));

        let options = ModelOptions::default()
            .temperature(self.params.temperature)
            .num_predict(self.params.max_tokens as i32);

        ChatMessageRequest::new(self.model.clone(), messages).options(options)
    }

    async fn send(&self, request: ChatMessageRequest) -> Result<String> {
        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::Generation(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.send(self.request(None, prompt)).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.send(self.request(Some(system), prompt)).await
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream> {
        let request = self.request(Some(system), prompt);

        let mut stream_response = self
            .client
            .send_chat_messages_stream(request)
            .await
            .map_err(|e| AppError::Generation(format!("Ollama stream error: {}", e)))?;

        let output_stream = stream! {
            while let Some(chunk_result) = stream_response.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        let content = chunk.message.content;
                        if !content.is_empty() {
                            yield Ok(content);
                        }
                    }
                    Err(_) => {
                        yield Err(AppError::Generation("Stream chunk error".to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(output_stream)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::split_base_url;

    #[test]
    fn test_url_parsing_full() {
        assert_eq!(
            split_base_url("http://localhost:11434"),
            ("http://localhost".to_string(), 11434)
        );
    }

    #[test]
    fn test_url_parsing_no_port() {
        assert_eq!(
            split_base_url("https://ollama.internal/"),
            ("https://ollama.internal".to_string(), 11434)
        );
    }

    #[test]
    fn test_url_parsing_custom_port() {
        assert_eq!(
            split_base_url("http://192.168.1.100:8080"),
            ("http://192.168.1.100".to_string(), 8080)
        );
    }

    #[test]
    fn test_url_parsing_without_scheme() {
        assert_eq!(
            split_base_url("localhost:9999"),
            ("http://localhost".to_string(), 9999)
        );
    }
}
