use crate::llm::client::{GenerationParams, LLMClient, TextStream};
use crate::types::{AppError, Result};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use futures::StreamExt;

pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
    params: GenerationParams,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String, model: String, params: GenerationParams) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Self {
            client: Client::with_config(config),
            model,
            params,
        }
    }

    fn request(&self, system: Option<&str>, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage::from(system.to_string()),
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessage::from(prompt.to_string()),
        ));

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.params.temperature)
            .max_completion_tokens(self.params.max_tokens)
            .build()
            .map_err(|e| AppError::Generation(format!("Failed to build request: {}", e)))
    }

    async fn complete(&self, request: CreateChatCompletionRequest) -> Result<String> {
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::Generation(format!("OpenAI API error: {}", e)))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::Generation("No response from OpenAI".to_string()))
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(self.request(None, prompt)?).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.complete(self.request(Some(system), prompt)?).await
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream> {
        let request = self.request(Some(system), prompt)?;

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| AppError::Generation(format!("OpenAI API error: {}", e)))?;

        let result_stream = async_stream::stream! {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(response) => {
                        for choice in response.choices {
                            if let Some(content) = choice.delta.content {
                                yield Ok(content);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AppError::Generation(format!("Stream error: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(result_stream)))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
