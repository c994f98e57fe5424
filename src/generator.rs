//! Answer generation from retrieved context.
//!
//! [`Generator`] assembles the prompt (numbered `Source N:` blocks
//! substituted into a system-prompt template) and sends it with the
//! question to a [`ChatModel`]. The model's text comes back unchanged,
//! paired with the same context chunks so callers can cite sources without
//! re-querying. No internal retry; retry policy belongs to the caller.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::RagError;
use crate::models::Chunk;

/// Default system prompt. `{context}` is replaced with the formatted
/// source blocks.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful expert assistant. Use the provided context to answer questions accurately and comprehensively.

Instructions:
- Base your answer strictly on the provided context
- If the answer isn't in the context, say \"I don't have enough information to answer that question\"
- Provide clear, well-structured explanations
- Include relevant details and examples when available
- Be concise but thorough

Context:
{context}
";

/// A chat-completion language model: system + user message in, text out.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<String, RagError>;
}

/// Instantiate the chat model named by the configuration.
pub fn create_chat_model(config: &GenerationConfig) -> Result<Box<dyn ChatModel>, RagError> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiChat::new(config)?)),
        "echo" => Ok(Box::new(EchoChat)),
        other => Err(RagError::Configuration(format!(
            "unknown generation provider: {}",
            other
        ))),
    }
}

// ============ OpenAI provider ============

pub struct OpenAiChat {
    model: String,
    temperature: f64,
    timeout_secs: u64,
    api_key: String,
}

impl OpenAiChat {
    pub fn new(config: &GenerationConfig) -> Result<Self, RagError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            RagError::Configuration("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            api_key,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, RagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| RagError::Generation(e.to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;

        json.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                RagError::Generation("invalid response: missing message content".to_string())
            })
    }
}

// ============ Echo provider ============

/// Offline model that answers with the question itself. Lets the full
/// pipeline run without credentials (smoke tests, CI).
pub struct EchoChat;

#[async_trait]
impl ChatModel for EchoChat {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, _system: &str, user: &str) -> Result<String, RagError> {
        Ok(format!("[echo] {}", user))
    }
}

// ============ Generator ============

pub struct Generator {
    model: Box<dyn ChatModel>,
    prompt_template: String,
}

impl Generator {
    pub fn new(model: Box<dyn ChatModel>, system_prompt: Option<String>) -> Self {
        Self {
            model,
            prompt_template: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    /// Number each chunk into a `Source N:` block.
    fn format_context(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("Source {}:\n{}", i + 1, chunk.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Generate an answer to `question` from `context`, returning the raw
    /// model text alongside the context it was given.
    pub async fn generate(
        &self,
        question: &str,
        context: Vec<Chunk>,
    ) -> Result<(String, Vec<Chunk>), RagError> {
        let formatted = Self::format_context(&context);
        let system = self.prompt_template.replace("{context}", &formatted);
        let user = format!("Question: {}", question);

        let answer = self.model.complete(&system, &user).await?;
        Ok((answer, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    struct FixedChat(String);

    #[async_trait]
    impl ChatModel for FixedChat {
        fn model_name(&self) -> &str {
            "fixed"
        }
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, RagError> {
            Ok(self.0.clone())
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatModel for FailingChat {
        fn model_name(&self) -> &str {
            "failing"
        }
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, RagError> {
            Err(RagError::Generation("model unavailable".to_string()))
        }
    }

    fn chunk(content: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            start_index: 0,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn context_blocks_are_numbered_from_one() {
        let formatted = Generator::format_context(&[chunk("first"), chunk("second")]);
        assert_eq!(formatted, "Source 1:\nfirst\n\nSource 2:\nsecond");
    }

    #[tokio::test]
    async fn generate_returns_answer_and_same_context() {
        let generator = Generator::new(Box::new(FixedChat("the answer".to_string())), None);
        let context = vec![chunk("a"), chunk("b"), chunk("c")];
        let (answer, sources) = generator.generate("What?", context.clone()).await.unwrap();
        assert_eq!(answer, "the answer");
        assert_eq!(sources, context);
    }

    #[tokio::test]
    async fn model_failure_propagates_as_generation_error() {
        let generator = Generator::new(Box::new(FailingChat), None);
        let err = generator
            .generate("What?", vec![chunk("ctx")])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
    }

    #[tokio::test]
    async fn custom_template_receives_the_context() {
        struct CapturingChat;

        #[async_trait]
        impl ChatModel for CapturingChat {
            fn model_name(&self) -> &str {
                "capturing"
            }
            async fn complete(&self, system: &str, user: &str) -> Result<String, RagError> {
                Ok(format!("{}|{}", system, user))
            }
        }

        let generator = Generator::new(
            Box::new(CapturingChat),
            Some("CTX>{context}<CTX".to_string()),
        );
        let (answer, _) = generator
            .generate("why?", vec![chunk("evidence")])
            .await
            .unwrap();
        assert!(answer.starts_with("CTX>Source 1:\nevidence<CTX"));
        assert!(answer.ends_with("Question: why?"));
    }
}
