//! LLM client and tool executor (spec.md §6, §4.4).

use crate::error::TradingResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub tools: Vec<ToolDeclaration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: String,
    pub tool_calls: Vec<ToolCall>,
}

/// `Complete(request) -> response` (spec.md §6).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> TradingResult<CompletionResponse>;
}

/// `Execute(name, arguments) -> raw JSON | error` (spec.md §6).
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, arguments: serde_json::Value) -> TradingResult<serde_json::Value>;
}

/// Always returns no tool calls; used when tool-calling is disabled or in
/// tests that need a deterministic LLM stand-in.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    pub fixed_message: String,
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> TradingResult<CompletionResponse> {
        tracing::debug!(messages = request.messages.len(), "mock LLM completion");
        Ok(CompletionResponse {
            message: self.fixed_message.clone(),
            tool_calls: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockToolExecutor;

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn execute(&self, name: &str, arguments: serde_json::Value) -> TradingResult<serde_json::Value> {
        tracing::debug!(tool = name, %arguments, "mock tool execution");
        Ok(serde_json::json!({ "tool": name, "ok": true }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_llm_returns_no_tool_calls() {
        let client = MockLlmClient::default();
        let response = client
            .complete(CompletionRequest {
                messages: vec![],
                model: "test".to_string(),
                tools: vec![],
            })
            .await
            .unwrap();
        assert!(response.tool_calls.is_empty());
    }
}
