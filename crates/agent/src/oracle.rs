use async_trait::async_trait;
use helpline_core::Turn;
use serde_json::Value;

/// What the router advertises about one tool: its name, a
/// natural-language description of when to use it, and a JSON Schema for
/// its arguments.
#[derive(Clone, Debug)]
pub struct CapabilitySpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

/// The oracle's verdict for one user turn: either invoke exactly one
/// tool, or answer conversationally without one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OracleReply {
    Say(String),
    Invoke(ToolCall),
}

/// Intent classification and response phrasing. Implemented over an
/// OpenAI-compatible endpoint in production (`llm::HttpOracle`) and by
/// scripted fakes in tests.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Picks at most one capability for the latest user turn, given the
    /// full turn history for pronoun resolution.
    async fn plan(
        &self,
        history: &[Turn],
        capabilities: &[CapabilitySpec],
    ) -> anyhow::Result<OracleReply>;

    /// Rephrases a tool's raw result into a short, speakable reply.
    async fn narrate(
        &self,
        history: &[Turn],
        call: &ToolCall,
        tool_text: &str,
    ) -> anyhow::Result<String>;
}
