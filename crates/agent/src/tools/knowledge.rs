use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use helpline_core::Session;
use helpline_store::{Embedder, VectorIndex};

use crate::oracle::CapabilitySpec;
use crate::tools::{missing_argument, str_argument, Tool, ToolOutcome};

/// Policy and FAQ answers from the general-knowledge index.
pub struct GetPolicyInfo {
    general_index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
}

impl GetPolicyInfo {
    pub fn new(general_index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self { general_index, embedder }
    }
}

#[async_trait]
impl Tool for GetPolicyInfo {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: "get_policy_info",
            description: "Answer general questions about store policies: returns, shipping, \
                          warranties, payment.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The policy question in the user's words"
                    }
                },
                "required": ["question"]
            }),
        }
    }

    async fn execute(&self, arguments: &Value, _session: &Session) -> ToolOutcome {
        let Some(question) = str_argument(arguments, "question") else {
            return missing_argument("question");
        };
        if self.general_index.is_empty() {
            return ToolOutcome::text("Policy information unavailable.");
        }

        let query = match self.embedder.embed(question).await {
            Ok(vector) => vector,
            Err(error) => {
                tracing::warn!(error = %error, "embedding request failed");
                return ToolOutcome::text("Policy information unavailable.");
            }
        };

        let hits = self.general_index.search(&query, 2);
        if hits.is_empty() {
            return ToolOutcome::text("Policy information unavailable.");
        }
        let passages: Vec<&str> = hits.iter().map(|hit| hit.document()).collect();
        ToolOutcome::text(passages.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use helpline_core::{CustomerId, Session};
    use helpline_store::{Embedder, VectorIndex};

    use super::GetPolicyInfo;
    use crate::tools::Tool;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn session() -> Session {
        Session::new(CustomerId("C0010".to_string()))
    }

    #[tokio::test]
    async fn answers_with_top_two_passages() {
        let records = serde_json::from_value(json!([
            {"document": "Returns are accepted within 30 days of delivery.",
             "embedding": [0.0, 1.0]},
            {"document": "Refunds are issued to the original payment method.",
             "embedding": [0.2, 0.8]},
            {"document": "Standard shipping takes 3-5 business days.",
             "embedding": [1.0, 0.0]}
        ]))
        .expect("index fixture");
        let tool =
            GetPolicyInfo::new(Arc::new(VectorIndex::from_records(records)), Arc::new(FixedEmbedder(vec![0.0, 1.0])));

        let outcome = tool.execute(&json!({"question": "can I return this?"}), &session()).await;
        assert_eq!(
            outcome.text,
            "Returns are accepted within 30 days of delivery.\n\
             Refunds are issued to the original payment method."
        );
    }

    #[tokio::test]
    async fn empty_index_answers_unavailable() {
        let tool = GetPolicyInfo::new(
            Arc::new(VectorIndex::empty()),
            Arc::new(FixedEmbedder(vec![0.0, 1.0])),
        );
        let outcome = tool.execute(&json!({"question": "can I return this?"}), &session()).await;
        assert_eq!(outcome.text, "Policy information unavailable.");
    }
}
