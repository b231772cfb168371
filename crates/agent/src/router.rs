use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use helpline_core::{Session, Turn};

use crate::oracle::{Oracle, OracleReply};
use crate::tools::{ToolPayload, ToolRegistry};

const APOLOGY: &str = "I'm sorry, something went wrong on my end. Could you say that again?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    None,
    OrderList,
    ProductList,
}

/// The normalized result of one turn: speakable text plus the tagged
/// structured items a UI can render alongside it.
#[derive(Clone, Debug, Serialize)]
pub struct Envelope {
    pub text: String,
    pub kind: EnvelopeKind,
    pub items: Vec<Value>,
}

impl Envelope {
    fn speech(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: EnvelopeKind::None, items: Vec::new() }
    }

    fn from_payload(text: String, payload: ToolPayload) -> Self {
        match payload {
            ToolPayload::None => Self { text, kind: EnvelopeKind::None, items: Vec::new() },
            ToolPayload::Orders(orders) => Self {
                text,
                kind: EnvelopeKind::OrderList,
                items: to_items(&orders),
            },
            ToolPayload::Products(products) => Self {
                text,
                kind: EnvelopeKind::ProductList,
                items: to_items(&products),
            },
        }
    }
}

fn to_items<T: Serialize>(records: &[T]) -> Vec<Value> {
    records.iter().filter_map(|record| serde_json::to_value(record).ok()).collect()
}

/// Plan/execute/narrate loop for one conversation turn. The router trusts
/// the oracle's single tool choice, executes it, and always returns a
/// well-formed envelope; oracle and transport failures surface as an
/// apology, never as an error.
pub struct ToolRouter {
    oracle: Arc<dyn Oracle>,
    registry: ToolRegistry,
}

impl ToolRouter {
    pub fn new(oracle: Arc<dyn Oracle>, registry: ToolRegistry) -> Self {
        Self { oracle, registry }
    }

    pub fn capability_count(&self) -> usize {
        self.registry.len()
    }

    pub async fn process_turn(&self, session: &mut Session, user_text: &str) -> Envelope {
        session.record(Turn::user(user_text));
        let capabilities = self.registry.capabilities();

        let reply = match self.oracle.plan(session.history(), &capabilities).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(error = %error, "oracle failed to classify turn");
                return self.apologize(session);
            }
        };

        match reply {
            OracleReply::Say(text) => {
                session.record(Turn::agent(text.clone()));
                Envelope::speech(text)
            }
            OracleReply::Invoke(call) => {
                let Some(tool) = self.registry.get(&call.name) else {
                    tracing::warn!(tool = %call.name, "oracle chose an unknown tool");
                    return self.apologize(session);
                };
                tracing::debug!(tool = %call.name, "executing tool");
                let outcome = tool.execute(&call.arguments, session).await;

                // A failed narration must not hide a mutation that already
                // happened; the tool's own text is already user-readable.
                let text = match self.oracle.narrate(session.history(), &call, &outcome.text).await
                {
                    Ok(text) => text,
                    Err(error) => {
                        tracing::warn!(error = %error, tool = %call.name, "narration failed, using tool text");
                        outcome.text.clone()
                    }
                };
                session.record(Turn::agent(text.clone()));
                Envelope::from_payload(text, outcome.payload)
            }
        }
    }

    /// Clears conversation history only; the bound identity stays. Safe
    /// at any time, including before the first turn.
    pub fn reset_session(&self, session: &mut Session) {
        session.reset();
    }

    fn apologize(&self, session: &mut Session) -> Envelope {
        session.record(Turn::agent(APOLOGY));
        Envelope::speech(APOLOGY)
    }
}
