//! Tool routing for the voice support agent.
//!
//! This crate is the "brain" between the transport layer and the stores:
//! - The **oracle** (`oracle`, `llm`) classifies each user turn into at
//!   most one tool call, or a plain conversational reply.
//! - **Tools** (`tools`) wrap the catalog, ledger, and vector stores.
//!   Every tool catches its own failures and returns a user-facing
//!   result; nothing below the router raises past it.
//! - The **router** (`router`) runs the plan/execute/narrate loop and
//!   normalizes whatever the tool produced into a tagged envelope the
//!   caller can render.
//!
//! The oracle is strictly a classifier and a narrator. It never decides
//! order-state transitions or ownership; those are deterministic checks
//! made by the ledger.

pub mod llm;
pub mod oracle;
pub mod router;
pub mod tools;

pub use llm::{HttpEmbedder, HttpOracle};
pub use oracle::{CapabilitySpec, Oracle, OracleReply, ToolCall};
pub use router::{Envelope, EnvelopeKind, ToolRouter};
pub use tools::{standard_registry, OrderSummary, Tool, ToolOutcome, ToolPayload, ToolRegistry};
