use serde::{Deserialize, Serialize};

use crate::domain::order::CustomerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self { role: Role::Agent, text: text.into() }
    }
}

/// One logical conversation: the bound customer identity plus the turns
/// exchanged so far. Identity comes from the surrounding auth layer and
/// is never changed by a reset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    customer_id: CustomerId,
    history: Vec<Turn>,
}

impl Session {
    pub fn new(customer_id: CustomerId) -> Self {
        Self { customer_id, history: Vec::new() }
    }

    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn record(&mut self, turn: Turn) {
        self.history.push(turn);
    }

    /// Clears conversation history only. Safe to call at any time,
    /// including before the first turn.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}
