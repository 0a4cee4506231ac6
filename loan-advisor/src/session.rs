use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{AdvisorError, Result},
    model::LoanDecision,
};

/// A chat thread. Each page of the application keeps its own thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    LoanPrediction,
    BusinessIdea,
    FinancialAdvice,
}

/// The last prompt sent in a thread and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub prompt: String,
    pub response: Value,
}

/// Per-user conversation state, owned by the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: String,
    pub user_name: Option<String>,
    pub country: Option<String>,
    pub last_prediction: Option<LoanDecision>,
    #[serde(default)]
    pub exchanges: HashMap<Topic, Exchange>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_name: None,
            country: None,
            last_prediction: None,
            exchanges: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn require_country(&self) -> Result<&str> {
        self.country
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AdvisorError::MissingSessionContext("Country".to_string()))
    }

    pub fn exchange(&self, topic: Topic) -> Option<&Exchange> {
        self.exchanges.get(&topic)
    }

    pub fn record_exchange(&mut self, topic: Topic, prompt: impl Into<String>, response: Value) {
        self.exchanges.insert(
            topic,
            Exchange {
                prompt: prompt.into(),
                response,
            },
        );
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_require_country() {
        let mut state = ConversationState::new("s1");
        assert!(matches!(
            state.require_country(),
            Err(AdvisorError::MissingSessionContext(_))
        ));

        state.country = Some("  ".to_string());
        assert!(state.require_country().is_err());

        state.country = Some("Kenya".to_string());
        assert_eq!(state.require_country().unwrap(), "Kenya");
    }

    #[test]
    fn test_exchanges_are_kept_per_topic() {
        let mut state = ConversationState::new("s1");
        state.record_exchange(Topic::BusinessIdea, "idea prompt", json!([]));
        state.record_exchange(Topic::FinancialAdvice, "finance prompt", json!({"link": ""}));
        state.record_exchange(Topic::BusinessIdea, "second idea prompt", json!("answer"));

        assert_eq!(
            state.exchange(Topic::BusinessIdea).unwrap().prompt,
            "second idea prompt"
        );
        assert_eq!(
            state.exchange(Topic::FinancialAdvice).unwrap().response,
            json!({"link": ""})
        );
        assert!(state.exchange(Topic::LoanPrediction).is_none());
    }
}
