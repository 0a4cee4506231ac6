use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{AdvisorError, Result},
    extract::extract_json,
    followup::{build_followup_prompt, render_response},
    gemini::TextGenerator,
    model::LoanDecision,
    prompts::{BusinessRequest, FinancialAdviceRequest, build_loan_resource_prompt},
    session::Exchange,
};

/// A structured answer together with the prompt that produced it.
#[derive(Debug)]
pub struct Advice {
    pub prompt: String,
    pub outcome: Result<Value>,
}

impl Advice {
    /// The parsed value, or an empty list when the turn produced no data.
    pub fn value_or_empty(self) -> (String, Value) {
        match self.outcome {
            Ok(value) => (self.prompt, value),
            Err(_) => (self.prompt, Value::Array(Vec::new())),
        }
    }
}

/// A free-text follow-up answer together with the prompt that produced it.
#[derive(Debug)]
pub struct FollowUp {
    pub prompt: String,
    pub outcome: Result<String>,
}

/// Runs prompts through a [`TextGenerator`] and reads the replies back.
#[derive(Clone)]
pub struct Advisor {
    generator: Arc<dyn TextGenerator>,
}

impl Advisor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn loan_resources(&self, country: &str) -> Advice {
        info!(country = %country, "Requesting loan resources");
        self.structured("loan_resources", build_loan_resource_prompt(country))
            .await
    }

    pub async fn business_ideas(&self, request: &BusinessRequest) -> Advice {
        info!(
            country = %request.country,
            interest_country = %request.interest_country,
            domain = %request.domain,
            amount = request.funding.amount(),
            "Requesting business ideas"
        );
        self.structured("business_ideas", request.prompt()).await
    }

    pub async fn financial_advice(&self, request: &FinancialAdviceRequest) -> Advice {
        info!(
            country = %request.country,
            interest_country = %request.interest_country,
            domain = %request.domain,
            amount = request.funding.amount(),
            "Requesting financial advice"
        );
        self.structured("financial_advice", request.prompt()).await
    }

    /// Answers `question` in the light of the previous exchange of a thread.
    pub async fn follow_up(
        &self,
        prior: Option<LoanDecision>,
        question: &str,
        previous: Option<&Exchange>,
    ) -> FollowUp {
        let (prior_prompt, prior_response) = previous
            .map(|exchange| (exchange.prompt.as_str(), render_response(&exchange.response)))
            .unwrap_or(("", String::new()));

        let prompt = build_followup_prompt(prior, question, prior_prompt, &prior_response);
        info!(
            prompt_length = prompt.chars().count(),
            has_previous = previous.is_some(),
            "Requesting follow-up answer"
        );

        let outcome = self.generator.generate(&prompt).await;
        if let Err(e) = &outcome {
            log_failure("follow_up", e);
        }
        FollowUp { prompt, outcome }
    }

    /// Sends `prompt` as-is and returns the generated text.
    pub async fn chat(&self, prompt: &str) -> Result<String> {
        let outcome = self.generator.generate(prompt).await;
        if let Err(e) = &outcome {
            log_failure("chat", e);
        }
        outcome
    }

    async fn structured(&self, pipeline: &'static str, prompt: String) -> Advice {
        let outcome = match self.generator.generate(&prompt).await {
            Ok(text) => extract_json(&text),
            Err(e) => Err(e),
        };
        if let Err(e) = &outcome {
            log_failure(pipeline, e);
        }
        Advice { prompt, outcome }
    }
}

fn log_failure(pipeline: &str, error: &AdvisorError) {
    match error {
        AdvisorError::Parse { cleaned, source } => warn!(
            pipeline,
            kind = error.kind(),
            error = %source,
            cleaned_text = %cleaned,
            "Could not parse JSON from model reply"
        ),
        other => warn!(
            pipeline,
            kind = other.kind(),
            error = %other,
            "Generative API call failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::Funding;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with a fixed text and remembers every prompt it saw.
    struct ScriptedGenerator {
        reply: std::result::Result<String, u16>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(status),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(AdvisorError::Api {
                    status: *status,
                    body: "upstream failure".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_loan_resources_end_to_end() {
        let generator = ScriptedGenerator::replying(
            "```json\n[{\"myCountry\": {\"organizationName\": \"Bank of Industry\", \"link\": \"https://www.boi.ng\"}, \"otherCountry\": {\"organizationName\": \"Afreximbank\", \"link\": \"https://www.afreximbank.com\", \"Country\": \"Egypt\"}}]\n```",
        );
        let advisor = Advisor::new(generator.clone());

        let advice = advisor.loan_resources("Nigeria").await;

        assert!(advice.prompt.contains("my country is Nigeria"));
        assert_eq!(generator.last_prompt(), advice.prompt);
        let value = advice.outcome.unwrap();
        assert_eq!(
            value,
            json!([{
                "myCountry": {"organizationName": "Bank of Industry", "link": "https://www.boi.ng"},
                "otherCountry": {"organizationName": "Afreximbank", "link": "https://www.afreximbank.com", "Country": "Egypt"}
            }])
        );
    }

    #[tokio::test]
    async fn test_unparseable_reply_becomes_empty_list() {
        let advisor = Advisor::new(ScriptedGenerator::replying("Sorry, I cannot help with that."));
        let request = BusinessRequest {
            country: "Ghana".to_string(),
            interest_country: "Ghana".to_string(),
            domain: "tech".to_string(),
            funding: Funding::Capital { amount: 100.0 },
        };

        let advice = advisor.business_ideas(&request).await;
        assert!(matches!(advice.outcome, Err(AdvisorError::Parse { .. })));

        let (prompt, value) = advice.value_or_empty();
        assert!(prompt.contains("capital of 100 US Dollars"));
        assert_eq!(value, json!([]));
    }

    #[tokio::test]
    async fn test_api_failure_is_distinguishable_from_no_data() {
        let advisor = Advisor::new(ScriptedGenerator::failing(503));
        let request = FinancialAdviceRequest {
            country: "Kenya".to_string(),
            interest_country: "Kenya".to_string(),
            domain: "food".to_string(),
            description: "a bakery".to_string(),
            funding: Funding::Loan {
                amount: 2000.0,
                repay_months: 12,
            },
        };

        let advice = advisor.financial_advice(&request).await;
        assert!(matches!(
            advice.outcome,
            Err(AdvisorError::Api { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_follow_up_uses_previous_exchange() {
        let generator = ScriptedGenerator::replying("Try a microfinance bank.");
        let advisor = Advisor::new(generator.clone());
        let previous = Exchange {
            prompt: "Hi, my country is Nigeria.".to_string(),
            response: json!([{"myCountry": {"organizationName": "BOI"}}]),
        };

        let follow_up = advisor
            .follow_up(Some(LoanDecision::Approved), "Which is cheapest?", Some(&previous))
            .await;

        assert_eq!(follow_up.outcome.unwrap(), "Try a microfinance bank.");
        assert_eq!(
            follow_up.prompt,
            "Question: Which is cheapest? | Previous Context: Hi, my country is Nigeria.[{\"myCountry\":{\"organizationName\":\"BOI\"}}]again congrats on your approved loan | Instruction: Provide a concise, direct answer within 800 characters."
        );
        assert_eq!(generator.last_prompt(), follow_up.prompt);
    }

    #[tokio::test]
    async fn test_follow_up_without_history() {
        let advisor = Advisor::new(ScriptedGenerator::replying("ok"));
        let follow_up = advisor.follow_up(None, "Hello?", None).await;
        assert!(follow_up.prompt.contains("| Previous Context:  | Instruction:"));
    }
}
